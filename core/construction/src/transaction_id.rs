use mirror_domain::{EntityId, MirrorError, NANOS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies a transaction across the ledger: the paying account plus the
/// nanosecond timestamp the transaction becomes valid at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionId {
    pub payer: EntityId,
    pub valid_start_ns: i64,
}

impl TransactionId {
    pub fn new(payer: EntityId, valid_start_ns: i64) -> Self {
        Self {
            payer,
            valid_start_ns,
        }
    }

    /// Generate an id valid from now for the given payer.
    pub fn generate(payer: EntityId) -> Self {
        let valid_start_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        Self::new(payer, valid_start_ns)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:09}",
            self.payer,
            self.valid_start_ns / NANOS_PER_SECOND,
            self.valid_start_ns % NANOS_PER_SECOND
        )
    }
}

impl FromStr for TransactionId {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (payer, rest) = s.split_once('-').ok_or(MirrorError::InvalidArgument)?;
        let (seconds, nanos) = rest.split_once('-').ok_or(MirrorError::InvalidArgument)?;

        let payer: EntityId = payer.parse()?;
        let seconds: i64 = seconds.parse().map_err(|_| MirrorError::InvalidArgument)?;
        let nanos: i64 = nanos.parse().map_err(|_| MirrorError::InvalidArgument)?;
        if !(0..NANOS_PER_SECOND).contains(&nanos) {
            return Err(MirrorError::InvalidArgument);
        }

        Ok(Self::new(payer, seconds * NANOS_PER_SECOND + nanos))
    }
}
