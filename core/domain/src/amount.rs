use crate::error::MirrorError;

/// Currency symbol for the native coin.
pub const CURRENCY_SYMBOL: &str = "HBAR";

/// 1 hbar = 10^8 tinybars.
pub const CURRENCY_DECIMALS: u32 = 8;

pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// An hbar amount in tinybars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HbarAmount {
    pub value: i64,
}

impl HbarAmount {
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    pub fn from_hbar(hbar: i64) -> Self {
        Self {
            value: hbar * TINYBARS_PER_HBAR,
        }
    }

    /// Parse a Rosetta amount value string into tinybars.
    pub fn parse(value: &str) -> Result<Self, MirrorError> {
        value
            .parse::<i64>()
            .map(Self::new)
            .map_err(|_| MirrorError::InvalidAmount)
    }
}

impl std::ops::Add for HbarAmount {
    type Output = HbarAmount;

    fn add(self, rhs: HbarAmount) -> HbarAmount {
        HbarAmount::new(self.value + rhs.value)
    }
}
