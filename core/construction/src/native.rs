//! The native transaction model carried between construction calls.
//!
//! The server is stateless; clients shuttle these as opaque bytes through the
//! payloads → combine → submit flow. Bincode is the canonical encoding, and a
//! transaction's hash is the SHA-384 of its canonical bytes.

use crate::transaction_id::TransactionId;
use mirror_domain::{EntityId, HbarAmount, MirrorError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};

/// A detached signature: raw public key bytes plus the signature over the
/// signing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Shared transaction envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TransactionHeader {
    pub transaction_id: Option<TransactionId>,
    pub node_account_id: Option<EntityId>,
    /// Fee ceiling in tinybars.
    pub max_transaction_fee: i64,
    pub memo: String,
    frozen: bool,
    signatures: Vec<SignaturePair>,
}

/// One hbar movement inside a transfer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub account: EntityId,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TransferTransaction {
    pub header: TransactionHeader,
    pub transfers: Vec<TransferLeg>,
}

impl TransferTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hbar_transfer(&mut self, account: EntityId, amount: i64) -> &mut Self {
        self.transfers.push(TransferLeg { account, amount });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountCreateTransaction {
    pub header: TransactionHeader,
    /// Protobuf-encoded public key of the new account.
    pub key: Vec<u8>,
    /// Opening balance in tinybars, funded by the payer.
    pub initial_balance: i64,
    pub auto_renew_period_seconds: Option<i64>,
    pub account_memo: String,
    pub max_automatic_token_associations: Option<i32>,
    pub proxy_account_id: Option<EntityId>,
}

impl AccountCreateTransaction {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Every transaction kind the construction pipeline can build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeTransaction {
    Transfer(TransferTransaction),
    AccountCreate(AccountCreateTransaction),
}

impl NativeTransaction {
    /// Dispatch key for parse; mirrors the constructor registry.
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeTransaction::Transfer(_) => "TransferTransaction",
            NativeTransaction::AccountCreate(_) => "AccountCreateTransaction",
        }
    }

    pub fn header(&self) -> &TransactionHeader {
        match self {
            NativeTransaction::Transfer(tx) => &tx.header,
            NativeTransaction::AccountCreate(tx) => &tx.header,
        }
    }

    fn header_mut(&mut self) -> &mut TransactionHeader {
        match self {
            NativeTransaction::Transfer(tx) => &mut tx.header,
            NativeTransaction::AccountCreate(tx) => &mut tx.header,
        }
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.header().transaction_id
    }

    pub fn is_frozen(&self) -> bool {
        self.header().frozen
    }

    pub fn is_signed(&self) -> bool {
        !self.header().signatures.is_empty()
    }

    pub fn signatures(&self) -> &[SignaturePair] {
        &self.header().signatures
    }

    /// Make the body immutable. A transaction can only freeze once it knows
    /// who pays and which node it targets.
    pub fn freeze(&mut self) -> Result<(), MirrorError> {
        let header = self.header_mut();
        if header.transaction_id.is_none() || header.node_account_id.is_none() {
            return Err(MirrorError::TransactionFreezeFailed);
        }
        header.frozen = true;
        Ok(())
    }

    /// Canonical bytes of the whole transaction, signatures included.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MirrorError> {
        bincode::serialize(self).map_err(|_| MirrorError::InternalServerError)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MirrorError> {
        bincode::deserialize(bytes).map_err(|_| MirrorError::TransactionInvalidType)
    }

    /// The bytes each required signer signs: the frozen transaction with the
    /// signature list empty.
    pub fn signing_payload(&self) -> Result<Vec<u8>, MirrorError> {
        if !self.is_frozen() {
            return Err(MirrorError::TransactionFreezeFailed);
        }

        let mut unsigned = self.clone();
        unsigned.header_mut().signatures.clear();
        unsigned.to_bytes()
    }

    /// Attach a signature; only frozen transactions accept them.
    pub fn add_signature(&mut self, public_key: Vec<u8>, signature: Vec<u8>) -> Result<(), MirrorError> {
        if !self.is_frozen() {
            return Err(MirrorError::TransactionFreezeFailed);
        }

        let signatures = &mut self.header_mut().signatures;
        signatures.retain(|pair| pair.public_key != public_key);
        signatures.push(SignaturePair {
            public_key,
            signature,
        });
        Ok(())
    }

    /// `0x`-prefixed SHA-384 of the canonical bytes.
    pub fn hash(&self) -> Result<String, MirrorError> {
        let mut hasher = Sha384::new();
        hasher.update(self.to_bytes()?);
        Ok(format!("0x{}", hex::encode(hasher.finalize())))
    }
}
