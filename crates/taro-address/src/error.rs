use crate::Status;

/// Address book domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    /// No address is known for the given taproot output key.
    #[error("no address found")]
    NoAddr,

    #[error("invalid address event status: {0}")]
    InvalidStatus(i64),

    /// An address event may only stay where it is or move forward.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("output index {index} out of range, transaction has {outputs} outputs")]
    OutputIndexOutOfRange { index: u32, outputs: usize },

    /// Amounts are stored as signed 64-bit integers.
    #[error("amount {0} exceeds the storable range")]
    AmountOutOfRange(u64),

    #[error("invalid asset type: {0}")]
    InvalidAssetType(i64),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),

    #[error("unable to derive asset commitment: {0}")]
    Commitment(String),
}
