//! Funding events of addresses.

use crate::{AddrError, AddrWithKeyInfo};
use bitcoin::secp256k1::PublicKey;
use bitcoin::taproot::TapNodeHash;
use bitcoin::{Amount, OutPoint, Transaction};
use chrono::{DateTime, Utc};

/// Progress of the on-chain transaction funding an address.
///
/// Variants are ordered, an event normally only moves towards [`Status::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i16)]
pub enum Status {
    /// The funding transaction was seen, but is not confirmed yet.
    TransactionDetected = 0,
    /// The funding transaction is confirmed.
    TransactionConfirmed = 1,
    /// The asset was imported together with its proof.
    Completed = 2,
}

impl Status {
    pub const ALL: [Status; 3] = [
        Self::TransactionDetected,
        Self::TransactionConfirmed,
        Self::Completed,
    ];

    /// Numeric code as persisted.
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Validates a move to `next`.
    ///
    /// Re-stating the current status is accepted, since the same on-chain event
    /// is reported repeatedly while confirmations accumulate. Moving backwards
    /// is rejected.
    pub fn transition(self, next: Status) -> Result<Status, AddrError> {
        if next >= self {
            Ok(next)
        } else {
            Err(AddrError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = AddrError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::TransactionDetected),
            1 => Ok(Self::TransactionConfirmed),
            2 => Ok(Self::Completed),
            other => Err(AddrError::InvalidStatus(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransactionDetected => write!(f, "transaction_detected"),
            Self::TransactionConfirmed => write!(f, "transaction_confirmed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Lifecycle record of one on-chain output funding one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Monotonically assigned event ID.
    pub id: i64,
    /// Time the event was first recorded.
    pub creation_time: DateTime<Utc>,
    /// Address being funded.
    pub addr: AddrWithKeyInfo,
    pub status: Status,
    /// Funding outpoint.
    pub outpoint: OutPoint,
    /// Value of the funding output.
    pub amount: Amount,
    /// Internal key of the funding output.
    pub internal_key: PublicKey,
    pub tapscript_sibling: Option<TapNodeHash>,
    /// Height of the block confirming the funding transaction.
    pub confirmation_height: Option<u32>,
    /// Whether the imported asset and its proof are linked.
    pub has_proof: bool,
}

impl Event {
    /// Validates moving this event to `next`, see [`Status::transition`].
    pub fn next_status(&self, next: Status) -> Result<Status, AddrError> {
        self.status.transition(next)
    }
}

/// Filters for listing events.
#[derive(Debug, Clone, Default)]
pub struct EventQueryParams {
    /// Serialized x-only taproot output key of the address. An empty or
    /// all-zero key matches every address.
    pub addr_taproot_output_key: Option<Vec<u8>>,
    /// Lowest status to include, [`Status::TransactionDetected`] if unset.
    pub status_from: Option<Status>,
    /// Highest status to include, [`Status::Completed`] if unset.
    pub status_to: Option<Status>,
}

/// Per-output details reported by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDetail {
    pub amount: Amount,
    /// Whether the output pays to a wallet address.
    pub is_ours: bool,
}

/// A transaction as reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTx {
    pub tx: Transaction,
    pub confirmations: u32,
    /// Hex encoded hash of the confirming block.
    pub block_hash: Option<String>,
    pub block_height: u32,
    /// One entry per transaction output.
    pub output_details: Vec<OutputDetail>,
}

impl WalletTx {
    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }

    /// Returns the wallet details of the given output.
    pub fn output_detail(&self, index: u32) -> Result<&OutputDetail, AddrError> {
        self.output_details
            .get(index as usize)
            .ok_or(AddrError::OutputIndexOutOfRange {
                index,
                outputs: self.output_details.len(),
            })
    }
}
