//! Translation of query parameters into storage predicates.

use taro_address::{EventQueryParams, QueryParams, Status};

/// Address predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrQuery {
    /// Lower creation time bound, unix seconds.
    pub created_after: i64,
    /// Upper creation time bound, unix seconds.
    pub created_before: i64,
    /// Maximum number of rows, `-1` means unlimited.
    pub limit: i64,
    pub offset: i64,
    pub unmanaged_only: bool,
}

impl From<&QueryParams> for AddrQuery {
    fn from(params: &QueryParams) -> Self {
        Self {
            created_after: params
                .created_after
                .map_or(i64::MIN, |time| time.timestamp()),
            created_before: params
                .created_before
                .map_or(i64::MAX, |time| time.timestamp()),
            limit: match params.limit {
                Some(limit) if limit > 0 => i64::from(limit),
                _ => -1,
            },
            offset: i64::from(params.offset),
            unmanaged_only: params.unmanaged_only,
        }
    }
}

/// Event predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Output key of the address, `None` matches every address.
    ///
    /// An empty or all-zero key is no filter.
    pub addr_taproot_key: Option<Vec<u8>>,
    pub status_from: i64,
    pub status_to: i64,
}

impl From<&EventQueryParams> for EventQuery {
    fn from(params: &EventQueryParams) -> Self {
        Self {
            addr_taproot_key: params
                .addr_taproot_output_key
                .clone()
                .filter(|key| key.iter().any(|byte| *byte != 0)),
            status_from: params
                .status_from
                .unwrap_or(Status::TransactionDetected)
                .code()
                .into(),
            status_to: params.status_to.unwrap_or(Status::Completed).code().into(),
        }
    }
}
