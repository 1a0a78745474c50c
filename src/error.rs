//! Error taxonomy for the sync and cache layer

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Everything that can go wrong while syncing Notion into the cache or reading it back
#[derive(Debug, Error)]
pub enum SyncError {
    /// A cache session could not be opened
    #[error("cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// A cache operation failed after the session was opened
    #[error("cache store {op} failed on '{key}': {message}")]
    StoreIo {
        op: &'static str,
        key: String,
        message: String,
    },

    /// The Notion API call failed (including rate limiting)
    #[error("failed to fetch {target} from Notion{}: {message}", http_suffix(.status))]
    RemoteFetch {
        target: String,
        status: Option<u16>,
        message: String,
    },

    /// A heading or to-do block did not have the expected shape
    #[error("malformed block {block_id}: {reason}")]
    MalformedBlock { block_id: String, reason: String },

    /// A remote call, store call, or page sync ran past its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("section '{0}' is not in the cache")]
    SectionNotFound(String),

    /// A cached value exists but cannot be decoded
    #[error("corrupt cache entry '{key}': {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl SyncError {
    /// True when Notion answered with HTTP 429
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteFetch {
                status: Some(429),
                ..
            }
        )
    }

    pub(crate) fn store_io(op: &'static str, key: &str, err: impl std::fmt::Display) -> Self {
        SyncError::StoreIo {
            op,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(key: &str, reason: impl Into<String>) -> Self {
        SyncError::CorruptEntry {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let limited = SyncError::RemoteFetch {
            target: "search".to_string(),
            status: Some(429),
            message: "rate_limited".to_string(),
        };
        assert!(limited.is_rate_limited());

        let other = SyncError::RemoteFetch {
            target: "search".to_string(),
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert!(!other.is_rate_limited());
    }

    #[test]
    fn test_remote_fetch_message_includes_status() {
        let err = SyncError::RemoteFetch {
            target: "blocks of page-1".to_string(),
            status: Some(409),
            message: "conflict_error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch blocks of page-1 from Notion (HTTP 409): conflict_error"
        );

        let no_status = SyncError::RemoteFetch {
            target: "search".to_string(),
            status: None,
            message: "connection reset".to_string(),
        };
        assert_eq!(
            no_status.to_string(),
            "failed to fetch search from Notion: connection reset"
        );
    }
}
