//! Capability error types.

use thiserror::Error;

/// Errors that can occur while discovering or exposing entity capabilities.
///
/// Only [`CapsError::UnknownContact`] and [`CapsError::InvalidAddress`] ever
/// reach callers of the capability service. Discovery failures are absorbed
/// by the runtime and degrade to a baseline contribution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapsError {
    /// A discovery query received no reply before its deadline.
    #[error("disco#info query to {target} for {node} timed out")]
    QueryTimeout {
        /// Address the query was sent to.
        target: String,
        /// Node the query was scoped to.
        node: String,
    },

    /// A discovery reply could not be interpreted.
    #[error("malformed disco#info reply: {reason}")]
    MalformedReply {
        /// What was wrong with the reply.
        reason: String,
    },

    /// The peer answered the discovery query with an error stanza.
    #[error("remote error from {target}: {condition}")]
    RemoteError {
        /// Address that returned the error.
        target: String,
        /// Stanza error condition.
        condition: String,
    },

    /// A reply did not hash to the digest its signature advertised.
    #[error("digest mismatch for {node}: advertised {advertised}, computed {computed}")]
    DigestMismatch {
        /// Node of the signature.
        node: String,
        /// Digest carried in presence.
        advertised: String,
        /// Digest recomputed from the reply (empty if the reply was invalid for hashing).
        computed: String,
    },

    /// A capability query referenced a handle with no known identity.
    #[error("unknown contact handle: {handle}")]
    UnknownContact {
        /// The handle that was not found.
        handle: u32,
    },

    /// An address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl CapsError {
    /// Whether this error is a per-query failure the runtime recovers from
    /// by treating the signature as resolved to the empty feature set.
    #[must_use]
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            Self::QueryTimeout { .. } | Self::MalformedReply { .. } | Self::RemoteError { .. }
        )
    }
}

/// Result type for capability operations.
pub type CapsResult<T> = Result<T, CapsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_failures_are_recoverable() {
        let timeout = CapsError::QueryTimeout {
            target: "bob@foo.com/Foo".into(),
            node: "http://example.com/client#0.1".into(),
        };
        assert!(timeout.is_query_failure());
        assert!(
            CapsError::MalformedReply {
                reason: "no query".into()
            }
            .is_query_failure()
        );
        assert!(!CapsError::UnknownContact { handle: 31337 }.is_query_failure());
    }

    #[test]
    fn test_error_display() {
        let err = CapsError::UnknownContact { handle: 31337 };
        assert_eq!(err.to_string(), "unknown contact handle: 31337");
    }
}
