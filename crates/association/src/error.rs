//! Error types for association reconciliation.
//!
//! Validation errors (`MalformedImportKey`, `InvalidEntityReference`) are
//! produced before any remote call is made. Remote errors are passed through
//! uninterpreted, wrapped with the operation and identifiers involved.

use crate::types::EntityKind;
use thiserror::Error;

/// Boxed error from a remote collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while planning, importing or applying associations.
#[derive(Debug, Error)]
pub enum Error {
    /// Import key does not have the `<portfolio-id>_<product-id>` shape
    #[error("unexpected format of import key ({key:?}), expected PORTFOLIOID_PRODUCTID: {reason}")]
    MalformedImportKey {
        /// The key exactly as the caller supplied it
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// An identifier is empty or carries the wrong prefix for its kind
    #[error("invalid {kind} reference {value:?}: {reason}")]
    InvalidEntityReference {
        /// Expected entity kind
        kind: EntityKind,
        /// The rejected identifier
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// The identity recomputed from the recorded pair differs from the stored one
    #[error("relationship identity mismatch for {pair}: recorded {recorded}, computed {computed}")]
    IdentityMismatch {
        /// Human-readable `portfolio/product` pair
        pair: String,
        /// Identity loaded from state
        recorded: String,
        /// Identity derived from the pair
        computed: String,
    },

    /// A remote collaborator call failed
    #[error("{operation} failed for portfolio {portfolio} / product {product}: {source}")]
    RemoteCall {
        /// Collaborator operation that was attempted
        operation: &'static str,
        /// Portfolio identifier involved
        portfolio: String,
        /// Product identifier involved
        product: String,
        /// Uninterpreted collaborator error
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn remote(
        operation: &'static str,
        portfolio: &str,
        product: &str,
        source: anyhow::Error,
    ) -> Self {
        Self::RemoteCall {
            operation,
            portfolio: portfolio.to_string(),
            product: product.to_string(),
            source: source.into(),
        }
    }
}

/// Result type for association operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_keeps_source() {
        let err = Error::remote(
            "associate",
            "port-a",
            "prod-b",
            anyhow::anyhow!("throttled"),
        );
        assert!(matches!(err, Error::RemoteCall { operation: "associate", .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_messages_include_offending_input() {
        let err = Error::MalformedImportKey {
            key: "onlyonepart".into(),
            reason: "too few parts".into(),
        };
        assert!(err.to_string().contains("onlyonepart"));

        let err = Error::remote(
            "disassociate",
            "port-a",
            "prod-b",
            anyhow::anyhow!("access denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("disassociate"));
        assert!(msg.contains("port-a"));
        assert!(msg.contains("prod-b"));
        assert!(msg.contains("access denied"));
    }
}
