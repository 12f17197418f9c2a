//! Error types for convergence polling.
//!
//! Every wait error names the operation being waited on. Errors raised after
//! at least one observation carry the last observation, so callers can report
//! the remote status without consulting logs.

use crate::types::Observation;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by an observation function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Categories of wait errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A failure status was observed
    RemoteOperationFailed,
    /// The deadline passed before a terminal status
    Timeout,
    /// The caller raised the cancellation token
    Cancelled,
    /// The observation function itself failed
    RemoteCall,
}

impl ErrorKind {
    /// Whether the remote mutation may still complete on its own.
    ///
    /// Waiting stopped, but nothing was rolled back.
    pub fn may_still_complete(&self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }

    /// Get a user-friendly description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RemoteOperationFailed => "Remote operation failed",
            Self::Timeout => "Timed out waiting for remote operation",
            Self::Cancelled => "Wait cancelled",
            Self::RemoteCall => "Could not determine remote state",
        }
    }
}

/// Errors returned by [`crate::wait_for`].
#[derive(Debug, Error)]
pub enum WaitError<S, T>
where
    S: fmt::Debug + fmt::Display,
    T: fmt::Debug,
{
    /// A failure status was observed
    #[error("{operation} failed: remote reported status {}", .last.status)]
    RemoteOperationFailed {
        /// Operation being waited on
        operation: String,
        /// The observation carrying the failure status
        last: Observation<S, T>,
    },

    /// The deadline passed before a terminal status was observed
    #[error("timeout after {timeout:?} waiting for {operation} to reach {target}: last status {}", .last.status)]
    Timeout {
        /// Operation being waited on
        operation: String,
        /// Target statuses, rendered
        target: String,
        /// Configured deadline
        timeout: Duration,
        /// Last observation before the deadline
        last: Observation<S, T>,
    },

    /// The caller raised the cancellation token
    #[error("cancelled while waiting for {operation}{}", describe_last(.last.as_ref()))]
    Cancelled {
        /// Operation being waited on
        operation: String,
        /// Last observation, if one was made
        last: Option<Observation<S, T>>,
    },

    /// The observation function failed; not retried
    #[error("could not observe {operation}: {source}")]
    RemoteCall {
        /// Operation being waited on
        operation: String,
        /// Error returned by the observation function
        #[source]
        source: BoxError,
    },
}

fn describe_last<S: fmt::Display, T>(last: Option<&Observation<S, T>>) -> String {
    last.map(|obs| format!(" (last status {})", obs.status))
        .unwrap_or_default()
}

impl<S, T> WaitError<S, T>
where
    S: fmt::Debug + fmt::Display,
    T: fmt::Debug,
{
    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteOperationFailed { .. } => ErrorKind::RemoteOperationFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::RemoteCall { .. } => ErrorKind::RemoteCall,
        }
    }

    /// The last observation made before the error, if any.
    pub fn last_observation(&self) -> Option<&Observation<S, T>> {
        match self {
            Self::RemoteOperationFailed { last, .. } | Self::Timeout { last, .. } => Some(last),
            Self::Cancelled { last, .. } => last.as_ref(),
            Self::RemoteCall { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestError = WaitError<&'static str, u32>;

    #[test]
    fn test_kind_and_last_observation() {
        let err: TestError = WaitError::RemoteOperationFailed {
            operation: "artifact pa-1".into(),
            last: Observation::new("FAILED", 7),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteOperationFailed);
        assert!(!err.kind().may_still_complete());
        assert_eq!(err.last_observation().map(|o| o.payload), Some(7));
        assert_eq!(
            err.to_string(),
            "artifact pa-1 failed: remote reported status FAILED"
        );
    }

    #[test]
    fn test_timeout_message_carries_status() {
        let err: TestError = WaitError::Timeout {
            operation: "artifact pa-1".into(),
            target: "{AVAILABLE}".into(),
            timeout: Duration::from_secs(5),
            last: Observation::new("CREATING", 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("{AVAILABLE}"));
        assert!(msg.contains("CREATING"));
        assert!(err.kind().may_still_complete());
    }

    #[test]
    fn test_cancelled_without_observation() {
        let err: TestError = WaitError::Cancelled {
            operation: "artifact pa-1".into(),
            last: None,
        };
        assert_eq!(err.to_string(), "cancelled while waiting for artifact pa-1");
        assert!(err.last_observation().is_none());
    }

    #[test]
    fn test_remote_call_keeps_source() {
        let err: TestError = WaitError::RemoteCall {
            operation: "artifact pa-1".into(),
            source: "access denied".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("access denied"));
    }
}
