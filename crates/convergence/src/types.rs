//! Core types for convergence polling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Handle on a remote artifact created by a non-blocking mutation.
///
/// Carries everything needed to query the artifact afterwards: its own id and
/// the id of the parent entity it was created under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Identifier of the created artifact
    pub id: String,
    /// Identifier of the parent entity
    pub parent_id: String,
}

impl OperationHandle {
    /// Create a handle for an artifact under a parent.
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (parent {})", self.id, self.parent_id)
    }
}

/// A snapshot of remote state.
///
/// `status` drives the poller; `payload` is carried through untouched and
/// handed back to the caller once a terminal status is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<S, T> {
    /// Status reported by the remote system
    pub status: S,
    /// Opaque remote data
    pub payload: T,
}

impl<S, T> Observation<S, T> {
    /// Create an observation.
    pub fn new(status: S, payload: T) -> Self {
        Self { status, payload }
    }
}

/// A set of statuses, used for both target and failure conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSet<S>(Vec<S>);

impl<S: PartialEq> StatusSet<S> {
    /// Build a set from any list of statuses.
    pub fn new(statuses: impl IntoIterator<Item = S>) -> Self {
        let mut set = Vec::new();
        for status in statuses {
            if !set.contains(&status) {
                set.push(status);
            }
        }
        Self(set)
    }

    /// Whether `status` belongs to this set.
    pub fn contains(&self, status: &S) -> bool {
        self.0.contains(status)
    }
}

impl<S: fmt::Display> fmt::Display for StatusSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, status) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{status}")?;
        }
        f.write_str("}")
    }
}

/// Shortest delay the poller leaves between two observations
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timing parameters for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Delay between consecutive observations
    pub interval: Duration,
    /// Overall deadline, measured from the first observation
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl WaitConfig {
    /// Create a config with a custom interval and timeout.
    ///
    /// The interval is raised to at least [`MIN_INTERVAL`].
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }

    /// Replace the timeout, keeping the interval.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

}
