//! Fixed-interval polling until a remote operation reaches a terminal status.

use crate::cancel::CancelToken;
use crate::error::{BoxError, WaitError};
use crate::types::{MIN_INTERVAL, Observation, StatusSet, WaitConfig};
use std::fmt;
use std::time::{Duration, Instant};

/// Callback trait for poll progress notifications.
pub trait PollCallback {
    /// Called after every observation whose status is neither target nor failure.
    ///
    /// # Arguments
    /// * `operation` - Operation being waited on
    /// * `attempt` - Observation number (1-indexed)
    /// * `elapsed` - Time since the first observation
    /// * `status` - Status just observed, rendered
    fn on_pending(&self, operation: &str, attempt: u64, elapsed: Duration, status: &str);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_pending(&self, _operation: &str, _attempt: u64, _elapsed: Duration, _status: &str) {}
}

/// Callback that logs every pending observation at debug level.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_pending(&self, operation: &str, attempt: u64, elapsed: Duration, status: &str) {
        log::debug!(
            "{operation}: observation {attempt} reported {status} after {:.1}s, still waiting",
            elapsed.as_secs_f64()
        );
    }
}

/// What to wait for.
pub struct WaitTarget<S> {
    /// Statuses that end the wait successfully
    pub target: StatusSet<S>,
    /// Statuses that end the wait with [`WaitError::RemoteOperationFailed`]
    pub failure: StatusSet<S>,
}

impl<S: PartialEq> WaitTarget<S> {
    /// Create a target from success and failure statuses.
    pub fn new(
        target: impl IntoIterator<Item = S>,
        failure: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            target: StatusSet::new(target),
            failure: StatusSet::new(failure),
        }
    }
}

/// Block until `observe` reports a target or failure status.
///
/// `observe` runs once immediately and then every `config.interval` (never
/// more often than [`MIN_INTERVAL`]), measured from the first call. An error
/// from `observe` ends the wait at once: it means the state could not be
/// determined, which is different from the remote reporting a pending status.
/// The wait ends with [`WaitError::Timeout`] when the next scheduled
/// observation would fall after `config.timeout`, and with
/// [`WaitError::Cancelled`] as soon as `cancel` is raised. Neither rolls back the remote operation.
///
/// # Arguments
/// * `operation` - Name of the operation, used in errors and callbacks
/// * `observe` - Queries the remote state
/// * `target` - Success and failure statuses
/// * `config` - Interval and timeout
/// * `cancel` - Cancellation token shared with the caller
/// * `callback` - Optional progress callback
pub fn wait_for<S, T, E, F>(
    operation: &str,
    mut observe: F,
    target: &WaitTarget<S>,
    config: &WaitConfig,
    cancel: &CancelToken,
    callback: Option<&dyn PollCallback>,
) -> Result<Observation<S, T>, WaitError<S, T>>
where
    S: PartialEq + fmt::Debug + fmt::Display,
    T: fmt::Debug,
    E: Into<BoxError>,
    F: FnMut() -> Result<Observation<S, T>, E>,
{
    let interval = config.interval.max(MIN_INTERVAL);
    let start = Instant::now();
    let mut attempt: u64 = 0;
    let mut last: Option<Observation<S, T>> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                operation: operation.to_string(),
                last,
            });
        }

        attempt += 1;
        let observation = observe().map_err(|e| WaitError::RemoteCall {
            operation: operation.to_string(),
            source: e.into(),
        })?;

        if target.target.contains(&observation.status) {
            log::debug!(
                "{operation}: reached {} after {attempt} observation(s)",
                observation.status
            );
            return Ok(observation);
        }

        if target.failure.contains(&observation.status) {
            log::debug!(
                "{operation}: reported failure status {}",
                observation.status
            );
            return Err(WaitError::RemoteOperationFailed {
                operation: operation.to_string(),
                last: observation,
            });
        }

        let elapsed = start.elapsed();
        if let Some(cb) = callback {
            cb.on_pending(operation, attempt, elapsed, &observation.status.to_string());
        }

        // Observations are scheduled on a fixed grid from the first one
        let next = interval.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));
        if next > config.timeout {
            return Err(timeout(operation, target, config, observation));
        }

        if cancel.sleep(next.saturating_sub(start.elapsed())) {
            return Err(WaitError::Cancelled {
                operation: operation.to_string(),
                last: Some(observation),
            });
        }

        last = Some(observation);
    }
}

fn timeout<S, T>(
    operation: &str,
    target: &WaitTarget<S>,
    config: &WaitConfig,
    last: Observation<S, T>,
) -> WaitError<S, T>
where
    S: fmt::Debug + fmt::Display,
    T: fmt::Debug,
{
    WaitError::Timeout {
        operation: operation.to_string(),
        target: target.target.to_string(),
        timeout: config.timeout,
        last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Status {
        Pending,
        Available,
        Failed,
    }

    impl fmt::Display for Status {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = match self {
                Status::Pending => "pending",
                Status::Available => "available",
                Status::Failed => "failed",
            };
            f.write_str(s)
        }
    }

    fn artifact_target() -> WaitTarget<Status> {
        WaitTarget::new([Status::Available], [Status::Failed])
    }

    /// Observation function replaying a script, then repeating its last entry
    fn scripted(
        statuses: &[Status],
    ) -> (
        Arc<AtomicU64>,
        impl FnMut() -> anyhow::Result<Observation<Status, u64>> + use<>,
    ) {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut script: VecDeque<Status> = statuses.iter().copied().collect();
        let observe = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                *script.front().unwrap()
            };
            Ok(Observation::new(status, n))
        };
        (calls, observe)
    }

    #[test]
    fn test_converges_on_third_observation() {
        let interval = Duration::from_millis(5);
        let config = WaitConfig::new(interval, interval * 1000);
        let (calls, observe) =
            scripted(&[Status::Pending, Status::Pending, Status::Available]);

        let result = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(result.status, Status::Available);
        assert_eq!(result.payload, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_times_out_before_third_observation() {
        let interval = Duration::from_millis(50);
        let config = WaitConfig::new(interval, interval * 3 / 2);
        let (calls, observe) =
            scripted(&[Status::Pending, Status::Pending, Status::Available]);

        let err = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.last_observation().map(|o| o.status), Some(Status::Pending));
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_observes_on_last_tick_before_deadline() {
        let interval = Duration::from_millis(40);
        let config = WaitConfig::new(interval, Duration::from_millis(81));
        let (calls, mut observe) =
            scripted(&[Status::Pending, Status::Pending, Status::Available]);

        let result = wait_for(
            "artifact",
            || {
                thread::sleep(Duration::from_millis(2));
                observe()
            },
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(result.status, Status::Available);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_interval_does_not_spin() {
        let config = WaitConfig {
            interval: Duration::ZERO,
            timeout: Duration::from_millis(20),
        };
        let (calls, observe) = scripted(&[Status::Pending]);

        let err = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(calls.load(Ordering::SeqCst) <= 21);
    }

    #[test]
    fn test_failure_status_returns_immediately() {
        let config = WaitConfig::new(Duration::from_secs(1), Duration::from_secs(60));
        let (calls, observe) = scripted(&[Status::Failed]);
        let start = Instant::now();

        let err = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteOperationFailed);
        assert_eq!(err.last_observation().map(|o| o.status), Some(Status::Failed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_observe_error_is_not_retried() {
        let config = WaitConfig::new(Duration::from_millis(1), Duration::from_secs(60));
        let calls = Cell::new(0);

        let err = wait_for(
            "artifact",
            || -> anyhow::Result<Observation<Status, ()>> {
                calls.set(calls.get() + 1);
                anyhow::bail!("access denied")
            },
            &artifact_target(),
            &config,
            &CancelToken::new(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert!(err.to_string().contains("access denied"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cancel_stops_waiting_promptly() {
        let config = WaitConfig::new(Duration::from_secs(5), Duration::from_secs(60));
        let (_, observe) = scripted(&[Status::Pending]);
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let start = Instant::now();
        let err = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &cancel,
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.last_observation().map(|o| o.status), Some(Status::Pending));
        assert!(start.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn test_already_cancelled_makes_no_observation() {
        let config = WaitConfig::default();
        let (calls, observe) = scripted(&[Status::Available]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &cancel,
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.last_observation().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_invoked_for_pending_only() {
        struct CountingCallback(Arc<AtomicU64>);
        impl PollCallback for CountingCallback {
            fn on_pending(&self, _: &str, _: u64, _: Duration, status: &str) {
                assert_eq!(status, "pending");
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let config = WaitConfig::new(Duration::from_millis(1), Duration::from_secs(60));
        let (_, observe) = scripted(&[Status::Pending, Status::Pending, Status::Available]);
        let count = Arc::new(AtomicU64::new(0));
        let callback = CountingCallback(count.clone());

        wait_for(
            "artifact",
            observe,
            &artifact_target(),
            &config,
            &CancelToken::new(),
            Some(&callback),
        )
        .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
