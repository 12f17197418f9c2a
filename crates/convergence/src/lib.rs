//! # convergence
//!
//! Bridge between an asynchronous remote mutation and a synchronous result.
//!
//! Some remote calls return before their effect is visible: the artifact
//! they create starts in a pending status and only later becomes available
//! (or fails). This crate blocks the caller until such an operation reaches a
//! terminal status, with a fixed poll interval, an overall deadline, and
//! prompt cancellation.
//!
//! ## Example
//!
//! ```no_run
//! use convergence::{CancelToken, Observation, WaitConfig, WaitTarget, wait_for};
//! use std::time::Duration;
//!
//! let config = WaitConfig::new(Duration::from_secs(3), Duration::from_secs(900));
//! let target = WaitTarget::new(["AVAILABLE"], ["FAILED"]);
//! let cancel = CancelToken::new();
//!
//! let observation = wait_for(
//!     "provisioning artifact pa-123",
//!     || Ok::<_, std::io::Error>(Observation::new("AVAILABLE", ())),
//!     &target,
//!     &config,
//!     &cancel,
//!     None,
//! )
//! .unwrap();
//! assert_eq!(observation.status, "AVAILABLE");
//! ```
//!
//! ## State machine
//!
//! ```text
//! Pending --observe--> Pending | Target | Failed
//! ```
//!
//! `Target` and `Failed` are terminal. Errors from the observation function,
//! the deadline and the cancellation token end the wait early; none of them
//! undo the remote operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod poller;
pub mod types;

pub use cancel::CancelToken;
pub use error::{BoxError, ErrorKind, WaitError};
pub use poller::{LogCallback, NoCallback, PollCallback, WaitTarget, wait_for};
pub use types::{MIN_INTERVAL, Observation, OperationHandle, StatusSet, WaitConfig};
