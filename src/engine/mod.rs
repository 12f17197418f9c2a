//! Execution engine for catalink
//!
//! The engine orchestrates:
//! 1. Planning - Build the resource set from manifest and state
//! 2. Diffing - Refresh each resource and classify its change
//! 3. Executing - Apply changes on a worker pool, then hand back records

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, execute, merge_outcomes};
pub use planner::{Target, build_resources, parse_target};
