//! # Association
//!
//! Desired-state reconciliation for catalog associations.
//!
//! An association links a product to a portfolio. The remote catalog keeps it
//! as an edge keyed by both endpoints, with no identifier of its own, so this
//! crate provides what a declarative tool needs around such an edge:
//!
//! - **Identity**: a stable opaque string derived from the portfolio and
//!   product ids ([`compute_identity`])
//! - **Planning**: a pure classification of a configuration change into
//!   [`Operation`]s ([`plan`])
//! - **Import**: adopting an existing edge from a `<portfolio>_<product>` key
//!   ([`parse_import_key`])
//! - **Reconciliation**: re-deriving existence from the remote membership
//!   listing ([`reconcile`])
//! - **Execution**: issuing the planned calls through an injected
//!   [`RelationshipClient`] ([`apply`])
//!
//! ## Example
//!
//! ```ignore
//! use association::{AssociationState, Operation, PlanOptions, plan, compute_identity};
//!
//! let old = AssociationState::from_ids("port-abc", "prod-xyz", None)?;
//! let new = AssociationState::from_ids("port-def", "prod-xyz", None)?;
//!
//! assert_eq!(plan(Some(&old), Some(&new), &PlanOptions::default()), Operation::Replace);
//! assert_ne!(compute_identity(&old), compute_identity(&new));
//! ```

pub mod client;
pub mod error;
pub mod executor;
pub mod identity;
pub mod import;
pub mod planner;
pub mod reconcile;
pub mod types;

pub use client::RelationshipClient;
pub use error::{BoxError, Error, Result};
pub use executor::{Applied, apply, refresh};
pub use identity::{compute_identity, verify_identity};
pub use import::{Imported, import_key, parse_import_key};
pub use planner::{FieldChange, PlanOptions, field_changes, plan};
pub use reconcile::reconcile;
pub use types::{
    AssociationState, EntityKind, EntityRef, Membership, Operation, RelationshipIdentity,
};
