//! Remote relationship client abstraction
//!
//! The reconciler never talks to a remote API directly. Implement this trait
//! to provide the actual calls (a cloud SDK, a local fixture, a test fake).
//! Implementations own their retry and pagination policy: each call is
//! expected to either succeed or fail once, and `list_members` must return
//! the complete membership.

use crate::types::EntityRef;
use anyhow::Result;

/// Calls against the remote catalog's association API
pub trait RelationshipClient: Send + Sync {
    /// Associate `secondary` (product) with `primary` (portfolio)
    ///
    /// `source` names the portfolio the product is shared from, if any.
    fn associate(
        &self,
        primary: &EntityRef,
        secondary: &EntityRef,
        source: Option<&EntityRef>,
    ) -> Result<()>;

    /// Remove the association between `primary` and `secondary`
    fn disassociate(&self, primary: &EntityRef, secondary: &EntityRef) -> Result<()>;

    /// List every portfolio `secondary` is associated with
    fn list_members(&self, secondary: &EntityRef) -> Result<Vec<EntityRef>>;
}

impl<T: RelationshipClient + ?Sized> RelationshipClient for std::sync::Arc<T> {
    fn associate(
        &self,
        primary: &EntityRef,
        secondary: &EntityRef,
        source: Option<&EntityRef>,
    ) -> Result<()> {
        (**self).associate(primary, secondary, source)
    }

    fn disassociate(&self, primary: &EntityRef, secondary: &EntityRef) -> Result<()> {
        (**self).disassociate(primary, secondary)
    }

    fn list_members(&self, secondary: &EntityRef) -> Result<Vec<EntityRef>> {
        (**self).list_members(secondary)
    }
}
