//! Existence re-derivation from authoritative remote state
//!
//! Local state can drift (for example an association removed out of band),
//! so presence is always derived from the remote membership listing.

use crate::types::{AssociationState, EntityRef, Membership};

/// Decide whether `want.primary` is among the portfolios listed for `want.secondary`
pub fn reconcile(remote_membership: &[EntityRef], want: &AssociationState) -> Membership {
    let found = remote_membership
        .iter()
        .any(|member| member.kind() == want.primary.kind() && member.id() == want.primary.id());

    if found {
        Membership::Present
    } else {
        log::debug!(
            "Portfolio {} not among {} portfolio(s) listed for product {}",
            want.primary,
            remote_membership.len(),
            want.secondary
        );
        Membership::Absent
    }
}
