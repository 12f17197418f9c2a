//! Relationship identity derivation
//!
//! An association has no remote identifier of its own, so its identity is
//! derived from the pair it connects. The source portfolio never takes part.

use crate::error::{Error, Result};
use crate::types::{AssociationState, RelationshipIdentity};

const IDENTITY_PREFIX: &str = "product-portfolio-";

/// Number of digest bytes rendered into the identity
const DIGEST_BYTES: usize = 8;

/// Compute the identity of an association from its portfolio and product ids
pub fn compute_identity(state: &AssociationState) -> RelationshipIdentity {
    let key = format!("{}-{}", state.primary.id(), state.secondary.id());
    let digest = blake3::hash(key.as_bytes());

    let mut rendered = String::with_capacity(IDENTITY_PREFIX.len() + DIGEST_BYTES * 2);
    rendered.push_str(IDENTITY_PREFIX);
    for byte in &digest.as_bytes()[..DIGEST_BYTES] {
        rendered.push_str(&format!("{byte:02x}"));
    }

    RelationshipIdentity::new(rendered)
}

/// Recompute the identity for a recorded state and check it still matches
pub fn verify_identity(state: &AssociationState, recorded: &RelationshipIdentity) -> Result<()> {
    let computed = compute_identity(state);
    if &computed == recorded {
        return Ok(());
    }

    Err(Error::IdentityMismatch {
        pair: state.pair_label(),
        recorded: recorded.to_string(),
        computed: computed.to_string(),
    })
}
