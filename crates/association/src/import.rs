//! Import key parsing
//!
//! An existing association is adopted with a key of the form
//! `<portfolio-id>_<product-id>`, for example
//! `port-ig54mbjew7qru_prod-z2koxglqdw4n4`. Keys are case-insensitive.

use crate::error::{Error, Result};
use crate::identity::compute_identity;
use crate::types::{AssociationState, EntityKind, EntityRef, RelationshipIdentity};

const SEPARATOR: char = '_';

/// An association adopted through an import key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imported {
    pub state: AssociationState,
    pub identity: RelationshipIdentity,
}

/// Parse an import key into an association state and its identity
pub fn parse_import_key(key: &str) -> Result<Imported> {
    log::debug!("Validating import key {key}");

    let lowered = key.trim().to_lowercase();
    let parts: Vec<&str> = lowered.split(SEPARATOR).collect();

    let malformed = |reason: String| Error::MalformedImportKey {
        key: key.to_string(),
        reason,
    };

    let [portfolio_id, product_id] = parts.as_slice() else {
        let reason = if parts.len() < 2 {
            "too few parts".to_string()
        } else {
            format!("expected 2 parts, found {}", parts.len())
        };
        return Err(malformed(reason));
    };

    let primary = segment(EntityKind::Portfolio, portfolio_id).map_err(malformed)?;
    let secondary = segment(EntityKind::Product, product_id).map_err(malformed)?;

    let state = AssociationState::new(primary, secondary)?;
    let identity = compute_identity(&state);

    log::debug!("Validated import key {key} as {identity}");
    Ok(Imported { state, identity })
}

/// Render the import key that adopts the given association
pub fn import_key(state: &AssociationState) -> String {
    format!("{}{SEPARATOR}{}", state.primary.id(), state.secondary.id())
}

fn segment(kind: EntityKind, raw: &str) -> std::result::Result<EntityRef, String> {
    EntityRef::parse(kind, raw).map_err(|e| match e {
        Error::InvalidEntityReference { reason, .. } => format!("invalid {kind} ID: {reason}"),
        other => other.to_string(),
    })
}
