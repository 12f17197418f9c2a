//! Execution of planned association changes against a remote client

use crate::client::RelationshipClient;
use crate::error::{Error, Result};
use crate::identity::compute_identity;
use crate::planner::{PlanOptions, plan};
use crate::reconcile::reconcile;
use crate::types::{AssociationState, Membership, Operation, RelationshipIdentity};

/// Result of applying an association change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// What was done
    pub operation: Operation,
    /// Identity to record; `None` once the association is destroyed
    pub identity: Option<RelationshipIdentity>,
}

/// Converge the remote association from `old` (recorded) to `new` (desired)
///
/// On `Replace` the old pair is disassociated first; if that fails nothing
/// else is attempted and the caller keeps its recorded state, so the next run
/// retries the same transition.
pub fn apply(
    client: &dyn RelationshipClient,
    old: Option<&AssociationState>,
    new: Option<&AssociationState>,
    options: &PlanOptions,
) -> Result<Applied> {
    let operation = plan(old, new, options);

    let identity = match (operation, old, new) {
        (Operation::Create | Operation::InPlaceUpdate, _, Some(new)) => {
            associate(client, new)?;
            Some(compute_identity(new))
        }
        (Operation::Replace, Some(old), Some(new)) => {
            disassociate(client, old)?;
            associate(client, new)?;
            Some(compute_identity(new))
        }
        (Operation::Destroy, Some(old), _) => {
            disassociate(client, old)?;
            None
        }
        (_, old, new) => new.or(old).map(compute_identity),
    };

    Ok(Applied {
        operation,
        identity,
    })
}

/// Re-derive whether a recorded association still exists remotely
pub fn refresh(client: &dyn RelationshipClient, recorded: &AssociationState) -> Result<Membership> {
    log::debug!("Listing portfolios for product {}", recorded.secondary);
    let members = client.list_members(&recorded.secondary).map_err(|e| {
        Error::remote(
            "list portfolios for product",
            recorded.primary.id(),
            recorded.secondary.id(),
            e,
        )
    })?;

    let membership = reconcile(&members, recorded);
    if !membership.is_present() {
        log::warn!(
            "Association {} not found remotely, treating it as absent",
            recorded.pair_label()
        );
    }
    Ok(membership)
}

fn associate(client: &dyn RelationshipClient, state: &AssociationState) -> Result<()> {
    log::debug!(
        "Associating product {} with portfolio {} (source: {})",
        state.secondary,
        state.primary,
        state
            .source
            .as_ref()
            .map_or_else(|| "none".to_string(), ToString::to_string)
    );
    client
        .associate(&state.primary, &state.secondary, state.source.as_ref())
        .map_err(|e| Error::remote("associate", state.primary.id(), state.secondary.id(), e))
}

fn disassociate(client: &dyn RelationshipClient, state: &AssociationState) -> Result<()> {
    log::debug!(
        "Disassociating product {} from portfolio {}",
        state.secondary,
        state.primary
    );
    client
        .disassociate(&state.primary, &state.secondary)
        .map_err(|e| Error::remote("disassociate", state.primary.id(), state.secondary.id(), e))
}
