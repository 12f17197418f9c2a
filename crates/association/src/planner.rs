//! Change planning - classifies a transition between recorded and desired state
//!
//! Planning is pure: no remote calls, no side effects. The remote API models
//! associations as immutable edges keyed by both endpoints, so any endpoint
//! change has to be applied as disassociate-then-associate.

use crate::types::{AssociationState, EntityRef, Operation};
use serde::{Deserialize, Serialize};

/// Knobs describing how the remote API behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Re-issuing associate for an existing pair succeeds without side effects
    pub associate_is_idempotent: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            associate_is_idempotent: true,
        }
    }
}

/// A single attribute that differs between recorded and desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Whether this change alone forces a replacement
    pub forces_replace: bool,
}

/// Classify the transition from `old` (recorded) to `new` (desired)
pub fn plan(
    old: Option<&AssociationState>,
    new: Option<&AssociationState>,
    options: &PlanOptions,
) -> Operation {
    let operation = match (old, new) {
        (None, None) => Operation::NoOp,
        (None, Some(_)) => Operation::Create,
        (Some(_), None) => Operation::Destroy,
        (Some(old), Some(new)) if !old.same_pair(new) => Operation::Replace,
        (Some(old), Some(new)) if old.source != new.source => {
            if options.associate_is_idempotent {
                Operation::InPlaceUpdate
            } else {
                Operation::NoOp
            }
        }
        (Some(_), Some(_)) => Operation::NoOp,
    };

    log::debug!(
        "Planned {} for {} -> {}",
        operation,
        old.map_or_else(|| "(none)".to_string(), AssociationState::pair_label),
        new.map_or_else(|| "(none)".to_string(), AssociationState::pair_label),
    );
    operation
}

/// List the attributes that differ, for rendering a plan
pub fn field_changes(
    old: Option<&AssociationState>,
    new: Option<&AssociationState>,
) -> Vec<FieldChange> {
    type Getter = fn(&AssociationState) -> Option<&EntityRef>;

    fn primary(s: &AssociationState) -> Option<&EntityRef> {
        Some(&s.primary)
    }
    fn secondary(s: &AssociationState) -> Option<&EntityRef> {
        Some(&s.secondary)
    }
    fn source(s: &AssociationState) -> Option<&EntityRef> {
        s.source.as_ref()
    }

    let pick = |s: Option<&AssociationState>, getter: Getter| {
        s.and_then(getter).map(|e| e.id().to_string())
    };

    let fields: [(&'static str, Getter, bool); 3] = [
        ("portfolio_id", primary, true),
        ("product_id", secondary, true),
        ("source_portfolio_id", source, false),
    ];

    fields
        .into_iter()
        .filter_map(|(field, getter, forces_replace)| {
            let from = pick(old, getter);
            let to = pick(new, getter);
            (from != to).then_some(FieldChange {
                field,
                from,
                to,
                forces_replace: forces_replace && old.is_some() && new.is_some(),
            })
        })
        .collect()
}
