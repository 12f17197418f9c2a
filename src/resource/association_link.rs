//! Portfolio membership of a product

use anyhow::{Context, Result};
use association::{
    AssociationState, PlanOptions, RelationshipClient, RelationshipIdentity, field_changes,
    verify_identity,
};
use std::fmt;
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Applied, Resource, ResourceDiff};
use crate::state::{AssociationRecord, RecordChange, ResourceType, StateRecord};

/// One `[associations.<name>]` entry and its recorded counterpart
pub struct AssociationResource {
    name: String,
    recorded: Option<AssociationRecord>,
    desired: Option<AssociationState>,
    client: Arc<dyn RelationshipClient>,
}

impl fmt::Debug for AssociationResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationResource")
            .field("name", &self.name)
            .field("recorded", &self.recorded)
            .field("desired", &self.desired)
            .finish_non_exhaustive()
    }
}

impl AssociationResource {
    pub fn new(
        name: impl Into<String>,
        recorded: Option<AssociationRecord>,
        desired: Option<AssociationState>,
        client: Arc<dyn RelationshipClient>,
    ) -> Self {
        Self {
            name: name.into(),
            recorded,
            desired,
            client,
        }
    }

    /// The recorded association, after checking its identity still matches
    fn recorded_state(&self) -> Result<Option<(AssociationState, RelationshipIdentity)>> {
        let Some(record) = &self.recorded else {
            return Ok(None);
        };

        let state = record
            .to_state()
            .with_context(|| format!("Corrupt state for {}", self.address()))?;
        let identity = record.identity();
        verify_identity(&state, &identity)
            .with_context(|| format!("Corrupt state for {}", self.address()))?;
        Ok(Some((state, identity)))
    }

    /// The recorded association if it still exists remotely
    fn current(&self) -> Result<Option<AssociationState>> {
        let Some((state, _)) = self.recorded_state()? else {
            return Ok(None);
        };

        let membership = association::refresh(self.client.as_ref(), &state)?;
        Ok(membership.is_present().then_some(state))
    }
}

impl Resource for AssociationResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::Association
    }

    fn description(&self) -> String {
        let state = self.desired.as_ref().map(|s| (s.primary.id(), s.secondary.id()));
        let state = state.or_else(|| {
            self.recorded
                .as_ref()
                .map(|r| (r.portfolio_id.as_str(), r.product_id.as_str()))
        });
        match state {
            Some((portfolio, product)) => format!("product {product} in portfolio {portfolio}"),
            None => "association".to_string(),
        }
    }

    fn refresh(&self) -> Result<RecordChange> {
        let Some((state, identity)) = self.recorded_state()? else {
            return Ok(RecordChange::Keep);
        };

        let membership = association::refresh(self.client.as_ref(), &state)?;
        Ok(if membership.is_present() {
            RecordChange::Set(StateRecord::Association(AssociationRecord::new(
                &state, &identity,
            )))
        } else {
            RecordChange::Remove
        })
    }

    fn plan(&self, options: &PlanOptions) -> Result<ResourceDiff> {
        let current = self.current()?;
        let operation = association::plan(current.as_ref(), self.desired.as_ref(), options);

        let note = (self.recorded.is_some() && current.is_none())
            .then(|| "removed outside of catalink".to_string());

        Ok(ResourceDiff {
            address: self.address(),
            resource_type: self.resource_type(),
            description: self.description(),
            operation,
            changes: field_changes(current.as_ref(), self.desired.as_ref()),
            note,
        })
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<Applied> {
        if ctx.dry_run {
            return Ok(Applied::skipped("dry run"));
        }

        let current = self.current()?;
        let applied = association::apply(
            self.client.as_ref(),
            current.as_ref(),
            self.desired.as_ref(),
            &ctx.plan_options,
        )?;

        let state = self.desired.as_ref().or(current.as_ref());
        let record = match (&applied.identity, state) {
            (Some(identity), Some(state)) => RecordChange::Set(StateRecord::Association(
                AssociationRecord::new(state, identity),
            )),
            _ => RecordChange::Remove,
        };

        log::info!("{}: {}", self.address(), applied.operation);
        Ok(Applied {
            result: ApplyResult::from_operation(applied.operation),
            record,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
