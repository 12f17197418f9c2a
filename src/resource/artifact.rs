//! Provisioning artifact of a product
//!
//! Creation is asynchronous: the catalog accepts the request and reports
//! `CREATING` until the template has been processed. Apply blocks on the
//! convergence poller until the artifact is `AVAILABLE` or `FAILED`.

use anyhow::{Context, Result};
use association::{FieldChange, Operation, PlanOptions};
use chrono::Utc;
use convergence::{LogCallback, NoCallback, OperationHandle, PollCallback, WaitError, WaitTarget, wait_for};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ApplyContext, ApplyResult, Applied, Resource, ResourceDiff};
use crate::progress::{self, SpinnerCallback};
use crate::remote::{ArtifactClient, ArtifactDetail, ArtifactObservation, ArtifactStatus};
use crate::schema::ArtifactDecl;
use crate::state::{ArtifactRecord, RecordChange, ResourceType, StateRecord};

/// One `[artifacts.<name>]` entry and its recorded counterpart
pub struct ArtifactResource {
    name: String,
    recorded: Option<ArtifactRecord>,
    desired: Option<ArtifactDecl>,
    client: Arc<dyn ArtifactClient>,
}

impl fmt::Debug for ArtifactResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResource")
            .field("name", &self.name)
            .field("recorded", &self.recorded)
            .field("desired", &self.desired)
            .finish_non_exhaustive()
    }
}

/// Classify the change from the observed artifact to the declared one
///
/// An artifact that failed to provision is replaced.
pub fn classify(
    current: Option<&ArtifactObservation>,
    desired: Option<&ArtifactDecl>,
) -> (Operation, Vec<FieldChange>) {
    let (current, desired) = match (current, desired) {
        (None, None) => return (Operation::NoOp, Vec::new()),
        (None, Some(_)) => return (Operation::Create, Vec::new()),
        (Some(_), None) => return (Operation::Destroy, Vec::new()),
        (Some(current), Some(desired)) => (current, desired),
    };

    let have = &current.payload;
    let want = &desired.spec;
    let product_id = match desired.product() {
        Ok(product) => product.id().to_string(),
        Err(_) => desired.product_id.trim().to_lowercase(),
    };
    let candidates = [
        ("name", have.name.clone(), want.name.clone(), true),
        (
            "product_id",
            have.product_id.clone(),
            product_id,
            true,
        ),
        (
            "type",
            have.artifact_type.to_string(),
            want.artifact_type.to_string(),
            true,
        ),
        (
            "template_url",
            have.template_url.clone(),
            want.template_url.clone(),
            true,
        ),
        (
            "description",
            have.description.clone(),
            want.description.clone(),
            false,
        ),
        (
            "active",
            have.active.to_string(),
            want.active.to_string(),
            false,
        ),
    ];

    let changes: Vec<FieldChange> = candidates
        .into_iter()
        .filter(|(_, from, to, _)| from != to)
        .map(|(field, from, to, forces_replace)| FieldChange {
            field,
            from: Some(from),
            to: Some(to),
            forces_replace,
        })
        .collect();

    let operation = if current.status == ArtifactStatus::Failed
        || changes.iter().any(|c| c.forces_replace)
    {
        Operation::Replace
    } else if changes.is_empty() {
        Operation::NoOp
    } else {
        Operation::InPlaceUpdate
    };

    (operation, changes)
}

impl ArtifactResource {
    pub fn new(
        name: impl Into<String>,
        recorded: Option<ArtifactRecord>,
        desired: Option<ArtifactDecl>,
        client: Arc<dyn ArtifactClient>,
    ) -> Self {
        Self {
            name: name.into(),
            recorded,
            desired,
            client,
        }
    }

    /// Describe the recorded artifact; `None` when it no longer exists
    fn current(&self) -> Result<Option<ArtifactObservation>> {
        let Some(record) = &self.recorded else {
            return Ok(None);
        };

        let handle = record.handle();
        log::debug!("Describing provisioning artifact {handle}");
        let observation = self
            .client
            .describe_artifact(&handle)
            .with_context(|| format!("Failed to describe provisioning artifact {handle}"))?;

        if observation.is_none() {
            log::warn!(
                "Provisioning artifact {} of {} not found, removing it from state",
                handle.id,
                self.address()
            );
        }
        Ok(observation)
    }

    fn create(&self, decl: &ArtifactDecl, ctx: &ApplyContext) -> Result<Applied> {
        let product = decl.product()?;
        let token = idempotency_token(&self.name, product.id());

        log::debug!("Creating provisioning artifact {} for {product}", decl.spec.name);
        let handle = self
            .client
            .create_artifact(&product, &decl.spec, &token)
            .with_context(|| {
                format!(
                    "Failed to create provisioning artifact {} for product {product}",
                    decl.spec.name
                )
            })?;

        match self.wait_available(&handle, ctx) {
            Ok(observation) => Ok(Applied {
                result: ApplyResult::Created,
                record: record_of(&observation),
            }),
            Err(err) => {
                // The artifact exists even though the wait failed
                let record = match err.last_observation() {
                    Some(observation) => record_of(observation),
                    None => RecordChange::Set(StateRecord::Artifact(ArtifactRecord {
                        id: handle.id.clone(),
                        product_id: handle.parent_id.clone(),
                        status: ArtifactStatus::Creating,
                        created_time: Utc::now(),
                        spec: decl.spec.clone(),
                    })),
                };
                let mut error = format!("{}: {err}", err.kind().description());
                if err.kind().may_still_complete() {
                    error.push_str(" (the artifact may still become available)");
                }
                Ok(Applied {
                    result: ApplyResult::Failed { error },
                    record,
                })
            }
        }
    }

    fn wait_available(
        &self,
        handle: &OperationHandle,
        ctx: &ApplyContext,
    ) -> Result<ArtifactObservation, WaitError<ArtifactStatus, ArtifactDetail>> {
        let target = WaitTarget::new([ArtifactStatus::Available], [ArtifactStatus::Failed]);
        let observe = || -> Result<ArtifactObservation> {
            self.client
                .describe_artifact(handle)?
                .with_context(|| format!("provisioning artifact {handle} disappeared"))
        };

        let spinner = ctx.progress.as_ref().map(|multi| {
            let pb = multi.add(progress::spinner(&format!("{} provisioning", self.address())));
            (pb.clone(), SpinnerCallback::new(pb, self.address()))
        });
        let callback: &dyn PollCallback = match &spinner {
            Some((_, callback)) => callback,
            None if log::log_enabled!(log::Level::Debug) => &LogCallback,
            None => &NoCallback,
        };

        let operation = format!("provisioning artifact {}", handle.id);
        let result = wait_for(&operation, observe, &target, &ctx.wait, &ctx.cancel, Some(callback));

        if let Some((pb, _)) = spinner {
            match &result {
                Ok(_) => progress::finish_success(&pb, &format!("{} available", self.address())),
                Err(err) => progress::finish_error(
                    &pb,
                    &format!("{} {}", self.address(), err.kind().description().to_lowercase()),
                ),
            }
        }
        result
    }

    fn delete(&self, record: &ArtifactRecord) -> Result<()> {
        let handle = record.handle();
        log::debug!("Deleting provisioning artifact {handle}");
        self.client
            .delete_artifact(&handle)
            .with_context(|| format!("Failed to delete provisioning artifact {handle}"))
    }
}

fn record_of(observation: &ArtifactObservation) -> RecordChange {
    RecordChange::Set(StateRecord::Artifact(ArtifactRecord::from_detail(
        &observation.payload,
        observation.status,
    )))
}

/// Client token for a single create request
///
/// Unique per call, so a later apply that creates the artifact again is a new
/// request and not a replay of an earlier one.
static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

fn idempotency_token(name: &str, product_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(product_id.as_bytes());
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&TOKEN_SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    format!("catalink-{}", &hasher.finalize().to_hex().as_str()[..32])
}

impl Resource for ArtifactResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::Artifact
    }

    fn description(&self) -> String {
        match (&self.desired, &self.recorded) {
            (Some(decl), _) => format!("{} for product {}", decl.spec.name, decl.product_id),
            (None, Some(rec)) => format!("{} for product {}", rec.spec.name, rec.product_id),
            (None, None) => "provisioning artifact".to_string(),
        }
    }

    fn refresh(&self) -> Result<RecordChange> {
        if self.recorded.is_none() {
            return Ok(RecordChange::Keep);
        }
        Ok(match self.current()? {
            Some(observation) => record_of(&observation),
            None => RecordChange::Remove,
        })
    }

    fn plan(&self, _options: &PlanOptions) -> Result<ResourceDiff> {
        let current = self.current()?;
        let (operation, changes) = classify(current.as_ref(), self.desired.as_ref());

        let note = match (&self.recorded, current.as_ref().map(|o| o.status)) {
            (Some(_), None) => Some("removed outside of catalink".to_string()),
            (_, Some(ArtifactStatus::Creating)) => Some("still provisioning".to_string()),
            (_, Some(ArtifactStatus::Failed)) => Some("failed to provision".to_string()),
            _ => None,
        };

        Ok(ResourceDiff {
            address: self.address(),
            resource_type: self.resource_type(),
            description: self.description(),
            operation,
            changes,
            note,
        })
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<Applied> {
        if ctx.dry_run {
            return Ok(Applied::skipped("dry run"));
        }

        let current = self.current()?;
        let (operation, _) = classify(current.as_ref(), self.desired.as_ref());
        log::info!("{}: {}", self.address(), operation);

        match (operation, &self.recorded, &self.desired) {
            (Operation::Create, _, Some(decl)) => self.create(decl, ctx),
            (Operation::Replace, Some(record), Some(decl)) => {
                self.delete(record)?;
                let mut applied = self.create(decl, ctx)?;
                if applied.result == ApplyResult::Created {
                    applied.result = ApplyResult::Replaced;
                }
                Ok(applied)
            }
            (Operation::InPlaceUpdate, Some(record), Some(decl)) => {
                let handle = record.handle();
                log::debug!("Updating provisioning artifact {handle}");
                self.client
                    .update_artifact(&handle, &decl.spec.description, decl.spec.active)
                    .with_context(|| {
                        format!("Failed to update provisioning artifact {handle}")
                    })?;

                let mut updated = record.clone();
                if let Some(observation) = &current {
                    updated = ArtifactRecord::from_detail(&observation.payload, observation.status);
                }
                updated.spec.description = decl.spec.description.clone();
                updated.spec.active = decl.spec.active;
                Ok(Applied {
                    result: ApplyResult::Modified,
                    record: RecordChange::Set(StateRecord::Artifact(updated)),
                })
            }
            (Operation::Destroy, Some(record), _) => {
                self.delete(record)?;
                Ok(Applied {
                    result: ApplyResult::Removed,
                    record: RecordChange::Remove,
                })
            }
            (_, _, _) => match current {
                Some(observation) if observation.status == ArtifactStatus::Creating => {
                    let handle = OperationHandle::new(
                        observation.payload.id.clone(),
                        observation.payload.product_id.clone(),
                    );
                    match self.wait_available(&handle, ctx) {
                        Ok(settled) => Ok(Applied {
                            result: ApplyResult::NoChange,
                            record: record_of(&settled),
                        }),
                        Err(err) => Ok(Applied {
                            result: ApplyResult::Failed {
                                error: format!("{}: {err}", err.kind().description()),
                            },
                            record: RecordChange::Keep,
                        }),
                    }
                }
                Some(observation) => Ok(Applied {
                    result: ApplyResult::NoChange,
                    record: record_of(&observation),
                }),
                None => Ok(Applied {
                    result: ApplyResult::NoChange,
                    record: RecordChange::Remove,
                }),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
