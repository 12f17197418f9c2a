//! Resource trait and types for declarative catalog configuration
//!
//! Every manifest entry (and every recorded entry the manifest no longer
//! names) is modeled as a Resource with:
//! - Refresh (re-read what the recorded state still matches remotely)
//! - Plan (classify the change from current to desired)
//! - Apply (converge current → desired and report the record to keep)

use anyhow::Result;
use association::{FieldChange, Operation, PlanOptions};
use convergence::{CancelToken, WaitConfig};
use indicatif::MultiProgress;
use std::fmt;

use crate::state::{RecordChange, ResourceType};

pub mod artifact;
pub mod association_link;

pub use artifact::ArtifactResource;
pub use association_link::AssociationResource;

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was destroyed and created again
    Replaced,
    /// Resource was modified in place
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// The result of successfully carrying out `operation`
    pub fn from_operation(operation: Operation) -> Self {
        match operation {
            Operation::NoOp => Self::NoChange,
            Operation::Create => Self::Created,
            Operation::Replace => Self::Replaced,
            Operation::InPlaceUpdate => Self::Modified,
            Operation::Destroy => Self::Removed,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => "○",
            Self::Created | Self::Replaced | Self::Modified | Self::Removed => "✓",
            Self::Failed { .. } => "✗",
            Self::Skipped { .. } => "⊘",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// What applying a resource did, and what to record for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub result: ApplyResult,
    pub record: RecordChange,
}

impl Applied {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            result: ApplyResult::Skipped {
                reason: reason.into(),
            },
            record: RecordChange::Keep,
        }
    }
}

/// Context passed to apply operations
///
/// Shared by every worker of one apply run.
#[derive(Debug, Clone)]
pub struct ApplyContext {
    pub dry_run: bool,
    pub plan_options: PlanOptions,
    pub wait: WaitConfig,
    pub cancel: CancelToken,
    /// Where artifact spinners are drawn; `None` disables them
    pub progress: Option<MultiProgress>,
}

impl Default for ApplyContext {
    fn default() -> Self {
        Self {
            dry_run: false,
            plan_options: PlanOptions::default(),
            wait: WaitConfig::default(),
            cancel: CancelToken::new(),
            progress: None,
        }
    }
}

/// A planned change for a single resource
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    pub address: String,
    pub resource_type: ResourceType,
    pub description: String,
    pub operation: Operation,
    pub changes: Vec<FieldChange>,
    /// Extra context such as drift detected during refresh
    pub note: Option<String>,
}

/// Core trait for all resources in catalink
pub trait Resource: Send + Sync + fmt::Debug {
    /// Name of the resource in the manifest and state file
    fn name(&self) -> &str;

    fn resource_type(&self) -> ResourceType;

    /// `type.name`, used for targeting and display
    fn address(&self) -> String {
        format!("{}.{}", self.resource_type(), self.name())
    }

    /// Human-readable description
    fn description(&self) -> String;

    /// Re-read the recorded resource from the remote side
    fn refresh(&self) -> Result<RecordChange>;

    /// Classify the change needed to reach the desired state
    fn plan(&self, options: &PlanOptions) -> Result<ResourceDiff>;

    /// Apply changes to reach desired state
    fn apply(&self, ctx: &ApplyContext) -> Result<Applied>;
}
