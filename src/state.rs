use anyhow::{Context, Result};
use association::{AssociationState, RelationshipIdentity};
use chrono::{DateTime, Utc};
use convergence::OperationHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::remote::{ArtifactDetail, ArtifactSpec, ArtifactStatus};

// ============================================================================
// Resource Types
// ============================================================================

/// The kinds of resource catalink manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Association,
    Artifact,
}

impl ResourceType {
    pub const ALL: [Self; 2] = [Self::Association, Self::Artifact];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Association => "association",
            Self::Artifact => "artifact",
        }
    }

    /// Parse a target prefix, accepting singular and plural forms
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "association" | "associations" => Some(Self::Association),
            "artifact" | "artifacts" => Some(Self::Artifact),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State Structures
// ============================================================================

/// Main state structure: the last applied record of every resource
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalinkState {
    /// Applied associations by resource name
    #[serde(default)]
    pub associations: BTreeMap<String, AssociationRecord>,

    /// Applied provisioning artifacts by resource name
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Recorded portfolio/product association
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AssociationRecord {
    pub portfolio_id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_portfolio_id: Option<String>,
    /// Relationship identity computed when the association was applied
    pub identity: String,
}

/// Recorded provisioning artifact
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub id: String,
    pub product_id: String,
    pub status: ArtifactStatus,
    pub created_time: DateTime<Utc>,
    pub spec: ArtifactSpec,
}

/// A single recorded resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateRecord {
    Association(AssociationRecord),
    Artifact(ArtifactRecord),
}

/// What the engine should do with a resource's record after apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// Leave the recorded state untouched
    Keep,
    /// Record (or overwrite with) this state
    Set(StateRecord),
    /// Forget the resource
    Remove,
}

// ============================================================================
// Record Conversions
// ============================================================================

impl AssociationRecord {
    pub fn new(state: &AssociationState, identity: &RelationshipIdentity) -> Self {
        Self {
            portfolio_id: state.primary.id().to_string(),
            product_id: state.secondary.id().to_string(),
            source_portfolio_id: state.source.as_ref().map(|s| s.id().to_string()),
            identity: identity.as_str().to_string(),
        }
    }

    /// Re-validate the recorded ids
    pub fn to_state(&self) -> association::Result<AssociationState> {
        AssociationState::from_ids(
            &self.portfolio_id,
            &self.product_id,
            self.source_portfolio_id.as_deref(),
        )
    }

    pub fn identity(&self) -> RelationshipIdentity {
        RelationshipIdentity::from_recorded(self.identity.clone())
    }
}

impl ArtifactRecord {
    pub fn from_detail(detail: &ArtifactDetail, status: ArtifactStatus) -> Self {
        Self {
            id: detail.id.clone(),
            product_id: detail.product_id.clone(),
            status,
            created_time: detail.created_time,
            spec: detail.spec(),
        }
    }

    pub fn handle(&self) -> OperationHandle {
        OperationHandle::new(self.id.clone(), self.product_id.clone())
    }
}

impl StateRecord {
    /// Short human-readable summary used by `state show` and plan output
    pub fn summary(&self) -> String {
        match self {
            Self::Association(rec) => match rec.to_state() {
                Ok(state) => association::import_key(&state),
                Err(_) => format!("{}/{}", rec.portfolio_id, rec.product_id),
            },
            Self::Artifact(rec) => format!("{} ({}, {})", rec.id, rec.spec.name, rec.status),
        }
    }
}

// ============================================================================
// CatalinkState Implementation
// ============================================================================

impl CatalinkState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save_to(path)
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty() && self.artifacts.is_empty()
    }

    /// Look up the record of a resource
    pub fn get(&self, resource_type: ResourceType, name: &str) -> Option<StateRecord> {
        match resource_type {
            ResourceType::Association => self
                .associations
                .get(name)
                .cloned()
                .map(StateRecord::Association),
            ResourceType::Artifact => self.artifacts.get(name).cloned().map(StateRecord::Artifact),
        }
    }

    /// Names of every recorded resource of a type, sorted
    pub fn names(&self, resource_type: ResourceType) -> Vec<String> {
        match resource_type {
            ResourceType::Association => self.associations.keys().cloned().collect(),
            ResourceType::Artifact => self.artifacts.keys().cloned().collect(),
        }
    }

    /// Apply the outcome of a resource operation
    pub fn apply_change(&mut self, resource_type: ResourceType, name: &str, change: RecordChange) {
        match change {
            RecordChange::Keep => {}
            RecordChange::Set(StateRecord::Association(rec)) => {
                self.associations.insert(name.to_string(), rec);
            }
            RecordChange::Set(StateRecord::Artifact(rec)) => {
                self.artifacts.insert(name.to_string(), rec);
            }
            RecordChange::Remove => match resource_type {
                ResourceType::Association => {
                    self.associations.remove(name);
                }
                ResourceType::Artifact => {
                    self.artifacts.remove(name);
                }
            },
        }
    }
}

impl Default for CatalinkState {
    fn default() -> Self {
        Self {
            associations: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
