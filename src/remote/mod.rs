//! Remote catalog collaborators
//!
//! The reconciler never talks to a catalog directly. It is handed two
//! clients: [`association::RelationshipClient`] for portfolio memberships and
//! [`ArtifactClient`] for provisioning artifacts. The only implementation
//! shipped here is the file-backed [`local::LocalCatalog`].

pub mod local;

use anyhow::Result;
use association::{EntityRef, RelationshipClient};
use chrono::{DateTime, Utc};
use convergence::{Observation, OperationHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of template a provisioning artifact is built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    #[default]
    CloudFormationTemplate,
    MarketplaceAmi,
    MarketplaceCar,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudFormationTemplate => "CLOUD_FORMATION_TEMPLATE",
            Self::MarketplaceAmi => "MARKETPLACE_AMI",
            Self::MarketplaceCar => "MARKETPLACE_CAR",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning status reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Creating,
    Available,
    Failed,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "CREATING",
            Self::Available => "AVAILABLE",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Desired attributes of a provisioning artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub artifact_type: ArtifactType,
    pub template_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// An artifact as the catalog describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetail {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub artifact_type: ArtifactType,
    pub template_url: String,
    pub active: bool,
    pub created_time: DateTime<Utc>,
}

impl ArtifactDetail {
    /// The attributes of this artifact that a manifest can declare
    pub fn spec(&self) -> ArtifactSpec {
        ArtifactSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            artifact_type: self.artifact_type,
            template_url: self.template_url.clone(),
            active: self.active,
        }
    }
}

pub type ArtifactObservation = Observation<ArtifactStatus, ArtifactDetail>;

/// Provisioning artifact operations offered by a catalog
pub trait ArtifactClient: Send + Sync {
    /// Start creating an artifact under `product`
    ///
    /// Returns before the artifact is usable. Calling again with the same
    /// `idempotency_token` returns the handle of the artifact already created.
    fn create_artifact(
        &self,
        product: &EntityRef,
        spec: &ArtifactSpec,
        idempotency_token: &str,
    ) -> Result<OperationHandle>;

    /// Describe an artifact; `None` when the catalog does not know it
    fn describe_artifact(&self, handle: &OperationHandle) -> Result<Option<ArtifactObservation>>;

    /// Change the attributes that do not require a new artifact
    fn update_artifact(&self, handle: &OperationHandle, description: &str, active: bool)
    -> Result<()>;

    /// Delete an artifact
    fn delete_artifact(&self, handle: &OperationHandle) -> Result<()>;
}

/// The clients every resource is built with
#[derive(Clone)]
pub struct Clients {
    pub relationships: Arc<dyn RelationshipClient>,
    pub artifacts: Arc<dyn ArtifactClient>,
}

impl Clients {
    /// Use one backend for both collaborators
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RelationshipClient + ArtifactClient + 'static,
    {
        Self {
            relationships: backend.clone(),
            artifacts: backend,
        }
    }
}

impl fmt::Debug for Clients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clients").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_spec_defaults() {
        let spec: ArtifactSpec = toml::from_str(
            r#"
            name = "v1"
            template_url = "https://example.com/template.yaml"
            "#,
        )
        .unwrap();
        assert_eq!(spec.artifact_type, ArtifactType::CloudFormationTemplate);
        assert!(spec.active);
        assert!(spec.description.is_empty());
    }

    #[test]
    fn test_artifact_type_wire_names() {
        let spec: ArtifactSpec = toml::from_str(
            r#"
            name = "ami"
            type = "MARKETPLACE_AMI"
            template_url = "https://example.com/ami"
            active = false
            "#,
        )
        .unwrap();
        assert_eq!(spec.artifact_type, ArtifactType::MarketplaceAmi);
        assert_eq!(spec.artifact_type.to_string(), "MARKETPLACE_AMI");
        assert!(!spec.active);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ArtifactStatus::Creating.to_string(), "CREATING");
        assert_eq!(
            serde_json::to_string(&ArtifactStatus::Available).unwrap(),
            "\"AVAILABLE\""
        );
    }
}
