use anyhow::{Context, Result, bail};
use association::{AssociationState, EntityRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::remote::ArtifactSpec;

/// Default manifest file name, resolved against the working directory
pub const DEFAULT_MANIFEST: &str = "catalink.toml";

static RESOURCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("resource name pattern is valid")
});

// ============================================================================
// Manifest Schema
// ============================================================================

/// The desired catalog configuration
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Product memberships keyed by resource name
    #[serde(default)]
    pub associations: BTreeMap<String, AssociationDecl>,

    /// Provisioning artifacts keyed by resource name
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactDecl>,
}

/// `[associations.<name>]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AssociationDecl {
    pub portfolio_id: String,
    pub product_id: String,
    /// Portfolio the product is shared from, only used on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_portfolio_id: Option<String>,
}

/// `[artifacts.<name>]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactDecl {
    pub product_id: String,
    #[serde(flatten)]
    pub spec: ArtifactSpec,
}

impl AssociationDecl {
    pub fn to_state(&self) -> association::Result<AssociationState> {
        AssociationState::from_ids(
            &self.portfolio_id,
            &self.product_id,
            self.source_portfolio_id.as_deref(),
        )
    }
}

impl ArtifactDecl {
    pub fn product(&self) -> association::Result<EntityRef> {
        EntityRef::product(&self.product_id)
    }
}

impl Manifest {
    /// Load and validate a manifest
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;

        let manifest: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in manifest: {}", path.display()))?;

        manifest
            .validate()
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;

        log::debug!(
            "Loaded manifest {} ({} associations, {} artifacts)",
            path.display(),
            manifest.associations.len(),
            manifest.artifacts.len()
        );
        Ok(manifest)
    }

    /// Check resource names and entity ids before any remote call
    pub fn validate(&self) -> Result<()> {
        for (name, decl) in &self.associations {
            check_name(name)?;
            decl.to_state()
                .with_context(|| format!("associations.{name}"))?;
        }

        for (name, decl) in &self.artifacts {
            check_name(name)?;
            decl.product()
                .with_context(|| format!("artifacts.{name}"))?;
            if decl.spec.name.trim().is_empty() {
                bail!("artifacts.{name}: name must not be empty");
            }
            if decl.spec.template_url.trim().is_empty() {
                bail!("artifacts.{name}: template_url must not be empty");
            }
        }

        Ok(())
    }
}

/// Resource names become state keys and target addresses
pub fn check_name(name: &str) -> Result<()> {
    if RESOURCE_NAME.is_match(name) {
        Ok(())
    } else {
        bail!("invalid resource name {name:?}: use letters, digits, '-' or '_'")
    }
}

// ============================================================================
// Tests
// ============================================================================
