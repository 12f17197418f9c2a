//! File-backed catalog for local use and tests
//!
//! Everything lives in one JSON document. Each call loads the document,
//! applies its change and writes it back while holding a mutex, so parallel
//! workers sharing one `LocalCatalog` see a consistent file.

use super::{ArtifactClient, ArtifactDetail, ArtifactObservation, ArtifactSpec, ArtifactStatus};
use anyhow::{Context, Result, bail};
use association::{EntityRef, RelationshipClient};
use chrono::{DateTime, Utc};
use convergence::{Observation, OperationHandle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Length of the generated part of an identifier
const ID_SUFFIX_LEN: usize = 13;

// ============================================================================
// Stored Document
// ============================================================================

/// Contents of the catalog file
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub portfolios: BTreeMap<String, PortfolioEntry>,
    #[serde(default)]
    pub products: BTreeMap<String, ProductEntry>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub name: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub created_time: DateTime<Utc>,
    /// Portfolios this product is a member of
    #[serde(default)]
    pub portfolios: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub detail: ArtifactDetail,
    pub status: ArtifactStatus,
    /// Describe calls left before provisioning settles
    pub pending_polls: u32,
    pub idempotency_token: String,
}

impl CatalogData {
    fn product_mut(&mut self, product: &EntityRef) -> Result<&mut ProductEntry> {
        self.products
            .get_mut(product.id())
            .with_context(|| format!("ResourceNotFound: product {product} does not exist"))
    }

    fn require_portfolio(&self, portfolio: &EntityRef) -> Result<()> {
        if self.portfolios.contains_key(portfolio.id()) {
            Ok(())
        } else {
            bail!("ResourceNotFound: portfolio {portfolio} does not exist")
        }
    }

    fn artifact_mut(&mut self, handle: &OperationHandle) -> Option<&mut ArtifactEntry> {
        self.artifacts
            .get_mut(&handle.id)
            .filter(|entry| entry.detail.product_id == handle.parent_id)
    }
}

// ============================================================================
// LocalCatalog
// ============================================================================

/// Catalog backend stored in a JSON file
#[derive(Debug)]
pub struct LocalCatalog {
    path: PathBuf,
    provisioning_polls: u32,
    lock: Mutex<()>,
}

impl LocalCatalog {
    /// Open (or lazily create) the catalog at `path`
    ///
    /// New artifacts report `CREATING` for `provisioning_polls` describe
    /// calls before settling.
    pub fn open(path: impl Into<PathBuf>, provisioning_polls: u32) -> Self {
        Self {
            path: path.into(),
            provisioning_polls,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole catalog
    pub fn snapshot(&self) -> Result<CatalogData> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    /// Register a new portfolio
    pub fn add_portfolio(&self, name: &str) -> Result<EntityRef> {
        self.update(|data| {
            let id = generate_id("port-", name, data.portfolios.len());
            data.portfolios.insert(
                id.clone(),
                PortfolioEntry {
                    name: name.to_string(),
                    created_time: Utc::now(),
                },
            );
            log::debug!("Created portfolio {id} ({name})");
            Ok(EntityRef::portfolio(&id)?)
        })
    }

    /// Register a new product
    pub fn add_product(&self, name: &str) -> Result<EntityRef> {
        self.update(|data| {
            let id = generate_id("prod-", name, data.products.len());
            data.products.insert(
                id.clone(),
                ProductEntry {
                    name: name.to_string(),
                    created_time: Utc::now(),
                    portfolios: BTreeSet::new(),
                },
            );
            log::debug!("Created product {id} ({name})");
            Ok(EntityRef::product(&id)?)
        })
    }

    fn read(&self) -> Result<CatalogData> {
        if !self.path.exists() {
            log::debug!("Catalog {} does not exist yet", self.path.display());
            return Ok(CatalogData::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read catalog: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {}", self.path.display()))
    }

    fn write(&self, data: &CatalogData) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(data).context("Failed to serialize catalog")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write catalog: {}", self.path.display()))
    }

    /// Load, modify and store the catalog under the lock
    ///
    /// Nothing is written when `change` fails.
    fn update<R>(&self, change: impl FnOnce(&mut CatalogData) -> Result<R>) -> Result<R> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.read()?;
        let result = change(&mut data)?;
        self.write(&data)?;
        Ok(result)
    }
}

/// Derive a fresh identifier with the given prefix
fn generate_id(prefix: &str, name: &str, salt: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&salt.to_le_bytes());
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    hasher.update(&nanos.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{prefix}{}", &hex.as_str()[..ID_SUFFIX_LEN])
}

// ============================================================================
// Collaborator Implementations
// ============================================================================

impl RelationshipClient for LocalCatalog {
    fn associate(
        &self,
        primary: &EntityRef,
        secondary: &EntityRef,
        source: Option<&EntityRef>,
    ) -> Result<()> {
        self.update(|data| {
            data.require_portfolio(primary)?;
            if let Some(source) = source {
                data.require_portfolio(source)?;
            }

            let product = data.product_mut(secondary)?;
            if let Some(source) = source
                && !product.portfolios.contains(source.id())
            {
                bail!("InvalidParameters: product {secondary} is not shared from portfolio {source}");
            }

            if !product.portfolios.insert(primary.id().to_string()) {
                log::debug!("Product {secondary} already in portfolio {primary}");
            }
            Ok(())
        })
    }

    fn disassociate(&self, primary: &EntityRef, secondary: &EntityRef) -> Result<()> {
        self.update(|data| {
            let product = data.product_mut(secondary)?;
            if !product.portfolios.remove(primary.id()) {
                bail!("ResourceNotFound: product {secondary} is not associated with portfolio {primary}");
            }
            Ok(())
        })
    }

    fn list_members(&self, secondary: &EntityRef) -> Result<Vec<EntityRef>> {
        let data = self.snapshot()?;
        let Some(product) = data.products.get(secondary.id()) else {
            log::debug!("Product {secondary} does not exist, it has no portfolios");
            return Ok(Vec::new());
        };

        product
            .portfolios
            .iter()
            .map(|id| EntityRef::portfolio(id).map_err(anyhow::Error::from))
            .collect()
    }
}

impl ArtifactClient for LocalCatalog {
    fn create_artifact(
        &self,
        product: &EntityRef,
        spec: &ArtifactSpec,
        idempotency_token: &str,
    ) -> Result<OperationHandle> {
        let polls = self.provisioning_polls;
        self.update(|data| {
            data.product_mut(product)?;

            if let Some((id, _)) = data.artifacts.iter().find(|(_, entry)| {
                entry.idempotency_token == idempotency_token
                    && entry.detail.product_id == product.id()
            }) {
                log::debug!("Idempotency token {idempotency_token} already used by {id}");
                return Ok(OperationHandle::new(id.clone(), product.id()));
            }

            let id = generate_id("pa-", &spec.name, data.artifacts.len());
            let detail = ArtifactDetail {
                id: id.clone(),
                product_id: product.id().to_string(),
                name: spec.name.clone(),
                description: spec.description.clone(),
                artifact_type: spec.artifact_type,
                template_url: spec.template_url.clone(),
                active: spec.active,
                created_time: Utc::now(),
            };
            data.artifacts.insert(
                id.clone(),
                ArtifactEntry {
                    detail,
                    status: ArtifactStatus::Creating,
                    pending_polls: polls,
                    idempotency_token: idempotency_token.to_string(),
                },
            );
            Ok(OperationHandle::new(id, product.id()))
        })
    }

    fn describe_artifact(&self, handle: &OperationHandle) -> Result<Option<ArtifactObservation>> {
        self.update(|data| {
            let Some(entry) = data.artifact_mut(handle) else {
                return Ok(None);
            };

            if entry.status == ArtifactStatus::Creating {
                if entry.pending_polls > 0 {
                    entry.pending_polls -= 1;
                } else if entry.detail.template_url.starts_with("https://") {
                    entry.status = ArtifactStatus::Available;
                } else {
                    entry.status = ArtifactStatus::Failed;
                }
            }

            Ok(Some(Observation::new(entry.status, entry.detail.clone())))
        })
    }

    fn update_artifact(
        &self,
        handle: &OperationHandle,
        description: &str,
        active: bool,
    ) -> Result<()> {
        self.update(|data| {
            let entry = data
                .artifact_mut(handle)
                .with_context(|| format!("ResourceNotFound: artifact {handle} does not exist"))?;
            entry.detail.description = description.to_string();
            entry.detail.active = active;
            Ok(())
        })
    }

    fn delete_artifact(&self, handle: &OperationHandle) -> Result<()> {
        self.update(|data| {
            if data.artifact_mut(handle).is_none() {
                bail!("ResourceNotFound: artifact {handle} does not exist");
            }
            data.artifacts.remove(&handle.id);
            Ok(())
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ArtifactType;
    use convergence::{CancelToken, WaitConfig, WaitTarget, wait_for};
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_catalog(polls: u32) -> (TempDir, LocalCatalog) {
        let dir = TempDir::new().unwrap();
        let catalog = LocalCatalog::open(dir.path().join("catalog.json"), polls);
        (dir, catalog)
    }

    fn spec(url: &str) -> ArtifactSpec {
        ArtifactSpec {
            name: "v1".into(),
            description: "first".into(),
            artifact_type: ArtifactType::CloudFormationTemplate,
            template_url: url.into(),
            active: true,
        }
    }

    #[test]
    fn test_generated_ids_are_valid_references() {
        let (_dir, catalog) = open_catalog(0);
        let portfolio = catalog.add_portfolio("Engineering").unwrap();
        let product = catalog.add_product("Web app").unwrap();
        assert!(portfolio.id().starts_with("port-"));
        assert!(product.id().starts_with("prod-"));
        assert_ne!(
            catalog.add_portfolio("Engineering").unwrap(),
            portfolio,
            "same name must not reuse the id"
        );
    }

    #[test]
    fn test_associate_list_disassociate() {
        let (_dir, catalog) = open_catalog(0);
        let portfolio = catalog.add_portfolio("eng").unwrap();
        let product = catalog.add_product("web").unwrap();

        catalog.associate(&portfolio, &product, None).unwrap();
        assert_eq!(catalog.list_members(&product).unwrap(), vec![portfolio.clone()]);

        catalog.disassociate(&portfolio, &product).unwrap();
        assert!(catalog.list_members(&product).unwrap().is_empty());
    }

    #[test]
    fn test_disassociate_missing_edge_fails() {
        let (_dir, catalog) = open_catalog(0);
        let portfolio = catalog.add_portfolio("eng").unwrap();
        let product = catalog.add_product("web").unwrap();

        let err = catalog.disassociate(&portfolio, &product).unwrap_err();
        assert!(err.to_string().contains("not associated"));
    }

    #[test]
    fn test_unknown_entities_are_not_found() {
        let (_dir, catalog) = open_catalog(0);
        let product = catalog.add_product("web").unwrap();
        let ghost = EntityRef::portfolio("port-doesnotexist").unwrap();

        let err = catalog.associate(&ghost, &product, None).unwrap_err();
        assert!(err.to_string().contains("ResourceNotFound"));

        let unknown_product = EntityRef::product("prod-doesnotexist").unwrap();
        assert!(catalog.list_members(&unknown_product).unwrap().is_empty());
    }

    #[test]
    fn test_associate_requires_share_from_source() {
        let (_dir, catalog) = open_catalog(0);
        let source = catalog.add_portfolio("hub").unwrap();
        let target = catalog.add_portfolio("spoke").unwrap();
        let product = catalog.add_product("web").unwrap();

        assert!(catalog.associate(&target, &product, Some(&source)).is_err());

        catalog.associate(&source, &product, None).unwrap();
        catalog.associate(&target, &product, Some(&source)).unwrap();
        assert_eq!(catalog.list_members(&product).unwrap().len(), 2);
    }

    #[test]
    fn test_artifact_settles_after_configured_polls() {
        let (_dir, catalog) = open_catalog(2);
        let product = catalog.add_product("web").unwrap();
        let handle = catalog
            .create_artifact(&product, &spec("https://example.com/t.yaml"), "token-1")
            .unwrap();

        let statuses: Vec<_> = (0..3)
            .map(|_| catalog.describe_artifact(&handle).unwrap().unwrap().status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ArtifactStatus::Creating,
                ArtifactStatus::Creating,
                ArtifactStatus::Available
            ]
        );
    }

    #[test]
    fn test_non_https_template_fails() {
        let (_dir, catalog) = open_catalog(0);
        let product = catalog.add_product("web").unwrap();
        let handle = catalog
            .create_artifact(&product, &spec("http://example.com/t.yaml"), "token-1")
            .unwrap();

        let observation = catalog.describe_artifact(&handle).unwrap().unwrap();
        assert_eq!(observation.status, ArtifactStatus::Failed);
    }

    #[test]
    fn test_create_is_idempotent_per_token() {
        let (_dir, catalog) = open_catalog(0);
        let product = catalog.add_product("web").unwrap();
        let url = "https://example.com/t.yaml";

        let first = catalog.create_artifact(&product, &spec(url), "same").unwrap();
        let again = catalog.create_artifact(&product, &spec(url), "same").unwrap();
        let other = catalog.create_artifact(&product, &spec(url), "other").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(catalog.snapshot().unwrap().artifacts.len(), 2);
    }

    #[test]
    fn test_update_and_delete_artifact() {
        let (_dir, catalog) = open_catalog(0);
        let product = catalog.add_product("web").unwrap();
        let handle = catalog
            .create_artifact(&product, &spec("https://example.com/t.yaml"), "t")
            .unwrap();

        catalog.update_artifact(&handle, "second", false).unwrap();
        let detail = catalog.describe_artifact(&handle).unwrap().unwrap().payload;
        assert_eq!(detail.description, "second");
        assert!(!detail.active);

        catalog.delete_artifact(&handle).unwrap();
        assert!(catalog.describe_artifact(&handle).unwrap().is_none());
        assert!(catalog.delete_artifact(&handle).is_err());
    }

    #[test]
    fn test_describe_under_wrong_parent_is_not_found() {
        let (_dir, catalog) = open_catalog(0);
        let product = catalog.add_product("web").unwrap();
        let handle = catalog
            .create_artifact(&product, &spec("https://example.com/t.yaml"), "t")
            .unwrap();

        let wrong = OperationHandle::new(handle.id.clone(), "prod-other");
        assert!(catalog.describe_artifact(&wrong).unwrap().is_none());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.json");
        let product = LocalCatalog::open(&path, 0).add_product("web").unwrap();

        let reopened = LocalCatalog::open(&path, 0);
        let data = reopened.snapshot().unwrap();
        assert_eq!(data.products[product.id()].name, "web");
    }

    #[test]
    fn test_wait_for_reaches_available() {
        let (_dir, catalog) = open_catalog(2);
        let product = catalog.add_product("web").unwrap();
        let handle = catalog
            .create_artifact(&product, &spec("https://example.com/t.yaml"), "t")
            .unwrap();

        let observation = wait_for(
            "artifact",
            || -> Result<ArtifactObservation> {
                catalog
                    .describe_artifact(&handle)?
                    .context("artifact disappeared")
            },
            &WaitTarget::new([ArtifactStatus::Available], [ArtifactStatus::Failed]),
            &WaitConfig::new(Duration::from_millis(1), Duration::from_secs(5)),
            &CancelToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(observation.payload.id, handle.id);
    }
}
