//! Build the resource set for a run

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;

use crate::remote::Clients;
use crate::resource::{ArtifactResource, AssociationResource, Resource};
use crate::schema::Manifest;
use crate::state::{CatalinkState, ResourceType};

/// Resource filter parsed from a `type` or `type.name` argument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub resource_type: Option<ResourceType>,
    pub name: Option<String>,
}

impl Target {
    /// Matches every resource
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, resource_type: ResourceType, name: &str) -> bool {
        self.resource_type.is_none_or(|t| t == resource_type)
            && self.name.as_deref().is_none_or(|n| n == name)
    }
}

/// Parse a target string like "association.web" or "artifacts"
pub fn parse_target(target: &str) -> Result<Target> {
    let (kind, name) = match target.split_once('.') {
        Some((kind, name)) => (kind, Some(name)),
        None => (target, None),
    };

    let Some(resource_type) = ResourceType::parse(kind) else {
        bail!("Unknown resource type '{kind}' in target '{target}' (expected association or artifact)");
    };

    if name.is_some_and(str::is_empty) {
        bail!("Empty resource name in target '{target}'");
    }

    Ok(Target {
        resource_type: Some(resource_type),
        name: name.map(str::to_string),
    })
}

/// One resource per name found in the manifest or the state, filtered
///
/// Names only in the manifest are created, names only in the state are
/// destroyed, names in both are compared.
pub fn build_resources(
    manifest: &Manifest,
    state: &CatalinkState,
    clients: &Clients,
    target: &Target,
) -> Result<Vec<Box<dyn Resource>>> {
    let mut resources: Vec<Box<dyn Resource>> = Vec::new();

    let names: BTreeSet<&String> = manifest
        .associations
        .keys()
        .chain(state.associations.keys())
        .collect();
    for name in names {
        if !target.matches(ResourceType::Association, name) {
            continue;
        }
        let desired = manifest
            .associations
            .get(name)
            .map(|decl| decl.to_state())
            .transpose()
            .with_context(|| format!("associations.{name}"))?;
        resources.push(Box::new(AssociationResource::new(
            name.clone(),
            state.associations.get(name).cloned(),
            desired,
            clients.relationships.clone(),
        )));
    }

    let names: BTreeSet<&String> = manifest
        .artifacts
        .keys()
        .chain(state.artifacts.keys())
        .collect();
    for name in names {
        if !target.matches(ResourceType::Artifact, name) {
            continue;
        }
        resources.push(Box::new(ArtifactResource::new(
            name.clone(),
            state.artifacts.get(name).cloned(),
            manifest.artifacts.get(name).cloned(),
            clients.artifacts.clone(),
        )));
    }

    log::debug!("Built {} resource(s) for target {target:?}", resources.len());
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::local::LocalCatalog;
    use crate::schema::AssociationDecl;
    use crate::state::AssociationRecord;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("associations").unwrap(),
            Target {
                resource_type: Some(ResourceType::Association),
                name: None,
            }
        );
        assert_eq!(
            parse_target("artifact.web-v1").unwrap(),
            Target {
                resource_type: Some(ResourceType::Artifact),
                name: Some("web-v1".into()),
            }
        );
        assert!(parse_target("product.web").is_err());
        assert!(parse_target("association.").is_err());
    }

    #[test]
    fn test_target_matches() {
        let target = parse_target("association.web").unwrap();
        assert!(target.matches(ResourceType::Association, "web"));
        assert!(!target.matches(ResourceType::Association, "api"));
        assert!(!target.matches(ResourceType::Artifact, "web"));
        assert!(Target::all().matches(ResourceType::Artifact, "anything"));
    }

    #[test]
    fn test_union_of_manifest_and_state() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(LocalCatalog::open(dir.path().join("catalog.json"), 0));
        let clients = Clients::from_backend(catalog);

        let mut manifest = Manifest::default();
        manifest.associations.insert(
            "web".into(),
            AssociationDecl {
                portfolio_id: "port-a".into(),
                product_id: "prod-b".into(),
                source_portfolio_id: None,
            },
        );

        let mut state = CatalinkState::default();
        state.associations.insert(
            "old".into(),
            AssociationRecord {
                portfolio_id: "port-a".into(),
                product_id: "prod-c".into(),
                source_portfolio_id: None,
                identity: "product-portfolio-0000000000000000".into(),
            },
        );

        let resources = build_resources(&manifest, &state, &clients, &Target::all()).unwrap();
        let addresses: Vec<String> = resources.iter().map(|r| r.address()).collect();
        assert_eq!(addresses, vec!["association.old", "association.web"]);

        let only_web = parse_target("association.web").unwrap();
        let filtered = build_resources(&manifest, &state, &clients, &only_web).unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
