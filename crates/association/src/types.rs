//! Core types for association reconciliation

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static ID_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("entity id suffix pattern is valid"));

/// Kind of catalog entity an identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Portfolio,
    Product,
}

impl EntityKind {
    /// Required identifier prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Portfolio => "port-",
            Self::Product => "prod-",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Portfolio => "portfolio",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated reference to a remote catalog entity
///
/// Identifiers are normalized to lower case; the remote system compares
/// them case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntityRef", into = "RawEntityRef")]
pub struct EntityRef {
    kind: EntityKind,
    id: String,
}

#[derive(Serialize, Deserialize)]
struct RawEntityRef {
    kind: EntityKind,
    id: String,
}

impl TryFrom<RawEntityRef> for EntityRef {
    type Error = Error;

    fn try_from(raw: RawEntityRef) -> Result<Self> {
        Self::parse(raw.kind, &raw.id)
    }
}

impl From<EntityRef> for RawEntityRef {
    fn from(entity: EntityRef) -> Self {
        Self {
            kind: entity.kind,
            id: entity.id,
        }
    }
}

impl EntityRef {
    /// Parse and validate an identifier of the given kind
    pub fn parse(kind: EntityKind, raw: &str) -> Result<Self> {
        let id = raw.trim().to_lowercase();
        let invalid = |reason: &str| Error::InvalidEntityReference {
            kind,
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(invalid("identifier is empty"));
        }

        let Some(suffix) = id.strip_prefix(kind.prefix()) else {
            return Err(invalid(&format!("expected prefix {:?}", kind.prefix())));
        };

        if !ID_SUFFIX.is_match(suffix) {
            return Err(invalid(&format!(
                "expected lower-case letters or digits after {:?}",
                kind.prefix()
            )));
        }

        Ok(Self { kind, id })
    }

    pub fn portfolio(raw: &str) -> Result<Self> {
        Self::parse(EntityKind::Portfolio, raw)
    }

    pub fn product(raw: &str) -> Result<Self> {
        Self::parse(EntityKind::Product, raw)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// The relationship owned by a single association resource
///
/// `primary` is always a portfolio and `secondary` always a product.
/// `source` is only consulted when the association is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationState {
    pub primary: EntityRef,
    pub secondary: EntityRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EntityRef>,
}

impl AssociationState {
    /// Create a state from already validated references
    pub fn new(primary: EntityRef, secondary: EntityRef) -> Result<Self> {
        expect_kind(&primary, EntityKind::Portfolio)?;
        expect_kind(&secondary, EntityKind::Product)?;
        Ok(Self {
            primary,
            secondary,
            source: None,
        })
    }

    /// Parse a state from raw identifier strings
    pub fn from_ids(portfolio_id: &str, product_id: &str, source_id: Option<&str>) -> Result<Self> {
        let state = Self::new(
            EntityRef::portfolio(portfolio_id)?,
            EntityRef::product(product_id)?,
        )?;
        match source_id {
            Some(source) => state.with_source(EntityRef::portfolio(source)?),
            None => Ok(state),
        }
    }

    /// Set the portfolio the product is shared from on creation
    pub fn with_source(mut self, source: EntityRef) -> Result<Self> {
        expect_kind(&source, EntityKind::Portfolio)?;
        self.source = Some(source);
        Ok(self)
    }

    /// Whether both states connect the same pair of entities
    pub fn same_pair(&self, other: &Self) -> bool {
        self.primary == other.primary && self.secondary == other.secondary
    }

    /// `portfolio/product` label used in messages
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.primary, self.secondary)
    }
}

fn expect_kind(entity: &EntityRef, kind: EntityKind) -> Result<()> {
    if entity.kind == kind {
        Ok(())
    } else {
        Err(Error::InvalidEntityReference {
            kind,
            value: entity.id.clone(),
            reason: format!("refers to a {}", entity.kind),
        })
    }
}

/// Opaque stable identity of an association
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipIdentity(String);

impl RelationshipIdentity {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    /// Wrap an identity loaded from persisted state
    pub fn from_recorded(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote operation class implied by a configuration change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Nothing to do
    NoOp,
    /// Nothing recorded yet; associate the pair
    Create,
    /// Endpoint changed; disassociate the old pair, then associate the new one
    Replace,
    /// Same pair, safe to re-issue the create call
    InPlaceUpdate,
    /// No longer desired; disassociate the recorded pair
    Destroy,
}

impl Operation {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    /// Single-character marker used when rendering plans
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoOp => " ",
            Self::Create => "+",
            Self::Replace => "-/+",
            Self::InPlaceUpdate => "~",
            Self::Destroy => "-",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Replace => "replace",
            Self::InPlaceUpdate => "update in place",
            Self::Destroy => "destroy",
        };
        f.write_str(label)
    }
}

/// Whether the desired association exists in the remote membership listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Membership {
    Present,
    Absent,
}

impl Membership {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_normalizes_case() {
        let port = EntityRef::portfolio("PORT-IG54MBJEW7QRU").unwrap();
        assert_eq!(port.id(), "port-ig54mbjew7qru");
        assert_eq!(port.kind(), EntityKind::Portfolio);
    }

    #[test]
    fn test_entity_ref_rejects_wrong_prefix() {
        let err = EntityRef::portfolio("prod-abc").unwrap_err();
        assert!(matches!(err, Error::InvalidEntityReference { .. }));
        assert!(err.to_string().contains("prod-abc"));
    }

    #[test]
    fn test_entity_ref_rejects_empty_and_bare_prefix() {
        assert!(EntityRef::product("").is_err());
        assert!(EntityRef::product("   ").is_err());
        assert!(EntityRef::product("prod-").is_err());
        assert!(EntityRef::product("prod-has space").is_err());
    }

    #[test]
    fn test_association_kinds_enforced() {
        let port = EntityRef::portfolio("port-a1").unwrap();
        let prod = EntityRef::product("prod-b2").unwrap();
        assert!(AssociationState::new(prod.clone(), port.clone()).is_err());

        let state = AssociationState::new(port.clone(), prod.clone()).unwrap();
        assert!(state.clone().with_source(prod).is_err());
        assert!(state.with_source(port).is_ok());
    }

    #[test]
    fn test_from_ids_with_source() {
        let state = AssociationState::from_ids("port-a1", "prod-b2", Some("port-c3")).unwrap();
        assert_eq!(state.source.as_ref().map(EntityRef::id), Some("port-c3"));
        assert_eq!(state.pair_label(), "port-a1/prod-b2");
    }

    #[test]
    fn test_entity_ref_deserialize_validates() {
        let ok: EntityRef =
            serde_json::from_str(r#"{"kind":"product","id":"PROD-XYZ"}"#).unwrap();
        assert_eq!(ok.id(), "prod-xyz");

        let bad = serde_json::from_str::<EntityRef>(r#"{"kind":"product","id":"port-xyz"}"#);
        assert!(bad.is_err());
    }
}
