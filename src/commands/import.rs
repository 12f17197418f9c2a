//! Adopt resources that already exist in the catalog

use anyhow::{Context as AnyhowContext, Result, bail};
use association::{EntityRef, Membership};
use convergence::OperationHandle;

use super::Session;
use crate::Context;
use crate::remote::ArtifactClient;
use crate::schema::check_name;
use crate::state::{
    ArtifactRecord, AssociationRecord, CatalinkState, RecordChange, ResourceType, StateRecord,
};
use crate::ui;

/// `catalink import association <name> <key>`
pub fn association(ctx: &Context, name: &str, key: &str) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut state = session.load_state()?;

    let record = import_association(&session, &mut state, name, key)?;
    state.touch(&session.state_path)?;

    ui::success(&format!(
        "Imported association.{name} ({} ↔ {})",
        record.product_id, record.portfolio_id
    ));
    Ok(())
}

/// `catalink import artifact <name> <product-id> <artifact-id>`
pub fn artifact(ctx: &Context, name: &str, product_id: &str, artifact_id: &str) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut state = session.load_state()?;

    let record = import_artifact(&session, &mut state, name, product_id, artifact_id)?;
    state.touch(&session.state_path)?;

    ui::success(&format!(
        "Imported artifact.{name} ({}, {})",
        record.id, record.status
    ));
    Ok(())
}

fn ensure_unrecorded(state: &CatalinkState, resource_type: ResourceType, name: &str) -> Result<()> {
    check_name(name)?;
    if state.get(resource_type, name).is_some() {
        bail!("{resource_type}.{name} is already recorded in state");
    }
    Ok(())
}

fn import_association(
    session: &Session,
    state: &mut CatalinkState,
    name: &str,
    key: &str,
) -> Result<AssociationRecord> {
    ensure_unrecorded(state, ResourceType::Association, name)?;

    let imported = association::parse_import_key(key)?;
    let membership = association::refresh(session.clients.relationships.as_ref(), &imported.state)
        .with_context(|| format!("Failed to verify association {key}"))?;
    if membership == Membership::Absent {
        bail!(
            "Product {} is not associated with portfolio {}",
            imported.state.secondary,
            imported.state.primary
        );
    }

    let record = AssociationRecord::new(&imported.state, &imported.identity);
    state.apply_change(
        ResourceType::Association,
        name,
        RecordChange::Set(StateRecord::Association(record.clone())),
    );
    log::debug!("Imported association.{name} as {}", imported.identity);
    Ok(record)
}

fn import_artifact(
    session: &Session,
    state: &mut CatalinkState,
    name: &str,
    product_id: &str,
    artifact_id: &str,
) -> Result<ArtifactRecord> {
    ensure_unrecorded(state, ResourceType::Artifact, name)?;

    let product = EntityRef::product(product_id)?;
    let handle = OperationHandle::new(artifact_id, product.id());
    let artifacts = session.clients.artifacts.as_ref();
    let Some(observation) = ArtifactClient::describe_artifact(artifacts, &handle)
        .with_context(|| format!("Failed to describe artifact {artifact_id}"))?
    else {
        bail!("Artifact {artifact_id} not found under product {product}");
    };

    let record = ArtifactRecord::from_detail(&observation.payload, observation.status);
    state.apply_change(
        ResourceType::Artifact,
        name,
        RecordChange::Set(StateRecord::Artifact(record.clone())),
    );
    log::debug!("Imported artifact.{name} ({artifact_id})");
    Ok(record)
}
