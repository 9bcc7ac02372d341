//! Destination bootstrapper: make sure the target container exists before
//! anything is listed from or written into it.

use crate::{
    errors::MigrationResult,
    providers::{
        blob::{BlobSession, ContainerCreation},
        session::Session,
    },
};
use tracing::{debug, info};

/// Create the container if it is missing. Safe to call any number of times,
/// concurrently included: "already exists" counts as success.
pub async fn ensure_container(blob: &BlobSession) -> MigrationResult<()> {
    match blob.create_container().await? {
        ContainerCreation::Created => {
            info!(container = %blob.container(), "created destination container")
        }
        ContainerCreation::AlreadyExists => {
            debug!(container = %blob.container(), "destination container already exists")
        }
    }
    Ok(())
}

/// Resolve the destination slot and bootstrap it. An unconfigured slot fails
/// with a configuration error before any network I/O.
pub async fn ensure_configured_container(
    slot: &Session<BlobSession>,
) -> MigrationResult<&BlobSession> {
    let blob = slot.get()?;
    ensure_container(blob).await?;
    Ok(blob)
}
