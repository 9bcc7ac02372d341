//! Listing normalizer: query either provider and project what it reports
//! into [`ObjectDescriptor`]s.

use super::bootstrap::ensure_container;
use crate::{
    errors::MigrationResult,
    models::descriptor::ObjectDescriptor,
    providers::{Provider, blob::BlobItem, drive::DriveFile},
};
use tracing::debug;

/// Materialize the provider's object set.
///
/// The source returns a single bounded page. The destination is bootstrapped
/// first and then enumerated completely.
pub async fn list(provider: Provider<'_>) -> MigrationResult<Vec<ObjectDescriptor>> {
    let descriptors: Vec<ObjectDescriptor> = match provider {
        Provider::Hierarchical(drive) => drive
            .list_folder()
            .await?
            .into_iter()
            .map(from_drive_file)
            .collect(),
        Provider::Flat(blob) => {
            ensure_container(blob).await?;
            blob.list_blobs()
                .await?
                .into_iter()
                .map(from_blob_item)
                .collect()
        }
    };

    debug!(provider = %provider.kind(), count = descriptors.len(), "listed objects");
    Ok(descriptors)
}

pub fn from_drive_file(file: DriveFile) -> ObjectDescriptor {
    let size = file.size_bytes();
    ObjectDescriptor::new(file.name, size)
        .with_kind(file.mime_type)
        .with_created_at(file.created_time)
        .with_provider_object_id(file.id)
}

pub fn from_blob_item(item: BlobItem) -> ObjectDescriptor {
    ObjectDescriptor::new(item.name, item.size_bytes).with_created_at(item.created_at)
}
