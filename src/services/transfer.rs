//! Transfer orchestrator.
//!
//! One invocation moves one object: validate the request, bootstrap the
//! destination container, read the source object fully into memory, then
//! write it to the destination in a single call. A failed download never
//! reaches the upload step.

use super::bootstrap::ensure_configured_container;
use crate::{
    errors::{MigrationError, MigrationResult},
    models::transfer::{TransferOutcome, TransferRequest, TransferSide, TransferStage},
    providers::{Provider, ProviderKind, session::Sessions},
};
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Per-call deadline and shutdown signal applied to download and upload.
#[derive(Clone)]
pub struct TransferLimits {
    pub deadline: Duration,
    pub cancel: CancellationToken,
}

pub async fn run(
    sessions: &Sessions,
    request: TransferRequest,
    limits: &TransferLimits,
) -> TransferOutcome {
    let span = info_span!(
        "transfer",
        transfer_id = %Uuid::new_v4(),
        source_id = %request.source_object_id,
        target = %request.target_name,
    );

    async move {
        stage(TransferStage::Idle);
        match execute(sessions, &request, limits).await {
            Ok(bytes) => {
                stage(TransferStage::Completed);
                info!(bytes, "transfer completed");
                TransferOutcome::completed(&request.target_name, bytes)
            }
            Err((err, side)) => {
                stage(TransferStage::Failed);
                warn!(error = %err, side = ?side, "transfer failed");
                TransferOutcome::failed(&err, side)
            }
        }
    }
    .instrument(span)
    .await
}

type StepError = (MigrationError, Option<TransferSide>);

async fn execute(
    sessions: &Sessions,
    request: &TransferRequest,
    limits: &TransferLimits,
) -> Result<u64, StepError> {
    request.validate().map_err(|err| (err, None))?;

    stage(TransferStage::Bootstrapping);
    let blob = ensure_configured_container(&sessions.destination)
        .await
        .map_err(|err| (err, None))?;

    stage(TransferStage::Downloading);
    let download = TransferSide::Download;
    let drive = sessions
        .source
        .get()
        .map_err(|err| (err, Some(download)))?;
    let content = guarded(
        ProviderKind::GoogleDrive,
        limits,
        Provider::Hierarchical(drive).fetch_content(&request.source_object_id),
    )
    .await
    .map_err(|err| (err, Some(download)))?;
    let bytes = content.bytes.len() as u64;
    debug!(bytes, source_name = %content.name, "source content buffered");

    stage(TransferStage::Uploading);
    guarded(
        ProviderKind::AzureBlob,
        limits,
        blob.put_blob(
            &request.target_name,
            content.bytes,
            content.mime_type.as_deref(),
        ),
    )
    .await
    .map_err(|err| (err, Some(TransferSide::Upload)))?;

    Ok(bytes)
}

/// Run one provider call under the deadline, abandoning it on shutdown.
async fn guarded<T>(
    provider: ProviderKind,
    limits: &TransferLimits,
    call: impl Future<Output = MigrationResult<T>>,
) -> MigrationResult<T> {
    tokio::select! {
        biased;
        _ = limits.cancel.cancelled() => Err(MigrationError::Cancelled { provider }),
        result = tokio::time::timeout(limits.deadline, call) => match result {
            Ok(result) => result,
            Err(_) => Err(MigrationError::Timeout {
                provider,
                after: limits.deadline,
            }),
        },
    }
}

fn stage(stage: TransferStage) {
    debug!(%stage, "transfer stage");
}
