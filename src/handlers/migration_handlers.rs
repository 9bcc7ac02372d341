//! HTTP handlers for listing both providers and triggering a transfer.
//! All provider work is delegated to `MigrationService`.

use crate::{
    errors::{AppError, FailureKind},
    models::{
        descriptor::ObjectDescriptor,
        transfer::{TransferOutcome, TransferRequest, TransferSide},
    },
    services::migration_service::MigrationService,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Body of `POST /api/transfer`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub file_id: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum TransferResponse {
    Success {
        message: String,
        bytes: u64,
    },
    Error {
        message: String,
        detail: String,
        kind: FailureKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        side: Option<TransferSide>,
    },
}

/// `GET /api/drive-files`
pub async fn list_drive_files(
    State(service): State<MigrationService>,
) -> Result<Json<Vec<ObjectDescriptor>>, AppError> {
    service.list_source().await.map(Json).map_err(|err| {
        error!(error = %err, "source listing failed");
        AppError::from_migration("Failed to list Google Drive files", err)
    })
}

/// `GET /api/blob-files`
pub async fn list_blob_files(
    State(service): State<MigrationService>,
) -> Result<Json<Vec<ObjectDescriptor>>, AppError> {
    service.list_destination().await.map(Json).map_err(|err| {
        error!(error = %err, "destination listing failed");
        AppError::from_migration("Failed to list Azure Blob Storage files", err)
    })
}

/// `POST /api/transfer`
///
/// Missing or blank `fileId` / `fileName` are rejected with 400 by the
/// transfer's own validation, before any provider is contacted.
pub async fn transfer_file(
    State(service): State<MigrationService>,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return AppError::new(
                StatusCode::BAD_REQUEST,
                "Invalid transfer request",
                rejection.body_text(),
            )
            .into_response();
        }
    };

    let request = TransferRequest::new(
        body.file_id.unwrap_or_default(),
        body.file_name.unwrap_or_default(),
    );

    match service.transfer(request).await {
        TransferOutcome::Success { message, bytes } => {
            (StatusCode::OK, Json(TransferResponse::Success { message, bytes })).into_response()
        }
        TransferOutcome::Failure {
            kind,
            side,
            message,
        } => (
            kind.status_code(),
            Json(TransferResponse::Error {
                message: "Failed to transfer file".into(),
                detail: message,
                kind,
                side,
            }),
        )
            .into_response(),
    }
}
