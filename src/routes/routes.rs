//! Defines routes for the migration API.
//!
//! ## Structure
//! - **Probes** (mounted at root)
//!   - `GET  /healthz` - liveness
//!   - `GET  /readyz`  - provider configuration checks
//!
//! - **Migration endpoints**
//!   - `GET  /api/drive-files` - list the source folder
//!   - `GET  /api/blob-files`  - list the destination container
//!   - `POST /api/transfer`    - copy one source object to the destination

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        migration_handlers::{list_blob_files, list_drive_files, transfer_file},
    },
    services::migration_service::MigrationService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. Handlers share `MigrationService` as state.
pub fn routes() -> Router<MigrationService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/drive-files", get(list_drive_files))
        .route("/api/blob-files", get(list_blob_files))
        .route("/api/transfer", post(transfer_file))
}
