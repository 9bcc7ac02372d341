//! Request, outcome and lifecycle types for a single object transfer.

use crate::errors::{FailureKind, MigrationError, MigrationResult};
use serde::Serialize;
use std::fmt;

/// One migration job: copy `source_object_id` to the destination as
/// `target_name`. The caller is responsible for picking a collision-free name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_object_id: String,
    pub target_name: String,
}

impl TransferRequest {
    pub fn new(source_object_id: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            source_object_id: source_object_id.into(),
            target_name: target_name.into(),
        }
    }

    /// Both fields are mandatory; whitespace-only values count as empty.
    pub fn validate(&self) -> MigrationResult<()> {
        if self.source_object_id.trim().is_empty() {
            return Err(MigrationError::Validation(
                "source object id must not be empty".into(),
            ));
        }
        if self.target_name.trim().is_empty() {
            return Err(MigrationError::Validation(
                "target name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Which half of the pipeline a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferSide {
    Download,
    Upload,
}

impl fmt::Display for TransferSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// Lifecycle of one transfer. There is no transition back to an earlier
/// stage; a failed transfer is never retried by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Idle,
    Bootstrapping,
    Downloading,
    Uploading,
    Completed,
    Failed,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Bootstrapping => "bootstrapping",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Final result of a transfer: it either fully completed or fully failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success {
        message: String,
        bytes: u64,
    },
    Failure {
        kind: FailureKind,
        side: Option<TransferSide>,
        message: String,
    },
}

impl TransferOutcome {
    pub fn completed(target_name: &str, bytes: u64) -> Self {
        Self::Success {
            message: format!(
                "Transferred {} ({} bytes) to the destination container",
                target_name, bytes
            ),
            bytes,
        }
    }

    pub fn failed(err: &MigrationError, side: Option<TransferSide>) -> Self {
        let message = match side {
            Some(side) => format!("{} failed: {}", side, err),
            None => err.to_string(),
        };
        Self::Failure {
            kind: err.kind(),
            side,
            message,
        }
    }
}
