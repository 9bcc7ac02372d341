//! Adapters for the two remote storage providers.
//!
//! - `drive`: folder-scoped hierarchical source (Google Drive REST v3)
//! - `blob`: flat-namespace destination container (Azure Blob, via `azure_storage_blobs`)
//! - `session`: builds authenticated handles for both from static credentials
//!
//! Both adapters sit behind the tagged [`Provider`] enum rather than a trait
//! hierarchy: listing works on either variant, content fetch only on the
//! hierarchical one.

pub mod blob;
pub mod drive;
pub mod session;

use crate::errors::{MigrationError, MigrationResult};
use blob::BlobSession;
use drive::{DriveSession, SourceContent};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use std::fmt;

/// Characters left unescaped in a URL path segment.
pub(crate) const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Longest provider error body echoed back into a diagnostic.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GoogleDrive,
    AzureBlob,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::GoogleDrive => "Google Drive",
            Self::AzureBlob => "Azure Blob Storage",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed, ready-to-use provider handle.
#[derive(Clone, Copy)]
pub enum Provider<'a> {
    Hierarchical(&'a DriveSession),
    Flat(&'a BlobSession),
}

impl Provider<'_> {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Hierarchical(_) => ProviderKind::GoogleDrive,
            Self::Flat(_) => ProviderKind::AzureBlob,
        }
    }

    /// Fetch an object's full content. Only the source side supports this.
    pub async fn fetch_content(&self, id: &str) -> MigrationResult<SourceContent> {
        match self {
            Self::Hierarchical(drive) => drive.fetch(id).await,
            Self::Flat(_) => Err(MigrationError::Validation(format!(
                "{} is a destination and cannot serve content",
                self.kind()
            ))),
        }
    }
}

/// Map a transport-level failure (DNS, TLS, connection reset, body read).
pub(crate) fn transport_error(provider: ProviderKind, err: reqwest::Error) -> MigrationError {
    MigrationError::unavailable(provider, err)
}

/// Turn a non-success HTTP response into `ProviderUnavailable`, keeping the
/// status and a bounded slice of the provider's error body.
pub(crate) async fn unexpected_status(
    provider: ProviderKind,
    resp: reqwest::Response,
) -> MigrationError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let body = body.trim();
    let detail = if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    };

    if detail.is_empty() {
        MigrationError::unavailable(provider, format!("HTTP {}", status))
    } else {
        MigrationError::unavailable(provider, format!("HTTP {}: {}", status, detail))
    }
}
