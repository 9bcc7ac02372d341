//! Flat destination provider: one Azure Blob Storage container.
//!
//! Requests go through the `azure_storage_blobs` container client. The
//! client is built from the connection string with retries disabled and the
//! shared reqwest client as its transport, so the same timeouts apply to
//! both providers.

use super::ProviderKind;
use crate::errors::{MigrationError, MigrationResult};
use azure_core::{RetryOptions, TransportOptions, error::ErrorKind};
use azure_storage::{CloudLocation, ConnectionString};
use azure_storage_blobs::prelude::*;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{fmt, sync::Arc};
use tracing::debug;

const PROVIDER: ProviderKind = ProviderKind::AzureBlob;
const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// One blob as reported by `List Blobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// Result of a create-container call. Both variants count as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerCreation {
    Created,
    AlreadyExists,
}

/// Authenticated handle to one destination container.
pub struct BlobSession {
    account: String,
    container: String,
    client: Arc<ContainerClient>,
}

impl fmt::Debug for BlobSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobSession")
            .field("account", &self.account)
            .field("container", &self.container)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

impl BlobSession {
    /// Parse the connection string and validate the container name.
    /// Performs no network I/O.
    pub fn from_connection_string(
        http: reqwest::Client,
        connection_string: &str,
        container: String,
    ) -> MigrationResult<Self> {
        ensure_container_name_valid(&container)?;

        let parsed = ConnectionString::new(connection_string).map_err(|err| {
            MigrationError::Configuration(format!("malformed storage connection string: {}", err))
        })?;
        let account = parsed
            .account_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                MigrationError::Configuration("connection string is missing AccountName".into())
            })?
            .to_string();
        if let Some(key) = parsed.account_key {
            general_purpose::STANDARD.decode(key).map_err(|err| {
                MigrationError::Configuration(format!("AccountKey is not valid base64: {}", err))
            })?;
        }
        let credentials = parsed.storage_credentials().map_err(|err| {
            MigrationError::Configuration(format!(
                "connection string needs an AccountKey or a SharedAccessSignature: {}",
                err
            ))
        })?;
        let location = cloud_location(&account, parsed.blob_endpoint, parsed.endpoint_suffix)?;

        let client = ClientBuilder::with_location(location, credentials)
            .retry(RetryOptions::none())
            .transport(TransportOptions::new(Arc::new(http)))
            .container_client(container.clone());

        Ok(Self {
            account,
            container,
            client: Arc::new(client),
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Create the container. "Already exists" is reported, not raised.
    pub async fn create_container(&self) -> MigrationResult<ContainerCreation> {
        match self.client.create().await {
            Ok(_) => Ok(ContainerCreation::Created),
            Err(err) if error_code(&err) == Some("ContainerAlreadyExists") => {
                Ok(ContainerCreation::AlreadyExists)
            }
            Err(err) => Err(provider_error(err)),
        }
    }

    /// Enumerate every blob in the container, following continuation markers.
    pub async fn list_blobs(&self) -> MigrationResult<Vec<BlobItem>> {
        let mut pages = self.client.list_blobs().into_stream();
        let mut items = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(provider_error)?;
            let before = items.len();
            items.extend(page.blobs.blobs().map(|blob| BlobItem {
                name: blob.name.clone(),
                size_bytes: blob.properties.content_length,
                created_at: DateTime::from_timestamp(
                    blob.properties.creation_time.unix_timestamp(),
                    blob.properties.creation_time.nanosecond(),
                ),
                content_type: Some(blob.properties.content_type.clone())
                    .filter(|ct| !ct.is_empty()),
            }));
            debug!(
                blobs = items.len() - before,
                more = page.next_marker.is_some(),
                "listed blob page"
            );
        }

        Ok(items)
    }

    /// Write `body` as a block blob in a single call, replacing any existing
    /// blob of the same name. `Content-MD5` lets the service verify the payload.
    pub async fn put_blob(
        &self,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> MigrationResult<()> {
        let digest = md5::compute(&body);
        self.client
            .blob_client(name)
            .put_block_blob(body)
            .content_type(content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string())
            .hash(Hash::MD5(digest.0))
            .await
            .map_err(provider_error)?;
        Ok(())
    }
}

/// Resolve where the service lives: an explicit `BlobEndpoint` (emulators,
/// sovereign clouds) wins over the account's public endpoint.
fn cloud_location(
    account: &str,
    blob_endpoint: Option<&str>,
    endpoint_suffix: Option<&str>,
) -> MigrationResult<CloudLocation> {
    let uri = match (blob_endpoint.filter(|e| !e.is_empty()), endpoint_suffix) {
        (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
        (None, Some(suffix)) if !suffix.is_empty() && suffix != DEFAULT_ENDPOINT_SUFFIX => {
            format!("https://{}.blob.{}", account, suffix)
        }
        (None, _) => {
            return Ok(CloudLocation::Public {
                account: account.to_string(),
            });
        }
    };

    reqwest::Url::parse(&uri).map_err(|err| {
        MigrationError::Configuration(format!("blob endpoint `{}` is not a valid URL: {}", uri, err))
    })?;
    Ok(CloudLocation::Custom {
        account: account.to_string(),
        uri,
    })
}

fn error_code(err: &azure_core::Error) -> Option<&str> {
    match err.kind() {
        ErrorKind::HttpResponse { error_code, .. } => error_code.as_deref(),
        _ => None,
    }
}

/// Map an SDK failure to `ProviderUnavailable`, keeping the status and the
/// service's error code when the service answered at all.
fn provider_error(err: azure_core::Error) -> MigrationError {
    match err.kind() {
        ErrorKind::HttpResponse { status, error_code } => MigrationError::unavailable(
            PROVIDER,
            format!(
                "HTTP {}: {}",
                status,
                error_code.as_deref().unwrap_or("no error code")
            ),
        ),
        _ => MigrationError::unavailable(PROVIDER, err),
    }
}

/// Validate a container name against the service's naming rules:
/// - 3 to 63 characters
/// - lowercase letters, digits and hyphens only
/// - starts and ends with a letter or digit
/// - no consecutive hyphens
fn ensure_container_name_valid(name: &str) -> MigrationResult<()> {
    let invalid = |reason: &str| {
        Err(MigrationError::Configuration(format!(
            "container name `{}` invalid: {}",
            name, reason
        )))
    };

    let len = name.len();
    if !(CONTAINER_NAME_MIN_LEN..=CONTAINER_NAME_MAX_LEN).contains(&len) {
        return invalid("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
    {
        return invalid("allowed characters are lowercase letters, digits, and hyphens");
    }
    if name.starts_with('-') || name.ends_with('-') {
        return invalid("must start and end with a lowercase letter or digit");
    }
    if name.contains("--") {
        return invalid("cannot contain consecutive hyphens");
    }
    Ok(())
}
