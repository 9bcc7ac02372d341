//! Provider Session Factory.
//!
//! Builds authenticated handles for both providers from static credential
//! material. Construction is purely local: credentials are parsed and
//! validated here, and nothing touches the network until the first provider
//! call. Malformed or absent credentials fail with
//! [`MigrationError::Configuration`].

use super::{blob::BlobSession, drive::DriveSession};
use crate::{
    config::AppConfig,
    errors::{MigrationError, MigrationResult},
};
use serde::Deserialize;
use std::{fs, sync::Arc, time::Duration};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The subset of a Google service-account key file the bridge needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse key JSON and check that the required fields are populated.
    ///
    /// Whether `private_key` is a usable RSA key is checked when the drive
    /// session is built.
    pub fn from_json(raw: &str) -> MigrationResult<Self> {
        let key: Self = serde_json::from_str(raw).map_err(|err| {
            MigrationError::Configuration(format!("service account key is not valid JSON: {}", err))
        })?;
        if key.client_email.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "service account key has an empty `client_email`".into(),
            ));
        }
        if key.private_key.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "service account key has an empty `private_key`".into(),
            ));
        }
        Ok(key)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// A provider handle that is either ready, or remembers why it is not.
///
/// Unconfigured slots answer every use with a configuration error instead of
/// taking the process down.
pub enum Session<T> {
    Ready(Arc<T>),
    Unconfigured(String),
}

impl<T> Session<T> {
    pub fn from_result(result: MigrationResult<T>) -> Self {
        match result {
            Ok(session) => Self::Ready(Arc::new(session)),
            Err(MigrationError::Configuration(reason)) => Self::Unconfigured(reason),
            Err(other) => Self::Unconfigured(other.to_string()),
        }
    }

    pub fn get(&self) -> MigrationResult<&T> {
        match self {
            Self::Ready(session) => Ok(session.as_ref()),
            Self::Unconfigured(reason) => Err(MigrationError::Configuration(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Both provider handles, built once at startup and shared by reference.
pub struct Sessions {
    pub source: Session<DriveSession>,
    pub destination: Session<BlobSession>,
}

impl Sessions {
    pub fn from_config(cfg: &AppConfig, http: reqwest::Client) -> Self {
        Self {
            source: Session::from_result(build_source_session(cfg, http.clone())),
            destination: Session::from_result(build_destination_session(cfg, http)),
        }
    }
}

/// Shared HTTP client for both providers.
///
/// Every request is bounded by `request_timeout`, so no call can hang on a
/// provider that accepts the connection but never answers.
pub fn http_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
        .timeout(request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn build_source_session(
    cfg: &AppConfig,
    http: reqwest::Client,
) -> MigrationResult<DriveSession> {
    let source = &cfg.source;
    let raw_key = match (&source.service_account_key, &source.service_account_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path).map_err(|err| {
            MigrationError::Configuration(format!(
                "cannot read service account key file {}: {}",
                path.display(),
                err
            ))
        })?,
        (None, None) => {
            return Err(MigrationError::Configuration(
                "GOOGLE_SERVICE_ACCOUNT_KEY or GOOGLE_SERVICE_ACCOUNT_KEY_FILE must be set".into(),
            ));
        }
    };
    let key = ServiceAccountKey::from_json(&raw_key)?;

    let folder_id = source
        .folder_id
        .clone()
        .ok_or_else(|| MigrationError::Configuration("GOOGLE_DRIVE_FOLDER_ID is not set".into()))?;

    DriveSession::new(http, key, folder_id, &source.api_base, source.page_size)
}

pub fn build_destination_session(
    cfg: &AppConfig,
    http: reqwest::Client,
) -> MigrationResult<BlobSession> {
    let destination = &cfg.destination;
    let raw = destination.connection_string.as_deref().ok_or_else(|| {
        MigrationError::Configuration("AZURE_STORAGE_CONNECTION_STRING is not set".into())
    })?;
    let container = destination
        .container
        .clone()
        .ok_or_else(|| MigrationError::Configuration("AZURE_CONTAINER_NAME is not set".into()))?;

    BlobSession::from_connection_string(http, raw, container)
}
