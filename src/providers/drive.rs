//! Hierarchical source provider: a folder-scoped Google Drive.
//!
//! Authentication follows the service-account flow: an RS256 JWT assertion is
//! signed locally and exchanged for a bearer token at the key's `token_uri`.
//! The token is cached until shortly before it expires.

use super::{
    PATH_SEGMENT, ProviderKind, session::ServiceAccountKey, transport_error, unexpected_status,
};
use crate::errors::{MigrationError, MigrationResult};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use percent_encoding::utf8_percent_encode;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

const PROVIDER: ProviderKind = ProviderKind::GoogleDrive;
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,createdTime)";
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime";

/// One entry as returned by `files.list` / `files.get`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    /// Drive encodes int64 values as strings. Absent for folders, shortcuts
    /// and native documents.
    pub size: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    pub fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// A source object fully read into memory.
#[derive(Debug, Clone)]
pub struct SourceContent {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

/// Authenticated handle to one Drive folder.
pub struct DriveSession {
    http: reqwest::Client,
    client_email: String,
    encoding_key: EncodingKey,
    token_uri: String,
    api_base: String,
    folder_id: String,
    page_size: u32,
    token: Mutex<Option<CachedToken>>,
}

impl DriveSession {
    /// Validate key material and folder scope. Performs no network I/O.
    pub fn new(
        http: reqwest::Client,
        key: ServiceAccountKey,
        folder_id: String,
        api_base: &str,
        page_size: u32,
    ) -> MigrationResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|err| {
            MigrationError::Configuration(format!(
                "service account private_key is not a valid RSA PEM key: {}",
                err
            ))
        })?;
        if folder_id.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "drive folder id must not be empty".into(),
            ));
        }
        if page_size == 0 {
            return Err(MigrationError::Configuration(
                "drive page size must be at least 1".into(),
            ));
        }

        Ok(Self {
            http,
            client_email: key.client_email,
            encoding_key,
            token_uri: key.token_uri,
            api_base: api_base.trim_end_matches('/').to_string(),
            folder_id,
            page_size,
            token: Mutex::new(None),
        })
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> MigrationResult<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key).map_err(|err| {
            MigrationError::Configuration(format!("failed to sign token assertion: {}", err))
        })
    }

    /// Return a bearer token, minting a new one when the cached token is
    /// missing or about to expire.
    async fn access_token(&self) -> MigrationResult<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        debug!(token_uri = %self.token_uri, "exchanging service account assertion");
        let resp = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        if !resp.status().is_success() {
            return Err(unexpected_status(PROVIDER, resp).await);
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;

        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = now + ChronoDuration::seconds(lifetime - TOKEN_EXPIRY_MARGIN_SECS);
        let value = token.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.files_url(),
            utf8_percent_encode(id, PATH_SEGMENT)
        )
    }

    /// List the non-trashed children of the configured folder.
    ///
    /// Only the first page is returned; further pages are not requested.
    pub async fn list_folder(&self) -> MigrationResult<Vec<DriveFile>> {
        let token = self.access_token().await?;
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query_literal(&self.folder_id)
        );
        let page_size = self.page_size.to_string();

        let resp = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", LIST_FIELDS),
            ])
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        if !resp.status().is_success() {
            return Err(unexpected_status(PROVIDER, resp).await);
        }
        let list: FileList = resp
            .json()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;

        if list.next_page_token.is_some() {
            debug!(
                folder = %self.folder_id,
                returned = list.files.len(),
                "drive listing truncated to a single page"
            );
        }
        Ok(list.files)
    }

    /// Fetch metadata for one object. Unknown ids map to `NotFound`.
    pub async fn file_metadata(&self, id: &str) -> MigrationResult<DriveFile> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(self.file_url(id))
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        match resp.status() {
            status if status.is_success() => resp
                .json()
                .await
                .map_err(|err| transport_error(PROVIDER, err)),
            StatusCode::NOT_FOUND => Err(MigrationError::NotFound {
                provider: PROVIDER,
                id: id.to_string(),
            }),
            _ => Err(unexpected_status(PROVIDER, resp).await),
        }
    }

    /// Read an object's content to completion into one contiguous buffer.
    pub async fn download(&self, id: &str) -> MigrationResult<Bytes> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(self.file_url(id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|err| transport_error(PROVIDER, err))?;
        match resp.status() {
            status if status.is_success() => resp
                .bytes()
                .await
                .map_err(|err| transport_error(PROVIDER, err)),
            StatusCode::NOT_FOUND => Err(MigrationError::NotFound {
                provider: PROVIDER,
                id: id.to_string(),
            }),
            _ => Err(unexpected_status(PROVIDER, resp).await),
        }
    }

    /// Metadata first, then the bytes.
    ///
    /// Objects that report no size (folders, shortcuts, native documents) are
    /// rejected before any media request is made.
    pub async fn fetch(&self, id: &str) -> MigrationResult<SourceContent> {
        let file = self.file_metadata(id).await?;
        if file.size_bytes() == 0 {
            return Err(MigrationError::Validation(format!(
                "`{}` has no downloadable content (size 0, type {}) and cannot be migrated",
                file.name,
                file.mime_type.as_deref().unwrap_or("unknown")
            )));
        }
        let bytes = self.download(id).await?;
        debug!(id, name = %file.name, bytes = bytes.len(), "downloaded source object");
        Ok(SourceContent {
            name: file.name,
            mime_type: file.mime_type,
            bytes,
        })
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
