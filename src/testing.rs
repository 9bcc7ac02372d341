//! In-process fake of both providers for tests.
//!
//! Serves the token endpoint, the Drive v3 `files` resource and an
//! emulator-style blob endpoint (`/devstoreaccount1/...`) from one axum server
//! bound to `127.0.0.1:0`. Every request is counted so tests can assert that
//! an operation made no network calls.

use crate::{
    config::{AppConfig, DestinationConfig, SourceConfig},
    providers::{
        blob::BlobSession,
        drive::DriveSession,
        session::{ServiceAccountKey, http_client},
    },
};
use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Well-known development account key of the local blob emulator.
pub const AZURITE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
pub const FAKE_TOKEN: &str = "fake-access-token";
const ACCOUNT: &str = "devstoreaccount1";
const BLOB_API_VERSION: &str = "2022-11-02";

/// Emulator-style connection string whose blob endpoint is `base_url`.
pub fn connection_string_for(base_url: &str) -> String {
    format!(
        "DefaultEndpointsProtocol=http;AccountName={0};AccountKey={1};BlobEndpoint={2}/{0};",
        ACCOUNT, AZURITE_KEY, base_url
    )
}

/// An endpoint that accepts connections and never answers.
pub async fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    base_url
}

/// Fixture service-account key with its `token_uri` pointed at `base_url`.
pub fn fixture_service_account(base_url: &str) -> String {
    let raw = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/testdata/service_account.json"
    ));
    let mut value: Value = serde_json::from_str(raw).unwrap();
    value["token_uri"] = Value::String(format!("{}/token", base_url));
    value.to_string()
}

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    /// `None` mimics folders and shortcuts, which report no size.
    pub size: Option<u64>,
}

impl FakeFile {
    pub fn new(id: &str, name: &str, content: &[u8]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: "application/octet-stream".into(),
            content: content.to_vec(),
            size: Some(content.len() as u64),
        }
    }

    pub fn shortcut(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: "application/vnd.google-apps.shortcut".into(),
            content: Vec::new(),
            size: None,
        }
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime_type = mime.into();
        self
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(self.id));
        map.insert("name".into(), json!(self.name));
        map.insert("mimeType".into(), json!(self.mime_type));
        if let Some(size) = self.size {
            map.insert("size".into(), json!(size.to_string()));
        }
        map.insert("createdTime".into(), json!("2024-01-01T00:00:00Z"));
        Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub md5_verified: bool,
    pub authorized: bool,
}

#[derive(Debug)]
pub struct FakeState {
    pub files: Vec<FakeFile>,
    pub blobs: BTreeMap<String, StoredBlob>,
    pub container_exists: bool,
    pub reject_tokens: bool,
    pub drive_unavailable: bool,
    pub container_forbidden: bool,
    pub blob_write_fails: bool,
    pub download_delay: Option<Duration>,
    pub blob_list_page_size: usize,
    pub requests: usize,
    pub token_requests: usize,
    pub list_requests: usize,
    pub download_requests: usize,
    pub blob_list_requests: usize,
    pub create_container_calls: usize,
    pub put_blob_calls: usize,
    pub last_drive_query: Option<HashMap<String, String>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            blobs: BTreeMap::new(),
            container_exists: false,
            reject_tokens: false,
            drive_unavailable: false,
            container_forbidden: false,
            blob_write_fails: false,
            download_delay: None,
            blob_list_page_size: 1000,
            requests: 0,
            token_requests: 0,
            list_requests: 0,
            download_requests: 0,
            blob_list_requests: 0,
            create_container_calls: 0,
            put_blob_calls: 0,
            last_drive_query: None,
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeCloud {
    pub base_url: String,
    shared: Shared,
}

impl FakeCloud {
    pub async fn start() -> Self {
        let shared: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/token", post(token))
            .route("/drive/v3/files", get(list_files))
            .route("/drive/v3/files/{id}", get(get_file))
            .route(
                &format!("/{}/{{container}}", ACCOUNT),
                put(create_container).get(list_blobs),
            )
            .route(&format!("/{}/{{container}}/{{*blob}}", ACCOUNT), put(put_blob))
            .layer(middleware::from_fn_with_state(shared.clone(), count_requests))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, shared }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.shared.lock().unwrap()
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state());
    }

    pub fn add_file(&self, file: FakeFile) {
        self.state().files.push(file);
    }

    pub fn connection_string(&self) -> String {
        connection_string_for(&self.base_url)
    }

    pub fn drive_session(&self, folder: &str, page_size: u32) -> DriveSession {
        let key = ServiceAccountKey::from_json(&fixture_service_account(&self.base_url)).unwrap();
        DriveSession::new(
            http_client(Duration::from_secs(5)).unwrap(),
            key,
            folder.to_string(),
            &self.base_url,
            page_size,
        )
        .unwrap()
    }

    pub fn blob_session(&self, container: &str) -> BlobSession {
        BlobSession::from_connection_string(
            http_client(Duration::from_secs(5)).unwrap(),
            &self.connection_string(),
            container.to_string(),
        )
        .unwrap()
    }

    /// A fully populated configuration pointing both providers at this fake.
    pub fn app_config(&self, container: &str, transfer_timeout: Duration) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            transfer_timeout,
            source: SourceConfig {
                service_account_key: Some(fixture_service_account(&self.base_url)),
                service_account_file: None,
                folder_id: Some("folder-1".into()),
                api_base: self.base_url.clone(),
                page_size: 100,
            },
            destination: DestinationConfig {
                connection_string: Some(self.connection_string()),
                container: Some(container.into()),
            },
        }
    }
}

async fn count_requests(State(shared): State<Shared>, req: Request, next: Next) -> Response {
    shared.lock().unwrap().requests += 1;
    next.run(req).await
}

async fn token(State(shared): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let reject = {
        let mut state = shared.lock().unwrap();
        state.token_requests += 1;
        state.reject_tokens
    };
    if reject {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid JWT Signature."})),
        )
            .into_response();
    }

    let grant_ok = form.get("grant_type").map(String::as_str)
        == Some("urn:ietf:params:oauth:grant-type:jwt-bearer");
    let assertion_ok = form
        .get("assertion")
        .is_some_and(|a| a.split('.').count() == 3);
    if !grant_ok || !assertion_ok {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_request"}))).into_response();
    }

    Json(json!({
        "access_token": FAKE_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", FAKE_TOKEN).as_str())
}

async fn list_files(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = shared.lock().unwrap();
    state.list_requests += 1;
    state.last_drive_query = Some(query.clone());
    if state.drive_unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "backendError").into_response();
    }

    let page_size = query
        .get("pageSize")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(100);
    let files: Vec<Value> = state.files.iter().take(page_size).map(FakeFile::to_json).collect();
    let mut body = json!({ "files": files });
    if state.files.len() > page_size {
        body["nextPageToken"] = json!("page-2");
    }
    Json(body).into_response()
}

async fn get_file(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let media = query.get("alt").map(String::as_str) == Some("media");
    let (file, delay) = {
        let mut state = shared.lock().unwrap();
        if state.drive_unavailable {
            return (StatusCode::SERVICE_UNAVAILABLE, "backendError").into_response();
        }
        if media {
            state.download_requests += 1;
        }
        let file = state.files.iter().find(|f| f.id == id).cloned();
        (file, state.download_delay)
    };

    let Some(file) = file else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": format!("File not found: {}.", id)}})),
        )
            .into_response();
    };

    if media {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        file.content.into_response()
    } else {
        Json(file.to_json()).into_response()
    }
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Headers the blob service puts on every response.
fn service_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ms-request-id", Uuid::new_v4().to_string().parse().unwrap());
    headers.insert("x-ms-version", HeaderValue::from_static(BLOB_API_VERSION));
    headers.insert("date", http_date(Utc::now()).parse().unwrap());
    headers
}

fn etag_of(bytes: &[u8]) -> String {
    format!("\"0x{:x}\"", md5::compute(bytes))
}

fn blob_error(status: StatusCode, code: &'static str) -> Response {
    let mut headers = service_headers();
    headers.insert("x-ms-error-code", HeaderValue::from_static(code));
    headers.insert("content-type", HeaderValue::from_static("application/xml"));
    (
        status,
        headers,
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>{}</Code><Message>{}</Message></Error>",
            code, code
        ),
    )
        .into_response()
}

fn shared_key_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(&format!("SharedKey {}:", ACCOUNT)))
        && headers.contains_key("x-ms-date")
        && headers.contains_key("x-ms-version")
}

async fn create_container(
    State(shared): State<Shared>,
    Path(_container): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("restype").map(String::as_str) != Some("container") {
        return blob_error(StatusCode::BAD_REQUEST, "InvalidQueryParameterValue");
    }
    let mut state = shared.lock().unwrap();
    state.create_container_calls += 1;
    if state.container_forbidden {
        return blob_error(StatusCode::FORBIDDEN, "AuthorizationFailure");
    }
    if state.container_exists {
        return blob_error(StatusCode::CONFLICT, "ContainerAlreadyExists");
    }
    state.container_exists = true;

    let mut headers = service_headers();
    headers.insert("etag", HeaderValue::from_static("\"0x8DC0000000000001\""));
    headers.insert("last-modified", http_date(Utc::now()).parse().unwrap());
    (StatusCode::CREATED, headers).into_response()
}

async fn list_blobs(
    State(shared): State<Shared>,
    Path(container): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = shared.lock().unwrap();
    state.blob_list_requests += 1;
    if !state.container_exists {
        return blob_error(StatusCode::NOT_FOUND, "ContainerNotFound");
    }

    let start = query
        .get("marker")
        .and_then(|m| m.parse::<usize>().ok())
        .unwrap_or(0);
    let page_size = state.blob_list_page_size;
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <EnumerationResults ServiceEndpoint=\"http://127.0.0.1/{}/\" ContainerName=\"{}\"><Blobs>",
        ACCOUNT,
        xml_escape(&container)
    );
    for (name, blob) in state.blobs.iter().skip(start).take(page_size) {
        xml.push_str(&format!(
            "<Blob><Name>{}</Name><Properties>\
             <Creation-Time>{created}</Creation-Time>\
             <Last-Modified>{created}</Last-Modified>\
             <Etag>{}</Etag>\
             <Content-Length>{}</Content-Length>\
             <Content-Type>{}</Content-Type>\
             <Content-MD5>{}</Content-MD5>\
             <BlobType>BlockBlob</BlobType>\
             <AccessTier>Hot</AccessTier>\
             <AccessTierInferred>true</AccessTierInferred>\
             <LeaseStatus>unlocked</LeaseStatus>\
             <LeaseState>available</LeaseState>\
             <ServerEncrypted>true</ServerEncrypted>\
             </Properties></Blob>",
            xml_escape(name),
            xml_escape(&etag_of(&blob.bytes)),
            blob.bytes.len(),
            xml_escape(blob.content_type.as_deref().unwrap_or("")),
            general_purpose::STANDARD.encode(md5::compute(&blob.bytes).0),
            created = http_date(blob.created_at),
        ));
    }
    xml.push_str("</Blobs>");
    if start + page_size < state.blobs.len() {
        xml.push_str(&format!("<NextMarker>{}</NextMarker>", start + page_size));
    }
    xml.push_str("</EnumerationResults>");

    let mut headers = service_headers();
    headers.insert("content-type", HeaderValue::from_static("application/xml"));
    (headers, xml).into_response()
}

async fn put_blob(
    State(shared): State<Shared>,
    Path((_container, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = shared.lock().unwrap();
    state.put_blob_calls += 1;
    if state.blob_write_fails {
        return blob_error(StatusCode::INTERNAL_SERVER_ERROR, "InternalError");
    }
    if !state.container_exists {
        return blob_error(StatusCode::NOT_FOUND, "ContainerNotFound");
    }
    if headers.get("x-ms-blob-type").and_then(|v| v.to_str().ok()) != Some("BlockBlob") {
        return blob_error(StatusCode::BAD_REQUEST, "MissingRequiredHeader");
    }

    let expected_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);
    let sent_md5 = headers.get("content-md5").and_then(|v| v.to_str().ok());
    if sent_md5.is_some_and(|sent| sent != expected_md5) {
        return blob_error(StatusCode::BAD_REQUEST, "Md5Mismatch");
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let blob = StoredBlob {
        bytes: body.to_vec(),
        content_type: header("x-ms-blob-content-type").or_else(|| header("content-type")),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        md5_verified: sent_md5.is_some(),
        authorized: shared_key_ok(&headers),
    };
    state.blobs.insert(name, blob);

    let mut response = service_headers();
    response.insert("etag", etag_of(&body).parse().unwrap());
    response.insert("last-modified", http_date(Utc::now()).parse().unwrap());
    response.insert("content-md5", expected_md5.parse().unwrap());
    response.insert("x-ms-request-server-encrypted", HeaderValue::from_static("true"));
    (StatusCode::CREATED, response).into_response()
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
