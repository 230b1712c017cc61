//! REST client for the Lectern API.
//!
//! The client is cheap to clone; clones share the connection pool and the
//! session bearer token.

use crate::config::ClientConfig;
use crate::watch::ProgressSink;
use async_trait::async_trait;
use lectern_cache::PageFetcher;
use lectern_core::{
    FetchError, ListResponse, Notification, Page, PageRequest, ProgressUpdate, QueryOptions,
    Record, RecordId, ServiceId, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Form field that collects errors not tied to a specific input.
pub const SERVER_FIELD: &str = "server";

const WATCH_RECORDS_PATH: &str = "/api/watch-records";
const THREADS_PATH: &str = "/api/comment-threads";
const NOTIFICATIONS_PATH: &str = "/api/notifications";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "detail", alias = "error")]
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Value>,
}

impl ClientError {
    /// Map a non-success response to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound(message),
            400 | 422 => Self::Validation {
                message,
                fields: parsed
                    .errors
                    .into_iter()
                    .map(|(field, value)| (field, field_message(value)))
                    .collect(),
            },
            _ => Self::Status { status, message },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors keyed by form field, for display next to the inputs.
    ///
    /// Anything not tied to a field lands under [`SERVER_FIELD`].
    pub fn form_errors(&self) -> BTreeMap<String, String> {
        match self {
            Self::Validation { message, fields } => {
                let mut errors = fields.clone();
                if !message.is_empty() {
                    errors
                        .entry(SERVER_FIELD.to_string())
                        .or_insert_with(|| message.clone());
                }
                errors
            }
            other => BTreeMap::from([(SERVER_FIELD.to_string(), other.to_string())]),
        }
    }
}

fn field_message(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(field_message)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized => FetchError::Unauthorized,
            ClientError::Status { status, message } => FetchError::Status { status, message },
            ClientError::NotFound(message) => FetchError::Status {
                status: 404,
                message,
            },
            ClientError::Validation { message, .. } => FetchError::Status {
                status: 422,
                message,
            },
            ClientError::Serde(e) => FetchError::Decode(e.to_string()),
            ClientError::Http(e) if e.is_decode() => FetchError::Decode(e.to_string()),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationList {
    #[serde(default)]
    items: Vec<Notification>,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token().is_some())
            .finish()
    }
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::with_base_url(&config.api_server, config.request_timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ClientError::Config("api_server must not be empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set or clear the bearer token used by this client and all its clones.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch one page of a list endpoint.
    pub async fn list(
        &self,
        service: &ServiceId,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page, ClientError> {
        let mut query = options.query_pairs();
        query.push(("skip".to_string(), request.skip().to_string()));
        query.push(("limit".to_string(), request.limit.to_string()));

        let response = self
            .request(reqwest::Method::GET, service.path())
            .query(&query)
            .send()
            .await?;
        let list: ListResponse = parse_response(response).await?;
        Ok(list.into_page(request))
    }

    pub async fn get_record(&self, path: &str) -> Result<Record, ClientError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        parse_response(response).await
    }

    /// Create a record. The server answers with the full record.
    pub async fn create_record(&self, path: &str, body: &Record) -> Result<Record, ClientError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn update_record(
        &self,
        path: &str,
        id: &RecordId,
        patch: &Record,
    ) -> Result<Record, ClientError> {
        let path = format!("{}/{}", path.trim_end_matches('/'), encode_id(id));
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(patch)
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn delete_record(&self, path: &str, id: &RecordId) -> Result<(), ClientError> {
        let path = format!("{}/{}", path.trim_end_matches('/'), encode_id(id));
        let response = self.request(reqwest::Method::DELETE, &path).send().await?;
        check_status(response).await.map(drop)
    }

    pub async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::POST, WATCH_RECORDS_PATH)
            .json(update)
            .send()
            .await?;
        check_status(response).await.map(drop)
    }

    pub async fn mark_started(&self, resource_id: &RecordId) -> Result<(), ClientError> {
        let path = format!("{}/{}/start", WATCH_RECORDS_PATH, encode_id(resource_id));
        let response = self.request(reqwest::Method::POST, &path).send().await?;
        check_status(response).await.map(drop)
    }

    /// Comment thread attached to a resource.
    pub async fn get_thread(&self, resource_id: &RecordId) -> Result<Record, ClientError> {
        let path = format!("{}/by-resource/{}", THREADS_PATH, encode_id(resource_id));
        self.get_record(&path).await
    }

    pub async fn create_thread(&self, resource_id: &RecordId) -> Result<Record, ClientError> {
        let response = self
            .request(reqwest::Method::POST, THREADS_PATH)
            .json(&json!({ "resource_id": resource_id }))
            .send()
            .await?;
        parse_response(response).await
    }

    /// Thread for a resource, created on first use.
    pub async fn ensure_thread(&self, resource_id: &RecordId) -> Result<Record, ClientError> {
        match self.get_thread(resource_id).await {
            Err(err) if err.is_not_found() => {
                tracing::debug!(resource_id = %resource_id, "Creating comment thread on demand");
                self.create_thread(resource_id).await
            }
            other => other,
        }
    }

    pub async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, NOTIFICATIONS_PATH)
            .send()
            .await?;
        let list: NotificationList = parse_response(response).await?;
        Ok(list.items)
    }

    pub async fn mark_notification_read(
        &self,
        id: &RecordId,
        read_time: Timestamp,
    ) -> Result<(), ClientError> {
        let path = format!("{}/{}", NOTIFICATIONS_PATH, encode_id(id));
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(&json!({ "read_time": read_time }))
            .send()
            .await?;
        check_status(response).await.map(drop)
    }
}

fn encode_id(id: &RecordId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_status(status.as_u16(), &body))
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl PageFetcher for RestClient {
    async fn fetch_page(
        &self,
        service: &ServiceId,
        options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page, FetchError> {
        self.list(service, options, request)
            .await
            .map_err(FetchError::from)
    }
}

#[async_trait]
impl ProgressSink for RestClient {
    async fn mark_started(&self, resource_id: &RecordId) -> Result<(), ClientError> {
        RestClient::mark_started(self, resource_id).await
    }

    async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), ClientError> {
        RestClient::save_progress(self, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(ClientError::from_status(401, "").is_unauthorized());
        assert!(ClientError::from_status(404, r#"{"message":"no thread"}"#).is_not_found());
        assert!(matches!(
            ClientError::from_status(503, "maintenance"),
            ClientError::Status { status: 503, ref message } if message == "maintenance"
        ));
    }

    #[test]
    fn test_validation_fields_and_server_field() {
        let err = ClientError::from_status(
            422,
            r#"{"message":"Invalid input","errors":{"title":["too short","too plain"],"price":"negative"}}"#,
        );
        let form = err.form_errors();
        assert_eq!(form.get("title").map(String::as_str), Some("too short; too plain"));
        assert_eq!(form.get("price").map(String::as_str), Some("negative"));
        assert_eq!(form.get(SERVER_FIELD).map(String::as_str), Some("Invalid input"));
    }

    #[test]
    fn test_non_validation_errors_land_on_server_field() {
        let form = ClientError::Status {
            status: 500,
            message: "boom".to_string(),
        }
        .form_errors();
        assert_eq!(form.len(), 1);
        assert_eq!(form.get(SERVER_FIELD).map(String::as_str), Some("HTTP 500: boom"));
    }

    #[test]
    fn test_fetch_error_conversion() {
        assert_eq!(FetchError::from(ClientError::Unauthorized), FetchError::Unauthorized);
        assert_eq!(
            FetchError::from(ClientError::from_status(404, "gone")),
            FetchError::Status {
                status: 404,
                message: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_url_joining() {
        let client =
            RestClient::with_base_url("https://lms.example.com/", Duration::from_secs(5)).expect("client");
        assert_eq!(client.url("/api/assets"), "https://lms.example.com/api/assets");
        assert_eq!(client.url("api/assets"), "https://lms.example.com/api/assets");
        assert_eq!(client.url("https://cdn.example.com/x"), "https://cdn.example.com/x");
    }

    #[test]
    fn test_token_is_shared_between_clones() {
        let client =
            RestClient::with_base_url("https://lms.example.com", Duration::from_secs(5)).expect("client");
        let clone = client.clone();
        client.set_token(Some("abc".to_string()));
        assert_eq!(clone.token().as_deref(), Some("abc"));
        client.set_token(None);
        assert!(clone.token().is_none());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            RestClient::with_base_url("  ", Duration::from_secs(1)),
            Err(ClientError::Config(_))
        ));
    }
}
