//! Remote Query Client
//!
//! Talks to one FileMaker database over OData v4 at `{server}/fmi/odata/v4/{database}`.
//!
//! # Design
//! - Construction builds the HTTP client and headers but performs no network I/O
//! - Every request carries Basic auth (marked sensitive) and JSON content headers
//! - Nothing retries; each operation resolves or fails exactly once
//!
//! # Error Normalization
//! - `{"error": {"code", "message"}}` bodies become `RemoteError(code, message)`
//! - Other non-2xx answers become `RemoteError(status, reason)`
//! - No response at all becomes `TransportError`
//! - Requests that could not be formed become `RequestFailed`

pub mod query;

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::{ConnectionParams, PASSWORD_MASK};
use crate::error::{FmodataError, Result};

pub use query::{QueryOptions, RecordOptions};

/// Path between the server address and the database name
pub const ODATA_PATH: &str = "fmi/odata/v4";

/// One record: field name to value, in the order received
pub type Record = serde_json::Map<String, Value>;

/// Collection response as received from the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(rename = "@odata.context", default)]
    pub context: String,

    #[serde(rename = "@odata.count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,

    #[serde(default)]
    pub value: Vec<Record>,
}

/// HTTP method of a batch sub-operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl BatchMethod {
    fn http_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

/// One sub-operation of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchOperation {
    /// HTTP method
    pub method: BatchMethod,

    /// Absolute URL, or a path relative to the database base address (e.g. `contact('7')`)
    pub url: String,

    /// JSON body for POST and PATCH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Result of one batch sub-operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,

    /// Remote status, or 500 when no response was received
    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transport options for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Verify TLS certificates
    pub verify_ssl: bool,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { verify_ssl: true, timeout: Duration::from_millis(30_000) }
    }
}

/// Status and body of a received response
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    body: String,
}

impl RawResponse {
    fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(remote_error_from(self.status, &self.body))
        }
    }

    fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| FmodataError::invalid_response(format!("Could not parse response body: {e}")))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Value,
    message: String,
}

/// Client for one OData service
pub struct ODataClient {
    http: reqwest::Client,
    base_url: String,
    server: String,
    database: String,
    user: String,
    options: ClientOptions,
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &PASSWORD_MASK)
            .field("options", &self.options)
            .finish()
    }
}

impl ODataClient {
    /// Build a client for the given credentials
    pub fn new(params: &ConnectionParams, options: ClientOptions) -> Result<Self> {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", params.user, params.password));
        let mut auth = HeaderValue::from_str(&format!("Basic {token}")).map_err(|_| {
            FmodataError::request_failed("Credentials contain characters not allowed in a header")
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl)
            .build()
            .map_err(|e| FmodataError::request_failed(format!("Could not build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url(&params.server, &params.database),
            server: params.server.clone(),
            database: params.database.clone(),
            user: params.user.clone(),
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    /// URL for a table, optionally addressing one record by key
    ///
    /// The key is embedded as `('{key}')` without escaping.
    pub fn resource_url(&self, table: &str, key: Option<&str>, options: Option<&QueryOptions>) -> String {
        let mut url = format!("{}/{table}", self.base_url);
        if let Some(key) = key {
            url.push_str(&format!("('{key}')"));
        }
        if let Some(query) = options.and_then(QueryOptions::to_query_string) {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// Service document listing the entity sets
    pub async fn get_service_document(&self) -> Result<Value> {
        let response = self.send(self.http.get(&self.base_url)).await?.error_for_status()?;
        response.json()
    }

    /// Raw `$metadata` schema document
    pub async fn get_metadata(&self) -> Result<String> {
        let url = format!("{}/$metadata", self.base_url);
        let request = self.http.get(url).header(ACCEPT, "application/xml");
        let response = self.send(request).await?.error_for_status()?;
        Ok(response.body)
    }

    /// Query a table
    pub async fn query(&self, table: &str, options: &QueryOptions) -> Result<RecordSet> {
        let url = self.resource_url(table, None, Some(options));
        let response = self.send(self.http.get(url)).await?.error_for_status()?;
        response.json()
    }

    /// Fetch one record by key
    pub async fn get_by_key(&self, table: &str, key: &str, options: &RecordOptions) -> Result<Record> {
        let url = self.resource_url(table, Some(key), Some(&QueryOptions::from(options)));
        let response = self.send(self.http.get(url)).await?.error_for_status()?;
        response.json()
    }

    /// Create a record and return it as stored
    pub async fn create(&self, table: &str, fields: &Record) -> Result<Record> {
        let url = self.resource_url(table, None, None);
        let response = self.send(self.http.post(url).json(fields)).await?.error_for_status()?;

        if response.body.trim().is_empty() {
            return Ok(Record::new());
        }
        response.json()
    }

    pub async fn update(&self, table: &str, key: &str, fields: &Record) -> Result<()> {
        let url = self.resource_url(table, Some(key), None);
        self.send(self.http.patch(url).json(fields)).await?.error_for_status()?;
        Ok(())
    }

    pub async fn delete(&self, table: &str, key: &str) -> Result<()> {
        let url = self.resource_url(table, Some(key), None);
        self.send(self.http.delete(url)).await?.error_for_status()?;
        Ok(())
    }

    /// Number of records matching an optional filter
    pub async fn count(&self, table: &str, filter: Option<&str>) -> Result<u64> {
        let mut url = format!("{}/{table}/$count", self.base_url);
        if let Some(query) = QueryOptions::filtered(filter.map(str::to_string)).to_query_string() {
            url.push('?');
            url.push_str(&query);
        }

        let response = self.send(self.http.get(url)).await?.error_for_status()?;
        let body = response.body.trim();
        body.parse().map_err(|_| {
            FmodataError::invalid_response(format!("Count response is not a number: {body:?}"))
        })
    }

    /// Run operations one after another; a failure never stops the rest
    pub async fn batch(&self, operations: &[BatchOperation]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(operations.len());

        for operation in operations {
            let outcome = match self.batch_url(&operation.url) {
                Ok(url) => self.run_batch_operation(operation, url).await,
                Err(e) => {
                    tracing::warn!(url = %operation.url, "Batch operation outside the service rejected");
                    BatchOutcome {
                        success: false,
                        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                        data: None,
                        error: Some(e.message()),
                    }
                }
            };

            tracing::debug!(
                method = ?operation.method,
                url = %operation.url,
                status = outcome.status,
                "Batch operation finished"
            );
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_batch_operation(&self, operation: &BatchOperation, url: String) -> BatchOutcome {
        let mut request = self.http.request(operation.method.http_method(), url);
        if let Some(data) = &operation.data {
            request = request.json(data);
        }

        match self.send(request).await {
            Ok(raw) if raw.status.is_success() => BatchOutcome {
                success: true,
                status: raw.status.as_u16(),
                data: body_value(&raw.body),
                error: None,
            },
            Ok(raw) => BatchOutcome {
                success: false,
                status: raw.status.as_u16(),
                data: None,
                error: Some(remote_error_from(raw.status, &raw.body).message()),
            },
            Err(e) => BatchOutcome {
                success: false,
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                data: None,
                error: Some(e.message()),
            },
        }
    }

    /// Whether the service document can be fetched
    pub async fn test_connection(&self) -> bool {
        match self.get_service_document().await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(base_url = %self.base_url, error = %e, "Connection test failed");
                false
            }
        }
    }

    /// Resolve a batch URL against the base address
    ///
    /// Absolute URLs must stay under the base address; the auth header goes with every request.
    fn batch_url(&self, url: &str) -> Result<String> {
        if !is_absolute(url) {
            return Ok(format!("{}/{}", self.base_url, url.trim_start_matches('/')));
        }

        match url.strip_prefix(self.base_url.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?']) => Ok(url.to_string()),
            _ => Err(FmodataError::validation_error(format!(
                "Batch URL {url} is outside the service at {}",
                self.base_url
            ))),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<RawResponse> {
        let request = request.build().map_err(|e| FmodataError::request_failed(e.to_string()))?;
        tracing::debug!(method = %request.method(), url = %request.url(), "OData request");

        let response = self.http.execute(request).await.map_err(classify_send_error)?;
        let status = response.status();
        let body = response.text().await.map_err(|e| FmodataError::transport_error(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "OData request failed");
        }

        Ok(RawResponse { status, body })
    }
}

fn is_absolute(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// `{server}/fmi/odata/v4/{database}` with trailing slashes on the server trimmed
pub fn base_url(server: &str, database: &str) -> String {
    format!("{}/{ODATA_PATH}/{database}", server.trim_end_matches('/'))
}

fn classify_send_error(err: reqwest::Error) -> FmodataError {
    if err.is_builder() {
        FmodataError::request_failed(err.to_string())
    } else {
        FmodataError::transport_error(err.to_string())
    }
}

fn remote_error_from(status: StatusCode, body: &str) -> FmodataError {
    if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) {
        let code = match error.code {
            Value::String(code) => code,
            other => other.to_string(),
        };
        return FmodataError::remote_error(code, error.message);
    }

    FmodataError::remote_error(
        status.as_u16().to_string(),
        status.canonical_reason().unwrap_or("Unknown Status"),
    )
}

fn body_value(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client(server: &str) -> ODataClient {
        let params = ConnectionParams {
            server: server.to_string(),
            database: "TestDB".to_string(),
            user: "admin".to_string(),
            password: "password".to_string(),
        };
        ODataClient::new(&params, ClientOptions::default()).unwrap()
    }

    #[test]
    fn test_base_url_trims_trailing_slashes() {
        assert_eq!(base_url("https://fms.example.com", "Sales"), "https://fms.example.com/fmi/odata/v4/Sales");
        assert_eq!(base_url("https://fms.example.com//", "Sales"), "https://fms.example.com/fmi/odata/v4/Sales");
    }

    #[test]
    fn test_resource_urls() {
        let client = client("https://test-server.com/");
        let base = "https://test-server.com/fmi/odata/v4/TestDB";

        assert_eq!(client.base_url(), base);
        assert_eq!(client.resource_url("contact", None, None), format!("{base}/contact"));
        assert_eq!(client.resource_url("contact", Some("42"), None), format!("{base}/contact('42')"));

        let options = QueryOptions { top: Some(5), ..QueryOptions::default() };
        assert_eq!(
            client.resource_url("contact", None, Some(&options)),
            format!("{base}/contact?$top=5")
        );
        assert_eq!(
            client.resource_url("contact", None, Some(&QueryOptions::default())),
            format!("{base}/contact")
        );
    }

    #[test]
    fn test_batch_url_resolution() {
        let client = client("https://test-server.com");

        let base = "https://test-server.com/fmi/odata/v4/TestDB";

        assert_eq!(client.batch_url("contact('1')").unwrap(), format!("{base}/contact('1')"));
        assert_eq!(client.batch_url("/contact").unwrap(), format!("{base}/contact"));
        assert_eq!(client.batch_url(&format!("{base}/contact")).unwrap(), format!("{base}/contact"));
        assert_eq!(client.batch_url(base).unwrap(), base);
    }

    #[test]
    fn test_batch_url_stays_on_service() {
        let client = client("https://test-server.com");

        for url in [
            "https://other/x",
            "http://test-server.com/fmi/odata/v4/TestDB/contact",
            "https://test-server.com/fmi/odata/v4/TestDB2/contact",
            "https://test-server.com.evil/fmi/odata/v4/TestDB/contact",
            "ftp://test-server.com/fmi/odata/v4/TestDB",
        ] {
            let err = client.batch_url(url).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_INPUT", "{url}");
        }
    }

    #[test]
    fn test_construction_keeps_options() {
        let params = ConnectionParams {
            server: "https://s".to_string(),
            database: "D".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        };
        let options = ClientOptions { verify_ssl: false, timeout: Duration::from_secs(5) };
        let client = ODataClient::new(&params, options).unwrap();

        assert_eq!(client.options(), options);
        assert_eq!(client.server(), "https://s");
        assert_eq!(client.database(), "D");
        assert_eq!(client.user(), "u");
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", client("https://s"));
        assert!(!debug.contains("\"password\""));
        assert!(!debug.contains("YWRtaW46cGFzc3dvcmQ="));
        assert!(debug.contains(PASSWORD_MASK));
    }

    #[test]
    fn test_structured_remote_error() {
        let body = r#"{"error":{"code":"-1020","message":"Table 'nope' is not defined"}}"#;
        let err = remote_error_from(StatusCode::NOT_FOUND, body);

        match err {
            FmodataError::RemoteError { code, message } => {
                assert_eq!(code, "-1020");
                assert_eq!(message, "Table 'nope' is not defined");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_numeric_remote_error_code() {
        let body = r#"{"error":{"code":8309,"message":"Bad filter"}}"#;
        let err = remote_error_from(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.message(), "OData error [8309]: Bad filter");
    }

    #[test]
    fn test_unstructured_remote_error() {
        let err = remote_error_from(StatusCode::SERVICE_UNAVAILABLE, "<html>down</html>");
        assert_eq!(err.message(), "OData error [503]: Service Unavailable");
    }

    #[test]
    fn test_record_set_deserialization() {
        let json = r#"{
            "@odata.context": "https://s/fmi/odata/v4/DB/$metadata#contact",
            "@odata.count": 100,
            "value": [{"id": 1, "name": "Ada"}, {"id": 2, "name": "Grace"}]
        }"#;
        let set: RecordSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.count, Some(100));
        assert_eq!(set.value.len(), 2);
        let keys: Vec<_> = set.value[0].keys().cloned().collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn test_record_set_without_count() {
        let set: RecordSet = serde_json::from_str(r#"{"value": []}"#).unwrap();
        assert_eq!(set.count, None);
        assert_eq!(set.context, "");
    }

    #[test]
    fn test_batch_operation_parsing() {
        let op: BatchOperation =
            serde_json::from_str(r#"{"method":"PATCH","url":"contact('1')","data":{"a":1}}"#).unwrap();
        assert_eq!(op.method, BatchMethod::Patch);
        assert!(serde_json::from_str::<BatchOperation>(r#"{"method":"PUT","url":"x"}"#).is_err());
    }

    #[test]
    fn test_body_value() {
        assert_eq!(body_value(""), None);
        assert_eq!(body_value("{\"a\":1}"), Some(serde_json::json!({"a": 1})));
        assert_eq!(body_value("plain"), Some(Value::String("plain".to_string())));
    }
}
