//! ==============================================================================
//! table.rs - azure table storage over plain rest
//! ==============================================================================
//!
//! purpose:
//!     the cloud backend. speaks the table service REST protocol directly
//!     with reqwest instead of pulling in an sdk; we only need three calls:
//!
//!         POST /Tables              create the table (409 = already there)
//!         POST /{table}             insert one entity
//!         GET  /{table}()?$filter   query, following continuation headers
//!
//! entity layout:
//!     PartitionKey  = sensor type
//!     RowKey        = reading id
//!     value         = Edm.Double
//!     location, description
//!     submittedAt   = reading timestamp ("Timestamp" belongs to the service)
//!
//! auth:
//!     Shared Key Lite. the string to sign is
//!
//!         x-ms-date + "\n" + "/" + account + url path
//!
//!     hmac-sha256 with the base64-decoded account key, base64 again, and
//!     sent as `Authorization: SharedKeyLite account:signature`.
//!     connection strings carrying a SharedAccessSignature skip signing and
//!     append the token to every query string instead.
//!
//! ==============================================================================

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use super::{Backend, ReadingStore};
use crate::config::{Credentials, StorageConfig};
use crate::domain::Reading;
use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_JSON: &str = "application/json;odata=nometadata";

// well-known azurite development account
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

const NEXT_PARTITION_HEADER: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_HEADER: &str = "x-ms-continuation-nextrowkey";

#[derive(Debug, Clone, PartialEq)]
enum Auth {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

/// endpoint + auth extracted from credentials
#[derive(Debug, Clone, PartialEq)]
struct Connection {
    endpoint: String,
    auth: Auth,
}

pub struct TableStore {
    client: reqwest::Client,
    endpoint: String,
    table: String,
    auth: Auth,
}

impl TableStore {
    pub fn connect(credentials: &Credentials, config: &StorageConfig) -> StorageResult<Self> {
        let connection = match credentials {
            Credentials::ConnectionString(cs) => parse_connection_string(cs)?,
            Credentials::AccountKey { account, key } => Connection {
                endpoint: format!("https://{}.table.core.windows.net", account),
                auth: Auth::SharedKey {
                    account: account.clone(),
                    key: STANDARD.decode(key.trim())?,
                },
            },
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: connection.endpoint.trim_end_matches('/').to_string(),
            table: config.table_name.clone(),
            auth: connection.auth,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// signed request for `{endpoint}/{resource}?{query}`
    /// `query` must already be percent-encoded
    fn request(&self, method: Method, resource: &str, query: Option<String>) -> StorageResult<RequestBuilder> {
        let mut url = Url::parse(&format!("{}/{}", self.endpoint, resource))
            .map_err(|e| StorageError::InvalidConnectionString(format!("bad endpoint: {}", e)))?;

        let query = match (&self.auth, query) {
            (Auth::Sas(token), Some(q)) => Some(format!("{}&{}", q, token)),
            (Auth::Sas(token), None) => Some(token.clone()),
            (_, q) => q,
        };
        url.set_query(query.as_deref());

        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut builder = self
            .client
            .request(method, url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("Accept", ACCEPT_JSON)
            .header("DataServiceVersion", "3.0;NetFx")
            .header("MaxDataServiceVersion", "3.0;NetFx");

        if let Auth::SharedKey { account, key } = &self.auth {
            let to_sign = string_to_sign(&date, &canonical_resource(account, &url));
            let signature = sign(key, &to_sign)?;
            builder = builder.header("Authorization", format!("SharedKeyLite {}:{}", account, signature));
        }
        Ok(builder)
    }

    async fn post_json(&self, resource: &str, body: &serde_json::Value) -> StorageResult<()> {
        let response = self
            .request(Method::POST, resource, None)?
            .header("Content-Type", "application/json")
            .header("Prefer", "return-no-content")
            .json(body)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    pub async fn create_table(&self) -> StorageResult<()> {
        self.post_json("Tables", &serde_json::json!({ "TableName": self.table }))
            .await
    }

    pub async fn insert_entity(&self, reading: &Reading) -> StorageResult<()> {
        self.post_json(&self.table, &to_entity(reading)).await
    }

    /// every page of a (possibly filtered) query
    pub async fn query_entities(&self, partition: Option<&str>) -> StorageResult<Vec<Reading>> {
        let resource = format!("{}()", self.table);
        let filter = partition.map(|p| format!("$filter={}", urlencoding::encode(&partition_filter(p))));

        let mut readings = Vec::new();
        let mut continuation: Option<(String, Option<String>)> = None;
        loop {
            let mut params: Vec<String> = filter.iter().cloned().collect();
            if let Some((next_partition, next_row)) = &continuation {
                params.push(format!("NextPartitionKey={}", urlencoding::encode(next_partition)));
                if let Some(row) = next_row {
                    params.push(format!("NextRowKey={}", urlencoding::encode(row)));
                }
            }
            let query = (!params.is_empty()).then(|| params.join("&"));

            let response = self.request(Method::GET, &resource, query)?.send().await?;
            let response = check(response).await?;
            continuation = next_page(response.headers());

            let page: QueryPage = serde_json::from_slice(&response.bytes().await?)?;
            readings.extend(page.value.into_iter().filter_map(StoredEntity::into_reading));

            if continuation.is_none() {
                return Ok(readings);
            }
        }
    }
}

#[async_trait]
impl ReadingStore for TableStore {
    async fn ensure_ready(&self) -> StorageResult<()> {
        match self.create_table().await {
            Ok(()) => {
                tracing::info!("Azure table '{}' created", self.table);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                tracing::info!("Azure table '{}' already exists", self.table);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, reading: &Reading) -> StorageResult<()> {
        self.insert_entity(reading).await
    }

    async fn list(&self, sensor_type: Option<&str>) -> StorageResult<Vec<Reading>> {
        self.query_entities(sensor_type).await
    }

    fn backend(&self) -> Backend {
        Backend::Cloud
    }
}

// ==============================================================================
// connection strings
// ==============================================================================

fn parse_connection_string(cs: &str) -> StorageResult<Connection> {
    let mut protocol = "https".to_string();
    let mut suffix = "core.windows.net".to_string();
    let mut account = None;
    let mut key = None;
    let mut table_endpoint = None;
    let mut sas = None;

    for part in cs.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = part.split_once('=').ok_or_else(|| {
            StorageError::InvalidConnectionString(format!("segment '{}' has no '='", part))
        })?;
        match name.to_ascii_lowercase().as_str() {
            "usedevelopmentstorage" if value.eq_ignore_ascii_case("true") => {
                return Ok(Connection {
                    endpoint: DEV_TABLE_ENDPOINT.to_string(),
                    auth: Auth::SharedKey {
                        account: DEV_ACCOUNT.to_string(),
                        key: STANDARD.decode(DEV_ACCOUNT_KEY)?,
                    },
                });
            }
            "defaultendpointsprotocol" => protocol = value.to_string(),
            "endpointsuffix" => suffix = value.to_string(),
            "accountname" => account = Some(value.to_string()),
            "accountkey" => key = Some(value.to_string()),
            "tableendpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
            "sharedaccesssignature" => sas = Some(value.trim_start_matches('?').to_string()),
            _ => {}
        }
    }

    let endpoint = match (table_endpoint, &account) {
        (Some(endpoint), _) => endpoint,
        (None, Some(account)) => format!("{}://{}.table.{}", protocol, account, suffix),
        (None, None) => {
            return Err(StorageError::InvalidConnectionString(
                "needs AccountName or TableEndpoint".to_string(),
            ))
        }
    };

    let auth = match (account, key, sas) {
        (Some(account), Some(key), _) => Auth::SharedKey {
            account,
            key: STANDARD.decode(key)?,
        },
        (_, _, Some(token)) => Auth::Sas(token),
        _ => {
            return Err(StorageError::InvalidConnectionString(
                "needs AccountName + AccountKey or SharedAccessSignature".to_string(),
            ))
        }
    };

    Ok(Connection { endpoint, auth })
}

// ==============================================================================
// signing
// ==============================================================================

/// `/account/path`; emulator urls already carry the account in the path,
/// which then appears twice
fn canonical_resource(account: &str, url: &Url) -> String {
    format!("/{}{}", account, url.path())
}

fn string_to_sign(date: &str, canonical_resource: &str) -> String {
    format!("{}\n{}", date, canonical_resource)
}

fn sign(key: &[u8], to_sign: &str) -> StorageResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::InvalidConnectionString(format!("account key: {}", e)))?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

// ==============================================================================
// queries
// ==============================================================================

/// odata string literals escape a quote by doubling it
fn partition_filter(partition: &str) -> String {
    format!("PartitionKey eq '{}'", partition.replace('\'', "''"))
}

fn next_page(headers: &HeaderMap) -> Option<(String, Option<String>)> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header(NEXT_PARTITION_HEADER).map(|partition| (partition, header(NEXT_ROW_HEADER)))
}

// ==============================================================================
// entities
// ==============================================================================

fn to_entity(reading: &Reading) -> serde_json::Value {
    serde_json::json!({
        "PartitionKey": reading.sensor_type,
        "RowKey": reading.id,
        "value": reading.value,
        "value@odata.type": "Edm.Double",
        "location": reading.location,
        "description": reading.description,
        "submittedAt": reading.timestamp,
    })
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(default)]
    value: Vec<StoredEntity>,
}

#[derive(Deserialize, Debug)]
struct StoredEntity {
    #[serde(rename = "PartitionKey")]
    partition_key: String,
    #[serde(rename = "RowKey")]
    row_key: String,
    /// service-maintained last-modified time
    #[serde(rename = "Timestamp", default)]
    service_timestamp: Option<String>,
    /// usually a number; rows written by older clients may hold text
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "submittedAt", default)]
    submitted_at: Option<String>,
    /// older rows stored the reading time under this name
    #[serde(default)]
    timestamp: Option<String>,
}

impl StoredEntity {
    /// None for rows whose value is not a finite number
    fn into_reading(self) -> Option<Reading> {
        let value = match &self.value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite());

        let Some(value) = value else {
            tracing::warn!(
                "skipping row {}/{}: value {} is not a number",
                self.partition_key,
                self.row_key,
                self.value
            );
            return None;
        };

        Some(Reading {
            id: self.row_key,
            sensor_type: self.partition_key,
            value,
            location: self.location,
            description: self.description,
            timestamp: self
                .submitted_at
                .or(self.timestamp)
                .or(self.service_timestamp)
                .unwrap_or_default(),
        })
    }
}

// ==============================================================================
// responses
// ==============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "odata.error")]
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    value: String,
}

/// turn a non-2xx response into StorageError::Service
async fn check(response: reqwest::Response) -> StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(service_error(status.as_u16(), &body))
}

fn service_error(status: u16, body: &str) -> StorageError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => StorageError::Service {
            status,
            code: parsed.error.code,
            // the service appends "\nRequestId:...\nTime:..." to messages
            message: parsed
                .error
                .message
                .value
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        },
        Err(_) => StorageError::Service {
            status,
            code: "Unknown".to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_key_auth(conn: &Connection) -> (&str, &[u8]) {
        match &conn.auth {
            Auth::SharedKey { account, key } => (account.as_str(), key.as_slice()),
            Auth::Sas(_) => panic!("expected shared key auth"),
        }
    }

    #[test]
    fn standard_connection_string() {
        let conn = parse_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=sensors;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
        )
        .unwrap();

        assert_eq!(conn.endpoint, "https://sensors.table.core.windows.net");
        let (account, key) = account_key_auth(&conn);
        assert_eq!(account, "sensors");
        assert_eq!(key, b"secret");
    }

    #[test]
    fn sovereign_cloud_suffix_and_trailing_semicolon() {
        let conn = parse_connection_string(
            "AccountName=sensors;AccountKey=c2VjcmV0;EndpointSuffix=core.chinacloudapi.cn;",
        )
        .unwrap();
        assert_eq!(conn.endpoint, "https://sensors.table.core.chinacloudapi.cn");
    }

    #[test]
    fn explicit_table_endpoint_wins() {
        let conn = parse_connection_string(
            "AccountName=sensors;AccountKey=c2VjcmV0;TableEndpoint=https://custom.example.net/",
        )
        .unwrap();
        assert_eq!(conn.endpoint, "https://custom.example.net");
    }

    #[test]
    fn development_storage() {
        let conn = parse_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(conn.endpoint, DEV_TABLE_ENDPOINT);
        let (account, _) = account_key_auth(&conn);
        assert_eq!(account, DEV_ACCOUNT);
    }

    #[test]
    fn shared_access_signature() {
        let conn = parse_connection_string(
            "TableEndpoint=https://sensors.table.core.windows.net;SharedAccessSignature=?sv=2019-02-02&sig=abc",
        )
        .unwrap();
        assert_eq!(conn.auth, Auth::Sas("sv=2019-02-02&sig=abc".into()));
    }

    #[test]
    fn incomplete_connection_strings_are_rejected() {
        let err = parse_connection_string("AccountName=sensors").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConnectionString(_)));

        let err = parse_connection_string("AccountKey=c2VjcmV0").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConnectionString(_)));

        let err = parse_connection_string("garbage").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConnectionString(_)));
    }

    #[test]
    fn bad_account_key_is_a_decode_error() {
        let err = parse_connection_string("AccountName=a;AccountKey=%%%").unwrap_err();
        assert!(matches!(err, StorageError::InvalidAccountKey(_)));
    }

    #[test]
    fn canonical_resource_for_host_and_path_style() {
        let host = Url::parse("https://sensors.table.core.windows.net/sensorData()").unwrap();
        assert_eq!(canonical_resource("sensors", &host), "/sensors/sensorData()");

        let emulator = Url::parse("http://127.0.0.1:10002/devstoreaccount1/Tables").unwrap();
        assert_eq!(
            canonical_resource(DEV_ACCOUNT, &emulator),
            "/devstoreaccount1/devstoreaccount1/Tables"
        );
    }

    #[test]
    fn signature_is_hmac_of_date_and_resource() {
        let date = "Sat, 17 Oct 2026 10:00:00 GMT";
        let to_sign = string_to_sign(date, "/sensors/Tables");
        assert_eq!(to_sign, "Sat, 17 Oct 2026 10:00:00 GMT\n/sensors/Tables");

        let signature = sign(b"secret", &to_sign).unwrap();
        let raw = STANDARD.decode(&signature).unwrap();
        assert_eq!(raw.len(), 32);

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(to_sign.as_bytes());
        mac.verify_slice(&raw).unwrap();
    }

    #[test]
    fn partition_filter_escapes_quotes() {
        assert_eq!(partition_filter("aqi"), "PartitionKey eq 'aqi'");
        assert_eq!(partition_filter("o'brien"), "PartitionKey eq 'o''brien'");
        assert_eq!(
            urlencoding::encode(&partition_filter("aqi")),
            "PartitionKey%20eq%20%27aqi%27"
        );
    }

    #[test]
    fn continuation_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);

        headers.insert(NEXT_PARTITION_HEADER, "1!8!YWFp".parse().unwrap());
        headers.insert(NEXT_ROW_HEADER, "1!16!MTcw".parse().unwrap());
        assert_eq!(
            next_page(&headers),
            Some(("1!8!YWFp".to_string(), Some("1!16!MTcw".to_string())))
        );
    }

    #[test]
    fn entity_layout() {
        let reading = Reading {
            id: "1760695200000".into(),
            sensor_type: "aqi".into(),
            value: 45.0,
            location: "Test Location".into(),
            description: String::new(),
            timestamp: "2026-10-17T10:00:00.000Z".into(),
        };
        let entity = to_entity(&reading);
        assert_eq!(entity["PartitionKey"], "aqi");
        assert_eq!(entity["RowKey"], "1760695200000");
        assert_eq!(entity["value@odata.type"], "Edm.Double");
        assert_eq!(entity["submittedAt"], "2026-10-17T10:00:00.000Z");
    }

    #[test]
    fn stored_entities_map_back_to_readings() {
        let page: QueryPage = serde_json::from_str(
            r#"{"value": [
                {"PartitionKey": "aqi", "RowKey": "1", "Timestamp": "2026-10-17T10:00:01.1234567Z",
                 "value": 45.5, "location": "Roof", "description": "d", "submittedAt": "2026-10-17T10:00:00.000Z"},
                {"PartitionKey": "aqi", "RowKey": "2", "Timestamp": "2026-10-17T11:00:00Z",
                 "value": 12, "location": "Yard", "timestamp": "2026-10-17T10:59:59.000Z"},
                {"PartitionKey": "noise", "RowKey": "3", "Timestamp": "2026-10-17T12:00:00Z",
                 "value": 70.1, "location": "Street"}
            ]}"#,
        )
        .unwrap();

        let readings: Vec<Reading> = page.value.into_iter().filter_map(StoredEntity::into_reading).collect();
        assert_eq!(readings[0].timestamp, "2026-10-17T10:00:00.000Z");
        assert_eq!(readings[0].description, "d");
        assert_eq!(readings[1].value, 12.0);
        assert_eq!(readings[1].timestamp, "2026-10-17T10:59:59.000Z");
        assert_eq!(readings[1].description, "");
        assert_eq!(readings[2].sensor_type, "noise");
        assert_eq!(readings[2].timestamp, "2026-10-17T12:00:00Z");
    }

    #[test]
    fn service_errors_are_parsed() {
        let body = r#"{"odata.error":{"code":"TableAlreadyExists","message":{"lang":"en-US","value":"The table specified already exists.\nRequestId:abc\nTime:2026-10-17T10:00:00Z"}}}"#;
        let err = service_error(409, body);
        assert!(err.is_conflict());
        match err {
            StorageError::Service { code, message, .. } => {
                assert_eq!(code, "TableAlreadyExists");
                assert_eq!(message, "The table specified already exists.");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = service_error(500, "<html>oops</html>");
        assert!(matches!(err, StorageError::Service { status: 500, .. }));
    }

    #[test]
    fn rows_with_non_numeric_values_are_skipped() {
        let page: QueryPage = serde_json::from_str(
            r#"{"value": [
                {"PartitionKey": "aqi", "RowKey": "1", "value": "NaN", "location": "Roof"},
                {"PartitionKey": "aqi", "RowKey": "2", "value": "12.5", "location": "Roof"},
                {"PartitionKey": "aqi", "RowKey": "3", "location": "Roof"},
                {"PartitionKey": "aqi", "RowKey": "4", "value": 7, "location": "Roof"}
            ]}"#,
        )
        .unwrap();

        let readings: Vec<Reading> = page.value.into_iter().filter_map(StoredEntity::into_reading).collect();
        let ids: Vec<_> = readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["2", "4"]);
        assert_eq!(readings[0].value, 12.5);
    }

    // ==========================================================================
    // local stand-in for the table service
    // ==========================================================================

    use axum::extract::{RawQuery, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Json, Response};
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Seen {
        auth: Vec<String>,
        inserted: Vec<serde_json::Value>,
        queries: Vec<String>,
    }

    type SeenState = Arc<Mutex<Seen>>;

    async fn table_exists() -> Response {
        let body = json!({"odata.error": {
            "code": "TableAlreadyExists",
            "message": {"lang": "en-US", "value": "The table specified already exists."}
        }});
        (StatusCode::CONFLICT, Json(body)).into_response()
    }

    async fn accept_entity(
        State(seen): State<SeenState>,
        headers: axum::http::HeaderMap,
        Json(entity): Json<serde_json::Value>,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut seen = seen.lock().unwrap();
        seen.auth.push(auth);
        seen.inserted.push(entity);
        StatusCode::NO_CONTENT
    }

    /// two pages; the first points at the second through continuation headers
    async fn serve_page(State(seen): State<SeenState>, RawQuery(query): RawQuery) -> Response {
        let query = query.unwrap_or_default();
        seen.lock().unwrap().queries.push(query.clone());

        if query.contains("NextPartitionKey") {
            let page = json!({"value": [
                {"PartitionKey": "aqi", "RowKey": "2", "value": 50.0, "location": "Yard",
                 "description": "", "submittedAt": "2026-10-17T10:00:01.000Z"}
            ]});
            return Json(page).into_response();
        }

        let page = json!({"value": [
            {"PartitionKey": "aqi", "RowKey": "1", "value": 45.5, "location": "Roof",
             "description": "first", "submittedAt": "2026-10-17T10:00:00.000Z"}
        ]});
        (
            [
                (NEXT_PARTITION_HEADER, "1!8!YWFp"),
                (NEXT_ROW_HEADER, "1!4!Mg--"),
            ],
            Json(page),
        )
            .into_response()
    }

    async fn stand_in() -> (TableStore, SeenState) {
        let seen = SeenState::default();
        let router = Router::new()
            .route("/Tables", post(table_exists))
            .route("/sensorData", post(accept_entity))
            .route("/sensorData()", get(serve_page))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let cs = format!("AccountName=a;AccountKey=c2VjcmV0;TableEndpoint=http://{}", addr);
        let store = TableStore::connect(&Credentials::ConnectionString(cs), &StorageConfig::default()).unwrap();
        (store, seen)
    }

    #[tokio::test]
    async fn existing_table_counts_as_ready() {
        let (store, _) = stand_in().await;
        store.ensure_ready().await.unwrap();
        store.ensure_ready().await.unwrap();
    }

    #[tokio::test]
    async fn insert_is_signed_and_carries_the_entity() {
        let (store, seen) = stand_in().await;
        let reading = Reading {
            id: "1760695200000".into(),
            sensor_type: "aqi".into(),
            value: 45.5,
            location: "Test Location".into(),
            description: "Test submission".into(),
            timestamp: "2026-10-17T10:00:00.000Z".into(),
        };
        store.insert(&reading).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.auth[0].starts_with("SharedKeyLite a:"));
        assert_eq!(seen.inserted[0]["PartitionKey"], "aqi");
        assert_eq!(seen.inserted[0]["RowKey"], "1760695200000");
        assert_eq!(seen.inserted[0]["value"], 45.5);
    }

    #[tokio::test]
    async fn query_follows_continuation_pages() {
        let (store, seen) = stand_in().await;
        let readings = store.list(Some("aqi")).await.unwrap();

        let ids: Vec<_> = readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(readings[0].description, "first");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.queries.len(), 2);
        assert_eq!(seen.queries[0], "$filter=PartitionKey%20eq%20%27aqi%27");
        assert!(seen.queries[1].starts_with("$filter=PartitionKey%20eq%20%27aqi%27&"));
        assert!(seen.queries[1].contains("NextPartitionKey=1%218%21YWFp"));
        assert!(seen.queries[1].contains("NextRowKey=1%214%21Mg--"));
    }
}
