//! Google Sheets v4 backend for the accomplishments table.
//!
//! The connection (HTTP client + credentials) is built lazily on first use and
//! kept for the life of the process. A failed connection attempt is not cached:
//! the next call starts from scratch.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::config::{SheetsAuth, SheetsConfig};
use crate::store::backend::TableBackend;
use crate::store::StoreError;

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Tokens are refreshed this long before Google says they expire.
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GoogleSheetsBackend {
    config: SheetsConfig,
    connection: OnceCell<SheetsConnection>,
}

struct SheetsConnection {
    client: Client,
    tokens: TokenSource,
}

enum TokenSource {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// The subset of a Google service-account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

impl GoogleSheetsBackend {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<&SheetsConnection, StoreError> {
        self.connection
            .get_or_try_init(|| async {
                info!(
                    "Connecting to spreadsheet {} (tab '{}')",
                    self.config.spreadsheet_id, self.config.sheet_name
                );
                let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
                let tokens = match &self.config.auth {
                    SheetsAuth::StaticToken(token) => TokenSource::Static(token.clone()),
                    SheetsAuth::ServiceAccountFile(path) => TokenSource::ServiceAccount {
                        key: load_service_account(path)?,
                        cached: Mutex::new(None),
                    },
                };
                Ok::<_, StoreError>(SheetsConnection { client, tokens })
            })
            .await
    }

    /// Quoted tab title for A1 notation: `'My Sheet'`.
    fn quoted_sheet(&self) -> String {
        format!("'{}'", self.config.sheet_name.replace('\'', "''"))
    }

    /// Builds `{base}/spreadsheets/{id}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| StoreError::Malformed(format!("invalid Sheets base URL: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Malformed("Sheets base URL cannot be a base".into()))?;
            path.pop_if_empty();
            path.push("spreadsheets");
            path.push(&self.config.spreadsheet_id);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let connection = self.connection().await?;
        let token = connection.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        check_status(response).await
    }
}

impl SheetsConnection {
    async fn access_token(&self) -> Result<String, StoreError> {
        match &self.tokens {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount { key, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.access_token.clone());
                    }
                }
                let fresh = self.fetch_token(key).await?;
                let access_token = fresh.access_token.clone();
                *cached = Some(fresh);
                Ok(access_token)
            }
        }
    }

    async fn fetch_token(&self, key: &ServiceAccountKey) -> Result<CachedToken, StoreError> {
        let assertion = sign_assertion(key, chrono::Utc::now().timestamp())?;
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response = check_status(response)
            .await
            .map_err(|e| StoreError::Auth(format!("token exchange failed: {e}")))?;
        let token: TokenResponse = response.json().await?;
        debug!("Obtained Sheets access token valid for {}s", token.expires_in);

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_SLACK);
        Ok(CachedToken {
            access_token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

fn load_service_account(path: &Path) -> Result<ServiceAccountKey, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StoreError::Auth(format!(
            "cannot read service account file {}: {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| StoreError::Auth(format!("invalid service account file: {e}")))
}

/// Signs the RS256 JWT used for the service-account bearer grant.
fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, StoreError> {
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat: now,
        exp: now + 3600,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| StoreError::Auth(format!("invalid service account private key: {e}")))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| StoreError::Auth(format!("failed to sign token request: {e}")))
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// 1-based column index to A1 letters (1 → A, 27 → AA).
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableBackend for GoogleSheetsBackend {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.url(&["values", &self.quoted_sheet()])?;
        let client = &self.connection().await?.client;
        let range: ValueRange = self.authorized(client.get(url)).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn read_header(&self) -> Result<Vec<String>, StoreError> {
        let range = format!("{}!1:1", self.quoted_sheet());
        let url = self.url(&["values", &range])?;
        let client = &self.connection().await?.client;
        let range: ValueRange = self.authorized(client.get(url)).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .next()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .unwrap_or_default())
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError> {
        let range = format!("{}!A1:append", self.quoted_sheet());
        let mut url = self.url(&["values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let client = &self.connection().await?.client;
        self.authorized(client.post(url).json(&json!({ "values": [row] })))
            .await?;
        Ok(())
    }

    async fn update_cells(
        &self,
        row: usize,
        first_col: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError> {
        if row == 0 || first_col == 0 || values.is_empty() {
            return Err(StoreError::Malformed(
                "update needs a 1-based row, column and at least one value".into(),
            ));
        }
        let last_col = first_col + values.len() - 1;
        let range = format!(
            "{}!{}{row}:{}{row}",
            self.quoted_sheet(),
            column_letter(first_col),
            column_letter(last_col)
        );
        let mut url = self.url(&["values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values],
        });
        let client = &self.connection().await?.client;
        self.authorized(client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_row(&self, row: usize) -> Result<(), StoreError> {
        if row == 0 {
            return Err(StoreError::Malformed("rows are 1-based".into()));
        }
        let batch = format!("{}:batchUpdate", self.config.spreadsheet_id);
        let mut url = self.url(&[])?;
        // batchUpdate lives on the spreadsheet segment itself: `/spreadsheets/{id}:batchUpdate`.
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed("Sheets base URL cannot be a base".into()))?
            .pop()
            .push(&batch);
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": self.config.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row - 1,
                        "endIndex": row,
                    }
                }
            }]
        });
        let client = &self.connection().await?.client;
        self.authorized(client.post(url).json(&body)).await?;
        Ok(())
    }
}
