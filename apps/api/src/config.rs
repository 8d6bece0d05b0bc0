use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// How the service authenticates against the Google Sheets API.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    /// Service-account key file; access tokens are minted via the JWT bearer grant.
    ServiceAccountFile(PathBuf),
    /// Pre-issued OAuth access token (local development, tests).
    StaticToken(String),
}

/// Location of the backing spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    /// Tab title used in A1 ranges.
    pub sheet_name: String,
    /// Numeric tab id used by row deletion.
    pub sheet_id: i64,
    pub auth: SheetsAuth,
}

/// Which table backend the store runs on (`CAREEROS_TABLE_BACKEND`).
#[derive(Debug, Clone)]
pub enum TableConfig {
    Sheets(SheetsConfig),
    /// Process-local rows, lost on restart. Local development only.
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub table: TableConfig,
    /// Absent key leaves the completion client unconfigured rather than failing startup.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub credentials: HashMap<String, String>,
    /// Idle time after which a login session is dropped.
    pub session_ttl_minutes: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let table = match optional_env("CAREEROS_TABLE_BACKEND").as_deref() {
            None | Some("sheets") => TableConfig::Sheets(sheets_from_env()?),
            Some("memory") => TableConfig::Memory,
            Some(other) => bail!("CAREEROS_TABLE_BACKEND must be 'sheets' or 'memory', got '{other}'"),
        };

        let credentials = match optional_env("CAREEROS_CREDENTIALS_FILE") {
            Some(path) => load_credentials_file(Path::new(&path))?,
            None => parse_credentials(&require_env("CAREEROS_CREDENTIALS")?)?,
        };

        Ok(Config {
            table,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            credentials,
            session_ttl_minutes: optional_env("CAREEROS_SESSION_TTL_MINUTES")
                .unwrap_or_else(|| "720".to_string())
                .parse::<u64>()
                .context("CAREEROS_SESSION_TTL_MINUTES must be a whole number of minutes")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn sheets_from_env() -> Result<SheetsConfig> {
    let auth = match (
        optional_env("GOOGLE_SERVICE_ACCOUNT_FILE"),
        optional_env("SHEETS_ACCESS_TOKEN"),
    ) {
        (Some(path), _) => SheetsAuth::ServiceAccountFile(PathBuf::from(path)),
        (None, Some(token)) => SheetsAuth::StaticToken(token),
        (None, None) => bail!(
            "Either GOOGLE_SERVICE_ACCOUNT_FILE or SHEETS_ACCESS_TOKEN must be set"
        ),
    };

    Ok(SheetsConfig {
        base_url: optional_env("SHEETS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_SHEETS_BASE_URL.to_string()),
        spreadsheet_id: require_env("SHEETS_SPREADSHEET_ID")?,
        sheet_name: optional_env("SHEETS_SHEET_NAME")
            .unwrap_or_else(|| "Sheet1".to_string()),
        sheet_id: optional_env("SHEETS_SHEET_ID")
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("SHEETS_SHEET_ID must be an integer")?
            .unwrap_or(0),
        auth,
    })
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parses inline credentials of the form `alice=secret,bob=hunter2`.
pub fn parse_credentials(raw: &str) -> Result<HashMap<String, String>> {
    let mut credentials = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (user, password) = pair
            .split_once('=')
            .with_context(|| format!("Credential entry '{pair}' must look like user=password"))?;
        let user = user.trim();
        if user.is_empty() {
            bail!("Credential entry '{pair}' has an empty username");
        }
        credentials.insert(user.to_string(), password.to_string());
    }
    if credentials.is_empty() {
        bail!("No credentials configured");
    }
    Ok(credentials)
}

/// Loads credentials from a JSON object file: `{"alice": "secret"}`.
pub fn load_credentials_file(path: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    let credentials: HashMap<String, String> = serde_json::from_str(&raw)
        .with_context(|| format!("Credentials file {} is not a JSON object", path.display()))?;
    if credentials.is_empty() {
        bail!("Credentials file {} is empty", path.display());
    }
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_inline_credentials() {
        let creds = parse_credentials("alice=secret, bob=hunter2").unwrap();
        assert_eq!(creds.len(), 2);
        assert_eq!(creds["alice"], "secret");
        assert_eq!(creds["bob"], "hunter2");
    }

    #[test]
    fn test_password_may_contain_equals() {
        let creds = parse_credentials("carol=a=b").unwrap();
        assert_eq!(creds["carol"], "a=b");
    }

    #[test]
    fn test_malformed_credentials_rejected() {
        assert!(parse_credentials("alice").is_err());
        assert!(parse_credentials("=secret").is_err());
        assert!(parse_credentials(" , ").is_err());
    }

    #[test]
    fn test_credentials_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"alice": "secret"}}"#).unwrap();
        let creds = load_credentials_file(file.path()).unwrap();
        assert_eq!(creds["alice"], "secret");
    }

    #[test]
    fn test_credentials_file_must_be_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["alice"]"#).unwrap();
        assert!(load_credentials_file(file.path()).is_err());
    }
}
