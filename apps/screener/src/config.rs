use std::time::Duration;

use anyhow::{Context, Result};

use crate::extraction::ExtractionConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Absent key means every score uses the keyword fallback.
    pub anthropic_api_key: Option<String>,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub ingest: IngestConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Base for unsigned URLs when presigning fails. Defaults to the endpoint.
    pub public_base_url: Option<String>,
    pub signed_url_ttl: Duration,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_workers: usize,
    pub score_workers: usize,
    pub auto_rejection_threshold: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            score_workers: 4,
            auto_rejection_threshold: 60.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_workers = parse_env("INGEST_MAX_WORKERS", 4usize)?.max(1);

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            storage: StorageConfig {
                bucket: optional_env("S3_BUCKET"),
                endpoint: optional_env("S3_ENDPOINT"),
                region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
                secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
                public_base_url: optional_env("S3_PUBLIC_BASE_URL")
                    .or_else(|| optional_env("S3_ENDPOINT")),
                signed_url_ttl: Duration::from_secs(parse_env("SIGNED_URL_TTL_SECONDS", 604_800u64)?),
                deadline: Duration::from_secs(parse_env("BLOB_DEADLINE_SECONDS", 180u64)?),
            },
            mail: MailConfig {
                tenant_id: optional_env("M365_TENANT_ID"),
                client_id: optional_env("M365_CLIENT_ID"),
                client_secret: optional_env("M365_CLIENT_SECRET"),
                user_id: optional_env("M365_USER_ID").unwrap_or_else(|| "me".to_string()),
            },
            ingest: IngestConfig {
                max_workers,
                score_workers: parse_env("INGEST_SCORE_WORKERS", max_workers)?.max(1),
                auto_rejection_threshold: parse_env("AUTO_REJECTION_THRESHOLD", 60.0f64)?,
            },
            extraction: ExtractionConfig {
                ocr_enabled: parse_env("OCR_ENABLED", true)?,
                pdftoppm_bin: optional_env("PDFTOPPM_BIN").unwrap_or_else(|| "pdftoppm".to_string()),
                tesseract_bin: optional_env("TESSERACT_BIN")
                    .unwrap_or_else(|| "tesseract".to_string()),
                legacy_doc_bin: optional_env("LEGACY_DOC_BIN")
                    .unwrap_or_else(|| "antiword".to_string()),
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
