use std::str::FromStr;

use anyhow::{Context, Result};

use crate::resume::sections::canonicalize;
use crate::resume::SectionName;
use crate::tailoring::rewriter::DEFAULT_JD_MAX_CHARS;

const DEFAULT_TAILOR_SECTIONS: &str = "SUMMARY,SKILLS,EXPERIENCE,PROJECTS";
const DEFAULT_PRESERVED_SECTIONS: &str = "KEY SKILLS";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub pdflatex_bin: String,
    pub compile_timeout_secs: u64,
    pub artifact_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub jd_max_chars: usize,
    pub list_max_avg_line_chars: f64,
    /// Sections sent to the rewriter, in substitution order.
    pub tailor_sections: Vec<SectionName>,
    /// Sections re-rendered locally instead of being sent to the model.
    pub preserved_sections: Vec<SectionName>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pdflatex_bin: std::env::var("PDFLATEX_BIN").unwrap_or_else(|_| "pdflatex".to_string()),
            compile_timeout_secs: parse_env("COMPILE_TIMEOUT_SECS", 60)?,
            artifact_ttl_secs: parse_env("ARTIFACT_TTL_SECS", 300)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
            jd_max_chars: parse_env("JD_MAX_CHARS", DEFAULT_JD_MAX_CHARS)?,
            list_max_avg_line_chars: parse_env("LIST_MAX_AVG_LINE_CHARS", 150.0)?,
            tailor_sections: parse_section_list(
                &std::env::var("TAILOR_SECTIONS")
                    .unwrap_or_else(|_| DEFAULT_TAILOR_SECTIONS.to_string()),
            ),
            preserved_sections: parse_section_list(
                &std::env::var("PRESERVED_SECTIONS")
                    .unwrap_or_else(|_| DEFAULT_PRESERVED_SECTIONS.to_string()),
            ),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Comma-separated header spellings → canonical names, duplicates dropped.
pub fn parse_section_list(raw: &str) -> Vec<SectionName> {
    let mut names: Vec<SectionName> = Vec::new();
    for name in raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(canonicalize)
    {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
