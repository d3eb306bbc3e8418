//! Service credentials and settings file.
//!
//! Credentials come from explicit values or the `AZURE_DI_ENDPOINT` /
//! `AZURE_DI_KEY` environment variables. Tunable thresholds live in an
//! optional TOML file at `~/.config/rag-ready/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::layout::{LayoutError, LayoutSettings};

pub const ENDPOINT_ENV: &str = "AZURE_DI_ENDPOINT";
pub const KEY_ENV: &str = "AZURE_DI_KEY";

/// Endpoint and key of the layout-analysis service.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentIntelligenceConfig {
    pub endpoint: String,
    pub key: String,
    /// Ignore proxy settings from the environment.
    pub no_proxy: bool,
}

impl std::fmt::Debug for DocumentIntelligenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIntelligenceConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("no_proxy", &self.no_proxy)
            .finish()
    }
}

impl DocumentIntelligenceConfig {
    /// Resolve from explicit values, falling back to the process environment.
    pub fn resolve(
        endpoint: Option<&str>,
        key: Option<&str>,
        no_proxy: bool,
    ) -> std::result::Result<Self, LayoutError> {
        Self::resolve_with(endpoint, key, no_proxy, |name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with a custom environment lookup.
    pub fn resolve_with(
        endpoint: Option<&str>,
        key: Option<&str>,
        no_proxy: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, LayoutError> {
        let pick = |explicit: Option<&str>, var: &str| {
            explicit
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| env(var))
                .map(|v| clean_value(&v))
                .unwrap_or_default()
        };

        let endpoint = pick(endpoint, ENDPOINT_ENV).trim_end_matches('/').to_string();
        let key = pick(key, KEY_ENV);
        if endpoint.is_empty() {
            return Err(LayoutError::ConfigMissing(ENDPOINT_ENV));
        }
        if key.is_empty() {
            return Err(LayoutError::ConfigMissing(KEY_ENV));
        }

        let url = Url::parse(&endpoint).map_err(|source| LayoutError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LayoutError::UnsupportedScheme(endpoint));
        }

        Ok(Self {
            endpoint,
            key,
            no_proxy,
        })
    }
}

/// Strip whitespace and the quoting people paste around copied secrets.
fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches('`')
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub layout: LayoutSettings,
}

impl AppConfig {
    /// Load `path`, or the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Default settings file location.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rag-ready")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_values_are_cleaned() {
        let cfg = DocumentIntelligenceConfig::resolve_with(
            Some(" `https://di.example.com/` "),
            Some("\"abc123\""),
            true,
            no_env,
        )
        .unwrap();
        assert_eq!(cfg.endpoint, "https://di.example.com");
        assert_eq!(cfg.key, "abc123");
        assert!(cfg.no_proxy);
    }

    #[test]
    fn falls_back_to_environment() {
        let env = |name: &str| match name {
            ENDPOINT_ENV => Some("https://env.example.com".to_string()),
            KEY_ENV => Some("'k'".to_string()),
            _ => None,
        };
        let cfg = DocumentIntelligenceConfig::resolve_with(None, Some(""), false, env).unwrap();
        assert_eq!(cfg.endpoint, "https://env.example.com");
        assert_eq!(cfg.key, "k");
    }

    #[test]
    fn missing_values_are_reported() {
        let err = DocumentIntelligenceConfig::resolve_with(None, Some("k"), false, no_env).unwrap_err();
        assert!(matches!(err, LayoutError::ConfigMissing(ENDPOINT_ENV)));

        let err = DocumentIntelligenceConfig::resolve_with(Some("https://x.com"), Some("``"), false, no_env)
            .unwrap_err();
        assert!(matches!(err, LayoutError::ConfigMissing(KEY_ENV)));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let err = DocumentIntelligenceConfig::resolve_with(Some("di.example.com"), Some("k"), false, no_env)
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidEndpoint { .. }));

        let err = DocumentIntelligenceConfig::resolve_with(Some("ftp://di.example.com"), Some("k"), false, no_env)
            .unwrap_err();
        assert!(matches!(err, LayoutError::UnsupportedScheme(_)));
    }

    #[test]
    fn debug_hides_key() {
        let cfg = DocumentIntelligenceConfig {
            endpoint: "https://x.com".into(),
            key: "secret".into(),
            no_proxy: false,
        };
        assert!(!format!("{cfg:?}").contains("secret"));
    }

    #[test]
    fn parse_settings_file() {
        let cfg: AppConfig = toml::from_str(
            r#"
[layout]
banner_top_ratio = 0.15
fetch_retries = 5
"#,
        )
        .unwrap();
        assert!((cfg.layout.banner_top_ratio - 0.15).abs() < f64::EPSILON);
        assert_eq!(cfg.layout.fetch_retries, 5);
        assert_eq!(cfg.layout.hash_size, 8);
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[layout]\ndedup_threshold = 0\n").unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().layout.dedup_threshold, 0);
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
