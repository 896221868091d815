use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::extraction::prompt::MAX_TEXT_CHARS;
use crate::pipeline::model::gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
use crate::pipeline::model::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};

/// Application-level constants
pub const APP_NAME: &str = "MediSnap";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default model request timeout. Vision inference on CPU is slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Get the application data directory: `<platform data dir>/MediSnap/`.
/// Falls back to the home directory, then the working directory.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medisnap.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medisnap_lib=info,warn"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Ollama,
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_URL,
            Self::Gemini => DEFAULT_GEMINI_URL,
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            _ => Err(ConfigError::InvalidValue {
                key: "MEDISNAP_MODEL_PROVIDER".into(),
                value: s.into(),
            }),
        }
    }
}

/// Runtime configuration, read from `MEDISNAP_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub model_url: String,
    pub timeout_secs: u64,
    pub db_path: PathBuf,
    /// Reuse a completed extraction of the same file instead of calling the model.
    pub fingerprint_dedup: bool,
    pub max_text_chars: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let provider = ModelProvider::Ollama;
        Self {
            provider,
            model: provider.default_model().to_string(),
            model_url: provider.default_url().to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            db_path: default_db_path(),
            fingerprint_dedup: true,
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("MEDISNAP_MODEL_PROVIDER") {
            Some(v) => v.parse()?,
            None => ModelProvider::Ollama,
        };

        Ok(Self {
            provider,
            model: get("MEDISNAP_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            model_url: get("MEDISNAP_MODEL_URL")
                .unwrap_or_else(|| provider.default_url().to_string()),
            timeout_secs: parse_number(get("MEDISNAP_MODEL_TIMEOUT_SECS"), "MEDISNAP_MODEL_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            db_path: get("MEDISNAP_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            fingerprint_dedup: parse_bool(get("MEDISNAP_FINGERPRINT_DEDUP"), "MEDISNAP_FINGERPRINT_DEDUP", true)?,
            max_text_chars: parse_number(get("MEDISNAP_MAX_TEXT_CHARS"), "MEDISNAP_MAX_TEXT_CHARS", MAX_TEXT_CHARS)?,
        })
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

/// Positive integer, or the default when unset.
fn parse_number<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value {
        None => Ok(default),
        Some(v) => match v.trim().parse::<T>() {
            Ok(n) if n > T::default() => Ok(n),
            _ => Err(invalid(key, &v)),
        },
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &v)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("MediSnap"));
        assert!(default_db_path().ends_with("MediSnap/medisnap.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.provider, ModelProvider::Ollama);
        assert_eq!(config.model, "medgemma:4b");
        assert_eq!(config.model_url, "http://localhost:11434");
        assert_eq!(config.timeout_secs, 300);
        assert!(config.fingerprint_dedup);
        assert_eq!(config.max_text_chars, 12_000);
    }

    #[test]
    fn gemini_provider_switches_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("MEDISNAP_MODEL_PROVIDER", "Gemini")])).unwrap();
        assert_eq!(config.provider, ModelProvider::Gemini);
        assert_eq!(config.model, "gemini-2.0-flash-exp");
        assert_eq!(config.model_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("MEDISNAP_MODEL", "medgemma:27b"),
            ("MEDISNAP_MODEL_URL", "http://gpu-box:11434"),
            ("MEDISNAP_MODEL_TIMEOUT_SECS", "60"),
            ("MEDISNAP_DB_PATH", "/tmp/test.db"),
            ("MEDISNAP_FINGERPRINT_DEDUP", "off"),
            ("MEDISNAP_MAX_TEXT_CHARS", "4000"),
        ]))
        .unwrap();
        assert_eq!(config.model, "medgemma:27b");
        assert_eq!(config.model_url, "http://gpu-box:11434");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.db_path, PathBuf::from("/tmp/test.db"));
        assert!(!config.fingerprint_dedup);
        assert_eq!(config.max_text_chars, 4000);
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("MEDISNAP_MODEL", "  ")])).unwrap();
        assert_eq!(config.model, "medgemma:4b");
    }

    #[test]
    fn invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("MEDISNAP_MODEL_PROVIDER", "openai")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MEDISNAP_MODEL_PROVIDER"));

        assert!(AppConfig::from_lookup(lookup(&[("MEDISNAP_MODEL_TIMEOUT_SECS", "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MEDISNAP_MODEL_TIMEOUT_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MEDISNAP_FINGERPRINT_DEDUP", "maybe")])).is_err());
    }
}
