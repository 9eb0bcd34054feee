use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "DeepExtract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed key holding the claim history snapshot in the key-value storage.
pub const STORAGE_KEY: &str = "insurance-claims-history";

/// Gemini 1.5 Flash `generateContent` endpoint.
pub const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

/// Request timeout for a single model call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const ENV_API_KEY: &str = "DEEPEXTRACT_API_KEY";
const ENV_API_URL: &str = "DEEPEXTRACT_API_URL";
const ENV_TIMEOUT_SECS: &str = "DEEPEXTRACT_TIMEOUT_SECS";
const ENV_DB_PATH: &str = "DEEPEXTRACT_DB_PATH";
const ENV_STORAGE_QUOTA: &str = "DEEPEXTRACT_STORAGE_QUOTA_BYTES";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("DEEPEXTRACT_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Cannot determine home directory")]
    NoHomeDir,
}

/// Get the application data directory.
/// ~/DeepExtract/ on all platforms.
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// Default location of the claim history database.
pub fn default_db_path() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join("claims.db"))
}

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,deepextract_lib=debug"
    } else {
        "info"
    }
}

/// Connection settings for the remote generative model.
#[derive(Clone, PartialEq)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl AnalysisConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(&api_key);

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_TIMEOUT_SECS.to_string(),
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

// The key must never end up in logs.
impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Resolve the database path: `DEEPEXTRACT_DB_PATH` or the default location.
pub fn db_path_from_env() -> Result<PathBuf, ConfigError> {
    db_path_from_lookup(|key| std::env::var(key).ok())
}

pub fn db_path_from_lookup<F>(lookup: F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
        Some(path) => Ok(PathBuf::from(path.trim())),
        None => default_db_path(),
    }
}

/// Largest history snapshot storage accepts, from
/// `DEEPEXTRACT_STORAGE_QUOTA_BYTES`. Unset means unlimited.
pub fn storage_quota_from_lookup<F>(lookup: F) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(ENV_STORAGE_QUOTA).filter(|q| !q.trim().is_empty()) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(bytes) if bytes > 0 => Ok(Some(bytes)),
        _ => Err(ConfigError::InvalidValue {
            field: ENV_STORAGE_QUOTA.to_string(),
            value: raw,
        }),
    }
}
