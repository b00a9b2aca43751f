use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_API_URL: &str = "http://localhost:3001";
const DEFAULT_STORAGE_DIR: &str = "./.dreamcation";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway origin, no trailing slash
    pub api_base_url: String,
    pub storage_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unusable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base_url = lookup("DREAMCATION_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                log::info!("DREAMCATION_API_URL not set, using default: {DEFAULT_API_URL}");
                DEFAULT_API_URL.to_string()
            });

        let storage_dir = lookup("DREAMCATION_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                log::info!("DREAMCATION_STORAGE_DIR not set, using default: {DEFAULT_STORAGE_DIR}");
                PathBuf::from(DEFAULT_STORAGE_DIR)
            });

        let timeout_secs: u64 = try_load(&lookup, "DREAMCATION_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        Self {
            api_base_url,
            storage_dir,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        log::info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        log::warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
        default
    })
}
