use std::{env, fmt::Display, path::PathBuf, str::FromStr};

pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
}

impl Config {
    /// Fails only when `JWT_SECRET` is missing
    pub fn load() -> Result<Self, String> {
        Ok(Self {
            port: try_load("ITINERARY_PORT", 8006),
            database_path: PathBuf::from(try_load("ITINERARY_DB", "itinerary.db".to_string())),
            jwt_secret: required("JWT_SECRET")?,
        })
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {key} value: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            log::info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn required(key: &str) -> Result<String, String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{key} must be set"))
}
