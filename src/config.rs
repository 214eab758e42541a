//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; the engine never consults the
//! environment after that.

use std::env;
use std::path::PathBuf;

use crate::models::geo::GeoPoint;
use crate::services::location::SamplingPolicy;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the trip backend, e.g. `https://convoy.example.com`
    pub backend_base_url: String,
    /// Bearer token for backend calls. Local dev backends run without one.
    pub api_token: Option<String>,
    /// Secret path segment the push channel must use
    pub push_secret: String,
    /// Directory holding the point log and session record
    pub data_dir: PathBuf,
    /// Port the push intake server listens on
    pub port: u16,
    /// Group this node belongs to when it watches trips
    pub group_id: i64,
    /// Home position for approach alerts, if configured
    pub home_point: Option<GeoPoint>,
    /// Minimum movement before a fix is recorded, in meters
    pub sample_distance_meters: f64,
    /// Maximum quiet time between recorded fixes, in seconds
    pub sample_max_interval_secs: i64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:9090".to_string(),
            api_token: None,
            push_secret: "test-push-secret".to_string(),
            data_dir: PathBuf::from("./data"),
            port: 8080,
            group_id: 1,
            home_point: None,
            sample_distance_meters: 5.0,
            sample_max_interval_secs: 8,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            backend_base_url: env::var("BACKEND_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_BASE_URL"))?,
            api_token: env::var("BACKEND_API_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            push_secret: env::var("PUSH_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PUSH_SECRET"))?,
            data_dir: env::var("CONVOY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            group_id: env::var("CONVOY_GROUP_ID")
                .map_err(|_| ConfigError::Missing("CONVOY_GROUP_ID"))?
                .parse()
                .map_err(|_| ConfigError::Invalid("CONVOY_GROUP_ID"))?,
            home_point: home_point_from_env()?,
            sample_distance_meters: parse_or_default("SAMPLE_DISTANCE_METERS", 5.0)?,
            sample_max_interval_secs: parse_or_default("SAMPLE_MAX_INTERVAL_SECS", 8)?,
        })
    }

    /// Sampling policy carried by this node's configuration.
    pub fn sampling_policy(&self) -> SamplingPolicy {
        SamplingPolicy {
            distance_meters: self.sample_distance_meters,
            max_interval: chrono::Duration::seconds(self.sample_max_interval_secs),
        }
    }
}

/// HOME_LAT and HOME_LON must be set together or not at all.
fn home_point_from_env() -> Result<Option<GeoPoint>, ConfigError> {
    let lat = env::var("HOME_LAT").ok();
    let lon = env::var("HOME_LON").ok();
    match (lat, lon) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => {
            let lat: f64 = lat.parse().map_err(|_| ConfigError::Invalid("HOME_LAT"))?;
            let lon: f64 = lon.parse().map_err(|_| ConfigError::Invalid("HOME_LON"))?;
            GeoPoint::new(lat, lon)
                .map(Some)
                .ok_or(ConfigError::Invalid("HOME_LAT/HOME_LON"))
        }
        (Some(_), None) => Err(ConfigError::Missing("HOME_LON")),
        (None, Some(_)) => Err(ConfigError::Missing("HOME_LAT")),
    }
}

fn parse_or_default<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Environment variable has an invalid value: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("BACKEND_BASE_URL", "http://localhost:9090/");
        env::set_var("PUSH_SECRET", "s3cret");
        env::set_var("CONVOY_GROUP_ID", "5");
        env::remove_var("HOME_LAT");
        env::remove_var("HOME_LON");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.backend_base_url, "http://localhost:9090");
        assert_eq!(config.push_secret, "s3cret");
        assert_eq!(config.group_id, 5);
        assert_eq!(config.port, 8080);
        assert!(config.api_token.is_none());
        assert!(config.home_point.is_none());
        assert_eq!(config.sampling_policy().distance_meters, 5.0);
    }
}
