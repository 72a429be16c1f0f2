//! Environment configuration.
//!
//! Variables (all optional):
//! - `BIND_HOST` / `PORT`: listen address (default `127.0.0.1:8080`)
//! - `MODEL_PATH`: ONNX checkpoint file or checkpoint directory (default `model.onnx`)
//! - `UPLOAD_DIR`: parent directory for per-request upload folders (default: OS temp dir)
//! - `MAX_UPLOAD_BYTES`: largest accepted image (default 10 MiB)
//! - `FDC_API_KEY`: USDA `FoodData` Central key (default `DEMO_KEY`)
//! - `FDC_BASE_URL`: FDC API root (default `https://api.nal.usda.gov/fdc/v1`)
//! - `FDC_TIMEOUT_SECS`: per-request timeout for FDC calls (default 10)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::errors::ConfigError;

pub const DEFAULT_FDC_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";
pub const DEMO_API_KEY: &str = "DEMO_KEY";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_FDC_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct FdcConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub fdc: FdcConfig,
}

/// Merge `.env` into the process environment, if one exists. Variables
/// already set take precedence. Must run before anything reads the
/// environment, logging setup included.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl ServerConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("FDC_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| {
                warn!("FDC_API_KEY not set, using the rate-limited {DEMO_API_KEY}");
                DEMO_API_KEY.to_owned()
            });

        let base_url = parse_base_url(
            lookup("FDC_BASE_URL").unwrap_or_else(|| DEFAULT_FDC_BASE_URL.to_owned()),
        )?;

        let timeout_secs: u64 = parse_var(&lookup, "FDC_TIMEOUT_SECS", DEFAULT_FDC_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "FDC_TIMEOUT_SECS",
                value: "0".into(),
                reason: "timeout must be at least one second".into(),
            });
        }

        Ok(Self {
            host: lookup("BIND_HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            port: parse_var(&lookup, "PORT", 8080)?,
            model_path: lookup("MODEL_PATH").map_or_else(|| PathBuf::from("model.onnx"), PathBuf::from),
            upload_dir: lookup("UPLOAD_DIR").map_or_else(env::temp_dir, PathBuf::from),
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            fdc: FdcConfig {
                api_key,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_base_url(raw: String) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "FDC_BASE_URL",
        value: raw.clone(),
        reason,
    };

    let url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".into()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_path, PathBuf::from("model.onnx"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.fdc.api_key, DEMO_API_KEY);
        assert_eq!(config.fdc.base_url.as_str(), DEFAULT_FDC_BASE_URL);
        assert_eq!(config.fdc.timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("PORT", "5000"),
            ("MODEL_PATH", "/models/food101"),
            ("FDC_API_KEY", "secret"),
            ("FDC_TIMEOUT_SECS", " 3 "),
            ("MAX_UPLOAD_BYTES", "2048"),
        ])
        .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.model_path, PathBuf::from("/models/food101"));
        assert_eq!(config.fdc.api_key, "secret");
        assert_eq!(config.fdc.timeout, Duration::from_secs(3));
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(config(&[("FDC_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("FDC_BASE_URL", "not a url")]).is_err());
        assert!(config(&[("FDC_BASE_URL", "mailto:fdc@usda.gov")]).is_err());
    }
}
