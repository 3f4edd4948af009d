//! Explicit configuration for the upstream clients and the sampling window.
//!
//! Nothing here is global: the binary builds one [`AnalysisConfig`] and hands
//! the relevant values to each client at construction.
//!
//! Stored on disk as JSON:
//! ```json
//! {
//!   "bustracker_api_key": "...",
//!   "pattern_batch_size": 10,
//!   "service_day_start": "02:30",
//!   "service_day_end": "26:30"
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::position_api::ServiceOffset;

pub const DEFAULT_BUSTRACKER_BASE_URL: &str = "http://www.ctabustracker.com/bustime/api/v2";
pub const DEFAULT_POSITIONS_BASE_URL: &str =
    "https://chn-ghost-buses-public.s3.us-east-2.amazonaws.com/bus_full_day_data_v2";
/// The pattern API rejects requests naming more than this many patterns.
pub const DEFAULT_PATTERN_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub bustracker_base_url: String,
    pub bustracker_api_key: String,
    pub pattern_batch_size: usize,
    pub positions_base_url: String,
    /// Empirically tuned: the quietest hour of the CTA network.
    pub service_day_start: ServiceOffset,
    pub service_day_end: ServiceOffset,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bustracker_base_url: DEFAULT_BUSTRACKER_BASE_URL.to_string(),
            bustracker_api_key: String::new(),
            pattern_batch_size: DEFAULT_PATTERN_BATCH_SIZE,
            positions_base_url: DEFAULT_POSITIONS_BASE_URL.to_string(),
            service_day_start: ServiceOffset::hm(2, 30),
            service_day_end: ServiceOffset::hm(26, 30),
        }
    }
}

/// The fields a config file actually sets. Absent fields leave the
/// underlying value alone.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bustracker_base_url: Option<String>,
    bustracker_api_key: Option<String>,
    pattern_batch_size: Option<usize>,
    positions_base_url: Option<String>,
    service_day_start: Option<ServiceOffset>,
    service_day_end: Option<ServiceOffset>,
}

impl FileConfig {
    fn read(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed reading '{path}'"))?;
        serde_json::from_str(&content).with_context(|| format!("failed parsing config '{path}'"))
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`. Missing fields take defaults.
    pub fn load(path: &str) -> Result<Self> {
        Ok(Self::default().merge(FileConfig::read(path)?))
    }

    /// Builds the config from environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("BUSTRACKER_BASE_URL") {
            config.bustracker_base_url = url;
        }
        if let Some(key) = lookup("BUSTRACKER_API_KEY") {
            config.bustracker_api_key = key;
        }
        if let Some(url) = lookup("POSITIONS_BASE_URL") {
            config.positions_base_url = url;
        }
        if let Some(size) = lookup("PATTERN_BATCH_SIZE") {
            config.pattern_batch_size = size
                .parse()
                .with_context(|| format!("PATTERN_BATCH_SIZE is not a number: '{size}'"))?;
        }
        if let Some(start) = lookup("SERVICE_DAY_START") {
            config.service_day_start = start.parse()?;
        }
        if let Some(end) = lookup("SERVICE_DAY_END") {
            config.service_day_end = end.parse()?;
        }

        Ok(config)
    }

    /// Merges a file config over values already taken from the environment.
    /// Only fields present in the file replace them; an empty file key never
    /// replaces a key from the environment.
    pub fn with_file(self, path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Ok(self.merge(FileConfig::read(path)?)),
            None => Ok(self),
        }
    }

    fn merge(mut self, file: FileConfig) -> Self {
        if let Some(url) = file.bustracker_base_url {
            self.bustracker_base_url = url;
        }
        if let Some(key) = file.bustracker_api_key.filter(|k| !k.is_empty()) {
            self.bustracker_api_key = key;
        }
        if let Some(size) = file.pattern_batch_size {
            self.pattern_batch_size = size;
        }
        if let Some(url) = file.positions_base_url {
            self.positions_base_url = url;
        }
        if let Some(start) = file.service_day_start {
            self.service_day_start = start;
        }
        if let Some(end) = file.service_day_end {
            self.service_day_end = end;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.pattern_batch_size, 10);
        assert_eq!(config.service_day_start.to_string(), "02:30");
        assert_eq!(config.service_day_end.to_string(), "26:30");
        assert!(config.bustracker_api_key.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let config = AnalysisConfig::from_lookup(lookup(&[
            ("BUSTRACKER_API_KEY", "abc"),
            ("PATTERN_BATCH_SIZE", "5"),
            ("SERVICE_DAY_START", "03:50"),
        ]))
        .unwrap();

        assert_eq!(config.bustracker_api_key, "abc");
        assert_eq!(config.pattern_batch_size, 5);
        assert_eq!(config.service_day_start, ServiceOffset::hm(3, 50));
    }

    #[test]
    fn test_bad_batch_size_is_error() {
        assert!(AnalysisConfig::from_lookup(lookup(&[("PATTERN_BATCH_SIZE", "ten")])).is_err());
    }

    #[test]
    fn test_load_partial_file_keeps_env_key() {
        let path = format!("{}/bus_headways_test_config.json", std::env::temp_dir().display());
        std::fs::write(&path, r#"{ "service_day_end": "25:00" }"#).unwrap();

        let env = AnalysisConfig::from_lookup(lookup(&[("BUSTRACKER_API_KEY", "abc")])).unwrap();
        let config = env.with_file(Some(&path)).unwrap();

        assert_eq!(config.service_day_end, ServiceOffset::hm(25, 0));
        assert_eq!(config.pattern_batch_size, 10);
        assert_eq!(config.bustracker_api_key, "abc");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_partial_file_keeps_env_service_day_and_batch() {
        let path = format!("{}/bus_headways_test_config_env.json", std::env::temp_dir().display());
        std::fs::write(&path, r#"{ "bustracker_api_key": "k" }"#).unwrap();

        let env = AnalysisConfig::from_lookup(lookup(&[
            ("SERVICE_DAY_START", "03:50"),
            ("SERVICE_DAY_END", "27:00"),
            ("PATTERN_BATCH_SIZE", "5"),
            ("POSITIONS_BASE_URL", "https://mirror.example.com/days"),
        ]))
        .unwrap();
        let config = env.with_file(Some(&path)).unwrap();

        assert_eq!(config.bustracker_api_key, "k");
        assert_eq!(config.service_day_start, ServiceOffset::hm(3, 50));
        assert_eq!(config.service_day_end, ServiceOffset::hm(27, 0));
        assert_eq!(config.pattern_batch_size, 5);
        assert_eq!(config.positions_base_url, "https://mirror.example.com/days");
        assert_eq!(config.bustracker_base_url, DEFAULT_BUSTRACKER_BASE_URL);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_fills_defaults() {
        let path = format!("{}/bus_headways_test_config_load.json", std::env::temp_dir().display());
        std::fs::write(&path, r#"{ "pattern_batch_size": 4 }"#).unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.pattern_batch_size, 4);
        assert_eq!(config.service_day_start, ServiceOffset::hm(2, 30));

        std::fs::remove_file(&path).unwrap();
    }
}
