use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::metric::Aggregation;
use crate::data::synthetic::Preset;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "WATER_DASH_CONFIG";
/// Config file looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "water-dash.json";

/// Dashboard settings. Every field is optional in the file.
///
/// ```json
/// { "preset": "country_comparison", "seed": 21, "aggregation": "ratio_of_sums" }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Synthetic dataset shown when no data file is loaded.
    pub preset: Preset,
    /// Overrides the preset's seed.
    pub seed: Option<u64>,
    /// CSV / JSON observations loaded at startup instead of synthetic data.
    pub data_file: Option<PathBuf>,
    /// How the overview cards combine rows.
    pub aggregation: Aggregation,
}

impl DashboardConfig {
    /// Load from `$WATER_DASH_CONFIG`, else `./water-dash.json`, else defaults.
    pub fn load() -> Result<Self> {
        let path = config_path(std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match Self::load_optional(&path)? {
            Some(config) => {
                log::info!("using config {}", path.display());
                Ok(config)
            }
            None => {
                log::info!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Parse `path`; a missing file is `Ok(None)`.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| self.preset.seed())
    }
}

fn config_path(from_env: Option<PathBuf>) -> PathBuf {
    from_env.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(DashboardConfig::load_optional(&path).unwrap(), None);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "preset": "country_comparison", "seed": 21 }}"#).unwrap();

        let config = DashboardConfig::load_optional(file.path()).unwrap().unwrap();
        assert_eq!(config.preset, Preset::CountryComparison);
        assert_eq!(config.seed(), 21);
        assert_eq!(config.aggregation, Aggregation::MeanOfRatios);
        assert_eq!(config.data_file, None);
    }

    #[test]
    fn test_seed_defaults_to_preset() {
        let config = DashboardConfig::default();
        assert_eq!(config.seed(), 42);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ preset: ").unwrap();
        let err = DashboardConfig::load_optional(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }

    #[test]
    fn test_config_path_prefers_env() {
        assert_eq!(
            config_path(Some(PathBuf::from("/etc/dash.json"))),
            PathBuf::from("/etc/dash.json")
        );
        assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
