//! Pipeline configuration.
//!
//! Every section has defaults, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! [scanner]
//! window_size_days = 365
//! step_size_days = 90
//! min_confidence = 0.7
//!
//! [sampler]
//! draws = 2000
//! seed = 42
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consolidation::ConsolidatorConfig;
use crate::model::{ChangePointConfig, SamplerConfig};
use crate::regime::RegimeLabelerConfig;
use crate::scanner::ScannerConfig;
use crate::validation::{DataQualityConfig, ValidationConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory that relative input paths resolve against.
    pub data_dir: String,
    /// Daily price file (CSV or Parquet).
    pub prices_file: String,
    /// Ground-truth event file (CSV or Parquet).
    pub events_file: String,
    /// Crisis record store (JSON).
    pub crisis_store: String,
    /// Regime day store (JSON).
    pub regime_store: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            prices_file: "prices.csv".to_string(),
            events_file: "events.csv".to_string(),
            crisis_store: "results/crises.json".to_string(),
            regime_store: "results/regimes.json".to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub scanner: ScannerConfig,
    pub model: ChangePointConfig,
    /// Sampler for full scans.
    pub sampler: SamplerConfig,
    /// Sampler for incremental runs.
    pub incremental_sampler: SamplerConfig,
    pub consolidation: ConsolidatorConfig,
    pub labeler: RegimeLabelerConfig,
    pub validation: ValidationConfig,
    pub data_quality: DataQualityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            scanner: ScannerConfig::default(),
            model: ChangePointConfig::default(),
            sampler: SamplerConfig::default(),
            incremental_sampler: SamplerConfig::incremental(),
            consolidation: ConsolidatorConfig::default(),
            labeler: RegimeLabelerConfig::default(),
            validation: ValidationConfig::default(),
            data_quality: DataQualityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scanner = &self.scanner;
        if scanner.window_size_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "window_size_days must be positive, got {}",
                scanner.window_size_days
            )));
        }
        if scanner.step_size_days <= 0 || scanner.step_size_days >= scanner.window_size_days {
            return Err(ConfigError::Invalid(format!(
                "step_size_days must be in (0, {}), got {}",
                scanner.window_size_days, scanner.step_size_days
            )));
        }
        if !(0.0..=1.0).contains(&scanner.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be in [0, 1], got {}",
                scanner.min_confidence
            )));
        }
        if self.sampler.draws == 0 || self.incremental_sampler.draws == 0 {
            return Err(ConfigError::Invalid("draws must be positive".to_string()));
        }
        if self.model.min_volatility_ratio <= 0.0 {
            return Err(ConfigError::Invalid(
                "min_volatility_ratio must be positive".to_string(),
            ));
        }
        if self.consolidation.tolerance_days < 0 || self.validation.tolerance_days < 0 {
            return Err(ConfigError::Invalid(
                "tolerance_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scanner.window_size_days, 365);
        assert_eq!(config.scanner.step_size_days, 90);
        assert_eq!(config.sampler.draws, 2000);
        assert_eq!(config.incremental_sampler.draws, 1000);
        assert_eq!(config.consolidation.tolerance_days, 60);
        assert_eq!(config.labeler.recovery_days, 30);
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [scanner]
            min_confidence = 0.8

            [sampler]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.min_confidence, 0.8);
        assert_eq!(config.scanner.window_size_days, 365);
        assert_eq!(config.sampler.seed, Some(7));
        assert_eq!(config.sampler.tune, 2000);
        assert_eq!(config.incremental_sampler.tune, 1000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml_str("[scanner]\nstep_size_days = 400"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[scanner]\nmin_confidence = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[scanner\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[data]\nprices_file = \"brent.csv\"\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.data.prices_file, "brent.csv");
        assert_eq!(config.data.data_dir, "data");
    }
}
