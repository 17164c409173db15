//! # Engine Configuration
//!
//! Policy points of the engine that differ between deployments.
//!
//! ```rust
//! use grading_core::config::{GradingConfig, SupersedePolicy};
//!
//! let config = GradingConfig::default();
//! assert_eq!(config.supersede_policy, SupersedePolicy::Archive);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{env, fs};

use crate::error::{GradingError, Result};

pub const CONFIG_PATH_ENV: &str = "GRADING_CONFIG_PATH";

/// What happens to the previous current scenario when another one is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// Keep it for historical comparison.
    #[default]
    Archive,
    /// Drop it entirely.
    Discard,
    /// Return it to the editable drafts.
    RetainAsDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub supersede_policy: SupersedePolicy,
    /// Currency unit every anchor is rounded to.
    pub rounding_unit: f64,
    pub max_name_len: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self { supersede_policy: SupersedePolicy::Archive, rounding_unit: 1.0, max_name_len: 100 }
    }
}

impl GradingConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| GradingError::Config(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| GradingError::Config(e.to_string()))
    }

    /// Load from a `.yaml`/`.yml` or JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GradingError::Config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            _ => Self::from_json(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `GRADING_CONFIG_PATH`, defaults when unset or blank.
    pub fn from_env() -> Result<Self> {
        let Ok(path) = env::var(CONFIG_PATH_ENV) else {
            return Ok(Self::default());
        };

        let path = path.trim();
        if path.is_empty() {
            return Ok(Self::default());
        }

        Self::load(Path::new(path))
            .map_err(|e| GradingError::Config(format!("{CONFIG_PATH_ENV}='{path}': {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rounding_unit.is_finite() || self.rounding_unit <= 0.0 {
            return Err(GradingError::Config(format!(
                "rounding_unit must be a positive number, got {}",
                self.rounding_unit
            )));
        }
        if self.max_name_len == 0 {
            return Err(GradingError::Config("max_name_len must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GradingConfig::from_json(r#"{"supersede_policy": "discard"}"#).unwrap();
        assert_eq!(config.supersede_policy, SupersedePolicy::Discard);
        assert_eq!(config.rounding_unit, 1.0);
        assert_eq!(config.max_name_len, 100);
    }

    #[test]
    fn test_yaml_config() {
        let config = GradingConfig::from_yaml("supersede_policy: retain_as_draft\nrounding_unit: 10\n").unwrap();
        assert_eq!(config.supersede_policy, SupersedePolicy::RetainAsDraft);
        assert_eq!(config.rounding_unit, 10.0);
    }

    #[test]
    fn test_validate_rejects_bad_rounding() {
        let config = GradingConfig { rounding_unit: 0.0, ..GradingConfig::default() };
        assert!(matches!(config.validate(), Err(GradingError::Config(_))));

        let config = GradingConfig { rounding_unit: f64::NAN, ..GradingConfig::default() };
        assert!(config.validate().is_err());

        let config = GradingConfig { max_name_len: 0, ..GradingConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "supersede_policy: discard").unwrap();

        let config = GradingConfig::load(file.path()).unwrap();
        assert_eq!(config.supersede_policy, SupersedePolicy::Discard);
    }

    #[test]
    fn test_load_rejects_invalid_file_content() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"rounding_unit": -5}}"#).unwrap();

        assert!(matches!(GradingConfig::load(file.path()), Err(GradingError::Config(_))));
    }
}
