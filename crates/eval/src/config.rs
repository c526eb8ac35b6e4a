//! Engine configuration.
//!
//! All settings have defaults, so an empty TOML document is a valid
//! configuration.
//!
//! # Example
//!
//! ```toml
//! default_match_case = false
//! default_distance_unit = "km"
//! max_nesting_depth = 32
//!
//! [like]
//! max_pattern_len = 256
//! max_wildcards = 16
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::spatial::DistanceUnit;

/// Top-level engine configuration used by [`crate::FilterFactory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Case sensitivity for comparisons and Like filters built without an
    /// explicit setting.
    pub default_match_case: bool,
    /// Unit applied to DWithin/Beyond when the unit string is empty.
    pub default_distance_unit: String,
    /// Deepest element nesting accepted when reading a filter document.
    pub max_nesting_depth: usize,
    pub like: LikeLimits,
}

/// Bounds applied to Like patterns before they are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikeLimits {
    /// Longest accepted pattern, in characters.
    pub max_pattern_len: usize,
    /// Most multi-character wildcards accepted in one pattern.
    pub max_wildcards: usize,
    /// Ceiling on the compiled automaton size, in bytes.
    pub regex_size_limit: usize,
}

impl Default for LikeLimits {
    fn default() -> Self {
        LikeLimits {
            max_pattern_len: 1024,
            max_wildcards: 64,
            regex_size_limit: 1 << 20,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_match_case: true,
            default_distance_unit: "m".to_string(),
            max_nesting_depth: 64,
            like: LikeLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<EngineConfig> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| FilterError::Config(format!("could not parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_path(path: &Path) -> Result<EngineConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FilterError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check limits are usable and the default unit is known.
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(FilterError::Config(
                "max_nesting_depth must be greater than zero".to_string(),
            ));
        }
        if self.like.max_pattern_len == 0 {
            return Err(FilterError::Config(
                "like.max_pattern_len must be greater than zero".to_string(),
            ));
        }
        if self.like.max_wildcards == 0 {
            return Err(FilterError::Config(
                "like.max_wildcards must be greater than zero".to_string(),
            ));
        }
        if self.like.regex_size_limit == 0 {
            return Err(FilterError::Config(
                "like.regex_size_limit must be greater than zero".to_string(),
            ));
        }
        if DistanceUnit::parse(&self.default_distance_unit).is_none() {
            return Err(FilterError::Config(format!(
                "unknown default_distance_unit '{}'",
                self.default_distance_unit
            )));
        }
        Ok(())
    }

    /// The parsed default distance unit (metres when misconfigured).
    pub fn distance_unit(&self) -> DistanceUnit {
        DistanceUnit::parse(&self.default_distance_unit).unwrap_or(DistanceUnit::Metre)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.default_match_case);
        assert_eq!(config.distance_unit(), DistanceUnit::Metre);
    }

    #[test]
    fn partial_like_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_match_case = false
            default_distance_unit = "km"

            [like]
            max_wildcards = 4
            "#,
        )
        .unwrap();
        assert!(!config.default_match_case);
        assert_eq!(config.distance_unit(), DistanceUnit::Kilometre);
        assert_eq!(config.like.max_wildcards, 4);
        assert_eq!(config.like.max_pattern_len, 1024);
    }

    #[test]
    fn zero_limit_rejected() {
        let result = EngineConfig::from_toml_str("[like]\nmax_pattern_len = 0\n");
        assert!(matches!(result, Err(FilterError::Config(_))));
    }

    #[test]
    fn nesting_depth_setting() {
        let config = EngineConfig::from_toml_str("max_nesting_depth = 8\n").unwrap();
        assert_eq!(config.max_nesting_depth, 8);
        assert_eq!(EngineConfig::default().max_nesting_depth, 64);
        let result = EngineConfig::from_toml_str("max_nesting_depth = 0\n");
        assert!(matches!(result, Err(FilterError::Config(_))));
    }

    #[test]
    fn unknown_unit_rejected() {
        let result = EngineConfig::from_toml_str("default_distance_unit = \"furlong\"\n");
        assert!(matches!(result, Err(FilterError::Config(_))));
    }

    #[test]
    fn malformed_toml_rejected() {
        let result = EngineConfig::from_toml_str("default_match_case = ");
        assert!(matches!(result, Err(FilterError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_distance_unit = \"ft\"").unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.distance_unit(), DistanceUnit::Foot);
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = EngineConfig::from_path(Path::new("/nonexistent/geofilter.toml"));
        assert!(matches!(result, Err(FilterError::Config(_))));
    }
}
