//! Analysis configuration.
//!
//! One immutable structure, built once (defaults or a TOML file) and passed
//! to every stage at construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::HeatColors;
use crate::data::filter::CullOptions;
use crate::data::model::{ColumnTriple, LogFormat};
use crate::density::{DensityConfig, TrailConfig};
use crate::error::{AnalysisError, Result};
use crate::logger::LoggerConfig;
use crate::replay::ReplayConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Gaze coordinate columns used for culling, scoring and trails.
    pub columns: ColumnTriple,
    /// Separators of the input log (and of written results).
    pub format: LogFormat,
    pub cull: CullOptions,
    pub density: DensityConfig,
    pub colors: ColorsConfig,
    pub trail: TrailConfig,
    pub replay: ReplayConfig,
    pub logger: LoggerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            columns: ColumnTriple::gaze(),
            format: LogFormat::csv(),
            cull: CullOptions::default(),
            density: DensityConfig::default(),
            colors: ColorsConfig::default(),
            trail: TrailConfig::default(),
            replay: ReplayConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

/// Heatmap colours as `#rrggbb` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub low: String,
    pub high: String,
    /// Points outside every cluster.
    pub below: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        ColorsConfig {
            low: "#ffffff".to_string(),
            high: "#ff0000".to_string(),
            below: "#808080".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Check every section; the first invalid field is reported.
    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;
        self.density.validate()?;
        self.heat_colors()?;
        if self.trail.close_only && !(self.trail.max_distance >= 0.0) {
            return Err(AnalysisError::Config(format!(
                "trail max_distance must be >= 0, got {}",
                self.trail.max_distance
            )));
        }
        self.replay.validate()?;
        self.logger.validate()?;
        Ok(())
    }

    /// Parsed heatmap colours.
    pub fn heat_colors(&self) -> Result<HeatColors> {
        HeatColors::from_hex(&self.colors.low, &self.colors.high, &self.colors.below)
    }

    /// Load and validate a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AnalysisError::Config(e.to_string()))
    }
}
