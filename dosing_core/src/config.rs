//! Configuration file support for dosecalc.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosecalc/config.toml`.
//! Every section is optional; missing values take their defaults.

use crate::format::{FormatOptions, PLACEHOLDER};
use crate::{Error, Result, Species, WeightBounds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub weight: WeightConfig,

    #[serde(default)]
    pub fluids: FluidsConfig,

    #[serde(default)]
    pub patient: PatientConfig,
}

/// Display formatting configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    #[serde(default)]
    pub min_decimals: usize,

    #[serde(default = "default_max_decimals")]
    pub max_decimals: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            min_decimals: 0,
            max_decimals: default_max_decimals(),
        }
    }
}

/// Protocol weight bounds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Clamp weights into bounds and substitute the default for invalid input
    #[serde(default)]
    pub clamp: bool,

    #[serde(default = "default_min_kg")]
    pub min_kg: f64,

    #[serde(default = "default_max_kg")]
    pub max_kg: f64,

    #[serde(default = "default_default_kg")]
    pub default_kg: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            clamp: false,
            min_kg: default_min_kg(),
            max_kg: default_max_kg(),
            default_kg: default_default_kg(),
        }
    }
}

/// Maintenance fluid configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FluidsConfig {
    /// Multiplier applied to the maintenance rate in high-output scenarios
    #[serde(default = "default_high_output_factor")]
    pub high_output_factor: f64,
}

impl Default for FluidsConfig {
    fn default() -> Self {
        Self {
            high_output_factor: default_high_output_factor(),
        }
    }
}

/// Patient defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientConfig {
    #[serde(default = "default_species")]
    pub species: Species,
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            species: default_species(),
        }
    }
}

// Default value functions
fn default_placeholder() -> String {
    PLACEHOLDER.to_string()
}

fn default_max_decimals() -> usize {
    2
}

fn default_min_kg() -> f64 {
    2.0
}

fn default_max_kg() -> f64 {
    120.0
}

fn default_default_kg() -> f64 {
    10.0
}

fn default_high_output_factor() -> f64 {
    1.25
}

fn default_species() -> Species {
    Species::Human
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(config_path) if config_path.exists() => Self::load_from(&config_path),
            config_path => {
                tracing::info!("No config file found at {:?}, using defaults", config_path);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// `None` when the platform exposes no config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("dosecalc").join("config.toml"))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values the calculator cannot use
    pub fn validate(&self) -> Result<()> {
        let w = &self.weight;
        let bounds_ok = w.min_kg.is_finite() && w.max_kg.is_finite() && w.min_kg > 0.0;
        if !bounds_ok || w.min_kg >= w.max_kg {
            return Err(Error::Config(format!(
                "weight bounds {}-{} kg are not a valid range",
                w.min_kg, w.max_kg
            )));
        }
        if !(w.min_kg..=w.max_kg).contains(&w.default_kg) {
            return Err(Error::Config(format!(
                "default weight {} kg lies outside {}-{} kg",
                w.default_kg, w.min_kg, w.max_kg
            )));
        }

        if self.display.min_decimals > self.display.max_decimals {
            return Err(Error::Config(format!(
                "min_decimals {} > max_decimals {}",
                self.display.min_decimals, self.display.max_decimals
            )));
        }

        let factor = self.fluids.high_output_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::Config(format!(
                "high_output_factor {} must be positive",
                factor
            )));
        }

        Ok(())
    }

    /// Protocol bounds, when clamping is enabled
    pub fn weight_bounds(&self) -> Option<WeightBounds> {
        self.weight.clamp.then(|| WeightBounds {
            min_kg: self.weight.min_kg,
            max_kg: self.weight.max_kg,
            default_kg: self.weight.default_kg,
        })
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            min_decimals: self.display.min_decimals,
            max_decimals: self.display.max_decimals,
            placeholder: self.display.placeholder.clone(),
        }
    }
}
