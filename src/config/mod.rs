//! Configuration management for soilscan
//!
//! Loads the TOML configuration file, applies named profiles and
//! `SOILSCAN_SECTION__KEY` environment overrides, then validates the result.

use crate::error::{Result, SoilError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub remote: RemoteConfig,
    pub sampler: SamplerConfig,
    pub heuristic: HeuristicConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Remote generative-AI backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub provider: String,
    /// Base URL; the model path and `:generateContent` are appended
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// Colour sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Longer side of the downscaled image, in pixels
    pub max_dimension: u32,
    /// Sample every n-th pixel
    pub pixel_stride: usize,
    /// Pixels with alpha at or below this are skipped
    pub alpha_threshold: u8,
    /// Maximum RGB distance for joining an existing cluster
    pub cluster_distance: f64,
    /// Number of clusters returned
    pub max_clusters: usize,
}

/// Offline heuristic scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicConfig {
    pub keyword_bonus: f64,
    /// Winning scores below this fall back to loam
    pub score_floor: f64,
    pub confidence_min: f64,
    pub confidence_max: f64,
    /// Half-width of the uniform jitter added to confidence
    pub confidence_jitter: f64,
}

/// Optional overrides for the built-in knowledge tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_file: Option<PathBuf>,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SoilError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SoilError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SoilError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    ///
    /// Profile values go through the validator as well.
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| SoilError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(enabled) = overrides.remote_enabled {
            self.remote.enabled = enabled;
        }
        if let Some(model) = overrides.remote_model {
            self.remote.model = model;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.remote.timeout_secs = timeout;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SOILSCAN_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("SOILSCAN_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "REMOTE__ENABLED" => {
                self.remote.enabled = parse_value(path, value)?;
            }
            "REMOTE__MODEL" => {
                self.remote.model = value.to_string();
            }
            "REMOTE__ENDPOINT" => {
                self.remote.endpoint = value.to_string();
            }
            "REMOTE__TIMEOUT_SECS" => {
                self.remote.timeout_secs = parse_value(path, value)?;
            }
            "HEURISTIC__KEYWORD_BONUS" => {
                self.heuristic.keyword_bonus = parse_value(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SoilError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("soilscan").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| SoilError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                remote_enabled: Some(false),
                remote_model: None,
                timeout_secs: None,
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            remote: RemoteConfig {
                enabled: true,
                provider: "gemini".to_string(),
                endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
                model: "gemini-2.5-flash".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                timeout_secs: 30,
                temperature: 0.3,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 2048,
            },
            sampler: SamplerConfig {
                max_dimension: 100,
                pixel_stride: 10,
                alpha_threshold: 128,
                cluster_distance: 50.0,
                max_clusters: 5,
            },
            heuristic: HeuristicConfig {
                keyword_bonus: 0.8,
                score_floor: 0.1,
                confidence_min: 72.0,
                confidence_max: 98.0,
                confidence_jitter: 7.5,
            },
            knowledge: KnowledgeConfig::default(),
            profiles,
        }
    }
}
