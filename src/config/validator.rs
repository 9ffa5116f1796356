use crate::config::Config;
use crate::error::{Result, SoilError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_remote(config, &mut errors);
        Self::validate_sampler(config, &mut errors);
        Self::validate_heuristic(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SoilError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_remote(config: &Config, errors: &mut Vec<ValidationError>) {
        let remote = &config.remote;

        // A missing API key is not a config error: the remote backend fails
        // at call time and the pipeline falls back to the heuristic.
        if remote.enabled {
            if remote.endpoint.is_empty() {
                errors.push(ValidationError::new(
                    "remote.endpoint",
                    "Endpoint cannot be empty when remote analysis is enabled",
                ));
            }
            if remote.model.is_empty() {
                errors.push(ValidationError::new(
                    "remote.model",
                    "Model name cannot be empty when remote analysis is enabled",
                ));
            }
        }

        if remote.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "remote.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        let temp = remote.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "remote.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if !(0.0..=1.0).contains(&remote.top_p) {
            errors.push(ValidationError::new(
                "remote.top_p",
                format!("top_p must be between 0.0 and 1.0, got {}", remote.top_p),
            ));
        }

        let valid_providers = ["gemini"];
        if !valid_providers.contains(&remote.provider.as_str()) {
            errors.push(ValidationError::new(
                "remote.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, remote.provider
                ),
            ));
        }
    }

    fn validate_sampler(config: &Config, errors: &mut Vec<ValidationError>) {
        let sampler = &config.sampler;

        if sampler.max_dimension == 0 {
            errors.push(ValidationError::new(
                "sampler.max_dimension",
                "Max dimension must be greater than 0",
            ));
        }

        if sampler.pixel_stride == 0 {
            errors.push(ValidationError::new(
                "sampler.pixel_stride",
                "Pixel stride must be greater than 0",
            ));
        }

        if sampler.cluster_distance <= 0.0 {
            errors.push(ValidationError::new(
                "sampler.cluster_distance",
                "Cluster distance must be positive",
            ));
        }

        if sampler.max_clusters == 0 {
            errors.push(ValidationError::new(
                "sampler.max_clusters",
                "Max clusters must be greater than 0",
            ));
        }
    }

    fn validate_heuristic(config: &Config, errors: &mut Vec<ValidationError>) {
        let h = &config.heuristic;

        if h.keyword_bonus < 0.0 {
            errors.push(ValidationError::new(
                "heuristic.keyword_bonus",
                "Keyword bonus cannot be negative",
            ));
        }

        if h.confidence_jitter < 0.0 {
            errors.push(ValidationError::new(
                "heuristic.confidence_jitter",
                "Confidence jitter cannot be negative",
            ));
        }

        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(h.confidence_min) || !in_range(h.confidence_max) {
            errors.push(ValidationError::new(
                "heuristic.confidence_min",
                "Confidence bounds must lie within 0-100",
            ));
        } else if h.confidence_min > h.confidence_max {
            errors.push(ValidationError::new(
                "heuristic.confidence_min",
                format!(
                    "confidence_min ({}) exceeds confidence_max ({})",
                    h.confidence_min, h.confidence_max
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.remote.timeout_secs = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_inverted_confidence_bounds() {
        let mut config = Config::default();
        config.heuristic.confidence_min = 99.0;
        config.heuristic.confidence_max = 72.0;
        let err = ConfigValidator::validate(&config).unwrap_err();
        match err {
            SoilError::ConfigValidation { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "heuristic.confidence_min");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = Config::default();
        config.remote.provider = "carrier-pigeon".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
