use std::path::PathBuf;
use thiserror::Error;

/// Main error type for soilscan
#[derive(Error, Debug)]
pub enum SoilError {
    /// Image bytes could not be decoded into pixels
    #[error("Image decode error: {message}")]
    ImageDecode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Remote analysis failed (transport, non-2xx, quota, timeout, empty body)
    #[error("Remote analysis failed{}: {message}", status_suffix(.status))]
    RemoteAnalysis { status: Option<u16>, message: String },

    /// Heuristic classification produced no usable signal
    #[error("Classification error: {0}")]
    Classification(String),

    /// Every analysis backend was exhausted
    #[error("Unable to analyze soil image: {0}")]
    AnalysisFailed(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SoilError {
    /// Create an image decode error wrapping the decoder's error
    pub fn image_decode<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageDecode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a remote analysis error without an HTTP status
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteAnalysis {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the pipeline may recover from this error by trying the next backend
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            SoilError::RemoteAnalysis { .. }
                | SoilError::ImageDecode { .. }
                | SoilError::Classification(_)
                | SoilError::Json { .. }
                | SoilError::Io { .. }
                | SoilError::Other(_)
        )
    }

    /// Short message suitable for the failure panel shown to the user
    pub fn user_message(&self) -> String {
        match self {
            SoilError::ImageDecode { message, .. } => {
                format!("Could not read the image ({message}). Please try a JPEG or PNG photo.")
            }
            SoilError::Classification(_) => {
                "Image analysis failed. Please try again with a clearer soil image.".to_string()
            }
            SoilError::AnalysisFailed(reason) => {
                format!("Unable to analyze soil image: {reason}")
            }
            other => other.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for soilscan operations
pub type Result<T> = std::result::Result<T, SoilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_includes_status() {
        let err = SoilError::RemoteAnalysis {
            status: Some(429),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Remote analysis failed (429): quota exceeded"
        );

        let err = SoilError::remote("connection reset");
        assert_eq!(err.to_string(), "Remote analysis failed: connection reset");
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(SoilError::remote("timeout").is_fallback_eligible());
        assert!(SoilError::Classification("no signal".into()).is_fallback_eligible());
        assert!(!SoilError::Config("bad".into()).is_fallback_eligible());
    }
}
