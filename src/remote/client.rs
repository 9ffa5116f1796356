use crate::config::RemoteConfig;
use crate::error::{Result, SoilError};
use crate::input::ImageInput;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest slice of an error body carried into the error message
const MAX_ERROR_BODY: usize = 500;

/// Text-in/text-out boundary to a hosted vision model
///
/// Implementations send one image plus an instruction and return the model's
/// prose. Transport, status and empty-body failures are `RemoteAnalysis` errors.
#[async_trait]
pub trait TextVisionClient: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, image: &ImageInput) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Gemini `generateContent` over HTTPS
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Build from config; the API key is read from `remote.api_key_env`
    ///
    /// A missing key is not an error here. Calls fail instead, which lets the
    /// pipeline fall back to the offline engine.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SoilError::remote(format!("Failed to build HTTP client: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; remote analysis will be skipped",
                config.api_key_env
            );
        }

        Ok(Self {
            http,
            url: format!(
                "{}/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            generation: GenerationConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
            },
        })
    }

    fn request_body<'a>(&self, prompt: &'a str, image: &'a ImageInput) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                        },
                    },
                ],
            }],
            generation_config: self.generation,
            safety_settings: vec![
                SafetySetting {
                    category: "HARM_CATEGORY_HARASSMENT",
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                },
                SafetySetting {
                    category: "HARM_CATEGORY_HATE_SPEECH",
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                },
            ],
        }
    }
}

#[async_trait]
impl TextVisionClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, image: &ImageInput) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SoilError::remote(format!("API key not configured ({} is unset)", self.api_key_env))
        })?;

        tracing::info!(
            "Calling {} with {} byte {} image",
            self.model,
            image.len(),
            image.mime_type
        );

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt, image))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SoilError::remote("request timed out")
                } else {
                    SoilError::remote(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(SoilError::RemoteAnalysis {
                status: Some(status.as_u16()),
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SoilError::remote(format!("invalid response body: {}", e)))?;

        match parsed.first_text() {
            Some(text) if !text.trim().is_empty() => {
                tracing::info!("Received {} characters of analysis", text.len());
                Ok(text.to_string())
            }
            _ => Err(SoilError::remote("No analysis text received")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_request_body_shape() {
        let mut remote = Config::default().remote;
        remote.api_key_env = "SOILSCAN_TEST_UNSET_KEY".to_string();
        let client = GeminiClient::new(&remote).unwrap();
        let image = ImageInput::from_bytes("clay.png", vec![0u8, 1, 2]);

        let body = serde_json::to_value(client.request_body("describe", &image)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AAEC");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_url_includes_model() {
        let mut remote = Config::default().remote;
        remote.endpoint = "https://example.test/v1beta/models/".to_string();
        remote.model = "gemini-test".to_string();
        let client = GeminiClient::new(&remote).unwrap();
        assert_eq!(
            client.url,
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(client.model(), "gemini-test");
    }

    #[test]
    fn test_response_text_extraction() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Sandy soil"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.first_text(), Some("Sandy soil"));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.first_text(), None);

        let blocked = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(blocked).unwrap();
        assert_eq!(parsed.first_text(), None);
    }

    #[tokio::test]
    async fn test_missing_key_fails_as_remote_error() {
        let mut remote = Config::default().remote;
        remote.api_key_env = "SOILSCAN_TEST_UNSET_KEY".to_string();
        let client = GeminiClient::new(&remote).unwrap();
        let image = ImageInput::from_bytes("x.jpg", vec![1u8]);

        let err = client.generate("prompt", &image).await.unwrap_err();
        assert!(matches!(err, SoilError::RemoteAnalysis { .. }));
        assert!(err.is_fallback_eligible());
    }
}
