//! Remote text-model classifier
//!
//! Sends the raw image with a fixed instruction to a hosted vision model and
//! parses the prose reply. The transport and the parser sit behind traits so
//! either can be replaced in tests or for another upstream style.

pub mod client;
pub mod parser;
pub mod text;

pub use client::{GeminiClient, TextVisionClient};
pub use parser::{ProseResponseParser, ResponseParser, REMOTE_ENGINE};

use crate::error::Result;
use crate::input::ImageInput;
use crate::pipeline::AnalysisBackend;
use crate::types::SoilAnalysisResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Instruction sent alongside every image
pub const ANALYSIS_PROMPT: &str = include_str!("../../config-templates/analysis_prompt.txt");

pub struct RemoteTextClassifier {
    client: Arc<dyn TextVisionClient>,
    parser: Arc<dyn ResponseParser>,
}

impl RemoteTextClassifier {
    pub fn new(client: Arc<dyn TextVisionClient>, parser: Arc<dyn ResponseParser>) -> Self {
        Self { client, parser }
    }

    /// One outbound request, then a parse that cannot fail
    pub async fn classify(&self, input: &ImageInput) -> Result<SoilAnalysisResult> {
        let text = self.client.generate(ANALYSIS_PROMPT, input).await?;

        tracing::debug!(
            "Parsing {} characters with the {} parser",
            text.len(),
            self.parser.style()
        );

        let mut result = {
            let mut rng = rand::thread_rng();
            self.parser.parse(&text, &mut rng)
        };
        result.analysis_details.file_name = input.file_name.clone();
        Ok(result)
    }
}

#[async_trait]
impl AnalysisBackend for RemoteTextClassifier {
    fn name(&self) -> &str {
        REMOTE_ENGINE
    }

    async fn analyze(&self, input: &ImageInput) -> Result<SoilAnalysisResult> {
        self.classify(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoilError;
    use crate::knowledge::SoilKnowledge;
    use crate::types::SoilCategory;

    struct CannedClient {
        reply: std::result::Result<String, u16>,
    }

    #[async_trait]
    impl TextVisionClient for CannedClient {
        fn model(&self) -> &str {
            "canned"
        }

        async fn generate(&self, prompt: &str, _image: &ImageInput) -> Result<String> {
            assert!(prompt.contains("Best suited crops"));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(SoilError::RemoteAnalysis {
                    status: Some(*status),
                    message: "quota exceeded".to_string(),
                }),
            }
        }
    }

    fn classifier(reply: std::result::Result<String, u16>) -> RemoteTextClassifier {
        let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
        RemoteTextClassifier::new(
            Arc::new(CannedClient { reply }),
            Arc::new(ProseResponseParser::new(knowledge)),
        )
    }

    #[tokio::test]
    async fn test_classify_sets_provenance() {
        let text = "Primary soil type: clay. Estimated pH range: 6.5-7.8".to_string();
        let input = ImageInput::from_bytes("field_07.jpg", vec![1u8, 2, 3]);
        let result = classifier(Ok(text.clone())).classify(&input).await.unwrap();

        assert_eq!(result.soil_type, SoilCategory::Clay);
        assert_eq!(result.chemical_properties.ph_range, "6.5-7.8");
        assert_eq!(result.analysis_details.api_used, REMOTE_ENGINE);
        assert_eq!(result.analysis_details.file_name, "field_07.jpg");
        assert_eq!(result.analysis_details.response_length, Some(text.len()));
        assert_eq!(result.insights.unwrap().full_analysis, text);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let input = ImageInput::from_bytes("x.jpg", vec![1u8]);
        let err = classifier(Err(429)).classify(&input).await.unwrap_err();
        assert!(matches!(
            err,
            SoilError::RemoteAnalysis {
                status: Some(429),
                ..
            }
        ));
    }
}
