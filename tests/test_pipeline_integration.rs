// Integration test for the remote-then-heuristic pipeline with mocked transport
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use soilscan::config::Config;
use soilscan::error::Result;
use soilscan::heuristic::{HeuristicBackend, HEURISTIC_ENGINE};
use soilscan::input::ImageInput;
use soilscan::knowledge::SoilKnowledge;
use soilscan::pipeline::ClassificationPipeline;
use soilscan::remote::{ProseResponseParser, RemoteTextClassifier, TextVisionClient, REMOTE_ENGINE};
use soilscan::types::SoilCategory;
use soilscan::SoilError;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct MockClient {
    reply: Option<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextVisionClient for MockClient {
    fn model(&self) -> &str {
        "mock-vision"
    }

    async fn generate(&self, _prompt: &str, _image: &ImageInput) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(SoilError::RemoteAnalysis {
                status: Some(429),
                message: "quota exceeded".to_string(),
            }),
        }
    }
}

fn pipeline(reply: Option<&str>) -> (ClassificationPipeline, Arc<AtomicUsize>) {
    let config = Config::default();
    let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
    let calls = Arc::new(AtomicUsize::new(0));

    let client = MockClient {
        reply: reply.map(str::to_string),
        calls: Arc::clone(&calls),
    };
    let remote = RemoteTextClassifier::new(
        Arc::new(client),
        Arc::new(ProseResponseParser::new(Arc::clone(&knowledge))),
    );
    let heuristic = HeuristicBackend::new(knowledge, config.sampler, config.heuristic);

    (
        ClassificationPipeline::new(Box::new(remote), Box::new(heuristic)),
        calls,
    )
}

fn red_brown_png() -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 32, Rgb([160, 82, 45]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[tokio::test]
async fn test_remote_result_wins() {
    let (pipeline, calls) = pipeline(Some(
        "This appears to be a silty soil with a smooth feel. The pH range is 6.0-7.5.",
    ));
    let input = ImageInput::from_bytes("field.jpg", red_brown_png());

    let result = pipeline.analyze(&input).await.into_result().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.soil_type, SoilCategory::Silt);
    assert_eq!(result.analysis_details.api_used, REMOTE_ENGINE);
    assert_eq!(result.chemical_properties.ph_range, "6.0-7.5");
    assert!(result.insights.is_some());
    assert!(result.confidence <= 98.0);
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_heuristic() {
    let (pipeline, calls) = pipeline(None);
    let input = ImageInput::from_bytes("clay_sample_01.jpg", red_brown_png());

    let outcome = pipeline.analyze(&input).await;
    assert!(!outcome.is_error());

    let result = outcome.into_result().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.soil_type, SoilCategory::Clay);
    assert_eq!(result.analysis_details.api_used, HEURISTIC_ENGINE);
    assert!(result.insights.is_none());
    assert!((72.0..=98.0).contains(&result.confidence));
}

#[tokio::test]
async fn test_both_backends_failing_resolves_to_error_record() {
    let (pipeline, _) = pipeline(None);
    let input = ImageInput::from_bytes("broken.jpg", b"\xff\xd8 truncated".to_vec());

    let outcome = pipeline.analyze(&input).await;

    assert!(outcome.is_error());
    let message = outcome.error_message().unwrap().to_lowercase();
    assert!(!message.is_empty());
    assert!(message.contains("decode") || message.contains("analyze"));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["error"], true);
    assert_eq!(json["processingTime"], "0.0");
    assert!(json.get("soilType").is_none());
}

#[tokio::test]
async fn test_offline_pipeline_is_repeatable() {
    let config = Config::default();
    let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
    let heuristic = HeuristicBackend::new(knowledge, config.sampler, config.heuristic);
    let pipeline = ClassificationPipeline::offline(Box::new(heuristic));
    let input = ImageInput::from_bytes("clay_sample_01.jpg", red_brown_png());

    let first = pipeline.analyze(&input).await.into_result().unwrap();
    let second = pipeline.analyze(&input).await.into_result().unwrap();

    // Only the confidence jitter may differ between runs
    assert_eq!(first.soil_type, second.soil_type);
    assert_eq!(first.dominant_colors, second.dominant_colors);
    assert_eq!(
        first.agricultural_suitability,
        second.agricultural_suitability
    );
    assert_eq!(first.analysis_details.api_used, HEURISTIC_ENGINE);
}
