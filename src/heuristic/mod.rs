//! Offline colour heuristic classifier
//!
//! Additive scoring over four categories from three evidence sources:
//! 1. Filename keywords (fixed bonus per keyword hit)
//! 2. Colour proximity to each category's reference palette
//! 3. Global brightness, saturation and uniformity thresholds
//!
//! The scores are not probabilities. Confidence is the winning share of the
//! total, jittered and clamped into a fixed presentation band.

use crate::config::{HeuristicConfig, SamplerConfig};
use crate::error::{Result, SoilError};
use crate::input::ImageInput;
use crate::knowledge::SoilKnowledge;
use crate::pipeline::AnalysisBackend;
use crate::sampler::{ColorSampler, SampleSet};
use crate::types::{
    clamp_confidence, rgb_distance, AnalysisDetails, ClassificationScore, SampledColor,
    SoilAnalysisResult, SoilCategory,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;

pub const HEURISTIC_ENGINE: &str = "Smart Color Analysis Engine";

/// Tags every heuristic result starts with, before the category's own labels
const BASE_LABELS: [&str; 3] = ["soil", "earth", "ground"];

/// Confidence used when no evidence was accumulated at all
const NEUTRAL_CONFIDENCE: f64 = 75.0;

// Brightness bands, first match wins: (lower-exclusive bound, sandy, silt)
const BRIGHT_BANDS: [(f64, f64, f64); 2] = [(180.0, 0.4, 0.2), (150.0, 0.3, 0.3)];
const DARK_THRESHOLD: f64 = 100.0;
const DARK_CLAY_BONUS: f64 = 0.3;
const DARK_LOAM_BONUS: f64 = 0.2;
const MEDIUM_THRESHOLD: f64 = 130.0;
const MEDIUM_LOAM_BONUS: f64 = 0.2;

const HIGH_SATURATION: f64 = 0.3;
const HIGH_SATURATION_CLAY_BONUS: f64 = 0.3;
const LOW_SATURATION: f64 = 0.15;
const LOW_SATURATION_SILT_BONUS: f64 = 0.4;
const LOW_SATURATION_SANDY_BONUS: f64 = 0.1;

// The grayish and uniform bonuses can both fire for one flat grey image.
const GRAYISH_SILT_BONUS: f64 = 0.5;
const UNIFORM_MAX_CLUSTERS: usize = 2;
const UNIFORM_MIN_FREQUENCY: f64 = 0.6;
const UNIFORM_SILT_BONUS: f64 = 0.3;

/// Evidence collected for one image before a category is picked
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub score: ClassificationScore,
    pub keyword_hits: usize,
    /// Frequency-weighted mean brightness (0-255)
    pub avg_brightness: f64,
    /// Frequency-weighted mean saturation (0-1)
    pub avg_saturation: f64,
}

/// Scores sampled colours and filename hints against the soil profiles
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    knowledge: Arc<SoilKnowledge>,
    config: HeuristicConfig,
}

impl HeuristicClassifier {
    pub fn new(knowledge: Arc<SoilKnowledge>, config: HeuristicConfig) -> Self {
        Self { knowledge, config }
    }

    /// Accumulate evidence for every category; deterministic
    pub fn score(&self, file_name: &str, colors: &[SampledColor]) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();
        let name = file_name.to_lowercase();

        for profile in self.knowledge.profiles() {
            for keyword in &profile.keywords {
                if name.contains(keyword.as_str()) {
                    tracing::debug!("Filename keyword '{}' -> {}", keyword, profile.category);
                    breakdown
                        .score
                        .add(profile.category, self.config.keyword_bonus);
                    breakdown.keyword_hits += 1;
                }
            }
        }

        for color in colors {
            for profile in self.knowledge.profiles() {
                let min_distance = profile
                    .palette
                    .iter()
                    .map(|anchor| rgb_distance(color.rgb, *anchor))
                    .fold(f64::INFINITY, f64::min);
                let similarity = ((255.0 - min_distance) / 255.0).max(0.0) * color.frequency;
                breakdown.score.add(profile.category, similarity);
            }
        }

        if colors.is_empty() {
            return breakdown;
        }

        breakdown.avg_brightness = colors.iter().map(|c| c.brightness() * c.frequency).sum();
        breakdown.avg_saturation = colors.iter().map(|c| c.saturation() * c.frequency).sum();
        apply_statistics(&mut breakdown);

        if colors.iter().any(SampledColor::is_grayish) {
            breakdown.score.add(SoilCategory::Silt, GRAYISH_SILT_BONUS);
        }

        let uniform = colors.len() <= UNIFORM_MAX_CLUSTERS
            && colors.first().map(|c| c.frequency).unwrap_or(0.0) > UNIFORM_MIN_FREQUENCY;
        if uniform {
            breakdown.score.add(SoilCategory::Silt, UNIFORM_SILT_BONUS);
        }

        tracing::debug!(
            "Heuristic scores: {:?} (brightness {:.1}, saturation {:.3})",
            breakdown.score.iter().collect::<Vec<_>>(),
            breakdown.avg_brightness,
            breakdown.avg_saturation
        );
        breakdown
    }

    pub fn classify(&self, file_name: &str, samples: &SampleSet) -> Result<SoilAnalysisResult> {
        self.classify_with_rng(file_name, samples, &mut rand::thread_rng())
    }

    /// Classify with an explicit jitter source
    pub fn classify_with_rng<R: Rng + ?Sized>(
        &self,
        file_name: &str,
        samples: &SampleSet,
        rng: &mut R,
    ) -> Result<SoilAnalysisResult> {
        let breakdown = self.score(file_name, &samples.colors);
        let total = breakdown.score.total();

        if samples.colors.is_empty() && total <= 0.0 {
            return Err(SoilError::Classification(format!(
                "no opaque pixels sampled and no filename hint in '{}'",
                file_name
            )));
        }

        let (best, max_score) = breakdown.score.best();
        let category = if max_score > self.config.score_floor {
            best
        } else {
            SoilCategory::Loam
        };

        let base = if total > 0.0 {
            max_score / total * 100.0
        } else {
            NEUTRAL_CONFIDENCE
        };
        let jitter = self.config.confidence_jitter;
        let jitter = if jitter > 0.0 {
            rng.gen_range(-jitter..jitter)
        } else {
            0.0
        };
        let confidence = clamp_confidence(
            base + jitter,
            self.config.confidence_min,
            self.config.confidence_max,
        );

        tracing::info!("Heuristic prediction: {} ({:.1}%)", category, confidence);

        let profile = self.knowledge.profile(category);

        let mut labels: Vec<String> = BASE_LABELS.iter().map(|s| s.to_string()).collect();
        labels.extend(profile.labels.iter().cloned());

        let mut details = AnalysisDetails::new(HEURISTIC_ENGINE, file_name);
        details.total_labels_detected = Some(labels.len());
        details.avg_brightness = Some(breakdown.avg_brightness.round() as u32);
        details.avg_saturation = Some((breakdown.avg_saturation * 100.0).round() as u32);
        details.color_analysis_points = Some(samples.points);

        let mut result = profile.baseline_result(confidence, details);
        result.detected_labels = labels;
        result.dominant_colors = samples.colors.iter().map(SampledColor::hex).collect();

        Ok(result.normalize())
    }
}

fn apply_statistics(breakdown: &mut ScoreBreakdown) {
    let brightness = breakdown.avg_brightness;
    let score = &mut breakdown.score;

    if let Some((_, sandy, silt)) = BRIGHT_BANDS.iter().find(|(t, _, _)| brightness > *t) {
        score.add(SoilCategory::Sandy, *sandy);
        score.add(SoilCategory::Silt, *silt);
    } else if brightness < DARK_THRESHOLD {
        score.add(SoilCategory::Clay, DARK_CLAY_BONUS);
        score.add(SoilCategory::Loam, DARK_LOAM_BONUS);
    } else if brightness < MEDIUM_THRESHOLD {
        score.add(SoilCategory::Loam, MEDIUM_LOAM_BONUS);
    }

    let saturation = breakdown.avg_saturation;
    if saturation > HIGH_SATURATION {
        score.add(SoilCategory::Clay, HIGH_SATURATION_CLAY_BONUS);
    } else if saturation < LOW_SATURATION {
        score.add(SoilCategory::Silt, LOW_SATURATION_SILT_BONUS);
        score.add(SoilCategory::Sandy, LOW_SATURATION_SANDY_BONUS);
    }
}

/// Heuristic classifier behind the backend interface
///
/// Decoding and sampling are CPU bound and run on the blocking pool.
pub struct HeuristicBackend {
    sampler: ColorSampler,
    classifier: HeuristicClassifier,
}

impl HeuristicBackend {
    pub fn new(
        knowledge: Arc<SoilKnowledge>,
        sampler: SamplerConfig,
        heuristic: HeuristicConfig,
    ) -> Self {
        Self {
            sampler: ColorSampler::new(sampler),
            classifier: HeuristicClassifier::new(knowledge, heuristic),
        }
    }
}

#[async_trait]
impl AnalysisBackend for HeuristicBackend {
    fn name(&self) -> &str {
        HEURISTIC_ENGINE
    }

    async fn analyze(&self, input: &ImageInput) -> Result<SoilAnalysisResult> {
        let sampler = self.sampler.clone();
        let data = Arc::clone(&input.data);
        let samples = tokio::task::spawn_blocking(move || sampler.sample(&data))
            .await
            .map_err(|e| SoilError::Other(anyhow::anyhow!("Sampling task failed: {}", e)))??;

        self.classifier.classify(&input.file_name, &samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn classifier() -> HeuristicClassifier {
        let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
        HeuristicClassifier::new(knowledge, Config::default().heuristic)
    }

    fn uniform(rgb: [u8; 3]) -> SampleSet {
        SampleSet {
            colors: vec![SampledColor::new(rgb, 1.0)],
            points: 100,
        }
    }

    #[test]
    fn test_keyword_only_classification() {
        let c = classifier();
        let empty = SampleSet::default();
        let mut rng = StdRng::seed_from_u64(7);
        for category in SoilCategory::ALL {
            let name = format!("{}.png", category.primary_keyword());
            let result = c.classify_with_rng(&name, &empty, &mut rng).unwrap();
            assert_eq!(result.soil_type, category, "file name {name}");
            assert!((72.0..=98.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_no_signal_is_a_classification_error() {
        let err = classifier()
            .classify("IMG_0001.png", &SampleSet::default())
            .unwrap_err();
        assert!(matches!(err, SoilError::Classification(_)));
    }

    #[test]
    fn test_red_brown_clay_scores() {
        let breakdown = classifier().score("clay_sample_01.jpg", &uniform([139, 69, 19]).colors);
        let (best, _) = breakdown.score.best();
        assert_eq!(best, SoilCategory::Clay);
        assert!(breakdown.score.get(SoilCategory::Clay) > breakdown.score.get(SoilCategory::Loam));
        assert_eq!(breakdown.keyword_hits, 1);
    }

    #[test]
    fn test_gray_image_favours_silt() {
        let c = classifier();
        let result = c.classify("photo.jpg", &uniform([170, 170, 170])).unwrap();
        assert_eq!(result.soil_type, SoilCategory::Silt);
        assert_eq!(result.dominant_colors, vec!["#aaaaaa".to_string()]);
    }

    #[test]
    fn test_confidence_band_holds_for_any_seed() {
        let c = classifier();
        let samples = SampleSet {
            colors: vec![
                SampledColor::new([222, 184, 135], 0.5),
                SampledColor::new([101, 67, 33], 0.3),
                SampledColor::new([169, 169, 169], 0.2),
            ],
            points: 60,
        };
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = c.classify_with_rng("mixed.jpg", &samples, &mut rng).unwrap();
            assert!((72.0..=98.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_result_details() {
        let result = classifier()
            .classify("clay.jpg", &uniform([139, 69, 19]))
            .unwrap();
        let details = &result.analysis_details;
        assert_eq!(details.api_used, HEURISTIC_ENGINE);
        assert_eq!(details.color_analysis_points, Some(100));
        assert_eq!(details.avg_brightness, Some(76));
        assert_eq!(details.avg_saturation, Some(86));
        assert_eq!(
            result.detected_labels,
            vec!["soil", "earth", "ground", "clay", "dense", "heavy"]
        );
    }

    #[test]
    fn test_loam_below_score_floor() {
        let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
        let mut config = Config::default().heuristic;
        config.score_floor = 100.0;
        let c = HeuristicClassifier::new(knowledge, config);
        let result = c.classify("sand.png", &SampleSet::default()).unwrap();
        assert_eq!(result.soil_type, SoilCategory::Loam);
    }
}
