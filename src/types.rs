// Shared data model for both analysis backends and the pipeline
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SoilError;

/// Maximum number of suited crops carried on a result
pub const MAX_SUITED_CROPS: usize = 10;
/// Maximum number of crops-to-avoid carried on a result
pub const MAX_AVOID_CROPS: usize = 5;
/// Maximum number of detected feature tags carried on a result
pub const MAX_DETECTED_LABELS: usize = 6;
/// Upper bound for any reported confidence
pub const MAX_CONFIDENCE: f64 = 98.0;

/// Closed set of soil texture classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilCategory {
    Sandy,
    Clay,
    Loam,
    Silt,
}

impl SoilCategory {
    /// All categories, in remote-detection priority order
    pub const ALL: [SoilCategory; 4] = [
        SoilCategory::Sandy,
        SoilCategory::Clay,
        SoilCategory::Loam,
        SoilCategory::Silt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoilCategory::Sandy => "sandy",
            SoilCategory::Clay => "clay",
            SoilCategory::Loam => "loam",
            SoilCategory::Silt => "silt",
        }
    }

    /// Shortest keyword naming the category ("sand", "clay", "loam", "silt")
    pub fn primary_keyword(&self) -> &'static str {
        match self {
            SoilCategory::Sandy => "sand",
            SoilCategory::Clay => "clay",
            SoilCategory::Loam => "loam",
            SoilCategory::Silt => "silt",
        }
    }

    fn index(&self) -> usize {
        match self {
            SoilCategory::Sandy => 0,
            SoilCategory::Clay => 1,
            SoilCategory::Loam => 2,
            SoilCategory::Silt => 3,
        }
    }
}

impl fmt::Display for SoilCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoilCategory {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandy" | "sand" => Ok(SoilCategory::Sandy),
            "clay" | "clayey" => Ok(SoilCategory::Clay),
            "loam" | "loamy" => Ok(SoilCategory::Loam),
            "silt" | "silty" => Ok(SoilCategory::Silt),
            other => Err(SoilError::Config(format!("Unknown soil category: {other}"))),
        }
    }
}

/// Representative colour cluster produced by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledColor {
    /// Mean colour of the cluster
    pub rgb: [u8; 3],
    /// Fraction of sampled pixels that fell into this cluster
    pub frequency: f64,
}

impl SampledColor {
    pub fn new(rgb: [u8; 3], frequency: f64) -> Self {
        Self { rgb, frequency }
    }

    /// Lower-case `#rrggbb` swatch
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.rgb[0], self.rgb[1], self.rgb[2])
    }

    /// Mean of the three channels
    pub fn brightness(&self) -> f64 {
        self.rgb.iter().map(|&c| c as f64).sum::<f64>() / 3.0
    }

    /// (max - min) / max, zero for black
    pub fn saturation(&self) -> f64 {
        let max = *self.rgb.iter().max().unwrap_or(&0) as f64;
        let min = *self.rgb.iter().min().unwrap_or(&0) as f64;
        if max == 0.0 {
            0.0
        } else {
            (max - min) / max
        }
    }

    /// Channel spread under 30 with every channel above 100
    pub fn is_grayish(&self) -> bool {
        let max = *self.rgb.iter().max().unwrap_or(&0);
        let min = *self.rgb.iter().min().unwrap_or(&0);
        max - min < 30 && self.rgb.iter().all(|&c| c > 100)
    }
}

/// Euclidean distance in RGB space
pub fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Additive per-category evidence accumulated during one classification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationScore {
    scores: [f64; 4],
}

impl ClassificationScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: SoilCategory, amount: f64) {
        self.scores[category.index()] += amount;
    }

    pub fn get(&self, category: SoilCategory) -> f64 {
        self.scores[category.index()]
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Highest scoring category; ties go to the earlier category in `SoilCategory::ALL`
    pub fn best(&self) -> (SoilCategory, f64) {
        let mut best = (SoilCategory::Sandy, self.get(SoilCategory::Sandy));
        for category in SoilCategory::ALL.iter().skip(1) {
            let score = self.get(*category);
            if score > best.1 {
                best = (*category, score);
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoilCategory, f64)> + '_ {
        SoilCategory::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalProperties {
    pub texture: String,
    pub drainage: String,
    pub water_retention: String,
    pub aeration: String,
    pub structure: String,
}

impl PhysicalProperties {
    /// Labelled entries in display order
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("Texture", &self.texture),
            ("Drainage", &self.drainage),
            ("Water Retention", &self.water_retention),
            ("Aeration", &self.aeration),
            ("Structure", &self.structure),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpkLevels {
    pub nitrogen: String,
    pub phosphorus: String,
    pub potassium: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChemicalProperties {
    /// `"<low>-<high>"`
    pub ph_range: String,
    pub npk_levels: NpkLevels,
    pub organic_matter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgriculturalSuitability {
    pub suited_crops: Vec<String>,
    pub avoid_crops: Vec<String>,
    pub irrigation_needs: String,
    pub fertilization_strategy: String,
    pub amendments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementPractices {
    pub tillage_recommendations: String,
    pub crop_rotation: String,
    pub planting_advice: String,
    pub erosion_control: String,
}

/// Provenance and timing of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetails {
    pub has_valid_soil_image: bool,
    /// Seconds, one decimal place
    pub processing_time: String,
    /// Which backend produced the result
    pub api_used: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_labels_detected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_brightness: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_saturation: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_analysis_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
}

impl AnalysisDetails {
    pub fn new(api_used: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            has_valid_soil_image: true,
            processing_time: "0.0".to_string(),
            api_used: api_used.into(),
            file_name: file_name.into(),
            total_labels_detected: None,
            avg_brightness: None,
            avg_saturation: None,
            color_analysis_points: None,
            response_length: None,
        }
    }
}

/// Extra prose fields only the remote backend can supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteInsights {
    pub nutrient_availability: String,
    pub salinity: String,
    pub deficiency_risk: String,
    pub seasonal_advice: String,
    pub sustainability_factors: String,
    /// Crops from a short fixed vocabulary mentioned anywhere in the response
    pub primary_crops: Vec<String>,
    /// Unmodified response text
    pub full_analysis: String,
}

/// Canonical successful output of either backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilAnalysisResult {
    pub soil_type: SoilCategory,
    pub confidence: f64,
    pub name: String,
    pub icon: String,
    pub color_theme: String,
    pub physical_properties: PhysicalProperties,
    pub chemical_properties: ChemicalProperties,
    pub agricultural_suitability: AgriculturalSuitability,
    pub management_practices: ManagementPractices,
    /// Short drainage/retention/workability summary keyed by snake_case name
    pub characteristics: BTreeMap<String, String>,
    pub recommendations: String,
    pub detected_labels: Vec<String>,
    pub dominant_colors: Vec<String>,
    pub analysis_details: AnalysisDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<RemoteInsights>,
}

impl SoilAnalysisResult {
    /// Enforce the list-length and confidence bounds every result must satisfy
    pub fn normalize(mut self) -> Self {
        self.confidence = clamp_confidence(self.confidence, 0.0, MAX_CONFIDENCE);
        self.agricultural_suitability
            .suited_crops
            .truncate(MAX_SUITED_CROPS);
        self.agricultural_suitability
            .avoid_crops
            .truncate(MAX_AVOID_CROPS);
        self.detected_labels.truncate(MAX_DETECTED_LABELS);
        self
    }
}

/// Clamp and round to one decimal place; NaN maps to the lower bound
pub fn clamp_confidence(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    (value.clamp(min, max) * 10.0).round() / 10.0
}

/// Terminal failure record; the presentation layer still receives an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFailure {
    pub error: bool,
    pub error_message: String,
    pub processing_time: String,
    pub confidence: f64,
}

impl AnalysisFailure {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_message: error_message.into(),
            processing_time: "0.0".to_string(),
            confidence: 0.0,
        }
    }
}

/// Result of one pipeline invocation: success fields or error fields, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Failure(AnalysisFailure),
    Success(Box<SoilAnalysisResult>),
}

impl AnalysisOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisOutcome::Failure(_))
    }

    pub fn result(&self) -> Option<&SoilAnalysisResult> {
        match self {
            AnalysisOutcome::Success(result) => Some(result),
            AnalysisOutcome::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Option<SoilAnalysisResult> {
        match self {
            AnalysisOutcome::Success(result) => Some(*result),
            AnalysisOutcome::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Failure(failure) => Some(&failure.error_message),
            AnalysisOutcome::Success(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!("Sandy".parse::<SoilCategory>().unwrap(), SoilCategory::Sandy);
        assert_eq!("silty".parse::<SoilCategory>().unwrap(), SoilCategory::Silt);
        assert!("peat".parse::<SoilCategory>().is_err());
        assert_eq!(SoilCategory::Clay.to_string(), "clay");
    }

    #[test]
    fn test_sampled_color_statistics() {
        let gray = SampledColor::new([150, 150, 160], 1.0);
        assert!(gray.is_grayish());
        assert!((gray.brightness() - 153.333).abs() < 0.01);
        assert!(gray.saturation() < 0.1);

        let brown = SampledColor::new([139, 69, 19], 1.0);
        assert!(!brown.is_grayish());
        assert_eq!(brown.hex(), "#8b4513");

        let black = SampledColor::new([0, 0, 0], 1.0);
        assert_eq!(black.saturation(), 0.0);
    }

    #[test]
    fn test_score_best_prefers_first_on_tie() {
        let mut score = ClassificationScore::new();
        score.add(SoilCategory::Loam, 1.0);
        score.add(SoilCategory::Clay, 1.0);
        assert_eq!(score.best(), (SoilCategory::Clay, 1.0));
        assert_eq!(score.total(), 2.0);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(101.26, 0.0, 98.0), 98.0);
        assert_eq!(clamp_confidence(80.06, 72.0, 98.0), 80.1);
        assert_eq!(clamp_confidence(f64::NAN, 72.0, 98.0), 72.0);
    }

    #[test]
    fn test_failure_outcome_serializes_error_fields_only() {
        let outcome = AnalysisOutcome::Failure(AnalysisFailure::new("decode failed"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["error"], true);
        assert_eq!(json["errorMessage"], "decode failed");
        assert!(json.get("soilType").is_none());
    }
}
