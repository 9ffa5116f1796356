//! Soil-type advice and detailed analysis records
//!
//! Lookups take free-form text ("Sandy Soil", "silty loam", "clay") and resolve
//! it against the knowledge tables. Text that names no known soil gets the
//! generic fallback record rather than an error.

use crate::input::ImageInput;
use crate::knowledge::{ActionPlan, SoilKnowledge};
use crate::types::{SoilAnalysisResult, SoilCategory};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Advice for one soil type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilAdvice {
    /// `None` when the text matched no category
    pub category: Option<SoilCategory>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub characteristics: BTreeMap<String, String>,
    pub crops_suitable: Vec<String>,
    pub recommendations: String,
    pub keywords: Vec<String>,
}

impl SoilAdvice {
    pub fn is_known(&self) -> bool {
        self.category.is_some()
    }
}

/// Resolve free-form soil text to advice
pub fn recommendations_for(knowledge: &SoilKnowledge, soil_type: &str) -> SoilAdvice {
    match knowledge.match_keywords(soil_type) {
        Some(profile) => SoilAdvice {
            category: Some(profile.category),
            type_name: profile.name.clone(),
            characteristics: profile.characteristics.clone(),
            crops_suitable: profile.suitability.suited_crops.clone(),
            recommendations: profile.recommendations.clone(),
            keywords: profile.keywords.clone(),
        },
        None => {
            tracing::debug!("No soil profile matches '{}'", soil_type);
            let fallback = &knowledge.fallback;
            SoilAdvice {
                category: None,
                type_name: fallback.name.clone(),
                characteristics: fallback.characteristics.clone(),
                crops_suitable: fallback.suited_crops.clone(),
                recommendations: fallback.recommendations.clone(),
                keywords: fallback.keywords.clone(),
            }
        }
    }
}

/// Immediate, seasonal and long-term actions for free-form soil text
pub fn action_plan_for<'a>(knowledge: &'a SoilKnowledge, soil_type: &str) -> &'a ActionPlan {
    let lower = soil_type.to_lowercase();
    SoilCategory::ALL
        .iter()
        .find(|c| lower.contains(c.primary_keyword()))
        .map(|c| &knowledge.profile(*c).actions)
        .unwrap_or(&knowledge.fallback.actions)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    pub analysis_method: String,
    /// `"<n> bytes"`
    pub image_size: String,
    pub image_type: String,
    pub recommendations: ActionPlan,
}

/// A successful analysis enriched with advice and timing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    #[serde(flatten)]
    pub result: SoilAnalysisResult,
    pub detailed_recommendations: SoilAdvice,
    /// Wall-clock time of the whole pipeline call, `"<ms>ms"`
    pub total_processing_time: String,
    pub analysis_timestamp: String,
    pub additional_info: AdditionalInfo,
}

impl DetailedAnalysis {
    pub fn build(
        knowledge: &SoilKnowledge,
        result: SoilAnalysisResult,
        input: &ImageInput,
        elapsed: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let soil_type = result.soil_type.as_str();
        let detailed_recommendations = recommendations_for(knowledge, soil_type);
        let actions = action_plan_for(knowledge, soil_type).clone();

        Self {
            additional_info: AdditionalInfo {
                analysis_method: result.analysis_details.api_used.clone(),
                image_size: format!("{} bytes", input.len()),
                image_type: input.mime_type.clone(),
                recommendations: actions,
            },
            detailed_recommendations,
            total_processing_time: format!("{}ms", elapsed.as_millis()),
            analysis_timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisDetails;
    use chrono::TimeZone;

    fn knowledge() -> SoilKnowledge {
        SoilKnowledge::builtin().unwrap()
    }

    #[test]
    fn test_lookup_by_name_and_keyword() {
        let k = knowledge();
        assert_eq!(
            recommendations_for(&k, "Sandy Soil").category,
            Some(SoilCategory::Sandy)
        );
        assert_eq!(
            recommendations_for(&k, "heavy sticky ground").category,
            Some(SoilCategory::Clay)
        );
        assert_eq!(recommendations_for(&k, "SILT").type_name, "Silt Soil");
    }

    #[test]
    fn test_unknown_text_gets_fallback() {
        let advice = recommendations_for(&knowledge(), "peat");
        assert!(!advice.is_known());
        assert_eq!(advice.type_name, "Unknown Soil Type");
        assert_eq!(advice.characteristics.len(), 6);
        assert!(advice.recommendations.contains("professional soil test"));
    }

    #[test]
    fn test_action_plans() {
        let k = knowledge();
        let clay = action_plan_for(&k, "clay");
        assert_eq!(clay.immediate[0], "Avoid walking on wet soil");

        let unknown = action_plan_for(&k, "volcanic ash");
        assert_eq!(unknown.seasonal.winter, "Plan next year's garden");
        assert_eq!(unknown.long_term.len(), 4);
    }

    #[test]
    fn test_detailed_analysis_fields() {
        let k = knowledge();
        let result = k
            .profile(SoilCategory::Loam)
            .baseline_result(91.5, AnalysisDetails::new("Smart Color Analysis Engine", "a.png"));
        let input = ImageInput::from_bytes("a.png", vec![0u8; 2048]);
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let detailed =
            DetailedAnalysis::build(&k, result, &input, Duration::from_millis(1234), timestamp);
        assert_eq!(detailed.total_processing_time, "1234ms");
        assert_eq!(detailed.analysis_timestamp, "2026-03-01T12:00:00.000Z");
        assert_eq!(detailed.additional_info.image_size, "2048 bytes");
        assert_eq!(detailed.additional_info.image_type, "image/png");
        assert_eq!(
            detailed.additional_info.analysis_method,
            "Smart Color Analysis Engine"
        );

        let json = serde_json::to_value(&detailed).unwrap();
        assert_eq!(json["soilType"], "loam");
        assert_eq!(json["detailedRecommendations"]["type"], "Loam Soil");
        assert!(json["additionalInfo"]["recommendations"]["immediate"].is_array());
    }
}
