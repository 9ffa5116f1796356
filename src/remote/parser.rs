use crate::knowledge::{SectionField, SoilKnowledge, SoilProfile};
use crate::remote::text::{clean_sentence, extract_clean_section, find_mentions, parse_crop_names};
use crate::types::{
    clamp_confidence, AgriculturalSuitability, AnalysisDetails, ChemicalProperties,
    ManagementPractices, NpkLevels, PhysicalProperties, RemoteInsights, SoilAnalysisResult,
    SoilCategory, MAX_AVOID_CROPS, MAX_CONFIDENCE, MAX_SUITED_CROPS,
};
use rand::{Rng, RngCore};
use regex::Regex;
use std::sync::Arc;

pub const REMOTE_ENGINE: &str = "Gemini AI Enhanced Analysis";

/// Confidence when the response names no soil category
const UNDETECTED_CONFIDENCE: f64 = 85.0;
const MAX_COLOR_MENTIONS: usize = 3;
const MIN_NUTRIENT_LEN: usize = 6;
const MIN_ORGANIC_MATTER_LEN: usize = 9;
const PH_MIN: f64 = 0.0;
const PH_MAX: f64 = 14.0;

/// Turns one upstream response style into the canonical result
///
/// Implementations must never fail: anything they cannot find degrades to
/// the detected category's defaults.
pub trait ResponseParser: Send + Sync {
    /// Short name of the response style, for logs
    fn style(&self) -> &str;

    fn parse(&self, text: &str, rng: &mut dyn RngCore) -> SoilAnalysisResult;
}

/// Parser for sectioned prose reports ("DRAINAGE CAPABILITY: ...")
pub struct ProseResponseParser {
    knowledge: Arc<SoilKnowledge>,
}

impl ProseResponseParser {
    pub fn new(knowledge: Arc<SoilKnowledge>) -> Self {
        Self { knowledge }
    }

    /// First category mentioned, checked in sandy/clay/loam/silt order
    pub fn detect_category(text: &str) -> Option<SoilCategory> {
        let lower = text.to_lowercase();
        SoilCategory::ALL
            .into_iter()
            .find(|c| lower.contains(c.primary_keyword()))
    }

    /// Base confidence and jitter span per detected category
    fn confidence_band(category: SoilCategory) -> (f64, f64) {
        match category {
            SoilCategory::Sandy => (88.0, 10.0),
            SoilCategory::Clay => (90.0, 8.0),
            SoilCategory::Loam => (92.0, 6.0),
            SoilCategory::Silt => (87.0, 9.0),
        }
    }

    fn section(&self, text: &str, field: SectionField) -> Option<String> {
        let rules = &self.knowledge.parsing;
        rules
            .section_matchers(field)
            .iter()
            .find_map(|m| extract_clean_section(text, &m.pattern, m.max_len, &rules.config))
    }

    fn section_or(&self, text: &str, field: SectionField, default: &str) -> String {
        self.section(text, field)
            .unwrap_or_else(|| default.to_string())
    }

    /// "<low>-<high>" from a range, or a single value widened by 0.5
    pub fn extract_ph(&self, text: &str) -> Option<String> {
        let rules = &self.knowledge.parsing;

        for caps in rules.ph_range.captures_iter(text) {
            let (Some(low), Some(high)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            match (parse_ph(low.as_str()), parse_ph(high.as_str())) {
                (Some(l), Some(h)) if l <= h => {
                    return Some(format!("{}-{}", low.as_str(), high.as_str()));
                }
                _ => continue,
            }
        }

        rules.ph_single.captures_iter(text).find_map(|caps| {
            let raw = caps.get(1)?.as_str();
            let value = parse_ph(raw)?;
            Some(format!("{}-{:.1}", raw, (value + 0.5).min(PH_MAX)))
        })
    }

    fn first_clean_capture(
        &self,
        patterns: &[Regex],
        text: &str,
        min_len: usize,
    ) -> Option<String> {
        let config = &self.knowledge.parsing.config;
        patterns.iter().find_map(|re| {
            let raw = re.captures(text)?.get(1)?.as_str();
            clean_sentence(raw, config).filter(|s| s.chars().count() >= min_len)
        })
    }

    fn organic_matter(&self, text: &str, profile: &SoilProfile) -> String {
        let rules = &self.knowledge.parsing;
        rules
            .organic_matter
            .iter()
            .filter_map(|re| {
                let raw = re.captures(text)?.get(1)?.as_str();
                clean_sentence(raw, &rules.config)
            })
            .find(|s| {
                let lower = s.to_lowercase();
                s.chars().count() >= MIN_ORGANIC_MATTER_LEN
                    && !rules
                        .config
                        .organic_matter_denylist
                        .iter()
                        .any(|d| lower.contains(d.as_str()))
            })
            .unwrap_or_else(|| profile.chemical.organic_matter.clone())
    }

    /// Raw text following the first crop-list pattern whose capture is long enough
    fn crop_list_text<'t>(patterns: &[Regex], text: &'t str, min_len: usize) -> Option<&'t str> {
        patterns.iter().find_map(|re| {
            let capture = re.captures(text)?.get(1)?;
            let mut list = capture.as_str();
            // A capture that stops at a colon swallowed the next section's label line
            if text[capture.end()..].starts_with(':') {
                list = list.rsplit_once('\n').map_or(list, |(head, _)| head);
            }
            (list.len() > min_len).then_some(list)
        })
    }

    fn crops(&self, text: &str, profile: &SoilProfile) -> (Vec<String>, Vec<String>) {
        let rules = &self.knowledge.parsing;
        let config = &rules.config;

        let pick = |patterns: &[Regex], min_len: usize, limit: usize, default: &[String]| {
            let mut crops = Self::crop_list_text(patterns, text, min_len)
                .map(|list| parse_crop_names(list, config))
                .unwrap_or_default();
            if crops.is_empty() {
                crops = default.to_vec();
            }
            crops.truncate(limit);
            crops
        };

        let suited = pick(
            &rules.suitable_crops,
            config.suitable_min_len,
            MAX_SUITED_CROPS,
            &profile.suitability.suited_crops,
        );
        let avoid = pick(
            &rules.avoid_crops,
            config.avoid_min_len,
            MAX_AVOID_CROPS,
            &profile.suitability.avoid_crops,
        );
        (suited, avoid)
    }
}

fn parse_ph(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| (PH_MIN..=PH_MAX).contains(v))
}

impl ResponseParser for ProseResponseParser {
    fn style(&self) -> &str {
        "prose"
    }

    fn parse(&self, text: &str, rng: &mut dyn RngCore) -> SoilAnalysisResult {
        let detected = Self::detect_category(text);
        let category = detected.unwrap_or(SoilCategory::Loam);
        let confidence = match detected {
            Some(c) => {
                let (base, span) = Self::confidence_band(c);
                base + rng.gen::<f64>() * span
            }
            None => UNDETECTED_CONFIDENCE,
        };
        let confidence = clamp_confidence(confidence, 0.0, MAX_CONFIDENCE);

        tracing::debug!(
            "Remote response names {:?}, using {} at {:.1}%",
            detected,
            category,
            confidence
        );

        let profile = self.knowledge.profile(category);
        let rules = &self.knowledge.parsing;
        let config = &rules.config;
        let clean = text.replace('*', "");
        let clean = clean.trim();

        let physical_properties = PhysicalProperties {
            texture: self.section_or(clean, SectionField::Texture, &profile.physical.texture),
            drainage: self.section_or(clean, SectionField::Drainage, &profile.physical.drainage),
            water_retention: self.section_or(
                clean,
                SectionField::WaterRetention,
                &profile.physical.water_retention,
            ),
            aeration: self.section_or(clean, SectionField::Aeration, &profile.physical.aeration),
            structure: self.section_or(clean, SectionField::Structure, &profile.physical.structure),
        };

        let chemical_properties = ChemicalProperties {
            ph_range: self
                .extract_ph(clean)
                .unwrap_or_else(|| config.ph_default.clone()),
            npk_levels: NpkLevels {
                nitrogen: self
                    .first_clean_capture(&rules.nitrogen, clean, MIN_NUTRIENT_LEN)
                    .unwrap_or_else(|| profile.chemical.nitrogen.clone()),
                phosphorus: self
                    .first_clean_capture(&rules.phosphorus, clean, MIN_NUTRIENT_LEN)
                    .unwrap_or_else(|| profile.chemical.phosphorus.clone()),
                potassium: self
                    .first_clean_capture(&rules.potassium, clean, MIN_NUTRIENT_LEN)
                    .unwrap_or_else(|| profile.chemical.potassium.clone()),
            },
            organic_matter: self.organic_matter(clean, profile),
        };

        let (suited_crops, avoid_crops) = self.crops(clean, profile);
        let agricultural_suitability = AgriculturalSuitability {
            suited_crops,
            avoid_crops,
            irrigation_needs: self.section_or(
                clean,
                SectionField::Irrigation,
                &profile.suitability.irrigation_needs,
            ),
            fertilization_strategy: self.section_or(
                clean,
                SectionField::Fertilization,
                &profile.suitability.fertilization_strategy,
            ),
            amendments: self.section_or(
                clean,
                SectionField::Amendments,
                &profile.suitability.amendments,
            ),
        };

        let management_practices = ManagementPractices {
            tillage_recommendations: self.section_or(
                clean,
                SectionField::Tillage,
                &profile.management.tillage,
            ),
            crop_rotation: self.section_or(
                clean,
                SectionField::Rotation,
                &profile.management.rotation,
            ),
            planting_advice: self.section_or(
                clean,
                SectionField::Planting,
                &profile.management.planting,
            ),
            erosion_control: self.section_or(
                clean,
                SectionField::Erosion,
                &profile.management.erosion,
            ),
        };

        let mut primary_crops = find_mentions(
            clean,
            &config.primary_crop_vocabulary,
            config.primary_crop_vocabulary.len(),
        );
        if primary_crops.is_empty() {
            primary_crops = config.primary_crop_default.clone();
        }

        let insights = RemoteInsights {
            nutrient_availability: self.section_or(
                clean,
                SectionField::NutrientAvailability,
                &profile.chemical.nutrient_availability,
            ),
            salinity: self.section_or(clean, SectionField::Salinity, &profile.chemical.salinity),
            deficiency_risk: self.section_or(
                clean,
                SectionField::Deficiency,
                &profile.deficiency_risk,
            ),
            seasonal_advice: self.section_or(
                clean,
                SectionField::Seasonal,
                &profile.seasonal_advice,
            ),
            sustainability_factors: self.section_or(
                clean,
                SectionField::Sustainability,
                &profile.sustainability,
            ),
            primary_crops,
            full_analysis: text.to_string(),
        };

        let mut dominant_colors = find_mentions(clean, &config.color_words, MAX_COLOR_MENTIONS);
        if dominant_colors.is_empty() {
            dominant_colors = config.color_default.clone();
        }

        let mut details = AnalysisDetails::new(REMOTE_ENGINE, "");
        details.response_length = Some(text.chars().count());

        SoilAnalysisResult {
            soil_type: category,
            confidence,
            name: profile.name.clone(),
            icon: profile.icon.clone(),
            color_theme: profile.color_theme.clone(),
            physical_properties,
            chemical_properties,
            agricultural_suitability,
            management_practices,
            characteristics: profile.characteristics.clone(),
            recommendations: self.section_or(
                clean,
                SectionField::Recommendations,
                &profile.recommendations,
            ),
            detected_labels: config.remote_labels.clone(),
            dominant_colors,
            analysis_details: details,
            insights: Some(insights),
        }
        .normalize()
    }
}
