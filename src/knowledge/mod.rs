//! Static soil knowledge tables
//!
//! Everything the classifiers treat as fixed data lives here rather than in code:
//! - Per-category profiles (reference palette, filename keywords, property texts,
//!   crop lists, action plans)
//! - Remote-response matching rules (crop vocabulary, filler words, denylist,
//!   labelled section keywords, pre-compiled crop/pH/nutrient regexes)
//!
//! Built-in copies of `config-templates/*.toml` are compiled into the binary;
//! alternative files can be supplied through the `[knowledge]` config section.

use crate::config::KnowledgeConfig;
use crate::error::{Result, SoilError};
use crate::types::{
    AgriculturalSuitability, AnalysisDetails, ChemicalProperties, ManagementPractices, NpkLevels,
    PhysicalProperties, SoilAnalysisResult, SoilCategory,
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_PROFILES: &str = include_str!("../../config-templates/soil_profiles.toml");
const BUILTIN_PARSING: &str = include_str!("../../config-templates/parsing.toml");

/// Profiles file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    pub profile: Vec<SoilProfile>,
    pub fallback: FallbackProfile,
}

/// Reference data for one soil category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilProfile {
    pub category: SoilCategory,
    pub name: String,
    pub icon: String,
    pub color_theme: String,
    pub keywords: Vec<String>,
    pub palette: Vec<[u8; 3]>,
    pub labels: Vec<String>,
    pub recommendations: String,
    pub deficiency_risk: String,
    pub seasonal_advice: String,
    pub sustainability: String,
    pub characteristics: BTreeMap<String, String>,
    pub physical: PhysicalDefaults,
    pub chemical: ChemicalDefaults,
    pub suitability: SuitabilityDefaults,
    pub management: ManagementDefaults,
    pub actions: ActionPlan,
}

impl SoilProfile {
    /// Result populated entirely from this profile's static tables
    ///
    /// Backends start here and overwrite whatever they could observe.
    pub fn baseline_result(&self, confidence: f64, details: AnalysisDetails) -> SoilAnalysisResult {
        SoilAnalysisResult {
            soil_type: self.category,
            confidence,
            name: self.name.clone(),
            icon: self.icon.clone(),
            color_theme: self.color_theme.clone(),
            physical_properties: PhysicalProperties {
                texture: self.physical.texture.clone(),
                drainage: self.physical.drainage.clone(),
                water_retention: self.physical.water_retention.clone(),
                aeration: self.physical.aeration.clone(),
                structure: self.physical.structure.clone(),
            },
            chemical_properties: ChemicalProperties {
                ph_range: self.chemical.ph_range.clone(),
                npk_levels: NpkLevels {
                    nitrogen: self.chemical.nitrogen.clone(),
                    phosphorus: self.chemical.phosphorus.clone(),
                    potassium: self.chemical.potassium.clone(),
                },
                organic_matter: self.chemical.organic_matter.clone(),
            },
            agricultural_suitability: AgriculturalSuitability {
                suited_crops: self.suitability.suited_crops.clone(),
                avoid_crops: self.suitability.avoid_crops.clone(),
                irrigation_needs: self.suitability.irrigation_needs.clone(),
                fertilization_strategy: self.suitability.fertilization_strategy.clone(),
                amendments: self.suitability.amendments.clone(),
            },
            management_practices: ManagementPractices {
                tillage_recommendations: self.management.tillage.clone(),
                crop_rotation: self.management.rotation.clone(),
                planting_advice: self.management.planting.clone(),
                erosion_control: self.management.erosion.clone(),
            },
            characteristics: self.characteristics.clone(),
            recommendations: self.recommendations.clone(),
            detected_labels: self.labels.clone(),
            dominant_colors: Vec::new(),
            analysis_details: details,
            insights: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalDefaults {
    pub texture: String,
    pub drainage: String,
    pub water_retention: String,
    pub aeration: String,
    pub structure: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemicalDefaults {
    pub ph_range: String,
    pub nitrogen: String,
    pub phosphorus: String,
    pub potassium: String,
    pub organic_matter: String,
    pub nutrient_availability: String,
    pub salinity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuitabilityDefaults {
    pub suited_crops: Vec<String>,
    pub avoid_crops: Vec<String>,
    pub irrigation_needs: String,
    pub fertilization_strategy: String,
    pub amendments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementDefaults {
    pub tillage: String,
    pub rotation: String,
    pub planting: String,
    pub erosion: String,
}

/// Immediate, seasonal and long-term actions for a soil type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub immediate: Vec<String>,
    pub seasonal: SeasonalActions,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalActions {
    pub spring: String,
    pub summer: String,
    pub fall: String,
    pub winter: String,
}

/// Advice returned when a soil type string matches no category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackProfile {
    pub name: String,
    pub keywords: Vec<String>,
    pub suited_crops: Vec<String>,
    pub recommendations: String,
    pub characteristics: BTreeMap<String, String>,
    pub actions: ActionPlan,
}

/// Labelled response sections the prose parser knows how to locate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionField {
    Texture,
    Drainage,
    WaterRetention,
    Aeration,
    Structure,
    NutrientAvailability,
    Salinity,
    Irrigation,
    Fertilization,
    Amendments,
    Tillage,
    Planting,
    Rotation,
    Erosion,
    Recommendations,
    Deficiency,
    Seasonal,
    Sustainability,
}

impl SectionField {
    pub const ALL: [SectionField; 18] = [
        SectionField::Texture,
        SectionField::Drainage,
        SectionField::WaterRetention,
        SectionField::Aeration,
        SectionField::Structure,
        SectionField::NutrientAvailability,
        SectionField::Salinity,
        SectionField::Irrigation,
        SectionField::Fertilization,
        SectionField::Amendments,
        SectionField::Tillage,
        SectionField::Planting,
        SectionField::Rotation,
        SectionField::Erosion,
        SectionField::Recommendations,
        SectionField::Deficiency,
        SectionField::Seasonal,
        SectionField::Sustainability,
    ];

    /// Key under `[sections]` in the parsing rules file
    pub fn key(&self) -> &'static str {
        match self {
            SectionField::Texture => "texture",
            SectionField::Drainage => "drainage",
            SectionField::WaterRetention => "water_retention",
            SectionField::Aeration => "aeration",
            SectionField::Structure => "structure",
            SectionField::NutrientAvailability => "nutrient_availability",
            SectionField::Salinity => "salinity",
            SectionField::Irrigation => "irrigation",
            SectionField::Fertilization => "fertilization",
            SectionField::Amendments => "amendments",
            SectionField::Tillage => "tillage",
            SectionField::Planting => "planting",
            SectionField::Rotation => "rotation",
            SectionField::Erosion => "erosion",
            SectionField::Recommendations => "recommendations",
            SectionField::Deficiency => "deficiency",
            SectionField::Seasonal => "seasonal",
            SectionField::Sustainability => "sustainability",
        }
    }
}

/// One keyword attempt for a section and its character budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionKeyword {
    pub keyword: String,
    pub max_len: usize,
}

/// Section keyword compiled into a case-insensitive literal matcher
#[derive(Debug, Clone)]
pub struct SectionMatcher {
    pub pattern: Regex,
    pub max_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutrientPatterns {
    pub nitrogen: Vec<String>,
    pub phosphorus: Vec<String>,
    pub potassium: Vec<String>,
}

/// Parsing rules file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    pub min_fragment_len: usize,
    pub denylist: Vec<String>,
    #[serde(default)]
    pub denied_prefixes: Vec<String>,
    pub crop_vocabulary: Vec<String>,
    pub filler_words: Vec<String>,
    pub primary_crop_vocabulary: Vec<String>,
    pub primary_crop_default: Vec<String>,
    pub color_words: Vec<String>,
    pub color_default: Vec<String>,
    pub remote_labels: Vec<String>,
    pub suitable_min_len: usize,
    pub suitable_crop_patterns: Vec<String>,
    pub avoid_min_len: usize,
    pub avoid_crop_patterns: Vec<String>,
    pub ph_range_pattern: String,
    pub ph_single_pattern: String,
    pub ph_default: String,
    pub organic_matter_patterns: Vec<String>,
    #[serde(default)]
    pub organic_matter_denylist: Vec<String>,
    pub nutrients: NutrientPatterns,
    pub sections: BTreeMap<String, Vec<SectionKeyword>>,
}

/// Parsing rules with every regex pre-compiled
#[derive(Debug, Clone)]
pub struct ParsingRules {
    pub config: ParsingConfig,
    pub suitable_crops: Vec<Regex>,
    pub avoid_crops: Vec<Regex>,
    pub ph_range: Regex,
    pub ph_single: Regex,
    pub organic_matter: Vec<Regex>,
    pub nitrogen: Vec<Regex>,
    pub phosphorus: Vec<Regex>,
    pub potassium: Vec<Regex>,
    pub sections: BTreeMap<String, Vec<SectionMatcher>>,
}

impl ParsingRules {
    /// Keyword matchers for a section, empty if the section is not configured
    pub fn section_matchers(&self, field: SectionField) -> &[SectionMatcher] {
        self.sections
            .get(field.key())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Registry of all soil knowledge used by the classifiers
#[derive(Debug, Clone)]
pub struct SoilKnowledge {
    profiles: Vec<SoilProfile>,
    pub fallback: FallbackProfile,
    pub parsing: ParsingRules,
}

impl SoilKnowledge {
    /// Knowledge compiled from the embedded templates
    pub fn builtin() -> Result<Self> {
        let profiles: ProfilesConfig = toml::from_str(BUILTIN_PROFILES)?;
        let parsing: ParsingConfig = toml::from_str(BUILTIN_PARSING)?;
        Self::from_configs(profiles, parsing)
    }

    /// Load according to the `[knowledge]` config section; unset paths use built-ins
    pub fn load(config: &KnowledgeConfig) -> Result<Self> {
        let profiles: ProfilesConfig = match &config.profiles_file {
            Some(path) => read_toml(path, "profiles")?,
            None => toml::from_str(BUILTIN_PROFILES)?,
        };
        let parsing: ParsingConfig = match &config.parsing_file {
            Some(path) => read_toml(path, "parsing rules")?,
            None => toml::from_str(BUILTIN_PARSING)?,
        };
        Self::from_configs(profiles, parsing)
    }

    /// Load both tables from explicit files
    pub fn from_config_files(profiles_path: &Path, parsing_path: &Path) -> Result<Self> {
        let profiles: ProfilesConfig = read_toml(profiles_path, "profiles")?;
        let parsing: ParsingConfig = read_toml(parsing_path, "parsing rules")?;
        Self::from_configs(profiles, parsing)
    }

    /// Build from parsed configurations, validating coverage and compiling regexes
    pub fn from_configs(profiles: ProfilesConfig, parsing: ParsingConfig) -> Result<Self> {
        for category in SoilCategory::ALL {
            let count = profiles
                .profile
                .iter()
                .filter(|p| p.category == category)
                .count();
            if count != 1 {
                return Err(SoilError::Config(format!(
                    "Expected exactly one profile for '{}', found {}",
                    category, count
                )));
            }
        }

        for profile in &profiles.profile {
            if profile.palette.is_empty() {
                return Err(SoilError::Config(format!(
                    "Profile '{}' has an empty reference palette",
                    profile.category
                )));
            }
        }

        let parsing = ParsingRules {
            suitable_crops: compile_all(&parsing.suitable_crop_patterns, "suitable_crop_patterns")?,
            avoid_crops: compile_all(&parsing.avoid_crop_patterns, "avoid_crop_patterns")?,
            ph_range: compile(&parsing.ph_range_pattern, "ph_range_pattern")?,
            ph_single: compile(&parsing.ph_single_pattern, "ph_single_pattern")?,
            organic_matter: compile_all(
                &parsing.organic_matter_patterns,
                "organic_matter_patterns",
            )?,
            nitrogen: compile_all(&parsing.nutrients.nitrogen, "nutrients.nitrogen")?,
            phosphorus: compile_all(&parsing.nutrients.phosphorus, "nutrients.phosphorus")?,
            potassium: compile_all(&parsing.nutrients.potassium, "nutrients.potassium")?,
            sections: compile_sections(&parsing.sections)?,
            config: parsing,
        };

        let mut profiles_sorted = profiles.profile;
        profiles_sorted.sort_by_key(|p| p.category);

        Ok(Self {
            profiles: profiles_sorted,
            fallback: profiles.fallback,
            parsing,
        })
    }

    /// Profile for a category (coverage is checked at load time)
    pub fn profile(&self, category: SoilCategory) -> &SoilProfile {
        self.profiles
            .iter()
            .find(|p| p.category == category)
            .unwrap_or(&self.profiles[0])
    }

    pub fn profiles(&self) -> &[SoilProfile] {
        &self.profiles
    }

    /// First profile (in category order) whose name or keywords occur in `text`
    pub fn match_keywords(&self, text: &str) -> Option<&SoilProfile> {
        let lower = text.to_lowercase();
        SoilCategory::ALL.iter().map(|c| self.profile(*c)).find(|p| {
            lower.contains(p.category.as_str())
                || p.keywords.iter().any(|k| lower.contains(k.as_str()))
        })
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| SoilError::Io {
        source: e,
        context: format!("Failed to read {} file: {:?}", what, path),
    })?;
    Ok(toml::from_str(&content)?)
}

fn compile(pattern: &str, name: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SoilError::Config(format!("Invalid regex in '{}': {}", name, e)))
}

fn compile_all(patterns: &[String], name: &str) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p, name)).collect()
}

fn compile_sections(
    sections: &BTreeMap<String, Vec<SectionKeyword>>,
) -> Result<BTreeMap<String, Vec<SectionMatcher>>> {
    sections
        .iter()
        .map(|(name, keywords)| -> Result<(String, Vec<SectionMatcher>)> {
            let matchers = keywords
                .iter()
                .map(|k| -> Result<SectionMatcher> {
                    Ok(SectionMatcher {
                        pattern: compile(&regex::escape(&k.keyword), name)?,
                        max_len: k.max_len,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((name.clone(), matchers))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_knowledge_loads() {
        let knowledge = SoilKnowledge::builtin().unwrap();
        assert_eq!(knowledge.profiles().len(), 4);
        for category in SoilCategory::ALL {
            let profile = knowledge.profile(category);
            assert_eq!(profile.category, category);
            assert!(!profile.palette.is_empty());
            assert!(profile
                .keywords
                .iter()
                .any(|k| k == category.primary_keyword()));
            assert!(profile.suitability.suited_crops.len() <= 10);
            assert!(profile.suitability.avoid_crops.len() <= 5);
        }
    }

    #[test]
    fn test_every_section_is_configured() {
        let knowledge = SoilKnowledge::builtin().unwrap();
        for field in SectionField::ALL {
            assert!(
                !knowledge.parsing.section_matchers(field).is_empty(),
                "no keywords for {}",
                field.key()
            );
        }
    }

    #[test]
    fn test_missing_category_is_rejected() {
        let mut profiles: ProfilesConfig = toml::from_str(BUILTIN_PROFILES).unwrap();
        let parsing: ParsingConfig = toml::from_str(BUILTIN_PARSING).unwrap();
        profiles.profile.retain(|p| p.category != SoilCategory::Silt);
        assert!(SoilKnowledge::from_configs(profiles, parsing).is_err());
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let profiles: ProfilesConfig = toml::from_str(BUILTIN_PROFILES).unwrap();
        let mut parsing: ParsingConfig = toml::from_str(BUILTIN_PARSING).unwrap();
        parsing.ph_single_pattern = "(unclosed".to_string();
        let err = SoilKnowledge::from_configs(profiles, parsing).unwrap_err();
        assert!(err.to_string().contains("ph_single_pattern"));
    }

    #[test]
    fn test_match_keywords() {
        let knowledge = SoilKnowledge::builtin().unwrap();
        assert_eq!(
            knowledge.match_keywords("Heavy clay").map(|p| p.category),
            Some(SoilCategory::Clay)
        );
        assert_eq!(
            knowledge.match_keywords("river silt").map(|p| p.category),
            Some(SoilCategory::Silt)
        );
        assert!(knowledge.match_keywords("peat").is_none());
    }
}
