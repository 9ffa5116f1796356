//! Plain-text soil report
//!
//! A fixed template over `SoilAnalysisResult`. Callers receive the renderer as
//! a [`ReportFn`] value so the binary (or a test) decides which one is used.

use crate::types::SoilAnalysisResult;
use chrono::NaiveDate;
use std::fmt::Write;

/// Renders a result into report text; the second argument is the generation timestamp
pub type ReportFn = fn(&SoilAnalysisResult, &str) -> String;

const NOT_AVAILABLE: &str = "Not available";
const NOT_SPECIFIED: &str = "Not specified";
const FOOTER: &str = "Report generated by AI Soil Analysis System";

/// Render the standard text report
pub fn render_text_report(result: &SoilAnalysisResult, generated_at: &str) -> String {
    let mut out = String::with_capacity(2048);
    let chemical = &result.chemical_properties;
    let suitability = &result.agricultural_suitability;
    let management = &result.management_practices;

    heading(&mut out, "SOIL ANALYSIS REPORT");
    out.push('\n');
    line(&mut out, "Report Generated", generated_at, NOT_AVAILABLE);
    line(&mut out, "Soil Type", &result.name, "Unknown");
    let _ = writeln!(out, "Confidence Level: {}%", format_confidence(result.confidence));
    line(
        &mut out,
        "Analysis Method",
        &result.analysis_details.api_used,
        NOT_AVAILABLE,
    );
    out.push('\n');

    heading(&mut out, "CHEMICAL PROPERTIES");
    line(&mut out, "pH Range", &chemical.ph_range, NOT_AVAILABLE);
    line(&mut out, "Organic Matter", &chemical.organic_matter, NOT_AVAILABLE);
    out.push('\n');
    out.push_str("NPK Analysis:\n");
    line(&mut out, "- Nitrogen", &chemical.npk_levels.nitrogen, NOT_AVAILABLE);
    line(&mut out, "- Phosphorus", &chemical.npk_levels.phosphorus, NOT_AVAILABLE);
    line(&mut out, "- Potassium", &chemical.npk_levels.potassium, NOT_AVAILABLE);
    out.push('\n');

    heading(&mut out, "PHYSICAL PROPERTIES");
    for (label, value) in result.physical_properties.entries() {
        line(&mut out, label, value, NOT_AVAILABLE);
    }
    out.push('\n');

    heading(&mut out, "AGRICULTURAL SUITABILITY");
    line(
        &mut out,
        "Recommended Crops",
        &suitability.suited_crops.join(", "),
        NOT_SPECIFIED,
    );
    line(
        &mut out,
        "Crops to Avoid",
        &suitability.avoid_crops.join(", "),
        NOT_SPECIFIED,
    );
    line(&mut out, "Irrigation", &suitability.irrigation_needs, NOT_SPECIFIED);
    line(
        &mut out,
        "Fertilization",
        &suitability.fertilization_strategy,
        NOT_SPECIFIED,
    );
    out.push('\n');

    heading(&mut out, "MANAGEMENT PRACTICES");
    line(
        &mut out,
        "Tillage",
        &management.tillage_recommendations,
        NOT_SPECIFIED,
    );
    line(&mut out, "Crop Rotation", &management.crop_rotation, NOT_SPECIFIED);
    out.push('\n');

    heading(&mut out, "EXPERT RECOMMENDATIONS");
    out.push_str(or_default(
        &result.recommendations,
        "No specific recommendations available",
    ));
    out.push_str("\n\n---\n");
    out.push_str(FOOTER);
    out.push('\n');
    out
}

/// `<Soil_Name>_Analysis_Report_<YYYY-MM-DD>.txt`
pub fn report_file_name(result: &SoilAnalysisResult, date: NaiveDate) -> String {
    let name = if result.name.trim().is_empty() {
        "Soil"
    } else {
        result.name.trim()
    };
    let title = format!("{} Analysis Report", name);
    format!(
        "{}_{}.txt",
        title.split_whitespace().collect::<Vec<_>>().join("_"),
        date.format("%Y-%m-%d")
    )
}

fn heading(out: &mut String, title: &str) {
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.len()));
    out.push('\n');
}

fn line(out: &mut String, label: &str, value: &str, default: &str) {
    let _ = writeln!(out, "{}: {}", label, or_default(value, default));
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

fn format_confidence(confidence: f64) -> String {
    if confidence.fract() == 0.0 {
        format!("{:.0}", confidence)
    } else {
        format!("{:.1}", confidence)
    }
}
