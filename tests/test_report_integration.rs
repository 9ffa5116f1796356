// Integration test for report rendering from real backend output
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use soilscan::knowledge::SoilKnowledge;
use soilscan::remote::{ProseResponseParser, ResponseParser};
use soilscan::report::{render_text_report, report_file_name, ReportFn};
use soilscan::types::SoilAnalysisResult;
use std::sync::Arc;
use tempfile::TempDir;

const SILT_RESPONSE: &str = "Primary soil type: Silt.
Estimated pH range: 6.5-7.5
Best suited crops: Lettuce, Cabbage, Broccoli, Onions
Crops to avoid: Carrots, Peanuts
Tillage recommendations: Shallow cultivation only when the surface is dry.
Crop rotation suggestions: Alternate leafy greens with deep-rooted cover crops.";

fn silt_result() -> SoilAnalysisResult {
    let knowledge = Arc::new(SoilKnowledge::builtin().unwrap());
    let mut result = ProseResponseParser::new(knowledge)
        .parse(SILT_RESPONSE, &mut StdRng::seed_from_u64(5));
    result.confidence = 91.0;
    result
}

fn write_report(dir: &TempDir, result: &SoilAnalysisResult, render: ReportFn) -> String {
    let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let path = dir.path().join(report_file_name(result, date));
    std::fs::write(&path, render(result, "2026-10-16 09:30:00")).unwrap();
    assert!(path.ends_with("Silt_Soil_Analysis_Report_2026-10-16.txt"));
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_remote_result_report() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir, &silt_result(), render_text_report);

    assert!(report.contains("Soil Type: Silt Soil\n"));
    assert!(report.contains("Confidence Level: 91%\n"));
    assert!(report.contains("Analysis Method: Gemini AI Enhanced Analysis\n"));
    assert!(report.contains("pH Range: 6.5-7.5\n"));
    assert!(report.contains("Recommended Crops: Lettuce, Cabbage, Broccoli, Onions\n"));
    assert!(report.contains("Crops to Avoid: Carrots, Peanuts\n"));
    assert!(report.contains("Tillage: Shallow cultivation"));
    assert!(report.contains("Crop Rotation: Alternate leafy greens"));
}

#[test]
fn test_custom_renderer_is_used() {
    fn one_line(result: &SoilAnalysisResult, generated_at: &str) -> String {
        format!("{} @ {}", result.name, generated_at)
    }

    let dir = TempDir::new().unwrap();
    let report = write_report(&dir, &silt_result(), one_line);
    assert_eq!(report, "Silt Soil @ 2026-10-16 09:30:00");
}
