use soilscan::advice::{self, DetailedAnalysis};
use soilscan::cli::{Cli, Commands, ConfigAction};
use soilscan::config::{Config, ConfigValidator};
use soilscan::error::{Result, SoilError};
use soilscan::heuristic::HeuristicBackend;
use soilscan::input::ImageInput;
use soilscan::knowledge::SoilKnowledge;
use soilscan::pipeline::{AnalysisBackend, ClassificationPipeline};
use soilscan::remote::{GeminiClient, ProseResponseParser, RemoteTextClassifier};
use soilscan::report::{self, ReportFn};
use soilscan::types::{AnalysisOutcome, SoilAnalysisResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

struct AnalyzeOptions {
    image: PathBuf,
    name: Option<String>,
    offline: bool,
    profile: Option<String>,
    json: bool,
    detailed: bool,
    report: Option<PathBuf>,
    report_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            image,
            name,
            offline,
            profile,
            json,
            detailed,
            report,
            report_dir,
        } => {
            let options = AnalyzeOptions {
                image,
                name,
                offline,
                profile,
                json,
                detailed,
                report,
                report_dir,
            };
            cmd_analyze(cli.config, options, report::render_text_report)?;
        }
        Commands::Advice { soil_type, json } => {
            cmd_advice(cli.config, &soil_type, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "soilscan=debug"
    } else {
        "soilscan=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_analyze(
    config_path: Option<PathBuf>,
    options: AnalyzeOptions,
    render_report: ReportFn,
) -> Result<()> {
    let mut config = load_config(config_path, options.profile.as_deref())?;
    if options.offline {
        config.remote.enabled = false;
    }

    let knowledge = Arc::new(SoilKnowledge::load(&config.knowledge)?);
    let fallback: Box<dyn AnalysisBackend> = Box::new(HeuristicBackend::new(
        Arc::clone(&knowledge),
        config.sampler.clone(),
        config.heuristic.clone(),
    ));

    let pipeline = if config.remote.enabled {
        let client = GeminiClient::new(&config.remote)?;
        let parser = ProseResponseParser::new(Arc::clone(&knowledge));
        let remote = RemoteTextClassifier::new(Arc::new(client), Arc::new(parser));
        ClassificationPipeline::new(Box::new(remote), fallback)
    } else {
        tracing::info!("Remote analysis disabled; using the colour heuristic only");
        ClassificationPipeline::offline(fallback)
    };

    let rt = tokio::runtime::Runtime::new().map_err(|e| SoilError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    let started = Instant::now();
    let (input, outcome) = rt.block_on(async {
        let input = ImageInput::from_path(&options.image, options.name.clone()).await?;
        let outcome = pipeline.analyze(&input).await;
        Ok::<_, SoilError>((input, outcome))
    })?;
    let elapsed = started.elapsed();

    let result = match outcome {
        AnalysisOutcome::Success(result) => *result,
        AnalysisOutcome::Failure(failure) => {
            if options.json {
                println!("{}", to_json(&failure)?);
            } else {
                println!("✗ {}", failure.error_message);
                println!("  Try again with a clearer, well-lit photo of the soil.");
            }
            std::process::exit(1);
        }
    };

    if let Some(path) = report_path(&options, &result) {
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        std::fs::write(&path, render_report(&result, &generated_at)).map_err(|e| {
            SoilError::Io {
                source: e,
                context: format!("Failed to write report: {:?}", path),
            }
        })?;
        tracing::info!("Report written to {}", path.display());
    }

    if options.detailed {
        let detailed =
            DetailedAnalysis::build(&knowledge, result, &input, elapsed, chrono::Utc::now());
        if options.json {
            println!("{}", to_json(&detailed)?);
        } else {
            print_summary(&detailed.result);
            print_actions(&detailed);
        }
    } else if options.json {
        println!("{}", to_json(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn report_path(options: &AnalyzeOptions, result: &SoilAnalysisResult) -> Option<PathBuf> {
    if let Some(path) = &options.report {
        return Some(path.clone());
    }
    options.report_dir.as_ref().map(|dir| {
        let today = chrono::Local::now().date_naive();
        dir.join(report::report_file_name(result, today))
    })
}

fn print_summary(result: &SoilAnalysisResult) {
    println!("{} {}", result.icon, result.name);
    println!("{}", "=".repeat(result.name.chars().count() + 3));
    println!("  Confidence: {}%", result.confidence);
    println!("  Engine: {}", result.analysis_details.api_used);
    println!(
        "  Processing time: {}s",
        result.analysis_details.processing_time
    );
    println!("  pH range: {}", result.chemical_properties.ph_range);
    println!("  Drainage: {}", result.physical_properties.drainage);
    println!(
        "\nSuited crops: {}",
        result.agricultural_suitability.suited_crops.join(", ")
    );
    println!(
        "Crops to avoid: {}",
        result.agricultural_suitability.avoid_crops.join(", ")
    );
    if !result.dominant_colors.is_empty() {
        println!("Dominant colors: {}", result.dominant_colors.join(", "));
    }
    println!("\n{}", result.recommendations);
}

fn print_actions(detailed: &DetailedAnalysis) {
    let plan = &detailed.additional_info.recommendations;
    println!("\nImmediate actions:");
    for action in &plan.immediate {
        println!("  - {}", action);
    }
    println!("\nSeasonal actions:");
    println!("  Spring: {}", plan.seasonal.spring);
    println!("  Summer: {}", plan.seasonal.summer);
    println!("  Fall:   {}", plan.seasonal.fall);
    println!("  Winter: {}", plan.seasonal.winter);
    println!("\nLong-term actions:");
    for action in &plan.long_term {
        println!("  - {}", action);
    }
    println!(
        "\nAnalyzed {} ({}) in {}",
        detailed.additional_info.image_size,
        detailed.additional_info.image_type,
        detailed.total_processing_time
    );
}

fn cmd_advice(config_path: Option<PathBuf>, soil_type: &str, json: bool) -> Result<()> {
    let config = load_config(config_path, None)?;
    let knowledge = SoilKnowledge::load(&config.knowledge)?;
    let advice = advice::recommendations_for(&knowledge, soil_type);

    if json {
        println!("{}", to_json(&advice)?);
        return Ok(());
    }

    println!("{}", advice.type_name);
    println!("{}", "=".repeat(advice.type_name.chars().count()));
    for (key, value) in &advice.characteristics {
        println!("  {}: {}", key.replace('_', " "), value);
    }
    println!("\nSuitable crops: {}", advice.crops_suitable.join(", "));
    println!("\n{}", advice.recommendations);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            println!("{}", to_json(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SoilError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'soilscan config init' to create one."
        );
        return defaults_with(profile);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, profile),
        None => Config::load(&path),
    }
}

fn defaults_with(profile: Option<&str>) -> Result<Config> {
    let mut config = Config::default();
    config.apply_env_overrides();
    if let Some(profile) = profile {
        config.apply_profile(profile)?;
    }
    ConfigValidator::validate(&config)?;
    Ok(config)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SoilError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

