use clap::Parser;
use sagemaker_loadtest::core::report::render_summary;
use sagemaker_loadtest::core::{ConfigProvider, ScenarioSettings};
use sagemaker_loadtest::utils::duration::format_duration;
use sagemaker_loadtest::utils::error::ErrorSeverity;
use sagemaker_loadtest::utils::{logger, validation::Validate};
use sagemaker_loadtest::{ConstantArrivalRate, LoadTestEngine, TomlConfig, THRESHOLDS_FAILED_EXIT_CODE};

#[derive(Parser)]
#[command(name = "scenario-loadtest")]
#[command(about = "Run a SageMaker load test described in a TOML scenario file")]
struct Args {
    /// Path to TOML scenario file
    #[arg(short, long, default_value = "loadtest.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the scenario rate
    #[arg(long)]
    rate: Option<usize>,

    /// Dry run - show the plan without sending requests
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 先載入配置，才知道是否要用 JSON 日誌
    let loaded = TomlConfig::from_file(&args.config);
    let json_logs = loaded.as_ref().map(|c| c.json_logs()).unwrap_or(false);
    logger::init_logger(args.verbose, json_logs);

    tracing::info!("🚀 Starting TOML-based load test");
    tracing::info!("📁 Loading scenario from: {}", args.config);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load scenario file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(rate) = args.rate {
        config.scenario.rate = Some(rate);
        tracing::info!("🔧 Rate overridden to: {}", rate);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    let settings = config.scenario_settings()?;

    tracing::info!("✅ Scenario loaded and validated successfully");
    display_config_summary(&config, &settings, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no requests will be sent");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = match LoadTestEngine::from_settings(config.scenario.name.clone(), settings).await {
        Ok(engine) => engine.with_monitoring(monitor_enabled).run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            println!("{}", render_summary(&outcome.snapshot.summary, &outcome.thresholds));
            if !outcome.thresholds_passed() {
                std::process::exit(THRESHOLDS_FAILED_EXIT_CODE);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Load test failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, settings: &ScenarioSettings, args: &Args) {
    println!("📋 Scenario Summary:");
    println!("  Scenario: {}", config.scenario.name);
    if let Some(description) = &config.scenario.description {
        println!("  Description: {}", description);
    }
    println!("  Endpoint: {} ({})", settings.endpoint_name, settings.endpoint_url);
    println!("  Region: {}", settings.region);
    println!("  Credentials: {:?}", settings.credentials_source);
    println!("  Payload: {}/{}", settings.dataset_dir, settings.target_file);
    if let Some(sensitivity) = settings.sensitivity {
        println!("  Sensitivity: {}", sensitivity);
    }
    println!(
        "  Rate: {} per {} for {} (~{} iterations)",
        settings.rate,
        format_duration(settings.time_unit),
        format_duration(settings.duration),
        ConstantArrivalRate::from(settings).planned_iterations()
    );
    println!("  VUs: {}..{}", settings.pre_allocated_vus, settings.max_vus);
    println!("  Threshold: p(95) < {}ms", settings.threshold_ms);
    if let Some(path) = &settings.output_path {
        println!("  Output: {}", path);
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
