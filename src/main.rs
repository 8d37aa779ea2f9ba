use clap::Parser;
use sagemaker_loadtest::core::report::render_summary;
use sagemaker_loadtest::core::ConfigProvider;
use sagemaker_loadtest::utils::duration::format_duration;
use sagemaker_loadtest::utils::error::{ErrorSeverity, LoadTestError};
use sagemaker_loadtest::utils::{logger, validation::Validate};
use sagemaker_loadtest::{CliConfig, ConstantArrivalRate, LoadTestEngine, THRESHOLDS_FAILED_EXIT_CODE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting sagemaker-loadtest");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    let settings = match config.validate().and_then(|_| config.scenario_settings()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let executor = ConstantArrivalRate::from(&settings);
    println!("📋 Load test plan:");
    println!("  Endpoint: {} ({})", settings.endpoint_name, settings.endpoint_url);
    println!("  Payload: {}/{}", settings.dataset_dir, settings.target_file);
    println!(
        "  Rate: {} per {} for {} (~{} iterations)",
        settings.rate,
        format_duration(settings.time_unit),
        format_duration(settings.duration),
        executor.planned_iterations()
    );
    println!("  VUs: {} pre-allocated, {} max", settings.pre_allocated_vus, settings.max_vus);
    println!("  Threshold: p(95) < {}ms, failure rate < 1%", settings.threshold_ms);
    println!();

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no requests will be sent");
        return Ok(());
    }

    let monitor_enabled = config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = match LoadTestEngine::from_settings("sagemaker_test", settings).await {
        Ok(engine) => engine.with_monitoring(monitor_enabled).run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            println!("{}", render_summary(&outcome.snapshot.summary, &outcome.thresholds));
            if !outcome.thresholds_passed() {
                tracing::error!("❌ Some thresholds have been crossed");
                std::process::exit(THRESHOLDS_FAILED_EXIT_CODE);
            }
            tracing::info!("✅ Load test completed, all thresholds passed");
        }
        Err(e) => exit_with_error(e),
    }

    Ok(())
}

fn exit_with_error(e: LoadTestError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Load test failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
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
