use crate::config::cli::LocalStorage;
use crate::core::credentials;
use crate::core::invocation::SageMakerInvocation;
use crate::core::metrics::{MetricsCollector, MetricsSnapshot};
use crate::core::report;
use crate::core::scheduler::{ConstantArrivalRate, Interrupts, ScheduleReport};
use crate::core::thresholds::{ThresholdResult, ThresholdSet};
use crate::core::{Payload, Scenario, ScenarioSettings, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 閾值未通過時的程序結束碼（與 k6 相同）
pub const THRESHOLDS_FAILED_EXIT_CODE: i32 = 99;

pub struct RunOutcome {
    pub snapshot: MetricsSnapshot,
    pub schedule: ScheduleReport,
    pub thresholds: Vec<ThresholdResult>,
}

impl RunOutcome {
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }
}

pub struct LoadTestEngine<S: Scenario, W: Storage = LocalStorage> {
    name: String,
    scenario: Arc<S>,
    executor: ConstantArrivalRate,
    thresholds: ThresholdSet,
    report_storage: Option<W>,
    monitor: SystemMonitor,
}

impl<S: Scenario> LoadTestEngine<S, LocalStorage> {
    pub fn new(name: impl Into<String>, scenario: S, executor: ConstantArrivalRate, thresholds: ThresholdSet) -> Self {
        Self {
            name: name.into(),
            scenario: Arc::new(scenario),
            executor,
            thresholds,
            report_storage: None,
            monitor: SystemMonitor::new(false),
        }
    }
}

impl LoadTestEngine<SageMakerInvocation, LocalStorage> {
    /// 依設定組裝完整的 SageMaker 壓測：讀取音檔、選擇憑證來源、預設閾值與報表輸出
    pub async fn from_settings(name: impl Into<String>, settings: ScenarioSettings) -> Result<Self> {
        let dataset = LocalStorage::new(settings.dataset_dir.clone());
        let payload =
            Payload::load(&dataset, &settings.target_file, settings.content_type.as_deref()).await?;

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(settings.max_vus)
            .build()?;
        let provider =
            credentials::provider_for(settings.credentials_source, &settings.imds_endpoint)?;

        let executor = ConstantArrivalRate::from(&settings);
        let thresholds = ThresholdSet::defaults(settings.threshold_ms)?;
        let output_path = settings.output_path.clone();
        let scenario = SageMakerInvocation::new(client, Arc::new(settings), payload, provider)?;

        let engine = Self::new(name, scenario, executor, thresholds);
        Ok(match output_path {
            Some(path) => engine.with_report_storage(LocalStorage::new(path)),
            None => engine,
        })
    }
}

impl<S: Scenario, W: Storage> LoadTestEngine<S, W> {
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub fn with_report_storage<W2: Storage>(self, storage: W2) -> LoadTestEngine<S, W2> {
        LoadTestEngine {
            name: self.name,
            scenario: self.scenario,
            executor: self.executor,
            thresholds: self.thresholds,
            report_storage: Some(storage),
            monitor: self.monitor,
        }
    }

    /// 第一次 Ctrl-C 停止排程，第二次中止仍在執行的 iteration
    pub async fn run(&self) -> Result<RunOutcome> {
        let (tx, interrupts) = mpsc::unbounded_channel();
        let listener = tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Unable to listen for Ctrl-C: {}", e);
                    return;
                }
                if tx.send(()).is_err() {
                    return;
                }
            }
        });

        let outcome = self.run_until(interrupts).await;
        listener.abort();
        outcome
    }

    /// 執行 setup、排程與閾值判定；收到中斷時提前停止排程
    pub async fn run_until(&self, interrupts: Interrupts) -> Result<RunOutcome> {
        tracing::info!("🚀 Starting load test '{}'", self.name);
        self.monitor.log_stats("Start");

        tracing::info!("🔧 Running setup...");
        let setup_data = Arc::new(self.scenario.setup().await?);
        self.monitor.log_stats("Setup");

        let metrics = Arc::new(MetricsCollector::new());
        let schedule = self
            .executor
            .run(self.scenario.clone(), setup_data, metrics.clone(), interrupts)
            .await?;
        tracing::info!(
            "🏁 Scenario finished: {} started, {} dropped, {} interrupted in {:?}",
            schedule.started,
            schedule.dropped,
            schedule.interrupted,
            schedule.elapsed
        );
        self.monitor.log_stats("Scenario");

        let snapshot = metrics.snapshot();
        let thresholds = self.thresholds.evaluate(&snapshot);
        for result in &thresholds {
            if result.passed {
                tracing::info!("{}", result);
            } else {
                tracing::error!("{}", result);
            }
        }

        if let Some(storage) = &self.report_storage {
            report::write_report(storage, &self.name, &snapshot, &thresholds).await?;
            tracing::info!("📁 Report written ({} and {})", report::SAMPLES_FILE, report::SUMMARY_FILE);
        }

        self.monitor.log_final_stats();

        Ok(RunOutcome {
            snapshot,
            schedule,
            thresholds,
        })
    }
}
