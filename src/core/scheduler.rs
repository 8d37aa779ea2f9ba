//! Constant-arrival-rate 執行器：依固定間隔啟動 iteration，不受回應時間影響。
//! 所有 VU 都忙碌時該次 iteration 直接丟棄並計入 dropped_iterations。
//! 第一次中斷停止排程並等待 graceful stop，第二次中斷立即中止仍在執行的 iteration。

use crate::core::metrics::MetricsCollector;
use crate::domain::model::ScenarioSettings;
use crate::domain::ports::Scenario;
use crate::utils::error::{LoadTestError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// 中斷訊號（例如 Ctrl-C），發送端全部關閉後視為不會再中斷
pub type Interrupts = mpsc::UnboundedReceiver<()>;

async fn next_interrupt(interrupts: &mut Interrupts) {
    if interrupts.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone)]
pub struct ConstantArrivalRate {
    pub rate: usize,
    pub time_unit: Duration,
    pub duration: Duration,
    pub pre_allocated_vus: usize,
    pub max_vus: usize,
    pub graceful_stop: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub started: u64,
    pub dropped: u64,
    pub interrupted: u64,
    pub stopped_early: bool,
    pub elapsed: Duration,
}

impl From<&ScenarioSettings> for ConstantArrivalRate {
    fn from(settings: &ScenarioSettings) -> Self {
        Self {
            rate: settings.rate,
            time_unit: settings.time_unit,
            duration: settings.duration,
            pre_allocated_vus: settings.pre_allocated_vus,
            max_vus: settings.max_vus,
            graceful_stop: settings.graceful_stop,
        }
    }
}

impl ConstantArrivalRate {
    /// 兩次啟動之間的間隔
    pub fn interval(&self) -> Result<Duration> {
        if self.rate == 0 {
            return Err(LoadTestError::SchedulerError {
                message: "rate must be at least 1".to_string(),
            });
        }
        let nanos = self.time_unit.as_nanos() / self.rate as u128;
        if nanos == 0 {
            return Err(LoadTestError::SchedulerError {
                message: format!(
                    "rate {} per {:?} is too high to schedule",
                    self.rate, self.time_unit
                ),
            });
        }
        Ok(Duration::from_nanos(nanos as u64))
    }

    /// 預期啟動的 iteration 總數
    pub fn planned_iterations(&self) -> u64 {
        let per_unit = self.rate as f64 / self.time_unit.as_secs_f64();
        (per_unit * self.duration.as_secs_f64()).round() as u64
    }

    pub async fn run<S: Scenario>(
        &self,
        scenario: Arc<S>,
        setup_data: Arc<S::SetupData>,
        metrics: Arc<MetricsCollector>,
        mut interrupts: Interrupts,
    ) -> Result<ScheduleReport> {
        if self.max_vus == 0 {
            return Err(LoadTestError::SchedulerError {
                message: "max_vus must be at least 1".to_string(),
            });
        }

        let interval = self.interval()?;
        let vus = Arc::new(Semaphore::new(self.max_vus));
        metrics.reserve_vus(self.pre_allocated_vus);

        tracing::info!(
            "🚦 constant-arrival-rate: {} iterations per {:?} for {:?} (interval {:?}, VUs {}..{})",
            self.rate,
            self.time_unit,
            self.duration,
            interval,
            self.pre_allocated_vus,
            self.max_vus
        );

        let start = Instant::now();
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let deadline = tokio::time::sleep_until(start + self.duration);
        tokio::pin!(deadline);

        let mut tasks = JoinSet::new();
        let mut report = ScheduleReport::default();

        loop {
            tokio::select! {
                biased;
                _ = next_interrupt(&mut interrupts) => {
                    tracing::warn!("🛑 Stop requested, no new iterations will start");
                    report.stopped_early = true;
                    break;
                }
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    match vus.clone().try_acquire_owned() {
                        Ok(permit) => {
                            report.started += 1;
                            let scenario = scenario.clone();
                            let setup_data = setup_data.clone();
                            let metrics = metrics.clone();
                            tasks.spawn(async move {
                                metrics.vu_started();
                                let outcome = scenario.iteration(&setup_data).await;
                                metrics.record_iteration(outcome);
                                metrics.vu_finished();
                                drop(permit);
                            });
                        }
                        Err(_) => {
                            report.dropped += 1;
                            if metrics.record_dropped_iteration() == 1 {
                                tracing::warn!(
                                    "⚠️ Insufficient VUs, reached {} active VUs and cannot initialize more",
                                    self.max_vus
                                );
                            }
                        }
                    }
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!("Iteration task failed: {}", e);
                }
            }
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            tracing::info!(
                "⏳ Waiting up to {:?} for {} in-flight iterations",
                self.graceful_stop,
                in_flight
            );
        }

        let grace = tokio::time::sleep(self.graceful_stop);
        tokio::pin!(grace);
        let mut forced = false;

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = next_interrupt(&mut interrupts) => {
                    tracing::warn!("🛑 Stop requested again, aborting in-flight iterations");
                    forced = true;
                    break;
                }
                _ = &mut grace => break,
                joined = tasks.join_next() => {
                    if let Some(Err(e)) = joined {
                        tracing::error!("Iteration task failed: {}", e);
                    }
                }
            }
        }

        if !tasks.is_empty() {
            let remaining = tasks.len() as u64;
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            report.interrupted = remaining;
            metrics.record_interrupted_iterations(remaining);
            if forced {
                tracing::warn!("⚠️ {} iterations interrupted", remaining);
            } else {
                tracing::warn!(
                    "⚠️ {} iterations interrupted after graceful stop of {:?}",
                    remaining,
                    self.graceful_stop
                );
            }
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }
}
