//! 負載產生端的資源監控。壓測時若本機 CPU 已滿，量到的延遲就不可信，
//! 所以在各階段與結束時記錄本程序的 CPU 與記憶體用量。

#[cfg(feature = "cli")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct GeneratorStats {
    pub cpu_usage: f32,
    pub peak_cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
#[derive(Debug, Default)]
struct Peaks {
    cpu: f32,
    memory_mb: u64,
}

#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    start_time: Instant,
    peaks: Arc<Mutex<Peaks>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        if let Some(pid) = pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }

        Self {
            system: Arc::new(Mutex::new(system)),
            pid,
            start_time: Instant::now(),
            peaks: Arc::new(Mutex::new(Peaks::default())),
            enabled,
        }
    }

    pub fn get_stats(&self) -> Option<GeneratorStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;

        let cpu = process.cpu_usage();
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peaks = self.peaks.lock().ok()?;
        peaks.cpu = peaks.cpu.max(cpu);
        peaks.memory_mb = peaks.memory_mb.max(memory_mb);

        Some(GeneratorStats {
            cpu_usage: cpu,
            peak_cpu_usage: peaks.cpu,
            memory_usage_mb: memory_mb,
            peak_memory_mb: peaks.memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 Generator totals - Time: {:?}, Peak CPU: {:.1}%, Peak Memory: {}MB",
                stats.elapsed_time,
                stats.peak_cpu_usage,
                stats.peak_memory_mb
            );
            // 單核滿載以上代表產生端本身可能成為瓶頸
            if stats.peak_cpu_usage > 90.0 {
                tracing::warn!(
                    "⚠️ Load generator CPU peaked at {:.1}%, latency figures may be inflated",
                    stats.peak_cpu_usage
                );
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 未啟用 cli feature 時提供空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
