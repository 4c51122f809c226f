// TubeForge Health Check & Watchdog
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Background heartbeat that watches memory pressure and whether the data
// directory is still writable. The dashboard reads uptime from here.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::SystemExt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub uptime_secs: u64,
    pub uptime: String,
    pub heartbeats: u64,
    pub monitoring: bool,
    pub memory_ok: bool,
    pub storage_ok: bool,
}

pub struct HealthMonitor {
    start_time: Instant,
    is_running: Arc<AtomicBool>,
    heartbeat_count: Arc<AtomicU64>,
    memory_ok: Arc<AtomicBool>,
    storage_ok: Arc<AtomicBool>,
    check_interval: Duration,
    data_dir: PathBuf,
}

impl HealthMonitor {
    pub fn new(check_interval_secs: u64, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_time: Instant::now(),
            is_running: Arc::new(AtomicBool::new(false)),
            heartbeat_count: Arc::new(AtomicU64::new(0)),
            memory_ok: Arc::new(AtomicBool::new(true)),
            storage_ok: Arc::new(AtomicBool::new(true)),
            check_interval: Duration::from_secs(check_interval_secs.max(1)),
            data_dir: data_dir.into(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeat_count.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Spawn the heartbeat loop. Calling it twice is a no-op.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let is_running = self.is_running.clone();
        let heartbeat_count = self.heartbeat_count.clone();
        let memory_flag = self.memory_ok.clone();
        let storage_flag = self.storage_ok.clone();
        let interval = self.check_interval;
        let data_dir = self.data_dir.clone();

        tokio::spawn(async move {
            info!("[HEALTH] Watchdog started (interval: {:?})", interval);

            while is_running.load(Ordering::Relaxed) {
                tokio::time::sleep(interval).await;
                let count = heartbeat_count.fetch_add(1, Ordering::Relaxed) + 1;

                let mem_ok = check_memory_health();
                let disk_ok = check_storage_health(&data_dir).await;
                memory_flag.store(mem_ok, Ordering::Relaxed);
                storage_flag.store(disk_ok, Ordering::Relaxed);

                if !mem_ok {
                    warn!("[HEALTH] ⚠️ Memory pressure detected (heartbeat #{})", count);
                }
                if !disk_ok {
                    warn!("[HEALTH] ⚠️ Data directory not writable (heartbeat #{})", count);
                }
                if count % 60 == 0 {
                    info!(
                        "[HEALTH] ♥ Alive | Heartbeat #{} | Memory: {} | Storage: {}",
                        count,
                        if mem_ok { "OK" } else { "WARN" },
                        if disk_ok { "OK" } else { "WARN" },
                    );
                }
            }

            info!("[HEALTH] Watchdog stopped.");
        });
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Relaxed);
        info!("[HEALTH] Shutdown requested.");
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let uptime_secs = self.uptime_secs();
        HealthSnapshot {
            uptime_secs,
            uptime: format_uptime(uptime_secs),
            heartbeats: self.heartbeat_count(),
            monitoring: self.is_running(),
            memory_ok: self.memory_ok.load(Ordering::Relaxed),
            storage_ok: self.storage_ok.load(Ordering::Relaxed),
        }
    }

    pub fn status_report(&self) -> String {
        let snap = self.snapshot();
        format!(
            "TubeForge Health Report\n  Uptime: {}\n  Heartbeats: {}\n  Status: {}",
            snap.uptime,
            snap.heartbeats,
            if snap.monitoring { "MONITORING" } else { "STOPPED" },
        )
    }
}

/// Render seconds as `Xd Yh Zm`.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

fn check_memory_health() -> bool {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return true;
    }
    let usage_pct = (sys.used_memory() as f64 / total as f64) * 100.0;
    usage_pct < 95.0
}

async fn check_storage_health(data_dir: &Path) -> bool {
    let marker = data_dir.join(".tubeforge_health_check");
    match tokio::fs::write(&marker, b"ok").await {
        Ok(_) => {
            let _ = tokio::fs::remove_file(&marker).await;
            true
        }
        Err(e) => {
            error!("[HEALTH] Disk write check failed in {:?}: {}", data_dir, e);
            false
        }
    }
}
