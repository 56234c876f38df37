#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// 啟動期間的主機資源監控，在各階段邊界輸出一行統計。
/// 停用時所有方法都是空操作。
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    inner: Option<Mutex<MonitorState>>,
    started: Instant,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let inner = if enabled {
            // 拿不到自身 PID 時降級為停用，啟動流程不受影響
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new_with_specifics(RefreshKind::everything());
                    system.refresh_all();
                    Some(Mutex::new(MonitorState {
                        system,
                        pid,
                        peak_memory_mb: 0,
                    }))
                }
                Err(e) => {
                    tracing::warn!("⚠️ Monitoring disabled: cannot resolve own PID ({})", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            inner,
            started: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn log_stats(&self, phase: &str) {
        let Some(inner) = &self.inner else { return };
        let Ok(mut state) = inner.lock() else { return };

        state.system.refresh_all();
        let pid = state.pid;
        let Some(process) = state.system.process(pid) else {
            return;
        };

        let memory_mb = process.memory() / 1024 / 1024;
        let cpu = process.cpu_usage();
        let total_mb = state.system.total_memory() / 1024 / 1024;
        let percent = if total_mb > 0 {
            memory_mb as f32 / total_mb as f32 * 100.0
        } else {
            0.0
        };
        state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);

        tracing::info!(
            "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB, Time: {:?}",
            phase,
            cpu,
            memory_mb,
            percent,
            state.peak_memory_mb,
            self.started.elapsed()
        );
    }

    pub fn log_final_stats(&self) {
        let Some(inner) = &self.inner else { return };
        let Ok(state) = inner.lock() else { return };
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.started.elapsed(),
            state.peak_memory_mb
        );
    }
}

// 為非CLI環境提供空實現
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}
}
