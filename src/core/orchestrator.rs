use crate::core::aggregator::{AggregatorExit, LogAggregator};
use crate::core::allocator;
use crate::core::launcher::Launcher;
use crate::core::materializer::EnvTemplate;
use crate::core::prober::{ProbePolicy, ReadinessProber};
use crate::core::teardown::TeardownGenerator;
use crate::domain::model::{HealthStatus, RunContext, ServiceSpec};
use crate::domain::ports::Backend;
use crate::domain::services::port_env_key;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 一次啟動的完整計畫：服務表（依依賴順序）、環境模板、已解析的值
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub stack_name: String,
    pub base_port: u16,
    /// 依啟動順序排列；埠號為 0，分配階段填入
    pub services: Vec<ServiceSpec>,
    pub env_template: EnvTemplate,
    /// 埠號以外的已解析值（模型、路徑、金鑰）
    pub values: HashMap<String, String>,
    pub env_file: PathBuf,
    pub teardown_path: PathBuf,
    pub probe: ProbePolicy,
    pub follow_logs: bool,
    /// local 模型來源時啟動前要驗證的模型目錄
    pub model_dir_check: Option<String>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub ports: HashMap<String, u16>,
    pub env_file: PathBuf,
    pub teardown_path: PathBuf,
    pub ready_times: HashMap<String, Duration>,
}

/// 依序驅動：檢核 → 分配埠號 → 產生環境檔 → 逐服務啟動+探測 → 匯流日誌 → teardown
pub struct Orchestrator {
    launcher: Launcher,
    plan: LaunchPlan,
    monitor: SystemMonitor,
    torn_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, plan: LaunchPlan, monitor: SystemMonitor) -> Self {
        Self {
            launcher: Launcher::new(backend),
            plan,
            monitor,
            torn_down: AtomicBool::new(false),
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut ctx = RunContext::new(self.plan.stack_name.clone(), self.plan.env_file.clone());
        let teardown = TeardownGenerator::new(&self.plan.teardown_path);

        // 先寫一份（此刻是空操作）teardown 腳本：
        // 不論後面失敗在哪一步，操作者手上都有可執行的反轉腳本
        teardown.write(self.launcher.backend().as_ref(), &ctx)?;

        self.preflight()?;
        self.launcher
            .ensure_stack_not_running(&self.plan.stack_name)
            .await?;

        let mut specs = self.plan.services.clone();
        let mut values = self.plan.values.clone();
        self.allocate_ports(&mut specs, &mut ctx, &mut values)?;

        tracing::info!("📄 Writing environment file to {}", ctx.env_file.display());
        self.plan.env_template.materialize(&values, &ctx.env_file)?;
        self.monitor.log_stats("Materialize");

        let prober = ReadinessProber::new(self.plan.probe)?;
        let mut ready_times = HashMap::new();

        for spec in &specs {
            self.launcher.launch(spec, &mut ctx).await?;
            teardown.write(self.launcher.backend().as_ref(), &ctx)?;

            match spec.health_url() {
                Some(url) => match prober.wait_ready(&spec.name, &url).await {
                    Ok(elapsed) => {
                        ctx.mark_health(&spec.name, HealthStatus::Ready);
                        ready_times.insert(spec.name.clone(), elapsed);
                    }
                    Err(e) => {
                        // 此服務從 pending 直接到 timed-out，依賴它的服務不再啟動。
                        // 局部狀態留給操作者，teardown 腳本已涵蓋啟動的部分。
                        ctx.mark_health(&spec.name, HealthStatus::TimedOut);
                        return Err(e);
                    }
                },
                None => {
                    tracing::debug!("'{}' has no health endpoint, assuming ready", spec.name);
                    ctx.mark_health(&spec.name, HealthStatus::Ready);
                }
            }
            self.monitor.log_stats(&format!("Ready: {}", spec.name));
        }

        for spec in &specs {
            tracing::info!("🔌 {} -> http://127.0.0.1:{}", spec.name, spec.port);
        }
        tracing::info!(
            "✅ Stack '{}' is up ({} service(s)); stop script: {}",
            ctx.stack_name,
            ctx.handles.len(),
            self.plan.teardown_path.display()
        );

        if self.plan.follow_logs && !ctx.handles.is_empty() {
            let exit =
                LogAggregator::run(self.launcher.backend().as_ref(), &ctx.handles).await?;
            match exit {
                AggregatorExit::Interrupted => {
                    tracing::info!("🧹 Tearing down after interrupt");
                }
                AggregatorExit::SourcesClosed => {
                    tracing::info!("🧹 Services exited, tearing down");
                }
            }
            self.teardown_once(&ctx).await;
        }

        self.monitor.log_final_stats();

        Ok(RunSummary {
            ports: ctx.ports.clone(),
            env_file: ctx.env_file.clone(),
            teardown_path: self.plan.teardown_path.clone(),
            ready_times,
        })
    }

    /// 啟動前的檔案系統檢核：任何 launch 之前就要失敗
    fn preflight(&self) -> Result<()> {
        if let Some(model_dir) = &self.plan.model_dir_check {
            let warnings = validation::validate_model_dir("model_path", model_dir)?;
            for w in warnings {
                tracing::warn!("⚡ {}", w);
            }
        }
        Ok(())
    }

    /// 從 base_port 起為每個服務找最小可用埠並立即宣告，
    /// 下一個服務從上一個結果 +1 開始找
    fn allocate_ports(
        &self,
        specs: &mut [ServiceSpec],
        ctx: &mut RunContext,
        values: &mut HashMap<String, String>,
    ) -> Result<()> {
        let mut next_start = self.plan.base_port;
        for spec in specs.iter_mut() {
            let claimed = ctx.claimed_ports();
            let port = allocator::find_free_port(next_start, &claimed)?;
            ctx.claim_port(&spec.name, port)?;
            spec.port = port;
            values.insert(port_env_key(&spec.name), port.to_string());
            tracing::info!("🔢 Allocated port {} for '{}'", port, spec.name);
            next_start = port.saturating_add(1);
        }
        Ok(())
    }

    /// 中斷處理可能與正常結束路徑重疊，teardown 只做一次
    async fn teardown_once(&self, ctx: &RunContext) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Teardown already performed, skipping");
            return;
        }
        self.launcher.stop_all(ctx).await;
    }
}
