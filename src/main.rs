use clap::Parser;
use ragstack::core::orchestrator::LaunchPlan;
use ragstack::domain::model::Runmode;
use ragstack::domain::ports::Backend;
use ragstack::utils::monitor::SystemMonitor;
use ragstack::utils::{logger, validation::Validate};
use ragstack::{CliConfig, DockerBackend, Orchestrator, SingularityBackend, StackConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("🚀 Starting ragstack launcher");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 載入選用的 TOML 堆疊檔
    let stack_cfg = match &config.config {
        Some(path) => match StackConfig::from_file(path) {
            Ok(cfg) => {
                tracing::info!("📁 Loaded stack file: {}", path);
                Some(cfg)
            }
            Err(e) => {
                eprintln!("❌ Failed to load stack file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(2);
            }
        },
        None => None,
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }
    if let Some(cfg) = &stack_cfg {
        if let Err(e) = cfg.validate() {
            tracing::error!("❌ Stack file validation failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    }

    // 警告；--strict 時視為錯誤
    let warnings = config.validation_warnings();
    for w in &warnings {
        tracing::warn!("⚡ {}", w);
    }
    if config.strict && !warnings.is_empty() {
        eprintln!("❌ --strict: {} warning(s) treated as errors", warnings.len());
        std::process::exit(2);
    }

    let plan = match config.resolve(stack_cfg.as_ref()) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };

    display_plan_summary(&config, &plan);

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be launched");
        return Ok(());
    }

    let backend: Arc<dyn Backend> = match config.runmode()? {
        Runmode::Docker => Arc::new(DockerBackend::new(
            plan.stack_name.clone(),
            plan.env_file.clone(),
        )),
        Runmode::Singularity => Arc::new(SingularityBackend::new(
            plan.stack_name.clone(),
            plan.env_file.clone(),
        )),
    };

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }
    let monitor = SystemMonitor::new(monitor_enabled);

    let orchestrator = Orchestrator::new(backend, plan, monitor);

    match orchestrator.run().await {
        Ok(summary) => {
            tracing::info!("✅ Run completed");
            println!("✅ Stack run completed");
            println!("📄 Environment file: {}", summary.env_file.display());
            println!("🧹 Stop script: {}", summary.teardown_path.display());
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Launch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 每個失敗類別有自己的退出碼，方便腳本呼叫者分流
            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_plan_summary(config: &CliConfig, plan: &LaunchPlan) {
    println!("📋 Launch Plan:");
    println!("  Stack: {}", plan.stack_name);
    println!("  Runmode: {}", config.runmode);
    println!("  Scope: {}", config.runtype);
    println!(
        "  Model: {} ({})",
        config.model_path.as_deref().unwrap_or("-"),
        config.model_source
    );
    println!("  Base port: {}", plan.base_port);
    println!("  Env file: {}", plan.env_file.display());
    println!("  Stop script: {}", plan.teardown_path.display());
    println!(
        "  Probe: every {}s, up to {} attempts",
        plan.probe.interval.as_secs(),
        plan.probe.attempts
    );

    println!("  Services (launch order):");
    for spec in &plan.services {
        let deps = if spec.depends_on.is_empty() {
            "-".to_string()
        } else {
            spec.depends_on.join(", ")
        };
        println!(
            "    {} [{}] health={} deps={}",
            spec.name,
            spec.image,
            spec.health_path.as_deref().unwrap_or("none"),
            deps
        );
    }

    if config.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
