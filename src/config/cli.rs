use crate::config::stack_config::{
    StackConfig, DEFAULT_CHROMA_IMAGE, DEFAULT_PROXY_IMAGE, DEFAULT_RAG_IMAGE, DEFAULT_VLLM_IMAGE,
};
use crate::core::materializer::{EnvEntry, EnvTemplate};
use crate::core::orchestrator::LaunchPlan;
use crate::core::prober::ProbePolicy;
use crate::domain::model::{DeployScope, ModelSource, Runmode};
use crate::domain::services::{stack_services, StackParams};
use crate::utils::error::{LaunchError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 每個旗標都有對應的環境變數，沿用原部署的變數名
#[derive(Debug, Clone, Parser)]
#[command(name = "ragstack")]
#[command(about = "Launches a local RAG + vLLM inference stack")]
pub struct CliConfig {
    /// Container runtime: "docker" or "singularity"
    #[arg(long, env = "RUNMODE", default_value = "docker")]
    pub runmode: String,

    /// Deployment scope: "all" (full stack) or "vllm" (inference only)
    #[arg(long, env = "RUNTYPE", default_value = "all")]
    pub runtype: String,

    /// Model source: "local" or "huggingface"
    #[arg(long, env = "MODEL_SOURCE", default_value = "local")]
    pub model_source: String,

    /// Local model directory, or HuggingFace model id
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<String>,

    /// Directory with documents to retrieve from
    #[arg(long, env = "DOCS_DIR", default_value = "./docs")]
    pub docs_dir: String,

    #[arg(long, env = "HF_CACHE")]
    pub hf_cache: Option<String>,

    #[arg(
        long,
        env = "EMBEDDING_MODEL",
        default_value = "sentence-transformers/all-MiniLM-L6-v2"
    )]
    pub embedding_model: String,

    #[arg(long, env = "EMBEDDING_CACHE_DIR")]
    pub embedding_cache_dir: Option<String>,

    #[arg(long, env = "VLLM_API_KEY")]
    pub vllm_api_key: Option<String>,

    /// Extra arguments appended to the vLLM server command
    #[arg(long, env = "VLLM_EXTRA_ARGS")]
    pub vllm_extra_args: Option<String>,

    #[arg(long, env = "STACK_NAME", default_value = "ragstack")]
    pub stack_name: String,

    /// First port the allocator tries; falls back to the stack file, then 8000
    #[arg(long, env = "BASE_PORT")]
    pub base_port: Option<u16>,

    #[arg(long, env = "ENV_FILE", default_value = ".run.env")]
    pub env_file: String,

    #[arg(long, env = "TEARDOWN_SCRIPT", default_value = "./stop_stack.sh")]
    pub teardown_script: String,

    #[arg(long)]
    pub probe_interval_secs: Option<u64>,

    #[arg(long)]
    pub probe_attempts: Option<u32>,

    /// Optional TOML stack file overriding images and probe tuning
    #[arg(short, long)]
    pub config: Option<String>,

    /// Exit after the stack is ready instead of following logs
    #[arg(long)]
    pub no_follow: bool,

    /// Show the resolved plan without launching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Treat validation warnings as errors
    #[arg(long)]
    pub strict: bool,

    #[arg(long, help = "Enable host resource monitoring")]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn runmode(&self) -> Result<Runmode> {
        self.runmode.parse()
    }

    pub fn scope(&self) -> Result<DeployScope> {
        self.runtype.parse()
    }

    pub fn model_source(&self) -> Result<ModelSource> {
        self.model_source.parse()
    }

    fn model_ref(&self) -> Result<String> {
        self.model_path
            .clone()
            .ok_or(LaunchError::MissingConfigError {
                field: "MODEL_PATH".to_string(),
            })
    }

    /// 不致命的配置疑點；--strict 時升級為錯誤
    pub fn validation_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let (Ok(ModelSource::HuggingFace), Some(model)) =
            (self.model_source(), self.model_path.as_ref())
        {
            if let Some(w) = validation::validate_hf_model_id(model) {
                warnings.push(w);
            }
        }

        if let Some(extra) = &self.vllm_extra_args {
            warnings.extend(validation::vllm_extra_args_warnings(extra));
        }

        warnings
    }

    /// 把 CLI + 選用堆疊檔收斂成一份啟動計畫
    pub fn resolve(&self, stack_cfg: Option<&StackConfig>) -> Result<LaunchPlan> {
        let runmode = self.runmode()?;
        let scope = self.scope()?;
        let model_source = self.model_source()?;
        let model_ref = self.model_ref()?;

        let image = |service: &str, default: &str| -> String {
            stack_cfg
                .and_then(|c| c.image_for(service))
                .unwrap_or(default)
                .to_string()
        };

        let params = StackParams {
            model_ref: model_ref.clone(),
            model_source,
            docs_dir: self.docs_dir.clone(),
            embedding_model: self.embedding_model.clone(),
            vllm_extra_args: self
                .vllm_extra_args
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .map(String::from)
                .collect(),
            hf_cache: self.hf_cache.clone(),
            vllm_image: image("vllm", DEFAULT_VLLM_IMAGE),
            chroma_image: image("chroma", DEFAULT_CHROMA_IMAGE),
            rag_image: image("rag", DEFAULT_RAG_IMAGE),
            proxy_image: image("proxy", DEFAULT_PROXY_IMAGE),
        };

        let stack_name = stack_cfg
            .and_then(|c| c.stack_name())
            .unwrap_or(&self.stack_name)
            .to_string();

        let base_port = self
            .base_port
            .or_else(|| stack_cfg.and_then(|c| c.base_port()))
            .unwrap_or(8000);

        let defaults = ProbePolicy::default();
        let probe = ProbePolicy {
            interval: Duration::from_secs(
                self.probe_interval_secs
                    .or_else(|| stack_cfg.and_then(|c| c.probe.as_ref()?.interval_seconds))
                    .unwrap_or(defaults.interval.as_secs()),
            ),
            attempts: self
                .probe_attempts
                .or_else(|| stack_cfg.and_then(|c| c.probe.as_ref()?.attempts))
                .unwrap_or(defaults.attempts),
            request_timeout: Duration::from_secs(
                stack_cfg
                    .and_then(|c| c.probe.as_ref()?.request_timeout_seconds)
                    .unwrap_or(defaults.request_timeout.as_secs()),
            ),
        };

        let mut values = HashMap::new();
        values.insert("RUNMODE".to_string(), runmode.to_string());
        values.insert("RUNTYPE".to_string(), scope.to_string());
        values.insert("MODEL_SOURCE".to_string(), self.model_source.clone());
        values.insert("MODEL_NAME".to_string(), model_ref.clone());
        values.insert("DOCS_DIR".to_string(), self.docs_dir.clone());
        values.insert("EMBEDDING_MODEL".to_string(), self.embedding_model.clone());
        if let Some(cache) = &self.embedding_cache_dir {
            values.insert("EMBEDDING_CACHE_DIR".to_string(), cache.clone());
        }
        if let Some(cache) = &self.hf_cache {
            values.insert("HF_CACHE".to_string(), cache.clone());
        }
        if let Some(key) = &self.vllm_api_key {
            values.insert("VLLM_API_KEY".to_string(), key.clone());
        }
        if let Some(extra) = &self.vllm_extra_args {
            values.insert("VLLM_EXTRA_ARGS".to_string(), extra.clone());
        }

        // docker: 服務掛在堆疊的 bridge network 上，以名稱別名互連；
        // singularity: 主機網路，互連走 loopback 加上分配到的埠號
        let mut env_template = match runmode {
            Runmode::Docker => EnvTemplate::standard()
                .with_entry(EnvEntry::optional("VLLM_URL", "http://vllm:8000/v1"))
                .with_entry(EnvEntry::optional("RAG_URL", "http://rag:8080")),
            Runmode::Singularity => EnvTemplate::standard()
                .with_entry(EnvEntry::optional(
                    "VLLM_URL",
                    "http://127.0.0.1:${VLLM_SERVER_PORT}/v1",
                ))
                .with_entry(EnvEntry::optional("RAG_URL", "http://127.0.0.1:${RAG_PORT}")),
        };
        if let Some(extra_env) = stack_cfg.and_then(|c| c.env.as_ref()) {
            // 排序讓環境檔內容穩定
            let mut keys: Vec<&String> = extra_env.keys().collect();
            keys.sort();
            for key in keys {
                env_template = env_template.with_entry(EnvEntry::optional(key, &extra_env[key]));
            }
        }

        let model_dir_check = match model_source {
            ModelSource::Local => Some(model_ref),
            ModelSource::HuggingFace => None,
        };

        Ok(LaunchPlan {
            stack_name,
            base_port,
            services: stack_services(scope, &params),
            env_template,
            values,
            env_file: PathBuf::from(&self.env_file),
            teardown_path: PathBuf::from(&self.teardown_script),
            probe,
            follow_logs: !self.no_follow,
            model_dir_check,
        })
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        self.runmode()?;
        self.scope()?;
        self.model_source()?;
        self.model_ref()?;
        validation::validate_path("docs_dir", &self.docs_dir)?;
        validation::validate_path("env_file", &self.env_file)?;
        validation::validate_path("teardown_script", &self.teardown_script)?;

        if let Some(port) = self.base_port {
            validation::validate_range("base_port", port, 1024, 65535)?;
        }
        if let Some(interval) = self.probe_interval_secs {
            validation::validate_positive_number("probe_interval_secs", interval as usize, 1)?;
        }
        if let Some(attempts) = self.probe_attempts {
            validation::validate_positive_number("probe_attempts", attempts as usize, 1)?;
        }

        Ok(())
    }
}
