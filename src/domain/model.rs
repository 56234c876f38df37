use crate::utils::error::{LaunchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

/// 容器後端：docker 或 singularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runmode {
    Docker,
    Singularity,
}

impl FromStr for Runmode {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "docker" => Ok(Runmode::Docker),
            "singularity" => Ok(Runmode::Singularity),
            other => Err(LaunchError::InvalidConfigValueError {
                field: "runmode".to_string(),
                value: other.to_string(),
                reason: "expected: docker, singularity".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Runmode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Runmode::Docker => write!(f, "docker"),
            Runmode::Singularity => write!(f, "singularity"),
        }
    }
}

/// 部署範圍：完整堆疊或只有推理服務
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployScope {
    Full,
    InferenceOnly,
}

impl FromStr for DeployScope {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(DeployScope::Full),
            "vllm" => Ok(DeployScope::InferenceOnly),
            other => Err(LaunchError::InvalidConfigValueError {
                field: "runtype".to_string(),
                value: other.to_string(),
                reason: "expected: all, vllm".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DeployScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployScope::Full => write!(f, "all"),
            DeployScope::InferenceOnly => write!(f, "vllm"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    Local,
    HuggingFace,
}

impl FromStr for ModelSource {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(ModelSource::Local),
            "huggingface" => Ok(ModelSource::HuggingFace),
            other => Err(LaunchError::InvalidConfigValueError {
                field: "model_source".to_string(),
                value: other.to_string(),
                reason: "expected: local, huggingface".to_string(),
            }),
        }
    }
}

/// 每個服務的健康狀態，只由 ReadinessProber 驅動轉移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Pending,
    Ready,
    Failed,
    TimedOut,
}

impl HealthStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HealthStatus::Pending)
    }
}

/// 掛載點：主機路徑 -> 容器內路徑
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: String,
}

/// 靜態服務描述，規劃完成後不再變動
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    /// 主機側埠號，由 Port Allocator 填入
    pub port: u16,
    /// 容器內服務監聽的埠號
    pub container_port: u16,
    /// None 表示此服務沒有健康檢查端點，啟動後直接視為 ready
    pub health_path: Option<String>,
    pub depends_on: Vec<String>,
    pub mounts: Vec<MountSpec>,
}

impl ServiceSpec {
    pub fn health_url(&self) -> Option<String> {
        self.health_path
            .as_ref()
            .map(|path| format!("http://127.0.0.1:{}{}", self.port, path))
    }
}

/// 後端回傳的不透明控制代碼（容器 ID 或 instance 名稱）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub service: String,
    pub backend_id: String,
}

/// 單次啟動的可變狀態：埠號、控制代碼與健康狀態
#[derive(Debug)]
pub struct RunContext {
    pub stack_name: String,
    pub run_id: String,
    pub ports: HashMap<String, u16>,
    pub env_file: PathBuf,
    /// 保持啟動順序，teardown 逆序使用
    pub handles: Vec<ServiceHandle>,
    pub health: HashMap<String, HealthStatus>,
}

impl RunContext {
    pub fn new(stack_name: String, env_file: PathBuf) -> Self {
        let run_id = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        Self {
            stack_name,
            run_id,
            ports: HashMap::new(),
            env_file,
            handles: Vec::new(),
            health: HashMap::new(),
        }
    }

    /// 宣告埠號歸屬；同一次執行中不允許兩個服務綁到同一個埠
    pub fn claim_port(&mut self, service: &str, port: u16) -> Result<()> {
        if self.ports.values().any(|&p| p == port) {
            return Err(LaunchError::PortConflict {
                service: service.to_string(),
                port,
            });
        }
        self.ports.insert(service.to_string(), port);
        self.health
            .insert(service.to_string(), HealthStatus::Pending);
        Ok(())
    }

    pub fn claimed_ports(&self) -> HashSet<u16> {
        self.ports.values().copied().collect()
    }

    pub fn add_handle(&mut self, handle: ServiceHandle) {
        self.handles.push(handle);
    }

    pub fn handle_for(&self, service: &str) -> Option<&ServiceHandle> {
        self.handles.iter().find(|h| h.service == service)
    }

    pub fn mark_health(&mut self, service: &str, status: HealthStatus) {
        self.health.insert(service.to_string(), status);
    }

    pub fn health_of(&self, service: &str) -> Option<HealthStatus> {
        self.health.get(service).copied()
    }
}
