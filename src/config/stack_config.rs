use crate::utils::error::{LaunchError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_VLLM_IMAGE: &str = "vllm/vllm-openai:latest";
pub const DEFAULT_CHROMA_IMAGE: &str = "chromadb/chroma:latest";
pub const DEFAULT_RAG_IMAGE: &str = "activate/rag-server:latest";
pub const DEFAULT_PROXY_IMAGE: &str = "activate/rag-proxy:latest";

/// 選用的 TOML 堆疊設定檔，覆蓋內建預設值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack: Option<StackSection>,
    pub probe: Option<ProbeSection>,
    pub images: Option<ImagesSection>,
    /// 附加到環境檔的額外鍵值（值可含 ${VAR} 佔位符）
    pub env: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    pub name: Option<String>,
    pub base_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSection {
    pub interval_seconds: Option<u64>,
    pub attempts: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesSection {
    pub vllm: Option<String>,
    pub chroma: Option<String>,
    pub rag: Option<String>,
    pub proxy: Option<String>,
}

impl StackConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LaunchError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 設定檔本身允許引用環境變數 (例如 ${VLLM_API_KEY})
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LaunchError::InvalidConfigValueError {
            field: "toml_parsing".to_string(),
            value: String::new(),
            reason: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${VLLM_API_KEY})；未定義的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex");

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(stack) = &self.stack {
            if let Some(name) = &stack.name {
                validation::validate_non_empty_string("stack.name", name)?;
            }
            if let Some(port) = stack.base_port {
                validation::validate_range("stack.base_port", port, 1024, 65535)?;
            }
        }

        if let Some(probe) = &self.probe {
            if let Some(interval) = probe.interval_seconds {
                validation::validate_positive_number("probe.interval_seconds", interval as usize, 1)?;
            }
            if let Some(attempts) = probe.attempts {
                validation::validate_positive_number("probe.attempts", attempts as usize, 1)?;
            }
        }

        Ok(())
    }

    pub fn stack_name(&self) -> Option<&str> {
        self.stack.as_ref()?.name.as_deref()
    }

    pub fn base_port(&self) -> Option<u16> {
        self.stack.as_ref()?.base_port
    }

    pub fn image_for(&self, service: &str) -> Option<&str> {
        let images = self.images.as_ref()?;
        match service {
            "vllm" => images.vllm.as_deref(),
            "chroma" => images.chroma.as_deref(),
            "rag" => images.rag.as_deref(),
            "proxy" => images.proxy.as_deref(),
            _ => None,
        }
    }
}

impl Validate for StackConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
