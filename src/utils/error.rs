use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required template value: {key}")]
    MissingRequiredValue { key: String },

    #[error("No free port available in range {start}..={end}")]
    NoPortAvailable { start: u16, end: u16 },

    #[error("Port {port} conflict for service '{service}'")]
    PortConflict { service: String, port: u16 },

    #[error("Launch failed for '{service}' (exit code {code:?}): {stderr}")]
    LaunchFailed {
        service: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Stack '{stack}' is already running")]
    DuplicateStack { stack: String },

    #[error("Cannot launch '{service}': dependency '{dependency}' is not ready")]
    DependencyNotReady { service: String, dependency: String },

    #[error("Readiness timeout for '{service}' after {attempts} attempts ({url})")]
    ReadinessTimeout {
        service: String,
        url: String,
        attempts: u32,
    },

    #[error("Teardown step failed: {message}")]
    TeardownError { message: String },
}

/// 錯誤分類，對應啟動流程的各個階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Port,
    Launch,
    Readiness,
    Teardown,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LaunchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LaunchError::ConfigError { .. }
            | LaunchError::MissingConfigError { .. }
            | LaunchError::InvalidConfigValueError { .. }
            | LaunchError::MissingRequiredValue { .. } => ErrorCategory::Configuration,
            LaunchError::NoPortAvailable { .. } | LaunchError::PortConflict { .. } => {
                ErrorCategory::Port
            }
            LaunchError::LaunchFailed { .. }
            | LaunchError::DuplicateStack { .. }
            | LaunchError::DependencyNotReady { .. } => ErrorCategory::Launch,
            LaunchError::ReadinessTimeout { .. } => ErrorCategory::Readiness,
            LaunchError::TeardownError { .. } => ErrorCategory::Teardown,
            LaunchError::HttpError(_) => ErrorCategory::Network,
            LaunchError::IoError(_) | LaunchError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // Teardown 只記錄，不會讓整次執行失敗
            ErrorCategory::Teardown => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Port => ErrorSeverity::High,
            ErrorCategory::Launch | ErrorCategory::Readiness | ErrorCategory::System => {
                ErrorSeverity::Critical
            }
        }
    }

    /// 給腳本呼叫者的退出碼：每個失敗類別一個值
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Port => 3,
            ErrorCategory::Launch => 4,
            ErrorCategory::Readiness => 5,
            ErrorCategory::Teardown => 0,
            ErrorCategory::Network | ErrorCategory::System => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            LaunchError::ConfigError { .. }
            | LaunchError::InvalidConfigValueError { .. }
            | LaunchError::MissingConfigError { .. } => {
                "Check the CLI flags and environment variables (RUNMODE, RUNTYPE, MODEL_PATH...)"
                    .to_string()
            }
            LaunchError::MissingRequiredValue { key } => {
                format!("Provide a value for '{}' via flag or environment variable", key)
            }
            LaunchError::NoPortAvailable { .. } => {
                "Free some TCP ports or lower --base-port".to_string()
            }
            LaunchError::PortConflict { port, .. } => {
                format!("Port {} is taken; stop the occupant or rerun to allocate a new one", port)
            }
            LaunchError::LaunchFailed { service, .. } => {
                format!("Inspect the backend output above for '{}' and fix the root cause", service)
            }
            LaunchError::DuplicateStack { stack } => {
                format!("Run the generated stop script for '{}' before launching again", stack)
            }
            LaunchError::DependencyNotReady { dependency, .. } => {
                format!("Service '{}' never became ready; check its logs", dependency)
            }
            LaunchError::ReadinessTimeout { service, .. } => format!(
                "'{}' did not come up in time; increase --probe-attempts or check its logs",
                service
            ),
            LaunchError::TeardownError { .. } => {
                "Rerun the generated stop script; remaining steps were still attempted".to_string()
            }
            LaunchError::HttpError(_) => {
                "Verify the service is reachable on the allocated port".to_string()
            }
            LaunchError::IoError(_) => "Check file permissions and disk space".to_string(),
            LaunchError::SerializationError(_) => {
                "The backend returned unexpected output; rerun with --verbose".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Port => format!("Port allocation problem: {}", self),
            ErrorCategory::Launch => format!("Service launch problem: {}", self),
            ErrorCategory::Readiness => format!("Service never became ready: {}", self),
            ErrorCategory::Teardown => format!("Teardown problem (non-fatal): {}", self),
            ErrorCategory::Network | ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_phase() {
        let config = LaunchError::MissingConfigError {
            field: "MODEL_PATH".to_string(),
        };
        let port = LaunchError::NoPortAvailable { start: 9000, end: 9010 };
        let launch = LaunchError::LaunchFailed {
            service: "vllm".to_string(),
            code: Some(125),
            stderr: "boom".to_string(),
        };
        let readiness = LaunchError::ReadinessTimeout {
            service: "rag".to_string(),
            url: "http://127.0.0.1:8080/health".to_string(),
            attempts: 30,
        };

        assert_eq!(config.exit_code(), 2);
        assert_eq!(port.exit_code(), 3);
        assert_eq!(launch.exit_code(), 4);
        assert_eq!(readiness.exit_code(), 5);
    }

    #[test]
    fn test_teardown_errors_never_escalate() {
        let e = LaunchError::TeardownError {
            message: "docker stop failed".to_string(),
        };
        assert_eq!(e.severity(), ErrorSeverity::Low);
        assert_eq!(e.exit_code(), 0);
    }

    #[test]
    fn test_launch_failed_surfaces_backend_stderr() {
        let e = LaunchError::LaunchFailed {
            service: "chroma".to_string(),
            code: Some(1),
            stderr: "manifest unknown".to_string(),
        };
        assert!(e.to_string().contains("manifest unknown"));
        assert!(e.to_string().contains("chroma"));
    }
}
