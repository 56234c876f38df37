use crate::domain::model::{RunContext, ServiceHandle, ServiceSpec};
use crate::domain::ports::Backend;
use crate::utils::error::{LaunchError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Singularity 後端：每個服務一個 instance，主機網路。
/// 服務從環境檔讀取分配到的埠號。
pub struct SingularityBackend {
    stack: String,
    env_file: PathBuf,
}

impl SingularityBackend {
    pub fn new(stack: String, env_file: PathBuf) -> Self {
        Self { stack, env_file }
    }

    fn instance_name(&self, service: &str) -> String {
        format!("{}_{}", self.stack, service)
    }

    /// `singularity instance start` 的完整參數表
    fn start_args(&self, spec: &ServiceSpec) -> Vec<String> {
        let mut args = vec![
            "instance".to_string(),
            "start".to_string(),
            "--env-file".to_string(),
            self.env_file.display().to_string(),
        ];

        for mount in &spec.mounts {
            args.push("--bind".to_string());
            args.push(format!("{}:{}", mount.host_path, mount.container_path));
        }

        args.push(spec.image.clone());
        args.push(self.instance_name(&spec.name));
        args.extend(spec.args.iter().cloned());
        args
    }
}

#[async_trait]
impl Backend for SingularityBackend {
    fn name(&self) -> &str {
        "singularity"
    }

    async fn launch(&self, spec: &ServiceSpec, _ctx: &RunContext) -> Result<ServiceHandle> {
        let instance = self.instance_name(&spec.name);
        let output = Command::new("singularity")
            .args(self.start_args(spec))
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("address already in use") {
                return Err(LaunchError::PortConflict {
                    service: spec.name.clone(),
                    port: spec.port,
                });
            }
            return Err(LaunchError::LaunchFailed {
                service: spec.name.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(ServiceHandle {
            service: spec.name.clone(),
            backend_id: instance,
        })
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<()> {
        let output = Command::new("singularity")
            .arg("instance")
            .arg("stop")
            .arg(&handle.backend_id)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        // instance 已不存在視為成功
        if stderr.contains("no instance found") || stderr.contains("not found") {
            return Ok(());
        }
        Err(LaunchError::TeardownError {
            message: format!("singularity instance stop {}: {}", handle.backend_id, stderr),
        })
    }

    async fn stack_running(&self, stack: &str) -> Result<bool> {
        let output = Command::new("singularity")
            .arg("instance")
            .arg("list")
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let prefix = format!("{}_", stack);
        Ok(stdout
            .lines()
            .skip(1) // header
            .any(|line| line.trim_start().starts_with(&prefix)))
    }

    fn log_command(&self, handle: &ServiceHandle) -> Command {
        // instance 日誌落在使用者家目錄下的固定位置
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(format!(
            "tail -n +1 -f \"$HOME/.singularity/instances/logs/$(hostname)/$(whoami)/{}.out\"",
            handle.backend_id
        ));
        cmd
    }

    fn stop_command_line(&self, handle: &ServiceHandle) -> String {
        format!(
            "singularity instance stop {} >/dev/null 2>&1 || true",
            handle.backend_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_naming() {
        let backend = SingularityBackend::new("ragstack".to_string(), PathBuf::from(".run.env"));
        assert_eq!(backend.instance_name("proxy"), "ragstack_proxy");
    }

    #[test]
    fn test_start_args_bind_mounts_before_image() {
        let backend = SingularityBackend::new("ragstack".to_string(), PathBuf::from(".run.env"));
        let spec = ServiceSpec {
            name: "vllm".to_string(),
            image: "vllm.sif".to_string(),
            args: vec!["--model".to_string(), "/model".to_string()],
            port: 9000,
            container_port: 8000,
            health_path: Some("/health".to_string()),
            depends_on: vec![],
            mounts: vec![crate::domain::model::MountSpec {
                host_path: "/models/mistral-7b".to_string(),
                container_path: "/model".to_string(),
            }],
        };

        let args = backend.start_args(&spec);
        assert!(args.contains(&"/models/mistral-7b:/model".to_string()));

        let image_pos = args.iter().position(|a| a == "vllm.sif").unwrap();
        let bind_pos = args.iter().position(|a| a == "--bind").unwrap();
        assert!(bind_pos < image_pos);
        assert_eq!(args[image_pos + 1], "ragstack_vllm");
    }

    #[test]
    fn test_stop_command_line_tolerates_already_stopped() {
        let backend = SingularityBackend::new("ragstack".to_string(), PathBuf::from(".run.env"));
        let handle = ServiceHandle {
            service: "proxy".to_string(),
            backend_id: "ragstack_proxy".to_string(),
        };
        let line = backend.stop_command_line(&handle);
        assert!(line.starts_with("singularity instance stop"));
        assert!(line.ends_with("|| true"));
    }
}
