use crate::domain::model::{RunContext, ServiceHandle, ServiceSpec};
use crate::domain::ports::Backend;
use crate::utils::error::{LaunchError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Docker 後端：每個服務一個容器，名稱為 {stack}_{service}。
/// 整個堆疊掛在以 stack 命名的 bridge network 上，
/// 服務以名稱別名互相解析（vllm、rag...），不依賴主機埠號。
pub struct DockerBackend {
    stack: String,
    env_file: PathBuf,
}

impl DockerBackend {
    pub fn new(stack: String, env_file: PathBuf) -> Self {
        Self { stack, env_file }
    }

    fn container_name(&self, service: &str) -> String {
        format!("{}_{}", self.stack, service)
    }

    /// `docker run` 的完整參數表；launch 執行的就是這一份
    fn run_args(&self, spec: &ServiceSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.container_name(&spec.name),
            "--network".to_string(),
            self.stack.clone(),
            "--network-alias".to_string(),
            spec.name.clone(),
            "--env-file".to_string(),
            self.env_file.display().to_string(),
            "-p".to_string(),
            format!("{}:{}", spec.port, spec.container_port),
        ];

        for mount in &spec.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", mount.host_path, mount.container_path));
        }

        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }

    /// 堆疊的 network 不存在就建立；已存在視為成功
    async fn ensure_network(&self) -> Result<()> {
        let output = Command::new("docker")
            .arg("network")
            .arg("create")
            .arg(&self.stack)
            .output()
            .await?;

        if output.status.success() {
            tracing::debug!("Created docker network '{}'", self.stack);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("already exists") {
            return Ok(());
        }
        Err(LaunchError::LaunchFailed {
            service: format!("network {}", self.stack),
            code: output.status.code(),
            stderr,
        })
    }
}

#[async_trait]
impl Backend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    async fn launch(&self, spec: &ServiceSpec, _ctx: &RunContext) -> Result<ServiceHandle> {
        self.ensure_network().await?;

        let output = Command::new("docker")
            .args(self.run_args(spec))
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("port is already allocated")
                || stderr.contains("address already in use")
            {
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

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ServiceHandle {
            service: spec.name.clone(),
            backend_id: container_id,
        })
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<()> {
        let output = Command::new("docker")
            .arg("rm")
            .arg("-f")
            .arg(&handle.backend_id)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        // 已停止/已移除視為成功
        if stderr.contains("No such container") {
            return Ok(());
        }
        Err(LaunchError::TeardownError {
            message: format!("docker rm -f {}: {}", handle.backend_id, stderr),
        })
    }

    async fn stack_running(&self, stack: &str) -> Result<bool> {
        let output = Command::new("docker")
            .arg("ps")
            .arg("-q")
            .arg("--filter")
            .arg(format!("name={}_", stack))
            .output()
            .await?;

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    fn log_command(&self, handle: &ServiceHandle) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("logs")
            .arg("-f")
            .arg("--tail")
            .arg("50")
            .arg(&handle.backend_id);
        cmd
    }

    fn stop_command_line(&self, handle: &ServiceHandle) -> String {
        format!(
            "docker rm -f {} >/dev/null 2>&1 || true",
            handle.backend_id
        )
    }

    fn teardown_footer_lines(&self) -> Vec<String> {
        vec![format!(
            "docker network rm {} >/dev/null 2>&1 || true",
            self.stack
        )]
    }
}
