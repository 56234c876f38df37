use crate::domain::model::{HealthStatus, RunContext, ServiceSpec};
use crate::domain::ports::Backend;
use crate::utils::error::{LaunchError, Result};
use std::sync::Arc;

/// 啟動服務並記帳控制代碼。依賴檢查在這裡把關：
/// 依賴清單中任何服務不是 ready 就拒絕啟動。
pub struct Launcher {
    backend: Arc<dyn Backend>,
}

impl Launcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// duplicate-stack guard：同名堆疊已在跑就拒絕，避免資源所有權分裂
    pub async fn ensure_stack_not_running(&self, stack: &str) -> Result<()> {
        if self.backend.stack_running(stack).await? {
            return Err(LaunchError::DuplicateStack {
                stack: stack.to_string(),
            });
        }
        Ok(())
    }

    pub async fn launch(&self, spec: &ServiceSpec, ctx: &mut RunContext) -> Result<()> {
        for dep in &spec.depends_on {
            if ctx.health_of(dep) != Some(HealthStatus::Ready) {
                return Err(LaunchError::DependencyNotReady {
                    service: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        tracing::info!(
            "🚀 Launching '{}' on port {} via {}",
            spec.name,
            spec.port,
            self.backend.name()
        );
        let handle = match self.backend.launch(spec, ctx).await {
            Ok(handle) => handle,
            Err(e) => {
                ctx.mark_health(&spec.name, HealthStatus::Failed);
                return Err(e);
            }
        };
        tracing::debug!("'{}' handle: {}", spec.name, handle.backend_id);
        ctx.add_handle(handle);
        Ok(())
    }

    /// 逆啟動順序停止所有已啟動的服務。
    /// 個別失敗只記錄，每一步都會執行（teardown 永不升級為錯誤）。
    pub async fn stop_all(&self, ctx: &RunContext) {
        for handle in ctx.handles.iter().rev() {
            match self.backend.stop(handle).await {
                Ok(()) => tracing::info!("🛑 Stopped '{}'", handle.service),
                Err(e) => tracing::warn!(
                    "⚠️ Failed to stop '{}' (continuing): {}",
                    handle.service,
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ServiceHandle;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct RefusingBackend;

    #[async_trait]
    impl Backend for RefusingBackend {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn launch(&self, spec: &ServiceSpec, _ctx: &RunContext) -> Result<ServiceHandle> {
            Err(LaunchError::LaunchFailed {
                service: spec.name.clone(),
                code: Some(125),
                stderr: "image not found".to_string(),
            })
        }

        async fn stop(&self, _handle: &ServiceHandle) -> Result<()> {
            Ok(())
        }

        async fn stack_running(&self, _stack: &str) -> Result<bool> {
            Ok(false)
        }

        fn log_command(&self, _handle: &ServiceHandle) -> tokio::process::Command {
            tokio::process::Command::new("true")
        }

        fn stop_command_line(&self, _handle: &ServiceHandle) -> String {
            "true".to_string()
        }
    }

    fn spec(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            image: "test:latest".to_string(),
            args: vec![],
            port: 9000,
            container_port: 8000,
            health_path: None,
            depends_on: vec![],
            mounts: vec![],
        }
    }

    #[tokio::test]
    async fn test_backend_launch_failure_marks_service_failed() {
        let launcher = Launcher::new(Arc::new(RefusingBackend));
        let mut ctx = RunContext::new("test".to_string(), PathBuf::from("/tmp/.run.env"));
        ctx.claim_port("vllm", 9000).unwrap();
        assert_eq!(ctx.health_of("vllm"), Some(HealthStatus::Pending));

        let err = launcher.launch(&spec("vllm"), &mut ctx).await.unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));

        // pending -> failed；沒有控制代碼被記帳
        assert_eq!(ctx.health_of("vllm"), Some(HealthStatus::Failed));
        assert!(ctx.handles.is_empty());
    }
}
