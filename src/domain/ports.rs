use crate::domain::model::{RunContext, ServiceHandle, ServiceSpec};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 協調器與容器工具之間唯一的接縫。
/// Docker 與 Singularity 各自實作一份；測試用 mock 實作。
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// 啟動服務並回傳控制代碼。非零退出碼要包成 LaunchFailed 並帶出 stderr。
    async fn launch(&self, spec: &ServiceSpec, ctx: &RunContext) -> Result<ServiceHandle>;

    /// 停止單一服務。對已停止的服務視為成功（teardown 冪等性的基礎）。
    async fn stop(&self, handle: &ServiceHandle) -> Result<()>;

    /// 同名堆疊是否已在執行（duplicate-stack guard 查詢）
    async fn stack_running(&self, stack: &str) -> Result<bool>;

    /// 跟隨該服務日誌輸出的命令，由 Log Aggregator 接管 stdout/stderr
    fn log_command(&self, handle: &ServiceHandle) -> tokio::process::Command;

    /// teardown 腳本中停止該服務的一行 shell，必須容忍「已停止」
    fn stop_command_line(&self, handle: &ServiceHandle) -> String;

    /// 所有服務停止後清理後端層級資源（例如 docker network）的收尾行
    fn teardown_footer_lines(&self) -> Vec<String> {
        Vec::new()
    }
}
