use crate::domain::model::ServiceHandle;
use crate::domain::ports::Backend;
use crate::utils::error::Result;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorExit {
    /// 所有日誌來源都結束（底層行程退出）
    SourcesClosed,
    /// 操作者中斷（Ctrl-C），呼叫端要觸發 teardown
    Interrupted,
}

/// 把所有服務的日誌匯流到單一輸出。
/// 每個來源一個讀取任務寫入同一個 channel，避免逐來源序列阻塞。
pub struct LogAggregator;

impl LogAggregator {
    pub async fn run(backend: &dyn Backend, handles: &[ServiceHandle]) -> Result<AggregatorExit> {
        let (tx, mut rx) = mpsc::channel::<String>(256);
        let mut children = Vec::new();

        for handle in handles {
            let mut cmd = backend.log_command(handle);
            cmd.stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn()?;
            if let Some(stdout) = child.stdout.take() {
                Self::forward_lines(stdout, handle.service.clone(), tx.clone());
            }
            if let Some(stderr) = child.stderr.take() {
                Self::forward_lines(stderr, handle.service.clone(), tx.clone());
            }
            children.push(child);
        }

        // 只留任務持有的 sender；全部結束時 rx 會收到 None
        drop(tx);

        loop {
            tokio::select! {
                maybe_line = rx.recv() => match maybe_line {
                    Some(line) => println!("{}", line),
                    None => {
                        Self::reap(&mut children).await;
                        tracing::info!("📭 All log sources closed");
                        return Ok(AggregatorExit::SourcesClosed);
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("🛑 Interrupt received, stopping log stream");
                    Self::reap(&mut children).await;
                    return Ok(AggregatorExit::Interrupted);
                }
            }
        }
    }

    /// 終止並回收所有日誌子行程；已退出的 kill 失敗可忽略。
    /// 回收一定要做，不能留給 kill_on_drop（會留下殭屍行程）。
    async fn reap(children: &mut [tokio::process::Child]) {
        for child in children.iter_mut() {
            let _ = child.start_kill();
        }
        for child in children.iter_mut() {
            let _ = child.wait().await;
        }
    }

    fn forward_lines<R>(reader: R, service: String, tx: mpsc::Sender<String>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(format!("[{}] {}", service, line)).await.is_err() {
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{RunContext, ServiceSpec};
    use async_trait::async_trait;

    /// log_command 回傳 echo 的假後端，只用來測匯流
    struct EchoBackend;

    #[async_trait]
    impl Backend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn launch(&self, _spec: &ServiceSpec, _ctx: &RunContext) -> Result<ServiceHandle> {
            unreachable!("not used in aggregator tests")
        }

        async fn stop(&self, _handle: &ServiceHandle) -> Result<()> {
            Ok(())
        }

        async fn stack_running(&self, _stack: &str) -> Result<bool> {
            Ok(false)
        }

        fn log_command(&self, handle: &ServiceHandle) -> tokio::process::Command {
            let mut cmd = tokio::process::Command::new("echo");
            cmd.arg(format!("log line from {}", handle.service));
            cmd
        }

        fn stop_command_line(&self, _handle: &ServiceHandle) -> String {
            "true".to_string()
        }
    }

    #[tokio::test]
    async fn test_aggregator_ends_when_sources_close() {
        let backend = EchoBackend;
        let handles = vec![
            ServiceHandle {
                service: "vllm".to_string(),
                backend_id: "a".to_string(),
            },
            ServiceHandle {
                service: "rag".to_string(),
                backend_id: "b".to_string(),
            },
        ];

        let exit = LogAggregator::run(&backend, &handles).await.unwrap();
        assert_eq!(exit, AggregatorExit::SourcesClosed);
    }

    #[tokio::test]
    async fn test_aggregator_with_no_sources_returns_immediately() {
        let backend = EchoBackend;
        let exit = LogAggregator::run(&backend, &[]).await.unwrap();
        assert_eq!(exit, AggregatorExit::SourcesClosed);
    }

    #[tokio::test]
    async fn test_reap_kills_and_collects_long_running_children() {
        let mut children = Vec::new();
        for _ in 0..2 {
            let child = tokio::process::Command::new("sleep")
                .arg("30")
                .kill_on_drop(true)
                .spawn()
                .unwrap();
            children.push(child);
        }

        let started = std::time::Instant::now();
        LogAggregator::reap(&mut children).await;
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        // 全部已回收，不再有可等待的行程
        for child in children.iter_mut() {
            assert!(child.try_wait().unwrap().is_some());
        }
    }
}
