use crate::utils::error::{LaunchError, Result};
use std::time::{Duration, Instant};

/// 固定間隔、有限次數的輪詢策略。刻意不用指數退讓：
/// 啟動視窗是秒到分鐘級，可預測比自適應重要。
#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub interval: Duration,
    pub attempts: u32,
    /// 單次請求的上限，避免慢速端點讓輪詢掛住
    pub request_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            attempts: 90,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// 輪詢健康端點直到 2xx 或用完次數
pub struct ReadinessProber {
    client: reqwest::Client,
    policy: ProbePolicy,
}

impl ReadinessProber {
    pub fn new(policy: ProbePolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .connect_timeout(policy.request_timeout)
            .build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> ProbePolicy {
        self.policy
    }

    /// 成功時回傳等待耗時；用完次數回傳 ReadinessTimeout
    pub async fn wait_ready(&self, service: &str, url: &str) -> Result<Duration> {
        let started = Instant::now();

        for attempt in 1..=self.policy.attempts {
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        "✅ '{}' ready after {} attempt(s) ({:.1}s)",
                        service,
                        attempt,
                        elapsed.as_secs_f64()
                    );
                    return Ok(elapsed);
                }
                Ok(resp) => {
                    tracing::debug!(
                        "'{}' probe {}/{}: HTTP {}",
                        service,
                        attempt,
                        self.policy.attempts,
                        resp.status()
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        "'{}' probe {}/{}: {}",
                        service,
                        attempt,
                        self.policy.attempts,
                        e
                    );
                }
            }

            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        Err(LaunchError::ReadinessTimeout {
            service: service.to_string(),
            url: url.to_string(),
            attempts: self.policy.attempts,
        })
    }
}
