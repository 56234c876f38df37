use httpmock::prelude::*;
use ragstack::core::prober::{ProbePolicy, ReadinessProber};
use ragstack::utils::error::LaunchError;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn quick_policy(attempts: u32, interval_ms: u64) -> ProbePolicy {
    ProbePolicy {
        interval: Duration::from_millis(interval_ms),
        attempts,
        request_timeout: Duration::from_secs(2),
    }
}

/// 前 fail_count 次回 503，之後回 200 的極簡健康端點
async fn flaky_health_server(fail_count: u32) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut seen = 0u32;
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            seen += 1;
            let ok = seen > fail_count;

            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;

            let resp = if ok {
                "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
            } else {
                "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            };
            let _ = socket.write_all(resp.as_bytes()).await;
        }
    });

    addr
}

#[tokio::test]
async fn test_immediate_success_returns_quickly() {
    let server = MockServer::start();
    let health = server.mock(|when, then| {
        when.method(GET).path("/health");
        then.status(200).json_body(serde_json::json!({"status": "ok"}));
    });

    let prober = ReadinessProber::new(quick_policy(5, 200)).unwrap();
    let elapsed = prober
        .wait_ready("rag", &server.url("/health"))
        .await
        .unwrap();

    health.assert();
    // 第一回合就成功，不該有任何輪詢間隔
    assert!(elapsed < Duration::from_millis(200));
}

#[tokio::test]
async fn test_ready_on_fourth_attempt_after_three_failures() {
    let addr = flaky_health_server(3).await;
    let url = format!("http://{}/health", addr);

    let interval = Duration::from_millis(100);
    let prober = ReadinessProber::new(quick_policy(10, 100)).unwrap();
    let elapsed = prober.wait_ready("vllm", &url).await.unwrap();

    // 三次失敗 => 三個輪詢間隔後的第四次成功
    assert!(elapsed >= 3 * interval, "elapsed was {:?}", elapsed);
    assert!(elapsed < 10 * interval, "elapsed was {:?}", elapsed);
}

#[tokio::test]
async fn test_never_ready_terminates_with_timeout() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/health");
        then.status(503);
    });

    let started = Instant::now();
    let prober = ReadinessProber::new(quick_policy(3, 50)).unwrap();
    let err = prober
        .wait_ready("proxy", &server.url("/health"))
        .await
        .unwrap_err();

    match err {
        LaunchError::ReadinessTimeout {
            ref service, attempts, ..
        } => {
            assert_eq!(service, "proxy");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // 有界：不會無限掛住
    assert!(started.elapsed() < Duration::from_secs(8));
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn test_connection_refused_counts_as_failed_attempt() {
    // 綁一個埠再放掉，拿到一個（幾乎肯定）沒人監聽的位址
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = ReadinessProber::new(quick_policy(2, 50)).unwrap();
    let err = prober
        .wait_ready("chroma", &format!("http://{}/api/v1/heartbeat", addr))
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::ReadinessTimeout { .. }));
}
