//! Download throughput measurement
//!
//! A bounded streaming GET: bytes are counted until EOF or until the
//! transfer window closes, whichever comes first.

use crate::errors::{Result, TuneError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// Shortest elapsed time used when converting bytes to a rate
pub const MIN_ELAPSED_SECS: f64 = 0.1;

/// Measures download speed from an HTTP endpoint
#[async_trait]
pub trait ThroughputProbe: Send + Sync {
    /// Whether `url` answers a ranged or plain request
    async fn check(&self, url: &str) -> bool;

    /// Stream from `url` for at most `max_duration` and return Mbps
    async fn measure(&self, url: &str, max_duration: Duration) -> Result<f64>;
}

/// Convert a byte count over `elapsed` to megabits per second, 2 decimals
pub fn compute_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
    let mbps = (bytes as f64 * 8.0) / (secs * 1_000_000.0);
    (mbps * 100.0).round() / 100.0
}

/// `ThroughputProbe` over reqwest
#[derive(Debug, Clone)]
pub struct HttpThroughputProbe {
    client: Client,
    check_timeout: Duration,
}

impl HttpThroughputProbe {
    pub fn new(check_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tunekit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TuneError::HttpError)?;

        Ok(Self::with_client(client, check_timeout))
    }

    /// Use a preconfigured client
    pub fn with_client(client: Client, check_timeout: Duration) -> Self {
        Self {
            client,
            check_timeout,
        }
    }

    /// Stream the body of `url` until EOF or until `max_duration` has passed.
    ///
    /// Returns the bytes received and the elapsed time. A non-2xx status is
    /// an error; the window closing mid-body is not.
    pub async fn transfer(&self, url: &str, max_duration: Duration) -> Result<(u64, Duration)> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + max_duration;

        let response = tokio::time::timeout_at(deadline, self.client.get(url).send())
            .await
            .map_err(|_| TuneError::Timeout {
                duration_ms: max_duration.as_millis() as u64,
            })??;

        if !response.status().is_success() {
            return Err(TuneError::Generic(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let mut stream = response.bytes_stream();
        let mut bytes_read: u64 = 0;

        while let Ok(Some(chunk)) = tokio::time::timeout_at(deadline, stream.next()).await {
            bytes_read += chunk?.len() as u64;
        }

        Ok((bytes_read, started.elapsed()))
    }
}

#[async_trait]
impl ThroughputProbe for HttpThroughputProbe {
    async fn check(&self, url: &str) -> bool {
        let request = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(self.check_timeout)
            .send();

        match request.await {
            Ok(response) => {
                debug!(url, status = %response.status(), "Download endpoint answered");
                response.status().is_success()
            }
            Err(e) => {
                debug!(url, error = %e, "Download endpoint unreachable");
                false
            }
        }
    }

    async fn measure(&self, url: &str, max_duration: Duration) -> Result<f64> {
        let (bytes_read, elapsed) = self.transfer(url, max_duration).await?;
        let mbps = compute_mbps(bytes_read, elapsed);
        debug!(url, bytes_read, mbps, "Transfer finished");
        Ok(mbps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local HTTP server answering every request with `head` + `body`, then
    /// holding the connection open for `hold`
    async fn serve(head: String, body: Vec<u8>, hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let head = head.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(hold).await;
                });
            }
        });

        format!("http://{}/10MB.bin", addr)
    }

    fn local_probe() -> HttpThroughputProbe {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpThroughputProbe::with_client(client, Duration::from_secs(2))
    }

    fn ok_head(status: &str, content_length: usize) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status, content_length
        )
    }

    #[test]
    fn test_compute_mbps() {
        // 10 MB in 2 s
        assert_eq!(compute_mbps(10_000_000, Duration::from_secs(2)), 40.0);
        assert_eq!(compute_mbps(0, Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn test_compute_mbps_floors_elapsed() {
        let fast = compute_mbps(1_000_000, Duration::from_millis(1));
        let floored = compute_mbps(1_000_000, Duration::from_millis(100));
        assert_eq!(fast, floored);
        assert_eq!(fast, 80.0);
    }

    #[test]
    fn test_compute_mbps_rounds_to_two_decimals() {
        let mbps = compute_mbps(1_234_567, Duration::from_secs(3));
        assert_eq!(mbps, 3.29);
    }

    #[tokio::test]
    async fn test_transfer_counts_body_bytes() {
        let body = vec![7u8; 64 * 1024];
        let url = serve(ok_head("200 OK", body.len()), body, Duration::ZERO).await;
        let probe = local_probe();

        let (bytes, elapsed) = probe.transfer(&url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(bytes, 64 * 1024);
        assert!(elapsed < Duration::from_secs(5));

        let mbps = probe.measure(&url, Duration::from_secs(5)).await.unwrap();
        assert!(mbps > 0.0);
    }

    #[tokio::test]
    async fn test_transfer_stops_when_window_closes() {
        // Promises 10 MB, sends 4 KiB, then stalls
        let url = serve(
            ok_head("200 OK", 10_000_000),
            vec![1u8; 4096],
            Duration::from_secs(30),
        )
        .await;

        let (bytes, elapsed) = local_probe()
            .transfer(&url, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(bytes, 4096);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let url = serve(ok_head("404 Not Found", 9), b"not found".to_vec(), Duration::ZERO).await;
        let err = local_probe()
            .measure(&url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_check_accepts_partial_content() {
        let url = serve(ok_head("206 Partial Content", 1), vec![0u8], Duration::ZERO).await;
        assert!(local_probe().check(&url).await);
    }

    #[tokio::test]
    async fn test_check_unreachable_endpoint() {
        let probe = HttpThroughputProbe::new(Duration::from_millis(500)).unwrap();
        // Port 9 on localhost is discard; nothing listens in test environments
        assert!(!probe.check("http://127.0.0.1:9/file.bin").await);
    }
}
