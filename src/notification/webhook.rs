//! Webhook 投递 - 通过 HTTP POST 发送通知文档
//!
//! 每次投递最多尝试 3 次，尝试之间没有等待；任意 2xx 响应视为成功。
//! 全部失败时只记录日志，不向调用方返回错误。

use super::proxy::ResolvedProxy;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 最大尝试次数
pub const MAX_ATTEMPTS: u32 = 3;

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// 一次投递请求
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub url: String,
    /// 序列化后的通知文档
    pub body: String,
    pub timeout: Duration,
    pub proxy: Option<ResolvedProxy>,
}

/// HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输层错误（连接失败、超时等）
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("HTTP request failed: {0}")]
    Request(String),
}

/// 单次 POST
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: &DeliveryRequest) -> Result<TransportResponse, TransportError>;
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Default, Clone)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(&self, request: &DeliveryRequest) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(request.timeout)
            .connect_timeout(request.timeout);

        if let Some(proxy) = &request.proxy {
            let mut reqwest_proxy =
                reqwest::Proxy::all(proxy.url()).map_err(|e| TransportError::Client(e.to_string()))?;
            if let Some((username, password)) = proxy.credentials() {
                reqwest_proxy = reqwest_proxy.basic_auth(username, password);
            }
            builder = builder.proxy(reqwest_proxy);
        } else {
            builder = builder.no_proxy();
        }

        builder.build().map_err(|e| TransportError::Client(e.to_string()))
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: &DeliveryRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client(request)?;
        let response = client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(request.body.clone().into_bytes())
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

/// 投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub url: String,
    pub attempts: u32,
    pub delivered: bool,
    /// 最后一次失败的描述
    pub last_error: Option<String>,
}

/// 投递 worker
#[derive(Clone)]
pub struct DeliveryWorker {
    transport: Arc<dyn WebhookTransport>,
    max_attempts: u32,
}

impl DeliveryWorker {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// 使用 reqwest 传输
    pub fn http() -> Self {
        Self::new(Arc::new(HttpTransport::new()))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 顺序尝试，成功即停止
    pub async fn deliver(&self, request: &DeliveryRequest) -> DeliveryReport {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!(url = %request.url, attempt, "Posting notification");
            match self.transport.post(request).await {
                Ok(response) if response.is_success() => {
                    info!(url = %request.url, status = response.status, attempt, "Notification delivered");
                    return DeliveryReport {
                        url: request.url.clone(),
                        attempts: attempt,
                        delivered: true,
                        last_error: None,
                    };
                }
                Ok(response) => {
                    warn!(
                        url = %request.url,
                        status = response.status,
                        body = %response.body,
                        attempt,
                        "Webhook returned non-success status"
                    );
                    last_error = Some(format!("status {}: {}", response.status, response.body));
                }
                Err(e) => {
                    warn!(url = %request.url, error = %e, attempt, "Webhook request failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        warn!(url = %request.url, attempts = self.max_attempts, "Giving up on notification");
        DeliveryReport {
            url: request.url.clone(),
            attempts: self.max_attempts,
            delivered: false,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// 前 N 次失败，之后成功
    struct FlakyTransport {
        failures: u32,
        attempts: AtomicU32,
        use_transport_errors: bool,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self { failures, attempts: AtomicU32::new(0), use_transport_errors: false }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookTransport for FlakyTransport {
        async fn post(&self, _request: &DeliveryRequest) -> Result<TransportResponse, TransportError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.failures {
                return Ok(TransportResponse { status: 200, body: "1".to_string() });
            }
            if self.use_transport_errors {
                Err(TransportError::Request("connection refused".to_string()))
            } else {
                Ok(TransportResponse { status: 500, body: "boom".to_string() })
            }
        }
    }

    /// 记录收到的请求
    struct RecordingTransport {
        requests: Mutex<Vec<DeliveryRequest>>,
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn post(&self, request: &DeliveryRequest) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(TransportResponse { status: 204, body: String::new() })
        }
    }

    fn request() -> DeliveryRequest {
        DeliveryRequest {
            url: "https://outlook.office.com/webhook/abc".to_string(),
            body: r#"{"summary":"x"}"#.to_string(),
            timeout: Duration::from_millis(30_000),
            proxy: None,
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let transport = Arc::new(FlakyTransport::new(2));
        let worker = DeliveryWorker::new(transport.clone());

        let report = worker.deliver(&request()).await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let transport = Arc::new(FlakyTransport::new(10));
        let worker = DeliveryWorker::new(transport.clone());

        let report = worker.deliver(&request()).await;

        assert!(!report.delivered);
        assert_eq!(transport.attempts(), 3);
        assert_eq!(report.last_error.as_deref(), Some("status 500: boom"));
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let transport = Arc::new(FlakyTransport { use_transport_errors: true, ..FlakyTransport::new(1) });
        let worker = DeliveryWorker::new(transport.clone());

        let report = worker.deliver(&request()).await;

        assert!(report.delivered);
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let transport = Arc::new(RecordingTransport { requests: Mutex::new(Vec::new()) });
        let worker = DeliveryWorker::new(transport.clone());

        let report = worker.deliver(&request()).await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 1);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, r#"{"summary":"x"}"#);
    }

    #[test]
    fn test_response_success_range() {
        assert!(TransportResponse { status: 200, body: String::new() }.is_success());
        assert!(TransportResponse { status: 299, body: String::new() }.is_success());
        assert!(!TransportResponse { status: 302, body: String::new() }.is_success());
        assert!(!TransportResponse { status: 400, body: String::new() }.is_success());
    }

    #[test]
    fn test_http_client_builds_with_proxy() {
        let mut req = request();
        req.proxy = Some(ResolvedProxy {
            host: "proxy.local".to_string(),
            port: 3128,
            username: Some("user".to_string()),
            password: None,
        });
        assert!(HttpTransport::new().client(&req).is_ok());
    }

    /// 本地 HTTP 服务收到的请求：Content-Type 和 body
    type Received = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    fn header(head: &str, name: &str) -> Option<String> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    }

    async fn read_request(socket: &mut TcpStream) -> Option<(String, Vec<u8>)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length: usize = header(&head, "content-length")?.parse().ok()?;
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let content_type = header(&head, "content-type").unwrap_or_default();
        Some((content_type, buf[header_end..header_end + length].to_vec()))
    }

    /// 前 `failures` 个请求返回 500，之后返回 200
    async fn spawn_webhook_server(failures: usize) -> (String, Received) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/webhook", listener.local_addr().unwrap());
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let seen = received.clone();

        tokio::spawn(async move {
            let mut count = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let Some(request) = read_request(&mut socket).await else { continue };
                seen.lock().unwrap().push(request);
                count += 1;
                let response = if count <= failures {
                    "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\nboom"
                } else {
                    "HTTP/1.1 200 OK\r\ncontent-length: 1\r\nconnection: close\r\n\r\n1"
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (url, received)
    }

    fn local_request(url: String) -> DeliveryRequest {
        DeliveryRequest {
            url,
            body: r#"{"summary":"Build Ünstable ✓"}"#.to_string(),
            timeout: Duration::from_secs(5),
            proxy: None,
        }
    }

    #[tokio::test]
    async fn test_http_delivery_retries_non_success_status() {
        let (url, received) = spawn_webhook_server(2).await;
        let request = local_request(url);

        let report = DeliveryWorker::http().deliver(&request).await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 3);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 3);
        for (content_type, body) in received.iter() {
            assert_eq!(content_type, CONTENT_TYPE_JSON);
            assert_eq!(body.as_slice(), request.body.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_http_delivery_gives_up_after_three_requests() {
        let (url, received) = spawn_webhook_server(usize::MAX).await;

        let report = DeliveryWorker::http().deliver(&local_request(url)).await;

        assert!(!report.delivered);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.last_error.as_deref(), Some("status 500: boom"));
        assert_eq!(received.lock().unwrap().len(), 3);
    }
}
