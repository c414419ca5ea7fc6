use std::future::Future;

use log::{debug, error, info, warn};
use reqwest::StatusCode;
use serde_json::Value;

use crate::config;
use crate::messages::Event;

/// Where the station delivers its events. Delivery is fire-and-forget:
/// implementations log failures and never report them to the caller.
pub trait EventSink: Send + Sync + 'static {
    fn send(&self, event: Event) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("invalid JSON response (HTTP {status}): {source}")]
    Body {
        status: StatusCode,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    rfid_url: String,
    buttons_url: String,
}

impl ApiClient {
    pub fn new(config: &config::ApiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("rfid-station/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ApiClient {
            http,
            rfid_url: config.rfid_url().to_string(),
            buttons_url: config.buttons_url().to_string(),
        })
    }

    fn endpoint(&self, event: &Event) -> &str {
        match event {
            Event::Scan(_) => &self.rfid_url,
            Event::Button(_) => &self.buttons_url,
        }
    }

    async fn post(&self, event: &Event) -> Result<(StatusCode, Value), ApiError> {
        let response = self
            .http
            .post(self.endpoint(event))
            .json(event)
            .send()
            .await
            .map_err(ApiError::Request)?;

        let status = response.status();
        let json = response
            .json::<Value>()
            .await
            .map_err(|source| ApiError::Body { status, source })?;
        Ok((status, json))
    }
}

impl EventSink for ApiClient {
    async fn send(&self, event: Event) {
        match (self.post(&event).await, &event) {
            (Ok((status, body)), Event::Scan(scan)) => {
                if status.is_success() {
                    info!("[RFID] {} — {}", status.as_u16(), body);
                } else {
                    warn!("[RFID] {} — {}", status.as_u16(), body);
                }
                if let Some(known) = body.get("known").and_then(Value::as_bool) {
                    debug!(
                        "[RFID] badge {} is {}",
                        scan.rfid_uuid,
                        if known { "known" } else { "unknown" }
                    );
                }
            }
            (Ok((status, body)), Event::Button(button)) => {
                if status.is_success() {
                    info!("[BTN] {} — {} — {}", button.action, status.as_u16(), body);
                } else {
                    warn!("[BTN] {} — {} — {}", button.action, status.as_u16(), body);
                }
            }
            (Err(err), Event::Scan(_)) => error!("[RFID ERR] {}", err),
            (Err(err), Event::Button(button)) => error!("[BTN ERR] {}: {}", button.action, err),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::EventSink;
    use crate::messages::Event;

    /// Sink that records every event it is handed.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        async fn send(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::messages::ButtonAction;

    /// Accepts one HTTP request, answers with `status` and `body`, and
    /// yields the request line and body it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let (head_len, content_length) = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    break (pos + 4, length);
                }
            };
            while buf.len() < head_len + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request_line = String::from_utf8_lossy(&buf[..head_len])
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            let request_body = String::from_utf8_lossy(&buf[head_len..]).to_string();

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            (request_line, request_body)
        });
        (addr, handle)
    }

    fn client_with_timeout(addr: SocketAddr, timeout_seconds: u64) -> ApiClient {
        let config = config::ApiConfig {
            rfid_url: Some(format!("http://{}/api/rfid", addr)),
            buttons_url: Some(format!("http://{}/api/buttons", addr)),
            timeout_seconds: Some(timeout_seconds),
        };
        ApiClient::new(&config).unwrap()
    }

    fn client_for(addr: SocketAddr) -> ApiClient {
        client_with_timeout(addr, 2)
    }

    #[tokio::test]
    async fn test_scan_posts_uid_and_machine_id() {
        let (addr, server) =
            serve_once("200 OK", r#"{"success":true,"known":false,"message":"Scan logged securely"}"#).await;
        let client = client_for(addr);

        let (status, body) = client.post(&Event::scan("123456789", "ecran_1")).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["known"], Value::Bool(false));

        let (request_line, request_body) = server.await.unwrap();
        assert!(request_line.starts_with("POST /api/rfid "));
        assert_eq!(request_body, r#"{"rfidUuid":"123456789","machineId":"ecran_1"}"#);
    }

    #[tokio::test]
    async fn test_button_posts_to_button_endpoint() {
        let (addr, server) = serve_once("200 OK", r#"{"success":true}"#).await;
        let client = client_for(addr);

        client.send(Event::button(ButtonAction::Back, "ecran_1")).await;

        let (request_line, request_body) = server.await.unwrap();
        assert!(request_line.starts_with("POST /api/buttons "));
        assert_eq!(request_body, r#"{"machineId":"ecran_1","action":"back"}"#);
    }

    #[tokio::test]
    async fn test_error_status_still_parses_body() {
        let (addr, server) = serve_once("400 Bad Request", r#"{"error":"Missing UUID"}"#).await;
        let client = client_for(addr);

        let (status, body) = client.post(&Event::scan("", "ecran_1")).await.unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing UUID");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_non_json_response_is_an_error() {
        let (addr, server) = serve_once("502 Bad Gateway", "<html>bad gateway</html>").await;
        let client = client_for(addr);

        let err = client.post(&Event::scan("42", "ecran_1")).await.unwrap_err();
        assert!(matches!(err, ApiError::Body { status, .. } if status == StatusCode::BAD_GATEWAY));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_does_not_escape_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(addr);

        assert!(matches!(
            client.post(&Event::scan("42", "ecran_1")).await,
            Err(ApiError::Request(_))
        ));
        // Logged and dropped.
        client.send(Event::scan("42", "ecran_1")).await;
    }

    #[tokio::test]
    async fn test_silent_server_is_cut_off_by_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        let client = client_with_timeout(addr, 1);

        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.post(&Event::scan("42", "ecran_1")),
        )
        .await
        .expect("request outlived the client timeout");

        match result {
            Err(ApiError::Request(err)) => assert!(err.is_timeout(), "unexpected error: {}", err),
            other => panic!("expected a timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(3));
        server.abort();
    }
}
