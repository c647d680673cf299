//! REST client for a hosted realtime database.
//!
//! Reads and writes go to `{base}/{path}.json`; subscriptions hold an
//! event stream open on the same URL and re-read the path whenever the
//! server reports a change.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{normalize_path, DocumentStore, StoreError, Subscription};

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RemoteStore {
    base_url: String,
    secret: Option<String>,
    client: Client,
    /// No overall timeout: event streams stay open indefinitely
    stream_client: Client,
}

impl RemoteStore {
    /// Client for the database at `base_url`; an empty secret is ignored
    pub fn new(base_url: &str, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("agencydesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let stream_client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("agencydesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.filter(|s| !s.is_empty()),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, normalize_path(path))
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.secret {
            Some(secret) => request.query(&[("auth", secret)]),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(StoreError::Unavailable(format!("{}: {}", status, body)))
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Hold the event stream open until the subscriber goes away or the
    /// server cancels the listener, reconnecting with backoff on failures.
    async fn listen(self, path: String, tx: mpsc::UnboundedSender<Value>) {
        let mut delay = Duration::from_secs(1);

        loop {
            match self.stream_once(&path, &tx).await {
                Ok(StreamEnd::SubscriberGone) => return,
                Ok(StreamEnd::Cancelled(reason)) => {
                    warn!(path = %path, reason = %reason, "Store listener cancelled by server");
                    return;
                }
                Ok(StreamEnd::Closed) => {
                    debug!(path = %path, "Store event stream closed, reconnecting");
                    delay = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Store event stream failed, retrying in {:?}", delay);
                }
            }

            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn stream_once(
        &self,
        path: &str,
        tx: &mpsc::UnboundedSender<Value>,
    ) -> Result<StreamEnd, StoreError> {
        let request = self
            .stream_client
            .get(self.url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check(response).await?;

        let mut parser = SseParser::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport_error)?;
            for event in parser.push(&chunk) {
                match event.name.as_str() {
                    "put" | "patch" => {
                        let snapshot = self.read_path(path).await?.unwrap_or(Value::Null);
                        if tx.send(snapshot).is_err() {
                            return Ok(StreamEnd::SubscriberGone);
                        }
                    }
                    "cancel" | "auth_revoked" => {
                        return Ok(StreamEnd::Cancelled(event.name));
                    }
                    _ => {}
                }
            }
            if tx.is_closed() {
                return Ok(StreamEnd::SubscriberGone);
            }
        }
        Ok(StreamEnd::Closed)
    }
}

enum StreamEnd {
    SubscriberGone,
    Cancelled(String),
    Closed,
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    async fn read_path(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .with_auth(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check(response).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn write_path(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let response = self
            .with_auth(self.client.put(self.url(path)))
            .json(value)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let path = normalize_path(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.clone().listen(path.clone(), tx));
        Ok(Subscription::new(path, rx, move || handle.abort()))
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Raw bytes are buffered and only complete event blocks are decoded, so a
/// multi-byte character split across network chunks stays intact.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Feed one network chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // `\r\n` line endings become `\n`
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8_lossy(&raw);
            let mut name = String::from("message");
            let mut data: Vec<&str> = Vec::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push(rest.strip_prefix(' ').unwrap_or(rest));
                }
            }
            events.push(SseEvent {
                name,
                data: data.join("\n"),
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let store = RemoteStore::new("https://agency.example.com/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("/services/"), "https://agency.example.com/services.json");
        assert_eq!(
            store.url("staffdashboard/tickets"),
            "https://agency.example.com/staffdashboard/tickets.json"
        );
        assert_eq!(store.url(""), "https://agency.example.com/.json");
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let store = RemoteStore::new("https://x.test", Some(String::new()), Duration::from_secs(5)).unwrap();
        assert!(store.secret.is_none());
    }

    #[test]
    fn test_sse_parser_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: put\ndata: {\"path\":\"/\",").is_empty());
        let events = parser.push(b"\"data\":null}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "put");
        assert_eq!(events[0].data, "{\"path\":\"/\",\"data\":null}");
        assert_eq!(events[1].name, "keep-alive");
    }

    #[test]
    fn test_sse_parser_crlf() {
        let mut parser = SseParser::default();
        let events = parser.push(b"event: cancel\r\ndata: null\r\n\r\n");
        assert_eq!(events, vec![SseEvent { name: "cancel".to_string(), data: "null".to_string() }]);
    }

    #[test]
    fn test_sse_parser_keeps_split_utf8() {
        let mut parser = SseParser::default();
        let frame = "event: put\ndata: {\"data\":\"Café ₵\"}\n\n".as_bytes();
        let split = frame.iter().position(|b| *b == 0xE2).unwrap() + 1;
        assert!(parser.push(&frame[..split]).is_empty());
        let events = parser.push(&frame[split..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"data\":\"Café ₵\"}");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let store = RemoteStore::new("http://127.0.0.1:9", None, Duration::from_millis(300)).unwrap();
        let err = store.read_path("services").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
