//! In-memory sources and notifiers for loop and scheduler tests, plus a
//! loopback HTTP responder for client tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::notify::{Notifier, SendError};
use crate::reading::Reading;
use crate::source::{FetchError, ReadingSource};
use crate::telegram::ApiError;

/// Replays a fixed list of fetch results, then fails every fetch.
pub struct ScriptedSource {
    script: VecDeque<Result<Reading, FetchError>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    pub fetches: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    /// `None` entries become fetch failures.
    pub fn new(values: Vec<Option<i64>>) -> Self {
        Self::from_readings(
            values
                .into_iter()
                .map(|v| v.map(Reading::new).ok_or_else(|| FetchError::Parse("scripted failure".to_string())))
                .collect(),
        )
    }

    pub fn from_readings(script: Vec<Result<Reading, FetchError>>) -> Self {
        Self {
            script: script.into(),
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every fetch takes `delay` of (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        self.max_in_flight.clone()
    }
}

#[async_trait]
impl ReadingSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Parse("script exhausted".to_string())))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A source whose fetch never completes.
pub struct StalledSource;

#[async_trait]
impl ReadingSource for StalledSource {
    fn describe(&self) -> String {
        "stalled".to_string()
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        std::future::pending().await
    }
}

/// Records every message; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected {
                method: "sendMessage",
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            }
            .into());
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Answer exactly one HTTP request on a loopback port with `status` and a
/// JSON `body`. Returns the base URL (`http://127.0.0.1:<port>`).
pub async fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}", addr)
}

/// Consume headers plus a Content-Length body so the client never sees a reset.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}
