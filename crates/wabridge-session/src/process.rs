//! Subprocess session driver.
//!
//! Runs the automation driver as a child process and talks to it with
//! newline-delimited JSON over stdin/stdout:
//!
//! ```text
//! -> {"id": 0, "method": "initialize", "params": {}}
//! <- {"event": "qr", "code": "2@Xk1n..."}
//! <- {"id": 0, "result": null}
//! <- {"event": "ready", "identifier": "5511999999999"}
//! -> {"id": 1, "method": "sendMessage", "params": {"chatId": "5511988887777@c.us", "body": "hi"}}
//! <- {"id": 1, "error": {"message": "chat not found"}}
//! ```
//!
//! Lines carrying an `id` are responses and are correlated with the pending
//! request through a oneshot channel; lines carrying an `event` are lifecycle
//! notifications and go to the session's event sink. When the driver's stdout
//! closes, every pending request fails and a `disconnected` event is emitted.
//!
//! The driver answers `initialize` as soon as the automation has started, not
//! when pairing completes; pairing progress is reported through events only.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{SessionClient, SessionFactory};
use crate::error::{SessionError, SessionResult};
use crate::event::{EventSender, InboundMessage, SessionEvent};

/// Environment variable through which the driver learns where to keep its
/// authentication material.
pub const AUTH_DIR_ENV: &str = "SESSION_AUTH_DIR";

/// Driver process configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub auth_dir: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["session-driver.js".to_string()],
            auth_dir: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Request written to the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Error payload inside a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub message: String,
}

/// Response read from the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// Lifecycle notification read from the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireEvent {
    Qr {
        code: String,
    },
    Authenticated,
    AuthFailure {
        #[serde(default)]
        message: Option<String>,
    },
    Ready {
        #[serde(default)]
        identifier: Option<String>,
    },
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    Message {
        from: String,
        #[serde(default)]
        from_me: bool,
        #[serde(default)]
        notify_name: Option<String>,
        #[serde(default)]
        body: String,
    },
}

impl From<WireEvent> for SessionEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Qr { code } => SessionEvent::Qr { code },
            WireEvent::Authenticated => SessionEvent::Authenticated,
            WireEvent::AuthFailure { message } => SessionEvent::AuthFailure { message },
            WireEvent::Ready { identifier } => SessionEvent::Ready {
                identifier: identifier.unwrap_or_else(|| "Unknown".to_string()),
            },
            WireEvent::Disconnected { reason } => SessionEvent::Disconnected { reason },
            WireEvent::Message {
                from,
                from_me,
                notify_name,
                body,
            } => SessionEvent::Message(InboundMessage {
                from,
                from_me,
                notify_name,
                body,
                received_at: Utc::now(),
            }),
        }
    }
}

/// Any line the driver may print. Responses are tried first because they are
/// the only messages with an `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Response(WireResponse),
    Event(WireEvent),
}

type Pending = Arc<DashMap<u64, oneshot::Sender<SessionResult<Value>>>>;

/// Request/response connection over a pair of pipes
pub struct DriverConnection<W> {
    last_id: AtomicU64,
    pending: Pending,
    /// Set by the read loop once the driver's output has ended
    closed: Arc<AtomicBool>,
    writer: Mutex<W>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl<W> DriverConnection<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wire up a connection and start its read loop
    pub fn new<R>(writer: W, reader: R, events: EventSender, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            events,
        ));

        Self {
            last_id: AtomicU64::new(0),
            pending,
            closed,
            writer: Mutex::new(writer),
            request_timeout,
            reader,
        }
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Value) -> SessionResult<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        // Inserted after the read loop cleared the map: nobody will answer
        if self.closed.load(Ordering::SeqCst) {
            self.pending.remove(&id);
            return Err(SessionError::ChannelClosed);
        }

        let request = WireRequest {
            id,
            method: method.to_string(),
            params,
        };

        if let Err(e) = self.write_line(&request).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::ChannelClosed),
            Err(_) => {
                self.pending.remove(&id);
                Err(SessionError::Timeout {
                    operation: method.to_string(),
                    secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn write_line(&self, request: &WireRequest) -> SessionResult<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the driver's output has ended
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<W> Drop for DriverConnection<W> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(reader: R, pending: Pending, closed: Arc<AtomicBool>, events: EventSender)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                dispatch_line(line, &pending, &events);
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from session driver: {}", e);
                break;
            }
        }
    }

    debug!("Session driver output closed");
    closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every waiter with ChannelClosed
    pending.clear();
    let _ = events.send(SessionEvent::Disconnected {
        reason: Some("session driver exited".to_string()),
    });
}

fn dispatch_line(line: &str, pending: &Pending, events: &EventSender) {
    match serde_json::from_str::<WireMessage>(line) {
        Ok(WireMessage::Response(response)) => {
            let Some((_, callback)) = pending.remove(&response.id) else {
                warn!("Response for unknown request id={}", response.id);
                return;
            };
            let result = match response.error {
                Some(error) => Err(SessionError::remote(error.message)),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            let _ = callback.send(result);
        }
        Ok(WireMessage::Event(event)) => {
            let _ = events.send(event.into());
        }
        Err(_) => {
            // Drivers tend to print their own diagnostics on stdout
            debug!("Driver output: {}", line);
        }
    }
}

/// Session client backed by a driver subprocess
pub struct ProcessClient {
    connection: DriverConnection<tokio::process::ChildStdin>,
    child: Mutex<Child>,
}

impl ProcessClient {
    /// Spawn the driver process. Must be called inside a tokio runtime.
    pub fn spawn(config: &ProcessConfig, events: EventSender) -> SessionResult<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(ref dir) = config.auth_dir {
            command.env(AUTH_DIR_ENV, dir);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::protocol("driver stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::protocol("driver stdout unavailable"))?;

        info!(
            program = %config.program,
            pid = child.id().unwrap_or_default(),
            "Session driver started"
        );

        Ok(Self {
            connection: DriverConnection::new(stdin, stdout, events, config.request_timeout),
            child: Mutex::new(child),
        })
    }
}

#[async_trait]
impl SessionClient for ProcessClient {
    async fn initialize(&self) -> SessionResult<()> {
        self.connection.request("initialize", json!({})).await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> SessionResult<()> {
        self.connection
            .request("sendMessage", json!({ "chatId": chat_id, "body": body }))
            .await?;
        Ok(())
    }

    async fn destroy(&self) -> SessionResult<()> {
        if let Err(e) = self.connection.request("destroy", json!({})).await {
            debug!("Driver did not acknowledge destroy: {}", e);
        }

        let mut child = self.child.lock().await;
        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        info!("Session driver stopped");
        Ok(())
    }
}

/// Builds [`ProcessClient`]s from a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct ProcessFactory {
    config: ProcessConfig,
}

impl ProcessFactory {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for ProcessFactory {
    fn create(&self, events: EventSender) -> SessionResult<Arc<dyn SessionClient>> {
        let client = ProcessClient::spawn(&self.config, events)?;
        Ok(Arc::new(client))
    }
}
