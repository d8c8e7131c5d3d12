//! One DevTools websocket driven by a single loop task. Commands go in over
//! a channel and resolve through a oneshot; events come out over a bounded
//! channel and are dropped when nobody drains it.

use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::CdpConfig;
use crate::errors::DriverError;
use crate::util::{detect_chrome_executable, extract_ws_url};

#[derive(Clone, Debug, PartialEq)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError>;

    /// Next buffered protocol event, `None` once the connection is gone.
    async fn next_event(&self) -> Option<TransportEvent>;
}

struct ControlMessage {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, DriverError>>,
}

type Inflight = HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>>;

/// Live connection to a launched (or already running) Chromium.
pub struct ChromiumTransport {
    command_tx: mpsc::Sender<ControlMessage>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    loop_task: JoinHandle<()>,
    heartbeat_task: Option<JoinHandle<()>>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
    deadline: Duration,
}

impl ChromiumTransport {
    pub async fn start(cfg: &CdpConfig) -> Result<Self, DriverError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let mut child = browser_config(cfg)?
                    .launch()
                    .map_err(|err| DriverError::Launch(format!("failed to launch chromium: {err}")))?;
                let ws_url =
                    extract_ws_url(&mut child, Duration::from_millis(cfg.launch_timeout_ms)).await?;
                (Some(child), ws_url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| DriverError::Connection(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(512);
        let alive = Arc::new(AtomicBool::new(true));
        let deadline = Duration::from_millis(cfg.default_deadline_ms);

        let loop_alive = alive.clone();
        let loop_task = tokio::spawn(async move {
            let result = run_loop(conn, command_rx, events_tx).await;
            loop_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-driver", error = %err, "transport loop terminated");
            }
        });
        let heartbeat_task = spawn_heartbeat(
            command_tx.clone(),
            alive.clone(),
            Duration::from_millis(cfg.heartbeat_interval_ms),
            deadline,
        );

        info!(target: "cdp-driver", url = %ws_url, "chromium connection established");
        Ok(Self {
            command_tx,
            events_rx: Mutex::new(events_rx),
            loop_task,
            heartbeat_task,
            child: Mutex::new(child),
            alive,
            deadline,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Stop the loop and kill the browser if this transport launched it.
    pub async fn shutdown(&self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();
        if let Some(handle) = &self.heartbeat_task {
            handle.abort();
        }
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                warn!(target: "cdp-driver", error = %err, "failed to kill chromium");
            }
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        if !self.is_alive() {
            return Err(DriverError::Connection("connection closed".into()));
        }
        send(&self.command_tx, target, method, params, self.deadline).await
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }
}

impl Drop for ChromiumTransport {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();
        if let Some(handle) = &self.heartbeat_task {
            handle.abort();
        }
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(err) = child.kill().await {
                                warn!(target: "cdp-driver", error = %err, "failed to kill chromium");
                            }
                        });
                    }
                    Err(_) => debug!(target: "cdp-driver", "no runtime left to kill chromium"),
                }
            }
        }
    }
}

async fn send(
    command_tx: &mpsc::Sender<ControlMessage>,
    target: CommandTarget,
    method: &str,
    params: Value,
    deadline: Duration,
) -> Result<Value, DriverError> {
    let (responder, response) = oneshot::channel();
    command_tx
        .send(ControlMessage {
            target,
            method: method.to_string(),
            params,
            responder,
        })
        .await
        .map_err(|err| DriverError::Connection(err.to_string()))?;

    match tokio::time::timeout(deadline, response).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(DriverError::Connection("response channel closed".into())),
        Err(_) => Err(DriverError::Timeout(method.to_string())),
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, DriverError> {
    let executable = match &cfg.executable {
        Some(path) if !path.exists() => {
            return Err(DriverError::Launch(format!(
                "chrome executable not found at {}",
                path.display()
            )))
        }
        Some(path) => path.clone(),
        None => detect_chrome_executable().ok_or_else(|| {
            DriverError::Launch(
                "no Chrome/Chromium found; set FORMPILOT_CHROME to the browser binary".into(),
            )
        })?,
    };

    let profile_dir = cfg.profile_dir();
    fs::create_dir_all(&profile_dir).map_err(|err| {
        DriverError::Launch(format!("failed to create {}: {err}", profile_dir.display()))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-breakpad",
        "--disable-component-update",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-sync",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--remote-allow-origins=*",
        "--use-mock-keychain",
    ];
    if cfg.headless {
        args.push("--headless=new");
        args.push("--hide-scrollbars");
        args.push("--mute-audio");
    }

    builder
        .args(args)
        .chrome_executable(executable)
        .user_data_dir(profile_dir)
        .build()
        .map_err(|err| DriverError::Launch(format!("browser config error: {err}")))
}

async fn run_loop(
    mut conn: Connection<CdpEventMessage>,
    mut command_rx: mpsc::Receiver<ControlMessage>,
    events_tx: mpsc::Sender<TransportEvent>,
) -> Result<(), DriverError> {
    let mut inflight = Inflight::new();
    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => submit(&mut conn, cmd, &mut inflight)?,
            message = conn.next() => match message {
                Some(Ok(Message::Response(resp))) => {
                    if let Some(sender) = inflight.remove(&resp.id) {
                        let _ = sender.send(extract_payload(resp));
                    }
                }
                Some(Ok(Message::Event(event))) => forward_event(event, &events_tx),
                Some(Err(err)) => {
                    let err = map_cdp_error(err);
                    for (_, sender) in inflight.drain() {
                        let _ = sender.send(Err(err.clone()));
                    }
                    return Err(err);
                }
                None => {
                    let err = DriverError::Connection("cdp connection closed".into());
                    for (_, sender) in inflight.drain() {
                        let _ = sender.send(Err(err.clone()));
                    }
                    return Ok(());
                }
            }
        }
    }
}

fn submit(
    conn: &mut Connection<CdpEventMessage>,
    cmd: ControlMessage,
    inflight: &mut Inflight,
) -> Result<(), DriverError> {
    let session = match cmd.target {
        CommandTarget::Browser => None,
        CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
    };
    let method: MethodId = cmd.method.into();
    match conn.submit_command(method, session, cmd.params) {
        Ok(call_id) => {
            inflight.insert(call_id, cmd.responder);
            Ok(())
        }
        Err(err) => {
            let err = DriverError::Connection(err.to_string());
            let _ = cmd.responder.send(Err(err.clone()));
            Err(err)
        }
    }
}

fn forward_event(event: CdpEventMessage, events_tx: &mpsc::Sender<TransportEvent>) {
    let raw: CdpJsonEventMessage = match event.try_into() {
        Ok(raw) => raw,
        Err(err) => {
            warn!(target: "cdp-driver", error = %err, "failed to decode cdp event");
            return;
        }
    };
    let event = TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    };
    if let Err(mpsc::error::TrySendError::Full(event)) = events_tx.try_send(event) {
        debug!(target: "cdp-driver", method = %event.method, "event buffer full, dropping");
    }
}

fn extract_payload(resp: Response) -> Result<Value, DriverError> {
    match (resp.result, resp.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(DriverError::Protocol {
            code: error.code,
            message: error.message,
        }),
        (None, None) => Err(DriverError::Decode("empty cdp response".into())),
    }
}

fn map_cdp_error(err: CdpError) -> DriverError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => DriverError::Timeout(hint),
        CdpError::JavascriptException(_) => DriverError::Script(hint),
        CdpError::Serde(_) | CdpError::DecodeError(_) => DriverError::Decode(hint),
        _ => DriverError::Connection(hint),
    }
}

fn spawn_heartbeat(
    sender: mpsc::Sender<ControlMessage>,
    alive: Arc<AtomicBool>,
    period: Duration,
    deadline: Duration,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }
    let deadline = deadline.min(Duration::from_secs(5));
    Some(tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately.
        ticker.tick().await;
        while alive.load(Ordering::Relaxed) {
            ticker.tick().await;
            if !alive.load(Ordering::Relaxed) {
                break;
            }
            let params = Value::Object(Default::default());
            match send(&sender, CommandTarget::Browser, "Browser.getVersion", params, deadline).await {
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "cdp-driver", error = %err, "heartbeat failed");
                    break;
                }
            }
        }
    }))
}
