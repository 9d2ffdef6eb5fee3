//! mpv IPC driver with separated reader/writer tasks.
//!
//! Architecture:
//!
//! ```text
//!   MpvSink::load()
//!         │ (spawns mpv --idle lazily, reconnects after a death)
//!         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
//!         └── reader_task   ← reads JSON lines from socket
//!                                ├── response (has request_id) → matched oneshot::Sender
//!                                └── event / property-change   → typed AudioEvent channel
//! ```
//!
//! Platform notes:
//! - Unix:    Unix domain sockets
//! - Windows: named pipes  \\.\pipe\<name>

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::player::{AudioEvent, AudioSink};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// observe_property id for `pause`; matched in property-change events.
const OBS_PAUSE: u64 = 1;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

// ── IPC handle ────────────────────────────────────────────────────────────────

/// Cheaply cloneable handle to the writer task. `send()` fires a command
/// and awaits the matched response.
#[derive(Clone)]
struct IpcHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl IpcHandle {
    async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    async fn set_volume_pct(&self, volume: f32) -> anyhow::Result<()> {
        let vol_pct = (volume * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }
}

// ── sink ──────────────────────────────────────────────────────────────────────

/// The mpv-backed audio output. Owns the child process, spawning it lazily
/// on the first load and respawning after a death.
pub struct MpvSink {
    inner: Mutex<MpvState>,
    events: mpsc::Sender<AudioEvent>,
}

struct MpvState {
    socket_name: String,
    process: Option<tokio::process::Child>,
    handle: Option<IpcHandle>,
}

impl MpvSink {
    pub fn new(events: mpsc::Sender<AudioEvent>) -> Self {
        Self {
            inner: Mutex::new(MpvState {
                socket_name: dial_core::platform::mpv_socket_name(),
                process: None,
                handle: None,
            }),
            events,
        }
    }
}

#[async_trait]
impl AudioSink for MpvSink {
    async fn load(&self, url: &str, volume: f32) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        let handle = state.ensure_handle(self.events.clone()).await?;
        handle.send(json!(["loadfile", url])).await?;
        let _ = handle.set_volume_pct(volume).await;
        // A leftover pause from the previous source must not swallow the
        // new stream.
        let _ = handle.send(json!(["set_property", "pause", false])).await;
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        match state.connected_handle() {
            Some(handle) => {
                handle
                    .send(json!(["set_property", "pause", paused]))
                    .await?;
                Ok(())
            }
            None => anyhow::bail!("audio output is not running"),
        }
    }

    async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(handle) = state.connected_handle() {
            handle.set_volume_pct(volume).await?;
        }
        // Without a live process the volume is applied on the next load.
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(handle) = state.connected_handle() {
            let _ = handle.send(json!(["stop"])).await;
        }
        Ok(())
    }
}

impl MpvState {
    fn process_alive(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            child.try_wait().ok().flatten().is_none()
        } else {
            false
        }
    }

    /// The live handle, or `None` when the process is absent or dead.
    fn connected_handle(&mut self) -> Option<IpcHandle> {
        if self.handle.is_some() && !self.process_alive() {
            warn!("mpv process died, dropping handle");
            self.handle = None;
        }
        self.handle.clone()
    }

    async fn ensure_handle(
        &mut self,
        events: mpsc::Sender<AudioEvent>,
    ) -> anyhow::Result<IpcHandle> {
        if let Some(handle) = self.connected_handle() {
            return Ok(handle);
        }

        let handle = self.spawn_and_connect(events).await?;

        // Fresh connection: ask mpv to push pause changes.
        let _ = handle
            .send(json!(["observe_property", OBS_PAUSE, "pause"]))
            .await;

        self.handle = Some(handle.clone());
        Ok(handle)
    }

    async fn spawn_process(&mut self) -> anyhow::Result<()> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        info!("mpv: spawning new process");
        let mpv_binary = dial_core::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(dial_core::platform::mpv_socket_arg())
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    async fn spawn_and_connect(
        &mut self,
        events: mpsc::Sender<AudioEvent>,
    ) -> anyhow::Result<IpcHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process().await?;

        // Wait for the socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");

        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, events))
    }

    #[cfg(windows)]
    async fn spawn_and_connect(
        &mut self,
        events: mpsc::Sender<AudioEvent>,
    ) -> anyhow::Result<IpcHandle> {
        self.spawn_process().await?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, events));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    events: mpsc::Sender<AudioEvent>,
) -> IpcHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // pending map: req_id → reply channel. The writer inserts, the reader
    // resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, events));

    IpcHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    events: mpsc::Sender<AudioEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"]
                                .as_str()
                                .unwrap_or("unknown error")
                                .to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else if let Some(event) = translate_event(&val) {
                    debug!("mpv reader: event {:?}", event);
                    let _ = events.send(event).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, &format!("mpv IPC read error: {}", e)).await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

/// Map an unsolicited mpv message to a typed event, or `None` for the ones
/// the session does not care about. `end-file` with reason `stop` or
/// `redirect` is our own doing and is deliberately dropped.
fn translate_event(val: &Value) -> Option<AudioEvent> {
    let name = val.get("event")?.as_str()?;
    match name {
        "property-change" => {
            if val.get("id")?.as_u64()? == OBS_PAUSE {
                let paused = val.get("data").and_then(|v| v.as_bool())?;
                Some(AudioEvent::PauseChanged(paused))
            } else {
                None
            }
        }
        "end-file" => {
            let reason = val
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            match reason {
                "error" | "network" | "quit" => Some(AudioEvent::Ended {
                    error: Some(reason.to_string()),
                }),
                "eof" => Some(AudioEvent::Ended { error: None }),
                _ => None,
            }
        }
        _ => None,
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register the reply channel before writing so the reader can
        // match the response.
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}
