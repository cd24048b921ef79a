//! Evaluator connection: spawned-process pipes or a direct TCP socket.
//!
//! A connection owns a writer task (outbound bytes) and one receiver task
//! per inbound stream. Every receive event is dispatched against the
//! connection's single receive slot, a tagged state
//! (`Idle | AwaitPort | AwaitFrame`): installing a new state is what takes
//! over the channel for a new request and silently discards bytes still
//! arriving for an old, cancelled, or completed one.
//!
//! Teardown is idempotent. A spawn-linked child process is killed exactly
//! once, and the process's pipe tasks are kept alive after the session
//! switches to the socket channel so the evaluator never sees a premature
//! EOF on its stdin.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::EvaluatorConfig;
use crate::transport::handshake::PortScanner;
use crate::wire::decoder::{decode_payload, EvalOutcome};
use crate::wire::framing::FrameParser;
use crate::{AppError, Result};

/// Outbound channel depth; requests are single lines, so this is ample.
const OUTBOUND_DEPTH: usize = 32;

/// Receive scratch capacity per read.
const READ_CHUNK_CAPACITY: usize = 8 * 1024;

/// State of the receive slot, dispatched on every receive event.
///
/// Exactly one of these is installed at a time; the variant carries the
/// per-request bindings, so "only one active frame" is a property of the
/// type rather than of scattered flags.
pub(crate) enum RecvState {
    /// No pending request; received bytes are dropped.
    Idle,
    /// Waiting for a spawned evaluator's port announcement.
    AwaitPort {
        /// One-shot announcement scanner.
        scanner: PortScanner,
        /// Resolved with the announced port.
        notify: Option<oneshot::Sender<u16>>,
    },
    /// Waiting for one framed response.
    AwaitFrame {
        /// The request's frame parser, owning the accumulated buffer.
        parser: FrameParser,
        /// Resolved exactly once with the request outcome.
        notify: Option<oneshot::Sender<Result<EvalOutcome>>>,
    },
}

/// Keep-alive handles for a spawned process's pipe transport after the
/// session has switched to the socket channel.
struct SpawnPipes {
    cancel: CancellationToken,
    _outbound: mpsc::Sender<Bytes>,
}

/// A byte-stream channel to the evaluator.
pub struct Connection {
    outbound: mpsc::Sender<Bytes>,
    recv: Arc<Mutex<RecvState>>,
    cancel: CancellationToken,
    child: Arc<Mutex<Option<Child>>>,
    spawn_pipes: Arc<Mutex<Option<SpawnPipes>>>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Spawn a local evaluator process and wire its combined output to the
    /// receive slot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the evaluator binary cannot be
    /// located, and `AppError::Transport` for any other spawn failure;
    /// launch problems fail fast, never hang.
    pub fn spawn_local(config: &EvaluatorConfig) -> Result<Self> {
        Self::spawn_local_with(config, RecvState::Idle)
    }

    /// Spawn a local evaluator with an initial receive state already
    /// installed, so no early output can race past the dispatcher.
    pub(crate) fn spawn_local_with(config: &EvaluatorConfig, initial: RecvState) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::Config(format!(
                    "evaluator binary `{}` not found: {err}",
                    config.command
                ))
            } else {
                AppError::Transport(format!("failed to spawn evaluator: {err}"))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Transport("failed to capture evaluator stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Transport("failed to capture evaluator stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Transport("failed to capture evaluator stderr".into()))?;

        let recv = Arc::new(Mutex::new(initial));
        let cancel = CancellationToken::new();
        let (outbound, rx) = mpsc::channel(OUTBOUND_DEPTH);

        tokio::spawn(run_writer(stdin, rx, cancel.clone()));
        tokio::spawn(run_receiver("stdout", stdout, Arc::clone(&recv), cancel.clone(), true));
        tokio::spawn(run_receiver("stderr", stderr, Arc::clone(&recv), cancel.clone(), false));

        debug!(command = %config.command, "evaluator process spawned");

        Ok(Self {
            outbound,
            recv,
            cancel,
            child: Arc::new(Mutex::new(Some(child))),
            spawn_pipes: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open a TCP byte stream to an already-listening evaluator.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the connection cannot be
    /// established.
    pub async fn connect_remote(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await.map_err(|err| {
            AppError::Transport(format!("connect to {host}:{port} failed: {err}"))
        })?;
        let (read_half, write_half) = stream.into_split();

        let recv = Arc::new(Mutex::new(RecvState::Idle));
        let cancel = CancellationToken::new();
        let (outbound, rx) = mpsc::channel(OUTBOUND_DEPTH);

        tokio::spawn(run_writer(write_half, rx, cancel.clone()));
        tokio::spawn(run_receiver("socket", read_half, Arc::clone(&recv), cancel.clone(), true));

        debug!(host, port, "connected to evaluator");

        Ok(Self {
            outbound,
            recv,
            cancel,
            child: Arc::new(Mutex::new(None)),
            spawn_pipes: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Queue bytes for the writer task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` when the connection is closed.
    pub async fn send(&self, bytes: Bytes) -> Result<()> {
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| AppError::Transport("connection closed".into()))
    }

    /// Whether `close` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Install a request's receive state, failing if one is already
    /// pending.
    pub(crate) async fn try_begin(&self, state: RecvState) -> Result<()> {
        let mut slot = self.recv.lock().await;
        if matches!(*slot, RecvState::AwaitFrame { .. }) {
            return Err(AppError::Busy("an evaluation is already pending".into()));
        }
        *slot = state;
        Ok(())
    }

    /// Take a pending request's completion, leaving the slot idle.
    ///
    /// Returns `None` when no request is pending. Taking the slot is what
    /// discards the request's accumulated buffer and makes any frame that
    /// later arrives for its sentinel stale.
    pub(crate) async fn take_pending(&self) -> Option<oneshot::Sender<Result<EvalOutcome>>> {
        let mut slot = self.recv.lock().await;
        if matches!(*slot, RecvState::AwaitFrame { .. }) {
            let prior = std::mem::replace(&mut *slot, RecvState::Idle);
            if let RecvState::AwaitFrame { notify, .. } = prior {
                return notify;
            }
        }
        None
    }

    /// Reset the slot to idle, dropping any pending binding.
    pub(crate) async fn abort_pending(&self) {
        *self.recv.lock().await = RecvState::Idle;
    }

    /// Adopt another connection's spawned child so teardown cascades
    /// through this connection, keeping the donor's pipe tasks alive.
    pub(crate) async fn adopt_spawn(&self, pipe: &Connection) {
        let taken = pipe.child.lock().await.take();
        if let Some(child) = taken {
            *self.child.lock().await = Some(child);
            *self.spawn_pipes.lock().await = Some(SpawnPipes {
                cancel: pipe.cancel.clone(),
                _outbound: pipe.outbound.clone(),
            });
        }
    }

    /// Close the connection: stop the I/O tasks, resolve any pending
    /// request with a transport error, and cascade-terminate a linked
    /// spawned process exactly once. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        fail_pending(&self.recv, "session closed").await;

        if let Some(pipes) = self.spawn_pipes.lock().await.take() {
            pipes.cancel.cancel();
        }

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to kill evaluator process");
            } else {
                debug!("evaluator process terminated");
            }
        }
    }
}

// ── I/O tasks ─────────────────────────────────────────────────────────────────

/// Writer task: drains queued outbound bytes into the channel sink.
async fn run_writer<W>(mut sink: W, mut rx: mpsc::Receiver<Bytes>, cancel: CancellationToken)
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("transport writer: cancellation received, stopping");
                break;
            }

            msg = rx.recv() => {
                let Some(bytes) = msg else {
                    debug!("transport writer: outbound channel closed, stopping");
                    break;
                };
                if let Err(err) = sink.write_all(&bytes).await {
                    warn!(%err, "transport writer: write failed, stopping");
                    break;
                }
                if let Err(err) = sink.flush().await {
                    warn!(%err, "transport writer: flush failed, stopping");
                    break;
                }
            }
        }
    }
}

/// Receiver task: reads raw chunks and dispatches each against the receive
/// slot. On EOF or stream error, a pending request is resolved with a
/// transport error when the stream is fatal (stderr of a spawned process is
/// not: the evaluator may close it independently).
async fn run_receiver<R>(
    channel: &'static str,
    mut source: R,
    recv: Arc<Mutex<RecvState>>,
    cancel: CancellationToken,
    fatal_eof: bool,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut scratch = BytesMut::with_capacity(READ_CHUNK_CAPACITY);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(channel, "transport receiver: cancellation received, stopping");
                break;
            }

            read = source.read_buf(&mut scratch) => {
                match read {
                    Ok(0) => {
                        debug!(channel, "transport receiver: stream closed");
                        if fatal_eof {
                            fail_pending(&recv, "evaluator stream closed").await;
                        }
                        break;
                    }
                    Ok(_) => {
                        let chunk = scratch.split().freeze();
                        dispatch(&recv, &chunk).await;
                    }
                    Err(err) => {
                        warn!(channel, %err, "transport receiver: stream error, stopping");
                        if fatal_eof {
                            fail_pending(&recv, &format!("stream error: {err}")).await;
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Dispatch one receive event against the slot.
///
/// The state is taken out, advanced, and put back, so a completed or
/// failed request always leaves the slot idle.
async fn dispatch(recv: &Arc<Mutex<RecvState>>, chunk: &[u8]) {
    let mut slot = recv.lock().await;
    let state = std::mem::replace(&mut *slot, RecvState::Idle);

    *slot = match state {
        RecvState::Idle => {
            trace!(len = chunk.len(), "no pending request, dropping received bytes");
            RecvState::Idle
        }
        RecvState::AwaitPort {
            mut scanner,
            mut notify,
        } => {
            if let Some(port) = scanner.push(chunk) {
                if let Some(tx) = notify.take() {
                    let _ = tx.send(port);
                }
                RecvState::Idle
            } else {
                RecvState::AwaitPort { scanner, notify }
            }
        }
        RecvState::AwaitFrame {
            mut parser,
            mut notify,
        } => match parser.feed(chunk) {
            Ok(None) => RecvState::AwaitFrame { parser, notify },
            Ok(Some(payload)) => {
                let outcome = decode_payload(parser.payload_kind(), &payload);
                if let Some(tx) = notify.take() {
                    let _ = tx.send(Ok(outcome));
                }
                RecvState::Idle
            }
            Err(err) => {
                if let Some(tx) = notify.take() {
                    let _ = tx.send(Err(err));
                }
                RecvState::Idle
            }
        },
    };
}

/// Resolve a pending request with a transport failure and reset the slot.
///
/// A pending port wait is resolved by dropping its sender; the waiter sees
/// the closed channel and reports the spawn failure.
async fn fail_pending(recv: &Arc<Mutex<RecvState>>, reason: &str) {
    let prior = std::mem::replace(&mut *recv.lock().await, RecvState::Idle);
    match prior {
        RecvState::AwaitFrame {
            notify: Some(tx), ..
        } => {
            let _ = tx.send(Err(AppError::Transport(reason.into())));
        }
        RecvState::AwaitPort {
            notify: Some(tx), ..
        } => {
            drop(tx);
        }
        _ => {}
    }
}
