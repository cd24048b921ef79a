//! The session state machine.
//!
//! `Idle --submit--> Pending --frame complete--> Idle`;
//! `Pending --cancel--> Idle` (side effect: the out-of-band interrupt is
//! sent); `* --quit--> Closed` (terminal). The pending state lives in the
//! connection's receive slot, so a second submit is refused as busy and a
//! stale frame after cancellation finds nothing to resolve.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EvaluatorConfig;
use crate::transport::connection::{Connection, RecvState};
use crate::transport::handshake::PortScanner;
use crate::wire::decoder::EvalOutcome;
use crate::wire::framing::FrameParser;
use crate::wire::request::{encode_eval, encode_init, ModuleRef, Sentinel};
use crate::{AppError, Result};

/// Out-of-band interrupt bytes the evaluator's runtime recognizes as
/// "abort the current evaluation".
pub const OOB_INTERRUPT: [u8; 3] = [0xFF, 0xF4, 0x04];

/// Loopback host used after a spawned evaluator announces its port.
const LOOPBACK_HOST: &str = "127.0.0.1";

/// Completion handle for one submitted request.
///
/// Resolves exactly once: with the decoded outcome, a cancellation
/// outcome, or the transport error that terminated the session.
#[derive(Debug)]
pub struct EvalHandle {
    rx: oneshot::Receiver<Result<EvalOutcome>>,
}

impl EvalHandle {
    /// Wait for the request to resolve.
    ///
    /// This is the blocking convenience; it should not be used for
    /// long-running evaluations that may need cancellation. Callers
    /// wanting a timeout race this future against a timer and invoke
    /// [`ReplSession::cancel`] on expiry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the session closed before the
    /// request resolved, or the transport/decode error that failed it.
    pub async fn wait(self) -> Result<EvalOutcome> {
        self.rx
            .await
            .map_err(|_| AppError::Transport("session closed before completion".into()))?
    }
}

/// Client session coordinating one evaluator connection and its single
/// in-flight request.
pub struct ReplSession {
    conn: Connection,
    module: ModuleRef,
}

impl std::fmt::Debug for ReplSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplSession")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

impl ReplSession {
    /// Connect to an already-listening evaluator.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the connection cannot be
    /// established.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let conn = Connection::connect_remote(host, port).await?;
        Ok(Self {
            conn,
            module: ModuleRef::TopLevel,
        })
    }

    /// Spawn a local evaluator, discover its dynamically chosen port from
    /// early process output, and connect to it.
    ///
    /// The spawned process is linked to the resulting session: `quit`
    /// cascade-terminates it exactly once. The port wait is bounded by the
    /// configured startup timeout; the detector itself would wait forever.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` — the evaluator binary cannot be located.
    /// - `AppError::Transport` — spawn failure, process exit before the
    ///   announcement, startup timeout, or connect failure.
    pub async fn spawn(config: &EvaluatorConfig) -> Result<Self> {
        let (tx, rx) = oneshot::channel();
        let scanner = PortScanner::new()?;
        let pipe = Connection::spawn_local_with(
            config,
            RecvState::AwaitPort {
                scanner,
                notify: Some(tx),
            },
        )?;

        let startup = Duration::from_secs(config.startup_timeout_seconds);
        let port = match timeout(startup, rx).await {
            Ok(Ok(port)) => port,
            Ok(Err(_)) => {
                pipe.close().await;
                return Err(AppError::Transport(
                    "evaluator exited before announcing its port".into(),
                ));
            }
            Err(_) => {
                pipe.close().await;
                return Err(AppError::Transport(format!(
                    "startup timeout: no port announcement within {}s",
                    config.startup_timeout_seconds
                )));
            }
        };

        info!(port, "evaluator announced its listening port");

        let conn = match Connection::connect_remote(LOOPBACK_HOST, port).await {
            Ok(conn) => conn,
            Err(err) => {
                pipe.close().await;
                return Err(err);
            }
        };
        conn.adopt_spawn(&pipe).await;

        Ok(Self {
            conn,
            module: ModuleRef::TopLevel,
        })
    }

    /// Spawn a local evaluator and drive it directly over its stdio pipes,
    /// without the network handshake.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the evaluator binary cannot be
    /// located, or `AppError::Transport` for any other spawn failure.
    pub fn spawn_pipe(config: &EvaluatorConfig) -> Result<Self> {
        let conn = Connection::spawn_local(config)?;
        Ok(Self {
            conn,
            module: ModuleRef::TopLevel,
        })
    }

    /// The session's current module context.
    #[must_use]
    pub fn module_context(&self) -> &ModuleRef {
        &self.module
    }

    /// Replace the session's module context.
    pub fn set_module_context(&mut self, module: ModuleRef) {
        self.module = module;
    }

    /// Submit an evaluation request.
    ///
    /// Generates a fresh sentinel, encodes the request line, installs a
    /// fresh frame parser (clearing any prior buffer) as the sole receive
    /// handler, and sends the request.
    ///
    /// # Errors
    ///
    /// - `AppError::Busy` — a request is already pending.
    /// - `AppError::Transport` — the session is closed or the send failed.
    pub async fn submit(&self, expr: &str, stdin: &str, module: &ModuleRef) -> Result<EvalHandle> {
        let sentinel = Sentinel::fresh();
        let parser = FrameParser::sentinel(sentinel.as_str())?;
        let request = encode_eval(&sentinel, expr, stdin, module);
        debug!(sentinel = %sentinel, module = %module, "submitting evaluation");
        self.begin(parser, request).await
    }

    /// Submit an init-phase request: the expression reaches the
    /// sentinel-tagging primitive verbatim.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::submit`].
    pub async fn submit_init(&self, expr: &str) -> Result<EvalHandle> {
        let sentinel = Sentinel::fresh();
        let parser = FrameParser::sentinel(sentinel.as_str())?;
        let request = encode_init(&sentinel, expr);
        debug!(sentinel = %sentinel, "submitting init-phase request");
        self.begin(parser, request).await
    }

    /// Submit a raw expression under the legacy plain framing, for
    /// evaluators without the sentinel-tagging primitive.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::submit`].
    pub async fn submit_legacy(&self, expr: &str) -> Result<EvalHandle> {
        let parser = FrameParser::plain()?;
        let request = format!("{expr}\n");
        debug!("submitting legacy-framed evaluation");
        self.begin(parser, request).await
    }

    /// Submit in the session's module context and wait for the outcome.
    ///
    /// A convenience for short evaluations; not suitable where
    /// cancellation or a timeout is needed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::submit`] and [`EvalHandle::wait`].
    pub async fn eval(&self, expr: &str, stdin: &str) -> Result<EvalOutcome> {
        let module = self.module.clone();
        self.submit(expr, stdin, &module).await?.wait().await
    }

    /// Cancel the pending request.
    ///
    /// Sends the out-of-band interrupt, commits to idle immediately, and
    /// resolves the pending completion with [`EvalOutcome::Cancelled`]
    /// without waiting for the evaluator. A frame that later arrives for
    /// the cancelled sentinel is ignored.
    ///
    /// # Errors
    ///
    /// - `AppError::CancelNoop` — no request is pending.
    /// - `AppError::Transport` — the interrupt bytes could not be sent;
    ///   the cancellation outcome is still resolved.
    pub async fn cancel(&self) -> Result<()> {
        let Some(tx) = self.conn.take_pending().await else {
            return Err(AppError::CancelNoop("nothing pending".into()));
        };

        let sent = self.conn.send(Bytes::from_static(&OOB_INTERRUPT)).await;
        if let Err(err) = &sent {
            warn!(%err, "failed to send interrupt, resolving cancellation anyway");
        }
        let _ = tx.send(Ok(EvalOutcome::Cancelled));
        sent
    }

    /// Close the session: tear down the transport and cascade-terminate a
    /// spawn-linked evaluator. Idempotent.
    pub async fn quit(&self) {
        self.conn.close().await;
    }

    async fn begin(&self, parser: FrameParser, request: String) -> Result<EvalHandle> {
        if self.conn.is_closed() {
            return Err(AppError::Transport("session is closed".into()));
        }

        let (tx, rx) = oneshot::channel();
        self.conn
            .try_begin(RecvState::AwaitFrame {
                parser,
                notify: Some(tx),
            })
            .await?;

        if let Err(err) = self.conn.send(Bytes::from(request)).await {
            self.conn.abort_pending().await;
            return Err(err);
        }

        Ok(EvalHandle { rx })
    }
}
