//! Bridge to the out-of-process move-generating opponent.
//!
//! Speaks the line-oriented UCI protocol over the subprocess pipes. One
//! bridge owns one subprocess for the lifetime of a session; the registry
//! closes it on teardown, and `kill_on_drop` backstops any path that never
//! reaches `close`.

use derive_more::{Display, Error};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;

/// Where the bridge is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Spawned, handshake not finished.
    NotStarted,
    /// Handshake done, no search outstanding.
    Ready,
    /// One search outstanding.
    Searching,
    /// Shut down; no further searches are possible.
    Closed,
}

/// Bridge failures, already separated into the two user-visible kinds.
#[derive(Debug, Display, Error)]
pub enum EngineError {
    /// The subprocess could not be started, broke protocol, or went away.
    #[display("engine unavailable: {reason}")]
    Unavailable {
        /// Detail for the log.
        reason: String,
    },
    /// A search exceeded its budget plus grace.
    #[display("engine search exceeded its time budget")]
    Timeout,
}

#[derive(Debug)]
struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// Handle to one engine subprocess.
#[derive(Debug)]
pub struct EngineBridge {
    io: Option<BridgeIo>,
    state: ProtocolState,
    grace: Duration,
    stale_search: bool,
}

impl EngineBridge {
    /// Spawns the engine and runs the `uci`/`isready`/`ucinewgame`
    /// handshake. On any failure the subprocess is torn down and the bridge
    /// is not returned.
    #[instrument(skip(config), fields(command = %config.command()))]
    pub async fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(config.command())
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable {
                reason: format!("failed to spawn '{}': {e}", config.command()),
            })?;
        let stdin = child.stdin.take().ok_or_else(|| EngineError::Unavailable {
            reason: "engine stdin was not captured".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::Unavailable {
            reason: "engine stdout was not captured".into(),
        })?;
        let mut bridge = Self {
            io: Some(BridgeIo {
                child,
                stdin,
                lines: BufReader::new(stdout).lines(),
            }),
            state: ProtocolState::NotStarted,
            grace: config.search_grace(),
            stale_search: false,
        };
        if let Err(err) = bridge.handshake(config.handshake_budget()).await {
            bridge.close().await;
            return Err(err);
        }
        bridge.state = ProtocolState::Ready;
        info!("engine handshake complete");
        Ok(bridge)
    }

    async fn handshake(&mut self, budget: Duration) -> Result<(), EngineError> {
        self.send("uci").await?;
        self.expect_line("uciok", budget).await?;
        self.send("isready").await?;
        self.expect_line("readyok", budget).await?;
        self.send("ucinewgame").await
    }

    /// Current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Asks for the best move from `fen`, waiting at most the budget plus
    /// the configured grace.
    ///
    /// On timeout the subprocess is left alive: a `stop` is sent on a
    /// best-effort basis and the late `bestmove` is drained before the next
    /// search, so one slow reply never poisons the following one.
    #[instrument(skip(self, fen), fields(budget_ms = budget.as_millis() as u64))]
    pub async fn best_move(&mut self, fen: &str, budget: Duration) -> Result<String, EngineError> {
        if self.state != ProtocolState::Ready {
            return Err(EngineError::Unavailable {
                reason: format!("bridge is not ready ({:?})", self.state),
            });
        }
        if self.stale_search {
            match self.await_best_move(self.grace).await? {
                Some(late) => {
                    debug!(%late, "drained the abandoned search");
                    self.stale_search = false;
                }
                None => {
                    return Err(EngineError::Unavailable {
                        reason: "engine is still busy with an abandoned search".into(),
                    });
                }
            }
        }
        self.state = ProtocolState::Searching;
        let result = self.run_search(fen, budget).await;
        if self.state == ProtocolState::Searching {
            self.state = if self.io.is_some() {
                ProtocolState::Ready
            } else {
                ProtocolState::Closed
            };
        }
        result
    }

    async fn run_search(&mut self, fen: &str, budget: Duration) -> Result<String, EngineError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go movetime {}", budget.as_millis())).await?;
        match self.await_best_move(budget + self.grace).await? {
            Some(mv) => {
                debug!(%mv, "engine answered");
                Ok(mv)
            }
            None => {
                warn!("engine exceeded its budget; leaving it to finish on its own");
                let _ = self.send("stop").await;
                self.stale_search = true;
                Err(EngineError::Timeout)
            }
        }
    }

    /// Shuts the subprocess down. Idempotent; safe to call on a bridge whose
    /// handshake failed.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        if let Some(io) = self.io.take() {
            let BridgeIo {
                mut child,
                mut stdin,
                lines,
            } = io;
            let _ = stdin.write_all(b"quit\n").await;
            let _ = stdin.flush().await;
            drop(stdin);
            drop(lines);
            if timeout(Duration::from_millis(500), child.wait()).await.is_err() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            info!("engine subprocess shut down");
        }
        self.state = ProtocolState::Closed;
    }

    async fn send(&mut self, line: &str) -> Result<(), EngineError> {
        let Some(io) = self.io.as_mut() else {
            return Err(EngineError::Unavailable {
                reason: "bridge is closed".into(),
            });
        };
        let outcome = async {
            io.stdin.write_all(line.as_bytes()).await?;
            io.stdin.write_all(b"\n").await?;
            io.stdin.flush().await
        }
        .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = ProtocolState::Closed;
                Err(EngineError::Unavailable {
                    reason: format!("write to engine failed: {e}"),
                })
            }
        }
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        let Some(io) = self.io.as_mut() else {
            return Err(EngineError::Unavailable {
                reason: "bridge is closed".into(),
            });
        };
        match io.lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => {
                self.state = ProtocolState::Closed;
                Err(EngineError::Unavailable {
                    reason: "engine closed its output".into(),
                })
            }
            Err(e) => {
                self.state = ProtocolState::Closed;
                Err(EngineError::Unavailable {
                    reason: format!("read from engine failed: {e}"),
                })
            }
        }
    }

    /// Reads lines until `token`, bounded by `budget`.
    async fn expect_line(&mut self, token: &str, budget: Duration) -> Result<(), EngineError> {
        timeout(budget, async {
            loop {
                if self.next_line().await?.trim() == token {
                    return Ok(());
                }
            }
        })
        .await
        .map_err(|_| EngineError::Unavailable {
            reason: format!("engine never sent {token}"),
        })?
    }

    /// Reads lines until a `bestmove`, returning `None` on timeout.
    async fn await_best_move(&mut self, budget: Duration) -> Result<Option<String>, EngineError> {
        let wait = timeout(budget, async {
            loop {
                let line = self.next_line().await?;
                if let Some(rest) = line.strip_prefix("bestmove") {
                    let mv = rest.split_whitespace().next().unwrap_or_default();
                    return Ok(mv.to_string());
                }
            }
        })
        .await;
        match wait {
            Ok(Ok(mv)) => Ok(Some(mv)),
            Ok(Err(err)) => Err(err),
            Err(_) => Ok(None),
        }
    }
}
