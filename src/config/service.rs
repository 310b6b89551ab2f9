//! Configuration service: the single owner of the live [`Configuration`].
//!
//! Callers never touch the configuration directly. They hold a cloneable
//! [`ConfigHandle`] and submit mutations over an `mpsc` channel; the service
//! task applies them one at a time, in the order received, and acknowledges
//! each through a [`Waiter`].
//!
//! Applying a mutation and persisting it are separate steps. A caller that
//! needs durability waits for the mutation, then calls [`ConfigHandle::save`].
//! The service never saves on its own, not even on shutdown.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;

use super::Configuration;

/// Pending commands the service will queue before senders wait.
const COMMAND_BUFFER: usize = 32;

/// A deferred change to the configuration. Returning `Err` discards the
/// change in full.
pub type Mutation = Box<dyn FnOnce(&mut Configuration) -> Result<(), AppError> + Send>;

// ── Commands ─────────────────────────────────────────────────────────────────

enum ConfigCommand {
    Modify {
        mutation: Mutation,
        done: oneshot::Sender<Result<(), AppError>>,
    },
    Save {
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    RawCopy {
        reply: oneshot::Sender<Configuration>,
    },
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Cloneable sender side of the service.
#[derive(Clone)]
pub struct ConfigHandle {
    cmd_tx: mpsc::Sender<ConfigCommand>,
}

impl ConfigHandle {
    /// Queue `f` for application and return a [`Waiter`] for it.
    ///
    /// Fails only if the service is no longer running.
    pub async fn modify<F>(&self, f: F) -> Result<Waiter, AppError>
    where
        F: FnOnce(&mut Configuration) -> Result<(), AppError> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        self.cmd_tx
            .send(ConfigCommand::Modify { mutation: Box::new(f), done })
            .await
            .map_err(|_| AppError::Config("config service is not running".into()))?;
        Ok(Waiter { rx })
    }

    /// Write the current in-memory configuration to disk.
    pub async fn save(&self) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ConfigCommand::Save { reply })
            .await
            .map_err(|_| AppError::Config("config service is not running".into()))?;
        rx.await
            .map_err(|_| AppError::Config("config service stopped before saving".into()))?
    }

    /// Snapshot of the current in-memory configuration.
    pub async fn raw_copy(&self) -> Result<Configuration, AppError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ConfigCommand::RawCopy { reply })
            .await
            .map_err(|_| AppError::Config("config service is not running".into()))?;
        rx.await
            .map_err(|_| AppError::Config("config service stopped before replying".into()))
    }
}

/// Completion signal for one submitted mutation.
#[must_use = "a mutation is only known to be applied after `wait` returns"]
pub struct Waiter {
    rx: oneshot::Receiver<Result<(), AppError>>,
}

impl Waiter {
    /// Resolve once the mutation has been applied in memory (not yet saved),
    /// yielding the mutation's own result.
    pub async fn wait(self) -> Result<(), AppError> {
        self.rx
            .await
            .map_err(|_| AppError::Config("config service stopped before applying the change".into()))?
    }
}

// ── Service ──────────────────────────────────────────────────────────────────

/// The serving loop. Created by [`ConfigService::new`] and driven by
/// [`ConfigService::run`], usually through [`spawn`].
pub struct ConfigService {
    path: PathBuf,
    cfg: Configuration,
    cmd_rx: mpsc::Receiver<ConfigCommand>,
    shutdown: CancellationToken,
}

impl ConfigService {
    pub fn new(path: PathBuf, cfg: Configuration, shutdown: CancellationToken) -> (Self, ConfigHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let service = Self {
            path,
            cfg,
            cmd_rx,
            shutdown,
        };
        (service, ConfigHandle { cmd_tx })
    }

    /// Serve commands until `shutdown` is cancelled or every handle is gone.
    pub async fn run(mut self) {
        info!(path = %self.path.display(), "config service running");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("config service shutting down");
                    break;
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => {
                            debug!("all config handles dropped, service exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, cmd: ConfigCommand) {
        match cmd {
            ConfigCommand::Modify { mutation, done } => {
                // Apply to a copy so a failing mutation leaves no partial change.
                let mut next = self.cfg.clone();
                let result = run_blocking(move || mutation(&mut next).map(|()| next)).await;
                let result = match result {
                    Ok(next) => {
                        self.cfg = next;
                        debug!("config mutation applied");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "config mutation rejected");
                        Err(e)
                    }
                };
                let _ = done.send(result);
            }
            ConfigCommand::Save { reply } => {
                let path = self.path.clone();
                let cfg = self.cfg.clone();
                let result = run_blocking(move || save_atomic(&path, &cfg)).await;
                match &result {
                    Ok(()) => info!(path = %self.path.display(), "config saved"),
                    Err(e) => warn!(path = %self.path.display(), error = %e, "config save failed"),
                }
                let _ = reply.send(result);
            }
            ConfigCommand::RawCopy { reply } => {
                let _ = reply.send(self.cfg.clone());
            }
        }
    }
}

/// Spawn the service on the current runtime.
pub fn spawn(
    path: PathBuf,
    cfg: Configuration,
    shutdown: CancellationToken,
) -> (ConfigHandle, JoinHandle<()>) {
    let (service, handle) = ConfigService::new(path, cfg, shutdown);
    (handle, tokio::spawn(service.run()))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Run file I/O or password hashing off the async workers.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(AppError::Io(e.into())))
}

/// Replace `path` with the serialized configuration via temp file + rename.
/// The temp file is created 0600, which the final file keeps.
fn save_atomic(path: &Path, cfg: &Configuration) -> Result<(), AppError> {
    let text = toml::to_string_pretty(cfg)
        .map_err(|e| AppError::Config(format!("cannot serialize config: {e}")))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path.display();

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Config(format!("cannot create temp file for {name}: {e}")))?;
    temp.write_all(text.as_bytes())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| AppError::Config(format!("cannot write {name}: {e}")))?;
    temp.persist(path)
        .map_err(|e| AppError::Config(format!("cannot replace {name}: {}", e.error)))?;
    Ok(())
}
