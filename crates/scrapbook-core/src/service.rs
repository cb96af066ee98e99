//! Actor owning the session on a multi-threaded runtime.
//!
//! One task owns the [`Session`]. API requests arrive over an mpsc channel
//! with a oneshot reply and timer firings over the scheduler channel; the
//! task handles exactly one of them at a time.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{CoreError, Result};
use crate::gateway::{self, ApiRequest, ApiResponse};
use crate::session::Session;
use crate::timer::{TimerFired, TokioScheduler};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Request(ApiRequest, oneshot::Sender<ApiResponse>),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Cloneable handle to the running session.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Request(request, _) => write!(f, "Request({:?} {})", request.method, request.path),
            Command::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

/// Build the session with a tokio scheduler, start it and spawn the actor.
///
/// Must be called inside a tokio runtime.
///
/// # Errors
/// Propagates failures from `make` and from [`Session::start`].
pub fn spawn<F>(make: F) -> Result<(ServiceHandle, JoinHandle<()>)>
where
    F: FnOnce(TokioScheduler) -> Result<Session>,
{
    let (scheduler, timers) = TokioScheduler::channel();
    let mut session = make(scheduler)?;
    session.start()?;
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run(session, rx, timers));
    Ok((ServiceHandle { tx }, task))
}

async fn run(
    mut session: Session,
    mut commands: mpsc::Receiver<Command>,
    mut timers: mpsc::UnboundedReceiver<TimerFired>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Request(request, reply)) => {
                    let response = handle_request(&mut session, request);
                    let _ = reply.send(response);
                }
                Some(Command::Shutdown(reply)) => {
                    let _ = reply.send(session.shutdown());
                    break;
                }
                None => {
                    if let Err(e) = session.shutdown() {
                        tracing::error!(error = %e, "failed to shut down session");
                    }
                    break;
                }
            },
            Some(fired) = timers.recv() => handle_timer(&mut session, fired),
        }
    }
    tracing::info!("session stopped");
}

fn handle_request(session: &mut Session, request: ApiRequest) -> ApiResponse {
    let path = request.path.clone();
    match catch_unwind(AssertUnwindSafe(|| gateway::dispatch(session, request))) {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(path = %path, panic = %panic_message(&*panic), "request handler panicked");
            ApiResponse::error(500, "Internal server error")
        }
    }
}

fn handle_timer(session: &mut Session, fired: TimerFired) {
    match catch_unwind(AssertUnwindSafe(|| session.on_timer(fired))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(kind = ?fired.kind, error = %e, "timer handling failed"),
        Err(panic) => {
            tracing::error!(kind = ?fired.kind, panic = %panic_message(&*panic), "timer handler panicked")
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

impl ServiceHandle {
    /// Run one request. A stopped service answers 500.
    pub async fn call(&self, request: ApiRequest) -> ApiResponse {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::Request(request, reply)).await.is_err() {
            return ApiResponse::error(500, "service stopped");
        }
        response
            .await
            .unwrap_or_else(|_| ApiResponse::error(500, "service stopped"))
    }

    /// Cancel timers, persist settings and stop the actor.
    ///
    /// # Errors
    /// Returns the session's shutdown error, or an error if the actor has
    /// already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(reply))
            .await
            .map_err(|_| CoreError::Custom("service already stopped".into()))?;
        done.await
            .map_err(|_| CoreError::Custom("service stopped during shutdown".into()))?
    }
}
