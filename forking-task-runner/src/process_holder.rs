use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;

/// The live binding of a spawned child to its log file and reserved ports.
///
/// Owned by exactly one [`crate::work_item::WorkItem`] for the lifetime of one supervisor
/// activation. `destroy` must tolerate being called more than once: supervisor Cleanup,
/// `shutdown(id)`, and `stop()` can all race to tear down the same child.
#[derive(Clone)]
pub struct ProcessHolder {
    child: Arc<AsyncMutex<Child>>,
    log_file: PathBuf,
    port: u16,
    chat_port: Option<u16>,
}

impl ProcessHolder {
    pub fn new(child: Child, log_file: PathBuf, port: u16, chat_port: Option<u16>) -> Self {
        Self {
            child: Arc::new(AsyncMutex::new(child)),
            log_file,
            port,
            chat_port,
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// The primary child port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The chat-handler port, if `separateIngestionEndpoint` reserved one for this attempt.
    pub fn chat_port(&self) -> Option<u16> {
        self.chat_port
    }

    /// Requests termination of the child. Safe to call on an already-exited or already-killed
    /// child: `start_kill` failing just means there is nothing left to kill.
    pub async fn destroy(&self) {
        let mut child = self.child.lock().await;
        if let Err(err) = child.start_kill() {
            tracing::debug!(error = %err, "destroy: child already exited or untracked");
        }
    }

    /// Closes the child's stdin, the polite "please wind down" signal used by `stop()`. Returns
    /// `true` if a stdin handle was present to close, `false` if it had already been taken.
    pub async fn close_stdin(&self) -> bool {
        self.child.lock().await.stdin.take().is_some()
    }

    pub async fn wait(&self) -> std::io::Result<ExitStatus> {
        self.child.lock().await.wait().await
    }
}
