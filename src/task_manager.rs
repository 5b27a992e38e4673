//! Owns the background tasks of server mode.
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type NamedHandle = (&'static str, JoinHandle<()>);

/// Spawns named tasks, hands out shutdown receivers and, on shutdown,
/// signals every task and waits for it to finish.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<NamedHandle>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
    }

    /// A receiver that changes once shutdown starts.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signals shutdown and waits up to `grace` for every task.
    ///
    /// Returns the names of tasks that panicked or did not stop in time.
    pub async fn shutdown(self, grace: Duration) -> Vec<&'static str> {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<NamedHandle> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        info!(
            "TaskManager shutting down. Waiting for {} tasks to complete...",
            handles.len()
        );

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let results = match tokio::time::timeout(grace, join_all(handles)).await {
            Ok(results) => results,
            Err(_) => {
                warn!("Tasks did not stop within {:?}, aborting", grace);
                for abort in &aborts {
                    abort.abort();
                }
                return names
                    .into_iter()
                    .zip(aborts)
                    .filter(|(_, abort)| !abort.is_finished())
                    .map(|(name, _)| name)
                    .collect();
            }
        };

        let mut failed = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name = name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name = name, error = %e, "Task panicked during shutdown.");
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            info!("All tasks shut down gracefully.");
        }
        failed
    }
}
