use crate::Store;
use crate::metrics_defs::{SNAPSHOT_BYTES, SNAPSHOT_FLUSH_DURATION, SNAPSHOT_FLUSH_FAILED};
use crate::snapshot::{SnapshotError, SnapshotProvider};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("snapshot task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("the persister worker is not running")]
    WorkerGone,
}

#[derive(Debug)]
enum Command {
    // Flush a snapshot outside of the normal interval.
    Flush(oneshot::Sender<Result<usize, PersistError>>),
    // Close the store, write a final snapshot and stop the worker.
    Shutdown(oneshot::Sender<Result<usize, PersistError>>),
}

/// Handle to the background worker which writes store snapshots.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::Sender<Command>,
}

impl Persister {
    /// Spawns the worker. With an interval the store is flushed periodically,
    /// otherwise only on demand and at shutdown.
    pub fn spawn(
        store: Store,
        provider: Arc<dyn SnapshotProvider>,
        interval: Option<Duration>,
    ) -> Self {
        // Channel to send commands to the worker.
        let (tx, rx) = mpsc::channel::<Command>(16);

        let worker = Worker { store, provider };
        tokio::spawn(worker.run(rx, interval));

        Persister { tx }
    }

    /// Writes a snapshot now. Returns the snapshot size in bytes.
    pub async fn flush(&self) -> Result<usize, PersistError> {
        self.request(Command::Flush).await
    }

    /// Closes the store for writes and writes a final snapshot.
    pub async fn shutdown(&self) -> Result<usize, PersistError> {
        self.request(Command::Shutdown).await
    }

    async fn request<F>(&self, make: F) -> Result<usize, PersistError>
    where
        F: FnOnce(oneshot::Sender<Result<usize, PersistError>>) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| PersistError::WorkerGone)?;
        reply_rx.await.map_err(|_| PersistError::WorkerGone)?
    }
}

struct Worker {
    store: Store,
    provider: Arc<dyn SnapshotProvider>,
}

impl Worker {
    /// Flushes run one at a time on this task, so a periodic flush never races
    /// an on-demand one.
    async fn run(self, mut rx: mpsc::Receiver<Command>, interval: Option<Duration>) {
        let mut ticker = interval.map(|period| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Flush(reply)) => {
                        let _ = reply.send(self.flush().await);
                    }
                    Some(Command::Shutdown(reply)) => {
                        self.store.close();
                        let _ = reply.send(self.flush().await);
                        break;
                    }
                    None => {
                        // Every handle is gone, write what we have and stop.
                        self.store.close();
                        if let Err(err) = self.flush().await {
                            tracing::error!(error = %err, "Final snapshot flush failed");
                        }
                        break;
                    }
                },
                _ = tick(&mut ticker) => {
                    if let Err(err) = self.flush().await {
                        tracing::error!(error = %err, "Periodic snapshot flush failed");
                    }
                }
            }
        }

        tracing::info!("Persister stopped");
    }

    async fn flush(&self) -> Result<usize, PersistError> {
        let started = Instant::now();
        let result = self.try_flush().await;
        match &result {
            Ok(bytes) => {
                histogram!(SNAPSHOT_FLUSH_DURATION).record(started.elapsed().as_secs_f64());
                histogram!(SNAPSHOT_BYTES).record(*bytes as f64);
                tracing::debug!(bytes, "Flushed store snapshot");
            }
            Err(_) => counter!(SNAPSHOT_FLUSH_FAILED).increment(1),
        }
        result
    }

    async fn try_flush(&self) -> Result<usize, PersistError> {
        let snapshot = self.store.snapshot()?;
        let provider = self.provider.clone();
        let bytes = tokio::task::spawn_blocking(move || provider.store(&snapshot)).await??;
        Ok(bytes)
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use crate::snapshot::FilesystemSnapshotProvider;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: u64,
    }

    impl Document for Counter {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn get_provider() -> (tempfile::TempDir, Arc<FilesystemSnapshotProvider>) {
        let dir = tempfile::tempdir().unwrap();
        let provider = FilesystemSnapshotProvider::new(dir.path().to_str().unwrap(), "store.bin", 3);
        (dir, Arc::new(provider))
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let (_dir, provider) = get_provider();
        let store = Store::new();
        let counters = store.collection::<Counter>("counters", None).unwrap();
        let persister = Persister::spawn(store.clone(), provider.clone(), None);

        let mut txn = store.begin().unwrap();
        counters
            .insert(
                &mut txn,
                Counter {
                    id: "a".into(),
                    value: 1,
                },
            )
            .unwrap();
        txn.commit();

        assert!(persister.flush().await.unwrap() > 0);

        let snapshot = provider.load().unwrap().unwrap();
        let restored = Store::from_snapshot(snapshot);
        let restored_counters = restored.collection::<Counter>("counters", None).unwrap();
        assert_eq!(restored_counters.get("a").map(|c| c.value), Some(1));
    }

    #[tokio::test]
    async fn test_shutdown_closes_store() {
        let (_dir, provider) = get_provider();
        let store = Store::new();
        let persister = Persister::spawn(store.clone(), provider.clone(), None);

        persister.shutdown().await.unwrap();
        assert!(!store.is_open());
        assert!(provider.load().unwrap().is_some());

        // The worker is gone after shutdown
        assert!(matches!(
            persister.flush().await,
            Err(PersistError::WorkerGone)
        ));
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let (_dir, provider) = get_provider();
        let store = Store::new();
        let _persister = Persister::spawn(
            store.clone(),
            provider.clone(),
            Some(Duration::from_millis(50)),
        );

        assert!(provider.load().unwrap().is_none());
        for _ in 0..100 {
            if provider.load().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(provider.load().unwrap().is_some());
    }
}
