use crate::error::KeeperError;
use engine_core::{error::StoreError, state::LeaseStore};
use model::{ContinuationToken, Lease};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

const MAILBOX_CAPACITY: usize = 16;

type Reply = oneshot::Sender<Result<Lease, StoreError>>;

/// Requests accepted by a [`LeaseKeeper`]. Each one is exactly one store write.
#[derive(Debug)]
pub enum KeeperMsg {
    Renew {
        reply: Reply,
    },
    Checkpoint {
        continuation: ContinuationToken,
        reply: Reply,
    },
    /// Terminal: the keeper exits once the release succeeds.
    Release {
        reply: Reply,
    },
}

/// Sole writer of one partition's lease.
///
/// The renewer and the feed processor never touch the store directly; they
/// send requests here and the keeper applies them one at a time against the
/// latest concurrency token. A conflict therefore always means a foreign
/// writer.
pub struct LeaseKeeper {
    store: Arc<dyn LeaseStore>,
    lease: Lease,
    published: watch::Sender<Lease>,
}

impl LeaseKeeper {
    async fn run(mut self, mut rx: mpsc::Receiver<KeeperMsg>) -> Lease {
        while let Some(msg) = rx.recv().await {
            match msg {
                KeeperMsg::Renew { reply } => {
                    let result = self.store.renew(&self.lease).await;
                    self.apply(&result);
                    let _ = reply.send(result);
                }
                KeeperMsg::Checkpoint {
                    continuation,
                    reply,
                } => {
                    let result = self.store.replace(&self.lease, continuation).await;
                    self.apply(&result);
                    let _ = reply.send(result);
                }
                KeeperMsg::Release { reply } => {
                    let result = match self.store.release(&self.lease).await {
                        Ok(()) => {
                            self.lease.owner = None;
                            self.published.send_replace(self.lease.clone());
                            Ok(self.lease.clone())
                        }
                        Err(e) => Err(e),
                    };
                    let released = result.is_ok();
                    let _ = reply.send(result);
                    if released {
                        info!(partition = %self.lease.partition_id, "Lease released");
                        break;
                    }
                }
            }
        }

        debug!(partition = %self.lease.partition_id, "Lease keeper stopped");
        self.lease
    }

    fn apply(&mut self, result: &Result<Lease, StoreError>) {
        if let Ok(lease) = result {
            self.lease = lease.clone();
            self.published.send_replace(lease.clone());
        }
    }
}

/// Cloneable access to a running [`LeaseKeeper`].
#[derive(Debug, Clone)]
pub struct KeeperHandle {
    tx: mpsc::Sender<KeeperMsg>,
    current: watch::Receiver<Lease>,
}

impl KeeperHandle {
    /// Latest lease version confirmed by the store.
    pub fn current(&self) -> Lease {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Lease> {
        self.current.clone()
    }

    pub async fn renew(&self) -> Result<Lease, KeeperError> {
        self.request(|reply| KeeperMsg::Renew { reply }).await
    }

    pub async fn checkpoint(&self, continuation: ContinuationToken) -> Result<Lease, KeeperError> {
        self.request(|reply| KeeperMsg::Checkpoint {
            continuation,
            reply,
        })
        .await
    }

    pub async fn release(&self) -> Result<Lease, KeeperError> {
        self.request(|reply| KeeperMsg::Release { reply }).await
    }

    async fn request<F>(&self, build: F) -> Result<Lease, KeeperError>
    where
        F: FnOnce(Reply) -> KeeperMsg,
    {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| KeeperError::MailboxClosed)?;
        let result = rx.await.map_err(|_| KeeperError::MailboxClosed)?;
        Ok(result?)
    }
}

/// Starts the keeper for an acquired lease. The task ends when every handle
/// is dropped or the lease is released, and yields the last known lease.
pub fn spawn_keeper(store: Arc<dyn LeaseStore>, lease: Lease) -> (KeeperHandle, JoinHandle<Lease>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let (published, current) = watch::channel(lease.clone());
    let keeper = LeaseKeeper {
        store,
        lease,
        published,
    };

    let handle = tokio::spawn(keeper.run(rx));
    (KeeperHandle { tx, current }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::state::memory::InMemoryLeaseStore;
    use std::time::Duration;

    async fn acquired(store: &InMemoryLeaseStore) -> Lease {
        store.create_if_absent("p-0", None).await.unwrap();
        store.acquire("p-0", "worker-a").await.unwrap()
    }

    #[tokio::test]
    async fn interleaved_writers_never_conflict_with_each_other() {
        let store = Arc::new(InMemoryLeaseStore::new(Duration::from_secs(60)));
        let lease = acquired(&store).await;
        let (handle, task) = spawn_keeper(store.clone(), lease);

        let renewer = handle.clone();
        let renewals = tokio::spawn(async move {
            for _ in 0..20 {
                renewer.renew().await.unwrap();
            }
        });
        for i in 0..20 {
            handle.checkpoint(format!("lsn:{i}").into()).await.unwrap();
        }
        renewals.await.unwrap();

        assert_eq!(handle.current().continuation, Some("lsn:19".into()));
        drop(handle);

        let last = task.await.unwrap();
        let stored = store.get("p-0").await.unwrap().unwrap();
        assert_eq!(last.concurrency_token, stored.concurrency_token);
    }

    #[tokio::test]
    async fn foreign_write_surfaces_as_conflict() {
        let store = Arc::new(InMemoryLeaseStore::new(Duration::ZERO));
        let lease = acquired(&store).await;
        let (handle, _task) = spawn_keeper(store.clone(), lease.clone());

        // Expired lease stolen by another worker.
        store.acquire("p-0", "worker-b").await.unwrap();

        let err = handle.renew().await.unwrap_err();
        assert_eq!(err, KeeperError::Store(StoreError::conflict("p-0")));
        assert_eq!(handle.current(), lease);
    }

    #[tokio::test]
    async fn release_is_terminal() {
        let store = Arc::new(InMemoryLeaseStore::new(Duration::from_secs(60)));
        let lease = acquired(&store).await;
        let (handle, task) = spawn_keeper(store.clone(), lease);

        let released = handle.release().await.unwrap();
        assert!(released.owner.is_none());
        assert_eq!(handle.renew().await.unwrap_err(), KeeperError::MailboxClosed);

        let last = task.await.unwrap();
        assert!(last.owner.is_none());
        assert!(store.get("p-0").await.unwrap().unwrap().owner.is_none());
    }
}
