//! etcd-backed lock factory.
//!
//! One session lease per instance. Each acquired lock is a key created only
//! if absent (create_revision == 0 compare) and attached to the session
//! lease, so every marker this instance holds disappears together when the
//! lease expires. A keepalive task refreshes the lease until shutdown.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, PutOptions, Txn, TxnOp};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::{LockFactory, LockGuard};

#[derive(Clone)]
pub struct EtcdLockFactory {
    client: Client,
    lease_id: i64,
    instance_id: String,
}

impl EtcdLockFactory {
    /// Connect, grant the session lease and spawn its keepalive task. The
    /// task exits when `shutdown` flips to true.
    pub async fn connect(
        endpoints: &[String],
        ttl_secs: i64,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let endpoints = if endpoints.is_empty() {
            vec!["http://127.0.0.1:2379".to_string()]
        } else {
            endpoints.to_vec()
        };
        let mut client = Client::connect(endpoints, None).await?;
        let lease_id = client.lease_grant(ttl_secs, None).await?.id();
        let instance_id = Uuid::new_v4().to_string();
        debug!(lease_id, instance = %instance_id, "lock session established");

        let mut lease_bg = client.lease_client();
        let shutdown_rx = shutdown.clone();
        tokio::spawn(async move {
            let (mut keeper, mut stream) = match lease_bg.keep_alive(lease_id).await {
                Ok(x) => x,
                Err(_) => loop {
                    if *shutdown_rx.borrow() {
                        return;
                    }
                    if let Ok(x) = lease_bg.keep_alive(lease_id).await {
                        break x;
                    }
                    sleep(Duration::from_millis(200)).await;
                },
            };
            // Refresh at a third of the TTL; a missed refresh or two still
            // keeps the lease alive.
            let mut tick = tokio::time::interval(Duration::from_secs((ttl_secs as u64 / 3).max(1)));
            loop {
                if *shutdown_rx.borrow() {
                    let _ = lease_bg.revoke(lease_id).await;
                    return;
                }
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(err) = keeper.keep_alive().await {
                            warn!(lease_id, error = %err, "lease refresh failed");
                        }
                    }
                    msg = stream.message() => {
                        if matches!(msg, Ok(None) | Err(_)) {
                            warn!(lease_id, "lease keepalive stream closed");
                            sleep(Duration::from_millis(200)).await;
                        }
                    }
                }
            }
        });

        Ok(Self {
            client,
            lease_id,
            instance_id,
        })
    }
}

#[async_trait]
impl LockFactory for EtcdLockFactory {
    async fn try_acquire(&self, name: &str) -> Result<Option<Box<dyn LockGuard>>> {
        // create_revision == 0 holds only while the key does not exist, so
        // exactly one racing instance's put succeeds.
        let txn = Txn::new()
            .when(vec![Compare::create_revision(name, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(
                name,
                self.instance_id.as_str(),
                Some(PutOptions::new().with_lease(self.lease_id)),
            )]);
        let resp = self.client.kv_client().txn(txn).await?;
        if !resp.succeeded() {
            return Ok(None);
        }
        Ok(Some(Box::new(EtcdLockGuard {
            client: self.client.clone(),
            key: name.to_string(),
        })))
    }
}

struct EtcdLockGuard {
    client: Client,
    key: String,
}

#[async_trait]
impl LockGuard for EtcdLockGuard {
    async fn release(self: Box<Self>) -> Result<()> {
        self.client.kv_client().delete(self.key.as_str(), None).await?;
        Ok(())
    }
}
