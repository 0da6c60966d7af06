//! Process-local lock backend. Provides mutual exclusion within one instance
//! only; use it for single-instance deployments and tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;
use crate::{LockFactory, LockGuard};

#[derive(Clone, Default)]
pub struct NoneLockFactory {
    held: Arc<Mutex<HashSet<String>>>,
}

impl NoneLockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently held. Test hook.
    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains(name)
    }
}

#[async_trait]
impl LockFactory for NoneLockFactory {
    async fn try_acquire(&self, name: &str) -> Result<Option<Box<dyn LockGuard>>> {
        let mut held = self.held.lock().unwrap();
        if !held.insert(name.to_string()) {
            return Ok(None);
        }
        Ok(Some(Box::new(NoneLockGuard {
            held: self.held.clone(),
            name: name.to_string(),
        })))
    }
}

struct NoneLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    name: String,
}

#[async_trait]
impl LockGuard for NoneLockGuard {
    async fn release(self: Box<Self>) -> Result<()> {
        self.held.lock().unwrap().remove(&self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    #[tokio::test]
    async fn second_acquire_is_refused_until_release() {
        let factory = NoneLockFactory::new();
        let name = keys::job_lock("/relay/locks", 1);

        let guard = factory.try_acquire(&name).await.unwrap().unwrap();
        assert!(factory.try_acquire(&name).await.unwrap().is_none());

        guard.release().await.unwrap();
        assert!(factory.try_acquire(&name).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn distinct_names_do_not_contend() {
        let factory = NoneLockFactory::new();
        let a = factory
            .try_acquire(&keys::job_lock("/relay/locks", 1))
            .await
            .unwrap();
        let b = factory
            .try_acquire(&keys::dlq_lock("/relay/locks", 1))
            .await
            .unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
    }
}
