use std::sync::Arc;

use tokio::sync::RwLock;

use crate::neighbour::NodeId;

/// The local copy of the most recently coordinator-published node list.
/// Created empty at startup, replaced wholesale on every `coordinator`
/// receipt, and read by out-of-scope consumers (e.g. a hashing router) via
/// `copy`.
#[derive(Debug, Default)]
pub struct MembershipList {
    inner: RwLock<Arc<[NodeId]>>,
}

impl MembershipList {
    pub fn new() -> Self {
        MembershipList {
            inner: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn singleton(self_id: NodeId) -> Self {
        MembershipList {
            inner: RwLock::new(Arc::from(vec![self_id])),
        }
    }

    /// Returns a consistent, point-in-time snapshot of the membership set.
    pub async fn copy(&self) -> Arc<[NodeId]> {
        self.inner.read().await.clone()
    }

    /// Atomically replaces the membership set with `list`.
    pub async fn update(&self, list: Vec<NodeId>) {
        *self.inner.write().await = Arc::from(list);
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.iter().any(|n| &**n == id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
