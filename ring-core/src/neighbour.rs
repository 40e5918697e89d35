use std::sync::Arc;

use tokio::sync::RwLock;

/// A node identity: an opaque transport address string, compared by byte
/// equality. Cheaply clonable so a handler can hold a stable snapshot while
/// an unrelated RPC is in flight.
pub type NodeId = Arc<str>;

/// The four neighbour roles that may be reassigned after startup. `self` is
/// immutable for the life of the process and lives on `NeighbourTable`
/// directly rather than as a `Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Next,
    Prev,
    NextNext,
    PrevPrev,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Next => "next",
            Role::Prev => "prev",
            Role::NextNext => "next_next",
            Role::PrevPrev => "prev_prev",
        }
    }
}

/// Holds `self`, `next`, `prev`, `next_next`, `prev_prev` for one server.
///
/// Each mutable role is an `RwLock<Option<NodeId>>` guarding an `Arc<str>`
/// handle. `get` clones the `Arc` out from behind the lock and returns it
/// immediately, so the caller's snapshot survives any number of subsequent
/// `set` calls without needing a matching release call — the `Arc`'s `Drop`
/// is the release.
#[derive(Debug)]
pub struct NeighbourTable {
    this: NodeId,
    next: RwLock<Option<NodeId>>,
    prev: RwLock<Option<NodeId>>,
    next_next: RwLock<Option<NodeId>>,
    prev_prev: RwLock<Option<NodeId>>,
}

impl NeighbourTable {
    /// Builds a fresh table for a ring of one: every role points at `self`.
    pub fn solo(self_id: impl Into<NodeId>) -> Self {
        let this: NodeId = self_id.into();
        NeighbourTable {
            this: this.clone(),
            next: RwLock::new(Some(this.clone())),
            prev: RwLock::new(Some(this.clone())),
            next_next: RwLock::new(Some(this.clone())),
            prev_prev: RwLock::new(Some(this)),
        }
    }

    pub fn self_id(&self) -> NodeId {
        self.this.clone()
    }

    fn slot(&self, role: Role) -> &RwLock<Option<NodeId>> {
        match role {
            Role::Next => &self.next,
            Role::Prev => &self.prev,
            Role::NextNext => &self.next_next,
            Role::PrevPrev => &self.prev_prev,
        }
    }

    /// Returns a snapshot of `role`'s current identity, or `None` if the
    /// role has never been set (only possible before the first join).
    pub async fn get(&self, role: Role) -> Option<NodeId> {
        self.slot(role).read().await.clone()
    }

    /// Atomically replaces `role`'s identity with `id`. The previous
    /// `Arc<str>` is dropped here; any snapshot a caller still holds from an
    /// earlier `get` remains valid because it owns its own reference.
    pub async fn set(&self, role: Role, id: NodeId) {
        *self.slot(role).write().await = Some(id);
    }

    /// True once the ring has collapsed to a single node: every role equals
    /// `self`.
    pub async fn is_solo(&self) -> bool {
        self.get(Role::Next).await.as_deref() == Some(&*self.this)
            && self.get(Role::Prev).await.as_deref() == Some(&*self.this)
    }
}
