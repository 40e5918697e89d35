use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock as StdRwLock;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};

use crate::membership::MembershipList;
use crate::neighbour::{NeighbourTable, NodeId};

/// Timing knobs for the failure detector and RPC layer, layered by `ringd`
/// over environment variables, CLI flags, and defaults.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    pub heartbeat_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub rpc_timeout: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            heartbeat_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            rpc_timeout: Duration::from_millis(3000),
        }
    }
}

/// One-shot latch a local caller can block on to learn "this node has seen
/// at least one coordinator message". Never resets: once a node has a view
/// of the ring, it always has *a* view, even if stale.
#[derive(Debug, Default)]
struct CoordinatorLatch {
    done: AtomicBool,
    notify: Notify,
}

impl CoordinatorLatch {
    fn mark_done(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if self.is_done() {
            return;
        }
        self.notify.notified().await;
    }
}

/// The process-wide ring state: one neighbour table, one membership list,
/// one join mutex, one heartbeat clock, one coordinator latch, bundled
/// behind a single `Arc` cloned into every task rather than kept as
/// statics.
#[derive(Debug)]
pub struct RingState {
    pub neighbours: NeighbourTable,
    pub membership: MembershipList,
    pub config: RingConfig,
    /// Serializes the narrow critical section of the join protocol; never
    /// held across an unrelated forward operation.
    pub join_mutex: Mutex<()>,
    heartbeat_time: StdRwLock<Instant>,
    coordinator_latch: CoordinatorLatch,
}

impl RingState {
    /// Builds the state for a brand-new ring of one.
    pub fn solo(self_id: impl Into<NodeId>, config: RingConfig) -> Self {
        let self_id = self_id.into();
        RingState {
            neighbours: NeighbourTable::solo(self_id.clone()),
            membership: MembershipList::singleton(self_id),
            config,
            join_mutex: Mutex::new(()),
            heartbeat_time: StdRwLock::new(Instant::now()),
            coordinator_latch: CoordinatorLatch::default(),
        }
    }

    pub fn self_id(&self) -> NodeId {
        self.neighbours.self_id()
    }

    /// Stamps the heartbeat clock to "now". Called on every inbound
    /// membership RPC (`list`, `election`, `coordinator`). A racy read
    /// racing this write only delays an election, never violates safety, so
    /// a plain `RwLock` (not a CAS loop) is enough.
    pub fn touch_heartbeat(&self) {
        *self.heartbeat_time.write().unwrap() = Instant::now();
    }

    /// True once more than `heartbeat_timeout` has elapsed since the last
    /// inbound membership RPC — the heartbeat loop's election trigger.
    pub fn heartbeat_timed_out(&self) -> bool {
        let last = *self.heartbeat_time.read().unwrap();
        last.elapsed() > self.config.heartbeat_timeout
    }

    pub fn mark_coordinator_seen(&self) {
        self.coordinator_latch.mark_done();
    }

    pub fn coordinator_seen(&self) -> bool {
        self.coordinator_latch.is_done()
    }

    pub async fn wait_for_coordinator(&self) {
        self.coordinator_latch.wait().await;
    }
}
