//! Ownership tracker - owned vs. dangling handles over native payloads
//!
//! Design: every value crossing from the native library is wrapped in a
//! [`Handle`]. A handle either owns its payload (and releases it exactly once
//! when the last reference goes away) or dangles (a view that never releases).
//! Views borrowed from another handle *anchor* it: the anchor graph is a DAG
//! of strong references, so an owner outlives every view into it. Cycles are
//! rejected at registration time, which is what keeps the strong references
//! from leaking.
//!
//! Release is driven by `Drop`, so it happens when the host lets go of the
//! last reference, in whatever order that is. [`Handle::close`] is the
//! deterministic alternative.

mod anchor;
mod census;
mod handle;

#[cfg(test)]
mod tests;

pub use census::{is_live, live_count, live_handles, HandleInfo};
pub use handle::{Handle, NativeClone, NativePayload};

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::logging::{debug, info, log_live_handles};

/// Process-wide identity counter, shared by handles and trait objects
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static COUNTERS: Counters = Counters::new();

/// Process-unique identity of a handle or trait object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Allocate the next identity. Never returns 0.
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Counters {
    created: AtomicUsize,
    released: AtomicUsize,
    skipped_dangling: AtomicUsize,
    skipped_suspended: AtomicUsize,
    anchors_registered: AtomicUsize,
    cycles_rejected: AtomicUsize,
}

impl Counters {
    const fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            skipped_dangling: AtomicUsize::new(0),
            skipped_suspended: AtomicUsize::new(0),
            anchors_registered: AtomicUsize::new(0),
            cycles_rejected: AtomicUsize::new(0),
        }
    }
}

#[inline]
fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Tracker statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipStats {
    pub created: usize,
    pub released: usize,
    pub skipped_dangling: usize,
    pub skipped_suspended: usize,
    pub anchors_registered: usize,
    pub cycles_rejected: usize,
    pub live: usize,
}

pub fn stats() -> OwnershipStats {
    OwnershipStats {
        created: COUNTERS.created.load(Ordering::Relaxed),
        released: COUNTERS.released.load(Ordering::Relaxed),
        skipped_dangling: COUNTERS.skipped_dangling.load(Ordering::Relaxed),
        skipped_suspended: COUNTERS.skipped_suspended.load(Ordering::Relaxed),
        anchors_registered: COUNTERS.anchors_registered.load(Ordering::Relaxed),
        cycles_rejected: COUNTERS.cycles_rejected.load(Ordering::Relaxed),
        live: live_count(),
    }
}

/// Initialize the tracker (idempotent)
pub fn init() {
    Lazy::force(&census::CENSUS);
    debug!(target: "lnbind::ownership", next_id = NEXT_ID.load(Ordering::Relaxed), "Ownership tracker ready");
}

/// Report what is still alive. Nothing is force-released: a handle that is
/// never dropped keeps its payload until the process exits.
pub fn cleanup() -> OwnershipStats {
    let stats = stats();
    log_live_handles(stats.live);
    info!(
        target: "lnbind::ownership",
        created = stats.created,
        released = stats.released,
        skipped_dangling = stats.skipped_dangling,
        live = stats.live,
        "Ownership tracker cleanup"
    );
    stats
}
