//! Live-handle census - which handles exist right now, and where they came from
//!
//! Updated from handle constructors and `Drop`, so it must stay lock-free for
//! readers and never block a finalizer.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::panic::Location;

use super::HandleId;

pub(super) static CENSUS: Lazy<DashMap<HandleId, HandleInfo>> =
    Lazy::new(|| DashMap::with_capacity(1024));

/// Diagnostic record for a live handle
#[derive(Debug, Clone, Copy)]
pub struct HandleInfo {
    pub type_name: &'static str,
    pub origin: &'static Location<'static>,
}

#[inline]
pub(super) fn record(id: HandleId, info: HandleInfo) {
    CENSUS.insert(id, info);
}

#[inline]
pub(super) fn forget(id: HandleId) {
    CENSUS.remove(&id);
}

/// Snapshot of every live handle, sorted by identity
pub fn live_handles() -> Vec<(HandleId, HandleInfo)> {
    let mut handles: Vec<_> = CENSUS
        .iter()
        .map(|entry| (*entry.key(), *entry.value()))
        .collect();
    handles.sort_by_key(|(id, _)| *id);
    handles
}

pub fn live_count() -> usize {
    CENSUS.len()
}

pub fn is_live(id: HandleId) -> bool {
    CENSUS.contains_key(&id)
}
