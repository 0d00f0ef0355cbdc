//! Wrapped handles - the host-side proxy for one native value

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::any::type_name;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::anchor::{self, AnchorNode, AnchorSet, INSERTION_LOCK};
use super::census::{self, HandleInfo};
use super::{bump, HandleId, COUNTERS};
use crate::config;
use crate::errors::OwnershipError;
use crate::logging::{
    log_anchor, log_cycle_rejected, log_handle_created, log_release, log_skip_dangling,
};

/// A `#[repr(C)]` value produced by or destined for the native library.
///
/// Payloads are plain bitwise-copyable data; whatever they point at is only
/// freed through [`NativePayload::release`], never by Rust's `Drop`.
pub trait NativePayload: Copy + Send + Sync + 'static {
    /// Free the native resources this value owns.
    ///
    /// # Safety
    /// - Must run at most once per native allocation
    /// - Neither this value nor any bitwise copy may be used afterwards
    unsafe fn release(&mut self);
}

/// Payloads the native library can deep-copy
pub trait NativeClone: NativePayload {
    /// Duplicate every buffer this value points at. The copy is owned.
    fn native_clone(&self) -> Self;

    /// Whether the native side considers this value responsible for its
    /// buffers. Plain data is always self-owned.
    fn is_native_owned(&self) -> bool {
        true
    }
}

pub(crate) struct Node<P: NativePayload> {
    id: HandleId,
    origin: &'static Location<'static>,
    dangling: AtomicBool,
    released: AtomicBool,
    anchors: Mutex<AnchorSet>,
    payload: P,
}

impl<P: NativePayload> Node<P> {
    /// Release the payload unless dangling, suspended, or already released.
    /// Safe to re-enter; returns whether this call released.
    pub(crate) fn finalize(&mut self) -> bool {
        if config::freedom_suspended() {
            bump(&COUNTERS.skipped_suspended);
            return false;
        }

        if self.dangling.load(Ordering::Acquire) {
            log_skip_dangling(self.id, type_name::<P>(), self.origin);
            bump(&COUNTERS.skipped_dangling);
            return false;
        }

        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        log_release(self.id, type_name::<P>(), self.origin);
        // SAFETY: `released` flipped exactly once for this node, and the node
        // is the only owner of the payload's native buffers.
        unsafe { self.payload.release() };
        bump(&COUNTERS.released);
        true
    }
}

impl<P: NativePayload> AnchorNode for Node<P> {
    fn id(&self) -> HandleId {
        self.id
    }

    fn anchor_snapshot(&self) -> AnchorSet {
        self.anchors.lock().clone()
    }

    fn set_dangling(&self, dangling: bool) {
        self.dangling.store(dangling, Ordering::Release);
    }
}

impl<P: NativePayload> Drop for Node<P> {
    fn drop(&mut self) {
        census::forget(self.id);
        self.finalize();
        // Anchors drop after this, so owners always outlive their views
    }
}

/// Host-side proxy for one native value.
///
/// Cloning a handle clones the reference, not the payload; the payload is
/// finalized when the last clone (including anchor edges from views) drops.
pub struct Handle<P: NativePayload> {
    node: Arc<Node<P>>,
}

impl<P: NativePayload> Clone for Handle<P> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<P: NativePayload> fmt::Debug for Handle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.node.id)
            .field("type", &type_name::<P>())
            .field("dangling", &self.is_dangling())
            .field("anchors", &self.anchor_ids())
            .field("origin", &format_args!("{}", self.node.origin))
            .finish()
    }
}

impl<P: NativePayload> Handle<P> {
    fn with_state(payload: P, dangling: bool, origin: &'static Location<'static>) -> Self {
        let id = HandleId::next();
        census::record(
            id,
            HandleInfo {
                type_name: type_name::<P>(),
                origin,
            },
        );
        bump(&COUNTERS.created);
        log_handle_created(id, type_name::<P>(), origin, dangling);

        Self {
            node: Arc::new(Node {
                id,
                origin,
                dangling: AtomicBool::new(dangling),
                released: AtomicBool::new(false),
                anchors: Mutex::new(SmallVec::new()),
                payload,
            }),
        }
    }

    /// Wrap a payload this handle is responsible for releasing
    #[track_caller]
    pub fn owned(payload: P) -> Self {
        Self::with_state(payload, false, Location::caller())
    }

    /// Wrap a payload someone else releases (statics, values owned natively)
    #[track_caller]
    pub fn dangling(payload: P) -> Self {
        Self::with_state(payload, true, Location::caller())
    }

    /// Wrap a view into `anchor`'s payload. The view dangles and keeps
    /// `anchor` alive for as long as it exists.
    #[track_caller]
    pub fn borrowed<Q: NativePayload>(payload: P, anchor: &Handle<Q>) -> Self {
        Self::anchored(payload, anchor, true)
    }

    /// Wrap a payload that depends on `anchor`, choosing ownership explicitly.
    /// Used for values the native side returns fresh but derived from
    /// `anchor` (serialized buffers, iterators).
    #[track_caller]
    pub fn anchored<Q: NativePayload>(payload: P, anchor: &Handle<Q>, dangling: bool) -> Self {
        let handle = Self::with_state(payload, dangling, Location::caller());
        // A fresh node has no dependents, so this edge cannot close a cycle
        handle
            .node
            .anchors
            .lock()
            .push(Arc::clone(&anchor.node) as Arc<dyn AnchorNode>);
        bump(&COUNTERS.anchors_registered);
        log_anchor(handle.id(), anchor.id());
        handle
    }

    pub fn id(&self) -> HandleId {
        self.node.id
    }

    /// Source location that created this handle
    pub fn origin(&self) -> &'static Location<'static> {
        self.node.origin
    }

    pub fn payload(&self) -> &P {
        &self.node.payload
    }

    pub fn is_dangling(&self) -> bool {
        self.node.dangling.load(Ordering::Acquire)
    }

    pub fn is_owned(&self) -> bool {
        !self.is_dangling()
    }

    /// References to this handle's node other than `self`, anchor edges included
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.node) - 1
    }

    /// Record `candidate` as a dependency of this handle.
    ///
    /// Fails with [`OwnershipError::CyclicReference`] if `candidate` is this
    /// handle or already depends on it (directly or transitively); the graph
    /// is left unchanged. Registering an existing direct anchor again is a
    /// no-op.
    pub fn add_anchor<Q: NativePayload>(&self, candidate: &Handle<Q>) -> Result<(), OwnershipError> {
        let subject = self.id();
        let candidate_id = candidate.id();

        let _guard = INSERTION_LOCK.lock();

        if subject == candidate_id || anchor::reaches(candidate.node.as_ref(), subject) {
            bump(&COUNTERS.cycles_rejected);
            log_cycle_rejected(subject, candidate_id);
            return Err(OwnershipError::CyclicReference {
                subject,
                candidate: candidate_id,
            });
        }

        let mut anchors = self.node.anchors.lock();
        if anchors.iter().any(|existing| existing.id() == candidate_id) {
            return Ok(());
        }
        anchors.push(Arc::clone(&candidate.node) as Arc<dyn AnchorNode>);
        drop(anchors);

        bump(&COUNTERS.anchors_registered);
        log_anchor(subject, candidate_id);
        Ok(())
    }

    /// Whether this handle depends on `candidate`, directly or transitively
    pub fn has_anchor<Q: NativePayload>(&self, candidate: &Handle<Q>) -> bool {
        anchor::reaches(self.node.as_ref(), candidate.id())
    }

    /// Direct anchors, in registration order
    pub fn anchor_ids(&self) -> Vec<HandleId> {
        self.node.anchors.lock().iter().map(|a| a.id()).collect()
    }

    /// Every handle this one keeps alive, directly or transitively
    pub fn transitive_anchor_ids(&self) -> Vec<HandleId> {
        anchor::reachable_ids(self.node.as_ref())
    }

    /// Set whether this handle dangles. Affects this handle only.
    pub fn mark_dangling(&self, dangling: bool) {
        self.node.set_dangling(dangling);
    }

    /// Builder form of [`mark_dangling`](Self::mark_dangling)
    pub fn dangle(self, dangling: bool) -> Self {
        self.mark_dangling(dangling);
        self
    }

    /// Dangle this handle and everything it anchors, for handing a whole
    /// object graph to the native side
    pub fn mark_dangling_recursive(&self) {
        self.node.set_dangling(true);
        anchor::dangle_reachable(self.node.as_ref());
    }

    pub fn dangle_recursively(self) -> Self {
        self.mark_dangling_recursive();
        self
    }

    /// Hand the payload to a native call that takes ownership by value.
    /// This handle stops being responsible for it.
    pub fn pass_to_native(&self) -> P {
        self.mark_dangling(true);
        self.node.payload
    }

    /// Keeps `self` alive up to this call, for payloads a native call only
    /// borrows
    #[inline(never)]
    pub fn keep_alive(&self) {
        std::hint::black_box(self.node.id);
    }

    /// Release now instead of whenever the last reference drops.
    ///
    /// Fails with [`OwnershipError::StillShared`] while other references
    /// exist (clones, or views anchored to this handle); in that case this
    /// reference is dropped and release happens with the last of the others.
    pub fn close(self) -> Result<(), OwnershipError> {
        let id = self.id();
        match Arc::try_unwrap(self.node) {
            Ok(node) => {
                drop(node);
                Ok(())
            }
            Err(node) => Err(OwnershipError::StillShared {
                id,
                holders: Arc::strong_count(&node) - 1,
            }),
        }
    }
}

impl<P: NativeClone> Handle<P> {
    /// Deep copy owned by the new handle
    #[track_caller]
    pub fn clone_payload(&self) -> Self {
        Self::with_state(self.payload().native_clone(), false, Location::caller())
    }

    /// Deep copy that never releases, for passing into a native call that
    /// takes ownership
    #[track_caller]
    pub fn dangling_clone(&self) -> Self {
        Self::with_state(self.payload().native_clone(), true, Location::caller())
    }

    /// Deep copy that dangles exactly when the original payload is owned
    /// natively, so the native side's notion of ownership survives the copy
    #[track_caller]
    pub fn dynamic_ownership_clone(&self) -> Self {
        let natively_owned = self.payload().is_native_owned();
        Self::with_state(self.payload().native_clone(), natively_owned, Location::caller())
    }

    /// Dangle exactly when the payload is owned natively
    pub fn dynamic_dangle(self) -> Self {
        let natively_owned = self.payload().is_native_owned();
        self.dangle(natively_owned)
    }
}

#[cfg(test)]
impl<P: NativePayload> Handle<P> {
    /// Run finalization on a node nobody else references, twice
    pub(crate) fn finalize_twice(self) -> (bool, bool) {
        let mut node = Arc::try_unwrap(self.node)
            .unwrap_or_else(|_| panic!("handle still shared"));
        let first = node.finalize();
        let second = node.finalize();
        (first, second)
    }
}
