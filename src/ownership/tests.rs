//! Tests for the ownership tracker

use super::*;
use crate::errors::OwnershipError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// Test payload: counts how often the native side would have freed it
#[derive(Clone, Copy)]
struct Probe {
    releases: &'static AtomicUsize,
    natively_owned: bool,
}

impl NativePayload for Probe {
    unsafe fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl NativeClone for Probe {
    fn native_clone(&self) -> Self {
        *self
    }

    fn is_native_owned(&self) -> bool {
        self.natively_owned
    }
}

fn probe() -> Probe {
    Probe {
        releases: Box::leak(Box::new(AtomicUsize::new(0))),
        natively_owned: true,
    }
}

fn releases(probe: &Probe) -> usize {
    probe.releases.load(Ordering::SeqCst)
}

#[cfg(test)]
mod anchor_tests {
    use super::*;

    #[test]
    fn test_reverse_edge_rejected() {
        let a = Handle::owned(probe());
        let b = Handle::owned(probe());

        a.add_anchor(&b).unwrap();
        let err = b.add_anchor(&a).unwrap_err();

        assert_eq!(
            err,
            OwnershipError::CyclicReference {
                subject: b.id(),
                candidate: a.id(),
            }
        );
        assert_eq!(a.anchor_ids(), vec![b.id()]);
        assert!(b.anchor_ids().is_empty());
    }

    #[test]
    fn test_self_anchor_rejected() {
        let a = Handle::owned(probe());
        assert!(matches!(
            a.add_anchor(&a),
            Err(OwnershipError::CyclicReference { .. })
        ));
        assert!(a.anchor_ids().is_empty());
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let a = Handle::owned(probe());
        let b = Handle::owned(probe());
        let c = Handle::owned(probe());

        a.add_anchor(&b).unwrap();
        b.add_anchor(&c).unwrap();

        assert!(c.add_anchor(&a).is_err());
        assert!(c.anchor_ids().is_empty());
        assert!(a.has_anchor(&c));
        assert!(!c.has_anchor(&a));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let top = Handle::owned(probe());
        let left = Handle::owned(probe());
        let right = Handle::owned(probe());
        let bottom = Handle::owned(probe());

        top.add_anchor(&left).unwrap();
        top.add_anchor(&right).unwrap();
        left.add_anchor(&bottom).unwrap();
        right.add_anchor(&bottom).unwrap();

        let mut reachable = top.transitive_anchor_ids();
        reachable.sort();
        let mut expected = vec![left.id(), right.id(), bottom.id()];
        expected.sort();
        assert_eq!(reachable, expected);
    }

    #[test]
    fn test_duplicate_anchor_is_noop() {
        let a = Handle::owned(probe());
        let b = Handle::owned(probe());

        a.add_anchor(&b).unwrap();
        a.add_anchor(&b).unwrap();

        assert_eq!(a.anchor_ids(), vec![b.id()]);
        assert_eq!(b.holders(), 1);
    }

    #[test]
    fn test_borrowed_is_dangling_and_anchored() {
        let owner = Handle::owned(probe());
        let view = Handle::borrowed(probe(), &owner);

        assert!(view.is_dangling());
        assert!(view.has_anchor(&owner));
        assert!(view.add_anchor(&owner).is_ok());
        assert!(owner.add_anchor(&view).is_err());
    }

    #[test]
    fn test_concurrent_opposite_edges() {
        // Exactly one of two racing opposite registrations may win
        for _ in 0..50 {
            let a = Handle::owned(probe());
            let b = Handle::owned(probe());
            let barrier = Arc::new(Barrier::new(2));

            let (a1, b1, barrier1) = (a.clone(), b.clone(), Arc::clone(&barrier));
            let left = thread::spawn(move || {
                barrier1.wait();
                a1.add_anchor(&b1).is_ok()
            });
            let (a2, b2, barrier2) = (a.clone(), b.clone(), Arc::clone(&barrier));
            let right = thread::spawn(move || {
                barrier2.wait();
                b2.add_anchor(&a2).is_ok()
            });

            let outcomes = [left.join().unwrap(), right.join().unwrap()];
            assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        }
    }
}

#[cfg(test)]
mod release_tests {
    use super::*;

    #[test]
    fn test_owned_released_once() {
        let payload = probe();
        drop(Handle::owned(payload));
        assert_eq!(releases(&payload), 1);
    }

    #[test]
    fn test_finalize_reentry_releases_once() {
        let payload = probe();
        let (first, second) = Handle::owned(payload).finalize_twice();

        assert!(first);
        assert!(!second);
        assert_eq!(releases(&payload), 1);
    }

    #[test]
    fn test_dangling_never_released() {
        let payload = probe();
        drop(Handle::dangling(payload));
        drop(Handle::owned(payload).dangle(true));
        assert_eq!(releases(&payload), 0);
    }

    #[test]
    fn test_clones_share_one_release() {
        let payload = probe();
        let handle = Handle::owned(payload);
        let copies: Vec<_> = (0..8).map(|_| handle.clone()).collect();

        drop(handle);
        assert_eq!(releases(&payload), 0);
        drop(copies);
        assert_eq!(releases(&payload), 1);
    }

    #[test]
    fn test_view_keeps_owner_alive() {
        let owned = probe();
        let owner = Handle::owned(owned);
        let owner_id = owner.id();
        let view = Handle::borrowed(probe(), &owner);

        drop(owner);
        assert_eq!(releases(&owned), 0);
        assert!(is_live(owner_id));
        assert_eq!(view.anchor_ids(), vec![owner_id]);

        drop(view);
        assert_eq!(releases(&owned), 1);
        assert!(!is_live(owner_id));
    }

    #[test]
    fn test_chain_released_bottom_up_once() {
        let root = probe();
        let owner = Handle::owned(root);
        let middle = Handle::borrowed(probe(), &owner);
        let leaf = Handle::borrowed(probe(), &middle);

        drop(owner);
        drop(middle);
        assert_eq!(releases(&root), 0);

        drop(leaf);
        assert_eq!(releases(&root), 1);
    }

    #[test]
    fn test_mark_dangling_recursive() {
        let (h, x, y, z) = (probe(), probe(), probe(), probe());
        let handle_h = Handle::owned(h);
        let handle_x = Handle::owned(x);
        let handle_y = Handle::owned(y);
        let handle_z = Handle::owned(z);

        handle_h.add_anchor(&handle_x).unwrap();
        handle_h.add_anchor(&handle_y).unwrap();
        handle_y.add_anchor(&handle_z).unwrap();

        handle_h.mark_dangling_recursive();

        assert!(handle_h.is_dangling());
        assert!(handle_x.is_dangling());
        assert!(handle_y.is_dangling());
        assert!(handle_z.is_dangling());

        drop((handle_h, handle_x, handle_y, handle_z));
        assert_eq!(releases(&h) + releases(&x) + releases(&y) + releases(&z), 0);
    }

    #[test]
    fn test_mark_dangling_only_touches_self() {
        let owner = Handle::owned(probe());
        let subject = Handle::owned(probe());
        subject.add_anchor(&owner).unwrap();

        subject.mark_dangling(true);
        assert!(subject.is_dangling());
        assert!(owner.is_owned());

        subject.mark_dangling(false);
        assert!(subject.is_owned());
    }

    #[test]
    fn test_pass_to_native_transfers_ownership() {
        let payload = probe();
        let handle = Handle::owned(payload);
        let transferred = handle.pass_to_native();

        assert!(handle.is_dangling());
        drop(handle);
        assert_eq!(releases(&transferred), 0);
    }

    #[test]
    fn test_close_releases_immediately() {
        let payload = probe();
        Handle::owned(payload).close().unwrap();
        assert_eq!(releases(&payload), 1);
    }

    #[test]
    fn test_close_refuses_while_borrowed() {
        let payload = probe();
        let owner = Handle::owned(payload);
        let owner_id = owner.id();
        let view = Handle::borrowed(probe(), &owner);

        assert_eq!(
            owner.close(),
            Err(OwnershipError::StillShared {
                id: owner_id,
                holders: 1,
            })
        );
        assert_eq!(releases(&payload), 0);

        drop(view);
        assert_eq!(releases(&payload), 1);
    }
}

#[cfg(test)]
mod clone_tests {
    use super::*;

    #[test]
    fn test_dynamic_clone_dangles_when_natively_owned() {
        let handle = Handle::owned(probe());
        let clone = handle.dynamic_ownership_clone();
        assert!(clone.is_dangling());
        assert_ne!(clone.id(), handle.id());
    }

    #[test]
    fn test_dynamic_clone_owns_when_not_natively_owned() {
        let mut payload = probe();
        payload.natively_owned = false;
        let handle = Handle::owned(payload);

        let clone = handle.dynamic_ownership_clone();
        assert!(clone.is_owned());
        drop(clone);
        assert_eq!(releases(&payload), 1);
    }

    #[test]
    fn test_clone_variants() {
        let handle = Handle::owned(probe());
        assert!(handle.clone_payload().is_owned());
        assert!(handle.dangling_clone().is_dangling());
        assert!(handle.clone().dynamic_dangle().is_dangling());
    }
}

#[cfg(test)]
mod census_tests {
    use super::*;

    #[test]
    fn test_census_tracks_lifetime() {
        let handle = Handle::owned(probe());
        let id = handle.id();

        let info = live_handles()
            .into_iter()
            .find(|(live, _)| *live == id)
            .map(|(_, info)| info)
            .unwrap();
        assert!(info.type_name.ends_with("Probe"));
        assert_eq!(info.origin.file(), file!());

        drop(handle);
        assert!(!is_live(id));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let first = Handle::owned(probe());
        let second = Handle::owned(probe());
        assert!(second.id() > first.id());
        assert_ne!(first.id().as_raw(), 0);
    }

    #[test]
    fn test_stats_count_work() {
        let before = stats();
        let owner = Handle::owned(probe());
        let other = Handle::owned(probe());
        other.add_anchor(&owner).unwrap();
        let _ = owner.add_anchor(&other);

        let after = stats();
        assert!(after.created >= before.created + 2);
        assert!(after.anchors_registered > before.anchors_registered);
        assert!(after.cycles_rejected > before.cycles_rejected);
    }
}
