//! Instance registry - opaque integer keys to live host objects
//!
//! Native code holds a host object only as a key (the object's identity,
//! smuggled through a `void*`). The registry keeps the object alive and counts
//! native holders. One mutex guards both tables, so every operation is
//! linearizable with respect to the others.

use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;

use super::trait_object::TraitObject;
use crate::config::{self, StaleLookupPolicy};
use crate::errors::BridgeError;
use crate::logging::{
    log_bad_lookup, log_cache_instance, log_deregistered, log_expose, log_lookup,
};

struct Entry {
    /// Always an `Arc<T>` for the `T` named in `type_name`
    object: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

#[derive(Default)]
struct RegistryState {
    instances: HashMap<u64, Entry>,
    counts: HashMap<u64, i64>,
}

/// Key → object table with per-key native reference counts
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
    stale_lookup: Option<StaleLookupPolicy>,
    deregister_on_free: Option<bool>,
}

impl Registry {
    /// Registry that follows the process-wide configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with fixed policies, independent of the active configuration
    pub fn with_policies(stale_lookup: StaleLookupPolicy, deregister_on_free: bool) -> Self {
        Self {
            state: Mutex::default(),
            stale_lookup: Some(stale_lookup),
            deregister_on_free: Some(deregister_on_free),
        }
    }

    fn stale_lookup_policy(&self) -> StaleLookupPolicy {
        self.stale_lookup
            .unwrap_or_else(config::stale_lookup_policy)
    }

    fn deregisters_on_free(&self) -> bool {
        self.deregister_on_free
            .unwrap_or_else(config::deregister_on_free)
    }

    /// Count one more native holder of `object` and make sure it is stored.
    ///
    /// With `count_idempotently` the count only moves from 0 to 1, so
    /// repeated activations of an already-held object change nothing.
    /// Returns the count after the update.
    pub fn cache_instance<T>(&self, object: &TraitObject<T>, count_idempotently: bool) -> i64
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = object.id().as_raw();
        let mut state = self.state.lock();

        let current = state.counts.get(&key).copied().unwrap_or(0);
        let updated = if count_idempotently && current > 0 {
            current
        } else {
            current + 1
        };
        state.counts.insert(key, updated);
        state.instances.entry(key).or_insert_with(|| entry_for(object));

        log_cache_instance(key, updated, state.instances.len());
        updated
    }

    /// Store `object` without counting a holder and return its key as a
    /// pointer bit pattern
    pub fn expose<T>(&self, object: &TraitObject<T>) -> *mut c_void
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = object.id().as_raw();
        self.state
            .lock()
            .instances
            .entry(key)
            .or_insert_with(|| entry_for(object));

        log_expose(key);
        key_to_pointer(key)
    }

    /// Look up the object behind an opaque key.
    ///
    /// A key whose count is below 1 means native code kept a key it no
    /// longer holds. That is always logged; under
    /// [`StaleLookupPolicy::Degraded`] the cached object is still returned.
    pub fn resolve<T>(&self, pointer: *const c_void) -> Result<Arc<T>, BridgeError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = pointer_to_key(pointer);
        if key == 0 {
            return Err(BridgeError::NullKey);
        }
        log_lookup(key);

        let state = self.state.lock();
        let entry = state
            .instances
            .get(&key)
            .ok_or(BridgeError::UnknownKey(key))?;

        let count = state.counts.get(&key).copied().unwrap_or(0);
        if count < 1 {
            log_bad_lookup(key, count);
            if self.stale_lookup_policy() == StaleLookupPolicy::Fatal {
                return Err(BridgeError::StaleReference { key, count });
            }
        }

        entry
            .object
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(BridgeError::TypeMismatch {
                key,
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// One native holder let go. When the count reaches 0 the entry is
    /// dropped, unless deregistration is switched off. Returns the count
    /// after the update.
    pub fn release(&self, key: u64) -> Result<i64, BridgeError> {
        let mut state = self.state.lock();
        if !state.instances.contains_key(&key) {
            return Err(BridgeError::UnknownKey(key));
        }

        let updated = state.counts.get(&key).copied().unwrap_or(0) - 1;
        if updated <= 0 && self.deregisters_on_free() {
            state.counts.remove(&key);
            // Dropped outside the lock: a host destructor may call back in
            let entry = state.instances.remove(&key);
            drop(state);
            drop(entry);
            log_deregistered(key);
            return Ok(updated.max(0));
        }

        state.counts.insert(key, updated);
        Ok(updated)
    }

    pub fn reference_count(&self, key: u64) -> i64 {
        self.state.lock().counts.get(&key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.state.lock().instances.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every instance. Returns how many were held.
    pub fn reset(&self) -> usize {
        let instances = {
            let mut state = self.state.lock();
            state.counts.clear();
            std::mem::take(&mut state.instances)
        };
        instances.len()
    }
}

fn entry_for<T>(object: &TraitObject<T>) -> Entry
where
    T: ?Sized + Send + Sync + 'static,
{
    Entry {
        object: Box::new(Arc::clone(object.implementation())),
        type_name: type_name::<T>(),
    }
}

#[inline]
pub(crate) fn key_to_pointer(key: u64) -> *mut c_void {
    key as usize as *mut c_void
}

#[inline]
pub(crate) fn pointer_to_key(pointer: *const c_void) -> u64 {
    pointer as usize as u64
}
