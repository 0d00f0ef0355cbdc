//! Host trait implementations with a process-unique identity

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use super::global;
use super::registry::Registry;
use crate::ownership::HandleId;

/// A host implementation of a callback trait, ready to be handed to native
/// code. Clones share the identity, and therefore the registry entry.
pub struct TraitObject<T: ?Sized + Send + Sync + 'static> {
    id: HandleId,
    imp: Arc<T>,
}

impl<T: ?Sized + Send + Sync + 'static> TraitObject<T> {
    pub fn new(imp: Arc<T>) -> Self {
        Self {
            id: HandleId::next(),
            imp,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn implementation(&self) -> &Arc<T> {
        &self.imp
    }

    /// Count a new native holder in the global registry
    pub fn activate(&self) -> i64 {
        self.activate_in(global(), false)
    }

    /// Register with the global registry, counting at most one holder
    pub fn activate_once(&self) -> i64 {
        self.activate_in(global(), true)
    }

    pub fn activate_in(&self, registry: &Registry, count_idempotently: bool) -> i64 {
        registry.cache_instance(self, count_idempotently)
    }

    /// The key native code uses to call back into this object. Does not
    /// count a holder; see [`activate`](Self::activate).
    pub fn opaque_key(&self) -> *mut c_void {
        global().expose(self)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Clone for TraitObject<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            imp: Arc::clone(&self.imp),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> From<Arc<T>> for TraitObject<T> {
    fn from(imp: Arc<T>) -> Self {
        Self::new(imp)
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for TraitObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitObject")
            .field("id", &self.id)
            .field("trait", &std::any::type_name::<T>())
            .finish()
    }
}
