//! Opaque struct carrier: an `inner` pointer plus an ownership bit

use std::fmt;
use std::ptr;

use crate::ownership::{Handle, NativeClone, NativePayload};

/// Pointer to a native object the host never looks inside. The object is
/// freed on release only when `is_owned` is set.
#[repr(C)]
pub struct Opaque<T> {
    pub inner: *mut T,
    pub is_owned: bool,
}

impl<T> Clone for Opaque<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Opaque<T> {}

// SAFETY: the native object is only reached through shared references
unsafe impl<T: Send + Sync> Send for Opaque<T> {}
unsafe impl<T: Send + Sync> Sync for Opaque<T> {}

impl<T> Opaque<T> {
    /// Box `value`; the carrier owns it
    pub fn new(value: T) -> Self {
        Self {
            inner: Box::into_raw(Box::new(value)),
            is_owned: true,
        }
    }

    pub const fn null() -> Self {
        Self {
            inner: ptr::null_mut(),
            is_owned: false,
        }
    }

    /// # Safety
    /// `inner` must be null or point at a live `T`; if `is_owned` it must
    /// have come from `Box::into_raw`.
    pub const unsafe fn from_raw(inner: *mut T, is_owned: bool) -> Self {
        Self { inner, is_owned }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: non-null inner points at a live `T` until release
        unsafe { self.inner.as_ref() }
    }

    /// Same object, different ownership bit
    pub fn with_ownership(self, is_owned: bool) -> Self {
        Self { is_owned, ..self }
    }
}

impl<T: fmt::Debug> fmt::Debug for Opaque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("inner", &self.get())
            .field("is_owned", &self.is_owned)
            .finish()
    }
}

impl<T: Send + Sync + 'static> NativePayload for Opaque<T> {
    unsafe fn release(&mut self) {
        if self.is_owned && !self.inner.is_null() {
            drop(Box::from_raw(self.inner));
        }
        self.inner = ptr::null_mut();
    }
}

impl<T: Clone + Send + Sync + 'static> NativeClone for Opaque<T> {
    fn native_clone(&self) -> Self {
        match self.get() {
            Some(value) => Self::new(value.clone()),
            None => Self::null(),
        }
    }

    fn is_native_owned(&self) -> bool {
        self.is_owned
    }
}

impl<T: Send + Sync + 'static> Handle<Opaque<T>> {
    /// Run `f` against the native object, keeping this handle alive for the
    /// duration
    pub fn with_inner<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let result = self.payload().get().map(f);
        self.keep_alive();
        result
    }
}
