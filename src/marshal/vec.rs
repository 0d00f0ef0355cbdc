//! Vector carrier: pointer plus element count

use std::fmt;
use std::ptr;
use std::slice;

use crate::ownership::{Handle, NativeClone, NativePayload};

/// A heap buffer of `datalen` elements. An empty vector has null `data`.
///
/// Buffers are allocated as boxed slices, so `release` must see exactly the
/// length they were created with.
#[repr(C)]
pub struct CVec<T> {
    pub data: *mut T,
    pub datalen: usize,
}

impl<T> Clone for CVec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CVec<T> {}

// SAFETY: the buffer is uniquely owned by the carrier
unsafe impl<T: Send> Send for CVec<T> {}
unsafe impl<T: Sync> Sync for CVec<T> {}

impl<T> CVec<T> {
    pub const fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            datalen: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.datalen
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.datalen == 0
    }

    pub fn as_slice(&self) -> &[T] {
        if self.data.is_null() || self.datalen == 0 {
            return &[];
        }
        // SAFETY: non-null data points at `datalen` initialized elements
        // that live until `release`
        unsafe { slice::from_raw_parts(self.data, self.datalen) }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Copy,
    {
        self.as_slice().to_vec()
    }

    /// Free the buffer without touching the elements
    ///
    /// # Safety
    /// The buffer must have come from `From<Vec<T>>` (or the same allocator
    /// and layout) and must not be used afterwards.
    pub(crate) unsafe fn free_buffer(&mut self) {
        if !self.data.is_null() {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.data,
                self.datalen,
            )));
        }
        self.data = ptr::null_mut();
        self.datalen = 0;
    }
}

impl<T> Default for CVec<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for CVec<T> {
    fn from(elements: Vec<T>) -> Self {
        if elements.is_empty() {
            return Self::empty();
        }
        let datalen = elements.len();
        let data = Box::into_raw(elements.into_boxed_slice()) as *mut T;
        Self { data, datalen }
    }
}

impl<T: Copy> FromIterator<T> for CVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<T: fmt::Debug> fmt::Debug for CVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: NativePayload> NativePayload for CVec<T> {
    unsafe fn release(&mut self) {
        if !self.data.is_null() {
            for element in slice::from_raw_parts_mut(self.data, self.datalen) {
                element.release();
            }
        }
        self.free_buffer();
    }
}

impl<T: NativeClone> NativeClone for CVec<T> {
    fn native_clone(&self) -> Self {
        self.as_slice()
            .iter()
            .map(NativeClone::native_clone)
            .collect()
    }
}

impl<T: NativePayload> Handle<CVec<T>> {
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// View of one element, anchored to this vector
    #[track_caller]
    pub fn get(&self, index: usize) -> Option<Handle<T>> {
        match self.payload().get(index) {
            Some(element) => Some(Handle::borrowed(*element, self)),
            None => None,
        }
    }

    /// Views of every element in order, each anchored to this vector
    #[track_caller]
    pub fn elements(&self) -> Vec<Handle<T>> {
        let mut views = Vec::with_capacity(self.len());
        for element in self.payload().as_slice() {
            views.push(Handle::borrowed(*element, self));
        }
        views
    }
}
