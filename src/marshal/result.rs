//! Result carrier: a success flag plus one heap cell for whichever branch
//! is populated

use std::fmt;
use std::ptr;

use crate::errors::MarshalError;
use crate::ownership::{Handle, NativeClone, NativePayload};

#[repr(C)]
pub union CResultPtr<O, E> {
    pub result: *mut O,
    pub err: *mut E,
}

impl<O, E> Clone for CResultPtr<O, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, E> Copy for CResultPtr<O, E> {}

/// `Result<O, E>` as the native library passes it. Exactly one branch is
/// populated, selected by `result_ok`.
#[repr(C)]
pub struct CResult<O, E> {
    pub contents: CResultPtr<O, E>,
    pub result_ok: bool,
}

impl<O, E> Clone for CResult<O, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, E> Copy for CResult<O, E> {}

// SAFETY: the pointed-to branch is uniquely owned by the carrier, so moving or
// sharing the carrier moves or shares an `O` or an `E`.
unsafe impl<O: Send, E: Send> Send for CResult<O, E> {}
unsafe impl<O: Sync, E: Sync> Sync for CResult<O, E> {}

impl<O, E> CResult<O, E> {
    pub fn ok(value: O) -> Self {
        Self {
            contents: CResultPtr {
                result: Box::into_raw(Box::new(value)),
            },
            result_ok: true,
        }
    }

    pub fn err(error: E) -> Self {
        Self {
            contents: CResultPtr {
                err: Box::into_raw(Box::new(error)),
            },
            result_ok: false,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result_ok
    }

    /// The success value, or `None` if this is an error
    pub fn value(&self) -> Option<&O> {
        if !self.result_ok {
            return None;
        }
        // SAFETY: `result_ok` selects the `result` field; a non-null pointer
        // came from `Box::into_raw` and lives until `release`.
        unsafe { self.contents.result.as_ref() }
    }

    /// The error value, or `None` if this is a success
    pub fn error(&self) -> Option<&E> {
        if self.result_ok {
            return None;
        }
        // SAFETY: as in `value`, with the `err` field selected
        unsafe { self.contents.err.as_ref() }
    }

    /// Copy the populated branch out
    pub fn to_result(&self) -> Result<Result<O, E>, MarshalError>
    where
        O: Copy,
        E: Copy,
    {
        match (self.value(), self.error()) {
            (Some(value), _) => Ok(Ok(*value)),
            (_, Some(error)) => Ok(Err(*error)),
            (None, None) => Err(MarshalError::NullPointer { kind: "result" }),
        }
    }
}

impl<O, E> From<Result<O, E>> for CResult<O, E> {
    fn from(result: Result<O, E>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }
}

impl<O: fmt::Debug, E: fmt::Debug> fmt::Debug for CResult<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value(), self.error()) {
            (Some(value), _) => f.debug_tuple("CResult::Ok").field(value).finish(),
            (_, Some(error)) => f.debug_tuple("CResult::Err").field(error).finish(),
            (None, None) => f.write_str("CResult::<empty>"),
        }
    }
}

impl<O: NativePayload, E: NativePayload> NativePayload for CResult<O, E> {
    unsafe fn release(&mut self) {
        if self.result_ok {
            let cell = self.contents.result;
            if !cell.is_null() {
                (*cell).release();
                drop(Box::from_raw(cell));
            }
            self.contents.result = ptr::null_mut();
        } else {
            let cell = self.contents.err;
            if !cell.is_null() {
                (*cell).release();
                drop(Box::from_raw(cell));
            }
            self.contents.err = ptr::null_mut();
        }
    }
}

impl<O: NativeClone, E: NativeClone> NativeClone for CResult<O, E> {
    fn native_clone(&self) -> Self {
        match (self.value(), self.error()) {
            (Some(value), _) => Self::ok(value.native_clone()),
            (_, Some(error)) => Self::err(error.native_clone()),
            (None, None) => *self,
        }
    }
}

impl<O: NativePayload, E: NativePayload> Handle<CResult<O, E>> {
    pub fn is_ok(&self) -> bool {
        self.payload().is_ok()
    }

    /// View of the success value, anchored to this result
    #[track_caller]
    pub fn value(&self) -> Option<Handle<O>> {
        match self.payload().value() {
            Some(value) => Some(Handle::borrowed(*value, self)),
            None => None,
        }
    }

    /// View of the error value, anchored to this result
    #[track_caller]
    pub fn error(&self) -> Option<Handle<E>> {
        match self.payload().error() {
            Some(error) => Some(Handle::borrowed(*error, self)),
            None => None,
        }
    }
}
