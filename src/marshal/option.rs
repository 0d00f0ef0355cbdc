//! Tagged optional carrier

use std::fmt;
use std::mem::MaybeUninit;

use crate::errors::MarshalError;
use crate::ownership::{Handle, NativeClone, NativePayload};

pub const TAG_NONE: u32 = 0;
pub const TAG_SOME: u32 = 1;

/// `Option<T>` as a C tagged union. `some` is initialized iff
/// `tag == TAG_SOME`; any other tag is rejected on decode.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct COption<T: Copy> {
    pub tag: u32,
    pub some: MaybeUninit<T>,
}

impl<T: Copy> COption<T> {
    pub const fn some(value: T) -> Self {
        Self {
            tag: TAG_SOME,
            some: MaybeUninit::new(value),
        }
    }

    pub const fn none() -> Self {
        Self {
            tag: TAG_NONE,
            some: MaybeUninit::uninit(),
        }
    }

    pub fn is_some(&self) -> bool {
        self.tag == TAG_SOME
    }

    pub fn is_none(&self) -> bool {
        self.tag == TAG_NONE
    }

    /// Borrow the value, validating the tag
    pub fn as_option(&self) -> Result<Option<&T>, MarshalError> {
        match self.tag {
            TAG_NONE => Ok(None),
            // SAFETY: the tag says the value was written
            TAG_SOME => Ok(Some(unsafe { self.some.assume_init_ref() })),
            tag => Err(MarshalError::InvalidTag { kind: "option", tag }),
        }
    }

    pub fn to_option(&self) -> Result<Option<T>, MarshalError> {
        self.as_option().map(|value| value.copied())
    }
}

impl<T: Copy> Default for COption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Copy> From<Option<T>> for COption<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::some(value),
            None => Self::none(),
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for COption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_option() {
            Ok(Some(value)) => f.debug_tuple("COption::Some").field(value).finish(),
            Ok(None) => f.write_str("COption::None"),
            Err(_) => write!(f, "COption::<invalid tag {}>", self.tag),
        }
    }
}

impl<T: NativePayload> NativePayload for COption<T> {
    unsafe fn release(&mut self) {
        if self.tag == TAG_SOME {
            self.some.assume_init_mut().release();
            self.tag = TAG_NONE;
        }
    }
}

impl<T: NativeClone> NativeClone for COption<T> {
    fn native_clone(&self) -> Self {
        match self.as_option() {
            Ok(Some(value)) => Self::some(value.native_clone()),
            _ => Self::none(),
        }
    }

    fn is_native_owned(&self) -> bool {
        match self.as_option() {
            Ok(Some(value)) => value.is_native_owned(),
            _ => true,
        }
    }
}

impl<T: NativePayload> Handle<COption<T>> {
    /// View of the contained value, anchored to this option
    #[track_caller]
    pub fn value(&self) -> Result<Option<Handle<T>>, MarshalError> {
        match self.payload().to_option()? {
            Some(value) => Ok(Some(Handle::borrowed(value, self))),
            None => Ok(None),
        }
    }
}
