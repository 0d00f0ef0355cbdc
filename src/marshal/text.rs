//! String and byte-slice carriers

use std::fmt;
use std::ptr;
use std::slice;

use crate::errors::MarshalError;
use crate::ownership::{NativeClone, NativePayload};

/// UTF-8 text passed by pointer and length. When `chars_is_owned` is set the
/// bytes belong to this value and are freed on release.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Str {
    pub chars: *const u8,
    pub len: usize,
    pub chars_is_owned: bool,
}

// SAFETY: the bytes are immutable while the carrier exists
unsafe impl Send for Str {}
unsafe impl Sync for Str {}

impl Str {
    /// Borrow static text; never freed
    pub const fn from_static(text: &'static str) -> Self {
        Self {
            chars: text.as_ptr(),
            len: text.len(),
            chars_is_owned: false,
        }
    }

    /// Borrow `text` for the duration of a native call. The caller keeps
    /// `text` alive while the carrier is in use.
    pub fn borrowed(text: &str) -> Self {
        Self {
            chars: text.as_ptr(),
            len: text.len(),
            chars_is_owned: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.chars.is_null() || self.len == 0 {
            return &[];
        }
        // SAFETY: non-null chars point at `len` bytes that live at least as
        // long as this carrier
        unsafe { slice::from_raw_parts(self.chars, self.len) }
    }

    pub fn as_str(&self) -> Result<&str, MarshalError> {
        Ok(std::str::from_utf8(self.as_bytes())?)
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl From<String> for Str {
    fn from(text: String) -> Self {
        if text.is_empty() {
            return Self::from_static("");
        }
        let len = text.len();
        let chars = Box::into_raw(text.into_bytes().into_boxed_slice()) as *const u8;
        Self {
            chars,
            len,
            chars_is_owned: true,
        }
    }
}

impl From<&str> for Str {
    fn from(text: &str) -> Self {
        text.to_owned().into()
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl NativePayload for Str {
    unsafe fn release(&mut self) {
        if self.chars_is_owned && !self.chars.is_null() {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.chars as *mut u8,
                self.len,
            )));
        }
        self.chars = ptr::null();
        self.len = 0;
        self.chars_is_owned = false;
    }
}

impl NativeClone for Str {
    fn native_clone(&self) -> Self {
        self.as_bytes().to_vec().into_boxed_slice().into()
    }

    fn is_native_owned(&self) -> bool {
        self.chars_is_owned
    }
}

impl From<Box<[u8]>> for Str {
    fn from(bytes: Box<[u8]>) -> Self {
        if bytes.is_empty() {
            return Self::from_static("");
        }
        let len = bytes.len();
        Self {
            chars: Box::into_raw(bytes) as *const u8,
            len,
            chars_is_owned: true,
        }
    }
}

/// Borrowed bytes. Never owns its buffer.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct U8Slice {
    pub data: *const u8,
    pub datalen: usize,
}

// SAFETY: read-only view
unsafe impl Send for U8Slice {}
unsafe impl Sync for U8Slice {}

impl U8Slice {
    /// View `bytes`; the caller keeps them alive for as long as the slice is
    /// read
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            datalen: bytes.len(),
        }
    }

    /// # Safety
    /// The viewed buffer must still be alive and unmodified for `'a`.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.data.is_null() || self.datalen == 0 {
            return &[];
        }
        slice::from_raw_parts(self.data, self.datalen)
    }
}

impl fmt::Debug for U8Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("U8Slice")
            .field("data", &self.data)
            .field("datalen", &self.datalen)
            .finish()
    }
}

impl NativePayload for U8Slice {
    #[inline]
    unsafe fn release(&mut self) {}
}
