//! Marshalling - C-layout carriers for values crossing the binding boundary
//!
//! Design: every carrier is `#[repr(C)]`, `Copy`, and owns nothing in Rust's
//! eyes. Heap buffers behind a carrier are freed only through
//! [`NativePayload::release`], which is what lets the ownership tracker decide
//! exactly once whether a buffer gets freed. Decoding is checked: a wrong
//! length or an unknown tag is a [`MarshalError`](crate::errors::MarshalError),
//! never undefined behavior.

mod bytes;
mod opaque;
mod option;
mod result;
mod text;
mod tuple;
mod vec;

#[cfg(test)]
mod tests;

pub use bytes::{
    EightyBytes, FixedArray, FixedBytes, FourBytes, SixteenBytes, SixtyEightBytes,
    SixtyFourBytes, ThirtyThreeBytes, ThirtyTwoBytes, ThreeBytes, TwelveBytes, TwentyBytes,
    U16Array32, U5,
};
pub use opaque::Opaque;
pub use option::{COption, TAG_NONE, TAG_SOME};
pub use result::{CResult, CResultPtr};
pub use text::{Str, U8Slice};
pub use tuple::{C2Tuple, C3Tuple};
pub use vec::CVec;

use crate::ownership::{NativeClone, NativePayload};

/// Scalars own no native resources
macro_rules! impl_plain_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NativePayload for $ty {
                #[inline]
                unsafe fn release(&mut self) {}
            }

            impl NativeClone for $ty {
                #[inline]
                fn native_clone(&self) -> Self {
                    *self
                }
            }
        )*
    };
}

impl_plain_payload!(u8, u16, u32, u64, usize, i8, i16, i32, i64, bool, ());
