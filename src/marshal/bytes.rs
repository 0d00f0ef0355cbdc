//! Fixed-size arrays passed by value across the C boundary

use std::fmt;

use crate::errors::MarshalError;
use crate::ownership::{NativeClone, NativePayload};

/// `N` elements of `T`, laid out exactly like a C array member.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedArray<T: Copy, const N: usize> {
    pub data: [T; N],
}

/// `N` raw bytes (keys, hashes, signatures)
pub type FixedBytes<const N: usize> = FixedArray<u8, N>;

pub type ThreeBytes = FixedBytes<3>;
pub type FourBytes = FixedBytes<4>;
pub type TwelveBytes = FixedBytes<12>;
pub type SixteenBytes = FixedBytes<16>;
pub type TwentyBytes = FixedBytes<20>;
pub type ThirtyTwoBytes = FixedBytes<32>;
pub type ThirtyThreeBytes = FixedBytes<33>;
pub type SixtyFourBytes = FixedBytes<64>;
pub type SixtyEightBytes = FixedBytes<68>;
pub type EightyBytes = FixedBytes<80>;

/// 32 16-bit words
pub type U16Array32 = FixedArray<u16, 32>;

impl<T: Copy, const N: usize> FixedArray<T, N> {
    pub const LEN: usize = N;

    #[inline]
    pub const fn new(data: [T; N]) -> Self {
        Self { data }
    }

    /// Copy from a slice that must hold exactly `N` elements
    pub fn from_slice(slice: &[T]) -> Result<Self, MarshalError> {
        let data = <[T; N]>::try_from(slice).map_err(|_| MarshalError::LengthMismatch {
            expected: N,
            found: slice.len(),
        })?;
        Ok(Self { data })
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.to_vec()
    }

    #[inline]
    pub const fn into_inner(self) -> [T; N] {
        self.data
    }
}

impl<T: Copy + Default, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self {
            data: [T::default(); N],
        }
    }
}

impl<T: Copy, const N: usize> From<[T; N]> for FixedArray<T, N> {
    fn from(data: [T; N]) -> Self {
        Self { data }
    }
}

impl<T: Copy, const N: usize> From<FixedArray<T, N>> for [T; N] {
    fn from(array: FixedArray<T, N>) -> Self {
        array.data
    }
}

impl<T: Copy, const N: usize> TryFrom<&[T]> for FixedArray<T, N> {
    type Error = MarshalError;

    fn try_from(slice: &[T]) -> Result<Self, Self::Error> {
        Self::from_slice(slice)
    }
}

impl<T: Copy + fmt::Debug, const N: usize> fmt::Debug for FixedArray<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.data.iter()).finish()
    }
}

impl<const N: usize> fmt::LowerHex for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.data {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl<T: Copy + Send + Sync + 'static, const N: usize> NativePayload for FixedArray<T, N> {
    #[inline]
    unsafe fn release(&mut self) {}
}

impl<T: Copy + Send + Sync + 'static, const N: usize> NativeClone for FixedArray<T, N> {
    #[inline]
    fn native_clone(&self) -> Self {
        *self
    }
}

/// A 5-bit value (bech32 character) carried in a byte
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct U5(u8);

impl U5 {
    pub const MAX: u8 = 31;

    pub fn new(value: u8) -> Result<Self, MarshalError> {
        if value > Self::MAX {
            return Err(MarshalError::OutOfRange {
                kind: "u5",
                value: u64::from(value),
                max: u64::from(Self::MAX),
            });
        }
        Ok(Self(value))
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for U5 {
    type Error = MarshalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<U5> for u8 {
    fn from(value: U5) -> Self {
        value.0
    }
}

impl NativePayload for U5 {
    #[inline]
    unsafe fn release(&mut self) {}
}

impl NativeClone for U5 {
    #[inline]
    fn native_clone(&self) -> Self {
        *self
    }
}
