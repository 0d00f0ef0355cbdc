//! Tuple carriers

use crate::ownership::{Handle, NativeClone, NativePayload};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct C2Tuple<A, B> {
    pub a: A,
    pub b: B,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct C3Tuple<A, B, C> {
    pub a: A,
    pub b: B,
    pub c: C,
}

impl<A, B> C2Tuple<A, B> {
    pub const fn new(a: A, b: B) -> Self {
        Self { a, b }
    }

    pub fn into_tuple(self) -> (A, B) {
        (self.a, self.b)
    }
}

impl<A, B, C> C3Tuple<A, B, C> {
    pub const fn new(a: A, b: B, c: C) -> Self {
        Self { a, b, c }
    }

    pub fn into_tuple(self) -> (A, B, C) {
        (self.a, self.b, self.c)
    }
}

impl<A, B> From<(A, B)> for C2Tuple<A, B> {
    fn from((a, b): (A, B)) -> Self {
        Self { a, b }
    }
}

impl<A, B, C> From<(A, B, C)> for C3Tuple<A, B, C> {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self { a, b, c }
    }
}

impl<A: NativePayload, B: NativePayload> NativePayload for C2Tuple<A, B> {
    unsafe fn release(&mut self) {
        self.a.release();
        self.b.release();
    }
}

impl<A: NativePayload, B: NativePayload, C: NativePayload> NativePayload for C3Tuple<A, B, C> {
    unsafe fn release(&mut self) {
        self.a.release();
        self.b.release();
        self.c.release();
    }
}

impl<A: NativeClone, B: NativeClone> NativeClone for C2Tuple<A, B> {
    fn native_clone(&self) -> Self {
        Self::new(self.a.native_clone(), self.b.native_clone())
    }
}

impl<A: NativeClone, B: NativeClone, C: NativeClone> NativeClone for C3Tuple<A, B, C> {
    fn native_clone(&self) -> Self {
        Self::new(
            self.a.native_clone(),
            self.b.native_clone(),
            self.c.native_clone(),
        )
    }
}

impl<A: NativePayload, B: NativePayload> Handle<C2Tuple<A, B>> {
    #[track_caller]
    pub fn a(&self) -> Handle<A> {
        Handle::borrowed(self.payload().a, self)
    }

    #[track_caller]
    pub fn b(&self) -> Handle<B> {
        Handle::borrowed(self.payload().b, self)
    }
}

impl<A: NativePayload, B: NativePayload, C: NativePayload> Handle<C3Tuple<A, B, C>> {
    #[track_caller]
    pub fn a(&self) -> Handle<A> {
        Handle::borrowed(self.payload().a, self)
    }

    #[track_caller]
    pub fn b(&self) -> Handle<B> {
        Handle::borrowed(self.payload().b, self)
    }

    #[track_caller]
    pub fn c(&self) -> Handle<C> {
        Handle::borrowed(self.payload().c, self)
    }
}
