use core::ops::{Deref, DerefMut};

/// Storage that is either borrowed from the caller or owned (with `std`).
///
/// Setup code passes preallocated memory into the stack instead of the
/// stack choosing at runtime. On hosted targets (tests, tooling) a `Vec`
/// can be used in the same position.
#[derive(Debug)]
pub enum Slice<'a, T> {
    /// No storage at all.
    Empty,
    /// Borrowed caller storage.
    Borrowed(&'a mut [T]),
    /// Owned storage, only constructible with the `std` feature.
    #[cfg(feature = "std")]
    Owned(Vec<T>),
}

impl<'a, T> Slice<'a, T> {
    /// A slice with zero capacity.
    pub fn empty() -> Self {
        Slice::Empty
    }

    /// View the storage as a shared slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Slice::Empty => &[],
            Slice::Borrowed(slice) => slice,
            #[cfg(feature = "std")]
            Slice::Owned(vec) => vec.as_slice(),
        }
    }

    /// View the storage as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Slice::Empty => &mut [],
            Slice::Borrowed(slice) => slice,
            #[cfg(feature = "std")]
            Slice::Owned(vec) => vec.as_mut_slice(),
        }
    }

    /// The number of elements the storage can hold.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, T> Default for Slice<'a, T> {
    fn default() -> Self {
        Slice::Empty
    }
}

impl<'a, T> From<&'a mut [T]> for Slice<'a, T> {
    fn from(slice: &'a mut [T]) -> Self {
        Slice::Borrowed(slice)
    }
}

#[cfg(feature = "std")]
impl<T> From<Vec<T>> for Slice<'_, T> {
    fn from(vec: Vec<T>) -> Self {
        Slice::Owned(vec)
    }
}

impl<T> Deref for Slice<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Slice<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}
