use core::ops::{Deref, DerefMut};

/// Refer to an initialized prefix of some container.
///
/// This turns a statically sized backing buffer into a growable list.
/// Contrary to `Vec`, `push` returns a mutable reference into the storage
/// for the caller to fill instead of taking a value, so the element type
/// never needs to be constructed out of thin air.
#[derive(Debug)]
pub struct Partial<C> {
    inner: C,
    end: usize,
}

impl<C> Partial<C> {
    /// Make an instance that initially refers to an empty prefix.
    pub fn new(inner: C) -> Self {
        Partial { inner, end: 0 }
    }

    /// The current logical length.
    pub fn len(&self) -> usize {
        self.end
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }
}

impl<C, T> Partial<C>
    where C: Deref<Target=[T]>
{
    /// How many elements the backing storage can hold.
    pub fn capacity(&self) -> usize {
        self.inner.len()
    }

    /// The initialized prefix as a shared slice.
    pub fn as_slice(&self) -> &[T] {
        &self.inner[..self.end]
    }

    /// Iterate over the initialized elements.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<C, T> Partial<C>
    where C: Deref<Target=[T]> + DerefMut
{
    /// Extend the prefix by one element, returning it for initialization.
    ///
    /// Fails when the backing storage is exhausted. The returned element
    /// contains whatever the storage held at that position.
    pub fn push(&mut self) -> Option<&mut T> {
        if self.end < self.inner.len() {
            self.end += 1;
            Some(&mut self.inner[self.end - 1])
        } else {
            None
        }
    }

    /// The initialized prefix as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let end = self.end;
        &mut self.inner[..end]
    }

    /// Iterate mutably over the initialized elements.
    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }
}

impl<C, T> Deref for Partial<C>
    where C: Deref<Target=[T]>
{
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<C, T> DerefMut for Partial<C>
    where C: Deref<Target=[T]> + DerefMut
{
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::Slice;

    #[test]
    fn push_until_full() {
        let mut storage = [0u32; 3];
        let mut list = Partial::new(Slice::from(&mut storage[..]));

        for value in 0..3 {
            *list.push().unwrap() = value;
        }
        assert!(list.push().is_none());
        assert_eq!(list.as_slice(), &[0, 1, 2]);
    }
}
