use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

/// `HandlePool` hands out generational handles and answers whether a handle is
/// still alive. Freed slots are reused lowest-index first, which keeps the
/// slot range dense for the arenas built on top of it.
pub struct HandlePool<H: HandleLike> {
    versions: Vec<HandleIndex>,
    frees: BinaryHeap<Reverse<HandleIndex>>,
    _phantom: PhantomData<H>,
}

impl<H: HandleLike> Default for HandlePool<H> {
    fn default() -> Self {
        HandlePool::new()
    }
}

impl<H: HandleLike> HandlePool<H> {
    pub fn new() -> Self {
        HandlePool {
            versions: Vec::new(),
            frees: BinaryHeap::new(),
            _phantom: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HandlePool {
            versions: Vec::with_capacity(capacity),
            frees: BinaryHeap::new(),
            _phantom: PhantomData,
        }
    }

    /// Creates a fresh handle, recycling a freed slot when there is one.
    pub fn create(&mut self) -> H {
        match self.frees.pop() {
            Some(Reverse(index)) => {
                let version = &mut self.versions[index as usize];
                *version += 1;
                H::new(index, *version)
            }
            None => {
                self.versions.push(1);
                H::new(self.versions.len() as HandleIndex - 1, 1)
            }
        }
    }

    /// Returns true if `handle` was created by this pool and has not been freed yet.
    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        self.versions
            .get(handle.index() as usize)
            .map(|&v| v & 0x1 == 1 && v == handle.version())
            .unwrap_or(false)
    }

    /// Recycles the slot of `handle`. Returns false if it was already dead.
    pub fn free(&mut self, handle: H) -> bool {
        if !self.contains(handle) {
            return false;
        }

        self.versions[handle.index() as usize] += 1;
        self.frees.push(Reverse(handle.index()));
        true
    }

    /// Returns the number of alive handles.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees every handle at once.
    pub fn clear(&mut self) {
        for (i, v) in self.versions.iter_mut().enumerate() {
            if *v & 0x1 == 1 {
                *v += 1;
                self.frees.push(Reverse(i as HandleIndex));
            }
        }
    }

    /// Returns an iterator over alive handles in slot order.
    #[inline]
    pub fn iter(&self) -> Iter<H> {
        Iter {
            versions: &self.versions,
            cursor: 0,
            _phantom: PhantomData,
        }
    }
}

pub struct Iter<'a, H: HandleLike> {
    versions: &'a [HandleIndex],
    cursor: usize,
    _phantom: PhantomData<H>,
}

impl<'a, H: HandleLike> Iterator for Iter<'a, H> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        while self.cursor < self.versions.len() {
            let index = self.cursor;
            self.cursor += 1;

            let v = self.versions[index];
            if v & 0x1 == 1 {
                return Some(H::new(index as HandleIndex, v));
            }
        }

        None
    }
}
