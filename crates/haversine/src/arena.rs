//! Bounded bump allocation for parsed strings.
//!
//! The arena reserves its whole block up front and hands out byte slices by
//! advancing a cursor. Nothing is freed individually; [`Arena::reset`] drops
//! every allocation at once. Running past the capacity is an error rather
//! than a silent growth of the block.

use core::cell::Cell;

use bumpalo::Bump;

use crate::error::ArenaError;

/// Capacity used by [`Arena::default`].
pub const DEFAULT_ARENA_CAPACITY: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct Arena {
    bump: Bump,
    capacity: usize,
    used: Cell<usize>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }
}

impl Arena {
    /// Creates an arena that will hand out at most `capacity` bytes between
    /// resets.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bump: Bump::with_capacity(capacity),
            capacity,
            used: Cell::new(0),
        }
    }

    /// Copies `bytes` into the arena.
    ///
    /// The returned slice lives as long as the borrow of the arena, so it can
    /// never be observed after a [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::OutOfMemory`] when the copy would take the arena
    /// past its capacity. The arena is left unchanged in that case.
    pub fn alloc_bytes(&self, bytes: &[u8]) -> Result<&[u8], ArenaError> {
        let requested = bytes.len();
        let used = self.used.get();
        let Some(end) = used
            .checked_add(requested)
            .filter(|end| *end <= self.capacity)
        else {
            return Err(ArenaError::OutOfMemory {
                requested,
                used,
                capacity: self.capacity,
            });
        };

        self.used.set(end);
        Ok(self.bump.alloc_slice_copy(bytes))
    }

    /// Rewinds the cursor to the start of the block.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.used.set(0);
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used.get()
    }
}
