//! Guarded element buffer
//!
//! A contiguous, heap-allocated array of 8-byte slots. Elements are stored as
//! their `f64` bit patterns. When guards are enabled, one extra slot on each
//! side holds [`GUARD`], so a write that runs off either end of the element
//! region lands on a sentinel instead of foreign memory.
//!
//! ```text
//! guarded:    ┌───────┬──────┬──────┬─────┬──────────┬───────┐
//!             │ GUARD │  e0  │  e1  │ ... │ e(cap-1) │ GUARD │
//!             └───────┴──────┴──────┴─────┴──────────┴───────┘
//!                      ↑ element region starts here
//!
//! unguarded:  ┌──────┬──────┬─────┬──────────┐
//!             │  e0  │  e1  │ ... │ e(cap-1) │
//!             └──────┴──────┴─────┴──────────┘
//! ```
//!
//! All reads go through bounds-checked slice access. Allocation uses
//! `try_reserve_exact`, so an exhausted allocator is reported as
//! [`StackError::AllocationFailure`] instead of aborting.

use crate::config::{Elem, GUARD};
use crate::error::{Result, StackError};

#[cfg(test)]
thread_local! {
    static FAIL_NEXT_RESIZE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Make the next `resize` on this thread fail with `AllocationFailure`
#[cfg(test)]
pub(crate) fn fail_next_resize() {
    FAIL_NEXT_RESIZE.with(|flag| flag.set(true));
}

/// Size of one slot in bytes
pub(crate) const SLOT_SIZE: usize = std::mem::size_of::<u64>();

pub(crate) struct GuardedBuffer {
    slots: Vec<u64>,
    guarded: bool,
}

impl GuardedBuffer {
    /// Allocate `capacity` element slots, each set to `fill`
    pub(crate) fn allocate(capacity: usize, guarded: bool, fill: u64) -> Result<Self> {
        let guard_slots = if guarded { 2 } else { 0 };
        let total = capacity
            .checked_add(guard_slots)
            .ok_or(StackError::AllocationFailure)?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(total)
            .map_err(|_| StackError::AllocationFailure)?;

        if guarded {
            slots.push(GUARD);
        }
        slots.resize(slots.len() + capacity, fill);
        if guarded {
            slots.push(GUARD);
        }

        Ok(GuardedBuffer { slots, guarded })
    }

    #[inline(always)]
    fn offset(&self) -> usize {
        usize::from(self.guarded)
    }

    /// Number of element slots (guards excluded)
    pub(crate) fn element_slots(&self) -> usize {
        self.slots.len().saturating_sub(2 * self.offset())
    }

    /// Element region as raw bit patterns
    pub(crate) fn elements(&self) -> &[u64] {
        let off = self.offset();
        self.slots
            .get(off..off + self.element_slots())
            .unwrap_or(&[])
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<Elem> {
        self.elements().get(index).copied().map(f64::from_bits)
    }

    /// Store `value` at `index`. Returns false if `index` is outside the element region.
    #[inline]
    pub(crate) fn set(&mut self, index: usize, value: Elem) -> bool {
        self.set_bits(index, value.to_bits())
    }

    fn set_bits(&mut self, index: usize, bits: u64) -> bool {
        if index >= self.element_slots() {
            return false;
        }
        let off = self.offset();
        self.slots[off + index] = bits;
        true
    }

    /// Overwrite every element slot with `fill`
    pub(crate) fn fill(&mut self, fill: u64) {
        let off = self.offset();
        let end = off + self.element_slots();
        self.slots[off..end].fill(fill);
    }

    /// Guard slot in front of the element region
    pub(crate) fn leading_guard(&self) -> Option<u64> {
        if self.guarded {
            self.slots.first().copied()
        } else {
            None
        }
    }

    /// Slot directly after `capacity` elements, where the trailing guard must be
    ///
    /// Located from the caller's view of the capacity, so a corrupted capacity
    /// field finds something other than the guard.
    pub(crate) fn guard_after(&self, capacity: usize) -> Option<u64> {
        if self.guarded {
            self.slots.get(self.offset() + capacity).copied()
        } else {
            None
        }
    }

    pub(crate) fn is_guarded(&self) -> bool {
        self.guarded
    }

    /// Address of element 0, for checksums and dumps
    pub(crate) fn address(&self) -> usize {
        self.slots.as_ptr() as usize + self.offset() * SLOT_SIZE
    }

    /// Reallocate to `new_capacity` element slots
    ///
    /// Existing elements up to `min(old, new)` are kept. New slots are set to
    /// `fill` and the trailing guard is rewritten after the last element. On
    /// reservation failure the buffer is left exactly as it was.
    pub(crate) fn resize(&mut self, new_capacity: usize, fill: u64) -> Result<()> {
        #[cfg(test)]
        if FAIL_NEXT_RESIZE.with(|flag| flag.replace(false)) {
            return Err(StackError::AllocationFailure);
        }

        let old_capacity = self.element_slots();
        let off = self.offset();

        if new_capacity > old_capacity {
            self.slots
                .try_reserve_exact(new_capacity - old_capacity)
                .map_err(|_| StackError::AllocationFailure)?;
        }

        self.slots.truncate(off + old_capacity.min(new_capacity));
        self.slots.resize(off + new_capacity, fill);
        if self.guarded {
            self.slots.push(GUARD);
        }
        if new_capacity < old_capacity {
            self.slots.shrink_to_fit();
        }
        Ok(())
    }

    /// Raw slot access, guards included
    #[cfg(test)]
    pub(crate) fn raw_mut(&mut self) -> &mut [u64] {
        &mut self.slots
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &[u64] {
        &self.slots
    }
}
