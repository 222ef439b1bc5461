//! Guarded Stack Implementation
//!
//! A resizable LIFO buffer of [`Elem`] values that re-verifies itself before
//! and after every mutating operation.
//!
//! ## Layout
//!
//! ```text
//! GuardedStack
//! ┌───────────────┬────────┬──────┬──────────┬───────────┬───────────┬────────────────┐
//! │ leading_guard │ buffer │ size │ capacity │ struct cs │ content cs│ trailing_guard │
//! └───────────────┴───┬────┴──────┴──────────┴───────────┴───────────┴────────────────┘
//!                     │
//!                     ▼
//!      ┌───────┬──────┬──────┬─────┬──────────┬───────┐
//!      │ GUARD │  e0  │  e1  │ ... │ e(cap-1) │ GUARD │
//!      └───────┴──────┴──────┴─────┴──────────┴───────┘
//!                             ↑ size (next free slot)
//! ```
//!
//! ## Operation protocol
//!
//! - Verify guards and fields (see `validate`), then checksums
//! - Grow on full push, shrink opportunistically on pop (see `capacity`)
//! - Mutate, recompute checksums, verify again
//!
//! Any failure is dumped to the diagnostic sink at the point of detection and
//! returned to the caller. A stack that reported a corruption-class error
//! should be disposed and abandoned.

mod capacity;
mod validate;

use std::panic::Location;

use tracing::{debug, error};

use crate::buffer::GuardedBuffer;
use crate::config::{DEFAULT_CAPACITY, Elem, GUARD, POISON, StackConfig, is_poison, poison_bits};
use crate::diagnostics::{self, SlotLine, StackSnapshot};
use crate::error::{Result, StackError};

/// Self-verifying LIFO stack
pub struct GuardedStack {
    leading_guard: u64,
    buffer: Option<GuardedBuffer>,
    size: isize,
    capacity: isize,
    config: StackConfig,
    structure_checksum: u32,
    content_checksum: u32,
    origin: &'static Location<'static>,
    trailing_guard: u64,
}

impl GuardedStack {
    /// Create a stack with [`DEFAULT_CAPACITY`] and the default configuration
    #[track_caller]
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_CAPACITY, StackConfig::default())
    }

    /// Create a stack with room for `capacity` elements
    #[track_caller]
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(capacity, StackConfig::default())
    }

    /// Create a stack with explicit integrity settings
    ///
    /// The call site is recorded as the stack's origin for diagnostic dumps.
    #[track_caller]
    pub fn with_config(capacity: usize, config: StackConfig) -> Result<Self> {
        let origin = Location::caller();

        let signed_capacity = isize::try_from(capacity).map_err(|_| {
            diagnostics::report_failure(StackError::AllocationFailure, origin, capacity);
            StackError::AllocationFailure
        })?;

        let fill = if config.poison { poison_bits() } else { 0 };
        let buffer = GuardedBuffer::allocate(capacity, config.guards, fill).map_err(|e| {
            diagnostics::report_failure(e, origin, capacity);
            e
        })?;

        let guard = if config.guards { GUARD } else { 0 };
        let mut stack = GuardedStack {
            leading_guard: guard,
            buffer: Some(buffer),
            size: 0,
            capacity: signed_capacity,
            config,
            structure_checksum: 0,
            content_checksum: 0,
            origin,
            trailing_guard: guard,
        };
        stack.update_checksums();
        stack.verify().map_err(|e| stack.fail(e, origin))?;

        debug!(
            capacity,
            guards = config.guards,
            checksums = config.checksums,
            poison = config.poison,
            "stack initialized at {}",
            origin
        );
        Ok(stack)
    }

    /// Push an element, growing the buffer if it is full
    ///
    /// On any error the stack's size is unchanged.
    #[track_caller]
    pub fn push(&mut self, value: Elem) -> Result<()> {
        let site = Location::caller();
        self.check(site)?;

        if self.size == self.capacity {
            let factor = self.config.growth_factor;
            self.resize(factor).map_err(|e| self.fail(e, site))?;
        }

        let index = self.size as usize;
        let written = self.buffer.as_mut().is_some_and(|b| b.set(index, value));
        if !written {
            return Err(self.fail(StackError::SizeExceedsCapacity, site));
        }
        self.size += 1;

        self.update_checksums();
        self.verify().map_err(|e| self.fail(e, site))
    }

    /// Pop the most recently pushed element
    ///
    /// May shrink the buffer first; a failed shrink is logged and ignored.
    #[track_caller]
    pub fn pop(&mut self) -> Result<Elem> {
        let site = Location::caller();
        self.check(site)?;

        if self.size == 0 {
            return Err(self.fail(StackError::PopOutOfRange, site));
        }

        self.maybe_shrink();

        let top = (self.size - 1) as usize;
        let value = match self.buffer.as_ref().and_then(|b| b.get(top)) {
            Some(value) => value,
            None => return Err(self.fail(StackError::SizeExceedsCapacity, site)),
        };
        if self.config.poison {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.set(top, POISON);
            }
        }
        self.size -= 1;

        self.update_checksums();
        self.verify().map_err(|e| self.fail(e, site))?;
        Ok(value)
    }

    /// Read the top element without removing it
    #[track_caller]
    pub fn peek(&self) -> Result<Elem> {
        let site = Location::caller();
        self.check(site)?;

        if self.size == 0 {
            return Err(self.fail(StackError::PopOutOfRange, site));
        }
        self.buffer
            .as_ref()
            .and_then(|b| b.get((self.size - 1) as usize))
            .ok_or_else(|| self.fail(StackError::SizeExceedsCapacity, site))
    }

    /// Poison every slot and release the buffer
    ///
    /// If verification fails the buffer is still released, after the dump,
    /// and the error is returned. Any later operation reports
    /// [`StackError::NullBuffer`].
    #[track_caller]
    pub fn dispose(&mut self) -> Result<()> {
        let site = Location::caller();
        let (result, _released) = self.dispose_at(site);
        result
    }

    fn dispose_at(&mut self, site: &'static Location<'static>) -> (Result<()>, Option<GuardedBuffer>) {
        if let Err(e) = self.verify() {
            self.fail(e, site);
            return (Err(e), self.release());
        }

        if self.config.poison {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.fill(poison_bits());
            }
        }
        debug!(capacity = self.capacity, "stack disposed at {}", site);
        (Ok(()), self.release())
    }

    fn release(&mut self) -> Option<GuardedBuffer> {
        let buffer = self.buffer.take();
        self.size = 0;
        self.capacity = 0;
        self.update_checksums();
        buffer
    }

    /// Write a diagnostic dump of the current state to the sink
    #[track_caller]
    pub fn dump(&self, error: Option<StackError>) {
        diagnostics::emit(&self.snapshot(error, Location::caller()));
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        usize::try_from(self.size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size <= 0
    }

    /// Allocated element slots
    pub fn capacity(&self) -> usize {
        usize::try_from(self.capacity).unwrap_or(0)
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Call site that created this stack
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// True once the buffer has been released
    pub fn is_disposed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Verify structure and checksums, dumping on failure
    pub(crate) fn check(&self, site: &'static Location<'static>) -> Result<()> {
        self.verify()
            .and_then(|()| self.verify_checksums())
            .map_err(|e| self.fail(e, site))
    }

    /// Dump `error` to the sink and hand it back for propagation
    fn fail(&self, error: StackError, site: &'static Location<'static>) -> StackError {
        if error.is_corruption() {
            error!(code = error.code(), "stack corruption detected at {}: {}", site, error);
        } else {
            debug!(code = error.code(), "stack operation failed at {}: {}", site, error);
        }
        diagnostics::emit(&self.snapshot(Some(error), site));
        error
    }

    fn fill_bits(&self) -> u64 {
        if self.config.poison { poison_bits() } else { 0 }
    }

    /// Capture the state shown in a dump
    ///
    /// Slots are only read when `error` does not mark the buffer unsafe, and
    /// never beyond the buffer's real length.
    pub(crate) fn snapshot(
        &self,
        error: Option<StackError>,
        site: &'static Location<'static>,
    ) -> StackSnapshot {
        let read_slots = !error.is_some_and(StackError::buffer_unsafe_to_read);
        let guards = self.config.guards;

        let slots = match (&self.buffer, read_slots) {
            (Some(buffer), true) => {
                let shown = self.capacity().min(buffer.element_slots());
                let lines = (0..shown)
                    .filter_map(|index| {
                        buffer.get(index).map(|value| SlotLine {
                            index,
                            cursor: index as isize == self.size,
                            poisoned: is_poison(value),
                            value,
                        })
                    })
                    .collect();
                Some(lines)
            }
            _ => None,
        };

        StackSnapshot {
            stack_address: self as *const Self as usize,
            origin: origin_string(self.origin),
            site: origin_string(site),
            error_code: error.map_or(crate::error::NO_ERROR, StackError::code),
            error_symbol: error.map_or("NO_ERROR", StackError::symbol),
            structure_guards: guards.then_some((self.leading_guard, self.trailing_guard)),
            size: self.size as i64,
            capacity: self.capacity as i64,
            buffer_address: self.buffer.as_ref().map(GuardedBuffer::address),
            buffer_guards: match (&self.buffer, read_slots) {
                (Some(buffer), true) if buffer.is_guarded() => Some((
                    buffer.leading_guard(),
                    buffer.guard_after(buffer.element_slots()),
                )),
                _ => None,
            },
            slots,
        }
    }
}

fn origin_string(location: &Location<'_>) -> String {
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}

#[cfg(test)]
impl GuardedStack {
    /// Raw buffer slots, guards included, for corruption tests
    pub(crate) fn raw_slots_mut(&mut self) -> Option<&mut [u64]> {
        self.buffer.as_mut().map(GuardedBuffer::raw_mut)
    }

    pub(crate) fn set_size_unchecked(&mut self, size: isize) {
        self.size = size;
    }

    pub(crate) fn set_capacity_unchecked(&mut self, capacity: isize) {
        self.capacity = capacity;
    }

    pub(crate) fn set_leading_guard_unchecked(&mut self, value: u64) {
        self.leading_guard = value;
    }

    pub(crate) fn set_trailing_guard_unchecked(&mut self, value: u64) {
        self.trailing_guard = value;
    }

    /// Dispose, handing back the released buffer so its contents can be inspected
    #[track_caller]
    pub(crate) fn dispose_retaining(&mut self) -> (Result<()>, Option<GuardedBuffer>) {
        self.dispose_at(Location::caller())
    }
}
