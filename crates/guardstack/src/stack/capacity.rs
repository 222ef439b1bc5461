//! Capacity management
//!
//! Geometric growth on overflow, opportunistic shrink on sustained underflow.
//!
//! - Grow: `new = floor(capacity * factor)`, at least `capacity + 1`
//! - Shrink: triggered when `size <= floor(capacity / factor²)` before a pop,
//!   `new = floor(capacity / factor)`, never below `size`

use tracing::{debug, warn};

use super::GuardedStack;
use crate::error::{Result, StackError};

impl GuardedStack {
    /// Scale capacity by `factor` and reallocate
    ///
    /// Live elements are preserved and the trailing guard is rewritten after
    /// the new last slot. On allocation failure the stack is unchanged.
    pub(super) fn resize(&mut self, factor: f64) -> Result<()> {
        self.verify()?;
        self.verify_checksums()?;

        let old_capacity = self.capacity();
        let new_capacity = scaled_capacity(old_capacity, self.len(), factor);
        if new_capacity == old_capacity {
            return Ok(());
        }
        let signed_capacity =
            isize::try_from(new_capacity).map_err(|_| StackError::AllocationFailure)?;

        let fill = self.fill_bits();
        let buffer = self.buffer.as_mut().ok_or(StackError::NullBuffer)?;
        buffer.resize(new_capacity, fill)?;
        self.capacity = signed_capacity;
        self.update_checksums();

        debug!(old_capacity, new_capacity, size = self.size, "stack resized");
        self.verify()
    }

    /// Shrink when two full growth steps of slack have built up
    pub(super) fn maybe_shrink(&mut self) {
        if self.len() > self.config.shrink_threshold(self.capacity()) {
            return;
        }
        let factor = 1.0 / self.config.growth_factor;
        if let Err(e) = self.resize(factor) {
            warn!(code = e.code(), "shrink failed, keeping capacity {}: {}", self.capacity, e);
        }
    }
}

/// Target capacity for a resize by `factor`
///
/// Growth always adds at least one slot; shrinking never drops below `size`.
pub(crate) fn scaled_capacity(capacity: usize, size: usize, factor: f64) -> usize {
    let scaled = (capacity as f64 * factor) as usize;
    if factor > 1.0 {
        scaled.max(capacity.saturating_add(1))
    } else {
        scaled.max(size)
    }
}
