//! Structure verification
//!
//! `verify` is read-only and never allocates. Checks run in a fixed order and
//! the first failure wins:
//!
//! 1. structure guards, then buffer guards
//! 2. negative capacity
//! 3. negative size
//! 4. missing buffer
//! 5. missing structure (only observable through the C ABI, which checks the
//!    handle before a `GuardedStack` exists)
//! 6. size above capacity
//! 7. buffer length disagreeing with capacity
//!
//! Checksums are a separate pass, run by mutating operations after `verify`
//! succeeds.

use super::GuardedStack;
use crate::checksum::{content_checksum, structure_checksum};
use crate::config::GUARD;
use crate::error::{Result, StackError};

impl GuardedStack {
    /// Verify guards and structural invariants
    pub fn verify(&self) -> Result<()> {
        if self.config.guards {
            if self.leading_guard != GUARD || self.trailing_guard != GUARD {
                return Err(StackError::CorruptStructureGuard);
            }
            if let Some(buffer) = &self.buffer {
                if buffer.leading_guard() != Some(GUARD) {
                    return Err(StackError::CorruptBufferGuard);
                }
                // A negative capacity cannot locate the trailing guard; it is
                // reported by the capacity check below.
                if let Ok(capacity) = usize::try_from(self.capacity) {
                    if buffer.guard_after(capacity) != Some(GUARD) {
                        return Err(StackError::CorruptBufferGuard);
                    }
                }
            }
        }

        if self.capacity < 0 {
            return Err(StackError::NegativeCapacity);
        }
        if self.size < 0 {
            return Err(StackError::NegativeSize);
        }
        let Some(buffer) = &self.buffer else {
            return Err(StackError::NullBuffer);
        };
        if self.size > self.capacity {
            return Err(StackError::SizeExceedsCapacity);
        }
        if buffer.element_slots() != self.capacity as usize {
            return Err(StackError::CapacityMismatch);
        }
        Ok(())
    }

    /// Compare stored checksums against fresh ones
    ///
    /// Does nothing when checksums are disabled. Call only after
    /// [`GuardedStack::verify`] succeeded.
    pub fn verify_checksums(&self) -> Result<()> {
        if !self.config.checksums {
            return Ok(());
        }
        let (structure, content) = self.compute_checksums();
        if structure != self.structure_checksum {
            return Err(StackError::UnauthorizedStructureAccess);
        }
        if content != self.content_checksum {
            return Err(StackError::UnauthorizedContentAccess);
        }
        Ok(())
    }

    fn compute_checksums(&self) -> (u32, u32) {
        let address = self.buffer.as_ref().map_or(0, |b| b.address());
        let live = usize::try_from(self.size).unwrap_or(0);
        let content = self
            .buffer
            .as_ref()
            .and_then(|b| b.elements().get(..live))
            .unwrap_or(&[]);

        (
            structure_checksum(address, self.size, self.capacity),
            content_checksum(content),
        )
    }

    /// Record checksums for the current state
    pub(super) fn update_checksums(&mut self) {
        if !self.config.checksums {
            return;
        }
        let (structure, content) = self.compute_checksums();
        self.structure_checksum = structure;
        self.content_checksum = content;
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StackConfig;
    use crate::diagnostics::test_support::CaptureSink;
    use crate::error::StackError;
    use crate::stack::GuardedStack;
    use serial_test::serial;

    fn unguarded(capacity: usize) -> GuardedStack {
        let config = StackConfig::paranoid().with_guards(false).with_checksums(false);
        GuardedStack::with_config(capacity, config).unwrap()
    }

    #[test]
    #[serial]
    fn test_fresh_stack_verifies() {
        let stack = GuardedStack::with_config(4, StackConfig::paranoid()).unwrap();
        assert_eq!(stack.verify(), Ok(()));
        assert_eq!(stack.verify_checksums(), Ok(()));
    }

    #[test]
    #[serial]
    fn test_negative_capacity() {
        let mut stack = unguarded(4);
        stack.set_capacity_unchecked(-1);
        assert_eq!(stack.verify(), Err(StackError::NegativeCapacity));
    }

    #[test]
    #[serial]
    fn test_negative_size() {
        let mut stack = unguarded(4);
        stack.set_size_unchecked(-3);
        assert_eq!(stack.verify(), Err(StackError::NegativeSize));
    }

    #[test]
    #[serial]
    fn test_negative_capacity_wins_over_negative_size() {
        let mut stack = unguarded(4);
        stack.set_size_unchecked(-1);
        stack.set_capacity_unchecked(-1);
        assert_eq!(stack.verify(), Err(StackError::NegativeCapacity));
    }

    #[test]
    #[serial]
    fn test_size_exceeds_capacity() {
        let mut stack = unguarded(4);
        stack.set_size_unchecked(5);
        assert_eq!(stack.verify(), Err(StackError::SizeExceedsCapacity));
    }

    #[test]
    #[serial]
    fn test_capacity_mismatch_without_guards() {
        let mut stack = unguarded(4);
        stack.set_capacity_unchecked(8);
        assert_eq!(stack.verify(), Err(StackError::CapacityMismatch));
    }

    #[test]
    #[serial]
    fn test_capacity_corruption_hits_guard_first() {
        let mut stack = GuardedStack::with_config(4, StackConfig::paranoid()).unwrap();
        stack.set_capacity_unchecked(2);
        assert_eq!(stack.verify(), Err(StackError::CorruptBufferGuard));
    }

    #[test]
    #[serial]
    fn test_guard_wins_over_negative_size() {
        let mut stack = GuardedStack::with_config(4, StackConfig::paranoid()).unwrap();
        stack.set_size_unchecked(-1);
        stack.set_leading_guard_unchecked(0);
        assert_eq!(stack.verify(), Err(StackError::CorruptStructureGuard));
    }

    #[test]
    #[serial]
    fn test_corrupt_size_skips_slot_dump() {
        let capture = CaptureSink::install();
        let mut stack = unguarded(4);
        stack.set_size_unchecked(10);
        assert_eq!(stack.push(1.0), Err(StackError::SizeExceedsCapacity));

        let text = capture.text();
        assert!(text.contains("SIZE_CAPACITY_ERROR"));
        assert!(!text.contains("data[0] ="));
    }

    #[test]
    #[serial]
    fn test_checksums_disabled_miss_tampering() {
        let config = StackConfig::paranoid().with_checksums(false);
        let mut stack = GuardedStack::with_config(4, config).unwrap();
        stack.push(1.0).unwrap();
        stack.raw_slots_mut().unwrap()[1] = 5.0f64.to_bits();
        assert_eq!(stack.pop(), Ok(5.0));
    }
}
