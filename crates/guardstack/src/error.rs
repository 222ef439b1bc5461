//! Stack error taxonomy
//!
//! Every failure a stack operation can report is a [`StackError`]. Each
//! variant carries a stable numeric code and a symbolic name, both of which
//! appear in diagnostic dumps and are what the C ABI returns.
//!
//! Code `0` is reserved for success and has no variant; a successful
//! operation is `Ok(..)`.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, StackError>;

/// Status code reported for a successful operation
pub const NO_ERROR: i32 = 0;

/// Errors reported by stack operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackError {
    /// Backing buffer is absent (never allocated or already released)
    #[error("stack buffer is null")]
    NullBuffer,

    /// Caller supplied no location to receive a popped element
    #[error("element target is null")]
    NullElementTarget,

    /// Caller supplied no stack structure
    #[error("stack structure is null")]
    NullStructure,

    /// Size field holds a negative value
    #[error("stack size is negative")]
    NegativeSize,

    /// Capacity field holds a negative value
    #[error("stack capacity is negative")]
    NegativeCapacity,

    /// More live elements than allocated slots
    #[error("stack size exceeds capacity")]
    SizeExceedsCapacity,

    /// Buffer allocation or reallocation failed
    #[error("failed to allocate stack buffer")]
    AllocationFailure,

    /// Pop on an empty stack
    #[error("pop on empty stack")]
    PopOutOfRange,

    /// Diagnostic sink could not be opened for writing
    #[error("failed to open diagnostic sink")]
    OpeningFileError,

    /// A sentinel on the stack structure itself was overwritten
    #[error("structure guard corrupted")]
    CorruptStructureGuard,

    /// A sentinel adjacent to the element buffer was overwritten
    #[error("buffer guard corrupted")]
    CorruptBufferGuard,

    /// Structure fields changed outside of push/pop
    #[error("unauthorized structure access (checksum mismatch)")]
    UnauthorizedStructureAccess,

    /// Live elements changed outside of push/pop
    #[error("unauthorized content access (checksum mismatch)")]
    UnauthorizedContentAccess,

    /// Buffer slot count disagrees with the capacity field
    #[error("buffer length does not match capacity")]
    CapacityMismatch,
}

impl StackError {
    /// All variants, in code order
    pub const ALL: [StackError; 14] = [
        StackError::NullBuffer,
        StackError::NullElementTarget,
        StackError::NullStructure,
        StackError::NegativeSize,
        StackError::NegativeCapacity,
        StackError::SizeExceedsCapacity,
        StackError::AllocationFailure,
        StackError::PopOutOfRange,
        StackError::OpeningFileError,
        StackError::CorruptStructureGuard,
        StackError::CorruptBufferGuard,
        StackError::UnauthorizedStructureAccess,
        StackError::UnauthorizedContentAccess,
        StackError::CapacityMismatch,
    ];

    /// Stable numeric code (never 0)
    pub const fn code(self) -> i32 {
        match self {
            StackError::NullBuffer => 1,
            StackError::NullElementTarget => 2,
            StackError::NullStructure => 3,
            StackError::NegativeSize => 4,
            StackError::NegativeCapacity => 5,
            StackError::SizeExceedsCapacity => 6,
            StackError::AllocationFailure => 7,
            StackError::PopOutOfRange => 8,
            StackError::OpeningFileError => 9,
            StackError::CorruptStructureGuard => 10,
            StackError::CorruptBufferGuard => 11,
            StackError::UnauthorizedStructureAccess => 12,
            StackError::UnauthorizedContentAccess => 13,
            StackError::CapacityMismatch => 14,
        }
    }

    /// Inverse of [`StackError::code`]. Returns `None` for `0` and unknown codes.
    pub fn from_code(code: i32) -> Option<StackError> {
        StackError::ALL.into_iter().find(|e| e.code() == code)
    }

    /// Symbolic name used in dumps
    pub const fn symbol(self) -> &'static str {
        match self {
            StackError::NullBuffer => "DATA_NULL_ERROR",
            StackError::NullElementTarget => "ELEM_NULL_ERROR",
            StackError::NullStructure => "STRUCT_NULL_ERROR",
            StackError::NegativeSize => "NEGATIVE_SIZE_ERROR",
            StackError::NegativeCapacity => "NEGATIVE_CAPACITY_ERROR",
            StackError::SizeExceedsCapacity => "SIZE_CAPACITY_ERROR",
            StackError::AllocationFailure => "MEMORY_ALLOCATION_ERROR",
            StackError::PopOutOfRange => "POP_OUT_OF_RANGE_ERROR",
            StackError::OpeningFileError => "OPENING_FILE_ERROR",
            StackError::CorruptStructureGuard => "DEAD_STRUCT_CANARY_ERROR",
            StackError::CorruptBufferGuard => "DEAD_DATA_CANARY_ERROR",
            StackError::UnauthorizedStructureAccess => "UNREGISTERED_STRUCT_ACCESS_ERROR",
            StackError::UnauthorizedContentAccess => "UNREGISTERED_DATA_ACCESS_ERROR",
            StackError::CapacityMismatch => "CAPACITY_MISMATCH_ERROR",
        }
    }

    /// Guard sentinel mismatch
    pub const fn is_guard(self) -> bool {
        matches!(
            self,
            StackError::CorruptStructureGuard | StackError::CorruptBufferGuard
        )
    }

    /// Checksum mismatch
    pub const fn is_checksum(self) -> bool {
        matches!(
            self,
            StackError::UnauthorizedStructureAccess | StackError::UnauthorizedContentAccess
        )
    }

    /// The structure can no longer be trusted. Dispose and abandon it.
    pub const fn is_corruption(self) -> bool {
        self.is_guard()
            || self.is_checksum()
            || matches!(
                self,
                StackError::NegativeSize
                    | StackError::NegativeCapacity
                    | StackError::SizeExceedsCapacity
                    | StackError::CapacityMismatch
            )
    }

    /// Reading slots `[0, capacity)` could go out of bounds or show tampered data
    pub const fn buffer_unsafe_to_read(self) -> bool {
        self.is_checksum()
            || matches!(
                self,
                StackError::NegativeCapacity
                    | StackError::SizeExceedsCapacity
                    | StackError::CorruptBufferGuard
                    | StackError::CapacityMismatch
                    | StackError::NullBuffer
            )
    }
}

/// Status code for an operation outcome, `0` on success
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => NO_ERROR,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique_and_nonzero() {
        let mut seen = std::collections::HashSet::new();
        for e in StackError::ALL {
            assert_ne!(e.code(), NO_ERROR);
            assert!(seen.insert(e.code()), "duplicate code for {:?}", e);
        }
    }

    #[test]
    fn test_from_code() {
        for e in StackError::ALL {
            assert_eq!(StackError::from_code(e.code()), Some(e));
        }
        assert_eq!(StackError::from_code(NO_ERROR), None);
        assert_eq!(StackError::from_code(999), None);
    }

    #[test]
    fn test_classification() {
        assert!(StackError::CorruptBufferGuard.is_guard());
        assert!(StackError::CorruptBufferGuard.is_corruption());
        assert!(StackError::UnauthorizedContentAccess.is_checksum());
        assert!(!StackError::PopOutOfRange.is_corruption());
        assert!(!StackError::AllocationFailure.is_corruption());
        assert!(StackError::SizeExceedsCapacity.buffer_unsafe_to_read());
        assert!(!StackError::PopOutOfRange.buffer_unsafe_to_read());
        assert!(!StackError::CorruptStructureGuard.buffer_unsafe_to_read());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(status_code(&Ok::<(), StackError>(())), NO_ERROR);
        assert_eq!(status_code::<()>(&Err(StackError::PopOutOfRange)), 8);
    }

    #[test]
    fn test_display() {
        assert_eq!(StackError::PopOutOfRange.to_string(), "pop on empty stack");
    }
}
