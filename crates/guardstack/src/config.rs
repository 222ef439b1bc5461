//! Stack configuration and fixed constants
//!
//! Which integrity checks a stack performs is chosen once, at construction,
//! through [`StackConfig`]. The element type, guard word and poison marker are
//! fixed at compile time.

/// Element type stored in the stack
pub type Elem = f64;

/// Marker written into slots that hold no live element
///
/// Compared by bit pattern, so a live element equal to this value is reported
/// as poison in dumps.
pub const POISON: Elem = 5.2365478;

/// Sentinel stored in every guard slot
pub const GUARD: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// Capacity used when none is given
pub const DEFAULT_CAPACITY: usize = 16;

/// Capacity multiplier applied on overflow
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.0;

/// Bit pattern of [`POISON`]
#[inline(always)]
pub fn poison_bits() -> u64 {
    POISON.to_bits()
}

/// Check if a value is the poison marker (bitwise)
#[inline(always)]
pub fn is_poison(value: Elem) -> bool {
    value.to_bits() == poison_bits()
}

/// Integrity checks enabled for a stack instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackConfig {
    /// Guard words on the structure and around the buffer
    pub guards: bool,
    /// Structure and content checksums
    pub checksums: bool,
    /// Fill unused slots with [`POISON`]
    pub poison: bool,
    /// Capacity multiplier on overflow; shrink uses its reciprocal
    pub growth_factor: f64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            guards: true,
            checksums: true,
            poison: cfg!(debug_assertions),
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl StackConfig {
    /// Every check enabled, poisoning included, regardless of build profile
    pub fn paranoid() -> Self {
        Self {
            poison: true,
            ..Self::default()
        }
    }

    /// No guards, no checksums, no poisoning
    pub fn release() -> Self {
        Self {
            guards: false,
            checksums: false,
            poison: false,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }

    pub fn with_guards(mut self, guards: bool) -> Self {
        self.guards = guards;
        self
    }

    pub fn with_checksums(mut self, checksums: bool) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn with_poison(mut self, poison: bool) -> Self {
        self.poison = poison;
        self
    }

    /// Set the growth factor. Values that are not finite or not above 1.0
    /// fall back to [`DEFAULT_GROWTH_FACTOR`].
    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = if factor.is_finite() && factor > 1.0 {
            factor
        } else {
            DEFAULT_GROWTH_FACTOR
        };
        self
    }

    /// Pop-time shrink threshold: two full growth steps of slack
    pub fn shrink_threshold(&self, capacity: usize) -> usize {
        (capacity as f64 / (self.growth_factor * self.growth_factor)) as usize
    }
}
