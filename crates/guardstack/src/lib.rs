//! Guardstack: a self-verifying dynamic stack
//!
//! A resizable LIFO buffer of `f64` elements that checks its own integrity
//! before and after every operation, so memory corruption is caught at the
//! next push or pop instead of surfacing far from its cause.
//!
//! Key design principles:
//! - Guards: sentinel words on the structure and on both ends of the buffer
//! - Checksums: CRC32 over the structure fields and over the live elements
//! - Poison: unused slots hold a marker value, never silent zeros
//! - Every detected error is dumped to one process-wide diagnostic sink
//!
//! # Modules
//!
//! - `config`: element type, constants, and the per-instance check flags
//! - `error`: error taxonomy with stable numeric codes
//! - `buffer`: guarded slot array
//! - `checksum`: structure/content CRC32
//! - `stack`: core operations, validator, capacity manager
//! - `diagnostics`: dump rendering and sink configuration
//! - `ffi`: C ABI with status codes
//!
//! # Example
//!
//! ```
//! use guardstack::{GuardedStack, StackError};
//!
//! let mut stack = GuardedStack::with_capacity(4)?;
//! for i in 1..=5 {
//!     stack.push(i as f64)?;
//! }
//! assert_eq!(stack.capacity(), 8);
//! assert_eq!(stack.pop()?, 5.0);
//! stack.dispose()?;
//! # Ok::<(), StackError>(())
//! ```
//!
//! Not thread-safe: a stack has no internal synchronization.

mod buffer;
pub mod checksum;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod stack;

pub use config::{DEFAULT_CAPACITY, DEFAULT_GROWTH_FACTOR, Elem, GUARD, POISON, StackConfig};
pub use diagnostics::{
    DumpFormat, SinkSpec, configure_diagnostic_sink, configure_from_env, reset_diagnostic_sink,
    set_diagnostic_writer, set_dump_format,
};
pub use error::{NO_ERROR, Result, StackError};
pub use stack::GuardedStack;
