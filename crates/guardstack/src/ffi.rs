//! C ABI
//!
//! Pointer-based entry points for non-Rust callers. Every function returns a
//! status code: `0` on success, otherwise [`StackError::code`]. Null handles
//! and null output pointers are reported as ordinary status codes.
//!
//! Stacks created here are heap-allocated and owned by the caller until
//! `guardstack_dtor` is called.

use std::ffi::{CStr, c_char};
use std::panic::Location;

use crate::config::Elem;
use crate::diagnostics::{self, configure_diagnostic_sink};
use crate::error::{NO_ERROR, StackError, status_code};
use crate::stack::GuardedStack;

/// Report an error that has no stack to dump
#[track_caller]
fn report_without_stack(error: StackError) -> i32 {
    diagnostics::report_failure(error, Location::caller(), 0);
    error.code()
}

/// Allocate a stack with room for `capacity` elements
///
/// On success `*out` receives the handle.
///
/// # Safety
/// `out` must be null or valid for writing one pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_init(out: *mut *mut GuardedStack, capacity: usize) -> i32 {
    if out.is_null() {
        return report_without_stack(StackError::NullStructure);
    }
    match GuardedStack::with_capacity(capacity) {
        Ok(stack) => {
            unsafe {
                *out = Box::into_raw(Box::new(stack));
            }
            NO_ERROR
        }
        Err(e) => e.code(),
    }
}

/// Allocate a stack with the default capacity
///
/// # Safety
/// `out` must be null or valid for writing one pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_init_default(out: *mut *mut GuardedStack) -> i32 {
    unsafe { guardstack_init(out, crate::config::DEFAULT_CAPACITY) }
}

/// Push an element
///
/// # Safety
/// `stack` must be null or a handle from `guardstack_init` not yet passed to
/// `guardstack_dtor`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_push(stack: *mut GuardedStack, elem: Elem) -> i32 {
    let Some(stack) = (unsafe { stack.as_mut() }) else {
        return report_without_stack(StackError::NullStructure);
    };
    status_code(&stack.push(elem))
}

/// Pop the top element into `*elem`
///
/// # Safety
/// `stack` as for `guardstack_push`; `elem` must be null or valid for writing
/// one element.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_pop(stack: *mut GuardedStack, elem: *mut Elem) -> i32 {
    let Some(stack) = (unsafe { stack.as_mut() }) else {
        return report_without_stack(StackError::NullStructure);
    };
    if let Err(e) = stack.check(Location::caller()) {
        return e.code();
    }
    if elem.is_null() {
        stack.dump(Some(StackError::NullElementTarget));
        return StackError::NullElementTarget.code();
    }
    match stack.pop() {
        Ok(value) => {
            unsafe {
                *elem = value;
            }
            NO_ERROR
        }
        Err(e) => e.code(),
    }
}

/// Dispose the stack and free the handle
///
/// The handle is freed even when disposal reports an error.
///
/// # Safety
/// `stack` must be null or a handle from `guardstack_init`; it must not be
/// used again after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_dtor(stack: *mut GuardedStack) -> i32 {
    if stack.is_null() {
        return report_without_stack(StackError::NullStructure);
    }
    let mut stack = unsafe { Box::from_raw(stack) };
    status_code(&stack.dispose())
}

/// Dump the stack with the given status code (`0` for a plain state dump)
///
/// Codes outside the known set are shown as given, labelled `UNKNOWN_ERROR`.
///
/// # Safety
/// `stack` as for `guardstack_push`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_dump(stack: *const GuardedStack, code: i32) -> i32 {
    let Some(stack) = (unsafe { stack.as_ref() }) else {
        return report_without_stack(StackError::NullStructure);
    };
    match StackError::from_code(code) {
        Some(error) => stack.dump(Some(error)),
        None if code == NO_ERROR => stack.dump(None),
        None => {
            let mut snapshot = stack.snapshot(None, Location::caller());
            snapshot.error_code = code;
            snapshot.error_symbol = "UNKNOWN_ERROR";
            diagnostics::emit(&snapshot);
        }
    }
    NO_ERROR
}

/// Redirect dumps to the file at `path` (UTF-8, NUL-terminated)
///
/// # Safety
/// `path` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn guardstack_set_log_file(path: *const c_char) -> i32 {
    if path.is_null() {
        return StackError::OpeningFileError.code();
    }
    let path = unsafe { CStr::from_ptr(path) };
    match path.to_str() {
        Ok(path) => status_code(&configure_diagnostic_sink(path)),
        Err(_) => StackError::OpeningFileError.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::test_support::CaptureSink;
    use serial_test::serial;
    use std::ptr;

    #[test]
    #[serial]
    fn test_ffi_lifecycle() {
        let mut stack: *mut GuardedStack = ptr::null_mut();
        unsafe {
            assert_eq!(guardstack_init(&mut stack, 4), NO_ERROR);
            assert!(!stack.is_null());

            for i in 1..=5 {
                assert_eq!(guardstack_push(stack, i as f64), NO_ERROR);
            }
            assert_eq!((*stack).capacity(), 8);

            let mut value = 0.0;
            for expected in (1..=5).rev() {
                assert_eq!(guardstack_pop(stack, &mut value), NO_ERROR);
                assert_eq!(value, expected as f64);
            }

            assert_eq!(
                guardstack_pop(stack, &mut value),
                StackError::PopOutOfRange.code()
            );
            assert_eq!(guardstack_dtor(stack), NO_ERROR);
        }
    }

    #[test]
    #[serial]
    fn test_ffi_null_structure() {
        let _capture = CaptureSink::install();
        let mut value = 0.0;
        unsafe {
            let code = StackError::NullStructure.code();
            assert_eq!(guardstack_init(ptr::null_mut(), 4), code);
            assert_eq!(guardstack_push(ptr::null_mut(), 1.0), code);
            assert_eq!(guardstack_pop(ptr::null_mut(), &mut value), code);
            assert_eq!(guardstack_dtor(ptr::null_mut()), code);
            assert_eq!(guardstack_dump(ptr::null(), 0), code);
        }
    }

    #[test]
    #[serial]
    fn test_ffi_null_element_target() {
        let capture = CaptureSink::install();
        let mut stack: *mut GuardedStack = ptr::null_mut();
        unsafe {
            assert_eq!(guardstack_init_default(&mut stack), NO_ERROR);
            assert_eq!(guardstack_push(stack, 1.0), NO_ERROR);
            assert_eq!(
                guardstack_pop(stack, ptr::null_mut()),
                StackError::NullElementTarget.code()
            );
            assert_eq!((*stack).len(), 1);
            assert_eq!(guardstack_dtor(stack), NO_ERROR);
        }
        assert!(capture.text().contains("ELEM_NULL_ERROR"));
    }

    #[test]
    #[serial]
    fn test_ffi_dump_with_code() {
        let capture = CaptureSink::install();
        let mut stack: *mut GuardedStack = ptr::null_mut();
        unsafe {
            assert_eq!(guardstack_init(&mut stack, 2), NO_ERROR);
            assert_eq!(guardstack_dump(stack, 0), NO_ERROR);
            assert_eq!(guardstack_dtor(stack), NO_ERROR);
        }
        assert!(capture.text().contains("ERROR CODE: 0 (NO_ERROR)"));
    }

    #[test]
    #[serial]
    fn test_ffi_set_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.log");
        let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();

        unsafe {
            assert_eq!(guardstack_set_log_file(c_path.as_ptr()), NO_ERROR);
            assert_eq!(
                guardstack_set_log_file(ptr::null()),
                StackError::OpeningFileError.code()
            );
        }
        crate::diagnostics::reset_diagnostic_sink();
        assert!(path.exists());
    }

    #[test]
    #[serial]
    fn test_ffi_dump_with_unknown_code() {
        let capture = CaptureSink::install();
        let mut stack: *mut GuardedStack = ptr::null_mut();
        unsafe {
            assert_eq!(guardstack_init(&mut stack, 2), NO_ERROR);
            assert_eq!(guardstack_dump(stack, 99), NO_ERROR);
            assert_eq!(guardstack_dump(stack, StackError::NegativeSize.code()), NO_ERROR);
            assert_eq!(guardstack_dtor(stack), NO_ERROR);
        }
        let text = capture.text();
        assert!(text.contains("ERROR CODE: 99 (UNKNOWN_ERROR)"));
        assert!(text.contains("ERROR CODE: 4 (NEGATIVE_SIZE_ERROR)"));
        assert!(!text.contains("(NO_ERROR)"));
    }

    #[test]
    #[serial]
    fn test_ffi_pop_reports_corruption_before_null_target() {
        let capture = CaptureSink::install();
        let mut stack: *mut GuardedStack = ptr::null_mut();
        unsafe {
            assert_eq!(guardstack_init(&mut stack, 2), NO_ERROR);
            assert_eq!(guardstack_push(stack, 1.0), NO_ERROR);
            (*stack).set_leading_guard_unchecked(0);

            assert_eq!(
                guardstack_pop(stack, ptr::null_mut()),
                StackError::CorruptStructureGuard.code()
            );
            assert_eq!(guardstack_dtor(stack), StackError::CorruptStructureGuard.code());
        }
        let text = capture.text();
        assert!(text.contains("ERROR CODE: 10 (DEAD_STRUCT_CANARY_ERROR)"));
        assert!(!text.contains("ELEM_NULL_ERROR"));
    }
}
