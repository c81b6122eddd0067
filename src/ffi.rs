//! FFI bindings for Community Pulse
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalyticsConfig;
use crate::pipeline::{records_to_report, PulseProcessor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Read a required string argument, recording an error when it is unusable
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {name} string pointer"));
    }
    value
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a record bundle and return a JSON report.
///
/// # Safety
/// - `records_json` and `request_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_records_to_report(
    records_json: *const c_char,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(records) = required_arg(records_json, "records JSON") else {
        return ptr::null_mut();
    };
    let Some(request) = required_arg(request_json, "request JSON") else {
        return ptr::null_mut();
    };

    match records_to_report(records, request) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a PulseProcessor
pub struct PulseProcessorHandle {
    processor: PulseProcessor,
}

/// Create a new PulseProcessor.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration; otherwise it must
///   be a valid null-terminated C string holding an `AnalyticsConfig` object.
/// - Returns a pointer that must be freed with `pulse_processor_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_new(config_json: *const c_char) -> *mut PulseProcessorHandle {
    clear_last_error();

    let processor = if config_json.is_null() {
        PulseProcessor::new()
    } else {
        let Some(json) = required_arg(config_json, "config JSON") else {
            return ptr::null_mut();
        };
        match AnalyticsConfig::from_json(&json).and_then(PulseProcessor::with_config) {
            Ok(processor) => processor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(PulseProcessorHandle { processor }))
}

/// Free a PulseProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_free(processor: *mut PulseProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Load a record bundle into a processor, replacing its snapshot.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_load_records(
    processor: *mut PulseProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let Some(json_str) = required_arg(json, "records JSON") else {
        return -1;
    };

    match handle.processor.load_records(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Analyze the loaded snapshot for a request and return a JSON report.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_process(
    processor: *mut PulseProcessorHandle,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(request) = required_arg(request_json, "request JSON") else {
        return ptr::null_mut();
    };

    match handle.processor.process(&request) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
