use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::config::{Config, Predefines};

/// Preprocess a C string and return the result (C API)
///
/// Runs the full pipeline with an empty configuration, so a native
/// declaration parser can consume preprocessed text. Returns null when the
/// input is invalid UTF-8 or preprocessing fails.
///
/// # Safety
/// - `input` must point to a valid null-terminated C string
/// - The returned string must be freed with `macronium_free_result`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn macronium_compile(input: *const c_char) -> *mut c_char {
    if input.is_null() {
        return std::ptr::null_mut();
    }
    let Ok(input) = (unsafe { CStr::from_ptr(input) }).to_str() else {
        return std::ptr::null_mut();
    };
    match crate::compile(input, &Config::new(), &Predefines::new()) {
        Ok((output, _)) => match CString::new(output) {
            Ok(cstr) => cstr.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a result string returned by `macronium_compile`
///
/// # Safety
/// The pointer must have been returned by `macronium_compile` and not
/// already freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn macronium_free_result(result: *mut c_char) {
    if !result.is_null() {
        unsafe {
            drop(CString::from_raw(result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_free_roundtrip() {
        let input = CString::new("#define A 1\nx = A;").unwrap();
        let result = unsafe { macronium_compile(input.as_ptr()) };
        assert!(!result.is_null());
        let text = unsafe { CStr::from_ptr(result) }.to_str().unwrap().to_string();
        assert_eq!(text, "x = 1;");
        unsafe { macronium_free_result(result) };
    }

    #[test]
    fn failures_return_null() {
        let input = CString::new("#garbage").unwrap();
        let result = unsafe { macronium_compile(input.as_ptr()) };
        assert!(result.is_null());
        assert!(unsafe { macronium_compile(std::ptr::null()) }.is_null());
    }
}
