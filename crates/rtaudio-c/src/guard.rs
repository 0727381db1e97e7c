//! Panic containment for the exported functions. No unwind crosses into C.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::ShimError;
use crate::instance::Instance;

pub fn panic_message(payload: Box<dyn core::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Runs `f`, returning `default` if it panics.
pub fn guard_with_default<T>(op: &'static str, default: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let msg = panic_message(payload);
            tracing::error!(target: "rtaudio::ffi", "panic in `{op}`: {msg}");
            default
        }
    }
}

/// Runs `f` against the instance behind `handle`. A null handle yields
/// `default`; a panic yields `default` and lands in the instance's error
/// slot.
///
/// # Safety
/// `handle` must be null or a live pointer from `rtaudio_create`, not in use
/// elsewhere for the duration of the call.
pub unsafe fn guard_instance<T>(
    op: &'static str,
    handle: *mut Instance,
    default: T,
    f: impl FnOnce(&mut Instance) -> T,
) -> T {
    if handle.is_null() {
        tracing::warn!(target: "rtaudio::ffi", "`{op}` called with a null handle");
        return default;
    }
    match catch_unwind(AssertUnwindSafe(|| f(&mut *handle))) {
        Ok(value) => value,
        Err(payload) => {
            let msg = panic_message(payload);
            tracing::error!(target: "rtaudio::ffi", "panic in `{op}`: {msg}");
            let err = ShimError::Internal(format!("panic in `{op}`: {msg}"));
            (*handle).error_mut().record(&err);
            default
        }
    }
}
