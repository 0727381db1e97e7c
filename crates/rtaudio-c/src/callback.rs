//! The realtime trampoline between the engine and the user's C callback.

use core::ffi::{c_int, c_void};
use std::ffi::CString;

use rtaudio_engine::{
    CallbackRegistration, EngineErrorKind, ErrorCallback, StreamStatus, CALLBACK_ABORT,
};

use crate::abi::{rtaudio_cb_t, rtaudio_error_cb_t, rtaudio_error_t};
use crate::error::truncate_message;
use crate::error::MAX_ERROR_MESSAGE_LENGTH;

/// What the proxy forwards to: the user's function pointer and context.
///
/// Boxed by the stream controller so its address stays fixed while the
/// engine holds it; the engine only ever borrows it.
#[derive(Debug)]
pub struct CallbackSlot {
    callback: rtaudio_cb_t,
    user_data: *mut c_void,
}

impl CallbackSlot {
    pub fn new(callback: rtaudio_cb_t, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data,
        }
    }

    /// Registration the engine invokes; `self` must outlive the open stream.
    pub fn registration(&self) -> CallbackRegistration {
        CallbackRegistration::new(proxy_cb, self as *const CallbackSlot as *mut c_void)
    }
}

/// Forwards one engine period to the user callback and returns its control
/// code verbatim.
///
/// # Safety
/// `slot` must point at a live [`CallbackSlot`]; buffers follow the engine's
/// callback contract.
pub unsafe extern "C" fn proxy_cb(
    output: *mut c_void,
    input: *mut c_void,
    frames: u32,
    stream_time: f64,
    status: StreamStatus,
    slot: *mut c_void,
) -> c_int {
    let slot = &*(slot as *const CallbackSlot);
    match slot.callback {
        Some(callback) => callback(
            output,
            input,
            frames,
            stream_time,
            status.bits(),
            slot.user_data,
        ),
        None => CALLBACK_ABORT,
    }
}

/// Wraps the C error callback for the engine's asynchronous error path.
pub fn error_forwarder(callback: rtaudio_error_cb_t) -> Option<ErrorCallback> {
    let callback = callback?;
    Some(Box::new(move |kind: EngineErrorKind, message: &str| {
        let message = truncate_message(message, MAX_ERROR_MESSAGE_LENGTH - 1);
        // `truncate_message` stops at the first NUL, so this cannot fail.
        let Ok(message) = CString::new(message) else {
            return;
        };
        unsafe { callback(kind as rtaudio_error_t, message.as_ptr()) };
    }))
}
