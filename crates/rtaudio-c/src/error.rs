//! Per-instance "last error" slot and the shim's error taxonomy.

use core::ffi::{c_char, CStr};

use rtaudio_engine::EngineError;
use thiserror::Error;

/// Capacity of the error buffer, terminator included.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShimError {
    #[error("{0}")]
    Construction(String),
    #[error("{0}")]
    Probe(String),
    #[error("{0}")]
    StreamOpen(String),
    #[error("{0}")]
    StreamControl(String),
    #[error("{0}")]
    Query(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// A panic caught at the C boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShimError {
    pub fn construction(err: EngineError) -> Self {
        ShimError::Construction(err.message)
    }

    pub fn probe(err: EngineError) -> Self {
        ShimError::Probe(err.message)
    }

    pub fn stream_open(err: EngineError) -> Self {
        ShimError::StreamOpen(err.message)
    }

    pub fn stream_control(err: EngineError) -> Self {
        ShimError::StreamControl(err.message)
    }

    pub fn query(err: EngineError) -> Self {
        ShimError::Query(err.message)
    }
}

/// Longest prefix of `message` that fits in `max` bytes, stops before any
/// NUL and ends on a UTF-8 character boundary.
pub fn truncate_message(message: &str, max: usize) -> &str {
    let message = match message.find('\0') {
        Some(nul) => &message[..nul],
        None => message,
    };
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// Copies `src` into a NUL-terminated C buffer, truncating as needed.
/// Returns the number of payload bytes written.
pub fn copy_to_c_buffer(src: &str, dst: &mut [c_char]) -> usize {
    let Some(max) = dst.len().checked_sub(1) else {
        return 0;
    };
    let payload = truncate_message(src, max).as_bytes();
    for (slot, byte) in dst.iter_mut().zip(payload) {
        *slot = *byte as c_char;
    }
    dst[payload.len()] = 0;
    payload.len()
}

/// Exactly one error slot: a flag plus a bounded, NUL-terminated message.
/// Last write wins.
pub struct ErrorState {
    has_error: bool,
    message: [c_char; MAX_ERROR_MESSAGE_LENGTH],
}

impl Default for ErrorState {
    fn default() -> Self {
        Self {
            has_error: false,
            message: [0; MAX_ERROR_MESSAGE_LENGTH],
        }
    }
}

impl ErrorState {
    pub fn clear(&mut self) {
        self.has_error = false;
        self.message[0] = 0;
    }

    pub fn set(&mut self, message: &str) {
        copy_to_c_buffer(message, &mut self.message);
        self.has_error = true;
    }

    pub fn record(&mut self, err: &ShimError) {
        tracing::debug!(target: "rtaudio::shim", "operation failed: {err}");
        self.set(&err.to_string());
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn message(&self) -> Option<&CStr> {
        if !self.has_error {
            return None;
        }
        // Safety: the buffer always holds a terminator, written by `set`.
        Some(unsafe { CStr::from_ptr(self.message.as_ptr()) })
    }

    /// Pointer for C callers; null when no error is recorded.
    pub fn as_ptr(&self) -> *const c_char {
        if self.has_error {
            self.message.as_ptr()
        } else {
            core::ptr::null()
        }
    }
}
