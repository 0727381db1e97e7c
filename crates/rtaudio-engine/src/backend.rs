//! The contract every native engine implements.

use core::ffi::{c_int, c_void};

use crate::error::{EngineErrorKind, Result};
use crate::types::{Api, DeviceInfo, StreamRequest, StreamStatus};

/// Realtime callback invoked by an engine once per buffer period.
///
/// `output` is null when no output was requested, `input` likewise. The
/// return value is a control signal: 0 keeps the stream running, 1 stops it
/// after the current buffer drains, 2 aborts it immediately.
pub type NativeCallback = unsafe extern "C" fn(
    output: *mut c_void,
    input: *mut c_void,
    frames: u32,
    stream_time: f64,
    status: StreamStatus,
    user_data: *mut c_void,
) -> c_int;

pub const CALLBACK_CONTINUE: c_int = 0;
pub const CALLBACK_STOP: c_int = 1;
pub const CALLBACK_ABORT: c_int = 2;

/// Asynchronous error sink for failures raised off the controlling thread.
pub type ErrorCallback = Box<dyn FnMut(EngineErrorKind, &str) + Send>;

/// A callback plus the opaque pointer handed back to it.
#[derive(Clone, Copy)]
pub struct CallbackRegistration {
    pub callback: NativeCallback,
    pub user_data: *mut c_void,
}

// Safety: the registrant guarantees `user_data` stays valid and is safe to
// touch from the realtime thread until the stream is closed.
unsafe impl Send for CallbackRegistration {}
unsafe impl Sync for CallbackRegistration {}

impl CallbackRegistration {
    pub fn new(callback: NativeCallback, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data,
        }
    }

    /// # Safety
    /// Buffer pointers must be null or valid for `frames` frames of the
    /// negotiated stream layout.
    #[inline]
    pub unsafe fn invoke(
        &self,
        output: *mut c_void,
        input: *mut c_void,
        frames: u32,
        stream_time: f64,
        status: StreamStatus,
    ) -> c_int {
        (self.callback)(output, input, frames, stream_time, status, self.user_data)
    }
}

/// A realtime audio engine bound to one backend API.
///
/// Lifecycle calls come from a single controlling thread. The registered
/// callback runs on a thread owned by the engine between `start_stream` and
/// the matching `stop_stream`/`abort_stream`; neither of those returns while
/// a callback invocation is in flight. Calling them from inside the callback
/// deadlocks.
pub trait NativeEngine {
    fn current_api(&self) -> Api;

    fn device_count(&mut self) -> u32;
    fn device_info(&mut self, device: u32) -> Result<DeviceInfo>;
    fn default_output_device(&mut self) -> u32;
    fn default_input_device(&mut self) -> u32;

    /// Opens a stream. `buffer_frames` carries the requested size in and the
    /// negotiated size out; it is left untouched on failure.
    fn open_stream(
        &mut self,
        request: &StreamRequest,
        buffer_frames: &mut u32,
        callback: CallbackRegistration,
        error_callback: Option<ErrorCallback>,
    ) -> Result<()>;
    fn close_stream(&mut self);
    fn start_stream(&mut self) -> Result<()>;
    fn stop_stream(&mut self) -> Result<()>;
    fn abort_stream(&mut self) -> Result<()>;

    fn is_stream_open(&self) -> bool;
    fn is_stream_running(&self) -> bool;

    fn stream_time(&self) -> Result<f64>;
    fn set_stream_time(&mut self, time: f64) -> Result<()>;
    /// Total input plus output latency in frames.
    fn stream_latency(&self) -> Result<u32>;
    fn stream_sample_rate(&self) -> Result<u32>;

    fn show_warnings(&mut self, show: bool);
}
