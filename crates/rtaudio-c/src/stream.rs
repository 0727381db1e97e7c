//! Stream lifecycle on top of one exclusively owned engine.
//!
//! The state is read back from the engine on every call rather than tracked
//! separately, so a stream halted by its own callback return code is seen as
//! stopped without any coordination with the realtime thread.

use rtaudio_engine::{Api, DeviceInfo, ErrorCallback, NativeEngine, StreamRequest};

use crate::callback::CallbackSlot;
use crate::error::ShimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream open: freshly created or closed.
    Idle,
    /// Open and never started, or stopped/aborted since.
    Stopped,
    Running,
}

pub struct StreamController {
    engine: Box<dyn NativeEngine>,
    // Borrowed by the engine's realtime thread until the stream is closed.
    slot: Option<Box<CallbackSlot>>,
    show_warnings: bool,
}

impl StreamController {
    pub fn new(mut engine: Box<dyn NativeEngine>, show_warnings: bool) -> Self {
        engine.show_warnings(show_warnings);
        Self {
            engine,
            slot: None,
            show_warnings,
        }
    }

    pub fn state(&self) -> StreamState {
        if !self.engine.is_stream_open() {
            StreamState::Idle
        } else if self.engine.is_stream_running() {
            StreamState::Running
        } else {
            StreamState::Stopped
        }
    }

    fn warn(&self, message: &str) {
        if self.show_warnings {
            tracing::warn!(target: "rtaudio::stream", "{message}");
        }
    }

    pub fn current_api(&self) -> Api {
        self.engine.current_api()
    }

    pub fn device_count(&mut self) -> u32 {
        self.engine.device_count()
    }

    pub fn device_info(&mut self, index: i32) -> Result<DeviceInfo, ShimError> {
        let count = self.engine.device_count();
        let device = u32::try_from(index)
            .ok()
            .filter(|device| *device < count)
            .ok_or_else(|| {
                ShimError::Probe(format!(
                    "device index {index} is out of range (0..{count})"
                ))
            })?;
        self.engine.device_info(device).map_err(ShimError::probe)
    }

    pub fn default_output_device(&mut self) -> u32 {
        self.engine.default_output_device()
    }

    pub fn default_input_device(&mut self) -> u32 {
        self.engine.default_input_device()
    }

    /// Opens a stream that forwards to `slot`. `buffer_frames` is only
    /// written on success.
    pub fn open_stream(
        &mut self,
        request: &StreamRequest,
        buffer_frames: &mut u32,
        slot: CallbackSlot,
        error_callback: Option<ErrorCallback>,
    ) -> Result<(), ShimError> {
        if self.state() != StreamState::Idle {
            return Err(ShimError::InvalidState("a stream is already open"));
        }
        let slot = Box::new(slot);
        let mut frames = *buffer_frames;
        self.engine
            .open_stream(request, &mut frames, slot.registration(), error_callback)
            .map_err(ShimError::stream_open)?;
        self.slot = Some(slot);
        *buffer_frames = frames;
        tracing::debug!(
            target: "rtaudio::stream",
            frames,
            rate = request.sample_rate,
            output = request.output.is_some(),
            input = request.input.is_some(),
            "stream opened"
        );
        Ok(())
    }

    pub fn close_stream(&mut self) {
        match self.state() {
            StreamState::Idle => {
                self.warn("close requested with no open stream");
                return;
            }
            StreamState::Running => {
                if let Err(err) = self.engine.stop_stream() {
                    tracing::error!(target: "rtaudio::stream", "stopping before close: {err}");
                }
            }
            StreamState::Stopped => {}
        }
        self.engine.close_stream();
        self.slot = None;
        tracing::debug!(target: "rtaudio::stream", "stream closed");
    }

    pub fn start_stream(&mut self) -> Result<(), ShimError> {
        match self.state() {
            StreamState::Idle => Err(ShimError::InvalidState("no stream is open to start")),
            StreamState::Running => {
                self.warn("start requested while the stream is already running");
                Ok(())
            }
            StreamState::Stopped => {
                self.engine.start_stream().map_err(ShimError::stream_control)?;
                tracing::debug!(target: "rtaudio::stream", "stream started");
                Ok(())
            }
        }
    }

    pub fn stop_stream(&mut self) -> Result<(), ShimError> {
        self.halt(false)
    }

    pub fn abort_stream(&mut self) -> Result<(), ShimError> {
        self.halt(true)
    }

    fn halt(&mut self, abort: bool) -> Result<(), ShimError> {
        let verb = if abort { "abort" } else { "stop" };
        match self.state() {
            StreamState::Idle => Err(ShimError::InvalidState(if abort {
                "no stream is open to abort"
            } else {
                "no stream is open to stop"
            })),
            StreamState::Stopped => {
                self.warn(&format!("{verb} requested while the stream is not running"));
                Ok(())
            }
            StreamState::Running => {
                let result = if abort {
                    self.engine.abort_stream()
                } else {
                    self.engine.stop_stream()
                };
                result.map_err(ShimError::stream_control)?;
                tracing::debug!(target: "rtaudio::stream", abort, "stream halted");
                Ok(())
            }
        }
    }

    pub fn is_stream_open(&self) -> bool {
        self.engine.is_stream_open()
    }

    pub fn is_stream_running(&self) -> bool {
        self.engine.is_stream_running()
    }

    fn require_open(&self, what: &str) -> Result<(), ShimError> {
        if self.engine.is_stream_open() {
            Ok(())
        } else {
            Err(ShimError::Query(format!("{what} requested with no open stream")))
        }
    }

    pub fn stream_time(&self) -> Result<f64, ShimError> {
        self.require_open("stream time")?;
        self.engine.stream_time().map_err(ShimError::query)
    }

    pub fn set_stream_time(&mut self, time: f64) -> Result<(), ShimError> {
        self.require_open("setting the stream time")?;
        self.engine.set_stream_time(time).map_err(ShimError::query)
    }

    pub fn stream_latency(&self) -> Result<u32, ShimError> {
        self.require_open("stream latency")?;
        self.engine.stream_latency().map_err(ShimError::query)
    }

    pub fn stream_sample_rate(&self) -> Result<u32, ShimError> {
        self.require_open("stream sample rate")?;
        self.engine.stream_sample_rate().map_err(ShimError::query)
    }

    pub fn show_warnings(&mut self, show: bool) {
        self.show_warnings = show;
        self.engine.show_warnings(show);
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if self.engine.is_stream_open() {
            self.close_stream();
        }
    }
}
