//! Software engine with virtual devices and a timer-driven realtime thread.
//!
//! The realtime thread wakes once per buffer period, hands the callback
//! zeroed buffers of the negotiated size and discards whatever it writes.

use core::ffi::c_void;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::backend::{CallbackRegistration, ErrorCallback, NativeEngine};
use crate::error::{EngineError, EngineErrorKind, Result};
use crate::shared::StreamShared;
use crate::thread::promote_current_thread;
use crate::types::{
    Api, DeviceInfo, SampleFormat, StreamFlags, StreamParameters, StreamRequest, StreamStatus,
};

pub const DUMMY_SAMPLE_RATES: [u32; 5] = [22_050, 44_100, 48_000, 88_200, 96_000];
pub const DUMMY_PREFERRED_SAMPLE_RATE: u32 = 48_000;

const MIN_BUFFER_FRAMES: u32 = 16;
const MAX_BUFFER_FRAMES: u32 = 4096;
const DEFAULT_BUFFER_FRAMES: u32 = 512;
const DEFAULT_NUM_BUFFERS: u32 = 2;
const DEFAULT_THREAD_NAME: &str = "rtaudio-dummy";

/// A virtual device, optionally rigged to fail probing or starting.
#[derive(Debug, Clone)]
pub struct DummyDevice {
    info: DeviceInfo,
    probe_error: Option<String>,
    start_error: Option<String>,
}

impl DummyDevice {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            probe_error: None,
            start_error: None,
        }
    }

    fn standard(name: impl Into<String>, outputs: u32, inputs: u32) -> Self {
        Self::new(
            DeviceInfo::new(name, outputs, inputs)
                .with_sample_rates(DUMMY_SAMPLE_RATES, DUMMY_PREFERRED_SAMPLE_RATE)
                .with_formats(SampleFormat::all()),
        )
    }

    pub fn output(name: impl Into<String>, channels: u32) -> Self {
        Self::standard(name, channels, 0)
    }

    pub fn input(name: impl Into<String>, channels: u32) -> Self {
        Self::standard(name, 0, channels)
    }

    pub fn duplex(name: impl Into<String>, channels: u32) -> Self {
        Self::standard(name, channels, channels)
    }

    pub fn with_defaults(mut self, output: bool, input: bool) -> Self {
        self.info = self.info.with_defaults(output, input);
        self
    }

    pub fn failing_probe(mut self, message: impl Into<String>) -> Self {
        self.probe_error = Some(message.into());
        self
    }

    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// The device set a fresh [`DummyEngine`] exposes.
pub fn default_devices() -> Vec<DummyDevice> {
    vec![
        DummyDevice::output("Dummy Output", 2).with_defaults(true, false),
        DummyDevice::input("Dummy Input", 2).with_defaults(false, true),
        DummyDevice::duplex("Dummy Duplex", 8),
    ]
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
}

struct WorkerSetup {
    shared: Arc<StreamShared>,
    registration: CallbackRegistration,
    frames: u32,
    output_words: Option<usize>,
    input_words: Option<usize>,
    realtime_priority: Option<i32>,
    error_callback: Option<Arc<Mutex<ErrorCallback>>>,
}

struct DummyStream {
    shared: Arc<StreamShared>,
    registration: CallbackRegistration,
    error_callback: Option<Arc<Mutex<ErrorCallback>>>,
    buffer_frames: u32,
    output_words: Option<usize>,
    input_words: Option<usize>,
    start_error: Option<String>,
    realtime_priority: Option<i32>,
    thread_name: String,
    worker: Option<Worker>,
}

pub struct DummyEngine {
    devices: Vec<DummyDevice>,
    show_warnings: bool,
    stream: Option<DummyStream>,
}

impl Default for DummyEngine {
    fn default() -> Self {
        Self::with_devices(default_devices())
    }
}

impl DummyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<DummyDevice>) -> Self {
        Self {
            devices,
            show_warnings: true,
            stream: None,
        }
    }

    /// Number of callback invocations on the open stream.
    pub fn callback_count(&self) -> u64 {
        self.stream
            .as_ref()
            .map(|stream| stream.shared.invocations())
            .unwrap_or(0)
    }

    fn warn(&self, message: &str) {
        if self.show_warnings {
            tracing::warn!(target: "rtaudio::dummy", "{message}");
        }
    }

    fn validate_direction(
        &self,
        params: &StreamParameters,
        output: bool,
        sample_rate: u32,
    ) -> Result<&DummyDevice> {
        let direction = if output { "output" } else { "input" };
        if params.channels == 0 {
            return Err(EngineError::invalid_parameter(format!(
                "{direction} channel count must be at least one"
            )));
        }
        let device = self
            .devices
            .get(params.device_id as usize)
            .ok_or_else(|| {
                EngineError::invalid_parameter(format!(
                    "{direction} device {} is invalid",
                    params.device_id
                ))
            })?;
        if let Some(message) = &device.probe_error {
            return Err(EngineError::invalid_device(message.clone()));
        }
        let available = if output {
            device.info.output_channels
        } else {
            device.info.input_channels
        };
        let requested = params.first_channel.saturating_add(params.channels);
        if requested > available {
            return Err(EngineError::invalid_parameter(format!(
                "device '{}' does not support {} {direction} channels starting at channel {}",
                device.info.name, params.channels, params.first_channel
            )));
        }
        if !device.info.sample_rates.contains(&sample_rate) {
            return Err(EngineError::invalid_parameter(format!(
                "device '{}' does not support sample rate {sample_rate}",
                device.info.name
            )));
        }
        Ok(device)
    }

    fn join_worker(stream: &mut DummyStream) -> Result<()> {
        stream.shared.disable();
        let Some(worker) = stream.worker.take() else {
            return Ok(());
        };
        let _ = worker.stop_tx.send(());
        worker
            .handle
            .join()
            .map_err(|_| EngineError::new(EngineErrorKind::ThreadError, "realtime thread panicked"))
    }

    fn halt_stream(&mut self, verb: &str) -> Result<()> {
        let show_warnings = self.show_warnings;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| EngineError::invalid_use(format!("cannot {verb} stream: no stream is open")))?;
        if stream.worker.is_none() {
            if show_warnings {
                tracing::warn!(target: "rtaudio::dummy", "the stream is already stopped");
            }
            return Ok(());
        }
        Self::join_worker(stream)
    }
}

/// Rounds a requested size to a power of two inside the supported range.
pub fn negotiate_buffer_frames(requested: u32, flags: StreamFlags) -> u32 {
    let requested = if requested == 0 {
        if flags.contains(StreamFlags::MINIMIZE_LATENCY) {
            MIN_BUFFER_FRAMES
        } else {
            DEFAULT_BUFFER_FRAMES
        }
    } else {
        requested
    };
    requested
        .clamp(MIN_BUFFER_FRAMES, MAX_BUFFER_FRAMES)
        .next_power_of_two()
        .min(MAX_BUFFER_FRAMES)
}

/// Queued output periods plus one input period, saturating for huge
/// buffer-count hints.
fn stream_latency(frames: u32, num_buffers: u32, output: bool, input: bool) -> u32 {
    let mut latency = 0u32;
    if output {
        latency = frames.saturating_mul(num_buffers.saturating_sub(1));
    }
    if input {
        latency = latency.saturating_add(frames);
    }
    latency
}

fn buffer_words(frames: u32, channels: u32, bytes_per_sample: usize) -> usize {
    let bytes = frames as usize * channels as usize * bytes_per_sample;
    bytes.div_ceil(8)
}

fn run_worker(setup: WorkerSetup, stop_rx: crossbeam_channel::Receiver<()>) {
    let WorkerSetup {
        shared,
        registration,
        frames,
        output_words,
        input_words,
        realtime_priority,
        error_callback,
    } = setup;

    if let Some(priority) = realtime_priority {
        if let Err(err) = promote_current_thread(priority) {
            let message = format!("unable to set realtime priority {priority}: {err}");
            tracing::warn!(target: "rtaudio::dummy", "{message}");
            if let Some(callback) = &error_callback {
                let mut callback = callback.lock();
                (*callback)(EngineErrorKind::Warning, &message);
            }
        }
    }

    // u64 words keep every sample format aligned.
    let mut output = output_words.map(|words| vec![0u64; words]);
    let mut input = input_words.map(|words| vec![0u64; words]);
    let mut xrun = StreamStatus::empty();
    if output.is_some() {
        xrun |= StreamStatus::OUTPUT_UNDERFLOW;
    }
    if input.is_some() {
        xrun |= StreamStatus::INPUT_OVERFLOW;
    }

    let period = shared.period(frames);
    let mut deadline = Instant::now();
    loop {
        let out_ptr = output
            .as_mut()
            .map_or(core::ptr::null_mut(), |buf| buf.as_mut_ptr().cast::<c_void>());
        let in_ptr = input.as_mut().map_or(core::ptr::null_mut(), |buf| {
            buf.fill(0);
            buf.as_mut_ptr().cast::<c_void>()
        });

        let started = Instant::now();
        let ran = unsafe { shared.run_callback(&registration, out_ptr, in_ptr, frames) };
        if ran.is_some() && started.elapsed() > period {
            shared.flag_status(xrun);
        }
        if !shared.is_running() {
            break;
        }

        deadline += period;
        let now = Instant::now();
        if deadline < now {
            deadline = now;
        }
        match stop_rx.recv_timeout(deadline - now) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl NativeEngine for DummyEngine {
    fn current_api(&self) -> Api {
        Api::Dummy
    }

    fn device_count(&mut self) -> u32 {
        self.devices.len() as u32
    }

    fn device_info(&mut self, device: u32) -> Result<DeviceInfo> {
        let entry = self
            .devices
            .get(device as usize)
            .ok_or_else(|| EngineError::invalid_parameter(format!("device ID {device} is invalid")))?;
        match &entry.probe_error {
            Some(message) => Err(EngineError::driver(message.clone())),
            None => Ok(entry.info.clone()),
        }
    }

    fn default_output_device(&mut self) -> u32 {
        self.devices
            .iter()
            .position(|device| device.info.is_default_output)
            .or_else(|| {
                self.devices
                    .iter()
                    .position(|device| device.info.output_channels > 0)
            })
            .unwrap_or(0) as u32
    }

    fn default_input_device(&mut self) -> u32 {
        self.devices
            .iter()
            .position(|device| device.info.is_default_input)
            .or_else(|| {
                self.devices
                    .iter()
                    .position(|device| device.info.input_channels > 0)
            })
            .unwrap_or(0) as u32
    }

    fn open_stream(
        &mut self,
        request: &StreamRequest,
        buffer_frames: &mut u32,
        callback: CallbackRegistration,
        error_callback: Option<ErrorCallback>,
    ) -> Result<()> {
        if self.stream.is_some() {
            return Err(EngineError::invalid_use("a stream is already open"));
        }
        if request.output.is_none() && request.input.is_none() {
            return Err(EngineError::invalid_use(
                "input and output stream parameters are both absent",
            ));
        }
        let bytes_per_sample = request
            .format
            .bytes_per_sample()
            .ok_or_else(|| EngineError::invalid_parameter("sample format is undefined"))?;

        let mut start_error = None;
        if let Some(params) = &request.output {
            let device = self.validate_direction(params, true, request.sample_rate)?;
            start_error = device.start_error.clone();
        }
        if let Some(params) = &request.input {
            let device = self.validate_direction(params, false, request.sample_rate)?;
            start_error = start_error.or_else(|| device.start_error.clone());
        }

        let flags = request.flags();
        let frames = negotiate_buffer_frames(*buffer_frames, flags);
        let num_buffers = request
            .options
            .as_ref()
            .map(|options| options.num_buffers)
            .filter(|count| *count >= 2)
            .unwrap_or(DEFAULT_NUM_BUFFERS);

        let shared = Arc::new(StreamShared::new(request.sample_rate));
        shared.set_latency(stream_latency(
            frames,
            num_buffers,
            request.output.is_some(),
            request.input.is_some(),
        ));

        let thread_name = request
            .options
            .as_ref()
            .and_then(|options| options.name.clone())
            .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string());
        let realtime_priority = request
            .options
            .as_ref()
            .filter(|options| options.flags.contains(StreamFlags::SCHEDULE_REALTIME))
            .map(|options| options.priority);

        self.stream = Some(DummyStream {
            shared,
            registration: callback,
            error_callback: error_callback.map(|cb| Arc::new(Mutex::new(cb))),
            buffer_frames: frames,
            output_words: request
                .output
                .map(|params| buffer_words(frames, params.channels, bytes_per_sample)),
            input_words: request
                .input
                .map(|params| buffer_words(frames, params.channels, bytes_per_sample)),
            start_error,
            realtime_priority,
            thread_name,
            worker: None,
        });
        *buffer_frames = frames;
        tracing::debug!(target: "rtaudio::dummy", frames, rate = request.sample_rate, "stream opened");
        Ok(())
    }

    fn close_stream(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            self.warn("no open stream to close");
            return;
        };
        if let Err(err) = Self::join_worker(&mut stream) {
            tracing::error!(target: "rtaudio::dummy", "closing stream: {err}");
        }
        tracing::debug!(target: "rtaudio::dummy", "stream closed");
    }

    fn start_stream(&mut self) -> Result<()> {
        let show_warnings = self.show_warnings;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| EngineError::invalid_use("cannot start stream: no stream is open"))?;
        if stream.shared.is_running() {
            if show_warnings {
                tracing::warn!(target: "rtaudio::dummy", "the stream is already running");
            }
            return Ok(());
        }
        if let Some(message) = &stream.start_error {
            return Err(EngineError::driver(message.clone()));
        }
        // Reap a worker that exited after the callback asked to stop.
        Self::join_worker(stream)?;

        let (stop_tx, stop_rx) = bounded(1);
        let setup = WorkerSetup {
            shared: stream.shared.clone(),
            registration: stream.registration,
            frames: stream.buffer_frames,
            output_words: stream.output_words,
            input_words: stream.input_words,
            realtime_priority: stream.realtime_priority,
            error_callback: stream.error_callback.clone(),
        };
        stream.shared.enable();
        let handle = std::thread::Builder::new()
            .name(stream.thread_name.clone())
            .spawn(move || run_worker(setup, stop_rx))
            .map_err(|err| {
                stream.shared.disable();
                EngineError::new(
                    EngineErrorKind::ThreadError,
                    format!("unable to spawn realtime thread: {err}"),
                )
            })?;
        stream.worker = Some(Worker { handle, stop_tx });
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.halt_stream("stop")
    }

    fn abort_stream(&mut self) -> Result<()> {
        // Nothing is queued ahead of the callback, so abort and stop coincide.
        self.halt_stream("abort")
    }

    fn is_stream_open(&self) -> bool {
        self.stream.is_some()
    }

    fn is_stream_running(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.shared.is_running())
    }

    fn stream_time(&self) -> Result<f64> {
        self.stream
            .as_ref()
            .map(|stream| stream.shared.stream_time())
            .ok_or_else(|| EngineError::invalid_use("stream time requested with no open stream"))
    }

    fn set_stream_time(&mut self, time: f64) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| EngineError::invalid_use("cannot set stream time: no stream is open"))?;
        if !(time.is_finite() && time >= 0.0) {
            return Err(EngineError::invalid_parameter(format!(
                "stream time {time} must be a non-negative number"
            )));
        }
        stream.shared.set_stream_time(time);
        Ok(())
    }

    fn stream_latency(&self) -> Result<u32> {
        self.stream
            .as_ref()
            .map(|stream| stream.shared.latency())
            .ok_or_else(|| EngineError::invalid_use("stream latency requested with no open stream"))
    }

    fn stream_sample_rate(&self) -> Result<u32> {
        self.stream
            .as_ref()
            .map(|stream| stream.shared.sample_rate())
            .ok_or_else(|| {
                EngineError::invalid_use("stream sample rate requested with no open stream")
            })
    }

    fn show_warnings(&mut self, show: bool) {
        self.show_warnings = show;
    }
}

impl Drop for DummyEngine {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = Self::join_worker(&mut stream);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn buffer_negotiation_rounds_and_clamps() {
        let none = StreamFlags::empty();
        assert_eq!(negotiate_buffer_frames(256, none), 256);
        assert_eq!(negotiate_buffer_frames(250, none), 256);
        assert_eq!(negotiate_buffer_frames(1, none), 16);
        assert_eq!(negotiate_buffer_frames(100_000, none), 4096);
        assert_eq!(negotiate_buffer_frames(0, none), 512);
        assert_eq!(negotiate_buffer_frames(0, StreamFlags::MINIMIZE_LATENCY), 16);
    }

    #[test]
    fn latency_saturates_for_huge_buffer_counts() {
        assert_eq!(stream_latency(512, 2, true, false), 512);
        assert_eq!(stream_latency(512, 4, true, true), 2048);
        assert_eq!(stream_latency(4096, u32::MAX, true, false), u32::MAX);
        assert_eq!(stream_latency(4096, u32::MAX, true, true), u32::MAX);
        assert_eq!(stream_latency(64, 2, false, true), 64);
    }

    proptest! {
        #[test]
        fn negotiated_sizes_are_stable_powers_of_two(requested in any::<u32>(), bits in any::<u32>()) {
            let flags = StreamFlags::from_bits_truncate(bits);
            let frames = negotiate_buffer_frames(requested, flags);
            prop_assert!(frames.is_power_of_two());
            prop_assert!((MIN_BUFFER_FRAMES..=MAX_BUFFER_FRAMES).contains(&frames));
            prop_assert_eq!(negotiate_buffer_frames(frames, flags), frames);
            prop_assert_eq!(negotiate_buffer_frames(frames, StreamFlags::empty()), frames);
        }
    }

    #[test]
    fn buffers_round_up_to_whole_words() {
        assert_eq!(buffer_words(1, 1, 3), 1);
        assert_eq!(buffer_words(256, 2, 4), 256);
        assert_eq!(buffer_words(3, 3, 3), 4);
    }

    #[test]
    fn default_devices_report_defaults() {
        let mut engine = DummyEngine::new();
        assert_eq!(engine.device_count(), 3);
        assert_eq!(engine.default_output_device(), 0);
        assert_eq!(engine.default_input_device(), 1);
        let duplex = engine.device_info(2).expect("probe duplex");
        assert_eq!(duplex.duplex_channels, 8);
        assert!(engine.device_info(3).is_err());
    }
}
