//! Hardware engine on top of cpal hosts (ALSA, JACK, CoreAudio, WASAPI, ASIO).
//!
//! cpal streams are single-direction and interleaved, so duplex streams,
//! non-interleaved buffers and channel offsets are refused rather than
//! converted.
//!
//! cpal spawns and names the callback thread itself, so the stream name
//! option has no effect here. Realtime promotion happens from inside the
//! first callback instead.

use core::ffi::c_void;
use std::sync::Arc;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use crate::backend::{CallbackRegistration, ErrorCallback, NativeEngine};
use crate::error::{EngineError, EngineErrorKind, Result};
use crate::shared::StreamShared;
use crate::thread::promote_current_thread;
use crate::types::{Api, DeviceInfo, SampleFormat, StreamFlags, StreamRequest, StreamStatus};

/// Rates probed against each device's supported ranges.
const PROBE_SAMPLE_RATES: [u32; 14] = [
    4_000, 5_512, 8_000, 9_600, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 88_200, 96_000,
    176_400, 192_000,
];
const FALLBACK_BUFFER_FRAMES: u32 = 512;

fn host_name(api: Api) -> Option<&'static str> {
    match api {
        Api::LinuxAlsa => Some("ALSA"),
        Api::UnixJack => Some("JACK"),
        Api::MacosxCore => Some("CoreAudio"),
        Api::WindowsWasapi => Some("WASAPI"),
        Api::WindowsAsio => Some("ASIO"),
        _ => None,
    }
}

fn to_cpal_format(format: SampleFormat) -> Option<cpal::SampleFormat> {
    match format {
        SampleFormat::SINT8 => Some(cpal::SampleFormat::I8),
        SampleFormat::SINT16 => Some(cpal::SampleFormat::I16),
        SampleFormat::SINT32 => Some(cpal::SampleFormat::I32),
        SampleFormat::FLOAT32 => Some(cpal::SampleFormat::F32),
        SampleFormat::FLOAT64 => Some(cpal::SampleFormat::F64),
        _ => None,
    }
}

fn from_cpal_format(format: cpal::SampleFormat) -> SampleFormat {
    match format {
        cpal::SampleFormat::I8 => SampleFormat::SINT8,
        cpal::SampleFormat::I16 => SampleFormat::SINT16,
        cpal::SampleFormat::I32 => SampleFormat::SINT32,
        cpal::SampleFormat::F32 => SampleFormat::FLOAT32,
        cpal::SampleFormat::F64 => SampleFormat::FLOAT64,
        _ => SampleFormat::empty(),
    }
}

#[derive(Default)]
struct Capabilities {
    channels: u32,
    formats: SampleFormat,
    rates: Vec<u32>,
}

fn collect_capabilities<I>(ranges: I) -> Capabilities
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    let mut caps = Capabilities::default();
    for range in ranges {
        caps.channels = caps.channels.max(u32::from(range.channels()));
        caps.formats |= from_cpal_format(range.sample_format());
        for rate in PROBE_SAMPLE_RATES {
            if range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
                && !caps.rates.contains(&rate)
            {
                caps.rates.push(rate);
            }
        }
    }
    caps.rates.sort_unstable();
    caps
}

type SharedErrorCallback = Arc<Mutex<ErrorCallback>>;

/// Bookkeeping carried by a cpal data callback around each user period.
struct PeriodWatch {
    shared: Arc<StreamShared>,
    promote: Option<i32>,
    overrun: StreamStatus,
    sink: Option<SharedErrorCallback>,
}

impl PeriodWatch {
    fn new(
        shared: Arc<StreamShared>,
        promote: Option<i32>,
        is_output: bool,
        sink: Option<SharedErrorCallback>,
    ) -> Self {
        let overrun = if is_output {
            StreamStatus::OUTPUT_UNDERFLOW
        } else {
            StreamStatus::INPUT_OVERFLOW
        };
        Self {
            shared,
            promote,
            overrun,
            sink,
        }
    }

    /// Promotes the callback thread on the first period, then returns the
    /// period's start time.
    fn begin(&mut self) -> Instant {
        if let Some(priority) = self.promote.take() {
            if let Err(err) = promote_current_thread(priority) {
                let message = format!("unable to set realtime priority {priority}: {err}");
                if let Some(sink) = &self.sink {
                    let mut callback = sink.lock();
                    (*callback)(EngineErrorKind::Warning, &message);
                }
            }
        }
        Instant::now()
    }

    /// Flags an xrun for the next period when this one overran its budget.
    fn end(&self, started: Instant, frames: u32, ran: bool) {
        if ran && started.elapsed() > self.shared.period(frames) {
            self.shared.flag_status(self.overrun);
        }
    }
}

struct CpalStream {
    stream: cpal::Stream,
    shared: Arc<StreamShared>,
}

pub struct CpalEngine {
    api: Api,
    host: cpal::Host,
    devices: Vec<cpal::Device>,
    show_warnings: bool,
    stream: Option<CpalStream>,
}

impl CpalEngine {
    pub fn new(api: Api) -> Result<Self> {
        let wanted = host_name(api).ok_or_else(|| {
            EngineError::invalid_parameter(format!("{} is not served by cpal", api.display_name()))
        })?;
        let id = cpal::available_hosts()
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| {
                EngineError::new(
                    EngineErrorKind::NoDevicesFound,
                    format!("the {wanted} host is not available on this system"),
                )
            })?;
        let host = cpal::host_from_id(id).map_err(|err| EngineError::system(err.to_string()))?;
        Ok(Self {
            api,
            host,
            devices: Vec::new(),
            show_warnings: true,
            stream: None,
        })
    }

    fn refresh_devices(&mut self) {
        match self.host.devices() {
            Ok(devices) => self.devices = devices.collect(),
            Err(err) => {
                if self.show_warnings {
                    tracing::warn!(target: "rtaudio::cpal", "device enumeration failed: {err}");
                }
                self.devices.clear();
            }
        }
    }

    fn device(&mut self, device: u32) -> Result<cpal::Device> {
        if self.devices.is_empty() {
            self.refresh_devices();
        }
        self.devices
            .get(device as usize)
            .cloned()
            .ok_or_else(|| EngineError::invalid_parameter(format!("device ID {device} is invalid")))
    }

    fn position_of(&mut self, name: Option<String>) -> u32 {
        let Some(name) = name else {
            return 0;
        };
        if self.devices.is_empty() {
            self.refresh_devices();
        }
        self.devices
            .iter()
            .position(|device| device.name().ok().as_deref() == Some(name.as_str()))
            .unwrap_or(0) as u32
    }

    fn forward_errors(
        sink: Option<SharedErrorCallback>,
    ) -> impl FnMut(cpal::StreamError) + Send + 'static {
        move |err: cpal::StreamError| {
            let message = err.to_string();
            tracing::error!(target: "rtaudio::cpal", "stream error: {message}");
            if let Some(sink) = &sink {
                let mut callback = sink.lock();
                (*callback)(EngineErrorKind::DriverError, &message);
            }
        }
    }
}

impl NativeEngine for CpalEngine {
    fn current_api(&self) -> Api {
        self.api
    }

    fn device_count(&mut self) -> u32 {
        self.refresh_devices();
        self.devices.len() as u32
    }

    fn device_info(&mut self, device: u32) -> Result<DeviceInfo> {
        let handle = self.device(device)?;
        let name = handle
            .name()
            .map_err(|err| EngineError::driver(format!("probing device {device}: {err}")))?;
        let outputs = handle
            .supported_output_configs()
            .map(collect_capabilities)
            .unwrap_or_default();
        let inputs = handle
            .supported_input_configs()
            .map(collect_capabilities)
            .unwrap_or_default();
        let preferred = handle
            .default_output_config()
            .or_else(|_| handle.default_input_config())
            .map(|config| config.sample_rate().0)
            .unwrap_or(0);
        let default_output = self
            .host
            .default_output_device()
            .and_then(|device| device.name().ok());
        let default_input = self
            .host
            .default_input_device()
            .and_then(|device| device.name().ok());

        let mut rates = outputs.rates.clone();
        for rate in &inputs.rates {
            if !rates.contains(rate) {
                rates.push(*rate);
            }
        }
        rates.sort_unstable();

        let info = DeviceInfo::new(name.clone(), outputs.channels, inputs.channels)
            .with_sample_rates(rates, preferred)
            .with_formats(outputs.formats | inputs.formats)
            .with_defaults(
                default_output.as_deref() == Some(name.as_str()),
                default_input.as_deref() == Some(name.as_str()),
            );
        Ok(info)
    }

    fn default_output_device(&mut self) -> u32 {
        let name = self
            .host
            .default_output_device()
            .and_then(|device| device.name().ok());
        self.position_of(name)
    }

    fn default_input_device(&mut self) -> u32 {
        let name = self
            .host
            .default_input_device()
            .and_then(|device| device.name().ok());
        self.position_of(name)
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
        let (params, is_output) = match (request.output, request.input) {
            (Some(_), Some(_)) => {
                return Err(EngineError::invalid_use(
                    "duplex streams are not supported by the cpal engine",
                ))
            }
            (Some(params), None) => (params, true),
            (None, Some(params)) => (params, false),
            (None, None) => {
                return Err(EngineError::invalid_use(
                    "input and output stream parameters are both absent",
                ))
            }
        };
        if request.flags().contains(StreamFlags::NONINTERLEAVED) {
            return Err(EngineError::invalid_use(
                "non-interleaved buffers are not supported by the cpal engine",
            ));
        }
        if params.channels == 0 {
            return Err(EngineError::invalid_parameter("channel count must be at least one"));
        }
        if params.first_channel != 0 {
            return Err(EngineError::invalid_parameter(
                "channel offsets are not supported by the cpal engine",
            ));
        }
        let sample_format = to_cpal_format(request.format)
            .ok_or_else(|| EngineError::invalid_parameter("sample format is not supported"))?;
        let device = self.device(params.device_id)?;

        let supported = if is_output {
            device
                .supported_output_configs()
                .map(|ranges| ranges.collect::<Vec<_>>())
        } else {
            device
                .supported_input_configs()
                .map(|ranges| ranges.collect::<Vec<_>>())
        }
        .map_err(|err| EngineError::driver(err.to_string()))?;
        let rate = cpal::SampleRate(request.sample_rate);
        let range = supported
            .into_iter()
            .find(|range| {
                u32::from(range.channels()) == params.channels
                    && range.sample_format() == sample_format
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .ok_or_else(|| {
                EngineError::invalid_parameter(format!(
                    "device {} does not support {} channels at {} Hz in the requested format",
                    params.device_id, params.channels, request.sample_rate
                ))
            })?;

        let requested = if *buffer_frames == 0 {
            FALLBACK_BUFFER_FRAMES
        } else {
            *buffer_frames
        };
        let (frames, buffer_size) = match range.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => {
                let frames = requested.clamp(*min, *max);
                (frames, cpal::BufferSize::Fixed(frames))
            }
            cpal::SupportedBufferSize::Unknown => (requested, cpal::BufferSize::Default),
        };
        let config = cpal::StreamConfig {
            channels: params.channels as u16,
            sample_rate: rate,
            buffer_size,
        };

        let realtime_priority = request
            .options
            .as_ref()
            .filter(|options| options.flags.contains(StreamFlags::SCHEDULE_REALTIME))
            .map(|options| options.priority);
        if request.options.as_ref().is_some_and(|options| options.name.is_some()) {
            tracing::debug!(
                target: "rtaudio::cpal",
                "stream name ignored; cpal names its own threads"
            );
        }

        let shared = Arc::new(StreamShared::new(request.sample_rate));
        let channels = params.channels as usize;
        let sink = error_callback.map(|cb| Arc::new(Mutex::new(cb)));
        let mut watch =
            PeriodWatch::new(shared.clone(), realtime_priority, is_output, sink.clone());
        let on_error = Self::forward_errors(sink);
        let stream = if is_output {
            let shared_cb = shared.clone();
            device.build_output_stream_raw(
                &config,
                sample_format,
                move |data: &mut cpal::Data, info: &cpal::OutputCallbackInfo| {
                    let frames = (data.len() / channels) as u32;
                    let timestamp = info.timestamp();
                    if let Some(latency) = timestamp.playback.duration_since(&timestamp.callback) {
                        let latency = latency.as_secs_f64() * f64::from(shared_cb.sample_rate());
                        shared_cb.set_latency(latency as u32);
                    }
                    let bytes = data.bytes_mut();
                    let started = watch.begin();
                    let ran = unsafe {
                        shared_cb.run_callback(
                            &callback,
                            bytes.as_mut_ptr().cast::<c_void>(),
                            core::ptr::null_mut(),
                            frames,
                        )
                    };
                    watch.end(started, frames, ran.is_some());
                    if ran.is_none() {
                        bytes.fill(0);
                    }
                },
                on_error,
                None,
            )
        } else {
            let shared_cb = shared.clone();
            device.build_input_stream_raw(
                &config,
                sample_format,
                move |data: &cpal::Data, info: &cpal::InputCallbackInfo| {
                    let frames = (data.len() / channels) as u32;
                    let timestamp = info.timestamp();
                    if let Some(latency) = timestamp.callback.duration_since(&timestamp.capture) {
                        let latency = latency.as_secs_f64() * f64::from(shared_cb.sample_rate());
                        shared_cb.set_latency(latency as u32);
                    }
                    let bytes = data.bytes();
                    let started = watch.begin();
                    let ran = unsafe {
                        shared_cb.run_callback(
                            &callback,
                            core::ptr::null_mut(),
                            bytes.as_ptr() as *mut c_void,
                            frames,
                        )
                    };
                    watch.end(started, frames, ran.is_some());
                },
                on_error,
                None,
            )
        }
        .map_err(|err| EngineError::driver(err.to_string()))?;
        stream
            .pause()
            .map_err(|err| EngineError::driver(err.to_string()))?;

        self.stream = Some(CpalStream { stream, shared });
        *buffer_frames = frames;
        tracing::debug!(target: "rtaudio::cpal", api = self.api.name(), frames, "stream opened");
        Ok(())
    }

    fn close_stream(&mut self) {
        let Some(stream) = self.stream.take() else {
            if self.show_warnings {
                tracing::warn!(target: "rtaudio::cpal", "no open stream to close");
            }
            return;
        };
        stream.shared.disable();
        let _ = stream.stream.pause();
    }

    fn start_stream(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| EngineError::invalid_use("cannot start stream: no stream is open"))?;
        if stream.shared.is_running() {
            if self.show_warnings {
                tracing::warn!(target: "rtaudio::cpal", "the stream is already running");
            }
            return Ok(());
        }
        stream.shared.enable();
        stream.stream.play().map_err(|err| {
            stream.shared.disable();
            EngineError::driver(err.to_string())
        })
    }

    fn stop_stream(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| EngineError::invalid_use("cannot stop stream: no stream is open"))?;
        stream.shared.disable();
        stream
            .stream
            .pause()
            .map_err(|err| EngineError::driver(err.to_string()))
    }

    fn abort_stream(&mut self) -> Result<()> {
        // cpal offers no drain control; pausing drops whatever is queued.
        self.stop_stream()
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

#[cfg(test)]
mod tests {
    use super::*;
    use core::ffi::c_int;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::backend::{CallbackRegistration, CALLBACK_CONTINUE};

    unsafe extern "C" fn status_cb(
        _out: *mut c_void,
        _inp: *mut c_void,
        _frames: u32,
        _time: f64,
        status: StreamStatus,
        user: *mut c_void,
    ) -> c_int {
        (*(user as *const AtomicU32)).store(status.bits(), Ordering::SeqCst);
        CALLBACK_CONTINUE
    }

    fn next_status(shared: &StreamShared) -> StreamStatus {
        let seen = AtomicU32::new(u32::MAX);
        let reg = CallbackRegistration::new(status_cb, &seen as *const AtomicU32 as *mut c_void);
        let ran = unsafe {
            shared.run_callback(&reg, core::ptr::null_mut(), core::ptr::null_mut(), 64)
        };
        assert!(ran.is_some());
        StreamStatus::from_bits_truncate(seen.load(Ordering::SeqCst))
    }

    #[test]
    fn overrun_periods_flag_the_direction_xrun() {
        let shared = Arc::new(StreamShared::new(48_000));
        shared.enable();
        let output = PeriodWatch::new(shared.clone(), None, true, None);
        let late = Instant::now() - Duration::from_millis(20);
        output.end(late, 64, true);
        assert_eq!(next_status(&shared), StreamStatus::OUTPUT_UNDERFLOW);
        assert_eq!(next_status(&shared), StreamStatus::empty());

        let input = PeriodWatch::new(shared.clone(), None, false, None);
        input.end(late, 64, true);
        assert_eq!(next_status(&shared), StreamStatus::INPUT_OVERFLOW);

        // Skipped periods and periods within budget report nothing.
        output.end(late, 64, false);
        output.end(Instant::now(), 4096, true);
        assert_eq!(next_status(&shared), StreamStatus::empty());
    }

    #[test]
    fn promotion_is_attempted_only_once() {
        let warnings = Arc::new(AtomicU32::new(0));
        let counted = warnings.clone();
        let sink: ErrorCallback = Box::new(move |kind: EngineErrorKind, _message: &str| {
            assert_eq!(kind, EngineErrorKind::Warning);
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let shared = Arc::new(StreamShared::new(48_000));
        let sink = Some(Arc::new(Mutex::new(sink)));
        let mut watch = PeriodWatch::new(shared, Some(i32::MAX), true, sink);
        std::thread::spawn(move || {
            watch.begin();
            assert!(watch.promote.is_none());
            watch.begin();
        })
        .join()
        .expect("callback thread");
        assert!(warnings.load(Ordering::SeqCst) <= 1);
    }
}
