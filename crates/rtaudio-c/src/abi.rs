//! Flat C types and constants, mirrored in `include/rtaudio_c.h`.

#![allow(non_camel_case_types)]

use core::ffi::{c_char, c_int, c_uint, c_ulong, c_void};

use rtaudio_engine::{Api, EngineErrorKind, SampleFormat, StreamFlags, StreamStatus};

pub type rtaudio_api_t = c_int;
pub type rtaudio_format_t = c_ulong;
pub type rtaudio_stream_flags_t = c_uint;
pub type rtaudio_stream_status_t = c_uint;
pub type rtaudio_error_t = c_int;

pub const RTAUDIO_API_UNSPECIFIED: rtaudio_api_t = Api::Unspecified as rtaudio_api_t;
pub const RTAUDIO_API_LINUX_ALSA: rtaudio_api_t = Api::LinuxAlsa as rtaudio_api_t;
pub const RTAUDIO_API_LINUX_PULSE: rtaudio_api_t = Api::LinuxPulse as rtaudio_api_t;
pub const RTAUDIO_API_LINUX_OSS: rtaudio_api_t = Api::LinuxOss as rtaudio_api_t;
pub const RTAUDIO_API_UNIX_JACK: rtaudio_api_t = Api::UnixJack as rtaudio_api_t;
pub const RTAUDIO_API_MACOSX_CORE: rtaudio_api_t = Api::MacosxCore as rtaudio_api_t;
pub const RTAUDIO_API_WINDOWS_WASAPI: rtaudio_api_t = Api::WindowsWasapi as rtaudio_api_t;
pub const RTAUDIO_API_WINDOWS_ASIO: rtaudio_api_t = Api::WindowsAsio as rtaudio_api_t;
pub const RTAUDIO_API_WINDOWS_DS: rtaudio_api_t = Api::WindowsDs as rtaudio_api_t;
pub const RTAUDIO_API_DUMMY: rtaudio_api_t = Api::Dummy as rtaudio_api_t;

pub const RTAUDIO_FORMAT_SINT8: rtaudio_format_t = SampleFormat::SINT8.bits() as rtaudio_format_t;
pub const RTAUDIO_FORMAT_SINT16: rtaudio_format_t = SampleFormat::SINT16.bits() as rtaudio_format_t;
pub const RTAUDIO_FORMAT_SINT24: rtaudio_format_t = SampleFormat::SINT24.bits() as rtaudio_format_t;
pub const RTAUDIO_FORMAT_SINT32: rtaudio_format_t = SampleFormat::SINT32.bits() as rtaudio_format_t;
pub const RTAUDIO_FORMAT_FLOAT32: rtaudio_format_t =
    SampleFormat::FLOAT32.bits() as rtaudio_format_t;
pub const RTAUDIO_FORMAT_FLOAT64: rtaudio_format_t =
    SampleFormat::FLOAT64.bits() as rtaudio_format_t;

pub const RTAUDIO_FLAGS_NONINTERLEAVED: rtaudio_stream_flags_t = StreamFlags::NONINTERLEAVED.bits();
pub const RTAUDIO_FLAGS_MINIMIZE_LATENCY: rtaudio_stream_flags_t =
    StreamFlags::MINIMIZE_LATENCY.bits();
pub const RTAUDIO_FLAGS_HOG_DEVICE: rtaudio_stream_flags_t = StreamFlags::HOG_DEVICE.bits();
pub const RTAUDIO_FLAGS_SCHEDULE_REALTIME: rtaudio_stream_flags_t =
    StreamFlags::SCHEDULE_REALTIME.bits();
pub const RTAUDIO_FLAGS_ALSA_USE_DEFAULT: rtaudio_stream_flags_t =
    StreamFlags::ALSA_USE_DEFAULT.bits();
pub const RTAUDIO_FLAGS_JACK_DONT_CONNECT: rtaudio_stream_flags_t =
    StreamFlags::JACK_DONT_CONNECT.bits();

pub const RTAUDIO_STATUS_INPUT_OVERFLOW: rtaudio_stream_status_t =
    StreamStatus::INPUT_OVERFLOW.bits();
pub const RTAUDIO_STATUS_OUTPUT_UNDERFLOW: rtaudio_stream_status_t =
    StreamStatus::OUTPUT_UNDERFLOW.bits();

pub const RTAUDIO_ERROR_WARNING: rtaudio_error_t = EngineErrorKind::Warning as rtaudio_error_t;
pub const RTAUDIO_ERROR_DEBUG_WARNING: rtaudio_error_t =
    EngineErrorKind::DebugWarning as rtaudio_error_t;
pub const RTAUDIO_ERROR_UNSPECIFIED: rtaudio_error_t =
    EngineErrorKind::Unspecified as rtaudio_error_t;
pub const RTAUDIO_ERROR_NO_DEVICES_FOUND: rtaudio_error_t =
    EngineErrorKind::NoDevicesFound as rtaudio_error_t;
pub const RTAUDIO_ERROR_INVALID_DEVICE: rtaudio_error_t =
    EngineErrorKind::InvalidDevice as rtaudio_error_t;
pub const RTAUDIO_ERROR_MEMORY_ERROR: rtaudio_error_t =
    EngineErrorKind::MemoryError as rtaudio_error_t;
pub const RTAUDIO_ERROR_INVALID_PARAMETER: rtaudio_error_t =
    EngineErrorKind::InvalidParameter as rtaudio_error_t;
pub const RTAUDIO_ERROR_INVALID_USE: rtaudio_error_t =
    EngineErrorKind::InvalidUse as rtaudio_error_t;
pub const RTAUDIO_ERROR_DRIVER_ERROR: rtaudio_error_t =
    EngineErrorKind::DriverError as rtaudio_error_t;
pub const RTAUDIO_ERROR_SYSTEM_ERROR: rtaudio_error_t =
    EngineErrorKind::SystemError as rtaudio_error_t;
pub const RTAUDIO_ERROR_THREAD_ERROR: rtaudio_error_t =
    EngineErrorKind::ThreadError as rtaudio_error_t;

pub const NUM_SAMPLE_RATES: usize = 16;
pub const MAX_NAME_LENGTH: usize = 512;

/// User callback: output buffer, input buffer, frames, stream time, status,
/// user data. Returns 0 to continue, 1 to stop, 2 to abort.
pub type rtaudio_cb_t = Option<
    unsafe extern "C" fn(
        out: *mut c_void,
        in_: *mut c_void,
        nframes: c_uint,
        stream_time: f64,
        status: rtaudio_stream_status_t,
        userdata: *mut c_void,
    ) -> c_int,
>;

pub type rtaudio_error_cb_t = Option<unsafe extern "C" fn(err: rtaudio_error_t, msg: *const c_char)>;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rtaudio_device_info_t {
    pub probed: c_int,
    pub output_channels: c_uint,
    pub input_channels: c_uint,
    pub duplex_channels: c_uint,
    pub is_default_output: c_int,
    pub is_default_input: c_int,
    pub native_formats: rtaudio_format_t,
    pub preferred_sample_rate: c_uint,
    pub sample_rates: [c_int; NUM_SAMPLE_RATES],
    pub name: [c_char; MAX_NAME_LENGTH],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct rtaudio_stream_parameters_t {
    pub device_id: c_uint,
    pub num_channels: c_uint,
    pub first_channel: c_uint,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct rtaudio_stream_options_t {
    pub flags: rtaudio_stream_flags_t,
    pub num_buffers: c_uint,
    pub priority: c_int,
    pub name: [c_char; MAX_NAME_LENGTH],
}

impl Default for rtaudio_stream_options_t {
    fn default() -> Self {
        Self {
            flags: 0,
            num_buffers: 0,
            priority: 0,
            name: [0; MAX_NAME_LENGTH],
        }
    }
}
