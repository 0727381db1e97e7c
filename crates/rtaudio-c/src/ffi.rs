//! The exported `rtaudio_*` surface. Declarations live in
//! `include/rtaudio_c.h`.

#![allow(non_camel_case_types)]

use core::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ffi::CString;

use once_cell::sync::Lazy;
use rtaudio_engine::{compiled_api_by_name, compiled_apis, Api};

use crate::abi::{
    rtaudio_api_t, rtaudio_cb_t, rtaudio_device_info_t, rtaudio_error_cb_t, rtaudio_format_t,
    rtaudio_stream_options_t, rtaudio_stream_parameters_t, RTAUDIO_API_UNSPECIFIED,
};
use crate::error::ShimError;
use crate::guard::{guard_instance, guard_with_default};
use crate::instance::Instance;

pub type rtaudio_t = *mut Instance;

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Compiled backends followed by the `UNSPECIFIED` terminator.
static COMPILED: Lazy<Vec<rtaudio_api_t>> = Lazy::new(|| {
    compiled_apis()
        .iter()
        .map(|api| *api as rtaudio_api_t)
        .chain(std::iter::once(RTAUDIO_API_UNSPECIFIED))
        .collect()
});

struct ApiNames {
    name: CString,
    display_name: CString,
}

static API_NAMES: Lazy<Vec<ApiNames>> = Lazy::new(|| {
    Api::ALL
        .iter()
        .map(|api| ApiNames {
            name: CString::new(api.name()).unwrap_or_default(),
            display_name: CString::new(api.display_name()).unwrap_or_default(),
        })
        .collect()
});

fn api_names(api: rtaudio_api_t) -> Option<&'static ApiNames> {
    let api = Api::from_raw(api)?;
    API_NAMES.get(Api::ALL.iter().position(|known| *known == api)?)
}

#[no_mangle]
pub extern "C" fn rtaudio_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn rtaudio_compiled_api() -> *const rtaudio_api_t {
    guard_with_default("rtaudio_compiled_api", core::ptr::null(), || COMPILED.as_ptr())
}

/// Short identifier such as `alsa`; null for unknown values.
#[no_mangle]
pub extern "C" fn rtaudio_api_name(api: rtaudio_api_t) -> *const c_char {
    guard_with_default("rtaudio_api_name", core::ptr::null(), || {
        api_names(api).map_or(core::ptr::null(), |names| names.name.as_ptr())
    })
}

#[no_mangle]
pub extern "C" fn rtaudio_api_display_name(api: rtaudio_api_t) -> *const c_char {
    guard_with_default("rtaudio_api_display_name", core::ptr::null(), || {
        api_names(api).map_or(core::ptr::null(), |names| names.display_name.as_ptr())
    })
}

/// # Safety
/// `name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_compiled_api_by_name(name: *const c_char) -> rtaudio_api_t {
    if name.is_null() {
        return RTAUDIO_API_UNSPECIFIED;
    }
    guard_with_default("rtaudio_compiled_api_by_name", RTAUDIO_API_UNSPECIFIED, || {
        let name = CStr::from_ptr(name).to_string_lossy();
        compiled_api_by_name(&name).map_or(RTAUDIO_API_UNSPECIFIED, |api| api as rtaudio_api_t)
    })
}

/// Last error message, or null when the previous fallible call succeeded.
///
/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_error(audio: rtaudio_t) -> *const c_char {
    if audio.is_null() {
        return core::ptr::null();
    }
    (*audio).error().as_ptr()
}

/// Always returns a handle, even when no engine could be built; check
/// `rtaudio_error` right after.
#[no_mangle]
pub extern "C" fn rtaudio_create(api: rtaudio_api_t) -> rtaudio_t {
    guard_with_default("rtaudio_create", core::ptr::null_mut(), || {
        let instance = match Api::from_raw(api) {
            Some(api) => Instance::create(api),
            None => Instance::failed(ShimError::Construction(format!(
                "unknown audio API value {api}"
            ))),
        };
        instance.into_raw()
    })
}

/// Stops and closes any open stream, then frees the handle. Null is a
/// no-op.
///
/// # Safety
/// `audio` must be null or a live handle; it is dangling afterwards.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_destroy(audio: rtaudio_t) {
    if audio.is_null() {
        return;
    }
    guard_with_default("rtaudio_destroy", (), || {
        drop(Instance::from_raw(audio));
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_current_api(audio: rtaudio_t) -> rtaudio_api_t {
    guard_instance("rtaudio_current_api", audio, RTAUDIO_API_UNSPECIFIED, |rt| {
        rt.current_api() as rtaudio_api_t
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_device_count(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_device_count", audio, 0, |rt| rt.device_count())
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_device_info(audio: rtaudio_t, i: c_int) -> rtaudio_device_info_t {
    guard_instance(
        "rtaudio_get_device_info",
        audio,
        rtaudio_device_info_t::unprobed(),
        |rt| rt.device_info(i),
    )
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_default_output_device(audio: rtaudio_t) -> c_uint {
    guard_instance("rtaudio_get_default_output_device", audio, 0, |rt| {
        rt.default_output_device()
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_default_input_device(audio: rtaudio_t) -> c_uint {
    guard_instance("rtaudio_get_default_input_device", audio, 0, |rt| {
        rt.default_input_device()
    })
}

/// Opens a stream. Returns 0 on success and a negative value on failure.
///
/// # Safety
/// Every pointer must be null or valid for its type; `buffer_frames` must
/// not be null. `cb` and `userdata` must stay valid until the stream is
/// closed, and `cb` runs on a thread owned by the engine.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_open_stream(
    audio: rtaudio_t,
    output_params: *mut rtaudio_stream_parameters_t,
    input_params: *mut rtaudio_stream_parameters_t,
    format: rtaudio_format_t,
    sample_rate: c_uint,
    buffer_frames: *mut c_uint,
    cb: rtaudio_cb_t,
    userdata: *mut c_void,
    options: *mut rtaudio_stream_options_t,
    errcb: rtaudio_error_cb_t,
) -> c_int {
    guard_instance("rtaudio_open_stream", audio, -1, |rt| {
        let Some(buffer_frames) = buffer_frames.as_mut() else {
            rt.error_mut().clear();
            rt.error_mut()
                .record(&ShimError::StreamOpen("buffer_frames must not be null".into()));
            return -1;
        };
        rt.open_stream(
            output_params.as_ref(),
            input_params.as_ref(),
            format,
            sample_rate,
            buffer_frames,
            cb,
            userdata,
            options.as_ref(),
            errcb,
        )
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_close_stream(audio: rtaudio_t) {
    guard_instance("rtaudio_close_stream", audio, (), |rt| rt.close_stream())
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_start_stream(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_start_stream", audio, -1, |rt| rt.start_stream())
}

/// Returns once no callback is in flight and none will begin.
///
/// # Safety
/// `audio` must be null or a live handle. Must not be called from the
/// stream callback.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_stop_stream(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_stop_stream", audio, -1, |rt| rt.stop_stream())
}

/// # Safety
/// `audio` must be null or a live handle. Must not be called from the
/// stream callback.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_abort_stream(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_abort_stream", audio, -1, |rt| rt.abort_stream())
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_is_stream_open(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_is_stream_open", audio, 0, |rt| {
        c_int::from(rt.is_stream_open())
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_is_stream_running(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_is_stream_running", audio, 0, |rt| {
        c_int::from(rt.is_stream_running())
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_stream_time(audio: rtaudio_t) -> f64 {
    guard_instance("rtaudio_get_stream_time", audio, 0.0, |rt| rt.stream_time())
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_set_stream_time(audio: rtaudio_t, time: f64) {
    guard_instance("rtaudio_set_stream_time", audio, (), |rt| {
        rt.set_stream_time(time)
    })
}

/// Latency in frames, or -1.
///
/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_stream_latency(audio: rtaudio_t) -> c_int {
    guard_instance("rtaudio_get_stream_latency", audio, -1, |rt| {
        rt.stream_latency()
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_get_stream_sample_rate(audio: rtaudio_t) -> c_uint {
    guard_instance("rtaudio_get_stream_sample_rate", audio, 0, |rt| {
        rt.stream_sample_rate()
    })
}

/// # Safety
/// `audio` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn rtaudio_show_warnings(audio: rtaudio_t, show: c_int) {
    guard_instance("rtaudio_show_warnings", audio, (), |rt| {
        rt.show_warnings(show != 0)
    })
}
