#![cfg(feature = "dummy")]

use core::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rtaudio_c::*;
use rtaudio_engine::{DummyDevice, DummyEngine};

#[derive(Default)]
struct Recorder {
    calls: AtomicUsize,
    last_frames: AtomicU32,
    in_flight: AtomicBool,
    stop_after: AtomicUsize,
    thread_name: Mutex<Option<String>>,
}

unsafe extern "C" fn record(
    out: *mut c_void,
    _in: *mut c_void,
    nframes: c_uint,
    _time: f64,
    _status: rtaudio_stream_status_t,
    userdata: *mut c_void,
) -> c_int {
    let recorder = &*(userdata as *const Recorder);
    recorder.in_flight.store(true, Ordering::SeqCst);
    let samples = core::slice::from_raw_parts_mut(out as *mut f32, nframes as usize * 2);
    samples.fill(0.25);
    // Long enough for a concurrent stop to observe the invocation.
    std::thread::sleep(Duration::from_micros(200));
    recorder.last_frames.store(nframes, Ordering::SeqCst);
    if let Ok(mut name) = recorder.thread_name.lock() {
        if name.is_none() {
            *name = std::thread::current().name().map(str::to_owned);
        }
    }
    let calls = recorder.calls.fetch_add(1, Ordering::SeqCst) + 1;
    recorder.in_flight.store(false, Ordering::SeqCst);
    let stop_after = recorder.stop_after.load(Ordering::SeqCst);
    if stop_after != 0 && calls >= stop_after {
        1
    } else {
        0
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

unsafe fn error_text(audio: rtaudio_t) -> Option<String> {
    let ptr = rtaudio_error(audio);
    (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

unsafe fn open_output(
    audio: rtaudio_t,
    frames: &mut c_uint,
    recorder: &Recorder,
) -> c_int {
    let mut output = rtaudio_stream_parameters_t {
        device_id: rtaudio_get_default_output_device(audio),
        num_channels: 2,
        first_channel: 0,
    };
    rtaudio_open_stream(
        audio,
        &mut output,
        core::ptr::null_mut(),
        RTAUDIO_FORMAT_FLOAT32,
        44_100,
        frames,
        Some(record),
        recorder as *const Recorder as *mut c_void,
        core::ptr::null_mut(),
        None,
    )
}

#[test]
fn full_lifecycle_through_the_c_surface() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        assert!(error_text(audio).is_none());
        assert_eq!(rtaudio_current_api(audio), RTAUDIO_API_DUMMY);
        assert!(rtaudio_device_count(audio) >= 0);

        let recorder = Recorder::default();
        let mut frames: c_uint = 256;
        assert_eq!(open_output(audio, &mut frames, &recorder), 0);
        assert!(error_text(audio).is_none());
        assert_eq!(rtaudio_is_stream_open(audio), 1);
        assert_eq!(rtaudio_is_stream_running(audio), 0);
        assert_eq!(rtaudio_get_stream_sample_rate(audio), 44_100);
        assert!(rtaudio_get_stream_latency(audio) >= frames as c_int);

        assert_eq!(rtaudio_start_stream(audio), 0);
        assert_eq!(rtaudio_is_stream_running(audio), 1);
        assert!(wait_until(Duration::from_secs(2), || recorder
            .calls
            .load(Ordering::SeqCst)
            >= 3));
        assert_eq!(recorder.last_frames.load(Ordering::SeqCst), frames);

        assert_eq!(rtaudio_stop_stream(audio), 0);
        assert!(!recorder.in_flight.load(Ordering::SeqCst));
        let after_stop = recorder.calls.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), after_stop);
        assert_eq!(rtaudio_is_stream_running(audio), 0);
        assert!(rtaudio_get_stream_time(audio) > 0.0);

        rtaudio_close_stream(audio);
        assert_eq!(rtaudio_is_stream_open(audio), 0);
        rtaudio_destroy(audio);
    }
}

#[test]
fn negotiated_size_reopens_cleanly() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let recorder = Recorder::default();
        let mut frames: c_uint = 300;
        assert_eq!(open_output(audio, &mut frames, &recorder), 0);
        let negotiated = frames;
        assert_ne!(negotiated, 300);
        rtaudio_close_stream(audio);

        let mut again = negotiated;
        assert_eq!(open_output(audio, &mut again, &recorder), 0);
        assert_eq!(again, negotiated);
        assert!(error_text(audio).is_none());
        rtaudio_destroy(audio);
    }
}

#[test]
fn invalid_device_indices_return_zeroed_descriptors() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let count = rtaudio_device_count(audio);
        for i in 0..count {
            let info = rtaudio_get_device_info(audio, i);
            assert_eq!(info.probed, 1);
            let name = CStr::from_ptr(info.name.as_ptr()).to_bytes();
            assert!(name.len() < MAX_NAME_LENGTH);
            assert!(error_text(audio).is_none());
        }

        for index in [-1, count, count + 10] {
            let info = rtaudio_get_device_info(audio, index);
            assert_eq!(info.probed, 0);
            assert_eq!(info.output_channels, 0);
            assert_eq!(info.input_channels, 0);
            assert_eq!(info.preferred_sample_rate, 0);
            assert!(info.sample_rates.iter().all(|rate| *rate == 0));
            let message = error_text(audio).expect("probe error");
            assert!(!message.is_empty());
            assert!(message.len() < MAX_NAME_LENGTH);
        }
        rtaudio_destroy(audio);
    }
}

#[test]
fn stop_when_not_running_is_a_clean_no_op() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        rtaudio_show_warnings(audio, 0);

        // Nothing open: every control call fails with a message.
        assert_eq!(rtaudio_stop_stream(audio), -1);
        assert!(error_text(audio).is_some());
        assert_eq!(rtaudio_abort_stream(audio), -1);
        assert_eq!(rtaudio_start_stream(audio), -1);
        assert_eq!(rtaudio_get_stream_latency(audio), -1);
        assert_eq!(rtaudio_get_stream_sample_rate(audio), 0);
        assert_eq!(rtaudio_get_stream_time(audio), 0.0);

        let recorder = Recorder::default();
        let mut frames: c_uint = 128;
        assert_eq!(open_output(audio, &mut frames, &recorder), 0);
        assert_eq!(rtaudio_stop_stream(audio), 0);
        assert!(error_text(audio).is_none());
        assert_eq!(rtaudio_abort_stream(audio), 0);
        assert!(error_text(audio).is_none());

        // A second open while one is live is rejected and changes nothing.
        let mut other: c_uint = 64;
        assert_eq!(open_output(audio, &mut other, &recorder), -1);
        assert_eq!(other, 64);
        assert!(error_text(audio).is_some());
        assert_eq!(rtaudio_is_stream_open(audio), 1);

        rtaudio_destroy(audio);
    }
}

#[test]
fn callback_return_code_stops_the_stream() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let recorder = Recorder::default();
        recorder.stop_after.store(3, Ordering::SeqCst);
        let mut frames: c_uint = 64;
        assert_eq!(open_output(audio, &mut frames, &recorder), 0);
        assert_eq!(rtaudio_start_stream(audio), 0);
        assert!(wait_until(Duration::from_secs(2), || rtaudio_is_stream_running(audio) == 0));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
        assert!(error_text(audio).is_none());

        // Stopped by the callback, so a restart is allowed.
        recorder.stop_after.store(0, Ordering::SeqCst);
        assert_eq!(rtaudio_start_stream(audio), 0);
        assert_eq!(rtaudio_abort_stream(audio), 0);
        rtaudio_destroy(audio);
    }
}

#[test]
fn engine_start_failure_is_reported() {
    unsafe {
        let engine = DummyEngine::with_devices(vec![
            DummyDevice::output("Unplugged", 2).failing_start("device was unplugged")
        ]);
        let audio = Instance::with_engine(Box::new(engine)).into_raw();
        let recorder = Recorder::default();
        let mut frames: c_uint = 256;
        assert_eq!(open_output(audio, &mut frames, &recorder), 0);
        assert_eq!(rtaudio_start_stream(audio), -1);
        assert_eq!(error_text(audio).as_deref(), Some("device was unplugged"));
        assert_eq!(rtaudio_is_stream_running(audio), 0);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        rtaudio_destroy(audio);
    }
}

#[test]
fn bad_open_requests_set_the_error() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let recorder = Recorder::default();

        let mut frames: c_uint = 256;
        let rc = rtaudio_open_stream(
            audio,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
            RTAUDIO_FORMAT_FLOAT32,
            48_000,
            &mut frames,
            Some(record),
            &recorder as *const Recorder as *mut c_void,
            core::ptr::null_mut(),
            None,
        );
        assert_eq!(rc, -1);
        assert!(error_text(audio).is_some());
        assert_eq!(frames, 256);

        let mut output = rtaudio_stream_parameters_t {
            device_id: 0,
            num_channels: 2,
            first_channel: 0,
        };
        let rc = rtaudio_open_stream(
            audio,
            &mut output,
            core::ptr::null_mut(),
            RTAUDIO_FORMAT_FLOAT32,
            48_000,
            core::ptr::null_mut(),
            Some(record),
            &recorder as *const Recorder as *mut c_void,
            core::ptr::null_mut(),
            None,
        );
        assert_eq!(rc, -1);
        assert!(error_text(audio).unwrap().contains("buffer_frames"));
        assert_eq!(rtaudio_is_stream_open(audio), 0);
        rtaudio_destroy(audio);
    }
}

#[test]
fn options_are_honored() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let recorder = Recorder::default();
        let mut options = rtaudio_stream_options_t {
            flags: RTAUDIO_FLAGS_MINIMIZE_LATENCY,
            num_buffers: 4,
            ..Default::default()
        };
        for (slot, byte) in options.name.iter_mut().zip(b"abi-test".iter()) {
            *slot = *byte as c_char;
        }
        let mut output = rtaudio_stream_parameters_t {
            device_id: 0,
            num_channels: 2,
            first_channel: 0,
        };
        let mut frames: c_uint = 0;
        let rc = rtaudio_open_stream(
            audio,
            &mut output,
            core::ptr::null_mut(),
            RTAUDIO_FORMAT_FLOAT32,
            48_000,
            &mut frames,
            Some(record),
            &recorder as *const Recorder as *mut c_void,
            &mut options,
            None,
        );
        assert_eq!(rc, 0);
        assert_eq!(frames, 16);
        assert_eq!(rtaudio_get_stream_latency(audio), 16 * 3);

        assert_eq!(rtaudio_start_stream(audio), 0);
        assert!(wait_until(Duration::from_secs(2), || {
            recorder.calls.load(Ordering::SeqCst) > 0
        }));
        assert_eq!(rtaudio_stop_stream(audio), 0);
        assert_eq!(
            recorder.thread_name.lock().unwrap().as_deref(),
            Some("abi-test")
        );

        rtaudio_set_stream_time(audio, 2.5);
        assert!(error_text(audio).is_none());
        assert!((rtaudio_get_stream_time(audio) - 2.5).abs() < 1e-9);
        rtaudio_set_stream_time(audio, -1.0);
        assert!(error_text(audio).is_some());
        rtaudio_destroy(audio);
    }
}

#[test]
fn huge_buffer_count_saturates_the_latency() {
    unsafe {
        let audio = rtaudio_create(RTAUDIO_API_DUMMY);
        let recorder = Recorder::default();
        let mut options = rtaudio_stream_options_t {
            num_buffers: u32::MAX,
            ..Default::default()
        };
        let mut output = rtaudio_stream_parameters_t {
            device_id: 0,
            num_channels: 2,
            first_channel: 0,
        };
        let mut frames: c_uint = 4096;
        let rc = rtaudio_open_stream(
            audio,
            &mut output,
            core::ptr::null_mut(),
            RTAUDIO_FORMAT_FLOAT32,
            48_000,
            &mut frames,
            Some(record),
            &recorder as *const Recorder as *mut c_void,
            &mut options,
            None,
        );
        assert_eq!(rc, 0, "{:?}", error_text(audio));
        assert!(error_text(audio).is_none());
        assert_eq!(rtaudio_is_stream_open(audio), 1);
        assert_eq!(frames, 4096);
        assert_eq!(rtaudio_get_stream_latency(audio), c_int::MAX);
        assert!(error_text(audio).is_none());
        rtaudio_close_stream(audio);
        rtaudio_destroy(audio);
    }
}

#[test]
fn compiled_api_lookup_by_name() {
    unsafe {
        assert_eq!(
            rtaudio_compiled_api_by_name(b"dummy\0".as_ptr().cast()),
            RTAUDIO_API_DUMMY
        );
        assert_eq!(
            rtaudio_compiled_api_by_name(b"beos\0".as_ptr().cast()),
            RTAUDIO_API_UNSPECIFIED
        );
    }
    let name = unsafe { CStr::from_ptr(rtaudio_api_display_name(RTAUDIO_API_DUMMY)) };
    assert_eq!(name.to_str().unwrap(), "Dummy");
}
