#![cfg(feature = "dummy")]

use core::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rtaudio_engine::{
    CallbackRegistration, DummyDevice, DummyEngine, EngineErrorKind, NativeEngine, SampleFormat,
    StreamFlags, StreamOptions, StreamParameters, StreamRequest, StreamStatus, CALLBACK_CONTINUE,
};

#[derive(Default)]
struct Counter {
    calls: AtomicUsize,
    last_frames: AtomicU32,
    stop_after: AtomicUsize,
    return_code: AtomicU32,
}

unsafe extern "C" fn counting_cb(
    output: *mut c_void,
    _input: *mut c_void,
    frames: u32,
    _time: f64,
    _status: StreamStatus,
    user: *mut c_void,
) -> c_int {
    let counter = &*(user as *const Counter);
    assert!(!output.is_null());
    let calls = counter.calls.fetch_add(1, Ordering::SeqCst) + 1;
    counter.last_frames.store(frames, Ordering::SeqCst);
    let stop_after = counter.stop_after.load(Ordering::SeqCst);
    if stop_after != 0 && calls >= stop_after {
        return counter.return_code.load(Ordering::SeqCst) as c_int;
    }
    CALLBACK_CONTINUE
}

fn output_request(rate: u32) -> StreamRequest {
    StreamRequest {
        output: Some(StreamParameters {
            device_id: 0,
            channels: 2,
            first_channel: 0,
        }),
        input: None,
        format: SampleFormat::FLOAT32,
        sample_rate: rate,
        options: None,
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

#[test]
fn stream_runs_and_stops_with_negotiated_frames() {
    let counter = Counter::default();
    let mut engine = DummyEngine::new();
    let mut frames = 250;
    engine
        .open_stream(
            &output_request(44_100),
            &mut frames,
            CallbackRegistration::new(counting_cb, &counter as *const Counter as *mut c_void),
            None,
        )
        .expect("open");
    assert_eq!(frames, 256);
    assert!(engine.is_stream_open());
    assert!(!engine.is_stream_running());

    engine.start_stream().expect("start");
    assert!(wait_until(Duration::from_secs(2), || counter.calls.load(Ordering::SeqCst) >= 3));
    assert_eq!(counter.last_frames.load(Ordering::SeqCst), 256);

    engine.stop_stream().expect("stop");
    let after_stop = counter.calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(counter.calls.load(Ordering::SeqCst), after_stop);
    assert!(!engine.is_stream_running());
    assert!(engine.stream_time().expect("time") > 0.0);

    engine.close_stream();
    assert!(!engine.is_stream_open());
}

#[test]
fn callback_return_code_halts_stream() {
    let counter = Counter::default();
    counter.stop_after.store(2, Ordering::SeqCst);
    counter.return_code.store(2, Ordering::SeqCst);
    let mut engine = DummyEngine::new();
    let mut frames = 64;
    engine
        .open_stream(
            &output_request(48_000),
            &mut frames,
            CallbackRegistration::new(counting_cb, &counter as *const Counter as *mut c_void),
            None,
        )
        .expect("open");
    engine.start_stream().expect("start");
    assert!(wait_until(Duration::from_secs(2), || !engine.is_stream_running()));
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

    // A halted stream can be restarted.
    counter.stop_after.store(0, Ordering::SeqCst);
    engine.start_stream().expect("restart");
    assert!(wait_until(Duration::from_secs(2), || counter.calls.load(Ordering::SeqCst) > 2));
    engine.abort_stream().expect("abort");
    assert!(!engine.is_stream_running());
}

#[test]
fn open_validates_parameters_and_leaves_frames_alone() {
    let counter = Counter::default();
    let reg = CallbackRegistration::new(counting_cb, &counter as *const Counter as *mut c_void);
    let mut engine = DummyEngine::new();

    let mut frames = 128;
    let err = engine
        .open_stream(&output_request(12_345), &mut frames, reg, None)
        .expect_err("unsupported rate");
    assert_eq!(err.kind, EngineErrorKind::InvalidParameter);
    assert_eq!(frames, 128);

    let mut request = output_request(48_000);
    request.output = None;
    let err = engine
        .open_stream(&request, &mut frames, reg, None)
        .expect_err("no directions");
    assert_eq!(err.kind, EngineErrorKind::InvalidUse);

    let mut request = output_request(48_000);
    request.format = SampleFormat::FLOAT32 | SampleFormat::SINT16;
    assert!(engine.open_stream(&request, &mut frames, reg, None).is_err());

    let mut request = output_request(48_000);
    request.output = Some(StreamParameters {
        device_id: 0,
        channels: 2,
        first_channel: 1,
    });
    assert!(engine.open_stream(&request, &mut frames, reg, None).is_err());
    assert!(!engine.is_stream_open());
}

#[test]
fn rigged_devices_fail_probe_and_start() {
    let mut engine = DummyEngine::with_devices(vec![
        DummyDevice::output("Broken Start", 2).failing_start("device vanished"),
        DummyDevice::output("Broken Probe", 2).failing_probe("probe timed out"),
    ]);
    assert_eq!(engine.device_info(1).expect_err("probe").message, "probe timed out");

    let counter = Counter::default();
    let reg = CallbackRegistration::new(counting_cb, &counter as *const Counter as *mut c_void);
    let mut frames = 256;
    engine
        .open_stream(&output_request(48_000), &mut frames, reg, None)
        .expect("open");
    let err = engine.start_stream().expect_err("start must fail");
    assert_eq!(err.kind, EngineErrorKind::DriverError);
    assert!(!engine.is_stream_running());
}

#[test]
fn latency_and_rate_reflect_the_open_stream() {
    let mut engine = DummyEngine::new();
    assert!(engine.stream_latency().is_err());
    let reg = CallbackRegistration::new(counting_cb, core::ptr::null_mut());
    let mut request = output_request(96_000);
    request.options = Some(StreamOptions {
        flags: StreamFlags::empty(),
        num_buffers: 4,
        priority: 0,
        name: Some("latency-test".into()),
    });
    let mut frames = 512;
    engine.open_stream(&request, &mut frames, reg, None).expect("open");
    assert_eq!(engine.stream_latency().expect("latency"), 512 * 3);
    assert_eq!(engine.stream_sample_rate().expect("rate"), 96_000);
    engine.set_stream_time(5.0).expect("set time");
    assert!((engine.stream_time().expect("time") - 5.0).abs() < 1e-9);
    assert!(engine.set_stream_time(-1.0).is_err());
}

#[test]
fn realtime_promotion_failure_is_reported_as_warning() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = warnings.clone();
    let counter = Counter::default();
    let mut engine = DummyEngine::new();
    let mut request = output_request(48_000);
    request.options = Some(StreamOptions {
        flags: StreamFlags::SCHEDULE_REALTIME,
        num_buffers: 0,
        priority: 99,
        name: None,
    });
    let mut frames = 128;
    engine
        .open_stream(
            &request,
            &mut frames,
            CallbackRegistration::new(counting_cb, &counter as *const Counter as *mut c_void),
            Some(Box::new(move |kind, message: &str| {
                sink.lock().unwrap().push((kind, message.to_string()));
            })),
        )
        .expect("open");
    engine.start_stream().expect("start");
    assert!(wait_until(Duration::from_secs(2), || counter.calls.load(Ordering::SeqCst) > 0));
    engine.stop_stream().expect("stop");

    // Unprivileged runs fail to promote; privileged runs report nothing.
    for (kind, message) in warnings.lock().unwrap().iter() {
        assert_eq!(*kind, EngineErrorKind::Warning);
        assert!(message.contains("realtime priority"));
    }
}

#[derive(Default)]
struct SlowFirstPeriod {
    calls: AtomicUsize,
    second_status: AtomicU32,
}

unsafe extern "C" fn slow_first_cb(
    _output: *mut c_void,
    _input: *mut c_void,
    _frames: u32,
    _time: f64,
    status: StreamStatus,
    user: *mut c_void,
) -> c_int {
    let state = &*(user as *const SlowFirstPeriod);
    match state.calls.fetch_add(1, Ordering::SeqCst) {
        0 => std::thread::sleep(Duration::from_millis(20)),
        1 => state.second_status.store(status.bits(), Ordering::SeqCst),
        _ => {}
    }
    CALLBACK_CONTINUE
}

#[test]
fn overrunning_callback_reports_underflow_next_period() {
    let state = SlowFirstPeriod::default();
    let mut engine = DummyEngine::new();
    let mut frames = 64;
    engine
        .open_stream(
            &output_request(48_000),
            &mut frames,
            CallbackRegistration::new(slow_first_cb, &state as *const SlowFirstPeriod as *mut c_void),
            None,
        )
        .expect("open");
    engine.start_stream().expect("start");
    assert!(wait_until(Duration::from_secs(2), || state.calls.load(Ordering::SeqCst) >= 2));
    engine.stop_stream().expect("stop");

    let status = StreamStatus::from_bits_truncate(state.second_status.load(Ordering::SeqCst));
    assert!(status.contains(StreamStatus::OUTPUT_UNDERFLOW));
    assert!(!status.contains(StreamStatus::INPUT_OVERFLOW));
    engine.close_stream();
}
