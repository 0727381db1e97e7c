use core::ffi::{c_int, c_uint, c_void};
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rtaudio_c::{rtaudio_stream_status_t, CallbackSlot};
use rtaudio_engine::shared::StreamShared;
use rtaudio_engine::StreamStatus;

unsafe extern "C" fn fill(
    out: *mut c_void,
    _in: *mut c_void,
    nframes: c_uint,
    _time: f64,
    _status: rtaudio_stream_status_t,
    _userdata: *mut c_void,
) -> c_int {
    let samples = core::slice::from_raw_parts_mut(out as *mut f32, nframes as usize * 2);
    samples.fill(0.0);
    0
}

fn proxy_hop(c: &mut Criterion) {
    let mut group = c.benchmark_group("callback_proxy");
    group.measurement_time(Duration::from_secs(5));

    for frames in [64u32, 256, 1024] {
        let mut buffer = vec![0f32; frames as usize * 2];
        let slot = CallbackSlot::new(Some(fill), core::ptr::null_mut());
        let registration = slot.registration();

        group.bench_function(format!("direct_{frames}"), |b| {
            b.iter(|| unsafe {
                black_box(registration.invoke(
                    buffer.as_mut_ptr().cast(),
                    core::ptr::null_mut(),
                    frames,
                    0.0,
                    StreamStatus::empty(),
                ))
            });
        });

        // Proxy plus the engine-side gate and clock bookkeeping.
        let shared = StreamShared::new(48_000);
        shared.enable();
        group.bench_function(format!("gated_{frames}"), |b| {
            b.iter(|| unsafe {
                black_box(shared.run_callback(
                    &registration,
                    buffer.as_mut_ptr().cast(),
                    core::ptr::null_mut(),
                    frames,
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, proxy_hop);
criterion_main!(benches);
