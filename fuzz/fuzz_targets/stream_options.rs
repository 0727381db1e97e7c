#![no_main]

use core::ffi::c_char;

use libfuzzer_sys::fuzz_target;
use rtaudio_c::{
    rtaudio_stream_options_t, rtaudio_stream_parameters_t, translate_request, MAX_NAME_LENGTH,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }
    let word = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

    let mut options = rtaudio_stream_options_t {
        flags: word(0),
        num_buffers: word(4),
        priority: word(8) as i32,
        name: [0; MAX_NAME_LENGTH],
    };
    for (slot, byte) in options.name.iter_mut().zip(&data[24..]) {
        *slot = *byte as c_char;
    }
    let params = rtaudio_stream_parameters_t {
        device_id: word(12),
        num_channels: word(16),
        first_channel: word(20),
    };

    let request = translate_request(Some(&params), None, word(0) as _, word(4), Some(&options));
    let options = request.options.expect("options were supplied");
    if let Some(name) = options.name {
        assert!(!name.is_empty());
    }
    assert!(request.input.is_none());
});
