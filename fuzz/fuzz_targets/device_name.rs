#![no_main]

use core::ffi::CStr;

use libfuzzer_sys::fuzz_target;
use rtaudio_c::{translate_device_info, ErrorState, MAX_NAME_LENGTH};
use rtaudio_engine::DeviceInfo;

fuzz_target!(|data: &[u8]| {
    let name = String::from_utf8_lossy(data);
    let rates: Vec<u32> = data
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let info = DeviceInfo::new(name.to_string(), 2, 2).with_sample_rates(rates, 48_000);
    let flat = translate_device_info(&info);
    let stored = unsafe { CStr::from_ptr(flat.name.as_ptr()) };
    assert!(stored.to_bytes().len() < MAX_NAME_LENGTH);
    assert!(stored.to_str().is_ok());

    let mut state = ErrorState::default();
    state.set(&name);
    let message = state.message().expect("message recorded");
    assert!(name.as_bytes().starts_with(message.to_bytes()));
});
