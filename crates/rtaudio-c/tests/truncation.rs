use core::ffi::{c_char, CStr};

use proptest::prelude::*;
use rtaudio_c::{
    copy_to_c_buffer, translate_device_info, truncate_message, ErrorState, MAX_NAME_LENGTH,
    NUM_SAMPLE_RATES,
};
use rtaudio_c::error::MAX_ERROR_MESSAGE_LENGTH;
use rtaudio_engine::DeviceInfo;

proptest! {
    #[test]
    fn device_names_never_overflow(name in "\\PC{0,1200}", rates in prop::collection::vec(1u32..400_000, 0..40)) {
        let info = DeviceInfo::new(name.clone(), 2, 2).with_sample_rates(rates.clone(), 48_000);
        let flat = translate_device_info(&info);

        let stored = unsafe { CStr::from_ptr(flat.name.as_ptr()) };
        let stored = stored.to_str().expect("truncation keeps valid UTF-8");
        prop_assert!(stored.len() < MAX_NAME_LENGTH);
        prop_assert!(name.starts_with(stored));

        let kept = rates.len().min(NUM_SAMPLE_RATES);
        for (slot, rate) in flat.sample_rates.iter().zip(&rates).take(kept) {
            prop_assert_eq!(*slot as u32, *rate);
        }
        prop_assert!(flat.sample_rates[kept..].iter().all(|rate| *rate == 0));
    }

    #[test]
    fn error_messages_are_bounded_prefixes(message in "\\PC{0,2000}") {
        let mut state = ErrorState::default();
        state.set(&message);
        let stored = state.message().expect("error recorded").to_str().expect("utf-8");
        prop_assert!(stored.len() < MAX_ERROR_MESSAGE_LENGTH);
        prop_assert!(message.starts_with(stored));
        // Only the capacity limit may cut a message short.
        if message.len() < MAX_ERROR_MESSAGE_LENGTH {
            prop_assert_eq!(stored, message.as_str());
        }
    }

    #[test]
    fn small_buffers_stay_terminated(message in ".{0,64}", capacity in 1usize..32) {
        let mut buffer = vec![1 as c_char; capacity];
        let written = copy_to_c_buffer(&message, &mut buffer);
        prop_assert!(written < capacity);
        prop_assert_eq!(buffer[written], 0);
        prop_assert_eq!(truncate_message(&message, capacity - 1).len(), written);
    }
}
