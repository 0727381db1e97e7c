//! Native device descriptors flattened into `rtaudio_device_info_t`.

use core::ffi::{c_int, c_uint};

use rtaudio_engine::DeviceInfo;

use crate::abi::{rtaudio_device_info_t, rtaudio_format_t, MAX_NAME_LENGTH, NUM_SAMPLE_RATES};
use crate::error::copy_to_c_buffer;

impl rtaudio_device_info_t {
    /// The descriptor handed out when probing fails: everything zero,
    /// `probed` false.
    pub const fn unprobed() -> Self {
        Self {
            probed: 0,
            output_channels: 0,
            input_channels: 0,
            duplex_channels: 0,
            is_default_output: 0,
            is_default_input: 0,
            native_formats: 0,
            preferred_sample_rate: 0,
            sample_rates: [0; NUM_SAMPLE_RATES],
            name: [0; MAX_NAME_LENGTH],
        }
    }
}

impl Default for rtaudio_device_info_t {
    fn default() -> Self {
        Self::unprobed()
    }
}

/// Copies a native descriptor into the flat form. Rates past the fixed
/// capacity are dropped and long names are truncated.
pub fn translate_device_info(info: &DeviceInfo) -> rtaudio_device_info_t {
    let mut flat = rtaudio_device_info_t::unprobed();
    if !info.probed {
        return flat;
    }

    flat.probed = 1;
    flat.output_channels = info.output_channels as c_uint;
    flat.input_channels = info.input_channels as c_uint;
    flat.duplex_channels = info.duplex_channels as c_uint;
    flat.is_default_output = c_int::from(info.is_default_output);
    flat.is_default_input = c_int::from(info.is_default_input);
    flat.native_formats = info.native_formats.bits() as rtaudio_format_t;
    flat.preferred_sample_rate = info.preferred_sample_rate as c_uint;
    for (slot, rate) in flat.sample_rates.iter_mut().zip(&info.sample_rates) {
        *slot = c_int::try_from(*rate).unwrap_or(c_int::MAX);
    }
    copy_to_c_buffer(&info.name, &mut flat.name);
    flat
}
