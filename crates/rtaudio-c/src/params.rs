//! Flat stream parameter and option structs into the engine's request form.

use core::ffi::{c_char, c_uint};

use rtaudio_engine::{SampleFormat, StreamFlags, StreamOptions, StreamParameters, StreamRequest};

use crate::abi::{
    rtaudio_format_t, rtaudio_stream_options_t, rtaudio_stream_parameters_t, MAX_NAME_LENGTH,
};

pub fn translate_parameters(params: &rtaudio_stream_parameters_t) -> StreamParameters {
    StreamParameters {
        device_id: params.device_id,
        channels: params.num_channels,
        first_channel: params.first_channel,
    }
}

/// Reads the name buffer up to its first NUL (or the full capacity when
/// unterminated). An empty name maps to `None`.
pub fn options_name(name: &[c_char; MAX_NAME_LENGTH]) -> Option<String> {
    let len = name.iter().position(|c| *c == 0).unwrap_or(name.len());
    if len == 0 {
        return None;
    }
    let bytes: Vec<u8> = name[..len].iter().map(|c| *c as u8).collect();
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn translate_options(options: &rtaudio_stream_options_t) -> StreamOptions {
    StreamOptions {
        flags: StreamFlags::from_bits_truncate(options.flags),
        num_buffers: options.num_buffers,
        priority: options.priority,
        name: options_name(&options.name),
    }
}

/// Builds the engine request. `None` on either side means that direction is
/// not requested.
pub fn translate_request(
    output: Option<&rtaudio_stream_parameters_t>,
    input: Option<&rtaudio_stream_parameters_t>,
    format: rtaudio_format_t,
    sample_rate: c_uint,
    options: Option<&rtaudio_stream_options_t>,
) -> StreamRequest {
    StreamRequest {
        output: output.map(translate_parameters),
        input: input.map(translate_parameters),
        // Unknown bits are kept so the engine can reject them.
        format: SampleFormat::from_bits_truncate(format as u64)
            | unknown_format_bits(format as u64),
        sample_rate,
        options: options.map(translate_options),
    }
}

fn unknown_format_bits(raw: u64) -> SampleFormat {
    if raw & !SampleFormat::all().bits() != 0 {
        // Any second bit turns the value into a mask, which fails validation.
        SampleFormat::all()
    } else {
        SampleFormat::empty()
    }
}
