//! Value types exchanged with a native engine: backend identifiers, sample
//! formats, stream flags, device descriptors and stream parameters.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Platform audio backends. Discriminants match the native C header.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Api {
    Unspecified = 0,
    LinuxAlsa = 1,
    LinuxPulse = 2,
    LinuxOss = 3,
    UnixJack = 4,
    MacosxCore = 5,
    WindowsWasapi = 6,
    WindowsAsio = 7,
    WindowsDs = 8,
    Dummy = 9,
}

impl Api {
    pub const ALL: [Api; 10] = [
        Api::Unspecified,
        Api::LinuxAlsa,
        Api::LinuxPulse,
        Api::LinuxOss,
        Api::UnixJack,
        Api::MacosxCore,
        Api::WindowsWasapi,
        Api::WindowsAsio,
        Api::WindowsDs,
        Api::Dummy,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|api| *api as i32 == raw)
    }

    /// Short identifier, stable across releases.
    pub fn name(self) -> &'static str {
        match self {
            Api::Unspecified => "unspecified",
            Api::LinuxAlsa => "alsa",
            Api::LinuxPulse => "pulse",
            Api::LinuxOss => "oss",
            Api::UnixJack => "jack",
            Api::MacosxCore => "core",
            Api::WindowsWasapi => "wasapi",
            Api::WindowsAsio => "asio",
            Api::WindowsDs => "ds",
            Api::Dummy => "dummy",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Api::Unspecified => "Unknown",
            Api::LinuxAlsa => "ALSA",
            Api::LinuxPulse => "Pulse",
            Api::LinuxOss => "OpenSoundSystem",
            Api::UnixJack => "Jack",
            Api::MacosxCore => "CoreAudio",
            Api::WindowsWasapi => "WASAPI",
            Api::WindowsAsio => "ASIO",
            Api::WindowsDs => "DirectSound",
            Api::Dummy => "Dummy",
        }
    }

    /// Looks up an API by its short identifier (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|api| api.name().eq_ignore_ascii_case(name))
    }
}

macro_rules! bitmask {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($repr:ty) {
            $($(#[$flag_meta:meta])* const $flag:ident = $value:expr;)+
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            $($(#[$flag_meta])* pub const $flag: Self = Self($value);)+

            const KNOWN: $repr = 0 $(| $value)+;

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn all() -> Self {
                Self(Self::KNOWN)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Keeps only the bits this type knows about.
            pub const fn from_bits_truncate(bits: $repr) -> Self {
                Self(bits & Self::KNOWN)
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

bitmask! {
    /// Sample encodings. A stream uses exactly one; device descriptors report
    /// the union of natively supported encodings.
    pub struct SampleFormat(u64) {
        const SINT8 = 0x1;
        const SINT16 = 0x2;
        /// Packed 3-byte samples.
        const SINT24 = 0x4;
        const SINT32 = 0x8;
        const FLOAT32 = 0x10;
        const FLOAT64 = 0x20;
    }
}

impl SampleFormat {
    /// Bytes per sample for a single-format value; `None` for masks.
    pub fn bytes_per_sample(self) -> Option<usize> {
        match self {
            Self::SINT8 => Some(1),
            Self::SINT16 => Some(2),
            Self::SINT24 => Some(3),
            Self::SINT32 | Self::FLOAT32 => Some(4),
            Self::FLOAT64 => Some(8),
            _ => None,
        }
    }

    pub fn is_single(self) -> bool {
        self.bytes_per_sample().is_some()
    }
}

bitmask! {
    pub struct StreamFlags(u32) {
        const NONINTERLEAVED = 0x1;
        const MINIMIZE_LATENCY = 0x2;
        const HOG_DEVICE = 0x4;
        const SCHEDULE_REALTIME = 0x8;
        const ALSA_USE_DEFAULT = 0x10;
        const JACK_DONT_CONNECT = 0x20;
    }
}

bitmask! {
    /// Conditions reported to the realtime callback.
    pub struct StreamStatus(u32) {
        const INPUT_OVERFLOW = 0x1;
        const OUTPUT_UNDERFLOW = 0x2;
    }
}

/// Snapshot of a device's capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub probed: bool,
    pub name: String,
    pub output_channels: u32,
    pub input_channels: u32,
    pub duplex_channels: u32,
    pub is_default_output: bool,
    pub is_default_input: bool,
    pub sample_rates: Vec<u32>,
    pub preferred_sample_rate: u32,
    pub native_formats: SampleFormat,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, output_channels: u32, input_channels: u32) -> Self {
        Self {
            probed: true,
            name: name.into(),
            output_channels,
            input_channels,
            duplex_channels: output_channels.min(input_channels),
            is_default_output: false,
            is_default_input: false,
            sample_rates: Vec::new(),
            preferred_sample_rate: 0,
            native_formats: SampleFormat::empty(),
        }
    }

    pub fn with_sample_rates(mut self, rates: impl Into<Vec<u32>>, preferred: u32) -> Self {
        self.sample_rates = rates.into();
        self.preferred_sample_rate = preferred;
        self
    }

    pub fn with_formats(mut self, formats: SampleFormat) -> Self {
        self.native_formats = formats;
        self
    }

    pub fn with_defaults(mut self, output: bool, input: bool) -> Self {
        self.is_default_output = output;
        self.is_default_input = input;
        self
    }
}

/// One direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamParameters {
    pub device_id: u32,
    pub channels: u32,
    pub first_channel: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    pub flags: StreamFlags,
    pub num_buffers: u32,
    pub priority: i32,
    /// `None` leaves the engine's default name in place.
    pub name: Option<String>,
}

/// Everything an engine needs to open a stream except the buffer size and
/// the callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub output: Option<StreamParameters>,
    pub input: Option<StreamParameters>,
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub options: Option<StreamOptions>,
}

impl StreamRequest {
    pub fn flags(&self) -> StreamFlags {
        self.options
            .as_ref()
            .map(|options| options.flags)
            .unwrap_or_default()
    }
}
