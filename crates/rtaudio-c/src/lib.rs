//! rtaudio C facade
//! ================
//! A flat, C-callable layer over [`rtaudio_engine`]. Every exported symbol
//! takes an opaque `rtaudio_t` handle, contains panics, and reports failures
//! through a per-handle error slot read with `rtaudio_error`.
//!
//! The realtime callback registered with `rtaudio_open_stream` runs on a
//! thread owned by the engine; everything else is expected to be called from
//! a single controlling thread.

pub mod abi;
pub mod callback;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
pub mod guard;
pub mod instance;
pub mod params;
pub mod stream;

pub use abi::*;
pub use callback::{proxy_cb, CallbackSlot};
pub use config::ShimConfig;
pub use device::translate_device_info;
pub use error::{copy_to_c_buffer, truncate_message, ErrorState, ShimError};
pub use ffi::*;
pub use instance::Instance;
pub use params::{translate_options, translate_request};
pub use stream::{StreamController, StreamState};
