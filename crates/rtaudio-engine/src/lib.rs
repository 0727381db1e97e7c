//! rtaudio engine
//! ==============
//! Native realtime audio engines behind one [`NativeEngine`] contract. The
//! set of backend APIs is fixed at build time through cargo features; see
//! [`compiled_apis`].

pub mod backend;
#[cfg(feature = "cpal")]
pub mod cpal_engine;
#[cfg(feature = "dummy")]
pub mod dummy;
pub mod error;
pub mod shared;
pub mod thread;
pub mod types;

pub use backend::{
    CallbackRegistration, ErrorCallback, NativeCallback, NativeEngine, CALLBACK_ABORT,
    CALLBACK_CONTINUE, CALLBACK_STOP,
};
#[cfg(feature = "cpal")]
pub use cpal_engine::CpalEngine;
#[cfg(feature = "dummy")]
pub use dummy::{DummyDevice, DummyEngine};
pub use error::{EngineError, EngineErrorKind, Result};
pub use types::{
    Api, DeviceInfo, SampleFormat, StreamFlags, StreamOptions, StreamParameters, StreamRequest,
    StreamStatus,
};

/// Backends compiled into this build, in auto-selection order.
static COMPILED_APIS: &[Api] = &[
    #[cfg(all(feature = "jack", any(target_os = "linux", target_os = "macos")))]
    Api::UnixJack,
    #[cfg(all(feature = "cpal", target_os = "linux"))]
    Api::LinuxAlsa,
    #[cfg(all(feature = "asio", target_os = "windows"))]
    Api::WindowsAsio,
    #[cfg(all(feature = "cpal", target_os = "windows"))]
    Api::WindowsWasapi,
    #[cfg(all(feature = "cpal", target_os = "macos"))]
    Api::MacosxCore,
    #[cfg(feature = "dummy")]
    Api::Dummy,
];

pub fn compiled_apis() -> &'static [Api] {
    COMPILED_APIS
}

pub fn is_compiled(api: Api) -> bool {
    COMPILED_APIS.contains(&api)
}

/// Resolves an API name to a compiled backend.
pub fn compiled_api_by_name(name: &str) -> Option<Api> {
    Api::from_name(name).filter(|api| is_compiled(*api))
}

/// Builds the engine for `api`. [`Api::Unspecified`] auto-selects.
pub fn make(api: Api) -> Result<Box<dyn NativeEngine>> {
    if api == Api::Unspecified {
        return auto_select();
    }
    if !is_compiled(api) {
        return Err(EngineError::invalid_parameter(format!(
            "no compiled support for the {} API",
            api.display_name()
        )));
    }
    construct(api)
}

fn construct(api: Api) -> Result<Box<dyn NativeEngine>> {
    match api {
        #[cfg(feature = "dummy")]
        Api::Dummy => Ok(Box::new(DummyEngine::new())),
        #[cfg(feature = "cpal")]
        Api::LinuxAlsa | Api::UnixJack | Api::MacosxCore | Api::WindowsWasapi | Api::WindowsAsio => {
            Ok(Box::new(CpalEngine::new(api)?))
        }
        other => Err(EngineError::invalid_parameter(format!(
            "no compiled support for the {} API",
            other.display_name()
        ))),
    }
}

/// Picks the first compiled API that reports at least one device, falling
/// back to the first one that can be constructed at all.
pub fn auto_select() -> Result<Box<dyn NativeEngine>> {
    let mut fallback = None;
    let mut last_error = None;
    for api in compiled_apis() {
        match construct(*api) {
            Ok(mut engine) => {
                if engine.device_count() > 0 {
                    tracing::debug!(api = api.name(), "auto-selected audio API");
                    return Ok(engine);
                }
                if fallback.is_none() {
                    fallback = Some(engine);
                }
            }
            Err(err) => {
                tracing::debug!(api = api.name(), "skipping audio API: {err}");
                last_error = Some(err);
            }
        }
    }
    fallback.ok_or_else(|| {
        last_error.unwrap_or_else(|| {
            EngineError::new(
                EngineErrorKind::NoDevicesFound,
                "no audio APIs were compiled into this build",
            )
        })
    })
}
