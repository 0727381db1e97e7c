//! The object behind the opaque C handle.

use core::ffi::{c_int, c_uint, c_void};

use rtaudio_engine::{compiled_apis, is_compiled, make, Api, NativeEngine};

use crate::abi::{
    rtaudio_cb_t, rtaudio_device_info_t, rtaudio_error_cb_t, rtaudio_format_t,
    rtaudio_stream_options_t, rtaudio_stream_parameters_t,
};
use crate::callback::{error_forwarder, CallbackSlot};
use crate::config::{init_logging, ShimConfig};
use crate::device::translate_device_info;
use crate::error::{ErrorState, ShimError};
use crate::params::translate_request;
use crate::stream::StreamController;

/// One engine plus the error slot the C side reads.
///
/// Fallible operations clear the error slot on entry and record into it on
/// failure, returning a sentinel. Pure queries leave it alone.
pub struct Instance {
    controller: Option<StreamController>,
    construction_error: Option<String>,
    error: ErrorState,
}

impl Instance {
    /// Builds an instance, failing if no engine can be constructed.
    pub fn new(api: Api) -> Result<Self, ShimError> {
        let config = ShimConfig::from_env();
        init_logging(&config);
        let engine = build_engine(api, &config)?;
        Ok(Self::from_controller(StreamController::new(
            engine,
            config.show_warnings,
        )))
    }

    /// Like [`Instance::new`], but a construction failure still yields an
    /// instance whose error slot carries the reason.
    pub fn create(api: Api) -> Self {
        match Self::new(api) {
            Ok(instance) => instance,
            Err(err) => Self::failed(err),
        }
    }

    /// Wraps an already constructed engine.
    pub fn with_engine(engine: Box<dyn NativeEngine>) -> Self {
        let config = ShimConfig::from_env();
        Self::from_controller(StreamController::new(engine, config.show_warnings))
    }

    /// An instance without an engine; every engine operation reports `err`.
    pub fn failed(err: ShimError) -> Self {
        tracing::warn!(target: "rtaudio::instance", "engine construction failed: {err}");
        let mut error = ErrorState::default();
        error.record(&err);
        Self {
            controller: None,
            construction_error: Some(err.to_string()),
            error,
        }
    }

    fn from_controller(controller: StreamController) -> Self {
        tracing::debug!(
            target: "rtaudio::instance",
            api = controller.current_api().name(),
            "instance created"
        );
        Self {
            controller: Some(controller),
            construction_error: None,
            error: ErrorState::default(),
        }
    }

    pub fn into_raw(self) -> *mut Instance {
        Box::into_raw(Box::new(self))
    }

    /// # Safety
    /// `raw` must come from [`Instance::into_raw`] and not be used again.
    pub unsafe fn from_raw(raw: *mut Instance) -> Box<Instance> {
        Box::from_raw(raw)
    }

    pub fn error(&self) -> &ErrorState {
        &self.error
    }

    pub fn error_mut(&mut self) -> &mut ErrorState {
        &mut self.error
    }

    pub fn has_engine(&self) -> bool {
        self.controller.is_some()
    }

    fn missing_engine(construction_error: &Option<String>) -> ShimError {
        ShimError::Construction(
            construction_error
                .clone()
                .unwrap_or_else(|| "no audio engine is available".to_string()),
        )
    }

    fn fallible<T>(
        &mut self,
        fallback: T,
        op: impl FnOnce(&mut StreamController) -> Result<T, ShimError>,
    ) -> T {
        self.error.clear();
        let result = match self.controller.as_mut() {
            Some(controller) => op(controller),
            None => Err(Self::missing_engine(&self.construction_error)),
        };
        result.unwrap_or_else(|err| {
            self.error.record(&err);
            fallback
        })
    }

    fn query<T>(&mut self, fallback: T, op: impl FnOnce(&mut StreamController) -> T) -> T {
        match self.controller.as_mut() {
            Some(controller) => op(controller),
            None => {
                let err = Self::missing_engine(&self.construction_error);
                self.error.record(&err);
                fallback
            }
        }
    }

    pub fn current_api(&mut self) -> Api {
        self.query(Api::Unspecified, |ctl| ctl.current_api())
    }

    pub fn device_count(&mut self) -> c_int {
        self.query(0, |ctl| {
            c_int::try_from(ctl.device_count()).unwrap_or(c_int::MAX)
        })
    }

    /// Zeroed, unprobed descriptor on failure.
    pub fn device_info(&mut self, index: c_int) -> rtaudio_device_info_t {
        self.fallible(rtaudio_device_info_t::unprobed(), |ctl| {
            ctl.device_info(index).map(|info| translate_device_info(&info))
        })
    }

    pub fn default_output_device(&mut self) -> c_uint {
        self.query(0, |ctl| ctl.default_output_device())
    }

    pub fn default_input_device(&mut self) -> c_uint {
        self.query(0, |ctl| ctl.default_input_device())
    }

    /// Returns 0 on success and -1 on failure; `buffer_frames` receives the
    /// negotiated size only on success.
    #[allow(clippy::too_many_arguments)]
    pub fn open_stream(
        &mut self,
        output: Option<&rtaudio_stream_parameters_t>,
        input: Option<&rtaudio_stream_parameters_t>,
        format: rtaudio_format_t,
        sample_rate: c_uint,
        buffer_frames: &mut c_uint,
        callback: rtaudio_cb_t,
        user_data: *mut c_void,
        options: Option<&rtaudio_stream_options_t>,
        error_callback: rtaudio_error_cb_t,
    ) -> c_int {
        self.fallible(-1, |ctl| {
            if callback.is_none() {
                return Err(ShimError::StreamOpen("a stream callback is required".into()));
            }
            let request = translate_request(output, input, format, sample_rate, options);
            ctl.open_stream(
                &request,
                buffer_frames,
                CallbackSlot::new(callback, user_data),
                error_forwarder(error_callback),
            )?;
            Ok(0)
        })
    }

    pub fn close_stream(&mut self) {
        self.fallible((), |ctl| {
            ctl.close_stream();
            Ok(())
        })
    }

    pub fn start_stream(&mut self) -> c_int {
        self.fallible(-1, |ctl| ctl.start_stream().map(|()| 0))
    }

    pub fn stop_stream(&mut self) -> c_int {
        self.fallible(-1, |ctl| ctl.stop_stream().map(|()| 0))
    }

    pub fn abort_stream(&mut self) -> c_int {
        self.fallible(-1, |ctl| ctl.abort_stream().map(|()| 0))
    }

    pub fn is_stream_open(&mut self) -> bool {
        self.query(false, |ctl| ctl.is_stream_open())
    }

    pub fn is_stream_running(&mut self) -> bool {
        self.query(false, |ctl| ctl.is_stream_running())
    }

    pub fn stream_time(&mut self) -> f64 {
        self.fallible(0.0, |ctl| ctl.stream_time())
    }

    pub fn set_stream_time(&mut self, time: f64) {
        self.fallible((), |ctl| ctl.set_stream_time(time))
    }

    pub fn stream_latency(&mut self) -> c_int {
        self.fallible(-1, |ctl| {
            ctl.stream_latency()
                .map(|frames| c_int::try_from(frames).unwrap_or(c_int::MAX))
        })
    }

    pub fn stream_sample_rate(&mut self) -> c_uint {
        self.fallible(0, |ctl| ctl.stream_sample_rate())
    }

    pub fn show_warnings(&mut self, show: bool) {
        self.query((), |ctl| ctl.show_warnings(show))
    }
}

/// Resolves the configured override for unspecified requests, then asks
/// the engine factory.
fn build_engine(api: Api, config: &ShimConfig) -> Result<Box<dyn NativeEngine>, ShimError> {
    let api = match (api, config.api) {
        (Api::Unspecified, Some(preferred)) if is_compiled(preferred) => preferred,
        (Api::Unspecified, Some(preferred)) => {
            tracing::warn!(
                target: "rtaudio::instance",
                "{} is not compiled in (available: {:?}); auto-selecting",
                preferred.display_name(),
                compiled_apis().iter().map(|api| api.name()).collect::<Vec<_>>()
            );
            Api::Unspecified
        }
        (requested, _) => requested,
    };
    make(api).map_err(ShimError::construction)
}
