use std::fmt;

use thiserror::Error;

/// Classification of native engine failures. Discriminants match the
/// native C header so they can be handed to C error callbacks unchanged.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    Warning = 0,
    DebugWarning = 1,
    Unspecified = 2,
    NoDevicesFound = 3,
    InvalidDevice = 4,
    MemoryError = 5,
    InvalidParameter = 6,
    InvalidUse = 7,
    DriverError = 8,
    SystemError = 9,
    ThreadError = 10,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineErrorKind::Warning => "warning",
            EngineErrorKind::DebugWarning => "debug warning",
            EngineErrorKind::Unspecified => "unspecified error",
            EngineErrorKind::NoDevicesFound => "no devices found",
            EngineErrorKind::InvalidDevice => "invalid device",
            EngineErrorKind::MemoryError => "memory error",
            EngineErrorKind::InvalidParameter => "invalid parameter",
            EngineErrorKind::InvalidUse => "invalid use",
            EngineErrorKind::DriverError => "driver error",
            EngineErrorKind::SystemError => "system error",
            EngineErrorKind::ThreadError => "thread error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_use(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidUse, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidParameter, message)
    }

    pub fn invalid_device(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidDevice, message)
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::DriverError, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::SystemError, message)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
