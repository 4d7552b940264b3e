//! Error types for capture-side operations
//!
//! Provides typed errors that library users can match and handle specifically.

use thiserror::Error;

use crate::device::DeviceState;

/// Errors that can occur while driving a capture device.
///
/// All capture operations return `Result<T, CaptureError>`. Errors raised
/// on the driver's callback thread are reported through
/// [`CaptureObserver::on_error`](crate::device::CaptureObserver::on_error)
/// instead of unwinding across the callback boundary.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The requested capture device does not exist or is in use.
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The requested input id is not one the device exposes.
    #[error("Unknown capture input: {0}")]
    UnknownInput(u32),

    /// A start/stop request arrived while the device was in a state that
    /// cannot honor it.
    #[error("Device cannot {operation} while {state:?}")]
    WrongState {
        /// The operation that was requested.
        operation: &'static str,
        /// The state the device was in.
        state: DeviceState,
    },

    /// The driver reported a hardware fault.
    ///
    /// These are not retried here; recovery policy belongs to the control
    /// layer.
    #[error("Capture hardware fault: {0}")]
    Hardware(String),

    /// The driver delivered a frame with no usable storage behind it.
    #[error("Frame arrived without backing storage")]
    MissingBuffer,
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

impl CaptureError {
    /// Create a device-unavailable error.
    #[allow(dead_code)]
    pub(crate) fn unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    /// Create a hardware fault error.
    #[allow(dead_code)]
    pub(crate) fn hardware(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }
}
