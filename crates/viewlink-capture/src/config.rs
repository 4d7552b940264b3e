//! Capture Selection Configuration
//!
//! Which device and which physical input to capture from, persisted by the
//! control layer across sessions.
//!
//! # Examples
//!
//! ```rust
//! use viewlink_capture::config::CaptureSelection;
//!
//! let selection = CaptureSelection::builder()
//!     .device_id("decklink-0")
//!     .input_id(2)
//!     .build();
//! assert_eq!(selection.input_id, 2);
//! ```

use serde::{Deserialize, Serialize};

/// Persisted capture device and input selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSelection {
    /// Stable identifier of the capture device (default: empty, meaning
    /// first available).
    pub device_id: String,

    /// Input id on that device (default: 0, meaning driver default).
    pub input_id: u32,
}

impl Default for CaptureSelection {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            input_id: 0,
        }
    }
}

impl CaptureSelection {
    /// Create a new selection builder.
    #[must_use]
    pub fn builder() -> CaptureSelectionBuilder {
        CaptureSelectionBuilder::default()
    }
}

/// Builder for [`CaptureSelection`].
#[derive(Debug, Clone, Default)]
pub struct CaptureSelectionBuilder {
    device_id: Option<String>,
    input_id: Option<u32>,
}

impl CaptureSelectionBuilder {
    /// Set the device identifier.
    #[must_use]
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Set the input id.
    #[must_use]
    pub fn input_id(mut self, id: u32) -> Self {
        self.input_id = Some(id);
        self
    }

    /// Build the selection.
    #[must_use]
    pub fn build(self) -> CaptureSelection {
        let defaults = CaptureSelection::default();
        CaptureSelection {
            device_id: self.device_id.unwrap_or(defaults.device_id),
            input_id: self.input_id.unwrap_or(defaults.input_id),
        }
    }
}
