//! Renderer Configuration and Persisted Settings
//!
//! [`RendererOptions`] carries everything a renderer session needs beyond
//! the stream description: the timestamp policy, the delivery queue bound,
//! the millisecond frame offset (trading presentation lead-time against
//! jitter), the presentation timeline rate, and the forced format
//! overrides.
//!
//! [`Settings`] is the persisted surface the control layer reads and
//! writes between runs, stored as TOML.
//!
//! # Examples
//!
//! ```rust
//! use viewlink_pipeline::config::RendererOptions;
//! use viewlink_pipeline::timestamp::TimestampPolicy;
//!
//! let options = RendererOptions::builder()
//!     .policy(TimestampPolicy::ClockSmart)
//!     .queue_max_size(8)
//!     .frame_offset_ms(40)
//!     .build();
//! assert!(options.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use viewlink_capture::config::CaptureSelection;

use crate::error::{PipelineError, Result};
use crate::sink::FormatOverrides;
use crate::timestamp::TimestampPolicy;

/// Widest accepted frame offset magnitude, in milliseconds.
pub const MAX_FRAME_OFFSET_MS: i64 = 10_000;

/// DirectShow-style 100ns presentation units; the default timeline rate.
pub const DEFAULT_TIMELINE_RATE: u64 = 10_000_000;

/// Per-session renderer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererOptions {
    /// How outbound presentation times are derived (default: clock-smart).
    pub policy: TimestampPolicy,

    /// Delivery queue bound in frames (default: 4).
    ///
    /// Larger values ride out sink hiccups at the cost of latency.
    pub queue_max_size: usize,

    /// Signed offset applied to every outbound timestamp, in milliseconds
    /// (default: 0).
    pub frame_offset_ms: i64,

    /// Presentation timeline ticks per second (default: 10 MHz).
    pub timeline_rate: u64,

    /// Forced output color description overrides (default: none).
    pub overrides: FormatOverrides,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            policy: TimestampPolicy::ClockSmart,
            queue_max_size: crate::queue::DEFAULT_MAX_SIZE,
            frame_offset_ms: 0,
            timeline_rate: DEFAULT_TIMELINE_RATE,
            overrides: FormatOverrides::default(),
        }
    }
}

impl RendererOptions {
    /// Create a new options builder.
    #[must_use]
    pub fn builder() -> RendererOptionsBuilder {
        RendererOptionsBuilder::default()
    }

    /// Fail fast on configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.queue_max_size < 1 {
            return Err(PipelineError::InvalidQueueSize(self.queue_max_size));
        }
        if self.frame_offset_ms.abs() > MAX_FRAME_OFFSET_MS {
            return Err(PipelineError::InvalidFrameOffset(
                self.frame_offset_ms,
                MAX_FRAME_OFFSET_MS,
            ));
        }
        if self.timeline_rate == 0 {
            return Err(PipelineError::InvalidTimelineRate(self.timeline_rate));
        }
        Ok(())
    }
}

/// Builder for [`RendererOptions`].
#[derive(Debug, Clone, Default)]
pub struct RendererOptionsBuilder {
    policy: Option<TimestampPolicy>,
    queue_max_size: Option<usize>,
    frame_offset_ms: Option<i64>,
    timeline_rate: Option<u64>,
    overrides: Option<FormatOverrides>,
}

impl RendererOptionsBuilder {
    /// Set the timestamp policy.
    #[must_use]
    pub fn policy(mut self, policy: TimestampPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the delivery queue bound.
    #[must_use]
    pub fn queue_max_size(mut self, size: usize) -> Self {
        self.queue_max_size = Some(size);
        self
    }

    /// Set the outbound frame offset in milliseconds.
    #[must_use]
    pub fn frame_offset_ms(mut self, offset: i64) -> Self {
        self.frame_offset_ms = Some(offset);
        self
    }

    /// Set the presentation timeline rate.
    #[must_use]
    pub fn timeline_rate(mut self, rate: u64) -> Self {
        self.timeline_rate = Some(rate);
        self
    }

    /// Set the forced format overrides.
    #[must_use]
    pub fn overrides(mut self, overrides: FormatOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Build the options.
    #[must_use]
    pub fn build(self) -> RendererOptions {
        let defaults = RendererOptions::default();
        RendererOptions {
            policy: self.policy.unwrap_or(defaults.policy),
            queue_max_size: self.queue_max_size.unwrap_or(defaults.queue_max_size),
            frame_offset_ms: self.frame_offset_ms.unwrap_or(defaults.frame_offset_ms),
            timeline_rate: self.timeline_rate.unwrap_or(defaults.timeline_rate),
            overrides: self.overrides.unwrap_or(defaults.overrides),
        }
    }
}

/// The whole persisted configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Selected capture device and input.
    #[serde(default)]
    pub capture: CaptureSelection,

    /// Renderer session options.
    #[serde(default)]
    pub renderer: RendererOptions,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Write settings to a TOML file.
    pub fn to_toml_file(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NominalRange;
    use viewlink_capture::format::ColorSpace;

    #[test]
    fn test_defaults_validate() {
        let options = RendererOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.policy, TimestampPolicy::ClockSmart);
        assert_eq!(options.timeline_rate, DEFAULT_TIMELINE_RATE);
    }

    #[test]
    fn test_builder() {
        let options = RendererOptions::builder()
            .policy(TimestampPolicy::TheoreticalOnly)
            .queue_max_size(16)
            .frame_offset_ms(-50)
            .build();
        assert_eq!(options.policy, TimestampPolicy::TheoreticalOnly);
        assert_eq!(options.queue_max_size, 16);
        assert_eq!(options.frame_offset_ms, -50);
    }

    #[test]
    fn test_validation_fails_fast() {
        let options = RendererOptions::builder().queue_max_size(0).build();
        assert!(matches!(
            options.validate(),
            Err(PipelineError::InvalidQueueSize(0))
        ));

        let options = RendererOptions::builder()
            .frame_offset_ms(MAX_FRAME_OFFSET_MS + 1)
            .build();
        assert!(matches!(
            options.validate(),
            Err(PipelineError::InvalidFrameOffset(_, _))
        ));

        let options = RendererOptions::builder().timeline_rate(0).build();
        assert!(matches!(
            options.validate(),
            Err(PipelineError::InvalidTimelineRate(0))
        ));
    }

    #[test]
    fn test_settings_toml_round_trip() {
        let mut settings = Settings::default();
        settings.capture.device_id = "card-1".to_string();
        settings.capture.input_id = 2;
        settings.renderer.queue_max_size = 6;
        settings.renderer.overrides.primaries = Some(ColorSpace::Rec2020);
        settings.renderer.overrides.range = Some(NominalRange::Full);

        let dir = std::env::temp_dir().join("viewlink-config-test");
        std::fs::create_dir_all(&dir).expect("tmp dir");
        let path = dir.join("settings.toml");

        settings.to_toml_file(&path).expect("write");
        let loaded = Settings::from_toml_file(&path).expect("read");
        assert_eq!(loaded, settings);

        std::fs::remove_file(&path).ok();
    }
}
