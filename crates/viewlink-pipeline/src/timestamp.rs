//! Timestamp Policy Engine
//!
//! Maps a frame's hardware-clock reading (plus, for some policies, the
//! next queued frame's reading) onto a `(start, stop)` pair in the
//! presentation timeline's own tick unit.
//!
//! The first frame of a session latches the zero offset: its clock reading
//! becomes timeline zero, and every later start is relative to it. The
//! resulting timeline is deliberately not wall-clock accurate; sinks
//! built for file playback refuse to start cleanly at a non-zero origin.
//!
//! Policies:
//!
//! - [`ClockTheoretical`](TimestampPolicy::ClockTheoretical): clock start,
//!   nominal-duration stop.
//! - [`ClockClock`](TimestampPolicy::ClockClock): clock start, stop from
//!   the next queued frame's start. Requires the queue's one-frame
//!   look-ahead; a missing look-ahead is a contract violation, never
//!   silently substituted.
//! - [`ClockSmart`](TimestampPolicy::ClockSmart): clock+clock when a
//!   look-ahead exists, clock+theoretical for the frame that has none.
//!   The fallback makes the first frame's stop nominal, which produces a
//!   brief discontinuity at stream start; whether sinks tolerate this
//!   gracefully is an open calibration question.
//! - [`TheoreticalOnly`](TimestampPolicy::TheoreticalOnly): pure frame
//!   index arithmetic, never touches the hardware clock.
//! - Start-only variants emit no stop; the sink treats every frame as
//!   due-immediately.

use viewlink_capture::clock::ClockTicks;

use crate::error::{PipelineError, Result};

/// How outbound presentation times are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimestampPolicy {
    /// Clock-relative start, stop after the nominal frame duration.
    ClockTheoretical,
    /// Clock-relative start, stop at the next queued frame's start.
    ClockClock,
    /// Clock+clock when look-ahead exists, clock+theoretical otherwise.
    ClockSmart,
    /// Start from the frame index alone; the clock is never read.
    TheoreticalOnly,
    /// Clock-relative start, no stop.
    ClockStartOnly,
    /// Index-derived start, no stop.
    TheoreticalStartOnly,
}

impl TimestampPolicy {
    /// Whether the queue must withhold the last frame so this policy
    /// always has a look-ahead to read.
    #[must_use]
    pub fn needs_lookahead(self) -> bool {
        matches!(self, TimestampPolicy::ClockClock)
    }

    /// Whether this policy reads the hardware clock at all.
    #[must_use]
    pub fn uses_clock(self) -> bool {
        !matches!(
            self,
            TimestampPolicy::TheoreticalOnly | TimestampPolicy::TheoreticalStartOnly
        )
    }
}

/// Presentation times for one frame, in timeline ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimestamps {
    /// When the frame becomes due.
    pub start: i64,
    /// When the frame expires; `None` under start-only policies.
    pub stop: Option<i64>,
}

/// Per-session timestamp assignment.
///
/// One engine is constructed per renderer session; `reset` re-arms the
/// first-frame latch when a session restarts.
#[derive(Debug)]
pub struct TimestampEngine {
    policy: TimestampPolicy,
    /// Hardware clock ticks per second.
    clock_rate: u64,
    /// Presentation timeline ticks per second.
    timeline_rate: u64,
    /// Nominal frame duration in timeline ticks.
    frame_duration: i64,
    /// Configured lead/lag applied to every start and stop, timeline ticks.
    offset: i64,
    first_frame: Option<ClockTicks>,
    frame_index: u64,
}

impl TimestampEngine {
    /// Engine for one session.
    ///
    /// `frame_duration` is the nominal per-frame duration in timeline
    /// ticks; `offset_ms` shifts every emitted time, trading presentation
    /// lead-time against jitter.
    pub fn new(
        policy: TimestampPolicy,
        clock_rate: u64,
        timeline_rate: u64,
        frame_duration: i64,
        offset_ms: i64,
    ) -> Result<Self> {
        if timeline_rate == 0 {
            return Err(PipelineError::InvalidTimelineRate(timeline_rate));
        }
        if policy.uses_clock() && clock_rate == 0 {
            return Err(PipelineError::InvalidTimelineRate(clock_rate));
        }
        let offset = ms_to_ticks(offset_ms, timeline_rate);
        Ok(Self {
            policy,
            clock_rate,
            timeline_rate,
            frame_duration,
            offset,
            first_frame: None,
            frame_index: 0,
        })
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> TimestampPolicy {
        self.policy
    }

    /// Frames stamped so far this session.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Re-arm the first-frame latch and index for a new session.
    pub fn reset(&mut self) {
        self.first_frame = None;
        self.frame_index = 0;
    }

    /// Compute the `(start, stop)` pair for a frame captured at
    /// `frame_ts`, given the next queued frame's reading when present.
    pub fn timestamps(
        &mut self,
        frame_ts: ClockTicks,
        lookahead: Option<ClockTicks>,
    ) -> Result<FrameTimestamps> {
        let index = self.frame_index;
        self.frame_index += 1;

        // The very first frame establishes the zero offset, exactly once
        // per session, even for policies that ignore the clock
        let first = *self.first_frame.get_or_insert(frame_ts);

        let clock_start = self.to_timeline(frame_ts.since(first)) + self.offset;
        let theoretical_start =
            i64::try_from(index).unwrap_or(i64::MAX) * self.frame_duration + self.offset;

        let stamped = match self.policy {
            TimestampPolicy::ClockTheoretical => FrameTimestamps {
                start: clock_start,
                stop: Some(clock_start + self.frame_duration),
            },
            TimestampPolicy::ClockClock => {
                let next = lookahead.ok_or(PipelineError::MissingLookahead)?;
                FrameTimestamps {
                    start: clock_start,
                    stop: Some(self.to_timeline(next.since(first)) + self.offset),
                }
            }
            TimestampPolicy::ClockSmart => match lookahead {
                Some(next) => FrameTimestamps {
                    start: clock_start,
                    stop: Some(self.to_timeline(next.since(first)) + self.offset),
                },
                None => FrameTimestamps {
                    start: clock_start,
                    stop: Some(clock_start + self.frame_duration),
                },
            },
            TimestampPolicy::TheoreticalOnly => FrameTimestamps {
                start: theoretical_start,
                stop: Some(theoretical_start + self.frame_duration),
            },
            TimestampPolicy::ClockStartOnly => FrameTimestamps {
                start: clock_start,
                stop: None,
            },
            TimestampPolicy::TheoreticalStartOnly => FrameTimestamps {
                start: theoretical_start,
                stop: None,
            },
        };

        Ok(stamped)
    }

    /// Convert elapsed hardware ticks to timeline ticks with widening
    /// arithmetic; rates up to the full u64 range cannot overflow.
    fn to_timeline(&self, elapsed: u64) -> i64 {
        let wide = i128::from(elapsed) * i128::from(self.timeline_rate)
            / i128::from(self.clock_rate.max(1));
        i64::try_from(wide).unwrap_or(i64::MAX)
    }
}

fn ms_to_ticks(ms: i64, timeline_rate: u64) -> i64 {
    let wide = i128::from(ms) * i128::from(timeline_rate) / 1000;
    i64::try_from(wide).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// DirectShow-style 100ns presentation units.
    const TIMELINE: u64 = 10_000_000;
    /// 50 fps in timeline ticks.
    const DURATION: i64 = 200_000;

    fn engine(policy: TimestampPolicy) -> TimestampEngine {
        TimestampEngine::new(policy, TIMELINE, TIMELINE, DURATION, 0).expect("engine")
    }

    #[test]
    fn test_theoretical_determinism() {
        let mut engine = engine(TimestampPolicy::TheoreticalOnly);
        for n in 0..5 {
            let ts = engine
                .timestamps(ClockTicks(999_999 + n), None)
                .expect("theoretical never fails");
            let n = i64::try_from(n).expect("small");
            assert_eq!(ts.start, n * DURATION);
            assert_eq!(ts.stop, Some((n + 1) * DURATION));
        }
    }

    #[test]
    fn test_first_frame_establishes_zero() {
        let mut engine = engine(TimestampPolicy::ClockTheoretical);

        // Hardware clock starts at an arbitrary large value
        let ts = engine
            .timestamps(ClockTicks(5_000_000_000), None)
            .expect("stamp");
        assert_eq!(ts.start, 0);
        assert_eq!(ts.stop, Some(DURATION));

        let ts = engine
            .timestamps(ClockTicks(5_000_000_000 + 200_000), None)
            .expect("stamp");
        assert_eq!(ts.start, 200_000);
    }

    #[test]
    fn test_clock_clock_requires_lookahead() {
        let mut engine = engine(TimestampPolicy::ClockClock);
        assert!(matches!(
            engine.timestamps(ClockTicks(1000), None),
            Err(PipelineError::MissingLookahead)
        ));

        let ts = engine
            .timestamps(ClockTicks(1000), Some(ClockTicks(1000 + 190_000)))
            .expect("stamp");
        assert_eq!(ts.start, 0);
        // Stop tracks the real next-frame start, not the nominal duration
        assert_eq!(ts.stop, Some(190_000));
    }

    #[test]
    fn test_clock_smart_fallback() {
        let mut engine = engine(TimestampPolicy::ClockSmart);

        // No look-ahead: theoretical stop for this one frame
        let ts = engine.timestamps(ClockTicks(777), None).expect("stamp");
        assert_eq!(ts.stop, Some(ts.start + DURATION));

        // Look-ahead present: clock-derived stop
        let ts = engine
            .timestamps(ClockTicks(777 + 200_000), Some(ClockTicks(777 + 410_000)))
            .expect("stamp");
        assert_eq!(ts.start, 200_000);
        assert_eq!(ts.stop, Some(410_000));
    }

    #[test]
    fn test_start_only_policies() {
        let mut engine_clock = engine(TimestampPolicy::ClockStartOnly);
        let ts = engine_clock.timestamps(ClockTicks(50), None).expect("stamp");
        assert_eq!(ts.stop, None);

        let mut engine_theo = engine(TimestampPolicy::TheoreticalStartOnly);
        let a = engine_theo.timestamps(ClockTicks(123), None).expect("stamp");
        let b = engine_theo.timestamps(ClockTicks(456), None).expect("stamp");
        assert_eq!(a.start, 0);
        assert_eq!(b.start, DURATION);
        assert_eq!(b.stop, None);
    }

    #[test]
    fn test_offset_applied() {
        let mut engine =
            TimestampEngine::new(TimestampPolicy::ClockTheoretical, TIMELINE, TIMELINE, DURATION, 50)
                .expect("engine");
        let ts = engine.timestamps(ClockTicks(0), None).expect("stamp");
        // 50 ms at 10MHz = 500_000 ticks of lead
        assert_eq!(ts.start, 500_000);
        assert_eq!(ts.stop, Some(700_000));

        let mut engine =
            TimestampEngine::new(TimestampPolicy::TheoreticalOnly, TIMELINE, TIMELINE, DURATION, -10)
                .expect("engine");
        let ts = engine.timestamps(ClockTicks(0), None).expect("stamp");
        assert_eq!(ts.start, -100_000);
    }

    #[test]
    fn test_clock_to_timeline_rate_conversion() {
        // 27MHz hardware clock against a 10MHz timeline
        let mut engine =
            TimestampEngine::new(TimestampPolicy::ClockTheoretical, 27_000_000, TIMELINE, DURATION, 0)
                .expect("engine");
        engine.timestamps(ClockTicks(0), None).expect("first");
        let ts = engine
            .timestamps(ClockTicks(540_000), None)
            .expect("stamp");
        // 540_000 ticks at 27MHz = 20ms = 200_000 timeline ticks
        assert_eq!(ts.start, 200_000);
    }

    #[test]
    fn test_reset_rearms_latch() {
        let mut engine = engine(TimestampPolicy::ClockTheoretical);
        engine.timestamps(ClockTicks(1_000_000), None).expect("first");
        engine.timestamps(ClockTicks(1_200_000), None).expect("second");
        assert_eq!(engine.frame_index(), 2);

        engine.reset();
        assert_eq!(engine.frame_index(), 0);
        let ts = engine.timestamps(ClockTicks(9_999_999), None).expect("stamp");
        assert_eq!(ts.start, 0);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(TimestampEngine::new(TimestampPolicy::ClockTheoretical, 0, TIMELINE, DURATION, 0)
            .is_err());
        assert!(TimestampEngine::new(TimestampPolicy::TheoreticalOnly, 0, 0, DURATION, 0).is_err());
        // Theoretical policies tolerate a zero clock rate
        assert!(TimestampEngine::new(TimestampPolicy::TheoreticalOnly, 0, TIMELINE, DURATION, 0)
            .is_ok());
    }
}
