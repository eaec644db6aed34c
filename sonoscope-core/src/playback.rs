//! Keeps the playback indicator in step with audio playback.
//!
//! The host owns the audio engine and the clock. It reports transport
//! commands with a wall-clock timestamp in milliseconds and polls
//! [`PlaybackSynchronizer::tick`] once per animation frame; the
//! synchroniser answers with where the indicator belongs and, with
//! auto-scroll on, where the viewport should move.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrogramError};
use crate::timescale::TimeScale;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    pub started_at_wall_clock: f64,
    pub playback_speed_percent: f64,
    /// Recording time covered so far; updated on pause.
    pub played_duration_ms: f64,
    pub begin_ms: f64,
    pub end_ms: f64,
}

impl PlaybackState {
    /// Wall-clock time the indicator takes from `begin_ms` to `end_ms`.
    pub fn transit_ms(&self) -> f64 {
        (self.end_ms - self.begin_ms) * 100.0 / self.playback_speed_percent
    }

    fn recording_elapsed_ms(&self, now_ms: f64) -> f64 {
        let wall = (now_ms - self.started_at_wall_clock).max(0.0);
        (wall * self.playback_speed_percent / 100.0).min(self.end_ms - self.begin_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoScroll {
    pub viewport_px: f64,
    /// Distance from the right edge at which the viewport jumps ahead.
    pub lead_margin_px: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackStart {
    pub transit_ms: f64,
    /// Scroll position that centres the start of playback.
    pub scroll_px: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndicatorFrame {
    pub position_ms: f64,
    pub position_px: Option<f64>,
    pub scroll_px: Option<f64>,
    /// Playback reached `end_ms`; the synchroniser is idle again.
    pub finished: bool,
}

#[derive(Default)]
pub struct PlaybackSynchronizer {
    phase: PlaybackPhase,
    state: Option<PlaybackState>,
    scale: Option<TimeScale>,
    auto_scroll: Option<AutoScroll>,
    scroll_px: f64,
    scroll_before_play: Option<f64>,
}

impl PlaybackSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&PlaybackState> {
        self.state.as_ref()
    }

    pub fn indicator_visible(&self) -> bool {
        self.phase != PlaybackPhase::Idle
    }

    pub fn set_time_scale(&mut self, scale: Option<TimeScale>) {
        self.scale = scale;
    }

    pub fn set_auto_scroll(&mut self, auto_scroll: Option<AutoScroll>) {
        self.auto_scroll = auto_scroll;
    }

    /// Keep track of scrolling done outside playback.
    pub fn set_scroll(&mut self, scroll_px: f64) {
        self.scroll_px = scroll_px;
    }

    pub fn start(&mut self, begin_ms: f64, end_ms: f64, speed_percent: f64, now_ms: f64) -> Result<PlaybackStart> {
        if !speed_percent.is_finite() || speed_percent <= 0.0 {
            return Err(SpectrogramError::Playback(format!("speed {speed_percent}% must be positive")));
        }
        if !begin_ms.is_finite() || !end_ms.is_finite() || begin_ms < 0.0 || end_ms <= begin_ms {
            return Err(SpectrogramError::Playback(format!(
                "cannot play from {begin_ms} ms to {end_ms} ms"
            )));
        }

        let state = PlaybackState {
            started_at_wall_clock: now_ms,
            playback_speed_percent: speed_percent,
            played_duration_ms: 0.0,
            begin_ms,
            end_ms,
        };
        self.state = Some(state);
        self.phase = PlaybackPhase::Playing;
        if self.scroll_before_play.is_none() {
            self.scroll_before_play = Some(self.scroll_px);
        }

        let scroll_px = match (self.auto_scroll, self.scale) {
            (Some(auto), Some(scale)) => {
                let target = (scale.ms_to_px(begin_ms) - auto.viewport_px / 2.0).max(0.0);
                self.scroll_px = target;
                Some(target)
            }
            _ => None,
        };

        log::debug!(
            "playback {begin_ms:.0}..{end_ms:.0} ms at {speed_percent}%: transit {:.0} ms",
            state.transit_ms()
        );
        Ok(PlaybackStart { transit_ms: state.transit_ms(), scroll_px })
    }

    /// Returns how much of the recording had played, in ms.
    pub fn pause(&mut self, now_ms: f64) -> Option<f64> {
        if self.phase != PlaybackPhase::Playing {
            return None;
        }
        let state = self.state.as_mut()?;
        state.played_duration_ms = state.recording_elapsed_ms(now_ms);
        self.phase = PlaybackPhase::Paused;
        Some(state.played_duration_ms)
    }

    /// Restart from `from_ms`, or from where playback paused.
    pub fn resume(&mut self, now_ms: f64, from_ms: Option<f64>) -> Result<PlaybackStart> {
        let state = match (self.phase, self.state) {
            (PlaybackPhase::Paused, Some(state)) => state,
            _ => return Err(SpectrogramError::Playback("nothing paused to resume".into())),
        };
        let from = from_ms.unwrap_or(state.begin_ms + state.played_duration_ms);
        self.start(from, state.end_ms, state.playback_speed_percent, now_ms)
    }

    /// Hide the indicator and go idle. Returns the scroll position from
    /// before playback began, for the host to restore.
    pub fn stop(&mut self) -> Option<f64> {
        self.phase = PlaybackPhase::Idle;
        self.state = None;
        let restore = self.scroll_before_play.take();
        if let Some(px) = restore {
            self.scroll_px = px;
        }
        restore
    }

    /// The audio engine gave up; never leave the indicator running.
    pub fn fail(&mut self, reason: &str) -> Option<f64> {
        log::error!("playback failed: {reason}");
        self.stop()
    }

    /// Indicator position at `now_ms`, if an indicator is showing.
    pub fn position_ms(&self, now_ms: f64) -> Option<f64> {
        let state = self.state.as_ref()?;
        match self.phase {
            PlaybackPhase::Playing => Some(state.begin_ms + state.recording_elapsed_ms(now_ms)),
            PlaybackPhase::Paused => Some(state.begin_ms + state.played_duration_ms),
            PlaybackPhase::Idle => None,
        }
    }

    /// Advance the indicator. Linear from `begin_ms` to `end_ms` over the
    /// transit time; reaching the end puts the synchroniser back to idle.
    pub fn tick(&mut self, now_ms: f64) -> Option<IndicatorFrame> {
        if self.phase != PlaybackPhase::Playing {
            return None;
        }
        let state = self.state?;
        let position_ms = state.begin_ms + state.recording_elapsed_ms(now_ms);
        let finished = position_ms >= state.end_ms;

        let position_px = self.scale.map(|s| s.ms_to_px(position_ms));
        let mut scroll_px = None;
        if let (Some(px), Some(auto)) = (position_px, self.auto_scroll) {
            let right_limit = self.scroll_px + auto.viewport_px - auto.lead_margin_px;
            if px > right_limit || px < self.scroll_px {
                let target = (px - auto.lead_margin_px).max(0.0);
                self.scroll_px = target;
                scroll_px = Some(target);
            }
        }

        if finished {
            self.phase = PlaybackPhase::Idle;
            self.state = None;
            self.scroll_before_play = None;
        }

        Some(IndicatorFrame { position_ms, position_px, scroll_px, finished })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transit_and_pause() {
        let mut sync = PlaybackSynchronizer::new();
        let started = sync.start(1000.0, 3000.0, 200.0, 5_000.0).unwrap();
        assert_eq!(started.transit_ms, 1000.0);
        assert_eq!(sync.phase(), PlaybackPhase::Playing);

        let played = sync.pause(5_400.0).unwrap();
        assert!((played - 800.0).abs() < 1e-9);
        assert_eq!(sync.phase(), PlaybackPhase::Paused);
        assert_eq!(sync.position_ms(9_999.0), Some(1800.0));
        assert!(sync.indicator_visible());
    }

    #[test]
    fn test_resume_from_paused_position() {
        let mut sync = PlaybackSynchronizer::new();
        sync.start(0.0, 1000.0, 100.0, 0.0).unwrap();
        sync.pause(250.0);

        let resumed = sync.resume(1_000.0, None).unwrap();
        assert_eq!(resumed.transit_ms, 750.0);
        assert_eq!(sync.state().unwrap().begin_ms, 250.0);
        assert_eq!(sync.position_ms(1_100.0), Some(350.0));

        sync.pause(1_200.0);
        sync.resume(2_000.0, Some(900.0)).unwrap();
        assert_eq!(sync.state().unwrap().begin_ms, 900.0);
    }

    #[test]
    fn test_resume_requires_pause() {
        let mut sync = PlaybackSynchronizer::new();
        assert!(sync.resume(0.0, None).is_err());
        sync.start(0.0, 100.0, 100.0, 0.0).unwrap();
        assert!(sync.resume(10.0, None).is_err());
    }

    #[test]
    fn test_invalid_requests() {
        let mut sync = PlaybackSynchronizer::new();
        assert!(sync.start(0.0, 100.0, 0.0, 0.0).is_err());
        assert!(sync.start(100.0, 100.0, 100.0, 0.0).is_err());
        assert!(sync.start(-5.0, 100.0, 100.0, 0.0).is_err());
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_tick_interpolates_and_finishes() {
        let mut sync = PlaybackSynchronizer::new();
        sync.start(1000.0, 2000.0, 50.0, 0.0).unwrap();

        let mid = sync.tick(1_000.0).unwrap();
        assert_eq!(mid.position_ms, 1500.0);
        assert!(!mid.finished);

        let end = sync.tick(2_500.0).unwrap();
        assert_eq!(end.position_ms, 2000.0);
        assert!(end.finished);
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
        assert!(!sync.indicator_visible());
        assert!(sync.tick(2_600.0).is_none());
    }

    #[test]
    fn test_auto_scroll_centres_then_leads() {
        let mut sync = PlaybackSynchronizer::new();
        // 16 ms per pixel
        sync.set_time_scale(Some(TimeScale::new(256, 16_000)));
        sync.set_auto_scroll(Some(AutoScroll { viewport_px: 400.0, lead_margin_px: 50.0 }));
        sync.set_scroll(0.0);

        // 8000 ms is pixel 500
        let started = sync.start(8_000.0, 20_000.0, 100.0, 0.0).unwrap();
        assert_eq!(started.scroll_px, Some(300.0));

        // 500..650 stays inside [300, 650]
        assert_eq!(sync.tick(2_400.0).unwrap().scroll_px, None);

        // pixel 700 is past the lead margin
        let frame = sync.tick(3_200.0).unwrap();
        assert_eq!(frame.position_px, Some(700.0));
        assert_eq!(frame.scroll_px, Some(650.0));
    }

    #[test]
    fn test_stop_restores_scroll() {
        let mut sync = PlaybackSynchronizer::new();
        sync.set_time_scale(Some(TimeScale::new(256, 16_000)));
        sync.set_auto_scroll(Some(AutoScroll { viewport_px: 400.0, lead_margin_px: 50.0 }));
        sync.set_scroll(120.0);

        sync.start(8_000.0, 20_000.0, 100.0, 0.0).unwrap();
        sync.pause(100.0);
        sync.resume(200.0, None).unwrap();
        assert_eq!(sync.stop(), Some(120.0));
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
        assert!(sync.position_ms(300.0).is_none());
    }

    #[test]
    fn test_failure_forces_idle() {
        let mut sync = PlaybackSynchronizer::new();
        sync.start(0.0, 1000.0, 100.0, 0.0).unwrap();
        sync.fail("decoder error");
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
        assert!(!sync.indicator_visible());
        assert!(sync.tick(10.0).is_none());
    }
}
