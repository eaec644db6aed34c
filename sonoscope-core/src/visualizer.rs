//! The visualizer: one loaded recording, its render cache, the viewport,
//! playback and the annotation brush.
//!
//! Nothing here touches a clock or a canvas. Paint output goes to a
//! [`PaintSink`], wall-clock time is passed in by the caller, and the
//! render queue only advances when the host calls [`Visualizer::step`].

use crate::brush::Brush;
use crate::colour_map::{ColourMap, SpectrumRange};
use crate::config::{Invalidation, Settings};
use crate::error::Result;
use crate::events::{EventBus, SubscriptionId, VisualizerEvent};
use crate::planner::{ChunkPlan, WantedWindow};
use crate::playback::{
    AutoScroll, IndicatorFrame, PlaybackPhase, PlaybackStart, PlaybackState, PlaybackSynchronizer,
};
use crate::render_state::{DisplayParams, RenderStatus, RenderStateTracker};
use crate::scheduler::{PaintSink, RenderContext, RenderScheduler, RequestSummary, StepOutcome};
use crate::spectrum::{SpectrumEngine, WindowShape};
use crate::timescale::TimeScale;
use crate::types::{SampleBuffer, Segment, SegmentId};

/// Per-recording state, replaced wholesale on load and on re-plan.
struct Session {
    samples: SampleBuffer,
    plan: ChunkPlan,
    tracker: RenderStateTracker,
}

pub struct Visualizer {
    settings: Settings,
    engine: SpectrumEngine,
    /// Running spectrum bounds shared by every tile of the recording.
    range: SpectrumRange,
    scheduler: RenderScheduler,
    session: Option<Session>,
    viewport_px: f64,
    scroll_px: f64,
    playback: PlaybackSynchronizer,
    brush: Brush,
    segments: Vec<Segment>,
    hovered: Option<SegmentId>,
    next_draft: u64,
    events: EventBus,
}

impl Visualizer {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_settings(settings))
    }

    fn with_settings(settings: Settings) -> Self {
        Self {
            engine: SpectrumEngine::new(WindowShape::Hann, settings.scale),
            settings,
            range: SpectrumRange::default(),
            scheduler: RenderScheduler::new(),
            session: None,
            viewport_px: 0.0,
            scroll_px: 0.0,
            playback: PlaybackSynchronizer::new(),
            brush: Brush::default(),
            segments: Vec::new(),
            hovered: None,
            next_draft: 0,
            events: EventBus::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn samples(&self) -> Option<&SampleBuffer> {
        self.session.as_ref().map(|s| &s.samples)
    }

    pub fn plan(&self) -> Option<&ChunkPlan> {
        self.session.as_ref().map(|s| &s.plan)
    }

    pub fn chunk_count(&self) -> usize {
        self.plan().map_or(0, |p| p.chunk_count())
    }

    pub fn render_status(&self, chunk: usize) -> Option<&RenderStatus> {
        self.session.as_ref().and_then(|s| s.tracker.status(chunk))
    }

    pub fn spectrum_bounds(&self) -> Option<(f32, f32)> {
        self.range.bounds()
    }

    pub fn display_params(&self) -> DisplayParams {
        DisplayParams {
            contrast: self.settings.contrast,
            colour_map: self.settings.colour_map,
        }
    }

    pub fn time_scale(&self) -> Option<TimeScale> {
        self.session
            .as_ref()
            .map(|s| TimeScale::new(s.plan.hop(), s.samples.sample_rate))
    }

    pub fn duration_ms(&self) -> f64 {
        self.samples().map_or(0.0, |s| s.duration_ms())
    }

    /// Total drawable width in pixels.
    pub fn width_px(&self) -> f64 {
        self.plan().map_or(0.0, |p| p.width_px() as f64)
    }

    pub fn scroll_px(&self) -> f64 {
        self.scroll_px
    }

    pub fn viewport_px(&self) -> f64 {
        self.viewport_px
    }

    pub fn wanted_window(&self) -> Option<WantedWindow> {
        self.plan().map(|p| p.wanted_window(self.scroll_px, self.viewport_px))
    }

    /// Replace the loaded recording.
    ///
    /// The new recording is planned before anything is torn down, so a
    /// recording too short to frame leaves the previous one in place.
    pub fn load(&mut self, samples: SampleBuffer, sink: &mut dyn PaintSink) -> Result<RequestSummary> {
        let plan = ChunkPlan::new(
            samples.len(),
            self.settings.nfft,
            self.settings.noverlap(),
            self.settings.spect_width,
        )?;
        log::info!(
            "loaded {} samples at {} Hz: {} frames in {} chunks",
            samples.len(),
            samples.sample_rate,
            plan.frame_count(),
            plan.chunk_count()
        );

        if self.playback.phase() != PlaybackPhase::Idle {
            self.playback.stop();
            self.emit_phase();
        }
        self.scheduler.reset();
        sink.clear_all();
        self.range.reset();
        self.brush.cancel();
        self.segments.clear();
        self.hovered = None;
        self.scroll_px = 0.0;

        self.session = Some(Session {
            tracker: RenderStateTracker::new(plan.chunk_count()),
            samples,
            plan,
        });
        self.sync_playback();
        Ok(self.request(sink))
    }

    pub fn set_viewport(&mut self, width_px: f64, sink: &mut dyn PaintSink) -> RequestSummary {
        self.viewport_px = width_px.max(0.0);
        self.scroll_px = self.clamp_scroll(self.scroll_px);
        self.sync_playback();
        self.request(sink)
    }

    /// Move the viewport and bring rendering in line with it.
    pub fn set_scroll(&mut self, px: f64, sink: &mut dyn PaintSink) -> RequestSummary {
        self.scroll_px = self.clamp_scroll(px);
        self.playback.set_scroll(self.scroll_px);
        self.request(sink)
    }

    fn clamp_scroll(&self, px: f64) -> f64 {
        let max = (self.width_px() - self.viewport_px).max(0.0);
        if px.is_finite() {
            px.clamp(0.0, max)
        } else {
            0.0
        }
    }

    /// Apply new settings, doing only as much work as the change requires.
    pub fn update_settings(&mut self, next: Settings, sink: &mut dyn PaintSink) -> Result<Invalidation> {
        next.validate()?;
        let invalidation = self.settings.invalidation(&next);

        match invalidation {
            Invalidation::None => {
                self.settings = next;
                self.sync_playback();
            }
            Invalidation::Redisplay => {
                let height_changed = self.settings.spect_height != next.spect_height;
                self.settings = next;
                if let Some(session) = self.session.as_mut() {
                    self.scheduler.cancel(&mut session.tracker);
                    if height_changed {
                        session.tracker.invalidate_displays();
                    }
                }
                self.sync_playback();
                self.request(sink);
            }
            Invalidation::Replan => self.replan(next, sink)?,
        }
        log::debug!("settings applied: {invalidation:?}");
        Ok(invalidation)
    }

    fn replan(&mut self, next: Settings, sink: &mut dyn PaintSink) -> Result<()> {
        let Some(session) = self.session.take() else {
            self.engine.set_scale(next.scale);
            self.settings = next;
            return Ok(());
        };

        let plan = match ChunkPlan::new(session.samples.len(), next.nfft, next.noverlap(), next.spect_width) {
            Ok(plan) => plan,
            Err(e) => {
                self.session = Some(session);
                return Err(e);
            }
        };

        // keep the same instant at the left edge
        let old_scale = TimeScale::new(session.plan.hop(), session.samples.sample_rate);
        let scroll_ms = old_scale.px_to_ms(self.scroll_px);
        let new_scale = TimeScale::new(plan.hop(), session.samples.sample_rate);

        if next.scale != self.settings.scale {
            self.engine.set_scale(next.scale);
            self.range.reset();
        }
        self.settings = next;
        self.scheduler.reset();
        sink.clear_all();

        self.session = Some(Session {
            tracker: RenderStateTracker::new(plan.chunk_count()),
            samples: session.samples,
            plan,
        });
        self.scroll_px = self.clamp_scroll(new_scale.ms_to_px(scroll_ms));
        self.sync_playback();
        self.request(sink);
        Ok(())
    }

    pub fn set_contrast(&mut self, contrast: i32, sink: &mut dyn PaintSink) -> Result<Invalidation> {
        let next = Settings { contrast, ..self.settings.clone() };
        self.update_settings(next, sink)
    }

    pub fn set_colour_map(&mut self, colour_map: ColourMap, sink: &mut dyn PaintSink) -> Result<Invalidation> {
        let next = Settings { colour_map, ..self.settings.clone() };
        self.update_settings(next, sink)
    }

    pub fn set_zoom(&mut self, zoom: u32, sink: &mut dyn PaintSink) -> Result<Invalidation> {
        let next = Settings { zoom, ..self.settings.clone() };
        self.update_settings(next, sink)
    }

    fn request(&mut self, sink: &mut dyn PaintSink) -> RequestSummary {
        let display = self.display_params();
        let height = self.settings.spect_height;
        let Some(session) = self.session.as_mut() else {
            return RequestSummary::default();
        };
        let window = session.plan.wanted_window(self.scroll_px, self.viewport_px);
        let mut ctx = render_context(session, &mut self.engine, &mut self.range, display, height);
        self.scheduler.request(window, &mut ctx, sink)
    }

    /// Run one render step. Hosts call this between yields to their event loop.
    pub fn step(&mut self, sink: &mut dyn PaintSink) -> StepOutcome {
        let display = self.display_params();
        let height = self.settings.spect_height;
        let Some(session) = self.session.as_mut() else {
            return StepOutcome::Idle;
        };
        let mut ctx = render_context(session, &mut self.engine, &mut self.range, display, height);
        self.scheduler.run_next(&mut ctx, sink)
    }

    /// Run every queued step. Returns the number of steps taken.
    pub fn run_pending(&mut self, sink: &mut dyn PaintSink) -> usize {
        let mut steps = 0;
        while self.step(sink) != StepOutcome::Idle {
            steps += 1;
        }
        steps
    }

    pub fn has_pending_work(&self) -> bool {
        !self.scheduler.is_idle()
    }

    // Playback

    fn sync_playback(&mut self) {
        self.playback.set_time_scale(self.time_scale());
        self.playback.set_scroll(self.scroll_px);
        self.playback.set_auto_scroll(self.settings.auto_scroll.then_some(AutoScroll {
            viewport_px: self.viewport_px,
            lead_margin_px: self.settings.lead_margin_px,
        }));
    }

    fn emit_phase(&mut self) {
        let phase = self.playback.phase();
        self.events.emit(&VisualizerEvent::PlaybackChanged { phase });
    }

    pub fn playback_phase(&self) -> PlaybackPhase {
        self.playback.phase()
    }

    pub fn indicator_visible(&self) -> bool {
        self.playback.indicator_visible()
    }

    /// Interval and speed of the current run, while playing or paused.
    pub fn playback_state(&self) -> Option<&PlaybackState> {
        self.playback.state()
    }

    pub fn playback_position_ms(&self, now_ms: f64) -> Option<f64> {
        self.playback.position_ms(now_ms)
    }

    pub fn play(
        &mut self,
        begin_ms: f64,
        end_ms: f64,
        speed_percent: f64,
        now_ms: f64,
        sink: &mut dyn PaintSink,
    ) -> Result<PlaybackStart> {
        self.sync_playback();
        let end_ms = end_ms.min(self.duration_ms());
        let started = self.playback.start(begin_ms, end_ms, speed_percent, now_ms)?;
        if let Some(px) = started.scroll_px {
            self.set_scroll(px, sink);
        }
        self.emit_phase();
        Ok(started)
    }

    pub fn pause(&mut self, now_ms: f64) -> Option<f64> {
        let played = self.playback.pause(now_ms)?;
        self.emit_phase();
        Some(played)
    }

    pub fn resume(&mut self, now_ms: f64, from_ms: Option<f64>, sink: &mut dyn PaintSink) -> Result<PlaybackStart> {
        self.sync_playback();
        let started = self.playback.resume(now_ms, from_ms)?;
        if let Some(px) = started.scroll_px {
            self.set_scroll(px, sink);
        }
        self.emit_phase();
        Ok(started)
    }

    /// Stop playback and return the viewport to where it was before.
    pub fn stop(&mut self, sink: &mut dyn PaintSink) {
        if self.playback.phase() == PlaybackPhase::Idle {
            return;
        }
        if let Some(px) = self.playback.stop() {
            self.set_scroll(px, sink);
        }
        self.emit_phase();
    }

    /// The audio engine finished on its own; the viewport stays put.
    pub fn playback_ended(&mut self) {
        if self.playback.phase() == PlaybackPhase::Idle {
            return;
        }
        self.playback.stop();
        self.playback.set_scroll(self.scroll_px);
        self.emit_phase();
    }

    pub fn playback_failed(&mut self, reason: &str) {
        self.playback.fail(reason);
        self.playback.set_scroll(self.scroll_px);
        self.emit_phase();
    }

    /// Advance the indicator, scrolling the viewport when it runs ahead.
    pub fn tick(&mut self, now_ms: f64, sink: &mut dyn PaintSink) -> Option<IndicatorFrame> {
        let frame = self.playback.tick(now_ms)?;
        if let Some(px) = frame.scroll_px {
            self.set_scroll(px, sink);
        }
        if frame.finished {
            self.emit_phase();
        }
        Some(frame)
    }

    // Annotation

    pub fn subscribe(&mut self, handler: impl FnMut(&VisualizerEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Replace the overlay with the segments the annotation grid holds.
    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        if self.hovered.is_some_and(|h| !segments.iter().any(|s| s.id == h)) {
            self.hovered = None;
        }
        self.segments = segments;
    }

    /// Segments overlapping the visible part of the timeline.
    pub fn segments_in_view(&self) -> Vec<&Segment> {
        let Some(scale) = self.time_scale() else {
            return Vec::new();
        };
        let start = scale.px_to_ms(self.scroll_px);
        let end = scale.px_to_ms(self.scroll_px + self.viewport_px);
        self.segments.iter().filter(|s| s.overlaps(start, end)).collect()
    }

    pub fn brush_begin(&mut self, px: f64) {
        self.brush.begin(px);
    }

    pub fn brush_drag(&mut self, px: f64) {
        self.brush.drag(px);
    }

    pub fn brush_extent(&self) -> Option<(f64, f64)> {
        self.brush.extent()
    }

    /// Finish the drag. `target` names a segment being resized; without
    /// one a new draft segment is created.
    pub fn brush_end(&mut self, target: Option<SegmentId>) -> Option<VisualizerEvent> {
        let (start, end) = self.brush.finish()?;
        self.complete_brush(start, end, target)
    }

    /// Turn a pixel selection into a segment and announce it.
    pub fn complete_brush(&mut self, px_start: f64, px_end: f64, target: Option<SegmentId>) -> Option<VisualizerEvent> {
        let scale = self.time_scale()?;
        let duration = self.duration_ms();
        let (lo, hi) = if px_start <= px_end { (px_start, px_end) } else { (px_end, px_start) };
        let start_ms = scale.px_to_ms(lo).clamp(0.0, duration);
        let end_ms = scale.px_to_ms(hi).clamp(0.0, duration);
        if end_ms <= start_ms {
            return None;
        }

        let existing = target.and_then(|id| self.segments.iter_mut().find(|s| s.id == id));
        let event = match existing {
            Some(segment) => {
                segment.start_ms = start_ms;
                segment.end_ms = end_ms;
                VisualizerEvent::SegmentAdjusted { id: segment.id, start_ms, end_ms }
            }
            None => {
                let id = target.unwrap_or_else(|| {
                    self.next_draft += 1;
                    SegmentId::Draft(self.next_draft)
                });
                self.segments.push(Segment { id, start_ms, end_ms });
                VisualizerEvent::SegmentCreated { id, start_ms, end_ms }
            }
        };
        self.events.emit(&event);
        Some(event)
    }

    /// Pointer moved to content pixel `px`, or left the canvas on `None`.
    pub fn hover(&mut self, px: Option<f64>) {
        let under = match (px, self.time_scale()) {
            (Some(px), Some(scale)) => {
                let ms = scale.px_to_ms(px);
                self.segments.iter().find(|s| s.contains(ms)).map(|s| s.id)
            }
            _ => None,
        };
        if under == self.hovered {
            return;
        }
        if let Some(id) = self.hovered.take() {
            self.events.emit(&VisualizerEvent::SegmentMouseLeave { id });
        }
        if let Some(id) = under {
            self.events.emit(&VisualizerEvent::SegmentMouseOver { id });
        }
        self.hovered = under;
    }

    pub fn hovered(&self) -> Option<SegmentId> {
        self.hovered
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::with_settings(Settings::default())
    }
}

fn render_context<'a>(
    session: &'a mut Session,
    engine: &'a mut SpectrumEngine,
    range: &'a mut SpectrumRange,
    display: DisplayParams,
    oscillogram_height: u32,
) -> RenderContext<'a> {
    RenderContext {
        samples: &session.samples,
        plan: &session.plan,
        engine,
        tracker: &mut session.tracker,
        range,
        display,
        oscillogram_height,
    }
}
