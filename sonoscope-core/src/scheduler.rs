//! Cancellable render queue for the chunks near the viewport.
//!
//! Work for one chunk runs as three steps: transform (FFT, skipped when a
//! spectrum is cached), rasterise, paint. The host drives the queue one
//! step at a time, yielding to its event loop in between, so a viewport
//! change can land between any two steps.
//!
//! Every job carries the generation it was queued under. Cancelling bumps
//! the generation and drains the queue; a step whose generation is stale
//! or whose chunk has been evicted is dropped without touching anything.

use std::collections::VecDeque;

use crate::colour_map::{rasterize, SpectrumRange};
use crate::error::Result;
use crate::oscillogram::oscillogram_path;
use crate::planner::{ChunkPlan, WantedWindow};
use crate::render_state::{DisplayParams, RenderState, RenderStateTracker};
use crate::spectrum::{transpose_flip_frequency_axis, SpectrumEngine};
use crate::types::{Chunk, Matrix, SampleBuffer, Tile};

/// Receives rendered output, keyed by each chunk's first frame index.
///
/// A tile the sink could not take is reported as an error; the chunk then
/// falls back to `Empty` and is retried on the next request.
pub trait PaintSink {
    fn paint_tile(&mut self, chunk_start_frame: usize, tile: &Tile) -> Result<()>;
    fn paint_oscillogram_segment(&mut self, chunk_start_frame: usize, path_data: &str);
    fn clear_tile(&mut self, chunk_start_frame: usize);
    fn clear_all(&mut self);
}

/// Everything one step needs, borrowed from the owning visualizer.
pub struct RenderContext<'a> {
    pub samples: &'a SampleBuffer,
    pub plan: &'a ChunkPlan,
    pub engine: &'a mut SpectrumEngine,
    pub tracker: &'a mut RenderStateTracker,
    pub range: &'a mut SpectrumRange,
    pub display: DisplayParams,
    pub oscillogram_height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Transform,
    Rasterize,
    Paint,
}

struct Job {
    generation: u64,
    chunk: usize,
    phase: Phase,
    /// Spectrum handed over by the tracker when the chunk was scheduled.
    spect: Option<Matrix>,
    tile: Option<Tile>,
    params: Option<DisplayParams>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    Computed { chunk: usize },
    Rasterized { chunk: usize },
    Painted { chunk: usize },
    Skipped { chunk: usize },
    Failed { chunk: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestSummary {
    pub evicted: Vec<usize>,
    pub cancelled: bool,
    pub queued: Vec<usize>,
}

#[derive(Default)]
pub struct RenderScheduler {
    generation: u64,
    queue: VecDeque<Job>,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, chunk: usize) -> bool {
        self.queue.iter().any(|j| j.chunk == chunk)
    }

    /// Bring rendering in line with `window`.
    ///
    /// Evicts chunks outside the window first, along with any queued steps
    /// for them. If any of them had work in flight the queue is cancelled
    /// before new work is added; otherwise
    /// new work goes on the tail of the running queue, nearest the window
    /// centre first.
    pub fn request(
        &mut self,
        window: WantedWindow,
        ctx: &mut RenderContext<'_>,
        sink: &mut dyn PaintSink,
    ) -> RequestSummary {
        let mut summary = RequestSummary::default();

        let mut in_flight_evicted = false;
        for chunk in ctx.tracker.chunks_to_evict(window) {
            let previous = ctx.tracker.evict(chunk);
            in_flight_evicted |= previous.is_in_flight();
            self.queue.retain(|j| j.chunk != chunk);
            if let Some(c) = ctx.plan.chunk(chunk) {
                sink.clear_tile(c.frame_start);
            }
            summary.evicted.push(chunk);
        }

        if in_flight_evicted {
            self.cancel(ctx.tracker);
            summary.cancelled = true;
        }

        let centre = window.centre();
        let mut needing = ctx.tracker.chunks_needing_work(window, ctx.display);
        needing.retain(|&c| !self.is_queued(c));
        needing.sort_by_key(|&c| (c.abs_diff(centre), c));

        for chunk in needing {
            if let Some(spect) = ctx.tracker.schedule(chunk) {
                self.queue.push_back(Job {
                    generation: self.generation,
                    chunk,
                    phase: Phase::Transform,
                    spect,
                    tile: None,
                    params: None,
                });
                summary.queued.push(chunk);
            }
        }

        log::debug!(
            "render request {}..={}: evicted {:?}, queued {:?}, cancelled {} (generation {})",
            window.first,
            window.last,
            summary.evicted,
            summary.queued,
            summary.cancelled,
            self.generation
        );
        summary
    }

    /// Abandon all queued work. Chunks that are still tracked settle back
    /// to `Computed` (keeping any spectrum already computed) or `Empty`.
    pub fn cancel(&mut self, tracker: &mut RenderStateTracker) {
        self.generation += 1;
        for job in self.queue.drain(..) {
            tracker.settle(job.chunk, job.spect);
        }
    }

    /// Drop queued work whose tracker is being thrown away.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.queue.clear();
    }

    /// Run one step of the job at the head of the queue.
    pub fn run_next(&mut self, ctx: &mut RenderContext<'_>, sink: &mut dyn PaintSink) -> StepOutcome {
        let Some(mut job) = self.queue.pop_front() else {
            return StepOutcome::Idle;
        };
        let chunk = job.chunk;

        if job.generation != self.generation || ctx.tracker.state(chunk) == RenderState::Empty {
            log::debug!("chunk {chunk}: dropped stale {:?} step", job.phase);
            return StepOutcome::Skipped { chunk };
        }
        let Some(&info) = ctx.plan.chunk(chunk) else {
            ctx.tracker.fail(chunk);
            return StepOutcome::Failed { chunk };
        };

        match job.phase {
            Phase::Transform => {
                if !ctx.tracker.begin_compute(chunk) {
                    ctx.tracker.settle(chunk, job.spect);
                    return StepOutcome::Skipped { chunk };
                }
                let spect = match job.spect.take() {
                    Some(cached) => cached,
                    None => match compute_chunk(ctx, &info) {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("chunk {chunk}: transform failed: {e}");
                            fail(ctx, sink, &info);
                            return StepOutcome::Failed { chunk };
                        }
                    },
                };
                ctx.tracker.finish_compute(chunk, spect);
                job.phase = Phase::Rasterize;
                self.queue.push_front(job);
                StepOutcome::Computed { chunk }
            }
            Phase::Rasterize => {
                if !ctx.tracker.begin_display(chunk) {
                    return StepOutcome::Skipped { chunk };
                }
                let Some(spect) = ctx.tracker.spect(chunk) else {
                    fail(ctx, sink, &info);
                    return StepOutcome::Failed { chunk };
                };
                ctx.range.widen(spect);
                let (min, max) = ctx.range.bounds().unwrap_or((0.0, 0.0));
                let params = ctx.display;
                let tile = rasterize(
                    spect,
                    spect.cols(),
                    spect.rows(),
                    params.contrast,
                    params.colour_map,
                    min,
                    max,
                );
                match tile {
                    Ok(tile) => {
                        job.tile = Some(tile);
                        job.params = Some(params);
                        job.phase = Phase::Paint;
                        self.queue.push_front(job);
                        StepOutcome::Rasterized { chunk }
                    }
                    Err(e) => {
                        log::warn!("chunk {chunk}: rasterise failed: {e}");
                        fail(ctx, sink, &info);
                        StepOutcome::Failed { chunk }
                    }
                }
            }
            Phase::Paint => {
                let (Some(tile), Some(params)) = (job.tile.take(), job.params) else {
                    fail(ctx, sink, &info);
                    return StepOutcome::Failed { chunk };
                };
                if let Err(e) = sink.paint_tile(info.frame_start, &tile) {
                    log::warn!("chunk {chunk}: {e}");
                    fail(ctx, sink, &info);
                    return StepOutcome::Failed { chunk };
                }
                let path = oscillogram_path(
                    &ctx.samples.samples,
                    ctx.plan.frames_of(&info),
                    ctx.plan.hop(),
                    ctx.oscillogram_height,
                );
                sink.paint_oscillogram_segment(info.frame_start, &path);
                ctx.tracker.finish_display(chunk, params);
                StepOutcome::Painted { chunk }
            }
        }
    }

    /// Run steps until the queue is empty. Returns the number of steps.
    pub fn run_until_idle(&mut self, ctx: &mut RenderContext<'_>, sink: &mut dyn PaintSink) -> usize {
        let mut steps = 0;
        while self.run_next(ctx, sink) != StepOutcome::Idle {
            steps += 1;
        }
        steps
    }
}

fn compute_chunk(ctx: &mut RenderContext<'_>, chunk: &Chunk) -> Result<Matrix> {
    let frames = ctx.plan.frames_of(chunk);
    let m = ctx
        .engine
        .compute_magnitude_matrix(&ctx.samples.samples, frames, ctx.plan.nfft())?;
    Ok(transpose_flip_frequency_axis(&m))
}

fn fail(ctx: &mut RenderContext<'_>, sink: &mut dyn PaintSink, chunk: &Chunk) {
    ctx.tracker.fail(chunk.index);
    sink.clear_tile(chunk.frame_start);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::colour_map::ColourMap;
    use crate::error::SpectrogramError;

    /// Sink that keeps whatever is currently painted.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub tiles: HashMap<usize, Tile>,
        pub paths: HashMap<usize, String>,
        pub paint_count: usize,
        /// Frames whose next tile is refused.
        pub reject: Vec<usize>,
    }

    impl PaintSink for RecordingSink {
        fn paint_tile(&mut self, chunk_start_frame: usize, tile: &Tile) -> Result<()> {
            if let Some(pos) = self.reject.iter().position(|&f| f == chunk_start_frame) {
                self.reject.remove(pos);
                return Err(SpectrogramError::Paint {
                    frame: chunk_start_frame,
                    reason: "refused".to_string(),
                });
            }
            self.tiles.insert(chunk_start_frame, tile.clone());
            self.paint_count += 1;
            Ok(())
        }

        fn paint_oscillogram_segment(&mut self, chunk_start_frame: usize, path_data: &str) {
            self.paths.insert(chunk_start_frame, path_data.to_string());
        }

        fn clear_tile(&mut self, chunk_start_frame: usize) {
            self.tiles.remove(&chunk_start_frame);
            self.paths.remove(&chunk_start_frame);
        }

        fn clear_all(&mut self) {
            self.tiles.clear();
            self.paths.clear();
        }
    }

    const PARAMS: DisplayParams = DisplayParams { contrast: 0, colour_map: ColourMap::Green };

    struct Fixture {
        samples: SampleBuffer,
        plan: ChunkPlan,
        engine: SpectrumEngine,
        tracker: RenderStateTracker,
        range: SpectrumRange,
    }

    impl Fixture {
        /// 10 s of a 1 kHz sine at 16 kHz; 625 frames in 13 chunks of 50.
        fn new() -> Self {
            let samples: Vec<f32> = (0..160_000)
                .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 16_000.0).sin())
                .collect();
            let plan = ChunkPlan::new(samples.len(), 256, 0, 50).unwrap();
            Self {
                tracker: RenderStateTracker::new(plan.chunk_count()),
                samples: SampleBuffer::new(samples, 16_000),
                plan,
                engine: SpectrumEngine::default(),
                range: SpectrumRange::default(),
            }
        }

        fn ctx(&mut self, display: DisplayParams) -> RenderContext<'_> {
            RenderContext {
                samples: &self.samples,
                plan: &self.plan,
                engine: &mut self.engine,
                tracker: &mut self.tracker,
                range: &mut self.range,
                display,
                oscillogram_height: 40,
            }
        }

        fn assert_settled(&self, window: WantedWindow, params: DisplayParams, sink: &RecordingSink) {
            for i in 0..self.tracker.len() {
                let status = self.tracker.status(i).unwrap();
                if status.state == RenderState::Displayed {
                    assert!(status.spect.is_some(), "chunk {i} displayed without spectrum");
                    assert_eq!(status.display, Some(params), "chunk {i} displayed stale");
                }
                if !window.contains(i) {
                    assert_eq!(status.state, RenderState::Empty, "chunk {i} outside window");
                    assert!(status.spect.is_none());
                    let start = self.plan.chunks()[i].frame_start;
                    assert!(!sink.tiles.contains_key(&start), "chunk {i} painted outside window");
                }
            }
        }
    }

    #[test]
    fn test_renders_whole_window() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let window = WantedWindow::around(0, 1, fx.plan.chunk_count());

        let summary = sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(summary.queued, vec![0, 1]);
        assert!(!summary.cancelled);

        // three steps per chunk
        assert_eq!(sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink), 6);
        assert_eq!(fx.tracker.count(RenderState::Displayed), 2);

        let tile = &sink.tiles[&0];
        assert_eq!(tile.width, 50);
        assert_eq!(tile.height, 128);
        assert_eq!(sink.paths.len(), 2);
        assert!(fx.range.bounds().is_some());
        fx.assert_settled(window, PARAMS, &sink);
    }

    #[test]
    fn test_scroll_to_end_evicts_start() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let count = fx.plan.chunk_count();

        let start = WantedWindow::around(0, 1, count);
        sched.request(start, &mut fx.ctx(PARAMS), &mut sink);
        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);

        let end = WantedWindow::around(12, 1, count);
        let summary = sched.request(end, &mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(summary.evicted, vec![0, 1]);
        assert!(!summary.cancelled);
        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);

        assert_eq!(fx.tracker.state(0), RenderState::Empty);
        assert_eq!(fx.tracker.state(12), RenderState::Displayed);
        assert_eq!(fx.tracker.state(11), RenderState::Displayed);
        assert_eq!(fx.tracker.chunks_to_evict(end), Vec::<usize>::new());
        fx.assert_settled(end, PARAMS, &sink);
    }

    #[test]
    fn test_evicting_in_flight_work_cancels() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let count = fx.plan.chunk_count();

        sched.request(WantedWindow::around(0, 1, count), &mut fx.ctx(PARAMS), &mut sink);
        // chunk 0 computed, chunk 1 still scheduled
        assert_eq!(sched.run_next(&mut fx.ctx(PARAMS), &mut sink), StepOutcome::Computed { chunk: 0 });
        let before = sched.generation();

        let far = WantedWindow::around(6, 1, count);
        let summary = sched.request(far, &mut fx.ctx(PARAMS), &mut sink);
        assert!(summary.cancelled);
        assert_eq!(sched.generation(), before + 1);
        assert_eq!(summary.queued, vec![6, 5, 7]);

        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(fx.tracker.count(RenderState::Displayed), 3);
        fx.assert_settled(far, PARAMS, &sink);
    }

    #[test]
    fn test_overlapping_request_appends() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let count = fx.plan.chunk_count();

        sched.request(WantedWindow::around(3, 1, count), &mut fx.ctx(PARAMS), &mut sink);
        let generation = sched.generation();
        assert_eq!(sched.pending(), 3);

        // 2 leaves the window but was only scheduled: that still cancels
        let summary = sched.request(WantedWindow::around(4, 1, count), &mut fx.ctx(PARAMS), &mut sink);
        assert!(summary.cancelled);
        assert_eq!(sched.generation(), generation + 1);

        // moving within the already-wanted range appends nothing
        let summary = sched.request(WantedWindow::around(4, 1, count), &mut fx.ctx(PARAMS), &mut sink);
        assert!(summary.queued.is_empty());
        assert!(!summary.cancelled);
        assert_eq!(sched.pending(), 3);

        // widening the window appends to the tail
        let generation = sched.generation();
        let summary = sched.request(WantedWindow::around(4, 2, count), &mut fx.ctx(PARAMS), &mut sink);
        assert!(!summary.cancelled);
        assert_eq!(summary.queued, vec![2, 6]);
        assert_eq!(sched.generation(), generation);
        assert_eq!(sched.pending(), 5);
    }

    #[test]
    fn test_fast_scrolling_never_paints_outside_final_window() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let count = fx.plan.chunk_count();

        let mut window = WantedWindow::around(0, 1, count);
        for (i, centre) in [0usize, 2, 5, 9, 12, 10, 7, 3, 8, 11].into_iter().enumerate() {
            window = WantedWindow::around(centre, 1, count);
            sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
            for _ in 0..(i % 4) {
                sched.run_next(&mut fx.ctx(PARAMS), &mut sink);
            }
        }
        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);

        fx.assert_settled(window, PARAMS, &sink);
        for i in window.iter() {
            assert_eq!(fx.tracker.state(i), RenderState::Displayed);
        }
    }

    #[test]
    fn test_contrast_change_redisplays_without_recompute() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let window = WantedWindow::around(0, 1, fx.plan.chunk_count());

        sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);
        let spect_before = fx.tracker.spect(0).cloned().unwrap();
        let tile_before = sink.tiles[&0].clone();

        // a recompute from silence would change the cached spectrum
        fx.samples = SampleBuffer::new(vec![0.0; 160_000], 16_000);

        let brighter = DisplayParams { contrast: 8, colour_map: ColourMap::Jet };
        sched.cancel(&mut fx.tracker);
        let summary = sched.request(window, &mut fx.ctx(brighter), &mut sink);
        assert_eq!(summary.queued, vec![0, 1]);
        sched.run_until_idle(&mut fx.ctx(brighter), &mut sink);

        assert_eq!(fx.tracker.spect(0), Some(&spect_before));
        assert_ne!(sink.tiles[&0], tile_before);
        fx.assert_settled(window, brighter, &sink);
    }

    #[test]
    fn test_cancel_mid_display_keeps_computed_cache() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let window = WantedWindow::around(0, 0, fx.plan.chunk_count());

        sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        sched.run_next(&mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(sched.run_next(&mut fx.ctx(PARAMS), &mut sink), StepOutcome::Rasterized { chunk: 0 });
        assert_eq!(fx.tracker.state(0), RenderState::Displaying);

        sched.cancel(&mut fx.tracker);
        assert_eq!(fx.tracker.state(0), RenderState::Computed);
        assert!(fx.tracker.spect(0).is_some());
        assert!(sink.tiles.is_empty());
        assert_eq!(sched.run_next(&mut fx.ctx(PARAMS), &mut sink), StepOutcome::Idle);

        // the next pass only rasterises and paints
        sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink), 3);
        assert_eq!(fx.tracker.state(0), RenderState::Displayed);
    }

    #[test]
    fn test_failed_chunk_reverts_and_siblings_continue() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let window = WantedWindow::around(0, 1, fx.plan.chunk_count());

        // chunk 1's frames run past this truncated buffer
        fx.samples = SampleBuffer::new(fx.samples.samples[..20_000].to_vec(), 16_000);

        sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        let mut outcomes = Vec::new();
        loop {
            match sched.run_next(&mut fx.ctx(PARAMS), &mut sink) {
                StepOutcome::Idle => break,
                o => outcomes.push(o),
            }
        }
        assert!(outcomes.contains(&StepOutcome::Failed { chunk: 1 }));
        assert_eq!(fx.tracker.state(0), RenderState::Displayed);
        assert_eq!(fx.tracker.state(1), RenderState::Empty);

        // retried on the next pass
        let summary = sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(summary.queued, vec![1]);
    }

    #[test]
    fn test_refused_paint_reverts_and_retries() {
        let mut fx = Fixture::new();
        let mut sched = RenderScheduler::new();
        let mut sink = RecordingSink::default();
        let window = WantedWindow::around(0, 1, fx.plan.chunk_count());
        let second = fx.plan.chunks()[1].frame_start;
        sink.reject.push(second);

        sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        let mut outcomes = Vec::new();
        loop {
            match sched.run_next(&mut fx.ctx(PARAMS), &mut sink) {
                StepOutcome::Idle => break,
                o => outcomes.push(o),
            }
        }
        assert!(outcomes.contains(&StepOutcome::Failed { chunk: 1 }));
        assert_eq!(fx.tracker.state(0), RenderState::Displayed);
        assert_eq!(fx.tracker.state(1), RenderState::Empty);
        assert!(!sink.tiles.contains_key(&second));
        assert!(!sink.paths.contains_key(&second));

        let summary = sched.request(window, &mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(summary.queued, vec![1]);
        sched.run_until_idle(&mut fx.ctx(PARAMS), &mut sink);
        assert_eq!(fx.tracker.state(1), RenderState::Displayed);
        assert!(sink.tiles.contains_key(&second));
        fx.assert_settled(window, PARAMS, &sink);
    }
}
