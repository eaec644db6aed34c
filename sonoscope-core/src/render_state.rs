//! Per-chunk render state machine.
//!
//! ```text
//! Empty -> Scheduled -> Computing -> Computed -> Displaying -> Displayed
//!                ^                      |                        |
//!                +----------------------+------------------------+
//!                     (re-display with new contrast / colour map)
//! any state -> Empty   (chunk left the wanted window)
//! ```
//!
//! A cached spectrum is held only in `Computed`, `Displaying` and
//! `Displayed`. Scheduling a chunk that already has one hands the spectrum
//! to the caller, who returns it through [`RenderStateTracker::finish_compute`].

use crate::colour_map::ColourMap;
use crate::planner::WantedWindow;
use crate::types::Matrix;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderState {
    #[default]
    Empty,
    Scheduled,
    Computing,
    Computed,
    Displaying,
    Displayed,
}

impl RenderState {
    /// Work has been queued or started but not finished.
    pub fn is_in_flight(self) -> bool {
        matches!(self, RenderState::Scheduled | RenderState::Computing | RenderState::Displaying)
    }
}

/// Display-time parameters a painted tile was rendered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayParams {
    pub contrast: i32,
    pub colour_map: ColourMap,
}

#[derive(Clone, Debug, Default)]
pub struct RenderStatus {
    pub state: RenderState,
    /// Parameters of the tile currently painted, if any.
    pub display: Option<DisplayParams>,
    /// Display-ready spectrum: rows are frequency bins, highest first.
    pub spect: Option<Matrix>,
}

impl RenderStatus {
    pub fn contrast(&self) -> Option<i32> {
        self.display.map(|d| d.contrast)
    }
}

pub struct RenderStateTracker {
    statuses: Vec<RenderStatus>,
}

impl RenderStateTracker {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            statuses: (0..chunk_count).map(|_| RenderStatus::default()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn status(&self, chunk: usize) -> Option<&RenderStatus> {
        self.statuses.get(chunk)
    }

    pub fn state(&self, chunk: usize) -> RenderState {
        self.statuses.get(chunk).map(|s| s.state).unwrap_or_default()
    }

    pub fn spect(&self, chunk: usize) -> Option<&Matrix> {
        self.statuses.get(chunk).and_then(|s| s.spect.as_ref())
    }

    /// Chunks in the window that are unrendered, computed but never shown,
    /// or shown with stale display parameters.
    pub fn chunks_needing_work(&self, window: WantedWindow, current: DisplayParams) -> Vec<usize> {
        window
            .iter()
            .filter(|&i| match self.statuses.get(i) {
                Some(s) => match s.state {
                    RenderState::Empty | RenderState::Computed => true,
                    RenderState::Displayed => s.display != Some(current),
                    _ => false,
                },
                None => false,
            })
            .collect()
    }

    /// Chunks outside the window still holding state.
    pub fn chunks_to_evict(&self, window: WantedWindow) -> Vec<usize> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(i, s)| !window.contains(*i) && s.state != RenderState::Empty)
            .map(|(i, _)| i)
            .collect()
    }

    /// Drop everything held for `chunk`. Returns the state it was in.
    pub fn evict(&mut self, chunk: usize) -> RenderState {
        match self.statuses.get_mut(chunk) {
            Some(s) => std::mem::take(s).state,
            None => RenderState::Empty,
        }
    }

    /// `Empty | Computed | Displayed -> Scheduled`. Returns the cached
    /// spectrum, if there was one, or `None` when the transition is refused.
    pub fn schedule(&mut self, chunk: usize) -> Option<Option<Matrix>> {
        let s = self.statuses.get_mut(chunk)?;
        match s.state {
            RenderState::Empty | RenderState::Computed | RenderState::Displayed => {
                s.state = RenderState::Scheduled;
                Some(s.spect.take())
            }
            _ => None,
        }
    }

    /// `Scheduled -> Computing`
    pub fn begin_compute(&mut self, chunk: usize) -> bool {
        self.transition(chunk, RenderState::Scheduled, RenderState::Computing)
    }

    /// `Scheduled | Computing -> Computed`, storing the spectrum. Refused
    /// if the chunk was evicted meanwhile.
    pub fn finish_compute(&mut self, chunk: usize, spect: Matrix) -> bool {
        match self.statuses.get_mut(chunk) {
            Some(s) if matches!(s.state, RenderState::Scheduled | RenderState::Computing) => {
                s.state = RenderState::Computed;
                s.spect = Some(spect);
                true
            }
            _ => false,
        }
    }

    /// `Computed -> Displaying`
    pub fn begin_display(&mut self, chunk: usize) -> bool {
        self.transition(chunk, RenderState::Computed, RenderState::Displaying)
    }

    /// `Displaying -> Displayed`, recording what the tile was painted with.
    pub fn finish_display(&mut self, chunk: usize, params: DisplayParams) -> bool {
        if !self.transition(chunk, RenderState::Displaying, RenderState::Displayed) {
            return false;
        }
        self.statuses[chunk].display = Some(params);
        true
    }

    /// Put an abandoned chunk back to rest: `Computed` if a spectrum
    /// survives (from `spect` or already cached), `Empty` otherwise.
    /// A previously painted tile stays recorded until repainted or evicted.
    pub fn settle(&mut self, chunk: usize, spect: Option<Matrix>) {
        let Some(s) = self.statuses.get_mut(chunk) else { return };
        if s.state == RenderState::Empty {
            return;
        }
        if let Some(m) = spect {
            s.spect = Some(m);
        }
        s.state = if s.spect.is_some() {
            RenderState::Computed
        } else {
            RenderState::Empty
        };
    }

    /// Mark every painted tile as needing a repaint while keeping the
    /// cached spectra. Returns how many chunks were affected.
    pub fn invalidate_displays(&mut self) -> usize {
        let mut n = 0;
        for s in self.statuses.iter_mut().filter(|s| s.state == RenderState::Displayed) {
            s.state = RenderState::Computed;
            s.display = None;
            n += 1;
        }
        n
    }

    /// Forget a chunk after a failed step so the next pass retries it.
    pub fn fail(&mut self, chunk: usize) {
        self.evict(chunk);
    }

    pub fn count(&self, state: RenderState) -> usize {
        self.statuses.iter().filter(|s| s.state == state).count()
    }

    fn transition(&mut self, chunk: usize, from: RenderState, to: RenderState) -> bool {
        match self.statuses.get_mut(chunk) {
            Some(s) if s.state == from => {
                s.state = to;
                true
            }
            Some(s) => {
                log::debug!("chunk {chunk}: refused {:?} -> {to:?} from {:?}", from, s.state);
                false
            }
            None => false,
        }
    }
}
