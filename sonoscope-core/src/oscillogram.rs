use std::fmt::Write;

use crate::types::AnalysisFrame;

/// SVG path data for the min/max envelope of one chunk.
///
/// One vertical stroke per frame, covering the `hop` samples that frame
/// advances by, so adjacent strokes never double-count samples. `x` is
/// relative to the chunk's first column; `y = 0` is the top of a strip
/// `height` pixels tall.
pub fn oscillogram_path(samples: &[f32], frames: &[AnalysisFrame], hop: usize, height: u32) -> String {
    let mid = height as f32 / 2.0;
    let mut path = String::with_capacity(frames.len() * 24);

    for (x, frame) in frames.iter().enumerate() {
        let start = frame.start.min(samples.len());
        let end = (frame.start + hop.max(1)).min(samples.len());
        let (lo, hi) = samples[start..end]
            .iter()
            .fold((0.0f32, 0.0f32), |(lo, hi), &s| (lo.min(s), hi.max(s)));

        let top = mid - hi.clamp(-1.0, 1.0) * mid;
        let bottom = mid - lo.clamp(-1.0, 1.0) * mid;
        // writing to a String cannot fail
        let _ = write!(path, "M{x},{top:.1}L{x},{bottom:.1}");
    }
    path
}
