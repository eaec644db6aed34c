//! Framing of a signal into analysis frames and of frames into chunks.
//!
//! One frame is one pixel column, so a chunk `spect_width` frames wide is
//! also `spect_width` pixels wide. The final chunk may be narrower; the
//! final partial frame is never planned.

use crate::error::{Result, SpectrogramError};
use crate::types::{AnalysisFrame, Chunk};

/// Frames of `fft_size` samples stepped by `fft_size - overlap`.
pub fn plan_frames(signal_length: usize, fft_size: usize, overlap: usize) -> Result<Vec<AnalysisFrame>> {
    if fft_size == 0 || overlap >= fft_size {
        return Err(SpectrogramError::InvalidSettings(format!(
            "overlap {overlap} must be smaller than FFT size {fft_size}"
        )));
    }
    if signal_length < fft_size {
        return Ok(Vec::new());
    }

    let step = fft_size - overlap;
    let count = (signal_length - fft_size) / step + 1;
    Ok((0..count)
        .map(|i| {
            let start = i * step;
            AnalysisFrame { start, end: start + fft_size }
        })
        .collect())
}

/// Consecutive chunks of `chunk_width` frames covering `[0, frame_count)`.
pub fn plan_chunks(frame_count: usize, chunk_width: usize) -> Vec<Chunk> {
    let width = chunk_width.max(1);
    (0..frame_count.div_ceil(width))
        .map(|index| Chunk {
            index,
            frame_start: index * width,
            frame_end: ((index + 1) * width).min(frame_count),
        })
        .collect()
}

/// Inclusive range of chunk indices eligible for rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WantedWindow {
    pub first: usize,
    pub last: usize,
}

impl WantedWindow {
    /// `radius` chunks either side of `centre`, clipped to `chunk_count`.
    pub fn around(centre: usize, radius: usize, chunk_count: usize) -> Self {
        let last_chunk = chunk_count.saturating_sub(1);
        let centre = centre.min(last_chunk);
        Self {
            first: centre.saturating_sub(radius),
            last: (centre + radius).min(last_chunk),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.first && index <= self.last
    }

    pub fn centre(&self) -> usize {
        (self.first + self.last) / 2
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }
}

/// Frames and chunks for one recording at one zoom level.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    frames: Vec<AnalysisFrame>,
    chunks: Vec<Chunk>,
    nfft: usize,
    hop: usize,
    chunk_width: usize,
}

impl ChunkPlan {
    /// Fails if the signal cannot hold a single frame, so a plan always
    /// has at least one chunk.
    pub fn new(signal_length: usize, nfft: usize, noverlap: usize, chunk_width: usize) -> Result<Self> {
        let frames = plan_frames(signal_length, nfft, noverlap)?;
        if frames.is_empty() {
            return Err(SpectrogramError::SignalTooShort { samples: signal_length, nfft });
        }
        let chunk_width = chunk_width.max(1);
        let chunks = plan_chunks(frames.len(), chunk_width);
        Ok(Self {
            frames,
            chunks,
            nfft,
            hop: nfft - noverlap,
            chunk_width,
        })
    }

    pub fn frames(&self) -> &[AnalysisFrame] {
        &self.frames
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn frames_of(&self, chunk: &Chunk) -> &[AnalysisFrame] {
        &self.frames[chunk.frame_start..chunk.frame_end]
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn nfft(&self) -> usize {
        self.nfft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn chunk_width(&self) -> usize {
        self.chunk_width
    }

    /// Total drawable width in pixels.
    pub fn width_px(&self) -> usize {
        self.frames.len()
    }

    pub fn chunk_at_px(&self, px: f64) -> usize {
        let index = (px.max(0.0) / self.chunk_width as f64).floor() as usize;
        index.min(self.chunks.len().saturating_sub(1))
    }

    /// Chunks within one viewport's width either side of the chunk under
    /// `scroll_px`.
    pub fn wanted_window(&self, scroll_px: f64, viewport_px: f64) -> WantedWindow {
        let current = self.chunk_at_px(scroll_px);
        let per_view = (viewport_px.max(1.0) / self.chunk_width as f64).ceil() as usize;
        WantedWindow::around(current, per_view.max(1), self.chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(chunks: &[Chunk], frame_count: usize) {
        assert_eq!(chunks.first().map(|c| c.frame_start), Some(0));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].frame_end, pair[1].frame_start);
            assert_eq!(pair[0].index + 1, pair[1].index);
        }
        assert_eq!(chunks.last().map(|c| c.frame_end), Some(frame_count));
    }

    #[test]
    fn test_frames_drop_partial_tail() {
        let frames = plan_frames(1000, 256, 0).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], AnalysisFrame { start: 512, end: 768 });
        assert!(frames.iter().all(|f| f.len() == 256));

        let frames = plan_frames(1000, 256, 128).unwrap();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[5].end, 896);
    }

    #[test]
    fn test_frames_short_signal() {
        assert!(plan_frames(100, 256, 0).unwrap().is_empty());
        assert!(plan_frames(100, 256, 256).is_err());
    }

    #[test]
    fn test_chunks_cover_exactly() {
        for signal_length in [256usize, 1000, 4097, 160_000] {
            for (nfft, noverlap) in [(256usize, 0usize), (256, 192), (512, 511), (64, 32)] {
                for width in [1usize, 7, 50, 640] {
                    let frames = plan_frames(signal_length, nfft, noverlap).unwrap();
                    let chunks = plan_chunks(frames.len(), width);
                    if frames.is_empty() {
                        assert!(chunks.is_empty());
                        continue;
                    }
                    assert_exact_cover(&chunks, frames.len());
                    assert!(chunks.iter().all(|c| c.len() <= width && !c.is_empty()));
                }
            }
        }
    }

    #[test]
    fn test_ten_second_plan() {
        let plan = ChunkPlan::new(160_000, 256, 0, 50).unwrap();
        assert_eq!(plan.frame_count(), 625);
        assert_eq!(plan.chunk_count(), 13);
        assert_eq!(plan.chunks()[12].len(), 25);
        assert_eq!(plan.frames_of(&plan.chunks()[12]).len(), 25);
    }

    #[test]
    fn test_plan_rejects_short_signal() {
        assert!(matches!(
            ChunkPlan::new(10, 256, 0, 50),
            Err(SpectrogramError::SignalTooShort { samples: 10, nfft: 256 })
        ));
    }

    #[test]
    fn test_wanted_window() {
        let plan = ChunkPlan::new(160_000, 256, 0, 50).unwrap();
        assert_eq!(plan.wanted_window(0.0, 50.0), WantedWindow { first: 0, last: 1 });
        assert_eq!(plan.wanted_window(600.0, 50.0), WantedWindow { first: 11, last: 12 });
        assert_eq!(plan.wanted_window(260.0, 120.0), WantedWindow { first: 2, last: 8 });
        // scrolling past the end clamps to the last chunk
        assert_eq!(plan.wanted_window(10_000.0, 50.0), WantedWindow { first: 11, last: 12 });
    }
}
