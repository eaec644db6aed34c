//! Short-time Fourier transform over planned analysis frames.

use std::collections::HashMap;
use std::sync::Arc;

use realfft::RealFftPlanner;

use crate::config::MagnitudeScale;
use crate::error::{Result, SpectrogramError};
use crate::types::{AnalysisFrame, Matrix};

/// Taper applied to every frame before its FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowShape {
    #[default]
    Hann,
    Hamming,
    Rectangular,
}

impl WindowShape {
    fn build(self, size: usize) -> Vec<f32> {
        if size < 2 {
            return vec![1.0; size];
        }
        let denom = (size - 1) as f32;
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / denom;
                match self {
                    WindowShape::Hann => 0.5 * (1.0 - phase.cos()),
                    WindowShape::Hamming => 0.54 - 0.46 * phase.cos(),
                    WindowShape::Rectangular => 1.0,
                }
            })
            .collect()
    }
}

/// Owns the FFT planner and window tables for one visualizer.
pub struct SpectrumEngine {
    planner: RealFftPlanner<f32>,
    windows: HashMap<(WindowShape, usize), Arc<[f32]>>,
    shape: WindowShape,
    scale: MagnitudeScale,
}

impl Default for SpectrumEngine {
    fn default() -> Self {
        Self::new(WindowShape::Hann, MagnitudeScale::Decibel)
    }
}

impl SpectrumEngine {
    pub fn new(shape: WindowShape, scale: MagnitudeScale) -> Self {
        Self {
            planner: RealFftPlanner::new(),
            windows: HashMap::new(),
            shape,
            scale,
        }
    }

    pub fn scale(&self) -> MagnitudeScale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: MagnitudeScale) {
        self.scale = scale;
    }

    pub fn window_shape(&self) -> WindowShape {
        self.shape
    }

    fn window(&mut self, size: usize) -> Arc<[f32]> {
        let shape = self.shape;
        self.windows
            .entry((shape, size))
            .or_insert_with(|| shape.build(size).into())
            .clone()
    }

    /// One row per frame, `fft_size / 2` columns, lowest frequency first.
    ///
    /// Every frame must span exactly `fft_size` samples inside `samples`.
    /// The Nyquist bin that a real FFT also returns is dropped.
    pub fn compute_magnitude_matrix(
        &mut self,
        samples: &[f32],
        frames: &[AnalysisFrame],
        fft_size: usize,
    ) -> Result<Matrix> {
        for (index, frame) in frames.iter().enumerate() {
            if frame.len() != fft_size {
                return Err(SpectrogramError::FrameLength {
                    index,
                    expected: fft_size,
                    got: frame.len(),
                });
            }
            if frame.end > samples.len() {
                return Err(SpectrogramError::FrameOutOfRange {
                    index,
                    end: frame.end,
                    len: samples.len(),
                });
            }
        }

        let half = fft_size / 2;
        if frames.is_empty() {
            return Ok(Matrix::new(0, half, Vec::new()));
        }

        let fft = self.planner.plan_fft_forward(fft_size);
        let window = self.window(fft_size);
        let scale = self.scale;

        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        let mut data = Vec::with_capacity(frames.len() * half);

        for frame in frames {
            for (inp, (&s, &w)) in input
                .iter_mut()
                .zip(samples[frame.start..frame.end].iter().zip(window.iter()))
            {
                *inp = s * w;
            }
            fft.process(&mut input, &mut spectrum)
                .map_err(|e| SpectrogramError::Fft(e.to_string()))?;

            data.extend(spectrum[..half].iter().map(|c| scale.apply(c.norm())));
        }

        Ok(Matrix::new(frames.len(), half, data))
    }
}

/// Rows become frequency bins, highest first, ready for top-down raster.
pub fn transpose_flip_frequency_axis(matrix: &Matrix) -> Matrix {
    matrix.transpose().flip_ud()
}

/// Inverse of [`transpose_flip_frequency_axis`].
pub fn restore_frame_axis(matrix: &Matrix) -> Matrix {
    matrix.flip_ud().transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_frames;

    fn sine(freq: f64, sample_rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (2.0 * std::f64::consts::PI * freq * t).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_sine_peak_bin() {
        let sample_rate = 16_000u32;
        let fft_size = 256;
        let samples = sine(2000.0, sample_rate, 4096);
        let frames = plan_frames(samples.len(), fft_size, 0).unwrap();

        let mut engine = SpectrumEngine::default();
        let m = engine.compute_magnitude_matrix(&samples, &frames, fft_size).unwrap();
        assert_eq!(m.rows(), frames.len());
        assert_eq!(m.cols(), fft_size / 2);

        // 2 kHz at 62.5 Hz per bin
        let row = m.row(3);
        let peak = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 32);
    }

    #[test]
    fn test_nyquist_bin_discarded() {
        // alternating samples put all energy in the Nyquist bin
        let fft_size = 64;
        let samples: Vec<f32> = (0..fft_size).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let frames = [AnalysisFrame { start: 0, end: fft_size }];

        let mut engine = SpectrumEngine::new(WindowShape::Rectangular, MagnitudeScale::Linear);
        let m = engine.compute_magnitude_matrix(&samples, &frames, fft_size).unwrap();
        assert_eq!(m.cols(), fft_size / 2);
        assert!(m.data().iter().all(|&v| v < 1e-3), "Nyquist energy leaked: {:?}", m.data());
    }

    #[test]
    fn test_decibel_matches_linear() {
        let fft_size = 128;
        let samples = sine(440.0, 8000, 512);
        let frames = plan_frames(samples.len(), fft_size, 64).unwrap();

        let lin = SpectrumEngine::new(WindowShape::Hann, MagnitudeScale::Linear)
            .compute_magnitude_matrix(&samples, &frames, fft_size)
            .unwrap();
        let db = SpectrumEngine::new(WindowShape::Hann, MagnitudeScale::Decibel)
            .compute_magnitude_matrix(&samples, &frames, fft_size)
            .unwrap();

        for (&l, &d) in lin.data().iter().zip(db.data()) {
            if l > 0.0 {
                assert!((10.0 * l.log10() - d).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_frame_length_mismatch_fails_fast() {
        let samples = vec![0.0f32; 1000];
        let frames = [
            AnalysisFrame { start: 0, end: 256 },
            AnalysisFrame { start: 256, end: 400 },
        ];
        let err = SpectrumEngine::default()
            .compute_magnitude_matrix(&samples, &frames, 256)
            .unwrap_err();
        assert!(matches!(err, SpectrogramError::FrameLength { index: 1, expected: 256, got: 144 }));
    }

    #[test]
    fn test_frame_past_signal_end() {
        let samples = vec![0.0f32; 300];
        let frames = [AnalysisFrame { start: 100, end: 356 }];
        let err = SpectrumEngine::default()
            .compute_magnitude_matrix(&samples, &frames, 256)
            .unwrap_err();
        assert!(matches!(err, SpectrogramError::FrameOutOfRange { .. }));
    }

    #[test]
    fn test_transpose_flip_roundtrip() {
        let m = Matrix::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
            vec![9.0, 10.0, 11.0, 12.0],
        ]);
        let display = transpose_flip_frequency_axis(&m);
        assert_eq!(display.rows(), 4);
        assert_eq!(display.cols(), 3);
        // highest bin of frame 0 lands top-left
        assert_eq!(display.get(0, 0), 4.0);
        assert_eq!(display.get(3, 2), 9.0);

        assert_eq!(restore_frame_axis(&display), m);
        assert_eq!(m.transpose().transpose(), m);
        assert_eq!(m.flip_ud().flip_ud(), m);
    }
}
