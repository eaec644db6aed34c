use std::sync::Arc;

/// Decoded mono audio for one loaded recording.
///
/// `sample_rate` is the rate the samples are framed and played at.
/// `real_sample_rate` is set when the source file ran faster than the
/// decoder cap and was reinterpreted at the capped rate.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub real_sample_rate: Option<u32>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            real_sample_rate: None,
        }
    }

    pub fn with_real_sample_rate(mut self, rate: u32) -> Self {
        self.real_sample_rate = Some(rate);
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Highest representable frequency of the original recording.
    pub fn nyquist_hz(&self) -> f64 {
        self.real_sample_rate.unwrap_or(self.sample_rate) as f64 / 2.0
    }
}

/// Half-open sample interval `[start, end)` fed to one FFT.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisFrame {
    pub start: usize,
    pub end: usize,
}

impl AnalysisFrame {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A run of frames `[frame_start, frame_end)` rendered as one image tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub index: usize,
    pub frame_start: usize,
    pub frame_end: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.frame_end - self.frame_start
    }

    pub fn is_empty(&self) -> bool {
        self.frame_end <= self.frame_start
    }
}

/// Dense row-major `f32` matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Panics if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix data does not match {rows}x{cols}");
        Self { rows, cols, data }
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "ragged matrix rows");
            data.extend(row);
        }
        Self { rows: n_rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(self.data[r * self.cols + c]);
            }
        }
        Matrix { rows: self.cols, cols: self.rows, data }
    }

    /// Reverse the row order.
    pub fn flip_ud(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.data.len());
        for r in (0..self.rows).rev() {
            data.extend_from_slice(self.row(r));
        }
        Matrix { rows: self.rows, cols: self.cols, data }
    }
}

/// Rasterised RGBA tile, row 0 at the top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Tile {
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }
}

/// Identity of an annotated segment.
///
/// Segments owned by the annotation grid carry their persisted id; ones
/// drawn with the brush before the grid has saved them are drafts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Persisted(u64),
    Draft(u64),
}

/// An annotated interval on the recording timeline, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Segment {
    pub fn overlaps(&self, start_ms: f64, end_ms: f64) -> bool {
        self.start_ms < end_ms && self.end_ms > start_ms
    }

    pub fn contains(&self, ms: f64) -> bool {
        ms >= self.start_ms && ms <= self.end_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_and_flip() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let t = m.transpose();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.row(0), &[1.0, 4.0]);
        assert_eq!(t.row(2), &[3.0, 6.0]);

        let f = m.flip_ud();
        assert_eq!(f.row(0), &[4.0, 5.0, 6.0]);
        assert_eq!(f.flip_ud(), m);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn test_nyquist_uses_real_rate() {
        let buf = SampleBuffer::new(vec![0.0; 10], 48_000).with_real_sample_rate(250_000);
        assert_eq!(buf.nyquist_hz(), 125_000.0);
        assert_eq!(buf.sample_rate, 48_000);
    }

    #[test]
    fn test_segment_overlap() {
        let s = Segment { id: SegmentId::Draft(1), start_ms: 100.0, end_ms: 200.0 };
        assert!(s.overlaps(150.0, 300.0));
        assert!(!s.overlaps(200.0, 300.0));
        assert!(s.contains(100.0));
    }
}
