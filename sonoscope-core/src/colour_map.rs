//! Palette lookup and rasterisation of spectrogram matrices.
//!
//! Each palette is a fixed table of `PALETTE_LEN` RGB triples ordered from
//! low to high intensity. Contrast stretches the mapping rather than the
//! data: it adds intervals and then shifts every index down by the same
//! amount, so quiet cells fall into the darkest entry.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrogramError};
use crate::types::{Matrix, Tile};

pub const PALETTE_LEN: usize = 64;

pub type Palette = [[u8; 3]; PALETTE_LEN];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColourMap {
    #[default]
    Green,
    Jet,
    Gray,
}

impl ColourMap {
    pub const ALL: [ColourMap; 3] = [ColourMap::Green, ColourMap::Jet, ColourMap::Gray];

    pub fn palette(self) -> &'static Palette {
        match self {
            ColourMap::Green => &GREEN,
            ColourMap::Jet => &JET,
            ColourMap::Gray => &GRAY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColourMap::Green => "Green",
            ColourMap::Jet => "Jet",
            ColourMap::Gray => "Gray",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label().eq_ignore_ascii_case(label))
    }
}

const fn unit_to_byte(milli: i32) -> u8 {
    let m = if milli < 0 {
        0
    } else if milli > 1000 {
        1000
    } else {
        milli
    };
    (m * 255 / 1000) as u8
}

const fn build_gray() -> Palette {
    let mut p = [[0u8; 3]; PALETTE_LEN];
    let mut i = 0;
    while i < PALETTE_LEN {
        let v = (i * 255 / (PALETTE_LEN - 1)) as u8;
        p[i] = [v, v, v];
        i += 1;
    }
    p
}

/// Black through green, then green towards white.
const fn build_green() -> Palette {
    let mut p = [[0u8; 3]; PALETTE_LEN];
    let half = PALETTE_LEN / 2;
    let mut i = 0;
    while i < PALETTE_LEN {
        p[i] = if i < half {
            [0, (i * 255 / (half - 1)) as u8, 0]
        } else {
            let w = ((i - half) * 230 / (PALETTE_LEN - half - 1)) as u8;
            [w, 255, w]
        };
        i += 1;
    }
    p
}

/// Classic jet: blue, cyan, yellow, red. Channels are triangular ramps in
/// thousandths, centred a quarter of the range apart.
const fn build_jet() -> Palette {
    let mut p = [[0u8; 3]; PALETTE_LEN];
    let mut i = 0;
    while i < PALETTE_LEN {
        let v = (4000 * i / (PALETTE_LEN - 1)) as i32;
        let r = 1500 - (v - 3000).abs();
        let g = 1500 - (v - 2000).abs();
        let b = 1500 - (v - 1000).abs();
        p[i] = [unit_to_byte(r), unit_to_byte(g), unit_to_byte(b)];
        i += 1;
    }
    p
}

static GREEN: Palette = build_green();
static JET: Palette = build_jet();
static GRAY: Palette = build_gray();

/// Running extrema of every spectrum computed in a session.
///
/// Only widens. Non-finite values (e.g. `-inf` dB from digital silence)
/// are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumRange {
    min: f32,
    max: f32,
}

impl Default for SpectrumRange {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl SpectrumRange {
    /// Fold every finite value of `matrix` into the range. Returns true if
    /// either bound moved.
    pub fn widen(&mut self, matrix: &Matrix) -> bool {
        let (old_min, old_max) = (self.min, self.max);
        for &v in matrix.data() {
            if v.is_finite() {
                self.min = self.min.min(v);
                self.max = self.max.max(v);
            }
        }
        old_min != self.min || old_max != self.max
    }

    pub fn bounds(&self) -> Option<(f32, f32)> {
        (self.min <= self.max).then_some((self.min, self.max))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Width of one palette interval for a value range and contrast.
///
/// A collapsed range (or a contrast that leaves fewer than two intervals)
/// yields an infinite bin, sending every value to the bottom of the scale.
pub fn bin_size(min_value: f32, max_value: f32, contrast: i32) -> f32 {
    let n_intervals = PALETTE_LEN as i64 + contrast as i64 - 1;
    if n_intervals < 2 || max_value <= min_value {
        return f32::INFINITY;
    }
    (max_value - min_value) / (n_intervals - 1) as f32
}

/// Palette index for one cell value. Always within `[0, PALETTE_LEN)`.
pub fn palette_index(value: f32, min_value: f32, bin_size: f32, contrast: i32) -> usize {
    if value.is_nan() {
        return 0;
    }
    let offset = (value - min_value).max(0.0);
    let index = ((offset / bin_size).round() as i64).saturating_sub(contrast as i64);
    index.clamp(0, PALETTE_LEN as i64 - 1) as usize
}

/// Map `matrix` (rows = image rows, top first) onto an opaque RGBA tile.
pub fn rasterize(
    matrix: &Matrix,
    width: usize,
    height: usize,
    contrast: i32,
    colour_map: ColourMap,
    min_value: f32,
    max_value: f32,
) -> Result<Tile> {
    if matrix.rows() != height || matrix.cols() != width {
        return Err(SpectrogramError::RasterSize {
            width,
            height,
            rows: matrix.rows(),
            cols: matrix.cols(),
        });
    }

    let palette = colour_map.palette();
    let bin = bin_size(min_value, max_value, contrast);

    let mut pixels = Vec::with_capacity(width * height * 4);
    for &v in matrix.data() {
        let [r, g, b] = palette[palette_index(v, min_value, bin, contrast)];
        pixels.extend_from_slice(&[r, g, b, 255]);
    }

    Ok(Tile {
        width: width as u32,
        height: height as u32,
        pixels,
    })
}
