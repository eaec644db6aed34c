//! Visualizer settings and how a change to them invalidates rendered work.

use serde::{Deserialize, Serialize};

use crate::colour_map::ColourMap;
use crate::error::{Result, SpectrogramError};

pub const MIN_NFFT: usize = 16;
pub const MAX_NFFT: usize = 4096;
pub const MAX_CONTRAST: i32 = 100;
pub const MAX_ZOOM: u32 = 6400;

/// Post-processing applied to each FFT magnitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagnitudeScale {
    /// `10 * log10(magnitude)`
    #[default]
    Decibel,
    /// Magnitudes as computed.
    Linear,
}

impl MagnitudeScale {
    #[inline]
    pub fn apply(self, magnitude: f32) -> f32 {
        match self {
            MagnitudeScale::Decibel => 10.0 * magnitude.log10(),
            MagnitudeScale::Linear => magnitude,
        }
    }
}

/// How much rendered state a settings change throws away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Invalidation {
    /// Nothing rendered depends on what changed.
    None,
    /// Cached spectra stay valid; tiles must be repainted.
    Redisplay,
    /// Chunk boundaries or spectra change; everything is re-planned.
    Replan,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Horizontal zoom in percent. 100 means frames do not overlap.
    pub zoom: u32,
    pub contrast: i32,
    pub colour_map: ColourMap,
    pub nfft: usize,
    /// Width in pixels (frames) of one rendered chunk.
    pub spect_width: usize,
    /// Height in pixels of the oscillogram strip.
    pub spect_height: u32,
    pub scale: MagnitudeScale,
    pub auto_scroll: bool,
    pub lead_margin_px: f64,
    /// Channel picked out of multi-channel files by the decoder.
    pub channel: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zoom: 100,
            contrast: 0,
            colour_map: ColourMap::Green,
            nfft: 256,
            spect_width: 640,
            spect_height: 60,
            scale: MagnitudeScale::Decibel,
            auto_scroll: true,
            lead_margin_px: 50.0,
            channel: 0,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.zoom == 0 || self.zoom > MAX_ZOOM {
            return Err(SpectrogramError::InvalidSettings(format!(
                "zoom {}% outside 1..={MAX_ZOOM}",
                self.zoom
            )));
        }
        if !self.nfft.is_power_of_two() || !(MIN_NFFT..=MAX_NFFT).contains(&self.nfft) {
            return Err(SpectrogramError::InvalidSettings(format!(
                "nfft {} must be a power of two in {MIN_NFFT}..={MAX_NFFT}",
                self.nfft
            )));
        }
        if !(0..=MAX_CONTRAST).contains(&self.contrast) {
            return Err(SpectrogramError::InvalidSettings(format!(
                "contrast {} outside 0..={MAX_CONTRAST}",
                self.contrast
            )));
        }
        if self.spect_width == 0 {
            return Err(SpectrogramError::InvalidSettings("spectWidth must be positive".into()));
        }
        if !self.lead_margin_px.is_finite() || self.lead_margin_px < 0.0 {
            return Err(SpectrogramError::InvalidSettings(
                "leadMarginPx must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Samples between consecutive frame starts.
    pub fn hop(&self) -> usize {
        let hop = (self.nfft as f64 * 100.0 / self.zoom.max(1) as f64).round() as usize;
        hop.clamp(1, self.nfft)
    }

    pub fn noverlap(&self) -> usize {
        self.nfft - self.hop()
    }

    pub fn invalidation(&self, next: &Settings) -> Invalidation {
        if self.nfft != next.nfft
            || self.hop() != next.hop()
            || self.scale != next.scale
            || self.spect_width != next.spect_width
        {
            Invalidation::Replan
        } else if self.contrast != next.contrast
            || self.colour_map != next.colour_map
            || self.spect_height != next.spect_height
        {
            Invalidation::Redisplay
        } else {
            Invalidation::None
        }
    }
}
