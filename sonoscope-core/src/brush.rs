/// Narrowest selection, in pixels, that counts as a drag rather than a click.
pub const MIN_BRUSH_PX: f64 = 1.0;

/// Drag gesture over the spectrogram, in content pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Brush {
    anchor: Option<f64>,
    current: f64,
}

impl Brush {
    pub fn begin(&mut self, px: f64) {
        self.anchor = Some(px);
        self.current = px;
    }

    pub fn drag(&mut self, px: f64) {
        if self.anchor.is_some() {
            self.current = px;
        }
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    /// Current selection, left edge first.
    pub fn extent(&self) -> Option<(f64, f64)> {
        self.anchor
            .map(|a| if a <= self.current { (a, self.current) } else { (self.current, a) })
    }

    /// End the gesture. Selections narrower than [`MIN_BRUSH_PX`] are dropped.
    pub fn finish(&mut self) -> Option<(f64, f64)> {
        let extent = self.extent();
        self.cancel();
        extent.filter(|(lo, hi)| hi - lo >= MIN_BRUSH_PX)
    }

    pub fn cancel(&mut self) {
        self.anchor = None;
    }
}
