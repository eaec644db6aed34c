/// Converts between pixel columns and the recording timeline.
///
/// One pixel column is one analysis frame, so a column spans `hop` samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeScale {
    hop: usize,
    sample_rate: u32,
}

impl TimeScale {
    pub fn new(hop: usize, sample_rate: u32) -> Self {
        Self {
            hop: hop.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn ms_per_px(&self) -> f64 {
        self.hop as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn px_to_ms(&self, px: f64) -> f64 {
        px * self.ms_per_px()
    }

    pub fn ms_to_px(&self, ms: f64) -> f64 {
        ms / self.ms_per_px()
    }

    pub fn ms_to_sample(&self, ms: f64) -> usize {
        (ms.max(0.0) * self.sample_rate as f64 / 1000.0).round() as usize
    }

    pub fn sample_to_ms(&self, sample: usize) -> f64 {
        sample as f64 * 1000.0 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let scale = TimeScale::new(256, 16_000);
        assert_eq!(scale.ms_per_px(), 16.0);
        assert_eq!(scale.px_to_ms(50.0), 800.0);
        assert_eq!(scale.ms_to_px(800.0), 50.0);
        assert_eq!(scale.ms_to_sample(1000.0), 16_000);
        assert_eq!(scale.sample_to_ms(8_000), 500.0);
    }
}
