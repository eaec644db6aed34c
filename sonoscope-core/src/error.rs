use thiserror::Error;

/// Errors surfaced by loading, rendering, and playback.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("analysis frame {index} spans {got} samples, expected {expected}")]
    FrameLength {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("analysis frame {index} ends at sample {end}, past the {len}-sample signal")]
    FrameOutOfRange { index: usize, end: usize, len: usize },

    #[error("signal of {samples} samples is shorter than one {nfft}-sample frame")]
    SignalTooShort { samples: usize, nfft: usize },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("{width}x{height} raster does not fit a {rows}x{cols} matrix")]
    RasterSize {
        width: usize,
        height: usize,
        rows: usize,
        cols: usize,
    },

    #[error("painting chunk at frame {frame} failed: {reason}")]
    Paint { frame: usize, reason: String },

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("invalid playback request: {0}")]
    Playback(String),

    #[error("channel {channel} out of range for {channels}-channel audio")]
    Channel { channel: usize, channels: usize },

    #[error("unsupported audio format")]
    UnsupportedFormat,

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),

    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpectrogramError>;
