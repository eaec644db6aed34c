//! Incremental spectrogram rendering core.
//!
//! Frames a recording into fixed-size FFT windows, groups the frames into
//! viewport-sized chunks, and renders only the chunks near the viewport
//! through a cancellable, generation-tagged task queue. A playback
//! synchroniser keeps a time indicator in step with audio playback.
//!
//! The crate has no browser dependencies: hosts supply samples, receive
//! tiles through [`scheduler::PaintSink`], and drive both the scheduler and
//! the playback clock.

pub mod brush;
pub mod colour_map;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod oscillogram;
pub mod planner;
pub mod playback;
pub mod render_state;
pub mod scheduler;
pub mod spectrum;
pub mod timescale;
pub mod types;
pub mod visualizer;

pub use colour_map::ColourMap;
pub use config::{Invalidation, MagnitudeScale, Settings};
pub use error::{Result, SpectrogramError};
pub use events::{EventBus, SubscriptionId, VisualizerEvent};
pub use playback::{PlaybackPhase, PlaybackSynchronizer};
pub use scheduler::{PaintSink, RenderScheduler, StepOutcome};
pub use types::{AnalysisFrame, Chunk, Matrix, SampleBuffer, Segment, SegmentId, Tile};
pub use visualizer::Visualizer;
