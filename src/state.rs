use leptos::prelude::*;
use sonoscope_core::{PlaybackPhase, Settings, Visualizer, VisualizerEvent};
use crate::canvas::tile_painter::CanvasSink;

const SETTINGS_KEY: &str = "sonoscope.settings";

/// What the UI shows about the loaded recording.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedRecording {
    pub name: String,
    pub duration_ms: f64,
    pub sample_rate: u32,
    /// Set for time-expanded recordings.
    pub real_sample_rate: Option<u32>,
}

#[derive(Clone, Copy)]
pub struct AppState {
    pub visualizer: StoredValue<Visualizer, LocalStorage>,
    pub canvas: StoredValue<CanvasSink, LocalStorage>,
    /// Last file bytes, kept so a channel change can re-decode.
    pub file_bytes: StoredValue<Option<Vec<u8>>, LocalStorage>,
    pub settings: RwSignal<Settings>,
    pub loaded: RwSignal<Option<LoadedRecording>>,
    pub error: RwSignal<Option<String>>,
    pub scroll_px: RwSignal<f64>,
    pub viewport_px: RwSignal<f64>,
    pub playback_phase: RwSignal<PlaybackPhase>,
    pub playback_speed: RwSignal<f64>,
    pub indicator_px: RwSignal<Option<f64>>,
    /// Bumped whenever the canvas sink has something new to blit.
    pub tile_ready_signal: RwSignal<u32>,
    pub render_driver_active: RwSignal<bool>,
    pub last_event: RwSignal<Option<String>>,
}

impl AppState {
    pub fn new() -> Self {
        let settings = load_settings();
        let visualizer = match Visualizer::new(settings.clone()) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("stored settings rejected ({e}), using defaults");
                Visualizer::default()
            }
        };
        let settings = visualizer.settings().clone();

        let state = Self {
            visualizer: StoredValue::new_local(visualizer),
            canvas: StoredValue::new_local(CanvasSink::default()),
            file_bytes: StoredValue::new_local(None),
            settings: RwSignal::new(settings),
            loaded: RwSignal::new(None),
            error: RwSignal::new(None),
            scroll_px: RwSignal::new(0.0),
            viewport_px: RwSignal::new(0.0),
            playback_phase: RwSignal::new(PlaybackPhase::Idle),
            playback_speed: RwSignal::new(100.0),
            indicator_px: RwSignal::new(None),
            tile_ready_signal: RwSignal::new(0),
            render_driver_active: RwSignal::new(false),
            last_event: RwSignal::new(None),
        };

        let phase = state.playback_phase;
        let last_event = state.last_event;
        state.visualizer.update_value(|v| {
            v.subscribe(move |event| match event {
                VisualizerEvent::PlaybackChanged { phase: p } => phase.set(*p),
                VisualizerEvent::SegmentCreated { id, start_ms, end_ms }
                | VisualizerEvent::SegmentAdjusted { id, start_ms, end_ms } => {
                    last_event.set(Some(format!(
                        "{} {:?}: {:.0}-{:.0} ms",
                        event.name(),
                        id,
                        start_ms,
                        end_ms
                    )));
                }
                VisualizerEvent::SegmentMouseOver { id } | VisualizerEvent::SegmentMouseLeave { id } => {
                    log::debug!("{} {:?}", event.name(), id);
                }
            });
        });
        state
    }

    /// Run `f` against the visualizer and the canvas sink together.
    pub fn with_render<R>(&self, f: impl FnOnce(&mut Visualizer, &mut CanvasSink) -> R) -> Option<R> {
        let canvas = self.canvas;
        self.visualizer
            .try_update_value(|v| canvas.try_update_value(|c| f(v, c)))
            .flatten()
    }

    /// Copy the visualizer's viewport back into the signals.
    pub fn sync_view(&self) {
        let scroll = self.visualizer.with_value(|v| v.scroll_px());
        if self.scroll_px.get_untracked() != scroll {
            self.scroll_px.set(scroll);
        }
        self.tile_ready_signal.update(|n| *n = n.wrapping_add(1));
    }

    pub fn save_settings(&self, settings: &Settings) {
        let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) else {
            return;
        };
        match serde_json::to_string(settings) {
            Ok(json) => {
                if let Err(e) = storage.set_item(SETTINGS_KEY, &json) {
                    log::warn!("could not save settings: {e:?}");
                }
            }
            Err(e) => log::warn!("could not serialise settings: {e}"),
        }
    }
}

fn load_settings() -> Settings {
    let stored = web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|s| s.get_item(SETTINGS_KEY).ok().flatten());
    match stored {
        Some(json) => Settings::from_json(&json).unwrap_or_else(|e| {
            log::warn!("ignoring stored settings: {e}");
            Settings::default()
        }),
        None => Settings::default(),
    }
}
