use leptos::prelude::*;
use sonoscope_core::decode;
use wasm_bindgen_futures::JsFuture;
use crate::audio::playback;
use crate::canvas::render_driver;
use crate::state::{AppState, LoadedRecording};

/// Read a dropped or picked file and load it.
pub async fn load_file(state: AppState, file: web_sys::File) {
    let name = file.name();
    let buffer = match JsFuture::from(file.array_buffer()).await {
        Ok(b) => b,
        Err(e) => {
            log::error!("Failed to read {name}: {e:?}");
            state.error.set(Some(format!("Could not read {name}")));
            return;
        }
    };
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    state.file_bytes.set_value(Some(bytes));
    reload(state, name);
}

/// Decode the stored file bytes with the current channel and load them.
pub fn reload(state: AppState, name: String) {
    let channel = state.settings.get_untracked().channel;
    let decoded = state
        .file_bytes
        .with_value(|bytes| bytes.as_deref().map(|b| decode::decode(b, channel)));
    let samples = match decoded {
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            log::error!("Failed to decode {name}: {e}");
            state.error.set(Some(format!("{name}: {e}")));
            return;
        }
        None => return,
    };

    playback::stop_audio();
    let info = LoadedRecording {
        name,
        duration_ms: samples.duration_ms(),
        sample_rate: samples.sample_rate,
        real_sample_rate: samples.real_sample_rate,
    };
    match state.with_render(|v, c| v.load(samples, c)) {
        Some(Ok(_)) => {
            log::info!("Loaded {} ({:.1} s)", info.name, info.duration_ms / 1000.0);
            state.loaded.set(Some(info));
            state.error.set(None);
            state.indicator_px.set(None);
            state.sync_view();
            render_driver::ensure_running(state);
        }
        Some(Err(e)) => {
            log::error!("Failed to load {}: {e}", info.name);
            state.error.set(Some(format!("{}: {e}", info.name)));
        }
        None => {}
    }
}
