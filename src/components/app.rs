use leptos::prelude::*;
use wasm_bindgen::JsCast;
use crate::audio::loader;
use crate::state::AppState;
use crate::components::play_controls::PlayControls;
use crate::components::settings_panel::SettingsPanel;
use crate::components::spectrogram::Spectrogram;

#[component]
pub fn App() -> impl IntoView {
    let state = AppState::new();
    provide_context(state);

    view! {
        <div class="app">
            <SettingsPanel />
            <MainArea />
        </div>
    }
}

#[component]
fn MainArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let has_file = move || state.loaded.get().is_some();

    let on_file = move |ev: web_sys::Event| {
        let Some(target) = ev.target() else { return };
        let input: web_sys::HtmlInputElement = target.unchecked_into();
        let Some(file) = input.files().and_then(|f| f.get(0)) else { return };
        wasm_bindgen_futures::spawn_local(loader::load_file(state, file));
    };

    view! {
        <div class="main">
            <div class="toolbar">
                <label class="layer-btn">
                    "Open"
                    <input type="file" accept=".wav,.flac,audio/wav,audio/flac"
                        style="display: none"
                        on:change=on_file
                    />
                </label>
                <span class="file-name">{move || state.loaded.get().map(|r| {
                    match r.real_sample_rate {
                        Some(real) => format!("{} ({} kHz, time-expanded)", r.name, real / 1000),
                        None => format!("{} ({} kHz)", r.name, r.sample_rate / 1000),
                    }
                })}</span>
                <PlayControls />
            </div>
            {move || state.error.get().map(|msg| view! { <div class="error">{msg}</div> })}
            {move || {
                if has_file() {
                    view! {
                        <Spectrogram />
                        <div class="status-bar">
                            {move || state.last_event.get().unwrap_or_else(|| "Drag to mark a segment".to_string())}
                        </div>
                    }.into_any()
                } else {
                    view! {
                        <div class="empty-state">
                            "Open a WAV or FLAC recording"
                        </div>
                    }.into_any()
                }
            }}
        </div>
    }
}
