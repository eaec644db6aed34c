use leptos::prelude::*;
use sonoscope_core::{ColourMap, Settings};
use wasm_bindgen::JsCast;
use crate::audio::loader;
use crate::canvas::render_driver;
use crate::state::AppState;

/// Push new settings through the visualizer, which decides how much
/// rendered work to throw away.
fn apply(state: AppState, next: Settings) {
    let channel_changed = state.settings.get_untracked().channel != next.channel;
    match state.with_render(|v, c| v.update_settings(next.clone(), c)) {
        Some(Ok(invalidation)) => {
            log::debug!("settings change: {invalidation:?}");
            state.save_settings(&next);
            state.settings.set(next);
            state.error.set(None);
            if channel_changed {
                if let Some(name) = state.loaded.get_untracked().map(|r| r.name) {
                    loader::reload(state, name);
                }
            }
            state.sync_view();
            render_driver::ensure_running(state);
        }
        Some(Err(e)) => {
            log::warn!("settings rejected: {e}");
            state.error.set(Some(e.to_string()));
        }
        None => {}
    }
}

fn input_value(ev: &web_sys::Event) -> Option<String> {
    let target = ev.target()?;
    if let Some(select) = target.dyn_ref::<web_sys::HtmlSelectElement>() {
        return Some(select.value());
    }
    target.dyn_ref::<web_sys::HtmlInputElement>().map(|i| i.value())
}

#[component]
pub fn SettingsPanel() -> impl IntoView {
    let state = expect_context::<AppState>();
    let current = move || state.settings.get();

    view! {
        <div class="sidebar-panel">
            <div class="setting-group">
                <div class="setting-group-title">"Display"</div>
                <div class="setting-row">
                    <span class="setting-label">{move || format!("Contrast: {}", current().contrast)}</span>
                    <input
                        type="range"
                        class="setting-range"
                        min="0"
                        max="40"
                        step="1"
                        prop:value=move || current().contrast.to_string()
                        on:change=move |ev: web_sys::Event| {
                            if let Some(contrast) = input_value(&ev).and_then(|v| v.parse().ok()) {
                                apply(state, Settings { contrast, ..state.settings.get_untracked() });
                            }
                        }
                    />
                </div>
                <div class="setting-row">
                    <span class="setting-label">"Colour map"</span>
                    <select
                        class="setting-select"
                        on:change=move |ev: web_sys::Event| {
                            if let Some(colour_map) = input_value(&ev).and_then(|v| ColourMap::from_label(&v)) {
                                apply(state, Settings { colour_map, ..state.settings.get_untracked() });
                            }
                        }
                    >
                        {ColourMap::ALL.into_iter().map(|map| view! {
                            <option value=map.label()
                                selected=move || current().colour_map == map
                            >{map.label()}</option>
                        }).collect_view()}
                    </select>
                </div>
            </div>

            <div class="setting-group">
                <div class="setting-group-title">"Analysis"</div>
                <div class="setting-row">
                    <span class="setting-label">"Zoom"</span>
                    <select
                        class="setting-select"
                        on:change=move |ev: web_sys::Event| {
                            if let Some(zoom) = input_value(&ev).and_then(|v| v.parse().ok()) {
                                apply(state, Settings { zoom, ..state.settings.get_untracked() });
                            }
                        }
                    >
                        {[25u32, 50, 100, 200, 400, 800].into_iter().map(|zoom| view! {
                            <option value=zoom.to_string()
                                selected=move || current().zoom == zoom
                            >{format!("{zoom}%")}</option>
                        }).collect_view()}
                    </select>
                </div>
                <div class="setting-row">
                    <span class="setting-label">"FFT size"</span>
                    <select
                        class="setting-select"
                        on:change=move |ev: web_sys::Event| {
                            if let Some(nfft) = input_value(&ev).and_then(|v| v.parse().ok()) {
                                apply(state, Settings { nfft, ..state.settings.get_untracked() });
                            }
                        }
                    >
                        {[128usize, 256, 512, 1024, 2048].into_iter().map(|nfft| view! {
                            <option value=nfft.to_string()
                                selected=move || current().nfft == nfft
                            >{nfft.to_string()}</option>
                        }).collect_view()}
                    </select>
                </div>
                <div class="setting-row">
                    <span class="setting-label">"Channel"</span>
                    <input
                        type="number"
                        class="setting-number"
                        min="0"
                        max="7"
                        prop:value=move || current().channel.to_string()
                        on:change=move |ev: web_sys::Event| {
                            if let Some(channel) = input_value(&ev).and_then(|v| v.parse().ok()) {
                                apply(state, Settings { channel, ..state.settings.get_untracked() });
                            }
                        }
                    />
                </div>
            </div>

            <div class="setting-group">
                <div class="setting-group-title">"Playback"</div>
                <div class="setting-row">
                    <span class="setting-label">"Follow cursor"</span>
                    <input
                        type="checkbox"
                        class="setting-checkbox"
                        prop:checked=move || current().auto_scroll
                        on:change=move |ev: web_sys::Event| {
                            let Some(target) = ev.target() else { return };
                            let input: web_sys::HtmlInputElement = target.unchecked_into();
                            apply(state, Settings { auto_scroll: input.checked(), ..state.settings.get_untracked() });
                        }
                    />
                </div>
            </div>
        </div>
    }
}
