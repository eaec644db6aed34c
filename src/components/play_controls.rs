use leptos::prelude::*;
use sonoscope_core::PlaybackPhase;
use wasm_bindgen::JsCast;
use crate::audio::playback;
use crate::state::AppState;

#[component]
pub fn PlayControls() -> impl IntoView {
    let state = expect_context::<AppState>();
    let has_file = move || state.loaded.get().is_some();

    view! {
        <div class="play-controls"
            on:click=|ev: web_sys::MouseEvent| ev.stop_propagation()
        >
            {move || if !has_file() {
                view! { <span></span> }.into_any()
            } else {
                match state.playback_phase.get() {
                    PlaybackPhase::Idle => view! {
                        <button class="layer-btn" on:click=move |_| playback::play_from_start(state)
                            title="Play from start of file"
                        >"Play start"</button>
                        <button class="layer-btn" on:click=move |_| playback::play_from_here(state)
                            title="Play from current position"
                        >"Play here"</button>
                    }.into_any(),
                    PlaybackPhase::Playing => view! {
                        <button class="layer-btn" on:click=move |_| playback::pause(state)>"Pause"</button>
                        <button class="layer-btn" on:click=move |_| playback::stop(state)>"Stop"</button>
                    }.into_any(),
                    PlaybackPhase::Paused => view! {
                        <button class="layer-btn" on:click=move |_| playback::resume(state)>"Resume"</button>
                        <button class="layer-btn" on:click=move |_| playback::stop(state)>"Stop"</button>
                    }.into_any(),
                }
            }}

            <select
                class="setting-select"
                title="Playback speed"
                prop:disabled=move || state.playback_phase.get() != PlaybackPhase::Idle
                on:change=move |ev: web_sys::Event| {
                    let Some(target) = ev.target() else { return };
                    let select: web_sys::HtmlSelectElement = target.unchecked_into();
                    if let Ok(v) = select.value().parse::<f64>() {
                        state.playback_speed.set(v);
                    }
                }
            >
                {[10.0, 25.0, 50.0, 100.0, 200.0].into_iter().map(|speed| view! {
                    <option value=speed.to_string()
                        selected=move || state.playback_speed.get() == speed
                    >{format!("{speed}%")}</option>
                }).collect_view()}
            </select>
        </div>
    }
}
