//! Drains the visualizer's render queue one step per browser turn.

use leptos::prelude::*;
use sonoscope_core::StepOutcome;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use crate::state::AppState;

/// Start the driver unless it is already running. Call after anything
/// that may have queued render work.
pub fn ensure_running(state: AppState) {
    if state.render_driver_active.get_untracked() {
        return;
    }
    state.render_driver_active.set(true);

    spawn_local(async move {
        loop {
            yield_to_browser().await;
            match state.with_render(|v, c| v.step(c)) {
                None | Some(StepOutcome::Idle) => break,
                Some(StepOutcome::Painted { .. }) | Some(StepOutcome::Failed { .. }) => {
                    state.tile_ready_signal.update(|n| *n = n.wrapping_add(1));
                }
                Some(_) => {}
            }
        }
        state.render_driver_active.set(false);
    });
}

async fn yield_to_browser() {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let Some(win) = web_sys::window() else {
            let _ = resolve.call0(&JsValue::NULL);
            return;
        };
        let cb = Closure::once_into_js(move || {
            let _ = resolve.call0(&JsValue::NULL);
        });
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), 0);
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
