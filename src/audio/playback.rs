use std::cell::{Cell, RefCell};
use leptos::prelude::*;
use sonoscope_core::SampleBuffer;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AudioBufferSourceNode, AudioContext, AudioScheduledSourceNode};
use crate::canvas::render_driver;
use crate::state::AppState;

thread_local! {
    static AUDIO_CTX: RefCell<Option<AudioContext>> = RefCell::new(None);
    static SOURCE: RefCell<Option<AudioBufferSourceNode>> = RefCell::new(None);
    static ON_ENDED: RefCell<Option<Closure<dyn FnMut()>>> = RefCell::new(None);
    static FRAME_LOOP: RefCell<Option<Closure<dyn FnMut(f64)>>> = RefCell::new(None);
    static FRAME_ID: Cell<Option<i32>> = Cell::new(None);
}

/// Wall clock shared by the audio engine and the indicator.
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Play `[begin_ms, end_ms)` at the current speed.
pub fn play(state: AppState, begin_ms: f64, end_ms: f64) {
    stop_audio();
    let speed = state.playback_speed.get_untracked();
    let now = now_ms();
    match state.with_render(|v, c| v.play(begin_ms, end_ms, speed, now, c)) {
        Some(Ok(started)) => log::debug!("playing, transit {:.0} ms", started.transit_ms),
        Some(Err(e)) => {
            log::warn!("Cannot play: {e}");
            return;
        }
        None => return,
    }
    start_current(state);
}

pub fn play_from_start(state: AppState) {
    play(state, 0.0, f64::INFINITY);
}

/// Play from the left edge of the viewport to the end.
pub fn play_from_here(state: AppState) {
    let begin = state.visualizer.with_value(|v| {
        v.time_scale().map_or(0.0, |s| s.px_to_ms(v.scroll_px()))
    });
    play(state, begin, f64::INFINITY);
}

pub fn pause(state: AppState) {
    let now = now_ms();
    let paused = state.visualizer.try_update_value(|v| v.pause(now)).flatten();
    stop_audio();
    if let Some(played) = paused {
        log::debug!("paused after {played:.0} ms");
    }
}

pub fn resume(state: AppState) {
    let now = now_ms();
    match state.with_render(|v, c| v.resume(now, None, c)) {
        Some(Ok(_)) => start_current(state),
        Some(Err(e)) => log::warn!("Cannot resume: {e}"),
        None => {}
    }
}

pub fn stop(state: AppState) {
    stop_audio();
    state.with_render(|v, c| v.stop(c));
    state.indicator_px.set(None);
    state.sync_view();
    render_driver::ensure_running(state);
}

/// Stop any sound without touching the synchroniser.
pub fn stop_audio() {
    if let Some(id) = FRAME_ID.with(|f| f.take()) {
        if let Some(w) = web_sys::window() {
            let _ = w.cancel_animation_frame(id);
        }
    }
    SOURCE.with(|s| {
        if let Some(source) = s.borrow_mut().take() {
            let node: &AudioScheduledSourceNode = &source;
            node.set_onended(None);
            let _ = node.stop();
        }
    });
}

fn fail(state: AppState, reason: &str) {
    stop_audio();
    state.visualizer.update_value(|v| v.playback_failed(reason));
    state.indicator_px.set(None);
}

/// Start audio for whatever interval the synchroniser is now playing.
fn start_current(state: AppState) {
    let job = state.visualizer.with_value(|v| {
        let run = v.playback_state().copied()?;
        Some((v.samples()?.clone(), run))
    });
    let Some((samples, run)) = job else { return };

    if let Err(e) = start_source(state, &samples, run.begin_ms, run.end_ms, run.playback_speed_percent) {
        fail(state, &format!("{e:?}"));
        return;
    }
    state.sync_view();
    render_driver::ensure_running(state);
    start_frame_loop(state);
}

fn audio_context() -> Result<AudioContext, JsValue> {
    AUDIO_CTX.with(|c| {
        let mut slot = c.borrow_mut();
        if let Some(ctx) = slot.as_ref() {
            return Ok(ctx.clone());
        }
        let ctx = AudioContext::new()?;
        *slot = Some(ctx.clone());
        Ok(ctx)
    })
}

fn start_source(
    state: AppState,
    samples: &SampleBuffer,
    begin_ms: f64,
    end_ms: f64,
    speed_percent: f64,
) -> Result<(), JsValue> {
    let rate = samples.sample_rate as f64;
    let len = samples.len();
    let start = ((begin_ms * rate / 1000.0) as usize).min(len);
    let end = ((end_ms * rate / 1000.0).ceil() as usize).min(len);
    if end <= start {
        return Err(JsValue::from_str("empty playback interval"));
    }

    let ctx = audio_context()?;
    let _ = ctx.resume()?;
    let buffer = ctx.create_buffer(1, (end - start) as u32, samples.sample_rate as f32)?;
    buffer.copy_to_channel(&samples.samples[start..end], 0)?;

    let source = ctx.create_buffer_source()?;
    source.set_buffer(Some(&buffer));
    source.playback_rate().set_value((speed_percent / 100.0) as f32);
    source.connect_with_audio_node(&ctx.destination())?;

    let on_ended = Closure::<dyn FnMut()>::new(move || on_source_ended(state));
    let node: &AudioScheduledSourceNode = &source;
    node.set_onended(Some(on_ended.as_ref().unchecked_ref()));
    node.start()?;

    SOURCE.with(|s| *s.borrow_mut() = Some(source));
    // Replaced only from outside the callback, never while it runs.
    ON_ENDED.with(|h| *h.borrow_mut() = Some(on_ended));
    Ok(())
}

fn on_source_ended(state: AppState) {
    SOURCE.with(|s| s.borrow_mut().take());
    state.visualizer.update_value(|v| v.playback_ended());
    if let Some(id) = FRAME_ID.with(|f| f.take()) {
        if let Some(w) = web_sys::window() {
            let _ = w.cancel_animation_frame(id);
        }
    }
    state.indicator_px.set(None);
}

fn start_frame_loop(state: AppState) {
    let tick = Closure::<dyn FnMut(f64)>::new(move |_: f64| {
        FRAME_ID.with(|f| f.set(None));
        let now = now_ms();
        let Some(frame) = state.with_render(|v, c| v.tick(now, c)).flatten() else {
            state.indicator_px.set(None);
            return;
        };
        state.indicator_px.set(if frame.finished { None } else { frame.position_px });
        if frame.scroll_px.is_some() {
            state.sync_view();
            render_driver::ensure_running(state);
        }
        if frame.finished {
            SOURCE.with(|s| s.borrow_mut().take());
            return;
        }
        request_frame();
    });
    FRAME_LOOP.with(|f| *f.borrow_mut() = Some(tick));
    request_frame();
}

fn request_frame() {
    let Some(window) = web_sys::window() else { return };
    FRAME_LOOP.with(|f| {
        if let Some(cb) = f.borrow().as_ref() {
            match window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                Ok(id) => FRAME_ID.with(|slot| slot.set(Some(id))),
                Err(e) => log::error!("requestAnimationFrame failed: {e:?}"),
            }
        }
    });
}
