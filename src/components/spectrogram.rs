use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};
use crate::canvas::render_driver;
use crate::canvas::tile_painter::{Overlay, Span};
use crate::state::AppState;

#[component]
pub fn Spectrogram() -> impl IntoView {
    let state = expect_context::<AppState>();
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    // Selection being dragged, in content pixels
    let brush: RwSignal<Option<(f64, f64)>> = RwSignal::new(None);

    Effect::new(move || {
        state.tile_ready_signal.track();
        let scroll = state.scroll_px.get();
        let indicator = state.indicator_px.get();
        let osc_h = state.settings.with(|s| s.spect_height) as f64;
        let selection = brush.get();

        let Some(canvas_el) = canvas_ref.get() else { return };
        let canvas: &HtmlCanvasElement = canvas_el.as_ref();

        // Sync canvas internal resolution with display size
        let rect = canvas.get_bounding_client_rect();
        let display_w = rect.width().floor();
        let display_h = rect.height().floor();
        if display_w <= 0.0 || display_h <= 0.0 {
            return;
        }
        if canvas.width() != display_w as u32 || canvas.height() != display_h as u32 {
            canvas.set_width(display_w as u32);
            canvas.set_height(display_h as u32);
        }
        if state.viewport_px.get_untracked() != display_w {
            state.viewport_px.set(display_w);
            state.with_render(|v, c| v.set_viewport(display_w, c));
            render_driver::ensure_running(state);
        }

        let ctx = match canvas.get_context("2d") {
            Ok(Some(obj)) => match obj.dyn_into::<CanvasRenderingContext2d>() {
                Ok(ctx) => ctx,
                Err(_) => return,
            },
            _ => {
                log::error!("No 2d context for spectrogram canvas");
                return;
            }
        };

        let segments: Vec<Span> = state.visualizer.with_value(|v| {
            let Some(scale) = v.time_scale() else { return Vec::new() };
            let hovered = v.hovered();
            v.segments_in_view()
                .into_iter()
                .map(|s| Span {
                    start_px: scale.ms_to_px(s.start_ms),
                    end_px: scale.ms_to_px(s.end_ms),
                    highlighted: hovered == Some(s.id),
                })
                .collect()
        });

        let overlay = Overlay {
            scroll_px: scroll,
            oscillogram_height: osc_h,
            segments: &segments,
            brush: selection,
            indicator_px: indicator,
        };
        state.canvas.with_value(|sink| sink.blit(&ctx, display_w, display_h, &overlay));
    });

    let scroll_to = move |px: f64| {
        state.with_render(|v, c| v.set_scroll(px, c));
        state.sync_view();
        render_driver::ensure_running(state);
    };

    let on_wheel = move |ev: web_sys::WheelEvent| {
        ev.prevent_default();
        let delta = if ev.delta_x().abs() > ev.delta_y().abs() { ev.delta_x() } else { ev.delta_y() };
        scroll_to(state.scroll_px.get_untracked() + delta);
    };

    let content_px = move |ev: &web_sys::PointerEvent| ev.offset_x() as f64 + state.scroll_px.get_untracked();

    let on_pointer_down = move |ev: web_sys::PointerEvent| {
        if ev.button() != 0 {
            return;
        }
        let px = content_px(&ev);
        state.visualizer.update_value(|v| v.brush_begin(px));
        brush.set(Some((px, px)));
    };

    let on_pointer_move = move |ev: web_sys::PointerEvent| {
        let px = content_px(&ev);
        if brush.get_untracked().is_some() {
            let extent = state.visualizer.try_update_value(|v| {
                v.brush_drag(px);
                v.brush_extent()
            });
            brush.set(extent.flatten());
        } else {
            let changed = state.visualizer.try_update_value(|v| {
                let before = v.hovered();
                v.hover(Some(px));
                before != v.hovered()
            });
            if changed == Some(true) {
                state.tile_ready_signal.update(|n| *n = n.wrapping_add(1));
            }
        }
    };

    let on_pointer_up = move |_: web_sys::PointerEvent| {
        if brush.get_untracked().is_none() {
            return;
        }
        let target = state.visualizer.with_value(|v| v.hovered());
        state.visualizer.update_value(|v| {
            v.brush_end(target);
        });
        brush.set(None);
    };

    let on_pointer_leave = move |_: web_sys::PointerEvent| {
        state.visualizer.update_value(|v| v.hover(None));
        state.tile_ready_signal.update(|n| *n = n.wrapping_add(1));
    };

    view! {
        <div class="spectrogram-container">
            <canvas
                node_ref=canvas_ref
                on:wheel=on_wheel
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=on_pointer_up
                on:pointerleave=on_pointer_leave
            />
        </div>
    }
}
