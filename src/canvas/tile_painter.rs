//! Canvas-backed paint sink.
//!
//! Each painted chunk becomes its own offscreen canvas, keyed by the
//! chunk's first frame. Since one frame is one pixel column, a tile's
//! x position in content pixels is that key. `blit` composes the tiles
//! overlapping the viewport onto the visible canvas, then the
//! oscillogram strip, the segment overlay and the playback indicator.

use std::collections::BTreeMap;
use sonoscope_core::{PaintSink, SpectrogramError, Tile};
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData, Path2d};

struct PaintedChunk {
    image: HtmlCanvasElement,
    oscillogram: Option<Path2d>,
}

#[derive(Default)]
pub struct CanvasSink {
    chunks: BTreeMap<usize, PaintedChunk>,
}

/// A segment or selection span in content pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    pub start_px: f64,
    pub end_px: f64,
    pub highlighted: bool,
}

pub struct Overlay<'a> {
    pub scroll_px: f64,
    pub oscillogram_height: f64,
    pub segments: &'a [Span],
    pub brush: Option<(f64, f64)>,
    pub indicator_px: Option<f64>,
}

impl CanvasSink {
    pub fn painted_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn blit(&self, ctx: &CanvasRenderingContext2d, width: f64, height: f64, overlay: &Overlay) {
        ctx.set_fill_style_str("#000");
        ctx.fill_rect(0.0, 0.0, width, height);

        let osc_h = overlay.oscillogram_height.min(height);
        let spect_h = height - osc_h;
        let left = overlay.scroll_px;
        let right = left + width;

        // Tiles start at most one chunk before the viewport.
        for (&start, chunk) in self.chunks.range(..right.ceil() as usize) {
            let tile_w = chunk.image.width() as f64;
            if (start as f64) + tile_w < left {
                continue;
            }
            let x = start as f64 - left;
            if let Err(e) = ctx.draw_image_with_html_canvas_element_and_dw_and_dh(
                &chunk.image,
                x,
                0.0,
                tile_w,
                spect_h,
            ) {
                log::error!("Failed to draw tile at frame {start}: {e:?}");
            }

            if let Some(path) = &chunk.oscillogram {
                ctx.save();
                let _ = ctx.translate(x, spect_h);
                ctx.set_stroke_style_str("#7c7");
                ctx.set_line_width(1.0);
                ctx.stroke_with_path(path);
                ctx.restore();
            }
        }

        ctx.set_stroke_style_str("#333");
        ctx.begin_path();
        ctx.move_to(0.0, spect_h + 0.5);
        ctx.line_to(width, spect_h + 0.5);
        ctx.stroke();

        for span in overlay.segments {
            let fill = if span.highlighted { "rgba(255,200,60,0.35)" } else { "rgba(120,170,255,0.25)" };
            ctx.set_fill_style_str(fill);
            ctx.fill_rect(span.start_px - left, 0.0, span.end_px - span.start_px, height);
        }

        if let Some((a, b)) = overlay.brush {
            ctx.set_fill_style_str("rgba(255,255,255,0.2)");
            ctx.fill_rect(a - left, 0.0, b - a, height);
        }

        if let Some(px) = overlay.indicator_px {
            let x = px - left;
            if (0.0..=width).contains(&x) {
                ctx.set_stroke_style_str("#f44");
                ctx.set_line_width(1.5);
                ctx.begin_path();
                ctx.move_to(x, 0.0);
                ctx.line_to(x, height);
                ctx.stroke();
            }
        }
    }
}

impl PaintSink for CanvasSink {
    fn paint_tile(&mut self, chunk_start_frame: usize, tile: &Tile) -> sonoscope_core::Result<()> {
        let image = tile_to_canvas(tile).map_err(|e| {
            log::error!("Failed to paint tile at frame {chunk_start_frame}: {e:?}");
            SpectrogramError::Paint { frame: chunk_start_frame, reason: format!("{e:?}") }
        })?;
        let previous = self.chunks.remove(&chunk_start_frame).and_then(|c| c.oscillogram);
        self.chunks.insert(chunk_start_frame, PaintedChunk { image, oscillogram: previous });
        Ok(())
    }

    fn paint_oscillogram_segment(&mut self, chunk_start_frame: usize, path_data: &str) {
        let Some(chunk) = self.chunks.get_mut(&chunk_start_frame) else { return };
        match Path2d::new_with_path_string(path_data) {
            Ok(path) => chunk.oscillogram = Some(path),
            Err(e) => log::error!("Bad oscillogram path at frame {chunk_start_frame}: {e:?}"),
        }
    }

    fn clear_tile(&mut self, chunk_start_frame: usize) {
        self.chunks.remove(&chunk_start_frame);
    }

    fn clear_all(&mut self) {
        self.chunks.clear();
    }
}

fn tile_to_canvas(tile: &Tile) -> Result<HtmlCanvasElement, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    canvas.set_width(tile.width);
    canvas.set_height(tile.height);
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into()?;
    let image = ImageData::new_with_u8_clamped_array_and_sh(Clamped(&tile.pixels[..]), tile.width, tile.height)?;
    ctx.put_image_data(&image, 0.0, 0.0)?;
    Ok(canvas)
}
