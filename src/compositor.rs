use egui::{Pos2, Rect};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::crop::CropState;
use crate::layers::{LayerStack, SurfaceRole};
use crate::transform::ViewTransform;

/// Composite-time opacity of the highlighter layer. Strokes are stored
/// opaque, so overlapping strokes darken through the multiply blend instead
/// of compounding alpha.
pub const HIGHLIGHTER_ALPHA: f32 = 0.4;

/// Viewport backdrop behind the layers.
const BACKDROP: Rgba<u8> = Rgba([40, 40, 40, 255]);
/// Mask dimming drawn over everything outside the crop rectangle.
const MASK_DIM: Rgba<u8> = Rgba([0, 0, 0, 120]);
/// Crop frame border color and thickness (viewport pixels).
const BORDER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER_WIDTH: i32 = 2;

// ============================================================================
// BLENDING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
}

/// Source-over blend of `top` onto `base` with an extra opacity factor.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend.
    if top[3] == 0 {
        return base;
    }
    // Fast path: Normal blend, full opacity, opaque top — overwrite.
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;
    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;
    Rgba([
        (out_r * 255.0).clamp(0.0, 255.0) as u8,
        (out_g * 255.0).clamp(0.0, 255.0) as u8,
        (out_b * 255.0).clamp(0.0, 255.0) as u8,
        (out_a * 255.0).clamp(0.0, 255.0) as u8,
    ])
}

/// Flatten the three layers at one content-space pixel onto `base`.
#[inline]
fn flatten_content_pixel(layers: &LayerStack, x: u32, y: u32, base: Rgba<u8>) -> Rgba<u8> {
    let mut px = blend_pixel(base, *layers.background().get_pixel(x, y), BlendMode::Normal, 1.0);
    px = blend_pixel(
        px,
        *layers.surface(SurfaceRole::Highlighter).get_pixel(x, y),
        BlendMode::Multiply,
        HIGHLIGHTER_ALPHA,
    );
    blend_pixel(px, *layers.surface(SurfaceRole::Edit).get_pixel(x, y), BlendMode::Normal, 1.0)
}

// ============================================================================
// FRAME RENDERING
// ============================================================================

/// Repaint the viewport: clear, then background → highlighter (0.4 multiply)
/// → edit, all offset by `layers_offset` and mapped through the view
/// transform, then the mask dimming and crop border in viewport space.
///
/// Pure function of the current state — callers repaint explicitly after
/// mutating (no auto-redraw), which is what lets shape preview restore and
/// redraw surfaces without flicker.
pub fn render_frame(layers: &LayerStack, view: &ViewTransform, crop: &CropState) -> RgbaImage {
    let w = view.viewport_size.x.round().max(1.0) as u32;
    let h = view.viewport_size.y.round().max(1.0) as u32;
    let offset = layers.layers_offset;
    let content_w = layers.width();
    let content_h = layers.height();

    let mut buf = vec![0u8; (w as usize) * (h as usize) * 4];
    buf.par_chunks_mut(w as usize * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w as usize {
            // Inverse-map the viewport pixel center into content space.
            let vp = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
            let world = view.canvas_to_world(vp);
            let cx = world.x - offset.x;
            let cy = world.y - offset.y;

            let px = if cx >= 0.0 && cy >= 0.0 && (cx as u32) < content_w && (cy as u32) < content_h
            {
                flatten_content_pixel(layers, cx as u32, cy as u32, BACKDROP)
            } else {
                BACKDROP
            };
            row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
        }
    });
    let mut frame = RgbaImage::from_raw(w, h, buf)
        .unwrap_or_else(|| RgbaImage::from_pixel(w, h, BACKDROP));

    if crop.active {
        draw_crop_mask(&mut frame, crop, view);
    }
    frame
}

/// Viewport-space projection of the crop rectangle.
pub fn crop_screen_rect(crop: &CropState, view: &ViewTransform) -> Rect {
    let min = view.world_to_canvas(Pos2::new(crop.rect.x, crop.rect.y));
    let max = view.world_to_canvas(Pos2::new(
        crop.rect.x + crop.rect.width,
        crop.rect.y + crop.rect.height,
    ));
    Rect::from_min_max(min, max)
}

/// Dim the four rectangles around the crop frame, then stroke its border.
/// Both are drawn in viewport space from the transformed crop corners so the
/// frame always hugs the same screenshot area the export will cover.
fn draw_crop_mask(frame: &mut RgbaImage, crop: &CropState, view: &ViewTransform) {
    let w = frame.width() as i32;
    let h = frame.height() as i32;
    let r = crop_screen_rect(crop, view);
    let left = r.min.x.round() as i32;
    let top = r.min.y.round() as i32;
    let right = r.max.x.round() as i32;
    let bottom = r.max.y.round() as i32;

    let mut dim_rect = |x0: i32, y0: i32, x1: i32, y1: i32| {
        let x0 = x0.clamp(0, w);
        let x1 = x1.clamp(0, w);
        let y0 = y0.clamp(0, h);
        let y1 = y1.clamp(0, h);
        for y in y0..y1 {
            for x in x0..x1 {
                let p = frame.get_pixel(x as u32, y as u32);
                let dimmed = blend_pixel(*p, MASK_DIM, BlendMode::Normal, 1.0);
                frame.put_pixel(x as u32, y as u32, dimmed);
            }
        }
    };
    dim_rect(0, 0, w, top); // above
    dim_rect(0, bottom, w, h); // below
    dim_rect(0, top, left, bottom); // left
    dim_rect(right, top, w, bottom); // right

    // Border straddles the crop edge.
    let stroke = |frame: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32| {
        let x0 = x0.clamp(0, w);
        let x1 = x1.clamp(0, w);
        let y0 = y0.clamp(0, h);
        let y1 = y1.clamp(0, h);
        for y in y0..y1 {
            for x in x0..x1 {
                frame.put_pixel(x as u32, y as u32, BORDER);
            }
        }
    };
    let b = BORDER_WIDTH;
    stroke(frame, left - b, top - b, right + b, top); // top
    stroke(frame, left - b, bottom, right + b, bottom + b); // bottom
    stroke(frame, left - b, top, left, bottom); // left
    stroke(frame, right, top, right + b, bottom); // right
}

// ============================================================================
// EXPORT
// ============================================================================

/// Flatten background + highlighter + edit in content space and crop to the
/// crop rectangle (mapped out of world space) when one is active. This is
/// the single hand-off point for host-side save/clipboard logic.
pub fn export_flattened(layers: &LayerStack, crop: Option<&CropState>) -> RgbaImage {
    let full_w = layers.width();
    let full_h = layers.height();

    // Crop rectangle in content space, clamped to the screenshot bounds.
    let (x0, y0, out_w, out_h) = match crop.filter(|c| c.active) {
        Some(c) => {
            let cx = c.rect.x - layers.layers_offset.x;
            let cy = c.rect.y - layers.layers_offset.y;
            let x0 = cx.round().clamp(0.0, full_w as f32) as u32;
            let y0 = cy.round().clamp(0.0, full_h as f32) as u32;
            let x1 = (cx + c.rect.width).round().clamp(0.0, full_w as f32) as u32;
            let y1 = (cy + c.rect.height).round().clamp(0.0, full_h as f32) as u32;
            if x1 <= x0 || y1 <= y0 {
                crate::log_warn!("crop rectangle lies outside the screenshot; exporting full image");
                (0, 0, full_w, full_h)
            } else {
                (x0, y0, x1 - x0, y1 - y0)
            }
        }
        None => (0, 0, full_w, full_h),
    };

    let mut buf = vec![0u8; (out_w as usize) * (out_h as usize) * 4];
    buf.par_chunks_mut(out_w as usize * 4).enumerate().for_each(|(row_idx, row)| {
        let y = y0 + row_idx as u32;
        for i in 0..out_w as usize {
            let x = x0 + i as u32;
            let px = flatten_content_pixel(layers, x, y, Rgba([0, 0, 0, 0]));
            row[i * 4..i * 4 + 4].copy_from_slice(&px.0);
        }
    });
    RgbaImage::from_raw(out_w, out_h, buf)
        .unwrap_or_else(|| RgbaImage::new(out_w.max(1), out_h.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::CropRect;
    use crate::tools::DrawingConfig;
    use egui::Vec2;

    fn white_stack(w: u32, h: u32) -> LayerStack {
        LayerStack::from_background(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn export_contains_drawn_line_and_nothing_else() {
        let mut layers = white_stack(200, 100);
        let cfg = DrawingConfig {
            color: Rgba([10, 20, 30, 255]),
            stroke_width: 3.0,
            highlighter_mode: false,
        };
        layers.draw_stroke(
            SurfaceRole::Edit,
            Pos2::new(10.0, 10.0),
            Pos2::new(110.0, 10.0),
            &cfg,
        );

        let out = export_flattened(&layers, None);
        assert_eq!(out.dimensions(), (200, 100));
        for x in [10u32, 60, 110] {
            assert_eq!(*out.get_pixel(x, 10), Rgba([10, 20, 30, 255]));
        }
        // Away from the stroke the background shows through untouched.
        assert_eq!(*out.get_pixel(60, 30), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(150, 10), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn highlighter_opacity_does_not_accumulate() {
        let cfg = DrawingConfig {
            color: Rgba([255, 240, 0, 255]),
            stroke_width: 8.0,
            highlighter_mode: true,
        };

        let mut once = white_stack(100, 60);
        once.draw_stroke(
            SurfaceRole::Highlighter,
            Pos2::new(10.0, 30.0),
            Pos2::new(90.0, 30.0),
            &cfg,
        );
        let single = *export_flattened(&once, None).get_pixel(50, 30);

        let mut twice = white_stack(100, 60);
        for _ in 0..2 {
            twice.draw_stroke(
                SurfaceRole::Highlighter,
                Pos2::new(10.0, 30.0),
                Pos2::new(90.0, 30.0),
                &cfg,
            );
        }
        let double = *export_flattened(&twice, None).get_pixel(50, 30);

        assert_eq!(single, double, "overlapping highlighter strokes compounded");
        // And the stroke actually reads as translucent: darker than paper,
        // lighter than the raw stroke color.
        assert!(single[2] < 255 && single[2] > 0);
    }

    #[test]
    fn export_crops_to_the_crop_rectangle() {
        let mut layers = white_stack(1000, 800);
        layers.layers_offset = Vec2::new(200.0, 125.0);
        let crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));

        // Crop world rect − layers_offset ⇒ content region {100,100,200,150}.
        let out = export_flattened(&layers, Some(&crop));
        assert_eq!(out.dimensions(), (200, 150));
    }

    #[test]
    fn inactive_crop_exports_full_surface() {
        let layers = white_stack(320, 240);
        let mut crop = CropState::new(CropRect::new(10.0, 10.0, 60.0, 60.0));
        crop.active = false;
        let out = export_flattened(&layers, Some(&crop));
        assert_eq!(out.dimensions(), (320, 240));
    }

    #[test]
    fn frame_dims_outside_crop_and_not_inside() {
        let layers = white_stack(800, 600);
        let mut view = ViewTransform::new(Vec2::new(800.0, 600.0));
        view.set_zoom(1.0);
        let crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));

        let frame = render_frame(&layers, &view, &crop);
        let inside = *frame.get_pixel(400, 300);
        let outside = *frame.get_pixel(100, 100);
        assert_eq!(inside, Rgba([255, 255, 255, 255]));
        assert!(outside[0] < 255, "mask did not dim outside the crop");
    }

    #[test]
    fn frame_renders_backdrop_beyond_content() {
        // Content smaller than the viewport: pixels past it show backdrop.
        let layers = white_stack(100, 100);
        let view = ViewTransform::new(Vec2::new(400.0, 300.0));
        let mut crop = CropState::new(CropRect::new(0.0, 0.0, 50.0, 50.0));
        crop.active = false;
        let frame = render_frame(&layers, &view, &crop);
        assert_eq!(*frame.get_pixel(50, 50), Rgba([255, 255, 255, 255]));
        assert_eq!(*frame.get_pixel(350, 250), Rgba([40, 40, 40, 255]));
    }

    #[test]
    fn multiply_blend_darkens() {
        let white = Rgba([255, 255, 255, 255]);
        let yellow = Rgba([255, 240, 0, 255]);
        let out = blend_pixel(white, yellow, BlendMode::Multiply, HIGHLIGHTER_ALPHA);
        assert!(out[2] < 255); // blue channel pulled down
        assert_eq!(out[3], 255);
    }
}
