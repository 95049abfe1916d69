use egui::{Pos2, Vec2};

/// Zoom limits for the editor view.
pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 4.0;

// ============================================================================
// VIEW TRANSFORM — the single source of truth for space conversions
// ============================================================================
//
// Three spaces are in play:
//
//   screen   — window pixels where pointer events arrive (the canvas widget
//              may display the viewport texture scaled)
//   viewport — pixels of the viewport surface the compositor draws into
//   world    — viewport pixels before the user's zoom/pan is applied
//
// Content space (pixels of the full-screenshot surfaces) is world space
// shifted by the layer offset; see `world_to_content` / `content_to_world`.
//
// Every consumer (drawing, crop hit-testing, mask rendering, export) must go
// through this struct. Re-deriving the map inline at call sites is how the
// crop border and the drawable region end up visibly disagreeing.

/// Compound affine view transform: zoom anchored at the visual center, plus
/// viewport pan.
///
/// Forward map (world → viewport), with `vc = viewport_center + offset`:
///
/// ```text
/// T(p) = offset + vc + zoom · (p − vc)
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    /// Zoom factor, kept within [`MIN_ZOOM`, `MAX_ZOOM`].
    pub zoom: f32,
    /// User pan of the view, in viewport pixels.
    pub viewport_offset: Vec2,
    /// Size of the viewport surface, in viewport pixels.
    pub viewport_size: Vec2,
    /// Displayed pixels per viewport-surface pixel (1.0 when the viewport
    /// texture is shown unscaled).
    pub display_scale: f32,
}

impl ViewTransform {
    pub fn new(viewport_size: Vec2) -> Self {
        Self {
            zoom: 1.0,
            viewport_offset: Vec2::ZERO,
            viewport_size,
            display_scale: 1.0,
        }
    }

    /// Set the zoom factor, clamped to the supported range.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// The point zoom scaling is anchored around: the viewport center
    /// adjusted by the current pan.
    pub fn visual_center(&self) -> Pos2 {
        (self.viewport_size * 0.5 + self.viewport_offset).to_pos2()
    }

    /// World → viewport pixels.
    pub fn world_to_canvas(&self, p: Pos2) -> Pos2 {
        let vc = self.visual_center();
        vc + self.viewport_offset + (p - vc) * self.zoom
    }

    /// Viewport → world pixels. Exact inverse of [`world_to_canvas`].
    ///
    /// [`world_to_canvas`]: ViewTransform::world_to_canvas
    pub fn canvas_to_world(&self, p: Pos2) -> Pos2 {
        let vc = self.visual_center();
        vc + (p - vc - self.viewport_offset) / self.zoom
    }

    /// Screen (displayed) pixels → viewport-surface pixels, relative to the
    /// top-left of the displayed canvas.
    pub fn screen_to_viewport(&self, p: Pos2) -> Pos2 {
        Pos2::new(p.x / self.display_scale, p.y / self.display_scale)
    }

    /// Convert a pointer drag delta in screen pixels into world units.
    ///
    /// Drags that manipulate world-space geometry (crop resize, content pan)
    /// must feel the same at every zoom level: a 1 px screen drag at 2× zoom
    /// moves the geometry by half a world unit.
    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        delta / (self.display_scale * self.zoom)
    }

    /// Screen delta → viewport delta (pan of the view itself, pre-zoom).
    pub fn screen_delta_to_viewport(&self, delta: Vec2) -> Vec2 {
        delta / self.display_scale
    }
}

/// World space → content space (pixels of the full-screenshot surfaces).
pub fn world_to_content(world: Pos2, layers_offset: Vec2) -> Pos2 {
    world - layers_offset
}

/// Content space → world space.
pub fn content_to_world(content: Pos2, layers_offset: Vec2) -> Pos2 {
    content + layers_offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Pos2, b: Pos2) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn round_trip_across_zoom_and_pan() {
        let points = [
            Pos2::new(0.0, 0.0),
            Pos2::new(123.5, 456.25),
            Pos2::new(-50.0, 800.0),
            Pos2::new(1000.0, -3.0),
        ];
        for &zoom in &[0.25, 0.5, 1.0, 1.7, 2.0, 4.0] {
            for &(ox, oy) in &[(0.0, 0.0), (40.0, -25.0), (-300.0, 120.5)] {
                let mut t = ViewTransform::new(Vec2::new(800.0, 600.0));
                t.set_zoom(zoom);
                t.viewport_offset = Vec2::new(ox, oy);
                for &p in &points {
                    let back = t.canvas_to_world(t.world_to_canvas(p));
                    assert!(
                        approx(back, p),
                        "round trip failed at zoom {zoom} offset ({ox},{oy}): {p:?} -> {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn identity_at_default_view() {
        let t = ViewTransform::new(Vec2::new(640.0, 480.0));
        let p = Pos2::new(99.0, 17.0);
        assert!(approx(t.world_to_canvas(p), p));
        assert!(approx(t.canvas_to_world(p), p));
    }

    #[test]
    fn zoom_anchors_at_visual_center() {
        let mut t = ViewTransform::new(Vec2::new(800.0, 600.0));
        t.set_zoom(2.0);
        // The visual center must map onto itself shifted only by the pan.
        let vc = t.visual_center();
        assert!(approx(t.world_to_canvas(vc), vc + t.viewport_offset));

        t.viewport_offset = Vec2::new(30.0, -10.0);
        let vc = t.visual_center();
        assert!(approx(t.world_to_canvas(vc), vc + t.viewport_offset));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut t = ViewTransform::new(Vec2::new(800.0, 600.0));
        t.set_zoom(10.0);
        assert_eq!(t.zoom, MAX_ZOOM);
        t.set_zoom(0.01);
        assert_eq!(t.zoom, MIN_ZOOM);
    }

    #[test]
    fn screen_to_viewport_respects_display_scale() {
        let mut t = ViewTransform::new(Vec2::new(800.0, 600.0));
        t.display_scale = 2.0; // viewport displayed at twice its surface size
        let vp = t.screen_to_viewport(Pos2::new(100.0, 50.0));
        assert!(approx(vp, Pos2::new(50.0, 25.0)));
    }

    #[test]
    fn screen_delta_divides_by_scale_and_zoom() {
        let mut t = ViewTransform::new(Vec2::new(800.0, 600.0));
        t.set_zoom(2.0);
        t.display_scale = 1.0;
        let d = t.screen_delta_to_world(Vec2::new(1.0, 4.0));
        assert!((d.x - 0.5).abs() < 1e-6);
        assert!((d.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn content_conversion_is_offset_subtraction() {
        let off = Vec2::new(200.0, 125.0);
        let w = Pos2::new(300.0, 225.0);
        let c = world_to_content(w, off);
        assert!(approx(c, Pos2::new(100.0, 100.0)));
        assert!(approx(content_to_world(c, off), w));
    }
}
