use egui::{Pos2, Vec2};

use crate::transform::ViewTransform;

/// Smallest crop rectangle the resize handles allow.
pub const MIN_CROP_SIZE: f32 = 50.0;
/// Handle hit-test proximity, in viewport pixels (constant on screen, so
/// grabbing an edge feels the same at every zoom level).
pub const HANDLE_HIT_THRESHOLD: f32 = 10.0;

// ============================================================================
// CROP GEOMETRY
// ============================================================================
//
// The crop rectangle lives in world space: panning the content (the hand
// tool moves `layers_offset`) slides the screenshot underneath it without
// moving the frame, while zoom/viewport pan move its on-screen projection
// together with everything else. Hit-testing therefore projects the
// rectangle through the shared view transform and compares in viewport
// pixels, and resize drags convert screen deltas back into world units.

/// Axis-aligned crop rectangle in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Which crop edge a resize drag grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    Left,
    Right,
    Top,
    Bottom,
}

/// Rectangle captured at drag start; resize deltas are applied against it.
#[derive(Clone, Copy, Debug)]
struct ResizeDrag {
    handle: ResizeHandle,
    start_rect: CropRect,
}

pub struct CropState {
    pub rect: CropRect,
    /// When false, no crop frame is drawn and export covers the whole view.
    pub active: bool,
    drag: Option<ResizeDrag>,
}

impl CropState {
    pub fn new(rect: CropRect) -> Self {
        Self {
            rect,
            active: true,
            drag: None,
        }
    }

    /// Find the crop edge (if any) near a viewport-space point. Projects the
    /// rectangle's corners through the view transform and compares distances
    /// in viewport pixels; the nearest edge within the threshold wins.
    pub fn hit_test_handle(&self, p: Pos2, view: &ViewTransform) -> Option<ResizeHandle> {
        if !self.active {
            return None;
        }
        let min = view.world_to_canvas(Pos2::new(self.rect.x, self.rect.y));
        let max = view.world_to_canvas(Pos2::new(
            self.rect.x + self.rect.width,
            self.rect.y + self.rect.height,
        ));

        let within_y = p.y >= min.y - HANDLE_HIT_THRESHOLD && p.y <= max.y + HANDLE_HIT_THRESHOLD;
        let within_x = p.x >= min.x - HANDLE_HIT_THRESHOLD && p.x <= max.x + HANDLE_HIT_THRESHOLD;

        let mut best: Option<(f32, ResizeHandle)> = None;
        let mut consider = |dist: f32, handle: ResizeHandle| {
            if dist <= HANDLE_HIT_THRESHOLD && best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, handle));
            }
        };
        if within_y {
            consider((p.x - min.x).abs(), ResizeHandle::Left);
            consider((p.x - max.x).abs(), ResizeHandle::Right);
        }
        if within_x {
            consider((p.y - min.y).abs(), ResizeHandle::Top);
            consider((p.y - max.y).abs(), ResizeHandle::Bottom);
        }
        best.map(|(_, h)| h)
    }

    pub fn begin_resize(&mut self, handle: ResizeHandle) {
        self.drag = Some(ResizeDrag {
            handle,
            start_rect: self.rect,
        });
    }

    pub fn is_resizing(&self) -> bool {
        self.drag.is_some()
    }

    /// Apply the cumulative pointer delta (screen pixels since drag start) to
    /// the dragged edge. The delta is converted into world units so resizing
    /// moves the rectangle by the same world amount at any zoom level.
    /// Width and height clamp at [`MIN_CROP_SIZE`]; the clamp adjusts the
    /// dragged edge, never the opposite one.
    pub fn update_resize(&mut self, screen_delta: Vec2, view: &ViewTransform) {
        let Some(drag) = self.drag else { return };
        let d = view.screen_delta_to_world(screen_delta);
        let start = drag.start_rect;
        let mut rect = start;
        match drag.handle {
            ResizeHandle::Left => {
                rect.width = (start.width - d.x).max(MIN_CROP_SIZE);
                rect.x = start.x + start.width - rect.width;
            }
            ResizeHandle::Right => {
                rect.width = (start.width + d.x).max(MIN_CROP_SIZE);
            }
            ResizeHandle::Top => {
                rect.height = (start.height - d.y).max(MIN_CROP_SIZE);
                rect.y = start.y + start.height - rect.height;
            }
            ResizeHandle::Bottom => {
                rect.height = (start.height + d.y).max(MIN_CROP_SIZE);
            }
        }
        self.rect = rect;
    }

    pub fn end_resize(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(zoom: f32) -> ViewTransform {
        let mut v = ViewTransform::new(Vec2::new(800.0, 600.0));
        v.set_zoom(zoom);
        v
    }

    #[test]
    fn resize_clamps_to_minimum() {
        let mut crop = CropState::new(CropRect::new(100.0, 100.0, 50.0, 50.0));
        let v = view(1.0);
        crop.begin_resize(ResizeHandle::Right);
        crop.update_resize(Vec2::new(-200.0, 0.0), &v);
        assert_eq!(crop.rect.width, MIN_CROP_SIZE);
        crop.end_resize();

        crop.begin_resize(ResizeHandle::Left);
        crop.update_resize(Vec2::new(500.0, 0.0), &v);
        assert_eq!(crop.rect.width, MIN_CROP_SIZE);
        // The right edge stays put when the left-edge drag hits the clamp.
        assert_eq!(crop.rect.x + crop.rect.width, 150.0);
        crop.end_resize();

        crop.begin_resize(ResizeHandle::Bottom);
        crop.update_resize(Vec2::new(0.0, -300.0), &v);
        assert_eq!(crop.rect.height, MIN_CROP_SIZE);
    }

    #[test]
    fn left_drag_moves_edge_and_preserves_right() {
        let mut crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        let v = view(1.0);
        crop.begin_resize(ResizeHandle::Left);
        crop.update_resize(Vec2::new(20.0, 0.0), &v);
        assert_eq!(crop.rect.x, 320.0);
        assert_eq!(crop.rect.width, 180.0);
        assert_eq!(crop.rect.x + crop.rect.width, 500.0);
    }

    #[test]
    fn resize_delta_scales_with_zoom() {
        let mut crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        let v = view(2.0);
        crop.begin_resize(ResizeHandle::Right);
        // 1 screen px at 2× zoom is half a world unit.
        crop.update_resize(Vec2::new(1.0, 0.0), &v);
        assert!((crop.rect.width - 200.5).abs() < 1e-4);
    }

    #[test]
    fn hit_test_tracks_the_projected_edge() {
        // Crop centered in an 800×600 viewport; at zoom 2 the left edge
        // (world x = 300) projects to viewport x = 200.
        let crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        let probe = Pos2::new(200.0, 300.0);
        assert_eq!(crop.hit_test_handle(probe, &view(2.0)), Some(ResizeHandle::Left));
        assert_eq!(crop.hit_test_handle(probe, &view(1.0)), None);
    }

    #[test]
    fn hit_test_prefers_the_nearest_edge() {
        let crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        let v = view(1.0);
        // 3 px outside the right edge, well inside vertically.
        assert_eq!(
            crop.hit_test_handle(Pos2::new(503.0, 300.0), &v),
            Some(ResizeHandle::Right)
        );
        // Near the top edge, horizontally mid-rect.
        assert_eq!(
            crop.hit_test_handle(Pos2::new(400.0, 227.0), &v),
            Some(ResizeHandle::Top)
        );
        // Dead center: no handle.
        assert_eq!(crop.hit_test_handle(Pos2::new(400.0, 300.0), &v), None);
    }

    #[test]
    fn inactive_crop_never_hit_tests() {
        let mut crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        crop.active = false;
        assert_eq!(crop.hit_test_handle(Pos2::new(300.0, 300.0), &view(1.0)), None);
    }

    #[test]
    fn update_without_begin_is_a_no_op() {
        let mut crop = CropState::new(CropRect::new(300.0, 225.0, 200.0, 150.0));
        let before = crop.rect;
        crop.update_resize(Vec2::new(40.0, 40.0), &view(1.0));
        assert_eq!(crop.rect, before);
    }
}
