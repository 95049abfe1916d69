use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;

use crate::compositor::{self, crop_screen_rect};
use crate::crop::{CropRect, CropState};
use crate::history::HistoryStack;
use crate::layers::{LayerStack, SurfaceRole};
use crate::tools::{DrawingConfig, ShapeKind, Tool};
use crate::transform::{world_to_content, ViewTransform};

// ============================================================================
// EDITOR CORE — the host-facing surface of the annotation engine
// ============================================================================
//
// The host (window chrome, toolbar, save/clipboard plumbing) talks to the
// core exclusively through this type: pointer events in screen pixels, tool
// and style setters, undo/redo, frame rendering and flattened export.
//
// The backing image loads asynchronously in real hosts, so pointer and tool
// traffic can arrive before `initialize` — every operation no-ops until the
// session exists instead of panicking.

/// What the current pointer drag is doing. Exactly one interaction is live
/// at a time; pointer-up (or a drag abandoned without one) resets to `Idle`.
enum PointerDrag {
    Idle,
    ResizingCrop {
        press_screen: Pos2,
    },
    PanningContent {
        last_screen: Pos2,
    },
    PanningView {
        last_screen: Pos2,
    },
    Freehand {
        role: SurfaceRole,
        last_content: Pos2,
    },
    /// Shape preview: both mutable surfaces are snapshotted at press time;
    /// every move restores them and re-renders the shape, so the preview
    /// never leaves ghost outlines behind.
    ShapePreview {
        kind: ShapeKind,
        start_content: Pos2,
        edit_snapshot: RgbaImage,
        highlighter_snapshot: RgbaImage,
        moved: bool,
    },
}

struct Session {
    layers: LayerStack,
    view: ViewTransform,
    crop: CropState,
    history: HistoryStack,
    drag: PointerDrag,
}

pub struct EditorCore {
    session: Option<Session>,
    pub tool: Tool,
    pub config: DrawingConfig,
}

impl EditorCore {
    pub fn new() -> Self {
        Self {
            session: None,
            tool: Tool::Pen,
            config: DrawingConfig::default(),
        }
    }

    /// Set up surfaces, crop frame and view for a captured screenshot.
    ///
    /// The crop rectangle takes the selected region's size and sits centered
    /// in the viewport; `layers_offset` is derived so the selected region of
    /// the screenshot lands exactly inside it at zoom 1. The extended region
    /// (a looser capture around the selection, when the host provides one)
    /// does not affect this geometry.
    pub fn initialize(
        &mut self,
        screenshot: RgbaImage,
        region: Rect,
        extended_region: Option<Rect>,
        viewport_size: Vec2,
    ) {
        let mut layers = LayerStack::from_background(screenshot);
        let view = ViewTransform::new(viewport_size);

        let crop_rect = CropRect::new(
            (viewport_size.x - region.width()) * 0.5,
            (viewport_size.y - region.height()) * 0.5,
            region.width(),
            region.height(),
        );
        layers.layers_offset = Vec2::new(crop_rect.x - region.min.x, crop_rect.y - region.min.y);

        crate::log_info!(
            "editor initialized: screenshot {}x{}, region {:?}, extended {:?}, crop at ({:.0},{:.0})",
            layers.width(),
            layers.height(),
            region,
            extended_region,
            crop_rect.x,
            crop_rect.y
        );

        let mut history = HistoryStack::new();
        history.push(&layers); // pristine baseline, so the first stroke is undoable

        self.session = Some(Session {
            layers,
            view,
            crop: CropState::new(crop_rect),
            history,
            drag: PointerDrag::Idle,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    // ---- tool & style setters ---------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        // Switching tools mid-drag would leave the old drag half-applied.
        self.finish_drag();
        self.tool = tool;
    }

    pub fn set_color(&mut self, hex: &str) {
        self.config.set_color_hex(hex);
    }

    pub fn set_stroke_size(&mut self, size: f32) {
        self.config.stroke_width = size.clamp(1.0, 64.0);
    }

    pub fn set_highlighter_mode(&mut self, on: bool) {
        self.config.highlighter_mode = on;
    }

    // ---- view control -----------------------------------------------------

    pub fn set_zoom(&mut self, zoom: f32) {
        if let Some(s) = &mut self.session {
            s.view.set_zoom(zoom);
        }
    }

    pub fn zoom(&self) -> f32 {
        self.session.as_ref().map_or(1.0, |s| s.view.zoom)
    }

    /// Scroll-wheel zoom. Only engages while the pointer sits over the mask
    /// region (inside the viewport but outside the crop frame); with no
    /// active crop the whole viewport counts.
    pub fn wheel_zoom(&mut self, delta: f32, screen_point: Pos2) {
        let Some(s) = &mut self.session else { return };
        let vp = s.view.screen_to_viewport(screen_point);
        let in_viewport =
            vp.x >= 0.0 && vp.y >= 0.0 && vp.x < s.view.viewport_size.x && vp.y < s.view.viewport_size.y;
        if !in_viewport {
            return;
        }
        if s.crop.active && crop_screen_rect(&s.crop, &s.view).contains(vp) {
            return;
        }
        let zoom = s.view.zoom * 1.1f32.powf(delta);
        s.view.set_zoom(zoom);
    }

    /// Tell the core how the viewport texture is currently displayed, so
    /// pointer coordinates and drag deltas convert correctly.
    pub fn set_display_scale(&mut self, scale: f32) {
        if let Some(s) = &mut self.session {
            s.view.display_scale = scale.max(0.01);
        }
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        if let Some(s) = &mut self.session {
            s.view.viewport_size = size;
        }
    }

    // ---- pointer dispatch -------------------------------------------------

    /// Pointer press, in screen pixels. Dispatch order: crop resize handle,
    /// content pan, viewport pan, then drawing tools (which only engage when
    /// the point lands on the screenshot).
    pub fn handle_pointer_down(&mut self, screen_point: Pos2) {
        let tool = self.tool;
        let config = self.config;
        let Some(s) = &mut self.session else { return };

        let vp = s.view.screen_to_viewport(screen_point);

        if let Some(handle) = s.crop.hit_test_handle(vp, &s.view) {
            s.crop.begin_resize(handle);
            s.drag = PointerDrag::ResizingCrop {
                press_screen: screen_point,
            };
            return;
        }

        match tool {
            Tool::Hand => {
                s.drag = PointerDrag::PanningContent {
                    last_screen: screen_point,
                };
                return;
            }
            Tool::Pan => {
                s.drag = PointerDrag::PanningView {
                    last_screen: screen_point,
                };
                return;
            }
            _ => {}
        }

        let world = s.view.canvas_to_world(vp);
        let content = world_to_content(world, s.layers.layers_offset);
        if !s.layers.contains_content_point(content) {
            // Out-of-bounds press: no stroke, not an error.
            return;
        }

        if tool.is_freehand() {
            let role = freehand_role(tool, &config);
            s.layers.draw_stroke(role, content, content, &config);
            s.drag = PointerDrag::Freehand {
                role,
                last_content: content,
            };
        } else if let Some(kind) = tool.shape_kind() {
            s.drag = PointerDrag::ShapePreview {
                kind,
                start_content: content,
                edit_snapshot: s.layers.snapshot(SurfaceRole::Edit),
                highlighter_snapshot: s.layers.snapshot(SurfaceRole::Highlighter),
                moved: false,
            };
        }
    }

    /// Pointer motion, in screen pixels. Handlers are idempotent for
    /// repeated events at the same position: redundant repaints are fine,
    /// history is only ever touched on pointer-up.
    pub fn handle_pointer_move(&mut self, screen_point: Pos2) {
        let config = self.config;
        let Some(s) = &mut self.session else { return };

        match &mut s.drag {
            PointerDrag::Idle => {}
            PointerDrag::ResizingCrop { press_screen } => {
                let delta = screen_point - *press_screen;
                s.crop.update_resize(delta, &s.view);
            }
            PointerDrag::PanningContent { last_screen } => {
                let delta = screen_point - *last_screen;
                *last_screen = screen_point;
                let world_delta = s.view.screen_delta_to_world(delta);
                s.layers.layers_offset += world_delta;
            }
            PointerDrag::PanningView { last_screen } => {
                let delta = screen_point - *last_screen;
                *last_screen = screen_point;
                let viewport_delta = s.view.screen_delta_to_viewport(delta);
                s.view.viewport_offset += viewport_delta;
            }
            PointerDrag::Freehand { role, last_content } => {
                let vp = s.view.screen_to_viewport(screen_point);
                let content =
                    world_to_content(s.view.canvas_to_world(vp), s.layers.layers_offset);
                if s.layers.contains_content_point(content) {
                    let role = *role;
                    let from = *last_content;
                    *last_content = content;
                    s.layers.draw_stroke(role, from, content, &config);
                }
            }
            PointerDrag::ShapePreview {
                kind,
                start_content,
                edit_snapshot,
                highlighter_snapshot,
                moved,
            } => {
                let vp = s.view.screen_to_viewport(screen_point);
                let content =
                    world_to_content(s.view.canvas_to_world(vp), s.layers.layers_offset);
                let kind = *kind;
                let start = *start_content;
                *moved = true;
                // Restore-then-redraw: the shape's size is only known now.
                s.layers.restore(SurfaceRole::Edit, edit_snapshot);
                s.layers.restore(SurfaceRole::Highlighter, highlighter_snapshot);
                s.layers
                    .commit_shape_preview(SurfaceRole::Edit, kind, start, content, &config);
            }
        }
    }

    /// Pointer release: commit whatever drag was live and clear it. Also the
    /// entry point for "pointer left without an up event" — an abandoned
    /// drag must never stay stuck.
    pub fn handle_pointer_up(&mut self) {
        self.finish_drag();
    }

    fn finish_drag(&mut self) {
        let Some(s) = &mut self.session else { return };
        match std::mem::replace(&mut s.drag, PointerDrag::Idle) {
            PointerDrag::Idle => {}
            PointerDrag::ResizingCrop { .. } => s.crop.end_resize(),
            PointerDrag::PanningContent { .. } | PointerDrag::PanningView { .. } => {}
            PointerDrag::Freehand { .. } => s.history.push(&s.layers),
            PointerDrag::ShapePreview { moved, .. } => {
                // The last preview render is the commit; the snapshots are
                // simply dropped. A click that never moved drew nothing and
                // records nothing.
                if moved {
                    s.history.push(&s.layers);
                }
            }
        }
    }

    // ---- history ----------------------------------------------------------

    pub fn undo(&mut self) {
        if let Some(s) = &mut self.session {
            s.history.undo(&mut s.layers);
        }
    }

    pub fn redo(&mut self) {
        if let Some(s) = &mut self.session {
            s.history.redo(&mut s.layers);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.history.can_redo())
    }

    /// Wipe all annotations (both mutable surfaces) and record the wiped
    /// state so the clear itself is undoable.
    pub fn clear(&mut self) {
        if let Some(s) = &mut self.session {
            s.layers.clear(SurfaceRole::Edit);
            s.layers.clear(SurfaceRole::Highlighter);
            s.history.push(&s.layers);
        }
    }

    // ---- output -----------------------------------------------------------

    /// Repaint the viewport surface. `None` until `initialize` has run.
    pub fn render_frame(&self) -> Option<RgbaImage> {
        let s = self.session.as_ref()?;
        Some(compositor::render_frame(&s.layers, &s.view, &s.crop))
    }

    /// Flattened, cropped export — the single hand-off to host save /
    /// clipboard / upload logic.
    pub fn export_flattened_image(&self) -> Option<RgbaImage> {
        let s = self.session.as_ref()?;
        Some(compositor::export_flattened(&s.layers, Some(&s.crop)))
    }

    // ---- introspection (host status display, tests) -----------------------

    pub fn crop_rect(&self) -> Option<CropRect> {
        self.session.as_ref().map(|s| s.crop.rect)
    }

    pub fn layers_offset(&self) -> Option<Vec2> {
        self.session.as_ref().map(|s| s.layers.layers_offset)
    }

    pub fn viewport_offset(&self) -> Option<Vec2> {
        self.session.as_ref().map(|s| s.view.viewport_offset)
    }
}

impl Default for EditorCore {
    fn default() -> Self {
        Self::new()
    }
}

fn freehand_role(tool: Tool, config: &DrawingConfig) -> SurfaceRole {
    if tool == Tool::Highlighter || config.highlighter_mode {
        SurfaceRole::Highlighter
    } else {
        SurfaceRole::Edit
    }
}
