use egui::{Pos2, Vec2};
use image::{Rgba, RgbaImage};

use crate::tools::{self, DrawingConfig, ShapeKind};

// ============================================================================
// LAYER STACK — sole owner of the three raster surfaces
// ============================================================================
//
// The background, highlighter and edit surfaces always share the same logical
// size (the full captured screenshot) and are composited with the same
// `layers_offset`, so strokes never separate visually from the pixels they
// annotate. Everything that reads or writes pixels goes through this struct;
// nothing else holds a surface reference.
//
// Mutating a surface does NOT repaint — the compositor is invoked explicitly
// by the host. Shape preview relies on this: it can restore + redraw a
// surface several times per frame without intermediate flicker.

/// Which mutable surface an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRole {
    /// Full-opacity annotation strokes and shapes.
    Edit,
    /// Highlighter strokes, stored opaque; translucency is applied at
    /// composite time only.
    Highlighter,
}

pub struct LayerStack {
    width: u32,
    height: u32,
    background: RgbaImage,
    highlighter: RgbaImage,
    edit: RgbaImage,
    /// Translation of the content relative to world space ("hand" tool).
    pub layers_offset: Vec2,
}

impl LayerStack {
    /// Build the stack from the captured screenshot. The screenshot fixes the
    /// logical size of all three surfaces; the background is read-only from
    /// here on.
    pub fn from_background(background: RgbaImage) -> Self {
        let (width, height) = background.dimensions();
        Self {
            width,
            height,
            background,
            highlighter: RgbaImage::new(width, height),
            edit: RgbaImage::new(width, height),
            layers_offset: Vec2::ZERO,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> &RgbaImage {
        &self.background
    }

    pub fn surface(&self, role: SurfaceRole) -> &RgbaImage {
        match role {
            SurfaceRole::Edit => &self.edit,
            SurfaceRole::Highlighter => &self.highlighter,
        }
    }

    fn surface_mut(&mut self, role: SurfaceRole) -> &mut RgbaImage {
        match role {
            SurfaceRole::Edit => &mut self.edit,
            SurfaceRole::Highlighter => &mut self.highlighter,
        }
    }

    /// True when a content-space point lies on the screenshot. Strokes that
    /// start outside are ignored rather than clamped.
    pub fn contains_content_point(&self, p: Pos2) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f32 && p.y < self.height as f32
    }

    /// Draw a single freehand stroke segment. Points are in content space.
    pub fn draw_stroke(&mut self, role: SurfaceRole, from: Pos2, to: Pos2, config: &DrawingConfig) {
        let color = config.color;
        let width = config.stroke_width;
        tools::stroke_segment(self.surface_mut(role), from, to, width, color);
    }

    /// Rasterise a parametric shape from `start` to `end` (content space).
    /// Used both for live previews (after restoring a snapshot) and for the
    /// final commit — the two are the same pixels by construction.
    pub fn commit_shape_preview(
        &mut self,
        role: SurfaceRole,
        kind: ShapeKind,
        start: Pos2,
        end: Pos2,
        config: &DrawingConfig,
    ) {
        tools::draw_shape(self.surface_mut(role), kind, start, end, config);
    }

    /// Full-surface pixel copy, the unit of history and of shape preview.
    pub fn snapshot(&self, role: SurfaceRole) -> RgbaImage {
        self.surface(role).clone()
    }

    /// Overwrite a surface from a snapshot. Size-mismatched buffers are
    /// rejected (the stack's dimensions are fixed at load).
    pub fn restore(&mut self, role: SurfaceRole, buffer: &RgbaImage) {
        if buffer.dimensions() != (self.width, self.height) {
            crate::log_warn!(
                "layer restore skipped: snapshot {}x{} does not match surface {}x{}",
                buffer.width(),
                buffer.height(),
                self.width,
                self.height
            );
            return;
        }
        self.surface_mut(role).copy_from_slice(buffer);
    }

    /// Zero a surface (fully transparent).
    pub fn clear(&mut self, role: SurfaceRole) {
        for px in self.surface_mut(role).pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }
}
