use egui::{Pos2, Vec2};
use image::{Rgba, RgbaImage};
use std::f32::consts::PI;

// ============================================================================
// TOOLS & DRAWING CONFIG
// ============================================================================

/// The annotation tools. `Hand` drags the content (the layer offset) and
/// `Pan` drags the view itself; everything else puts pixels on a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Pen,
    Highlighter,
    Line,
    WavyLine,
    DashedLine,
    DottedLine,
    Rectangle,
    Ellipse,
    Arrow,
    Hand,
    Pan,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pen => "Pen",
            Tool::Highlighter => "Highlighter",
            Tool::Line => "Line",
            Tool::WavyLine => "Wavy line",
            Tool::DashedLine => "Dashed line",
            Tool::DottedLine => "Dotted line",
            Tool::Rectangle => "Rectangle",
            Tool::Ellipse => "Ellipse",
            Tool::Arrow => "Arrow",
            Tool::Hand => "Hand",
            Tool::Pan => "Pan view",
        }
    }

    /// Shape kind for tools that use the preview-then-commit protocol;
    /// `None` for freehand and pan tools.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::WavyLine => Some(ShapeKind::Wavy),
            Tool::DashedLine => Some(ShapeKind::Dashed),
            Tool::DottedLine => Some(ShapeKind::Dotted),
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            Tool::Arrow => Some(ShapeKind::Arrow),
            _ => None,
        }
    }

    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Pen | Tool::Highlighter)
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pen,
            Tool::Highlighter,
            Tool::Line,
            Tool::WavyLine,
            Tool::DashedLine,
            Tool::DottedLine,
            Tool::Rectangle,
            Tool::Ellipse,
            Tool::Arrow,
            Tool::Hand,
            Tool::Pan,
        ]
    }
}

/// Shape primitives drawn with the restore-then-redraw preview protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Wavy,
    Dashed,
    Dotted,
    Rectangle,
    Ellipse,
    Arrow,
}

/// Current stroke style, passed explicitly into every drawing call rather
/// than read from ambient state, so stroke rendering is testable without any
/// UI wiring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawingConfig {
    pub color: Rgba<u8>,
    pub stroke_width: f32,
    /// When set, freehand pen strokes are rerouted to the highlighter
    /// surface. Shape tools ignore this flag.
    pub highlighter_mode: bool,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            color: Rgba([255, 0, 0, 255]),
            stroke_width: 3.0,
            highlighter_mode: false,
        }
    }
}

impl DrawingConfig {
    /// Parse a `#rrggbb` (or `rrggbb`) hex color. Invalid input leaves the
    /// current color untouched.
    pub fn set_color_hex(&mut self, hex: &str) {
        if let Some(rgb) = parse_hex_color(hex) {
            self.color = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        } else {
            crate::log_warn!("ignoring malformed color {:?}", hex);
        }
    }
}

pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let s = hex.strip_prefix('#').unwrap_or(hex);
    if s.len() != 6 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some([r, g, b])
}

// ============================================================================
// RASTERISATION — dense sub-pixel stepping with circular stamps
// ============================================================================

/// Stamp a filled circle of diameter `width` at a sub-pixel position.
fn stamp_circle(img: &mut RgbaImage, center: Pos2, width: f32, color: Rgba<u8>) {
    let r = (width * 0.5).max(0.5);
    let r2 = r * r;
    let min_x = (center.x - r).floor().max(0.0) as u32;
    let min_y = (center.y - r).floor().max(0.0) as u32;
    let max_x = ((center.x + r).ceil() as i64).clamp(0, img.width() as i64) as u32;
    let max_y = ((center.y + r).ceil() as i64).clamp(0, img.height() as i64) as u32;
    for py in min_y..max_y {
        for px in min_x..max_x {
            let dx = px as f32 - center.x;
            let dy = py as f32 - center.y;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(px, py, color);
            }
        }
    }
}

/// Draw a thick line segment by stamping circles along it, stepping at one
/// pixel per stamp for smooth sub-pixel coverage.
pub fn stroke_segment(img: &mut RgbaImage, from: Pos2, to: Pos2, width: f32, color: Rgba<u8>) {
    let delta = to - from;
    let distance = delta.length();
    if distance < 0.1 {
        stamp_circle(img, from, width, color);
        return;
    }
    let steps = distance.ceil() as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp_circle(img, from + delta * t, width, color);
    }
}

/// Rasterise one of the parametric shapes from `start` to `end`.
pub fn draw_shape(
    img: &mut RgbaImage,
    kind: ShapeKind,
    start: Pos2,
    end: Pos2,
    config: &DrawingConfig,
) {
    let width = config.stroke_width;
    let color = config.color;
    match kind {
        ShapeKind::Line => stroke_segment(img, start, end, width, color),
        ShapeKind::Wavy => draw_wavy_line(img, start, end, width, color),
        ShapeKind::Dashed => draw_dashed_line(img, start, end, width, color),
        ShapeKind::Dotted => draw_dotted_line(img, start, end, width, color),
        ShapeKind::Rectangle => {
            let tr = Pos2::new(end.x, start.y);
            let bl = Pos2::new(start.x, end.y);
            stroke_segment(img, start, tr, width, color);
            stroke_segment(img, tr, end, width, color);
            stroke_segment(img, end, bl, width, color);
            stroke_segment(img, bl, start, width, color);
        }
        ShapeKind::Ellipse => draw_ellipse(img, start, end, width, color),
        ShapeKind::Arrow => draw_arrow(img, start, end, width, color),
    }
}

/// Wavy line: 100 interpolation samples along the segment, each offset
/// perpendicular to it by `sin(t · frequency · 2π) · amplitude`. Frequency
/// grows with length (one wave per 50 px), amplitude with stroke width.
fn draw_wavy_line(img: &mut RgbaImage, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    const SAMPLES: usize = 100;
    let delta = end - start;
    let distance = delta.length();
    if distance < 0.5 {
        stamp_circle(img, start, width, color);
        return;
    }
    let frequency = distance / 50.0;
    let amplitude = (width * 1.2).max(3.0);
    let perp = Vec2::new(-delta.y, delta.x) / distance;

    let mut prev: Option<Pos2> = None;
    for i in 0..=SAMPLES {
        let t = i as f32 / SAMPLES as f32;
        let offset = (t * frequency * 2.0 * PI).sin() * amplitude;
        let p = start + delta * t + perp * offset;
        if let Some(prev) = prev {
            stroke_segment(img, prev, p, width, color);
        }
        prev = Some(p);
    }
}

fn draw_dashed_line(img: &mut RgbaImage, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    let delta = end - start;
    let distance = delta.length();
    if distance < 0.5 {
        stamp_circle(img, start, width, color);
        return;
    }
    let dir = delta / distance;
    let dash = (width * 3.0).max(8.0);
    let gap = dash * 0.6;
    let mut pos = 0.0;
    while pos < distance {
        let dash_end = (pos + dash).min(distance);
        stroke_segment(img, start + dir * pos, start + dir * dash_end, width, color);
        pos = dash_end + gap;
    }
}

fn draw_dotted_line(img: &mut RgbaImage, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    let delta = end - start;
    let distance = delta.length();
    if distance < 0.5 {
        stamp_circle(img, start, width, color);
        return;
    }
    let dir = delta / distance;
    let spacing = (width * 2.5).max(4.0);
    let mut pos = 0.0;
    while pos <= distance {
        stamp_circle(img, start + dir * pos, width, color);
        pos += spacing;
    }
}

/// Axis-aligned ellipse outline inscribed in the rect spanned by
/// `start`/`end`, sampled densely enough that consecutive samples are at
/// most ~2 px apart.
fn draw_ellipse(img: &mut RgbaImage, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    let cx = (start.x + end.x) * 0.5;
    let cy = (start.y + end.y) * 0.5;
    let rx = (end.x - start.x).abs() * 0.5;
    let ry = (end.y - start.y).abs() * 0.5;
    if rx < 0.5 && ry < 0.5 {
        stamp_circle(img, Pos2::new(cx, cy), width, color);
        return;
    }
    let steps = ((PI * (rx + ry)) as usize).max(32);
    let mut prev: Option<Pos2> = None;
    for i in 0..=steps {
        let a = i as f32 / steps as f32 * 2.0 * PI;
        let p = Pos2::new(cx + rx * a.cos(), cy + ry * a.sin());
        if let Some(prev) = prev {
            stroke_segment(img, prev, p, width, color);
        }
        prev = Some(p);
    }
}

/// Arrow: shaft plus two head segments swept back ±30° from the shaft
/// direction, head length `max(15, 4 · width)`.
fn draw_arrow(img: &mut RgbaImage, start: Pos2, end: Pos2, width: f32, color: Rgba<u8>) {
    stroke_segment(img, start, end, width, color);
    let delta = end - start;
    if delta.length() < 0.5 {
        return;
    }
    let angle = delta.y.atan2(delta.x);
    let head_len = (width * 4.0).max(15.0);
    for side in [-1.0f32, 1.0] {
        let wing = angle + PI - side * (PI / 6.0);
        let tip = Pos2::new(end.x + head_len * wing.cos(), end.y + head_len * wing.sin());
        stroke_segment(img, end, tip, width, color);
    }
}
