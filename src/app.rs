use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use crate::cli::{parse_region, CliArgs};
use crate::editor::EditorCore;
use crate::tools::Tool;

// ============================================================================
// SHOTMARK APP — thin egui chrome around the editor core
// ============================================================================
//
// Everything here is host plumbing: toolbar buttons, texture upload, pointer
// forwarding, save/copy. All editing semantics live behind `EditorCore`; the
// app never touches surfaces or geometry directly.

pub struct ShotmarkApp {
    core: EditorCore,
    /// Screenshot + regions waiting for the first frame, when the canvas
    /// size (and so the viewport size) is finally known.
    pending: Option<(RgbaImage, Rect, Option<Rect>)>,
    frame_texture: Option<TextureHandle>,
    color_hex: String,
    stroke_size: f32,
    highlighter_mode: bool,
    status: String,
    pointer_was_down: bool,
}

impl ShotmarkApp {
    pub fn new(args: &CliArgs) -> Self {
        let pending = match image::open(&args.input) {
            Ok(img) => {
                let screenshot = img.into_rgba8();
                let full = Rect::from_min_size(
                    Pos2::ZERO,
                    Vec2::new(screenshot.width() as f32, screenshot.height() as f32),
                );
                let region = args
                    .region
                    .as_deref()
                    .and_then(parse_region)
                    .unwrap_or(full);
                let extended = args.extended_region.as_deref().and_then(parse_region);
                Some((screenshot, region, extended))
            }
            Err(e) => {
                // The core no-ops until initialize; the window just shows the
                // error in the status line.
                crate::log_err!("cannot read {}: {}", args.input.display(), e);
                None
            }
        };
        let status = if pending.is_some() {
            String::from("Ready")
        } else {
            format!("Failed to load {}", args.input.display())
        };
        Self {
            core: EditorCore::new(),
            pending,
            frame_texture: None,
            color_hex: String::from("#ff2d2d"),
            stroke_size: 3.0,
            highlighter_mode: false,
            status,
            pointer_was_down: false,
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for &tool in Tool::all() {
                if ui
                    .selectable_label(self.core.tool == tool, tool.label())
                    .clicked()
                {
                    self.core.set_tool(tool);
                }
            }
            ui.separator();

            ui.label("Color:");
            let color_edit = ui.add(
                egui::TextEdit::singleline(&mut self.color_hex).desired_width(70.0),
            );
            if color_edit.lost_focus() {
                self.core.set_color(&self.color_hex);
            }

            ui.label("Size:");
            if ui
                .add(egui::Slider::new(&mut self.stroke_size, 1.0..=32.0))
                .changed()
            {
                self.core.set_stroke_size(self.stroke_size);
            }
            if ui
                .checkbox(&mut self.highlighter_mode, "Highlight")
                .changed()
            {
                self.core.set_highlighter_mode(self.highlighter_mode);
            }
            ui.separator();

            let mut zoom = self.core.zoom();
            if ui
                .add(egui::Slider::new(&mut zoom, 0.25..=4.0).text("Zoom"))
                .changed()
            {
                self.core.set_zoom(zoom);
            }
            ui.separator();

            if ui
                .add_enabled(self.core.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.core.undo();
            }
            if ui
                .add_enabled(self.core.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.core.redo();
            }
            if ui.button("Clear").clicked() {
                self.core.clear();
            }
            ui.separator();

            if ui.button("Save…").clicked() {
                self.save_export();
            }
            if ui.button("Copy").clicked() {
                self.copy_export();
            }
        });
    }

    fn save_export(&mut self) {
        let Some(flat) = self.core.export_flattened_image() else {
            return;
        };
        let picked = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("annotation.png")
            .save_file();
        if let Some(path) = picked {
            match flat.save(&path) {
                Ok(()) => {
                    crate::log_info!("saved export to {}", path.display());
                    self.status = format!("Saved {}", path.display());
                }
                Err(e) => {
                    crate::log_err!("save failed: {}", e);
                    self.status = format!("Save failed: {e}");
                }
            }
        }
    }

    fn copy_export(&mut self) {
        let Some(flat) = self.core.export_flattened_image() else {
            return;
        };
        let (w, h) = flat.dimensions();
        let result = arboard::Clipboard::new().and_then(|mut cb| {
            cb.set_image(arboard::ImageData {
                width: w as usize,
                height: h as usize,
                bytes: std::borrow::Cow::Owned(flat.into_raw()),
            })
        });
        match result {
            Ok(()) => self.status = String::from("Copied to clipboard"),
            Err(e) => {
                crate::log_err!("clipboard copy failed: {}", e);
                self.status = format!("Copy failed: {e}");
            }
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let avail = ui.available_rect_before_wrap();

        // First frame with a real canvas size: hand the screenshot over.
        if let Some((screenshot, region, extended)) = self.pending.take() {
            self.core
                .initialize(screenshot, region, extended, avail.size());
        }

        let Some(frame) = self.core.render_frame() else {
            ui.centered_and_justified(|ui| ui.label("No image loaded"));
            return;
        };

        let (fw, fh) = frame.dimensions();
        let color_image =
            ColorImage::from_rgba_unmultiplied([fw as usize, fh as usize], frame.as_raw());
        match &mut self.frame_texture {
            Some(tex) => tex.set(color_image, TextureOptions::NEAREST),
            None => {
                self.frame_texture = Some(ui.ctx().load_texture(
                    "viewport",
                    color_image,
                    TextureOptions::NEAREST,
                ));
            }
        }

        // Fit the viewport texture into the available rect, preserving aspect.
        let scale = (avail.width() / fw as f32).min(avail.height() / fh as f32);
        let displayed = Vec2::new(fw as f32 * scale, fh as f32 * scale);
        let origin = avail.min + (avail.size() - displayed) * 0.5;
        let display_rect = Rect::from_min_size(origin, displayed);
        self.core.set_display_scale(scale);

        if let Some(tex) = &self.frame_texture {
            ui.painter().image(
                tex.id(),
                display_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // Pointer forwarding. Coordinates handed to the core are relative to
        // the displayed canvas; the core rescales them by the display scale.
        let response = ui.allocate_rect(display_rect, Sense::click_and_drag());
        let local = |p: Pos2| p - origin.to_vec2();

        // `is_pointer_button_down_on` stays latched to this widget for the
        // whole drag, even once the pointer leaves its bounds — a stroke that
        // wanders off the canvas keeps tracking.
        if response.is_pointer_button_down_on() {
            if let Some(p) = response.interact_pointer_pos() {
                if self.pointer_was_down {
                    self.core.handle_pointer_move(local(p));
                } else {
                    self.core.handle_pointer_down(local(p));
                    self.pointer_was_down = true;
                }
            }
        }

        // Window-global release: a drag that started on the canvas must end
        // even when the pointer is let go (or lost) outside it.
        let any_down = ui.input(|i| i.pointer.any_down());
        if self.pointer_was_down && !any_down {
            self.core.handle_pointer_up();
            self.pointer_was_down = false;
        }

        if let Some(hover) = response.hover_pos() {
            let scroll = ui.input(|i| i.scroll_delta.y);
            if scroll != 0.0 {
                self.core.wheel_zoom(scroll / 50.0, local(hover));
            }
        }
    }
}

impl eframe::App for ShotmarkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Keyboard shortcuts.
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z)) {
            self.core.undo();
        }
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Y)) {
            self.core.redo();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));
    }
}
