use std::collections::VecDeque;

use image::RgbaImage;

use crate::layers::{LayerStack, SurfaceRole};

/// Ring capacity — caps memory growth during long editing sessions.
pub const MAX_HISTORY: usize = 20;

// ============================================================================
// HISTORY STACK — bounded ring of paired surface snapshots
// ============================================================================

/// One committed editing state. Entries written by this version always carry
/// both mutable surfaces; `Legacy` covers snapshots imported from hosts that
/// recorded only the edit surface, which restore partially instead of
/// failing.
pub enum HistoryEntry {
    Legacy {
        edit: RgbaImage,
    },
    Paired {
        edit: RgbaImage,
        highlighter: RgbaImage,
    },
}

impl HistoryEntry {
    /// Restore this entry's surfaces onto the layer stack. The entry shape is
    /// resolved here, once — a legacy entry applies the edit surface only.
    pub fn apply(&self, layers: &mut LayerStack) {
        match self {
            HistoryEntry::Paired { edit, highlighter } => {
                layers.restore(SurfaceRole::Edit, edit);
                layers.restore(SurfaceRole::Highlighter, highlighter);
            }
            HistoryEntry::Legacy { edit } => {
                crate::log_warn!("restoring legacy single-surface history entry");
                layers.restore(SurfaceRole::Edit, edit);
            }
        }
    }
}

/// Linear undo history with a cursor. Pushing after an undo discards the
/// redo branch; pushing past capacity evicts the oldest entry and shifts the
/// cursor down by one so it keeps pointing at the same state.
pub struct HistoryStack {
    entries: VecDeque<HistoryEntry>,
    index: usize,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.index < self.entries.len() - 1
    }

    /// Record the current state of both mutable surfaces as the new active
    /// entry.
    pub fn push(&mut self, layers: &LayerStack) {
        // Drop the redo branch.
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(HistoryEntry::Paired {
            edit: layers.snapshot(SurfaceRole::Edit),
            highlighter: layers.snapshot(SurfaceRole::Highlighter),
        });
        self.index = self.entries.len() - 1;

        if self.entries.len() > MAX_HISTORY {
            self.entries.pop_front();
            self.index -= 1;
        }
    }

    /// Import a single-surface snapshot recorded by an older host.
    pub fn push_legacy(&mut self, edit: RgbaImage) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(HistoryEntry::Legacy { edit });
        self.index = self.entries.len() - 1;
        if self.entries.len() > MAX_HISTORY {
            self.entries.pop_front();
            self.index -= 1;
        }
    }

    /// Step back one entry and restore it. Returns false at the floor.
    pub fn undo(&mut self, layers: &mut LayerStack) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        self.entries[self.index].apply(layers);
        true
    }

    /// Step forward one entry and restore it. Returns false at the tip.
    pub fn redo(&mut self, layers: &mut LayerStack) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        self.entries[self.index].apply(layers);
        true
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::DrawingConfig;
    use egui::Pos2;
    use image::Rgba;

    fn stack() -> LayerStack {
        LayerStack::from_background(RgbaImage::new(32, 32))
    }

    /// Stamp a distinct mark so each committed state is distinguishable.
    fn mark(layers: &mut LayerStack, n: u8) {
        let cfg = DrawingConfig {
            color: Rgba([n, 0, 0, 255]),
            stroke_width: 1.0,
            highlighter_mode: false,
        };
        let p = Pos2::new(n as f32 % 30.0, n as f32 % 30.0);
        layers.draw_stroke(SurfaceRole::Edit, p, p, &cfg);
    }

    #[test]
    fn ring_caps_at_twenty_entries() {
        let mut layers = stack();
        let mut history = HistoryStack::new();
        history.push(&layers); // baseline
        for n in 1..=25 {
            mark(&mut layers, n);
            history.push(&layers);
        }
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.index(), MAX_HISTORY - 1);

        // Undo to the floor: the oldest states are gone for good.
        let mut undone = 0;
        while history.undo(&mut layers) {
            undone += 1;
        }
        assert_eq!(undone, MAX_HISTORY - 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_then_redo_restores_the_same_pixels() {
        let mut layers = stack();
        let mut history = HistoryStack::new();
        history.push(&layers);
        mark(&mut layers, 1);
        history.push(&layers);
        mark(&mut layers, 2);
        history.push(&layers);
        let tip = layers.snapshot(SurfaceRole::Edit);

        assert!(history.undo(&mut layers));
        assert_ne!(layers.snapshot(SurfaceRole::Edit).as_raw(), tip.as_raw());
        assert!(history.redo(&mut layers));
        assert_eq!(layers.snapshot(SurfaceRole::Edit).as_raw(), tip.as_raw());
    }

    #[test]
    fn push_after_undo_discards_redo_branch() {
        let mut layers = stack();
        let mut history = HistoryStack::new();
        history.push(&layers);
        mark(&mut layers, 1);
        history.push(&layers);
        mark(&mut layers, 2);
        history.push(&layers);

        assert!(history.undo(&mut layers));
        assert!(history.can_redo());
        mark(&mut layers, 3);
        history.push(&layers);
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn undo_at_floor_and_redo_at_tip_are_no_ops() {
        let mut layers = stack();
        let mut history = HistoryStack::new();
        assert!(!history.undo(&mut layers));
        assert!(!history.redo(&mut layers));
        history.push(&layers);
        assert!(!history.undo(&mut layers));
        assert!(!history.redo(&mut layers));
    }

    #[test]
    fn legacy_entry_restores_edit_surface_only() {
        let mut layers = stack();
        let mut history = HistoryStack::new();

        // Highlighter content present before the legacy state is restored.
        let cfg = DrawingConfig::default();
        layers.draw_stroke(
            SurfaceRole::Highlighter,
            Pos2::new(4.0, 4.0),
            Pos2::new(20.0, 4.0),
            &cfg,
        );
        let highlighter_before = layers.snapshot(SurfaceRole::Highlighter);

        history.push_legacy(RgbaImage::new(32, 32));
        mark(&mut layers, 7);
        history.push(&layers);

        assert!(history.undo(&mut layers));
        // Edit surface reset to the legacy snapshot (blank)…
        assert!(layers
            .snapshot(SurfaceRole::Edit)
            .pixels()
            .all(|p| p[3] == 0));
        // …while the highlighter surface was left untouched.
        assert_eq!(
            layers.snapshot(SurfaceRole::Highlighter).as_raw(),
            highlighter_before.as_raw()
        );
    }
}
