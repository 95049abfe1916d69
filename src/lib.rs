#![allow(clippy::too_many_arguments)]

//! shotmark — screenshot annotation core.
//!
//! The editing engine lives behind [`editor::EditorCore`]: four raster
//! layers, a pan/zoom view transform, a draggable crop frame, drawing tools
//! and a bounded undo history. The egui chrome in [`app`] is a thin host on
//! top of it.

#[macro_use]
pub mod logger;

pub mod app;
pub mod cli;
pub mod compositor;
pub mod crop;
pub mod editor;
pub mod history;
pub mod layers;
pub mod tools;
pub mod transform;
