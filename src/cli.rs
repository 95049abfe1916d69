// ============================================================================
// shotmark CLI — argument parsing and headless export
// ============================================================================
//
// Usage examples:
//   shotmark capture.png
//   shotmark capture.png --region 100,100,200x150
//   shotmark capture.png --region 100,100,200x150 --output crop.png
//
// With --output no GUI is opened: the capture is cropped to the region and
// written out (annotation-free), which is handy for scripting and for
// smoke-testing the export path.

use std::path::PathBuf;

use clap::Parser;
use egui::{Pos2, Rect, Vec2};

use crate::editor::EditorCore;

/// Annotate a captured screenshot region.
#[derive(Parser, Debug)]
#[command(
    name = "shotmark",
    about = "Screenshot annotation: draw, highlight and crop on a capture, then export"
)]
pub struct CliArgs {
    /// The captured screenshot to annotate.
    pub input: PathBuf,

    /// Selected capture region as `X,Y,WxH` (screenshot pixel coordinates).
    /// Defaults to the full image.
    #[arg(short, long, value_name = "X,Y,WxH")]
    pub region: Option<String>,

    /// Looser capture region around the selection, same format as --region.
    #[arg(long, value_name = "X,Y,WxH")]
    pub extended_region: Option<String>,

    /// Headless mode: crop the capture to the region and write it here
    /// without opening the editor.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Parse `X,Y,WxH` into a rect. Returns `None` on any malformed input.
pub fn parse_region(s: &str) -> Option<Rect> {
    let (xy, size) = {
        let mut parts = s.splitn(3, ',');
        let x: f32 = parts.next()?.trim().parse().ok()?;
        let y: f32 = parts.next()?.trim().parse().ok()?;
        let size = parts.next()?;
        ((x, y), size)
    };
    let (w, h) = {
        let mut parts = size.splitn(2, 'x');
        let w: f32 = parts.next()?.trim().parse().ok()?;
        let h: f32 = parts.next()?.trim().parse().ok()?;
        (w, h)
    };
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(Rect::from_min_size(Pos2::new(xy.0, xy.1), Vec2::new(w, h)))
}

/// Headless export: initialize the core with the capture + region and hand
/// the flattened image straight to disk. Returns the process exit code.
pub fn run_headless(args: &CliArgs, output: &PathBuf) -> i32 {
    let screenshot = match image::open(&args.input) {
        Ok(img) => img.into_rgba8(),
        Err(e) => {
            eprintln!("shotmark: cannot read {}: {}", args.input.display(), e);
            return 1;
        }
    };
    let full = Rect::from_min_size(
        Pos2::ZERO,
        Vec2::new(screenshot.width() as f32, screenshot.height() as f32),
    );
    let region = match &args.region {
        Some(spec) => match parse_region(spec) {
            Some(r) => r,
            None => {
                eprintln!("shotmark: malformed --region {:?} (expected X,Y,WxH)", spec);
                return 1;
            }
        },
        None => full,
    };
    let extended = args.extended_region.as_deref().and_then(parse_region);

    // A viewport comfortably larger than the region keeps the crop frame
    // fully inside it; its exact size does not affect the exported pixels.
    let viewport = Vec2::new(region.width() + 200.0, region.height() + 200.0);
    let mut core = EditorCore::new();
    core.initialize(screenshot, region, extended, viewport);

    let Some(flat) = core.export_flattened_image() else {
        eprintln!("shotmark: export failed");
        return 1;
    };
    match flat.save(output) {
        Ok(()) => {
            crate::log_info!("headless export written to {}", output.display());
            0
        }
        Err(e) => {
            eprintln!("shotmark: cannot write {}: {}", output.display(), e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_well_formed_specs() {
        let r = parse_region("100,100,200x150").unwrap();
        assert_eq!(r.min, Pos2::new(100.0, 100.0));
        assert_eq!(r.size(), Vec2::new(200.0, 150.0));

        let r = parse_region(" 80 , 80 , 240x190 ").unwrap();
        assert_eq!(r.min, Pos2::new(80.0, 80.0));
    }

    #[test]
    fn region_rejects_malformed_specs() {
        for bad in ["", "100,100", "100,100,200", "a,b,cxd", "100,100,0x50", "100,100,-5x50"] {
            assert!(parse_region(bad).is_none(), "accepted {bad:?}");
        }
    }
}
