use clap::Parser;
use eframe::egui;

use shotmark::app::ShotmarkApp;
use shotmark::cli::{self, CliArgs};
use shotmark::logger;

fn main() -> Result<(), eframe::Error> {
    logger::init();
    let args = CliArgs::parse();

    // Headless mode: crop + export, no window.
    if let Some(output) = args.output.clone() {
        std::process::exit(cli::run_headless(&args, &output));
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("shotmark"),
        ..Default::default()
    };
    eframe::run_native(
        "shotmark",
        options,
        Box::new(move |_cc| Box::new(ShotmarkApp::new(&args))),
    )
}
