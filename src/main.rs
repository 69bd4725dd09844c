#![windows_subsystem = "windows"]

use brushfire::app::BrushfireApp;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // Session log (overwrites the previous session's file).
    brushfire::logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("Brushfire"),
        ..Default::default()
    };

    eframe::run_native(
        "Brushfire",
        options,
        Box::new(|cc| Box::new(BrushfireApp::new(cc))),
    )
}
