mod app;
mod color;
mod state;
mod ui;

use app::WaterDashApp;
use eframe::egui;
use water_dash::config::DashboardConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::load().unwrap_or_else(|e| {
        log::error!("Failed to read config, using defaults: {e:#}");
        DashboardConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Water Sector Performance Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(WaterDashApp::new(config)))),
    )
}
