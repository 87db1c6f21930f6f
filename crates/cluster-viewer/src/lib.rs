//! Cluster Viewer - Application Library
//!
//! Desktop map that hosts the clustering engine of `cluster-lib`: the walkers map
//! widget supplies the zoom level, the engine decides which clusters and points are
//! visible, and a map plugin draws them.

mod app;
mod logging;

pub use app::ClusterViewerApp;
pub use logging::setup_logging;

/// Entry point for desktop platforms
///
/// Installs logging, then runs the viewer until its window is closed.
pub fn native_main(app_name: &str) -> eframe::Result<()> {
    setup_logging();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(app_name),
        ..Default::default()
    };

    eframe::run_native(
        app_name,
        native_options,
        Box::new(|cc| Ok(Box::new(ClusterViewerApp::new(cc)))),
    )
}
