//! Application module
//!
//! Full-screen map with a toggleable sidebar. Each frame the widget's zoom level is
//! mirrored into the cluster engine before the visible markers are drawn, and a
//! click on an aggregate marker zooms in to where it splits.

mod plugin;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::plugin::{ClusterPlugin, PluginOutput};
use crate::app::settings::Settings;
use crate::app::state::AppState;
use eframe::egui;
use std::sync::{Arc, RwLock};
use walkers::{HttpTiles, Map, MapMemory, Position, sources::OpenStreetMap};

/// Main application structure
pub struct ClusterViewerApp {
    /// Points, cluster layer and statistics
    state: AppState,

    /// Map tiles provider (OpenStreetMap)
    tiles: HttpTiles,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Initial map center, also used as the "my position" of the map widget
    home: Position,

    /// Results of the last plugin run (clicks, draw counts)
    plugin_output: Arc<RwLock<PluginOutput>>,
}

impl ClusterViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = Settings::from_cli();
        let state = AppState::new(&settings);

        let home = walkers::lat_lon(settings.center_lat, settings.center_lon);
        let mut map_memory = MapMemory::default();
        map_memory.center_at(home);
        if map_memory.set_zoom(settings.initial_zoom as f64).is_err() {
            tracing::warn!("Initial zoom {} rejected by the map", settings.initial_zoom);
        }

        Self {
            state,
            tiles: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            map_memory,
            home,
            plugin_output: Arc::new(RwLock::new(PluginOutput::default())),
        }
    }

    /// Zoom in on a clicked cluster reported by the last plugin run
    fn handle_cluster_click(&mut self) -> bool {
        let clicked = self
            .plugin_output
            .write()
            .ok()
            .and_then(|mut output| output.clicked.take());
        let Some(click) = clicked else {
            return false;
        };

        tracing::debug!("Expanding cluster: zooming to {}", click.zoom);
        self.map_memory.center_at(click.position);
        if self.map_memory.set_zoom(click.zoom as f64).is_err() {
            tracing::debug!("Zoom {} out of the map's range", click.zoom);
        }
        true
    }
}

#[profiling::all_functions]
impl eframe::App for ClusterViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let clicked = self.handle_cluster_click();

        // Mirror the widget's zoom level before asking what is visible
        let zoom_changed = self.state.sync_zoom(self.map_memory.zoom());

        ui_panels::render_sidebar(ctx, &mut self.state);

        let markers = self.state.visible_markers();

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let plugin = ClusterPlugin::new(markers, self.plugin_output.clone());
                let map = Map::new(Some(&mut self.tiles), &mut self.map_memory, self.home)
                    .with_plugin(plugin);
                ui.add(map);

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let painter = ui.painter();
                let screen_rect = ui.max_rect();
                painter.text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    "© OpenStreetMap contributors",
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        // A click or a zoom step changes what is visible: draw again right away
        let pending_click = self
            .plugin_output
            .read()
            .is_ok_and(|output| output.clicked.is_some());
        if clicked || zoom_changed || pending_click {
            ctx.request_repaint();
        }
    }
}
