//! UI panels for the application

use crate::app::state::AppState;
use cluster_lib::MapView;
use egui::{Color32, RichText, Ui};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.sidebar_open = !state.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.sidebar_open { "✕" } else { "☰" };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the sidebar with statistics and layer controls
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.sidebar_open {
        return;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(280.0)
        .min_width(240.0)
        .resizable(true)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| render_sidebar_content(ui, state));
        });
}

fn render_sidebar_content(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Clusters");
    ui.add_space(4.0);

    let mut active = state.is_layer_active();
    if ui
        .checkbox(&mut active, "Show cluster layer")
        .on_hover_text("Hide or show every cluster marker and point")
        .changed()
    {
        state.set_layer_active(active);
    }

    ui.add_space(8.0);
    ui.separator();
    render_stats_section(ui, state);

    if !state.errors.is_empty() {
        ui.add_space(8.0);
        ui.separator();
        ui.label(
            RichText::new(format!("⚠ Errors ({})", state.errors.len()))
                .strong()
                .color(Color32::RED),
        );
        egui::ScrollArea::vertical()
            .id_salt("errors_scroll")
            .max_height(120.0)
            .show(ui, |ui| {
                for (file, error) in &state.errors {
                    ui.label(
                        RichText::new(format!(
                            "• {}: {}",
                            file.file_name().unwrap_or_default().to_string_lossy(),
                            error
                        ))
                        .small()
                        .color(Color32::LIGHT_RED),
                    );
                }
            });
    }
}

fn render_stats_section(ui: &mut Ui, state: &AppState) {
    let stats = &state.stats;
    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Points");
            ui.label(stats.total_points.to_string());
            ui.end_row();

            ui.label("Clusters");
            ui.label(format!(
                "{} ({} roots)",
                stats.total_clusters, stats.root_clusters
            ));
            ui.end_row();

            ui.label("Build time");
            ui.label(format!("{:.1} ms", stats.build_time_ms));
            ui.end_row();

            ui.label("Zoom");
            ui.label(format!(
                "{} ({}..={})",
                state.map.zoom(),
                state.map.min_zoom(),
                state.map.max_zoom()
            ));
            ui.end_row();

            ui.label("Last zoom change");
            ui.label(format!(
                "{} clusters, {:.2} ms",
                stats.last_zoom_visited, stats.last_zoom_time_ms
            ));
            ui.end_row();

            ui.label("Visible");
            ui.label(format!(
                "{} clusters, {} points",
                stats.visible_clusters, stats.visible_points
            ));
            ui.end_row();
        });
}
