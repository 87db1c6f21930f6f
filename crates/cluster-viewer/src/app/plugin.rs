//! Walkers plugin drawing cluster markers and points on the map
//!
//! The plugin receives an owned snapshot of what the cluster layer shows, since the
//! object graph cannot be shared with the map widget. Clicks on aggregate markers
//! are reported back through [`PluginOutput`].

use egui::{Align2, Color32, FontId, Pos2, Stroke};
use std::sync::{Arc, RwLock};
use walkers::{Plugin, Position, Projector};

const POINT_RADIUS: f32 = 4.0;
const POINT_COLOR: Color32 = Color32::from_rgb(70, 130, 220);
const CLUSTER_COLOR: Color32 = Color32::from_rgb(230, 110, 40);

/// Something to draw on the map
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Point {
        position: Position,
    },
    Cluster {
        position: Position,
        count: usize,
        label: String,
        expand_zoom: u8,
    },
}

/// A click on an aggregate marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterClick {
    pub position: Position,
    /// Zoom level at which the clicked cluster splits
    pub zoom: u8,
}

/// Shared results of the last plugin run
#[derive(Debug, Clone, Default)]
pub struct PluginOutput {
    pub clicked: Option<ClusterClick>,
    pub points_drawn: usize,
    pub clusters_drawn: usize,
}

/// Plugin for rendering the cluster layer on the map
pub struct ClusterPlugin {
    markers: Vec<Marker>,
    output: Arc<RwLock<PluginOutput>>,
}

impl ClusterPlugin {
    pub fn new(markers: Vec<Marker>, output: Arc<RwLock<PluginOutput>>) -> Self {
        Self { markers, output }
    }
}

/// On-screen radius of an aggregate marker, growing slowly with its count
pub fn cluster_radius(count: usize) -> f32 {
    (10.0 + (count.max(1) as f32).log10() * 6.0).min(34.0)
}

impl Plugin for ClusterPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("ClusterPlugin::run");

        let painter = ui.painter();
        let visible_rect = response.rect.expand(40.0);
        let click = if response.clicked() {
            response.interact_pointer_pos()
        } else {
            None
        };

        let mut output = PluginOutput::default();
        for marker in &self.markers {
            match marker {
                Marker::Point { position } => {
                    let center = projector.project(*position).to_pos2();
                    if !visible_rect.contains(center) {
                        continue;
                    }
                    painter.circle(
                        center,
                        POINT_RADIUS,
                        POINT_COLOR,
                        Stroke::new(1.0, Color32::WHITE),
                    );
                    output.points_drawn += 1;
                }
                Marker::Cluster {
                    position,
                    count,
                    label,
                    expand_zoom,
                } => {
                    let center = projector.project(*position).to_pos2();
                    if !visible_rect.contains(center) {
                        continue;
                    }
                    let radius = cluster_radius(*count);
                    draw_cluster(painter, center, radius, label);
                    output.clusters_drawn += 1;

                    if let Some(click) = click
                        && click.distance(center) <= radius
                    {
                        output.clicked = Some(ClusterClick {
                            position: *position,
                            zoom: *expand_zoom,
                        });
                    }
                }
            }
        }

        if let Ok(mut shared) = self.output.write() {
            *shared = output;
        }
    }
}

fn draw_cluster(painter: &egui::Painter, center: Pos2, radius: f32, label: &str) {
    painter.circle_filled(center, radius + 4.0, CLUSTER_COLOR.gamma_multiply(0.35));
    painter.circle(
        center,
        radius,
        CLUSTER_COLOR,
        Stroke::new(1.5, Color32::WHITE),
    );
    painter.text(
        center,
        Align2::CENTER_CENTER,
        label,
        FontId::proportional(12.0),
        Color32::WHITE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_radius_grows_and_saturates() {
        assert_eq!(cluster_radius(0), cluster_radius(1));
        assert!(cluster_radius(10) < cluster_radius(1_000));
        assert_eq!(cluster_radius(10_000_000), 34.0);
    }
}
