use clap::Parser;
use cluster_lib::{Config, LocationMode};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Cluster Viewer - A desktop map that groups large point sets into zoom-dependent clusters
pub struct Settings {
    /// GPX files whose waypoints and track points are added to the map
    #[clap(short, long, value_name = "FILE")]
    pub gpx_files: Vec<PathBuf>,

    /// Number of generated demo points around the center (0 disables them)
    #[clap(short = 'n', long, default_value = "5000")]
    pub random_points: usize,

    /// Spread of the demo points around the center, in degrees
    #[clap(long, default_value = "2.0")]
    pub spread: f64,

    /// Cluster radius in pixels
    #[clap(short, long, default_value = "200.0")]
    pub radius: f64,

    /// Place cluster markers on their middle member instead of the average location
    #[clap(long, default_value = "false")]
    pub middle_location: bool,

    /// Maximum zoom level clusters are computed for
    #[clap(long, default_value = "18")]
    pub max_zoom: u8,

    /// Initial zoom level of the map
    #[clap(long, default_value = "6")]
    pub initial_zoom: u8,

    /// Latitude of the initial map center
    #[clap(long, default_value = "50.0755", allow_hyphen_values = true)]
    pub center_lat: f64,

    /// Longitude of the initial map center
    #[clap(long, default_value = "14.4378", allow_hyphen_values = true)]
    pub center_lon: f64,
}

impl Settings {
    /// Parse settings from the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Clustering configuration derived from the settings
    pub fn cluster_config(&self) -> Config {
        Config {
            radius_pixels: self.radius,
            location_mode: if self.middle_location {
                LocationMode::Middle
            } else {
                LocationMode::Average
            },
            ..Config::default()
        }
    }
}
