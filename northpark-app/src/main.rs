//! Desktop viewer for San Diego's North Park community plan area.
//!
//! The binary is a thin shell: it resolves the configuration, then hands
//! everything to [`app::run`], which builds the galileo map and starts the
//! egui event loop.

mod app;

use northpark_map::config::MapConfig;
use northpark_map::PlanMapError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            log::error!("cannot start without a valid configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = app::run(config) {
        log::error!("failed to start the map application: {err}");
        std::process::exit(1);
    }
}

/// The built-in configuration, or the JSON file named by the
/// `NORTHPARK_CONFIG` environment variable. A named file that cannot be
/// read or parsed is fatal; there is no point rendering an empty window.
fn load_config() -> Result<MapConfig, PlanMapError> {
    match std::env::var("NORTHPARK_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|err| PlanMapError::Config(format!("cannot read {path}: {err}")))?;
            MapConfig::from_json(&text)
        }
        Err(_) => Ok(MapConfig::north_park()),
    }
}
