pub mod error;
pub mod settings;
pub mod spec;

pub use error::*;
pub use settings::{
    Backoff, Concurrency, MeshSettings, Routing, Settings, StackSettings, Timeouts, Topology,
};
pub use spec::{VpcSpec, Templates, load_specs, load_templates, parse_specs, resolve_template};

use std::path::PathBuf;

/// Environment variable pointing at a settings file
pub const SETTINGS_ENV: &str = "VPCFLOW_SETTINGS";

/// vpcflow's directory under the user config dir (e.g. `~/.config/vpcflow`)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vpcflow"))
}

/// Locate a settings file
///
/// Searched in order:
/// 1. environment variable `VPCFLOW_SETTINGS` (direct path)
/// 2. current directory: `vpcflow.yaml`, `.vpcflow.yaml`
/// 3. `~/.config/vpcflow/settings.yaml`
pub fn find_settings_file() -> Option<PathBuf> {
    if let Ok(settings_path) = std::env::var(SETTINGS_ENV) {
        let path = PathBuf::from(settings_path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points at missing file {}", SETTINGS_ENV, path.display());
    }

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in ["vpcflow.yaml", ".vpcflow.yaml"] {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }
    }

    let global = get_config_dir()?.join("settings.yaml");
    global.exists().then_some(global)
}
