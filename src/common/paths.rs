use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "face-gate.toml";

pub fn dev_config_file() -> PathBuf {
    PathBuf::from("configs").join(CONFIG_FILE_NAME)
}

/// Per-user config location, e.g. `~/.config/face-gate/face-gate.toml` on Linux.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "facegate", "face-gate")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/face-gate").join(CONFIG_FILE_NAME)
}

/// Candidate config files in lookup order.
pub fn config_search_path(dev_mode: bool) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if dev_mode {
        paths.push(dev_config_file());
    }
    if let Some(user) = user_config_file() {
        paths.push(user);
    }
    paths.push(system_config_file());
    paths
}
