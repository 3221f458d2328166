use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Where the tracing log goes; the terminal itself belongs to the UI.
    pub fn log_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("pomux");
            Some(state_dir.join("pomux.log"))
        } else {
            ProjectDirs::from("", "", "pomux")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("pomux.log"))
        }
    }
}
