use std::path::{Path, PathBuf};

/// Static configuration handed to [`crate::session::Session::init`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory for preferences and other per-user files.
    pub data_dir: PathBuf,
    /// Relay URLs to use. Empty means: stored preferences, then defaults.
    pub relays: Vec<String>,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            relays: Vec::new(),
        }
    }

    pub fn with_relays<P: AsRef<Path>>(data_dir: P, relays: Vec<String>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            relays,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|p| p.join("wren"))
            .unwrap_or_else(|| PathBuf::from("wren_data"));
        Self::new(data_dir)
    }
}
