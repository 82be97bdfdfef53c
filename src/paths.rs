//! Directory layout for vsphere-inventory.
//!
//! - Config: `~/.config/vsphere-inventory/`  (human-editable, XDG-style)
//! - Logs:   `~/Library/Logs/vsphere-inventory/` on macOS,
//!   `~/.local/share/vsphere-inventory/logs/` elsewhere
//!
//! `XDG_CONFIG_HOME` and `XDG_DATA_HOME` are honoured when set.

use std::path::{Path, PathBuf};
use tracing::info;

pub const APP_NAME: &str = "vsphere-inventory";
pub const CONFIG_FILE: &str = "config.toml";

/// Resolved application directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPaths {
    pub config: PathBuf,
    pub logs: PathBuf,
}

impl InventoryPaths {
    /// Resolve from the environment. `None` when `HOME` is unset.
    /// Does not create anything; see [`Self::ensure`].
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;
        Some(Self::from_home(
            &home,
            std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
            std::env::var("XDG_DATA_HOME").ok().as_deref(),
        ))
    }

    fn from_home(home: &Path, xdg_config: Option<&str>, xdg_data: Option<&str>) -> Self {
        Self {
            config: resolve_config_dir(home, xdg_config),
            logs: resolve_log_dir(home, xdg_data),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config.join(CONFIG_FILE)
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.logs] {
            std::fs::create_dir_all(dir)?;
            info!("ensured directory: {}", dir.display());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific path resolution
// ---------------------------------------------------------------------------

fn resolve_config_dir(home: &Path, xdg: Option<&str>) -> PathBuf {
    match xdg {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(APP_NAME),
        _ => home.join(".config").join(APP_NAME),
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path, _xdg: Option<&str>) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path, xdg: Option<&str>) -> PathBuf {
    match xdg {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(APP_NAME).join("logs"),
        _ => home.join(".local").join("share").join(APP_NAME).join("logs"),
    }
}
