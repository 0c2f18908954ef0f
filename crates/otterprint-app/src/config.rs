// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware config directory resolution and config loading.

use std::path::{Path, PathBuf};

use otterprint_core::BridgeConfig;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";
const PORT_ENV: &str = "OTTERPRINT_PORT";

/// Directory holding `config.json`, if the environment names one.
pub fn config_dir() -> Option<PathBuf> {
    base_config_dir().map(|base| base.join("otterprint"))
}

fn base_config_dir() -> Option<PathBuf> {
    // XDG first, then ~/.config, then the Windows roaming profile.
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home).join(".config"));
    }
    std::env::var_os("APPDATA")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Load the bridge config for this host, falling back to defaults.
pub fn load() -> BridgeConfig {
    let config = match config_dir() {
        Some(dir) => load_from(&dir),
        None => {
            debug!("no config directory in environment, using defaults");
            BridgeConfig::default()
        }
    };
    apply_port_override(config, std::env::var(PORT_ENV).ok().as_deref())
}

/// Read `config.json` from `dir`. A missing file is not an error; an
/// unreadable or invalid one is logged and ignored.
pub fn load_from(dir: &Path) -> BridgeConfig {
    let path = dir.join(CONFIG_FILE);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return BridgeConfig::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
            return BridgeConfig::default();
        }
    };

    match serde_json::from_str(&data) {
        Ok(config) => {
            info!(path = %path.display(), "loaded config");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config file invalid, using defaults");
            BridgeConfig::default()
        }
    }
}

fn apply_port_override(mut config: BridgeConfig, raw: Option<&str>) -> BridgeConfig {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return config;
    };
    match raw.parse::<u16>() {
        Ok(port) => {
            debug!(port, "port overridden from {PORT_ENV}");
            config.port = port;
        }
        Err(e) => warn!(value = raw, error = %e, "ignoring invalid {PORT_ENV}"),
    }
    config
}
