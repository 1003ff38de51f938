// SPDX-License-Identifier: MPL-2.0

//! Default on-disk locations for persisted service state
//!
//! Everything here resolves paths under the platform's standard data
//! directory (`dirs::data_dir()`) so a fresh install has sane defaults
//! without requiring every path in `Config` to be set explicitly. Callers
//! that configure an explicit path in `Config` should prefer that over
//! these helpers; these exist for the common case of running with
//! built-in defaults.

use std::path::PathBuf;

const APP_DIR: &str = "facetrack-fts";

/// Root data directory for this service, creating it if missing.
pub fn data_dir() -> PathBuf {
    let dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir).join(APP_DIR);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to create data directory");
    }
    dir
}

/// Default path for the configuration file, honoring `FTS_CONFIG` if set.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FTS_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir().unwrap_or_else(std::env::temp_dir).join(APP_DIR).join("config.yaml")
}

/// Default location for the persisted identity index.
pub fn default_identity_index_path() -> PathBuf {
    data_dir().join("identities.idx")
}

/// Default location for the attendance spill file.
pub fn default_spill_path() -> PathBuf {
    data_dir().join("attendance_spill.ndjson")
}
