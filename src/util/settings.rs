use std::fs;
use std::io;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::domain::{RouteFilter, SkillSet};

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "TradeRoutePlanner";
const APP_NAME: &str = "TradeRoutePlanner";

/// User settings that survive between runs: the usual query context plus
/// an optional custom gate graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default)]
    pub region_id: Option<u32>,
    #[serde(default)]
    pub vehicle_type_id: Option<u32>,
    #[serde(default)]
    pub skills: SkillSet,
    #[serde(default)]
    pub filter: RouteFilter,
    #[serde(default)]
    pub graph_path: Option<PathBuf>,
}

fn settings_file() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

pub fn load_settings() -> Option<PersistedSettings> {
    let path = settings_file()?;
    let data = fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn save_settings(settings: &PersistedSettings) -> Result<(), SettingsSaveError> {
    let path = settings_file().ok_or(SettingsSaveError::StorageUnavailable)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsSaveError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}
