use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::{scene::RecentScenesConfig, Result, SceneDeckError};

/// Which cover images the request planner asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Only ids that are not cached yet.
    #[default]
    Missing,
    /// Every listed cover, cached or not.
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    /// How long a remove/delete request may stay unacknowledged before it is reported.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Skip pushed assets this panel never asked for. Off by default: every
    /// `assets` entry is cached, whoever requested it.
    #[serde(default)]
    pub only_requested_assets: bool,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            refresh_policy: RefreshPolicy::default(),
            request_timeout_ms: default_request_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            only_requested_assets: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

/// Settings for the directory-backed demo host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub scenes_dir: String,
    pub assets_dir: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            scenes_dir: "scenes".into(),
            assets_dir: "assets".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absent or malformed sections hide the quick-load panel.
    #[serde(default, deserialize_with = "lenient_recent_scenes")]
    pub recent_scenes: Option<RecentScenesConfig>,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub ops: OpsConfig,
    #[serde(default)]
    pub host: HostConfig,
}

fn lenient_recent_scenes<'de, D>(deserializer: D) -> Result<Option<RecentScenesConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(raw) {
        Ok(recents) => Ok(Some(recents)),
        Err(err) => {
            warn!("ignoring malformed recent_scenes section: {err}");
            Ok(None)
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            SceneDeckError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            SceneDeckError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let doc = toml::to_string_pretty(self).map_err(|err| {
            SceneDeckError::Configuration(format!("failed to serialize config: {err}"))
        })?;
        fs::write(path_ref, doc).map_err(|err| {
            SceneDeckError::Configuration(format!(
                "unable to write config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.panel.request_timeout_ms == 0 {
            return Err(SceneDeckError::Configuration(
                "panel.request_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.panel.channel_capacity == 0 {
            return Err(SceneDeckError::Configuration(
                "panel.channel_capacity must be greater than zero".into(),
            ));
        }
        if let Some(recents) = &self.recent_scenes {
            if recents.max_entries == 0 {
                return Err(SceneDeckError::Configuration(
                    "recent_scenes.max_entries must be greater than zero".into(),
                ));
            }
            let mut seen = HashSet::new();
            for scene in &recents.scenes {
                if !seen.insert(scene.path.as_str()) {
                    return Err(SceneDeckError::Configuration(format!(
                        "recent_scenes lists {} more than once",
                        scene.path
                    )));
                }
            }
        }
        Ok(())
    }
}
