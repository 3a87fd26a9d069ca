use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of entries kept in the quick-load list.
pub const DEFAULT_MAX_RECENT_SCENES: usize = 10;

/// Reference to an image resource that has not been resolved to bytes yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: String,
    pub media_type: String,
    pub file_type: String,
}

/// One entry of the recent-scenes list, owned by host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub name: String,
    /// Unique key; removal and deletion address scenes by path.
    pub path: String,
    pub filename: String,
    /// ISO-8601 timestamp of the last save.
    pub date: String,
    #[serde(default)]
    pub cover_image: Option<AssetRef>,
}

impl SceneRecord {
    /// Short, human readable form of `date`. Unparseable dates are shown verbatim.
    pub fn date_label(&self) -> String {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&self.date) {
            return parsed.format("%Y-%m-%d %H:%M").to_string();
        }
        match NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(parsed) => parsed.format("%Y-%m-%d %H:%M").to_string(),
            Err(_) => self.date.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentScenesConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub scenes: Vec<SceneRecord>,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_RECENT_SCENES
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SceneRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SceneRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for RecentScenesConfig {
    fn default() -> Self {
        Self {
            scenes: Vec::new(),
            max_entries: DEFAULT_MAX_RECENT_SCENES,
        }
    }
}

impl RecentScenesConfig {
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&SceneRecord> {
        self.scenes.iter().find(|scene| scene.path == path)
    }

    /// Moves `record` to the front, replacing any entry with the same path,
    /// then truncates to `max_entries`.
    pub fn push(&mut self, record: SceneRecord) {
        self.scenes.retain(|scene| scene.path != record.path);
        self.scenes.insert(0, record);
        self.scenes.truncate(self.max_entries.max(1));
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.scenes.len();
        self.scenes.retain(|scene| scene.path != path);
        self.scenes.len() != before
    }

    /// Drops entries whose scene file no longer exists.
    pub fn clean<F>(&mut self, exists: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.scenes.len();
        self.scenes.retain(|scene| exists(&scene.path));
        before - self.scenes.len()
    }
}
