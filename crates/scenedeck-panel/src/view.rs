use scenedeck_types::scene::{RecentScenesConfig, SceneRecord};

use crate::cache::AssetCache;

/// Display-ready projection of one recent scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTile {
    pub title: String,
    pub name: String,
    pub path: String,
    pub filename: String,
    pub date_label: String,
    /// `data:` URI of the cover, `None` while the placeholder should show.
    pub cover: Option<String>,
}

impl SceneTile {
    fn from_scene(scene: &SceneRecord, cache: &AssetCache) -> Self {
        let cover = scene
            .cover_image
            .as_ref()
            .and_then(|cover| cache.lookup(&cover.id))
            .map(|asset| asset.data_uri());
        Self {
            title: filename_to_title(&scene.filename),
            name: scene.name.clone(),
            path: scene.path.clone(),
            filename: scene.filename.clone(),
            date_label: scene.date_label(),
            cover,
        }
    }
}

pub fn derive_tiles(recents: Option<&RecentScenesConfig>, cache: &AssetCache) -> Vec<SceneTile> {
    recents
        .map(|recents| {
            recents
                .scenes
                .iter()
                .map(|scene| SceneTile::from_scene(scene, cache))
                .collect()
        })
        .unwrap_or_default()
}

/// Caller-owned flags deciding whether a click may start a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadGate {
    pub scene_loading_available: bool,
    pub loading: bool,
}

impl LoadGate {
    pub fn allows_load(&self) -> bool {
        self.scene_loading_available && !self.loading
    }
}

/// `my_cool_scene.json` -> `My Cool Scene`.
pub fn filename_to_title(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    stem.replace('_', " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenedeck_types::{assets::CachedAsset, scene::AssetRef};

    #[test]
    fn filename_titles() {
        assert_eq!(filename_to_title("my_cool_scene.json"), "My Cool Scene");
        assert_eq!(filename_to_title("harbor.v2.json"), "Harbor.v2");
        assert_eq!(filename_to_title("no_extension"), "No Extension");
        assert_eq!(filename_to_title(".hidden"), ".hidden");
        assert_eq!(filename_to_title("éclair_du_soir.json"), "Éclair Du Soir");
        assert_eq!(filename_to_title(""), "");
    }

    #[test]
    fn load_gate() {
        let open = LoadGate {
            scene_loading_available: true,
            loading: false,
        };
        assert!(open.allows_load());
        assert!(!LoadGate { loading: true, ..open }.allows_load());
        assert!(!LoadGate {
            scene_loading_available: false,
            ..open
        }
        .allows_load());
    }

    #[test]
    fn tiles_follow_config_order_and_cache() {
        let recents = RecentScenesConfig {
            scenes: vec![
                SceneRecord {
                    name: "Harbor at Night".into(),
                    path: "/scenes/harbor/harbor_night.json".into(),
                    filename: "harbor_night.json".into(),
                    date: "2024-05-04T21:10:00".into(),
                    cover_image: Some(AssetRef {
                        id: "cover-1".into(),
                        media_type: "image/png".into(),
                        file_type: "png".into(),
                    }),
                },
                SceneRecord {
                    name: "Inn".into(),
                    path: "/scenes/inn/inn.json".into(),
                    filename: "inn.json".into(),
                    date: "2024-05-03T08:00:00".into(),
                    cover_image: None,
                },
            ],
            ..Default::default()
        };
        let mut cache = AssetCache::new();
        let tiles = derive_tiles(Some(&recents), &cache);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].title, "Harbor Night");
        assert_eq!(tiles[0].date_label, "2024-05-04 21:10");
        assert!(tiles[0].cover.is_none());

        cache.insert("cover-1", CachedAsset::new("AAAA", "image/png"));
        let tiles = derive_tiles(Some(&recents), &cache);
        assert_eq!(tiles[0].cover.as_deref(), Some("data:image/png;base64,AAAA"));
        assert!(tiles[1].cover.is_none());

        assert!(derive_tiles(None, &cache).is_empty());
    }
}
