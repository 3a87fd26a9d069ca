//! Directory-backed host: serves cover images from disk and maintains the
//! recent-scenes section of the config file.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use scenedeck_network::{HostPusher, HostService};
use scenedeck_types::{
    assets::{AssetRequest, CachedAsset},
    config::AppConfig,
    messages::{ConfigRequest, InboundMessage, OutboundMessage},
    Result, SceneDeckError,
};
use serde_json::json;
use tracing::{debug, info, warn};

/// Envelope type carrying the refreshed configuration back to clients.
pub const APP_CONFIG: &str = "app_config";

pub struct DirectoryHost {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl DirectoryHost {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    fn asset_path(&self, request: &AssetRequest) -> PathBuf {
        Path::new(&self.config.host.assets_dir).join(format!("{}.{}", request.id, request.file_type))
    }

    async fn load_assets(&self, requests: Vec<AssetRequest>) -> Vec<(String, CachedAsset)> {
        let mut loaded = Vec::with_capacity(requests.len());
        for request in requests {
            let path = self.asset_path(&request);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!("serving {} ({} bytes)", path.display(), bytes.len());
                    loaded.push((request.id, CachedAsset::from_bytes(&bytes, request.media_type)));
                }
                Err(err) => warn!("cover {} unavailable at {}: {err}", request.id, path.display()),
            }
        }
        loaded
    }

    fn forget_scene(&mut self, path: &str) -> Result<bool> {
        let removed = self
            .config
            .recent_scenes
            .as_mut()
            .map(|recents| recents.remove(path))
            .unwrap_or(false);
        if removed {
            if let Some(config_path) = &self.config_path {
                self.config.save(config_path)?;
            }
        }
        Ok(removed)
    }

    fn push_config(&self, replies: &HostPusher) {
        replies.push_frame(
            json!({
                "type": APP_CONFIG,
                "data": { "recent_scenes": self.config.recent_scenes },
            })
            .to_string(),
        );
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let scenes_dir = Path::new(&self.config.host.scenes_dir);
        let target = Path::new(path);
        let lexically_inside = target.starts_with(scenes_dir)
            && !target
                .components()
                .any(|component| matches!(component, Component::ParentDir));
        if !lexically_inside {
            return Err(outside_scenes_dir(path, scenes_dir));
        }

        let resolved = match tokio::fs::canonicalize(target).await {
            Ok(resolved) => resolved,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{path} already gone");
                return Ok(());
            }
            Err(err) => return Err(host_error(format!("failed to resolve {path}: {err}"))),
        };
        let scenes_root = tokio::fs::canonicalize(scenes_dir).await.map_err(|err| {
            host_error(format!(
                "failed to resolve scenes dir {}: {err}",
                scenes_dir.display()
            ))
        })?;
        // Symlinks inside the scenes dir may still point elsewhere.
        if !resolved.starts_with(&scenes_root) {
            return Err(outside_scenes_dir(path, scenes_dir));
        }

        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{path} already gone");
                Ok(())
            }
            Err(err) => Err(host_error(format!("failed to delete {path}: {err}"))),
        }
    }
}

fn outside_scenes_dir(path: &str, scenes_dir: &Path) -> SceneDeckError {
    host_error(format!(
        "refusing to delete {path}: outside {}",
        scenes_dir.display()
    ))
}

#[async_trait]
impl HostService for DirectoryHost {
    async fn handle(&mut self, message: OutboundMessage, replies: &HostPusher) -> Result<()> {
        match message {
            OutboundMessage::RequestAssets { assets } => {
                let loaded = self.load_assets(assets).await;
                if !loaded.is_empty() {
                    replies.push(&InboundMessage::assets(loaded));
                }
            }
            OutboundMessage::Config(ConfigRequest::RemoveSceneFromRecents { path }) => {
                if self.forget_scene(&path)? {
                    info!("Removed {path} from recent scenes");
                }
                self.push_config(replies);
            }
            OutboundMessage::Config(ConfigRequest::DeleteScene { path }) => {
                self.delete_file(&path).await?;
                self.forget_scene(&path)?;
                info!("Deleted scene {path}");
                self.push_config(replies);
                replies.push(&InboundMessage::delete_scene_complete());
            }
        }
        Ok(())
    }
}

pub fn host_error(message: impl Into<String>) -> SceneDeckError {
    SceneDeckError::Host(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use scenedeck_network::{HostChannel, LocalChannel};
    use scenedeck_types::scene::{AssetRef, RecentScenesConfig, SceneRecord};
    use std::fs;

    fn workspace(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("scenedeck-host-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("scenes")).expect("scenes dir");
        fs::create_dir_all(root.join("assets")).expect("assets dir");
        root
    }

    fn host_for(root: &Path) -> (DirectoryHost, String) {
        let scene_path = root.join("scenes").join("harbor_night.json");
        fs::write(&scene_path, "{}").expect("scene file");
        let scene_path = scene_path.to_string_lossy().into_owned();
        let mut config = AppConfig::default();
        config.host.scenes_dir = root.join("scenes").to_string_lossy().into_owned();
        config.host.assets_dir = root.join("assets").to_string_lossy().into_owned();
        config.recent_scenes = Some(RecentScenesConfig {
            scenes: vec![SceneRecord {
                name: "Harbor".into(),
                path: scene_path.clone(),
                filename: "harbor_night.json".into(),
                date: "2024-05-04T21:10:00".into(),
                cover_image: Some(AssetRef {
                    id: "cover-a".into(),
                    media_type: "image/png".into(),
                    file_type: "png".into(),
                }),
            }],
            ..Default::default()
        });
        (DirectoryHost::new(config, Some(root.join("config.toml"))), scene_path)
    }

    #[tokio::test]
    async fn serves_covers_found_on_disk() {
        let root = workspace("assets");
        fs::write(root.join("assets").join("cover-a.png"), b"png").expect("cover file");
        let (mut host, scene_path) = host_for(&root);
        let (client, endpoint) = LocalChannel::pair(8);
        let mut inbound = client.subscribe();

        let request = |id: &str| AssetRequest {
            path: scene_path.clone(),
            id: id.into(),
            media_type: "image/png".into(),
            file_type: "png".into(),
        };
        host.handle(
            OutboundMessage::RequestAssets {
                assets: vec![request("cover-a"), request("missing")],
            },
            &endpoint.pusher(),
        )
        .await
        .expect("handle");

        let frame = inbound.next().await.expect("assets frame");
        let InboundMessage::Assets(batch) = InboundMessage::from_json(&frame).expect("parse") else {
            panic!("expected assets frame");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["cover-a"].decode().expect("decode"), b"png");
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn delete_removes_file_and_entry_then_reports_completion() {
        let root = workspace("delete");
        let (mut host, scene_path) = host_for(&root);
        let (client, endpoint) = LocalChannel::pair(8);
        let mut inbound = client.subscribe();

        host.handle(OutboundMessage::delete_scene(scene_path.as_str()), &endpoint.pusher())
            .await
            .expect("delete");

        assert!(!Path::new(&scene_path).exists());
        let config_frame = inbound.next().await.expect("config frame");
        let value: serde_json::Value = serde_json::from_str(&config_frame).expect("json");
        assert_eq!(value["type"], APP_CONFIG);
        assert_eq!(value["data"]["recent_scenes"]["scenes"], json!([]));
        let done = inbound.next().await.expect("completion frame");
        assert_eq!(
            InboundMessage::from_json(&done).expect("parse"),
            InboundMessage::delete_scene_complete()
        );
        let saved = AppConfig::from_file(root.join("config.toml")).expect("saved config");
        assert!(saved.recent_scenes.expect("recents").is_empty());
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn delete_outside_scenes_dir_is_refused() {
        let root = workspace("outside");
        let (mut host, _) = host_for(&root);
        let (_client, endpoint) = LocalChannel::pair(8);
        let outside = root.join("config.toml").to_string_lossy().into_owned();
        fs::write(&outside, "").expect("bystander file");

        let result = host
            .handle(OutboundMessage::delete_scene(outside.as_str()), &endpoint.pusher())
            .await;
        assert!(result.is_err());
        assert!(Path::new(&outside).exists());
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn delete_climbing_out_of_scenes_dir_is_refused() {
        let root = workspace("traversal");
        let (mut host, _) = host_for(&root);
        let (_client, endpoint) = LocalChannel::pair(8);
        let victim = root.join("victim.toml");
        fs::write(&victim, "").expect("victim file");
        let climbing = root
            .join("scenes")
            .join("..")
            .join("victim.toml")
            .to_string_lossy()
            .into_owned();

        let result = host
            .handle(OutboundMessage::delete_scene(climbing.as_str()), &endpoint.pusher())
            .await;
        assert!(result.is_err());
        assert!(victim.exists());
        assert_eq!(host.config.recent_scenes.as_ref().expect("recents").scenes.len(), 1);
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delete_through_symlink_leaving_scenes_dir_is_refused() {
        let root = workspace("symlink");
        let (mut host, _) = host_for(&root);
        let (_client, endpoint) = LocalChannel::pair(8);
        let victim = root.join("victim.toml");
        fs::write(&victim, "").expect("victim file");
        let link = root.join("scenes").join("linked.json");
        std::os::unix::fs::symlink(&victim, &link).expect("symlink");

        let result = host
            .handle(
                OutboundMessage::delete_scene(link.to_string_lossy().as_ref()),
                &endpoint.pusher(),
            )
            .await;
        assert!(result.is_err());
        assert!(victim.exists());
        fs::remove_dir_all(&root).expect("cleanup");
    }
}
