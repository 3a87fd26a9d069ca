use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{scene::SceneRecord, Result, SceneDeckError};

/// Image payload delivered by the host, keyed by asset id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
    pub base64: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
}

impl CachedAsset {
    pub fn new(base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            media_type: media_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        Self::new(STANDARD.encode(bytes), media_type)
    }

    /// Renderable `data:` URI built from the stored payload.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.base64.as_bytes())
            .map_err(|err| SceneDeckError::Asset(format!("invalid base64 payload: {err}")))
    }
}

/// Fetch request for a single cover image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub path: String,
    pub id: String,
    pub media_type: String,
    pub file_type: String,
}

impl AssetRequest {
    /// `None` when the scene has no cover image.
    pub fn for_scene(scene: &SceneRecord) -> Option<Self> {
        let cover = scene.cover_image.as_ref()?;
        Some(Self {
            path: scene.path.clone(),
            id: cover.id.clone(),
            media_type: cover.media_type.clone(),
            file_type: cover.file_type.clone(),
        })
    }
}
