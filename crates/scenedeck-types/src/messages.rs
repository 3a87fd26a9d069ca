//! JSON envelopes exchanged over the shared host channel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    assets::{AssetRequest, CachedAsset},
    Result, SceneDeckError,
};

/// Messages this client sends to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Config(ConfigRequest),
    RequestAssets { assets: Vec<AssetRequest> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConfigRequest {
    RemoveSceneFromRecents { path: String },
    DeleteScene { path: String },
}

impl OutboundMessage {
    pub fn remove_scene_from_recents(path: impl Into<String>) -> Self {
        Self::Config(ConfigRequest::RemoveSceneFromRecents { path: path.into() })
    }

    pub fn delete_scene(path: impl Into<String>) -> Self {
        Self::Config(ConfigRequest::DeleteScene { path: path.into() })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| protocol_error(format!("failed to encode outbound message: {err}")))
    }

    pub fn from_json(frame: &str) -> Result<Self> {
        serde_json::from_str(frame)
            .map_err(|err| protocol_error(format!("failed to decode outbound message: {err}")))
    }
}

/// Sub-actions of inbound `config` messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    DeleteSceneComplete,
    Other(String),
}

impl ConfigNotice {
    pub const DELETE_SCENE_COMPLETE: &'static str = "delete_scene_complete";

    fn from_action(action: &str) -> Self {
        match action {
            Self::DELETE_SCENE_COMPLETE => Self::DeleteSceneComplete,
            other => Self::Other(other.to_owned()),
        }
    }

    fn action(&self) -> &str {
        match self {
            Self::DeleteSceneComplete => Self::DELETE_SCENE_COMPLETE,
            Self::Other(action) => action.as_str(),
        }
    }
}

/// Messages pushed by the host. The channel is shared, so anything that is
/// not addressed to the quick-load panel lands in `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Assets(BTreeMap<String, CachedAsset>),
    Config(ConfigNotice),
    Other { kind: String, payload: Value },
}

impl InboundMessage {
    pub fn delete_scene_complete() -> Self {
        Self::Config(ConfigNotice::DeleteSceneComplete)
    }

    pub fn assets<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CachedAsset)>,
        K: Into<String>,
    {
        Self::Assets(
            entries
                .into_iter()
                .map(|(id, asset)| (id.into(), asset))
                .collect(),
        )
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Assets(_) => "assets",
            Self::Config(_) => "config",
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn from_json(frame: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(frame)
            .map_err(|err| protocol_error(format!("inbound frame is not JSON: {err}")))?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        match kind.as_str() {
            "assets" => {
                let assets = value.get_mut("assets").map(Value::take).unwrap_or(Value::Null);
                let batch = serde_json::from_value(assets)
                    .map_err(|err| protocol_error(format!("malformed assets payload: {err}")))?;
                Ok(Self::Assets(batch))
            }
            "config" => {
                let action = value
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Self::Config(ConfigNotice::from_action(action)))
            }
            _ => Ok(Self::Other {
                kind,
                payload: value,
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Assets(batch) => json!({ "type": "assets", "assets": batch }),
            Self::Config(notice) => json!({ "type": "config", "action": notice.action() }),
            Self::Other { payload, .. } => payload.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

fn protocol_error(message: String) -> SceneDeckError {
    SceneDeckError::Protocol(message)
}
