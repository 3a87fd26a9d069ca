use std::sync::Arc;

use scenedeck_network::HostChannel;
use scenedeck_types::{
    assets::AssetRequest, config::RefreshPolicy, messages::OutboundMessage,
    scene::RecentScenesConfig, Result,
};

use crate::cache::AssetCache;

/// Fire-and-forget fetch of asset bytes; payloads arrive later as `assets`
/// messages on the shared channel.
pub trait AssetRequester: Send + Sync {
    fn request_assets(&self, requests: &[AssetRequest]) -> Result<()>;
}

/// Sends `request_assets` envelopes over the host channel.
pub struct ChannelAssetRequester {
    channel: Arc<dyn HostChannel>,
}

impl ChannelAssetRequester {
    pub fn new(channel: Arc<dyn HostChannel>) -> Self {
        Self { channel }
    }
}

impl AssetRequester for ChannelAssetRequester {
    fn request_assets(&self, requests: &[AssetRequest]) -> Result<()> {
        self.channel.send(&OutboundMessage::RequestAssets {
            assets: requests.to_vec(),
        })
    }
}

/// One request per listed scene with a cover image, in list order.
///
/// Under [`RefreshPolicy::Missing`] ids already in `cache` are skipped.
/// Scenes sharing a cover id each get their own request.
pub fn plan_cover_requests(
    recents: Option<&RecentScenesConfig>,
    cache: &AssetCache,
    policy: RefreshPolicy,
) -> Vec<AssetRequest> {
    let Some(recents) = recents else {
        return Vec::new();
    };
    recents
        .scenes
        .iter()
        .filter_map(AssetRequest::for_scene)
        .filter(|request| match policy {
            RefreshPolicy::All => true,
            RefreshPolicy::Missing => !cache.contains(&request.id),
        })
        .collect()
}
