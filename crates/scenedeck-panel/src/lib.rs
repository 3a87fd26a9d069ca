//! Quick-load panel state: recent scenes, cover-image cache and the inbound
//! dispatcher that keeps them in sync with the host.

mod actions;
mod cache;
mod planner;
mod view;

pub use actions::{ConfirmPrompt, DeleteFlow, DeletePhase};
pub use cache::AssetCache;
pub use planner::{plan_cover_requests, AssetRequester, ChannelAssetRequester};
pub use view::{derive_tiles, filename_to_title, LoadGate, SceneTile};

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use scenedeck_network::{HostChannel, MessageHub, Subscription};
use scenedeck_ops::{PendingKind, PendingRequest, RequestWatchdog};
use scenedeck_types::{
    assets::CachedAsset,
    config::{PanelConfig, RefreshPolicy},
    messages::{ConfigNotice, InboundMessage, OutboundMessage},
    scene::{RecentScenesConfig, SceneRecord},
    Result, SceneDeckError,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

/// Notifications for the container that hosts the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    LoadScene { path: String },
    CoversUpdated { ids: Vec<String> },
    RequestOverdue { kind: PendingKind, path: String },
}

/// Collaborators injected at mount time.
pub struct PanelDeps {
    pub channel: Arc<dyn HostChannel>,
    pub hub: MessageHub,
    pub requester: Arc<dyn AssetRequester>,
    pub prompt: Arc<dyn ConfirmPrompt>,
    pub events: UnboundedSender<PanelEvent>,
}

impl PanelDeps {
    /// Wires asset requests through the same channel as scene actions.
    pub fn over_channel(
        channel: Arc<dyn HostChannel>,
        hub: MessageHub,
        prompt: Arc<dyn ConfirmPrompt>,
        events: UnboundedSender<PanelEvent>,
    ) -> Self {
        let requester = Arc::new(ChannelAssetRequester::new(channel.clone()));
        Self {
            channel,
            hub,
            requester,
            prompt,
            events,
        }
    }
}

struct PanelState {
    recents: Option<RecentScenesConfig>,
    cache: AssetCache,
    delete: DeleteFlow,
    watchdog: RequestWatchdog,
}

struct PanelCore {
    state: Mutex<PanelState>,
    policy: RefreshPolicy,
    only_requested_assets: bool,
    channel: Arc<dyn HostChannel>,
    requester: Arc<dyn AssetRequester>,
    prompt: Arc<dyn ConfirmPrompt>,
    events: UnboundedSender<PanelEvent>,
}

impl PanelCore {
    fn state(&self) -> Result<MutexGuard<'_, PanelState>> {
        self.state
            .lock()
            .map_err(|_| panel_error("panel state poisoned"))
    }

    fn emit(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            debug!("panel event receiver dropped");
        }
    }

    fn refresh_covers(&self, trigger: &str) -> Result<usize> {
        let requests = {
            let mut state = self.state()?;
            let requests = plan_cover_requests(state.recents.as_ref(), &state.cache, self.policy);
            for request in &requests {
                state.cache.mark_requested(request.id.clone());
            }
            requests
        };
        if requests.is_empty() {
            trace!("no cover images to request ({trigger})");
            return Ok(0);
        }
        info!("Requesting {} cover image(s) ({trigger})", requests.len());
        self.requester.request_assets(&requests)?;
        Ok(requests.len())
    }

    fn dispatch(&self, message: &InboundMessage) -> Result<()> {
        match message {
            InboundMessage::Assets(batch) => self.receive_assets(batch),
            InboundMessage::Config(ConfigNotice::DeleteSceneComplete) => self.finish_delete(),
            _ => Ok(()),
        }
    }

    fn receive_assets(&self, batch: &BTreeMap<String, CachedAsset>) -> Result<()> {
        let mut updated = Vec::new();
        {
            let mut state = self.state()?;
            for (id, asset) in batch {
                if self.only_requested_assets && !state.cache.was_requested(id) {
                    trace!("skipping asset {id} not requested by this panel");
                    continue;
                }
                state.cache.insert(id.clone(), asset.clone());
                updated.push(id.clone());
            }
        }
        if !updated.is_empty() {
            debug!("cached {} cover image(s)", updated.len());
            self.emit(PanelEvent::CoversUpdated { ids: updated });
        }
        Ok(())
    }

    fn finish_delete(&self) -> Result<()> {
        {
            let mut state = self.state()?;
            if state.delete.complete() {
                info!("Scene deletion acknowledged by host");
            }
            state.watchdog.acknowledge_kind(PendingKind::Delete);
        }
        self.refresh_covers("delete_scene_complete")?;
        Ok(())
    }
}

/// One mounted quick-load panel. Dropping it (or calling [`unmount`])
/// releases its inbound handler and discards the cover cache.
///
/// [`unmount`]: QuickLoadPanel::unmount
pub struct QuickLoadPanel {
    core: Arc<PanelCore>,
    subscription: Option<Subscription>,
}

impl QuickLoadPanel {
    pub fn mount(
        config: &PanelConfig,
        recents: Option<RecentScenesConfig>,
        deps: PanelDeps,
    ) -> Result<Self> {
        let core = Arc::new(PanelCore {
            state: Mutex::new(PanelState {
                recents,
                cache: AssetCache::new(),
                delete: DeleteFlow::default(),
                watchdog: RequestWatchdog::new(config.request_timeout_ms),
            }),
            policy: config.refresh_policy,
            only_requested_assets: config.only_requested_assets,
            channel: deps.channel,
            requester: deps.requester,
            prompt: deps.prompt,
            events: deps.events,
        });

        let handler_core = core.clone();
        let subscription = deps.hub.register(move |message| {
            if let Err(err) = handler_core.dispatch(message) {
                warn!("quick-load panel failed to handle {} message: {err}", message.kind());
            }
        })?;

        if let Err(err) = core.refresh_covers("mount") {
            warn!("initial cover request failed: {err}");
        }
        info!("Quick-load panel mounted ({:?} refresh)", config.refresh_policy);
        Ok(Self {
            core,
            subscription: Some(subscription),
        })
    }

    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }
        info!("Quick-load panel unmounted");
    }

    /// The panel is shown whenever the recent-scenes section exists.
    pub fn is_visible(&self) -> bool {
        self.core
            .state()
            .map(|state| state.recents.is_some())
            .unwrap_or(false)
    }

    pub fn tiles(&self) -> Vec<SceneTile> {
        match self.core.state() {
            Ok(state) => derive_tiles(state.recents.as_ref(), &state.cache),
            Err(err) => {
                warn!("cannot derive tiles: {err}");
                Vec::new()
            }
        }
    }

    pub fn cached_asset(&self, id: &str) -> Option<CachedAsset> {
        self.core.state().ok()?.cache.lookup(id).cloned()
    }

    pub fn delete_phase(&self) -> DeletePhase {
        self.core
            .state()
            .map(|state| state.delete.phase().clone())
            .unwrap_or_default()
    }

    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.core
            .state()
            .map(|state| state.watchdog.pending().to_vec())
            .unwrap_or_default()
    }

    /// Replaces the host-owned recent-scenes section. A present section
    /// reruns the cover planner; the cache itself survives the change.
    pub fn set_recent_scenes(&self, recents: Option<RecentScenesConfig>) -> Result<()> {
        let trigger = {
            let mut state = self.core.state()?;
            let was_present = state.recents.is_some();
            if let Some(new) = &recents {
                let acknowledged = state
                    .watchdog
                    .acknowledge_where(PendingKind::RemoveFromRecents, |path| {
                        new.find(path).is_some()
                    });
                if acknowledged > 0 {
                    debug!("{acknowledged} removal(s) reflected in new configuration");
                }
            }
            state.recents = recents;
            match (was_present, state.recents.is_some()) {
                (false, true) => Some("configuration loaded"),
                (true, true) => Some("configuration changed"),
                _ => None,
            }
        };
        if let Some(trigger) = trigger {
            self.core.refresh_covers(trigger)?;
        }
        Ok(())
    }

    /// Direct entry into the dispatcher, same as a frame arriving on the hub.
    pub fn handle_message(&self, message: &InboundMessage) -> Result<()> {
        self.core.dispatch(message)
    }

    /// Surfaces `path` to the parent unless the gate forbids loading.
    pub fn request_load(&self, path: &str, gate: LoadGate) -> bool {
        if !gate.allows_load() {
            debug!("load of {path} suppressed: {gate:?}");
            return false;
        }
        self.core.emit(PanelEvent::LoadScene { path: path.into() });
        true
    }

    pub fn remove_from_recents(&self, path: &str) -> Result<()> {
        // Tracked before sending so an immediate acknowledgement is not lost.
        self.core
            .state()?
            .watchdog
            .track(PendingKind::RemoveFromRecents, path, Utc::now());
        if let Err(err) = self
            .core
            .channel
            .send(&OutboundMessage::remove_scene_from_recents(path))
        {
            self.core
                .state()?
                .watchdog
                .acknowledge(PendingKind::RemoveFromRecents, path);
            return Err(err);
        }
        info!("Requested removal of {path} from recent scenes");
        Ok(())
    }

    /// Without confirmation this only opens the prompt; the delete request is
    /// sent when called again with `confirmed = true`.
    pub fn delete_scene(&self, scene: &SceneRecord, confirmed: bool) -> Result<()> {
        if !confirmed {
            self.core.state()?.delete.begin(scene.clone());
            self.core.prompt.initiate_action(scene.clone());
            debug!("awaiting confirmation to delete {}", scene.path);
            return Ok(());
        }

        {
            let mut state = self.core.state()?;
            state.delete.sent(scene.path.as_str());
            state
                .watchdog
                .track(PendingKind::Delete, scene.path.as_str(), Utc::now());
        }
        if let Err(err) = self
            .core
            .channel
            .send(&OutboundMessage::delete_scene(scene.path.as_str()))
        {
            let mut state = self.core.state()?;
            state.delete.complete();
            state.watchdog.acknowledge(PendingKind::Delete, &scene.path);
            return Err(err);
        }
        info!("Requested deletion of {}", scene.path);
        Ok(())
    }

    /// Confirms the scene currently awaiting confirmation, if any.
    pub fn confirm_delete(&self) -> Result<bool> {
        let scene = self.core.state()?.delete.awaiting().cloned();
        match scene {
            Some(scene) => {
                self.delete_scene(&scene, true)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn cancel_delete(&self) -> bool {
        self.core
            .state()
            .map(|mut state| state.delete.cancel())
            .unwrap_or(false)
    }

    /// Reports remove/delete requests the host has not acknowledged in time.
    pub fn check_overdue(&self) -> Vec<PendingRequest> {
        let overdue = match self.core.state() {
            Ok(mut state) => state.watchdog.overdue(Utc::now()),
            Err(err) => {
                warn!("cannot check pending requests: {err}");
                return Vec::new();
            }
        };
        for request in &overdue {
            self.core.emit(PanelEvent::RequestOverdue {
                kind: request.kind,
                path: request.path.clone(),
            });
        }
        overdue
    }
}

pub fn panel_error(message: impl Into<String>) -> SceneDeckError {
    SceneDeckError::Panel(message.into())
}
