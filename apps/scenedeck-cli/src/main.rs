mod host;
mod ui;

use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use scenedeck_network::{serve, HostChannel, LocalChannel, MessageHub, Subscription};
use scenedeck_ops::init_tracing;
use scenedeck_panel::{
    filename_to_title, ConfirmPrompt, DeletePhase, LoadGate, PanelDeps, PanelEvent,
    QuickLoadPanel,
};
use scenedeck_types::{
    config::AppConfig,
    messages::InboundMessage,
    scene::{RecentScenesConfig, SceneRecord},
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::host::{DirectoryHost, APP_CONFIG};

#[derive(Parser)]
#[command(name = "scenedeck", about = "Quick-load list of recently used scenes")]
struct Cli {
    /// Config file; falls back to SCENEDECK_CONFIG, then configs/dev.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// How long to wait for cover images before printing.
    #[arg(long, default_value_t = 1_500)]
    wait_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the quick-load tiles.
    List,
    /// Ask the parent to load a listed scene.
    Load {
        path: String,
        /// Pretend a load is already running.
        #[arg(long)]
        busy: bool,
        /// Pretend scene loading is unavailable.
        #[arg(long)]
        unavailable: bool,
    },
    /// Drop a scene from the quick-load list without deleting it.
    Remove { path: String },
    /// Permanently delete a scene file.
    Delete {
        path: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// Forwards confirmation requests to the command loop.
struct ChannelPrompt {
    tx: mpsc::UnboundedSender<SceneRecord>,
}

impl ConfirmPrompt for ChannelPrompt {
    fn initiate_action(&self, scene: SceneRecord) {
        if self.tx.send(scene).is_err() {
            warn!("confirmation prompt closed");
        }
    }
}

struct Session {
    panel: QuickLoadPanel,
    events: mpsc::UnboundedReceiver<PanelEvent>,
    config_updates: mpsc::UnboundedReceiver<Option<RecentScenesConfig>>,
    prompts: mpsc::UnboundedReceiver<SceneRecord>,
    _config_subscription: Subscription,
}

impl Session {
    /// Applies host pushes until `done` holds or `wait` elapses.
    async fn settle<F>(&mut self, wait: Duration, done: F) -> bool
    where
        F: Fn(&QuickLoadPanel) -> bool,
    {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if done(&self.panel) {
                self.drain_config_updates();
                return true;
            }
            tokio::select! {
                Some(update) = self.config_updates.recv() => self.apply_config(update),
                Some(event) = self.events.recv() => println!("{}", ui::format_event(&event)),
                _ = tokio::time::sleep_until(deadline) => {
                    self.drain_config_updates();
                    return done(&self.panel);
                }
            }
        }
    }

    /// Applies configuration pushes that are already queued.
    fn drain_config_updates(&mut self) {
        while let Ok(update) = self.config_updates.try_recv() {
            self.apply_config(update);
        }
    }

    fn apply_config(&self, update: Option<RecentScenesConfig>) {
        if let Err(err) = self.panel.set_recent_scenes(update) {
            warn!("failed to apply configuration update: {err}");
        }
    }

    fn report_overdue(&self) {
        for request in self.panel.check_overdue() {
            println!(
                "{}",
                ui::format_event(&PanelEvent::RequestOverdue {
                    kind: request.kind,
                    path: request.path,
                })
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config.clone());
    init_tracing(&config.ops)?;

    let (client, host) = LocalChannel::pair(config.panel.channel_capacity);
    let channel: Arc<dyn HostChannel> = Arc::new(client);
    let hub = MessageHub::new();
    let pump = tokio::spawn({
        let hub = hub.clone();
        let frames = channel.subscribe();
        async move { hub.pump(frames).await }
    });
    let host_task = tokio::spawn(serve(host, DirectoryHost::new(config.clone(), config_path)));

    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let config_subscription = hub.register(move |message| {
        if let InboundMessage::Other { kind, payload } = message {
            if kind == APP_CONFIG && config_tx.send(recent_scenes_from(payload)).is_err() {
                warn!("configuration update dropped");
            }
        }
    })?;

    let (prompt_tx, prompts) = mpsc::unbounded_channel();
    let (events_tx, events) = mpsc::unbounded_channel();
    let panel = QuickLoadPanel::mount(
        &config.panel,
        config.recent_scenes.clone(),
        PanelDeps::over_channel(
            channel.clone(),
            hub.clone(),
            Arc::new(ChannelPrompt { tx: prompt_tx }),
            events_tx,
        ),
    )?;
    let mut session = Session {
        panel,
        events,
        config_updates,
        prompts,
        _config_subscription: config_subscription,
    };

    let expected_covers = config
        .recent_scenes
        .as_ref()
        .map(|recents| recents.scenes.iter().filter(|s| s.cover_image.is_some()).count())
        .unwrap_or(0);
    session
        .settle(Duration::from_millis(cli.wait_ms), |panel| {
            panel.tiles().iter().filter(|t| t.cover.is_some()).count() >= expected_covers
        })
        .await;

    let ack_wait = Duration::from_millis(config.panel.request_timeout_ms);
    match cli.command {
        Command::List => {}
        Command::Load {
            path,
            busy,
            unavailable,
        } => {
            find_scene(&config, &path)?;
            let gate = LoadGate {
                scene_loading_available: !unavailable,
                loading: busy,
            };
            if !session.panel.request_load(&path, gate) {
                println!("Scene loading is not possible right now.");
            }
            session.settle(Duration::from_millis(50), |_| false).await;
        }
        Command::Remove { path } => {
            find_scene(&config, &path)?;
            session.panel.remove_from_recents(&path)?;
            let acknowledged = session
                .settle(ack_wait, |panel| panel.pending_requests().is_empty())
                .await;
            if !acknowledged {
                session.report_overdue();
            }
        }
        Command::Delete { path, yes } => {
            let scene = find_scene(&config, &path)?;
            session.panel.delete_scene(&scene, false)?;
            let context = session
                .prompts
                .recv()
                .await
                .ok_or_else(|| anyhow!("confirmation prompt closed"))?;
            if yes || confirm(&context).await? {
                session.panel.delete_scene(&context, true)?;
                let finished = session
                    .settle(ack_wait, |panel| panel.delete_phase() == DeletePhase::Idle)
                    .await;
                if !finished {
                    session.report_overdue();
                }
            } else {
                session.panel.cancel_delete();
                println!("Deletion cancelled.");
            }
        }
    }

    println!("{}", ui::format_tiles(&session.panel.tiles()));

    session.panel.unmount();
    drop(channel);
    pump.abort();
    match tokio::time::timeout(Duration::from_secs(1), host_task).await {
        Ok(joined) => joined??,
        Err(_) => warn!("host did not shut down in time"),
    }
    info!("SceneDeck session finished");
    Ok(())
}

fn recent_scenes_from(payload: &Value) -> Option<RecentScenesConfig> {
    let raw = payload.get("data")?.get("recent_scenes")?;
    if raw.is_null() {
        return None;
    }
    match serde_json::from_value(raw.clone()) {
        Ok(recents) => Some(recents),
        Err(err) => {
            warn!("ignoring malformed recent_scenes push: {err}");
            None
        }
    }
}

fn find_scene(config: &AppConfig, path: &str) -> Result<SceneRecord> {
    config
        .recent_scenes
        .as_ref()
        .and_then(|recents| recents.find(path))
        .cloned()
        .ok_or_else(|| anyhow!("{path} is not in the recent scenes list"))
}

async fn confirm(scene: &SceneRecord) -> Result<bool> {
    print!(
        "Delete '{}' ({}) permanently? [y/N] ",
        filename_to_title(&scene.filename),
        scene.path
    );
    io::stdout().flush()?;
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn load_config(explicit: Option<PathBuf>) -> (AppConfig, Option<PathBuf>) {
    let path = explicit
        .or_else(|| env::var("SCENEDECK_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    match AppConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                (default_config(), None)
            } else {
                (cfg, Some(path))
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            (default_config(), None)
        }
    }
}

fn default_config() -> AppConfig {
    let config = AppConfig {
        recent_scenes: Some(RecentScenesConfig::default()),
        ..Default::default()
    };
    debug_assert!(config.validate().is_ok());
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_config_pushes_carry_recent_scenes() {
        let payload = json!({
            "type": APP_CONFIG,
            "data": {"recent_scenes": {"max_entries": 3, "scenes": []}},
        });
        let recents = recent_scenes_from(&payload).expect("recents");
        assert_eq!(recents.max_entries, 3);
        assert!(recents.is_empty());

        assert!(recent_scenes_from(&json!({"data": {"recent_scenes": null}})).is_none());
        assert!(recent_scenes_from(&json!({"data": {"recent_scenes": {"scenes": 4}}})).is_none());
        assert!(recent_scenes_from(&json!({"type": APP_CONFIG})).is_none());
    }

    fn scene(path: &str) -> SceneRecord {
        SceneRecord {
            name: "Harbor".into(),
            path: path.into(),
            filename: "harbor_night.json".into(),
            date: "2024-05-04T21:10:00".into(),
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn settle_applies_queued_config_before_returning() {
        let (client, _host) = LocalChannel::pair(8);
        let hub = MessageHub::new();
        let (prompt_tx, prompts) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let recents = RecentScenesConfig {
            scenes: vec![scene("/scenes/harbor_night.json")],
            ..Default::default()
        };
        let panel = QuickLoadPanel::mount(
            &Default::default(),
            Some(recents),
            PanelDeps::over_channel(
                Arc::new(client),
                hub.clone(),
                Arc::new(ChannelPrompt { tx: prompt_tx }),
                events_tx,
            ),
        )
        .expect("mount");
        let (config_tx, config_updates) = mpsc::unbounded_channel();
        let mut session = Session {
            panel,
            events,
            config_updates,
            prompts,
            _config_subscription: hub.register(|_| {}).expect("register"),
        };

        config_tx
            .send(Some(RecentScenesConfig::default()))
            .expect("queue update");
        assert!(session.settle(Duration::from_millis(200), |_| true).await);
        assert!(session.panel.tiles().is_empty());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let (config, path) = load_config(Some(PathBuf::from("/nonexistent/scenedeck.toml")));
        assert!(path.is_none());
        assert!(config.recent_scenes.expect("recents").is_empty());
    }

    #[test]
    fn cli_parses_delete_with_confirmation_flag() {
        let cli = Cli::try_parse_from(["scenedeck", "delete", "/scenes/a.json", "--yes"])
            .expect("parse");
        match cli.command {
            Command::Delete { path, yes } => {
                assert_eq!(path, "/scenes/a.json");
                assert!(yes);
            }
            _ => panic!("expected delete"),
        }
        assert_eq!(cli.wait_ms, 1_500);
    }
}
