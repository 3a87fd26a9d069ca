//! Channel facade between the quick-load panel and its host.

mod host;
mod hub;

pub use host::{serve, HostService};
pub use hub::{MessageHub, Subscription};

use futures::{stream::BoxStream, StreamExt};
use scenedeck_types::{
    messages::{InboundMessage, OutboundMessage},
    Result, SceneDeckError,
};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Client-side handle of the shared duplex channel.
pub trait HostChannel: Send + Sync {
    /// Fire-and-forget; replies, if any, arrive on `subscribe`.
    fn send(&self, message: &OutboundMessage) -> Result<()>;
    fn subscribe(&self) -> BoxStream<'static, String>;
}

/// In-process duplex channel: one host, any number of inbound subscribers.
pub struct LocalChannel;

impl LocalChannel {
    pub fn pair(capacity: usize) -> (ClientEndpoint, HostEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _) = broadcast::channel(capacity);
        (
            ClientEndpoint {
                outbound: outbound_tx,
                inbound: inbound_tx.clone(),
            },
            HostEndpoint {
                outbound: outbound_rx,
                pusher: HostPusher { inbound: inbound_tx },
            },
        )
    }
}

#[derive(Clone)]
pub struct ClientEndpoint {
    outbound: mpsc::UnboundedSender<String>,
    inbound: broadcast::Sender<String>,
}

impl HostChannel for ClientEndpoint {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let frame = message.to_json()?;
        debug!("sending frame to host: {frame}");
        self.outbound
            .send(frame)
            .map_err(|_| channel_error("host side of the channel is closed"))
    }

    fn subscribe(&self) -> BoxStream<'static, String> {
        BroadcastStream::new(self.inbound.subscribe())
            .filter_map(|frame| async move {
                match frame {
                    Ok(frame) => Some(frame),
                    Err(err) => {
                        warn!("inbound subscriber dropped frames: {err}");
                        None
                    }
                }
            })
            .boxed()
    }
}

/// Host side: receives client frames, pushes replies to every subscriber.
pub struct HostEndpoint {
    outbound: mpsc::UnboundedReceiver<String>,
    pusher: HostPusher,
}

impl HostEndpoint {
    /// `None` once every client handle is dropped.
    pub async fn recv(&mut self) -> Option<Result<OutboundMessage>> {
        let frame = self.outbound.recv().await?;
        Some(OutboundMessage::from_json(&frame))
    }

    pub fn pusher(&self) -> HostPusher {
        self.pusher.clone()
    }
}

#[derive(Clone)]
pub struct HostPusher {
    inbound: broadcast::Sender<String>,
}

impl HostPusher {
    pub fn push(&self, message: &InboundMessage) {
        self.push_frame(message.to_json());
    }

    /// Raw frames, for hosts that speak envelopes this crate does not model.
    pub fn push_frame(&self, frame: String) {
        if self.inbound.send(frame).is_err() {
            debug!("no inbound subscribers; frame dropped");
        }
    }
}

pub fn channel_error(message: impl Into<String>) -> SceneDeckError {
    SceneDeckError::Channel(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_frames_reach_the_host() {
        let (client, mut host) = LocalChannel::pair(8);
        client
            .send(&OutboundMessage::delete_scene("/scenes/a.json"))
            .expect("send");
        let received = host.recv().await.expect("frame").expect("decode");
        assert_eq!(received, OutboundMessage::delete_scene("/scenes/a.json"));
    }

    #[tokio::test]
    async fn host_pushes_fan_out_to_every_subscriber() {
        let (client, host) = LocalChannel::pair(8);
        let mut first = client.subscribe();
        let mut second = client.subscribe();
        host.pusher().push(&InboundMessage::delete_scene_complete());
        let a = first.next().await.expect("first frame");
        let b = second.next().await.expect("second frame");
        assert_eq!(a, b);
        assert_eq!(
            InboundMessage::from_json(&a).expect("parse"),
            InboundMessage::delete_scene_complete()
        );
    }

    #[tokio::test]
    async fn send_fails_once_host_is_gone() {
        let (client, host) = LocalChannel::pair(8);
        drop(host);
        assert!(client
            .send(&OutboundMessage::remove_scene_from_recents("/a.json"))
            .is_err());
    }
}
