use async_trait::async_trait;
use scenedeck_types::{messages::OutboundMessage, Result};
use tracing::{info, warn};

use crate::{HostEndpoint, HostPusher};

/// Host-side handler for frames sent by the client.
#[async_trait]
pub trait HostService: Send {
    async fn handle(&mut self, message: OutboundMessage, replies: &HostPusher) -> Result<()>;
}

/// Feeds client frames to `service` until every client handle is dropped.
/// Undecodable frames and handler failures are logged and skipped.
pub async fn serve<S: HostService>(mut host: HostEndpoint, mut service: S) -> Result<()> {
    info!("Starting host service loop");
    let replies = host.pusher();
    while let Some(frame) = host.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                warn!("host ignoring frame: {err}");
                continue;
            }
        };
        if let Err(err) = service.handle(message, &replies).await {
            warn!("host failed to handle request: {err}");
        }
    }
    info!("Host service loop finished; client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostChannel, LocalChannel};
    use futures::StreamExt;
    use scenedeck_types::{
        assets::CachedAsset,
        messages::{ConfigRequest, InboundMessage},
        SceneDeckError,
    };

    struct EchoAssets {
        handled: usize,
    }

    #[async_trait]
    impl HostService for EchoAssets {
        async fn handle(&mut self, message: OutboundMessage, replies: &HostPusher) -> Result<()> {
            self.handled += 1;
            match message {
                OutboundMessage::RequestAssets { assets } => {
                    replies.push(&InboundMessage::assets(
                        assets
                            .into_iter()
                            .map(|req| (req.id, CachedAsset::new("AAAA", req.media_type))),
                    ));
                    Ok(())
                }
                OutboundMessage::Config(ConfigRequest::DeleteScene { path }) => {
                    Err(SceneDeckError::Host(format!("refusing to delete {path}")))
                }
                OutboundMessage::Config(_) => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn serve_answers_until_client_disconnects() {
        let (client, host) = LocalChannel::pair(8);
        let mut inbound = client.subscribe();
        let task = tokio::spawn(serve(host, EchoAssets { handled: 0 }));

        client
            .send(&OutboundMessage::delete_scene("/a.json"))
            .expect("send delete");
        client
            .send(&OutboundMessage::RequestAssets {
                assets: vec![scenedeck_types::assets::AssetRequest {
                    path: "/a.json".into(),
                    id: "cover".into(),
                    media_type: "image/png".into(),
                    file_type: "png".into(),
                }],
            })
            .expect("send request");

        let frame = inbound.next().await.expect("reply");
        let InboundMessage::Assets(batch) = InboundMessage::from_json(&frame).expect("parse")
        else {
            panic!("expected assets reply");
        };
        assert!(batch.contains_key("cover"));

        drop(client);
        task.await.expect("join").expect("serve result");
    }
}
