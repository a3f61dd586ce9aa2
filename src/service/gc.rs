//! Game Coordinator sub-channel.
//!
//! GC traffic is tunnelled through the CM connection: outbound messages
//! are wrapped in `ClientToGC`, inbound ones arrive in `ClientFromGC` and
//! are unwrapped into [`GcPacket`]s for the handlers registered with
//! [`Client::register_gc_handler`].

use crate::error::Result;
use crate::protocol::emsg::EMsg;
use crate::protocol::gc::{self, GcMessage, GcPacket};
use crate::protocol::message::ProtoMessage;
use crate::protocol::packet::Packet;
use crate::protocol::proto::{CMsgClientGamesPlayed, CMsgGCClient, GamePlayed};
use crate::service::client::Client;
use tracing::{debug, trace};

/// Borrowed handle for talking to Game Coordinators.
#[derive(Clone, Copy)]
pub struct GameCoordinator<'a> {
    client: &'a Client,
}

impl Client {
    pub fn gc(&self) -> GameCoordinator<'_> {
        GameCoordinator { client: self }
    }
}

impl<'a> GameCoordinator<'a> {
    /// Sends `msg` to the coordinator of its app.
    ///
    /// The envelope is routed by the app id carried in `msg`.
    pub fn write(&self, msg: &dyn GcMessage) {
        let envelope = gc::wrap(msg);
        let app_id = msg.app_id();
        trace!(app_id, msg_type = msg.msg_type(), "GC message queued");
        self.client.write(
            ProtoMessage::new(EMsg::ClientToGC, envelope).with_routing_app_id(app_id),
        );
    }

    /// Tells Steam which apps are running. A coordinator only talks to
    /// clients playing its app; an empty slice stops all of them.
    pub fn set_games_played(&self, app_ids: &[u64]) {
        let body = CMsgClientGamesPlayed {
            games_played: app_ids
                .iter()
                .map(|&game_id| GamePlayed {
                    game_id: Some(game_id),
                })
                .collect(),
        };
        debug!(?app_ids, "setting games played");
        self.client
            .write(ProtoMessage::new(EMsg::ClientGamesPlayed, body));
    }

    pub fn register_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Client, &GcPacket) + Send + Sync + 'static,
    {
        self.client.register_gc_handler(handler)
    }
}

/// Packet handler unwrapping `ClientFromGC` for the GC dispatcher.
pub(crate) fn handle_packet(client: &Client, packet: &Packet) {
    if packet.emsg() != EMsg::ClientFromGC {
        return;
    }

    let outcome = packet
        .read_proto::<CMsgGCClient>()
        .and_then(|msg| GcPacket::new(&msg.body))
        .and_then(|gc_packet| {
            trace!(
                app_id = gc_packet.app_id,
                msg_type = gc_packet.msg_type,
                "GC packet received"
            );
            client.gc_handlers().dispatch(client, &gc_packet)
        });

    if let Err(e) = outcome {
        client.report(e);
    }
}
