//! A room of peers exchanging typed messages
//!
//! A [`Room`] keeps the roster of connected players and fans inbound envelopes out to typed
//! subscriptions. It never talks to the network itself; it sends through a [`Transport`] and is
//! handed inbound traffic one [`Inbound`] at a time by whoever drives the transport, so handlers
//! never run concurrently.

use core::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

mod local;
mod messenger;
mod room;

pub use local::{LocalHub, LocalLink};
pub use messenger::{Messenger, Received, Subscription};
pub use room::{PlayerInfo, Room, RoomConfig, RosterEvent};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("room is full ({capacity} players)")]
    Full { capacity: usize },
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("this peer has left the room")]
    Left,
    #[error("malformed {kind} payload")]
    Payload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// Identifies one connection in a room
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);
impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    Configuration,
    MoveProposal,
    BlockFinalized,
    PlayerAdd,
    PlayerRemove,
    Choice,
    Ping,
    Pong,
    Resync,
}
impl MessageType {
    pub const ALL: [MessageType; 9] = [
        MessageType::Configuration,
        MessageType::MoveProposal,
        MessageType::BlockFinalized,
        MessageType::PlayerAdd,
        MessageType::PlayerRemove,
        MessageType::Choice,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::Resync,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            MessageType::Configuration => "configuration",
            MessageType::MoveProposal => "move-proposal",
            MessageType::BlockFinalized => "block-finalized",
            MessageType::PlayerAdd => "player-add",
            MessageType::PlayerRemove => "player-remove",
            MessageType::Choice => "choice",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Resync => "resync",
        }
    }
}
impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What travels between peers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub origin: PeerId,
    pub payload: serde_json::Value,
}
impl Envelope {
    pub fn new<P: Payload>(origin: PeerId, payload: &P) -> Result<Self> {
        let payload = serde_json::to_value(payload).map_err(|source| Error::Payload {
            kind: P::KIND,
            source,
        })?;
        Ok(Self {
            kind: P::KIND,
            origin,
            payload,
        })
    }

    /// Decode the payload as `P`, which must be the payload type for this envelope's kind
    pub fn decode<P: Payload>(&self) -> Result<P> {
        P::decode(self.payload.clone())
    }
}

/// A payload type, tied to the one message type that carries it
pub trait Payload: Serialize + DeserializeOwned {
    const KIND: MessageType;

    fn decode(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| Error::Payload {
            kind: Self::KIND,
            source,
        })
    }
}

/// Where an outbound envelope goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every other member of the room
    Broadcast,
    Peer(PeerId),
}

/// Something handed to a room by its transport
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Message(Envelope),
    Joined(PeerId),
    Left(PeerId),
}

/// The peer-to-peer channel a room sends through
///
/// Delivery is assumed reliable and in order per sender. Inbound traffic does not come through
/// this trait: the driver of the transport passes it to [`Room::handle`].
pub trait Transport {
    /// The id this transport is known by to the other peers
    fn local_id(&self) -> PeerId;

    fn send(&mut self, target: Target, envelope: Envelope) -> Result<()>;

    /// Leave the room; other members are told this peer left
    fn disconnect(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
}
impl Payload for Ping {
    const KIND: MessageType = MessageType::Ping;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub nonce: u64,
}
impl Payload for Pong {
    const KIND: MessageType = MessageType::Pong;
}

/// Announcement of a member joining, sent by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAdd {
    pub peer: PeerId,
}
impl Payload for PlayerAdd {
    const KIND: MessageType = MessageType::PlayerAdd;
}

/// Announcement of a member leaving, sent by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRemove {
    pub peer: PeerId,
}
impl Payload for PlayerRemove {
    const KIND: MessageType = MessageType::PlayerRemove;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_types_use_wire_names() {
        for kind in MessageType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.name().to_owned()));
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::new(PeerId(3), &Ping { nonce: 7 }).unwrap();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({"type": "ping", "origin": 3, "payload": {"nonce": 7}})
        );
        assert_eq!(envelope.decode::<Ping>().unwrap(), Ping { nonce: 7 });
    }

    #[test]
    fn test_decoding_the_wrong_payload_fails() {
        let envelope = Envelope::new(PeerId(1), &PlayerAdd { peer: PeerId(2) }).unwrap();
        assert!(matches!(
            envelope.decode::<Ping>(),
            Err(Error::Payload {
                kind: MessageType::Ping,
                ..
            })
        ));
    }
}
