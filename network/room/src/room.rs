use std::{
    collections::BTreeMap,
    sync::mpsc::{self, Receiver, Sender},
};

use serde::{Deserialize, Serialize};

use crate::{
    Envelope, Error, Inbound, Messenger, MessageType, Payload, PeerId, Ping, PlayerAdd,
    PlayerRemove, Pong, Result, Subscription, Target, Transport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Most members the room admits, counting this peer
    pub capacity: usize,
    /// Whether this peer initiated the room
    pub host: bool,
}
impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            host: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Position in arrival order, counting from zero for this peer itself
    pub arrival: u64,
    /// Nonce of the latest pong received from this player
    pub last_pong: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterEvent {
    Joined(PeerId),
    Left(PeerId),
}

/// One peer's view of a room
#[derive(Debug)]
pub struct Room<T> {
    transport: T,
    config: RoomConfig,
    players: BTreeMap<PeerId, PlayerInfo>,
    messenger: Messenger,
    watchers: Vec<Sender<RosterEvent>>,
    arrivals: u64,
    pings: u64,
    left: bool,
}

impl<T: Transport> Room<T> {
    /// Open the room with this peer as its only member
    pub fn open(transport: T, config: RoomConfig) -> Self {
        let local = transport.local_id();
        log::info!(
            "{local} opened room (host: {}, capacity: {})",
            config.host,
            config.capacity
        );
        let mut players = BTreeMap::new();
        players.insert(
            local,
            PlayerInfo {
                arrival: 0,
                last_pong: None,
            },
        );
        Self {
            transport,
            config,
            players,
            messenger: Messenger::new(),
            watchers: Vec::new(),
            arrivals: 1,
            pings: 0,
            left: false,
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.transport.local_id()
    }

    pub fn is_host(&self) -> bool {
        self.config.host
    }

    pub fn config(&self) -> RoomConfig {
        self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn has_left(&self) -> bool {
        self.left
    }

    pub fn players(&self) -> impl Iterator<Item = (PeerId, &PlayerInfo)> {
        self.players.iter().map(|(id, info)| (*id, info))
    }

    pub fn player(&self, peer: PeerId) -> Option<&PlayerInfo> {
        self.players.get(&peer)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.capacity
    }

    pub fn subscribe<P: Payload>(&mut self) -> Subscription<P> {
        self.messenger.subscribe()
    }

    pub fn unsubscribe<P: Payload>(&mut self, subscription: Subscription<P>) {
        self.messenger.unsubscribe(subscription)
    }

    /// Register for join and leave notifications from now on
    pub fn watch_roster(&mut self) -> Receiver<RosterEvent> {
        let (sender, receiver) = mpsc::channel();
        self.watchers.push(sender);
        receiver
    }

    /// Broadcast a payload to every other member, without waiting for anything
    pub fn transmit<P: Payload>(&mut self, payload: &P) -> Result<()> {
        self.send(Target::Broadcast, payload)
    }

    pub fn send_to<P: Payload>(&mut self, peer: PeerId, payload: &P) -> Result<()> {
        self.send(Target::Peer(peer), payload)
    }

    fn send<P: Payload>(&mut self, target: Target, payload: &P) -> Result<()> {
        if self.left {
            return Err(Error::Left);
        }
        let envelope = Envelope::new(self.local_id(), payload)?;
        log::trace!("{} sends {} to {target:?}", self.local_id(), envelope.kind);
        self.transport.send(target, envelope)
    }

    /// Ping everyone; the nonce comes back in each member's pong
    pub fn ping(&mut self) -> Result<u64> {
        self.pings += 1;
        let nonce = self.pings;
        self.transmit(&Ping { nonce })?;
        Ok(nonce)
    }

    /// Process one piece of inbound traffic
    ///
    /// Traffic arriving after [`leave`](Self::leave) is ignored.
    pub fn handle(&mut self, inbound: Inbound) -> Result<()> {
        if self.left {
            log::trace!("{} ignores {inbound:?} after leaving", self.local_id());
            return Ok(());
        }
        match inbound {
            Inbound::Message(envelope) => self.handle_message(envelope),
            Inbound::Joined(peer) => self.admit(peer),
            Inbound::Left(peer) => {
                self.remove(peer);
                if self.is_host() {
                    self.transmit(&PlayerRemove { peer })?;
                }
                Ok(())
            }
        }
    }

    fn handle_message(&mut self, envelope: Envelope) -> Result<()> {
        let origin = envelope.origin;
        match envelope.kind {
            MessageType::Ping => {
                let Ping { nonce } = envelope.decode()?;
                self.send_to(origin, &Pong { nonce })?;
            }
            MessageType::Pong => {
                let Pong { nonce } = envelope.decode()?;
                if let Some(player) = self.players.get_mut(&origin) {
                    player.last_pong = Some(nonce);
                }
            }
            MessageType::PlayerAdd if !self.is_host() => {
                let PlayerAdd { peer } = envelope.decode()?;
                if peer != self.local_id() {
                    self.insert(peer);
                }
            }
            MessageType::PlayerRemove if !self.is_host() => {
                let PlayerRemove { peer } = envelope.decode()?;
                self.remove(peer);
            }
            _ => {}
        }
        self.messenger.dispatch(&envelope);
        Ok(())
    }

    fn admit(&mut self, peer: PeerId) -> Result<()> {
        if self.players.contains_key(&peer) {
            return Ok(());
        }
        if self.is_full() {
            log::warn!("{} turned away {peer}: room is full", self.local_id());
            return Err(Error::Full {
                capacity: self.config.capacity,
            });
        }
        self.insert(peer);
        if self.is_host() {
            self.transmit(&PlayerAdd { peer })?;
        }
        Ok(())
    }

    fn insert(&mut self, peer: PeerId) {
        if self.players.contains_key(&peer) {
            return;
        }
        self.players.insert(
            peer,
            PlayerInfo {
                arrival: self.arrivals,
                last_pong: None,
            },
        );
        self.arrivals += 1;
        log::info!("{} sees {peer} join", self.local_id());
        self.notify(RosterEvent::Joined(peer));
    }

    fn remove(&mut self, peer: PeerId) {
        if self.players.remove(&peer).is_some() {
            log::info!("{} sees {peer} leave", self.local_id());
            self.notify(RosterEvent::Left(peer));
        }
    }

    fn notify(&mut self, event: RosterEvent) {
        self.watchers.retain(|watcher| watcher.send(event).is_ok());
    }

    /// Leave the room, dropping every subscription and watcher
    ///
    /// Leaving twice does nothing more.
    pub fn leave(&mut self) {
        if self.left {
            return;
        }
        log::info!("{} leaves the room", self.local_id());
        self.left = true;
        self.messenger.clear();
        self.watchers.clear();
        self.transport.disconnect();
    }
}
