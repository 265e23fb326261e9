//! Whole rooms in one process, over a [`LocalHub`]

use core::fmt;
use std::collections::BTreeMap;

use board::Color;
use chain::Link;
use monke::MonkePlayer;
use room::{LocalHub, LocalLink, PeerId};

use crate::{Error, OnlineSession, Outcome, Result, SimulationConfig};

/// Every session of one room, driven by delivering the hub's traffic one item at a time
#[derive(Debug)]
pub struct LocalRoom {
    hub: LocalHub,
    sessions: BTreeMap<PeerId, OnlineSession<LocalLink>>,
}

impl LocalRoom {
    pub fn new(hub: LocalHub) -> Self {
        Self {
            hub,
            sessions: BTreeMap::new(),
        }
    }

    pub fn host(&mut self, capacity: usize) -> Result<PeerId> {
        let session = OnlineSession::host(self.hub.connect(), capacity)?;
        let id = session.local_id();
        self.sessions.insert(id, session);
        Ok(id)
    }

    pub fn join(&mut self, capacity: usize) -> PeerId {
        let session = OnlineSession::join(self.hub.connect(), capacity);
        let id = session.local_id();
        self.sessions.insert(id, session);
        id
    }

    /// Make the given peer leave; its session stays around for inspection
    pub fn leave(&mut self, peer: PeerId) {
        if let Some(session) = self.sessions.get_mut(&peer) {
            session.leave();
        }
    }

    pub fn session(&self, peer: PeerId) -> Option<&OnlineSession<LocalLink>> {
        self.sessions.get(&peer)
    }

    pub fn session_mut(&mut self, peer: PeerId) -> Option<&mut OnlineSession<LocalLink>> {
        self.sessions.get_mut(&peer)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &OnlineSession<LocalLink>> {
        self.sessions.values()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut OnlineSession<LocalLink>> {
        self.sessions.values_mut()
    }

    /// Deliver until nothing is left in flight, returning how many items were delivered
    pub fn pump(&mut self) -> Result<usize> {
        let mut delivered = 0;
        while let Some((to, inbound)) = self.hub.deliver_next() {
            delivered += 1;
            if let Some(session) = self.sessions.get_mut(&to) {
                session.handle(inbound)?;
            }
        }
        Ok(delivered)
    }

    /// Check every member still in the room holds the same chain and game as `reference`
    pub fn check_agreement(&self, reference: PeerId) -> Result<Link> {
        let expected = self
            .sessions
            .get(&reference)
            .ok_or_else(|| Error::Diverged(format!("{reference} is not in the room")))?;
        let digest = expected.chain().tail_link();
        for session in self.sessions.values().filter(|s| !s.room().has_left()) {
            if session.chain().tail_link() != digest || session.committed() != expected.committed()
            {
                return Err(Error::Diverged(format!(
                    "{} has {} blocks ending in {}, {reference} has {} ending in {digest}",
                    session.local_id(),
                    session.chain().len(),
                    session.chain().tail_link(),
                    expected.chain().len(),
                )));
            }
        }
        Ok(digest)
    }
}

/// How a simulated game went
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationReport {
    pub peers: usize,
    pub plies: usize,
    pub blocks: usize,
    pub outcome: Option<Outcome>,
    /// Piece placement of the final position
    pub fen: String,
    /// Link after the last block, identical on every peer
    pub digest: Link,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "peers:   {}", self.peers)?;
        writeln!(f, "plies:   {}", self.plies)?;
        writeln!(f, "blocks:  {}", self.blocks)?;
        match self.outcome {
            Some(outcome) => writeln!(f, "outcome: {outcome}")?,
            None => writeln!(f, "outcome: unfinished")?,
        }
        writeln!(f, "fen:     {}", self.fen)?;
        write!(f, "digest:  {}", self.digest)
    }
}

/// Play one game between two random players seated in a room of `config.peers` members
pub fn simulate(config: &SimulationConfig) -> Result<SimulationReport> {
    let hub = if config.shuffle {
        LocalHub::shuffled(config.seed.unwrap_or_default())
    } else {
        LocalHub::new()
    };
    let mut room = LocalRoom::new(hub);
    let host = room.host(config.capacity)?;
    room.pump()?;
    for _ in 1..config.peers {
        room.join(config.capacity);
        room.pump()?;
    }
    if let Some(session) = room.session_mut(host) {
        session.room_mut().ping()?;
    }
    room.pump()?;

    let (mut white, mut black) = match config.seed {
        Some(seed) => (
            MonkePlayer::seeded(seed),
            MonkePlayer::seeded(seed.wrapping_add(1)),
        ),
        None => (MonkePlayer::new(), MonkePlayer::new()),
    };
    loop {
        let game = room
            .session(host)
            .ok_or(Error::HostDisconnected)?
            .committed();
        if game.is_over() || game.plies() >= config.max_plies {
            break;
        }
        let mut acted = false;
        for session in room.sessions_mut() {
            acted |= match session.seat() {
                Some(Color::White) => session.act(&mut white)?,
                Some(Color::Black) => session.act(&mut black)?,
                None => false,
            };
        }
        if room.pump()? == 0 && !acted {
            log::warn!("nobody can act; stopping");
            break;
        }
    }

    let digest = room.check_agreement(host)?;
    let session = room.session(host).ok_or(Error::HostDisconnected)?;
    let game = session.committed();
    Ok(SimulationReport {
        peers: room.sessions().count(),
        plies: game.plies(),
        blocks: session.chain().len(),
        outcome: game.outcome(),
        fen: game.board().to_fen(),
        digest,
    })
}
