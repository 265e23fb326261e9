use std::sync::mpsc::Receiver;

use board::Color;
use chain::{Block, BlockFinalized, Chain, ChoiceProposal, MoveProposal, Proposal, Resync};
use players::Player;
use room::{Inbound, MessageType, PeerId, Room, RoomConfig, RosterEvent, Subscription, Transport};
use turns::{Authority, TurnAction, TurnKind};

use crate::{Error, Game, Result, SeatConfiguration};

#[derive(Debug)]
struct Subscriptions {
    configuration: Subscription<SeatConfiguration>,
    moves: Subscription<MoveProposal>,
    choices: Subscription<ChoiceProposal>,
    blocks: Subscription<BlockFinalized>,
    resync: Subscription<Resync>,
}

/// A proposal of ours, applied locally ahead of its block
#[derive(Debug)]
struct Speculation {
    proposal: Proposal,
    game: Game,
}

/// One peer's side of an online game, either as host or as a joining peer
///
/// The committed game only ever advances by applying blocks in sequence. The host orders
/// proposals into blocks itself; every other peer waits for the host's blocks.
#[derive(Debug)]
pub struct OnlineSession<T> {
    room: Room<T>,
    seats: SeatConfiguration,
    chain: Chain,
    committed: Game,
    speculation: Option<Speculation>,
    /// Dropped on leaving
    subscriptions: Option<Subscriptions>,
    roster: Receiver<RosterEvent>,
    host: Option<PeerId>,
    host_lost: bool,
    resyncing: bool,
}

impl<T: Transport> OnlineSession<T> {
    /// Open a room as its host, taking the white seat
    pub fn host(transport: T, capacity: usize) -> Result<Self> {
        let mut session = Self::open(transport, RoomConfig { capacity, host: true });
        let local = session.local_id();
        session.host = Some(local);
        session.seats.assign(local);
        session.room.transmit(&session.seats)?;
        Ok(session)
    }

    /// Enter a room someone else hosts
    pub fn join(transport: T, capacity: usize) -> Self {
        Self::open(
            transport,
            RoomConfig {
                capacity,
                host: false,
            },
        )
    }

    fn open(transport: T, config: RoomConfig) -> Self {
        let mut room = Room::open(transport, config);
        let subscriptions = Subscriptions {
            configuration: room.subscribe(),
            moves: room.subscribe(),
            choices: room.subscribe(),
            blocks: room.subscribe(),
            resync: room.subscribe(),
        };
        let roster = room.watch_roster();
        Self {
            room,
            seats: SeatConfiguration::default(),
            chain: Chain::new(),
            committed: Game::new(Authority::Split),
            speculation: None,
            subscriptions: Some(subscriptions),
            roster,
            host: None,
            host_lost: false,
            resyncing: false,
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.room.local_id()
    }

    pub fn is_host(&self) -> bool {
        self.room.is_host()
    }

    /// The host, once known
    pub fn host_id(&self) -> Option<PeerId> {
        self.host
    }

    pub fn room(&self) -> &Room<T> {
        &self.room
    }

    pub fn room_mut(&mut self) -> &mut Room<T> {
        &mut self.room
    }

    pub fn seats(&self) -> &SeatConfiguration {
        &self.seats
    }

    /// The color this peer plays, if any
    pub fn seat(&self) -> Option<Color> {
        self.seats.seat_of(self.local_id())
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The game as the chain has it
    pub fn committed(&self) -> &Game {
        &self.committed
    }

    /// The game including our own proposal not yet accepted
    pub fn game(&self) -> &Game {
        match &self.speculation {
            Some(speculation) => &speculation.game,
            None => &self.committed,
        }
    }

    pub fn is_resyncing(&self) -> bool {
        self.resyncing
    }

    /// Process one piece of inbound traffic, then react to whatever it carried
    ///
    /// Transport-level trouble (a full room, an undecodable message) is logged and otherwise
    /// ignored.
    pub fn handle(&mut self, inbound: Inbound) -> Result<()> {
        if let Err(err) = self.room.handle(inbound) {
            log::warn!("{}: {err}", self.local_id());
        }
        self.poll()
    }

    /// React to everything delivered so far
    pub fn poll(&mut self) -> Result<()> {
        while let Ok(event) = self.roster.try_recv() {
            self.on_roster(event)?;
        }
        let Some(subscriptions) = &self.subscriptions else {
            return Ok(());
        };
        let configurations = subscriptions.configuration.drain();
        let proposals: Vec<_> = subscriptions
            .moves
            .drain()
            .into_iter()
            .map(|received| (received.origin, received.payload.0))
            .chain(
                subscriptions
                    .choices
                    .drain()
                    .into_iter()
                    .map(|received| (received.origin, received.payload.0)),
            )
            .collect();
        let blocks = subscriptions.blocks.drain();
        let resyncs = subscriptions.resync.drain();

        for received in configurations {
            self.on_configuration(received.origin, received.payload);
        }
        for (origin, proposal) in proposals {
            self.on_proposal(origin, proposal)?;
        }
        for received in blocks {
            self.on_block(received.origin, received.payload.0)?;
        }
        for received in resyncs {
            self.on_resync(received.origin, received.payload)?;
        }
        if self.host_lost {
            return Err(Error::HostDisconnected);
        }
        self.acknowledge()
    }

    /// Let the player holding this peer's seat act, if it owes anything
    ///
    /// Returns whether a proposal was made.
    pub fn act(&mut self, player: &mut impl Player) -> Result<bool> {
        if self.host_lost {
            return Err(Error::HostDisconnected);
        }
        let Some(color) = self.seat() else {
            return Ok(false);
        };
        if !self.ready() || !self.committed.awaits(color) {
            return Ok(false);
        }
        let game = &self.committed;
        let Some(action) =
            players::decide(player, color, game.current_turn(), game.board(), game.rules())
        else {
            return Ok(false);
        };
        self.propose(action)?;
        Ok(true)
    }

    /// Propose an action for the next block
    ///
    /// The host turns it into a block straight away. Any other peer applies it speculatively and
    /// sends it to the host; the speculation is dropped once the host's block for that slot
    /// arrives, whoever's proposal it carries.
    pub fn propose(&mut self, action: TurnAction) -> Result<()> {
        if self.host_lost {
            return Err(Error::HostDisconnected);
        }
        let proposal = Proposal {
            sequence: self.chain.next_sequence(),
            origin: self.local_id(),
            payload: action,
        };
        if self.is_host() {
            let block = self.commit(proposal)?;
            self.room.transmit(&BlockFinalized(block))?;
            return Ok(());
        }

        let host = self.host.ok_or(Error::NoHost)?;
        let mut game = self.committed.clone();
        game.submit(action)?;
        match proposal.kind() {
            MessageType::Choice => self.room.send_to(host, &ChoiceProposal(proposal))?,
            _ => self.room.send_to(host, &MoveProposal(proposal))?,
        }
        log::debug!(
            "{} proposed {action} for block {}",
            self.local_id(),
            proposal.sequence
        );
        self.speculation = Some(Speculation { proposal, game });
        Ok(())
    }

    /// Leave the room; later calls do nothing more
    pub fn leave(&mut self) {
        self.room.leave();
        self.subscriptions = None;
        self.speculation = None;
    }

    fn ready(&self) -> bool {
        self.speculation.is_none() && !self.resyncing && !self.room.has_left()
    }

    /// The seated color not moving owes the host a `None` for every move turn
    fn acknowledge(&mut self) -> Result<()> {
        let Some(color) = self.seat() else {
            return Ok(());
        };
        if !self.ready() || !self.committed.awaits(color) {
            return Ok(());
        }
        match self.committed.current_turn().kind() {
            TurnKind::Move { color: mover } if mover != color => {
                self.propose(TurnAction::Move { color, mv: None })
            }
            _ => Ok(()),
        }
    }

    fn on_roster(&mut self, event: RosterEvent) -> Result<()> {
        match event {
            RosterEvent::Joined(peer) if self.is_host() => {
                self.seats.assign(peer);
                self.room.transmit(&self.seats)?;
                if !self.chain.is_empty() {
                    let blocks = self.chain.snapshot(1);
                    self.room.send_to(peer, &Resync::Snapshot { blocks })?;
                }
            }
            RosterEvent::Left(peer) if self.is_host() => {
                self.seats.vacate(peer);
                self.room.transmit(&self.seats)?;
            }
            RosterEvent::Left(peer) if self.host == Some(peer) => {
                log::warn!("{} lost the host {peer}", self.local_id());
                self.host_lost = true;
                self.speculation = None;
            }
            RosterEvent::Joined(_) | RosterEvent::Left(_) => {}
        }
        Ok(())
    }

    /// Only the host sends configuration, blocks and snapshots; the first peer to do so is taken to
    /// be the host
    fn from_host(&mut self, origin: PeerId) -> bool {
        if self.is_host() {
            return false;
        }
        match self.host {
            Some(host) if host == origin => true,
            Some(host) => {
                log::warn!("ignoring host traffic from {origin}; the host is {host}");
                false
            }
            None => {
                log::info!("{} found the host {origin}", self.local_id());
                self.host = Some(origin);
                true
            }
        }
    }

    fn on_configuration(&mut self, origin: PeerId, seats: SeatConfiguration) {
        if self.from_host(origin) {
            log::debug!("{} now sees seats {seats:?}", self.local_id());
            self.seats = seats;
        }
    }

    fn on_proposal(&mut self, origin: PeerId, proposal: Proposal) -> Result<()> {
        if !self.is_host() {
            return Ok(());
        }
        if proposal.origin != origin {
            log::warn!("dropping proposal relayed by {origin} for {}", proposal.origin);
            return Ok(());
        }
        match self.commit(proposal) {
            Ok(block) => self.room.transmit(&BlockFinalized(block))?,
            Err(Error::Chain(err @ chain::Error::WrongSlot { .. })) => {
                log::debug!("dropping proposal from {origin}: {err}");
            }
            Err(err) => log::warn!("dropping proposal from {origin}: {err}"),
        }
        Ok(())
    }

    /// Check a proposal against the committed game and append it as the next block
    fn commit(&mut self, proposal: Proposal) -> Result<Block> {
        let next = self.chain.next_sequence();
        if proposal.sequence != next {
            return Err(chain::Error::WrongSlot {
                proposed: proposal.sequence,
                next,
            }
            .into());
        }
        let color = proposal.payload.color();
        if self.seats.holder(color) != Some(proposal.origin) {
            return Err(Error::NotSeated {
                peer: proposal.origin,
                color,
            });
        }
        let mut game = self.committed.clone();
        game.submit(proposal.payload)?;
        let block = self.chain.accept(proposal)?;
        self.committed = game;
        log::info!("block {}: {}", block.sequence, block.payload);
        Ok(block)
    }

    fn on_block(&mut self, origin: PeerId, block: Block) -> Result<()> {
        if !self.from_host(origin) {
            return Ok(());
        }
        if self.resyncing {
            log::debug!("{} skips block {} while resyncing", self.local_id(), block.sequence);
            return Ok(());
        }
        match self.chain.receive(block) {
            Ok(appended) => {
                for block in appended {
                    self.apply(&block)?;
                }
                Ok(())
            }
            Err(chain::Error::ChainDivergence { sequence }) => {
                log::warn!("{} diverged at block {sequence}", self.local_id());
                self.request_resync()
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply(&mut self, block: &Block) -> Result<()> {
        if let Some(speculation) = self.speculation.take() {
            let ours = speculation.proposal;
            if ours.sequence > block.sequence {
                self.speculation = Some(speculation);
            } else if ours.sequence == block.sequence
                && ours.origin == block.origin
                && ours.payload == block.payload
            {
                log::debug!("{} had block {} confirmed", self.local_id(), block.sequence);
            } else {
                log::debug!(
                    "{} rolls back {} for block {}",
                    self.local_id(),
                    ours.payload,
                    ours.sequence
                );
            }
        }
        if let Err(err) = self.committed.submit(block.payload) {
            log::warn!("block {} does not apply: {err}", block.sequence);
            return self.request_resync();
        }
        Ok(())
    }

    fn request_resync(&mut self) -> Result<()> {
        let host = self.host.ok_or(Error::NoHost)?;
        self.speculation = None;
        self.resyncing = true;
        self.room.send_to(host, &Resync::Request { from: 1 })?;
        Ok(())
    }

    fn on_resync(&mut self, origin: PeerId, resync: Resync) -> Result<()> {
        match resync {
            Resync::Request { from } => {
                if !self.is_host() {
                    return Ok(());
                }
                let blocks = self.chain.snapshot(from);
                log::info!("sending {} blocks to {origin}", blocks.len());
                self.room.send_to(origin, &Resync::Snapshot { blocks })?;
            }
            Resync::Snapshot { blocks } => {
                if !self.from_host(origin) {
                    return Ok(());
                }
                let from = self.chain.adopt(blocks)?;
                self.committed = Game::replay(
                    Authority::Split,
                    self.chain.blocks().iter().map(|block| &block.payload),
                )?;
                self.speculation = None;
                self.resyncing = false;
                log::info!(
                    "{} adopted the host's chain from block {from} ({} blocks)",
                    self.local_id(),
                    self.chain.len()
                );
            }
        }
        Ok(())
    }
}
