//! An in-memory transport connecting every peer in one process

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, VecDeque},
    rc::Rc,
};

use rand::{rngs::SmallRng, seq::IteratorRandom, SeedableRng};

use crate::{Envelope, Error, Inbound, PeerId, Result, Target, Transport};

#[derive(Debug, Default)]
struct HubState {
    next_id: u32,
    members: BTreeSet<PeerId>,
    /// Keyed by `(sender, receiver)`
    queues: BTreeMap<(PeerId, PeerId), VecDeque<Inbound>>,
    rng: Option<SmallRng>,
}

impl HubState {
    fn enqueue(&mut self, sender: PeerId, receiver: PeerId, inbound: Inbound) {
        self.queues
            .entry((sender, receiver))
            .or_default()
            .push_back(inbound);
    }
}

/// A full mesh between every connected [`LocalLink`]
///
/// Each (sender, receiver) pair has its own FIFO, so delivery is in order per sender. The hub
/// delivers one item at a time, from the first non-empty queue or, when shuffled, from a randomly
/// chosen one.
#[derive(Clone, Debug, Default)]
pub struct LocalHub {
    state: Rc<RefCell<HubState>>,
}

impl LocalHub {
    /// A hub delivering deterministically in (sender, receiver) order
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub picking the next queue at random from the given seed
    pub fn shuffled(seed: u64) -> Self {
        let hub = Self::default();
        hub.state.borrow_mut().rng = Some(SmallRng::seed_from_u64(seed));
        hub
    }

    /// Join the mesh under a fresh id
    ///
    /// Existing members are told about the newcomer, and the newcomer about each of them.
    pub fn connect(&self) -> LocalLink {
        let mut state = self.state.borrow_mut();
        let id = PeerId(state.next_id);
        state.next_id += 1;
        let existing: Vec<_> = state.members.iter().copied().collect();
        for member in existing {
            state.enqueue(id, member, Inbound::Joined(id));
            state.enqueue(member, id, Inbound::Joined(member));
        }
        state.members.insert(id);
        log::debug!("{id} connected to local hub");
        LocalLink {
            id,
            hub: self.clone(),
            connected: true,
        }
    }

    /// Pop the next item to deliver, along with its receiver
    pub fn deliver_next(&self) -> Option<(PeerId, Inbound)> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let key = {
            let mut ready = state
                .queues
                .iter()
                .filter(|(_, queue)| !queue.is_empty())
                .map(|(key, _)| *key);
            match &mut state.rng {
                Some(rng) => ready.choose(rng),
                None => ready.next(),
            }
        }?;
        let queue = state.queues.get_mut(&key)?;
        let inbound = queue.pop_front()?;
        Some((key.1, inbound))
    }

    /// How many items wait to be delivered
    pub fn pending(&self) -> usize {
        self.state.borrow().queues.values().map(VecDeque::len).sum()
    }

    pub fn members(&self) -> Vec<PeerId> {
        self.state.borrow().members.iter().copied().collect()
    }
}

/// One peer's end of a [`LocalHub`]
#[derive(Debug)]
pub struct LocalLink {
    id: PeerId,
    hub: LocalHub,
    connected: bool,
}

impl Transport for LocalLink {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn send(&mut self, target: Target, envelope: Envelope) -> Result<()> {
        let mut state = self.hub.state.borrow_mut();
        match target {
            Target::Broadcast => {
                let others: Vec<_> = state
                    .members
                    .iter()
                    .copied()
                    .filter(|member| *member != self.id)
                    .collect();
                for member in others {
                    state.enqueue(self.id, member, Inbound::Message(envelope.clone()));
                }
            }
            Target::Peer(peer) => {
                if !state.members.contains(&peer) {
                    return Err(Error::UnknownPeer(peer));
                }
                state.enqueue(self.id, peer, Inbound::Message(envelope));
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let mut state = self.hub.state.borrow_mut();
        state.members.remove(&self.id);
        let id = self.id;
        state.queues.retain(|(_, receiver), _| *receiver != id);
        let others: Vec<_> = state.members.iter().copied().collect();
        for member in others {
            state.enqueue(id, member, Inbound::Left(id));
        }
        log::debug!("{id} disconnected from local hub");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::quickcheck;

    use crate::Ping;

    fn ping(from: PeerId, nonce: u64) -> Envelope {
        Envelope::new(from, &Ping { nonce }).unwrap()
    }

    fn nonce(inbound: &Inbound) -> Option<u64> {
        match inbound {
            Inbound::Message(envelope) => envelope.decode::<Ping>().ok().map(|p| p.nonce),
            _ => None,
        }
    }

    quickcheck! {
        fn test_shuffled_delivery_keeps_sender_order(seed: u64, counts: Vec<u8>) -> bool {
            let hub = LocalHub::shuffled(seed);
            let receiver = hub.connect();
            let mut senders: Vec<_> = counts.iter().take(5).map(|_| hub.connect()).collect();
            for (sender, count) in senders.iter_mut().zip(&counts) {
                for n in 0..u64::from(*count % 16) {
                    let envelope = ping(sender.local_id(), n);
                    sender.send(Target::Peer(receiver.local_id()), envelope).unwrap();
                }
            }
            let mut last: BTreeMap<PeerId, u64> = BTreeMap::new();
            while let Some((to, inbound)) = hub.deliver_next() {
                let Inbound::Message(envelope) = &inbound else { continue };
                assert_eq!(to, receiver.local_id());
                let n = nonce(&inbound).unwrap();
                if let Some(previous) = last.insert(envelope.origin, n) {
                    if previous + 1 != n {
                        return false;
                    }
                } else if n != 0 {
                    return false;
                }
            }
            hub.pending() == 0
        }
    }

    #[test]
    fn test_connect_introduces_members_to_each_other() {
        let hub = LocalHub::new();
        let a = hub.connect();
        let b = hub.connect();
        let mut delivered = Vec::new();
        while let Some(item) = hub.deliver_next() {
            delivered.push(item);
        }
        assert_eq!(
            delivered,
            vec![
                (b.local_id(), Inbound::Joined(a.local_id())),
                (a.local_id(), Inbound::Joined(b.local_id())),
            ]
        );
    }

    #[test]
    fn test_broadcast_skips_the_sender() {
        let hub = LocalHub::new();
        let mut a = hub.connect();
        let _b = hub.connect();
        let _c = hub.connect();
        while hub.deliver_next().is_some() {}
        a.send(Target::Broadcast, ping(a.local_id(), 1)).unwrap();
        assert_eq!(hub.pending(), 2);
        while let Some((to, _)) = hub.deliver_next() {
            assert_ne!(to, a.local_id());
        }
    }

    #[test]
    fn test_disconnect_drops_undelivered_traffic_and_notifies() {
        let hub = LocalHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        while hub.deliver_next().is_some() {}
        a.send(Target::Peer(b.local_id()), ping(a.local_id(), 1))
            .unwrap();
        b.disconnect();
        b.disconnect();
        assert_eq!(hub.members(), vec![a.local_id()]);
        assert_eq!(
            hub.deliver_next(),
            Some((a.local_id(), Inbound::Left(b.local_id())))
        );
        assert_eq!(hub.deliver_next(), None);
        assert!(matches!(
            a.send(Target::Peer(b.local_id()), ping(a.local_id(), 2)),
            Err(Error::UnknownPeer(_))
        ));
    }
}
