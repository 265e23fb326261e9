//! Typed publish/subscribe over envelopes

use std::{
    collections::BTreeMap,
    marker::PhantomData,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
};

use crate::{Envelope, MessageType, Payload, PeerId};

/// A decoded payload and the peer it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received<P> {
    pub origin: PeerId,
    pub payload: P,
}

/// A stream of one message type's payloads, from the moment of subscribing onwards
///
/// Dropping a subscription (or passing it to [`Messenger::unsubscribe`]) stops delivery.
#[derive(Debug)]
pub struct Subscription<P> {
    id: u64,
    receiver: Receiver<Envelope>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> Subscription<P> {
    /// The next payload already delivered, if any
    ///
    /// Payloads that fail to decode are logged and skipped.
    pub fn try_next(&self) -> Option<Received<P>> {
        loop {
            let envelope = match self.receiver.try_recv() {
                Ok(envelope) => envelope,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            };
            match envelope.decode::<P>() {
                Ok(payload) => {
                    return Some(Received {
                        origin: envelope.origin,
                        payload,
                    })
                }
                Err(err) => log::warn!("dropping message from {}: {err}", envelope.origin),
            }
        }
    }

    /// Everything already delivered
    pub fn drain(&self) -> Vec<Received<P>> {
        core::iter::from_fn(|| self.try_next()).collect()
    }
}

/// Routes envelopes to the subscriptions for their message type
#[derive(Debug, Default)]
pub struct Messenger {
    next_id: u64,
    subscribers: BTreeMap<MessageType, Vec<(u64, Sender<Envelope>)>>,
}

impl Messenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<P: Payload>(&mut self) -> Subscription<P> {
        let (sender, receiver) = mpsc::channel();
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers
            .entry(P::KIND)
            .or_default()
            .push((id, sender));
        Subscription {
            id,
            receiver,
            _payload: PhantomData,
        }
    }

    pub fn unsubscribe<P: Payload>(&mut self, subscription: Subscription<P>) {
        if let Some(senders) = self.subscribers.get_mut(&P::KIND) {
            senders.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Drop every subscription at once
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// How many live subscriptions the given message type has
    pub fn subscriber_count(&self, kind: MessageType) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }

    /// Hand the envelope to every subscriber of its type, forgetting subscribers that went away
    pub fn dispatch(&mut self, envelope: &Envelope) {
        let Some(senders) = self.subscribers.get_mut(&envelope.kind) else {
            log::trace!("no subscribers for {}", envelope.kind);
            return;
        };
        senders.retain(|(_, sender)| sender.send(envelope.clone()).is_ok());
    }
}
