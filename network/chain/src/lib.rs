//! A host-ordered, hash-linked log of turn actions
//!
//! Any peer may propose the action it wants in the next slot. The host accepts the first proposal
//! it sees for each slot and broadcasts the resulting [`Block`]; every peer appends blocks strictly
//! in sequence, so all of them apply the same actions in the same order.

use core::fmt;

use room::{MessageType, Payload, PeerId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use turns::{TurnAction, TurnCategory};

mod chain;

pub use chain::Chain;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A block whose link does not match the predecessor held locally, or which contradicts a
    /// block already held for its sequence number
    #[error("chain diverged at block {sequence}")]
    ChainDivergence { sequence: u64 },
    #[error("proposal for block {proposed} but the next block is {next}")]
    WrongSlot { proposed: u64, next: u64 },
    #[error("snapshot is not a contiguous chain from block {from}")]
    BrokenSnapshot { from: u64 },
    #[error("failed to encode block")]
    Encode(#[from] serde_json::Error),
}

/// Digest of the block before this one, or all zeroes for the first block
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link(pub [u8; 32]);
impl Link {
    pub const GENESIS: Link = Link([0; 32]);
}
impl Default for Link {
    fn default() -> Self {
        Link::GENESIS
    }
}
impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({self})")
    }
}

/// An accepted action; never changes once accepted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Counts from 1, increasing by exactly one per block
    pub sequence: u64,
    /// The peer whose proposal was accepted
    pub origin: PeerId,
    pub payload: TurnAction,
    pub link: Link,
}
impl Block {
    /// The SHA-256 of this block's JSON encoding, which links the next block to this one
    pub fn digest(&self) -> Result<Link> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Link(hasher.finalize().into()))
    }
}

/// A candidate for the given slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub sequence: u64,
    pub origin: PeerId,
    pub payload: TurnAction,
}
impl Proposal {
    /// The message type the proposal travels as
    pub fn kind(&self) -> MessageType {
        match self.payload.category() {
            TurnCategory::Move => MessageType::MoveProposal,
            TurnCategory::Choice => MessageType::Choice,
        }
    }
}

/// A proposal of a move (or a move acknowledgement)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveProposal(pub Proposal);
impl Payload for MoveProposal {
    const KIND: MessageType = MessageType::MoveProposal;
}

/// A proposal of a promotion choice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceProposal(pub Proposal);
impl Payload for ChoiceProposal {
    const KIND: MessageType = MessageType::Choice;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockFinalized(pub Block);
impl Payload for BlockFinalized {
    const KIND: MessageType = MessageType::BlockFinalized;
}

/// Recovery after a fork, or catching up after joining late
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resync {
    /// Ask the host for every block from `from` onwards
    Request { from: u64 },
    /// The host's answer
    Snapshot { blocks: Vec<Block> },
}
impl Payload for Resync {
    const KIND: MessageType = MessageType::Resync;
}

#[cfg(test)]
mod tests {
    use super::*;

    use board::Color;

    #[test]
    fn test_genesis_link_displays_as_zeroes() {
        assert_eq!(Link::GENESIS.to_string(), "0".repeat(64));
    }

    #[test]
    fn test_digest_covers_every_field() {
        let block = Block {
            sequence: 1,
            origin: PeerId(0),
            payload: TurnAction::Move {
                color: Color::White,
                mv: Some("e2e4".parse().unwrap()),
            },
            link: Link::GENESIS,
        };
        let digest = block.digest().unwrap();
        assert_ne!(digest, Link::GENESIS);
        assert_eq!(digest, block.clone().digest().unwrap());
        let moved_by_another = Block {
            origin: PeerId(1),
            ..block.clone()
        };
        assert_ne!(moved_by_another.digest().unwrap(), digest);
        let later = Block {
            sequence: 2,
            ..block
        };
        assert_ne!(later.digest().unwrap(), digest);
    }

    #[test]
    fn test_proposals_travel_by_category() {
        let proposal = Proposal {
            sequence: 3,
            origin: PeerId(2),
            payload: TurnAction::Choice {
                color: Color::Black,
                choice: board::PieceKind::Queen,
            },
        };
        assert_eq!(proposal.kind(), MessageType::Choice);
        let acknowledgement = Proposal {
            payload: TurnAction::Move {
                color: Color::Black,
                mv: None,
            },
            ..proposal
        };
        assert_eq!(acknowledgement.kind(), MessageType::MoveProposal);
    }
}
