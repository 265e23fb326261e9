use std::collections::BTreeMap;

use crate::{Block, Error, Link, Proposal, Result};

/// One peer's copy of the log
#[derive(Clone, Debug, Default)]
pub struct Chain {
    blocks: Vec<Block>,
    /// Blocks that arrived ahead of a gap, keyed by sequence
    buffered: BTreeMap<u64, Block>,
    /// Digest of the last block
    tail: Link,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sequence of the last block, or 0 for an empty chain
    pub fn tail_sequence(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn next_sequence(&self) -> u64 {
        self.tail_sequence() + 1
    }

    /// The link the next block must carry, which doubles as a digest of the whole chain
    pub fn tail_link(&self) -> Link {
        self.tail
    }

    /// How many blocks wait for a gap to close
    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    /// Accept a proposal as the host, producing the block to broadcast
    ///
    /// Only a proposal for the next slot is accepted, so the first proposal the host sees for a
    /// slot wins and any later one for the same slot is turned away.
    pub fn accept(&mut self, proposal: Proposal) -> Result<Block> {
        let next = self.next_sequence();
        if proposal.sequence != next {
            return Err(Error::WrongSlot {
                proposed: proposal.sequence,
                next,
            });
        }
        let block = Block {
            sequence: next,
            origin: proposal.origin,
            payload: proposal.payload,
            link: self.tail,
        };
        self.append(block.clone())?;
        log::debug!("accepted block {next} from {}", block.origin);
        Ok(block)
    }

    /// Take in a block from the host, returning every block appended as a result, in order
    ///
    /// Blocks past a gap are held until the gap closes, and a block already held is discarded. If a
    /// buffered block turns out not to link, the buffer is dropped and the error returned, while
    /// the blocks appended before it stay appended.
    pub fn receive(&mut self, block: Block) -> Result<Vec<Block>> {
        let next = self.next_sequence();
        if block.sequence < next {
            let held = block
                .sequence
                .checked_sub(1)
                .and_then(|index| self.blocks.get(index as usize));
            return match held {
                Some(held) if *held == block => {
                    log::debug!("discarding duplicate of block {}", block.sequence);
                    Ok(Vec::new())
                }
                _ => {
                    log::warn!("block {} contradicts the one held", block.sequence);
                    Err(Error::ChainDivergence {
                        sequence: block.sequence,
                    })
                }
            };
        }
        if block.sequence > next {
            log::debug!("holding block {} until block {next} arrives", block.sequence);
            self.buffered.entry(block.sequence).or_insert(block);
            return Ok(Vec::new());
        }

        self.check_link(&block)?;
        self.append(block.clone())?;
        let mut appended = vec![block];
        while let Some(block) = self.buffered.remove(&self.next_sequence()) {
            if let Err(err) = self.check_link(&block) {
                self.buffered.clear();
                return Err(err);
            }
            self.append(block.clone())?;
            appended.push(block);
        }
        Ok(appended)
    }

    /// The blocks from sequence `from` onwards
    pub fn snapshot(&self, from: u64) -> Vec<Block> {
        let start = from.saturating_sub(1) as usize;
        self.blocks.get(start..).unwrap_or_default().to_vec()
    }

    /// Replace everything after the first block that differs from the host's snapshot
    ///
    /// The snapshot must be contiguous and hang off the block before its first one. Returns the
    /// sequence of the first block that was replaced or added.
    pub fn adopt(&mut self, snapshot: Vec<Block>) -> Result<u64> {
        let Some(first) = snapshot.first() else {
            return Ok(self.next_sequence());
        };
        let from = first.sequence;
        if from == 0 || from > self.next_sequence() {
            return Err(Error::BrokenSnapshot { from });
        }
        let kept_before = (from - 1) as usize;
        let mut link = match kept_before.checked_sub(1) {
            Some(index) => self.blocks[index].digest()?,
            None => Link::GENESIS,
        };
        for (offset, block) in snapshot.iter().enumerate() {
            if block.sequence != from + offset as u64 || block.link != link {
                return Err(Error::BrokenSnapshot { from });
            }
            link = block.digest()?;
        }

        let agreeing = snapshot
            .iter()
            .zip(&self.blocks[kept_before..])
            .take_while(|(theirs, ours)| theirs == ours)
            .count();
        let keep = kept_before + agreeing;
        if keep < self.blocks.len() {
            log::warn!(
                "dropping {} blocks from block {} on",
                self.blocks.len() - keep,
                keep + 1
            );
        }
        self.blocks.truncate(keep);
        self.tail = match self.blocks.last() {
            Some(block) => block.digest()?,
            None => Link::GENESIS,
        };
        for block in snapshot.into_iter().skip(agreeing) {
            self.append(block)?;
        }
        self.buffered.clear();
        Ok(keep as u64 + 1)
    }

    fn check_link(&self, block: &Block) -> Result<()> {
        if block.link == self.tail {
            Ok(())
        } else {
            log::warn!(
                "block {} links to {} but the tail is {}",
                block.sequence,
                block.link,
                self.tail
            );
            Err(Error::ChainDivergence {
                sequence: block.sequence,
            })
        }
    }

    fn append(&mut self, block: Block) -> Result<()> {
        self.tail = block.digest()?;
        self.blocks.push(block);
        Ok(())
    }
}
