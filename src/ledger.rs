//! Append-only block tree and fork choice

use std::{cmp::Ordering, ops::Index};

use log::debug;
use thiserror::Error;

use crate::{
    block::{Block, BlockId},
    miner::MinerId,
};

/// Rule used to compare competing chain tips.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ForkChoice {
    /// Prefer the tip with the greatest height.
    #[default]
    LongestChain,
    /// Prefer the tip with the greatest cumulative value.
    HeaviestChain,
}

/// Owns every [`Block`] mined during one game.
///
/// Blocks are stored in an arena indexed by [`BlockId`], and are never
/// removed. New blocks start out private to their miner, and become part of
/// the public view via [`Ledger::reveal`]. The canonical head is maintained
/// as blocks are revealed, so [`Ledger::winning_head`] is a constant-time
/// read of the visible state.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    blocks: Vec<Block>,
    /// All blocks which directly point to a given block, by arena index.
    children: Vec<Vec<BlockId>>,
    fork_choice: ForkChoice,
    head: BlockId,
    settled: bool,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("parent block {0} was not found in this ledger")]
    UnknownParent(BlockId),
    #[error("block {0} was not found in this ledger")]
    UnknownBlock(BlockId),
    #[error("ledger has been settled and can no longer change")]
    Settled,
}

impl Ledger {
    /// The genesis block of every ledger.
    pub const GENESIS: BlockId = BlockId(0);

    /// Creates a new ledger containing only a (published) genesis block.
    pub fn new(fork_choice: ForkChoice) -> Self {
        Ledger {
            blocks: vec![Block::genesis()],
            children: vec![vec![]],
            fork_choice,
            head: Self::GENESIS,
            settled: false,
        }
    }

    /// Returns true iff the given block ID is associated with a block in the
    /// ledger.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        id.0 < self.blocks.len()
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    /// Returns the blocks which directly extend `id`.
    #[inline]
    pub fn children(&self, id: BlockId) -> &[BlockId] {
        self.children.get(id.0).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of blocks in the ledger, including genesis.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// A ledger always contains its genesis block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The [`BlockId`] the next appended block will receive.
    #[inline]
    pub fn next_id(&self) -> BlockId {
        BlockId(self.blocks.len())
    }

    #[inline]
    pub fn fork_choice(&self) -> ForkChoice {
        self.fork_choice
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Iterates over every block in the ledger in order of creation.
    pub fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.iter()
    }

    /// Creates a new private block mined by `miner` on top of `parent`.
    pub fn append(
        &mut self,
        parent: BlockId,
        miner: MinerId,
        timestamp: f64,
        value: f64,
    ) -> Result<BlockId, LedgerError> {
        if self.settled {
            return Err(LedgerError::Settled);
        }
        let parent_block =
            self.get(parent).ok_or(LedgerError::UnknownParent(parent))?;
        debug_assert!(timestamp >= parent_block.timestamp);

        let id = self.next_id();
        let block = Block {
            id,
            parent: Some(parent),
            miner: Some(miner),
            height: parent_block.height + 1,
            value,
            value_in_chain: parent_block.value_in_chain + value,
            timestamp,
            published: false,
        };

        self.children[parent.0].push(id);
        self.children.push(vec![]);
        self.blocks.push(block);

        Ok(id)
    }

    /// Publishes `id` along with any of its unpublished ancestors. A block
    /// which only ties the current head does not replace it.
    ///
    /// Returns the number of newly published blocks.
    #[inline]
    pub fn reveal(&mut self, id: BlockId) -> Result<usize, LedgerError> {
        self.reveal_contested(id, false)
    }

    /// Equivalent to [`Ledger::reveal`], except that when `takes_ties` is
    /// true a block tying the current head becomes the new head.
    pub fn reveal_contested(
        &mut self,
        id: BlockId,
        takes_ties: bool,
    ) -> Result<usize, LedgerError> {
        if self.settled {
            return Err(LedgerError::Settled);
        }
        if !self.contains(id) {
            return Err(LedgerError::UnknownBlock(id));
        }

        let mut revealed = 0;
        let mut curr = id;
        while !self.blocks[curr.0].published {
            self.blocks[curr.0].published = true;
            revealed += 1;
            // Genesis is always published, so every private block has a parent
            match self.blocks[curr.0].parent {
                Some(parent) => curr = parent,
                None => break,
            }
        }

        if revealed > 0 {
            self.update_head(id, takes_ties);
        }

        Ok(revealed)
    }

    fn update_head(&mut self, candidate: BlockId, takes_ties: bool) {
        let replace = match self.compare(candidate, self.head) {
            Ordering::Greater => true,
            Ordering::Equal => takes_ties && candidate != self.head,
            Ordering::Less => false,
        };

        if replace {
            if !self.is_ancestor(self.head, candidate) {
                debug!(
                    "head moved across branches: {} (height {}) -> {} \
                     (height {})",
                    self.head,
                    self[self.head].height,
                    candidate,
                    self[candidate].height
                );
            }
            self.head = candidate;
        }
    }

    /// Compares two blocks under this ledger's [`ForkChoice`].
    ///
    /// ## Panics
    /// Panics if either block is not in the ledger.
    pub fn compare(&self, a: BlockId, b: BlockId) -> Ordering {
        let (a, b) = (&self[a], &self[b]);
        match self.fork_choice {
            ForkChoice::LongestChain => a.height.cmp(&b.height),
            ForkChoice::HeaviestChain => {
                a.value_in_chain.total_cmp(&b.value_in_chain)
            }
        }
    }

    /// Returns true iff publishing `id` would create a tie with the current
    /// head rather than strictly outweighing or losing to it.
    pub fn ties_head(&self, id: BlockId) -> bool {
        self.contains(id)
            && id != self.head
            && self.compare(id, self.head) == Ordering::Equal
    }

    /// Returns the current leaf blocks, optionally only the published ones.
    ///
    /// Tips are yielded in order of creation; calling this method again
    /// restarts the sequence.
    pub fn tips(
        &self,
        visible_only: bool,
    ) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .filter(move |block| {
                let leaf = self.children[block.id.0]
                    .iter()
                    .all(|child| visible_only && !self[*child].published);

                leaf && (block.published || !visible_only)
            })
            .map(|block| block.id)
    }

    /// The canonical chain tip under the configured fork choice rule.
    ///
    /// Only published blocks are considered. Between mutations, repeated
    /// calls return the same block.
    #[inline]
    pub fn winning_head(&self) -> BlockId {
        self.head
    }

    /// Returns the IDs of all blocks on the path from `id` back to the
    /// genesis block, starting with `id` itself.
    pub fn path_to_root(
        &self,
        id: BlockId,
    ) -> Result<Vec<BlockId>, LedgerError> {
        if !self.contains(id) {
            return Err(LedgerError::UnknownBlock(id));
        }

        let mut path = vec![id];
        let mut curr = id;
        while let Some(parent) = self.blocks[curr.0].parent {
            path.push(parent);
            curr = parent;
        }

        Ok(path)
    }

    /// Returns the ancestor of `id` (or `id` itself) at `height`.
    pub fn ancestor_at(&self, id: BlockId, height: u64) -> Option<BlockId> {
        let mut curr = self.get(id)?;
        if curr.height < height {
            return None;
        }
        while curr.height > height {
            curr = &self.blocks[curr.parent?.0];
        }

        Some(curr.id)
    }

    /// Returns true iff `ancestor` lies on the path from `id` to genesis.
    pub fn is_ancestor(&self, ancestor: BlockId, id: BlockId) -> bool {
        match self.get(ancestor) {
            Some(block) => self.ancestor_at(id, block.height) == Some(ancestor),
            None => false,
        }
    }

    /// Freezes the winning head and then publishes every remaining private
    /// block, so that the whole tree is visible for accounting. The settled
    /// head is returned by all later calls to [`Ledger::winning_head`].
    pub fn settle(&mut self) -> BlockId {
        if !self.settled {
            for block in self.blocks.iter_mut() {
                block.published = true;
            }
            self.settled = true;
        }

        self.head
    }
}

impl Index<BlockId> for Ledger {
    type Output = Block;

    fn index(&self, index: BlockId) -> &Self::Output {
        self.blocks.index(index.0)
    }
}

impl Index<&BlockId> for Ledger {
    type Output = Block;

    fn index(&self, index: &BlockId) -> &Self::Output {
        self.blocks.index(index.0)
    }
}
