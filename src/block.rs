use crate::miner::MinerId;

/// Representation of a mined block and its position in the fork tree.
///
/// Blocks are only ever created by [`Ledger::append`](crate::ledger::Ledger::append),
/// which owns them for the rest of the game. Parent links are ids into the
/// ledger's arena, never references.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Position of this block in the ledger's arena.
    pub id: BlockId,
    /// The block this one extends. `None` only for the genesis block.
    pub parent: Option<BlockId>,
    /// The miner of this block. `None` only for the genesis block.
    pub miner: Option<MinerId>,
    /// Length of the path from this block to the genesis block.
    pub height: u64,
    /// Subsidy plus the transaction value collected by this block.
    pub value: f64,
    /// Sum of [`Block::value`] over this block and all of its ancestors.
    pub value_in_chain: f64,
    /// Simulated time (in seconds since the start of the game) at which this
    /// block was found.
    pub timestamp: f64,
    /// Whether the rest of the network can see this block.
    pub published: bool,
}

/// A unique identifier assigned to each [`Block`]. Directly corresponds to the
/// order in which blocks were appended to a
/// [`Ledger`](crate::ledger::Ledger), with the genesis block at 0.
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Returns the [`usize`] corresponding to this [`BlockId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for BlockId {
    fn from(value: usize) -> Self {
        BlockId(value)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Block {
    /// Returns the genesis block of a new ledger.
    pub(crate) fn genesis() -> Self {
        Block {
            id: BlockId(0),
            parent: None,
            miner: None,
            height: 0,
            value: 0.0,
            value_in_chain: 0.0,
            timestamp: 0.0,
            published: true,
        }
    }

    /// Returns true iff this is the genesis block.
    #[inline]
    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }

    /// Transaction value collected by this block and all of its ancestors.
    #[inline]
    pub fn fees_in_chain(&self, subsidy: f64) -> f64 {
        self.value_in_chain - subsidy * self.height as f64
    }
}
