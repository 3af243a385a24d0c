//! Per-miner and per-game outcomes of a finished game

use std::collections::BTreeMap;

use crate::{block::BlockId, miner::MinerId};

/// Outcome of a single game for a single miner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MinerResult {
    /// Blocks found by the miner, whether or not they were published.
    pub blocks_mined: u64,
    /// Blocks mined by the miner which lie on the winning chain.
    pub blocks_in_winning_chain: u64,
    /// Sum of [`Block::value`](crate::block::Block::value) over the miner's
    /// blocks in the winning chain.
    pub total_value: f64,
    /// Cost of mining accrued over the whole game.
    pub total_cost: f64,
    /// `total_value - total_cost`.
    pub total_profit: f64,
}

/// Outcome of a single game, keyed by [`MinerId`].
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub miner_results: BTreeMap<MinerId, MinerResult>,
    /// Head of the winning chain at the end of the game.
    pub winning_head: BlockId,
    /// Height of [`GameResult::winning_head`].
    pub winning_height: u64,
    /// Cumulative value of the winning chain.
    pub winning_value: f64,
    /// Blocks mined during the game, published or not.
    pub blocks_mined: u64,
    /// Simulated seconds elapsed.
    pub duration: f64,
}

impl GameResult {
    #[inline]
    pub fn get(&self, miner: MinerId) -> Option<&MinerResult> {
        self.miner_results.get(&miner)
    }

    /// Fraction of the winning chain's value earned by `miner`, after costs.
    pub fn profit_fraction(&self, miner: MinerId) -> Option<f64> {
        let result = self.get(miner)?;
        if self.winning_value > 0.0 {
            Some(result.total_profit / self.winning_value)
        } else {
            Some(0.0)
        }
    }

    /// Fraction of the winning chain's blocks mined by `miner`.
    pub fn chain_share(&self, miner: MinerId) -> Option<f64> {
        let result = self.get(miner)?;
        if self.winning_height > 0 {
            Some(
                result.blocks_in_winning_chain as f64
                    / self.winning_height as f64,
            )
        } else {
            Some(0.0)
        }
    }

    /// Blocks which were mined but ended up off the winning chain.
    pub fn orphaned_blocks(&self) -> u64 {
        self.blocks_mined - self.winning_height
    }
}
