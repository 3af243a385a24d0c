//! Economic and game parameters

use thiserror::Error;

use crate::ledger::ForkChoice;

/// Parameters of the simulated blockchain's economy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockchainSettings {
    /// Mean time in seconds for the whole network to find a block.
    pub mean_seconds_per_block: f64,
    /// Rate at which transaction value becomes available to miners.
    pub transaction_value_rate_per_second: f64,
    /// Fixed reward granted for every block.
    pub block_subsidy: f64,
}

/// Parameters of a single game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameSettings {
    /// Number of blocks (published or not) after which the game ends.
    pub target_block_count: u64,
    pub blockchain: BlockchainSettings,
    /// Seed of the game's random number generator.
    pub seed: u64,
    pub fork_choice: ForkChoice,
}

/// Invalid settings or miner parameters. Detected before a game starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("no miners were given")]
    NoMiners,
    #[error("miner ID {0} is used more than once")]
    DuplicateMinerId(u32),
    #[error("hash power {0} is not in the range 0.0..=1.0")]
    BadHashPower(f64),
    #[error("hash power values sum to {0}, not 1.0")]
    BadHashPowerSum(f64),
    #[error("target block count must be greater than 0")]
    ZeroTargetBlocks,
    #[error("invalid value {value} for setting `{name}`")]
    BadSetting { name: &'static str, value: f64 },
}

/// Fails with [`ConfigurationError::BadSetting`] unless `value` is finite and
/// non-negative.
pub(crate) fn non_negative(
    name: &'static str,
    value: f64,
) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::BadSetting { name, value })
    }
}

/// Fails with [`ConfigurationError::BadSetting`] unless `value` is a
/// probability.
pub(crate) fn probability(
    name: &'static str,
    value: f64,
) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::BadSetting { name, value })
    }
}

impl BlockchainSettings {
    /// Mean block time of the reference experiments.
    pub const DEFAULT_SECONDS_PER_BLOCK: f64 = 600.0;
    /// Subsidy of the reference experiments.
    pub const DEFAULT_SUBSIDY: f64 = 3.125;
    /// Subsidy plus expected transaction value of one block in the reference
    /// experiments.
    pub const DEFAULT_BLOCK_VALUE: f64 = 13.0;

    /// Derives the transaction value rate from the expected total value of a
    /// block found after exactly `mean_seconds_per_block` seconds.
    pub fn from_block_value(
        mean_seconds_per_block: f64,
        total_block_value: f64,
        block_subsidy: f64,
    ) -> Self {
        BlockchainSettings {
            mean_seconds_per_block,
            transaction_value_rate_per_second: (total_block_value
                - block_subsidy)
                / mean_seconds_per_block,
            block_subsidy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.mean_seconds_per_block.is_finite()
            && self.mean_seconds_per_block > 0.0)
        {
            return Err(ConfigurationError::BadSetting {
                name: "mean_seconds_per_block",
                value: self.mean_seconds_per_block,
            });
        }
        non_negative(
            "transaction_value_rate_per_second",
            self.transaction_value_rate_per_second,
        )?;
        non_negative("block_subsidy", self.block_subsidy)
    }

    /// Transaction value available to a block found at `timestamp` on a chain
    /// whose blocks have so far collected `fees_in_chain`.
    #[inline]
    pub fn available_fees(&self, timestamp: f64, fees_in_chain: f64) -> f64 {
        (self.transaction_value_rate_per_second * timestamp - fees_in_chain)
            .max(0.0)
    }
}

impl Default for BlockchainSettings {
    fn default() -> Self {
        Self::from_block_value(
            Self::DEFAULT_SECONDS_PER_BLOCK,
            Self::DEFAULT_BLOCK_VALUE,
            Self::DEFAULT_SUBSIDY,
        )
    }
}

impl GameSettings {
    /// Target block count of the reference experiments.
    pub const DEFAULT_TARGET_BLOCKS: u64 = 10_000;

    /// Creates settings for a game lasting `target_block_count` blocks, with
    /// default values for everything else.
    pub fn new(target_block_count: u64) -> Self {
        GameSettings {
            target_block_count,
            ..Default::default()
        }
    }

    /// Sets the blockchain economy used by the game.
    pub fn blockchain(mut self, blockchain: BlockchainSettings) -> Self {
        self.blockchain = blockchain;

        self
    }

    /// Sets the seed of the game's random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;

        self
    }

    /// Sets the rule used to pick the winning chain.
    pub fn fork_choice(mut self, fork_choice: ForkChoice) -> Self {
        self.fork_choice = fork_choice;

        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.target_block_count == 0 {
            return Err(ConfigurationError::ZeroTargetBlocks);
        }

        self.blockchain.validate()
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            target_block_count: Self::DEFAULT_TARGET_BLOCKS,
            blockchain: BlockchainSettings::default(),
            seed: 0,
            fork_choice: ForkChoice::default(),
        }
    }
}
