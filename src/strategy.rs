/*!
Mining strategies

A strategy decides, for one miner, where newly found blocks go and when
withheld blocks are published. Strategies never touch the [`Ledger`]
directly: they inspect it and return an [`Action`], which the
[`GameRunner`](crate::game::GameRunner) validates and applies. All randomness
lives in the runner, so a strategy is deterministic given its internal state
and the sequence of events delivered to it.

# Built-In Strategies
- Honest Mining [`honest::Honest`]
- Selfish Mining as described by Eyal and Sirer [`selfish::SelfishDefault`]
- Value-threshold Selfish Mining [`clever::SelfishClever`]

[`AnyStrategy`] is the closed set of these variants held by a
[`Miner`](crate::miner::Miner), and [`StrategyConfig`] builds them.
*/

use std::fmt::Debug;

use crate::{
    block::BlockId,
    ledger::Ledger,
    miner::MinerId,
    settings::{self, BlockchainSettings, ConfigurationError},
    tie_breaker::TieBreaker,
};

pub mod clever;
pub mod honest;
pub mod selfish;

pub use clever::SelfishClever;
pub use honest::Honest;
pub use selfish::SelfishDefault;

/// An action taken by a miner in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Don't change anything. Withheld blocks stay withheld.
    Wait,
    /// Mine the newly found block on `parent` and publish it immediately,
    /// along with any unpublished ancestors.
    ExtendAndPublish { parent: BlockId },
    /// Mine the newly found block on `parent` and keep it private.
    ExtendAndWithhold { parent: BlockId },
    /// Publish the withheld blocks up to and including `through`.
    PublishWithheldLead { through: BlockId },
    /// Give up on the private branch and follow the public chain.
    AbandonPrivateBranch,
}

/// Context given to the miner which found the next block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discovery {
    pub miner: MinerId,
    /// ID that the newly found block will receive in the ledger.
    pub block: BlockId,
    /// Simulated time at which the block was found.
    pub timestamp: f64,
    /// Fraction of the available transaction value the block collects.
    pub fill: f64,
    pub settings: BlockchainSettings,
}

/// Context given to every other miner after a miner publishes blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    /// The miner receiving this event.
    pub miner: MinerId,
    /// The miner which published.
    pub publisher: MinerId,
    pub timestamp: f64,
}

impl Discovery {
    /// Value the newly found block would carry if mined on `parent`.
    ///
    /// ## Panics
    /// Panics if `parent` is not in `ledger`.
    pub fn block_value(&self, ledger: &Ledger, parent: BlockId) -> f64 {
        let subsidy = self.settings.block_subsidy;
        let fees = self.settings.available_fees(
            self.timestamp,
            ledger[parent].fees_in_chain(subsidy),
        );

        subsidy + self.fill * fees
    }
}

/// Defines the behavior of a mining strategy.
pub trait Strategy: Debug {
    /// Returns the name of this strategy.
    fn name(&self) -> String;

    /// Called when this strategy's miner finds the next block. Must return
    /// [`Action::ExtendAndPublish`] or [`Action::ExtendAndWithhold`].
    fn on_self_block_found(
        &mut self,
        ledger: &Ledger,
        found: &Discovery,
    ) -> Action;

    /// Called when another miner publishes blocks. Must not return an
    /// extension, since no block was found.
    fn on_competitor_block_seen(
        &mut self,
        ledger: &Ledger,
        seen: &Sighting,
    ) -> Action;

    /// How the network settles ties against blocks this strategy publishes.
    fn tie_breaker(&self) -> TieBreaker {
        TieBreaker::FirstSeen
    }

    /// Whether blocks mined by this strategy collect less than the full
    /// available transaction value.
    ///
    /// When true, the runner draws a fill fraction uniformly from `[0, 1)`
    /// for every block this strategy mines, not only for some of them.
    fn injects_noise(&self) -> bool {
        false
    }

    /// Clears all per-game decision state.
    fn reset(&mut self);
}

/// One of the built-in strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyStrategy {
    Honest(Honest),
    SelfishDefault(SelfishDefault),
    SelfishClever(SelfishClever),
}

macro_rules! delegate {
    ($self:ident, $s:ident => $call:expr) => {
        match $self {
            AnyStrategy::Honest($s) => $call,
            AnyStrategy::SelfishDefault($s) => $call,
            AnyStrategy::SelfishClever($s) => $call,
        }
    };
}

impl Strategy for AnyStrategy {
    fn name(&self) -> String {
        delegate!(self, s => s.name())
    }

    fn on_self_block_found(
        &mut self,
        ledger: &Ledger,
        found: &Discovery,
    ) -> Action {
        delegate!(self, s => s.on_self_block_found(ledger, found))
    }

    fn on_competitor_block_seen(
        &mut self,
        ledger: &Ledger,
        seen: &Sighting,
    ) -> Action {
        delegate!(self, s => s.on_competitor_block_seen(ledger, seen))
    }

    fn tie_breaker(&self) -> TieBreaker {
        delegate!(self, s => s.tie_breaker())
    }

    fn injects_noise(&self) -> bool {
        delegate!(self, s => s.injects_noise())
    }

    fn reset(&mut self) {
        delegate!(self, s => s.reset())
    }
}

/// Configuration of a strategy. Builds fresh [`AnyStrategy`] instances via
/// [`StrategyConfig::build`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum StrategyConfig {
    #[default]
    Honest,
    SelfishDefault {
        inject_noise: bool,
        /// Fraction of the network which mines on this miner's block in a
        /// tie.
        gamma: f64,
    },
    SelfishClever {
        inject_noise: bool,
        /// Value lead over the public head at which the private branch is
        /// published.
        value_threshold: f64,
    },
}

impl StrategyConfig {
    pub fn selfish_default(inject_noise: bool, gamma: f64) -> Self {
        Self::SelfishDefault { inject_noise, gamma }
    }

    pub fn selfish_clever(inject_noise: bool, value_threshold: f64) -> Self {
        Self::SelfishClever { inject_noise, value_threshold }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match *self {
            Self::Honest => Ok(()),
            Self::SelfishDefault { gamma, .. } => {
                settings::probability("gamma", gamma)
            }
            Self::SelfishClever { value_threshold, .. } => {
                if value_threshold.is_nan() {
                    Err(ConfigurationError::BadSetting {
                        name: "value_threshold",
                        value: value_threshold,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Creates a new strategy instance with empty decision state.
    pub fn build(&self) -> AnyStrategy {
        match *self {
            Self::Honest => AnyStrategy::Honest(Honest::new()),
            Self::SelfishDefault { inject_noise, gamma } => {
                AnyStrategy::SelfishDefault(SelfishDefault::new(
                    inject_noise,
                    gamma,
                ))
            }
            Self::SelfishClever { inject_noise, value_threshold } => {
                AnyStrategy::SelfishClever(SelfishClever::new(
                    inject_noise,
                    value_threshold,
                ))
            }
        }
    }
}

/// Number of unpublished blocks between `tip` and its nearest published
/// ancestor.
pub(crate) fn withheld_count(ledger: &Ledger, tip: BlockId) -> u64 {
    let mut count = 0;
    let mut curr = &ledger[tip];
    while !curr.published {
        count += 1;
        match curr.parent {
            Some(parent) => curr = &ledger[parent],
            None => break,
        }
    }

    count
}
