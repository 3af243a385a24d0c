/*!
Miners and groups of miners

A [`Miner`] pairs an identity and a share of the network's hash power with
exactly one [`AnyStrategy`]. A [`MinerGroup`] holds every miner taking part
in a game.

```
use selfish_sim::prelude::*;

let group = MinerGroup::new(vec![
    Miner::new(
        MinerParameters::new(0, 0.3),
        StrategyConfig::selfish_default(false, 0.0).build(),
    ),
    Miner::new(MinerParameters::new(1, 0.7), StrategyConfig::Honest.build()),
])
.unwrap();

assert_eq!(group.len(), 2);
```
*/

use std::collections::HashSet;

use crate::{
    settings::{self, ConfigurationError},
    strategy::{AnyStrategy, Strategy},
};

/// Unique identifier of a [`Miner`]. Corresponds to a [`u32`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerId(pub(crate) u32);

impl MinerId {
    /// Returns the [`u32`] corresponding to this [`MinerId`].
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for MinerId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Fixed description of a miner taking part in a game.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerParameters {
    pub id: MinerId,
    pub display_name: String,
    /// Fraction of the network's hash power controlled by this miner.
    pub hash_power: f64,
    /// Seconds before the network hears about this miner's blocks.
    pub network_delay: f64,
    pub cost_per_second_mining: f64,
}

impl MinerParameters {
    /// Creates parameters for a miner named after its ID, with no network
    /// delay and no mining cost.
    pub fn new(id: u32, hash_power: f64) -> Self {
        MinerParameters {
            id: MinerId(id),
            display_name: id.to_string(),
            hash_power,
            network_delay: 0.0,
            cost_per_second_mining: 0.0,
        }
    }

    pub fn display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();

        self
    }

    pub fn network_delay(mut self, delay: f64) -> Self {
        self.network_delay = delay;

        self
    }

    pub fn cost_per_second_mining(mut self, cost: f64) -> Self {
        self.cost_per_second_mining = cost;

        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.hash_power.is_nan() || !(0.0..=1.0).contains(&self.hash_power)
        {
            return Err(ConfigurationError::BadHashPower(self.hash_power));
        }
        settings::non_negative("network_delay", self.network_delay)?;
        settings::non_negative(
            "cost_per_second_mining",
            self.cost_per_second_mining,
        )
    }
}

/// A participant in a game: parameters, strategy and running counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Miner {
    params: MinerParameters,
    pub(crate) strategy: AnyStrategy,
    blocks_mined: u64,
    branches_abandoned: u64,
    cost: f64,
}

impl Miner {
    pub fn new(params: MinerParameters, strategy: AnyStrategy) -> Self {
        Miner {
            params,
            strategy,
            blocks_mined: 0,
            branches_abandoned: 0,
            cost: 0.0,
        }
    }

    #[inline]
    pub fn id(&self) -> MinerId {
        self.params.id
    }

    #[inline]
    pub fn params(&self) -> &MinerParameters {
        &self.params
    }

    #[inline]
    pub fn hash_power(&self) -> f64 {
        self.params.hash_power
    }

    #[inline]
    pub fn strategy(&self) -> &AnyStrategy {
        &self.strategy
    }

    /// Returns the name of this miner's strategy.
    pub fn strategy_name(&self) -> String {
        self.strategy.name()
    }

    /// Total number of blocks found by this miner, published or not.
    #[inline]
    pub fn blocks_mined_total(&self) -> u64 {
        self.blocks_mined
    }

    /// Number of times this miner gave up on a private branch.
    #[inline]
    pub fn branches_abandoned(&self) -> u64 {
        self.branches_abandoned
    }

    /// Cost of mining accrued so far.
    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Clears all counters and strategy state.
    pub(crate) fn reset(&mut self) {
        self.blocks_mined = 0;
        self.branches_abandoned = 0;
        self.cost = 0.0;
        self.strategy.reset();
    }

    pub(crate) fn record_block(&mut self) {
        self.blocks_mined += 1;
    }

    pub(crate) fn record_abandoned(&mut self) {
        self.branches_abandoned += 1;
    }

    /// Charges this miner for `seconds` of mining.
    pub(crate) fn accrue_cost(&mut self, seconds: f64) {
        self.cost += self.params.cost_per_second_mining * seconds;
    }
}

/// The miners taking part in one game.
///
/// # Invariants
/// - At least one miner is present.
/// - Miner IDs are unique.
/// - Hash power values are in `0.0..=1.0` and sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerGroup {
    pub(crate) miners: Vec<Miner>,
}

impl MinerGroup {
    /// Allowable difference between the hash power sum and 1.0.
    const EPSILON_POWER: f64 = 1e-6;

    /// Creates a group, checking the invariants listed on [`MinerGroup`].
    pub fn new(miners: Vec<Miner>) -> Result<Self, ConfigurationError> {
        use ConfigurationError::*;

        if miners.is_empty() {
            return Err(NoMiners);
        }

        let mut ids = HashSet::new();
        for miner in miners.iter() {
            miner.params.validate()?;
            if !ids.insert(miner.id()) {
                return Err(DuplicateMinerId(miner.id().0));
            }
        }

        let sum: f64 = miners.iter().map(Miner::hash_power).sum();
        if (sum - 1.0).abs() > Self::EPSILON_POWER {
            return Err(BadHashPowerSum(sum));
        }

        Ok(MinerGroup { miners })
    }

    /// Creates a group from parameters and a strategy for each miner.
    pub fn from_params<I>(miners: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (MinerParameters, AnyStrategy)>,
    {
        Self::new(
            miners
                .into_iter()
                .map(|(params, strategy)| Miner::new(params, strategy))
                .collect(),
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.miners.len()
    }

    /// A valid group always holds at least one miner.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Miner> + '_ {
        self.miners.iter()
    }

    pub fn get(&self, id: MinerId) -> Option<&Miner> {
        self.miners.iter().find(|miner| miner.id() == id)
    }

    /// Sum of blocks found by all miners.
    pub fn blocks_mined_total(&self) -> u64 {
        self.miners.iter().map(Miner::blocks_mined_total).sum()
    }

    /// Sum of costs accrued by all miners.
    pub fn total_cost(&self) -> f64 {
        self.miners.iter().map(Miner::cost).sum()
    }
}

impl<'a> IntoIterator for &'a MinerGroup {
    type Item = &'a Miner;
    type IntoIter = std::slice::Iter<'a, Miner>;

    fn into_iter(self) -> Self::IntoIter {
        self.miners.iter()
    }
}
