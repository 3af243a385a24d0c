//! Running a game for each point of a hash power sweep

use std::num::NonZeroUsize;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    game::{GameError, GameRunner},
    miner::{Miner, MinerGroup, MinerId, MinerParameters},
    settings::{self, ConfigurationError, GameSettings},
    strategy::StrategyConfig,
};

/// Pits an attacker strategy against a defender strategy over a range of
/// hash power splits.
///
/// Game `i` (for `i` in `1..games`) gives the attacker
/// `max_power * i / games` of the hash power and the defender the rest, and
/// is seeded with `settings.seed + i`, so every point of a sweep can be
/// reproduced on its own. Games run in parallel when the `rayon` feature is
/// enabled.
///
/// ```
/// use std::num::NonZeroUsize;
/// use selfish_sim::prelude::*;
///
/// let sweep = Sweep::new(NonZeroUsize::new(5).unwrap())
///     .settings(GameSettings::new(200))
///     .attacker(StrategyConfig::selfish_default(false, 0.0));
///
/// let points = sweep.run().unwrap();
/// assert_eq!(points.len(), 4);
/// assert!((points[3].attacker_power - 0.4).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub games: NonZeroUsize,
    /// Attacker hash power reached by the (excluded) last game.
    pub max_power: f64,
    pub settings: GameSettings,
    pub attacker: StrategyConfig,
    pub defender: StrategyConfig,
    pub network_delay: f64,
    pub cost_per_second_mining: f64,
}

/// Summary of one game of a [`Sweep`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub game: usize,
    pub attacker_power: f64,
    /// Attacker profit over the value of the winning chain.
    pub profit_fraction: f64,
    /// Attacker blocks over the length of the winning chain.
    pub chain_share: f64,
    pub orphaned_blocks: u64,
}

impl Sweep {
    /// Miner ID of the attacking miner in every game.
    pub const ATTACKER: MinerId = MinerId(0);
    /// Miner ID of the defending miner in every game.
    pub const DEFENDER: MinerId = MinerId(1);

    /// Creates a sweep of `games` games between a default selfish attacker
    /// and an honest defender, reaching half of the hash power.
    pub fn new(games: NonZeroUsize) -> Self {
        Sweep {
            games,
            max_power: 0.5,
            settings: GameSettings::default(),
            attacker: StrategyConfig::selfish_default(false, 0.0),
            defender: StrategyConfig::Honest,
            network_delay: 0.0,
            cost_per_second_mining: 0.0,
        }
    }

    pub fn max_power(mut self, max_power: f64) -> Self {
        self.max_power = max_power;

        self
    }

    pub fn settings(mut self, settings: GameSettings) -> Self {
        self.settings = settings;

        self
    }

    pub fn attacker(mut self, attacker: StrategyConfig) -> Self {
        self.attacker = attacker;

        self
    }

    pub fn defender(mut self, defender: StrategyConfig) -> Self {
        self.defender = defender;

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
        settings::probability("max_power", self.max_power)?;
        self.settings.validate()?;
        self.attacker.validate()?;
        self.defender.validate()
    }

    /// Game numbers and attacker hash power of every game in the sweep.
    pub fn powers(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let games = self.games.get();
        (1..games)
            .map(move |i| (i, self.max_power * i as f64 / games as f64))
    }

    /// Runs every game of the sweep, in order of increasing attacker power.
    pub fn run(&self) -> Result<Vec<SweepPoint>, GameError> {
        self.validate()?;

        let games: Vec<_> = self.powers().collect();

        #[cfg(feature = "rayon")]
        let points: Result<Vec<_>, _> = games
            .into_par_iter()
            .map(|(game, power)| self.play(game, power))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let points: Result<Vec<_>, _> = games
            .into_iter()
            .map(|(game, power)| self.play(game, power))
            .collect();

        points
    }

    /// Builds the miners of one game.
    pub fn miners(
        &self,
        attacker_power: f64,
    ) -> Result<MinerGroup, ConfigurationError> {
        let params = |id: MinerId, name: &str, power: f64| {
            MinerParameters::new(id.get(), power)
                .display_name(name)
                .network_delay(self.network_delay)
                .cost_per_second_mining(self.cost_per_second_mining)
        };

        MinerGroup::new(vec![
            Miner::new(
                params(Self::ATTACKER, "attacker", attacker_power),
                self.attacker.build(),
            ),
            Miner::new(
                params(Self::DEFENDER, "defender", 1.0 - attacker_power),
                self.defender.build(),
            ),
        ])
    }

    /// Runs game number `game` with the given attacker power.
    pub fn play(
        &self,
        game: usize,
        attacker_power: f64,
    ) -> Result<SweepPoint, GameError> {
        let settings =
            self.settings.seed(self.settings.seed.wrapping_add(game as u64));
        let output =
            GameRunner::new(self.miners(attacker_power)?, &settings)?.run()?;
        let result = &output.result;

        Ok(SweepPoint {
            game,
            attacker_power,
            profit_fraction: result
                .profit_fraction(Self::ATTACKER)
                .unwrap_or_default(),
            chain_share: result
                .chain_share(Self::ATTACKER)
                .unwrap_or_default(),
            orphaned_blocks: result.orphaned_blocks(),
        })
    }
}
