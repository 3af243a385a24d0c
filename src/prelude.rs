/*!
Re-export of common values and datatypes used for running and analyzing
games. Must be imported manually.

```
use selfish_sim::prelude::*;
```
*/

use crate::{
    block, game, ledger, miner, results, settings, strategy, sweep,
    tie_breaker,
};

pub use block::{Block, BlockId};

pub use game::{
    run_game, GameError, GameOutput, GameResult, GameRunner, MinerResult,
};

pub use ledger::{ForkChoice, Ledger, LedgerError};

pub use miner::{Miner, MinerGroup, MinerId, MinerParameters};

pub use results::{selfish_revenue, Format, ResultsBuilder, ResultsTable};

pub use settings::{BlockchainSettings, ConfigurationError, GameSettings};

pub use strategy::{
    Action, AnyStrategy, Discovery, Honest, SelfishClever, SelfishDefault,
    Sighting, Strategy, StrategyConfig,
};

pub use sweep::{Sweep, SweepPoint};

pub use tie_breaker::TieBreaker;
