/*!
Discrete-event simulator of proof-of-work mining games.

Miners with fixed shares of the network's hash power find blocks at
exponentially distributed intervals and decide, through a [`Strategy`], where
to attach each block and when to publish it. A game ends once the target
number of blocks has been mined; every withheld block is then revealed and
each miner's profit is read off the winning chain.

The [`Sweep`] type repeats a game over a range of attacker hash powers, the
way selfish mining revenue curves are usually drawn.

[`Strategy`]: strategy::Strategy
[`Sweep`]: sweep::Sweep
*/

pub mod block;
pub mod game;
pub mod ledger;
pub mod miner;
pub mod prelude;
pub mod results;
pub mod settings;
pub mod strategy;
pub mod sweep;
pub mod tie_breaker;
