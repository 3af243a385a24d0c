//! Reproduces the classical selfish mining revenue plot: one game per
//! attacker hash power, each written as an `attacker_power profit_fraction`
//! line.

use std::{fs, num::NonZeroUsize, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use selfish_sim::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "selfish_sweep")]
#[command(about = "Sweep a selfish miner's hash power against a second miner")]
struct Args {
    /// Number of games; game i gives the attacker max_power * i / games
    #[arg(short, long, default_value_t = 2000)]
    games: usize,

    /// Blocks mined per game
    #[arg(short, long, default_value_t = GameSettings::DEFAULT_TARGET_BLOCKS)]
    blocks: u64,

    /// Attacker hash power reached by the last game (excluded)
    #[arg(long, default_value_t = 0.5)]
    max_power: f64,

    /// Base seed; game i is seeded with seed + i
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Attacking strategy
    #[arg(long, value_enum, default_value_t = Play::Default)]
    strategy: Play,

    /// Strategy of the miner holding the rest of the hash power
    #[arg(long, value_enum, default_value_t = Play::Honest)]
    defender: Play,

    /// Share of the network mining on the attacker's block in a tie
    #[arg(long, default_value_t = 0.0)]
    gamma: f64,

    /// Value lead at which the clever attacker publishes
    #[arg(long, default_value_t = 100.0)]
    threshold: f64,

    /// Draw a random fill fraction for every attacker block
    #[arg(long)]
    noise: bool,

    /// Cost per second of mining charged to both miners
    #[arg(long, default_value_t = 0.0)]
    cost: f64,

    /// Also print the table to stdout in this format
    #[arg(long, value_enum)]
    print: Option<Printed>,

    /// Output file, one line per game
    #[arg(short, long, default_value = "selfishMiningPlot.txt")]
    output: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Play {
    Honest,
    Default,
    Clever,
}

impl Args {
    /// Builds the strategy for `play`. Gamma, threshold and noise apply to
    /// whichever side uses them.
    fn config(&self, play: Play) -> StrategyConfig {
        match play {
            Play::Honest => StrategyConfig::Honest,
            Play::Default => {
                StrategyConfig::selfish_default(self.noise, self.gamma)
            }
            Play::Clever => {
                StrategyConfig::selfish_clever(self.noise, self.threshold)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Printed {
    Csv,
    Pretty,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let games =
        NonZeroUsize::new(args.games).context("at least one game is needed")?;
    let sweep = Sweep::new(games)
        .max_power(args.max_power)
        .settings(GameSettings::new(args.blocks).seed(args.seed))
        .attacker(args.config(args.strategy))
        .defender(args.config(args.defender))
        .cost_per_second_mining(args.cost);

    let points = sweep.run().context("sweep failed")?;
    for point in points.iter() {
        info!(
            "game {}: power {:.4}, profit fraction {:.4}, {} orphaned",
            point.game,
            point.attacker_power,
            point.profit_fraction,
            point.orphaned_blocks
        );
    }

    if let Some(printed) = args.print {
        let format = match printed {
            Printed::Csv => Format::CSV,
            Printed::Pretty => Format::PrettyPrint,
        };
        let table = ResultsBuilder::new(points.clone())
            .all()
            .ideal_revenue(args.gamma)
            .format(format)
            .build();
        println!("{}", table);
    }

    let plot = ResultsBuilder::new(points).format(Format::Plot).build();
    fs::write(&args.output, format!("{}\n", plot))
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        "wrote {} in {:.4} secs",
        args.output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use selfish_sim::prelude::StrategyConfig;

    use super::Args;

    #[test]
    fn defaults_pit_selfish_against_honest() {
        let args = Args::try_parse_from(["selfish_sweep"]).unwrap();

        assert_eq!(
            args.config(args.strategy),
            StrategyConfig::selfish_default(false, 0.0)
        );
        assert_eq!(args.config(args.defender), StrategyConfig::Honest);
    }

    #[test]
    fn clever_attacker_against_selfish_defender() {
        let args = Args::try_parse_from([
            "selfish_sweep",
            "--strategy",
            "clever",
            "--defender",
            "default",
            "--gamma",
            "0.25",
        ])
        .unwrap();

        assert_eq!(
            args.config(args.strategy),
            StrategyConfig::selfish_clever(false, 100.0)
        );
        assert_eq!(
            args.config(args.defender),
            StrategyConfig::selfish_default(false, 0.25)
        );
    }
}
