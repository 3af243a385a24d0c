/*!
Control the appearance of sweep result data

# Examples

Creating a [`ResultsTable`] after running a sweep:

```
use std::num::NonZeroUsize;
use selfish_sim::prelude::*;

let points = Sweep::new(NonZeroUsize::new(4).unwrap())
    .settings(GameSettings::new(100))
    .run()
    .unwrap();

let results = ResultsBuilder::new(points)
    .all()                    // Include every per-game column
    .ideal_revenue(0.0)       // Compare against Eyal and Sirer's closed form
    .format(Format::CSV)      // Output results as CSV
    .build();

println!("{}", results);
```
*/

use std::{collections::BTreeSet, fmt::Display};

use crate::sweep::SweepPoint;

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`].
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    columns: BTreeSet<Column>,
    data: Vec<SweepPoint>,
    format: Format,
    gamma: f64,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
    /// Space-separated values without a header row, one game per line.
    Plot,
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`]. The "Attacker Power" and "Profit
    /// Fraction" columns are always included.
    pub fn new(data: Vec<SweepPoint>) -> Self {
        Self {
            columns: BTreeSet::from([
                Column::AttackerPower,
                Column::ProfitFraction,
            ]),
            data,
            format: Format::default(),
            gamma: 0.0,
        }
    }

    /// Include the "Game", "Chain Share" and "Orphaned Blocks" columns.
    pub fn all(self) -> Self {
        self.game_numbers().chain_share().orphaned_blocks()
    }

    /// Include the "Game" column in the results table.
    pub fn game_numbers(mut self) -> Self {
        self.columns.insert(Column::Game);

        self
    }

    /// Include the "Chain Share" column in the results table.
    pub fn chain_share(mut self) -> Self {
        self.columns.insert(Column::ChainShare);

        self
    }

    /// Include the "Orphaned Blocks" column in the results table.
    pub fn orphaned_blocks(mut self) -> Self {
        self.columns.insert(Column::OrphanedBlocks);

        self
    }

    /// Include a column with the revenue predicted by [`selfish_revenue`]
    /// for the given gamma.
    pub fn ideal_revenue(mut self, gamma: f64) -> Self {
        self.columns.insert(Column::IdealRevenue);
        self.gamma = gamma;

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let ResultsBuilder { columns, data, format, gamma } = self;

        let ideal = selfish_revenue(gamma);
        let titles = columns
            .iter()
            .map(|column| match column {
                Column::IdealRevenue => {
                    format!("Ideal SM Revenue (gamma={})", gamma)
                }
                column => column.to_string(),
            })
            .collect();
        let rows = data
            .iter()
            .map(|point| {
                columns
                    .iter()
                    .map(|column| column.get_value(point, &ideal))
                    .collect()
            })
            .collect();

        ResultsTable { titles, format, rows }
    }
}

/// Formatted results of a [`Sweep`](crate::sweep::Sweep). The results table
/// is given by the struct's [`Display`] implementation, as specified by its
/// [`Format`].
pub struct ResultsTable {
    titles: Vec<String>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.format {
            Format::CSV => {
                write!(f, "{}", self.titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::Plot => {
                for (i, row) in self.rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(" "))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    self.titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        let val = val.to_string();
                        text_widths[i] = text_widths[i].max(val.len());
                    }
                }

                for (i, title) in self.titles.iter().enumerate() {
                    write!(
                        f,
                        " {:1$} {2}",
                        title,
                        text_widths[i],
                        Self::SEPARATOR_VERTICAL
                    )?;
                }
                writeln!(f)?;

                let total_width = text_widths.iter().map(|x| x + 3).sum();
                for _ in 0..total_width {
                    write!(f, "{}", Self::SEPARATOR_HORIZONTAL)?;
                }

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    Game,
    AttackerPower,
    ProfitFraction,
    IdealRevenue,
    ChainShare,
    OrphanedBlocks,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone, Copy)]
enum ColumnValue {
    Int(u64),
    Float(f64),
}

impl Column {
    fn get_value(
        &self,
        point: &SweepPoint,
        ideal: &impl Fn(f64) -> f64,
    ) -> ColumnValue {
        match &self {
            Self::Game => ColumnValue::Int(point.game as u64),
            Self::AttackerPower => ColumnValue::Float(point.attacker_power),
            Self::ProfitFraction => ColumnValue::Float(point.profit_fraction),
            Self::IdealRevenue => {
                ColumnValue::Float(ideal(point.attacker_power))
            }
            Self::ChainShare => ColumnValue::Float(point.chain_share),
            Self::OrphanedBlocks => ColumnValue::Int(point.orphaned_blocks),
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Game => write!(f, "Game"),
            Self::AttackerPower => write!(f, "Attacker Power"),
            Self::ProfitFraction => write!(f, "Profit Fraction"),
            Self::IdealRevenue => write!(f, "Ideal SM Revenue"),
            Self::ChainShare => write!(f, "Chain Share"),
            Self::OrphanedBlocks => write!(f, "Orphaned Blocks"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
        }
    }
}

/// Returns an instance of the ideal Selfish Miner revenue function from Eyal
/// and Sirer's paper, as a function of the attacker's hash power.
pub fn selfish_revenue(gamma: f64) -> impl Fn(f64) -> f64 {
    move |a: f64| -> f64 {
        (a * (1.0 - a).powi(2) * (4.0 * a + gamma * (1.0 - 2.0 * a))
            - a.powi(3))
            / (1.0 - a * (1.0 + a * (2.0 - a)))
    }
}
