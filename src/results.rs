/*!
Observe simulation rounds and control the appearance of their data

# Examples

Recording every round until the game converges and printing the results as
CSV:

```
use infiltration_sim::prelude::*;

let mut sim = Simulation::builder()
    .miners(10)
    .pools(2)
    .seed(1)
    .build()
    .unwrap();

let mut history = History::new().format(Format::CSV);
sim.run_until_converged(500, &mut history).unwrap();

println!("{}", history);
```
*/

use std::fmt::Display;

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// What happened in one round of a
/// [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// Number of rounds simulated so far, including this one.
    pub time: usize,
    /// Per participant revenue of each pool in this round, by pool ID.
    pub pool_revenues: Vec<f64>,
    /// Whether the game is converged after this round.
    pub converged: bool,
    /// Number of miners which are not sabotaging another pool.
    pub mining_power: usize,
}

/// Receives a [`RoundSummary`] after every simulated round.
pub trait Observer {
    fn notify(&mut self, summary: &RoundSummary);
}

impl<F> Observer for F
where
    F: FnMut(&RoundSummary),
{
    fn notify(&mut self, summary: &RoundSummary) {
        self(summary)
    }
}

/// Describes the appearance of a [`History`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

/// [`Observer`] which records every round. The recorded rounds are given as a
/// table by its [`Display`] implementation, as specified by its [`Format`].
#[derive(Debug, Clone, Default)]
pub struct History {
    rounds: Vec<RoundSummary>,
    format: Format,
}

impl History {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn new() -> Self {
        Self::default()
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn rounds(&self) -> &[RoundSummary] {
        &self.rounds
    }

    pub fn last(&self) -> Option<&RoundSummary> {
        self.rounds.last()
    }

    /// Total per participant revenue of every pool over all recorded rounds.
    pub fn total_pool_revenues(&self) -> Vec<f64> {
        let num_pools = self.num_pools();

        self.rounds.iter().fold(vec![0.0; num_pools], |mut acc, round| {
            for (total, revenue) in acc.iter_mut().zip(&round.pool_revenues) {
                *total += revenue;
            }
            acc
        })
    }

    fn num_pools(&self) -> usize {
        self.rounds.first().map_or(0, |r| r.pool_revenues.len())
    }

    fn titles(&self) -> Vec<String> {
        let mut titles = vec!["Time".to_string()];
        titles.extend(
            (0..self.num_pools()).map(|i| format!("Pool {} Revenue", i)),
        );
        titles.push("Mining Power".to_string());
        titles.push("Converged".to_string());

        titles
    }

    fn row(round: &RoundSummary) -> Vec<String> {
        let mut row = vec![round.time.to_string()];
        row.extend(
            round
                .pool_revenues
                .iter()
                .map(|r| format!("{:.1$}", r, FLOAT_PRECISION_DIGITS)),
        );
        row.push(round.mining_power.to_string());
        row.push(round.converged.to_string());

        row
    }
}

impl Observer for History {
    fn notify(&mut self, summary: &RoundSummary) {
        self.rounds.push(summary.clone());
    }
}

impl Display for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles = self.titles();
        let rows: Vec<_> = self.rounds.iter().map(Self::row).collect();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in rows.iter() {
                    writeln!(f)?;
                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        text_widths[i] = text_widths[i].max(val.len());
                    }
                }

                for (i, title) in titles.iter().enumerate() {
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

                for row in rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val,
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
