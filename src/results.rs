/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

## Examples

Creating a [`ResultsTable`] after running a simulation group:

```no_run
use propagation_sim::prelude::*;

let sim = SimulationBuilder::new()
    .add_miner(Honest::new())
    .add_miner(Selfish::new(2))
    .topology(Topology::Complete)
    .repeat_all(5)
    .power_values([0.6, 0.4])
    .seed(42)
    .build()
    .unwrap();

let results_builder = sim.run_all().unwrap();

let results = results_builder
    .average(Average::Median) // Take the median of repeated simulations' results
    .revenue()                // Include each miner's share of the chain
    .orphans()                // Include orphan count and rate
    .format(Format::CSV)      // Output results as CSV
    .build();

println!("{}", results);
```

# Aggregating Results
Columns that describe the setup of a simulation (strategy names, mining
power, horizon) are identical across repeated runs and are shown once.
Measured columns are reduced with the chosen [`Average`].
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    analysis::ChainSummary,
    miner::MinerId,
    power_dist::PowerValue,
    simulation::SimulationOutput,
    utils::{median_of_floats, WrappedFunc},
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Typically produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<SimulationOutput>,
    format: Format,
    repeated: NonZeroUsize,
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
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`]. `data` holds groups of `repeated`
    /// runs, one group per power distribution.
    pub(crate) fn new(
        data: Vec<SimulationOutput>,
        repeated: NonZeroUsize,
    ) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    #[inline]
    fn num_miners(&self) -> usize {
        self.data.first().map_or(0, |output| output.miners.len())
    }

    /// Include every built-in column.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.strategy_names()
            .revenue()
            .chain_height()
            .orphans()
            .block_interval()
            .horizon()
    }

    /// Average the results of repeated simulations based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Include the "Block Interval" column: mean seconds between blocks on
    /// the reference chain.
    pub fn block_interval(mut self) -> Self {
        self.columns.insert(Column::BlockInterval);

        self
    }

    /// Include the "Chain Height" column.
    pub fn chain_height(mut self) -> Self {
        self.columns.insert(Column::ChainHeight);

        self
    }

    /// Include a column with title `title` which only contains the given
    /// value.
    pub fn constant<T>(mut self, title: T, value: f64) -> Self
    where
        T: Into<String>,
    {
        let func = WrappedFunc::new(title, move |_| value);
        self.columns.insert(Column::Constant(func));

        self
    }

    /// Extract the raw [`SimulationOutput`] data from this [`ResultsBuilder`].
    /// Useful for running custom statistical analysis.
    ///
    /// # Ordering
    /// Simulations are run in the same order they are specified using
    /// [`SimulationBuilder`](crate::simulation::SimulationBuilder), with
    /// repeated runs being grouped together. The output data from this
    /// method follows this ordering as well.
    pub fn data(self) -> Vec<SimulationOutput> {
        self.data
    }

    /// Include the "Horizon" column (simulated seconds per run).
    pub fn horizon(mut self) -> Self {
        self.columns.insert(Column::Horizon);

        self
    }

    /// Use the mining power of the miner with ID `miner_id` as input to `func`,
    /// and present the output in a table column with the given title.
    pub fn mining_power_func<T, F>(
        mut self,
        miner_id: MinerId,
        title: T,
        func: F,
    ) -> Self
    where
        T: Into<String>,
        F: Fn(PowerValue) -> f64 + Send + Sync + 'static,
    {
        let func = WrappedFunc::new(title, func);
        self.columns.insert(Column::MiningPowerFunction(miner_id, func));

        self
    }

    /// Include the "Orphan Blocks" and "Orphan Rate" columns.
    pub fn orphans(mut self) -> Self {
        self.columns.insert(Column::OrphanBlocks);
        self.columns.insert(Column::OrphanRate);

        self
    }

    /// Include a "Miner `X` Strategy" column in the results table for each
    /// miner `X`.
    pub fn strategy_names(mut self) -> Self {
        for miner_id in 0..self.num_miners() {
            self.columns.insert(Column::MinerStrategyName(miner_id.into()));
        }

        self
    }

    /// Include a "Miner `X` Revenue" column in the results table for each
    /// miner `X`.
    pub fn revenue(mut self) -> Self {
        for miner_id in 0..self.num_miners() {
            self.columns.insert(Column::MinerRevenue(miner_id.into()));
        }

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let num_miners = self.num_miners();
        let ResultsBuilder { average, mut columns, data, format, repeated } =
            self;

        for miner_id in 0..num_miners {
            columns.insert(Column::MiningPower(miner_id.into()));
        }

        if average != Average::None {
            columns.insert(Column::AverageOf(average));
        }

        #[cfg(feature = "rayon")]
        let runs: Vec<Run> = data.par_iter().map(Run::new).collect();
        #[cfg(not(feature = "rayon"))]
        let runs: Vec<Run> = data.iter().map(Run::new).collect();

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => runs
                .iter()
                .map(|run| {
                    columns.iter().map(|col| col.get_value(run)).collect()
                })
                .collect(),
            _ => runs
                .chunks(repeated.get())
                .map(|group| {
                    columns
                        .iter()
                        .map(|col| col.get_average_value(average, group))
                        .collect()
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
#[derive(Debug)]
pub struct ResultsTable {
    columns: Vec<Column>,
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

    /// Column titles, in display order.
    pub fn titles(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.to_string()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles = self.titles();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        let val = val.to_string();
                        text_widths[i] = text_widths[i].max(val.len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
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

/// Methods of extracting an average/central value from a set of repeated
/// simulations.
///
/// In the process of creating an results table, the given averaging method is
/// only applied to the values of columns which are measured from the
/// simulated chain.
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

/// One simulation output together with its analysis.
struct Run<'a> {
    output: &'a SimulationOutput,
    summary: ChainSummary,
}

impl<'a> Run<'a> {
    fn new(output: &'a SimulationOutput) -> Self {
        Run { output, summary: output.summary() }
    }
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    MinerStrategyName(MinerId),
    MiningPower(MinerId),
    MinerRevenue(MinerId),
    MiningPowerFunction(MinerId, WrappedFunc<PowerValue, f64>),
    Constant(WrappedFunc<(), f64>),
    ChainHeight,
    OrphanBlocks,
    OrphanRate,
    BlockInterval,
    Horizon,
    AverageOf(Average),
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone)]
enum ColumnValue {
    Text(String),
    Count(u64),
    Float(f64),
    /// A measurement which does not exist for this run, such as the block
    /// interval of a chain that never grew.
    Missing,
}

impl Column {
    /// Columns whose values differ between repeated runs.
    fn is_measured(&self) -> bool {
        matches!(
            self,
            Self::MinerRevenue(_)
                | Self::ChainHeight
                | Self::OrphanBlocks
                | Self::OrphanRate
                | Self::BlockInterval
        )
    }

    fn measure(&self, run: &Run) -> Option<f64> {
        let power_of =
            |miner_id: &MinerId| run.output.power_dist.get(miner_id.get());

        match &self {
            Self::MiningPower(miner_id) => power_of(miner_id).copied(),
            Self::MiningPowerFunction(miner_id, func) => {
                power_of(miner_id).map(|&power| func.call(power))
            }
            Self::MinerRevenue(miner_id) => {
                Some(run.summary.revenue(*miner_id))
            }
            Self::Constant(func) => Some(func.call(())),
            Self::ChainHeight => Some(run.summary.height() as f64),
            Self::OrphanBlocks => Some(run.summary.orphans as f64),
            Self::OrphanRate => Some(run.summary.orphan_rate()),
            Self::BlockInterval => run.summary.average_block_interval,
            Self::Horizon => Some(run.output.horizon),
            Self::MinerStrategyName(_) | Self::AverageOf(_) => None,
        }
    }

    fn get_value(&self, run: &Run) -> ColumnValue {
        match &self {
            Self::MinerStrategyName(miner_id) => run
                .output
                .miners
                .get(miner_id.get())
                .map(|miner| ColumnValue::Text(miner.strategy_name()))
                .unwrap_or(ColumnValue::Missing),
            Self::ChainHeight => ColumnValue::Count(run.summary.height()),
            Self::OrphanBlocks => {
                ColumnValue::Count(run.summary.orphans as u64)
            }
            Self::AverageOf(_) => ColumnValue::Count(1),
            _ => self
                .measure(run)
                .map(ColumnValue::Float)
                .unwrap_or(ColumnValue::Missing),
        }
    }

    fn get_average_value(&self, method: Average, runs: &[Run]) -> ColumnValue {
        if let Self::AverageOf(_) = self {
            return ColumnValue::Count(runs.len() as u64);
        }
        if !self.is_measured() {
            return match runs.first() {
                Some(run) => self.get_value(run),
                None => ColumnValue::Missing,
            };
        }

        let vls: Vec<_> =
            runs.iter().filter_map(|run| self.measure(run)).collect();
        if vls.is_empty() {
            return ColumnValue::Missing;
        }

        let avg = match method {
            Average::Mean => vls.iter().sum::<f64>() / vls.len() as f64,
            Average::Median => median_of_floats(vls),
            Average::Max => vls.into_iter().fold(f64::NEG_INFINITY, f64::max),
            Average::Min => vls.into_iter().fold(f64::INFINITY, f64::min),
            Average::None => return self.get_value(&runs[0]),
        };

        ColumnValue::Float(avg)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => write!(f, "Runs"),
            },
            Self::BlockInterval => write!(f, "Block Interval"),
            Self::ChainHeight => write!(f, "Chain Height"),
            Self::Constant(func) => write!(f, "{}", func.name()),
            Self::Horizon => write!(f, "Horizon"),
            Self::MinerStrategyName(miner_id) => {
                write!(f, "Miner {} Strategy", miner_id)
            }
            Self::MiningPower(miner_id) => {
                write!(f, "Miner {} Power", miner_id)
            }
            Self::MiningPowerFunction(_, func) => {
                write!(f, "{}", func.name())
            }
            Self::MinerRevenue(miner_id) => {
                write!(f, "Miner {} Revenue", miner_id)
            }
            Self::OrphanBlocks => write!(f, "Orphan Blocks"),
            Self::OrphanRate => write!(f, "Orphan Rate"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Text(text) => write!(f, "{}", text),
            Self::Count(num) => write!(f, "{}", num),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
            Self::Missing => write!(f, "-"),
        }
    }
}

/// Returns an instance of the ideal Selfish Miner revenue function from Eyal
/// and Sirer's paper which can be used as input to
/// [`ResultsBuilder::mining_power_func`]. `gamma` is the fraction of honest
/// miners that build on the selfish block during a tie.
pub fn selfish_revenue(gamma: f64) -> impl Fn(PowerValue) -> f64 {
    move |a: PowerValue| -> f64 {
        (a * (1.0 - a).powi(2) * (4.0 * a + gamma * (1.0 - 2.0 * a))
            - a.powi(3))
            / (1.0 - a * (1.0 + a * (2.0 - a)))
    }
}

#[cfg(test)]
mod tests {
    use super::{selfish_revenue, Average, Format};
    use crate::{
        miner::{Honest, MinerId},
        simulation::SimulationBuilder,
        topology::{LinkProfile, Topology},
    };

    fn two_honest(repeats: usize) -> super::ResultsBuilder {
        SimulationBuilder::new()
            .add_miners(Honest::new(), 2)
            .topology(Topology::Complete)
            .link_profile(LinkProfile::fixed(0.05, 1024.0 * 1024.0))
            .power_values([0.25, 0.75])
            .horizon(6.0 * 3600.0)
            .repeat_all(repeats)
            .seed(11)
            .build()
            .unwrap()
            .run_all()
            .unwrap()
    }

    #[test]
    fn columns_follow_declaration_order() {
        let table = two_honest(1)
            .all()
            .mining_power_func(MinerId::from(1), "Selfish Ideal", selfish_revenue(0.5))
            .average(Average::Mean)
            .build();

        assert_eq!(
            table.titles(),
            vec![
                "Miner 0 Strategy",
                "Miner 1 Strategy",
                "Miner 0 Power",
                "Miner 1 Power",
                "Miner 0 Revenue",
                "Miner 1 Revenue",
                "Selfish Ideal",
                "Chain Height",
                "Orphan Blocks",
                "Orphan Rate",
                "Block Interval",
                "Horizon",
                "Mean Of",
            ]
        );
    }

    #[test]
    fn averaging_collapses_repeats() {
        let table = two_honest(3).revenue().build();
        assert_eq!(table.num_rows(), 3);

        let table = two_honest(3)
            .revenue()
            .average(Average::Median)
            .format(Format::CSV)
            .build();
        assert_eq!(table.num_rows(), 1);

        let csv = table.to_string();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Miner 0 Power,Miner 1 Power,Miner 0 Revenue,Miner 1 Revenue,Median Of")
        );

        let row: Vec<_> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "0.250000");
        assert_eq!(row[1], "0.750000");
        assert_eq!(row[4], "3");

        let revenue: f64 = row[2].parse::<f64>().unwrap() + row[3].parse::<f64>().unwrap();
        assert!((revenue - 1.0).abs() < 1e-5);
    }

    #[test]
    fn selfish_revenue_matches_known_points() {
        let ideal = selfish_revenue(0.0);

        // A third of the hashrate is the profitability threshold when gamma = 0
        assert!((ideal(1.0 / 3.0) - 1.0 / 3.0).abs() < 1e-9);
        assert!(ideal(0.4) > 0.4);
    }
}
