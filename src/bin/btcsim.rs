//! Command-line front end for the propagation simulator.
//!
//! # Example
//!
//! ```bash
//! # Six miners with exponentially distributed hashrate on a random network
//! btcsim random --miners 6
//!
//! # A 51% attacker, averaged over 20 seeded runs, as CSV
//! btcsim --seed 7 --repeat 20 --average mean --csv attack51 --strength 0.51
//!
//! # Ten megabyte blocks between twelve pools for a simulated year
//! RUST_LOG=propagation_sim=debug btcsim --days 365 blocksize --block-mib 10
//! ```

use std::time::Instant;

use anyhow::{ensure, Result};
use clap::{Parser, Subcommand, ValueEnum};
use propagation_sim::{prelude::*, results::selfish_revenue};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp1;
use tracing::info;
use tracing_subscriber::EnvFilter;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * KIB;

/// Hashrate shares of the twelve largest pools used by the block size
/// scenario.
const POOL_WEIGHTS: [f64; 12] =
    [167.0, 137.0, 85.0, 76.0, 69.0, 42.0, 39.0, 19.0, 16.0, 14.0, 11.0, 11.0];

/// Bitcoin block propagation simulator
#[derive(Parser, Debug)]
#[command(name = "btcsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Simulated days per run
    #[arg(short = 'd', long, default_value = "1")]
    days: f64,

    /// Number of runs of the scenario
    #[arg(short = 'r', long, default_value = "1")]
    repeat: usize,

    /// Random seed for reproducible results. Run `k` uses `seed + k`.
    #[arg(long)]
    seed: Option<u64>,

    /// How repeated runs are combined
    #[arg(short = 'a', long, value_enum, default_value = "none")]
    average: AverageArg,

    /// Print the results table as CSV
    #[arg(long)]
    csv: bool,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// Honest miners with random hashrate on a random network
    Random {
        #[arg(short = 'n', long, default_value = "6")]
        miners: usize,
    },
    /// Honest miners against one attacker that ignores foreign blocks
    Attack51 {
        /// Number of miners, attacker included
        #[arg(short = 'n', long, default_value = "6")]
        miners: usize,

        /// Attacker's share of the total hashrate
        #[arg(short = 's', long, default_value = "0.51")]
        strength: f64,
    },
    /// Honest miners against one selfish miner
    Selfish {
        /// Number of miners, selfish miner included
        #[arg(short = 'n', long, default_value = "6")]
        miners: usize,

        /// Selfish miner's share of the total hashrate
        #[arg(short = 'p', long, default_value = "0.33")]
        power: f64,

        /// Lead required before the private chain is published
        #[arg(short = 'm', long, default_value = "2")]
        margin: u64,

        /// Instead of a single power value, sweep the selfish miner's share
        /// from 0% up to this percentage in steps of 1%
        #[arg(long, value_name = "PERCENT")]
        sweep_to: Option<usize>,
    },
    /// Large blocks between the twelve largest pools
    Blocksize {
        /// Size of every block in MiB
        #[arg(long, default_value = "10")]
        block_mib: f64,

        /// Verification speed of every miner in MiB/s
        #[arg(long, default_value = "0.5")]
        verify_mib: f64,

        /// Upload bandwidth of each miner in MiB/s, split evenly between its
        /// links
        #[arg(long, default_value = "1")]
        bandwidth_mib: f64,

        /// Latency of every link in seconds
        #[arg(long, default_value = "0.020")]
        latency: f64,

        /// Connect the pools in a ring instead of a complete graph
        #[arg(long)]
        ring: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AverageArg {
    None,
    Mean,
    Median,
    Max,
    Min,
}

impl From<AverageArg> for Average {
    fn from(arg: AverageArg) -> Self {
        match arg {
            AverageArg::None => Average::None,
            AverageArg::Mean => Average::Mean,
            AverageArg::Median => Average::Median,
            AverageArg::Max => Average::Max,
            AverageArg::Min => Average::Min,
        }
    }
}

/// `n` hashrate weights drawn from an exponential distribution.
fn random_weights<R: Rng>(rng: &mut R, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.sample::<f64, _>(Exp1)).collect()
}

fn scenario_builder<R: Rng>(
    scenario: &Scenario,
    rng: &mut R,
) -> Result<SimulationBuilder> {
    let builder = match *scenario {
        Scenario::Random { miners } => {
            ensure!(miners > 0, "need at least one miner");

            SimulationBuilder::new()
                .add_miners(Honest::new(), miners)
                .power_weights(random_weights(rng, miners))
        }
        Scenario::Attack51 { miners, strength } => {
            ensure!(miners > 1, "need at least one honest miner");
            ensure!(
                strength > 0.0 && strength < 1.0,
                "attacker strength {strength} must be between 0 and 1"
            );

            let mut weights = random_weights(rng, miners - 1);
            let honest: f64 = weights.iter().sum();
            weights.push(honest * strength / (1.0 - strength));

            SimulationBuilder::new()
                .add_miners(Honest::new(), miners - 1)
                .add_miner(Majority::new())
                .power_weights(weights)
        }
        Scenario::Selfish { miners, power, margin, sweep_to } => {
            ensure!(miners > 1, "need at least one honest miner");

            let selfish = MinerId::from(miners - 1);
            let builder = SimulationBuilder::new()
                .add_miners(Honest::new(), miners - 1)
                .add_miner(Selfish::new(margin));

            match sweep_to {
                Some(to) => {
                    ensure!(to <= 100, "sweep bound {to}% is above 100%");
                    builder.miner_power_iter(selfish, (0..=to).percent())
                }
                None => builder.miner_power(selfish, power),
            }
        }
        Scenario::Blocksize {
            block_mib,
            verify_mib,
            bandwidth_mib,
            latency,
            ring,
        } => {
            let n = POOL_WEIGHTS.len();
            let (topology, links) = if ring {
                (Topology::Ring, 2)
            } else {
                (Topology::Complete, n)
            };

            SimulationBuilder::new()
                .add_miners(Honest::new(), n)
                .power_weights(POOL_WEIGHTS)
                .block_size(BlockSize::Fixed(block_mib * MIB))
                .verify_rate(verify_mib * MIB)
                .topology(topology)
                .link_profile(LinkProfile::fixed(
                    latency,
                    bandwidth_mib * MIB / links as f64,
                ))
        }
    };

    Ok(builder)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,propagation_sim=info")),
        )
        .init();

    let args = Args::parse();
    let start = Instant::now();

    let mut rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let mut builder = scenario_builder(&args.scenario, &mut rng)?
        .days(args.days)
        .repeat_all(args.repeat);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }

    let format = if args.csv { Format::CSV } else { Format::PrettyPrint };
    let mut results = builder
        .build()?
        .run_all()?
        .all()
        .average(args.average.into())
        .format(format);

    if let Scenario::Selfish { miners, .. } = args.scenario {
        results = results.mining_power_func(
            MinerId::from(miners - 1),
            "Ideal Selfish Revenue",
            selfish_revenue(0.0),
        );
    }
    let results = results.build();

    println!("{}", results);
    info!(
        elapsed_secs = start.elapsed().as_secs_f64(),
        "all runs finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{scenario_builder, Scenario};

    fn selfish(sweep_to: Option<usize>) -> Scenario {
        Scenario::Selfish { miners: 3, power: 0.3, margin: 2, sweep_to }
    }

    #[test]
    fn selfish_sweep_runs_every_percentage() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let group = scenario_builder(&selfish(Some(40)), &mut rng)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(group.num_runs(), 41);

        let group = scenario_builder(&selfish(None), &mut rng)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(group.num_runs(), 1);

        assert!(scenario_builder(&selfish(Some(101)), &mut rng).is_err());
    }
}
