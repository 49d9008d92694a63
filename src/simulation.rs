//! Building/running simulations and analyzing the resulting data

use std::num::NonZeroUsize;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    analysis::ChainSummary,
    block::Block,
    context::SimContext,
    miner::{BlockSize, Miner, MinerConfig, MinerError, MinerId, Strategy},
    power_dist::PowerValue,
    results::ResultsBuilder,
    scheduler::SchedulerError,
    topology::{LinkProfile, Topology, TopologyError},
};

pub mod builder;

pub use builder::{SimulationBuildError, SimulationBuilder};

/// Seconds in a simulated day.
pub const DAY: f64 = 24.0 * 60.0 * 60.0;

/// Container for a group of simulations which run on the same set of miners.
/// Each power distribution is simulated `repeat_all` times. Simulations
/// should be run using this struct's [`run_all`](Self::run_all) method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    strategies: Vec<Box<dyn Strategy>>,
    power_dists: Vec<Vec<PowerValue>>,
    repeat_all: NonZeroUsize,
    horizon: f64,
    block_interval: f64,
    verify_rate: f64,
    block_size: BlockSize,
    topology: Topology,
    link_profile: LinkProfile,
    seed: Option<u64>,
    reference: MinerId,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("event queue ran dry before the horizon")]
    Scheduler(#[from] SchedulerError),
    #[error("miner setup or dispatch failed")]
    Miner(#[from] MinerError),
    #[error("could not generate the network topology")]
    Topology(#[from] TopologyError),
    #[error("event addressed to unknown miner {0}")]
    UnknownMiner(MinerId),
    #[error("miner at index {index} has id {id}")]
    MinerIndex { index: usize, id: MinerId },
}

impl SimulationGroup {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Number of simulations [`run_all`](Self::run_all) executes.
    pub fn num_runs(&self) -> usize {
        self.power_dists.len() * self.repeat_all.get()
    }

    /// Runs every simulation in the group, in parallel when the `rayon`
    /// feature is enabled. Outputs keep the order of the power
    /// distributions, with repeated runs grouped together.
    pub fn run_all(self) -> Result<ResultsBuilder, SimulationError> {
        let jobs: Vec<_> = self
            .power_dists
            .iter()
            .flat_map(|dist| std::iter::repeat(dist).take(self.repeat_all.get()))
            .enumerate()
            .collect();

        info!(
            runs = jobs.len(),
            miners = self.strategies.len(),
            horizon = self.horizon,
            "starting simulation group"
        );

        #[cfg(feature = "rayon")]
        let outputs: Result<Vec<_>, _> = jobs
            .into_par_iter()
            .map(|(run, dist)| self.setup(run, dist)?.run())
            .collect();
        #[cfg(not(feature = "rayon"))]
        let outputs: Result<Vec<_>, _> = jobs
            .into_iter()
            .map(|(run, dist)| self.setup(run, dist)?.run())
            .collect();

        Ok(ResultsBuilder::new(outputs?, self.repeat_all))
    }

    /// Creates the network for run number `run` with the given hashrate
    /// shares.
    fn setup(
        &self,
        run: usize,
        power: &[PowerValue],
    ) -> Result<Simulation, SimulationError> {
        let mut ctx = match self.seed {
            Some(seed) => SimContext::new(seed.wrapping_add(run as u64)),
            None => SimContext::from_entropy(),
        };
        let seed_block = Block::seed(0.0);

        let mut miners = Vec::with_capacity(self.strategies.len());
        for (i, strategy) in self.strategies.iter().enumerate() {
            let config =
                MinerConfig::new(power[i] / self.block_interval, self.verify_rate)
                    .block_size(self.block_size)
                    .boxed_strategy(strategy.clone());

            miners.push(Miner::with_config(
                MinerId(i),
                config,
                seed_block,
                &mut ctx,
                0.0,
            )?);
        }

        for (i, j) in self.topology.connections(miners.len(), &mut ctx.rng)? {
            let latency = self.link_profile.latency.sample(&mut ctx.rng);
            let bandwidth = self.link_profile.bandwidth.sample(&mut ctx.rng);

            miners[i].add_link(MinerId(j), latency, bandwidth)?;
            miners[j].add_link(MinerId(i), latency, bandwidth)?;
        }

        let mut sim = Simulation::new(ctx, miners, self.horizon)?;
        sim.power_dist = power.to_vec();
        sim.reference = self.reference;

        Ok(sim)
    }
}

/// One simulated network: the shared context, every miner, and the time at
/// which the run stops.
#[derive(Debug)]
pub struct Simulation {
    ctx: SimContext,
    miners: Vec<Miner>,
    horizon: f64,
    events: u64,
    power_dist: Vec<PowerValue>,
    reference: MinerId,
}

/// Contains the output data from a simulation.
#[derive(Debug)]
pub struct SimulationOutput {
    /// Every miner in its final state, indexed by [`MinerId`].
    pub miners: Vec<Miner>,
    /// Hashrate share of each miner.
    pub power_dist: Vec<PowerValue>,
    pub horizon: f64,
    /// Number of events dispatched.
    pub events: u64,
    /// Events still queued when the horizon was reached.
    pub discarded: usize,
    /// The miner whose chain is used as the network's history.
    pub reference: MinerId,
}

impl SimulationOutput {
    /// Analysis against the reference miner's chain.
    pub fn summary(&self) -> ChainSummary {
        ChainSummary::new(&self.miners, self.reference)
    }
}

impl Simulation {
    /// Wraps an already connected network. `miners[i]` must have
    /// [`MinerId`] `i`.
    pub fn new(
        ctx: SimContext,
        miners: Vec<Miner>,
        horizon: f64,
    ) -> Result<Self, SimulationError> {
        if let Some((index, miner)) =
            miners.iter().enumerate().find(|(i, m)| m.id().get() != *i)
        {
            return Err(SimulationError::MinerIndex { index, id: miner.id() });
        }

        let total: f64 = miners.iter().map(|m| m.hashrate()).sum();
        let power_dist = miners
            .iter()
            .map(|m| if total > 0.0 { m.hashrate() / total } else { 0.0 })
            .collect();

        Ok(Simulation {
            ctx,
            miners,
            horizon,
            events: 0,
            power_dist,
            reference: MinerId(0),
        })
    }

    #[inline]
    pub fn miners(&self) -> &[Miner] {
        &self.miners
    }

    #[inline]
    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Dispatches the next event. Returns its time, or `None` once the next
    /// event lies beyond the horizon.
    pub fn step(&mut self) -> Result<Option<f64>, SimulationError> {
        match self.ctx.queue.peek_time() {
            None => return Err(SchedulerError::EmptyQueue.into()),
            Some(time) if time > self.horizon => return Ok(None),
            Some(_) => (),
        }

        let (time, event) = self.ctx.queue.pop_next()?;
        let miner = self
            .miners
            .get_mut(event.destination.get())
            .ok_or(SimulationError::UnknownMiner(event.destination))?;

        miner.receive_event(&mut self.ctx, time, event)?;
        self.events += 1;

        Ok(Some(time))
    }

    /// Dispatches events until the horizon is reached.
    pub fn run(mut self) -> Result<SimulationOutput, SimulationError> {
        let mut day = 0;
        while let Some(time) = self.step()? {
            if time / DAY > day as f64 {
                debug!(day, events = self.events, "simulated day");
                day = (time / DAY) as u64 + 1;
            }
        }

        let Simulation { ctx, miners, horizon, events, power_dist, reference } =
            self;
        let discarded = ctx.queue.len();

        info!(
            events,
            discarded,
            height = miners
                .get(reference.get())
                .map(|m| m.head_height())
                .unwrap_or_default(),
            "simulation finished"
        );

        Ok(SimulationOutput {
            miners,
            power_dist,
            horizon,
            events,
            discarded,
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Simulation, SimulationError};
    use crate::{
        block::Block,
        context::SimContext,
        miner::{Majority, Miner, MinerConfig, MinerId},
        scheduler::SchedulerError,
    };

    const INTERVAL: f64 = 600.0;
    const VERIFY: f64 = 200.0 * 1024.0;

    fn network(seed: u64, configs: Vec<MinerConfig>) -> (SimContext, Vec<Miner>) {
        let mut ctx = SimContext::new(seed);
        let seed_block = Block::seed(0.0);
        let mut miners: Vec<_> = configs
            .into_iter()
            .enumerate()
            .map(|(i, config)| {
                Miner::with_config(MinerId(i), config, seed_block, &mut ctx, 0.0)
                    .unwrap()
            })
            .collect();

        let n = miners.len();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    miners[i].add_link(MinerId(j), 0.05, 1024.0 * 1024.0).unwrap();
                }
            }
        }

        (ctx, miners)
    }

    #[test]
    fn honest_network_converges_on_one_chain() {
        let configs = (0..4)
            .map(|_| MinerConfig::new(0.25 / INTERVAL, VERIFY))
            .collect();
        let (ctx, miners) = network(1, configs);

        let output = Simulation::new(ctx, miners, 2.0 * 86400.0)
            .unwrap()
            .run()
            .unwrap();

        for miner in output.miners.iter() {
            // Height monotonicity and head monotonicity
            for block in miner.blocks().iter().filter(|b| !b.is_seed()) {
                let parent = &miner.blocks()[block.parent.unwrap()];
                assert_eq!(block.height, parent.height + 1);
            }
            assert!(miner
                .head_history()
                .windows(2)
                .all(|w| w[0].height < w[1].height));
        }

        let summary = output.summary();
        assert!(summary.height() > 100);
        let total: u64 = summary.rewards.values().sum();
        assert_eq!(total, summary.height());

        // Fast links: all miners share almost all of their history
        let reference = &output.miners[0];
        for miner in output.miners.iter() {
            let diff = reference.head_height().abs_diff(miner.head_height());
            assert!(diff <= 1);
        }
    }

    #[test]
    fn majority_attacker_owns_the_chain() {
        let mut configs: Vec<_> = (0..3)
            .map(|_| MinerConfig::new(0.1 / INTERVAL, VERIFY))
            .collect();
        configs.push(MinerConfig::new(0.7 / INTERVAL, VERIFY).strategy(Majority::new()));
        let (ctx, miners) = network(7, configs);

        let output = Simulation::new(ctx, miners, 5.0 * 86400.0)
            .unwrap()
            .run()
            .unwrap();

        // Judged from honest miner 0's point of view
        assert_eq!(output.reference, MinerId(0));
        let summary = output.summary();
        assert!(summary.revenue(MinerId(3)) > 0.9);
    }

    #[test]
    fn empty_queue_is_fatal() {
        let (ctx, miners) = network(
            0,
            vec![MinerConfig::new(0.0, VERIFY), MinerConfig::new(0.0, VERIFY)],
        );
        let result = Simulation::new(ctx, miners, 100.0).unwrap().run();

        assert!(matches!(
            result,
            Err(SimulationError::Scheduler(SchedulerError::EmptyQueue))
        ));
    }

    #[test]
    fn horizon_discards_later_events() {
        let (ctx, miners) =
            network(3, vec![MinerConfig::new(1.0 / INTERVAL, VERIFY)]);
        let output = Simulation::new(ctx, miners, 3600.0).unwrap().run().unwrap();

        assert_eq!(output.discarded, 1);
        assert!(output.miners[0].local_time() <= 3600.0);
        assert_eq!(output.power_dist, vec![1.0]);
    }

    #[test]
    fn miners_must_match_their_index() {
        let mut ctx = SimContext::new(0);
        let miner =
            Miner::new(MinerId(5), 0.0, VERIFY, Block::seed(0.0), &mut ctx, 0.0)
                .unwrap();

        assert!(matches!(
            Simulation::new(ctx, vec![miner], 10.0),
            Err(SimulationError::MinerIndex { index: 0, .. })
        ));
    }
}
