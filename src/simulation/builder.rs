use std::num::NonZeroUsize;

use crate::{
    miner::{BlockSize, MinerId, Strategy},
    power_dist::{PowerDistribution, PowerDistributionError, PowerValue},
    topology::{LinkProfile, Topology},
};

use super::{SimulationGroup, DAY};

/// Builds a [`SimulationGroup`].
///
/// Every setting has a default matching the classic Bitcoin parameters: a
/// 600 second mean block interval, blocks of up to 200 KiB verified at
/// 200 KiB/s, and a random network where each miner opens four links.
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    pub repeat_all: Option<usize>,
    pub horizon: Option<f64>,
    pub block_interval: Option<f64>,
    pub verify_rate: Option<f64>,
    pub block_size: Option<BlockSize>,
    pub topology: Option<Topology>,
    pub link_profile: Option<LinkProfile>,
    pub seed: Option<u64>,
    pub reference: Option<MinerId>,
    power_dists: Vec<PowerDistribution>,
    strategies: Vec<Box<dyn Strategy>>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulationBuildError {
    #[error("no miners were added")]
    NoMinersGiven,
    #[error("number of repeated runs must be greater than 0")]
    ZeroRepeats,
    #[error("simulation horizon {0} must be finite and positive")]
    BadHorizon(f64),
    #[error("mean block interval {0} must be finite and positive")]
    BadBlockInterval(f64),
    #[error("verification rate {0} must be finite and positive")]
    BadVerifyRate(f64),
    #[error("block size bound must be finite and non-negative")]
    BadBlockSize,
    #[error("link latency and bandwidth ranges must be non-negative and positive")]
    BadLinkProfile,
    #[error("random topology needs a degree of at least 1")]
    ZeroDegree,
    #[error("reference miner {0} does not exist")]
    BadReference(MinerId),
    #[error(transparent)]
    PowerDistributionError(#[from] PowerDistributionError),
}

impl SimulationBuilder {
    /// Mean seconds between blocks across the whole network.
    pub const DEFAULT_BLOCK_INTERVAL: f64 = 600.0;
    /// Bytes of block data a miner verifies per second.
    pub const DEFAULT_VERIFY_RATE: f64 = 200.0 * 1024.0;

    /// Creates a new [`SimulationBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a miner following `strategy`. Miners are given [`MinerId`]s in
    /// the order they are added, starting from 0.
    pub fn add_miner<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));

        self
    }

    /// Add `num` miners, each following a clone of `strategy`.
    pub fn add_miners<S: Strategy + Clone + 'static>(
        mut self,
        strategy: S,
        num: usize,
    ) -> Self {
        for _ in 0..num {
            self.strategies.push(Box::new(strategy.clone()));
        }

        self
    }

    /// Each simulation will run `num` times (default 1).
    pub fn repeat_all(mut self, num: usize) -> Self {
        self.repeat_all = Some(num);

        self
    }

    /// Simulated seconds after which each run stops (default one day).
    pub fn horizon(mut self, seconds: f64) -> Self {
        self.horizon = Some(seconds);

        self
    }

    /// Shorthand for a horizon of `days` simulated days.
    pub fn days(self, days: f64) -> Self {
        self.horizon(days * DAY)
    }

    /// Mean seconds between blocks found by the whole network.
    pub fn block_interval(mut self, seconds: f64) -> Self {
        self.block_interval = Some(seconds);

        self
    }

    pub fn verify_rate(mut self, bytes_per_second: f64) -> Self {
        self.verify_rate = Some(bytes_per_second);

        self
    }

    pub fn block_size(mut self, block_size: BlockSize) -> Self {
        self.block_size = Some(block_size);

        self
    }

    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);

        self
    }

    pub fn link_profile(mut self, profile: LinkProfile) -> Self {
        self.link_profile = Some(profile);

        self
    }

    /// Makes runs reproducible. Run `k` of the group is seeded with
    /// `seed + k`. Without a seed, every run draws from system entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// The miner whose chain is treated as the network's history during
    /// analysis (default [`MinerId`] 0).
    pub fn reference_miner(mut self, miner: MinerId) -> Self {
        self.reference = Some(miner);

        self
    }

    /// Run the simulation such that the respective mining power of all miners
    /// is equal to what's specified by `values`.
    pub fn power_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        let dist = values.into_iter().collect();
        self.power_dists.push(PowerDistribution::SetValues(dist));

        self
    }

    /// Run the simulation with mining power proportional to `weights`.
    pub fn power_weights<I>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        let dist = weights.into_iter().collect();
        self.power_dists.push(PowerDistribution::Weights(dist));

        self
    }

    /// Run the simulation such that mining power is equally distributed
    /// between all miners (this is the default behavior).
    pub fn equal_power(mut self) -> Self {
        self.power_dists.push(PowerDistribution::Equal);

        self
    }

    /// Run the simulation such that the mining power of the given miner is
    /// `value`, and mining power is distributed equally between all other
    /// miners.
    pub fn miner_power(mut self, miner: MinerId, value: PowerValue) -> Self {
        self.power_dists.push(PowerDistribution::SetMiner(miner, value));

        self
    }

    /// Call [`SimulationBuilder::miner_power`] once for each element of
    /// `values`.
    pub fn miner_power_iter<I>(mut self, miner: MinerId, values: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        for val in values {
            self.power_dists.push(PowerDistribution::SetMiner(miner, val));
        }

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            repeat_all,
            horizon,
            block_interval,
            verify_rate,
            block_size,
            topology,
            link_profile,
            seed,
            reference,
            mut power_dists,
            strategies,
        } = self;

        if strategies.is_empty() {
            return Err(NoMinersGiven);
        }
        if power_dists.is_empty() {
            power_dists.push(PowerDistribution::Equal);
        }

        let repeat_all = NonZeroUsize::new(repeat_all.unwrap_or(1))
            .ok_or(ZeroRepeats)?;

        let horizon = horizon.unwrap_or(DAY);
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(BadHorizon(horizon));
        }

        let block_interval =
            block_interval.unwrap_or(Self::DEFAULT_BLOCK_INTERVAL);
        if !block_interval.is_finite() || block_interval <= 0.0 {
            return Err(BadBlockInterval(block_interval));
        }

        let verify_rate = verify_rate.unwrap_or(Self::DEFAULT_VERIFY_RATE);
        if !verify_rate.is_finite() || verify_rate <= 0.0 {
            return Err(BadVerifyRate(verify_rate));
        }

        let block_size = block_size.unwrap_or_default();
        let bound = match block_size {
            BlockSize::Fixed(size) => size,
            BlockSize::Uniform { max } => max,
        };
        if !bound.is_finite() || bound < 0.0 {
            return Err(BadBlockSize);
        }

        let topology = topology.unwrap_or(Topology::RANDOM_FOUR);
        if topology == (Topology::Random { degree: 0 }) {
            return Err(ZeroDegree);
        }

        let link_profile = link_profile.unwrap_or_default();
        if !link_profile.is_valid() {
            return Err(BadLinkProfile);
        }

        let n = strategies.len();
        let reference = reference.unwrap_or_default();
        if reference.get() >= n {
            return Err(BadReference(reference));
        }

        let power_dists = power_dists
            .into_iter()
            .map(|dist| dist.values(n))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SimulationGroup {
            strategies,
            power_dists,
            repeat_all,
            horizon,
            block_interval,
            verify_rate,
            block_size,
            topology,
            link_profile,
            seed,
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationBuildError, SimulationBuilder};
    use crate::{
        miner::{Honest, MinerId, Selfish},
        power_dist,
        topology::{LinkProfile, Topology},
    };

    #[test]
    fn example_build() {
        let group = SimulationBuilder::new()
            .add_miner(Honest::new())
            .build()
            .expect("valid simulation build");

        assert_eq!(group.num_runs(), 1);
    }

    #[test]
    fn runs_multiply_by_repeats() {
        let group = SimulationBuilder::new()
            .add_miners(Honest::new(), 3)
            .add_miner(Selfish::new(2))
            .miner_power_iter(MinerId::from(3), [0.1, 0.2, 0.3])
            .repeat_all(4)
            .build()
            .unwrap();

        assert_eq!(group.num_runs(), 12);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        use SimulationBuildError::*;

        assert_eq!(SimulationBuilder::new().build().unwrap_err(), NoMinersGiven);

        let honest = || SimulationBuilder::new().add_miner(Honest::new());
        assert_eq!(honest().repeat_all(0).build().unwrap_err(), ZeroRepeats);
        assert_eq!(honest().horizon(0.0).build().unwrap_err(), BadHorizon(0.0));
        assert_eq!(
            honest().block_interval(-1.0).build().unwrap_err(),
            BadBlockInterval(-1.0)
        );
        assert_eq!(
            honest().topology(Topology::Random { degree: 0 }).build().unwrap_err(),
            ZeroDegree
        );
        assert_eq!(
            honest().link_profile(LinkProfile::fixed(0.1, 0.0)).build().unwrap_err(),
            BadLinkProfile
        );
        assert_eq!(
            honest().reference_miner(MinerId::from(1)).build().unwrap_err(),
            BadReference(MinerId::from(1))
        );
        assert_eq!(
            honest().power_values([0.5]).build().unwrap_err(),
            PowerDistributionError(
                power_dist::PowerDistributionError::BadDistributionSum(0.5)
            )
        );
    }
}
