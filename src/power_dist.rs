//! Describing distributions of mining power

use crate::miner::MinerId;

/// Numeric type used to represent mining power.
pub type PowerValue = f64;

/// Determines how the network's hashrate is split between miners. Each
/// value is a miner's share of the total, so the shares sum to 1.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum PowerDistribution {
    /// Weight each miner equally.
    #[default]
    Equal,
    /// Set the specified miner's power to some value between `0.0` and `1.0`
    /// inclusive, with mining power distributed equally between all other
    /// miners.
    SetMiner(MinerId, PowerValue),
    /// Set all mining power values to those in the given vector.
    SetValues(Vec<PowerValue>),
    /// Use the given relative weights, normalized to sum to 1. This is how
    /// real-world hashrate figures are usually given.
    Weights(Vec<PowerValue>),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PowerDistributionError {
    #[error("distribution values sum to {0}, not 1.0")]
    BadDistributionSum(PowerValue),
    #[error("power value {0} is not in the range 0.0..=1.0")]
    BadPowerValue(PowerValue),
    #[error("weight {0} must be finite and non-negative")]
    BadWeight(PowerValue),
    #[error("weights must not all be zero")]
    ZeroWeights,
    #[error("cannot set power for invalid MinerId {0}")]
    SetMinerBadMinerID(MinerId),
    #[error("cannot set power for a single miner")]
    SetMinerSingleMiner,
    #[error("power distribution size {0} does not match miner count {1}")]
    WrongNumMiners(usize, usize),
    #[error("cannot create a distribution for zero miners")]
    ZeroMinersGiven,
}

impl PowerDistribution {
    /// Allowable difference between a distribution sum and 1.0.
    const EPSILON_POWER: PowerValue = 1e-6;

    /// Returns true if the discrete distribution described by this
    /// [`PowerDistribution`] is valid over `num_miners`.
    #[inline]
    pub fn is_valid(&self, num_miners: usize) -> bool {
        self.validate(num_miners).is_ok()
    }

    /// Checks if the discrete distribution described by this
    /// [`PowerDistribution`] is valid over `num_miners`.
    pub fn validate(
        &self,
        num_miners: usize,
    ) -> Result<(), PowerDistributionError> {
        use PowerDistributionError::*;

        if num_miners == 0 {
            return Err(ZeroMinersGiven);
        }

        match &self {
            Self::Equal => Ok(()),
            Self::SetValues(dist) => {
                if dist.len() != num_miners {
                    return Err(WrongNumMiners(dist.len(), num_miners));
                }

                if let Some(&val) = dist
                    .iter()
                    .find(|&x| x.is_nan() || !(0.0..=1.0).contains(x))
                {
                    return Err(BadPowerValue(val));
                }

                let sum = dist.iter().sum();
                if PowerValue::abs(sum - 1.0) > Self::EPSILON_POWER {
                    return Err(BadDistributionSum(sum));
                }

                Ok(())
            }
            Self::Weights(weights) => {
                if weights.len() != num_miners {
                    return Err(WrongNumMiners(weights.len(), num_miners));
                }

                if let Some(&w) =
                    weights.iter().find(|&w| !w.is_finite() || *w < 0.0)
                {
                    return Err(BadWeight(w));
                }

                if weights.iter().sum::<PowerValue>() <= 0.0 {
                    return Err(ZeroWeights);
                }

                Ok(())
            }
            Self::SetMiner(miner_id, power) => {
                if num_miners == 1 {
                    return Err(SetMinerSingleMiner);
                }

                if miner_id.get() >= num_miners {
                    return Err(SetMinerBadMinerID(*miner_id));
                }

                let power = *power;
                if power.is_nan() || !(0.0..=1.0).contains(&power) {
                    return Err(BadPowerValue(power));
                }

                Ok(())
            }
        }
    }

    /// Returns the power of `miner_id` according to this power distribution.
    /// Returns a [`PowerDistributionError`] if the underlying distribution is
    /// invalid over `num_miners`.
    pub fn power_of(
        &self,
        miner_id: MinerId,
        num_miners: usize,
    ) -> Result<PowerValue, PowerDistributionError> {
        let values = self.values(num_miners)?;

        values
            .get(miner_id.get())
            .copied()
            .ok_or(PowerDistributionError::SetMinerBadMinerID(miner_id))
    }

    /// Returns the power values described by this power distribution as a
    /// vector, indexed by [`MinerId`]. Returns a [`PowerDistributionError`]
    /// if the underlying distribution is invalid over `num_miners`.
    pub fn values(
        &self,
        num_miners: usize,
    ) -> Result<Vec<PowerValue>, PowerDistributionError> {
        self.validate(num_miners)?;

        let values = match &self {
            Self::Equal => vec![1.0 / num_miners as PowerValue; num_miners],
            Self::SetValues(dist) => dist.clone(),
            Self::Weights(weights) => {
                let total: PowerValue = weights.iter().sum();
                weights.iter().map(|w| w / total).collect()
            }
            Self::SetMiner(miner_id, power) => {
                let other = (1.0 - power) / (num_miners - 1) as PowerValue;

                let mut dist = vec![other; num_miners];
                dist[miner_id.get()] = *power;

                dist
            }
        };

        Ok(values)
    }
}

/// Helper trait for turning inclusive integer ranges into percentages.
/// # Example
/// ```
/// use propagation_sim::power_dist::Percent;
///
/// for p in (0..=10).percent() {
///    println!("{}", p);
/// }
/// ```
pub trait Percent {
    /// Returns an iterator over percentage values. Can be used with
    /// [`SimulationBuilder`](crate::simulation::SimulationBuilder) to describe
    /// distributions of mining power.
    fn percent(self) -> impl Iterator<Item = PowerValue>;
}

impl Percent for std::ops::RangeInclusive<usize> {
    fn percent(self) -> impl Iterator<Item = PowerValue> {
        assert!(
            (0..=100).contains(self.start()) && (0..=100).contains(self.end()),
            "invalid percent range {} to {}",
            self.start(),
            self.end()
        );

        self.map(|n| n as PowerValue / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{PowerDistribution, PowerDistributionError};
    use crate::miner::MinerId;

    #[test]
    fn power_dist_equal_power() {
        assert_eq!(
            PowerDistribution::Equal.values(4).unwrap(),
            vec![0.25, 0.25, 0.25, 0.25]
        )
    }

    #[test]
    fn set_miner_splits_remainder() {
        let dist = PowerDistribution::SetMiner(MinerId(2), 0.25);

        assert_eq!(dist.values(4).unwrap(), vec![0.25, 0.25, 0.25, 0.25]);
        assert_eq!(dist.power_of(MinerId(2), 4).unwrap(), 0.25);

        let dist = PowerDistribution::SetMiner(MinerId(0), 0.1);
        assert_eq!(dist.values(4).unwrap(), vec![0.1, 0.3, 0.3, 0.3]);
        assert_eq!(
            PowerDistribution::SetMiner(MinerId(2), 0.5)
                .validate(2)
                .unwrap_err(),
            PowerDistributionError::SetMinerBadMinerID(MinerId(2))
        );
    }

    #[test]
    fn weights_are_normalized() {
        let dist = PowerDistribution::Weights(vec![3.0, 1.0]);

        assert_eq!(dist.values(2).unwrap(), vec![0.75, 0.25]);
        assert_eq!(
            PowerDistribution::Weights(vec![0.0, 0.0]).validate(2),
            Err(PowerDistributionError::ZeroWeights)
        );
    }

    #[test]
    fn set_values_must_sum_to_one() {
        assert!(PowerDistribution::SetValues(vec![0.5, 0.5]).is_valid(2));
        assert!(matches!(
            PowerDistribution::SetValues(vec![0.5, 0.4]).validate(2),
            Err(PowerDistributionError::BadDistributionSum(_))
        ));
        assert_eq!(
            PowerDistribution::SetValues(vec![1.0]).validate(2),
            Err(PowerDistributionError::WrongNumMiners(1, 2))
        );
    }
}
