//! Generating the peer-to-peer network between miners

use std::collections::BTreeSet;

use rand::{seq::SliceRandom, Rng};

/// A scalar parameter which is either constant or drawn uniformly at random
/// for every link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRange {
    Fixed(f64),
    /// Uniform over `low..high`.
    Uniform { low: f64, high: f64 },
}

impl ValueRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Fixed(value) => value,
            Self::Uniform { low, high } => low + rng.gen::<f64>() * (high - low),
        }
    }

    /// Smallest value this range can produce.
    pub fn min(&self) -> f64 {
        match *self {
            Self::Fixed(value) => value,
            Self::Uniform { low, high } => low.min(high),
        }
    }

    fn is_finite(&self) -> bool {
        match *self {
            Self::Fixed(value) => value.is_finite(),
            Self::Uniform { low, high } => low.is_finite() && high.is_finite(),
        }
    }
}

/// Latency (seconds) and bandwidth (bytes per second) of generated links.
/// Both directions of a connection share the same sampled values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkProfile {
    pub latency: ValueRange,
    pub bandwidth: ValueRange,
}

impl LinkProfile {
    /// Links with the given constant latency and bandwidth.
    pub fn fixed(latency: f64, bandwidth: f64) -> Self {
        LinkProfile {
            latency: ValueRange::Fixed(latency),
            bandwidth: ValueRange::Fixed(bandwidth),
        }
    }

    /// Returns true iff every sampled link would have a non-negative latency
    /// and a positive bandwidth.
    pub fn is_valid(&self) -> bool {
        self.latency.is_finite()
            && self.bandwidth.is_finite()
            && self.latency.min() >= 0.0
            && self.bandwidth.min() > 0.0
    }
}

impl Default for LinkProfile {
    /// 20 to 220 ms of latency and 10 to 210 KiB/s of bandwidth.
    fn default() -> Self {
        LinkProfile {
            latency: ValueRange::Uniform { low: 0.020, high: 0.220 },
            bandwidth: ValueRange::Uniform {
                low: 10.0 * 1024.0,
                high: 210.0 * 1024.0,
            },
        }
    }
}

/// Shape of the network. Every connection is symmetric: it becomes one
/// outbound link in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Every miner is connected to every other miner.
    Complete,
    /// Miner `i` is connected to miners `i - 1` and `i + 1`, wrapping around.
    Ring,
    /// Each miner opens up to `degree` connections to distinct peers chosen
    /// uniformly at random. Connections opened by a peer count toward a
    /// miner's own connections.
    Random { degree: usize },
    /// No connections at all.
    #[default]
    Isolated,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("random topology needs a degree of at least 1")]
    ZeroDegree,
}

impl Topology {
    /// The topology used by the original random-network scenarios.
    pub const RANDOM_FOUR: Topology = Topology::Random { degree: 4 };

    /// Returns the undirected connections of this topology over `n` miners
    /// as `(lower, higher)` index pairs, in ascending order.
    pub fn connections<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>, TopologyError> {
        let mut edges = BTreeSet::new();

        match *self {
            Self::Isolated => (),
            Self::Complete => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        edges.insert((i, j));
                    }
                }
            }
            Self::Ring => {
                if n > 1 {
                    for i in 0..n {
                        let j = (i + 1) % n;
                        edges.insert((i.min(j), i.max(j)));
                    }
                }
            }
            Self::Random { degree } => {
                if degree == 0 {
                    return Err(TopologyError::ZeroDegree);
                }

                let mut peers: Vec<usize> = (0..n).collect();
                for i in 0..n {
                    peers.shuffle(rng);
                    for &j in peers.iter().filter(|&&j| j != i).take(degree) {
                        edges.insert((i.min(j), i.max(j)));
                    }
                }
            }
        }

        Ok(edges.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{LinkProfile, Topology, TopologyError, ValueRange};

    #[test]
    fn complete_and_ring_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(Topology::Complete.connections(5, &mut rng).unwrap().len(), 10);
        assert_eq!(Topology::Ring.connections(5, &mut rng).unwrap().len(), 5);
        assert_eq!(
            Topology::Ring.connections(2, &mut rng).unwrap(),
            vec![(0, 1)]
        );
        assert!(Topology::Ring.connections(1, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn random_has_no_self_or_duplicate_links() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let edges =
            Topology::RANDOM_FOUR.connections(12, &mut rng).unwrap();

        assert!(edges.iter().all(|&(i, j)| i < j && j < 12));
        let mut sorted = edges.clone();
        sorted.dedup();
        assert_eq!(sorted, edges);

        // Every miner opened at least min(degree, n - 1) connections
        for i in 0..12 {
            let degree =
                edges.iter().filter(|&&(a, b)| a == i || b == i).count();
            assert!(degree >= 4);
        }

        assert_eq!(
            Topology::Random { degree: 0 }.connections(3, &mut rng),
            Err(TopologyError::ZeroDegree)
        );
    }

    #[test]
    fn link_profile_validation() {
        assert!(LinkProfile::default().is_valid());
        assert!(!LinkProfile::fixed(0.1, 0.0).is_valid());
        assert!(!LinkProfile::fixed(-0.1, 10.0).is_valid());

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let range = ValueRange::Uniform { low: 2.0, high: 3.0 };
        for _ in 0..100 {
            let v = range.sample(&mut rng);
            assert!((2.0..3.0).contains(&v));
        }
    }
}
