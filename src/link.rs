//! Serial resources: outbound links and verification capacity

use crate::miner::MinerId;

/// A resource which serves one request at a time, in request order, at a
/// fixed rate in bytes per second.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialResource {
    /// Bytes processed per second.
    pub rate: f64,
    /// Simulated time at which the resource becomes free.
    pub busy_until: f64,
}

impl SerialResource {
    pub fn new(rate: f64) -> Self {
        SerialResource { rate, busy_until: 0.0 }
    }

    /// Reserves the resource for a request of `size` bytes made at
    /// `request_time`, paying `overhead` seconds up front. Returns the time
    /// at which the request completes.
    pub fn occupy(&mut self, request_time: f64, overhead: f64, size: f64) -> f64 {
        let start = request_time.max(self.busy_until) + overhead;
        let done = start + size / self.rate;
        self.busy_until = done;

        done
    }
}

/// One miner's outbound channel toward a peer.
///
/// Transmissions on a link never overlap: concurrent sends queue behind each
/// other and each one pays the latency again.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub destination: MinerId,
    /// One-way latency in seconds.
    pub latency: f64,
    channel: SerialResource,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LinkError {
    #[error("link latency {0} must be finite and non-negative")]
    BadLatency(f64),
    #[error("link bandwidth {0} must be finite and positive")]
    BadBandwidth(f64),
}

impl Link {
    pub fn new(
        destination: MinerId,
        latency: f64,
        bandwidth: f64,
    ) -> Result<Self, LinkError> {
        if !latency.is_finite() || latency < 0.0 {
            return Err(LinkError::BadLatency(latency));
        }
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(LinkError::BadBandwidth(bandwidth));
        }

        Ok(Link {
            destination,
            latency,
            channel: SerialResource::new(bandwidth),
        })
    }

    /// Bytes per second.
    #[inline]
    pub fn bandwidth(&self) -> f64 {
        self.channel.rate
    }

    #[inline]
    pub fn busy_until(&self) -> f64 {
        self.channel.busy_until
    }

    /// Sends `size` bytes at `request_time` and returns the arrival time at
    /// the destination. Zero-sized control messages still pay latency.
    pub fn occupy(&mut self, request_time: f64, size: f64) -> f64 {
        self.channel.occupy(request_time, self.latency, size)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Link, LinkError, SerialResource};
    use crate::miner::MinerId;

    #[test]
    fn idle_link_pays_latency_and_transfer() {
        let mut link = Link::new(MinerId::from(1), 0.5, 100.0).unwrap();
        let arrival = link.occupy(10.0, 200.0);

        assert_eq!(arrival, 12.5);
        assert_eq!(link.busy_until(), 12.5);
    }

    #[test]
    fn busy_link_queues_sends() {
        let mut link = Link::new(MinerId::from(1), 1.0, 10.0).unwrap();
        let first = link.occupy(0.0, 100.0);
        let second = link.occupy(0.0, 0.0);

        assert_eq!(first, 11.0);
        assert_eq!(second, 12.0);
    }

    #[test]
    fn verification_has_no_latency() {
        let mut cpu = SerialResource::new(50.0);

        assert_eq!(cpu.occupy(1.0, 0.0, 100.0), 3.0);
        assert_eq!(cpu.occupy(2.0, 0.0, 50.0), 4.0);
        assert_eq!(cpu.occupy(10.0, 0.0, 0.0), 10.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            Link::new(MinerId::from(1), -1.0, 1.0).unwrap_err(),
            LinkError::BadLatency(-1.0)
        );
        assert_eq!(
            Link::new(MinerId::from(1), 0.0, 0.0).unwrap_err(),
            LinkError::BadBandwidth(0.0)
        );
    }

    proptest! {
        #[test]
        fn occupancy_is_serial(
            latency in 0.0f64..1.0,
            bandwidth in 1.0f64..1e6,
            sends in prop::collection::vec((0.0f64..100.0, 0.0f64..1e6), 1..40),
        ) {
            let mut link = Link::new(MinerId::from(0), latency, bandwidth).unwrap();
            let mut last = 0.0;
            let mut clock = 0.0;

            for (delay, size) in sends {
                clock += delay;
                let arrival = link.occupy(clock, size);

                prop_assert!(arrival >= last);
                prop_assert!(arrival >= clock + latency);
                prop_assert_eq!(link.busy_until(), arrival);
                last = arrival;
            }
        }
    }
}
