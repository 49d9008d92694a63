//! State shared by all miners within one simulation run

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{block::BlockId, event::Event, scheduler::Scheduler};

/// The one piece of state every [`Miner`](crate::miner::Miner) touches.
///
/// Holds the event queue, the random number generator used for mining and
/// block sizes, and the counter that hands out block identifiers. It is
/// passed by `&mut` into every miner call, so a miner only mutates it while
/// handling the event currently being dispatched.
#[derive(Debug)]
pub struct SimContext {
    pub queue: Scheduler,
    pub rng: ChaCha8Rng,
    next_block_id: u64,
}

impl SimContext {
    /// Creates a context whose randomness is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates a context seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        SimContext {
            queue: Scheduler::new(),
            rng,
            next_block_id: BlockId::SEED.get() + 1,
        }
    }

    /// Returns a fresh, never before used [`BlockId`].
    pub fn next_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;

        id
    }

    /// Shorthand for `self.queue.schedule(time, event)`.
    #[inline]
    pub fn schedule(&mut self, time: f64, event: Event) {
        self.queue.schedule(time, event);
    }
}

#[cfg(test)]
mod tests {
    use super::SimContext;
    use crate::block::BlockId;

    #[test]
    fn block_ids_are_unique_and_skip_seed() {
        let mut ctx = SimContext::new(7);
        let a = ctx.next_block_id();
        let b = ctx.next_block_id();

        assert_ne!(a, BlockId::SEED);
        assert_ne!(a, b);
        assert!(b > a);
    }
}
