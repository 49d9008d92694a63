//! Post-simulation analysis of miners' chains
//!
//! Everything here is read-only over finished [`Miner`]s. A "reference"
//! miner's canonical chain plays the role of the network's agreed history.

use std::collections::{BTreeMap, HashSet};

use crate::{
    block::BlockId,
    miner::{Miner, MinerId},
};

/// IDs of the blocks on `miner`'s canonical chain, from the seed block to
/// its chain head.
pub fn canonical_chain(miner: &Miner) -> Vec<BlockId> {
    miner
        .chain_head()
        .map(|head| miner.blocks().ancestors_of(head))
        .unwrap_or_default()
}

/// Number of blocks credited to each miner on `miner`'s canonical chain.
/// The seed block is credited to nobody.
pub fn rewards(miner: &Miner) -> BTreeMap<MinerId, u64> {
    let mut tally = BTreeMap::new();

    for id in canonical_chain(miner) {
        if let Some(winner) = miner.blocks()[id].miner {
            *tally.entry(winner).or_default() += 1;
        }
    }

    tally
}

/// Blocks stored by `miner` which are not on its own canonical chain.
pub fn orphans_of(miner: &Miner) -> Vec<BlockId> {
    let canonical: HashSet<_> = canonical_chain(miner).into_iter().collect();

    miner
        .blocks()
        .iter()
        .map(|block| block.id)
        .filter(|id| !canonical.contains(id))
        .collect()
}

/// `(time, height)` of every block on `miner`'s canonical chain.
pub fn height_trace(miner: &Miner) -> Vec<(f64, u64)> {
    canonical_chain(miner)
        .into_iter()
        .map(|id| {
            let block = &miner.blocks()[id];
            (block.time, block.height)
        })
        .collect()
}

/// Mean time between blocks on `miner`'s canonical chain, or `None` if the
/// chain holds only the seed block.
pub fn average_block_interval(miner: &Miner) -> Option<f64> {
    let chain = canonical_chain(miner);
    let (first, last) = (chain.first()?, chain.last()?);
    let (seed, head) = (&miner.blocks()[first], &miner.blocks()[last]);

    if head.height == 0 {
        return None;
    }

    Some((head.time - seed.time) / head.height as f64)
}

/// Network-wide view of a finished simulation, judged against the chain of
/// one reference miner.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub reference: MinerId,
    /// The reference miner's canonical chain, seed block first.
    pub canonical: Vec<BlockId>,
    /// Canonical blocks credited to each miner.
    pub rewards: BTreeMap<MinerId, u64>,
    /// Distinct blocks stored by any miner that are not canonical.
    pub orphans: usize,
    pub average_block_interval: Option<f64>,
}

impl ChainSummary {
    /// Summarizes `miners` against the chain of `miners[reference]`.
    ///
    /// ## Panics
    /// Panics if `reference` is not a valid index into `miners`.
    pub fn new(miners: &[Miner], reference: MinerId) -> Self {
        let miner = &miners[reference.get()];
        let canonical = canonical_chain(miner);
        let on_chain: HashSet<_> = canonical.iter().copied().collect();

        let orphans = miners
            .iter()
            .flat_map(|m| m.blocks().iter().map(|block| block.id))
            .filter(|id| !on_chain.contains(id))
            .collect::<HashSet<_>>()
            .len();

        ChainSummary {
            reference,
            rewards: rewards(miner),
            average_block_interval: average_block_interval(miner),
            canonical,
            orphans,
        }
    }

    /// Height of the reference miner's chain head.
    pub fn height(&self) -> u64 {
        self.canonical.len().saturating_sub(1) as u64
    }

    /// Fraction of canonical blocks credited to `miner`. Zero if the chain
    /// holds only the seed block.
    pub fn revenue(&self, miner: MinerId) -> f64 {
        match self.height() {
            0 => 0.0,
            height => {
                self.rewards.get(&miner).copied().unwrap_or_default() as f64
                    / height as f64
            }
        }
    }

    /// Orphans per canonical block.
    pub fn orphan_rate(&self) -> f64 {
        match self.height() {
            0 => 0.0,
            height => self.orphans as f64 / height as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        average_block_interval, canonical_chain, height_trace, orphans_of,
        rewards, ChainSummary,
    };
    use crate::{
        block::Block,
        context::SimContext,
        event::{Event, EventKind},
        miner::{
            tests::{block_on, idle_miner, run},
            MinerId,
        },
    };

    #[test]
    fn summary_of_forked_network() {
        let mut ctx = SimContext::new(21);
        let mut miners = vec![idle_miner(&mut ctx, 0), idle_miner(&mut ctx, 1)];
        let seed = Block::seed(0.0);

        let a1 = block_on(&mut ctx, &seed, 0, 0.0);
        let b1 = block_on(&mut ctx, &seed, 1, 0.0);
        let a2 = block_on(&mut ctx, &a1, 1, 0.0);
        let a3 = block_on(&mut ctx, &a2, 0, 0.0);

        // Miner 0 sees everything, miner 1 only its fork
        for (t, block) in [a1, b1, a2, a3].into_iter().enumerate() {
            let kind = EventKind::Block(block);
            ctx.schedule(t as f64, Event::new(MinerId(0), MinerId(2), kind));
        }
        ctx.schedule(
            0.0,
            Event::new(MinerId(1), MinerId(2), EventKind::Block(b1)),
        );
        run(&mut ctx, &mut miners, 100.0);

        assert_eq!(canonical_chain(&miners[0]), vec![seed.id, a1.id, a2.id, a3.id]);
        assert_eq!(orphans_of(&miners[0]), vec![b1.id]);

        let tally = rewards(&miners[0]);
        assert_eq!(tally.get(&MinerId(0)), Some(&2));
        assert_eq!(tally.get(&MinerId(1)), Some(&1));

        let summary = ChainSummary::new(&miners, MinerId(0));
        assert_eq!(summary.height(), 3);
        assert_eq!(summary.orphans, 1);
        assert!((summary.revenue(MinerId(0)) - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.orphan_rate() - 1.0 / 3.0).abs() < 1e-12);

        // Block times are parent time + 1 in the test helper
        assert_eq!(average_block_interval(&miners[0]), Some(1.0));
        let heights: Vec<_> =
            height_trace(&miners[0]).into_iter().map(|(_, h)| h).collect();
        assert_eq!(heights, vec![0, 1, 2, 3]);
    }

    #[test]
    fn seed_only_chain() {
        let mut ctx = SimContext::new(0);
        let miners = vec![idle_miner(&mut ctx, 0)];
        let summary = ChainSummary::new(&miners, MinerId(0));

        assert_eq!(summary.height(), 0);
        assert_eq!(summary.revenue(MinerId(0)), 0.0);
        assert_eq!(summary.orphan_rate(), 0.0);
        assert!(summary.average_block_interval.is_none());
        assert!(summary.rewards.is_empty());
    }
}
