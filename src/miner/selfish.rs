//! Selfish mining implementation

use crate::block::Block;

use super::{Action, MinerId, Strategy};

/// Keeps its own blocks private and releases them in bursts, in the spirit
/// of [Eyal and Sirer](https://doi.org/10.48550/arXiv.1311.0243).
///
/// Own blocks are withheld until the private chain leads the tallest public
/// block seen by `margin` blocks, at which point the private head is
/// published and overrides the public chain. If the public chain catches up
/// to within one block of a withheld head, the head is released immediately
/// to race the public block. A taller public block is always adopted.
#[derive(Debug, Clone)]
pub struct Selfish {
    margin: u64,
    /// Height of the tallest block seen from other miners.
    public_height: u64,
    /// Whether the current head is an unannounced own block.
    withholding: bool,
}

impl Selfish {
    /// Creates a selfish miner which publishes once it leads by `margin`
    /// blocks. A margin of 0 is treated as 1.
    pub fn new(margin: u64) -> Self {
        Selfish {
            margin: margin.max(1),
            public_height: 0,
            withholding: false,
        }
    }

    /// Lead over the public chain needed before publishing.
    pub fn margin(&self) -> u64 {
        self.margin
    }
}

impl Default for Selfish {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Strategy for Selfish {
    fn name(&self) -> String {
        format!("Selfish({})", self.margin)
    }

    fn on_block_added(
        &mut self,
        me: MinerId,
        head: &Block,
        block: &Block,
    ) -> Action {
        if block.miner == Some(me) {
            if block.height <= head.height {
                return Action::Wait;
            }

            let lead = block.height.saturating_sub(self.public_height);
            if lead >= self.margin {
                // The private chain becomes the public one
                self.public_height = block.height;
                self.withholding = false;
                Action::Publish
            } else {
                self.withholding = true;
                Action::Withhold
            }
        } else {
            self.public_height = self.public_height.max(block.height);

            if block.height > head.height {
                self.withholding = false;
                Action::Publish
            } else if self.withholding
                && head.height <= self.public_height + 1
            {
                self.public_height = self.public_height.max(head.height);
                self.withholding = false;
                Action::Release
            } else {
                Action::Wait
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Selfish;
    use crate::{
        block::Block,
        context::SimContext,
        miner::{tests::block_on, Action, MinerId, Strategy},
    };

    const ME: MinerId = MinerId(0);

    #[test]
    fn withholds_until_margin_reached() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let s1 = block_on(&mut ctx, &seed, 0, 0.0);
        let s2 = block_on(&mut ctx, &s1, 0, 0.0);
        let mut selfish = Selfish::new(2);

        assert_eq!(selfish.on_block_added(ME, &seed, &s1), Action::Withhold);
        assert_eq!(selfish.on_block_added(ME, &s1, &s2), Action::Publish);
    }

    #[test]
    fn published_blocks_count_as_public() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let s1 = block_on(&mut ctx, &seed, 0, 0.0);
        let s2 = block_on(&mut ctx, &s1, 0, 0.0);
        let s3 = block_on(&mut ctx, &s2, 0, 0.0);
        let s4 = block_on(&mut ctx, &s3, 0, 0.0);
        let mut selfish = Selfish::new(2);

        assert_eq!(selfish.on_block_added(ME, &seed, &s1), Action::Withhold);
        assert_eq!(selfish.on_block_added(ME, &s1, &s2), Action::Publish);
        // A fresh lead has to be built on top of the published chain
        assert_eq!(selfish.on_block_added(ME, &s2, &s3), Action::Withhold);
        assert_eq!(selfish.on_block_added(ME, &s3, &s4), Action::Publish);
    }

    #[test]
    fn releases_when_public_chain_catches_up() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let s1 = block_on(&mut ctx, &seed, 0, 0.0);
        let h1 = block_on(&mut ctx, &seed, 1, 0.0);
        let h2 = block_on(&mut ctx, &h1, 1, 0.0);
        let mut selfish = Selfish::new(3);

        assert_eq!(selfish.on_block_added(ME, &seed, &s1), Action::Withhold);
        assert_eq!(selfish.on_block_added(ME, &s1, &h1), Action::Release);
        // The released block is public, so the next own block leads by one
        let s2 = block_on(&mut ctx, &s1, 0, 0.0);
        assert_eq!(selfish.on_block_added(ME, &s1, &s2), Action::Withhold);
        // A taller public block always wins
        assert_eq!(selfish.on_block_added(ME, &s1, &h2), Action::Publish);
    }

    #[test]
    fn idle_when_not_withholding() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let h1 = block_on(&mut ctx, &seed, 1, 0.0);
        let other = block_on(&mut ctx, &seed, 2, 0.0);
        let mut selfish = Selfish::default();

        assert_eq!(selfish.on_block_added(ME, &seed, &h1), Action::Publish);
        assert_eq!(selfish.on_block_added(ME, &h1, &other), Action::Wait);
        assert_eq!(selfish.name(), "Selfish(2)");
    }
}
