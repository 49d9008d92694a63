//! The majority attacker: a miner that only ever builds on its own blocks.

use crate::block::Block;

use super::{Action, MinerId, Strategy};

/// Stores blocks mined by others but never switches to them. With more than
/// half of the network's hashrate its private chain eventually outgrows the
/// honest one and every other miner reorganizes onto it.
#[derive(Debug, Clone, Default)]
pub struct Majority;

impl Majority {
    pub fn new() -> Self {
        Majority
    }
}

impl Strategy for Majority {
    fn name(&self) -> String {
        "Majority".into()
    }

    fn on_block_added(
        &mut self,
        me: MinerId,
        head: &Block,
        block: &Block,
    ) -> Action {
        if block.miner == Some(me) && block.height > head.height {
            Action::Publish
        } else {
            Action::Wait
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Majority;
    use crate::{
        block::Block,
        context::SimContext,
        miner::{tests::block_on, Action, MinerId, Strategy},
    };

    #[test]
    fn ignores_foreign_blocks() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let foreign = block_on(&mut ctx, &seed, 1, 0.0);
        let taller = block_on(&mut ctx, &foreign, 1, 0.0);
        let own = block_on(&mut ctx, &seed, 0, 0.0);
        let mut attacker = Majority::new();

        assert_eq!(
            attacker.on_block_added(MinerId(0), &seed, &foreign),
            Action::Wait
        );
        assert_eq!(
            attacker.on_block_added(MinerId(0), &seed, &taller),
            Action::Wait
        );
        assert_eq!(
            attacker.on_block_added(MinerId(0), &seed, &own),
            Action::Publish
        );
    }
}
