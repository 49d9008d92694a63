//! Implementation of the HONEST (or FRONTIER) mining strategy via the
//! [Strategy] trait.

use crate::block::Block;

use super::{Action, MinerId, Strategy};

/// Switches to and announces every block which is taller than the current
/// chain head, regardless of who mined it.
#[derive(Debug, Clone, Default)]
pub struct Honest;

impl Honest {
    pub fn new() -> Self {
        Honest
    }
}

impl Strategy for Honest {
    fn name(&self) -> String {
        "Honest".into()
    }

    fn on_block_added(
        &mut self,
        _me: MinerId,
        head: &Block,
        block: &Block,
    ) -> Action {
        if block.height > head.height {
            Action::Publish
        } else {
            Action::Wait
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Honest;
    use crate::{
        block::Block,
        context::SimContext,
        miner::{tests::block_on, Action, MinerId, Strategy},
    };

    #[test]
    fn publishes_only_taller_blocks() {
        let mut ctx = SimContext::new(0);
        let seed = Block::seed(0.0);
        let a1 = block_on(&mut ctx, &seed, 1, 0.0);
        let b1 = block_on(&mut ctx, &seed, 2, 0.0);
        let mut honest = Honest::new();

        assert_eq!(
            honest.on_block_added(MinerId(0), &seed, &a1),
            Action::Publish
        );
        assert_eq!(honest.on_block_added(MinerId(0), &a1, &b1), Action::Wait);
    }
}
