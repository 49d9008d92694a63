use std::{collections::HashMap, ops::Index};

use crate::block::{Block, BlockId};

/// A miner's local view of every block it has accepted. Blocks are
/// [inserted](BlockStore::insert) only after verification, so every stored
/// block other than the seed has its parent stored as well.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    /// Map from the ID of a block to the block itself.
    blocks: HashMap<BlockId, Block>,
    /// IDs of all stored blocks in the order they were inserted.
    order: Vec<BlockId>,
    /// Maximum height of any stored block.
    max_height: u64,
}

impl BlockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff a block with the given ID is stored.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Returns the parent of the block with the given ID.
    #[inline]
    pub fn parent_of(&self, id: BlockId) -> Option<BlockId> {
        self.blocks.get(&id).and_then(|block| block.parent)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    /// Stores `block`. Returns false, leaving the store unchanged, if a block
    /// with the same ID is already stored.
    pub fn insert(&mut self, block: Block) -> bool {
        if self.contains(block.id) {
            return false;
        }

        self.max_height = self.max_height.max(block.height);
        self.order.push(block.id);
        self.blocks.insert(block.id, block);

        true
    }

    /// Iterates over stored blocks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        self.order.iter().map(|id| &self.blocks[id])
    }

    /// Returns the IDs of all blocks on the path from the given block ID back
    /// to the root, in ascending order of height and including the given
    /// block ID. The walk stops early at the first ancestor that is not
    /// stored.
    pub fn ancestors_of(&self, id: BlockId) -> Vec<BlockId> {
        let mut ancestors = vec![];

        let mut curr = Some(id);
        while let Some(block) = curr.and_then(|id| self.get(id)) {
            ancestors.push(block.id);
            curr = block.parent;
        }

        ancestors.reverse();
        ancestors
    }
}

impl Index<BlockId> for BlockStore {
    type Output = Block;

    fn index(&self, index: BlockId) -> &Self::Output {
        self.blocks.index(&index)
    }
}

impl Index<&BlockId> for BlockStore {
    type Output = Block;

    fn index(&self, index: &BlockId) -> &Self::Output {
        self.blocks.index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::BlockStore;
    use crate::block::{Block, BlockId};

    fn child(parent: &Block, id: u64) -> Block {
        Block {
            id: BlockId(id),
            parent: Some(parent.id),
            height: parent.height + 1,
            time: parent.time + 1.0,
            miner: None,
            size: 0.0,
            valid: true,
        }
    }

    #[test]
    fn ancestors_walk_back_to_seed() {
        let seed = Block::seed(0.0);
        let a = child(&seed, 1);
        let b = child(&a, 2);
        let fork = child(&seed, 3);

        let mut store = BlockStore::new();
        for block in [seed, a, b, fork] {
            assert!(store.insert(block));
        }

        assert_eq!(store.ancestors_of(b.id), vec![seed.id, a.id, b.id]);
        assert_eq!(store.ancestors_of(fork.id), vec![seed.id, fork.id]);
        assert_eq!(store.max_height(), 2);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let seed = Block::seed(0.0);
        let mut store = BlockStore::new();

        assert!(store.insert(seed));
        assert!(!store.insert(seed));
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().count(), 1);
    }
}
