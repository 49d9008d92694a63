//! Mined blocks and their identifiers

use crate::miner::MinerId;

/// Representation of a mined block and its place in a chain.
///
/// Blocks are immutable once created. A block travels between miners by
/// value inside events, so it carries everything a receiver needs to verify
/// it.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Identifier assigned when the block was constructed.
    pub id: BlockId,
    /// The block this block extends. `None` only for the seed block.
    pub parent: Option<BlockId>,
    /// Length of the path from this block to the seed block.
    pub height: u64,
    /// Simulated time at which the block was mined.
    pub time: f64,
    /// The miner of this block. `None` for the seed block.
    pub miner: Option<MinerId>,
    /// Size of the block in bytes.
    pub size: f64,
    /// Stand-in for proof-of-work and content validity.
    pub valid: bool,
}

/// A unique identifier assigned to each [`Block`].
///
/// Identifiers are handed out by a monotonic counter in
/// [`SimContext`](crate::context::SimContext); `BlockId(0)` is reserved for
/// the seed block.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u64);

impl BlockId {
    /// Identifier of every seed block.
    pub const SEED: BlockId = BlockId(0);

    /// Returns the [`u64`] corresponding to this [`BlockId`].
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Block {
    /// Creates the root block shared by every miner at simulation start.
    pub fn seed(time: f64) -> Self {
        Block {
            id: BlockId::SEED,
            parent: None,
            height: 0,
            time,
            miner: None,
            size: 0.0,
            valid: true,
        }
    }

    /// Returns true iff this block has no parent.
    #[inline]
    pub fn is_seed(&self) -> bool {
        self.parent.is_none()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}
