//! Messages exchanged between miners through the scheduler

use crate::{
    block::{Block, BlockId},
    miner::MinerId,
};

/// A message addressed to one miner. The time at which it fires is held by
/// the [`Scheduler`](crate::scheduler::Scheduler), not by the event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The miner which handles this event.
    pub destination: MinerId,
    /// The miner which created this event.
    pub origin: MinerId,
    pub kind: EventKind,
}

/// What an [`Event`] asks its destination to do.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// A full block has arrived, either freshly mined by the destination
    /// itself or transmitted by a peer.
    Block(Block),
    /// Verification of the block has finished and it can be stored.
    AddBlock(Block),
    /// The origin switched its chain head to the given block.
    NewHead(BlockId),
    /// The origin asks for the full contents of the given block.
    GetBlock(BlockId),
}

impl EventKind {
    /// Short lowercase label, used in log output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Block(_) => "block",
            Self::AddBlock(_) => "addblock",
            Self::NewHead(_) => "newhead",
            Self::GetBlock(_) => "getblock",
        }
    }
}

impl Event {
    pub fn new(destination: MinerId, origin: MinerId, kind: EventKind) -> Self {
        Event { destination, origin, kind }
    }
}
