/*!
Miners: the per-node mining, verification and propagation state machine

A [`Miner`] owns its local [`BlockStore`], a set of blocks that are waiting
for their parent, its chain head and its outbound [`Link`]s. Miners never
call each other; every cross-miner effect is an [`Event`] scheduled on the
shared [`SimContext`].

A block moves through these states inside a miner:

```text
unknown -> pending (parent missing) -> verifying (waiting for CPU)
        -> stored -> canonical | orphan
```

How a miner reacts to a newly stored block is decided by its [`Strategy`].
The built-in strategies are:
- Honest mining [`honest::Honest`]
- Selfish mining with a release margin [`selfish::Selfish`]
- The majority attacker which ignores foreign blocks [`majority::Majority`]
*/

pub mod honest;
pub mod majority;
pub mod selfish;

pub use honest::Honest;
pub use majority::Majority;
pub use selfish::Selfish;

use std::{collections::HashSet, fmt::Debug};

use rand::Rng;
use rand_distr::{Distribution, Exp};
use tracing::{debug, trace, warn};

use crate::{
    block::{Block, BlockId},
    blockchain::BlockStore,
    context::SimContext,
    event::{Event, EventKind},
    link::{Link, LinkError, SerialResource},
};

/// Unique identifier of a [`Miner`]. Corresponds to the miner's index in a
/// [`Simulation`](crate::simulation::Simulation).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MinerId(pub(crate) usize);

impl MinerId {
    /// Returns the [`usize`] corresponding to this [`MinerId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for MinerId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// What a miner does after a block has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep the current chain head.
    Wait,
    /// Switch the chain head to the stored block, announce it to all peers
    /// and mine on top of it.
    Publish,
    /// Switch the chain head to the stored block and mine on top of it
    /// without telling anyone.
    Withhold,
    /// Keep the current chain head and announce it to all peers.
    Release,
}

/// Defines how a miner chooses and advertises its chain head.
///
/// [`Action::Publish`] and [`Action::Withhold`] only take effect when the
/// stored block is strictly taller than the current head; otherwise they
/// are treated as [`Action::Wait`]. A head is never replaced by a block of
/// equal height.
pub trait Strategy: Debug + dyn_clone::DynClone + Send + Sync {
    /// Returns the name of this strategy.
    fn name(&self) -> String;

    /// Called after `block` has been verified and stored by miner `me`,
    /// whose chain head is currently `head`. Not called for the seed block.
    fn on_block_added(&mut self, me: MinerId, head: &Block, block: &Block)
        -> Action;
}

dyn_clone::clone_trait_object!(Strategy);

/// Distribution of the size of blocks a miner produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockSize {
    /// Every block has exactly this many bytes.
    Fixed(f64),
    /// Sizes are drawn uniformly from `0.0..max` bytes.
    Uniform { max: f64 },
}

impl BlockSize {
    /// 200 KiB, the upper bound on block sizes used by default.
    pub const DEFAULT_MAX: f64 = 200.0 * 1024.0;

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Fixed(size) => size,
            Self::Uniform { max } => rng.gen::<f64>() * max,
        }
    }

    fn is_valid(&self) -> bool {
        let bound = match *self {
            Self::Fixed(size) => size,
            Self::Uniform { max } => max,
        };

        bound.is_finite() && bound >= 0.0
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self::Uniform { max: Self::DEFAULT_MAX }
    }
}

/// Parameters for constructing a [`Miner`].
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Expected number of blocks found per second. Zero disables mining.
    pub hashrate: f64,
    /// Bytes of block data verified per second.
    pub verify_rate: f64,
    pub block_size: BlockSize,
    pub strategy: Box<dyn Strategy>,
}

impl MinerConfig {
    /// Honest miner producing blocks of the default size.
    pub fn new(hashrate: f64, verify_rate: f64) -> Self {
        MinerConfig {
            hashrate,
            verify_rate,
            block_size: BlockSize::default(),
            strategy: Box::new(Honest::new()),
        }
    }

    pub fn block_size(mut self, block_size: BlockSize) -> Self {
        self.block_size = block_size;

        self
    }

    pub fn strategy<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);

        self
    }

    pub fn boxed_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;

        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MinerError {
    #[error("hashrate {0} must be finite and non-negative")]
    BadHashrate(f64),
    #[error("verification rate {0} must be finite and positive")]
    BadVerifyRate(f64),
    #[error("block size bound must be finite and non-negative")]
    BadBlockSize,
    #[error("miner {0} cannot link to itself")]
    SelfLink(MinerId),
    #[error("miner {0} already has a link to miner {1}")]
    DuplicateLink(MinerId, MinerId),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("event for miner {destination} was delivered to miner {receiver}")]
    Misaddressed {
        destination: MinerId,
        receiver: MinerId,
    },
}

/// Outcome of [`Miner::verify_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The block can be handed to the verification queue.
    Accept,
    /// The block's parent is unknown; keep the block until it arrives.
    Defer,
    /// Drop the block without propagating it.
    Reject(Rejection),
}

/// Why a block was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The block was mined by this miner on a head it has since left.
    Stale,
    /// The block's validity flag is unset.
    Invalid,
    /// The block claims to be a root but is not the seed block.
    NoParent,
    /// The block's height does not follow its parent's.
    BadHeight { expected: u64, found: u64 },
}

/// Where [`Miner::request`] sends a `GetBlock` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Only the given peer.
    Peer(MinerId),
    /// Every peer this miner has a link to.
    Broadcast,
}

/// One switch of a miner's chain head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadChange {
    pub time: f64,
    pub block: BlockId,
    pub height: u64,
}

/// Counters describing what a miner did during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinerStats {
    /// Mining attempts armed.
    pub attempts: u64,
    pub stale: u64,
    pub invalid: u64,
    pub bad_height: u64,
    /// Verified copies of blocks that were already stored.
    pub duplicates: u64,
    /// Blocks handed to the verification queue.
    pub verified: u64,
    /// Distinct block IDs requested from peers.
    pub requests: u64,
    pub served: u64,
    pub announcements: u64,
}

/// A node of the simulated network. See the [module docs](self).
#[derive(Debug)]
pub struct Miner {
    id: MinerId,
    hashrate: f64,
    interarrival: Option<Exp<f64>>,
    block_size: BlockSize,
    verifier: SerialResource,
    blocks: BlockStore,
    chain_head: Option<BlockId>,
    /// Received blocks whose parent is not stored yet.
    pending: Vec<Block>,
    /// Blocks waiting for their verification to finish.
    verifying: HashSet<BlockId>,
    requested: HashSet<BlockId>,
    links: Vec<Link>,
    local_time: f64,
    strategy: Box<dyn Strategy>,
    head_history: Vec<HeadChange>,
    stats: MinerStats,
}

impl Miner {
    /// Creates an honest miner with the default block size model. The seed
    /// block is stored immediately and mining on top of it is armed.
    pub fn new(
        id: MinerId,
        hashrate: f64,
        verify_rate: f64,
        seed_block: Block,
        ctx: &mut SimContext,
        start_time: f64,
    ) -> Result<Self, MinerError> {
        let config = MinerConfig::new(hashrate, verify_rate);

        Self::with_config(id, config, seed_block, ctx, start_time)
    }

    /// Creates a miner from `config`. See [`Miner::new`].
    pub fn with_config(
        id: MinerId,
        config: MinerConfig,
        seed_block: Block,
        ctx: &mut SimContext,
        start_time: f64,
    ) -> Result<Self, MinerError> {
        let MinerConfig { hashrate, verify_rate, block_size, strategy } =
            config;

        if !hashrate.is_finite() || hashrate < 0.0 {
            return Err(MinerError::BadHashrate(hashrate));
        }
        if !verify_rate.is_finite() || verify_rate <= 0.0 {
            return Err(MinerError::BadVerifyRate(verify_rate));
        }
        if !block_size.is_valid() {
            return Err(MinerError::BadBlockSize);
        }

        let interarrival = if hashrate > 0.0 {
            // Only fails for negative or NaN rates, which are excluded above
            Exp::new(hashrate).ok()
        } else {
            None
        };

        let mut miner = Miner {
            id,
            hashrate,
            interarrival,
            block_size,
            verifier: SerialResource::new(verify_rate),
            blocks: BlockStore::new(),
            chain_head: None,
            pending: vec![],
            verifying: HashSet::new(),
            requested: HashSet::new(),
            links: vec![],
            local_time: start_time,
            strategy,
            head_history: vec![],
            stats: MinerStats::default(),
        };
        miner.add_block(ctx, seed_block);

        Ok(miner)
    }

    /// Adds an outbound link toward `peer`.
    pub fn add_link(
        &mut self,
        peer: MinerId,
        latency: f64,
        bandwidth: f64,
    ) -> Result<(), MinerError> {
        if peer == self.id {
            return Err(MinerError::SelfLink(peer));
        }
        if self.link_to(peer).is_some() {
            return Err(MinerError::DuplicateLink(self.id, peer));
        }

        self.links.push(Link::new(peer, latency, bandwidth)?);

        Ok(())
    }

    #[inline]
    pub fn id(&self) -> MinerId {
        self.id
    }

    #[inline]
    pub fn hashrate(&self) -> f64 {
        self.hashrate
    }

    /// Every block this miner has stored.
    #[inline]
    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    #[inline]
    pub fn chain_head(&self) -> Option<BlockId> {
        self.chain_head
    }

    pub fn head_block(&self) -> Option<&Block> {
        self.chain_head.and_then(|id| self.blocks.get(id))
    }

    /// Height of the chain head, or 0 before the seed block is stored.
    pub fn head_height(&self) -> u64 {
        self.head_block().map(|block| block.height).unwrap_or_default()
    }

    /// Blocks waiting for their parent.
    #[inline]
    pub fn pending(&self) -> &[Block] {
        &self.pending
    }

    /// Returns true iff `id` has been requested from peers.
    #[inline]
    pub fn has_requested(&self, id: BlockId) -> bool {
        self.requested.contains(&id)
    }

    #[inline]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[inline]
    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    /// Simulated time at which the verification queue becomes idle.
    #[inline]
    pub fn verify_busy_until(&self) -> f64 {
        self.verifier.busy_until
    }

    pub fn strategy_name(&self) -> String {
        self.strategy.name()
    }

    /// Every head switch, oldest first. The first entry is the seed block.
    #[inline]
    pub fn head_history(&self) -> &[HeadChange] {
        &self.head_history
    }

    #[inline]
    pub fn stats(&self) -> &MinerStats {
        &self.stats
    }

    /// Handles `event`, which fires at `time`. This is the only entry point
    /// used by the driving loop.
    pub fn receive_event(
        &mut self,
        ctx: &mut SimContext,
        time: f64,
        event: Event,
    ) -> Result<(), MinerError> {
        if event.destination != self.id {
            return Err(MinerError::Misaddressed {
                destination: event.destination,
                receiver: self.id,
            });
        }

        self.local_time = time;
        trace!(
            time,
            miner = %self.id,
            origin = %event.origin,
            kind = event.kind.label(),
            "dispatching event"
        );

        match event.kind {
            EventKind::Block(block) => {
                self.pending.push(block);
                self.process_pending(ctx);
            }
            EventKind::AddBlock(block) => {
                if event.origin != self.id {
                    warn!(
                        miner = %self.id,
                        origin = %event.origin,
                        "received addblock from another miner"
                    );
                }
                self.add_block(ctx, block);
                self.process_pending(ctx);
            }
            EventKind::NewHead(id) => {
                if !self.knows(id) {
                    self.request(ctx, Target::Peer(event.origin), id);
                }
            }
            EventKind::GetBlock(id) => {
                if self.blocks.contains(id) {
                    self.serve(ctx, event.origin, id);
                }
            }
        }

        Ok(())
    }

    /// Decides what to do with a received block.
    ///
    /// Copies of a block this miner already has are accepted and pay for
    /// verification again; storing them is a no-op.
    pub fn verify_block(&self, block: &Block) -> Verdict {
        use Rejection::*;

        if block.miner == Some(self.id) && block.parent != self.chain_head {
            return Verdict::Reject(Stale);
        }
        if !block.valid {
            return Verdict::Reject(Invalid);
        }

        let Some(parent_id) = block.parent else {
            return Verdict::Reject(NoParent);
        };
        let Some(parent) = self.blocks.get(parent_id) else {
            return Verdict::Defer;
        };

        if block.height != parent.height + 1 {
            return Verdict::Reject(BadHeight {
                expected: parent.height + 1,
                found: block.height,
            });
        }

        Verdict::Accept
    }

    /// Moves every pending block whose parent is stored onto the
    /// verification queue, and requests the parents of the rest. Repeats
    /// until a scan leaves every remaining block in place.
    pub fn process_pending(&mut self, ctx: &mut SimContext) {
        loop {
            let mut moved = false;

            for block in std::mem::take(&mut self.pending) {
                match self.verify_block(&block) {
                    Verdict::Accept => {
                        self.verify_later(ctx, block);
                        moved = true;
                    }
                    Verdict::Defer => {
                        // A parent still in verification or itself pending
                        // needs no request
                        match block.parent {
                            Some(parent) if !self.knows(parent) => {
                                self.request(ctx, Target::Broadcast, parent)
                            }
                            _ => (),
                        }
                        self.pending.push(block);
                    }
                    Verdict::Reject(reason) => {
                        self.record_rejection(&block, reason);
                        moved = true;
                    }
                }
            }

            if !moved {
                break;
            }
        }
    }

    /// Stores a block whose verification has finished and lets the
    /// strategy react to it.
    pub fn add_block(&mut self, ctx: &mut SimContext, block: Block) {
        self.verifying.remove(&block.id);
        if !self.blocks.insert(block) {
            self.stats.duplicates += 1;
            return;
        }

        let Some(head) = self.head_block().copied() else {
            self.set_head(&block);
            self.mine_block(ctx);
            return;
        };

        let taller = block.height > head.height;
        match self.strategy.on_block_added(self.id, &head, &block) {
            Action::Publish if taller => {
                self.set_head(&block);
                self.announce(ctx, block.id);
                self.mine_block(ctx);
            }
            Action::Withhold if taller => {
                self.set_head(&block);
                self.mine_block(ctx);
            }
            Action::Release => self.announce(ctx, head.id),
            _ => (),
        }
    }

    /// Arms the next mining attempt on top of the current head.
    ///
    /// An attempt armed before a head switch is not cancelled; its block is
    /// rejected as [`Rejection::Stale`] when it fires.
    pub fn mine_block(&mut self, ctx: &mut SimContext) {
        let Some(interarrival) = self.interarrival else {
            return;
        };
        let Some(head) = self.head_block().copied() else {
            return;
        };

        let time = self.local_time + interarrival.sample(&mut ctx.rng);
        let block = Block {
            id: ctx.next_block_id(),
            parent: Some(head.id),
            height: head.height + 1,
            time,
            miner: Some(self.id),
            size: self.block_size.sample(&mut ctx.rng),
            valid: true,
        };

        self.stats.attempts += 1;
        ctx.schedule(time, Event::new(self.id, self.id, EventKind::Block(block)));
    }

    /// Tells every peer that `id` is this miner's chain head.
    pub fn announce(&mut self, ctx: &mut SimContext, id: BlockId) {
        self.stats.announcements += 1;

        for link in self.links.iter_mut() {
            let arrival = link.occupy(self.local_time, 0.0);
            let event =
                Event::new(link.destination, self.id, EventKind::NewHead(id));
            ctx.schedule(arrival, event);
        }
    }

    /// Asks `target` for the block `id`, unless it was requested before.
    pub fn request(&mut self, ctx: &mut SimContext, target: Target, id: BlockId) {
        if !self.requested.insert(id) {
            return;
        }

        self.stats.requests += 1;
        debug!(miner = %self.id, block = %id, ?target, "requesting block");

        for link in self.links.iter_mut() {
            let matches = match target {
                Target::Broadcast => true,
                Target::Peer(peer) => link.destination == peer,
            };

            if matches {
                let arrival = link.occupy(self.local_time, 0.0);
                let event = Event::new(
                    link.destination,
                    self.id,
                    EventKind::GetBlock(id),
                );
                ctx.schedule(arrival, event);
            }
        }
    }

    /// Sends the full block `id` to `peer`.
    pub fn serve(&mut self, ctx: &mut SimContext, peer: MinerId, id: BlockId) {
        let Some(block) = self.blocks.get(id).copied() else {
            return;
        };
        let Some(link) = self.links.iter_mut().find(|l| l.destination == peer)
        else {
            warn!(
                miner = %self.id,
                %peer,
                block = %id,
                "no link to requesting peer, dropping request"
            );
            return;
        };

        let arrival = link.occupy(self.local_time, block.size);
        ctx.schedule(arrival, Event::new(peer, self.id, EventKind::Block(block)));
        self.stats.served += 1;
    }

    fn link_to(&self, peer: MinerId) -> Option<&Link> {
        self.links.iter().find(|link| link.destination == peer)
    }

    /// Returns true iff `id` is stored, being verified, or pending.
    fn knows(&self, id: BlockId) -> bool {
        self.blocks.contains(id)
            || self.verifying.contains(&id)
            || self.pending.iter().any(|block| block.id == id)
    }

    fn verify_later(&mut self, ctx: &mut SimContext, block: Block) {
        let done = self.verifier.occupy(self.local_time, 0.0, block.size);

        self.verifying.insert(block.id);
        self.stats.verified += 1;
        ctx.schedule(done, Event::new(self.id, self.id, EventKind::AddBlock(block)));
    }

    fn set_head(&mut self, block: &Block) {
        if self.chain_head.is_some() {
            debug!(
                time = self.local_time,
                miner = %self.id,
                block = %block.id,
                height = block.height,
                "chain head switched"
            );
        }

        self.chain_head = Some(block.id);
        self.head_history.push(HeadChange {
            time: self.local_time,
            block: block.id,
            height: block.height,
        });
    }

    fn record_rejection(&mut self, block: &Block, reason: Rejection) {
        match reason {
            Rejection::Stale => {
                self.stats.stale += 1;
                trace!(
                    miner = %self.id,
                    block = %block.id,
                    "ignoring block mined before the chain head changed"
                );
            }
            Rejection::Invalid => {
                self.stats.invalid += 1;
                warn!(miner = %self.id, block = %block.id, "block is invalid");
            }
            Rejection::NoParent => {
                self.stats.invalid += 1;
                warn!(
                    miner = %self.id,
                    block = %block.id,
                    "block has no parent but is not the seed block"
                );
            }
            Rejection::BadHeight { expected, found } => {
                self.stats.bad_height += 1;
                warn!(
                    miner = %self.id,
                    block = %block.id,
                    expected,
                    found,
                    "block height does not follow its parent"
                );
            }
        }
    }
}
