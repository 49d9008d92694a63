/*!
Discrete-event simulator of block mining and propagation in a Bitcoin-like
peer-to-peer network.

Every node is a [`Miner`](miner::Miner) which discovers blocks at a rate
proportional to its hashrate, verifies incoming blocks one at a time, and
exchanges announcements and blocks with its peers over serial, bandwidth
limited [`Link`](link::Link)s. All interaction happens through events on a
single time-ordered [`Scheduler`](scheduler::Scheduler).

Scenarios are described with a
[`SimulationBuilder`](simulation::SimulationBuilder) and analyzed with the
[`analysis`] and [`results`] modules.
*/

pub mod analysis;
pub mod block;
pub mod blockchain;
pub mod context;
pub mod event;
pub mod link;
pub mod miner;
pub mod power_dist;
pub mod prelude;
pub mod results;
pub mod scheduler;
pub mod simulation;
pub mod topology;

pub(crate) mod utils;
