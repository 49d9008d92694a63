/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use propagation_sim::prelude::*;
```
*/

use crate::{
    analysis, block, blockchain, context, event, miner, power_dist, results,
    simulation, topology,
};

pub use analysis::ChainSummary;

pub use block::{Block, BlockId};

pub use blockchain::BlockStore;

pub use context::SimContext;

pub use event::{Event, EventKind};

pub use miner::{
    BlockSize, Honest, Majority, Miner, MinerConfig, MinerError, MinerId,
    Selfish, Strategy,
};

pub use power_dist::{
    Percent, PowerDistribution, PowerDistributionError, PowerValue,
};

pub use results::{Average, Format, ResultsBuilder, ResultsTable};

pub use simulation::{
    Simulation, SimulationBuildError, SimulationBuilder, SimulationError,
    SimulationGroup, SimulationOutput, DAY,
};

pub use topology::{LinkProfile, Topology, ValueRange};
