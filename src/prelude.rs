/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use infiltration_sim::prelude::*;
```
*/

use crate::{best_response, equilibrium, miner, pool, results, simulation};

pub use best_response::BestResponse;

pub use equilibrium::NumericError;

pub use miner::{HashingWork, Miner, MinerId, ProofOfWork, Role, Work};

pub use pool::{Pool, PoolId, REVENUE_FOR_BLOCK};

pub use results::{Format, History, Observer, RoundSummary};

pub use simulation::{
    ConvergenceTracker, InvariantViolation, Simulation, SimulationBuildError,
    SimulationBuilder, SimulationError,
};
