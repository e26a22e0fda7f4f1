/*!
Simulator for the pool infiltration game between proof of work mining pools.

Pools may send some of their miners to infiltrate other pools. Infiltrators
take a share of the target pool's revenue without ever contributing a block,
and hand that revenue to the pool which sent them. Each round one pool
recomputes its best infiltration strategy against the strategies the other
pools committed to, until no revenue density changes anymore.
*/

pub mod best_response;
pub mod equilibrium;
pub mod miner;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod simulation;
