//! Running the infiltration game round by round

use crate::{
    best_response::{self, BestResponse},
    equilibrium::{self, NumericError},
    miner::{Miner, MinerId, Role, Work},
    pool::{Pool, PoolId, REVENUE_FOR_BLOCK},
    results::{Observer, RoundSummary},
};

pub mod builder;
pub mod convergence;
pub mod invariants;

pub use builder::{SimulationBuildError, SimulationBuilder};
pub use convergence::ConvergenceTracker;
pub use invariants::InvariantViolation;

/// A miner only switches pools if it gains more than this in revenue density.
const EPSILON_SWITCH: f64 = 1e-12;

/// State of one run of the infiltration game.
///
/// # Details
/// Each call to [`Simulation::step`] simulates one round:
/// 1. Solo miners work and publish their own blocks.
/// 2. Every pool hands out tasks and its members perform one unit of work.
/// 3. Every pool publishes proofs of work, collects block and sabotage
///    revenue, and distributes it.
/// 4. Every miner updates its revenue density.
/// 5. One miner (round robin) may switch pools, empty pools are dissolved,
///    and one pool (round robin) commits to its best response.
/// 6. The [`ConvergenceTracker`] is updated.
#[derive(Debug, Clone)]
pub struct Simulation {
    amount_miners: usize,
    amount_solo_miners: usize,
    pools: Vec<Pool>,
    /// Every miner in the game, indexed by [`MinerId`].
    miners: Vec<Miner>,
    work: Box<dyn Work>,
    time: usize,
    pool_revenues: Vec<f64>,
    current_pool_round_robin: usize,
    current_miner_round_robin: usize,
    convergence: ConvergenceTracker,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("revenue density of pool {pool} could not be computed")]
    Numeric {
        pool: PoolId,
        #[source]
        source: NumericError,
    },
    #[error("membership invariant violated")]
    InvariantViolation(#[from] InvariantViolation),
    #[error("miner {0} does not exist")]
    UnknownMiner(MinerId),
    #[error("pool {0} does not exist")]
    UnknownPool(PoolId),
    #[error("miner {0} is not an honest pool member")]
    NotHonest(MinerId),
    #[error("invalid infiltration rates {rates:?} for pool {pool}")]
    InvalidRates { pool: PoolId, rates: Vec<usize> },
}

impl Simulation {
    /// Creates a simulation with `amount_miners` pool miners dealt round robin
    /// over `amount_pools` pools, and `amount_solo_miners` solo miners.
    pub fn new(
        amount_miners: usize,
        amount_pools: usize,
        amount_solo_miners: usize,
    ) -> Result<Self, SimulationBuildError> {
        SimulationBuilder::new()
            .miners(amount_miners)
            .pools(amount_pools)
            .solo_miners(amount_solo_miners)
            .build()
    }

    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    pub(crate) fn from_parts(
        amount_miners: usize,
        amount_solo_miners: usize,
        mut pools: Vec<Pool>,
        miners: Vec<Miner>,
        work: Box<dyn Work>,
    ) -> Result<Self, NumericError> {
        let densities = pools
            .iter()
            .map(|pool| {
                equilibrium::revenue_density(
                    &pools,
                    amount_miners,
                    pool.id(),
                    pool.infiltration_rates(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (pool, density) in pools.iter_mut().zip(densities) {
            pool.init_revenue_density(density);
        }

        let num_pools = pools.len();
        Ok(Self {
            amount_miners,
            amount_solo_miners,
            pools,
            miners,
            work,
            time: 0,
            pool_revenues: vec![0.0; num_pools],
            current_pool_round_robin: 0,
            current_miner_round_robin: 0,
            convergence: ConvergenceTracker::new(
                amount_miners + amount_solo_miners,
            ),
        })
    }

    /// Number of pool miners in the game.
    #[inline]
    pub fn amount_miners(&self) -> usize {
        self.amount_miners
    }

    #[inline]
    pub fn amount_solo_miners(&self) -> usize {
        self.amount_solo_miners
    }

    #[inline]
    pub fn amount_pools(&self) -> usize {
        self.pools.len()
    }

    /// Number of rounds simulated so far.
    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    #[inline]
    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool, SimulationError> {
        self.pools.get(id.get()).ok_or(SimulationError::UnknownPool(id))
    }

    #[inline]
    pub fn miners(&self) -> &[Miner] {
        &self.miners
    }

    pub fn miner(&self, id: MinerId) -> Result<&Miner, SimulationError> {
        self.miners.get(id.get()).ok_or(SimulationError::UnknownMiner(id))
    }

    /// Per participant revenue of every pool in the last round.
    pub fn pool_revenues(&self) -> &[f64] {
        &self.pool_revenues
    }

    /// Number of miners which are not sabotaging another pool.
    pub fn mining_power(&self) -> usize {
        self.miners.iter().filter(|m| !m.is_sabotager()).count()
    }

    #[inline]
    pub fn is_converged(&self) -> bool {
        self.convergence.is_converged()
    }

    pub fn convergence(&self) -> &ConvergenceTracker {
        &self.convergence
    }

    /// Revenue density of a solo miner: its share of all mining power.
    fn solo_revenue_density(&self) -> f64 {
        1.0 / (self.amount_miners + self.amount_solo_miners) as f64
    }

    /// Runs `rounds` rounds, reporting each one to `observer`.
    pub fn run<O: Observer>(
        &mut self,
        rounds: usize,
        observer: &mut O,
    ) -> Result<(), SimulationError> {
        for _ in 0..rounds {
            let summary = self.step()?;
            observer.notify(&summary);
        }

        Ok(())
    }

    /// Runs until the game converges or `max_rounds` rounds have passed,
    /// reporting each round to `observer`. Returns whether the game
    /// converged.
    pub fn run_until_converged<O: Observer>(
        &mut self,
        max_rounds: usize,
        observer: &mut O,
    ) -> Result<bool, SimulationError> {
        for _ in 0..max_rounds {
            let summary = self.step()?;
            observer.notify(&summary);

            if summary.converged {
                tracing::info!(time = self.time, "simulation converged");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Simulates one round of the game.
    pub fn step(&mut self) -> Result<RoundSummary, SimulationError> {
        self.time += 1;

        self.solo_round();

        for pool in self.pools.iter() {
            pool.assign_tasks(&mut *self.work);
            pool.round_of_work(&mut *self.work);
        }

        for (i, pool) in self.pools.iter_mut().enumerate() {
            pool.update_proof_of_work(&mut *self.work, &mut self.miners);
            pool.collect_revenue_from_sabotagers(&mut self.miners);
            self.pool_revenues[i] = pool.publish_revenue();
            pool.send_revenue_to_all(&mut self.miners);
        }

        let solo_density = self.solo_revenue_density();
        for miner in self.miners.iter_mut() {
            let density = match miner.role().loyal_to() {
                Some(pool) => self.pools[pool.get()].revenue_density(),
                None => solo_density,
            };
            miner.record_revenue_density(density);
        }

        let miner = MinerId(self.current_miner_round_robin);
        self.switch_pool(miner)?;
        self.current_miner_round_robin =
            (self.current_miner_round_robin + 1) % self.miners.len();

        for pool in 0..self.pools.len() {
            self.check_pool(PoolId(pool))?;
        }

        if self.current_pool_round_robin >= self.pools.len() {
            self.current_pool_round_robin = 0;
        }
        self.change_miners(PoolId(self.current_pool_round_robin))?;
        self.current_pool_round_robin += 1;

        invariants::check(&self.pools, &self.miners)?;

        let densities = self
            .miners
            .iter()
            .map(|m| (m.revenue_density(), m.revenue_density_prev_round()))
            .chain(self.pools.iter().map(|p| {
                (p.revenue_density(), p.revenue_density_prev_round())
            }));
        let converged = self.convergence.observe(densities);

        Ok(RoundSummary {
            time: self.time,
            pool_revenues: self.pool_revenues.clone(),
            converged,
            mining_power: self.mining_power(),
        })
    }

    fn solo_round(&mut self) {
        for miner in self.miners.iter_mut() {
            if miner.role() != Role::Solo {
                continue;
            }

            let id = miner.id();
            if self.work.is_idle(id) {
                self.work.assign_task(id, miner.partial_pow() as usize + 1);
            }
            self.work.perform_work_unit(id);

            if self.work.is_idle(id) {
                let pow = self.work.publish_result(id);
                miner.set_pow(pow);
                if pow.found_block() {
                    miner.pay(REVENUE_FOR_BLOCK);
                }
            }
        }
    }

    /// Replaces the miner with ID `miner` by a fresh miner with the given
    /// role. Pool memberships must be updated by the caller.
    fn transition(&mut self, miner: MinerId, role: Role) {
        let slot = &mut self.miners[miner.get()];
        let old = std::mem::replace(slot, Miner::new(miner, Role::Solo));
        *slot = old.into_role(role);
    }

    /// Lets `miner` move to the pool with the highest revenue density if that
    /// beats its current pool. Only honest pool members switch. Returns the
    /// pool the miner moved to, if any.
    pub fn switch_pool(
        &mut self,
        miner: MinerId,
    ) -> Result<Option<PoolId>, SimulationError> {
        let Role::Honest { pool: current } = self.miner(miner)?.role() else {
            return Ok(None);
        };

        let best = self
            .pools
            .iter()
            .filter(|p| !p.revenue_density().is_nan())
            .fold(None, |best: Option<&Pool>, p| match best {
                Some(b) if b.revenue_density() >= p.revenue_density() => {
                    Some(b)
                }
                _ => Some(p),
            });

        let current_density = self.pools[current.get()].revenue_density();
        match best {
            Some(best)
                if best.id() != current
                    && best.revenue_density()
                        > current_density + EPSILON_SWITCH =>
            {
                let target = best.id();
                self.migrate(miner, target)?;
                Ok(Some(target))
            }
            _ => Ok(None),
        }
    }

    /// Moves the honest miner `miner` into pool `to`.
    pub fn migrate(
        &mut self,
        miner: MinerId,
        to: PoolId,
    ) -> Result<(), SimulationError> {
        let Role::Honest { pool: from } = self.miner(miner)?.role() else {
            return Err(SimulationError::NotHonest(miner));
        };
        self.pool(to)?;
        if from == to {
            return Ok(());
        }

        tracing::debug!(%miner, %from, %to, "miner switches pool");
        self.pools[from.get()].remove_member(miner);
        self.transition(miner, Role::Honest { pool: to });
        self.pools[to.get()].add_member(miner);

        Ok(())
    }

    /// Dissolves pool `id` if nobody mines for it anymore: every sabotager
    /// inside it returns to its origin pool as an honest member, and every
    /// infiltration rate targeting it is reset. Returns true if anything had
    /// to be dissolved.
    pub fn check_pool(&mut self, id: PoolId) -> Result<bool, SimulationError> {
        let pool = self.pool(id)?;
        let loyal = pool
            .checked_loyal_miners()
            .ok_or(InvariantViolation::NegativeHeadcount { pool: id })?;
        if loyal > 0 {
            return Ok(false);
        }

        let infiltrators = pool.members().to_vec();
        let targeted = self
            .pools
            .iter()
            .any(|p| p.infiltration_rates()[id.get()] > 0);
        if infiltrators.is_empty() && !targeted && pool.sabotagers().is_empty()
        {
            return Ok(false);
        }

        for miner in infiltrators {
            let role = self.miners[miner.get()].role();
            let Role::Sabotager { origin, target } = role else {
                return Err(InvariantViolation::MisplacedMember {
                    miner,
                    pool: id,
                    role,
                }
                .into());
            };
            if target != id {
                return Err(InvariantViolation::MisplacedMember {
                    miner,
                    pool: id,
                    role,
                }
                .into());
            }

            self.return_home(miner, origin);
        }

        for pool in self.pools.iter_mut() {
            pool.set_infiltration_rate(id, 0);
        }
        self.pools[id.get()].clear();

        tracing::info!(pool = %id, "empty pool dissolved");

        Ok(true)
    }

    /// Turns the sabotager `miner` back into an honest member of `origin`.
    /// Its uncollected sabotage revenue goes to `origin`. The caller is
    /// responsible for the infiltration rate bookkeeping and the target
    /// pool's membership.
    fn return_home(&mut self, miner: MinerId, origin: PoolId) {
        let pending = self.miners[miner.get()].take_attacked_pool_revenue();

        let origin_pool = &mut self.pools[origin.get()];
        origin_pool.remove_sabotager(miner);
        origin_pool.add_revenue(pending);
        self.transition(miner, Role::Honest { pool: origin });
        self.pools[origin.get()].add_member(miner);
    }

    /// Computes the best response of pool `id`, records its revenue density
    /// and commits the pool to it.
    pub fn change_miners(
        &mut self,
        id: PoolId,
    ) -> Result<BestResponse, SimulationError> {
        self.pool(id)?;
        let best = best_response::best_rate(&self.pools, self.amount_miners, id)
            .map_err(|source| SimulationError::Numeric { pool: id, source })?;

        self.pools[id.get()].record_revenue_density(best.revenue_density);
        self.apply_infiltration_rates(id, &best.rates)?;

        Ok(best)
    }

    /// Moves miners between the honest and sabotager roles until pool `id`
    /// sends `rates[target]` sabotagers to every target pool.
    ///
    /// All decreases are applied before any increase. If the pool runs out of
    /// honest members while increasing a rate, that target is left short for
    /// this round.
    pub fn apply_infiltration_rates(
        &mut self,
        id: PoolId,
        rates: &[usize],
    ) -> Result<(), SimulationError> {
        self.pool(id)?;
        if rates.len() != self.pools.len() || rates[id.get()] != 0 {
            return Err(SimulationError::InvalidRates {
                pool: id,
                rates: rates.to_vec(),
            });
        }

        for (target, &rate) in rates.iter().enumerate() {
            let target = PoolId(target);
            while rate < self.pools[id.get()].infiltration_rates()[target.get()]
            {
                self.recall_sabotager(id, target)?;
            }
        }

        for (target, &rate) in rates.iter().enumerate() {
            let target = PoolId(target);
            while rate > self.pools[id.get()].infiltration_rates()[target.get()]
            {
                if !self.send_sabotager(id, target)? {
                    tracing::debug!(
                        pool = %id,
                        %target,
                        "no honest member left to send"
                    );
                    break;
                }
            }
        }

        Ok(())
    }

    fn recall_sabotager(
        &mut self,
        origin: PoolId,
        target: PoolId,
    ) -> Result<(), SimulationError> {
        let committed =
            self.pools[origin.get()].infiltration_rates()[target.get()];
        self.pools[origin.get()].set_infiltration_rate(target, committed - 1);
        self.pools[target.get()].decrease_own_infiltration_rate()?;

        let miners = &self.miners;
        let sabotager = self.pools[origin.get()]
            .sabotagers()
            .iter()
            .copied()
            .find(|m| {
                miners[m.get()].role() == Role::Sabotager { origin, target }
            })
            .ok_or(InvariantViolation::MissingSabotager { origin, target })?;

        self.pools[target.get()].remove_member(sabotager);
        self.return_home(sabotager, origin);

        Ok(())
    }

    /// Turns the first honest member of `origin` into a sabotager of
    /// `target`. Returns false, leaving the rates untouched, if `origin` has
    /// no honest member left.
    fn send_sabotager(
        &mut self,
        origin: PoolId,
        target: PoolId,
    ) -> Result<bool, SimulationError> {
        let committed =
            self.pools[origin.get()].infiltration_rates()[target.get()];
        self.pools[origin.get()].set_infiltration_rate(target, committed + 1);
        self.pools[target.get()].increase_own_infiltration_rate();

        let miners = &self.miners;
        let candidate = self.pools[origin.get()]
            .members()
            .iter()
            .copied()
            .find(|m| matches!(miners[m.get()].role(), Role::Honest { .. }));

        let Some(miner) = candidate else {
            self.pools[origin.get()].set_infiltration_rate(target, committed);
            self.pools[target.get()].decrease_own_infiltration_rate()?;
            return Ok(false);
        };

        self.pools[origin.get()].remove_member(miner);
        self.transition(miner, Role::Sabotager { origin, target });
        self.pools[origin.get()].add_sabotager(miner);
        self.pools[target.get()].add_member(miner);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(miners: usize, pools: usize, solo: usize) -> Simulation {
        Simulation::builder()
            .miners(miners)
            .pools(pools)
            .solo_miners(solo)
            .seed(11)
            .build()
            .expect("valid simulation build")
    }

    fn assert_consistent(sim: &Simulation) {
        assert_eq!(invariants::check(sim.pools(), sim.miners()), Ok(()));

        for pool in sim.pools() {
            let column: usize = sim
                .pools()
                .iter()
                .map(|p| p.infiltration_rates()[pool.id().get()])
                .sum();
            assert_eq!(pool.own_infiltration_rate(), column);
        }
    }

    #[test]
    fn miners_are_dealt_round_robin() {
        let sim = sim(7, 3, 2);

        assert_eq!(sim.pools()[0].members(), &[MinerId(0), MinerId(3), MinerId(6)]);
        assert_eq!(sim.pools()[1].members(), &[MinerId(1), MinerId(4)]);
        assert_eq!(sim.pools()[2].members(), &[MinerId(2), MinerId(5)]);
        assert_eq!(sim.miners()[7].role(), Role::Solo);
        assert_eq!(sim.miners()[8].role(), Role::Solo);
        assert_eq!(sim.mining_power(), 9);
        assert_consistent(&sim);
    }

    #[test]
    fn symmetric_pools_start_with_equal_density() {
        let sim = sim(10, 2, 0);

        let (p0, p1) = (&sim.pools()[0], &sim.pools()[1]);
        assert_eq!(p0.revenue_density(), p1.revenue_density());
        assert_eq!(p0.revenue_density(), p0.revenue_density_if_no_one_attacks());
    }

    #[test]
    fn symmetric_game_converges_without_infiltration() {
        let mut sim = sim(10, 2, 0);
        let mut rounds = 0;

        let converged = sim
            .run_until_converged(500, &mut |_: &RoundSummary| rounds += 1)
            .unwrap();

        assert!(converged);
        assert!(sim.is_converged());
        assert_eq!(rounds, sim.time());
        for pool in sim.pools() {
            assert_eq!(pool.own_infiltration_rate(), 0);
            assert!(pool.infiltration_rates().iter().all(|&r| r == 0));
        }
        assert_eq!(sim.mining_power(), 10);
        assert_consistent(&sim);
    }

    #[test]
    fn invariants_hold_every_round() {
        let mut sim = sim(9, 3, 2);

        for _ in 0..60 {
            sim.step().unwrap();
            assert_consistent(&sim);
            for pool in sim.pools() {
                assert!(
                    pool.infiltration_rates().iter().sum::<usize>()
                        <= pool.loyal_miners()
                );
            }
        }
        assert_eq!(sim.time(), 60);
    }

    #[test]
    fn change_miners_commits_best_response() {
        let mut sim = sim(10, 2, 0);

        let best = sim.change_miners(PoolId(0)).unwrap();

        assert_eq!(best.rates, vec![0, 2]);
        let (p0, p1) = (&sim.pools()[0], &sim.pools()[1]);
        assert_eq!(p0.infiltration_rates(), &[0, 2]);
        assert_eq!(p0.sabotagers().len(), 2);
        assert_eq!(p0.members().len(), 3);
        assert_eq!(p0.loyal_miners(), 5);
        assert_eq!(p1.own_infiltration_rate(), 2);
        assert_eq!(p1.members().len(), 7);
        assert_eq!(p0.revenue_density(), best.revenue_density);
        assert!((p0.revenue_density_prev_round() - 0.1).abs() < 1e-12);
        assert_eq!(sim.mining_power(), 8);
        for &id in p0.sabotagers() {
            assert_eq!(
                sim.miners()[id.get()].role(),
                Role::Sabotager { origin: PoolId(0), target: PoolId(1) }
            );
            assert!(p1.pow().contains_key(&id));
        }
        assert_consistent(&sim);
    }

    #[test]
    fn lowering_rates_returns_sabotagers() {
        let mut sim = sim(10, 2, 0);
        sim.apply_infiltration_rates(PoolId(0), &[0, 3]).unwrap();

        sim.apply_infiltration_rates(PoolId(0), &[0, 1]).unwrap();

        let (p0, p1) = (&sim.pools()[0], &sim.pools()[1]);
        assert_eq!(p0.sabotagers().len(), 1);
        assert_eq!(p0.members().len(), 4);
        assert_eq!(p1.own_infiltration_rate(), 1);
        assert_eq!(p1.members().len(), 6);
        assert_consistent(&sim);
    }

    #[test]
    fn running_out_of_honest_members_is_not_an_error() {
        let mut sim = sim(4, 2, 0);

        // Pool 0 only has 2 members
        sim.apply_infiltration_rates(PoolId(0), &[0, 5]).unwrap();

        let (p0, p1) = (&sim.pools()[0], &sim.pools()[1]);
        assert_eq!(p0.infiltration_rates(), &[0, 2]);
        assert_eq!(p0.sabotagers().len(), 2);
        assert!(p0.members().is_empty());
        assert_eq!(p1.own_infiltration_rate(), 2);
        assert_consistent(&sim);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let mut sim = sim(4, 2, 0);

        assert!(matches!(
            sim.apply_infiltration_rates(PoolId(0), &[1, 0]),
            Err(SimulationError::InvalidRates { .. })
        ));
        assert!(matches!(
            sim.apply_infiltration_rates(PoolId(0), &[0]),
            Err(SimulationError::InvalidRates { .. })
        ));
        assert!(matches!(
            sim.apply_infiltration_rates(PoolId(2), &[0, 0]),
            Err(SimulationError::UnknownPool(_))
        ));
    }

    #[test]
    fn empty_pool_is_dissolved() {
        let mut sim = sim(9, 3, 0);
        // Pools 1 and 2 infiltrate pool 0
        sim.apply_infiltration_rates(PoolId(1), &[2, 0, 0]).unwrap();
        sim.apply_infiltration_rates(PoolId(2), &[1, 0, 0]).unwrap();
        let sabotagers_1 = sim.pools()[1].sabotagers().to_vec();
        let sabotagers_2 = sim.pools()[2].sabotagers().to_vec();
        assert_eq!(sim.pools()[0].own_infiltration_rate(), 3);

        // Every honest member of pool 0 leaves
        for miner in [0, 3, 6] {
            sim.migrate(MinerId(miner), PoolId(1)).unwrap();
        }
        assert!(sim.pools()[0].is_empty());

        assert!(sim.check_pool(PoolId(0)).unwrap());

        let dissolved = &sim.pools()[0];
        assert!(dissolved.members().is_empty());
        assert!(dissolved.sabotagers().is_empty());
        assert_eq!(dissolved.own_infiltration_rate(), 0);
        for pool in sim.pools() {
            assert_eq!(pool.infiltration_rates()[0], 0);
            assert!(pool.sabotagers().is_empty());
        }
        for id in sabotagers_1 {
            assert_eq!(sim.miners()[id.get()].role(), Role::Honest { pool: PoolId(1) });
            assert!(sim.pools()[1].members().contains(&id));
        }
        for id in sabotagers_2 {
            assert_eq!(sim.miners()[id.get()].role(), Role::Honest { pool: PoolId(2) });
            assert!(sim.pools()[2].members().contains(&id));
        }
        assert_consistent(&sim);

        // Dissolving again changes nothing
        assert!(!sim.check_pool(PoolId(0)).unwrap());
        assert_consistent(&sim);

        // The game goes on around the vacant pool
        for _ in 0..20 {
            sim.step().unwrap();
            assert_consistent(&sim);
        }
    }

    #[test]
    fn solver_failure_aborts_the_round() {
        let mut sim = sim(4, 2, 0);
        // Every miner ends up infiltrating the other pool
        sim.apply_infiltration_rates(PoolId(0), &[0, 2]).unwrap();
        sim.apply_infiltration_rates(PoolId(1), &[2, 0]).unwrap();
        assert_consistent(&sim);
        assert_eq!(sim.mining_power(), 0);

        assert!(matches!(
            sim.change_miners(PoolId(0)),
            Err(SimulationError::Numeric {
                pool: PoolId(0),
                source: NumericError::NoEffectivePower { in_flight: 4, miners: 4 },
            })
        ));
        assert!(matches!(
            sim.step(),
            Err(SimulationError::Numeric {
                pool: PoolId(0),
                source: NumericError::NoEffectivePower { .. },
            })
        ));
        assert!(!sim.is_converged());
    }

    #[test]
    fn negative_headcount_aborts_dissolution() {
        let mut sim = sim(4, 2, 0);
        for _ in 0..3 {
            sim.pools[0].increase_own_infiltration_rate();
        }

        assert!(matches!(
            sim.check_pool(PoolId(0)),
            Err(SimulationError::InvariantViolation(
                InvariantViolation::NegativeHeadcount { pool: PoolId(0) }
            ))
        ));
    }

    #[test]
    fn switch_pool_follows_revenue_density() {
        let mut sim = sim(10, 2, 0);
        sim.change_miners(PoolId(0)).unwrap();

        // Pool 0 now has the higher density, pool 1 is untouched at 0.1
        let moved = sim.switch_pool(MinerId(1)).unwrap();

        assert_eq!(moved, Some(PoolId(0)));
        assert_eq!(sim.miners()[1].role(), Role::Honest { pool: PoolId(0) });
        assert!(sim.pools()[0].members().contains(&MinerId(1)));
        assert_consistent(&sim);

        // Sabotagers never switch on their own
        let sabotager = sim.pools()[0].sabotagers()[0];
        assert_eq!(sim.switch_pool(sabotager).unwrap(), None);
    }

    #[test]
    fn solo_miners_keep_their_income() {
        let mut sim = Simulation::builder()
            .miners(4)
            .pools(2)
            .solo_miners(3)
            .work(crate::miner::HashingWork::seeded(5).block_target(0.5))
            .build()
            .unwrap();

        sim.run(40, &mut |_: &RoundSummary| ()).unwrap();

        let solo_income: f64 = sim.miners()[4..].iter().map(|m| m.income()).sum();
        assert!(solo_income > 0.0);
        assert_eq!(solo_income % REVENUE_FOR_BLOCK, 0.0);
        for miner in &sim.miners()[4..] {
            assert_eq!(miner.role(), Role::Solo);
            assert_eq!(miner.revenue_density(), 1.0 / 7.0);
        }
    }
}
