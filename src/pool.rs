//! Mining pools, their membership and their revenue ledger.

use std::collections::HashMap;

use crate::{
    miner::{Miner, MinerId, ProofOfWork, Role, Work},
    simulation::InvariantViolation,
};

/// Revenue a pool receives for each block completed by one of its members.
pub const REVENUE_FOR_BLOCK: f64 = 100.0;

/// Unique identifier of a [`Pool`], equal to its index in the simulation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(pub(crate) usize);

impl PoolId {
    /// Returns the [`usize`] corresponding to this [`PoolId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for PoolId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A mining pool.
///
/// # Membership
/// `members` holds every miner physically mining in this pool: its own honest
/// members and the sabotagers other pools sent in. `sabotagers` holds the
/// miners this pool sent out to other pools. The number of sabotagers inside
/// this pool is tracked by [`Pool::own_infiltration_rate`], and this pool's
/// row of the infiltration matrix by [`Pool::infiltration_rates`].
#[derive(Debug, Clone)]
pub struct Pool {
    id: PoolId,
    contribution_fee: f64,
    revenue: f64,
    revenue_density: f64,
    revenue_density_prev_round: f64,
    revenue_density_if_no_one_attacks: f64,
    own_infiltration_rate: usize,
    infiltration_rates: Vec<usize>,
    revenue_from_sabotagers: Vec<f64>,
    income_whole_game: f64,
    income_whole_game_no_attack: f64,
    members: Vec<MinerId>,
    sabotagers: Vec<MinerId>,
    /// Last proof of work published by each member.
    pow: HashMap<MinerId, ProofOfWork>,
}

impl Pool {
    pub fn new(
        id: PoolId,
        contribution_fee: f64,
        num_pools: usize,
        members: Vec<MinerId>,
    ) -> Self {
        let pow = members
            .iter()
            .map(|&miner| (miner, ProofOfWork::default()))
            .collect();

        Self {
            id,
            contribution_fee,
            revenue: 0.0,
            revenue_density: f64::NAN,
            revenue_density_prev_round: f64::NAN,
            revenue_density_if_no_one_attacks: f64::NAN,
            own_infiltration_rate: 0,
            infiltration_rates: vec![0; num_pools],
            revenue_from_sabotagers: vec![0.0; num_pools],
            income_whole_game: 0.0,
            income_whole_game_no_attack: 0.0,
            members,
            sabotagers: vec![],
            pow,
        }
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Fee charged by this pool. Tracked, but not applied to any revenue.
    pub fn contribution_fee(&self) -> f64 {
        self.contribution_fee
    }

    /// Revenue accumulated in the current round and not yet distributed.
    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    #[inline]
    pub fn revenue_density(&self) -> f64 {
        self.revenue_density
    }

    #[inline]
    pub fn revenue_density_prev_round(&self) -> f64 {
        self.revenue_density_prev_round
    }

    /// Revenue density computed before any pool infiltrated another.
    pub fn revenue_density_if_no_one_attacks(&self) -> f64 {
        self.revenue_density_if_no_one_attacks
    }

    /// Number of sabotagers other pools have sent into this pool.
    #[inline]
    pub fn own_infiltration_rate(&self) -> usize {
        self.own_infiltration_rate
    }

    /// This pool's committed row of the infiltration matrix.
    #[inline]
    pub fn infiltration_rates(&self) -> &[usize] {
        &self.infiltration_rates
    }

    /// Sabotage revenue collected in the last round, by target pool.
    pub fn revenue_from_sabotagers(&self) -> &[f64] {
        &self.revenue_from_sabotagers
    }

    /// Sum of the per participant revenue published over the whole game.
    pub fn income_whole_game(&self) -> f64 {
        self.income_whole_game
    }

    /// Sum of the per loyal miner block revenue over the whole game, i.e. the
    /// income this pool would have had without sabotage revenue.
    pub fn income_whole_game_no_attack(&self) -> f64 {
        self.income_whole_game_no_attack
    }

    /// Every miner physically mining in this pool.
    #[inline]
    pub fn members(&self) -> &[MinerId] {
        &self.members
    }

    /// Miners this pool sent to infiltrate other pools.
    #[inline]
    pub fn sabotagers(&self) -> &[MinerId] {
        &self.sabotagers
    }

    /// Proof of work book of this pool's members.
    pub fn pow(&self) -> &HashMap<MinerId, ProofOfWork> {
        &self.pow
    }

    /// Number of miners working for this pool: honest members at home plus
    /// sabotagers sent out. This is the pool's infiltration budget.
    #[inline]
    pub fn loyal_miners(&self) -> usize {
        let loyal = self.checked_loyal_miners();
        debug_assert!(
            loyal.is_some(),
            "pool {} has a negative headcount",
            self.id
        );

        loyal.unwrap_or(0)
    }

    /// Like [`Pool::loyal_miners`], but returns `None` if more infiltrators
    /// are recorded than miners are listed.
    #[inline]
    pub fn checked_loyal_miners(&self) -> Option<usize> {
        (self.members.len() + self.sabotagers.len())
            .checked_sub(self.own_infiltration_rate)
    }

    /// Returns true if nobody mines for this pool anymore.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loyal_miners() == 0
    }

    /// Gives every idle member a new task, one unit harder than its last
    /// partial proof of work.
    pub fn assign_tasks(&self, work: &mut dyn Work) {
        for &miner in self.members.iter() {
            if work.is_idle(miner) {
                let partial = self.pow.get(&miner).map_or(0.0, |p| p.partial);
                work.assign_task(miner, partial as usize + 1);
            }
        }
    }

    pub fn round_of_work(&self, work: &mut dyn Work) {
        for &miner in self.members.iter() {
            work.perform_work_unit(miner);
        }
    }

    /// Publishes the results of every member that finished its task. Honest
    /// members which completed a block earn the pool [`REVENUE_FOR_BLOCK`].
    /// Sabotagers withhold their full proof of work.
    pub fn update_proof_of_work(
        &mut self,
        work: &mut dyn Work,
        roster: &mut [Miner],
    ) {
        for i in 0..self.members.len() {
            let id = self.members[i];
            if !work.is_idle(id) {
                continue;
            }

            let mut pow = work.publish_result(id);
            let miner = &mut roster[id.get()];
            if miner.is_sabotager() {
                pow.full = 0.0;
            }
            miner.set_pow(pow);
            self.pow.insert(id, pow);

            if pow.found_block() {
                self.collect_revenue_from_miner(id);
            }
        }

        let loyal = self.loyal_miners();
        if loyal > 0 {
            self.income_whole_game_no_attack += self.revenue / loyal as f64;
        }
    }

    /// Credits the reward for a block completed by `miner`.
    pub fn collect_revenue_from_miner(&mut self, miner: MinerId) {
        tracing::trace!(pool = %self.id, %miner, "block completed");
        self.revenue += REVENUE_FOR_BLOCK;
    }

    /// Collects the revenue every sabotager of this pool earned inside its
    /// target pool.
    pub fn collect_revenue_from_sabotagers(&mut self, roster: &mut [Miner]) {
        self.revenue_from_sabotagers.iter_mut().for_each(|r| *r = 0.0);

        for &id in self.sabotagers.iter() {
            let miner = &mut roster[id.get()];
            let amount = miner.take_attacked_pool_revenue();

            if let Role::Sabotager { target, .. } = miner.role() {
                self.revenue_from_sabotagers[target.get()] += amount;
            }
            self.revenue += amount;
        }
    }

    /// Returns the revenue of this round per participant (members and
    /// sabotagers sent out), and adds it to
    /// [`Pool::income_whole_game`].
    pub fn publish_revenue(&mut self) -> f64 {
        let participants = self.members.len() + self.sabotagers.len();
        if participants == 0 {
            return 0.0;
        }

        let per_participant = self.revenue / participants as f64;
        self.income_whole_game += per_participant;

        per_participant
    }

    /// Distributes this round's revenue between all members and sabotagers
    /// of this pool, proportionally to their partial proof of work.
    ///
    /// Honest members and this pool's sabotagers are paid directly. Sabotagers
    /// from other pools have their share credited for collection by their
    /// origin pool. If nobody has any partial proof of work, revenue is split
    /// equally. Resets [`Pool::revenue`] to 0.
    pub fn send_revenue_to_all(&mut self, roster: &mut [Miner]) {
        let participants = self.members.len() + self.sabotagers.len();
        if participants == 0 {
            self.revenue = 0.0;
            return;
        }

        let total_pow: f64 = self
            .members
            .iter()
            .chain(self.sabotagers.iter())
            .map(|id| roster[id.get()].partial_pow())
            .sum();

        let share_of = |miner: &Miner| {
            if total_pow > 0.0 {
                self.revenue / total_pow * miner.partial_pow()
            } else {
                self.revenue / participants as f64
            }
        };

        for &id in self.sabotagers.iter() {
            let miner = &mut roster[id.get()];
            let share = share_of(miner);
            miner.pay(share);
        }

        for &id in self.members.iter() {
            let miner = &mut roster[id.get()];
            let share = share_of(miner);
            if miner.is_sabotager() {
                miner.credit_attacked_pool(share);
            } else {
                miner.pay(share);
            }
        }

        self.revenue = 0.0;
    }

    /// Shifts the current revenue density into the previous round slot and
    /// stores `density` as the current one.
    pub fn record_revenue_density(&mut self, density: f64) {
        self.revenue_density_prev_round = self.revenue_density;
        self.revenue_density = density;
    }

    /// Initializes all revenue density values to `density`.
    pub(crate) fn init_revenue_density(&mut self, density: f64) {
        self.revenue_density = density;
        self.revenue_density_prev_round = density;
        self.revenue_density_if_no_one_attacks = density;
    }

    pub(crate) fn add_revenue(&mut self, amount: f64) {
        self.revenue += amount;
    }

    pub(crate) fn add_member(&mut self, miner: MinerId) {
        self.members.push(miner);
        self.pow.insert(miner, ProofOfWork::default());
    }

    /// Removes `miner` from the members of this pool. Returns false if it was
    /// not a member.
    pub(crate) fn remove_member(&mut self, miner: MinerId) -> bool {
        self.pow.remove(&miner);
        match self.members.iter().position(|&m| m == miner) {
            Some(i) => {
                self.members.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn add_sabotager(&mut self, miner: MinerId) {
        self.sabotagers.push(miner);
    }

    pub(crate) fn remove_sabotager(&mut self, miner: MinerId) -> bool {
        match self.sabotagers.iter().position(|&m| m == miner) {
            Some(i) => {
                self.sabotagers.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_infiltration_rate(&mut self, target: PoolId, rate: usize) {
        self.infiltration_rates[target.get()] = rate;
    }

    pub(crate) fn increase_own_infiltration_rate(&mut self) {
        self.own_infiltration_rate += 1;
    }

    pub(crate) fn decrease_own_infiltration_rate(
        &mut self,
    ) -> Result<(), InvariantViolation> {
        self.own_infiltration_rate = self
            .own_infiltration_rate
            .checked_sub(1)
            .ok_or(InvariantViolation::NegativeHeadcount { pool: self.id })?;

        Ok(())
    }

    /// Forgets every member, sabotager and incoming infiltration. Used when
    /// the pool is dissolved.
    pub(crate) fn clear(&mut self) {
        self.own_infiltration_rate = 0;
        self.infiltration_rates.iter_mut().for_each(|r| *r = 0);
        self.members.clear();
        self.sabotagers.clear();
        self.pow.clear();
    }
}
