/*!
Definitions for the miners taking part in the infiltration game

Every miner has a stable [`MinerId`] and a [`Role`]. The role decides where
the miner physically works and where its revenue goes:

- [`Role::Honest`] miners mine for their own pool.
- [`Role::Sabotager`] miners mine inside a target pool on behalf of their
  origin pool. They withhold every full proof of work they find and route
  the revenue they receive back to the origin pool.
- [`Role::Solo`] miners mine on their own, outside of any pool.

Switching roles never mutates a miner in place. [`Miner::into_role`] consumes
the old value and returns a new one which keeps the miner's identity and
lifetime income.
*/

pub mod work;

pub use work::{HashingWork, ProofOfWork, Work};

use crate::pool::PoolId;

/// Unique identifier of a [`Miner`]. Corresponds to a [`usize`] which is also
/// the miner's index in the simulation roster.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
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

/// The part a miner currently plays in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Mines for `pool`, where it is a loyal member.
    Honest { pool: PoolId },
    /// Sent by `origin` to mine inside `target`.
    Sabotager { origin: PoolId, target: PoolId },
    /// Mines independently.
    Solo,
}

impl Role {
    /// The pool this miner works for, if any. For sabotagers this is the
    /// origin pool, not the pool they physically mine in.
    pub fn loyal_to(&self) -> Option<PoolId> {
        match *self {
            Role::Honest { pool } => Some(pool),
            Role::Sabotager { origin, .. } => Some(origin),
            Role::Solo => None,
        }
    }

    /// The pool whose membership list contains this miner, if any.
    pub fn mines_in(&self) -> Option<PoolId> {
        match *self {
            Role::Honest { pool } => Some(pool),
            Role::Sabotager { target, .. } => Some(target),
            Role::Solo => None,
        }
    }
}

/// A single miner and its revenue bookkeeping.
#[derive(Debug, Clone)]
pub struct Miner {
    id: MinerId,
    role: Role,
    /// Last published proof of work.
    pow: ProofOfWork,
    /// Payout received from the pool this miner works for in the last round.
    revenue_in_own_pool: f64,
    /// Revenue earned inside a target pool that the origin pool has not
    /// collected yet. Always zero for non-sabotagers.
    revenue_in_attacked_pool: f64,
    /// Lifetime income, kept across role changes.
    income: f64,
    revenue_density: f64,
    revenue_density_prev_round: f64,
}

impl Miner {
    pub fn new(id: MinerId, role: Role) -> Self {
        Self {
            id,
            role,
            pow: ProofOfWork::default(),
            revenue_in_own_pool: 0.0,
            revenue_in_attacked_pool: 0.0,
            income: 0.0,
            revenue_density: f64::NAN,
            revenue_density_prev_round: f64::NAN,
        }
    }

    /// Returns a fresh miner with the same identity and lifetime income but a
    /// new role. Proof of work and pending revenue are not carried over.
    pub fn into_role(self, role: Role) -> Self {
        let Miner { id, income, .. } = self;

        Self { income, ..Self::new(id, role) }
    }

    #[inline]
    pub fn id(&self) -> MinerId {
        self.id
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn is_sabotager(&self) -> bool {
        matches!(self.role, Role::Sabotager { .. })
    }

    #[inline]
    pub fn pow(&self) -> ProofOfWork {
        self.pow
    }

    /// Records a freshly published proof of work.
    pub fn set_pow(&mut self, pow: ProofOfWork) {
        self.pow = pow;
    }

    /// Partial proof of work, used to weigh this miner's share of pool
    /// revenue.
    #[inline]
    pub fn partial_pow(&self) -> f64 {
        self.pow.partial
    }

    pub fn revenue_in_own_pool(&self) -> f64 {
        self.revenue_in_own_pool
    }

    pub fn revenue_in_attacked_pool(&self) -> f64 {
        self.revenue_in_attacked_pool
    }

    pub fn income(&self) -> f64 {
        self.income
    }

    /// Pays `amount` to this miner as a member of the pool it works for.
    pub fn pay(&mut self, amount: f64) {
        self.revenue_in_own_pool = amount;
        self.income += amount;
    }

    /// Credits revenue earned inside a target pool, to be collected by the
    /// origin pool.
    pub fn credit_attacked_pool(&mut self, amount: f64) {
        self.revenue_in_attacked_pool += amount;
    }

    /// Hands over the pending revenue earned inside the target pool.
    pub fn take_attacked_pool_revenue(&mut self) -> f64 {
        std::mem::take(&mut self.revenue_in_attacked_pool)
    }

    #[inline]
    pub fn revenue_density(&self) -> f64 {
        self.revenue_density
    }

    #[inline]
    pub fn revenue_density_prev_round(&self) -> f64 {
        self.revenue_density_prev_round
    }

    /// Shifts the current density into the previous round slot and stores
    /// `density` as the current one.
    pub fn record_revenue_density(&mut self, density: f64) {
        self.revenue_density_prev_round = self.revenue_density;
        self.revenue_density = density;
    }
}
