//! Consistency checks between the miner roster and pool memberships.

use crate::{
    miner::{Miner, MinerId, Role},
    pool::{Pool, PoolId},
};

/// A broken membership invariant. Always a bug in a membership transition;
/// the simulation state can't be trusted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("roster slot {slot} holds miner {miner}")]
    RosterOrder { slot: usize, miner: MinerId },
    #[error("miner {miner} is listed in pool {pool} but its role is {role:?}")]
    MisplacedMember { miner: MinerId, pool: PoolId, role: Role },
    #[error("miner {miner} is a sabotager of pool {pool} but its role is {role:?}")]
    MisplacedSabotager { miner: MinerId, pool: PoolId, role: Role },
    #[error("miner {0} is listed more than once")]
    DuplicateMiner(MinerId),
    #[error("miner {0} is missing from the pool it belongs to")]
    OrphanedMiner(MinerId),
    #[error("pool {0} infiltrates itself")]
    SelfInfiltration(PoolId),
    #[error("pool {pool} has a negative headcount")]
    NegativeHeadcount { pool: PoolId },
    #[error(
        "pool {pool} records {recorded} infiltrators, the infiltration matrix \
         {column} and its membership {present}"
    )]
    InfiltrationMismatch {
        pool: PoolId,
        recorded: usize,
        column: usize,
        present: usize,
    },
    #[error("pool {pool} committed {committed} sabotagers but sent {sent}")]
    CommittedMismatch { pool: PoolId, committed: usize, sent: usize },
    #[error("pool {origin} has no sabotager in pool {target} to recall")]
    MissingSabotager { origin: PoolId, target: PoolId },
}

/// Checks that every miner is in exactly the membership lists its role
/// demands, and that the infiltration matrix agrees with the memberships.
pub fn check(pools: &[Pool], miners: &[Miner]) -> Result<(), InvariantViolation> {
    use InvariantViolation::*;

    for (slot, miner) in miners.iter().enumerate() {
        if miner.id().get() != slot {
            return Err(RosterOrder { slot, miner: miner.id() });
        }
    }

    let mut listed = vec![0usize; miners.len()];
    let mut sent = vec![0usize; miners.len()];
    let mut column = vec![0usize; pools.len()];

    for pool in pools {
        let id = pool.id();
        if pool.infiltration_rates()[id.get()] != 0 {
            return Err(SelfInfiltration(id));
        }
        if pool.members().len() + pool.sabotagers().len()
            < pool.own_infiltration_rate()
        {
            return Err(NegativeHeadcount { pool: id });
        }
        for (target, &rate) in pool.infiltration_rates().iter().enumerate() {
            column[target] += rate;
        }

        let mut present = 0;
        for &member in pool.members() {
            let role = miners[member.get()].role();
            if role.mines_in() != Some(id) {
                return Err(MisplacedMember { miner: member, pool: id, role });
            }
            if matches!(role, Role::Sabotager { .. }) {
                present += 1;
            }
            listed[member.get()] += 1;
        }
        if present != pool.own_infiltration_rate() {
            return Err(InfiltrationMismatch {
                pool: id,
                recorded: pool.own_infiltration_rate(),
                column: column_of(pools, id),
                present,
            });
        }

        for &sabotager in pool.sabotagers() {
            let role = miners[sabotager.get()].role();
            match role {
                Role::Sabotager { origin, .. } if origin == id => (),
                _ => {
                    return Err(MisplacedSabotager {
                        miner: sabotager,
                        pool: id,
                        role,
                    })
                }
            }
            sent[sabotager.get()] += 1;
        }

        let committed: usize = pool.infiltration_rates().iter().sum();
        if committed != pool.sabotagers().len() {
            return Err(CommittedMismatch {
                pool: id,
                committed,
                sent: pool.sabotagers().len(),
            });
        }
    }

    for pool in pools {
        let id = pool.id();
        if column[id.get()] != pool.own_infiltration_rate() {
            return Err(InfiltrationMismatch {
                pool: id,
                recorded: pool.own_infiltration_rate(),
                column: column[id.get()],
                present: pool.own_infiltration_rate(),
            });
        }
    }

    for miner in miners {
        let id = miner.id();
        let (expected_listed, expected_sent) = match miner.role() {
            Role::Honest { .. } => (1, 0),
            Role::Sabotager { .. } => (1, 1),
            Role::Solo => (0, 0),
        };

        let (listed, sent) = (listed[id.get()], sent[id.get()]);
        if listed > expected_listed || sent > expected_sent {
            return Err(DuplicateMiner(id));
        }
        if listed < expected_listed || sent < expected_sent {
            return Err(OrphanedMiner(id));
        }
    }

    Ok(())
}

fn column_of(pools: &[Pool], target: PoolId) -> usize {
    pools.iter().map(|p| p.infiltration_rates()[target.get()]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn honest(i: usize, pool: usize) -> Miner {
        Miner::new(MinerId(i), Role::Honest { pool: PoolId(pool) })
    }

    #[test]
    fn consistent_state_passes() {
        let miners = vec![honest(0, 0), honest(1, 1), Miner::new(MinerId(2), Role::Solo)];
        let pools = vec![
            Pool::new(PoolId(0), 0.0, 2, vec![MinerId(0)]),
            Pool::new(PoolId(1), 0.0, 2, vec![MinerId(1)]),
        ];

        assert_eq!(check(&pools, &miners), Ok(()));
    }

    #[test]
    fn miner_in_two_pools_is_detected() {
        let miners = vec![honest(0, 0), honest(1, 1)];
        let pools = vec![
            Pool::new(PoolId(0), 0.0, 2, vec![MinerId(0)]),
            Pool::new(PoolId(1), 0.0, 2, vec![MinerId(1), MinerId(0)]),
        ];

        assert_eq!(
            check(&pools, &miners),
            Err(InvariantViolation::MisplacedMember {
                miner: MinerId(0),
                pool: PoolId(1),
                role: Role::Honest { pool: PoolId(0) },
            })
        );
    }

    #[test]
    fn orphaned_miner_is_detected() {
        let miners = vec![honest(0, 0), honest(1, 0)];
        let pools = vec![Pool::new(PoolId(0), 0.0, 1, vec![MinerId(0)])];

        assert_eq!(
            check(&pools, &miners),
            Err(InvariantViolation::OrphanedMiner(MinerId(1)))
        );
    }

    #[test]
    fn unbacked_infiltration_rate_is_detected() {
        let miners = vec![honest(0, 0), honest(1, 1)];
        let mut pools = vec![
            Pool::new(PoolId(0), 0.0, 2, vec![MinerId(0)]),
            Pool::new(PoolId(1), 0.0, 2, vec![MinerId(1)]),
        ];
        pools[0].set_infiltration_rate(PoolId(1), 1);

        assert_eq!(
            check(&pools, &miners),
            Err(InvariantViolation::CommittedMismatch {
                pool: PoolId(0),
                committed: 1,
                sent: 0,
            })
        );
    }
}
