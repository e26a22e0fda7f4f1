//! Best response search over infiltration rate vectors.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    equilibrium::{self, NumericError},
    pool::{Pool, PoolId},
};

/// The infiltration rates a pool should commit to, and the revenue density
/// they yield.
#[derive(Debug, Clone, PartialEq)]
pub struct BestResponse {
    pub rates: Vec<usize>,
    pub revenue_density: f64,
}

/// Returns every vector of `num_pools` non-negative integers which sums to at
/// most `budget` and has a 0 at index `fixed`.
///
/// # Ordering
/// Vectors are generated by fixing the first entry and recursing on the rest,
/// with each entry counting up from 0. For 3 pools, `fixed == 0` and
/// `budget == 2`, the free entries are (0, 0), (0, 1), (0, 2), (1, 0), (1, 1)
/// and (2, 0), in that order.
pub fn candidates(
    num_pools: usize,
    fixed: PoolId,
    budget: usize,
) -> Vec<Vec<usize>> {
    fn compose(
        index: usize,
        remaining: usize,
        fixed: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if index == current.len() {
            out.push(current.clone());
            return;
        }
        if index == fixed {
            current[index] = 0;
            compose(index + 1, remaining, fixed, current, out);
            return;
        }

        for rate in 0..=remaining {
            current[index] = rate;
            compose(index + 1, remaining - rate, fixed, current, out);
        }
        current[index] = 0;
    }

    let mut out = vec![];
    let mut current = vec![0; num_pools];
    compose(0, budget, fixed.get(), &mut current, &mut out);

    out
}

/// Finds the infiltration rates which maximize the revenue density of `pool`
/// while every other pool keeps its committed rates.
///
/// The pool's committed rates are evaluated first, so the result is never
/// worse than the current strategy. A candidate only replaces the best vector
/// found so far if it is strictly better; ties go to the earlier candidate in
/// the order of [`candidates`]. Candidates which would send every miner in
/// the game infiltrating cannot be evaluated and are skipped.
///
/// # Errors
/// Returns a [`NumericError`] if `pool` is unknown, or if the committed rates
/// or any evaluated candidate yield an unsolvable system.
pub fn best_rate(
    pools: &[Pool],
    amount_miners: usize,
    pool: PoolId,
) -> Result<BestResponse, NumericError> {
    let this = pools
        .get(pool.get())
        .ok_or(NumericError::UnknownPool(pool))?;
    let committed = this.infiltration_rates().to_vec();
    let baseline =
        equilibrium::revenue_density(pools, amount_miners, pool, &committed)?;

    let feasible: Vec<_> = candidates(pools.len(), pool, this.loyal_miners())
        .into_iter()
        .filter(|rates| {
            equilibrium::in_flight(pools, pool, rates) < amount_miners as i64
        })
        .collect();

    let evaluate = |rates: &Vec<usize>| {
        equilibrium::revenue_density(pools, amount_miners, pool, rates)
    };

    #[cfg(feature = "rayon")]
    let densities: Vec<_> = feasible.par_iter().map(evaluate).collect();
    #[cfg(not(feature = "rayon"))]
    let densities: Vec<_> = feasible.iter().map(evaluate).collect();

    let mut best = BestResponse { rates: committed, revenue_density: baseline };
    for (rates, density) in feasible.into_iter().zip(densities) {
        let density = density?;
        if density > best.revenue_density {
            best = BestResponse { rates, revenue_density: density };
        }
    }

    tracing::debug!(
        %pool,
        rates = ?best.rates,
        revenue_density = best.revenue_density,
        "best response"
    );

    Ok(best)
}
