/*!
Expected revenue densities of pools at equilibrium

Given a matrix of infiltration rates `x[source][target]`, the revenue density
`r_i` of pool `i` satisfies

```text
r_i = (R_i + sum_j x[i][j] * r_j) / (m_i + sum_j x[j][i])
```

where `m_i` is the number of loyal miners of pool `i` and `R_i` its direct
revenue, the share of honest mining power it contributes:

```text
R_i = (m_i - sum_j x[i][j]) / (M - sum_ij x[i][j])
```

with `M` the number of pool miners in the game. Collecting the `r_j` terms on
the left hand side gives one linear equation per pool, which
[`revenue_density`] solves exactly.
*/

use crate::pool::{Pool, PoolId};

/// Numeric failures while computing revenue densities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NumericError {
    #[error("coefficient matrix is singular in column {column}")]
    Singular { column: usize },
    #[error("no mining power is left once {in_flight} infiltrating miners are removed from {miners}")]
    NoEffectivePower { in_flight: i64, miners: usize },
    #[error("rate vector has {0} entries, but there are {1} pools")]
    DimensionMismatch(usize, usize),
    #[error("pool {0} does not exist")]
    UnknownPool(PoolId),
}

/// Pivots smaller than this are treated as zero.
const EPSILON_PIVOT: f64 = 1e-12;

/// Returns the number of infiltrating miners in the game if pool `caller`
/// switched from its committed rates to `rates`, while every other pool keeps
/// its committed rates.
///
/// # Panics
/// Panics if `caller` is not the ID of a pool in `pools`, or if `pools` has
/// a pool whose ID is not its index.
pub fn in_flight(pools: &[Pool], caller: PoolId, rates: &[usize]) -> i64 {
    let committed = pools[caller.get()].infiltration_rates();
    let others: i64 = pools
        .iter()
        .map(|p| {
            p.own_infiltration_rate() as i64
                - committed[p.id().get()] as i64
        })
        .sum();

    rates.iter().sum::<usize>() as i64 + others
}

/// Returns the equilibrium revenue density of pool `caller` if it used the
/// infiltration rates `rates`, while every other pool keeps its committed
/// rates.
///
/// A pool without loyal miners and without infiltrators has density 0.
///
/// # Errors
/// Returns a [`NumericError`] if `caller` is unknown, if `rates` has the
/// wrong length, if every miner in the game would be infiltrating, or if the
/// resulting system is singular.
pub fn revenue_density(
    pools: &[Pool],
    amount_miners: usize,
    caller: PoolId,
    rates: &[usize],
) -> Result<f64, NumericError> {
    let n = pools.len();
    if caller.get() >= n {
        return Err(NumericError::UnknownPool(caller));
    }
    if rates.len() != n {
        return Err(NumericError::DimensionMismatch(rates.len(), n));
    }

    let in_flight = in_flight(pools, caller, rates);
    let total = amount_miners as i64 - in_flight;
    if total <= 0 {
        return Err(NumericError::NoEffectivePower {
            in_flight,
            miners: amount_miners,
        });
    }
    let total = total as f64;

    let committed = pools[caller.get()].infiltration_rates();
    let mut coefs = vec![vec![0.0; n]; n];
    let mut constants = vec![0.0; n];

    for pool in pools {
        let r = pool.id().get();
        let (row, incoming) = if pool.id() == caller {
            (rates, pool.own_infiltration_rate())
        } else {
            let incoming =
                pool.own_infiltration_rate() + rates[r] - committed[r];
            (pool.infiltration_rates(), incoming)
        };

        coefs[r][r] = 1.0;

        let loyal = pool.loyal_miners();
        if loyal + incoming == 0 {
            continue;
        }
        let denominator = (loyal + incoming) as f64;

        let sent: usize = row.iter().sum();
        let direct = (loyal as f64 - sent as f64) / total;
        constants[r] = direct / denominator;

        for (c, &rate) in row.iter().enumerate() {
            if c != r {
                coefs[r][c] = -(rate as f64) / denominator;
            }
        }
    }

    let densities = solve(coefs, constants)?;

    Ok(densities[caller.get()])
}

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
pub(crate) fn solve(
    mut a: Vec<Vec<f64>>,
    mut b: Vec<f64>,
) -> Result<Vec<f64>, NumericError> {
    let n = b.len();

    for col in 0..n {
        let mut max_row = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[max_row][col].abs() {
                max_row = row;
            }
        }
        if !(a[max_row][col].abs() >= EPSILON_PIVOT) {
            return Err(NumericError::Singular { column: col });
        }
        a.swap(col, max_row);
        b.swap(col, max_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = 0.0;
        for k in (row + 1)..n {
            sum += a[row][k] * x[k];
        }
        x[row] = (b[row] - sum) / a[row][row];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{miner::MinerId, pool::Pool};

    fn pools_of(sizes: &[usize]) -> Vec<Pool> {
        let mut next = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let members = (next..next + size).map(MinerId).collect();
                next += size;
                Pool::new(PoolId(i), 0.0, sizes.len(), members)
            })
            .collect()
    }

    #[test]
    fn symmetric_pools_have_equal_density() {
        let pools = pools_of(&[5, 5]);

        let r0 = revenue_density(&pools, 10, PoolId(0), &[0, 0]).unwrap();
        let r1 = revenue_density(&pools, 10, PoolId(1), &[0, 0]).unwrap();

        assert_eq!(r0, r1);
        assert!((r0 - 0.1).abs() < 1e-12);
    }

    #[test]
    fn matches_closed_form_for_two_pools() {
        let pools = pools_of(&[5, 5]);

        // Pool 0 sends x miners into pool 1:
        // r_0 = (25 + 5x - x^2) / (5 (10 - x) (5 + x))
        for x in 0..=5usize {
            let xf = x as f64;
            let expected =
                (25.0 + 5.0 * xf - xf * xf) / (5.0 * (10.0 - xf) * (5.0 + xf));
            let r = revenue_density(&pools, 10, PoolId(0), &[0, x]).unwrap();

            assert!((r - expected).abs() < 1e-12, "x = {x}: {r} != {expected}");
        }
    }

    #[test]
    fn no_effective_power_is_an_error() {
        let pools = pools_of(&[3]);

        let err = revenue_density(&pools, 0, PoolId(0), &[0]).unwrap_err();

        assert_eq!(err, NumericError::NoEffectivePower { in_flight: 0, miners: 0 });
    }

    #[test]
    fn wrong_vector_length_is_an_error() {
        let pools = pools_of(&[3, 3]);

        assert_eq!(
            revenue_density(&pools, 6, PoolId(0), &[0, 1, 0]),
            Err(NumericError::DimensionMismatch(3, 2))
        );
    }

    #[test]
    fn unknown_caller_is_an_error() {
        let pools = pools_of(&[3, 3]);

        assert_eq!(
            revenue_density(&pools, 6, PoolId(2), &[0, 0]),
            Err(NumericError::UnknownPool(PoolId(2)))
        );
    }

    #[test]
    fn vacant_pool_has_zero_density() {
        let pools = pools_of(&[4, 0]);

        let r1 = revenue_density(&pools, 4, PoolId(1), &[0, 0]).unwrap();
        let r0 = revenue_density(&pools, 4, PoolId(0), &[0, 0]).unwrap();

        assert_eq!(r1, 0.0);
        assert!((r0 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn solve_detects_singular_matrix() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];

        assert_eq!(
            solve(a, vec![1.0, 2.0]),
            Err(NumericError::Singular { column: 1 })
        );
    }

    #[test]
    fn solve_pivots() {
        let a = vec![vec![0.0, 1.0], vec![2.0, 0.0]];
        let x = solve(a, vec![3.0, 4.0]).unwrap();

        assert_eq!(x, vec![2.0, 3.0]);
    }
}
