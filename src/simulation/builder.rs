use crate::{
    equilibrium::NumericError,
    miner::{HashingWork, Miner, MinerId, Role, Work},
    pool::{Pool, PoolId},
};

use super::Simulation;

/// Builds a [Simulation].
///
/// Pool miners `0..miners` are dealt to the pools round robin, so miner `i`
/// starts as an honest member of pool `i % pools`. Solo miners take the IDs
/// after the pool miners.
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    pub miners: Option<usize>,
    pub pools: Option<usize>,
    pub solo_miners: usize,
    fees: Option<Vec<f64>>,
    work: Option<Box<dyn Work>>,
    seed: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("number of pools must be greater than 0")]
    NoPools,
    #[error("number of pool miners must be greater than 0")]
    NoMiners,
    #[error("{0} contribution fees were given for {1} pools")]
    WrongNumFees(usize, usize),
    #[error("contribution fee {0} is not in [0, 1]")]
    BadFee(f64),
    #[error("work parameters are invalid")]
    InvalidWork,
    #[error("initial revenue densities could not be computed")]
    Numeric(#[from] NumericError),
}

impl SimulationBuilder {
    /// Creates a new [SimulationBuilder].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of miners dealt to pools.
    pub fn miners(mut self, num: usize) -> Self {
        self.miners = Some(num);

        self
    }

    /// Sets the number of pools.
    pub fn pools(mut self, num: usize) -> Self {
        self.pools = Some(num);

        self
    }

    /// Sets the number of miners mining outside of any pool (default 0).
    pub fn solo_miners(mut self, num: usize) -> Self {
        self.solo_miners = num;

        self
    }

    /// Sets the contribution fee of every pool, in order of pool ID. Pool `i`
    /// charges `0.01 * i` otherwise.
    pub fn fees<I>(mut self, fees: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.fees = Some(fees.into_iter().collect());

        self
    }

    /// Sets the [`Work`] mechanics used by all miners ([`HashingWork`]
    /// otherwise).
    pub fn work<W: Work + 'static>(mut self, work: W) -> Self {
        self.work = Some(Box::new(work));

        self
    }

    /// Seeds the default [`HashingWork`] so runs are reproducible. Ignored if
    /// [`SimulationBuilder::work`] is used.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Creates a [Simulation] from the specified parameters.
    pub fn build(self) -> Result<Simulation, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            miners: amount_miners,
            pools: amount_pools,
            solo_miners,
            fees,
            work,
            seed,
        } = self;

        let amount_pools = match amount_pools {
            None | Some(0) => return Err(NoPools),
            Some(x) => x,
        };
        let amount_miners = match amount_miners {
            None | Some(0) => return Err(NoMiners),
            Some(x) => x,
        };

        let fees = match fees {
            Some(fees) if fees.len() != amount_pools => {
                return Err(WrongNumFees(fees.len(), amount_pools))
            }
            Some(fees) => fees,
            None => (0..amount_pools).map(|i| i as f64 * 0.01).collect(),
        };
        if let Some(&fee) = fees.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(BadFee(fee));
        }

        let pools = fees
            .into_iter()
            .enumerate()
            .map(|(i, fee)| {
                let members = (i..amount_miners)
                    .step_by(amount_pools)
                    .map(MinerId)
                    .collect();
                Pool::new(PoolId(i), fee, amount_pools, members)
            })
            .collect();

        let miners = (0..amount_miners + solo_miners)
            .map(|i| {
                let role = if i < amount_miners {
                    Role::Honest { pool: PoolId(i % amount_pools) }
                } else {
                    Role::Solo
                };
                Miner::new(MinerId(i), role)
            })
            .collect();

        let work: Box<dyn Work> = match (work, seed) {
            (Some(work), _) => work,
            (None, Some(seed)) => Box::new(HashingWork::seeded(seed)),
            (None, None) => Box::new(HashingWork::new()),
        };
        if !work.is_valid() {
            return Err(InvalidWork);
        }

        let sim = Simulation::from_parts(
            amount_miners,
            solo_miners,
            pools,
            miners,
            work,
        )?;

        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationBuildError, SimulationBuilder};
    use crate::{miner::HashingWork, pool::PoolId};

    #[test]
    fn example_build() {
        SimulationBuilder::new()
            .miners(10)
            .pools(2)
            .build()
            .expect("valid simulation build");
    }

    #[test]
    fn default_fees_grow_with_pool_id() {
        let sim = SimulationBuilder::new().miners(6).pools(3).build().unwrap();

        let fees: Vec<_> =
            sim.pools().iter().map(|p| p.contribution_fee()).collect();
        assert_eq!(fees, vec![0.0, 0.01, 0.02]);
        assert_eq!(sim.pool(PoolId(2)).unwrap().members().len(), 2);
    }

    #[test]
    fn more_pools_than_miners() {
        let sim = SimulationBuilder::new().miners(2).pools(3).build().unwrap();

        let pool = sim.pool(PoolId(2)).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.revenue_density(), 0.0);
        assert!((sim.pools()[0].revenue_density() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_builds() {
        use SimulationBuildError::*;

        assert!(matches!(
            SimulationBuilder::new().miners(4).build(),
            Err(NoPools)
        ));
        assert!(matches!(
            SimulationBuilder::new().pools(2).solo_miners(3).build(),
            Err(NoMiners)
        ));
        assert!(matches!(
            SimulationBuilder::new().miners(4).pools(2).fees([0.1]).build(),
            Err(WrongNumFees(1, 2))
        ));
        assert!(matches!(
            SimulationBuilder::new()
                .miners(4)
                .pools(2)
                .fees([0.1, 1.5])
                .build(),
            Err(BadFee(f)) if f == 1.5
        ));
        assert!(matches!(
            SimulationBuilder::new()
                .miners(4)
                .pools(2)
                .work(HashingWork::seeded(0).block_target(0.0))
                .build(),
            Err(InvalidWork)
        ));
    }
}
