use std::time::Instant;

use anyhow::Context;
use infiltration_sim::prelude::*;
use tracing_subscriber::EnvFilter;

const MINERS: usize = 10;
const POOLS: usize = 2;
const MAX_ROUNDS: usize = 1000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let start = Instant::now();

    let mut sim = Simulation::builder()
        .miners(MINERS)
        .pools(POOLS)
        .build()
        .context("failed to build simulation")?;

    let mut history = History::new();
    let converged = sim.run_until_converged(MAX_ROUNDS, &mut history)?;

    println!("{}", history);
    println!();
    for pool in sim.pools() {
        println!(
            "Pool {}: {} members, {} infiltrators, rates {:?}, income {:.4} \
             ({:.4} without attacks)",
            pool.id(),
            pool.members().len(),
            pool.own_infiltration_rate(),
            pool.infiltration_rates(),
            pool.income_whole_game(),
            pool.income_whole_game_no_attack(),
        );
    }
    println!(
        "Converged: {} after {} rounds, elapsed time: {:.4} secs",
        converged,
        sim.time(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
