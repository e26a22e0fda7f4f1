//! Mining work performed by individual miners.

use std::{collections::HashMap, fmt::Debug};

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::MinerId;

/// Result of a finished task.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProofOfWork {
    /// Partial proof of work. Weighs the miner's share of pool revenue.
    pub partial: f64,
    /// Full proof of work. A block was found iff this is greater than 1.0.
    pub full: f64,
}

impl ProofOfWork {
    /// Full proof of work values above this threshold complete a block.
    pub const BLOCK_THRESHOLD: f64 = 1.0;

    #[inline]
    pub fn found_block(&self) -> bool {
        self.full > Self::BLOCK_THRESHOLD
    }
}

/// Hash attempt mechanics of miners. A task is assigned to an idle miner,
/// worked on one unit per round, and its result is published once the miner
/// is idle again.
pub trait Work: Debug + dyn_clone::DynClone + Send + Sync {
    /// Returns true if `miner` has no unfinished task.
    fn is_idle(&self, miner: MinerId) -> bool;

    /// Gives `miner` a new task consisting of `difficulty` work units.
    fn assign_task(&mut self, miner: MinerId, difficulty: usize);

    /// Performs one unit of work on the current task of `miner`, if any.
    fn perform_work_unit(&mut self, miner: MinerId);

    /// Returns the proof of work of the last finished task of `miner` and
    /// forgets the task.
    fn publish_result(&mut self, miner: MinerId) -> ProofOfWork;

    /// Returns true if the parameters of this instance are usable.
    fn is_valid(&self) -> bool {
        true
    }
}

dyn_clone::clone_trait_object!(Work);

#[derive(Debug, Clone, Default)]
struct Task {
    difficulty: usize,
    done: usize,
    shares: usize,
    best_hash: f64,
}

impl Task {
    fn new(difficulty: usize) -> Self {
        Self { difficulty, done: 0, shares: 0, best_hash: 1.0 }
    }

    fn is_finished(&self) -> bool {
        self.done >= self.difficulty
    }
}

/// Default [`Work`] implementation. Every work unit draws one uniform hash
/// value from `(0, 1]`. Hashes below the share target count towards the
/// partial proof of work, and the full proof of work is the block target
/// divided by the best hash, so a block is found with probability
/// `block_target` per work unit.
#[derive(Debug, Clone)]
pub struct HashingWork {
    block_target: f64,
    share_target: f64,
    rng: StdRng,
    tasks: HashMap<MinerId, Task>,
}

impl HashingWork {
    pub const DEFAULT_BLOCK_TARGET: f64 = 0.05;
    pub const DEFAULT_SHARE_TARGET: f64 = 0.5;

    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a reproducible instance.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            block_target: Self::DEFAULT_BLOCK_TARGET,
            share_target: Self::DEFAULT_SHARE_TARGET,
            rng,
            tasks: HashMap::new(),
        }
    }

    /// Sets the probability that a single work unit finds a block.
    pub fn block_target(mut self, target: f64) -> Self {
        self.block_target = target;

        self
    }

    /// Sets the probability that a single work unit finds a share.
    pub fn share_target(mut self, target: f64) -> Self {
        self.share_target = target;

        self
    }
}

impl Default for HashingWork {
    fn default() -> Self {
        Self::new()
    }
}

impl Work for HashingWork {
    fn is_idle(&self, miner: MinerId) -> bool {
        self.tasks.get(&miner).map_or(true, Task::is_finished)
    }

    fn assign_task(&mut self, miner: MinerId, difficulty: usize) {
        self.tasks.insert(miner, Task::new(difficulty));
    }

    fn perform_work_unit(&mut self, miner: MinerId) {
        let Some(task) = self.tasks.get_mut(&miner) else {
            return;
        };
        if task.is_finished() {
            return;
        }

        // (0, 1] so the full proof of work below stays finite
        let hash = 1.0 - self.rng.gen::<f64>();
        task.done += 1;
        if hash < self.share_target {
            task.shares += 1;
        }
        task.best_hash = task.best_hash.min(hash);
    }

    fn publish_result(&mut self, miner: MinerId) -> ProofOfWork {
        match self.tasks.remove(&miner) {
            Some(task) if task.done > 0 => ProofOfWork {
                partial: task.shares as f64,
                full: self.block_target / task.best_hash,
            },
            _ => ProofOfWork::default(),
        }
    }

    /// Returns true if both targets are probabilities in `(0, 1]`.
    fn is_valid(&self) -> bool {
        let valid = |p: f64| p > 0.0 && p <= 1.0;

        valid(self.block_target) && valid(self.share_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_lifecycle() {
        let mut work = HashingWork::seeded(7);
        let miner = MinerId(0);

        assert!(work.is_idle(miner));
        work.assign_task(miner, 2);
        assert!(!work.is_idle(miner));

        work.perform_work_unit(miner);
        assert!(!work.is_idle(miner));
        work.perform_work_unit(miner);
        assert!(work.is_idle(miner));

        let pow = work.publish_result(miner);
        assert!(pow.partial <= 2.0);
        assert!(pow.full > 0.0 && pow.full.is_finite());

        // Result is forgotten once published
        assert_eq!(work.publish_result(miner), ProofOfWork::default());
    }

    #[test]
    fn certain_block_target_always_finds_blocks() {
        let mut work = HashingWork::seeded(1).block_target(1.0);
        let miner = MinerId(4);

        for _ in 0..20 {
            work.assign_task(miner, 1);
            work.perform_work_unit(miner);
            let pow = work.publish_result(miner);
            // best hash <= 1.0, so full >= 1.0, with equality only at 1.0
            assert!(pow.full >= ProofOfWork::BLOCK_THRESHOLD);
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let run = |seed| {
            let mut work = HashingWork::seeded(seed);
            work.assign_task(MinerId(0), 5);
            for _ in 0..5 {
                work.perform_work_unit(MinerId(0));
            }
            work.publish_result(MinerId(0))
        };

        assert_eq!(run(42), run(42));
    }

    #[test]
    fn invalid_targets_are_detected() {
        assert!(HashingWork::seeded(0).is_valid());
        assert!(!HashingWork::seeded(0).block_target(0.0).is_valid());
        assert!(!HashingWork::seeded(0).share_target(1.5).is_valid());
    }
}
