//! Detecting when the infiltration game has settled.

/// Tracks how many consecutive rounds passed without any revenue density
/// changing.
///
/// A density that is NaN has no meaningful value yet and never counts as a
/// change. The game is converged once the streak covers one full round robin
/// pass over every participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceTracker {
    required: usize,
    streak: usize,
    converged: bool,
}

impl ConvergenceTracker {
    /// Creates a tracker which requires `required` consecutive unchanged
    /// rounds.
    pub fn new(required: usize) -> Self {
        Self { required, streak: 0, converged: false }
    }

    /// Compares each `(current, previous)` pair of revenue densities of this
    /// round, updates the streak and returns whether the game is converged.
    pub fn observe<I>(&mut self, densities: I) -> bool
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let unchanged = densities
            .into_iter()
            .all(|(current, previous)| current == previous || current.is_nan());

        if unchanged {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.converged = unchanged && self.streak >= self.required;

        self.converged
    }

    #[inline]
    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Number of consecutive rounds without change.
    #[inline]
    pub fn streak(&self) -> usize {
        self.streak
    }

    pub fn required(&self) -> usize {
        self.required
    }
}
