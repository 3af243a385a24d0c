//! Utilities for describing how the network breaks ties between chain tips.

use rand::Rng;

/// Decides whether a newly published block which ties the current winning
/// head takes over as the head.
///
/// Every publishing strategy carries a [`TieBreaker`]. Contests are always
/// pairwise, between the incumbent head and the block being published, so
/// an N-way tie is settled by N - 1 successive contests.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum TieBreaker {
    /// The network keeps mining on the block it saw first.
    #[default]
    FirstSeen,
    /// With the given probability (gamma), the network switches to the
    /// challenging block. Models a relay advantage of the publisher.
    FavorChallengerProb(f64),
}

impl TieBreaker {
    /// Returns true if the challenging block wins the contest. Consumes
    /// randomness from `rng` only when the outcome is not already certain.
    pub fn challenger_wins<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match *self {
            Self::FirstSeen => false,
            Self::FavorChallengerProb(gamma) => {
                debug_assert!(
                    (0.0..=1.0).contains(&gamma),
                    "probability must be between 0 and 1"
                );

                if gamma <= 0.0 {
                    false
                } else if gamma >= 1.0 {
                    true
                } else {
                    rng.gen_bool(gamma)
                }
            }
        }
    }

    /// Probability that the challenging block wins a contest.
    pub fn gamma(&self) -> f64 {
        match *self {
            Self::FirstSeen => 0.0,
            Self::FavorChallengerProb(gamma) => gamma,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::TieBreaker;

    #[test]
    fn certain_outcomes() {
        let mut rng = StdRng::seed_from_u64(1);

        assert!(!TieBreaker::FirstSeen.challenger_wins(&mut rng));
        assert!(
            !TieBreaker::FavorChallengerProb(0.0).challenger_wins(&mut rng)
        );
        assert!(TieBreaker::FavorChallengerProb(1.0).challenger_wins(&mut rng));
    }

    #[test]
    fn half_favor_splits_contests() {
        let mut rng = StdRng::seed_from_u64(7);
        let tie_breaker = TieBreaker::FavorChallengerProb(0.5);

        let wins = (0..10_000)
            .filter(|_| tie_breaker.challenger_wins(&mut rng))
            .count();
        assert!((4_500..5_500).contains(&wins));
    }
}
