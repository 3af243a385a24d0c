//! Selfish mining implementation

use log::debug;

use crate::{block::BlockId, ledger::Ledger, tie_breaker::TieBreaker};

use super::{withheld_count, Action, Discovery, Sighting, Strategy};

/// Follows the selfish mining strategy described by
/// [Eyal and Sirer](https://doi.org/10.48550/arXiv.1311.0243).
///
/// The lead of the private branch is measured in blocks: the height of the
/// branch tip minus the height of the winning head.
///
/// | Event              | Lead (after event) | Action                              |
/// |--------------------|--------------------|-------------------------------------|
/// | own block, racing  | -                  | extend own racing block and publish |
/// | own block          | any                | extend private tip, withhold        |
/// | competitor block   | < 0, tip published | wait, follow the winning head       |
/// | competitor block   | < 0, blocks held   | abandon                             |
/// | competitor block   | 0                  | publish branch, race with gamma     |
/// | competitor block   | 1                  | publish branch, win                 |
/// | competitor block   | > 1                | publish up to the public height     |
#[derive(Debug, Clone, PartialEq)]
pub struct SelfishDefault {
    inject_noise: bool,
    gamma: f64,
    /// Our newest block, published or not. `None` while mining on the
    /// public head.
    branch: Option<BlockId>,
}

impl SelfishDefault {
    /// Creates a new selfish strategy. `gamma` is the fraction of the
    /// network which adopts this miner's block in a tie.
    pub fn new(inject_noise: bool, gamma: f64) -> Self {
        SelfishDefault { inject_noise, gamma, branch: None }
    }

    /// Number of blocks currently withheld.
    pub fn withheld(&self, ledger: &Ledger) -> u64 {
        self.branch.map(|tip| withheld_count(ledger, tip)).unwrap_or(0)
    }

    /// Height of the private branch minus the height of the winning head.
    pub fn lead(&self, ledger: &Ledger) -> i64 {
        let public = ledger[ledger.winning_head()].height as i64;
        match self.branch {
            Some(tip) => ledger[tip].height as i64 - public,
            None => 0,
        }
    }
}

impl Strategy for SelfishDefault {
    fn name(&self) -> String {
        format!("Selfish (gamma={})", self.gamma)
    }

    fn on_self_block_found(
        &mut self,
        ledger: &Ledger,
        found: &Discovery,
    ) -> Action {
        match self.branch {
            // Our published block is racing a competitor's at the same
            // height; building on it settles the race in our favor.
            Some(tip) if ledger[tip].published => {
                self.branch = None;
                Action::ExtendAndPublish { parent: tip }
            }
            Some(tip) => {
                self.branch = Some(found.block);
                Action::ExtendAndWithhold { parent: tip }
            }
            None => {
                self.branch = Some(found.block);
                Action::ExtendAndWithhold { parent: ledger.winning_head() }
            }
        }
    }

    fn on_competitor_block_seen(
        &mut self,
        ledger: &Ledger,
        _seen: &Sighting,
    ) -> Action {
        let Some(tip) = self.branch else {
            return Action::Wait;
        };

        let lead = self.lead(ledger);
        if lead < 0 {
            self.branch = None;
            // A published tip leaves nothing withheld to drop.
            let withheld = withheld_count(ledger, tip);
            if withheld == 0 {
                return Action::Wait;
            }

            debug!(
                "selfish miner abandons {} withheld blocks at {}",
                withheld, tip
            );
            return Action::AbandonPrivateBranch;
        }
        if ledger[tip].published {
            return Action::Wait;
        }

        match lead {
            0 => Action::PublishWithheldLead { through: tip },
            1 => {
                self.branch = None;
                Action::PublishWithheldLead { through: tip }
            }
            _ => {
                let public = ledger[ledger.winning_head()].height;
                match ledger.ancestor_at(tip, public) {
                    Some(block) if !ledger[block].published => {
                        Action::PublishWithheldLead { through: block }
                    }
                    _ => Action::Wait,
                }
            }
        }
    }

    fn tie_breaker(&self) -> TieBreaker {
        TieBreaker::FavorChallengerProb(self.gamma)
    }

    fn injects_noise(&self) -> bool {
        self.inject_noise
    }

    fn reset(&mut self) {
        self.branch = None;
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ledger::{ForkChoice, Ledger},
        strategy::{testing::*, Action, Strategy},
    };

    use super::SelfishDefault;

    /// Lets the selfish miner find `n` blocks in a row.
    fn mine_privately(
        ledger: &mut Ledger,
        selfish: &mut SelfishDefault,
        n: usize,
        start: f64,
    ) {
        for i in 0..n {
            let found = found(ledger, start + i as f64);
            let action = selfish.on_self_block_found(ledger, &found);
            assert!(matches!(action, Action::ExtendAndWithhold { .. }));
            apply_found(ledger, &found, action);
        }
    }

    fn apply_publish(ledger: &mut Ledger, action: Action) {
        match action {
            Action::PublishWithheldLead { through } => {
                ledger.reveal(through).unwrap();
            }
            other => panic!("expected publication, got {:?}", other),
        }
    }

    #[test]
    fn withholds_first_block() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        mine_privately(&mut ledger, &mut selfish, 1, 1.0);
        assert_eq!(selfish.withheld(&ledger), 1);
        assert_eq!(selfish.lead(&ledger), 1);
        assert_eq!(ledger.winning_head(), Ledger::GENESIS);
    }

    #[test]
    fn lead_of_zero_accepts_competitor() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        competitor_block(&mut ledger, 1.0);
        assert_eq!(
            selfish.on_competitor_block_seen(&ledger, &seen(1.0)),
            Action::Wait
        );
    }

    #[test]
    fn lead_of_one_forces_tie_then_wins_race() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        let private = ledger.next_id();
        mine_privately(&mut ledger, &mut selfish, 1, 1.0);
        let honest = competitor_block(&mut ledger, 2.0);
        assert_eq!(ledger[private].height, 1);

        let action = selfish.on_competitor_block_seen(&ledger, &seen(2.0));
        assert_eq!(action, Action::PublishWithheldLead { through: private });
        apply_publish(&mut ledger, action);
        // First seen wins the tie when gamma is 0
        assert_eq!(ledger.winning_head(), honest);

        let found = found(&ledger, 3.0);
        let action = selfish.on_self_block_found(&ledger, &found);
        assert_eq!(action, Action::ExtendAndPublish { parent: private });
        let id = apply_found(&mut ledger, &found, action);
        assert_eq!(ledger.winning_head(), id);
        assert_eq!(selfish.withheld(&ledger), 0);
    }

    #[test]
    fn lead_of_two_publishes_everything() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        mine_privately(&mut ledger, &mut selfish, 2, 1.0);
        competitor_block(&mut ledger, 3.0);

        let action = selfish.on_competitor_block_seen(&ledger, &seen(3.0));
        apply_publish(&mut ledger, action);
        assert_eq!(ledger[ledger.winning_head()].height, 2);
        assert_eq!(ledger[ledger.winning_head()].miner, Some(SELF));
        assert_eq!(selfish.withheld(&ledger), 0);
    }

    #[test]
    fn long_lead_publishes_only_matching_prefix() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        mine_privately(&mut ledger, &mut selfish, 4, 1.0);
        let honest = competitor_block(&mut ledger, 5.0);

        let action = selfish.on_competitor_block_seen(&ledger, &seen(5.0));
        apply_publish(&mut ledger, action);
        assert_eq!(selfish.withheld(&ledger), 3);
        assert_eq!(selfish.lead(&ledger), 3);
        assert_eq!(ledger.winning_head(), honest);
    }

    #[test]
    fn lost_race_is_not_an_abandoned_branch() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        mine_privately(&mut ledger, &mut selfish, 1, 1.0);
        competitor_block(&mut ledger, 2.0);
        let action = selfish.on_competitor_block_seen(&ledger, &seen(2.0));
        apply_publish(&mut ledger, action);
        competitor_block(&mut ledger, 3.0);

        assert_eq!(
            selfish.on_competitor_block_seen(&ledger, &seen(3.0)),
            Action::Wait
        );
        assert_eq!(selfish.lead(&ledger), 0);
        assert_eq!(selfish.withheld(&ledger), 0);
    }

    #[test]
    fn abandons_when_overtaken() {
        let mut ledger = Ledger::new(ForkChoice::LongestChain);
        let mut selfish = SelfishDefault::new(false, 0.0);

        // Two competitor blocks arrive in a single publication.
        mine_privately(&mut ledger, &mut selfish, 1, 1.0);
        competitor_block(&mut ledger, 2.0);
        competitor_block(&mut ledger, 3.0);

        assert_eq!(
            selfish.on_competitor_block_seen(&ledger, &seen(3.0)),
            Action::AbandonPrivateBranch
        );
        assert_eq!(selfish.lead(&ledger), 0);

        let found = found(&ledger, 4.0);
        assert_eq!(
            selfish.on_self_block_found(&ledger, &found),
            Action::ExtendAndWithhold { parent: ledger.winning_head() }
        );
    }
}
