//! Selfish mining driven by the value of the private branch

use log::debug;

use crate::{block::BlockId, ledger::Ledger};

use super::{withheld_count, Action, Discovery, Sighting, Strategy};

/// Withholds blocks until the private branch is worth `value_threshold` more
/// than the winning head, then publishes all of it.
///
/// Unlike [`SelfishDefault`](super::SelfishDefault), a lead of more than one
/// block is never partially revealed. The whole branch is published only when
/// the threshold is reached, or when the next competitor block would overtake
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfishClever {
    inject_noise: bool,
    value_threshold: f64,
    branch: Option<BlockId>,
}

impl SelfishClever {
    pub fn new(inject_noise: bool, value_threshold: f64) -> Self {
        SelfishClever { inject_noise, value_threshold, branch: None }
    }

    /// Cumulative value of the private branch minus that of the winning head.
    pub fn value_lead(&self, ledger: &Ledger) -> f64 {
        match self.branch {
            Some(tip) => {
                ledger[tip].value_in_chain
                    - ledger[ledger.winning_head()].value_in_chain
            }
            None => 0.0,
        }
    }
}

impl Strategy for SelfishClever {
    fn name(&self) -> String {
        format!("Clever Selfish (threshold={})", self.value_threshold)
    }

    fn on_self_block_found(
        &mut self,
        ledger: &Ledger,
        found: &Discovery,
    ) -> Action {
        let head = ledger.winning_head();
        let (parent, racing) = match self.branch {
            Some(tip) => (tip, ledger[tip].published),
            None => (head, false),
        };

        let lead = ledger[parent].value_in_chain
            + found.block_value(ledger, parent)
            - ledger[head].value_in_chain;

        if racing || lead >= self.value_threshold {
            self.branch = None;
            Action::ExtendAndPublish { parent }
        } else {
            self.branch = Some(found.block);
            Action::ExtendAndWithhold { parent }
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

        let public = ledger[ledger.winning_head()].height as i64;
        let lead = ledger[tip].height as i64 - public;
        if lead < 0 {
            self.branch = None;
            let withheld = withheld_count(ledger, tip);
            if withheld == 0 {
                return Action::Wait;
            }

            debug!(
                "clever selfish miner abandons {} withheld blocks at {}",
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
            _ => Action::Wait,
        }
    }

    fn injects_noise(&self) -> bool {
        self.inject_noise
    }

    fn reset(&mut self) {
        self.branch = None;
    }
}
