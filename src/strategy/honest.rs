//! Honest/Frontier mining strategy

use crate::ledger::Ledger;

use super::{Action, Discovery, Sighting, Strategy};

/// Publishes all blocks as soon as they are found, at the winning head.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Honest;

impl Honest {
    /// Creates a new honest strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Honest {
    fn name(&self) -> String {
        "Honest".to_string()
    }

    fn on_self_block_found(
        &mut self,
        ledger: &Ledger,
        _found: &Discovery,
    ) -> Action {
        Action::ExtendAndPublish { parent: ledger.winning_head() }
    }

    fn on_competitor_block_seen(
        &mut self,
        _ledger: &Ledger,
        _seen: &Sighting,
    ) -> Action {
        Action::Wait
    }

    fn reset(&mut self) {}
}
