//! End-of-game outcome recording.
//!
//! The recorder accumulates counters as a pure function of the event
//! stream the turn engine emits; it never re-derives them by walking a
//! persisted log.

use serde::{Deserialize, Serialize};

use crate::engine::{SessionStatus, TurnEvent};
use crate::money::Money;

/// Immutable summary of a finished run, handed verbatim to the external
/// statistics aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub profession_id: String,
    pub turns_played: u32,
    pub final_cash_cents: Money,
    pub investment_count: u32,
    pub doodad_count: u32,
    pub doodad_spent_cents: Money,
    pub assets_sold: u32,
    pub cards_declined: u32,
    pub loans_taken: u32,
    pub won: bool,
    /// Stable terminal code for the statistics collaborator:
    /// `won`, `lost` or `abandoned`.
    pub ending: String,
}

/// Event-stream fed counters plus the finalized summary, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutcomeRecorder {
    turns_played: u32,
    investment_count: u32,
    doodad_count: u32,
    doodad_spent_cents: Money,
    assets_sold: u32,
    cards_declined: u32,
    loans_taken: u32,
    finalized: Option<OutcomeSummary>,
}

impl OutcomeRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one engine event into the counters. Events arriving after
    /// finalization are ignored; the summary is immutable.
    pub fn observe(&mut self, event: &TurnEvent) {
        if self.finalized.is_some() {
            return;
        }
        match event {
            TurnEvent::TurnAdvanced { .. } => self.turns_played += 1,
            TurnEvent::AssetAcquired { .. } => self.investment_count += 1,
            TurnEvent::AssetSold { .. } => self.assets_sold += 1,
            TurnEvent::DoodadPurchased { cost_cents } => {
                self.doodad_count += 1;
                self.doodad_spent_cents += cost_cents;
            }
            TurnEvent::CardDeclined { .. } => self.cards_declined += 1,
            TurnEvent::LoanTaken { .. } => self.loans_taken += 1,
            TurnEvent::CardDrawn { .. }
            | TurnEvent::MarketEffectApplied { .. }
            | TurnEvent::EffectExpired { .. }
            | TurnEvent::GameWon { .. }
            | TurnEvent::GameLost { .. }
            | TurnEvent::SessionAbandoned { .. } => {}
        }
    }

    /// Produce the summary at the terminal transition. Idempotent: a
    /// second call returns the stored summary without re-counting.
    pub fn finalize(
        &mut self,
        profession_id: &str,
        final_cash_cents: Money,
        status: SessionStatus,
    ) -> OutcomeSummary {
        if let Some(summary) = &self.finalized {
            return summary.clone();
        }
        let summary = OutcomeSummary {
            profession_id: profession_id.to_string(),
            turns_played: self.turns_played,
            final_cash_cents,
            investment_count: self.investment_count,
            doodad_count: self.doodad_count,
            doodad_spent_cents: self.doodad_spent_cents,
            assets_sold: self.assets_sold,
            cards_declined: self.cards_declined,
            loans_taken: self.loans_taken,
            won: status == SessionStatus::Won,
            ending: status.as_str().to_string(),
        };
        self.finalized = Some(summary.clone());
        summary
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    #[must_use]
    pub const fn finalized(&self) -> Option<&OutcomeSummary> {
        self.finalized.as_ref()
    }

    #[must_use]
    pub const fn turns_played(&self) -> u32 {
        self.turns_played
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_folds_the_event_stream() {
        let mut recorder = OutcomeRecorder::new();
        recorder.observe(&TurnEvent::TurnAdvanced {
            turn: 1,
            collected_cents: 300_000,
            expenses_cents: 280_000,
        });
        recorder.observe(&TurnEvent::AssetAcquired {
            asset_id: 0,
            cost_cents: 50_000,
            financed_cents: 0,
        });
        recorder.observe(&TurnEvent::DoodadPurchased { cost_cents: 4_000 });
        recorder.observe(&TurnEvent::DoodadPurchased { cost_cents: 6_000 });
        recorder.observe(&TurnEvent::CardDeclined {
            card_id: "opp.pass".to_string(),
        });
        recorder.observe(&TurnEvent::LoanTaken {
            principal_cents: 100_000,
        });

        let summary = recorder.finalize("teacher", 70_000, SessionStatus::Won);
        assert_eq!(summary.turns_played, 1);
        assert_eq!(summary.investment_count, 1);
        assert_eq!(summary.doodad_count, 2);
        assert_eq!(summary.doodad_spent_cents, 10_000);
        assert_eq!(summary.assets_sold, 0);
        assert_eq!(summary.cards_declined, 1);
        assert_eq!(summary.loans_taken, 1);
        assert!(summary.won);
        assert_eq!(summary.ending, "won");
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut recorder = OutcomeRecorder::new();
        recorder.observe(&TurnEvent::TurnAdvanced {
            turn: 1,
            collected_cents: 0,
            expenses_cents: 0,
        });
        let first = recorder.finalize("teacher", 1_000, SessionStatus::Lost);

        // Late events and a second finalize with different inputs change
        // nothing.
        recorder.observe(&TurnEvent::TurnAdvanced {
            turn: 2,
            collected_cents: 0,
            expenses_cents: 0,
        });
        let second = recorder.finalize("someone_else", 9_999, SessionStatus::Won);
        assert_eq!(first, second);
        assert!(!second.won);
        assert_eq!(second.ending, "lost");
    }

    #[test]
    fn abandoned_summary_is_not_a_win() {
        let mut recorder = OutcomeRecorder::new();
        let summary = recorder.finalize("janitor", 0, SessionStatus::Abandoned);
        assert!(!summary.won);
        assert_eq!(summary.ending, "abandoned");
        assert_eq!(summary.turns_played, 0);
    }
}
