//! Game session: the aggregate root binding one player's financial
//! statement, decks and turn engine behind a single action funnel.
//!
//! The session is the message-passing boundary: it accepts action
//! messages, emits state-snapshot messages, and carries no dependency on
//! any presentation or transport layer. `&mut self` on every mutator
//! enforces the single-writer model; embedders wanting concurrent
//! submission serialize around the session themselves.

use serde::{Deserialize, Serialize};

use crate::catalog::{Card, CardKind, Catalogs};
use crate::engine::{
    Decision, DeckPair, EngineConfig, EngineError, EventSet, SessionStatus, TurnEngine, TurnEvent,
    TurnPhase,
};
use crate::money::Money;
use crate::outcome::{OutcomeRecorder, OutcomeSummary};
use crate::profession::Profession;
use crate::statement::{AssetId, FinancialStatement};

const DEBUG_ENV_VAR: &str = "CASHFLOW_DEBUG_LOGS";

const LOG_SESSION_STARTED: &str = "log.session.started";
const LOG_TURN_ADVANCED: &str = "log.turn.advanced";
const LOG_CARD_DRAWN: &str = "log.card.drawn";
const LOG_CARD_DECLINED: &str = "log.card.declined";
const LOG_ASSET_ACQUIRED: &str = "log.asset.acquired";
const LOG_ASSET_SOLD: &str = "log.asset.sold";
const LOG_DOODAD: &str = "log.doodad.purchased";
const LOG_MARKET_EFFECT: &str = "log.market.effect";
const LOG_EFFECT_EXPIRED: &str = "log.market.effect-expired";
const LOG_LOAN_TAKEN: &str = "log.loan.taken";
const LOG_GAME_WON: &str = "log.game.won";
const LOG_INSOLVENCY: &str = "log.insolvency";
const LOG_ABANDONED: &str = "log.session.abandoned";

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

/// A player action submitted through [`GameSession::submit_action`]. Deck
/// selection on `AdvanceTurn` belongs to the caller's dice abstraction;
/// the engine assumes no draw ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AdvanceTurn {
        draw: CardKind,
    },
    Resolve {
        decision: Decision,
    },
    SellAsset {
        asset_id: AssetId,
        sale_price_cents: Money,
        #[serde(default)]
        retire_liability: bool,
    },
    Abandon,
}

/// Read-only projection handed to the external API layer; deck internals
/// stay hidden, and the drawn card is visible only while a decision is
/// pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFacingState {
    pub turn: u32,
    pub phase: TurnPhase,
    pub status: SessionStatus,
    pub statement: FinancialStatement,
    pub net_cash_flow_cents: Money,
    pub visible_card: Option<Card>,
}

/// Reply to one accepted action: the new view, the events the action
/// produced, and the finalized summary when the action ended the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub state: PlayerFacingState,
    pub events: EventSet,
    pub outcome: Option<OutcomeSummary>,
}

/// One player's run. Serializes to the snapshot the external persistence
/// collaborator stores; the catalog registry is runtime-only and is
/// re-attached on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub player_id: String,
    pub profession_id: String,
    pub seed: u64,
    statement: FinancialStatement,
    decks: DeckPair,
    engine: TurnEngine,
    recorder: OutcomeRecorder,
    #[serde(default)]
    last_seq: u64,
    #[serde(default)]
    last_result: Option<ActionResult>,
    pub logs: Vec<String>,
    #[serde(skip)]
    catalogs: Option<Catalogs>,
}

impl GameSession {
    /// Start a fresh session for an (unvalidated, opaque) player id.
    #[must_use]
    pub fn start(
        profession: &Profession,
        catalogs: Catalogs,
        cfg: EngineConfig,
        player_id: &str,
        seed: u64,
    ) -> Self {
        let statement = FinancialStatement::from_profession(profession);
        let decks = DeckPair::from_catalogs(&catalogs, seed);
        Self {
            player_id: player_id.to_string(),
            profession_id: profession.id.clone(),
            seed,
            statement,
            decks,
            engine: TurnEngine::new(cfg),
            recorder: OutcomeRecorder::new(),
            last_seq: 0,
            last_result: None,
            logs: vec![String::from(LOG_SESSION_STARTED)],
            catalogs: Some(catalogs),
        }
    }

    /// Re-attach the process-wide catalog registry after deserialization.
    #[must_use]
    pub fn rehydrate(mut self, catalogs: Catalogs) -> Self {
        self.catalogs = Some(catalogs);
        self
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    #[must_use]
    pub const fn current_turn(&self) -> u32 {
        self.engine.current_turn()
    }

    #[must_use]
    pub const fn statement(&self) -> &FinancialStatement {
        &self.statement
    }

    #[must_use]
    pub const fn decks(&self) -> &DeckPair {
        &self.decks
    }

    #[must_use]
    pub const fn recorder(&self) -> &OutcomeRecorder {
        &self.recorder
    }

    /// Last applied action sequence number; the next action must carry
    /// `last_seq() + 1`.
    #[must_use]
    pub const fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Read-only projection of the current state.
    #[must_use]
    pub fn current_view(&self) -> PlayerFacingState {
        let visible_card = match self.engine.phase() {
            TurnPhase::CardDrawn | TurnPhase::AwaitingDecision => self
                .engine
                .drawn_card()
                .and_then(|id| self.lookup_card(id))
                .cloned(),
            TurnPhase::AwaitingRoll => None,
        };
        PlayerFacingState {
            turn: self.engine.current_turn(),
            phase: self.engine.phase(),
            status: self.engine.status(),
            statement: self.statement.clone(),
            net_cash_flow_cents: self.statement.net_cash_flow(),
            visible_card,
        }
    }

    fn lookup_card(&self, id: &str) -> Option<&Card> {
        self.catalogs
            .as_ref()
            .and_then(|catalogs| catalogs.lookup(id).ok())
    }

    /// Single mutation funnel. `seq` must be monotonically increasing;
    /// re-submitting the last applied sequence returns the cached result
    /// without re-applying, so an unconfirmed persistence attempt can be
    /// retried safely.
    ///
    /// # Errors
    ///
    /// `StaleAction` for out-of-order sequences, otherwise whatever the
    /// engine reports for the action; failed actions consume no sequence
    /// number and leave all state untouched.
    pub fn submit_action(&mut self, seq: u64, action: &Action) -> Result<ActionResult, EngineError> {
        if seq == self.last_seq {
            if let Some(cached) = &self.last_result {
                return Ok(cached.clone());
            }
        }
        if seq != self.last_seq + 1 {
            return Err(EngineError::StaleAction {
                got: seq,
                expected: self.last_seq + 1,
            });
        }

        if debug_log_enabled() {
            println!(
                "Session action | player:{} seq:{seq} turn:{} {action:?}",
                self.player_id,
                self.engine.current_turn()
            );
        }

        let mut events = EventSet::new();
        self.apply(action, &mut events)?;

        for event in &events {
            self.recorder.observe(event);
            if let Some(key) = log_key(event) {
                self.logs.push(key.to_string());
            }
        }

        let outcome = if self.engine.status().is_terminal() {
            Some(self.finalize_outcome())
        } else {
            None
        };

        let result = ActionResult {
            state: self.current_view(),
            events,
            outcome,
        };
        self.last_seq = seq;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    fn apply(&mut self, action: &Action, events: &mut EventSet) -> Result<(), EngineError> {
        match action {
            Action::AdvanceTurn { draw } => {
                self.engine
                    .advance_turn(&mut self.statement, self.decks.deck_mut(*draw), events)
            }
            Action::Resolve { decision } => {
                static EMPTY: Catalogs = Catalogs::empty();
                let catalogs = self.catalogs.as_ref().unwrap_or(&EMPTY);
                self.engine.resolve(
                    *decision,
                    &mut self.statement,
                    &mut self.decks,
                    catalogs,
                    events,
                )
            }
            Action::SellAsset {
                asset_id,
                sale_price_cents,
                retire_liability,
            } => {
                if self.engine.status().is_terminal()
                    || self.engine.phase() != TurnPhase::AwaitingRoll
                {
                    return Err(EngineError::InvalidTransition {
                        phase: self.engine.phase(),
                        status: self.engine.status(),
                    });
                }
                self.statement
                    .sell_asset(*asset_id, *sale_price_cents, *retire_liability)?;
                events.push(TurnEvent::AssetSold {
                    asset_id: *asset_id,
                    sale_price_cents: *sale_price_cents,
                });
                self.engine.check_after_mutation(&mut self.statement, events);
                Ok(())
            }
            Action::Abandon => self.engine.abandon(events),
        }
    }

    /// Abandon outside the action funnel (no sequence number). Accepted
    /// whenever the session is not already terminal.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` when the session is already terminal.
    pub fn abandon(&mut self) -> Result<OutcomeSummary, EngineError> {
        let mut events = EventSet::new();
        self.engine.abandon(&mut events)?;
        for event in &events {
            self.recorder.observe(event);
            if let Some(key) = log_key(event) {
                self.logs.push(key.to_string());
            }
        }
        Ok(self.finalize_outcome())
    }

    fn finalize_outcome(&mut self) -> OutcomeSummary {
        self.recorder.finalize(
            &self.profession_id,
            self.statement.cash_cents,
            self.engine.status(),
        )
    }
}

const fn log_key(event: &TurnEvent) -> Option<&'static str> {
    match event {
        TurnEvent::TurnAdvanced { .. } => Some(LOG_TURN_ADVANCED),
        TurnEvent::CardDrawn { .. } => Some(LOG_CARD_DRAWN),
        TurnEvent::CardDeclined { .. } => Some(LOG_CARD_DECLINED),
        TurnEvent::AssetAcquired { .. } => Some(LOG_ASSET_ACQUIRED),
        TurnEvent::AssetSold { .. } => Some(LOG_ASSET_SOLD),
        TurnEvent::DoodadPurchased { .. } => Some(LOG_DOODAD),
        TurnEvent::MarketEffectApplied { .. } => Some(LOG_MARKET_EFFECT),
        TurnEvent::EffectExpired { .. } => Some(LOG_EFFECT_EXPIRED),
        TurnEvent::LoanTaken { .. } => Some(LOG_LOAN_TAKEN),
        TurnEvent::GameWon { .. } => Some(LOG_GAME_WON),
        TurnEvent::GameLost { .. } => Some(LOG_INSOLVENCY),
        TurnEvent::SessionAbandoned { .. } => Some(LOG_ABANDONED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profession::ProfessionsList;

    fn start_teacher(seed: u64) -> GameSession {
        let professions = ProfessionsList::standard();
        GameSession::start(
            professions.get_by_id("teacher").unwrap(),
            Catalogs::standard(),
            EngineConfig::default(),
            "player-1",
            seed,
        )
    }

    #[test]
    fn view_hides_the_card_between_turns() {
        let mut session = start_teacher(11);
        let view = session.current_view();
        assert_eq!(view.phase, TurnPhase::AwaitingRoll);
        assert!(view.visible_card.is_none());
        assert_eq!(view.net_cash_flow_cents, 20_000);

        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        let view = session.current_view();
        assert_eq!(view.phase, TurnPhase::CardDrawn);
        let card = view.visible_card.expect("card visible while deciding");
        assert_eq!(card.kind(), CardKind::Opportunity);
    }

    #[test]
    fn replayed_sequence_returns_the_cached_result() {
        let mut session = start_teacher(11);
        let action = Action::AdvanceTurn {
            draw: CardKind::Opportunity,
        };
        let first = session.submit_action(1, &action).unwrap();
        let replay = session.submit_action(1, &action).unwrap();
        assert_eq!(first, replay);
        assert_eq!(session.current_turn(), 1, "replay did not re-apply");

        let err = session.submit_action(5, &action).unwrap_err();
        assert_eq!(
            err,
            EngineError::StaleAction {
                got: 5,
                expected: 2
            }
        );
        assert_eq!(err.code(), "stale_action");
    }

    #[test]
    fn failed_actions_consume_no_sequence_number() {
        let mut session = start_teacher(11);
        let err = session
            .submit_action(
                1,
                &Action::Resolve {
                    decision: Decision::Decline,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(session.last_seq(), 0);

        // The same sequence number still works for a legal action.
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        assert_eq!(session.last_seq(), 1);
    }

    #[test]
    fn sell_between_turns_goes_through_the_funnel() {
        let mut session = start_teacher(11);
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        // Selling while a decision is pending is a protocol error.
        let err = session
            .submit_action(
                2,
                &Action::SellAsset {
                    asset_id: 0,
                    sale_price_cents: 1,
                    retire_liability: false,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");

        session
            .submit_action(
                2,
                &Action::Resolve {
                    decision: Decision::Decline,
                },
            )
            .unwrap();
        // No such asset: distinct stable code, state untouched.
        let err = session
            .submit_action(
                3,
                &Action::SellAsset {
                    asset_id: 99,
                    sale_price_cents: 1,
                    retire_liability: false,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "asset_not_found");
    }

    #[test]
    fn abandon_finalizes_once() {
        let mut session = start_teacher(11);
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        session
            .submit_action(
                2,
                &Action::Resolve {
                    decision: Decision::Decline,
                },
            )
            .unwrap();

        let summary = session.abandon().unwrap();
        assert!(!summary.won);
        assert_eq!(summary.ending, "abandoned");
        assert_eq!(summary.turns_played, 1);
        assert!(session.abandon().is_err());
        assert!(session.logs.iter().any(|key| key == LOG_ABANDONED));
    }

    #[test]
    fn snapshot_roundtrip_resumes_exactly() {
        let mut session = start_teacher(77);
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        session
            .submit_action(
                2,
                &Action::Resolve {
                    decision: Decision::Decline,
                },
            )
            .unwrap();

        let snapshot = serde_json::to_string(&session).unwrap();
        let restored: GameSession = serde_json::from_str(&snapshot).unwrap();
        let mut restored = restored.rehydrate(Catalogs::standard());

        assert_eq!(restored.current_turn(), session.current_turn());
        assert_eq!(restored.statement(), session.statement());
        assert_eq!(restored.last_seq(), session.last_seq());

        // Both copies draw the same future card.
        let a = session
            .submit_action(
                3,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        let b = restored
            .submit_action(
                3,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        assert_eq!(a.state.visible_card, b.state.visible_card);
    }

    #[test]
    fn log_ledger_tracks_actions() {
        let mut session = start_teacher(3);
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        assert!(session.logs.iter().any(|key| key == LOG_SESSION_STARTED));
        assert!(session.logs.iter().any(|key| key == LOG_TURN_ADVANCED));
        assert!(session.logs.iter().any(|key| key == LOG_CARD_DRAWN));
    }
}
