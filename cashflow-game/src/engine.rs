//! Turn engine: the state machine driving one player through
//! draw → decide → resolve → advance, the win check, and the insolvency
//! bailout path.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::catalog::{Card, CardBody, CardKind, CatalogError, Catalogs, StatementMutation};
use crate::deck::{Deck, DeckError};
use crate::money::{Money, pct_of, times_units};
use crate::statement::{AssetId, FinancialStatement, LiabilityDraft, StatementError};

const BAILOUT_LOAN_NAME: &str = "Bailout loan";

/// Events emitted per action. Inline capacity covers a typical resolution.
pub type EventSet = SmallVec<[TurnEvent; 4]>;

/// State machine phase within one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    AwaitingRoll,
    CardDrawn,
    AwaitingDecision,
}

/// Session lifecycle status. `Won`, `Lost` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Won,
    Lost,
    Abandoned,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Caller decision on the currently drawn card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Take the card. `financing` indexes into the opportunity's down
    /// payment options; `None` means an all-cash purchase.
    Accept { financing: Option<usize> },
    /// Take part of a divisible lot, all cash.
    AcceptPartial { units: u32 },
    /// Pass. Always legal and free for opportunities and non-mandatory
    /// market events.
    Decline,
}

/// Message emitted by the engine as actions resolve; the recorder and the
/// session's log ledger both consume this stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    TurnAdvanced {
        turn: u32,
        collected_cents: Money,
        expenses_cents: Money,
    },
    CardDrawn {
        card_id: String,
        kind: CardKind,
    },
    AssetAcquired {
        asset_id: AssetId,
        cost_cents: Money,
        financed_cents: Money,
    },
    AssetSold {
        asset_id: AssetId,
        sale_price_cents: Money,
    },
    DoodadPurchased {
        cost_cents: Money,
    },
    MarketEffectApplied {
        card_id: String,
    },
    EffectExpired {
        card_id: String,
    },
    CardDeclined {
        card_id: String,
    },
    LoanTaken {
        principal_cents: Money,
    },
    GameWon {
        turn: u32,
    },
    GameLost {
        turn: u32,
    },
    SessionAbandoned {
        turn: u32,
    },
}

/// Errors surfaced by the engine. Expected game conditions are values of
/// this type; only configuration-level inconsistencies (an empty catalog)
/// are unrecoverable at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("action illegal in phase {phase:?} with status {status:?}")]
    InvalidTransition {
        phase: TurnPhase,
        status: SessionStatus,
    },
    #[error("decision not valid for the drawn card")]
    InvalidDecision,
    #[error("stale action sequence {got} (expected {expected})")]
    StaleAction { got: u64, expected: u64 },
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl EngineError {
    /// Stable code for the external API layer; distinct per failure kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidDecision => "invalid_decision",
            Self::StaleAction { .. } => "stale_action",
            Self::Statement(err) => err.code(),
            Self::Deck(err) => err.code(),
            Self::Catalog(err) => err.code(),
        }
    }
}

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

/// Automatic bailout-loan policy consulted when cash goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPolicy {
    #[serde(default = "LoanPolicy::default_enabled")]
    pub enabled: bool,
    /// Loans are granted in whole increments of this size.
    #[serde(default = "LoanPolicy::default_increment")]
    pub increment_cents: Money,
    #[serde(default = "LoanPolicy::default_rate")]
    pub rate_pct: u32,
    /// Cap on total outstanding principal; capacity beyond it is refused.
    #[serde(default = "LoanPolicy::default_max_principal")]
    pub max_principal_cents: Money,
}

impl LoanPolicy {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_increment() -> Money {
        100_000
    }

    const fn default_rate() -> u32 {
        10
    }

    const fn default_max_principal() -> Money {
        5_000_000
    }

    /// Policy with no capacity at all, for configurations without a bank.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            increment_cents: Self::default_increment(),
            rate_pct: Self::default_rate(),
            max_principal_cents: 0,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.increment_cents < 1 {
            return Err(ConfigError::MinViolation {
                field: "loan.increment_cents",
                min: 1,
                value: self.increment_cents,
            });
        }
        if self.rate_pct > 100 {
            return Err(ConfigError::RangeViolation {
                field: "loan.rate_pct",
                min: 0,
                max: 100,
                value: i64::from(self.rate_pct),
            });
        }
        if self.max_principal_cents < 0 {
            return Err(ConfigError::MinViolation {
                field: "loan.max_principal_cents",
                min: 0,
                value: self.max_principal_cents,
            });
        }
        Ok(())
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            increment_cents: Self::default_increment(),
            rate_pct: Self::default_rate(),
            max_principal_cents: Self::default_max_principal(),
        }
    }
}

/// Engine configuration, serde-loaded with per-field defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub loan: LoanPolicy,
}

impl EngineConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented
    /// bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loan.validate()
    }
}

/// A timed market effect still in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub card_id: String,
    pub effect: StatementMutation,
    pub remaining_turns: u32,
}

/// The two decks one session draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPair {
    pub opportunity: Deck,
    pub market: Deck,
}

impl DeckPair {
    /// Build both decks from the catalogs on a shared session seed.
    #[must_use]
    pub fn from_catalogs(catalogs: &Catalogs, seed: u64) -> Self {
        Self {
            opportunity: Deck::shuffle(catalogs.opportunities.ids(), seed, CardKind::Opportunity),
            market: Deck::shuffle(catalogs.market_events.ids(), seed, CardKind::MarketEvent),
        }
    }

    pub const fn deck_mut(&mut self, kind: CardKind) -> &mut Deck {
        match kind {
            CardKind::Opportunity => &mut self.opportunity,
            CardKind::MarketEvent => &mut self.market,
        }
    }

    #[must_use]
    pub const fn deck(&self, kind: CardKind) -> &Deck {
        match kind {
            CardKind::Opportunity => &self.opportunity,
            CardKind::MarketEvent => &self.market,
        }
    }
}

/// The state machine for one player's run. Owns phase, turn counter,
/// active timed effects and the win/insolvency checks; the session wires
/// it to the statement and decks it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEngine {
    cfg: EngineConfig,
    phase: TurnPhase,
    status: SessionStatus,
    current_turn: u32,
    drawn_card: Option<String>,
    active_effects: Vec<ActiveEffect>,
}

impl TurnEngine {
    /// # Panics
    ///
    /// Panics when the configuration violates its documented bounds;
    /// embedders validate loaded configs before starting sessions.
    #[must_use]
    pub fn new(cfg: EngineConfig) -> Self {
        cfg.validate().expect("valid engine config");
        Self {
            cfg,
            phase: TurnPhase::AwaitingRoll,
            status: SessionStatus::Active,
            current_turn: 0,
            drawn_card: None,
            active_effects: Vec::new(),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub const fn current_turn(&self) -> u32 {
        self.current_turn
    }

    #[must_use]
    pub fn drawn_card(&self) -> Option<&str> {
        self.drawn_card.as_deref()
    }

    #[must_use]
    pub fn active_effects(&self) -> &[ActiveEffect] {
        &self.active_effects
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    const fn invalid_transition(&self) -> EngineError {
        EngineError::InvalidTransition {
            phase: self.phase,
            status: self.status,
        }
    }

    /// Advance one turn: collect salary (unless an outage is active) and
    /// passive income, deduct total expenses, tick down timed effects,
    /// then draw one card from the deck selected by the caller's roll
    /// outcome.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside `AwaitingRoll`, `DeckExhausted` when
    /// the selected catalog is empty.
    pub fn advance_turn(
        &mut self,
        stmt: &mut FinancialStatement,
        deck: &mut Deck,
        events: &mut EventSet,
    ) -> Result<(), EngineError> {
        if self.status.is_terminal() || self.phase != TurnPhase::AwaitingRoll {
            return Err(self.invalid_transition());
        }

        self.current_turn += 1;
        let collected = stmt.collectible_income();
        let expenses = stmt.total_expenses_cents;
        stmt.apply_cash_delta(collected - expenses);
        events.push(TurnEvent::TurnAdvanced {
            turn: self.current_turn,
            collected_cents: collected,
            expenses_cents: expenses,
        });
        self.expire_effects(stmt, events);

        if self.settle_or_fail(stmt, events) {
            return Ok(());
        }

        let card_id = deck.draw()?;
        events.push(TurnEvent::CardDrawn {
            card_id: card_id.clone(),
            kind: deck.kind(),
        });
        self.drawn_card = Some(card_id);
        self.phase = TurnPhase::CardDrawn;
        Ok(())
    }

    /// Resolve the caller's decision on the drawn card and loop back to
    /// `AwaitingRoll` (or a terminal status). Validation happens before
    /// any financial mutation, so failures leave the statement untouched.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` without a drawn card, `InvalidDecision` for a
    /// decision the card does not admit, and statement errors per
    /// [`FinancialStatement`].
    pub fn resolve(
        &mut self,
        decision: Decision,
        stmt: &mut FinancialStatement,
        decks: &mut DeckPair,
        catalogs: &Catalogs,
        events: &mut EventSet,
    ) -> Result<(), EngineError> {
        if self.status.is_terminal()
            || !matches!(
                self.phase,
                TurnPhase::CardDrawn | TurnPhase::AwaitingDecision
            )
        {
            return Err(self.invalid_transition());
        }
        let Some(card_id) = self.drawn_card.clone() else {
            return Err(self.invalid_transition());
        };
        let card = catalogs.lookup(&card_id)?;
        self.phase = TurnPhase::AwaitingDecision;

        match (&card.body, decision) {
            (CardBody::Opportunity(opp), Decision::Accept { financing }) => {
                self.accept_opportunity(card, opp.lot_units, financing, stmt, events)?;
            }
            (CardBody::Opportunity(opp), Decision::AcceptPartial { units }) => {
                if !opp.divisible() || units == 0 || units > opp.lot_units {
                    return Err(EngineError::InvalidDecision);
                }
                self.accept_opportunity(card, units, None, stmt, events)?;
            }
            (CardBody::Opportunity(_), Decision::Decline) => {
                events.push(TurnEvent::CardDeclined {
                    card_id: card_id.clone(),
                });
            }
            (CardBody::MarketEvent(event), Decision::Decline) => {
                if event.mandatory {
                    return Err(EngineError::InvalidDecision);
                }
                events.push(TurnEvent::CardDeclined {
                    card_id: card_id.clone(),
                });
            }
            (CardBody::MarketEvent(event), Decision::Accept { .. }) => {
                let event = event.clone();
                self.apply_market_event(&card_id, &event, stmt, events)?;
            }
            (CardBody::MarketEvent(_), Decision::AcceptPartial { .. }) => {
                return Err(EngineError::InvalidDecision);
            }
        }

        decks.deck_mut(card.kind()).discard(card_id);
        self.drawn_card = None;
        self.phase = TurnPhase::AwaitingRoll;

        if !self.settle_or_fail(stmt, events) {
            self.check_win(stmt, events);
        }
        Ok(())
    }

    fn accept_opportunity(
        &mut self,
        card: &Card,
        units: u32,
        financing: Option<usize>,
        stmt: &mut FinancialStatement,
        events: &mut EventSet,
    ) -> Result<(), EngineError> {
        let CardBody::Opportunity(opp) = &card.body else {
            return Err(EngineError::InvalidDecision);
        };
        let cost = times_units(opp.cost_cents, units);
        let cash_flow = times_units(opp.cash_flow_cents, units);

        let (cash_paid, liability) = match financing {
            None => (cost, None),
            Some(idx) => {
                let option = opp
                    .down_payment_options
                    .get(idx)
                    .ok_or(EngineError::InvalidDecision)?;
                let down = pct_of(cost, option.down_pct);
                let draft = LiabilityDraft {
                    name: card.name.clone(),
                    principal_cents: cost - down,
                    rate_pct: option.rate_pct,
                };
                (down, Some(draft))
            }
        };

        let financed = liability.as_ref().map_or(0, |draft| draft.principal_cents);
        let asset_id = stmt.acquire_asset(
            card.name.clone(),
            opp.category,
            cost,
            cash_flow,
            opp.resale_range,
            units,
            cash_paid,
            liability,
        )?;
        events.push(TurnEvent::AssetAcquired {
            asset_id,
            cost_cents: cost,
            financed_cents: financed,
        });
        Ok(())
    }

    fn apply_market_event(
        &mut self,
        card_id: &str,
        event: &crate::catalog::MarketEvent,
        stmt: &mut FinancialStatement,
        events: &mut EventSet,
    ) -> Result<(), EngineError> {
        match &event.effect {
            StatementMutation::CashDelta { amount_cents } => {
                stmt.apply_cash_delta(*amount_cents);
            }
            StatementMutation::Doodad { cost_cents } => {
                if *cost_cents > stmt.cash_cents {
                    return Err(EngineError::Statement(StatementError::InsufficientFunds {
                        needed_cents: *cost_cents,
                        available_cents: stmt.cash_cents,
                    }));
                }
                stmt.apply_cash_delta(-cost_cents);
                events.push(TurnEvent::DoodadPurchased {
                    cost_cents: *cost_cents,
                });
            }
            StatementMutation::SalaryOutage => {
                stmt.salary_active = false;
                self.active_effects.push(ActiveEffect {
                    card_id: card_id.to_string(),
                    effect: StatementMutation::SalaryOutage,
                    remaining_turns: event.duration_turns.max(1),
                });
            }
            StatementMutation::YieldReprice {
                category,
                delta_cents,
            } => {
                stmt.reprice_category(*category, *delta_cents);
            }
            StatementMutation::DebtRelief { amount_cents } => {
                stmt.apply_debt_relief(*amount_cents);
            }
        }
        events.push(TurnEvent::MarketEffectApplied {
            card_id: card_id.to_string(),
        });
        Ok(())
    }

    /// Tick timed effects after the turn's collection so an N-turn effect
    /// spans exactly N collections.
    fn expire_effects(&mut self, stmt: &mut FinancialStatement, events: &mut EventSet) {
        for effect in &mut self.active_effects {
            effect.remaining_turns = effect.remaining_turns.saturating_sub(1);
        }
        let mut expired: Vec<String> = Vec::new();
        self.active_effects.retain(|effect| {
            if effect.remaining_turns == 0 {
                expired.push(effect.card_id.clone());
                false
            } else {
                true
            }
        });
        for card_id in expired {
            events.push(TurnEvent::EffectExpired { card_id });
        }
        stmt.salary_active = !self
            .active_effects
            .iter()
            .any(|effect| matches!(effect.effect, StatementMutation::SalaryOutage));
    }

    /// When cash is negative, borrow bailout increments while capacity
    /// remains; failing that, the session is lost. Returns `true` when a
    /// terminal status was entered.
    fn settle_or_fail(&mut self, stmt: &mut FinancialStatement, events: &mut EventSet) -> bool {
        while stmt.cash_cents < 0 {
            if !self.try_bailout_loan(stmt, events) {
                self.status = SessionStatus::Lost;
                events.push(TurnEvent::GameLost {
                    turn: self.current_turn,
                });
                return true;
            }
        }
        false
    }

    fn try_bailout_loan(&mut self, stmt: &mut FinancialStatement, events: &mut EventSet) -> bool {
        let policy = &self.cfg.loan;
        if !policy.enabled {
            return false;
        }
        let shortfall = -stmt.cash_cents;
        let increments = shortfall.div_euclid(policy.increment_cents)
            + i64::from(shortfall % policy.increment_cents != 0);
        let principal = policy.increment_cents.saturating_mul(increments);
        if stmt.total_principal() + principal > policy.max_principal_cents {
            return false;
        }
        stmt.take_loan(LiabilityDraft {
            name: BAILOUT_LOAN_NAME.to_string(),
            principal_cents: principal,
            rate_pct: policy.rate_pct,
        });
        events.push(TurnEvent::LoanTaken {
            principal_cents: principal,
        });
        true
    }

    fn check_win(&mut self, stmt: &FinancialStatement, events: &mut EventSet) {
        if stmt.passive_income_cents > stmt.total_expenses_cents {
            self.status = SessionStatus::Won;
            events.push(TurnEvent::GameWon {
                turn: self.current_turn,
            });
        }
    }

    /// Run the insolvency and win checks after a statement mutation made
    /// outside a card resolution (selling an asset between turns).
    pub fn check_after_mutation(&mut self, stmt: &mut FinancialStatement, events: &mut EventSet) {
        if self.status.is_terminal() {
            return;
        }
        if !self.settle_or_fail(stmt, events) {
            self.check_win(stmt, events);
        }
    }

    /// Terminal abandonment; accepted whenever the session is not already
    /// terminal.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` when the session is already terminal.
    pub fn abandon(&mut self, events: &mut EventSet) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition());
        }
        self.status = SessionStatus::Abandoned;
        events.push(TurnEvent::SessionAbandoned {
            turn: self.current_turn,
        });
        Ok(())
    }
}
