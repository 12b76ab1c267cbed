//! Card catalog: the immutable registry of opportunity and market event
//! cards a game draws from. Catalogs are loaded once at process start and
//! shared by immutable reference; nothing in the engine mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::Money;

/// Which deck a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Opportunity,
    MarketEvent,
}

impl CardKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opportunity => "opportunity",
            Self::MarketEvent => "market_event",
        }
    }

    /// Domain tag used for deck seed derivation.
    #[must_use]
    pub(crate) const fn domain_tag(self) -> &'static [u8] {
        match self {
            Self::Opportunity => b"opportunity",
            Self::MarketEvent => b"market",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an investable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    RealEstate,
    Stock,
    Business,
    Paper,
}

impl AssetCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealEstate => "real_estate",
            Self::Stock => "stock",
            Self::Business => "business",
            Self::Paper => "paper",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way an opportunity may be financed: pay `down_pct` of the cost in
/// cash and carry the remainder as a liability serviced at `rate_pct` per
/// turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownPaymentOption {
    pub down_pct: u32,
    pub rate_pct: u32,
}

/// Expected resale window for an asset, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResaleRange {
    pub min_cents: Money,
    pub max_cents: Money,
}

/// A purchasable asset offer. For divisible lots (`lot_units > 1`) the
/// cost and cash flow are quoted per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub cost_cents: Money,
    pub cash_flow_cents: Money,
    pub category: AssetCategory,
    #[serde(default = "default_lot_units")]
    pub lot_units: u32,
    #[serde(default)]
    pub down_payment_options: Vec<DownPaymentOption>,
    #[serde(default)]
    pub resale_range: Option<ResaleRange>,
}

fn default_lot_units() -> u32 {
    1
}

impl Opportunity {
    /// Whether the lot may be accepted in part.
    #[must_use]
    pub const fn divisible(&self) -> bool {
        self.lot_units > 1
    }
}

/// A statement mutation carried by a market event card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementMutation {
    /// One-shot credit or debit; may drive cash negative.
    CashDelta { amount_cents: Money },
    /// Discretionary purchase that produces no asset.
    Doodad { cost_cents: Money },
    /// Salary is not collected while the effect is active.
    SalaryOutage,
    /// Permanent per-turn cash-flow shift for every owned asset of the
    /// category (market repricing).
    YieldReprice {
        category: AssetCategory,
        delta_cents: Money,
    },
    /// Windfall applied to outstanding liabilities, oldest first.
    DebtRelief { amount_cents: Money },
}

/// An exogenous shock. `mandatory` events cannot be declined;
/// `duration_turns > 0` keeps the effect active across turn advances
/// (only meaningful for [`StatementMutation::SalaryOutage`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub effect: StatementMutation,
    #[serde(default)]
    pub duration_turns: u32,
    #[serde(default)]
    pub mandatory: bool,
}

/// Card payload, exhaustively matched by the turn engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardBody {
    Opportunity(Opportunity),
    MarketEvent(MarketEvent),
}

/// An immutable catalog entry. Cards are only ever referenced by id; the
/// deck cycles ids, never card values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(flatten)]
    pub body: CardBody,
}

impl Card {
    #[must_use]
    pub const fn kind(&self) -> CardKind {
        match self.body {
            CardBody::Opportunity(_) => CardKind::Opportunity,
            CardBody::MarketEvent(_) => CardKind::MarketEvent,
        }
    }
}

/// Errors raised by catalog lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown card id: {0}")]
    UnknownCard(String),
}

impl CatalogError {
    /// Stable code for the external API layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownCard(_) => "unknown_card",
        }
    }
}

/// Read-only registry over one card kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CardCatalog {
    pub cards: Vec<Card>,
}

impl CardCatalog {
    /// Create an empty catalog (useful for tests).
    #[must_use]
    pub const fn empty() -> Self {
        Self { cards: vec![] }
    }

    /// Load a catalog from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid card data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Create a catalog from pre-parsed cards.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Look a card up by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownCard` if no card carries the id.
    pub fn lookup(&self, id: &str) -> Result<&Card, CatalogError> {
        self.cards
            .iter()
            .find(|card| card.id == id)
            .ok_or_else(|| CatalogError::UnknownCard(id.to_string()))
    }

    /// All card ids, in catalog order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.cards.iter().map(|card| card.id.clone()).collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// The pair of catalogs one game draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Catalogs {
    pub opportunities: CardCatalog,
    pub market_events: CardCatalog,
}

impl Catalogs {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            opportunities: CardCatalog::empty(),
            market_events: CardCatalog::empty(),
        }
    }

    #[must_use]
    pub const fn catalog(&self, kind: CardKind) -> &CardCatalog {
        match kind {
            CardKind::Opportunity => &self.opportunities,
            CardKind::MarketEvent => &self.market_events,
        }
    }

    /// Look a card up across both catalogs.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownCard` if neither catalog carries the
    /// id.
    pub fn lookup(&self, id: &str) -> Result<&Card, CatalogError> {
        self.opportunities
            .lookup(id)
            .or_else(|_| self.market_events.lookup(id))
    }

    /// Built-in starter catalogs so embedders and tests work without
    /// external data files.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            opportunities: CardCatalog::from_cards(standard_opportunities()),
            market_events: CardCatalog::from_cards(standard_market_events()),
        }
    }
}

fn opportunity(
    id: &str,
    name: &str,
    cost_cents: Money,
    cash_flow_cents: Money,
    category: AssetCategory,
) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        desc: String::new(),
        body: CardBody::Opportunity(Opportunity {
            cost_cents,
            cash_flow_cents,
            category,
            lot_units: 1,
            down_payment_options: Vec::new(),
            resale_range: None,
        }),
    }
}

fn market_event(id: &str, name: &str, effect: StatementMutation, duration_turns: u32) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        desc: String::new(),
        body: CardBody::MarketEvent(MarketEvent {
            effect,
            duration_turns,
            mandatory: false,
        }),
    }
}

fn standard_opportunities() -> Vec<Card> {
    let mut duplex = opportunity(
        "opp.duplex",
        "Duplex, needs paint",
        5_000_000,
        40_000,
        AssetCategory::RealEstate,
    );
    if let CardBody::Opportunity(ref mut opp) = duplex.body {
        opp.down_payment_options = vec![DownPaymentOption {
            down_pct: 10,
            rate_pct: 10,
        }];
        opp.resale_range = Some(ResaleRange {
            min_cents: 4_500_000,
            max_cents: 6_500_000,
        });
    }

    let mut index_fund = opportunity(
        "opp.index_fund",
        "Index fund lot",
        1_000,
        10,
        AssetCategory::Stock,
    );
    if let CardBody::Opportunity(ref mut opp) = index_fund.body {
        opp.lot_units = 100;
    }

    vec![
        duplex,
        index_fund,
        opportunity(
            "opp.vending_route",
            "Vending machine route",
            350_000,
            15_000,
            AssetCategory::Business,
        ),
        opportunity(
            "opp.tax_lien",
            "Tax lien certificate",
            200_000,
            12_000,
            AssetCategory::Paper,
        ),
        opportunity(
            "opp.car_wash",
            "Self-serve car wash",
            1_200_000,
            80_000,
            AssetCategory::Business,
        ),
    ]
}

fn standard_market_events() -> Vec<Card> {
    let mut layoff = market_event("mkt.layoff", "Layoffs", StatementMutation::SalaryOutage, 2);
    if let CardBody::MarketEvent(ref mut event) = layoff.body {
        event.mandatory = true;
    }
    let mut tax_audit = market_event(
        "mkt.tax_audit",
        "Tax audit",
        StatementMutation::CashDelta {
            amount_cents: -50_000,
        },
        0,
    );
    if let CardBody::MarketEvent(ref mut event) = tax_audit.body {
        event.mandatory = true;
    }

    vec![
        layoff,
        tax_audit,
        market_event(
            "mkt.inheritance",
            "Inheritance",
            StatementMutation::DebtRelief {
                amount_cents: 500_000,
            },
            0,
        ),
        market_event(
            "mkt.boat",
            "Boat you always wanted",
            StatementMutation::Doodad {
                cost_cents: 100_000,
            },
            0,
        ),
        market_event(
            "mkt.rent_spike",
            "Rents climb city-wide",
            StatementMutation::YieldReprice {
                category: AssetCategory::RealEstate,
                delta_cents: 10_000,
            },
            0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_parses_tagged_cards_from_json() {
        let json = r#"{
            "cards": [
                {
                    "id": "opp.test",
                    "name": "Test duplex",
                    "kind": "opportunity",
                    "cost_cents": 50000,
                    "cash_flow_cents": 25000,
                    "category": "real_estate",
                    "down_payment_options": [{"down_pct": 20, "rate_pct": 10}]
                },
                {
                    "id": "mkt.test",
                    "name": "Test shock",
                    "kind": "market_event",
                    "effect": {"type": "cash_delta", "amount_cents": -5000},
                    "mandatory": true
                }
            ]
        }"#;

        let catalog = CardCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let opp = catalog.lookup("opp.test").unwrap();
        assert_eq!(opp.kind(), CardKind::Opportunity);
        match &opp.body {
            CardBody::Opportunity(o) => {
                assert_eq!(o.cost_cents, 50_000);
                assert_eq!(o.lot_units, 1);
                assert!(!o.divisible());
                assert_eq!(o.down_payment_options.len(), 1);
            }
            CardBody::MarketEvent(_) => panic!("expected opportunity"),
        }

        let event = catalog.lookup("mkt.test").unwrap();
        match &event.body {
            CardBody::MarketEvent(m) => {
                assert!(m.mandatory);
                assert_eq!(m.duration_turns, 0);
                assert_eq!(
                    m.effect,
                    StatementMutation::CashDelta {
                        amount_cents: -5_000
                    }
                );
            }
            CardBody::Opportunity(_) => panic!("expected market event"),
        }
    }

    #[test]
    fn lookup_reports_unknown_card() {
        let catalog = CardCatalog::empty();
        let err = catalog.lookup("missing").unwrap_err();
        assert_eq!(err, CatalogError::UnknownCard("missing".to_string()));
        assert_eq!(err.code(), "unknown_card");
    }

    #[test]
    fn standard_catalogs_are_well_formed() {
        let catalogs = Catalogs::standard();
        assert!(!catalogs.opportunities.is_empty());
        assert!(!catalogs.market_events.is_empty());
        for card in &catalogs.opportunities.cards {
            assert_eq!(card.kind(), CardKind::Opportunity);
        }
        for card in &catalogs.market_events.cards {
            assert_eq!(card.kind(), CardKind::MarketEvent);
        }
        assert!(
            catalogs
                .opportunities
                .cards
                .iter()
                .any(|card| matches!(
                    &card.body,
                    CardBody::Opportunity(opp) if opp.divisible()
                )),
            "standard set should include a divisible lot"
        );
    }

    #[test]
    fn card_roundtrips_through_serde() {
        let catalogs = Catalogs::standard();
        let json = serde_json::to_string(&catalogs).unwrap();
        let back: Catalogs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalogs);
    }
}
