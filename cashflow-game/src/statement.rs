//! The player's financial statement: income statement plus balance sheet.
//!
//! Derived totals (`passive_income_cents`, `total_expenses_cents`) are
//! always recomputed from the asset and liability lists, never hand-edited,
//! so incremental updates cannot drift.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{AssetCategory, ResaleRange};
use crate::money::{Money, pct_of};
use crate::profession::Profession;

pub type AssetId = u32;
pub type LiabilityId = u32;

/// Errors raised by statement operations. Expected game conditions, not
/// crashes; every operation validates before mutating.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("insufficient funds: need {needed_cents} cents, have {available_cents}")]
    InsufficientFunds {
        needed_cents: Money,
        available_cents: Money,
    },
    #[error("asset {0} not found")]
    AssetNotFound(AssetId),
}

impl StatementError {
    /// Stable code for the external API layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AssetNotFound(_) => "asset_not_found",
        }
    }
}

/// An owned opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub category: AssetCategory,
    pub acquisition_cost_cents: Money,
    /// Per-turn cash flow contribution.
    pub cash_flow_cents: Money,
    #[serde(default)]
    pub resale_range: Option<ResaleRange>,
    #[serde(default = "default_units")]
    pub units: u32,
}

fn default_units() -> u32 {
    1
}

/// A loan or mortgage. `payment_cents` is derived from principal and rate
/// whenever the principal changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    pub id: LiabilityId,
    pub name: String,
    pub principal_cents: Money,
    pub rate_pct: u32,
    pub payment_cents: Money,
    #[serde(default)]
    pub attached_asset: Option<AssetId>,
}

impl Liability {
    fn recompute_payment(&mut self) {
        self.payment_cents = pct_of(self.principal_cents, self.rate_pct);
    }
}

/// Terms of a liability created alongside an acquisition or bailout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiabilityDraft {
    pub name: String,
    pub principal_cents: Money,
    pub rate_pct: u32,
}

/// Mutable per-turn financial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub salary_cents: Money,
    /// Fixed baseline living expenses, before liability service.
    pub baseline_expenses_cents: Money,
    /// Derived: sum of asset contributions. Recomputed, never edited.
    pub passive_income_cents: Money,
    /// Derived: baseline plus liability payments. Recomputed, never edited.
    pub total_expenses_cents: Money,
    pub cash_cents: Money,
    pub assets: Vec<Asset>,
    pub liabilities: Vec<Liability>,
    /// Cleared while a salary outage effect is active; gates collection,
    /// not the stored salary value.
    #[serde(default = "default_salary_active")]
    pub salary_active: bool,
    #[serde(default)]
    next_asset_id: AssetId,
    #[serde(default)]
    next_liability_id: LiabilityId,
}

fn default_salary_active() -> bool {
    true
}

impl Default for FinancialStatement {
    fn default() -> Self {
        Self {
            salary_cents: 0,
            baseline_expenses_cents: 0,
            passive_income_cents: 0,
            total_expenses_cents: 0,
            cash_cents: 0,
            assets: Vec::new(),
            liabilities: Vec::new(),
            salary_active: true,
            next_asset_id: 0,
            next_liability_id: 0,
        }
    }
}

impl FinancialStatement {
    /// Seed a statement from a profession template.
    #[must_use]
    pub fn from_profession(profession: &Profession) -> Self {
        let mut stmt = Self {
            salary_cents: profession.salary_cents,
            baseline_expenses_cents: profession.expenses_cents,
            cash_cents: profession.cash_cents,
            ..Self::default()
        };
        for start in &profession.assets {
            stmt.push_asset(
                start.name.clone(),
                start.category,
                start.cost_cents,
                start.cash_flow_cents,
                None,
                1,
            );
        }
        for start in &profession.liabilities {
            stmt.push_liability(
                LiabilityDraft {
                    name: start.name.clone(),
                    principal_cents: start.principal_cents,
                    rate_pct: start.rate_pct,
                },
                None,
            );
        }
        stmt.recompute();
        stmt
    }

    /// Recompute both derived totals from the lists.
    pub fn recompute(&mut self) {
        self.passive_income_cents = self
            .assets
            .iter()
            .map(|asset| asset.cash_flow_cents)
            .sum();
        let service: Money = self
            .liabilities
            .iter()
            .map(|liability| liability.payment_cents)
            .sum();
        self.total_expenses_cents = self.baseline_expenses_cents + service;
    }

    /// `salary + passiveIncome - totalExpenses`, recomputed on demand.
    #[must_use]
    pub const fn net_cash_flow(&self) -> Money {
        self.salary_cents + self.passive_income_cents - self.total_expenses_cents
    }

    /// Per-turn income actually collectible right now (honors an active
    /// salary outage).
    #[must_use]
    pub const fn collectible_income(&self) -> Money {
        let salary = if self.salary_active {
            self.salary_cents
        } else {
            0
        };
        salary + self.passive_income_cents
    }

    /// Unconditional credit or debit; may drive cash negative.
    pub fn apply_cash_delta(&mut self, amount_cents: Money) {
        self.cash_cents += amount_cents;
    }

    fn push_asset(
        &mut self,
        name: String,
        category: AssetCategory,
        acquisition_cost_cents: Money,
        cash_flow_cents: Money,
        resale_range: Option<ResaleRange>,
        units: u32,
    ) -> AssetId {
        let id = self.next_asset_id;
        self.next_asset_id += 1;
        self.assets.push(Asset {
            id,
            name,
            category,
            acquisition_cost_cents,
            cash_flow_cents,
            resale_range,
            units,
        });
        id
    }

    fn push_liability(
        &mut self,
        draft: LiabilityDraft,
        attached_asset: Option<AssetId>,
    ) -> LiabilityId {
        let id = self.next_liability_id;
        self.next_liability_id += 1;
        let mut liability = Liability {
            id,
            name: draft.name,
            principal_cents: draft.principal_cents,
            rate_pct: draft.rate_pct,
            payment_cents: 0,
            attached_asset,
        };
        liability.recompute_payment();
        self.liabilities.push(liability);
        id
    }

    /// Acquire an asset, paying `cash_paid_cents` down and financing the
    /// remainder through `liability` when present. Validates funds before
    /// touching any state.
    ///
    /// # Errors
    ///
    /// Returns `StatementError::InsufficientFunds` when the down payment
    /// exceeds cash on hand.
    #[allow(clippy::too_many_arguments)]
    pub fn acquire_asset(
        &mut self,
        name: String,
        category: AssetCategory,
        acquisition_cost_cents: Money,
        cash_flow_cents: Money,
        resale_range: Option<ResaleRange>,
        units: u32,
        cash_paid_cents: Money,
        liability: Option<LiabilityDraft>,
    ) -> Result<AssetId, StatementError> {
        if cash_paid_cents > self.cash_cents {
            return Err(StatementError::InsufficientFunds {
                needed_cents: cash_paid_cents,
                available_cents: self.cash_cents,
            });
        }
        self.cash_cents -= cash_paid_cents;
        let asset_id = self.push_asset(
            name,
            category,
            acquisition_cost_cents,
            cash_flow_cents,
            resale_range,
            units,
        );
        if let Some(draft) = liability {
            self.push_liability(draft, Some(asset_id));
        }
        self.recompute();
        Ok(asset_id)
    }

    /// Sell an asset for `sale_price_cents`. An attached liability
    /// survives the sale (leveraged-asset risk) unless `retire_liability`
    /// is set, in which case its remaining principal is also paid out of
    /// cash.
    ///
    /// # Errors
    ///
    /// Returns `StatementError::AssetNotFound` when the id is not owned.
    pub fn sell_asset(
        &mut self,
        asset_id: AssetId,
        sale_price_cents: Money,
        retire_liability: bool,
    ) -> Result<Money, StatementError> {
        let idx = self
            .assets
            .iter()
            .position(|asset| asset.id == asset_id)
            .ok_or(StatementError::AssetNotFound(asset_id))?;
        self.assets.remove(idx);
        self.cash_cents += sale_price_cents;

        let mut retired_cents = 0;
        if retire_liability {
            if let Some(pos) = self
                .liabilities
                .iter()
                .position(|liability| liability.attached_asset == Some(asset_id))
            {
                let liability = self.liabilities.remove(pos);
                retired_cents = liability.principal_cents;
                self.cash_cents -= retired_cents;
            }
        }
        self.recompute();
        Ok(sale_price_cents - retired_cents)
    }

    /// Take on a standalone loan: credits cash by the principal.
    pub fn take_loan(&mut self, draft: LiabilityDraft) -> LiabilityId {
        self.cash_cents += draft.principal_cents;
        let id = self.push_liability(draft, None);
        self.recompute();
        id
    }

    /// Permanently shift the per-turn cash flow of every owned asset in
    /// the category.
    pub fn reprice_category(&mut self, category: AssetCategory, delta_cents: Money) -> u32 {
        let mut touched = 0;
        for asset in &mut self.assets {
            if asset.category == category {
                asset.cash_flow_cents += delta_cents;
                touched += 1;
            }
        }
        self.recompute();
        touched
    }

    /// Apply a debt-relief windfall to outstanding liabilities, oldest
    /// first. Returns the amount actually consumed. Fully repaid
    /// liabilities are removed; partially repaid ones get their payment
    /// rederived from the reduced principal.
    pub fn apply_debt_relief(&mut self, amount_cents: Money) -> Money {
        let mut remaining = amount_cents.max(0);
        let mut consumed = 0;
        let mut idx = 0;
        while idx < self.liabilities.len() && remaining > 0 {
            let principal = self.liabilities[idx].principal_cents;
            if principal <= remaining {
                remaining -= principal;
                consumed += principal;
                self.liabilities.remove(idx);
            } else {
                self.liabilities[idx].principal_cents -= remaining;
                self.liabilities[idx].recompute_payment();
                consumed += remaining;
                remaining = 0;
            }
        }
        self.recompute();
        consumed
    }

    /// Total outstanding principal across all liabilities.
    #[must_use]
    pub fn total_principal(&self) -> Money {
        self.liabilities
            .iter()
            .map(|liability| liability.principal_cents)
            .sum()
    }

    #[must_use]
    pub fn asset(&self, asset_id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.id == asset_id)
    }
}
