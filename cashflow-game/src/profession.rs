//! Profession start templates: the immutable financial position a player
//! selects at game start.

use serde::{Deserialize, Serialize};

use crate::catalog::AssetCategory;
use crate::money::Money;

/// An asset a profession starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingAsset {
    pub name: String,
    pub category: AssetCategory,
    #[serde(default)]
    pub cost_cents: Money,
    #[serde(default)]
    pub cash_flow_cents: Money,
}

/// A liability a profession starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingLiability {
    pub name: String,
    pub principal_cents: Money,
    #[serde(default)]
    pub rate_pct: u32,
}

/// Immutable template selected at game start. Read-only after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profession {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub salary_cents: Money,
    pub expenses_cents: Money,
    pub cash_cents: Money,
    #[serde(default)]
    pub assets: Vec<StartingAsset>,
    #[serde(default)]
    pub liabilities: Vec<StartingLiability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProfessionNoId {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub salary_cents: Money,
    pub expenses_cents: Money,
    pub cash_cents: Money,
    #[serde(default)]
    pub assets: Vec<StartingAsset>,
    #[serde(default)]
    pub liabilities: Vec<StartingLiability>,
}

impl Profession {
    fn with_id(id: String, p: ProfessionNoId) -> Self {
        Self {
            id,
            name: p.name,
            desc: p.desc,
            salary_cents: p.salary_cents,
            expenses_cents: p.expenses_cents,
            cash_cents: p.cash_cents,
            assets: p.assets,
            liabilities: p.liabilities,
        }
    }
}

/// Keyed list of professions, ordered by id for stable presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfessionsList(pub Vec<Profession>);

impl ProfessionsList {
    #[must_use]
    pub const fn empty() -> Self {
        Self(vec![])
    }

    /// Load professions from a `{id: profession}` JSON map.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid
    /// profession data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let map: std::collections::HashMap<String, ProfessionNoId> = serde_json::from_str(json)?;
        let mut v: Vec<Profession> = map
            .into_iter()
            .map(|(id, p)| Profession::with_id(id, p))
            .collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self(v))
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&Profession> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Profession> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Built-in starter professions so embedders and tests work without
    /// external data files.
    #[must_use]
    pub fn standard() -> Self {
        Self(vec![
            Profession {
                id: "janitor".to_string(),
                name: "Janitor".to_string(),
                desc: "Low salary, low expenses, quick to escape.".to_string(),
                salary_cents: 160_000,
                expenses_cents: 150_000,
                cash_cents: 60_000,
                assets: Vec::new(),
                liabilities: Vec::new(),
            },
            Profession {
                id: "teacher".to_string(),
                name: "Teacher".to_string(),
                desc: "Steady salary, modest expenses.".to_string(),
                salary_cents: 300_000,
                expenses_cents: 280_000,
                cash_cents: 100_000,
                assets: Vec::new(),
                liabilities: Vec::new(),
            },
            Profession {
                id: "doctor".to_string(),
                name: "Doctor".to_string(),
                desc: "High salary, heavy obligations.".to_string(),
                salary_cents: 1_350_000,
                expenses_cents: 950_000,
                cash_cents: 400_000,
                assets: Vec::new(),
                liabilities: vec![StartingLiability {
                    name: "School loans".to_string(),
                    principal_cents: 7_800_000,
                    rate_pct: 3,
                }],
            },
        ])
    }
}

impl<'a> IntoIterator for &'a ProfessionsList {
    type Item = &'a Profession;
    type IntoIter = std::slice::Iter<'a, Profession>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profession_json_parsing() {
        let json = r#"{
            "teacher": {
                "name": "Teacher",
                "desc": "A test teacher profession",
                "salary_cents": 300000,
                "expenses_cents": 280000,
                "cash_cents": 100000
            }
        }"#;

        let professions = ProfessionsList::from_json(json).unwrap();
        assert_eq!(professions.len(), 1);

        let teacher = professions.get_by_id("teacher").unwrap();
        assert_eq!(teacher.name, "Teacher");
        assert_eq!(teacher.salary_cents, 300_000);
        assert!(teacher.assets.is_empty());
        assert!(teacher.liabilities.is_empty());
    }

    #[test]
    fn profession_list_orders_by_id() {
        let json = r#"{
            "pilot": {
                "name": "Pilot",
                "salary_cents": 950000,
                "expenses_cents": 800000,
                "cash_cents": 40000
            },
            "engineer": {
                "name": "Engineer",
                "salary_cents": 490000,
                "expenses_cents": 390000,
                "cash_cents": 40000
            }
        }"#;

        let professions = ProfessionsList::from_json(json).unwrap();
        let ids: Vec<_> = professions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["engineer", "pilot"]);
    }

    #[test]
    fn profession_list_empty_helpers_are_consistent() {
        let empty = ProfessionsList::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert!(empty.get_by_id("teacher").is_none());
    }

    #[test]
    fn standard_list_carries_the_teacher_template() {
        let professions = ProfessionsList::standard();
        let teacher = professions.get_by_id("teacher").unwrap();
        assert_eq!(teacher.salary_cents, 300_000);
        assert_eq!(teacher.expenses_cents, 280_000);
        assert_eq!(teacher.cash_cents, 100_000);
    }
}
