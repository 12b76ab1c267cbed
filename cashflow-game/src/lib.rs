//! Cashflow Game Engine
//!
//! Platform-agnostic core for the Cashflow turn-based economic simulation.
//! This crate provides the card catalogs, decks, financial statement, turn
//! state machine and outcome recording without UI, transport or storage
//! dependencies; identity, persistence and randomness seeding are supplied
//! by the embedding layer.

pub mod catalog;
pub mod deck;
pub mod engine;
pub mod money;
pub mod outcome;
pub mod profession;
pub mod session;
pub mod statement;

// Re-export commonly used types
pub use catalog::{
    AssetCategory, Card, CardBody, CardCatalog, CardKind, CatalogError, Catalogs,
    DownPaymentOption, MarketEvent, Opportunity, ResaleRange, StatementMutation,
};
pub use deck::{Deck, DeckError};
pub use engine::{
    ActiveEffect, ConfigError, Decision, DeckPair, EngineConfig, EngineError, EventSet,
    LoanPolicy, SessionStatus, TurnEngine, TurnEvent, TurnPhase,
};
pub use money::{Money, pct_of};
pub use outcome::{OutcomeRecorder, OutcomeSummary};
pub use profession::{Profession, ProfessionsList, StartingAsset, StartingLiability};
pub use session::{Action, ActionResult, GameSession, PlayerFacingState};
pub use statement::{
    Asset, AssetId, FinancialStatement, Liability, LiabilityDraft, LiabilityId, StatementError,
};

/// Trait for abstracting data loading operations
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the card catalogs from the platform-specific source
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog data cannot be loaded.
    fn load_catalogs(&self) -> Result<Catalogs, Self::Error>;

    /// Load the profession templates
    ///
    /// # Errors
    ///
    /// Returns an error if the profession data cannot be loaded.
    fn load_professions(&self) -> Result<ProfessionsList, Self::Error>;

    /// Load the engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error>;
}

/// Trait for abstracting save/load of session snapshots
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be saved.
    fn save_session(&self, session_id: &str, session: &GameSession) -> Result<(), Self::Error>;

    /// Load a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded.
    fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, Self::Error>;

    /// Delete a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_session(&self, session_id: &str) -> Result<(), Self::Error>;
}

/// Main engine facade for managing game sessions
pub struct GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    data_loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    /// Create a new engine with the provided data loader and storage
    pub const fn new(data_loader: L, storage: S) -> Self {
        Self {
            data_loader,
            storage,
        }
    }

    /// Start a new session for a profession with the supplied seed. The
    /// player id is opaque; the core does not validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if catalogs or configuration cannot be loaded.
    pub fn start_session(
        &self,
        profession: &Profession,
        player_id: &str,
        seed: u64,
    ) -> Result<GameSession, L::Error> {
        let catalogs = self.data_loader.load_catalogs()?;
        let cfg = self.data_loader.load_engine_config()?;
        Ok(GameSession::start(
            profession, catalogs, cfg, player_id, seed,
        ))
    }

    /// Persist a session snapshot. Fire-and-forget from the session's
    /// perspective; a retried action after an unconfirmed save is handled
    /// by the session's sequence numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be saved.
    pub fn save_session(&self, session_id: &str, session: &GameSession) -> Result<(), S::Error> {
        self.storage.save_session(session_id, session)
    }

    /// Load a session snapshot and re-attach fresh catalogs
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded or rehydrated.
    pub fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        if let Some(session) = self.storage.load_session(session_id).map_err(Into::into)? {
            let catalogs = self.data_loader.load_catalogs().map_err(Into::into)?;
            Ok(Some(session.rehydrate(catalogs)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DataLoader for FixtureLoader {
        type Error = Infallible;

        fn load_catalogs(&self) -> Result<Catalogs, Self::Error> {
            Ok(Catalogs::standard())
        }

        fn load_professions(&self) -> Result<ProfessionsList, Self::Error> {
            Ok(ProfessionsList::standard())
        }

        fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
            Ok(EngineConfig::default())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, String>>>,
    }

    impl GameStorage for MemoryStorage {
        type Error = serde_json::Error;

        fn save_session(
            &self,
            session_id: &str,
            session: &GameSession,
        ) -> Result<(), Self::Error> {
            let serialized = serde_json::to_string(session)?;
            self.saves
                .borrow_mut()
                .insert(session_id.to_string(), serialized);
            Ok(())
        }

        fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, Self::Error> {
            self.saves
                .borrow()
                .get(session_id)
                .map(|serialized| serde_json::from_str(serialized))
                .transpose()
        }

        fn delete_session(&self, session_id: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(session_id);
            Ok(())
        }
    }

    #[test]
    fn engine_creates_and_roundtrips_sessions() {
        let engine = GameEngine::new(FixtureLoader, MemoryStorage::default());
        let professions = FixtureLoader.load_professions().unwrap();
        let teacher = professions.get_by_id("teacher").unwrap();

        let mut session = engine.start_session(teacher, "player-9", 0xABCD).unwrap();
        session
            .submit_action(
                1,
                &Action::AdvanceTurn {
                    draw: CardKind::Opportunity,
                },
            )
            .unwrap();
        engine.save_session("slot-one", &session).unwrap();

        let loaded = engine
            .load_session("slot-one")
            .unwrap()
            .expect("save exists");
        assert_eq!(loaded.current_turn(), 1);
        assert_eq!(loaded.profession_id, "teacher");
        assert_eq!(loaded.seed, 0xABCD);
        assert!(engine.load_session("missing-slot").unwrap().is_none());
    }

    #[test]
    fn resumed_session_continues_the_same_run() {
        let engine = GameEngine::new(FixtureLoader, MemoryStorage::default());
        let professions = FixtureLoader.load_professions().unwrap();
        let teacher = professions.get_by_id("teacher").unwrap();

        let mut live = engine.start_session(teacher, "player-9", 99).unwrap();
        live.submit_action(
            1,
            &Action::AdvanceTurn {
                draw: CardKind::MarketEvent,
            },
        )
        .unwrap();
        engine.save_session("slot", &live).unwrap();

        let mut resumed = engine.load_session("slot").unwrap().unwrap();
        let next = Action::Resolve {
            decision: Decision::Decline,
        };
        let a = live.submit_action(2, &next);
        let b = resumed.submit_action(2, &next);
        assert_eq!(a, b, "resumption is exact");
    }
}
