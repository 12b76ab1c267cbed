//! Draw-without-replacement decks with deterministic reshuffle cycles.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::catalog::CardKind;

/// Errors raised by deck operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeckError {
    /// The backing catalog holds no cards at all. A configuration error,
    /// not a runtime condition.
    #[error("{0} catalog is empty; deck cannot be drawn")]
    Exhausted(CardKind),
}

impl DeckError {
    /// Stable code for the external API layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Exhausted(_) => "deck_exhausted",
        }
    }
}

/// Derive the shuffle seed for one deck cycle from the session seed, the
/// deck's domain tag, and the reshuffle count. HMAC-SHA256 keeps the two
/// decks and every cycle on independent streams.
fn derive_cycle_seed(session_seed: u64, kind: CardKind, cycle: u32) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&session_seed.to_le_bytes())
        .expect("64-bit seed is valid key");
    mac.update(kind.domain_tag());
    mac.update(&cycle.to_le_bytes());
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// A shuffled sequence of card ids owned by one session. The top of the
/// draw pile is the end of the vector; drawn cards return through the
/// discard pile and re-enter play on the next reshuffle cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    kind: CardKind,
    seed: u64,
    reshuffle_count: u32,
    draw_pile: Vec<String>,
    discard: Vec<String>,
}

impl Deck {
    /// Build a deck containing every catalog id exactly once, in a
    /// uniformly random order determined by `seed`.
    #[must_use]
    pub fn shuffle(ids: Vec<String>, seed: u64, kind: CardKind) -> Self {
        let mut draw_pile = ids;
        let mut rng = ChaCha20Rng::seed_from_u64(derive_cycle_seed(seed, kind, 0));
        draw_pile.shuffle(&mut rng);
        Self {
            kind,
            seed,
            reshuffle_count: 0,
            draw_pile,
            discard: Vec::new(),
        }
    }

    /// Remove and return the top card id. An empty draw pile is atomically
    /// refilled from the discard pile, reshuffled on a fresh derived seed,
    /// and the draw retried once.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::Exhausted` only when the catalog itself is
    /// empty (no cards in either pile).
    pub fn draw(&mut self) -> Result<String, DeckError> {
        if self.draw_pile.is_empty() {
            self.refill();
        }
        self.draw_pile.pop().ok_or(DeckError::Exhausted(self.kind))
    }

    fn refill(&mut self) {
        if self.discard.is_empty() {
            return;
        }
        self.reshuffle_count = self.reshuffle_count.saturating_add(1);
        let mut pile = std::mem::take(&mut self.discard);
        let mut rng = ChaCha20Rng::seed_from_u64(derive_cycle_seed(
            self.seed,
            self.kind,
            self.reshuffle_count,
        ));
        pile.shuffle(&mut rng);
        self.draw_pile = pile;
    }

    /// Return a drawn card to the discard pile.
    pub fn discard(&mut self, id: String) {
        self.discard.push(id);
    }

    #[must_use]
    pub const fn kind(&self) -> CardKind {
        self.kind
    }

    /// Cards left in the live draw pile.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.draw_pile.len()
    }

    /// Cards waiting in the discard pile.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discard.len()
    }

    /// Completed reshuffle cycles.
    #[must_use]
    pub const fn reshuffle_count(&self) -> u32 {
        self.reshuffle_count
    }
}
