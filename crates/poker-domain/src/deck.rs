use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::card::{Card, Rank, Suit};
use crate::errors::DomainError;

/// An ordered run of cards for one hand. Dealing consumes from the front;
/// no card is handed out twice.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    next: usize,
}

impl Deck {
    /// Fresh 52-card deck, Fisher-Yates shuffled from the OS CSPRNG.
    #[must_use]
    pub fn shuffled() -> Self {
        let mut cards: Vec<Card> = Suit::ALL
            .iter()
            .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card::new(suit, rank)))
            .collect();
        cards.shuffle(&mut OsRng);
        Self { cards, next: 0 }
    }

    /// Deck with a fixed deal order. Rejects duplicates; used by tests and
    /// hand replay.
    pub fn stacked(cards: Vec<Card>) -> Result<Self, DomainError> {
        let mut seen = std::collections::HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(*card) {
                return Err(DomainError::DuplicateCard(*card));
            }
        }
        Ok(Self { cards, next: 0 })
    }

    pub fn draw(&mut self) -> Result<Card, DomainError> {
        let card = self
            .cards
            .get(self.next)
            .copied()
            .ok_or(DomainError::DeckExhausted)?;
        self.next += 1;
        Ok(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len() - self.next
    }
}
