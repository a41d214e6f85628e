use thiserror::Error;

use crate::card::Card;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("deck exhausted")]
    DeckExhausted,
    #[error("duplicate card {0} in deck")]
    DuplicateCard(Card),
    #[error("invalid room config: {0}")]
    InvalidRoomConfig(String),
}
