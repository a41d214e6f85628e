pub mod action;
pub mod card;
pub mod deck;
pub mod errors;
pub mod ids;
pub mod money;
pub mod room;
pub mod wire;

pub use action::ActionKind;
pub use card::{Card, Rank, Suit};
pub use deck::Deck;
pub use errors::DomainError;
pub use ids::{HandId, MessageId, RoomId, SessionId, UserId};
pub use money::{Chips, MoneyError};
pub use room::{Phase, RoomConfig, RoomStatus, SeatStatus};
pub use wire::{
    ClientFrame, GameStateFrame, HandPublicState, HandResultFrame, PlayerLeftReason, PublicPlayer,
    SatOutReason, ServerFrame, WinnerEntry, WinnerHand,
};
