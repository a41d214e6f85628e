use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids::RoomId;
use crate::money::Chips;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatStatus {
    Waiting,
    Active,
    Folded,
    AllIn,
    SittingOut,
}

/// Streets in play order. Advancing a betting round moves to the successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Preflop => Some(Self::Flop),
            Self::Flop => Some(Self::Turn),
            Self::Turn => Some(Self::River),
            Self::River => Some(Self::Showdown),
            Self::Showdown => None,
        }
    }

    /// How many community cards are on the board once this street is reached.
    #[must_use]
    pub fn community_card_count(self) -> usize {
        match self {
            Self::Preflop => 0,
            Self::Flop => 3,
            Self::Turn => 4,
            Self::River | Self::Showdown => 5,
        }
    }
}

/// Immutable room parameters, fixed at room creation by the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_players: u8,
}

impl RoomConfig {
    pub const MIN_SEATS: u8 = 2;
    pub const MAX_SEATS: u8 = 9;

    /// Validates the lobby's room-creation rules: `big_blind = 2 * small_blind`,
    /// `min_buy_in >= 10 * big_blind`, `max_buy_in >= min_buy_in`,
    /// `max_players` in `[2, 9]`.
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        small_blind: Chips,
        min_buy_in: Chips,
        max_buy_in: Chips,
        max_players: u8,
    ) -> Result<Self, DomainError> {
        if small_blind.is_zero() {
            return Err(DomainError::InvalidRoomConfig(
                "small blind must be positive".to_string(),
            ));
        }
        let big_blind = Chips(small_blind.as_u64() * 2);
        if min_buy_in.as_u64() < big_blind.as_u64() * 10 {
            return Err(DomainError::InvalidRoomConfig(format!(
                "min buy-in must be at least {}",
                big_blind.as_u64() * 10
            )));
        }
        if max_buy_in < min_buy_in {
            return Err(DomainError::InvalidRoomConfig(
                "max buy-in below min buy-in".to_string(),
            ));
        }
        if !(Self::MIN_SEATS..=Self::MAX_SEATS).contains(&max_players) {
            return Err(DomainError::InvalidRoomConfig(format!(
                "max players must be between {} and {}",
                Self::MIN_SEATS,
                Self::MAX_SEATS
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            small_blind,
            big_blind,
            min_buy_in,
            max_buy_in,
            max_players,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_derives_big_blind_and_enforces_bounds() {
        let config = RoomConfig::new(
            RoomId::new(),
            "low stakes",
            Chips(10),
            Chips(200),
            Chips(2000),
            6,
        )
        .expect("valid config");
        assert_eq!(config.big_blind, Chips(20));

        assert!(RoomConfig::new(
            RoomId::new(),
            "shallow",
            Chips(10),
            Chips(100),
            Chips(2000),
            6
        )
        .is_err());
        assert!(
            RoomConfig::new(RoomId::new(), "one seat", Chips(10), Chips(200), Chips(2000), 1)
                .is_err()
        );
        assert!(
            RoomConfig::new(RoomId::new(), "crowded", Chips(10), Chips(200), Chips(2000), 10)
                .is_err()
        );
    }

    #[test]
    fn phase_successor_matches_street_order() {
        assert_eq!(Phase::Preflop.next(), Some(Phase::Flop));
        assert_eq!(Phase::River.next(), Some(Phase::Showdown));
        assert_eq!(Phase::Showdown.next(), None);
        assert_eq!(Phase::Flop.community_card_count(), 3);
        assert_eq!(Phase::Turn.community_card_count(), 4);
        assert_eq!(Phase::River.community_card_count(), 5);
    }

    #[test]
    fn seat_status_uses_kebab_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&SeatStatus::AllIn).expect("serialize"),
            r#""all-in""#
        );
        assert_eq!(
            serde_json::to_string(&SeatStatus::SittingOut).expect("serialize"),
            r#""sitting-out""#
        );
    }
}
