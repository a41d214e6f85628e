use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use poker_domain::{ActionKind, Card, Chips, Deck, HandId, Phase, UserId};

/// One entry in the per-hand log. Together with the starting seats this is
/// enough to replay the hand deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandLogEntry {
    #[serde(rename_all = "camelCase")]
    Action {
        user_id: UserId,
        action: ActionKind,
        amount: Chips,
        phase: Phase,
    },
    /// Player removed mid-hand (timeout, disconnect window, voluntary leave);
    /// counts as a fold.
    #[serde(rename_all = "camelCase")]
    SatOut { user_id: UserId, phase: Phase },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandSeat {
    pub user_id: UserId,
    pub username: String,
    pub seat_number: u8,
    pub stack: Chips,
    pub hole_cards: [Card; 2],
}

/// The opaque `hand_data` payload persisted with each game-history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandData {
    pub hand_id: HandId,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub dealer_seat: u8,
    pub seats: Vec<HandSeat>,
    pub community_cards: Vec<Card>,
    pub log: Vec<HandLogEntry>,
    pub pot: Chips,
    pub winners: Vec<HandWinner>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandWinner {
    pub user_id: UserId,
    pub amount: Chips,
}

/// The live hand on a room; absent between hands.
#[derive(Debug)]
pub struct LiveHand {
    pub id: HandId,
    pub phase: Phase,
    pub deck: Deck,
    pub community: Vec<Card>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub dealer_seat: u8,
    pub small_blind_seat: u8,
    pub big_blind_seat: u8,
    pub current_actor: Option<UserId>,
    pub acted_this_round: HashSet<UserId>,
    pub last_aggressor: Option<UserId>,
    pub log: Vec<HandLogEntry>,
    pub starting_seats: Vec<HandSeat>,
}

impl LiveHand {
    pub fn log_action(&mut self, user_id: UserId, action: ActionKind, amount: Chips) {
        self.log.push(HandLogEntry::Action {
            user_id,
            action,
            amount,
            phase: self.phase,
        });
    }

    pub fn log_sat_out(&mut self, user_id: UserId) {
        self.log.push(HandLogEntry::SatOut {
            user_id,
            phase: self.phase,
        });
    }
}
