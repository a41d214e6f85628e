//! Deterministic hand replay from a persisted `hand_data` payload. Feeding
//! the recorded deal order and action log back through the live betting
//! machine must reproduce the recorded winners and final stacks; the audit
//! tests lean on this.

use thiserror::Error;

use poker_domain::{Chips, Deck, DomainError, RoomConfig, RoomId, UserId};

use crate::hand::{HandData, HandLogEntry, HandWinner};
use crate::table::{ActionError, GameRoom, StartError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("malformed hand data: {0}")]
    BadData(#[from] serde_json::Error),
    #[error(transparent)]
    Deck(#[from] DomainError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("recorded action rejected on replay: {0}")]
    Action(#[from] ActionError),
    #[error("log ended before the hand resolved")]
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub winners: Vec<HandWinner>,
    pub stacks: Vec<(UserId, Chips)>,
}

pub fn replay_hand(hand_data: &serde_json::Value) -> Result<ReplayOutcome, ReplayError> {
    let data: HandData = serde_json::from_value(hand_data.clone())?;

    let deepest = data
        .seats
        .iter()
        .map(|seat| seat.stack.as_u64())
        .max()
        .unwrap_or(0);
    let min_buy_in = Chips(data.big_blind.as_u64() * 10);
    let config = RoomConfig {
        id: RoomId::new(),
        name: "replay".to_string(),
        small_blind: data.small_blind,
        big_blind: data.big_blind,
        min_buy_in,
        max_buy_in: Chips(deepest.max(min_buy_in.as_u64())),
        max_players: RoomConfig::MAX_SEATS,
    };

    let mut room = GameRoom::new(config);
    for seat in &data.seats {
        room.seat_offline(seat.user_id, &seat.username, seat.seat_number, seat.stack);
    }
    let dealer_pos = data
        .seats
        .iter()
        .position(|seat| seat.seat_number == data.dealer_seat)
        .unwrap_or(0);
    let hint = (dealer_pos > 0).then(|| data.seats[dealer_pos - 1].seat_number);
    room.force_last_dealer(hint);

    // Reconstruct the deal order: two hole-card rounds in seat order, then
    // the board as recorded.
    let mut cards = Vec::with_capacity(data.seats.len() * 2 + data.community_cards.len());
    for round in 0..2 {
        for seat in &data.seats {
            cards.push(seat.hole_cards[round]);
        }
    }
    cards.extend(data.community_cards.iter().copied());
    let deck = Deck::stacked(cards)?;

    let mut out = room.start_hand(deck)?;
    let mut settlement = out.settlement.take();
    for entry in &data.log {
        if settlement.is_some() {
            break;
        }
        let mut step = match entry {
            HandLogEntry::Action {
                user_id,
                action,
                amount,
                ..
            } => {
                let amount =
                    (!amount.is_zero() || matches!(action, poker_domain::ActionKind::Raise))
                        .then_some(*amount);
                room.apply_action(*user_id, *action, amount)?
            }
            HandLogEntry::SatOut { user_id, .. } => {
                room.leave(*user_id).ok_or(ReplayError::Incomplete)?
            }
        };
        if let Some(found) = step.settlement.take() {
            settlement = Some(found);
        }
    }

    let settlement = settlement.ok_or(ReplayError::Incomplete)?;
    Ok(ReplayOutcome {
        winners: settlement
            .winners
            .iter()
            .map(|(user_id, amount)| HandWinner {
                user_id: *user_id,
                amount: *amount,
            })
            .collect(),
        stacks: settlement.stacks,
    })
}
