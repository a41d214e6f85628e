//! The `{type, payload}` frames exchanged with clients over the real-time
//! transport. Inbound and outbound messages are tagged unions; payload
//! fields keep the protocol's camelCase spellings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::card::Card;
use crate::ids::{HandId, MessageId, RoomId, UserId};
use crate::money::Chips;
use crate::room::{Phase, SeatStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth {
        token: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {},
    PlayerAction {
        action: ActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<Chips>,
    },
    #[serde(rename_all = "camelCase")]
    Spectate {
        room_id: RoomId,
    },
    ChatMessage {
        message: String,
    },
}

impl ClientFrame {
    /// Every inbound `type` string the gateway understands, used to tell an
    /// unknown type apart from a malformed payload.
    pub const TYPES: [&'static str; 6] = [
        "auth",
        "join_room",
        "leave_room",
        "player_action",
        "spectate",
        "chat_message",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub user_id: UserId,
    pub username: String,
    pub seat_number: u8,
    pub stack: Chips,
    pub current_bet: Chips,
    pub status: SeatStatus,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub connected: bool,
}

/// Hand state visible to everyone at the table, spectators included.
/// Hole cards never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandPublicState {
    pub hand_id: HandId,
    pub phase: Phase,
    pub community_cards: Vec<Card>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub current_actor: Option<UserId>,
    pub players: Vec<PublicPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateFrame {
    #[serde(flatten)]
    pub public: HandPublicState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub your_cards: Option<[Card; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerHand {
    pub rank: String,
    pub description: String,
    pub cards: [Card; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEntry {
    pub user_id: UserId,
    pub username: String,
    pub amount: Chips,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<WinnerHand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandResultFrame {
    pub winners: Vec<WinnerEntry>,
    pub pot: Chips,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revealed_hands: Option<HashMap<UserId, [Card; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_cards: Option<Vec<Card>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatOutReason {
    Timeout,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerLeftReason {
    Busted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    AuthSuccess {
        user_id: UserId,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinedRoom {
        room_id: RoomId,
        seat_number: u8,
        stack: Chips,
    },
    LeftRoom {},
    #[serde(rename_all = "camelCase")]
    Spectating {
        room_id: RoomId,
    },
    NewRound(HandPublicState),
    GameState(GameStateFrame),
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        user_id: UserId,
        username: String,
        seat_number: u8,
        stack: Chips,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<PlayerLeftReason>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerSatOut {
        user_id: UserId,
        username: String,
        reason: SatOutReason,
        chips_returned: Chips,
    },
    #[serde(rename_all = "camelCase")]
    ActionResult {
        user_id: UserId,
        action: ActionKind,
        amount: Chips,
        stack: Chips,
    },
    TimerUpdate {
        #[serde(rename = "userId")]
        user_id: UserId,
        remaining_ms: u64,
        #[serde(
            rename = "timedOut",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        timed_out: Option<bool>,
    },
    HandResult(HandResultFrame),
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        id: MessageId,
        user_id: UserId,
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerFrame {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frames_parse_from_type_payload_objects() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"auth","payload":{"token":"abc"}}"#).expect("auth");
        assert_eq!(
            frame,
            ClientFrame::Auth {
                token: "abc".to_string()
            }
        );

        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"player_action","payload":{"action":"raise","amount":40}}"#,
        )
        .expect("action");
        assert_eq!(
            frame,
            ClientFrame::PlayerAction {
                action: ActionKind::Raise,
                amount: Some(Chips(40)),
            }
        );

        // leave_room carries an empty payload object.
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"leave_room","payload":{}}"#).expect("leave");
        assert_eq!(frame, ClientFrame::LeaveRoom {});

        let json = serde_json::to_value(ServerFrame::LeftRoom {}).expect("serialize");
        assert_eq!(json["type"], "left_room");
        assert!(json["payload"].as_object().is_some_and(|m| m.is_empty()));
    }

    #[test]
    fn outbound_frames_keep_protocol_field_spellings() {
        let user_id = UserId::new();
        let json = serde_json::to_value(ServerFrame::TimerUpdate {
            user_id,
            remaining_ms: 12_000,
            timed_out: None,
        })
        .expect("serialize");
        assert_eq!(json["type"], "timer_update");
        assert!(json["payload"]["userId"].is_string());
        assert_eq!(json["payload"]["remaining_ms"], 12_000);
        assert!(json["payload"].get("timedOut").is_none());

        let json = serde_json::to_value(ServerFrame::PlayerSatOut {
            user_id,
            username: "alice".to_string(),
            reason: SatOutReason::Timeout,
            chips_returned: Chips(990),
        })
        .expect("serialize");
        assert_eq!(json["type"], "player_sat_out");
        assert_eq!(json["payload"]["reason"], "timeout");
        assert_eq!(json["payload"]["chipsReturned"], 990);
    }

    #[test]
    fn game_state_flattens_public_state_and_hides_absent_hole_cards() {
        let public = HandPublicState {
            hand_id: HandId::new(),
            phase: Phase::Preflop,
            community_cards: Vec::new(),
            pot: Chips(30),
            current_bet: Chips(20),
            min_raise: Chips(20),
            current_actor: None,
            players: Vec::new(),
        };
        let json = serde_json::to_value(ServerFrame::GameState(GameStateFrame {
            public,
            your_cards: None,
        }))
        .expect("serialize");
        assert_eq!(json["payload"]["pot"], 30);
        assert_eq!(json["payload"]["phase"], "preflop");
        assert!(json["payload"].get("yourCards").is_none());
    }
}
