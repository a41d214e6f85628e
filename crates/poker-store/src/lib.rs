//! Storage seam for the room engine: the persisted record sets, the `Store`
//! trait the durable backend implements, and the adapter exposing the exact
//! operations the engine needs. Every trait call is an atomic unit; the
//! balance-moving combos (`buy_in`, `release_seat`, `settle_hand`) mutate the
//! wallet and the seat row in one transaction.

mod adapter;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use poker_domain::{Card, Chips, RoomConfig, RoomId, RoomStatus, SeatStatus, UserId};

pub use adapter::PersistenceAdapter;
pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found")]
    UserNotFound,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is closed")]
    RoomClosed,
    #[error("Seat not found")]
    SeatNotFound,
    #[error("Seat {0} is already taken")]
    SeatTaken(u8),
    #[error("Already seated in this room")]
    AlreadySeated,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Buy-in must be between {min} and {max}")]
    BuyInOutOfRange { min: Chips, max: Chips },
    #[error("balance would go negative")]
    BalanceUnderflow,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub balance: Chips,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_players: u8,
    pub status: RoomStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomRecord {
    #[must_use]
    pub fn config(&self) -> RoomConfig {
        RoomConfig {
            id: self.id,
            name: self.name.clone(),
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            min_buy_in: self.min_buy_in,
            max_buy_in: self.max_buy_in,
            max_players: self.max_players,
        }
    }
}

/// One row per (room, user). Unique on `(room_id, seat_number)` and
/// `(room_id, user_id)` among live rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub id: Uuid,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub seat_number: u8,
    pub stack: Chips,
    pub status: SeatStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    BuyIn,
    CashOut,
    Win,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub room_id: Option<RoomId>,
    pub kind: TransactionType,
    /// Signed chip delta from the wallet's point of view.
    pub amount: i64,
    pub balance_before: Chips,
    pub balance_after: Chips,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    pub id: Uuid,
    pub room_id: RoomId,
    pub winner_id: Option<UserId>,
    pub pot: Chips,
    pub community_cards: Vec<Card>,
    pub hand_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Everything the engine flushes at the end of a hand. Applied as one unit;
/// re-applying the same settlement is harmless (stacks are absolute, the
/// history row is keyed by `history_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandSettlement {
    pub history_id: Uuid,
    pub room_id: RoomId,
    /// Absolute post-hand stack per seated player.
    pub stacks: Vec<(UserId, Chips)>,
    /// Players whose stack reached zero; their seat rows are removed.
    pub busted: Vec<UserId>,
    /// Pot share credited to each winner's stack.
    pub winners: Vec<(UserId, Chips)>,
    pub pot: Chips,
    pub community_cards: Vec<Card>,
    pub hand_data: serde_json::Value,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError>;
    async fn upsert_user(&self, user: UserRecord) -> Result<(), StoreError>;

    async fn get_room(&self, room_id: RoomId) -> Result<RoomRecord, StoreError>;
    async fn upsert_room(&self, room: RoomRecord) -> Result<(), StoreError>;
    async fn list_open_rooms(&self) -> Result<Vec<RoomRecord>, StoreError>;

    async fn get_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError>;
    async fn list_seats(&self, room_id: RoomId) -> Result<Vec<SeatRecord>, StoreError>;
    async fn upsert_seat(&self, seat: SeatRecord) -> Result<(), StoreError>;
    async fn delete_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError>;

    /// Applies a signed delta to the wallet, returning `(before, after)`.
    async fn adjust_wallet_balance(
        &self,
        user_id: UserId,
        delta: i64,
    ) -> Result<(Chips, Chips), StoreError>;
    async fn append_transaction(&self, tx: TransactionRecord) -> Result<(), StoreError>;
    async fn append_game_history(&self, row: GameHistoryRecord) -> Result<(), StoreError>;

    /// Deduct `amount` from the wallet and create the seat, atomically.
    /// `min_wallet` is the lobby's floor on the wallet before deduction.
    async fn buy_in(
        &self,
        room_id: RoomId,
        user_id: UserId,
        seat_number: u8,
        amount: Chips,
        min_wallet: Chips,
    ) -> Result<SeatRecord, StoreError>;

    /// Delete the seat and credit its stack back to the wallet, atomically.
    /// During a hand the seat row lags the live stack, so callers mid-hand
    /// pass the authoritative amount as `stack_override`.
    /// Returns the removed seat, or `None` when no seat existed.
    async fn release_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
        stack_override: Option<Chips>,
    ) -> Result<Option<SeatRecord>, StoreError>;

    /// Flush post-hand stacks, remove busted seats, record the hand history
    /// row and one `win` transaction per winner, atomically.
    async fn settle_hand(&self, settlement: &HandSettlement) -> Result<(), StoreError>;
}
