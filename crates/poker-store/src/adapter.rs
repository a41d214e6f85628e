use std::sync::Arc;

use poker_domain::{Chips, RoomId, RoomStatus, UserId};

use crate::{
    GameHistoryRecord, HandSettlement, RoomRecord, SeatRecord, Store, StoreError,
    TransactionRecord,
};

/// The engine's and lobby's view of the store: the operations of the spec
/// plus the transactional combos, with the lobby's buy-in rules enforced
/// in front of the atomic wallet/seat mutation.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn Store>,
}

impl PersistenceAdapter {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomRecord, StoreError> {
        self.store.get_room(room_id).await
    }

    pub async fn get_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError> {
        self.store.get_seat(room_id, user_id).await
    }

    pub async fn upsert_seat(&self, seat: SeatRecord) -> Result<(), StoreError> {
        self.store.upsert_seat(seat).await
    }

    pub async fn delete_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError> {
        self.store.delete_seat(room_id, user_id).await
    }

    pub async fn adjust_wallet_balance(
        &self,
        user_id: UserId,
        delta: i64,
    ) -> Result<(Chips, Chips), StoreError> {
        self.store.adjust_wallet_balance(user_id, delta).await
    }

    pub async fn append_transaction(&self, tx: TransactionRecord) -> Result<(), StoreError> {
        self.store.append_transaction(tx).await
    }

    pub async fn append_game_history(&self, row: GameHistoryRecord) -> Result<(), StoreError> {
        self.store.append_game_history(row).await
    }

    /// Every non-closed room together with its persisted seats, for registry
    /// bootstrap and stale-seat reclamation.
    pub async fn list_open_rooms_with_seats(
        &self,
    ) -> Result<Vec<(RoomRecord, Vec<SeatRecord>)>, StoreError> {
        let rooms = self.store.list_open_rooms().await?;
        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms {
            let seats = self.store.list_seats(room.id).await?;
            out.push((room, seats));
        }
        Ok(out)
    }

    /// Lobby buy-in: range and wallet-floor checks against the room config,
    /// then the atomic wallet-deduct + seat-create + ledger write.
    pub async fn buy_in(
        &self,
        room_id: RoomId,
        user_id: UserId,
        seat_number: u8,
        amount: Chips,
    ) -> Result<SeatRecord, StoreError> {
        let room = self.store.get_room(room_id).await?;
        if room.status == RoomStatus::Closed {
            return Err(StoreError::RoomClosed);
        }
        if amount < room.min_buy_in || amount > room.max_buy_in {
            return Err(StoreError::BuyInOutOfRange {
                min: room.min_buy_in,
                max: room.max_buy_in,
            });
        }
        let min_wallet = Chips(room.big_blind.as_u64() * 3);
        self.store
            .buy_in(room_id, user_id, seat_number, amount, min_wallet)
            .await
    }

    /// Cash-out / sit-out / reclamation: remove the seat and return its
    /// stack to the wallet. `stack_override` carries the live in-memory
    /// stack when a hand is in progress. Returns the chips credited.
    pub async fn release_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
        stack_override: Option<Chips>,
    ) -> Result<Option<Chips>, StoreError> {
        let override_amount = stack_override;
        Ok(self
            .store
            .release_seat(room_id, user_id, override_amount)
            .await?
            .map(|seat| override_amount.unwrap_or(seat.stack)))
    }

    pub async fn settle_hand(&self, settlement: &HandSettlement) -> Result<(), StoreError> {
        self.store.settle_hand(settlement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryStore, TransactionType, UserRecord};
    use chrono::Utc;
    use poker_domain::{RoomConfig, SeatStatus};
    use uuid::Uuid;

    async fn seeded() -> (PersistenceAdapter, Arc<InMemoryStore>, RoomId, UserId) {
        let store = Arc::new(InMemoryStore::new());
        let adapter = PersistenceAdapter::new(store.clone());
        let user_id = UserId::new();
        let room_id = RoomId::new();
        store
            .upsert_user(UserRecord {
                id: user_id,
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
                password_hash: "x".to_string(),
                balance: Chips(50_000),
                is_admin: false,
                created_at: Utc::now(),
            })
            .await
            .expect("user");
        let config =
            RoomConfig::new(room_id, "main", Chips(10), Chips(200), Chips(2000), 6)
                .expect("config");
        store
            .upsert_room(room_record(&config))
            .await
            .expect("room");
        (adapter, store, room_id, user_id)
    }

    fn room_record(config: &RoomConfig) -> RoomRecord {
        RoomRecord {
            id: config.id,
            name: config.name.clone(),
            small_blind: config.small_blind,
            big_blind: config.big_blind,
            min_buy_in: config.min_buy_in,
            max_buy_in: config.max_buy_in,
            max_players: config.max_players,
            status: RoomStatus::Waiting,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn buy_in_enforces_range_and_balance() {
        let (adapter, store, room_id, user_id) = seeded().await;

        // Below the room minimum.
        let err = adapter
            .buy_in(room_id, user_id, 0, Chips(100))
            .await
            .expect_err("too small");
        assert_eq!(err.to_string(), "Buy-in must be between 200 and 2000");

        // Above the wallet. Uses a deeper room so the range check passes.
        let rich_room = RoomConfig::new(
            RoomId::new(),
            "deep",
            Chips(10),
            Chips(200),
            Chips(100_000),
            6,
        )
        .expect("config");
        store
            .upsert_room(room_record(&rich_room))
            .await
            .expect("room");
        let err = adapter
            .buy_in(rich_room.id, user_id, 0, Chips(60_000))
            .await
            .expect_err("too rich");
        assert_eq!(err.to_string(), "Insufficient balance");
    }

    #[tokio::test]
    async fn join_then_leave_round_trips_the_wallet() {
        let (adapter, store, room_id, user_id) = seeded().await;
        let before = store.get_user(user_id).await.expect("user").balance;

        let seat = adapter
            .buy_in(room_id, user_id, 2, Chips(500))
            .await
            .expect("buy in");
        assert_eq!(seat.stack, Chips(500));
        assert_eq!(seat.status, SeatStatus::Waiting);
        assert_eq!(
            store.get_user(user_id).await.expect("user").balance,
            Chips(before.as_u64() - 500)
        );

        let returned = adapter
            .release_seat(room_id, user_id, None)
            .await
            .expect("release")
            .expect("seat existed");
        assert_eq!(returned, Chips(500));
        assert_eq!(store.get_user(user_id).await.expect("user").balance, before);

        let kinds: Vec<TransactionType> = store
            .transactions_for(user_id)
            .into_iter()
            .map(|tx| tx.kind)
            .collect();
        assert_eq!(kinds, vec![TransactionType::BuyIn, TransactionType::CashOut]);
    }

    #[tokio::test]
    async fn buy_in_rejects_taken_seat_and_double_join() {
        let (adapter, store, room_id, user_id) = seeded().await;
        let other = UserId::new();
        store
            .upsert_user(UserRecord {
                id: other,
                email: "bob@example.com".to_string(),
                username: "bob".to_string(),
                password_hash: "x".to_string(),
                balance: Chips(50_000),
                is_admin: false,
                created_at: Utc::now(),
            })
            .await
            .expect("user");

        adapter
            .buy_in(room_id, user_id, 3, Chips(400))
            .await
            .expect("first join");
        assert!(matches!(
            adapter.buy_in(room_id, other, 3, Chips(400)).await,
            Err(StoreError::SeatTaken(3))
        ));
        assert!(matches!(
            adapter.buy_in(room_id, user_id, 4, Chips(400)).await,
            Err(StoreError::AlreadySeated)
        ));
    }

    #[tokio::test]
    async fn settle_hand_flushes_stacks_and_is_idempotent() {
        let (adapter, store, room_id, user_id) = seeded().await;
        let loser = UserId::new();
        store
            .upsert_user(UserRecord {
                id: loser,
                email: "bob@example.com".to_string(),
                username: "bob".to_string(),
                password_hash: "x".to_string(),
                balance: Chips(50_000),
                is_admin: false,
                created_at: Utc::now(),
            })
            .await
            .expect("user");
        adapter
            .buy_in(room_id, user_id, 0, Chips(200))
            .await
            .expect("join");
        adapter
            .buy_in(room_id, loser, 1, Chips(200))
            .await
            .expect("join");

        let settlement = HandSettlement {
            history_id: Uuid::now_v7(),
            room_id,
            stacks: vec![(user_id, Chips(400)), (loser, Chips(0))],
            busted: vec![loser],
            winners: vec![(user_id, Chips(400))],
            pot: Chips(400),
            community_cards: Vec::new(),
            hand_data: serde_json::json!({}),
        };
        adapter.settle_hand(&settlement).await.expect("settle");
        adapter
            .settle_hand(&settlement)
            .await
            .expect("idempotent retry");

        let seat = store
            .get_seat(room_id, user_id)
            .await
            .expect("seat")
            .expect("winner keeps seat");
        assert_eq!(seat.stack, Chips(400));
        assert!(store
            .get_seat(room_id, loser)
            .await
            .expect("seat")
            .is_none());

        let history = store.history_for(room_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winner_id, Some(user_id));
        assert_eq!(history[0].pot, Chips(400));

        let wins: Vec<_> = store
            .transactions_for(user_id)
            .into_iter()
            .filter(|tx| tx.kind == TransactionType::Win)
            .collect();
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].amount, 400);
    }
}
