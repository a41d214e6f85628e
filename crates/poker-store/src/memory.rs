use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use poker_domain::{Chips, RoomId, RoomStatus, SeatStatus, UserId};

use crate::{
    GameHistoryRecord, HandSettlement, RoomRecord, SeatRecord, Store, StoreError,
    TransactionRecord, TransactionType, UserRecord,
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserRecord>,
    rooms: HashMap<RoomId, RoomRecord>,
    seats: Vec<SeatRecord>,
    transactions: Vec<TransactionRecord>,
    game_history: Vec<GameHistoryRecord>,
}

/// Single-process `Store`. One mutex guards all record sets, which makes
/// every trait call (combos included) an atomic unit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    pub fn transactions_for(&self, user_id: UserId) -> Vec<TransactionRecord> {
        self.lock()
            .map(|inner| {
                inner
                    .transactions
                    .iter()
                    .filter(|tx| tx.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn history_for(&self, room_id: RoomId) -> Vec<GameHistoryRecord> {
        self.lock()
            .map(|inner| {
                inner
                    .game_history
                    .iter()
                    .filter(|row| row.room_id == room_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn apply_delta(balance: Chips, delta: i64) -> Result<Chips, StoreError> {
    if delta >= 0 {
        balance
            .checked_add(Chips(delta as u64))
            .map_err(|_| StoreError::Backend("wallet overflow".to_string()))
    } else {
        balance
            .checked_sub(Chips(delta.unsigned_abs()))
            .map_err(|_| StoreError::BalanceUnderflow)
    }
}

impl Inner {
    fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> Result<(Chips, Chips), StoreError> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound)?;
        let before = user.balance;
        let after = apply_delta(before, delta)?;
        user.balance = after;
        Ok((before, after))
    }

    fn record_transaction(
        &mut self,
        user_id: UserId,
        room_id: Option<RoomId>,
        kind: TransactionType,
        amount: i64,
        before: Chips,
        after: Chips,
    ) {
        self.transactions.push(TransactionRecord {
            id: Uuid::now_v7(),
            user_id,
            room_id,
            kind,
            amount,
            balance_before: before,
            balance_after: after,
            created_at: Utc::now(),
        });
    }

    fn seat_index(&self, room_id: RoomId, user_id: UserId) -> Option<usize> {
        self.seats
            .iter()
            .position(|seat| seat.room_id == room_id && seat.user_id == user_id)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        self.lock()?
            .users
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }

    async fn get_room(&self, room_id: RoomId) -> Result<RoomRecord, StoreError> {
        self.lock()?
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(StoreError::RoomNotFound)
    }

    async fn upsert_room(&self, room: RoomRecord) -> Result<(), StoreError> {
        self.lock()?.rooms.insert(room.id, room);
        Ok(())
    }

    async fn list_open_rooms(&self) -> Result<Vec<RoomRecord>, StoreError> {
        Ok(self
            .lock()?
            .rooms
            .values()
            .filter(|room| room.status != RoomStatus::Closed)
            .cloned()
            .collect())
    }

    async fn get_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .seat_index(room_id, user_id)
            .map(|idx| inner.seats[idx].clone()))
    }

    async fn list_seats(&self, room_id: RoomId) -> Result<Vec<SeatRecord>, StoreError> {
        Ok(self
            .lock()?
            .seats
            .iter()
            .filter(|seat| seat.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn upsert_seat(&self, seat: SeatRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let taken = inner.seats.iter().any(|existing| {
            existing.room_id == seat.room_id
                && existing.seat_number == seat.seat_number
                && existing.user_id != seat.user_id
        });
        if taken {
            return Err(StoreError::SeatTaken(seat.seat_number));
        }
        match inner.seat_index(seat.room_id, seat.user_id) {
            Some(idx) => inner.seats[idx] = seat,
            None => inner.seats.push(seat),
        }
        Ok(())
    }

    async fn delete_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<Option<SeatRecord>, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner
            .seat_index(room_id, user_id)
            .map(|idx| inner.seats.remove(idx)))
    }

    async fn adjust_wallet_balance(
        &self,
        user_id: UserId,
        delta: i64,
    ) -> Result<(Chips, Chips), StoreError> {
        self.lock()?.adjust_balance(user_id, delta)
    }

    async fn append_transaction(&self, tx: TransactionRecord) -> Result<(), StoreError> {
        self.lock()?.transactions.push(tx);
        Ok(())
    }

    async fn append_game_history(&self, row: GameHistoryRecord) -> Result<(), StoreError> {
        self.lock()?.game_history.push(row);
        Ok(())
    }

    async fn buy_in(
        &self,
        room_id: RoomId,
        user_id: UserId,
        seat_number: u8,
        amount: Chips,
        min_wallet: Chips,
    ) -> Result<SeatRecord, StoreError> {
        let mut inner = self.lock()?;
        if !inner.rooms.contains_key(&room_id) {
            return Err(StoreError::RoomNotFound);
        }
        if inner.seat_index(room_id, user_id).is_some() {
            return Err(StoreError::AlreadySeated);
        }
        let seat_taken = inner
            .seats
            .iter()
            .any(|seat| seat.room_id == room_id && seat.seat_number == seat_number);
        if seat_taken {
            return Err(StoreError::SeatTaken(seat_number));
        }
        let balance = inner
            .users
            .get(&user_id)
            .ok_or(StoreError::UserNotFound)?
            .balance;
        if balance < amount || balance < min_wallet {
            return Err(StoreError::InsufficientBalance);
        }

        let (before, after) = inner.adjust_balance(user_id, -(amount.as_u64() as i64))?;
        inner.record_transaction(
            user_id,
            Some(room_id),
            TransactionType::BuyIn,
            -(amount.as_u64() as i64),
            before,
            after,
        );
        let seat = SeatRecord {
            id: Uuid::now_v7(),
            room_id,
            user_id,
            seat_number,
            stack: amount,
            status: SeatStatus::Waiting,
            created_at: Utc::now(),
        };
        inner.seats.push(seat.clone());
        Ok(seat)
    }

    async fn release_seat(
        &self,
        room_id: RoomId,
        user_id: UserId,
        stack_override: Option<Chips>,
    ) -> Result<Option<SeatRecord>, StoreError> {
        let mut inner = self.lock()?;
        let Some(idx) = inner.seat_index(room_id, user_id) else {
            return Ok(None);
        };
        let seat = inner.seats.remove(idx);
        let credit = stack_override.unwrap_or(seat.stack);
        let (before, after) = inner.adjust_balance(user_id, credit.as_u64() as i64)?;
        inner.record_transaction(
            user_id,
            Some(room_id),
            TransactionType::CashOut,
            credit.as_u64() as i64,
            before,
            after,
        );
        Ok(Some(seat))
    }

    async fn settle_hand(&self, settlement: &HandSettlement) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner
            .game_history
            .iter()
            .any(|row| row.id == settlement.history_id)
        {
            return Ok(());
        }

        for (user_id, stack) in &settlement.stacks {
            if let Some(idx) = inner.seat_index(settlement.room_id, *user_id) {
                inner.seats[idx].stack = *stack;
            }
        }
        for user_id in &settlement.busted {
            if let Some(idx) = inner.seat_index(settlement.room_id, *user_id) {
                inner.seats.remove(idx);
            }
        }
        for (user_id, amount) in &settlement.winners {
            // Winnings land on the stack, not the wallet; the ledger row
            // records the award against an unchanged wallet balance.
            let balance = inner
                .users
                .get(user_id)
                .map(|user| user.balance)
                .unwrap_or(Chips::ZERO);
            inner.record_transaction(
                *user_id,
                Some(settlement.room_id),
                TransactionType::Win,
                amount.as_u64() as i64,
                balance,
                balance,
            );
        }
        inner.game_history.push(GameHistoryRecord {
            id: settlement.history_id,
            room_id: settlement.room_id,
            winner_id: settlement.winners.first().map(|(user_id, _)| *user_id),
            pot: settlement.pot,
            community_cards: settlement.community_cards.clone(),
            hand_data: settlement.hand_data.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}
