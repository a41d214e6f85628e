//! Owns the live room actors. Rooms are materialised lazily from the store;
//! at startup every persisted seat of a waiting room gets a reclamation
//! timer which returns the stack to the wallet unless the user rebinds a
//! session in time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::info;

use poker_domain::{RoomId, RoomStatus, UserId};
use poker_store::{PersistenceAdapter, StoreError};

use crate::actor::{RECONNECT_WINDOW, RoomHandle, spawn_room};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is closed")]
    RoomClosed,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomNotFound => Self::RoomNotFound,
            StoreError::RoomClosed => Self::RoomClosed,
            other => Self::Store(other),
        }
    }
}

pub struct RoomRegistry {
    adapter: PersistenceAdapter,
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    reclaims: Mutex<HashMap<(RoomId, UserId), AbortHandle>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(adapter: PersistenceAdapter) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            rooms: Mutex::new(HashMap::new()),
            reclaims: Mutex::new(HashMap::new()),
        })
    }

    /// Instantiate an actor per non-closed room and start the stale-seat
    /// timers. Returns the number of rooms brought up.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<usize, StoreError> {
        let rooms = self.adapter.list_open_rooms_with_seats().await?;
        let count = rooms.len();
        for (room, seats) in rooms {
            let handle = self.insert_room(room.config());
            if room.status != RoomStatus::Waiting {
                continue;
            }
            for seat in seats {
                self.schedule_reclaim(room.id, seat.user_id, handle.clone());
            }
        }
        info!(rooms = count, "room registry bootstrapped");
        Ok(count)
    }

    /// The live handle for a room, loading the row on first touch. Closed
    /// rooms are never materialised.
    pub async fn get_or_create(&self, room_id: RoomId) -> Result<RoomHandle, RegistryError> {
        if let Some(handle) = self.lookup(room_id) {
            return Ok(handle);
        }
        let row = self.adapter.get_room(room_id).await?;
        if row.status == RoomStatus::Closed {
            return Err(RegistryError::RoomClosed);
        }
        Ok(self.insert_room(row.config()))
    }

    fn lookup(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(&room_id).cloned())
    }

    fn insert_room(&self, config: poker_domain::RoomConfig) -> RoomHandle {
        let room_id = config.id;
        let mut rooms = match self.rooms.lock() {
            Ok(rooms) => rooms,
            Err(poisoned) => poisoned.into_inner(),
        };
        rooms
            .entry(room_id)
            .or_insert_with(|| spawn_room(config, self.adapter.clone()))
            .clone()
    }

    fn schedule_reclaim(&self, room_id: RoomId, user_id: UserId, handle: RoomHandle) {
        let task = tokio::spawn(async move {
            tokio::time::sleep(RECONNECT_WINDOW).await;
            handle.reclaim(user_id).await;
        });
        if let Ok(mut reclaims) = self.reclaims.lock() {
            if let Some(previous) = reclaims.insert((room_id, user_id), task.abort_handle()) {
                previous.abort();
            }
        }
    }

    /// A successful `join_room` cancels the pending reclamation for that
    /// seat. Races with an already-fired timer are harmless: the actor
    /// re-checks liveness before touching the seat.
    pub fn cancel_reclaim(&self, room_id: RoomId, user_id: UserId) {
        if let Ok(mut reclaims) = self.reclaims.lock()
            && let Some(task) = reclaims.remove(&(room_id, user_id))
        {
            task.abort();
        }
    }
}
