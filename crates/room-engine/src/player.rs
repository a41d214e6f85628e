use tokio::sync::mpsc;

use poker_domain::{Card, Chips, SeatStatus, ServerFrame, UserId};

/// Per-connection outbound queue. Room actors push with `try_send` and never
/// block on a slow or closed socket.
pub type Outbox = mpsc::Sender<ServerFrame>;

/// A seated user as the room actor sees them. `outbox` is absent while the
/// player is inside the reconnection window.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub username: String,
    pub seat_number: u8,
    pub stack: Chips,
    pub status: SeatStatus,
    pub current_bet: Chips,
    pub hole_cards: Option<[Card; 2]>,
    pub outbox: Option<Outbox>,
}

impl RoomPlayer {
    #[must_use]
    pub fn connected(&self) -> bool {
        self.outbox.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Dealt into the current hand (folded and all-in players included).
    #[must_use]
    pub fn in_hand(&self) -> bool {
        self.hole_cards.is_some()
    }
}
