//! Room actor: single-writer task owning a [`GameRoom`]. Inbound commands
//! arrive on an mpsc queue; a one-second tick drives the turn timer, the
//! pre-hand grace, the inter-hand delay, and disconnect reclamation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use poker_domain::{
    ActionKind, Chips, Deck, HandId, Phase, RoomConfig, RoomId, ServerFrame, SessionId, UserId,
};
use poker_store::{HandSettlement, PersistenceAdapter, SeatRecord};

use crate::player::Outbox;
use crate::table::{ActionError, GameRoom, Outgoing, StepOutput};

pub const TURN_TIMEOUT: Duration = Duration::from_secs(30);
pub const HAND_START_GRACE: Duration = Duration::from_secs(2);
pub const INTER_HAND_DELAY: Duration = Duration::from_secs(5);
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(60);
const TICK: Duration = Duration::from_secs(1);
const COMMAND_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinInfo {
    pub seat_number: u8,
    pub stack: Chips,
}

#[derive(Debug)]
pub enum RoomCommand {
    Bind {
        seat: SeatRecord,
        username: String,
        outbox: Outbox,
        reply: oneshot::Sender<JoinInfo>,
    },
    Detach {
        user_id: UserId,
    },
    Leave {
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },
    Act {
        user_id: UserId,
        action: ActionKind,
        amount: Option<Chips>,
        reply: oneshot::Sender<Result<(), ActionError>>,
    },
    Spectate {
        session_id: SessionId,
        outbox: Outbox,
    },
    DropSpectator {
        session_id: SessionId,
    },
    Chat {
        user_id: UserId,
        message: String,
    },
    /// Stale-seat check from the registry or the disconnect window; a no-op
    /// when the user holds a live session.
    Reclaim {
        user_id: UserId,
    },
}

#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub async fn bind(
        &self,
        seat: SeatRecord,
        username: String,
        outbox: Outbox,
    ) -> Option<JoinInfo> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Bind {
                seat,
                username,
                outbox,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn detach(&self, user_id: UserId) {
        let _ = self.sender.send(RoomCommand::Detach { user_id }).await;
    }

    pub async fn leave(&self, user_id: UserId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomCommand::Leave { user_id, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn act(
        &self,
        user_id: UserId,
        action: ActionKind,
        amount: Option<Chips>,
    ) -> Result<(), ActionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Act {
                user_id,
                action,
                amount,
                reply,
            })
            .await
            .map_err(|_| ActionError::NoHand)?;
        rx.await.unwrap_or(Err(ActionError::NoHand))
    }

    pub async fn spectate(&self, session_id: SessionId, outbox: Outbox) {
        let _ = self
            .sender
            .send(RoomCommand::Spectate { session_id, outbox })
            .await;
    }

    pub async fn drop_spectator(&self, session_id: SessionId) {
        let _ = self
            .sender
            .send(RoomCommand::DropSpectator { session_id })
            .await;
    }

    pub async fn chat(&self, user_id: UserId, message: String) {
        let _ = self
            .sender
            .send(RoomCommand::Chat { user_id, message })
            .await;
    }

    pub async fn reclaim(&self, user_id: UserId) {
        let _ = self.sender.send(RoomCommand::Reclaim { user_id }).await;
    }
}

/// Spawn the actor task for one room and hand back its command handle.
pub fn spawn_room(config: RoomConfig, adapter: PersistenceAdapter) -> RoomHandle {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let room_id = config.id;
    let actor = RoomActor {
        room_id,
        room: GameRoom::new(config),
        adapter,
        rx,
        turn_deadline: None,
        armed_turn: None,
        start_at: None,
        reclaim_at: HashMap::new(),
        pending_settlements: Vec::new(),
    };
    tokio::spawn(actor.run());
    RoomHandle {
        room_id,
        sender: tx,
    }
}

struct RoomActor {
    room_id: RoomId,
    room: GameRoom,
    adapter: PersistenceAdapter,
    rx: mpsc::Receiver<RoomCommand>,
    turn_deadline: Option<Instant>,
    armed_turn: Option<(HandId, Phase, UserId)>,
    start_at: Option<Instant>,
    reclaim_at: HashMap<UserId, Instant>,
    /// Hand-end writes that failed; retried in order at the next hand end.
    pending_settlements: Vec<HandSettlement>,
}

impl RoomActor {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = tick.tick() => self.handle_tick().await,
            }
        }
        debug!(room_id = %self.room_id, "room actor stopped");
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Bind {
                seat,
                username,
                outbox,
                reply,
            } => {
                let user_id = seat.user_id;
                let (out, snapshot) = self.room.bind(&seat, &username, outbox);
                self.reclaim_at.remove(&user_id);
                let _ = reply.send(JoinInfo {
                    seat_number: snapshot.seat_number,
                    stack: snapshot.stack,
                });
                self.finish_step(out).await;
                self.maybe_schedule_start();
            }
            RoomCommand::Detach { user_id } => {
                self.room.detach(user_id);
                if self.room.has_player(user_id) {
                    self.reclaim_at
                        .insert(user_id, Instant::now() + RECONNECT_WINDOW);
                }
            }
            RoomCommand::Leave { user_id, reply } => {
                let out = self.room.leave(user_id);
                let _ = reply.send(out.is_some());
                if let Some(out) = out {
                    self.finish_step(out).await;
                }
                self.reclaim_at.remove(&user_id);
            }
            RoomCommand::Act {
                user_id,
                action,
                amount,
                reply,
            } => match self.room.apply_action(user_id, action, amount) {
                Ok(out) => {
                    let _ = reply.send(Ok(()));
                    self.finish_step(out).await;
                }
                Err(err) => {
                    // Rejected actions leave the turn timer running.
                    let _ = reply.send(Err(err));
                }
            },
            RoomCommand::Spectate { session_id, outbox } => {
                self.room.spectate(session_id, outbox);
            }
            RoomCommand::DropSpectator { session_id } => {
                self.room.drop_spectator(session_id);
            }
            RoomCommand::Chat { user_id, message } => {
                if let Some(out) = self.room.chat(user_id, &message) {
                    self.finish_step(out).await;
                }
            }
            RoomCommand::Reclaim { user_id } => self.reclaim(user_id).await,
        }
    }

    async fn handle_tick(&mut self) {
        let now = Instant::now();

        if let Some(at) = self.start_at
            && now >= at
        {
            self.start_at = None;
            if self.room.can_start_hand() {
                match self.room.start_hand(Deck::shuffled()) {
                    Ok(out) => self.finish_step(out).await,
                    Err(err) => warn!(room_id = %self.room_id, error = %err, "hand start failed"),
                }
            }
        }

        if let Some(deadline) = self.turn_deadline {
            if now >= deadline {
                let out = self.room.timeout_current_actor();
                self.finish_step(out).await;
            } else if let Some(user_id) = self.room.current_actor() {
                let remaining = deadline.saturating_duration_since(now);
                self.room
                    .dispatch(&[Outgoing::Broadcast(ServerFrame::TimerUpdate {
                        user_id,
                        remaining_ms: remaining.as_millis() as u64,
                        timed_out: None,
                    })]);
            }
        }

        let expired: Vec<UserId> = self
            .reclaim_at
            .iter()
            .filter(|(_, at)| now >= **at)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in expired {
            self.reclaim_at.remove(&user_id);
            let out = self.room.reclaim_disconnected(user_id);
            self.finish_step(out).await;
        }
    }

    async fn reclaim(&mut self, user_id: UserId) {
        if self.room.is_connected(user_id) {
            return;
        }
        if self.room.has_player(user_id) {
            let out = self.room.reclaim_disconnected(user_id);
            self.finish_step(out).await;
            return;
        }
        // Never rebound since restart: the roster knows nothing about them,
        // so the seat row is authoritative.
        match self.adapter.release_seat(self.room_id, user_id, None).await {
            Ok(Some(chips)) => {
                debug!(room_id = %self.room_id, %user_id, %chips, "reclaimed stale seat");
            }
            Ok(None) => {}
            Err(err) => {
                error!(room_id = %self.room_id, %user_id, error = %err, "stale seat reclaim failed");
            }
        }
    }

    /// Fan out frames, then apply persistence effects; pot resolution never
    /// waits on (or rolls back for) the store.
    async fn finish_step(&mut self, out: StepOutput) {
        let StepOutput {
            frames,
            released,
            settlement,
            hand_finished,
        } = out;
        self.room.dispatch(&frames);

        for seat in released {
            self.reclaim_at.remove(&seat.user_id);
            if let Err(err) = self
                .adapter
                .release_seat(self.room_id, seat.user_id, Some(seat.chips))
                .await
            {
                error!(room_id = %self.room_id, user_id = %seat.user_id, error = %err, "seat release failed");
            }
        }

        if let Some(settlement) = settlement {
            // Earlier failed hand-end writes retry in front of the new one
            // so rows land in order; settle_hand is idempotent per hand.
            self.pending_settlements.push(settlement);
            let queue = std::mem::take(&mut self.pending_settlements);
            for settlement in queue {
                if let Err(err) = self.adapter.settle_hand(&settlement).await {
                    error!(room_id = %self.room_id, error = %err, "hand settlement failed, will retry");
                    self.pending_settlements.push(settlement);
                }
            }
        }

        if hand_finished {
            self.start_at = Some(Instant::now() + INTER_HAND_DELAY);
        }
        self.rearm_turn_timer();
    }

    fn maybe_schedule_start(&mut self) {
        if self.start_at.is_none() && self.room.can_start_hand() {
            self.start_at = Some(Instant::now() + HAND_START_GRACE);
        }
    }

    /// One armed deadline per room; arming for a new `(hand, street, actor)`
    /// replaces the previous timer.
    fn rearm_turn_timer(&mut self) {
        let key = self.room.current_turn_key();
        if key == self.armed_turn {
            return;
        }
        self.armed_turn = key;
        self.turn_deadline = key.map(|_| Instant::now() + TURN_TIMEOUT);
    }
}
