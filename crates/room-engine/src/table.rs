//! Synchronous room core: the roster, the live hand, and every state
//! transition of the betting machine. Methods mutate the room and return the
//! frames to fan out plus the persistence effects for the actor shell to
//! apply. No I/O happens here, which keeps the whole state machine
//! deterministic under test.

use chrono::Utc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use hand_eval::HandEvaluation;
use poker_domain::{
    ActionKind, Card, Chips, Deck, GameStateFrame, HandId, HandPublicState, HandResultFrame,
    MessageId, Phase, PlayerLeftReason, PublicPlayer, RoomConfig, SatOutReason, SeatStatus,
    ServerFrame, SessionId, UserId, WinnerEntry, WinnerHand,
};
use poker_store::{HandSettlement, SeatRecord};

use crate::hand::{HandData, HandSeat, HandWinner, LiveHand};
use crate::player::{Outbox, RoomPlayer};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    #[error("no hand in progress")]
    NoHand,
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("action is not legal")]
    Illegal,
    #[error("player is not at this table")]
    NotSeated,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("a hand is already in progress")]
    InProgress,
    #[error("need at least two players with chips")]
    NotEnoughPlayers,
    #[error(transparent)]
    Deck(#[from] poker_domain::DomainError),
}

/// A frame plus its audience.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Broadcast(ServerFrame),
    Unicast(UserId, ServerFrame),
}

/// Seat removed mid-session; the actor deletes the row and credits `chips`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedSeat {
    pub user_id: UserId,
    pub chips: Chips,
}

/// Result of one state transition.
#[derive(Debug, Default, PartialEq)]
pub struct StepOutput {
    pub frames: Vec<Outgoing>,
    pub released: Vec<ReleasedSeat>,
    pub settlement: Option<HandSettlement>,
    pub hand_finished: bool,
}

impl StepOutput {
    fn broadcast(&mut self, frame: ServerFrame) {
        self.frames.push(Outgoing::Broadcast(frame));
    }

    fn unicast(&mut self, user_id: UserId, frame: ServerFrame) {
        self.frames.push(Outgoing::Unicast(user_id, frame));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSnapshot {
    pub seat_number: u8,
    pub stack: Chips,
    pub rejoined: bool,
}

/// One table's authoritative state. Single-writer: only the room actor
/// touches it.
pub struct GameRoom {
    config: RoomConfig,
    players: Vec<RoomPlayer>,
    spectators: Vec<(SessionId, Outbox)>,
    hand: Option<LiveHand>,
    last_dealer_seat: Option<u8>,
    /// Outboxes of players removed in the current step; they still receive
    /// that step's broadcasts (their own sit-out among them).
    parting: Vec<Outbox>,
}

impl GameRoom {
    #[must_use]
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            players: Vec::new(),
            spectators: Vec::new(),
            hand: None,
            last_dealer_seat: None,
            parting: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    #[must_use]
    pub fn hand_active(&self) -> bool {
        self.hand.is_some()
    }

    #[must_use]
    pub fn has_player(&self, user_id: UserId) -> bool {
        self.index_of(user_id).is_some()
    }

    #[must_use]
    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.index_of(user_id)
            .is_some_and(|idx| self.players[idx].connected())
    }

    /// Sum of all stacks on the table plus the live pot. Constant across a
    /// hand, which the tests lean on.
    #[must_use]
    pub fn total_chips(&self) -> Chips {
        let stacks: u64 = self.players.iter().map(|p| p.stack.as_u64()).sum();
        let pot = self.hand.as_ref().map_or(0, |h| h.pot.as_u64());
        Chips(stacks + pot)
    }

    /// `(hand, street, actor)` identifying the armed turn; changes whenever
    /// the timer must be re-armed.
    #[must_use]
    pub fn current_turn_key(&self) -> Option<(HandId, Phase, UserId)> {
        let hand = self.hand.as_ref()?;
        hand.current_actor.map(|user| (hand.id, hand.phase, user))
    }

    #[must_use]
    pub fn current_actor(&self) -> Option<UserId> {
        self.hand.as_ref().and_then(|h| h.current_actor)
    }

    /// At least two seated players could be dealt a hand right now.
    #[must_use]
    pub fn can_start_hand(&self) -> bool {
        self.hand.is_none() && self.eligible_indices().len() >= 2
    }

    fn index_of(&self, user_id: UserId) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    fn eligible_indices(&self) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status != SeatStatus::SittingOut && !p.stack.is_zero())
            .map(|(idx, _)| idx)
            .collect()
    }

    // ── connections ─────────────────────────────────────────────────────

    /// Attach an authenticated session to its persisted seat. Re-binding an
    /// existing roster entry is a reconnection and resends the private view.
    pub fn bind(
        &mut self,
        seat: &SeatRecord,
        username: &str,
        outbox: Outbox,
    ) -> (StepOutput, JoinSnapshot) {
        let mut out = StepOutput::default();
        if let Some(idx) = self.index_of(seat.user_id) {
            let player = &mut self.players[idx];
            player.outbox = Some(outbox);
            let snapshot = JoinSnapshot {
                seat_number: player.seat_number,
                stack: player.stack,
                rejoined: true,
            };
            if self.hand.is_some()
                && let Some(frame) = self.game_state_for(seat.user_id)
            {
                out.unicast(seat.user_id, frame);
            }
            return (out, snapshot);
        }

        let player = RoomPlayer {
            user_id: seat.user_id,
            username: username.to_string(),
            seat_number: seat.seat_number,
            stack: seat.stack,
            status: SeatStatus::Waiting,
            current_bet: Chips::ZERO,
            hole_cards: None,
            outbox: Some(outbox),
        };
        let snapshot = JoinSnapshot {
            seat_number: player.seat_number,
            stack: player.stack,
            rejoined: false,
        };
        out.broadcast(ServerFrame::PlayerJoined {
            user_id: player.user_id,
            username: player.username.clone(),
            seat_number: player.seat_number,
            stack: player.stack,
        });
        let pos = self
            .players
            .iter()
            .position(|p| p.seat_number > seat.seat_number)
            .unwrap_or(self.players.len());
        self.players.insert(pos, player);
        if let Some(public) = self.public_state() {
            out.unicast(
                seat.user_id,
                ServerFrame::GameState(GameStateFrame {
                    public,
                    your_cards: None,
                }),
            );
        }
        (out, snapshot)
    }

    /// Socket closed; the seat stays and the turn timer keeps running.
    pub fn detach(&mut self, user_id: UserId) {
        if let Some(idx) = self.index_of(user_id) {
            self.players[idx].outbox = None;
        }
    }

    pub fn spectate(&mut self, session_id: SessionId, outbox: Outbox) {
        if let Some(public) = self.public_state() {
            let frame = ServerFrame::GameState(GameStateFrame {
                public,
                your_cards: None,
            });
            let _ = outbox.try_send(frame);
        }
        self.spectators.retain(|(id, _)| *id != session_id);
        self.spectators.push((session_id, outbox));
    }

    pub fn drop_spectator(&mut self, session_id: SessionId) {
        self.spectators.retain(|(id, _)| *id != session_id);
    }

    // ── hand lifecycle ──────────────────────────────────────────────────

    /// Deal a new hand from `deck`, posting blinds and emitting `new_round`
    /// plus each player's private cards.
    pub fn start_hand(&mut self, deck: Deck) -> Result<StepOutput, StartError> {
        if self.hand.is_some() {
            return Err(StartError::InProgress);
        }
        let eligible = self.eligible_indices();
        if eligible.len() < 2 {
            return Err(StartError::NotEnoughPlayers);
        }

        let mut deck = deck;
        let dealer_pos = self.rotate_dealer(&eligible);
        let n = eligible.len();
        let (sb_pos, bb_pos, first_pos) = if n == 2 {
            (dealer_pos, (dealer_pos + 1) % n, dealer_pos)
        } else {
            (
                (dealer_pos + 1) % n,
                (dealer_pos + 2) % n,
                (dealer_pos + 3) % n,
            )
        };

        // Snapshot stacks before blinds; deal two rounds in seat order.
        let mut starting_seats = Vec::with_capacity(n);
        for &idx in &eligible {
            let p = &self.players[idx];
            starting_seats.push(HandSeat {
                user_id: p.user_id,
                username: p.username.clone(),
                seat_number: p.seat_number,
                stack: p.stack,
                // placeholder until both rounds are dealt
                hole_cards: [Card::new(poker_domain::Suit::Spades, poker_domain::Rank::Two); 2],
            });
        }
        let mut holes: Vec<[Option<Card>; 2]> = vec![[None, None]; n];
        for round in 0..2 {
            for slot in 0..n {
                holes[slot][round] = Some(deck.draw().map_err(StartError::Deck)?);
            }
        }

        let mut hand = LiveHand {
            id: HandId::new(),
            phase: Phase::Preflop,
            deck,
            community: Vec::new(),
            pot: Chips::ZERO,
            current_bet: Chips::ZERO,
            min_raise: self.config.big_blind,
            dealer_seat: self.players[eligible[dealer_pos]].seat_number,
            small_blind_seat: self.players[eligible[sb_pos]].seat_number,
            big_blind_seat: self.players[eligible[bb_pos]].seat_number,
            current_actor: None,
            acted_this_round: std::collections::HashSet::new(),
            last_aggressor: None,
            log: Vec::new(),
            starting_seats,
        };

        for (slot, &idx) in eligible.iter().enumerate() {
            let cards = match (holes[slot][0], holes[slot][1]) {
                (Some(a), Some(b)) => [a, b],
                _ => return Err(StartError::Deck(poker_domain::DomainError::DeckExhausted)),
            };
            let player = &mut self.players[idx];
            player.status = SeatStatus::Active;
            player.current_bet = Chips::ZERO;
            player.hole_cards = Some(cards);
            hand.starting_seats[slot].hole_cards = cards;
        }

        let sb_posted = contribute(
            &mut self.players,
            &mut hand,
            eligible[sb_pos],
            self.config.small_blind,
        );
        let bb_posted = contribute(
            &mut self.players,
            &mut hand,
            eligible[bb_pos],
            self.config.big_blind,
        );
        hand.current_bet = sb_posted.max(bb_posted);

        let first_seat = self.players[eligible[first_pos]].seat_number;
        hand.current_actor = if self.players[eligible[first_pos]].status == SeatStatus::Active {
            Some(self.players[eligible[first_pos]].user_id)
        } else {
            next_active_after(&self.players, first_seat).map(|idx| self.players[idx].user_id)
        };

        self.hand = Some(hand);

        let mut out = StepOutput::default();
        if let Some(public) = self.public_state() {
            out.broadcast(ServerFrame::NewRound(public));
        }
        for player in &self.players {
            if let (true, Some(cards)) = (player.in_hand(), player.hole_cards) {
                if let Some(public) = self.public_state() {
                    out.unicast(
                        player.user_id,
                        ServerFrame::GameState(GameStateFrame {
                            public,
                            your_cards: Some(cards),
                        }),
                    );
                }
            }
        }

        // Blinds may have put everyone all-in already.
        if round_closed(&self.players, self.hand.as_ref()) {
            self.advance_street(&mut out);
        }
        Ok(out)
    }

    /// Pin the dealer rotation point; used by hand replay.
    pub(crate) fn force_last_dealer(&mut self, seat: Option<u8>) {
        self.last_dealer_seat = seat;
    }

    /// Seed a roster entry with no connection; used by hand replay.
    pub(crate) fn seat_offline(
        &mut self,
        user_id: UserId,
        username: &str,
        seat_number: u8,
        stack: Chips,
    ) {
        let player = RoomPlayer {
            user_id,
            username: username.to_string(),
            seat_number,
            stack,
            status: SeatStatus::Waiting,
            current_bet: Chips::ZERO,
            hole_cards: None,
            outbox: None,
        };
        let pos = self
            .players
            .iter()
            .position(|p| p.seat_number > seat_number)
            .unwrap_or(self.players.len());
        self.players.insert(pos, player);
    }

    fn rotate_dealer(&self, eligible: &[usize]) -> usize {
        match self.last_dealer_seat {
            None => 0,
            Some(last) => eligible
                .iter()
                .position(|&idx| self.players[idx].seat_number > last)
                .unwrap_or(0),
        }
    }

    // ── actions ─────────────────────────────────────────────────────────

    pub fn apply_action(
        &mut self,
        user_id: UserId,
        action: ActionKind,
        amount: Option<Chips>,
    ) -> Result<StepOutput, ActionError> {
        let hand = self.hand.as_ref().ok_or(ActionError::NoHand)?;
        if hand.phase == Phase::Showdown {
            return Err(ActionError::Illegal);
        }
        if hand.current_actor != Some(user_id) {
            return Err(ActionError::NotYourTurn);
        }
        let idx = self.index_of(user_id).ok_or(ActionError::NotSeated)?;
        if self.players[idx].status != SeatStatus::Active {
            return Err(ActionError::Illegal);
        }

        let table_bet = hand.current_bet;
        let own_bet = self.players[idx].current_bet;
        let stack = self.players[idx].stack;
        let to_call = table_bet.saturating_sub(own_bet);

        let hand = match self.hand.as_mut() {
            Some(hand) => hand,
            None => return Err(ActionError::NoHand),
        };
        // The log keeps the raise parameter (not chips paid) so a replay can
        // feed it straight back into `apply_action`.
        let mut log_amount = Chips::ZERO;
        let paid = match action {
            ActionKind::Fold => {
                self.players[idx].status = SeatStatus::Folded;
                hand.acted_this_round.insert(user_id);
                Chips::ZERO
            }
            ActionKind::Check => {
                if !to_call.is_zero() {
                    return Err(ActionError::Illegal);
                }
                hand.acted_this_round.insert(user_id);
                Chips::ZERO
            }
            ActionKind::Call => {
                if to_call.is_zero() {
                    return Err(ActionError::Illegal);
                }
                let paid = contribute(&mut self.players, hand, idx, to_call);
                hand.acted_this_round.insert(user_id);
                paid
            }
            ActionKind::Raise => {
                // A player still in the acted set was not re-opened by any
                // aggression since they acted; they may only call or fold.
                if hand.acted_this_round.contains(&user_id) {
                    return Err(ActionError::Illegal);
                }
                let raise_by = amount.ok_or(ActionError::Illegal)?;
                let short_all_in = raise_by == stack.saturating_sub(to_call);
                if raise_by < hand.min_raise && !short_all_in {
                    return Err(ActionError::Illegal);
                }
                if to_call.as_u64() + raise_by.as_u64() > stack.as_u64() {
                    return Err(ActionError::Illegal);
                }
                log_amount = raise_by;
                let paid = contribute(
                    &mut self.players,
                    hand,
                    idx,
                    Chips(to_call.as_u64() + raise_by.as_u64()),
                );
                settle_aggression(&mut self.players, hand, idx, table_bet);
                paid
            }
            ActionKind::AllIn => {
                if stack.is_zero() {
                    return Err(ActionError::Illegal);
                }
                let paid = contribute(&mut self.players, hand, idx, stack);
                settle_aggression(&mut self.players, hand, idx, table_bet);
                paid
            }
        };

        hand.log_action(user_id, action, log_amount);
        let mut out = StepOutput::default();
        out.broadcast(ServerFrame::ActionResult {
            user_id,
            action,
            amount: paid,
            stack: self.players[idx].stack,
        });

        let from_seat = self.players[idx].seat_number;
        self.progress(&mut out, Some(from_seat));
        Ok(out)
    }

    /// Remove the current actor for failing to act in time: `timer_update`
    /// with `timedOut`, seat released, then the hand continues as if they
    /// had folded.
    pub fn timeout_current_actor(&mut self) -> StepOutput {
        let mut out = StepOutput::default();
        let Some(user_id) = self.current_actor() else {
            return out;
        };
        out.broadcast(ServerFrame::TimerUpdate {
            user_id,
            remaining_ms: 0,
            timed_out: Some(true),
        });
        self.remove_seated(&mut out, user_id, SeatExit::SatOut(SatOutReason::Timeout));
        out
    }

    /// Disconnection window expired without a rebind.
    pub fn reclaim_disconnected(&mut self, user_id: UserId) -> StepOutput {
        let mut out = StepOutput::default();
        if self.is_connected(user_id) {
            return out;
        }
        self.remove_seated(&mut out, user_id, SeatExit::SatOut(SatOutReason::Disconnect));
        out
    }

    /// Voluntary leave; a live hand treats it as a fold.
    pub fn leave(&mut self, user_id: UserId) -> Option<StepOutput> {
        self.index_of(user_id)?;
        let mut out = StepOutput::default();
        self.remove_seated(&mut out, user_id, SeatExit::Left);
        Some(out)
    }

    fn remove_seated(&mut self, out: &mut StepOutput, user_id: UserId, exit: SeatExit) {
        let Some(idx) = self.index_of(user_id) else {
            return;
        };
        let was_actor = self.current_actor() == Some(user_id);
        let player = self.players.remove(idx);
        if let Some(outbox) = player.outbox.clone() {
            self.parting.push(outbox);
        }
        if let Some(hand) = self.hand.as_mut()
            && player.hole_cards.is_some()
        {
            hand.log_sat_out(user_id);
        }
        match exit {
            SeatExit::SatOut(reason) => out.broadcast(ServerFrame::PlayerSatOut {
                user_id,
                username: player.username.clone(),
                reason,
                chips_returned: player.stack,
            }),
            SeatExit::Left => out.broadcast(ServerFrame::PlayerLeft {
                user_id,
                reason: None,
            }),
        }
        out.released.push(ReleasedSeat {
            user_id,
            chips: player.stack,
        });
        if self.hand.is_some() && player.hole_cards.is_some() {
            // Only hand the turn onward if the leaver held it.
            self.progress(out, was_actor.then_some(player.seat_number));
        }
    }

    pub fn chat(&mut self, user_id: UserId, message: &str) -> Option<StepOutput> {
        let idx = self.index_of(user_id)?;
        let text: String = message.trim().chars().take(200).collect();
        let mut out = StepOutput::default();
        out.broadcast(ServerFrame::ChatMessage {
            id: MessageId::new(),
            user_id,
            username: self.players[idx].username.clone(),
            message: text,
            timestamp: Utc::now(),
        });
        Some(out)
    }

    // ── betting-round progression ───────────────────────────────────────

    fn progress(&mut self, out: &mut StepOutput, advance_from: Option<u8>) {
        if self.hand.is_none() {
            return;
        }
        let non_folded = non_folded_indices(&self.players);
        if non_folded.len() <= 1 {
            self.award_by_fold(out, non_folded.first().copied());
            return;
        }
        if round_closed(&self.players, self.hand.as_ref()) {
            self.advance_street(out);
            return;
        }
        let Some(from_seat) = advance_from else {
            return;
        };
        let next = next_active_after(&self.players, from_seat).map(|i| self.players[i].user_id);
        if let Some(hand) = self.hand.as_mut() {
            hand.current_actor = next;
        }
        self.broadcast_state(out);
    }

    /// Close the street: bets roll into the pot, the board grows, action
    /// restarts left of the dealer. With fewer than two players still able
    /// to act the board is dealt out with no further betting.
    fn advance_street(&mut self, out: &mut StepOutput) {
        let Some(mut hand) = self.hand.take() else {
            return;
        };
        for player in &mut self.players {
            player.current_bet = Chips::ZERO;
        }
        hand.current_bet = Chips::ZERO;
        hand.min_raise = self.config.big_blind;
        hand.acted_this_round.clear();
        hand.last_aggressor = None;

        let runout = active_indices(&self.players).len() < 2;
        loop {
            let Some(next_phase) = hand.phase.next() else {
                break;
            };
            if next_phase == Phase::Showdown {
                hand.phase = Phase::Showdown;
                hand.current_actor = None;
                self.hand = Some(hand);
                self.broadcast_state(out);
                self.showdown(out);
                return;
            }
            hand.phase = next_phase;
            if let Err(err) = deal_board(&mut hand) {
                error!(error = %err, "community deal failed");
                break;
            }
            if !runout {
                break;
            }
        }

        if runout {
            // Loop above only exits early on error; reaching here without a
            // showdown means the deck failed. Freeze the hand at showdown.
            hand.phase = Phase::Showdown;
            hand.current_actor = None;
            self.hand = Some(hand);
            self.showdown(out);
            return;
        }

        hand.current_actor =
            next_active_after(&self.players, hand.dealer_seat).map(|i| self.players[i].user_id);
        self.hand = Some(hand);
        self.broadcast_state(out);
    }

    fn broadcast_state(&self, out: &mut StepOutput) {
        if let Some(public) = self.public_state() {
            out.broadcast(ServerFrame::GameState(GameStateFrame {
                public,
                your_cards: None,
            }));
        }
    }

    fn award_by_fold(&mut self, out: &mut StepOutput, winner_idx: Option<usize>) {
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        hand.phase = Phase::Showdown;
        hand.current_actor = None;
        let pot = hand.pot;
        let winners = match winner_idx {
            Some(idx) => {
                let player = &mut self.players[idx];
                player.stack = Chips(player.stack.as_u64() + pot.as_u64());
                vec![(player.user_id, player.username.clone(), pot, None::<WinnerHand>)]
            }
            None => Vec::new(),
        };
        out.broadcast(ServerFrame::HandResult(HandResultFrame {
            winners: winners
                .iter()
                .map(|(user_id, username, amount, _)| WinnerEntry {
                    user_id: *user_id,
                    username: username.clone(),
                    amount: *amount,
                    hand: None,
                })
                .collect(),
            pot,
            revealed_hands: None,
            community_cards: None,
        }));
        let winner_list: Vec<(UserId, Chips)> = winners
            .iter()
            .map(|(user_id, _, amount, _)| (*user_id, *amount))
            .collect();
        self.end_hand(out, winner_list);
    }

    fn showdown(&mut self, out: &mut StepOutput) {
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        hand.phase = Phase::Showdown;
        hand.current_actor = None;
        let community = hand.community.clone();
        let pot = hand.pot;

        let mut entries: Vec<(usize, [Card; 2], HandEvaluation)> = Vec::new();
        for (idx, player) in self.players.iter().enumerate() {
            if player.status == SeatStatus::Folded {
                continue;
            }
            let Some(cards) = player.hole_cards else {
                continue;
            };
            match hand_eval::evaluate(&cards, &community) {
                Ok(evaluation) => entries.push((idx, cards, evaluation)),
                Err(err) => error!(error = %err, "showdown evaluation failed"),
            }
        }
        if entries.is_empty() {
            self.end_hand(out, Vec::new());
            return;
        }

        let best = entries
            .iter()
            .map(|(_, _, evaluation)| evaluation.value)
            .max()
            .unwrap_or(entries[0].2.value);
        let winner_count = entries
            .iter()
            .filter(|(_, _, e)| e.value == best)
            .count() as u64;
        // Split pots discard the integer remainder.
        let share = Chips(pot.as_u64() / winner_count.max(1));

        let mut winner_entries = Vec::new();
        let mut winner_list = Vec::new();
        let mut revealed = std::collections::HashMap::new();
        for (idx, cards, evaluation) in &entries {
            let player = &self.players[*idx];
            revealed.insert(player.user_id, *cards);
            if evaluation.value == best {
                winner_entries.push(WinnerEntry {
                    user_id: player.user_id,
                    username: player.username.clone(),
                    amount: share,
                    hand: Some(WinnerHand {
                        rank: evaluation.category.wire_name().to_string(),
                        description: evaluation.description.clone(),
                        cards: *cards,
                    }),
                });
                winner_list.push((player.user_id, share));
            }
        }
        for (user_id, amount) in &winner_list {
            if let Some(idx) = self.index_of(*user_id) {
                let player = &mut self.players[idx];
                player.stack = Chips(player.stack.as_u64() + amount.as_u64());
            }
        }

        out.broadcast(ServerFrame::HandResult(HandResultFrame {
            winners: winner_entries,
            pot,
            revealed_hands: Some(revealed),
            community_cards: Some(community),
        }));
        self.end_hand(out, winner_list);
    }

    /// Flush the hand: build the history payload and settlement, bust
    /// zero-stack players, reset the rest to waiting.
    fn end_hand(&mut self, out: &mut StepOutput, winners: Vec<(UserId, Chips)>) {
        let Some(hand) = self.hand.take() else {
            return;
        };
        self.last_dealer_seat = Some(hand.dealer_seat);

        let hand_data = HandData {
            hand_id: hand.id,
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            dealer_seat: hand.dealer_seat,
            seats: hand.starting_seats.clone(),
            community_cards: hand.community.clone(),
            log: hand.log.clone(),
            pot: hand.pot,
            winners: winners
                .iter()
                .map(|(user_id, amount)| HandWinner {
                    user_id: *user_id,
                    amount: *amount,
                })
                .collect(),
        };

        let mut stacks = Vec::new();
        let mut busted = Vec::new();
        let mut keep = Vec::with_capacity(self.players.len());
        for mut player in std::mem::take(&mut self.players) {
            if !player.in_hand() {
                keep.push(player);
                continue;
            }
            stacks.push((player.user_id, player.stack));
            if player.stack.is_zero() {
                busted.push(player.user_id);
                out.broadcast(ServerFrame::PlayerLeft {
                    user_id: player.user_id,
                    reason: Some(PlayerLeftReason::Busted),
                });
                continue;
            }
            player.status = SeatStatus::Waiting;
            player.current_bet = Chips::ZERO;
            player.hole_cards = None;
            keep.push(player);
        }
        self.players = keep;

        out.settlement = Some(HandSettlement {
            history_id: Uuid::now_v7(),
            room_id: self.config.id,
            stacks,
            busted,
            winners,
            pot: hand.pot,
            community_cards: hand.community,
            hand_data: serde_json::to_value(&hand_data).unwrap_or(serde_json::Value::Null),
        });
        out.hand_finished = true;
    }

    // ── views ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn public_state(&self) -> Option<HandPublicState> {
        let hand = self.hand.as_ref()?;
        Some(HandPublicState {
            hand_id: hand.id,
            phase: hand.phase,
            community_cards: hand.community.clone(),
            pot: hand.pot,
            current_bet: hand.current_bet,
            min_raise: hand.min_raise,
            current_actor: hand.current_actor,
            players: self
                .players
                .iter()
                .map(|p| PublicPlayer {
                    user_id: p.user_id,
                    username: p.username.clone(),
                    seat_number: p.seat_number,
                    stack: p.stack,
                    current_bet: p.current_bet,
                    status: p.status,
                    is_dealer: p.seat_number == hand.dealer_seat,
                    is_small_blind: p.seat_number == hand.small_blind_seat,
                    is_big_blind: p.seat_number == hand.big_blind_seat,
                    connected: p.connected(),
                })
                .collect(),
        })
    }

    /// The public view plus the recipient's own hole cards.
    #[must_use]
    pub fn game_state_for(&self, user_id: UserId) -> Option<ServerFrame> {
        let public = self.public_state()?;
        let your_cards = self
            .index_of(user_id)
            .and_then(|idx| self.players[idx].hole_cards);
        Some(ServerFrame::GameState(GameStateFrame { public, your_cards }))
    }

    #[must_use]
    pub fn player_username(&self, user_id: UserId) -> Option<&str> {
        self.index_of(user_id)
            .map(|idx| self.players[idx].username.as_str())
    }

    /// Fan frames out to seats and spectators. Slow or closed outboxes just
    /// miss the frame; closed spectators are pruned.
    pub fn dispatch(&mut self, frames: &[Outgoing]) {
        for frame in frames {
            match frame {
                Outgoing::Broadcast(frame) => {
                    for player in &self.players {
                        if let Some(outbox) = &player.outbox {
                            let _ = outbox.try_send(frame.clone());
                        }
                    }
                    for (_, outbox) in &self.spectators {
                        let _ = outbox.try_send(frame.clone());
                    }
                    for outbox in &self.parting {
                        let _ = outbox.try_send(frame.clone());
                    }
                }
                Outgoing::Unicast(user_id, frame) => {
                    if let Some(idx) = self.index_of(*user_id)
                        && let Some(outbox) = &self.players[idx].outbox
                    {
                        let _ = outbox.try_send(frame.clone());
                    }
                }
            }
        }
        self.parting.clear();
        self.spectators.retain(|(_, outbox)| !outbox.is_closed());
    }
}

enum SeatExit {
    SatOut(SatOutReason),
    Left,
}

// ── free helpers (keep the borrow surface small) ────────────────────────

/// Move up to `want` chips from the player's stack into the pot, tracking
/// the street bet. Exhausting the stack pins the player all-in.
fn contribute(players: &mut [RoomPlayer], hand: &mut LiveHand, idx: usize, want: Chips) -> Chips {
    let player = &mut players[idx];
    let paid = want.min(player.stack);
    player.stack = Chips(player.stack.as_u64() - paid.as_u64());
    player.current_bet = Chips(player.current_bet.as_u64() + paid.as_u64());
    hand.pot = Chips(hand.pot.as_u64() + paid.as_u64());
    if player.stack.is_zero() {
        player.status = SeatStatus::AllIn;
    }
    paid
}

/// After a raise or all-in that moved the table bet, players behind still
/// owe the difference, but raising rights re-open only on a full raise
/// (raise portion >= previous `min_raise`). A sub-minimum all-in leaves the
/// acted set intact, so everyone who already matched may only call or fold.
fn settle_aggression(
    players: &mut [RoomPlayer],
    hand: &mut LiveHand,
    idx: usize,
    table_bet_before: Chips,
) {
    let user_id = players[idx].user_id;
    let own_bet = players[idx].current_bet;
    if own_bet > table_bet_before {
        let raise_portion = own_bet.saturating_sub(table_bet_before);
        hand.current_bet = own_bet;
        if raise_portion >= hand.min_raise {
            hand.min_raise = raise_portion;
            hand.acted_this_round.clear();
            hand.last_aggressor = Some(user_id);
        }
    }
    hand.acted_this_round.insert(user_id);
}

fn active_indices(players: &[RoomPlayer]) -> Vec<usize> {
    players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.in_hand() && p.status == SeatStatus::Active)
        .map(|(idx, _)| idx)
        .collect()
}

fn non_folded_indices(players: &[RoomPlayer]) -> Vec<usize> {
    players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.in_hand() && p.status != SeatStatus::Folded)
        .map(|(idx, _)| idx)
        .collect()
}

/// First player still able to act strictly after `seat`, wrapping around.
fn next_active_after(players: &[RoomPlayer], seat: u8) -> Option<usize> {
    let n = players.len();
    if n == 0 {
        return None;
    }
    let start = players
        .iter()
        .position(|p| p.seat_number > seat)
        .unwrap_or(0);
    (0..n)
        .map(|step| (start + step) % n)
        .find(|&idx| players[idx].in_hand() && players[idx].status == SeatStatus::Active)
}

/// Both closure conditions: everyone still able to act has acted, and all
/// their street bets match the table bet.
fn round_closed(players: &[RoomPlayer], hand: Option<&LiveHand>) -> bool {
    let Some(hand) = hand else {
        return false;
    };
    active_indices(players).iter().all(|&idx| {
        let p = &players[idx];
        hand.acted_this_round.contains(&p.user_id) && p.current_bet == hand.current_bet
    })
}

fn deal_board(hand: &mut LiveHand) -> Result<(), poker_domain::DomainError> {
    let target = hand.phase.community_card_count();
    while hand.community.len() < target {
        let card = hand.deck.draw()?;
        hand.community.push(card);
    }
    Ok(())
}
