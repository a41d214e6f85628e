//! Timer-driven room actor behavior under paused tokio time: hand start
//! grace, turn timeout, and the disconnect reclamation window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use poker_domain::{Chips, RoomConfig, RoomId, RoomStatus, SatOutReason, ServerFrame, UserId};
use poker_store::{InMemoryStore, PersistenceAdapter, RoomRecord, Store, UserRecord};
use room_engine::actor::spawn_room;

async fn seeded_room() -> (PersistenceAdapter, Arc<InMemoryStore>, RoomConfig) {
    let store = Arc::new(InMemoryStore::new());
    let adapter = PersistenceAdapter::new(store.clone());
    let config = RoomConfig::new(
        RoomId::new(),
        "timer room",
        Chips(10),
        Chips(200),
        Chips(2000),
        6,
    )
    .expect("config");
    store
        .upsert_room(RoomRecord {
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
        })
        .await
        .expect("room");
    (adapter, store, config)
}

async fn seeded_user(store: &InMemoryStore, username: &str) -> UserId {
    let user_id = UserId::new();
    store
        .upsert_user(UserRecord {
            id: user_id,
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: "x".to_string(),
            balance: Chips(50_000),
            is_admin: false,
            created_at: Utc::now(),
        })
        .await
        .expect("user");
    user_id
}

/// Read frames until `pick` matches one, failing after `secs` of (virtual)
/// time.
async fn wait_for<T>(
    rx: &mut mpsc::Receiver<ServerFrame>,
    secs: u64,
    pick: impl Fn(&ServerFrame) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(secs), async {
        loop {
            let frame = rx.recv().await.expect("frame stream open");
            if let Some(found) = pick(&frame) {
                return found;
            }
        }
    })
    .await
    .expect("frame within deadline")
}

#[tokio::test(start_paused = true)]
async fn turn_timeout_sits_actor_out_and_awards_the_pot() {
    let (adapter, store, config) = seeded_room().await;
    let alice = seeded_user(&store, "alice").await;
    let bob = seeded_user(&store, "bob").await;
    let alice_seat = adapter
        .buy_in(config.id, alice, 0, Chips(1000))
        .await
        .expect("buy in");
    let bob_seat = adapter
        .buy_in(config.id, bob, 1, Chips(1000))
        .await
        .expect("buy in");

    let handle = spawn_room(config.clone(), adapter.clone());
    let (alice_tx, mut alice_rx) = mpsc::channel(256);
    let (bob_tx, mut bob_rx) = mpsc::channel(256);
    handle
        .bind(alice_seat, "alice".to_string(), alice_tx)
        .await
        .expect("bind alice");
    handle
        .bind(bob_seat, "bob".to_string(), bob_tx)
        .await
        .expect("bind bob");

    // The 2 s grace elapses and a hand is dealt; alice (seat 0) is the
    // heads-up dealer and first to act.
    let actor = wait_for(&mut bob_rx, 10, |frame| match frame {
        ServerFrame::NewRound(state) => Some(state.current_actor),
        _ => None,
    })
    .await;
    assert_eq!(actor, Some(alice));

    // Alice never acts. Countdown frames tick, then the 30 s deadline fires.
    wait_for(&mut bob_rx, 5, |frame| match frame {
        ServerFrame::TimerUpdate {
            user_id,
            timed_out: None,
            ..
        } if *user_id == alice => Some(()),
        _ => None,
    })
    .await;
    wait_for(&mut bob_rx, 40, |frame| match frame {
        ServerFrame::TimerUpdate {
            user_id,
            timed_out: Some(true),
            ..
        } if *user_id == alice => Some(()),
        _ => None,
    })
    .await;
    let chips_returned = wait_for(&mut bob_rx, 5, |frame| match frame {
        ServerFrame::PlayerSatOut {
            user_id,
            reason: SatOutReason::Timeout,
            chips_returned,
            ..
        } if *user_id == alice => Some(*chips_returned),
        _ => None,
    })
    .await;
    assert_eq!(chips_returned, Chips(990));

    // The timed-out player sees their own removal too.
    wait_for(&mut alice_rx, 5, |frame| match frame {
        ServerFrame::PlayerSatOut { user_id, .. } if *user_id == alice => Some(()),
        _ => None,
    })
    .await;

    let result = wait_for(&mut bob_rx, 5, |frame| match frame {
        ServerFrame::HandResult(result) => Some(result.clone()),
        _ => None,
    })
    .await;
    assert_eq!(result.pot, Chips(30));
    assert_eq!(result.winners[0].user_id, bob);
    assert!(result.revealed_hands.is_none());

    // Persistence: alice's seat is gone and her wallet holds the refund;
    // bob's seat row carries the settled stack.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(store.get_seat(config.id, alice).await.expect("seat").is_none());
    assert_eq!(
        store.get_user(alice).await.expect("user").balance,
        Chips(49_990)
    );
    let bob_row = store
        .get_seat(config.id, bob)
        .await
        .expect("seat")
        .expect("bob seated");
    assert_eq!(bob_row.stack, Chips(1010));
}

#[tokio::test(start_paused = true)]
async fn disconnect_window_reclaims_the_seat() {
    let (adapter, store, config) = seeded_room().await;
    let alice = seeded_user(&store, "alice").await;
    let alice_seat = adapter
        .buy_in(config.id, alice, 0, Chips(500))
        .await
        .expect("buy in");

    let handle = spawn_room(config.clone(), adapter.clone());
    let (alice_tx, alice_rx) = mpsc::channel(64);
    handle
        .bind(alice_seat, "alice".to_string(), alice_tx)
        .await
        .expect("bind");
    drop(alice_rx);
    handle.detach(alice).await;

    // No hand can start with one player; after the 60 s window the seat is
    // released back to the wallet.
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert!(store.get_seat(config.id, alice).await.expect("seat").is_none());
    assert_eq!(
        store.get_user(alice).await.expect("user").balance,
        Chips(50_000)
    );
}
