use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use observability::init_tracing_with_filter;
use platform_core::AppConfig;
use player_auth::{InMemoryTokenVerifier, TokenVerifier};
use poker_domain::{Chips, RoomConfig, RoomId, RoomStatus};
use poker_store::{InMemoryStore, PersistenceAdapter, RoomRecord};
use room_engine::registry::RoomRegistry;
use session_gateway::Gateway;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing_with_filter("room-server", &config.log_filter);

    let store = Arc::new(InMemoryStore::new());
    let adapter = PersistenceAdapter::new(store);
    seed_default_room(&adapter).await?;

    let registry = RoomRegistry::new(adapter.clone());
    registry.bootstrap().await?;

    let verifier: Arc<dyn TokenVerifier> = Arc::new(InMemoryTokenVerifier::new());
    let gateway = Gateway::new(registry, verifier, adapter);

    let listener = TcpListener::bind(("0.0.0.0", config.realtime_port)).await?;
    info!(port = config.realtime_port, "realtime gateway listening");

    tokio::select! {
        result = gateway.serve(listener) => result?,
        _ = signal::ctrl_c() => info!("shutdown signal received"),
    }
    Ok(())
}

/// The in-memory store starts empty; give local runs one table to sit at.
async fn seed_default_room(adapter: &PersistenceAdapter) -> Result<()> {
    if !adapter.list_open_rooms_with_seats().await?.is_empty() {
        return Ok(());
    }
    let config = RoomConfig::new(
        RoomId::new(),
        "main table",
        Chips(10),
        Chips(200),
        Chips(2000),
        9,
    )?;
    adapter
        .store()
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
        .await?;
    info!(room_id = %config.id, "seeded default room");
    Ok(())
}
