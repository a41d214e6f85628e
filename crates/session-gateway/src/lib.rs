//! Real-time edge: accepts WebSocket connections carrying `{type, payload}`
//! JSON frames, authenticates them, and demultiplexes traffic to room
//! actors. Writes are serialized per connection through a single writer
//! task; a slow or closed peer only ever loses its own frames.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use player_auth::{AuthIdentity, TokenVerifier};
use poker_domain::{ClientFrame, ServerFrame, SessionId, UserId};
use poker_store::PersistenceAdapter;
use room_engine::registry::RoomRegistry;
use room_engine::{Outbox, RoomHandle};

const OUTBOX_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
}

enum Binding {
    Seated { handle: RoomHandle, user_id: UserId },
    Spectating { handle: RoomHandle },
}

struct ConnContext {
    session_id: SessionId,
    user: Option<AuthIdentity>,
    binding: Option<Binding>,
}

pub struct Gateway {
    registry: Arc<RoomRegistry>,
    verifier: Arc<dyn TokenVerifier>,
    adapter: PersistenceAdapter,
}

impl Gateway {
    #[must_use]
    pub fn new(
        registry: Arc<RoomRegistry>,
        verifier: Arc<dyn TokenVerifier>,
        adapter: PersistenceAdapter,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            verifier,
            adapter,
        })
    }

    /// Accept loop; one task per connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), GatewayError> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let gateway = self.clone();
            tokio::spawn(async move {
                match gateway.handle_connection(stream).await {
                    Ok(()) => debug!(%peer, "connection closed"),
                    Err(err) => debug!(%peer, error = %err, "connection ended"),
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), GatewayError> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(OUTBOX_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let mut ctx = ConnContext {
            session_id: SessionId::new(),
            user: None,
            binding: None,
        };
        let result = loop {
            let Some(message) = stream.next().await else {
                break Ok(());
            };
            // An abrupt close still runs the detach below; the seat then
            // rides on the reconnection window.
            let message = match message {
                Ok(message) => message,
                Err(err) => break Err(GatewayError::Ws(err)),
            };
            match message {
                Message::Text(text) => self.handle_text(&mut ctx, &out_tx, &text).await,
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_text(&mut ctx, &out_tx, text).await,
                    Err(_) => send(&out_tx, ServerFrame::error("Invalid message format")),
                },
                Message::Close(_) => break Ok(()),
                _ => {}
            }
        };

        self.release_binding(&mut ctx).await;
        writer.abort();
        result
    }

    async fn handle_text(&self, ctx: &mut ConnContext, out_tx: &Outbox, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(message) => {
                send(out_tx, ServerFrame::error(message));
                return;
            }
        };
        match frame {
            ClientFrame::Auth { token } => match self.verifier.verify(&token).await {
                Some(identity) => {
                    send(
                        out_tx,
                        ServerFrame::AuthSuccess {
                            user_id: identity.user_id,
                            username: identity.username.clone(),
                        },
                    );
                    ctx.user = Some(identity);
                }
                None => send(out_tx, ServerFrame::error("Invalid token")),
            },
            ClientFrame::JoinRoom { room_id } => {
                let Some(user) = ctx.user.clone() else {
                    send(out_tx, ServerFrame::error("Not authenticated"));
                    return;
                };
                let handle = match self.registry.get_or_create(room_id).await {
                    Ok(handle) => handle,
                    Err(err) => {
                        send(out_tx, ServerFrame::error(err.to_string()));
                        return;
                    }
                };
                let seat = match self.adapter.get_seat(room_id, user.user_id).await {
                    Ok(Some(seat)) => seat,
                    Ok(None) => {
                        send(out_tx, ServerFrame::error("must join via Lobby first"));
                        return;
                    }
                    Err(err) => {
                        debug!(error = %err, "seat lookup failed");
                        send(out_tx, ServerFrame::error("Internal error"));
                        return;
                    }
                };
                self.registry.cancel_reclaim(room_id, user.user_id);
                self.release_binding(ctx).await;
                match handle
                    .bind(seat, user.username.clone(), out_tx.clone())
                    .await
                {
                    Some(info) => {
                        ctx.binding = Some(Binding::Seated {
                            handle,
                            user_id: user.user_id,
                        });
                        send(
                            out_tx,
                            ServerFrame::JoinedRoom {
                                room_id,
                                seat_number: info.seat_number,
                                stack: info.stack,
                            },
                        );
                    }
                    None => send(out_tx, ServerFrame::error("Internal error")),
                }
            }
            ClientFrame::LeaveRoom {} => match &ctx.binding {
                Some(Binding::Seated { handle, user_id }) => {
                    handle.leave(*user_id).await;
                    ctx.binding = None;
                    send(out_tx, ServerFrame::LeftRoom {});
                }
                _ => send(out_tx, ServerFrame::error("Not in a room")),
            },
            ClientFrame::PlayerAction { action, amount } => match &ctx.binding {
                Some(Binding::Seated { handle, user_id }) => {
                    if handle.act(*user_id, action, amount).await.is_err() {
                        send(out_tx, ServerFrame::error("Invalid action"));
                    }
                }
                _ => send(out_tx, ServerFrame::error("Invalid action")),
            },
            ClientFrame::Spectate { room_id } => {
                let handle = match self.registry.get_or_create(room_id).await {
                    Ok(handle) => handle,
                    Err(err) => {
                        send(out_tx, ServerFrame::error(err.to_string()));
                        return;
                    }
                };
                self.release_binding(ctx).await;
                handle.spectate(ctx.session_id, out_tx.clone()).await;
                ctx.binding = Some(Binding::Spectating { handle });
                send(out_tx, ServerFrame::Spectating { room_id });
            }
            ClientFrame::ChatMessage { message } => match &ctx.binding {
                Some(Binding::Seated { handle, user_id }) => {
                    if !message.trim().is_empty() {
                        handle.chat(*user_id, message).await;
                    }
                }
                _ => send(out_tx, ServerFrame::error("Not in a room")),
            },
        }
    }

    /// Detach from whatever the connection was bound to. Seats survive; the
    /// reconnection window and turn timer take it from here.
    async fn release_binding(&self, ctx: &mut ConnContext) {
        match ctx.binding.take() {
            Some(Binding::Seated { handle, user_id }) => handle.detach(user_id).await,
            Some(Binding::Spectating { handle }) => handle.drop_spectator(ctx.session_id).await,
            None => {}
        }
    }
}

fn send(out_tx: &Outbox, frame: ServerFrame) {
    let _ = out_tx.try_send(frame);
}

/// Two-stage parse so an unknown `type` and a malformed payload report
/// differently, as the protocol requires.
fn parse_frame(text: &str) -> Result<ClientFrame, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| "Invalid message format".to_string())?;
    let type_name = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| "Invalid message format".to_string())?;
    if !ClientFrame::TYPES.contains(&type_name) {
        return Err(format!("Unknown message type: {type_name}"));
    }
    serde_json::from_value(value).map_err(|_| "Invalid message format".to_string())
}
