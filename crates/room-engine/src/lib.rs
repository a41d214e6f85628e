pub mod actor;
pub mod hand;
pub mod player;
pub mod registry;
pub mod replay;
pub mod table;

pub use actor::{JoinInfo, RoomCommand, RoomHandle, spawn_room};
pub use hand::{HandData, HandLogEntry, HandSeat, LiveHand};
pub use player::{Outbox, RoomPlayer};
pub use registry::{RegistryError, RoomRegistry};
pub use table::{ActionError, GameRoom, JoinSnapshot, Outgoing, ReleasedSeat, StartError, StepOutput};
