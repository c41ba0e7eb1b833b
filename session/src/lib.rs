//! Match session state machine.
//!
//! One live chess match per session: turn enforcement, per-side clocks,
//! premove queuing, asynchronous engine-move requests, and best-effort
//! persistence to the backend game log. All state lives in a single actor
//! task; the [`SessionHandle`] is the only way in.

mod actor;
pub mod clock;
pub mod commands;
pub mod events;
pub mod handle;
pub mod premove;
pub mod snapshot;
mod state;

use std::sync::Arc;

use backend_client::{EngineService, GameStore};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use actor::run_session_actor;
pub use clock::{Clock, TimeControl};
pub use commands::{GameConfig, Opponent, SessionError, SideChoice};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use premove::{GestureOutcome, PremoveEntry, Selection};
pub use snapshot::{
    ClockSnapshot, DrawReason, MatchPhase, MoveRecord, SessionResult, SessionSnapshot, WinReason,
};
use state::SessionState;

/// The external services a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub engine: Arc<dyn EngineService>,
    pub store: Arc<dyn GameStore>,
}

/// Spawn a session actor task and return its handle.
pub fn spawn_session(services: SessionServices) -> SessionHandle {
    let session_id = Uuid::new_v4().to_string();

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(128);

    let state = SessionState::new(session_id.clone());
    tokio::spawn(run_session_actor(state, services, cmd_rx, event_tx));

    SessionHandle::new(session_id, cmd_tx)
}
