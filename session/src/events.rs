//! Events broadcast from the session actor to all subscribers.

use crate::premove::PremoveEntry;
use crate::snapshot::{MoveRecord, SessionResult, SessionSnapshot};

#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// A move (user, engine, or premove replay) was accepted.
    MoveAccepted {
        snapshot: SessionSnapshot,
        record: MoveRecord,
    },
    /// A user move was rejected; nothing changed.
    MoveRejected,
    /// The game ended. Fired exactly once per game.
    GameOver(SessionResult),
    /// The engine request failed; gameplay state is unchanged.
    EngineError(String),
    /// Periodic clock update.
    ClockTick { white_ms: u64, black_ms: u64 },
    /// A premove entered the queue.
    PremoveQueued(PremoveEntry),
    /// A queued premove became illegal and was discarded.
    PremoveInvalidated(PremoveEntry),
    /// Any other state mutation (start, reset, premove cancel).
    StateChanged(SessionSnapshot),
}
