//! Command protocol for the session actor. Each command embeds a oneshot
//! for the reply.

use backend_client::EngineKind;
use chess::MoveRequest;
use cozy_chess::Square;
use tokio::sync::{broadcast, oneshot};

use crate::clock::TimeControl;
use crate::events::SessionEvent;
use crate::premove::GestureOutcome;
use crate::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("No game in progress")]
    NotPlaying,
    #[error("A game is already in progress")]
    AlreadyStarted,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Side preference at game start. Random resolves uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideChoice {
    White,
    Black,
    Random,
}

/// Who sits across the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opponent {
    Engine {
        kind: EngineKind,
        depth: u8,
        use_book: bool,
    },
    /// Both sides played at this board.
    Human,
}

/// Per-game configuration chosen during side selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub opponent: Opponent,
    pub time_control: Option<TimeControl>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            opponent: Opponent::Engine {
                kind: EngineKind::Minimax,
                depth: 3,
                use_book: false,
            },
            time_control: Some(TimeControl::from_secs(300, 0)),
        }
    }
}

/// Commands sent to the session actor.
pub enum SessionCommand {
    StartGame {
        choice: SideChoice,
        config: GameConfig,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    SubmitMove {
        request: MoveRequest,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// One click of the premove gesture.
    ClickSquare {
        square: Square,
        reply: oneshot::Sender<GestureOutcome>,
    },
    /// Cancel gesture: clears the pending selection and the queue.
    ClearPremoves {
        reply: oneshot::Sender<()>,
    },
    Resign {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// New game with the same configuration and side.
    Rematch {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// Back to side selection.
    Reset {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
