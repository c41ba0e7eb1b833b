//! Immutable views of session state, sent to subscribers on every change.

use chess::PlayerSide;

/// Lifecycle of the match session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// No position yet; waiting for the user to pick a side.
    SideSelection,
    Playing,
    GameOver(SessionResult),
}

/// Terminal outcome of a game. Set at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResult {
    InProgress,
    WhiteWins(WinReason),
    BlackWins(WinReason),
    Draw(DrawReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinReason {
    Checkmate,
    Timeout,
    Resignation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    Repetition,
    Other,
}

impl SessionResult {
    pub fn win(side: PlayerSide, reason: WinReason) -> Self {
        match side {
            PlayerSide::White => Self::WhiteWins(reason),
            PlayerSide::Black => Self::BlackWins(reason),
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::InProgress
    }
}

impl std::fmt::Display for SessionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = |r: &WinReason| match r {
            WinReason::Checkmate => "checkmate",
            WinReason::Timeout => "timeout",
            WinReason::Resignation => "resignation",
        };
        match self {
            Self::InProgress => write!(f, "in progress"),
            Self::WhiteWins(r) => write!(f, "white wins by {}", reason(r)),
            Self::BlackWins(r) => write!(f, "black wins by {}", reason(r)),
            Self::Draw(r) => {
                let r = match r {
                    DrawReason::Stalemate => "stalemate",
                    DrawReason::InsufficientMaterial => "insufficient material",
                    DrawReason::Repetition => "repetition",
                    DrawReason::Other => "rule",
                };
                write!(f, "draw by {}", r)
            }
        }
    }
}

/// A single accepted move in the session's move list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub san: String,
    pub move_number: u32,
    pub color: PlayerSide,
}

/// Clock state for subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub white_remaining_ms: u64,
    pub black_remaining_ms: u64,
    pub running: Option<PlayerSide>,
}

/// Complete snapshot of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: MatchPhase,
    /// Current position; None during side selection.
    pub fen: Option<String>,
    pub side_to_move: Option<PlayerSide>,
    pub user_side: Option<PlayerSide>,
    pub result: SessionResult,
    pub moves: Vec<MoveRecord>,
    pub last_move: Option<(String, String)>,
    pub clock: Option<ClockSnapshot>,
    pub premoves_queued: usize,
    pub engine_pending: bool,
    pub game_id: Option<String>,
}
