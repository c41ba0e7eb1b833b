pub mod fen;
pub mod game;
pub mod san;
pub mod types;

pub use game::{Game, GameError, HistoryEntry, StartPosition, TerminalReason};
pub use types::{
    format_square, parse_square, MoveRequest, PieceKind, PlayerSide,
};
