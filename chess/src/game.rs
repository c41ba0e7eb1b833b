use cozy_chess::{Board, File, Move, Piece, Rank};

use crate::fen::{self, FenError};
use crate::san::format_san;
use crate::types::{MoveRequest, PieceKind, PlayerSide};

/// Game state wrapper around a cozy-chess Board, owning the move history
/// and terminal-position classification.
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    history: Vec<HistoryEntry>,
    /// Position hashes since the start, for repetition detection.
    hashes: Vec<u64>,
    start_position: StartPosition,
}

/// One accepted move, recorded at the instant the move is applied.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub san: String,
    pub move_number: u32,
    pub color: PlayerSide,
    pub captured: Option<PieceKind>,
    pub fen_after: String,
}

/// Starting position of the game.
#[derive(Debug, Clone)]
pub enum StartPosition {
    Standard,
    Fen(String),
}

/// Why a position is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Repetition,
    FiftyMoveRule,
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("FEN parse error: {0}")]
    Fen(#[from] FenError),
}

impl Game {
    /// Create a new game from the standard starting position.
    pub fn new() -> Self {
        let position = Board::default();
        let hashes = vec![position.hash()];
        Self {
            position,
            history: Vec::new(),
            hashes,
            start_position: StartPosition::Standard,
        }
    }

    /// Create a game from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = fen::parse_fen(fen)?;
        let hashes = vec![position.hash()];
        Ok(Self {
            position,
            history: Vec::new(),
            hashes,
            start_position: StartPosition::Fen(fen.to_string()),
        })
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn side_to_move(&self) -> PlayerSide {
        PlayerSide::from(self.position.side_to_move())
    }

    pub fn to_fen(&self) -> String {
        fen::format_fen(&self.position)
    }

    pub fn start_fen(&self) -> String {
        match &self.start_position {
            StartPosition::Standard => fen::format_fen(&Board::default()),
            StartPosition::Fen(f) => f.clone(),
        }
    }

    /// All legal moves for the current position.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Resolve a move request against the current legal moves.
    ///
    /// Normalizes UCI-style castling (king two squares) to cozy-chess
    /// king-takes-rook encoding, and defaults an unspecified promotion
    /// piece to a queen. Returns None if no legal move matches.
    pub fn resolve(&self, req: MoveRequest) -> Option<Move> {
        let legal = self.legal_moves();
        let req = normalize_castling(req, &self.position, &legal);
        let mut queen_promotion = None;
        for mv in &legal {
            if mv.from != req.from || mv.to != req.to {
                continue;
            }
            match (req.promotion, mv.promotion) {
                (Some(want), Some(have)) if Piece::from(want) == have => return Some(*mv),
                (None, None) => return Some(*mv),
                (None, Some(Piece::Queen)) => queen_promotion = Some(*mv),
                _ => {}
            }
        }
        queen_promotion
    }

    /// Apply a move request. Rejects anything not legal in the current
    /// position, leaving the game untouched.
    pub fn make_move(&mut self, req: MoveRequest) -> Result<HistoryEntry, GameError> {
        let mv = self.resolve(req).ok_or(GameError::IllegalMove)?;

        let color = self.side_to_move();
        let move_number = u32::from(self.position.fullmove_number());
        let san = format_san(&self.position, mv);
        let captured = captured_piece(&self.position, mv);

        self.position.play_unchecked(mv);
        self.hashes.push(self.position.hash());

        let entry = HistoryEntry {
            mv,
            san,
            move_number,
            color,
            captured,
            fen_after: self.to_fen(),
        };
        self.history.push(entry.clone());
        Ok(entry)
    }

    /// Classify the current position if it is terminal.
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        if self.legal_moves().is_empty() {
            return if self.position.checkers().is_empty() {
                Some(TerminalReason::Stalemate)
            } else {
                Some(TerminalReason::Checkmate)
            };
        }
        if self.position.halfmove_clock() >= 100 {
            return Some(TerminalReason::FiftyMoveRule);
        }
        if insufficient_material(&self.position) {
            return Some(TerminalReason::InsufficientMaterial);
        }
        if self.is_repetition() {
            return Some(TerminalReason::Repetition);
        }
        None
    }

    pub fn is_game_over(&self) -> bool {
        self.terminal_reason().is_some()
    }

    /// Rebuild the position by replaying the move log from the start.
    /// The result must equal the current position.
    pub fn replayed_position(&self) -> Result<Board, GameError> {
        let mut board = match &self.start_position {
            StartPosition::Standard => Board::default(),
            StartPosition::Fen(f) => fen::parse_fen(f)?,
        };
        for entry in &self.history {
            board.play_unchecked(entry.mv);
        }
        Ok(board)
    }

    /// Threefold repetition of the current position, scanning back no
    /// further than the halfmove clock allows.
    fn is_repetition(&self) -> bool {
        let current = self.position.hash();
        let repetitions = self
            .hashes
            .iter()
            .rev()
            .take(self.position.halfmove_clock() as usize + 1)
            .step_by(2)
            .filter(|&&hash| hash == current)
            .count();
        repetitions >= 3
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

/// The piece removed by a move, accounting for en passant. Castling
/// (encoded king-takes-own-rook) captures nothing.
fn captured_piece(board: &Board, mv: Move) -> Option<PieceKind> {
    if board.color_on(mv.to) == Some(board.side_to_move()) {
        return None;
    }
    if let Some(piece) = board.piece_on(mv.to) {
        return Some(PieceKind::from(piece));
    }
    let is_en_passant =
        board.piece_on(mv.from) == Some(Piece::Pawn) && mv.from.file() != mv.to.file();
    is_en_passant.then_some(PieceKind::Pawn)
}

/// Neither side can deliver mate: no pawns, rooks, or queens, and at most
/// one minor piece on the board. (Same-colored-bishop draws are left to
/// the fifty-move rule.)
fn insufficient_material(board: &Board) -> bool {
    let heavy =
        board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }
    let minors = board.pieces(Piece::Knight) | board.pieces(Piece::Bishop);
    minors.len() <= 1
}

/// Convert UCI castling notation (king moves two squares: e1g1) to the
/// cozy-chess king-takes-rook encoding (e1h1), when that is what the
/// request denotes.
fn normalize_castling(req: MoveRequest, board: &Board, legal: &[Move]) -> MoveRequest {
    let is_back_rank = matches!(req.from.rank(), Rank::First | Rank::Eighth);
    let is_king = board.piece_on(req.from) == Some(Piece::King);
    let is_e_file = req.from.file() == File::E;
    let is_g_or_c = matches!(req.to.file(), File::G | File::C);

    if !(is_back_rank && is_king && is_e_file && is_g_or_c && req.promotion.is_none()) {
        return req;
    }

    let rook_file = if req.to.file() == File::G {
        File::H
    } else {
        File::A
    };
    let converted = MoveRequest::new(
        req.from,
        cozy_chess::Square::new(rook_file, req.from.rank()),
    );
    let matches_legal = legal
        .iter()
        .any(|mv| mv.from == converted.from && mv.to == converted.to);
    if matches_legal {
        converted
    } else {
        req
    }
}
