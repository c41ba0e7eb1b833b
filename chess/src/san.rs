//! Standard algebraic notation for moves.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

/// Format a legal move as SAN against the position it is played from.
///
/// Handles castling, captures (including en passant), promotion,
/// disambiguation, and check/checkmate suffixes.
pub fn format_san(board: &Board, mv: Move) -> String {
    let piece = board.piece_on(mv.from).expect("move from empty square");
    let stm = board.side_to_move();

    // cozy-chess encodes castling as king-takes-own-rook.
    let is_castling = piece == Piece::King && board.color_on(mv.to) == Some(stm);

    let mut san = if is_castling {
        if (mv.to.file() as u8) > (mv.from.file() as u8) {
            "O-O".to_string()
        } else {
            "O-O-O".to_string()
        }
    } else {
        let is_capture = board.piece_on(mv.to).is_some()
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        let mut s = String::new();
        match piece {
            Piece::Pawn => {
                if is_capture {
                    s.push(file_char(mv.from.file()));
                }
            }
            _ => {
                s.push(piece_char(piece));
                s.push_str(&disambiguation(board, mv, piece));
            }
        }
        if is_capture {
            s.push('x');
        }
        s.push(file_char(mv.to.file()));
        s.push(rank_char(mv.to.rank()));
        if let Some(promo) = mv.promotion {
            s.push('=');
            s.push(piece_char(promo));
        }
        s
    };

    san.push_str(suffix(board, mv));
    san
}

/// Disambiguate between legal moves of the same piece kind to the same
/// destination: file if unique, else rank, else both.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals: Vec<Square> = Vec::new();
    board.generate_moves(|moves| {
        for other in moves {
            if other.to == mv.to
                && other.from != mv.from
                && board.piece_on(other.from) == Some(piece)
            {
                rivals.push(other.from);
            }
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }

    let file_unique = rivals.iter().all(|sq| sq.file() != mv.from.file());
    let rank_unique = rivals.iter().all(|sq| sq.rank() != mv.from.rank());

    let mut s = String::new();
    if file_unique {
        s.push(file_char(mv.from.file()));
    } else if rank_unique {
        s.push(rank_char(mv.from.rank()));
    } else {
        s.push(file_char(mv.from.file()));
        s.push(rank_char(mv.from.rank()));
    }
    s
}

/// Check ('+') or checkmate ('#') suffix for the position after the move.
fn suffix(board: &Board, mv: Move) -> &'static str {
    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.checkers().is_empty() {
        return "";
    }
    let mut has_reply = false;
    after.generate_moves(|_| {
        has_reply = true;
        true
    });
    if has_reply {
        "+"
    } else {
        "#"
    }
}

fn piece_char(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(file: File) -> char {
    (b'a' + file as u8) as char
}

fn rank_char(rank: Rank) -> char {
    (b'1' + rank as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        fen.parse().unwrap()
    }

    fn mv(uci: &str, board: &Board) -> Move {
        let req = crate::types::MoveRequest::parse_uci(uci).unwrap();
        let mut found = None;
        board.generate_moves(|moves| {
            for m in moves {
                if m.from == req.from
                    && m.to == req.to
                    && (m.promotion.is_none() || m.promotion == Some(Piece::Queen))
                {
                    found = Some(m);
                }
            }
            false
        });
        found.expect("move not legal in test position")
    }

    #[test]
    fn test_pawn_push() {
        let b = Board::default();
        assert_eq!(format_san(&b, mv("e2e4", &b)), "e4");
    }

    #[test]
    fn test_knight_move() {
        let b = Board::default();
        assert_eq!(format_san(&b, mv("g1f3", &b)), "Nf3");
    }

    #[test]
    fn test_pawn_capture_includes_file() {
        let b = board("rnbqkbnr/pppp1ppp/8/4p3/3P4/8/PPP1PPPP/RNBQKBNR w KQkq - 0 2");
        assert_eq!(format_san(&b, mv("d4e5", &b)), "dxe5");
    }

    #[test]
    fn test_en_passant_is_a_capture() {
        let b = board("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        assert_eq!(format_san(&b, mv("e5f6", &b)), "exf6");
    }

    #[test]
    fn test_kingside_castling() {
        let b = board("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4");
        // cozy-chess castling move: king takes own rook
        assert_eq!(format_san(&b, mv("e1h1", &b)), "O-O");
    }

    #[test]
    fn test_knight_disambiguation_by_file() {
        // Knights on a1 and e1 can both reach c2
        let b = board("7k/8/8/8/8/8/8/N3N2K w - - 0 1");
        assert_eq!(format_san(&b, mv("a1c2", &b)), "Nac2");
        assert_eq!(format_san(&b, mv("e1c2", &b)), "Nec2");
    }

    #[test]
    fn test_promotion() {
        let b = board("8/P6k/8/8/8/8/7K/8 w - - 0 1");
        assert_eq!(format_san(&b, mv("a7a8", &b)), "a8=Q");
    }

    #[test]
    fn test_checkmate_suffix() {
        // Fool's mate: 1. f3 e5 2. g4 Qh4#
        let b = board("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2");
        assert_eq!(format_san(&b, mv("d8h4", &b)), "Qh4#");
    }

    #[test]
    fn test_check_suffix() {
        // After 1. e4 d5, Bb5 gives check
        let b = board("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2");
        assert_eq!(format_san(&b, mv("f1b5", &b)), "Bb5+");
    }
}
