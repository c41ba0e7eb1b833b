//! Internal mutable state, owned entirely by the session actor. No locks.

use chess::{format_square, Game, HistoryEntry, MoveRequest, PlayerSide, TerminalReason};
use cozy_chess::{Board, Square};
use rand::Rng;

use crate::clock::Clock;
use crate::commands::{GameConfig, Opponent, SessionError, SideChoice};
use crate::premove::{GestureOutcome, PremoveEntry, PremoveQueue};
use crate::snapshot::{
    DrawReason, MatchPhase, MoveRecord, SessionResult, SessionSnapshot, WinReason,
};

pub(crate) struct SessionState {
    pub session_id: String,
    pub phase: MatchPhase,
    pub game: Game,
    pub user_side: Option<PlayerSide>,
    pub config: GameConfig,
    pub clock: Option<Clock>,
    pub premoves: PremoveQueue,
    /// Bumped on every game start, reset, and game end. Async replies tagged
    /// with an older generation are stale and must be dropped.
    pub generation: u64,
    pub engine_pending: bool,
    /// Backend log id; persistence is a no-op while absent.
    pub game_id: Option<String>,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            phase: MatchPhase::SideSelection,
            game: Game::new(),
            user_side: None,
            config: GameConfig::default(),
            clock: None,
            premoves: PremoveQueue::new(),
            generation: 0,
            engine_pending: false,
            game_id: None,
        }
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let in_game = self.phase != MatchPhase::SideSelection;
        let moves: Vec<MoveRecord> = self
            .game
            .history()
            .iter()
            .map(|entry| MoveRecord {
                san: entry.san.clone(),
                move_number: entry.move_number,
                color: entry.color,
            })
            .collect();

        let last_move = self
            .game
            .history()
            .last()
            .map(|entry| (format_square(entry.mv.from), format_square(entry.mv.to)));

        SessionSnapshot {
            session_id: self.session_id.clone(),
            phase: self.phase,
            fen: in_game.then(|| self.game.to_fen()),
            side_to_move: in_game.then(|| self.game.side_to_move()),
            user_side: self.user_side,
            result: self.result(),
            moves,
            last_move,
            clock: self.clock.as_ref().map(Clock::snapshot),
            premoves_queued: self.premoves.len(),
            engine_pending: self.engine_pending,
            game_id: self.game_id.clone(),
        }
    }

    pub fn result(&self) -> SessionResult {
        match self.phase {
            MatchPhase::GameOver(result) => result,
            _ => SessionResult::InProgress,
        }
    }

    /// Leave side selection: resolve the side choice and begin a game.
    pub fn start_game(
        &mut self,
        choice: SideChoice,
        config: GameConfig,
    ) -> Result<SessionSnapshot, SessionError> {
        if self.phase == MatchPhase::Playing {
            return Err(SessionError::AlreadyStarted);
        }
        let side = match choice {
            SideChoice::White => PlayerSide::White,
            SideChoice::Black => PlayerSide::Black,
            SideChoice::Random => {
                if rand::rng().random_bool(0.5) {
                    PlayerSide::White
                } else {
                    PlayerSide::Black
                }
            }
        };
        self.begin(config, side);
        Ok(self.snapshot())
    }

    /// Restart with the same configuration and side.
    pub fn rematch(&mut self) -> Result<SessionSnapshot, SessionError> {
        if self.phase == MatchPhase::Playing {
            return Err(SessionError::AlreadyStarted);
        }
        let side = self.user_side.ok_or(SessionError::NotPlaying)?;
        self.begin(self.config, side);
        Ok(self.snapshot())
    }

    /// Return to side selection, discarding everything.
    pub fn reset(&mut self) -> SessionSnapshot {
        self.generation += 1;
        self.phase = MatchPhase::SideSelection;
        self.game = Game::new();
        self.user_side = None;
        self.clock = None;
        self.premoves.cancel();
        self.engine_pending = false;
        self.game_id = None;
        self.snapshot()
    }

    fn begin(&mut self, config: GameConfig, side: PlayerSide) {
        self.generation += 1;
        self.game = Game::new();
        self.user_side = Some(side);
        self.config = config;
        self.premoves.cancel();
        self.engine_pending = false;
        self.game_id = None;
        self.clock = config.time_control.map(Clock::new);
        if let Some(clock) = self.clock.as_mut() {
            clock.start(PlayerSide::White);
        }
        self.phase = MatchPhase::Playing;
    }

    /// Apply a move from the user (or a premove replay).
    pub fn submit_user_move(
        &mut self,
        request: MoveRequest,
    ) -> Result<HistoryEntry, SessionError> {
        if self.phase != MatchPhase::Playing {
            return Err(SessionError::NotPlaying);
        }
        if request.from == request.to {
            return Err(SessionError::IllegalMove);
        }
        if let Opponent::Engine { .. } = self.config.opponent {
            if self.user_side != Some(self.game.side_to_move()) {
                return Err(SessionError::NotYourTurn);
            }
        }
        self.apply_move(request)
    }

    /// Apply a move suggested by the engine. The suggestion is untrusted:
    /// it is validated against the current position like any other move.
    pub fn apply_engine_move(&mut self, uci: &str) -> Result<HistoryEntry, SessionError> {
        if self.phase != MatchPhase::Playing {
            return Err(SessionError::NotPlaying);
        }
        let request = MoveRequest::parse_uci(uci).ok_or(SessionError::IllegalMove)?;
        if self.user_side == Some(self.game.side_to_move()) {
            return Err(SessionError::NotYourTurn);
        }
        self.apply_move(request)
    }

    fn apply_move(&mut self, request: MoveRequest) -> Result<HistoryEntry, SessionError> {
        let entry = self
            .game
            .make_move(request)
            .map_err(|_| SessionError::IllegalMove)?;

        if let Some(reason) = self.game.terminal_reason() {
            self.finish(result_from_terminal(reason, entry.color));
        } else if let Some(clock) = self.clock.as_mut() {
            clock.set_running_side(self.game.side_to_move());
        }
        Ok(entry)
    }

    /// The user resigns; in a two-human game the side to move resigns.
    pub fn resign(&mut self) -> Result<SessionResult, SessionError> {
        if self.phase != MatchPhase::Playing {
            return Err(SessionError::NotPlaying);
        }
        let resigning = match self.config.opponent {
            Opponent::Engine { .. } => self
                .user_side
                .unwrap_or_else(|| self.game.side_to_move()),
            Opponent::Human => self.game.side_to_move(),
        };
        let result = SessionResult::win(resigning.opposite(), WinReason::Resignation);
        self.finish(result);
        Ok(result)
    }

    /// Tick the clock; on a flag fall, end the game by timeout.
    pub fn tick_clock(&mut self) -> Option<SessionResult> {
        let clock = self.clock.as_mut()?;
        let flagged = clock.tick()?;
        let result = SessionResult::win(flagged.opposite(), WinReason::Timeout);
        self.finish(result);
        Some(result)
    }

    pub fn clock_running(&self) -> bool {
        self.phase == MatchPhase::Playing
            && self.clock.as_ref().is_some_and(Clock::is_running)
    }

    /// The engine should move now: playing against an engine, its turn,
    /// and no request already outstanding.
    pub fn should_request_engine(&self) -> bool {
        self.phase == MatchPhase::Playing
            && !self.engine_pending
            && matches!(self.config.opponent, Opponent::Engine { .. })
            && self
                .user_side
                .is_some_and(|user| self.game.side_to_move() != user)
    }

    /// One click of the premove gesture. Only meaningful while waiting for
    /// the engine; anything else is ignored.
    pub fn click_square(&mut self, square: Square) -> GestureOutcome {
        if self.phase != MatchPhase::Playing {
            return GestureOutcome::Ignored;
        }
        if !matches!(self.config.opponent, Opponent::Engine { .. }) {
            return GestureOutcome::Ignored;
        }
        let Some(user) = self.user_side else {
            return GestureOutcome::Ignored;
        };
        if self.game.side_to_move() == user {
            return GestureOutcome::Ignored;
        }

        let game = &self.game;
        let user_color = cozy_chess::Color::from(user);
        self.premoves.click(
            square,
            |sq| game.position().color_on(sq) == Some(user_color),
            |entry| premove_is_legal(game.position(), entry),
        )
    }

    fn finish(&mut self, result: SessionResult) {
        self.phase = MatchPhase::GameOver(result);
        if let Some(clock) = self.clock.as_mut() {
            clock.stop();
        }
        self.premoves.cancel();
        self.engine_pending = false;
        // Any outstanding engine request is stale from here on.
        self.generation += 1;
    }
}

/// Would the entry be a legal move for the user's pieces on the board as it
/// stands? Evaluated by passing the turn (null move); if the side to move
/// is in check a null move is impossible and the gesture is dropped.
fn premove_is_legal(board: &Board, entry: PremoveEntry) -> bool {
    let Some(passed) = board.null_move() else {
        return false;
    };
    let mut legal = false;
    passed.generate_moves(|moves| {
        for mv in moves {
            if mv.from == entry.from && mv.to == entry.to {
                legal = true;
                return true;
            }
        }
        false
    });
    legal
}

fn result_from_terminal(reason: TerminalReason, mover: PlayerSide) -> SessionResult {
    match reason {
        TerminalReason::Checkmate => SessionResult::win(mover, WinReason::Checkmate),
        TerminalReason::Stalemate => SessionResult::Draw(DrawReason::Stalemate),
        TerminalReason::InsufficientMaterial => {
            SessionResult::Draw(DrawReason::InsufficientMaterial)
        }
        TerminalReason::Repetition => SessionResult::Draw(DrawReason::Repetition),
        TerminalReason::FiftyMoveRule => SessionResult::Draw(DrawReason::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeControl;
    use backend_client::EngineKind;
    use chess::parse_square;

    fn engine_config() -> GameConfig {
        GameConfig {
            opponent: Opponent::Engine {
                kind: EngineKind::Minimax,
                depth: 3,
                use_book: false,
            },
            time_control: Some(TimeControl::from_secs(300, 0)),
        }
    }

    fn playing_state(side: SideChoice) -> SessionState {
        let mut state = SessionState::new("test".to_string());
        state.start_game(side, engine_config()).unwrap();
        state
    }

    fn req(uci: &str) -> MoveRequest {
        MoveRequest::parse_uci(uci).unwrap()
    }

    #[test]
    fn test_initial_snapshot_is_side_selection() {
        let state = SessionState::new("test".to_string());
        let snap = state.snapshot();
        assert_eq!(snap.phase, MatchPhase::SideSelection);
        assert!(snap.fen.is_none());
        assert!(snap.moves.is_empty());
        assert_eq!(snap.result, SessionResult::InProgress);
    }

    #[test]
    fn test_start_game_as_white() {
        let state = playing_state(SideChoice::White);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.user_side, Some(PlayerSide::White));
        assert!(!state.should_request_engine());
        assert!(state.clock_running());
    }

    #[test]
    fn test_start_game_as_black_wants_engine_move() {
        let state = playing_state(SideChoice::Black);
        assert!(state.should_request_engine());
    }

    #[test]
    fn test_random_side_resolves() {
        let state = playing_state(SideChoice::Random);
        assert!(state.user_side.is_some());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut state = playing_state(SideChoice::White);
        assert!(matches!(
            state.start_game(SideChoice::White, engine_config()),
            Err(SessionError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_submit_move_out_of_turn_rejected() {
        let mut state = playing_state(SideChoice::Black);
        // White (the engine) is to move
        assert!(matches!(
            state.submit_user_move(req("e7e5")),
            Err(SessionError::NotYourTurn)
        ));
    }

    #[test]
    fn test_rejected_move_leaves_state_identical() {
        let mut state = playing_state(SideChoice::White);
        let before = state.snapshot();
        assert!(state.submit_user_move(req("e2e5")).is_err());
        let after = state.snapshot();
        assert_eq!(before.fen, after.fen);
        assert_eq!(before.moves, after.moves);
        assert_eq!(before.side_to_move, after.side_to_move);
    }

    #[test]
    fn test_degenerate_move_rejected() {
        let mut state = playing_state(SideChoice::White);
        assert!(matches!(
            state.submit_user_move(MoveRequest::new(
                parse_square("e2").unwrap(),
                parse_square("e2").unwrap(),
            )),
            Err(SessionError::IllegalMove)
        ));
    }

    #[test]
    fn test_accepted_move_switches_clock_and_turn() {
        let mut state = playing_state(SideChoice::White);
        let entry = state.submit_user_move(req("e2e4")).unwrap();
        assert_eq!(entry.san, "e4");
        assert_eq!(state.game.side_to_move(), PlayerSide::Black);
        assert_eq!(
            state.clock.as_ref().unwrap().running_side(),
            Some(PlayerSide::Black)
        );
        assert!(state.should_request_engine());
    }

    #[test]
    fn test_engine_move_validated() {
        let mut state = playing_state(SideChoice::Black);
        assert!(state.apply_engine_move("e2e5").is_err());
        assert!(state.apply_engine_move("garbage").is_err());
        assert!(state.apply_engine_move("e2e4").is_ok());
        // Now it is the user's turn; an engine move is out of turn
        assert!(matches!(
            state.apply_engine_move("d2d4"),
            Err(SessionError::NotYourTurn)
        ));
    }

    #[test]
    fn test_checkmate_finishes_game() {
        let mut state = playing_state(SideChoice::White);
        state.config.opponent = Opponent::Human;
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            state.submit_user_move(req(uci)).unwrap();
        }
        assert_eq!(
            state.result(),
            SessionResult::BlackWins(WinReason::Checkmate)
        );
        assert!(!state.clock_running());
        assert!(!state.should_request_engine());
    }

    #[test]
    fn test_resign_gives_opponent_the_win() {
        let mut state = playing_state(SideChoice::White);
        let result = state.resign().unwrap();
        assert_eq!(result, SessionResult::BlackWins(WinReason::Resignation));
        assert_eq!(state.phase, MatchPhase::GameOver(result));
        assert!(state.resign().is_err());
    }

    #[test]
    fn test_timeout_ends_game_once() {
        let mut state = SessionState::new("test".to_string());
        let mut config = engine_config();
        config.time_control = Some(TimeControl::from_secs(0, 0));
        state.start_game(SideChoice::White, config).unwrap();

        let result = state.tick_clock().unwrap();
        assert_eq!(result, SessionResult::BlackWins(WinReason::Timeout));
        assert!(!state.clock_running());
        // Clock stopped; no further tick can fire
        assert!(state.tick_clock().is_none());
    }

    #[test]
    fn test_premove_gesture_queues_while_engine_to_move() {
        let mut state = playing_state(SideChoice::White);
        state.submit_user_move(req("e2e4")).unwrap();

        // Engine to move: clicking own knight then its destination queues
        let g1 = parse_square("g1").unwrap();
        let f3 = parse_square("f3").unwrap();
        assert_eq!(state.click_square(g1), GestureOutcome::Selected(g1));
        assert!(matches!(
            state.click_square(f3),
            GestureOutcome::Queued(_)
        ));
        assert_eq!(state.premoves.len(), 1);
    }

    #[test]
    fn test_premove_illegal_against_current_position_never_queues() {
        let mut state = playing_state(SideChoice::White);
        state.submit_user_move(req("e2e4")).unwrap();

        // Ng1-g3 is not a knight move on the board as it stands
        let g1 = parse_square("g1").unwrap();
        let g3 = parse_square("g3").unwrap();
        state.click_square(g1);
        assert_eq!(state.click_square(g3), GestureOutcome::Dropped);
        assert!(state.premoves.is_empty());
    }

    #[test]
    fn test_premove_ignored_on_users_own_turn() {
        let mut state = playing_state(SideChoice::White);
        let e2 = parse_square("e2").unwrap();
        assert_eq!(state.click_square(e2), GestureOutcome::Ignored);
    }

    #[test]
    fn test_premove_first_click_must_be_own_piece() {
        let mut state = playing_state(SideChoice::White);
        state.submit_user_move(req("e2e4")).unwrap();
        // e7 holds a black pawn; e5 is empty
        assert_eq!(
            state.click_square(parse_square("e7").unwrap()),
            GestureOutcome::Ignored
        );
        assert_eq!(
            state.click_square(parse_square("e5").unwrap()),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn test_reset_returns_to_side_selection_and_bumps_generation() {
        let mut state = playing_state(SideChoice::White);
        let generation = state.generation;
        state.submit_user_move(req("e2e4")).unwrap();
        let snap = state.reset();
        assert_eq!(snap.phase, MatchPhase::SideSelection);
        assert!(snap.moves.is_empty());
        assert!(state.generation > generation);
        assert!(state.clock.is_none());
    }

    #[test]
    fn test_rematch_keeps_side_and_config() {
        let mut state = playing_state(SideChoice::Black);
        assert!(matches!(state.rematch(), Err(SessionError::AlreadyStarted)));
        state.resign().unwrap();
        let snap = state.rematch().unwrap();
        assert_eq!(snap.phase, MatchPhase::Playing);
        assert_eq!(state.user_side, Some(PlayerSide::Black));
        assert!(snap.moves.is_empty());
    }

    #[test]
    fn test_human_opponent_allows_both_sides_no_engine() {
        let mut state = SessionState::new("test".to_string());
        let config = GameConfig {
            opponent: Opponent::Human,
            time_control: None,
        };
        state.start_game(SideChoice::White, config).unwrap();
        state.submit_user_move(req("e2e4")).unwrap();
        state.submit_user_move(req("e7e5")).unwrap();
        assert!(!state.should_request_engine());
        assert_eq!(
            state.click_square(parse_square("g1").unwrap()),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn test_move_log_replay_matches_position() {
        let mut state = playing_state(SideChoice::White);
        state.config.opponent = Opponent::Human;
        for uci in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            state.submit_user_move(req(uci)).unwrap();
        }
        let snap = state.snapshot();
        assert_eq!(snap.moves.len(), 4);
        let replayed = state.game.replayed_position().unwrap();
        assert_eq!(replayed.to_string(), snap.fen.unwrap());
    }
}
