//! Mock backend implementation for testing.

use crate::error::{ClientError, ClientResult};
use crate::traits::{
    EngineRequest, EngineService, GameStore, GameSummary, MoveAppend, NewGame,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Configurable test double for both backend services. Records every call
/// for later verification. Only compiled in test mode or with the `mock`
/// feature.
#[derive(Default)]
pub struct MockBackend {
    engine_replies: Mutex<VecDeque<Result<String, String>>>,
    engine_delay: Mutex<Option<Duration>>,
    create_failure: Mutex<Option<String>>,
    append_failure: Mutex<Option<String>>,
    games: Mutex<Vec<GameSummary>>,
    appended: Mutex<Vec<(String, MoveAppend)>>,
    calls: Mutex<Vec<MockCall>>,
}

#[derive(Debug, Clone)]
pub enum MockCall {
    BestMove { fen: String },
    CreateGame { opponent_type: String },
    AppendMove { game_id: String, mv: String },
    ListGames,
    DeleteGame { game_id: String },
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an engine reply (UCI move string). Replies are consumed FIFO.
    pub fn push_engine_move(&self, mv: &str) {
        self.engine_replies
            .lock()
            .unwrap()
            .push_back(Ok(mv.to_string()));
    }

    /// Queue an engine failure.
    pub fn push_engine_error(&self, message: &str) {
        self.engine_replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Delay every engine reply, to simulate an in-flight request.
    pub fn set_engine_delay(&self, delay: Duration) {
        *self.engine_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_create_game(&self, message: &str) {
        *self.create_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_append_move(&self, message: &str) {
        *self.append_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_games(&self, games: Vec<GameSummary>) {
        *self.games.lock().unwrap() = games;
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// All appended moves, in order.
    pub fn appended_moves(&self) -> Vec<(String, MoveAppend)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineService for MockBackend {
    async fn best_move(&self, request: &EngineRequest) -> ClientResult<String> {
        self.calls.lock().unwrap().push(MockCall::BestMove {
            fen: request.fen.clone(),
        });

        let delay = *self.engine_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.engine_replies.lock().unwrap().pop_front() {
            Some(Ok(mv)) => Ok(mv),
            Some(Err(message)) => Err(ClientError::Backend(message)),
            None => Err(ClientError::NotConfigured("best_move".to_string())),
        }
    }
}

#[async_trait]
impl GameStore for MockBackend {
    async fn create_game(&self, game: &NewGame) -> ClientResult<String> {
        self.calls.lock().unwrap().push(MockCall::CreateGame {
            opponent_type: game.opponent_type.clone(),
        });

        if let Some(message) = self.create_failure.lock().unwrap().clone() {
            return Err(ClientError::Backend(message));
        }
        Ok("mock-game-001".to_string())
    }

    async fn append_move(&self, game_id: &str, entry: &MoveAppend) -> ClientResult<()> {
        self.calls.lock().unwrap().push(MockCall::AppendMove {
            game_id: game_id.to_string(),
            mv: entry.mv.clone(),
        });

        if let Some(message) = self.append_failure.lock().unwrap().clone() {
            return Err(ClientError::Backend(message));
        }
        self.appended
            .lock()
            .unwrap()
            .push((game_id.to_string(), entry.clone()));
        Ok(())
    }

    async fn list_games(&self) -> ClientResult<Vec<GameSummary>> {
        self.calls.lock().unwrap().push(MockCall::ListGames);
        Ok(self.games.lock().unwrap().clone())
    }

    async fn delete_game(&self, game_id: &str) -> ClientResult<()> {
        self.calls.lock().unwrap().push(MockCall::DeleteGame {
            game_id: game_id.to_string(),
        });
        self.games.lock().unwrap().retain(|g| g.id != game_id);
        Ok(())
    }
}
