//! Service trait abstractions for the engine and game-log backends.

use crate::error::ClientResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which move provider the backend should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Minimax,
    Neural,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimax => "minimax",
            Self::Neural => "neural",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A move suggestion request for the current position.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRequest {
    pub fen: String,
    pub engine: EngineKind,
    pub depth: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_book: Option<bool>,
}

/// Payload for creating a game in the remote log.
#[derive(Debug, Clone, Serialize)]
pub struct NewGame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
    pub user_color: String,
    /// Initial time in seconds; None for untimed games.
    pub time_control: Option<u64>,
    pub opponent_type: String,
}

/// One appended move. A terminal append may carry the game result;
/// an append with an empty move records a result reached without a move
/// (resignation, timeout).
#[derive(Debug, Clone, Serialize)]
pub struct MoveAppend {
    #[serde(rename = "move")]
    pub mv: String,
    pub white_time: u64,
    pub black_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// A game as listed by the remote log.
#[derive(Debug, Clone, Deserialize)]
pub struct GameSummary {
    pub id: String,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub depth: Option<u8>,
    #[serde(default)]
    pub user_color: Option<String>,
    #[serde(default)]
    pub time_control: Option<u64>,
    #[serde(default)]
    pub opponent_type: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// Asynchronous move-suggestion provider.
#[async_trait]
pub trait EngineService: Send + Sync {
    /// Best move for the position, as a UCI string.
    async fn best_move(&self, request: &EngineRequest) -> ClientResult<String>;
}

/// Append-only remote game log. All calls are best-effort from the
/// session's point of view.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Create a game record; returns its id.
    async fn create_game(&self, game: &NewGame) -> ClientResult<String>;

    async fn append_move(&self, game_id: &str, entry: &MoveAppend) -> ClientResult<()>;

    async fn list_games(&self) -> ClientResult<Vec<GameSummary>>;

    async fn delete_game(&self, game_id: &str) -> ClientResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EngineKind::Minimax).unwrap(),
            "\"minimax\""
        );
        assert_eq!(
            serde_json::to_string(&EngineKind::Neural).unwrap(),
            "\"neural\""
        );
    }

    #[test]
    fn test_engine_request_wire_shape() {
        let request = EngineRequest {
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            engine: EngineKind::Minimax,
            depth: 3,
            use_book: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["engine"], "minimax");
        assert_eq!(json["depth"], 3);
        assert!(json.get("use_book").is_none());
    }

    #[test]
    fn test_move_append_renames_move_field() {
        let append = MoveAppend {
            mv: "e4".to_string(),
            white_time: 300_000,
            black_time: 300_000,
            result: None,
        };
        let json = serde_json::to_value(&append).unwrap();
        assert_eq!(json["move"], "e4");
        assert!(json.get("result").is_none());
    }
}
