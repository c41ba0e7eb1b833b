//! reqwest-backed implementations of the backend service traits.

use crate::error::{ClientError, ClientResult};
use crate::traits::{
    EngineRequest, EngineService, GameStore, GameSummary, MoveAppend, NewGame,
};
use async_trait::async_trait;
use serde::Deserialize;

/// HTTP client for the chess backend. Cheap to clone.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct EngineMoveResponse {
    #[serde(rename = "move")]
    mv: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct CreateGameResponse {
    id: String,
}

#[derive(Deserialize)]
struct GamesResponse {
    #[serde(default)]
    games: Vec<GameSummary>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chessmate/0.1")
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EngineService for HttpBackend {
    async fn best_move(&self, request: &EngineRequest) -> ClientResult<String> {
        let resp = self
            .client
            .post(self.url("/api/chess/move"))
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }

        let body: EngineMoveResponse = resp.json().await?;
        match (body.mv, body.error) {
            (Some(mv), _) => Ok(mv),
            (None, Some(error)) => Err(ClientError::Backend(error)),
            (None, None) => Err(ClientError::NoMove),
        }
    }
}

#[async_trait]
impl GameStore for HttpBackend {
    async fn create_game(&self, game: &NewGame) -> ClientResult<String> {
        let resp = self
            .client
            .post(self.url("/api/games"))
            .json(game)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }

        let body: CreateGameResponse = resp.json().await?;
        Ok(body.id)
    }

    async fn append_move(&self, game_id: &str, entry: &MoveAppend) -> ClientResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/api/games/{}/moves", game_id)))
            .json(entry)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(())
    }

    async fn list_games(&self) -> ClientResult<Vec<GameSummary>> {
        let resp = self.client.get(self.url("/api/games")).send().await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }

        let body: GamesResponse = resp.json().await?;
        Ok(body.games)
    }

    async fn delete_game(&self, game_id: &str) -> ClientResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/games/{}", game_id)))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(())
    }
}
