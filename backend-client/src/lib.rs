//! Clients for the chess backend: the engine move service and the
//! append-only game log.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod traits;

pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBackend, MockCall};
pub use traits::{
    EngineKind, EngineRequest, EngineService, GameStore, GameSummary, MoveAppend, NewGame,
};
