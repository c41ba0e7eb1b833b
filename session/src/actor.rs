//! The session actor loop.
//!
//! Owns all mutable state. Processes commands, engine replies, and clock
//! ticks sequentially on one task; the only suspension points are the
//! channels and the clock interval.

use std::sync::Arc;

use backend_client::{ClientError, EngineRequest, MoveAppend, NewGame};
use chess::{HistoryEntry, MoveRequest};
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::Instrument;

use crate::commands::{Opponent, SessionCommand};
use crate::events::SessionEvent;
use crate::premove::GestureOutcome;
use crate::snapshot::{MatchPhase, MoveRecord, SessionResult};
use crate::state::SessionState;
use crate::SessionServices;

/// Replies from spawned backend calls, fed back into the actor. Each is
/// tagged with the generation current when the call was issued.
pub(crate) enum AsyncReply {
    EngineMove {
        generation: u64,
        outcome: Result<String, ClientError>,
    },
    GameCreated {
        generation: u64,
        outcome: Result<String, ClientError>,
    },
}

pub(crate) async fn run_session_actor(
    state: SessionState,
    services: SessionServices,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, services, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    services: SessionServices,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    let (task_tx, mut task_rx) = mpsc::channel::<AsyncReply>(32);

    let mut clock_interval = time::interval(time::Duration::from_millis(100));
    clock_interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut state, cmd, &services, &task_tx, &event_tx);
                    }
                }
            }

            Some(reply) = task_rx.recv() => {
                handle_async_reply(&mut state, reply, &services, &task_tx, &event_tx);
            }

            _ = clock_interval.tick(), if state.clock_running() => {
                handle_clock_tick(&mut state, &services, &event_tx);
            }
        }
    }

    tracing::info!("Session actor exited");
}

fn handle_command(
    state: &mut SessionState,
    cmd: SessionCommand,
    services: &SessionServices,
    task_tx: &mpsc::Sender<AsyncReply>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::StartGame {
            choice,
            config,
            reply,
        } => {
            let result = state.start_game(choice, config);
            if result.is_ok() {
                spawn_create_game(state, services, task_tx);
                maybe_request_engine(state, services, task_tx);
                let snap = state.snapshot();
                let _ = event_tx.send(SessionEvent::StateChanged(snap.clone()));
                let _ = reply.send(Ok(snap));
            } else {
                let _ = reply.send(result);
            }
        }
        SessionCommand::SubmitMove { request, reply } => {
            match state.submit_user_move(request) {
                Ok(entry) => {
                    emit_move(state, &entry, services, event_tx);
                    maybe_request_engine(state, services, task_tx);
                    let _ = reply.send(Ok(state.snapshot()));
                }
                Err(err) => {
                    let _ = event_tx.send(SessionEvent::MoveRejected);
                    let _ = reply.send(Err(err));
                }
            }
        }
        SessionCommand::ClickSquare { square, reply } => {
            let outcome = state.click_square(square);
            if let GestureOutcome::Queued(entry) = outcome {
                let _ = event_tx.send(SessionEvent::PremoveQueued(entry));
            }
            let _ = reply.send(outcome);
        }
        SessionCommand::ClearPremoves { reply } => {
            state.premoves.cancel();
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
            let _ = reply.send(());
        }
        SessionCommand::Resign { reply } => match state.resign() {
            Ok(result) => {
                let _ = event_tx.send(SessionEvent::GameOver(result));
                persist_append(state, services, String::new(), Some(result));
                let _ = reply.send(Ok(state.snapshot()));
            }
            Err(err) => {
                let _ = reply.send(Err(err));
            }
        },
        SessionCommand::Rematch { reply } => {
            let result = state.rematch();
            if result.is_ok() {
                spawn_create_game(state, services, task_tx);
                maybe_request_engine(state, services, task_tx);
                let snap = state.snapshot();
                let _ = event_tx.send(SessionEvent::StateChanged(snap.clone()));
                let _ = reply.send(Ok(snap));
            } else {
                let _ = reply.send(result);
            }
        }
        SessionCommand::Reset { reply } => {
            let snap = state.reset();
            let _ = event_tx.send(SessionEvent::StateChanged(snap.clone()));
            let _ = reply.send(snap);
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

fn handle_async_reply(
    state: &mut SessionState,
    reply: AsyncReply,
    services: &SessionServices,
    task_tx: &mpsc::Sender<AsyncReply>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match reply {
        AsyncReply::GameCreated {
            generation,
            outcome,
        } => {
            if generation != state.generation {
                tracing::debug!("Discarding stale game-creation reply");
                return;
            }
            match outcome {
                Ok(id) => {
                    tracing::info!(game_id = %id, "Game registered with backend");
                    state.game_id = Some(id);
                }
                // Persistence is best-effort: play continues without a log.
                Err(err) => tracing::warn!("Failed to create backend game record: {err}"),
            }
        }
        AsyncReply::EngineMove {
            generation,
            outcome,
        } => {
            if generation != state.generation {
                tracing::debug!("Discarding stale engine reply");
                return;
            }
            state.engine_pending = false;
            match outcome {
                Err(err) => {
                    tracing::warn!("Engine request failed: {err}");
                    let _ = event_tx.send(SessionEvent::EngineError(err.to_string()));
                }
                Ok(uci) => match state.apply_engine_move(&uci) {
                    Ok(entry) => {
                        emit_move(state, &entry, services, event_tx);
                        drain_one_premove(state, services, task_tx, event_tx);
                    }
                    Err(err) => {
                        tracing::error!(mv = %uci, "Engine suggested an unplayable move: {err}");
                        let _ = event_tx.send(SessionEvent::EngineError(format!(
                            "Engine suggested an unplayable move: {uci}"
                        )));
                    }
                },
            }
        }
    }
}

fn handle_clock_tick(
    state: &mut SessionState,
    services: &SessionServices,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if let Some(result) = state.tick_clock() {
        let _ = event_tx.send(SessionEvent::GameOver(result));
        persist_append(state, services, String::new(), Some(result));
    }
    if let Some(clock) = state.clock.as_ref() {
        let snap = clock.snapshot();
        let _ = event_tx.send(SessionEvent::ClockTick {
            white_ms: snap.white_remaining_ms,
            black_ms: snap.black_remaining_ms,
        });
    }
}

/// After an applied engine move, attempt exactly one queued premove. A
/// now-illegal entry is dropped; the remainder waits for the next drain.
fn drain_one_premove(
    state: &mut SessionState,
    services: &SessionServices,
    task_tx: &mpsc::Sender<AsyncReply>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if state.phase != MatchPhase::Playing {
        return;
    }
    let Some(entry) = state.premoves.pop() else {
        return;
    };
    match state.submit_user_move(MoveRequest::new(entry.from, entry.to)) {
        Ok(applied) => {
            emit_move(state, &applied, services, event_tx);
            maybe_request_engine(state, services, task_tx);
        }
        Err(_) => {
            let _ = event_tx.send(SessionEvent::PremoveInvalidated(entry));
        }
    }
}

/// Broadcast an accepted move, persist it, and announce the result if it
/// ended the game.
fn emit_move(
    state: &SessionState,
    entry: &HistoryEntry,
    services: &SessionServices,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    let record = MoveRecord {
        san: entry.san.clone(),
        move_number: entry.move_number,
        color: entry.color,
    };
    let _ = event_tx.send(SessionEvent::MoveAccepted {
        snapshot: state.snapshot(),
        record,
    });

    let result = state.result().is_terminal().then(|| state.result());
    persist_append(state, services, entry.san.clone(), result);
    if let Some(result) = result {
        let _ = event_tx.send(SessionEvent::GameOver(result));
    }
}

/// Issue an engine request for the current position, if one is due. The
/// reply re-enters the actor tagged with the current generation.
fn maybe_request_engine(
    state: &mut SessionState,
    services: &SessionServices,
    task_tx: &mpsc::Sender<AsyncReply>,
) {
    if !state.should_request_engine() {
        return;
    }
    let Opponent::Engine {
        kind,
        depth,
        use_book,
    } = state.config.opponent
    else {
        return;
    };

    let request = EngineRequest {
        fen: state.game.to_fen(),
        engine: kind,
        depth,
        use_book: use_book.then_some(true),
    };
    let generation = state.generation;
    let engine = Arc::clone(&services.engine);
    let tx = task_tx.clone();
    state.engine_pending = true;

    tokio::spawn(async move {
        let outcome = engine.best_move(&request).await;
        let _ = tx
            .send(AsyncReply::EngineMove {
                generation,
                outcome,
            })
            .await;
    });
}

/// Register the new game with the backend log, fire-and-forget.
fn spawn_create_game(
    state: &SessionState,
    services: &SessionServices,
    task_tx: &mpsc::Sender<AsyncReply>,
) {
    let (engine, depth) = match state.config.opponent {
        Opponent::Engine { kind, depth, .. } => (Some(kind), Some(depth)),
        Opponent::Human => (None, None),
    };
    let new_game = NewGame {
        engine,
        depth,
        user_color: state
            .user_side
            .map(|side| side.as_str().to_string())
            .unwrap_or_default(),
        time_control: state.config.time_control.map(|tc| tc.initial.as_secs()),
        opponent_type: match state.config.opponent {
            Opponent::Engine { .. } => "engine".to_string(),
            Opponent::Human => "human".to_string(),
        },
    };
    let generation = state.generation;
    let store = Arc::clone(&services.store);
    let tx = task_tx.clone();

    tokio::spawn(async move {
        let outcome = store.create_game(&new_game).await;
        let _ = tx
            .send(AsyncReply::GameCreated {
                generation,
                outcome,
            })
            .await;
    });
}

/// Append a move (or a moveless result record) to the backend log.
/// No-op while the game id is unknown; failures are logged only.
fn persist_append(
    state: &SessionState,
    services: &SessionServices,
    mv: String,
    result: Option<SessionResult>,
) {
    let Some(game_id) = state.game_id.clone() else {
        tracing::debug!("No backend game id; skipping move persistence");
        return;
    };
    let (white_time, black_time) = state
        .clock
        .as_ref()
        .map(|clock| {
            let snap = clock.snapshot();
            (snap.white_remaining_ms, snap.black_remaining_ms)
        })
        .unwrap_or((0, 0));

    let append = MoveAppend {
        mv,
        white_time,
        black_time,
        result: result.map(|r| r.to_string()),
    };
    let store = Arc::clone(&services.store);

    tokio::spawn(async move {
        if let Err(err) = store.append_move(&game_id, &append).await {
            tracing::warn!("Failed to persist move: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::GameConfig;
    use crate::handle::SessionHandle;
    use crate::snapshot::{SessionResult, WinReason};
    use crate::SideChoice;
    use backend_client::MockBackend;
    use chess::PlayerSide;

    fn spawn_test_actor() -> (SessionHandle, std::sync::Arc<MockBackend>) {
        let mock = std::sync::Arc::new(MockBackend::new());
        let services = SessionServices {
            engine: mock.clone(),
            store: mock.clone(),
        };
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(128);
        let state = SessionState::new("test".to_string());
        tokio::spawn(run_session_actor(state, services, cmd_rx, event_tx));
        (SessionHandle::new("test".to_string(), cmd_tx), mock)
    }

    fn req(uci: &str) -> MoveRequest {
        MoveRequest::parse_uci(uci).unwrap()
    }

    fn human_config() -> GameConfig {
        GameConfig {
            opponent: Opponent::Human,
            time_control: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_gets_initial_snapshot() {
        let (handle, _) = spawn_test_actor();
        let (snapshot, _rx) = handle.subscribe().await.unwrap();
        assert_eq!(snapshot.phase, MatchPhase::SideSelection);
        assert!(snapshot.moves.is_empty());
        assert!(!snapshot.engine_pending);
    }

    #[tokio::test]
    async fn test_make_move_via_actor() {
        let (handle, _) = spawn_test_actor();
        let (_, mut events) = handle.subscribe().await.unwrap();
        handle
            .start_game(SideChoice::White, human_config())
            .await
            .unwrap();

        let snap = handle.submit_move(req("e2e4")).await.unwrap();
        assert_eq!(snap.moves.len(), 1);
        assert_eq!(snap.side_to_move, Some(PlayerSide::Black));

        // StateChanged from start, then MoveAccepted
        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::StateChanged(_)));
        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::MoveAccepted { .. }));
    }

    /// Play fool's mate (1. f3 e5 2. g4 Qh4#) and verify the game ends.
    #[tokio::test]
    async fn test_fools_mate_ends_game() {
        let (handle, _) = spawn_test_actor();
        handle
            .start_game(SideChoice::White, human_config())
            .await
            .unwrap();

        for uci in ["f2f3", "e7e5", "g2g4"] {
            handle.submit_move(req(uci)).await.unwrap();
        }
        let snap = handle.submit_move(req("d8h4")).await.unwrap();

        assert_eq!(
            snap.result,
            SessionResult::BlackWins(WinReason::Checkmate)
        );
        assert!(matches!(snap.phase, MatchPhase::GameOver(_)));
    }

    /// After checkmate the actor stays responsive for reads.
    #[tokio::test]
    async fn test_actor_alive_after_game_over() {
        let (handle, _) = spawn_test_actor();
        handle
            .start_game(SideChoice::White, human_config())
            .await
            .unwrap();
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            handle.submit_move(req(uci)).await.unwrap();
        }

        let snap = handle.get_snapshot().await.unwrap();
        assert!(matches!(snap.phase, MatchPhase::GameOver(_)));

        // Further moves bounce but do not kill the actor
        assert!(handle.submit_move(req("a2a3")).await.is_err());
        assert!(handle.get_snapshot().await.is_ok());
    }
}
