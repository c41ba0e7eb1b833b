mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;

use backend_client::{EngineKind, GameStore, HttpBackend};
use chess::{parse_square, MoveRequest};
use session::{
    spawn_session, GameConfig, Opponent, SessionError, SessionEvent, SessionHandle,
    SessionServices, SideChoice, TimeControl,
};

#[derive(Parser)]
#[command(name = "chessmate", about = "Play a chess match against the backend engine")]
struct Args {
    /// Side to play
    #[arg(long, value_enum, default_value_t = SideArg::White)]
    side: SideArg,

    /// Engine move provider
    #[arg(long, value_enum, default_value_t = EngineArg::Minimax)]
    engine: EngineArg,

    /// Engine search depth
    #[arg(long, default_value_t = 3)]
    depth: u8,

    /// Consult the opening book for early moves
    #[arg(long)]
    book: bool,

    /// Two humans at this terminal instead of the engine
    #[arg(long)]
    human: bool,

    /// Time control preset (bullet1, bullet2, blitz3, blitz5, blitz5_3,
    /// rapid10, rapid15, classical30, unlimited)
    #[arg(long, default_value = "blitz5")]
    time: String,

    /// Backend base URL (overrides CHESSMATE_BACKEND_URL)
    #[arg(long)]
    backend: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    White,
    Black,
    Random,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Minimax,
    Neural,
}

fn parse_time_control(name: &str) -> anyhow::Result<Option<TimeControl>> {
    let control = match name {
        "bullet1" => Some(TimeControl::from_secs(60, 0)),
        "bullet2" => Some(TimeControl::from_secs(120, 1)),
        "blitz3" => Some(TimeControl::from_secs(180, 0)),
        "blitz5" => Some(TimeControl::from_secs(300, 0)),
        "blitz5_3" => Some(TimeControl::from_secs(300, 3)),
        "rapid10" => Some(TimeControl::from_secs(600, 0)),
        "rapid15" => Some(TimeControl::from_secs(900, 10)),
        "classical30" => Some(TimeControl::from_secs(1800, 0)),
        "unlimited" => None,
        other => anyhow::bail!("Unknown time control preset: {other}"),
    };
    Ok(control)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let base_url = args.backend.clone().unwrap_or_else(config::backend_url);
    tracing::info!("Using backend at {}", base_url);

    let backend =
        Arc::new(HttpBackend::new(&base_url).context("Failed to build backend client")?);
    let services = SessionServices {
        engine: backend.clone(),
        store: backend.clone(),
    };

    let handle = spawn_session(services);
    let (_, events) = handle.subscribe().await?;
    tokio::spawn(print_events(events));

    let config = GameConfig {
        opponent: if args.human {
            Opponent::Human
        } else {
            Opponent::Engine {
                kind: match args.engine {
                    EngineArg::Minimax => EngineKind::Minimax,
                    EngineArg::Neural => EngineKind::Neural,
                },
                depth: args.depth,
                use_book: args.book,
            }
        },
        time_control: parse_time_control(&args.time)?,
    };
    let choice = match args.side {
        SideArg::White => SideChoice::White,
        SideArg::Black => SideChoice::Black,
        SideArg::Random => SideChoice::Random,
    };

    let snapshot = handle
        .start_game(choice, config)
        .await
        .context("Failed to start game")?;
    println!(
        "Playing as {}. Moves in UCI (e2e4); other commands: click <square>, cancel, resign, rematch, reset, games, delete <id>, quit",
        snapshot
            .user_side
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string())
    );

    run_input_loop(&handle, backend.as_ref()).await?;

    handle.shutdown().await;
    // Give the actor a moment to wind down
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

async fn run_input_loop(handle: &SessionHandle, store: &dyn GameStore) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();

        match command {
            "quit" | "exit" => break,
            "resign" => match handle.resign().await {
                Ok(snap) => println!("Game over: {}", snap.result),
                Err(err) => println!("Cannot resign: {err}"),
            },
            "rematch" => match handle.rematch().await {
                Ok(_) => println!("New game started"),
                Err(err) => println!("Cannot rematch: {err}"),
            },
            "reset" => {
                handle.reset().await?;
                println!("Back to side selection; restart to play again");
            }
            "cancel" => {
                handle.clear_premoves().await?;
                println!("Premoves cleared");
            }
            "games" => match store.list_games().await {
                Ok(games) if games.is_empty() => println!("No games on record"),
                Ok(games) => {
                    for game in games {
                        println!(
                            "{}  {}  {}",
                            game.id,
                            game.user_color.as_deref().unwrap_or("-"),
                            game.result.as_deref().unwrap_or("unfinished"),
                        );
                    }
                }
                Err(err) => println!("Could not list games: {err}"),
            },
            "delete" => match parts.next() {
                Some(id) => match store.delete_game(id).await {
                    Ok(()) => println!("Deleted {id}"),
                    Err(err) => println!("Could not delete {id}: {err}"),
                },
                None => println!("Usage: delete <game-id>"),
            },
            "click" => match parts.next().and_then(parse_square) {
                Some(square) => {
                    let outcome = handle.click_square(square).await?;
                    println!("{outcome:?}");
                }
                None => println!("Usage: click <square>, e.g. click g1"),
            },
            _ => match MoveRequest::parse_uci(line) {
                Some(request) => match handle.submit_move(request).await {
                    Ok(_) => {}
                    Err(SessionError::IllegalMove) => println!("Illegal move"),
                    Err(SessionError::NotYourTurn) => println!("Not your turn"),
                    Err(err) => println!("Move rejected: {err}"),
                },
                None => println!("Unrecognized input: {line}"),
            },
        }
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::MoveAccepted { snapshot, record }) => {
                let clock = snapshot
                    .clock
                    .map(|c| {
                        format!(
                            "  [{} - {}]",
                            format_ms(c.white_remaining_ms),
                            format_ms(c.black_remaining_ms)
                        )
                    })
                    .unwrap_or_default();
                println!(
                    "{}{} {}{}",
                    record.move_number,
                    if record.color == chess::PlayerSide::White {
                        "."
                    } else {
                        "..."
                    },
                    record.san,
                    clock
                );
            }
            Ok(SessionEvent::GameOver(result)) => println!("Game over: {result}"),
            Ok(SessionEvent::EngineError(message)) => println!("Engine error: {message}"),
            Ok(SessionEvent::PremoveQueued(entry)) => {
                println!(
                    "Premove queued: {} -> {}",
                    chess::format_square(entry.from),
                    chess::format_square(entry.to)
                )
            }
            Ok(SessionEvent::PremoveInvalidated(entry)) => {
                println!(
                    "Premove no longer legal, dropped: {} -> {}",
                    chess::format_square(entry.from),
                    chess::format_square(entry.to)
                )
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn format_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
