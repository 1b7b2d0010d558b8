//! Headless client for a multiplayer Life server.
//!
//! Reads gesture and control commands from stdin and drives one session.
//! Board changes are logged; run with `RUST_LOG=debug` to see them.

mod commands;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use commands::{Command, HELP};
use life_collab::{ClientConfig, Session, SessionEvent, SessionHandle, SyncError, Visibility};
use life_core::{Board, BoardSurface, Coord, GridSize, OverlayCells, Species};

#[derive(Parser, Debug)]
#[command(name = "life-client", version, about = "Headless client for a multiplayer Life board")]
struct Cli {
    /// WebSocket URL of the server
    #[arg(long, env = "LIFE_SERVER_URL", default_value = "ws://127.0.0.1:8080")]
    url: String,
    /// Colour to draw with (#rrggbb); random when omitted
    #[arg(long)]
    species: Option<String>,
    #[arg(long, default_value_t = 120)]
    width: u32,
    #[arg(long, default_value_t = 120)]
    height: u32,
}

/// Board that logs every cell the server changes.
struct LoggedBoard {
    board: Board,
}

impl BoardSurface for LoggedBoard {
    fn set_cell(&mut self, coord: Coord, species: Option<&Species>) {
        if self.board.get(coord) != species {
            match species {
                Some(s) => debug!("cell {coord} -> {s}"),
                None => debug!("cell {coord} -> empty"),
            }
        }
        self.board.set_cell(coord, species);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let species = cli.species.as_deref().map(Species::parse).transpose()?;
    let grid = GridSize::new(cli.width, cli.height);
    let config = ClientConfig {
        grid,
        ..ClientConfig::with_url(cli.url)
    }
    .with_env_overrides();
    info!("Starting life-client against {}", config.server_url);

    let board = Arc::new(Mutex::new(LoggedBoard {
        board: Board::new(grid),
    }));
    let (handle, events, task) = Session::spawn(config, board.clone(), OverlayCells::new());
    if let Some(species) = species {
        handle.set_species(species).await?;
    }
    tokio::spawn(report_events(events));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(&handle, &board, command).await?,
                    Err(e) => eprintln!("{e}"),
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await?;
    if let Err(e) = task.await {
        error!("Session task failed: {e}");
    }
    // The close frame is written by the connection task.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

async fn execute(
    handle: &SessionHandle,
    board: &Arc<Mutex<LoggedBoard>>,
    command: Command,
) -> Result<(), SyncError> {
    match command {
        Command::Draw(_) | Command::Drag(..) | Command::Tap(_) => {
            let mut edited = false;
            for event in command.input_events() {
                edited |= handle.input(event).await?.edited;
            }
            if !edited {
                println!("input ignored");
            }
        }
        Command::Submit => match handle.submit().await? {
            Some(cells) => println!("submitted {cells} cells"),
            None => println!("nothing submitted"),
        },
        Command::Hide => handle.set_visibility(Visibility::Hidden).await?,
        Command::Show => handle.set_visibility(Visibility::Visible).await?,
        Command::Pan => handle.set_drawing_enabled(false).await?,
        Command::DrawMode => handle.set_drawing_enabled(true).await?,
        Command::Species(species) => handle.set_species(species).await?,
        Command::Stats => {
            let stats = handle.stats().await?;
            let population = board
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .board
                .population();
            println!("{stats:#?}");
            println!("population: {population}");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn report_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected(id) => println!("connected (connection {id})"),
            SessionEvent::Disconnected { connection, reason } => println!(
                "disconnected (connection {connection}): {}",
                reason.as_deref().unwrap_or("no reason")
            ),
            SessionEvent::SnapshotApplied { cells } => println!("snapshot: {cells} cells"),
            SessionEvent::Resynced => println!("resyncing after buffer overflow"),
            SessionEvent::FrameDropped(e) => warn!("dropped frame: {e}"),
            other => debug!("{other:?}"),
        }
    }
}
