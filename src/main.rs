mod config;
mod engine;
mod game;
mod term;
mod snake;

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{Config, WriteLogger};

use config::GameConfig;
use game::Flow;

pub type TermInt = u16;
pub type Coords = (u16, u16);

#[derive(Parser)]
#[command(name = "snake")]
#[command(version, about = "Snake on a fixed grid in the terminal")]
struct Cli {
    /// Cells per side of the square grid
    #[arg(long, default_value_t = config::GRID_SIZE)]
    grid_size: i32,

    /// Milliseconds between moves
    #[arg(long, default_value_t = config::TICK_INTERVAL.as_millis() as u64)]
    tick_ms: u64,

    /// Where to write the log; the terminal itself is taken by the board
    #[arg(long, default_value = "snake.log")]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = File::create(&cli.log_file)
        .with_context(|| format!("Failed to create log file {}", cli.log_file.display()))?;
    WriteLogger::init(cli.log_level, Config::default(), log_file)
        .context("Failed to initialize logger")?;

    let config = GameConfig::new(cli.grid_size, Duration::from_millis(cli.tick_ms));
    config.validate()?;
    info!("starting with {:?}", config);

    let mut game = game::SnakeGame::new(config)?;
    game.initialize()?;

    if game.show_intro()? == Flow::PlayAgain {
        while game.play()? == Flow::PlayAgain {}
    }

    game.shutdown()?;
    info!("bye");
    Ok(())
}
