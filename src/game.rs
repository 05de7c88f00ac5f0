use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::{Coords, TermInt};
use crate::config::GameConfig;
use crate::engine::{GameEngine, GameState};
use crate::term::TermManager;
use crate::snake::{Direction::{*, self}, Point};

use anyhow::{bail, Result};
use crossterm::event::{KeyEvent, KeyModifiers, KeyCode};
use log::info;
use rand::Rng;

const SNAKE_BODY_CHAR: char = '█';
const APPLE_CHAR: char = 'O';
const DEAD_SNAKE_CHAR: char = 'X';

/// Each grid cell is two terminal columns wide so the board looks square.
const CELL_WIDTH: TermInt = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Turn(Direction),
    TogglePause,
    Quit,
    Ignore,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    PlayAgain,
    Quit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Head(Direction),
    Body,
    Food,
}

/// Latest state published by the engine, taken by the render loop.
type FrameSlot = Rc<RefCell<Option<GameState>>>;

pub struct SnakeGame {
    config: GameConfig,
    origin: Coords,
    paused: bool,
    term: TermManager,
    engine: GameEngine,
    latest_frame: FrameSlot,
}

impl SnakeGame {
    pub fn new(config: GameConfig) -> Result<Self> {
        let latest_frame = FrameSlot::default();
        let engine = observe_frames(GameEngine::new(config.clone()), &latest_frame);
        let term = TermManager::new()?;
        Ok(SnakeGame { config, origin: (0, 0), paused: false, term, engine, latest_frame })
    }

    pub fn initialize(&mut self) -> Result<()> {
        let (w, h) = self.term.get_terminal_size();
        let (board_w, board_h) = self.board_size();
        if w < board_w || h < board_h {
            bail!(
                "terminal is {}x{}, a {}x{} grid needs at least {}x{}",
                w, h, self.config.grid_size, self.config.grid_size, board_w, board_h
            );
        }

        self.origin = ((w - board_w) / 2, (h - board_h) / 2);
        self.term.setup()
    }

    pub fn show_intro(&mut self) -> Result<Flow> {
        let lines = &[
            "Arrow keys or WASD to move",
            "Esc to pause",
            "CTRL+C to quit",
            "",
            "Press any key to begin"
        ];

        self.term.show_message(lines)?;

        if is_ctrl_c(&self.term.read_key_blocking()?) {
            return Ok(Flow::Quit);
        }

        self.term.hide_message()?;
        Ok(Flow::PlayAgain)
    }

    pub fn play(&mut self) -> Result<Flow> {
        self.paused = false;
        self.term.clear()?;
        self.term.draw_borders(self.origin, self.board_size())?;
        self.term.hide_message()?;

        if self.engine.is_game_over() {
            self.engine.reset();
        }
        info!("starting game on a {0}x{0} grid", self.config.grid_size);

        self.latest_frame.borrow_mut().take();
        let first = self.engine.state().clone();
        self.draw_frame(&first)?;
        let mut ticker = Ticker::new(self.config.tick_interval, Instant::now());

        loop {
            let wait = if self.paused {
                self.config.tick_interval
            } else {
                ticker.time_until_tick(Instant::now())
            };

            for key_ev in self.term.read_key_events_queue(wait)? {
                match key_command(&key_ev) {
                    Command::Quit => return Ok(Flow::Quit),
                    Command::TogglePause => {
                        self.toggle_pause()?;
                        ticker.restart(Instant::now());
                    }
                    Command::Turn(dir) if !self.paused => self.engine.set_direction(dir),
                    _ => {}
                }
            }

            if self.paused { continue; }

            if ticker.due(Instant::now()) {
                self.engine.tick();
            }

            let frame = self.latest_frame.borrow_mut().take();
            if let Some(state) = frame {
                self.draw_frame(&state)?;
            }

            if self.engine.is_game_over() {
                let state = self.engine.state().clone();
                let score = self.engine.score();
                self.game_over(&state, score)?;
                break;
            }
        }

        if is_ctrl_c(&self.term.read_key_blocking()?) {
            return Ok(Flow::Quit);
        }
        Ok(Flow::PlayAgain)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.term.restore()
    }

    ///////////////////////////////////////////////////////////////////////////

    fn board_size(&self) -> Coords {
        let cells = self.config.grid_size as TermInt;
        (cells * CELL_WIDTH + 2, cells + 2)
    }

    fn screen_pos(&self, p: Point) -> Coords {
        (
            self.origin.0 + 1 + p.x as TermInt * CELL_WIDTH,
            self.origin.1 + 1 + p.y as TermInt,
        )
    }

    fn print_cell(&mut self, p: Point, glyph: [char; 2]) -> Result<()> {
        let (x, y) = self.screen_pos(p);
        self.term.print_at((x, y), glyph[0])?;
        self.term.print_at((x + 1, y), glyph[1])
    }

    fn draw_frame(&mut self, state: &GameState) -> Result<()> {
        let size = self.config.grid_size;
        let cells = layout(state, size);

        for y in 0..size {
            for x in 0..size {
                let glyph = cell_glyph(cells[(y * size + x) as usize]);
                self.print_cell(Point::new(x, y), glyph)?;
            }
        }

        self.term.flush()
    }

    fn game_over(&mut self, state: &GameState, score: usize) -> Result<()> {
        let s = if state.won {"You won!"} else {"Game over!"};

        if !state.won {
            for pos in state.snake_body.iter() {
                self.print_cell(*pos, [DEAD_SNAKE_CHAR, DEAD_SNAKE_CHAR])?;
            }
        }

        self.term.show_message(&[
            s,
            &*format!("Score: {}", score),
            "",
            "Press any key to play again,",
            "or CTRL+C to quit."
        ])
    }

    fn toggle_pause(&mut self) -> Result<()> {
        if !self.paused {
            self.term.show_message(&["Paused", "Press Esc to resume", "or Ctrl+C to quit"])?;
        } else {
            self.term.hide_message()?;
        }

        self.paused = !self.paused;
        info!("paused: {}", self.paused);
        Ok(())
    }
}

/// Fixed-period schedule for engine ticks. Ticks missed while the loop was
/// busy are dropped rather than replayed.
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(period: Duration, now: Instant) -> Self {
        Ticker { period, next: now + period }
    }

    pub fn time_until_tick(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }

        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
        true
    }

    pub fn restart(&mut self, now: Instant) {
        self.next = now + self.period;
    }
}

/// Hooks the engine up so every published state lands in `slot`.
fn observe_frames<R: Rng>(engine: GameEngine<R>, slot: &FrameSlot) -> GameEngine<R> {
    let slot = Rc::clone(slot);
    engine.with_observer(move |state: &GameState| {
        *slot.borrow_mut() = Some(state.clone());
    })
}

fn cell_glyph(cell: Cell) -> [char; 2] {
    match cell {
        Cell::Empty => [' ', ' '],
        Cell::Head(dir) => [dir.head_char(), dir.head_char()],
        Cell::Body => [SNAKE_BODY_CHAR, SNAKE_BODY_CHAR],
        Cell::Food => [APPLE_CHAR, ' '],
    }
}

pub fn key_command(ev: &KeyEvent) -> Command {
    if is_ctrl_c(ev) {
        return Command::Quit;
    }

    match ev.code {
        KeyCode::Char('w') | KeyCode::Up => Command::Turn(Up),
        KeyCode::Char('a') | KeyCode::Left => Command::Turn(Left),
        KeyCode::Char('s') | KeyCode::Down => Command::Turn(Down),
        KeyCode::Char('d') | KeyCode::Right => Command::Turn(Right),
        KeyCode::Esc => Command::TogglePause,
        _ => Command::Ignore,
    }
}

/// Row-major contents of every grid cell. Out-of-bounds points are skipped.
pub fn layout(state: &GameState, grid_size: i32) -> Vec<Cell> {
    let mut cells = vec![Cell::Empty; (grid_size * grid_size) as usize];
    let index = |p: &Point| (p.y * grid_size + p.x) as usize;

    if state.food.in_bounds(grid_size) {
        cells[index(&state.food)] = Cell::Food;
    }

    for (i, p) in state.snake_body.iter().enumerate().filter(|(_, p)| p.in_bounds(grid_size)) {
        cells[index(p)] = if i == 0 { Cell::Head(state.direction) } else { Cell::Body };
    }

    cells
}

fn is_ctrl_c(ev: &KeyEvent) -> bool {
    matches!(ev, KeyEvent { code: KeyCode::Char('c'), modifiers: KeyModifiers::CONTROL })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICK_INTERVAL;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_and_wasd_turn() {
        assert_eq!(key_command(&key(KeyCode::Up)), Command::Turn(Up));
        assert_eq!(key_command(&key(KeyCode::Down)), Command::Turn(Down));
        assert_eq!(key_command(&key(KeyCode::Left)), Command::Turn(Left));
        assert_eq!(key_command(&key(KeyCode::Right)), Command::Turn(Right));
        assert_eq!(key_command(&key(KeyCode::Char('w'))), Command::Turn(Up));
        assert_eq!(key_command(&key(KeyCode::Char('a'))), Command::Turn(Left));
        assert_eq!(key_command(&key(KeyCode::Char('s'))), Command::Turn(Down));
        assert_eq!(key_command(&key(KeyCode::Char('d'))), Command::Turn(Right));
    }

    #[test]
    fn control_keys() {
        assert_eq!(key_command(&key(KeyCode::Esc)), Command::TogglePause);
        assert_eq!(
            key_command(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Command::Quit
        );
        assert_eq!(key_command(&key(KeyCode::Char('c'))), Command::Ignore);
        assert_eq!(key_command(&key(KeyCode::Enter)), Command::Ignore);
    }

    #[test]
    fn ticker_fires_once_per_period() {
        let start = Instant::now();
        let period = Duration::from_millis(200);
        let mut ticker = Ticker::new(period, start);

        assert!(!ticker.due(start));
        assert_eq!(ticker.time_until_tick(start), period);
        assert!(ticker.due(start + period));
        assert!(!ticker.due(start + period));
        assert_eq!(ticker.time_until_tick(start + period), period);
    }

    #[test]
    fn ticker_drops_missed_ticks() {
        let start = Instant::now();
        let period = Duration::from_millis(200);
        let mut ticker = Ticker::new(period, start);

        let late = start + Duration::from_millis(1000);
        assert!(ticker.due(late));
        assert!(!ticker.due(late));
        assert_eq!(ticker.time_until_tick(late), period);

        ticker.restart(late);
        assert!(!ticker.due(late + Duration::from_millis(199)));
    }

    #[test]
    fn layout_marks_snake_and_food() {
        let state = GameState {
            snake_body: vec![Point::new(1, 0), Point::new(0, 0)],
            food: Point::new(2, 2),
            direction: Right,
            game_over: false,
            won: false,
        };
        let cells = layout(&state, 3);

        assert_eq!(cells[0], Cell::Body);
        assert_eq!(cells[1], Cell::Head(Right));
        assert_eq!(cells[8], Cell::Food);
        assert_eq!(cells.iter().filter(|c| **c == Cell::Empty).count(), 6);
    }

    #[test]
    fn glyphs_per_cell() {
        assert_eq!(cell_glyph(Cell::Food), [APPLE_CHAR, ' ']);
        assert_eq!(cell_glyph(Cell::Body), [SNAKE_BODY_CHAR, SNAKE_BODY_CHAR]);
        assert_eq!(cell_glyph(Cell::Head(Up)), ['^', '^']);
        assert_eq!(cell_glyph(Cell::Empty), [' ', ' ']);
    }

    #[test]
    fn observed_engine_publishes_frames_across_games() {
        let slot = FrameSlot::default();
        let config = GameConfig::new(2, TICK_INTERVAL);
        let mut engine = observe_frames(GameEngine::with_rng(config, StdRng::seed_from_u64(5)), &slot);
        assert!(slot.borrow().is_none());

        // One step right from the middle of a 2x2 grid leaves it.
        engine.tick();
        assert!(engine.is_game_over());
        let last = slot.borrow_mut().take().expect("game over frame");
        assert!(last.game_over);
        assert_eq!(last.snake_body, vec![Point::new(1, 1)]);

        engine.tick();
        assert!(slot.borrow().is_none());

        engine.reset();
        assert!(!engine.is_game_over());
        let fresh = slot.borrow_mut().take().expect("frame after reset");
        assert!(!fresh.game_over);
        assert_eq!(fresh.snake_body, vec![Point::new(1, 1)]);
        assert_eq!(&fresh, engine.state());
    }
}
