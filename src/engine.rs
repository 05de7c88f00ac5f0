use log::{debug, info};
use rand::rngs::ThreadRng;
use rand::Rng;

use crate::config::GameConfig;
use crate::snake::{Direction, Point};

/// Everything the presentation layer needs to draw a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    /// Head at index 0.
    pub snake_body: Vec<Point>,
    pub food: Point,
    pub direction: Direction,
    pub game_over: bool,
    /// The snake filled the whole grid.
    pub won: bool,
}

impl GameState {
    pub fn head(&self) -> Point {
        self.snake_body[0]
    }
}

pub type TickObserver = Box<dyn FnMut(&GameState)>;

pub struct GameEngine<R: Rng = ThreadRng> {
    config: GameConfig,
    state: GameState,
    pending_direction: Direction,
    rng: R,
    observer: Option<TickObserver>,
}

impl GameEngine<ThreadRng> {
    pub fn new(config: GameConfig) -> Self {
        GameEngine::with_rng(config, rand::thread_rng())
    }
}

impl<R: Rng> GameEngine<R> {
    pub fn with_rng(config: GameConfig, mut rng: R) -> Self {
        let state = initial_state(&config, &mut rng);
        let pending_direction = state.direction;
        GameEngine { config, state, pending_direction, rng, observer: None }
    }

    /// Registers the callback run after every tick that changed the state,
    /// including the one that ends the game.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&GameState) + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn is_game_over(&self) -> bool {
        self.state.game_over
    }

    pub fn score(&self) -> usize {
        self.state.snake_body.len() - 1
    }

    /// Starts over with a single-cell snake in the middle of the grid.
    pub fn reset(&mut self) {
        self.state = initial_state(&self.config, &mut self.rng);
        self.pending_direction = self.state.direction;
        info!("new game, food at {:?}", self.state.food);
        self.notify();
    }

    /// Queues `direction` for the next tick. Reversing onto the current
    /// heading is ignored, as is any input after game over.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.state.game_over {
            return;
        }

        if direction.is_opposite(self.state.direction) {
            debug!("ignoring reversal from {:?} to {:?}", self.state.direction, direction);
            return;
        }

        self.pending_direction = direction;
    }

    pub fn tick(&mut self) {
        if self.state.game_over {
            return;
        }

        let direction = self.pending_direction;
        let new_head = self.state.head().step(direction);

        let mut body = Vec::with_capacity(self.state.snake_body.len() + 1);
        body.push(new_head);
        body.extend_from_slice(&self.state.snake_body);

        let ate_food = new_head == self.state.food;
        if !ate_food {
            body.pop();
        }

        if check_collision(new_head, &body, self.config.grid_size) {
            // The colliding frame is never committed.
            self.state.game_over = true;
            info!("game over at {:?}, score {}", new_head, self.score());
            self.notify();
            return;
        }

        if ate_food {
            match generate_food_location(&mut self.rng, self.config.grid_size, &body) {
                Some(food) => {
                    debug!("ate food at {:?}, next at {:?}", new_head, food);
                    self.state.food = food;
                }
                None => {
                    info!("grid filled, score {}", body.len() - 1);
                    self.state.won = true;
                    self.state.game_over = true;
                }
            }
        }

        self.state.snake_body = body;
        self.state.direction = direction;
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.state);
        }
    }
}

#[cfg(test)]
impl<R: Rng> GameEngine<R> {
    pub fn from_state(config: GameConfig, state: GameState, rng: R) -> Self {
        let pending_direction = state.direction;
        GameEngine { config, state, pending_direction, rng, observer: None }
    }
}

fn initial_state<R: Rng>(config: &GameConfig, rng: &mut R) -> GameState {
    let center = config.grid_size / 2;
    let snake_body = vec![Point::new(center, center)];
    // A grid of at least two cells always has room next to a one-cell snake.
    let food = generate_food_location(rng, config.grid_size, &snake_body)
        .unwrap_or(Point::new(0, 0));

    GameState { snake_body, food, direction: Direction::Right, game_over: false, won: false }
}

/// Out of bounds, or the head sitting on any other segment of the
/// already-moved body.
pub fn check_collision(new_head: Point, body: &[Point], grid_size: i32) -> bool {
    !new_head.in_bounds(grid_size) || body[1..].contains(&new_head)
}

/// Uniform rejection sampling over the grid. `None` only when the body
/// covers every cell.
pub fn generate_food_location<R: Rng>(rng: &mut R, grid_size: i32, body: &[Point]) -> Option<Point> {
    if body.len() >= (grid_size * grid_size) as usize {
        return None;
    }

    loop {
        let food = Point::new(rng.gen_range(0..grid_size), rng.gen_range(0..grid_size));
        if !body.contains(&food) {
            return Some(food);
        }
    }
}
