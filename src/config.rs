use std::time::Duration;

use anyhow::{bail, Result};

pub const GRID_SIZE: i32 = 20;
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);

const MIN_GRID_SIZE: i32 = 2;
const MAX_GRID_SIZE: i32 = 100;

/// Fixed for the lifetime of an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub grid_size: i32,
    pub tick_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig { grid_size: GRID_SIZE, tick_interval: TICK_INTERVAL }
    }
}

impl GameConfig {
    pub fn new(grid_size: i32, tick_interval: Duration) -> Self {
        GameConfig { grid_size, tick_interval }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size < MIN_GRID_SIZE || self.grid_size > MAX_GRID_SIZE {
            bail!(
                "grid size must be between {} and {}, got {}",
                MIN_GRID_SIZE, MAX_GRID_SIZE, self.grid_size
            );
        }
        if self.tick_interval.is_zero() {
            bail!("tick interval must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_constants() {
        let config = GameConfig::default();
        assert_eq!(config.grid_size, 20);
        assert_eq!(config.tick_interval, Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(GameConfig::new(1, TICK_INTERVAL).validate().is_err());
        assert!(GameConfig::new(101, TICK_INTERVAL).validate().is_err());
        assert!(GameConfig::new(20, Duration::from_millis(0)).validate().is_err());
        assert!(GameConfig::new(2, Duration::from_millis(1)).validate().is_ok());
    }
}
