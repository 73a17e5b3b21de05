//! Dodge game simulation
//!
//! The player's paddle follows a normalized horizontal input through an
//! exponential smoothing filter. Obstacles spawn at the top on a fixed tick
//! interval and fall at constant speed; each one that leaves the bottom edge
//! scores a point, and any overlap with the paddle ends the game. Drawing is
//! left to whoever consumes [`GameSnapshot`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Game geometry and pacing, in canvas pixels and ticks
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub width: f32,
    pub height: f32,
    pub player_width: f32,
    pub player_height: f32,
    /// Distance from the bottom edge to the top of the paddle
    pub player_offset: f32,
    pub obstacle_size: f32,
    /// Pixels an obstacle falls per tick
    pub obstacle_speed: f32,
    /// Ticks between spawns
    pub spawn_interval: u64,
    /// Fraction of the remaining distance covered per tick
    pub smoothing: f32,
    /// Fixed seed for reproducible spawns
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            width: 640.0,
            height: 480.0,
            player_width: 50.0,
            player_height: 20.0,
            player_offset: 50.0,
            obstacle_size: 30.0,
            obstacle_speed: 3.0,
            spawn_interval: 60,
            smoothing: 0.2,
            seed: None,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Strict overlap; touching edges do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// A falling obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl Obstacle {
    pub fn bounds(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.size,
            height: self.size,
        }
    }
}

/// Game state after a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub player: Rect,
    pub obstacles: Vec<Obstacle>,
    pub score: u32,
    pub over: bool,
    /// The game ended on this step
    #[serde(skip)]
    pub just_ended: bool,
}

/// Dodge game simulator
#[derive(Debug, Clone)]
pub struct GameSimulator {
    config: GameConfig,
    rng: StdRng,
    player_x: f32,
    obstacles: Vec<Obstacle>,
    score: u32,
    over: bool,
    frame_count: u64,
}

impl GameSimulator {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        GameSimulator {
            player_x: config.width / 2.0,
            obstacles: Vec::new(),
            score: 0,
            over: false,
            frame_count: 0,
            rng,
            config,
        }
    }

    /// Advance one tick. `input` is the normalized horizontal position of
    /// the controlling landmark, or `None` when no body was seen.
    /// Once the game is over this changes nothing until [`reset`](Self::reset).
    pub fn step(&mut self, input: Option<f32>) -> GameSnapshot {
        if self.over {
            return self.snapshot();
        }

        if let Some(x) = input.filter(|x| x.is_finite()) {
            // Camera image is mirrored relative to the canvas
            let target = (1.0 - x) * self.config.width - self.config.player_width / 2.0;
            self.player_x += (target - self.player_x) * self.config.smoothing;
        }

        self.frame_count += 1;
        if self.config.spawn_interval > 0 && self.frame_count % self.config.spawn_interval == 0 {
            self.spawn();
        }

        let player = self.player_bounds();
        let speed = self.config.obstacle_speed;
        let floor = self.config.height;
        let mut hit = false;
        let mut passed = 0;

        self.obstacles.retain_mut(|obstacle| {
            obstacle.y += speed;
            if obstacle.bounds().intersects(&player) {
                hit = true;
            }
            if obstacle.y > floor {
                passed += 1;
                false
            } else {
                true
            }
        });

        self.score += passed;

        let mut snapshot = self.snapshot();
        if hit {
            self.over = true;
            snapshot.over = true;
            snapshot.just_ended = true;
            debug!(score = self.score, "game over");
        }
        snapshot
    }

    fn spawn(&mut self) {
        let span = self.config.width - self.config.obstacle_size;
        let x = if span > 0.0 {
            self.rng.gen_range(0.0..span)
        } else {
            0.0
        };
        self.place_obstacle(x, 0.0);
        debug!(x, tick = self.frame_count, "obstacle spawned");
    }

    /// Add an obstacle at a chosen position
    pub fn place_obstacle(&mut self, x: f32, y: f32) {
        self.obstacles.push(Obstacle {
            x,
            y,
            size: self.config.obstacle_size,
        });
    }

    /// Back to the initial paddle position with an empty field
    pub fn reset(&mut self) {
        self.player_x = self.config.width / 2.0;
        self.obstacles.clear();
        self.score = 0;
        self.over = false;
        self.frame_count = 0;
    }

    pub fn player_bounds(&self) -> Rect {
        Rect {
            x: self.player_x,
            y: self.config.height - self.config.player_offset,
            width: self.config.player_width,
            height: self.config.player_height,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            player: self.player_bounds(),
            obstacles: self.obstacles.clone(),
            score: self.score,
            over: self.over,
            just_ended: false,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}

impl Default for GameSimulator {
    fn default() -> Self {
        Self::new()
    }
}
