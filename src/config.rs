//! Application-level configuration loading: game board, tick rate, liveness and fan-out limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, sync::Arc, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{Board, Cell};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FLEETDECK_CONFIG_PATH";

const DEFAULT_TICK_INTERVAL_MS: u64 = 150;
const DEFAULT_NODE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;
const DEFAULT_OVERLOAD_THRESHOLD_PCT: f64 = 80.0;
const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 16;
const DEFAULT_SUBSCRIBER_MAX_DROPPED: usize = 64;
/// Largest accepted grid side. Food placement scans every cell.
const MAX_GRID_SIDE: i32 = 200;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    tick_interval: Duration,
    board: Arc<Board>,
    node_timeout: Duration,
    sweep_interval: Duration,
    overload_threshold_pct: f64,
    subscriber_queue_capacity: usize,
    subscriber_max_dropped: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tick_ms = app_config.tick_interval.as_millis() as u64,
                        grid_width = app_config.board.width,
                        grid_height = app_config.board.height,
                        node_timeout_ms = app_config.node_timeout.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Period of the game tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Board geometry shared by every game session.
    pub fn board(&self) -> Arc<Board> {
        Arc::clone(&self.board)
    }

    /// Heartbeat staleness window.
    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Period of the stale-node sweep.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// CPU/RAM percentage above which a node is reported as overloaded.
    pub fn overload_threshold_pct(&self) -> f64 {
        self.overload_threshold_pct
    }

    /// Bound of each subscriber queue.
    pub fn subscriber_queue_capacity(&self) -> usize {
        self.subscriber_queue_capacity
    }

    /// Consecutive overflow evictions tolerated before a subscriber is disconnected.
    pub fn subscriber_max_dropped(&self) -> usize {
        self.subscriber_max_dropped
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            board: Arc::new(Board::default()),
            node_timeout: Duration::from_millis(DEFAULT_NODE_TIMEOUT_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            overload_threshold_pct: DEFAULT_OVERLOAD_THRESHOLD_PCT,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            subscriber_max_dropped: DEFAULT_SUBSCRIBER_MAX_DROPPED,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    tick_interval_ms: Option<u64>,
    grid_width: Option<i32>,
    grid_height: Option<i32>,
    initial_snake_length: Option<usize>,
    start_position: Option<[i32; 2]>,
    obstacles: Option<Vec<[i32; 2]>>,
    node_timeout_ms: Option<u64>,
    sweep_interval_ms: Option<u64>,
    overload_threshold_pct: Option<f64>,
    subscriber_queue_capacity: Option<usize>,
    subscriber_max_dropped: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        Self {
            tick_interval: positive_millis("tick_interval_ms", value.tick_interval_ms)
                .unwrap_or(defaults.tick_interval),
            board: raw_board(&value).map(Arc::new).unwrap_or(defaults.board),
            node_timeout: positive_millis("node_timeout_ms", value.node_timeout_ms)
                .unwrap_or(defaults.node_timeout),
            sweep_interval: positive_millis("sweep_interval_ms", value.sweep_interval_ms)
                .unwrap_or(defaults.sweep_interval),
            overload_threshold_pct: value
                .overload_threshold_pct
                .filter(|pct| {
                    let valid = pct.is_finite() && (0.0..=100.0).contains(pct);
                    if !valid {
                        warn!(value = pct, "overload_threshold_pct out of range; using default");
                    }
                    valid
                })
                .unwrap_or(defaults.overload_threshold_pct),
            subscriber_queue_capacity: at_least_one(
                "subscriber_queue_capacity",
                value.subscriber_queue_capacity,
            )
            .unwrap_or(defaults.subscriber_queue_capacity),
            subscriber_max_dropped: value
                .subscriber_max_dropped
                .unwrap_or(defaults.subscriber_max_dropped),
        }
    }
}

fn positive_millis(key: &str, value: Option<u64>) -> Option<Duration> {
    match value? {
        0 => {
            warn!(key, "duration must be positive; using default");
            None
        }
        millis => Some(Duration::from_millis(millis)),
    }
}

fn at_least_one(key: &str, value: Option<usize>) -> Option<usize> {
    match value? {
        0 => {
            warn!(key, "value must be at least 1; using default");
            None
        }
        count => Some(count),
    }
}

/// Build the board from the raw settings, or `None` when the board group is
/// absent or inconsistent.
fn raw_board(raw: &RawConfig) -> Option<Board> {
    if raw.grid_width.is_none()
        && raw.grid_height.is_none()
        && raw.initial_snake_length.is_none()
        && raw.start_position.is_none()
        && raw.obstacles.is_none()
    {
        return None;
    }

    let defaults = Board::default();
    let board = Board {
        width: raw.grid_width.unwrap_or(defaults.width),
        height: raw.grid_height.unwrap_or(defaults.height),
        start: raw
            .start_position
            .map(|[x, y]| Cell::new(x, y))
            .unwrap_or(defaults.start),
        initial_length: raw.initial_snake_length.unwrap_or(defaults.initial_length),
        initial_direction: defaults.initial_direction,
        obstacles: raw
            .obstacles
            .as_ref()
            .map(|cells| cells.iter().map(|&[x, y]| Cell::new(x, y)).collect())
            .unwrap_or_default(),
    };

    match check_board(&board) {
        Ok(()) => Some(board),
        Err(reason) => {
            warn!(reason, "invalid board settings; using default board");
            None
        }
    }
}

fn check_board(board: &Board) -> Result<(), &'static str> {
    if board.width <= 0 || board.height <= 0 {
        return Err("grid dimensions must be positive");
    }
    if board.width > MAX_GRID_SIDE || board.height > MAX_GRID_SIDE {
        return Err("grid dimensions exceed the maximum side");
    }
    if board.initial_length == 0 {
        return Err("initial snake length must be at least 1");
    }
    // Both checks bound the walk below, so cell steps cannot overflow.
    if !board.contains(board.start) {
        return Err("start position outside the grid");
    }
    if board.initial_length > (board.width * board.height) as usize {
        return Err("initial snake does not fit on the grid");
    }
    let body = board.initial_snake();
    if body.len() != board.initial_length || !body.iter().all(|cell| board.contains(*cell)) {
        return Err("initial snake does not fit on the grid");
    }
    if !board.obstacles.iter().all(|cell| board.contains(*cell)) {
        return Err("obstacle outside the grid");
    }
    if body.iter().any(|cell| board.obstacles.contains(cell)) {
        return Err("obstacle overlaps the initial snake");
    }
    Ok(())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("{}");
        assert_eq!(config.tick_interval(), Duration::from_millis(150));
        assert_eq!(config.node_timeout(), Duration::from_secs(5));
        assert_eq!(*config.board(), Board::default());
        assert_eq!(config.subscriber_queue_capacity(), 16);
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse(
            r#"{
                "tick_interval_ms": 100,
                "grid_width": 30,
                "grid_height": 15,
                "start_position": [10, 10],
                "obstacles": [[0, 0], [29, 14]],
                "overload_threshold_pct": 90
            }"#,
        );
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        let board = config.board();
        assert_eq!((board.width, board.height), (30, 15));
        assert_eq!(board.start, Cell::new(10, 10));
        assert_eq!(board.obstacles.len(), 2);
        assert_eq!(config.overload_threshold_pct(), 90.0);
    }

    #[test]
    fn inconsistent_board_falls_back_as_a_group() {
        let config = parse(r#"{ "grid_width": 4, "start_position": [10, 10] }"#);
        assert_eq!(*config.board(), Board::default());

        let config = parse(r#"{ "obstacles": [[5, 4]] }"#);
        assert!(config.board().obstacles.is_empty());

        let config = parse(r#"{ "start_position": [5, 1] }"#);
        assert_eq!(config.board().start, Cell::new(5, 5));
    }

    #[test]
    fn oversized_or_extreme_boards_fall_back() {
        let config = parse(r#"{ "grid_width": 100000, "grid_height": 100000 }"#);
        assert_eq!(*config.board(), Board::default());

        let config = parse(r#"{ "grid_width": 200, "grid_height": 200 }"#);
        assert_eq!((config.board().width, config.board().height), (200, 200));

        let config = parse(r#"{ "start_position": [5, 2147483647] }"#);
        assert_eq!(*config.board(), Board::default());

        let config = parse(r#"{ "start_position": [-2147483648, 5] }"#);
        assert_eq!(*config.board(), Board::default());

        let config = parse(r#"{ "initial_snake_length": 18446744073709551615 }"#);
        assert_eq!(*config.board(), Board::default());
    }

    #[test]
    fn zero_values_fall_back() {
        let config = parse(
            r#"{ "tick_interval_ms": 0, "subscriber_queue_capacity": 0, "overload_threshold_pct": 150 }"#,
        );
        assert_eq!(config.tick_interval(), Duration::from_millis(150));
        assert_eq!(config.subscriber_queue_capacity(), 16);
        assert_eq!(config.overload_threshold_pct(), 80.0);
    }
}
