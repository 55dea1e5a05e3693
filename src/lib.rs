// Library surface for headless/integration tests and reuse.
// Keep this lean: the terminal front end lives in main.rs and ui/.
pub mod app_dirs;
pub mod breeds;
pub mod celebration;
pub mod choices;
pub mod config;
pub mod dog_api;
pub mod game;
pub mod history;
pub mod image_pool;
pub mod logging;
pub mod progression;
pub mod question_timer;
pub mod round_session;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod util;

/// Interval of the round clock; every tick removes this much from the round budget.
pub const ROUND_TICK_MS: u64 = 100;

/// Sampling interval of the blink-out oscillation.
pub const BLINK_TICK_MS: u64 = 50;
