//! Noor Tiles core crate.
//!
//! Falling-tile rhythm gameplay synced to a backing track. The [`engine`]
//! module is platform independent and driven by explicit ticks; [`driver`]
//! hosts it in the browser (canvas, `<audio>`, keyboard and pointer input).
//! `start_game(level_id)` is the entrypoint the page calls.

use wasm_bindgen::prelude::*;

pub mod config;
pub mod driver;
pub mod engine;
pub mod levels;
pub mod logging;
pub mod progress;
pub mod session;

pub use config::{EngineConfig, KeyMap};
pub use engine::chart::{Chart, TileEvent, TileKind, TileStatus};
pub use engine::judge::Judgement;
pub use engine::score::RoundResult;
pub use engine::{Phase, PressOutcome, Round, RoundEvent};
pub use session::{ChartSource, ResultSink, ScoreSubmission, Session, Transport};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

/// Starts (or restarts from scratch) built-in level `level_id`.
#[wasm_bindgen]
pub fn start_game(level_id: u32) -> Result<(), JsValue> {
    driver::start_level(level_id)
}
