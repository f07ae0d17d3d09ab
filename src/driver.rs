//! Browser driver: hosts one [`Session`] per page, feeds it
//! `requestAnimationFrame` timestamps and keyboard/pointer presses, plays the
//! level track through an `<audio>` element and draws the frame snapshot on a
//! canvas with DOM overlays for score, combo and feedback.
//!
//! Every (re)start bumps a frame generation; frame callbacks from an older
//! generation find a mismatch and bail out, so a stale callback can never
//! touch a freshly reset round. Audio listeners are keyed by track instead:
//! a restart replays the same `<audio>` element and keeps its listener live.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlAudioElement, HtmlCanvasElement, window};

use crate::config::{EngineConfig, KeyMap};
use crate::engine::chart::{Chart, TileStatus};
use crate::engine::projection::Snapshot;
use crate::engine::{Phase, RoundEvent};
use crate::levels::{self, BuiltinLevels};
use crate::progress::ProgressBook;
use crate::session::{ChartSource, ResultSink, ScoreSubmission, Session, Transport};

const CANVAS_ID: &str = "nt-canvas";
const SCORE_ID: &str = "nt-score";
const COMBO_ID: &str = "nt-combo";
const FEEDBACK_ID: &str = "nt-feedback";
const PROGRESS_KEY: &str = "noortiles_progress";
/// DOM event fired on `window` when a round ends; `detail` carries the
/// submission JSON.
pub const ROUND_END_EVENT: &str = "noor:round-end";

/// Fraction of the playfield height a tile head occupies.
const TILE_HEIGHT: f64 = 0.12;

fn js_err(value: JsValue) -> anyhow::Error {
    anyhow!(
        "{}",
        value.as_string().unwrap_or_else(|| format!("{value:?}"))
    )
}

fn performance_now() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

fn chart_seed() -> u64 {
    #[cfg(feature = "rng")]
    {
        let mut buf = [0u8; 8];
        if getrandom::getrandom(&mut buf).is_ok() {
            return u64::from_le_bytes(buf);
        }
    }
    performance_now().to_bits()
}

// --- Audio transport ---------------------------------------------------------

struct AudioTransport {
    audio: HtmlAudioElement,
}

impl Transport for AudioTransport {
    fn play(&mut self) -> Result<()> {
        self.audio.set_current_time(0.0);
        // The returned promise rejects when autoplay is blocked; the round
        // still runs on the frame clock.
        self.audio.play().map(|_| ()).map_err(js_err)
    }

    fn pause(&mut self) -> Result<()> {
        self.audio.pause().map_err(js_err)
    }

    fn resume(&mut self) -> Result<()> {
        self.audio.play().map(|_| ()).map_err(js_err)
    }

    fn stop(&mut self) -> Result<()> {
        self.audio.pause().map_err(js_err)?;
        self.audio.set_current_time(0.0);
        Ok(())
    }
}

// --- Result sinks ------------------------------------------------------------

/// Collects submissions while the game state is borrowed; they are flushed to
/// the DOM afterwards because page listeners may call back into this module.
#[derive(Default)]
struct Outbox(Vec<ScoreSubmission>);

impl ResultSink for Outbox {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<()> {
        self.0.push(submission.clone());
        Ok(())
    }
}

/// Saves stars to local storage and announces the result to the page.
struct DomResultSink;

impl ResultSink for DomResultSink {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<()> {
        let mut book = load_progress();
        if book.record(submission.level_id, submission.stars) {
            info!(
                "new best on level {}: {} star(s)",
                submission.level_id, submission.stars
            );
            save_progress(&book)?;
        }
        let win = window().context("no window")?;
        #[cfg(feature = "serde_json")]
        let detail = serde_json::to_string(submission).context("serializing submission")?;
        #[cfg(not(feature = "serde_json"))]
        let detail = format!("{submission:?}");
        let init = web_sys::CustomEventInit::new();
        init.set_detail(&JsValue::from_str(&detail));
        let event = web_sys::CustomEvent::new_with_event_init_dict(ROUND_END_EVENT, &init)
            .map_err(js_err)?;
        win.dispatch_event(&event).map_err(js_err)?;
        Ok(())
    }
}

fn load_progress() -> ProgressBook {
    #[cfg(feature = "serde_json")]
    {
        let stored = window()
            .and_then(|w| w.local_storage().ok().flatten())
            .and_then(|s| s.get_item(PROGRESS_KEY).ok().flatten());
        if let Some(json) = stored {
            match ProgressBook::from_json(&json) {
                Ok(book) => return book,
                Err(e) => warn!("discarding stored progress: {e:#}"),
            }
        }
    }
    ProgressBook::new()
}

fn save_progress(book: &ProgressBook) -> Result<()> {
    #[cfg(feature = "serde_json")]
    {
        let storage = window()
            .context("no window")?
            .local_storage()
            .map_err(js_err)?
            .context("local storage unavailable")?;
        storage
            .set_item(PROGRESS_KEY, &book.to_json()?)
            .map_err(js_err)?;
    }
    #[cfg(not(feature = "serde_json"))]
    let _ = (book, PROGRESS_KEY);
    Ok(())
}

// --- Game state --------------------------------------------------------------

/// Identity of the callbacks allowed to act on the live game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Epoch {
    /// Set once per launched `<audio>` element.
    track: u64,
    /// Bumped on every launch and restart.
    frame: u64,
}

impl Epoch {
    fn launch(generation: u64) -> Self {
        Self {
            track: generation,
            frame: generation,
        }
    }

    fn restart(&mut self, generation: u64) {
        self.frame = generation;
    }

    fn owns_track(&self, track: u64) -> bool {
        self.track == track
    }

    fn owns_frame(&self, frame: u64) -> bool {
        self.frame == frame
    }
}

/// The loop keeps running while paused or idle so banners stay drawn; it
/// stops after the frame that shows the result.
fn wants_next_frame(phase: Phase) -> bool {
    phase != Phase::Ended
}

struct GameDriver {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    session: Session<AudioTransport>,
    keys: KeyMap,
    title: String,
    epoch: Epoch,
    raf_handle: Option<i32>,
}

impl GameDriver {
    fn cancel_frame(&mut self) {
        if let (Some(handle), Some(win)) = (self.raf_handle.take(), window()) {
            win.cancel_animation_frame(handle).ok();
        }
    }
}

thread_local! {
    static GAME: RefCell<Option<GameDriver>> = RefCell::new(None);
    static GENERATION: Cell<u64> = Cell::new(0);
    static LISTENERS_INSTALLED: Cell<bool> = Cell::new(false);
}

fn next_generation() -> u64 {
    GENERATION.with(|g| {
        let next = g.get() + 1;
        g.set(next);
        next
    })
}

/// Runs `f` on the live driver, if any.
fn with_game<R>(f: impl FnOnce(&mut GameDriver) -> R) -> Option<R> {
    GAME.with(|cell| cell.borrow_mut().as_mut().map(f))
}

fn ensure_canvas(doc: &Document) -> Result<HtmlCanvasElement, JsValue> {
    if let Some(el) = doc.get_element_by_id(CANVAS_ID) {
        return Ok(el.dyn_into()?);
    }
    let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
    c.set_id(CANVAS_ID);
    c.set_width(480);
    c.set_height(720);
    c.set_attribute("style", "position:fixed; left:50%; top:50%; transform:translate(-50%,-50%); border-radius:18px; border:2px solid #222; background:#0f1420; touch-action:none; z-index:20;").ok();
    doc.body()
        .ok_or_else(|| JsValue::from_str("no body"))?
        .append_child(&c)?;
    Ok(c)
}

fn ensure_overlay(doc: &Document, id: &str, style: &str) -> Result<(), JsValue> {
    if doc.get_element_by_id(id).is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id(id);
            div.set_attribute("style", style).ok();
            body.append_child(&div)?;
        }
    }
    Ok(())
}

/// Replaces whatever game is running with a fresh session and starts it.
fn launch(
    chart: Rc<Chart>,
    level_id: u32,
    title: String,
    audio_url: &str,
    config: EngineConfig,
) -> Result<(), JsValue> {
    config
        .validate()
        .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    // Tear down the previous round before anything new exists.
    let previous = GAME.with(|cell| cell.borrow_mut().take());
    if let Some(mut old) = previous {
        old.cancel_frame();
        if let Err(e) = old.session.finish() {
            warn!("stopping previous round: {e:#}");
        }
    }
    let generation = next_generation();

    let canvas = ensure_canvas(&doc)?;
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into()?;
    ensure_overlay(&doc, SCORE_ID, "position:fixed; top:10px; left:12px; font-family:'Fira Code', monospace; font-size:15px; padding:4px 8px; background:rgba(0,0,0,0.42); border:1px solid #333; border-radius:6px; color:#ffd166; z-index:45;")?;
    ensure_overlay(&doc, COMBO_ID, "position:fixed; top:10px; right:12px; font-family:'Fira Code', monospace; font-size:22px; font-weight:bold; padding:4px 8px; color:#7bdff2; z-index:45;")?;
    ensure_overlay(&doc, FEEDBACK_ID, "position:fixed; top:45%; left:50%; transform:translate(-50%,-50%); font-size:40px; font-weight:900; color:#fff; text-shadow:0 0 10px rgba(0,0,0,0.5); pointer-events:none; z-index:50;")?;

    let audio = HtmlAudioElement::new_with_src(audio_url)?;
    {
        let closure = Closure::wrap(Box::new(move |_evt: web_sys::Event| {
            on_track_ended(generation);
        }) as Box<dyn FnMut(_)>);
        audio.add_event_listener_with_callback("ended", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    let keys = KeyMap::default();
    let mut session = Session::new(level_id, chart, config, AudioTransport { audio });
    if let Err(e) = session.start() {
        // Autoplay refusal should not block the round itself.
        warn!("{e:#}");
    }
    info!("level {level_id} ({title}) started, generation {generation}");

    GAME.with(|cell| {
        cell.replace(Some(GameDriver {
            canvas,
            ctx,
            session,
            keys,
            title,
            epoch: Epoch::launch(generation),
            raf_handle: None,
        }))
    });
    install_listeners(&doc)?;
    start_loop(generation);
    Ok(())
}

pub fn start_level(level_id: u32) -> Result<(), JsValue> {
    let desc = levels::level(level_id)
        .ok_or_else(|| JsValue::from_str(&format!("unknown level {level_id}")))?;
    if !load_progress().is_unlocked(level_id) {
        warn!("level {level_id} is still locked; starting anyway");
    }
    let base = EngineConfig::default();
    let source = BuiltinLevels {
        seed: chart_seed(),
        lane_count: base.lane_count,
    };
    let chart = source
        .chart(level_id)
        .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    launch(
        chart,
        level_id,
        desc.name.to_string(),
        desc.audio,
        base.with_speed_factor(desc.speed),
    )
}

/// Starts a level authored as `gameData` JSON, with an optional JSON engine
/// config override.
#[cfg(feature = "serde_json")]
#[wasm_bindgen]
pub fn start_custom_game(
    level_id: u32,
    title: String,
    game_data_json: &str,
    audio_url: &str,
    config_json: Option<String>,
) -> Result<(), JsValue> {
    let to_js = |e: anyhow::Error| JsValue::from_str(&format!("{e:#}"));
    let config = match config_json {
        Some(json) => EngineConfig::from_json(&json).map_err(to_js)?,
        None => EngineConfig::default(),
    };
    let chart = levels::parse_game_data(game_data_json, config.lane_count).map_err(to_js)?;
    launch(Rc::new(chart), level_id, title, audio_url, config)
}

fn install_listeners(doc: &Document) -> Result<(), JsValue> {
    if LISTENERS_INSTALLED.with(|f| f.replace(true)) {
        return Ok(());
    }

    // Keyboard: mapped keys press lanes, Space/Escape start or toggle pause.
    {
        let closure = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
            if evt.repeat() {
                return;
            }
            let key = evt.key();
            with_game(|game| {
                if key == " " || key == "Escape" {
                    evt.prevent_default();
                    toggle(game);
                } else if let Some(lane) = game.keys.lane_for(&key) {
                    game.session.queue_press(lane);
                }
            });
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    // Pointer/touch: the canvas is split into equal lane columns.
    {
        let closure = Closure::wrap(Box::new(move |evt: web_sys::MouseEvent| {
            with_game(|game| {
                let width = game.canvas.width() as f64;
                let lanes = game.session.round().config().lane_count;
                if width <= 0.0 || lanes == 0 {
                    return;
                }
                let x = evt.offset_x() as f64;
                if (0.0..width).contains(&x) {
                    let lane = (x / (width / lanes as f64)).floor() as usize;
                    game.session.queue_press(lane);
                }
            });
        }) as Box<dyn FnMut(_)>);
        let canvas = doc
            .get_element_by_id(CANVAS_ID)
            .ok_or_else(|| JsValue::from_str("canvas missing"))?;
        canvas.add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    Ok(())
}

fn toggle(game: &mut GameDriver) {
    let outcome = match game.session.phase() {
        Phase::Running => game.session.pause(),
        Phase::Paused => game.session.resume(),
        Phase::Idle => game.session.start(),
        Phase::Ended => Ok(false),
    };
    if let Err(e) = outcome {
        warn!("{e:#}");
    }
}

fn on_track_ended(track: u64) {
    let outbox = with_game(|game| {
        let mut outbox = Outbox::default();
        if !game.epoch.owns_track(track) {
            return outbox;
        }
        info!("track ended, closing round");
        match game.session.finish() {
            Ok(Some(_)) => {
                if let Err(e) = game.session.submit(&mut outbox) {
                    error!("{e:#}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{e:#}"),
        }
        outbox
    });
    flush(outbox);
}

fn flush(outbox: Option<Outbox>) {
    for submission in outbox.map(|o| o.0).unwrap_or_default() {
        if let Err(e) = DomResultSink.submit(&submission) {
            error!("publishing result: {e:#}");
        }
    }
}

// --- Frame loop --------------------------------------------------------------

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

fn request_frame(win: &web_sys::Window, cb: &FrameCallback) -> Option<i32> {
    let cb = cb.borrow();
    let closure = cb.as_ref()?;
    win.request_animation_frame(closure.as_ref().unchecked_ref())
        .ok()
}

fn start_loop(generation: u64) {
    let f: FrameCallback = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        let outcome = with_game(|game| {
            if !game.epoch.owns_frame(generation) {
                return None;
            }
            let outbox = frame(game, ts);
            let more = wants_next_frame(game.session.phase());
            if !more {
                game.raf_handle = None;
            }
            Some((outbox, more))
        })
        .flatten();
        let Some((outbox, more)) = outcome else {
            return; // superseded or torn down: let the loop die
        };
        flush(Some(outbox));
        if !more {
            return;
        }
        if let Some(w) = window() {
            let handle = request_frame(&w, &f);
            with_game(|game| {
                if game.epoch.owns_frame(generation) {
                    game.raf_handle = handle;
                }
            });
        }
    }) as Box<dyn FnMut(f64)>));
    if let Some(w) = window() {
        let handle = request_frame(&w, &g);
        with_game(|game| game.raf_handle = handle);
    }
}

fn frame(game: &mut GameDriver, ts_ms: f64) -> Outbox {
    let mut outbox = Outbox::default();
    match game.session.tick(ts_ms / 1000.0) {
        Ok(events) => {
            for event in &events {
                if let RoundEvent::Ended(result) = event {
                    info!(
                        "{}: {} points, {}% accuracy, {} star(s)",
                        game.title, result.score, result.accuracy, result.stars
                    );
                    if let Err(e) = game.session.submit(&mut outbox) {
                        error!("{e:#}");
                    }
                }
            }
        }
        Err(e) => warn!("{e:#}"),
    }
    let snapshot = game.session.round().snapshot();
    render(game, &snapshot);
    update_overlays(&snapshot);
    outbox
}

// --- Rendering ---------------------------------------------------------------

fn render(game: &GameDriver, snap: &Snapshot<'_>) {
    let ctx = &game.ctx;
    let w = game.canvas.width() as f64;
    let h = game.canvas.height() as f64;
    let lanes = snap.lane_count.max(1);
    let lane_w = w / lanes as f64;

    ctx.set_global_alpha(1.0);
    ctx.set_fill_style_str("#0f1420");
    ctx.fill_rect(0.0, 0.0, w, h);

    // Lane separators
    ctx.set_stroke_style_str("rgba(255,255,255,0.05)");
    ctx.set_line_width(1.0);
    for i in 1..lanes {
        line(ctx, i as f64 * lane_w, 0.0, i as f64 * lane_w, h);
    }

    // Hit zone
    let hit_y = game.session.round().config().hit_line / 100.0 * h;
    ctx.set_stroke_style_str("rgba(255,255,255,0.2)");
    ctx.set_line_width(2.0);
    for i in 0..lanes {
        ctx.stroke_rect(i as f64 * lane_w + 8.0, hit_y, lane_w - 16.0, TILE_HEIGHT * h);
    }

    // Key hints
    ctx.set_font("12px 'Fira Code', monospace");
    ctx.set_text_align("center");
    ctx.set_fill_style_str("rgba(255,255,255,0.45)");
    for i in 0..lanes {
        if let Some(label) = game.keys.label(i) {
            ctx.fill_text(&label, (i as f64 + 0.5) * lane_w, h - 8.0).ok();
        }
    }

    // Tiles
    ctx.set_font("bold 13px sans-serif");
    for tile in &snap.tiles {
        let x = tile.x_percent / 100.0 * w;
        let y = tile.y_percent / 100.0 * h;
        let tw = tile.width_percent / 100.0 * w;
        let th = TILE_HEIGHT * h;
        ctx.set_global_alpha(if tile.imminent { 1.0 } else { 0.8 });
        if tile.tail_percent > 0.0 {
            let tail = tile.tail_percent / 100.0 * h;
            ctx.set_fill_style_str("rgba(255,209,102,0.35)");
            ctx.fill_rect(x + tw * 0.3, y - tail, tw * 0.4, tail);
        }
        let color = match (tile.status, tile.lane % 2) {
            (TileStatus::Missed, _) => "#5a5a5a",
            (_, 0) => "#2a9d8f",
            _ => "#e9c46a",
        };
        ctx.set_fill_style_str(color);
        ctx.fill_rect(x, y, tw, th);
        if let Some(label) = tile.label {
            ctx.set_fill_style_str("#ffffff");
            ctx.fill_text(label, x + tw / 2.0, y + th / 2.0 + 4.0).ok();
        }
    }
    ctx.set_global_alpha(1.0);

    // Phase banner
    let banner = match snap.phase {
        Phase::Idle => Some(format!("{} - press Space", game.title)),
        Phase::Paused => Some("Paused".to_string()),
        Phase::Ended => game.session.round().result().map(|r| {
            format!(
                "{} pts  {}%  {}",
                r.score,
                r.accuracy,
                "★".repeat(r.stars as usize)
            )
        }),
        Phase::Running => None,
    };
    if let Some(text) = banner {
        ctx.set_fill_style_str("rgba(0,0,0,0.6)");
        ctx.fill_rect(0.0, h / 2.0 - 40.0, w, 80.0);
        ctx.set_font("bold 26px sans-serif");
        ctx.set_fill_style_str("#ffffff");
        ctx.fill_text(&text, w / 2.0, h / 2.0 + 9.0).ok();
    }
}

fn update_overlays(snap: &Snapshot<'_>) {
    let Some(doc) = window().and_then(|w| w.document()) else {
        return;
    };
    if let Some(el) = doc.get_element_by_id(SCORE_ID) {
        el.set_text_content(Some(&format!("Score: {}", snap.score)));
    }
    if let Some(el) = doc.get_element_by_id(COMBO_ID) {
        el.set_text_content(Some(&format!("{}x", snap.combo)));
    }
    if let Some(el) = doc.get_element_by_id(FEEDBACK_ID) {
        el.set_text_content(snap.feedback);
    }
}

fn line(ctx: &CanvasRenderingContext2d, x1: f64, y1: f64, x2: f64, y2: f64) {
    ctx.begin_path();
    ctx.move_to(x1, y1);
    ctx.line_to(x2, y2);
    ctx.stroke();
}

// --- Exported controls -------------------------------------------------------

#[wasm_bindgen]
pub fn pause_game() -> bool {
    with_game(|game| game.session.pause().unwrap_or_else(|e| {
        warn!("{e:#}");
        false
    }))
    .unwrap_or(false)
}

#[wasm_bindgen]
pub fn resume_game() -> bool {
    with_game(|game| game.session.resume().unwrap_or_else(|e| {
        warn!("{e:#}");
        false
    }))
    .unwrap_or(false)
}

/// Stops the frame loop and the track, then plays the same chart again.
#[wasm_bindgen]
pub fn restart_game() -> bool {
    let generation = next_generation();
    let restarted = with_game(|game| {
        game.cancel_frame();
        game.epoch.restart(generation);
        if let Err(e) = game.session.restart() {
            warn!("{e:#}");
        }
        if let Err(e) = game.session.start() {
            warn!("{e:#}");
        }
        true
    })
    .unwrap_or(false);
    if restarted {
        start_loop(generation);
    }
    restarted
}

/// Ends the current round early and tears the driver down.
#[wasm_bindgen]
pub fn stop_game() {
    next_generation();
    let outbox = with_game(|game| {
        game.cancel_frame();
        let mut outbox = Outbox::default();
        match game.session.finish() {
            Ok(Some(_)) => {
                if let Err(e) = game.session.submit(&mut outbox) {
                    error!("{e:#}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{e:#}"),
        }
        outbox
    });
    GAME.with(|cell| cell.borrow_mut().take());
    flush(outbox);
}

#[wasm_bindgen]
pub fn best_stars(level_id: u32) -> u8 {
    load_progress().best_stars(level_id)
}

#[wasm_bindgen]
pub fn level_unlocked(level_id: u32) -> bool {
    load_progress().is_unlocked(level_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_keeps_track_listener_but_retires_old_frames() {
        let mut epoch = Epoch::launch(1);
        assert!(epoch.owns_track(1) && epoch.owns_frame(1));
        epoch.restart(2);
        epoch.restart(3);
        assert!(epoch.owns_track(1));
        assert!(!epoch.owns_frame(1) && !epoch.owns_frame(2));
        assert!(epoch.owns_frame(3));

        let relaunched = Epoch::launch(4);
        assert!(!relaunched.owns_track(1));
    }

    #[test]
    fn loop_stops_once_round_ends() {
        assert!(wants_next_frame(Phase::Idle));
        assert!(wants_next_frame(Phase::Running));
        assert!(wants_next_frame(Phase::Paused));
        assert!(!wants_next_frame(Phase::Ended));
    }
}
