//! Reflex Grid entry point
//!
//! On wasm, exports a `ReflexGame` handle the page drives from its
//! animation loop. Natively, plays one seeded headless session with a
//! simple bot and logs the outcome.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use wasm_bindgen::prelude::*;

    use reflex_grid::audio::{AudioSettings, WebAudioFeedback};
    use reflex_grid::persistence::{LocalStorage, ProgressStore};
    use reflex_grid::platform;
    use reflex_grid::sim::{DifficultyPreset, GRID_ROWS, GameMode};
    use reflex_grid::{CommandOutcome, GameConfig, Session};

    fn js_err(e: impl std::fmt::Display) -> JsValue {
        JsValue::from_str(&e.to_string())
    }

    /// Game handle owned by the page
    #[wasm_bindgen]
    pub struct ReflexGame {
        session: Session,
        settings_store: Option<LocalStorage>,
    }

    #[wasm_bindgen]
    impl ReflexGame {
        #[wasm_bindgen(constructor)]
        pub fn new() -> Result<ReflexGame, JsValue> {
            let settings_store = match LocalStorage::open() {
                Ok(storage) => Some(storage),
                Err(e) => {
                    log::warn!("Settings storage unavailable: {}", e);
                    None
                }
            };
            let config = settings_store
                .as_ref()
                .map(|s| GameConfig::load(s))
                .unwrap_or_default();

            let seed = platform::entropy_seed();
            let mut session = Session::new(config.clone(), seed)
                .map_err(js_err)?
                .with_feedback(WebAudioFeedback::new(config.audio));

            match LocalStorage::open() {
                Ok(storage) => {
                    let progress = ProgressStore::new(storage);
                    let best = progress.personal_best();
                    session = session.with_personal_best(best).with_session_sink(progress);
                }
                Err(e) => log::warn!("Progress will not be saved: {}", e),
            }

            log::info!("Game initialized with seed: {}", seed);
            Ok(ReflexGame {
                session,
                settings_store,
            })
        }

        pub fn start(&mut self) -> bool {
            self.session.start_game().is_applied()
        }

        pub fn pause(&mut self) -> bool {
            self.session.pause_game().is_applied()
        }

        pub fn resume(&mut self) -> bool {
            self.session.resume_game().is_applied()
        }

        pub fn reset(&mut self) -> bool {
            self.session.reset_game().is_applied()
        }

        pub fn end(&mut self) -> bool {
            self.session.end_game().is_applied()
        }

        /// `now_ms` is the press event's `timeStamp`, on the same clock as `update`
        pub fn press(&mut self, index: u8, now_ms: f64) -> bool {
            self.session.press_index(index, now_ms.max(0.0) as u64).is_applied()
        }

        /// Buttons per row, top to bottom
        pub fn grid_rows(&self) -> Vec<u8> {
            GRID_ROWS.to_vec()
        }

        /// Call once per animation frame with `performance.now()`
        pub fn update(&mut self, now_ms: f64) {
            self.session.update(now_ms.max(0.0) as u64);
        }

        pub fn snapshot_json(&self) -> Result<String, JsValue> {
            serde_json::to_string(&self.session.snapshot()).map_err(js_err)
        }

        /// Events since the last call, as a JSON array
        pub fn events_json(&mut self) -> Result<String, JsValue> {
            serde_json::to_string(&self.session.drain_events()).map_err(js_err)
        }

        pub fn set_difficulty(&mut self, name: &str) -> bool {
            let Some(preset) = DifficultyPreset::from_str(name) else {
                log::warn!("Unknown difficulty: {}", name);
                return false;
            };
            let applied = self.session.set_difficulty(preset);
            self.persist_settings(applied)
        }

        pub fn set_mode(&mut self, name: &str) -> bool {
            let Some(mode) = GameMode::from_str(name) else {
                log::warn!("Unknown game mode: {}", name);
                return false;
            };
            let applied = self.session.set_game_mode(mode);
            self.persist_settings(applied)
        }

        /// Master volume, 0.0 - 1.0
        pub fn set_volume(&mut self, volume: f32) -> bool {
            let settings = AudioSettings {
                master_volume: volume,
                ..self.session.config().audio
            };
            let applied = self.session.set_audio(settings);
            self.persist_settings(applied)
        }

        pub fn set_muted(&mut self, muted: bool) -> bool {
            let settings = AudioSettings {
                muted,
                ..self.session.config().audio
            };
            let applied = self.session.set_audio(settings);
            self.persist_settings(applied)
        }
    }

    impl ReflexGame {
        fn persist_settings(&mut self, outcome: CommandOutcome) -> bool {
            if !outcome.is_applied() {
                return false;
            }
            if let Some(storage) = self.settings_store.as_mut() {
                if let Err(e) = self.session.config().save(storage) {
                    log::warn!("Failed to save settings: {}", e);
                }
            }
            true
        }
    }

    pub fn init() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            return;
        }
        log::info!("Reflex Grid starting...");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::init();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Reflex Grid (native) starting...");
    demo::run(std::env::args().skip(1).collect());
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Headless bot session
#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::collections::VecDeque;

    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use reflex_grid::audio::{CueRecorder, FeedbackCue};
    use reflex_grid::persistence::SessionLog;
    use reflex_grid::platform;
    use reflex_grid::sim::{ButtonId, DifficultyPreset, GameEvent, GameMode};
    use reflex_grid::{GameConfig, Session, SessionPhase};

    /// Simulated frame length
    const FRAME_MS: u64 = 16;
    /// Give up on runs longer than this
    const MAX_RUN_MS: u64 = 30 * 60 * 1000;
    /// Chance the bot presses the wrong button
    const MISTAKE_CHANCE: f64 = 0.04;

    /// Usage: reflex-grid [difficulty] [mode] [seed]
    pub fn run(args: Vec<String>) {
        let difficulty = args
            .first()
            .and_then(|s| DifficultyPreset::from_str(s))
            .unwrap_or_default();
        let mode = args.get(1).and_then(|s| GameMode::from_str(s)).unwrap_or_default();
        let seed = args
            .get(2)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(platform::entropy_seed);

        let cues = CueRecorder::new();
        let results = SessionLog::new();
        let mut session = match Session::new(GameConfig::new(difficulty, mode), seed) {
            Ok(session) => session
                .with_feedback(cues.clone())
                .with_session_sink(results.clone()),
            Err(e) => {
                log::error!("Invalid configuration: {}", e);
                return;
            }
        };

        let mut bot = Bot::new(seed);
        session.start_game();
        let mut now = 0;
        while session.phase() == SessionPhase::Playing && now < MAX_RUN_MS {
            now += FRAME_MS;
            session.update(now);
            for event in session.drain_events() {
                bot.observe(now, &event);
            }
            while let Some(button) = bot.next_press(now) {
                session.on_button_press_at(button, now);
            }
        }
        if session.phase() == SessionPhase::Playing {
            log::warn!("Run capped at {}ms, ending", MAX_RUN_MS);
            session.end_game();
        }

        match results.results().first() {
            Some(result) => {
                log::info!(
                    "{} / {}: score {}, best combo {}, {} hits, {} misses, avg reaction {:.0}ms",
                    difficulty.as_str(),
                    mode.as_str(),
                    result.score,
                    result.best_combo,
                    result.hits,
                    result.misses,
                    result.average_reaction_time_ms.unwrap_or(0.0)
                );
            }
            None => log::info!("Run ended without a result (score {})", session.state().score),
        }
        log::info!(
            "Cues played: {} hits, {} misses",
            cues.count(FeedbackCue::Hit),
            cues.count(FeedbackCue::Miss)
        );
    }

    /// Presses what it sees after a random reaction delay
    struct Bot {
        rng: Pcg32,
        /// (press time, button), in press order
        pending: VecDeque<(u64, ButtonId)>,
        /// Sequence elements seen during playback
        memory: Vec<ButtonId>,
    }

    impl Bot {
        fn new(seed: u64) -> Self {
            Self {
                rng: Pcg32::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
                pending: VecDeque::new(),
                memory: Vec::new(),
            }
        }

        fn observe(&mut self, now: u64, event: &GameEvent) {
            match event {
                GameEvent::RoundStarted {
                    buttons, odd_button, ..
                } => {
                    let targets = match odd_button {
                        Some(odd) => vec![*odd],
                        None => buttons.clone(),
                    };
                    self.schedule(now, &targets, 150..700);
                }
                GameEvent::SequenceStep { button, step, .. } => {
                    if *step == 0 {
                        self.memory.clear();
                    }
                    self.memory.push(*button);
                }
                GameEvent::SequenceAwaitingInput { .. } => {
                    let replay = std::mem::take(&mut self.memory);
                    self.schedule(now, &replay, 200..450);
                }
                GameEvent::Miss { .. } => self.pending.clear(),
                _ => {}
            }
        }

        fn schedule(&mut self, now: u64, targets: &[ButtonId], delay: std::ops::Range<u64>) {
            let mut at = now;
            for &target in targets {
                at += self.rng.random_range(delay.clone());
                let button = if self.rng.random_bool(MISTAKE_CHANCE) {
                    ButtonId::all()
                        .find(|b| *b != target)
                        .unwrap_or(target)
                } else {
                    target
                };
                self.pending.push_back((at, button));
            }
        }

        fn next_press(&mut self, now: u64) -> Option<ButtonId> {
            match self.pending.front() {
                Some(&(at, button)) if at <= now => {
                    self.pending.pop_front();
                    Some(button)
                }
                _ => None,
            }
        }
    }
}
