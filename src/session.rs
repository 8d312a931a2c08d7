//! Session controller
//!
//! Owns the run lifecycle (Idle → Ready → Playing ⇄ Paused → GameOver),
//! the game state and its scheduler. The host feeds it commands and clock
//! ticks; it hands back snapshots, drained events, feedback cues and a
//! single [`SessionResult`] per finished run.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioSettings, FeedbackCue, FeedbackSink, NullFeedback};
use crate::persistence::{NullSessionSink, PersonalBest, SessionSink};
use crate::platform;
use crate::settings::GameConfig;
use crate::sim::combo::ComboRating;
use crate::sim::difficulty::{ConfigError, DifficultyPreset};
use crate::sim::scheduler::{Handled, Scheduler, SchedulerEvent};
use crate::sim::sequence::SequencePhase;
use crate::sim::state::{ButtonId, GameEvent, GameMode, GameState, ReactionStats, SessionResult};

/// Top-level lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Nothing started yet, or the run was ended early
    Idle,
    /// Fresh state after a reset, waiting for start
    Ready,
    Playing,
    Paused,
    /// Lives ran out; only reset leaves this phase
    GameOver,
}

/// Whether a command changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Applied,
    Ignored,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        self == CommandOutcome::Applied
    }
}

impl From<Handled> for CommandOutcome {
    fn from(handled: Handled) -> Self {
        match handled {
            Handled::Applied => CommandOutcome::Applied,
            Handled::Ignored => CommandOutcome::Ignored,
        }
    }
}

/// Read-only copy of everything the presentation layer draws
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub phase: SessionPhase,
    pub difficulty: DifficultyPreset,
    pub mode: GameMode,
    pub score: u64,
    pub lives: u32,
    pub combo: u32,
    pub best_combo: u32,
    pub combo_rating: ComboRating,
    pub highlighted_buttons: Vec<ButtonId>,
    pub odd_button: Option<ButtonId>,
    /// Decoy lit alongside the current sequence playback step
    pub distractor_button: Option<ButtonId>,
    pub sequence_length: Option<usize>,
    /// Correct replay presses so far
    pub sequence_progress: usize,
    pub awaiting_input: bool,
    pub game_over: bool,
    pub is_paused: bool,
    pub is_processing: bool,
    pub reaction_stats: ReactionStats,
    pub personal_best: PersonalBest,
    pub time_remaining_ms: Option<u64>,
}

pub struct Session {
    config: GameConfig,
    state: GameState,
    scheduler: Scheduler,
    phase: SessionPhase,
    /// Last clock value supplied by the host
    now_ms: u64,
    /// Derives a scheduler seed for every run
    seeds: Pcg32,
    result_recorded: bool,
    last_result: Option<SessionResult>,
    personal_best: PersonalBest,
    feedback: Box<dyn FeedbackSink>,
    session_sink: Box<dyn SessionSink>,
    outbox: Vec<GameEvent>,
}

impl Session {
    /// Create an idle session. Fails only on invalid configuration.
    pub fn new(config: GameConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut seeds = Pcg32::seed_from_u64(seed);
        let scheduler = Scheduler::new(config.scheduler_config(), seeds.random());
        let state = GameState::new(config.lives());
        log::info!(
            "Session created: {} / {} (seed {})",
            config.difficulty.as_str(),
            config.mode.as_str(),
            seed
        );
        Ok(Self {
            config,
            state,
            scheduler,
            phase: SessionPhase::Idle,
            now_ms: 0,
            seeds,
            result_recorded: false,
            last_result: None,
            personal_best: PersonalBest::default(),
            feedback: Box::new(NullFeedback),
            session_sink: Box::new(NullSessionSink),
            outbox: Vec::new(),
        })
    }

    pub fn with_feedback(mut self, feedback: impl FeedbackSink + 'static) -> Self {
        self.feedback = Box::new(feedback);
        self.feedback.apply_audio_settings(self.config.audio);
        self
    }

    pub fn with_session_sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.session_sink = Box::new(sink);
        self
    }

    /// Seed the snapshot's personal best (usually from a progress store)
    pub fn with_personal_best(mut self, best: PersonalBest) -> Self {
        self.personal_best = best;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn personal_best(&self) -> PersonalBest {
        self.personal_best
    }

    /// Result of the most recent run that ended in game over
    pub fn last_result(&self) -> Option<&SessionResult> {
        self.last_result.as_ref()
    }

    pub fn start_game(&mut self) -> CommandOutcome {
        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Ready) {
            log::debug!("start_game ignored in {:?}", self.phase);
            return CommandOutcome::Ignored;
        }
        self.fresh_run();
        self.state.started_at_ms = self.now_ms;
        self.phase = SessionPhase::Playing;
        log::info!(
            "Game started: {} / {}, {} lives",
            self.config.difficulty.as_str(),
            self.config.mode.as_str(),
            self.state.lives()
        );
        self.scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Start);
        self.dispatch_events();
        CommandOutcome::Applied
    }

    pub fn pause_game(&mut self) -> CommandOutcome {
        if self.phase != SessionPhase::Playing {
            log::debug!("pause_game ignored in {:?}", self.phase);
            return CommandOutcome::Ignored;
        }
        self.scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Pause);
        self.phase = SessionPhase::Paused;
        log::info!("Game paused at score {}", self.state.score);
        CommandOutcome::Applied
    }

    pub fn resume_game(&mut self) -> CommandOutcome {
        if self.phase != SessionPhase::Paused {
            log::debug!("resume_game ignored in {:?}", self.phase);
            return CommandOutcome::Ignored;
        }
        self.scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Resume);
        self.phase = SessionPhase::Playing;
        log::info!("Game resumed");
        self.dispatch_events();
        CommandOutcome::Applied
    }

    /// Back to a fresh Ready state from anywhere. In-flight timers go stale.
    pub fn reset_game(&mut self) -> CommandOutcome {
        self.scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Cancel);
        self.fresh_run();
        self.outbox.clear();
        self.phase = SessionPhase::Ready;
        log::info!("Game reset");
        CommandOutcome::Applied
    }

    /// Stop the run without touching score or lives and without a result
    pub fn end_game(&mut self) -> CommandOutcome {
        if self.phase == SessionPhase::Idle {
            log::debug!("end_game ignored: already idle");
            return CommandOutcome::Ignored;
        }
        self.scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Cancel);
        self.state.is_paused = false;
        self.phase = SessionPhase::Idle;
        log::info!("Game ended at score {}", self.state.score);
        CommandOutcome::Applied
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyPreset) -> CommandOutcome {
        if self.in_run() {
            log::debug!("set_difficulty ignored during a run");
            return CommandOutcome::Ignored;
        }
        self.config.difficulty = difficulty;
        self.refresh_idle_run();
        log::info!("Difficulty set to {}", difficulty.as_str());
        CommandOutcome::Applied
    }

    pub fn set_game_mode(&mut self, mode: GameMode) -> CommandOutcome {
        if self.in_run() {
            log::debug!("set_game_mode ignored during a run");
            return CommandOutcome::Ignored;
        }
        self.config.mode = mode;
        self.refresh_idle_run();
        log::info!("Game mode set to {}", mode.as_str());
        CommandOutcome::Applied
    }

    /// Volume and mute can change at any time, including mid-run
    pub fn set_audio(&mut self, settings: AudioSettings) -> CommandOutcome {
        let settings = settings.clamped();
        if settings == self.config.audio {
            return CommandOutcome::Ignored;
        }
        self.config.audio = settings;
        self.feedback.apply_audio_settings(settings);
        log::info!(
            "Audio set: volume {:.2}, muted {}",
            settings.master_volume,
            settings.muted
        );
        CommandOutcome::Applied
    }

    /// Press at the session's current clock
    pub fn on_button_press(&mut self, button: ButtonId) -> CommandOutcome {
        if self.phase != SessionPhase::Playing {
            log::debug!("press {} ignored in {:?}", button, self.phase);
            return CommandOutcome::Ignored;
        }
        let handled = self
            .scheduler
            .advance(&mut self.state, self.now_ms, SchedulerEvent::Press(button));
        self.dispatch_events();
        handled.into()
    }

    /// Press stamped with the host's clock. Timers due by `now_ms` fire
    /// first, so a press after the deadline can't beat the timeout.
    pub fn on_button_press_at(&mut self, button: ButtonId, now_ms: u64) -> CommandOutcome {
        self.update(now_ms);
        self.on_button_press(button)
    }

    /// Press by raw grid index; out-of-range indices are ignored
    pub fn press_index(&mut self, index: u8, now_ms: u64) -> CommandOutcome {
        match ButtonId::new(index) {
            Some(button) => self.on_button_press_at(button, now_ms),
            None => {
                log::debug!("press ignored: no button {}", index);
                CommandOutcome::Ignored
            }
        }
    }

    /// Advance the clock and fire every timer due by `now_ms`.
    /// A clock that goes backwards is held at its last value.
    pub fn update(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        if matches!(self.phase, SessionPhase::Playing | SessionPhase::Paused) {
            self.scheduler.poll(&mut self.state, self.now_ms);
            self.dispatch_events();
        }
    }

    /// Events since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> Snapshot {
        let sequence = self.scheduler.sequence();
        Snapshot {
            phase: self.phase,
            difficulty: self.config.difficulty,
            mode: self.config.mode,
            score: self.state.score,
            lives: self.state.lives(),
            combo: self.state.combo(),
            best_combo: self.state.best_combo(),
            combo_rating: ComboRating::from_combo(self.state.combo(), self.config.difficulty),
            highlighted_buttons: self.state.highlighted_buttons.iter().copied().collect(),
            odd_button: self.state.odd_button,
            distractor_button: sequence.and_then(|s| s.lit_distractor()),
            sequence_length: sequence.map(|s| s.len()),
            sequence_progress: sequence.map_or(0, |s| s.input.len()),
            awaiting_input: sequence.is_some_and(|s| s.phase == SequencePhase::WaitingForInput),
            game_over: self.state.is_game_over(),
            is_paused: self.state.is_paused,
            is_processing: self.state.is_processing,
            reaction_stats: self.state.reaction_stats(),
            personal_best: self.personal_best,
            time_remaining_ms: self.scheduler.time_remaining(self.now_ms),
        }
    }

    fn in_run(&self) -> bool {
        matches!(self.phase, SessionPhase::Playing | SessionPhase::Paused)
    }

    /// New state and scheduler for the current config
    fn fresh_run(&mut self) {
        self.scheduler = Scheduler::new(self.config.scheduler_config(), self.seeds.random());
        self.state = GameState::new(self.config.lives());
        self.result_recorded = false;
    }

    /// Settings changed while no run is in flight: show the new starting state
    fn refresh_idle_run(&mut self) {
        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Ready) {
            self.fresh_run();
        }
    }

    /// Forward drained simulation events to feedback and the outbox
    fn dispatch_events(&mut self) {
        let events = std::mem::take(&mut self.state.events);
        for event in events {
            let cue = match &event {
                GameEvent::Hit { .. }
                | GameEvent::SequenceProgress { .. }
                | GameEvent::SequenceCompleted { .. } => Some(FeedbackCue::Hit),
                GameEvent::Miss { .. } => Some(FeedbackCue::Miss),
                GameEvent::LifeLost { .. } => Some(FeedbackCue::LifeLost),
                GameEvent::GameOver { .. } => Some(FeedbackCue::GameOver),
                GameEvent::RoundStarted { .. }
                | GameEvent::SequenceStep { .. }
                | GameEvent::SequenceAwaitingInput { .. } => None,
            };
            if let Some(cue) = cue {
                self.feedback.play_feedback_cue(cue);
            }
            let game_over = matches!(event, GameEvent::GameOver { .. });
            self.outbox.push(event);
            if game_over {
                self.finish();
            }
        }
    }

    /// Enter GameOver and emit the run's result exactly once
    fn finish(&mut self) {
        self.phase = SessionPhase::GameOver;
        if self.result_recorded {
            return;
        }
        self.result_recorded = true;

        let stats = self.state.reaction_stats();
        let result = SessionResult {
            score: self.state.score,
            best_combo: self.state.best_combo(),
            average_reaction_time_ms: stats.average_ms,
            fastest_reaction_time_ms: stats.fastest_ms,
            total_presses: self.state.total_presses,
            hits: self.state.hits,
            misses: self.state.misses,
            difficulty: self.config.difficulty,
            mode: self.config.mode,
            timestamp: platform::wall_clock_ms(),
            duration_ms: self
                .state
                .ended_at_ms
                .unwrap_or(self.now_ms)
                .saturating_sub(self.state.started_at_ms),
        };
        log::info!(
            "Game over: score {}, best combo {}, {} presses",
            result.score,
            result.best_combo,
            result.total_presses
        );
        if self.personal_best.absorb(&result) {
            log::info!("New personal best: {:?}", self.personal_best);
        }
        self.session_sink.on_session_complete(&result);
        self.last_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CueRecorder;
    use crate::persistence::SessionLog;
    use crate::sim::state::MissKind;

    fn session(difficulty: DifficultyPreset, mode: GameMode) -> Session {
        Session::new(GameConfig::new(difficulty, mode), 42).unwrap()
    }

    fn lit(session: &Session) -> ButtonId {
        session.snapshot().highlighted_buttons[0]
    }

    fn unlit(session: &Session) -> ButtonId {
        let snap = session.snapshot();
        ButtonId::all()
            .find(|b| !snap.highlighted_buttons.contains(b))
            .unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.pause_game(), CommandOutcome::Ignored);
        assert_eq!(s.start_game(), CommandOutcome::Applied);
        assert_eq!(s.phase(), SessionPhase::Playing);
        assert_eq!(s.start_game(), CommandOutcome::Ignored);
        assert_eq!(s.pause_game(), CommandOutcome::Applied);
        assert_eq!(s.pause_game(), CommandOutcome::Ignored);
        assert_eq!(s.resume_game(), CommandOutcome::Applied);
        assert_eq!(s.reset_game(), CommandOutcome::Applied);
        assert_eq!(s.phase(), SessionPhase::Ready);
        assert_eq!(s.snapshot().score, 0);
    }

    #[test]
    fn test_basic_hit_scores_and_cues() {
        let recorder = CueRecorder::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex).with_feedback(recorder.clone());
        s.update(1_000);
        s.start_game();
        let target = lit(&s);
        s.update(1_250);
        assert_eq!(s.on_button_press(target), CommandOutcome::Applied);

        let snap = s.snapshot();
        assert_eq!(snap.score, 1);
        assert_eq!(snap.combo, 1);
        assert_eq!(snap.reaction_stats.last_ms, Some(250));
        assert!(snap.highlighted_buttons.is_empty());
        assert_eq!(recorder.cues(), vec![FeedbackCue::Hit]);
    }

    #[test]
    fn test_presses_outside_play_are_ignored() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        assert_eq!(s.press_index(0, 0), CommandOutcome::Ignored);
        s.start_game();
        assert_eq!(s.press_index(99, 0), CommandOutcome::Ignored);
        s.pause_game();
        let target = lit(&s);
        assert_eq!(s.on_button_press(target), CommandOutcome::Ignored);
        assert_eq!(s.state().total_presses, 0);
    }

    #[test]
    fn test_game_over_emits_once() {
        let log = SessionLog::new();
        let recorder = CueRecorder::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Survival)
            .with_feedback(recorder.clone())
            .with_session_sink(log.clone());
        s.start_game();
        let wrong = unlit(&s);
        s.on_button_press(wrong);

        assert_eq!(s.phase(), SessionPhase::GameOver);
        assert!(s.snapshot().game_over);
        assert_eq!(log.len(), 1);
        assert_eq!(recorder.count(FeedbackCue::GameOver), 1);

        // nothing after game over produces another result
        assert_eq!(s.press_index(0, 0), CommandOutcome::Ignored);
        s.update(60_000);
        assert_eq!(s.start_game(), CommandOutcome::Ignored);
        assert_eq!(log.len(), 1);

        let result = &log.results()[0];
        assert_eq!(result.mode, GameMode::Survival);
        assert_eq!(result.misses, 1);
        assert_eq!(result.total_presses, 1);
    }

    #[test]
    fn test_reset_after_game_over_allows_new_run() {
        let log = SessionLog::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Survival).with_session_sink(log.clone());
        s.start_game();
        s.update(1_000);
        assert_eq!(s.phase(), SessionPhase::GameOver);

        s.reset_game();
        assert_eq!(s.phase(), SessionPhase::Ready);
        assert_eq!(s.snapshot().lives, 1);
        assert!(s.drain_events().is_empty());
        s.start_game();
        s.update(2_000);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_end_game_keeps_score_and_skips_result() {
        let log = SessionLog::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex).with_session_sink(log.clone());
        s.start_game();
        let target = lit(&s);
        s.update(100);
        s.on_button_press(target);
        assert_eq!(s.end_game(), CommandOutcome::Applied);
        assert_eq!(s.phase(), SessionPhase::Idle);

        let snap = s.snapshot();
        assert_eq!(snap.score, 1);
        assert_eq!(snap.lives, 5);
        s.update(10_000);
        assert_eq!(s.snapshot().lives, 5);
        assert!(log.is_empty());
        assert_eq!(s.end_game(), CommandOutcome::Ignored);
    }

    #[test]
    fn test_settings_locked_during_run() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        assert_eq!(s.set_game_mode(GameMode::Nightmare), CommandOutcome::Applied);
        assert_eq!(s.snapshot().lives, 1);
        s.start_game();
        assert_eq!(s.set_difficulty(DifficultyPreset::Hard), CommandOutcome::Ignored);
        assert_eq!(s.set_game_mode(GameMode::Reflex), CommandOutcome::Ignored);
        assert_eq!(s.snapshot().difficulty, DifficultyPreset::Easy);
    }

    #[test]
    fn test_pause_holds_countdown() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        s.start_game();
        s.update(300);
        s.pause_game();
        assert_eq!(s.snapshot().time_remaining_ms, Some(700));
        s.update(5_000);
        assert_eq!(s.snapshot().lives, 5);
        assert_eq!(s.snapshot().time_remaining_ms, Some(700));
        s.resume_game();
        s.update(5_699);
        assert_eq!(s.snapshot().lives, 5);
        s.update(5_700);
        assert_eq!(s.snapshot().lives, 4);
    }

    #[test]
    fn test_press_after_deadline_is_a_timeout() {
        let recorder = CueRecorder::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex).with_feedback(recorder.clone());
        s.start_game();
        let target = lit(&s);
        s.update(990);
        s.drain_events();

        // the frame that carries the press is already past the 1000ms deadline
        assert_eq!(s.on_button_press_at(target, 1_010), CommandOutcome::Ignored);
        let snap = s.snapshot();
        assert_eq!(snap.lives, 4);
        assert_eq!(snap.score, 0);
        assert_eq!(s.state().hits, 0);
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::Miss {
                kind: MissKind::Timeout,
                ..
            }
        )));
        assert_eq!(recorder.count(FeedbackCue::Hit), 0);
    }

    #[test]
    fn test_press_before_deadline_uses_its_own_time() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        s.start_game();
        let target = lit(&s);
        s.update(400);
        assert_eq!(s.on_button_press_at(target, 995), CommandOutcome::Applied);
        let snap = s.snapshot();
        assert_eq!(snap.lives, 5);
        assert_eq!(snap.score, 1);
        assert_eq!(snap.reaction_stats.last_ms, Some(995));
    }

    #[test]
    fn test_audio_settings_reach_feedback() {
        let recorder = CueRecorder::new();
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex).with_feedback(recorder.clone());
        assert_eq!(recorder.audio_settings(), Some(AudioSettings::default()));

        s.start_game();
        let muted = AudioSettings {
            muted: true,
            ..s.config().audio
        };
        assert_eq!(s.set_audio(muted), CommandOutcome::Applied);
        assert_eq!(s.set_audio(muted), CommandOutcome::Ignored);
        assert!(s.config().audio.muted);
        assert_eq!(recorder.audio_settings(), Some(muted));
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        s.update(500);
        s.update(100);
        assert_eq!(s.now_ms(), 500);
    }

    #[test]
    fn test_drain_events() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Reflex);
        s.start_game();
        let events = s.drain_events();
        assert!(matches!(events.as_slice(), [GameEvent::RoundStarted { .. }]));
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GameConfig {
            starting_lives: 0,
            ..GameConfig::default()
        };
        assert!(matches!(Session::new(config, 1), Err(ConfigError::NoLives)));
    }

    #[test]
    fn test_personal_best_tracks_results() {
        let mut s = session(DifficultyPreset::Easy, GameMode::Survival)
            .with_personal_best(PersonalBest {
                high_score: 0,
                best_combo: 0,
            });
        s.start_game();
        let target = lit(&s);
        s.update(100);
        s.on_button_press(target);
        s.update(100_000);
        assert_eq!(s.phase(), SessionPhase::GameOver);
        assert_eq!(s.personal_best().high_score, s.state().score);
        assert_eq!(s.last_result().map(|r| r.score), Some(s.state().score));
    }
}
