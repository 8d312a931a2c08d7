//! Round scheduler
//!
//! Drives highlight cycles for the reflex family of modes and the
//! playback/replay loop for Sequence mode. Everything enters through
//! [`Scheduler::advance`]; timers come back in as `TimerFired` events and
//! are dropped if their epoch is no longer current.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::combo::MissOutcome;
use super::difficulty::{DifficultyParams, DifficultyPreset, compute_timing, sequence_timing};
use super::scoring::{self, CONSISTENCY_WINDOW, ScoringContext};
use super::sequence::{ReplayOutcome, SequencePhase, SequenceRound};
use super::state::{ButtonId, GRID_SIZE, GameEvent, GameMode, GameState, MissKind};
use super::timer::{Timer, TimerKind, TimerQueue};

/// Buttons lit in every Odd-One-Out round (at least)
pub const ODD_ONE_OUT_MIN_BUTTONS: usize = 3;

/// Score threshold plus probability for occasional extra complexity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomGate {
    pub min_score: u64,
    /// Chance per round once `min_score` is reached (0.0 - 1.0)
    pub chance: f64,
}

impl RandomGate {
    pub const DISABLED: RandomGate = RandomGate {
        min_score: u64::MAX,
        chance: 0.0,
    };

    pub fn passes<R: Rng + ?Sized>(&self, rng: &mut R, score: u64) -> bool {
        if score < self.min_score || !(self.chance > 0.0) {
            return false;
        }
        rng.random_bool(self.chance.min(1.0))
    }
}

/// Everything the scheduler needs to know about the run
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: GameMode,
    pub difficulty: DifficultyPreset,
    /// Already adjusted for `mode`
    pub params: DifficultyParams,
    /// Pause between a resolved round and the next highlight
    pub cooldown_ms: u64,
    /// Delay before a new sequence after a failed replay
    pub sequence_penalty_ms: u64,
    /// Delay before the next sequence after a correct replay
    pub sequence_advance_ms: u64,
    /// Extra lit button in reflex rounds
    pub multi_hit: RandomGate,
    /// Second, unvalidated sequence shown during playback
    pub distractor: RandomGate,
    pub advanced_scoring: bool,
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No round in flight
    Idle,
    /// Targets lit, countdown armed
    Highlighting,
    /// Round resolved, waiting before the next one
    Cooldown,
    /// Sequence mode round in flight (see [`SequencePhase`])
    Sequence,
    /// Lives ran out
    GameOver,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Begin a round if none is in flight
    Start,
    Press(ButtonId),
    TimerFired(Timer),
    Pause,
    Resume,
    /// Abandon the round in flight (reset / navigation away)
    Cancel,
}

/// Whether an event changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    Ignored,
}

#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    phase: RoundPhase,
    timers: TimerQueue,
    rng: Pcg32,
    /// When the current targets lit (or replay input opened)
    highlight_start_ms: u64,
    /// Last accepted replay press, for per-press reaction samples
    last_input_ms: u64,
    paused_at_ms: Option<u64>,
    sequence: Option<SequenceRound>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, seed: u64) -> Self {
        Self {
            config,
            phase: RoundPhase::Idle,
            timers: TimerQueue::new(),
            rng: Pcg32::seed_from_u64(seed),
            highlight_start_ms: 0,
            last_input_ms: 0,
            paused_at_ms: None,
            sequence: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn sequence(&self) -> Option<&SequenceRound> {
        self.sequence.as_ref()
    }

    /// Countdown left on the active round, if one is armed
    pub fn time_remaining(&self, now_ms: u64) -> Option<u64> {
        self.timers
            .remaining(now_ms, TimerKind::Countdown)
            .or_else(|| self.timers.remaining(now_ms, TimerKind::SequenceInputWindow))
    }

    /// Fire every timer due at `now_ms`, oldest first
    pub fn poll(&mut self, state: &mut GameState, now_ms: u64) {
        while let Some(timer) = self.timers.pop_due(now_ms) {
            self.advance(state, timer.due_ms, SchedulerEvent::TimerFired(timer));
        }
    }

    /// Single entry point for the (phase, event) transition table
    pub fn advance(&mut self, state: &mut GameState, now_ms: u64, event: SchedulerEvent) -> Handled {
        match (self.phase, event) {
            (_, SchedulerEvent::TimerFired(timer)) if !self.timers.is_current(&timer) => {
                log::trace!("stale {:?} timer (epoch {}) ignored", timer.kind, timer.epoch);
                Handled::Ignored
            }
            (RoundPhase::GameOver, SchedulerEvent::Cancel) => {
                self.cancel(state);
                Handled::Applied
            }
            (RoundPhase::GameOver, _) => Handled::Ignored,

            (_, SchedulerEvent::Cancel) => {
                self.cancel(state);
                Handled::Applied
            }
            (_, SchedulerEvent::Pause) => self.pause(state, now_ms),
            (_, SchedulerEvent::Resume) => self.resume(state, now_ms),
            (_, _) if state.is_paused => Handled::Ignored,

            (RoundPhase::Idle, SchedulerEvent::Start) => self.start_round(state, now_ms),
            (_, SchedulerEvent::Start) => {
                log::debug!("start ignored: round already in flight ({:?})", self.phase);
                Handled::Ignored
            }

            (RoundPhase::Highlighting, SchedulerEvent::Press(button)) => {
                self.press_highlight(state, now_ms, button)
            }
            (RoundPhase::Sequence, SchedulerEvent::Press(button)) => {
                self.press_sequence(state, now_ms, button)
            }
            (_, SchedulerEvent::Press(button)) => {
                log::debug!("press {} ignored in {:?}", button, self.phase);
                Handled::Ignored
            }

            (RoundPhase::Highlighting, SchedulerEvent::TimerFired(timer))
                if timer.kind == TimerKind::Countdown =>
            {
                if state.highlighted_buttons.is_empty() {
                    return Handled::Ignored;
                }
                self.miss(state, now_ms, None, MissKind::Timeout);
                Handled::Applied
            }
            (RoundPhase::Cooldown, SchedulerEvent::TimerFired(timer))
                if timer.kind == TimerKind::CooldownDone =>
            {
                state.is_processing = false;
                self.phase = RoundPhase::Idle;
                self.start_round(state, now_ms)
            }
            (RoundPhase::Sequence, SchedulerEvent::TimerFired(timer)) => {
                self.sequence_timer(state, now_ms, timer.kind)
            }
            (_, SchedulerEvent::TimerFired(timer)) => {
                log::trace!("{:?} timer has no effect in {:?}", timer.kind, self.phase);
                Handled::Ignored
            }
        }
    }

    fn start_round(&mut self, state: &mut GameState, now_ms: u64) -> Handled {
        if state.is_processing || !state.highlighted_buttons.is_empty() || state.is_game_over() {
            log::debug!("start ignored: processing={}", state.is_processing);
            return Handled::Ignored;
        }
        if self.config.mode == GameMode::Sequence {
            self.begin_sequence(state, now_ms);
        } else {
            self.begin_highlight(state, now_ms);
        }
        Handled::Applied
    }

    fn begin_highlight(&mut self, state: &mut GameState, now_ms: u64) {
        let timing = compute_timing(state.score, &self.config.params);
        let mut count = timing.button_count;
        let odd_one_out = self.config.mode == GameMode::OddOneOut;
        if odd_one_out {
            count = count.max(ODD_ONE_OUT_MIN_BUTTONS);
        } else if self.config.multi_hit.passes(&mut self.rng, state.score) {
            log::debug!("multi-hit round at score {}", state.score);
            count += 1;
        }
        let count = count.min(GRID_SIZE);

        // uniform without replacement, skipping anything still lit
        let free: Vec<ButtonId> = ButtonId::all()
            .filter(|b| !state.highlighted_buttons.contains(b))
            .collect();
        let picked: Vec<ButtonId> = rand::seq::index::sample(&mut self.rng, free.len(), count.min(free.len()))
            .into_iter()
            .map(|i| free[i])
            .collect();

        state.odd_button = if odd_one_out { picked.first().copied() } else { None };
        state.highlighted_buttons = picked.iter().copied().collect::<BTreeSet<_>>();
        state.rounds_played += 1;

        self.highlight_start_ms = now_ms;
        self.phase = RoundPhase::Highlighting;
        self.timers.schedule(now_ms, timing.duration_ms, TimerKind::Countdown);

        state.push_event(GameEvent::RoundStarted {
            buttons: state.highlighted_buttons.iter().copied().collect(),
            odd_button: state.odd_button,
            duration_ms: timing.duration_ms,
        });
    }

    fn press_highlight(&mut self, state: &mut GameState, now_ms: u64, button: ButtonId) -> Handled {
        state.total_presses += 1;

        let correct = match state.odd_button {
            Some(odd) => button == odd,
            None => state.highlighted_buttons.contains(&button),
        };
        if !correct {
            self.miss(state, now_ms, Some(button), MissKind::WrongButton);
            return Handled::Applied;
        }

        if state.odd_button.is_some() {
            state.clear_highlights();
        } else {
            state.highlighted_buttons.remove(&button);
        }
        self.hit(state, now_ms, button);

        if state.highlighted_buttons.is_empty() {
            self.enter_cooldown(state, now_ms, self.config.cooldown_ms);
        }
        Handled::Applied
    }

    fn hit(&mut self, state: &mut GameState, now_ms: u64, button: ButtonId) {
        let reaction_ms = now_ms.saturating_sub(self.highlight_start_ms);
        state.reaction_time_samples.push(reaction_ms);
        let combo = state.tracker.on_hit();
        state.hits += 1;

        let factors = scoring::score(
            combo,
            self.config.difficulty,
            self.config.mode,
            reaction_ms,
            ScoringContext {
                recent_reactions: state.recent_reactions(CONSISTENCY_WINDOW),
                advanced: self.config.advanced_scoring,
            },
        );
        state.score += factors.total_score;
        state.push_event(GameEvent::Hit {
            button,
            reaction_ms,
            points: factors.total_score,
        });
    }

    /// Fail the round in flight: one life, combo reset, targets cleared
    fn miss(&mut self, state: &mut GameState, now_ms: u64, button: Option<ButtonId>, kind: MissKind) {
        state.misses += 1;
        state.clear_highlights();
        self.timers.cancel_all();
        state.push_event(GameEvent::Miss { button, kind });

        match state.tracker.on_miss() {
            MissOutcome::LifeLost { lives } => {
                log::debug!("{:?} miss, {} lives left", kind, lives);
                state.push_event(GameEvent::LifeLost { lives });
                if self.config.mode == GameMode::Sequence {
                    self.enter_sequence_delay(state, now_ms, self.config.sequence_penalty_ms);
                } else {
                    self.enter_cooldown(state, now_ms, self.config.cooldown_ms);
                }
            }
            MissOutcome::GameOver => {
                log::info!("game over at score {}", state.score);
                state.is_processing = false;
                state.ended_at_ms = Some(now_ms);
                self.sequence = None;
                self.phase = RoundPhase::GameOver;
                state.push_event(GameEvent::GameOver { score: state.score });
            }
            MissOutcome::Ignored => {}
        }
    }

    fn enter_cooldown(&mut self, state: &mut GameState, now_ms: u64, delay_ms: u64) {
        self.timers.cancel_all();
        state.is_processing = true;
        self.phase = RoundPhase::Cooldown;
        self.timers.schedule(now_ms, delay_ms, TimerKind::CooldownDone);
    }

    fn begin_sequence(&mut self, state: &mut GameState, now_ms: u64) {
        let timing = sequence_timing(state.score, &self.config.params);
        let with_distractor = self.config.distractor.passes(&mut self.rng, state.score);
        let round = SequenceRound::new(&mut self.rng, timing, with_distractor);

        state.rounds_played += 1;
        state.is_processing = true;
        state.highlighted_buttons = round.lit_button().into_iter().collect();
        if let Some(button) = round.lit_button() {
            state.push_event(GameEvent::SequenceStep {
                step: 0,
                button,
                distractor: round.lit_distractor(),
            });
        }

        self.timers.schedule(now_ms, round.display_ms, TimerKind::SequenceStep);
        self.sequence = Some(round);
        self.phase = RoundPhase::Sequence;
    }

    fn sequence_timer(&mut self, state: &mut GameState, now_ms: u64, kind: TimerKind) -> Handled {
        match kind {
            TimerKind::SequenceStep => {
                let Some(round) = self.sequence.as_mut() else {
                    return Handled::Ignored;
                };
                match round.advance_playback() {
                    Some(delay) => {
                        state.highlighted_buttons = round.lit_button().into_iter().collect();
                        if let (Some(button), SequencePhase::Showing { step, .. }) =
                            (round.lit_button(), round.phase)
                        {
                            state.push_event(GameEvent::SequenceStep {
                                step,
                                button,
                                distractor: round.lit_distractor(),
                            });
                        }
                        self.timers.schedule(now_ms, delay, TimerKind::SequenceStep);
                    }
                    None => {
                        state.highlighted_buttons.clear();
                        state.is_processing = false;
                        self.highlight_start_ms = now_ms;
                        self.last_input_ms = now_ms;
                        let length = round.len();
                        let window = round.input_window_ms;
                        state.push_event(GameEvent::SequenceAwaitingInput { length });
                        self.timers.schedule(now_ms, window, TimerKind::SequenceInputWindow);
                    }
                }
                Handled::Applied
            }
            TimerKind::SequenceInputWindow => {
                let expired = self.sequence.as_mut().is_some_and(|round| round.expire());
                if !expired {
                    return Handled::Ignored;
                }
                self.miss(state, now_ms, None, MissKind::Timeout);
                Handled::Applied
            }
            TimerKind::SequenceRestart => {
                state.is_processing = false;
                self.sequence = None;
                self.begin_sequence(state, now_ms);
                Handled::Applied
            }
            TimerKind::Countdown | TimerKind::CooldownDone => Handled::Ignored,
        }
    }

    fn press_sequence(&mut self, state: &mut GameState, now_ms: u64, button: ButtonId) -> Handled {
        let Some(round) = self.sequence.as_mut() else {
            return Handled::Ignored;
        };
        let outcome = round.press(button);
        let length = round.len();
        match outcome {
            ReplayOutcome::Ignored => {
                log::debug!("press {} ignored during sequence playback", button);
                return Handled::Ignored;
            }
            ReplayOutcome::Progress { matched } => {
                state.total_presses += 1;
                self.record_replay_press(state, now_ms);
                state.push_event(GameEvent::SequenceProgress { matched, length });
            }
            ReplayOutcome::Complete => {
                state.total_presses += 1;
                self.record_replay_press(state, now_ms);
                let combo = state.tracker.on_hit();
                state.hits += 1;
                let factors =
                    scoring::score_sequence(length, combo, self.config.difficulty, self.config.mode);
                state.score += factors.total_score;
                state.push_event(GameEvent::SequenceCompleted {
                    length,
                    points: factors.total_score,
                });
                self.timers.cancel_all();
                self.enter_sequence_delay(state, now_ms, self.config.sequence_advance_ms);
            }
            ReplayOutcome::Mismatch { position, expected, got } => {
                state.total_presses += 1;
                log::debug!("sequence mismatch at {}: expected {}, got {}", position, expected, got);
                self.miss(state, now_ms, Some(got), MissKind::SequenceMismatch);
            }
        }
        Handled::Applied
    }

    fn record_replay_press(&mut self, state: &mut GameState, now_ms: u64) {
        state
            .reaction_time_samples
            .push(now_ms.saturating_sub(self.last_input_ms));
        self.last_input_ms = now_ms;
    }

    fn enter_sequence_delay(&mut self, state: &mut GameState, now_ms: u64, delay_ms: u64) {
        state.is_processing = true;
        state.highlighted_buttons.clear();
        self.phase = RoundPhase::Sequence;
        self.timers.schedule(now_ms, delay_ms, TimerKind::SequenceRestart);
    }

    fn pause(&mut self, state: &mut GameState, now_ms: u64) -> Handled {
        if state.is_paused {
            return Handled::Ignored;
        }
        self.timers.freeze(now_ms);
        self.paused_at_ms = Some(now_ms);
        state.is_paused = true;
        Handled::Applied
    }

    fn resume(&mut self, state: &mut GameState, now_ms: u64) -> Handled {
        if !state.is_paused {
            return Handled::Ignored;
        }
        state.is_paused = false;
        if let Some(paused_at) = self.paused_at_ms.take() {
            let paused_for = now_ms.saturating_sub(paused_at);
            self.highlight_start_ms += paused_for;
            self.last_input_ms += paused_for;
        }
        self.timers.thaw(now_ms);

        // nothing lit in a reflex mode: go straight into a fresh cycle
        if self.config.mode.is_reflex_family()
            && matches!(self.phase, RoundPhase::Idle | RoundPhase::Cooldown)
        {
            self.timers.cancel_all();
            state.is_processing = false;
            self.phase = RoundPhase::Idle;
            self.start_round(state, now_ms);
        }
        Handled::Applied
    }

    fn cancel(&mut self, state: &mut GameState) {
        self.timers.cancel_all();
        self.sequence = None;
        self.paused_at_ms = None;
        state.clear_highlights();
        state.is_processing = false;
        if self.phase != RoundPhase::GameOver {
            self.phase = RoundPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::difficulty::ButtonStep;

    fn config(mode: GameMode, difficulty: DifficultyPreset) -> SchedulerConfig {
        SchedulerConfig {
            mode,
            difficulty,
            params: difficulty.params().for_mode(mode),
            cooldown_ms: 400,
            sequence_penalty_ms: 1500,
            sequence_advance_ms: 1000,
            multi_hit: RandomGate::DISABLED,
            distractor: RandomGate::DISABLED,
            advanced_scoring: true,
        }
    }

    fn setup(mode: GameMode, lives: u32) -> (Scheduler, GameState) {
        let scheduler = Scheduler::new(config(mode, DifficultyPreset::Easy), 7);
        (scheduler, GameState::new(lives))
    }

    fn lit(state: &GameState) -> ButtonId {
        *state.highlighted_buttons.iter().next().unwrap()
    }

    fn unlit(state: &GameState) -> ButtonId {
        ButtonId::all()
            .find(|b| !state.highlighted_buttons.contains(b))
            .unwrap()
    }

    #[test]
    fn test_basic_hit() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 5);
        assert_eq!(sched.advance(&mut state, 0, SchedulerEvent::Start), Handled::Applied);
        assert_eq!(state.highlighted_buttons.len(), 1);

        let target = lit(&state);
        sched.advance(&mut state, 200, SchedulerEvent::Press(target));
        assert_eq!(state.reaction_time_samples, vec![200]);
        assert_eq!(state.combo(), 1);
        assert_eq!(state.score, 1);
        assert_eq!(sched.phase(), RoundPhase::Cooldown);
        assert!(state.is_processing);

        sched.poll(&mut state, 600);
        assert_eq!(sched.phase(), RoundPhase::Highlighting);
        assert!(!state.is_processing);
    }

    #[test]
    fn test_wrong_press_misses() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let wrong = unlit(&state);
        sched.advance(&mut state, 100, SchedulerEvent::Press(wrong));
        assert_eq!(state.lives(), 2);
        assert_eq!(state.combo(), 0);
        assert_eq!(state.score, 0);
        assert!(state.highlighted_buttons.is_empty());
        assert_eq!(sched.phase(), RoundPhase::Cooldown);
    }

    #[test]
    fn test_timeout_misses_once() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        sched.poll(&mut state, 999);
        assert_eq!(state.lives(), 3);
        sched.poll(&mut state, 1000);
        assert_eq!(state.lives(), 2);
        assert!(
            state
                .events
                .iter()
                .any(|e| matches!(e, GameEvent::Miss { kind: MissKind::Timeout, .. }))
        );
    }

    #[test]
    fn test_press_during_cooldown_ignored() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let target = lit(&state);
        sched.advance(&mut state, 100, SchedulerEvent::Press(target));
        let presses = state.total_presses;
        assert_eq!(
            sched.advance(&mut state, 150, SchedulerEvent::Press(target)),
            Handled::Ignored
        );
        assert_eq!(state.total_presses, presses);
        assert_eq!(state.lives(), 3);
    }

    #[test]
    fn test_double_start_is_noop() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let first = state.highlighted_buttons.clone();
        assert_eq!(sched.advance(&mut state, 1, SchedulerEvent::Start), Handled::Ignored);
        assert_eq!(state.highlighted_buttons, first);
        assert_eq!(state.rounds_played, 1);
    }

    #[test]
    fn test_hit_and_timeout_race() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let target = lit(&state);
        // hit lands at the countdown deadline; the countdown timer is now stale
        sched.advance(&mut state, 1000, SchedulerEvent::Press(target));
        sched.poll(&mut state, 1000);
        assert_eq!(state.lives(), 3);
        assert_eq!(state.hits, 1);
        assert_eq!(state.misses, 0);
    }

    #[test]
    fn test_pause_preserves_countdown() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        sched.advance(&mut state, 300, SchedulerEvent::Pause);
        sched.poll(&mut state, 10_000);
        assert_eq!(state.lives(), 3);
        assert_eq!(sched.time_remaining(10_000), Some(700));

        sched.advance(&mut state, 10_000, SchedulerEvent::Resume);
        assert_eq!(sched.time_remaining(10_000), Some(700));
        let target = lit(&state);
        sched.advance(&mut state, 10_100, SchedulerEvent::Press(target));
        // pause time is not part of the reaction
        assert_eq!(state.reaction_time_samples, vec![400]);
    }

    #[test]
    fn test_resume_from_cooldown_starts_cycle() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let target = lit(&state);
        sched.advance(&mut state, 100, SchedulerEvent::Press(target));
        sched.advance(&mut state, 150, SchedulerEvent::Pause);
        sched.advance(&mut state, 5000, SchedulerEvent::Resume);
        assert_eq!(sched.phase(), RoundPhase::Highlighting);
        assert_eq!(state.highlighted_buttons.len(), 1);
        // the old cooldown timer must not start a second cycle
        sched.poll(&mut state, 5400);
        assert_eq!(state.rounds_played, 2);
    }

    #[test]
    fn test_multi_button_round() {
        let mut cfg = config(GameMode::Reflex, DifficultyPreset::Easy);
        cfg.params.button_steps = vec![ButtonStep::new(0, 2)];
        let mut sched = Scheduler::new(cfg, 3);
        let mut state = GameState::new(3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        assert_eq!(state.highlighted_buttons.len(), 2);

        let first = lit(&state);
        sched.advance(&mut state, 100, SchedulerEvent::Press(first));
        assert_eq!(sched.phase(), RoundPhase::Highlighting);
        assert_eq!(state.highlighted_buttons.len(), 1);

        let wrong = unlit(&state);
        sched.advance(&mut state, 200, SchedulerEvent::Press(wrong));
        assert!(state.highlighted_buttons.is_empty());
        assert_eq!(state.hits, 1);
        assert_eq!(state.lives(), 2);
        assert_eq!(sched.phase(), RoundPhase::Cooldown);
    }

    #[test]
    fn test_odd_one_out() {
        let (mut sched, mut state) = setup(GameMode::OddOneOut, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        assert!(state.highlighted_buttons.len() >= ODD_ONE_OUT_MIN_BUTTONS);
        let odd = state.odd_button.unwrap();
        assert!(state.highlighted_buttons.contains(&odd));

        let decoy = *state.highlighted_buttons.iter().find(|&&b| b != odd).unwrap();
        sched.advance(&mut state, 100, SchedulerEvent::Press(decoy));
        assert_eq!(state.lives(), 2);

        sched.poll(&mut state, 500);
        let odd = state.odd_button.unwrap();
        sched.advance(&mut state, 650, SchedulerEvent::Press(odd));
        assert_eq!(state.hits, 1);
        assert!(state.highlighted_buttons.is_empty());
        assert_eq!(sched.phase(), RoundPhase::Cooldown);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let (mut sched, mut state) = setup(GameMode::Survival, 1);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let wrong = unlit(&state);
        sched.advance(&mut state, 50, SchedulerEvent::Press(wrong));
        assert_eq!(sched.phase(), RoundPhase::GameOver);
        assert!(state.is_game_over());

        assert_eq!(sched.advance(&mut state, 60, SchedulerEvent::Start), Handled::Ignored);
        assert_eq!(sched.advance(&mut state, 70, SchedulerEvent::Press(wrong)), Handled::Ignored);
        sched.poll(&mut state, 10_000);
        assert_eq!(state.lives(), 0);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_cancel_makes_timers_stale() {
        let (mut sched, mut state) = setup(GameMode::Reflex, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        sched.advance(&mut state, 10, SchedulerEvent::Cancel);
        sched.poll(&mut state, 5000);
        assert_eq!(state.lives(), 3);
        assert_eq!(sched.phase(), RoundPhase::Idle);
    }

    fn play_back(sched: &mut Scheduler, state: &mut GameState, mut now: u64) -> (Vec<ButtonId>, u64) {
        let expected = sched.sequence().unwrap().expected.clone();
        while sched.sequence().unwrap().phase != SequencePhase::WaitingForInput {
            now += 10;
            sched.poll(state, now);
        }
        (expected, now)
    }

    #[test]
    fn test_sequence_round() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        assert_eq!(sched.phase(), RoundPhase::Sequence);
        assert!(state.is_processing);

        // playback presses are ignored
        let shown = lit(&state);
        assert_eq!(sched.advance(&mut state, 5, SchedulerEvent::Press(shown)), Handled::Ignored);

        let (expected, now) = play_back(&mut sched, &mut state, 0);
        assert!(!state.is_processing);
        for (i, &b) in expected.iter().enumerate() {
            sched.advance(&mut state, now + 100 * (i as u64 + 1), SchedulerEvent::Press(b));
        }
        assert_eq!(state.combo(), 1);
        // length 3 on Easy, flat award
        assert_eq!(state.score, 3);
        assert!(state.is_processing);

        sched.poll(&mut state, now + 300 + 1000);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Showing { step: 0, lit: true });
    }

    #[test]
    fn test_sequence_mismatch_ends_round() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let (expected, now) = play_back(&mut sched, &mut state, 0);
        for _ in 0..7 {
            state.tracker.on_hit();
        }

        sched.advance(&mut state, now + 100, SchedulerEvent::Press(expected[0]));
        let wrong = ButtonId::all().find(|&b| b != expected[1]).unwrap();
        sched.advance(&mut state, now + 200, SchedulerEvent::Press(wrong));
        assert_eq!(state.combo(), 0);
        assert_eq!(state.lives(), 2);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);

        // no restart before the penalty delay
        sched.poll(&mut state, now + 200 + 1499);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);
        sched.poll(&mut state, now + 200 + 1500);
        assert!(matches!(sched.sequence().unwrap().phase, SequencePhase::Showing { .. }));
    }

    #[test]
    fn test_sequence_pause_during_playback() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let display = sched.sequence().unwrap().display_ms;
        let first_step = SequencePhase::Showing { step: 0, lit: true };

        sched.advance(&mut state, 200, SchedulerEvent::Pause);
        sched.poll(&mut state, 10_000);
        assert_eq!(sched.sequence().unwrap().phase, first_step);

        sched.advance(&mut state, 10_000, SchedulerEvent::Resume);
        sched.poll(&mut state, 10_000 + display - 201);
        assert_eq!(sched.sequence().unwrap().phase, first_step);
        sched.poll(&mut state, 10_000 + display - 200);
        assert_ne!(sched.sequence().unwrap().phase, first_step);

        let (expected, now) = play_back(&mut sched, &mut state, 10_000 + display - 200);
        for (i, &b) in expected.iter().enumerate() {
            sched.advance(&mut state, now + 100 * (i as u64 + 1), SchedulerEvent::Press(b));
        }
        assert_eq!(state.score, 3);
        assert_eq!(state.lives(), 3);
    }

    #[test]
    fn test_sequence_pause_while_waiting_for_input() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let (expected, now) = play_back(&mut sched, &mut state, 0);
        let window = sched.sequence().unwrap().input_window_ms;

        sched.advance(&mut state, now + 100, SchedulerEvent::Press(expected[0]));
        sched.advance(&mut state, now + 200, SchedulerEvent::Pause);
        sched.poll(&mut state, now + window * 5);
        assert_eq!(state.lives(), 3);
        assert_eq!(sched.time_remaining(now + window * 5), Some(window - 200));

        let resumed_at = now + window * 5;
        sched.advance(&mut state, resumed_at, SchedulerEvent::Resume);
        assert_eq!(sched.time_remaining(resumed_at), Some(window - 200));

        // 100ms before the pause plus 50ms after it
        sched.advance(&mut state, resumed_at + 50, SchedulerEvent::Press(expected[1]));
        assert_eq!(state.reaction_time_samples, vec![100, 150]);

        sched.poll(&mut state, resumed_at + window - 201);
        assert_eq!(state.lives(), 3);
        sched.poll(&mut state, resumed_at + window - 200);
        assert_eq!(state.lives(), 2);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);
    }

    #[test]
    fn test_sequence_pause_during_penalty() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let (expected, now) = play_back(&mut sched, &mut state, 0);
        let wrong = ButtonId::all().find(|&b| b != expected[0]).unwrap();
        sched.advance(&mut state, now + 100, SchedulerEvent::Press(wrong));
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);

        // 1000ms of the 1500ms penalty left when paused
        sched.advance(&mut state, now + 600, SchedulerEvent::Pause);
        sched.poll(&mut state, now + 10_000);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);

        sched.advance(&mut state, now + 10_000, SchedulerEvent::Resume);
        sched.poll(&mut state, now + 10_999);
        assert_eq!(sched.sequence().unwrap().phase, SequencePhase::Penalty);
        sched.poll(&mut state, now + 11_000);
        assert!(matches!(sched.sequence().unwrap().phase, SequencePhase::Showing { .. }));
        assert_eq!(state.lives(), 2);
    }

    #[test]
    fn test_sequence_input_window_expires() {
        let (mut sched, mut state) = setup(GameMode::Sequence, 3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let (_, now) = play_back(&mut sched, &mut state, 0);
        let window = sched.sequence().unwrap().input_window_ms;
        sched.poll(&mut state, now + window + 10);
        assert_eq!(state.lives(), 2);
    }

    #[test]
    fn test_distractor_never_scored() {
        let mut cfg = config(GameMode::Sequence, DifficultyPreset::Easy);
        cfg.distractor = RandomGate {
            min_score: 0,
            chance: 1.0,
        };
        let mut sched = Scheduler::new(cfg, 11);
        let mut state = GameState::new(3);
        sched.advance(&mut state, 0, SchedulerEvent::Start);
        let distractor = sched.sequence().unwrap().distractor.clone().unwrap();
        assert_eq!(distractor.len(), sched.sequence().unwrap().len());
        // the lit set only ever carries the real element
        assert_eq!(state.highlighted_buttons.len(), 1);

        let (expected, now) = play_back(&mut sched, &mut state, 0);
        for (i, &b) in expected.iter().enumerate() {
            sched.advance(&mut state, now + 50 * (i as u64 + 1), SchedulerEvent::Press(b));
        }
        assert_eq!(state.hits, 1);
        assert_eq!(state.misses, 0);
    }

    #[test]
    fn test_random_gate() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(!RandomGate::DISABLED.passes(&mut rng, u64::MAX - 1));
        let always = RandomGate { min_score: 10, chance: 1.0 };
        assert!(!always.passes(&mut rng, 9));
        assert!(always.passes(&mut rng, 10));
        let nan = RandomGate { min_score: 0, chance: f64::NAN };
        assert!(!nan.passes(&mut rng, 100));
    }

    #[test]
    fn test_same_seed_same_rounds() {
        let run = |seed| {
            let mut sched = Scheduler::new(config(GameMode::Reflex, DifficultyPreset::Easy), seed);
            let mut state = GameState::new(5);
            let mut picks = Vec::new();
            sched.advance(&mut state, 0, SchedulerEvent::Start);
            let mut now = 0;
            for _ in 0..5 {
                let b = lit(&state);
                picks.push(b);
                now += 100;
                sched.advance(&mut state, now, SchedulerEvent::Press(b));
                now += 400;
                sched.poll(&mut state, now);
            }
            picks
        };
        assert_eq!(run(99), run(99));
    }
}
