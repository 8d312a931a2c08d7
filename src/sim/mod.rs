//! Deterministic gameplay module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time comes in from the caller, never from a clock
//! - Seeded RNG only
//! - Ordered collections for anything iterated
//! - No audio, storage or platform dependencies

pub mod combo;
pub mod difficulty;
pub mod scheduler;
pub mod scoring;
pub mod sequence;
pub mod state;
pub mod timer;

pub use combo::{ComboRating, ComboTracker, MissOutcome};
pub use difficulty::{
    ButtonStep, ConfigError, DifficultyParams, DifficultyPreset, SequenceParams, SequenceTiming,
    Timing, compute_timing, sequence_timing,
};
pub use scheduler::{Handled, RandomGate, RoundPhase, Scheduler, SchedulerConfig, SchedulerEvent};
pub use scoring::{ScoringContext, ScoringFactors, score, score_sequence};
pub use sequence::{ReplayOutcome, SequencePhase, SequenceRound, check_sequence, generate_sequence};
pub use state::{
    ButtonId, DEFAULT_STARTING_LIVES, GRID_ROWS, GRID_SIZE, GameEvent, GameMode, GameState,
    MissKind, ReactionStats, SessionResult,
};
pub use timer::{Timer, TimerKind, TimerQueue};
