//! Reflex Grid - A button-grid reflex trainer
//!
//! Core modules:
//! - `sim`: Deterministic gameplay (difficulty, scoring, combo, scheduling)
//! - `session`: Run lifecycle and the public command API
//! - `settings`: Game configuration and preferences
//! - `persistence`: Storage backends and progress records
//! - `highscores`: Top-10 leaderboard
//! - `audio`: Feedback cues and the Web Audio player
//! - `platform`: Browser/native clock and entropy

pub mod audio;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod settings;
pub mod sim;

pub use audio::{FeedbackCue, FeedbackSink};
pub use highscores::HighScores;
pub use session::{CommandOutcome, Session, SessionPhase, Snapshot};
pub use settings::GameConfig;
