//! Player progress records
//!
//! High score and best combo as plain numbers, an append-only history of
//! finished runs (newest last, capped) and the top-10 leaderboard.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::PersistenceError;
use super::storage::{Storage, load_json, save_json};
use crate::highscores::HighScores;
use crate::sim::SessionResult;

pub const HIGH_SCORE_KEY: &str = "reflex_grid_high_score";
pub const BEST_COMBO_KEY: &str = "reflex_grid_best_combo";
pub const HISTORY_KEY: &str = "reflex_grid_history";
pub const LEADERBOARD_KEY: &str = "reflex_grid_leaderboard";

/// Runs kept in the history list
pub const MAX_HISTORY: usize = 100;

/// Receives the single result of every run that ended by losing all lives
pub trait SessionSink {
    fn on_session_complete(&mut self, result: &SessionResult);
}

/// High score and best combo recalled at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonalBest {
    pub high_score: u64,
    pub best_combo: u32,
}

impl PersonalBest {
    /// Fold a finished run in; true if anything improved
    pub fn absorb(&mut self, result: &SessionResult) -> bool {
        let improved = result.score > self.high_score || result.best_combo > self.best_combo;
        self.high_score = self.high_score.max(result.score);
        self.best_combo = self.best_combo.max(result.best_combo);
        improved
    }
}

/// What recording a run changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub new_high_score: bool,
    pub new_best_combo: bool,
    /// Leaderboard rank (1-indexed) if the run made the board
    pub rank: Option<usize>,
}

/// Progress records on top of any [`Storage`]
#[derive(Debug)]
pub struct ProgressStore<S: Storage> {
    storage: S,
}

impl<S: Storage> ProgressStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Stored high score / best combo; unreadable values count as zero
    pub fn personal_best(&self) -> PersonalBest {
        let high_score = load_json::<u64>(&self.storage, HIGH_SCORE_KEY).unwrap_or_else(|e| {
            log::warn!("Ignoring stored high score: {}", e);
            None
        });
        let best_combo = load_json::<u32>(&self.storage, BEST_COMBO_KEY).unwrap_or_else(|e| {
            log::warn!("Ignoring stored best combo: {}", e);
            None
        });
        PersonalBest {
            high_score: high_score.unwrap_or(0),
            best_combo: best_combo.unwrap_or(0),
        }
    }

    pub fn history(&self) -> Result<Vec<SessionResult>, PersistenceError> {
        Ok(load_json(&self.storage, HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn leaderboard(&self) -> Result<HighScores, PersistenceError> {
        Ok(load_json(&self.storage, LEADERBOARD_KEY)?.unwrap_or_default())
    }

    /// Persist one finished run
    pub fn record(&mut self, result: &SessionResult) -> Result<RecordOutcome, PersistenceError> {
        let previous = self.personal_best();
        let new_high_score = result.score > previous.high_score;
        let new_best_combo = result.best_combo > previous.best_combo;
        if new_high_score {
            save_json(&mut self.storage, HIGH_SCORE_KEY, &result.score)?;
        }
        if new_best_combo {
            save_json(&mut self.storage, BEST_COMBO_KEY, &result.best_combo)?;
        }

        // a corrupt history is replaced rather than blocking new records
        let mut history = self.history().unwrap_or_else(|e| {
            log::warn!("Discarding unreadable session history: {}", e);
            Vec::new()
        });
        history.push(result.clone());
        if history.len() > MAX_HISTORY {
            history.drain(..history.len() - MAX_HISTORY);
        }
        save_json(&mut self.storage, HISTORY_KEY, &history)?;

        let mut board = self.leaderboard().unwrap_or_default();
        let rank = board.add_result(result);
        if rank.is_some() {
            save_json(&mut self.storage, LEADERBOARD_KEY, &board)?;
        }

        log::info!(
            "Session recorded: score={} combo={} rank={:?}",
            result.score,
            result.best_combo,
            rank
        );
        Ok(RecordOutcome {
            new_high_score,
            new_best_combo,
            rank,
        })
    }
}

impl<S: Storage> SessionSink for ProgressStore<S> {
    fn on_session_complete(&mut self, result: &SessionResult) {
        if let Err(e) = self.record(result) {
            log::warn!("Failed to record session: {}", e);
        }
    }
}

/// Shared in-memory list of results (headless runs and tests)
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    results: Rc<RefCell<Vec<SessionResult>>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<SessionResult> {
        self.results.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.results.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionSink for SessionLog {
    fn on_session_complete(&mut self, result: &SessionResult) {
        self.results.borrow_mut().push(result.clone());
    }
}

/// Sink that drops results
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSessionSink;

impl SessionSink for NullSessionSink {
    fn on_session_complete(&mut self, _result: &SessionResult) {}
}
