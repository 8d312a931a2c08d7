//! High score leaderboard
//!
//! Top 10 finished runs, highest score first.

use serde::{Deserialize, Serialize};

use crate::sim::{DifficultyPreset, GameMode, SessionResult};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub score: u64,
    pub best_combo: u32,
    pub difficulty: DifficultyPreset,
    pub mode: GameMode,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

impl From<&SessionResult> for HighScoreEntry {
    fn from(result: &SessionResult) -> Self {
        Self {
            score: result.score,
            best_combo: result.best_combo,
            difficulty: result.difficulty,
            mode: result.mode,
            timestamp: result.timestamp,
        }
    }
}

/// High score leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        // Check if score beats the lowest entry
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Get the rank a score would achieve (1-indexed, None if doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert a finished run if it qualifies.
    /// Returns the rank achieved (1-indexed) or None if didn't qualify
    pub fn add_result(&mut self, result: &SessionResult) -> Option<usize> {
        let rank = self.potential_rank(result.score)?;
        // Ties keep the earlier run ahead
        self.entries.insert(rank - 1, HighScoreEntry::from(result));
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }
}
