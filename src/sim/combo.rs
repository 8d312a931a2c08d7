//! Combo, lives and the game-over latch

use serde::{Deserialize, Serialize};

use super::difficulty::DifficultyPreset;

/// What a miss did to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    /// A life was lost, the run continues
    LifeLost { lives: u32 },
    /// The last life was lost
    GameOver,
    /// Already game over; nothing changed
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboTracker {
    combo: u32,
    best_combo: u32,
    lives: u32,
    game_over: bool,
}

impl ComboTracker {
    pub fn new(lives: u32) -> Self {
        Self {
            combo: 0,
            best_combo: 0,
            lives,
            game_over: lives == 0,
        }
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn best_combo(&self) -> u32 {
        self.best_combo
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Returns the combo after the hit. No-op once the run is over.
    pub fn on_hit(&mut self) -> u32 {
        if self.game_over {
            return self.combo;
        }
        self.combo += 1;
        self.best_combo = self.best_combo.max(self.combo);
        self.combo
    }

    pub fn on_miss(&mut self) -> MissOutcome {
        if self.game_over {
            return MissOutcome::Ignored;
        }
        self.combo = 0;
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.game_over = true;
            MissOutcome::GameOver
        } else {
            MissOutcome::LifeLost { lives: self.lives }
        }
    }
}

/// Cosmetic combo tier, D (lowest) through SSS
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComboRating {
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
}

/// Combo needed for each tier from C upward at Medium difficulty
const RATING_THRESHOLDS: [(u32, ComboRating); 6] = [
    (5, ComboRating::C),
    (10, ComboRating::B),
    (20, ComboRating::A),
    (35, ComboRating::S),
    (50, ComboRating::SS),
    (75, ComboRating::SSS),
];

impl ComboRating {
    pub fn from_combo(combo: u32, difficulty: DifficultyPreset) -> Self {
        // percent of the Medium threshold
        let scale: u64 = match difficulty {
            DifficultyPreset::Easy => 150,
            DifficultyPreset::Medium | DifficultyPreset::Custom => 100,
            DifficultyPreset::Hard => 80,
            DifficultyPreset::Nightmare => 60,
        };
        RATING_THRESHOLDS
            .iter()
            .rev()
            .find(|(threshold, _)| u64::from(combo) * 100 >= u64::from(*threshold) * scale)
            .map(|&(_, rating)| rating)
            .unwrap_or(ComboRating::D)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComboRating::D => "D",
            ComboRating::C => "C",
            ComboRating::B => "B",
            ComboRating::A => "A",
            ComboRating::S => "S",
            ComboRating::SS => "SS",
            ComboRating::SSS => "SSS",
        }
    }

    /// Flat points the tier adds to each hit when advanced scoring is on
    pub fn bonus(&self) -> u64 {
        match self {
            ComboRating::D | ComboRating::C => 0,
            ComboRating::B => 1,
            ComboRating::A => 2,
            ComboRating::S => 3,
            ComboRating::SS => 4,
            ComboRating::SSS => 5,
        }
    }
}
