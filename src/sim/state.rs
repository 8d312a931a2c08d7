//! Game state and core gameplay types
//!
//! Everything the presentation layer can observe about a run lives here.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::combo::ComboTracker;
use super::difficulty::DifficultyPreset;

/// Buttons per grid row (3 + 4 + 3)
pub const GRID_ROWS: [u8; 3] = [3, 4, 3];

/// Total number of buttons on the grid
pub const GRID_SIZE: usize = 10;

/// Lives granted by modes that don't pin their own count
pub const DEFAULT_STARTING_LIVES: u32 = 5;

/// One of the fixed grid positions, numbered row by row from the top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ButtonId(u8);

impl ButtonId {
    /// Returns `None` for indices outside the grid
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < GRID_SIZE).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All buttons in grid order
    pub fn all() -> impl Iterator<Item = ButtonId> {
        (0..GRID_SIZE as u8).map(ButtonId)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < GRID_SIZE);
        Self(index as u8)
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which rule set drives the round scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// Press every lit button before the countdown runs out
    #[default]
    Reflex,
    /// Watch a sequence, then replay it ("Simon")
    Sequence,
    /// Reflex rules with a single life and a lower floor
    Survival,
    /// Reflex rules with compressed timing and a single life
    Nightmare,
    /// Several buttons light up; only the odd one is correct
    OddOneOut,
}

impl GameMode {
    pub const ALL: [GameMode; 5] = [
        GameMode::Reflex,
        GameMode::Sequence,
        GameMode::Survival,
        GameMode::Nightmare,
        GameMode::OddOneOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Reflex => "reflex",
            GameMode::Sequence => "sequence",
            GameMode::Survival => "survival",
            GameMode::Nightmare => "nightmare",
            GameMode::OddOneOut => "odd-one-out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reflex" => Some(GameMode::Reflex),
            "sequence" | "simon" => Some(GameMode::Sequence),
            "survival" => Some(GameMode::Survival),
            "nightmare" => Some(GameMode::Nightmare),
            "odd-one-out" | "oddoneout" | "odd" => Some(GameMode::OddOneOut),
            _ => None,
        }
    }

    /// Lives this mode starts with, given the configured default
    pub fn starting_lives(&self, configured: u32) -> u32 {
        match self {
            GameMode::Survival | GameMode::Nightmare => 1,
            _ => configured.max(1),
        }
    }

    /// Whether the mode uses the highlight scheduler (everything but Sequence)
    pub fn is_reflex_family(&self) -> bool {
        !matches!(self, GameMode::Sequence)
    }
}

/// Why a round counted as a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissKind {
    /// Pressed a button that wasn't a valid target
    WrongButton,
    /// Countdown expired with targets still lit
    Timeout,
    /// Sequence replay diverged from the expected element
    SequenceMismatch,
}

/// Events emitted by the simulation for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A new highlight cycle lit these buttons
    RoundStarted {
        buttons: Vec<ButtonId>,
        odd_button: Option<ButtonId>,
        duration_ms: u64,
    },
    /// A lit target was pressed in time
    Hit {
        button: ButtonId,
        reaction_ms: u64,
        points: u64,
    },
    /// A round was failed
    Miss {
        button: Option<ButtonId>,
        kind: MissKind,
    },
    /// A life was lost (lives remaining)
    LifeLost { lives: u32 },
    /// Sequence playback lit the element at `step`
    SequenceStep {
        step: usize,
        button: ButtonId,
        distractor: Option<ButtonId>,
    },
    /// Playback finished, the player may replay
    SequenceAwaitingInput { length: usize },
    /// A correct press during replay
    SequenceProgress { matched: usize, length: usize },
    /// A full sequence was replayed correctly
    SequenceCompleted { length: usize, points: u64 },
    /// Lives ran out
    GameOver { score: u64 },
}

/// Aggregate reaction-time figures for display
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReactionStats {
    pub count: usize,
    pub average_ms: Option<f64>,
    pub fastest_ms: Option<u64>,
    pub slowest_ms: Option<u64>,
    pub last_ms: Option<u64>,
}

impl ReactionStats {
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let total: u64 = samples.iter().sum();
        Self {
            count: samples.len(),
            average_ms: Some(total as f64 / samples.len() as f64),
            fastest_ms: samples.iter().copied().min(),
            slowest_ms: samples.iter().copied().max(),
            last_ms: samples.last().copied(),
        }
    }
}

/// Mutable state of one run. Single writer: the session and its scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Accumulated score (never decreases)
    pub score: u64,
    /// Combo, best combo, lives and the game-over latch
    pub tracker: ComboTracker,
    /// Currently lit targets; empty between rounds
    pub highlighted_buttons: BTreeSet<ButtonId>,
    /// The distinct button in an Odd-One-Out round
    pub odd_button: Option<ButtonId>,
    /// Reaction times in press order (append-only)
    pub reaction_time_samples: Vec<u64>,
    pub is_paused: bool,
    /// Set while a round is resolving or cooling down
    pub is_processing: bool,
    /// Every press that reached the scheduler
    pub total_presses: u32,
    pub hits: u32,
    pub misses: u32,
    pub rounds_played: u32,
    /// Clock value when play started
    pub started_at_ms: u64,
    /// Clock value when the last life was lost
    pub ended_at_ms: Option<u64>,
    /// Events not yet drained by the host
    #[serde(skip)]
    pub events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(lives: u32) -> Self {
        Self {
            score: 0,
            tracker: ComboTracker::new(lives),
            highlighted_buttons: BTreeSet::new(),
            odd_button: None,
            reaction_time_samples: Vec::new(),
            is_paused: false,
            is_processing: false,
            total_presses: 0,
            hits: 0,
            misses: 0,
            rounds_played: 0,
            started_at_ms: 0,
            ended_at_ms: None,
            events: Vec::new(),
        }
    }

    pub fn combo(&self) -> u32 {
        self.tracker.combo()
    }

    pub fn best_combo(&self) -> u32 {
        self.tracker.best_combo()
    }

    pub fn lives(&self) -> u32 {
        self.tracker.lives()
    }

    pub fn is_game_over(&self) -> bool {
        self.tracker.is_game_over()
    }

    pub fn reaction_stats(&self) -> ReactionStats {
        ReactionStats::from_samples(&self.reaction_time_samples)
    }

    /// Most recent `n` reaction samples, oldest first
    pub fn recent_reactions(&self, n: usize) -> &[u64] {
        let start = self.reaction_time_samples.len().saturating_sub(n);
        &self.reaction_time_samples[start..]
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Clear lit targets without scoring them
    pub fn clear_highlights(&mut self) {
        self.highlighted_buttons.clear();
        self.odd_button = None;
    }
}

/// Record written once when a run ends by running out of lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: u64,
    pub best_combo: u32,
    pub average_reaction_time_ms: Option<f64>,
    pub fastest_reaction_time_ms: Option<u64>,
    pub total_presses: u32,
    pub hits: u32,
    pub misses: u32,
    pub difficulty: DifficultyPreset,
    pub mode: GameMode,
    /// Unix timestamp (ms) when the run ended
    pub timestamp: f64,
    pub duration_ms: u64,
}
