//! Difficulty model
//!
//! Pure mapping from (score, preset) to round timing. No RNG, no clock:
//! identical inputs always produce identical timing.

use serde::{Deserialize, Serialize};

use super::state::{GRID_SIZE, GameMode};

/// Difficulty preset selected before a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DifficultyPreset {
    Easy,
    #[default]
    Medium,
    Hard,
    Nightmare,
    /// Parameters come from configuration
    Custom,
}

impl DifficultyPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyPreset::Easy => "Easy",
            DifficultyPreset::Medium => "Medium",
            DifficultyPreset::Hard => "Hard",
            DifficultyPreset::Nightmare => "Nightmare",
            DifficultyPreset::Custom => "Custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(DifficultyPreset::Easy),
            "medium" | "med" | "normal" => Some(DifficultyPreset::Medium),
            "hard" => Some(DifficultyPreset::Hard),
            "nightmare" => Some(DifficultyPreset::Nightmare),
            "custom" => Some(DifficultyPreset::Custom),
            _ => None,
        }
    }

    /// Built-in parameters. `Custom` falls back to Medium's table; the
    /// session substitutes the configured custom params.
    pub fn params(&self) -> DifficultyParams {
        match self {
            DifficultyPreset::Easy => DifficultyParams {
                base_duration_ms: 1000,
                min_duration_ms: 500,
                max_buttons: 2,
                decay_factor: 0.0,
                button_steps: vec![ButtonStep::new(0, 1), ButtonStep::new(30, 2)],
                sequence: SequenceParams::default(),
            },
            DifficultyPreset::Medium | DifficultyPreset::Custom => DifficultyParams {
                base_duration_ms: 900,
                min_duration_ms: 400,
                max_buttons: 3,
                decay_factor: 5.0,
                button_steps: vec![
                    ButtonStep::new(0, 1),
                    ButtonStep::new(20, 2),
                    ButtonStep::new(50, 3),
                ],
                sequence: SequenceParams::default(),
            },
            DifficultyPreset::Hard => DifficultyParams {
                base_duration_ms: 750,
                min_duration_ms: 300,
                max_buttons: 3,
                decay_factor: 8.0,
                button_steps: vec![
                    ButtonStep::new(0, 1),
                    ButtonStep::new(15, 2),
                    ButtonStep::new(40, 3),
                ],
                sequence: SequenceParams {
                    start_length: 4,
                    ..SequenceParams::default()
                },
            },
            DifficultyPreset::Nightmare => DifficultyParams {
                base_duration_ms: 600,
                min_duration_ms: 200,
                max_buttons: 4,
                decay_factor: 10.0,
                button_steps: vec![
                    ButtonStep::new(0, 1),
                    ButtonStep::new(10, 2),
                    ButtonStep::new(25, 3),
                    ButtonStep::new(50, 4),
                ],
                sequence: SequenceParams {
                    start_length: 5,
                    max_length: 16,
                    score_per_step: 4,
                },
            },
        }
    }

    /// Static score multiplier: harder presets pay more
    pub fn score_multiplier(&self) -> f64 {
        match self {
            DifficultyPreset::Easy => 1.0,
            DifficultyPreset::Medium => 1.5,
            DifficultyPreset::Hard => 2.0,
            DifficultyPreset::Nightmare => 3.0,
            DifficultyPreset::Custom => 1.0,
        }
    }
}

/// Button count unlocked once the score reaches `min_score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonStep {
    pub min_score: u64,
    pub buttons: usize,
}

impl ButtonStep {
    pub const fn new(min_score: u64, buttons: usize) -> Self {
        Self { min_score, buttons }
    }
}

/// Sequence-mode length curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceParams {
    pub start_length: usize,
    pub max_length: usize,
    /// Score needed per extra element
    pub score_per_step: u64,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            start_length: 3,
            max_length: 12,
            score_per_step: 5,
        }
    }
}

/// Immutable difficulty configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyParams {
    pub base_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_buttons: usize,
    /// Milliseconds shaved off the countdown per score point
    pub decay_factor: f64,
    /// Score-indexed button counts, ascending by `min_score`
    pub button_steps: Vec<ButtonStep>,
    #[serde(default)]
    pub sequence: SequenceParams,
}

/// Invalid difficulty configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("minimum duration {min}ms exceeds base duration {base}ms")]
    FloorAboveBase { min: u64, base: u64 },
    #[error("max_buttons must be between 1 and {max}, got {0}", max = GRID_SIZE)]
    ButtonCount(usize),
    #[error("decay factor must be a non-negative number, got {0}")]
    Decay(f64),
    #[error("button step table is empty")]
    NoSteps,
    #[error("sequence length range {start}..={max} is invalid")]
    SequenceLength { start: usize, max: usize },
    #[error("starting lives must be at least 1")]
    NoLives,
}

impl DifficultyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_duration_ms > self.base_duration_ms {
            return Err(ConfigError::FloorAboveBase {
                min: self.min_duration_ms,
                base: self.base_duration_ms,
            });
        }
        if self.max_buttons == 0 || self.max_buttons > GRID_SIZE {
            return Err(ConfigError::ButtonCount(self.max_buttons));
        }
        if !self.decay_factor.is_finite() || self.decay_factor < 0.0 {
            return Err(ConfigError::Decay(self.decay_factor));
        }
        if self.button_steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }
        let seq = self.sequence;
        if seq.start_length == 0 || seq.start_length > seq.max_length {
            return Err(ConfigError::SequenceLength {
                start: seq.start_length,
                max: seq.max_length,
            });
        }
        Ok(())
    }

    /// Adjust the curve for modes that share the reflex state machine
    pub fn for_mode(&self, mode: GameMode) -> DifficultyParams {
        let mut params = self.clone();
        match mode {
            GameMode::Survival => {
                params.min_duration_ms = params.min_duration_ms * 4 / 5;
                params.decay_factor *= 1.25;
            }
            GameMode::Nightmare => {
                params.base_duration_ms = params.base_duration_ms * 3 / 4;
                params.min_duration_ms = (params.min_duration_ms * 3 / 5).min(params.base_duration_ms);
                params.max_buttons = (params.max_buttons + 1).min(GRID_SIZE);
                for step in &mut params.button_steps {
                    step.min_score /= 2;
                }
                if let Some(last) = params.button_steps.last().copied() {
                    params
                        .button_steps
                        .push(ButtonStep::new(last.min_score * 2 + 10, params.max_buttons));
                }
            }
            GameMode::Reflex | GameMode::Sequence | GameMode::OddOneOut => {}
        }
        params
    }
}

/// Timing for one highlight cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub duration_ms: u64,
    pub button_count: usize,
}

/// Countdown length and number of lit buttons for the given score
pub fn compute_timing(score: u64, params: &DifficultyParams) -> Timing {
    let decayed = params.base_duration_ms as f64 - params.decay_factor * score as f64;
    let duration_ms = if decayed <= params.min_duration_ms as f64 {
        params.min_duration_ms
    } else {
        (decayed.round() as u64).max(params.min_duration_ms)
    };

    let button_count = params
        .button_steps
        .iter()
        .filter(|step| score >= step.min_score)
        .map(|step| step.buttons)
        .max()
        .unwrap_or(1)
        .clamp(1, params.max_buttons.max(1));

    Timing {
        duration_ms,
        button_count,
    }
}

/// Playback timing for one Sequence-mode round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTiming {
    pub length: usize,
    /// How long each element stays lit during playback
    pub display_ms: u64,
    /// Dark pause between elements
    pub gap_ms: u64,
    /// Countdown for the whole replay
    pub input_window_ms: u64,
}

/// Minimum lit time for a sequence element
pub const MIN_DISPLAY_MS: u64 = 250;
/// Minimum gap between sequence elements
pub const MIN_GAP_MS: u64 = 100;

pub fn sequence_timing(score: u64, params: &DifficultyParams) -> SequenceTiming {
    let seq = params.sequence;
    let steps = if seq.score_per_step == 0 {
        0
    } else {
        (score / seq.score_per_step) as usize
    };
    let length = (seq.start_length + steps).min(seq.max_length).max(1);

    let duration = compute_timing(score, params).duration_ms;
    SequenceTiming {
        length,
        display_ms: (duration * 3 / 5).max(MIN_DISPLAY_MS),
        gap_ms: (duration / 4).max(MIN_GAP_MS),
        input_window_ms: duration * length as u64,
    }
}
