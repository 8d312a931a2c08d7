//! Scoring engine
//!
//! Points per hit from combo, difficulty, mode and streak bonuses.
//! Scores only ever add; misses cost combo and lives, never points.

use serde::{Deserialize, Serialize};

use super::combo::ComboRating;
use super::difficulty::DifficultyPreset;
use super::state::GameMode;

/// Points for a single hit before multipliers
pub const BASE_POINTS: u64 = 1;

/// Combo counts that each add +1 to the multiplier
pub const COMBO_THRESHOLDS: [u32; 5] = [5, 10, 20, 30, 50];

/// Multiplier ceiling
pub const MAX_COMBO_MULTIPLIER: u64 = 6;

/// Reaction samples considered for the consistency bonus
pub const CONSISTENCY_WINDOW: usize = 10;

/// Samples required before consistency is rated at all
pub const CONSISTENCY_MIN_SAMPLES: usize = 5;

/// Breakdown of one scoring event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringFactors {
    pub base_score: u64,
    pub combo_multiplier: u64,
    pub accuracy_bonus: u64,
    pub consistency_bonus: u64,
    pub difficulty_multiplier: f64,
    pub mode_multiplier: f64,
    pub total_score: u64,
}

/// Per-hit context the bonuses read from
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringContext<'a> {
    /// Recent reaction times, oldest first, including this hit
    pub recent_reactions: &'a [u64],
    /// Whether accuracy/consistency bonuses apply
    pub advanced: bool,
}

/// Step multiplier: 1 below the first threshold, +1 per threshold reached
pub fn combo_multiplier(combo: u32) -> u64 {
    let reached = COMBO_THRESHOLDS.iter().filter(|&&t| combo >= t).count() as u64;
    (1 + reached).min(MAX_COMBO_MULTIPLIER)
}

pub fn mode_multiplier(mode: GameMode) -> f64 {
    match mode {
        GameMode::Reflex | GameMode::Sequence => 1.0,
        GameMode::Survival => 1.5,
        GameMode::Nightmare => 2.0,
        GameMode::OddOneOut => 1.25,
    }
}

/// Bonus for a long run without misses, read off the combo rating tier
pub fn accuracy_bonus(combo: u32, difficulty: DifficultyPreset) -> u64 {
    ComboRating::from_combo(combo, difficulty).bonus()
}

/// Bonus for steady reaction times: lower spread pays more
pub fn consistency_bonus(recent_reactions: &[u64]) -> u64 {
    let window = &recent_reactions[recent_reactions.len().saturating_sub(CONSISTENCY_WINDOW)..];
    if window.len() < CONSISTENCY_MIN_SAMPLES {
        return 0;
    }
    let n = window.len() as f64;
    let mean = window.iter().map(|&ms| ms as f64).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|&ms| {
            let d = ms as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    match variance.sqrt() {
        sd if sd < 50.0 => 3,
        sd if sd < 100.0 => 2,
        sd if sd < 150.0 => 1,
        _ => 0,
    }
}

/// Score one hit. `combo_after_hit` already includes this hit.
pub fn score(
    combo_after_hit: u32,
    difficulty: DifficultyPreset,
    mode: GameMode,
    reaction_time_ms: u64,
    ctx: ScoringContext<'_>,
) -> ScoringFactors {
    let combo_mult = combo_multiplier(combo_after_hit);
    let base_score = BASE_POINTS * combo_mult;
    let difficulty_mult = difficulty.score_multiplier();
    let mode_mult = mode_multiplier(mode);

    let (accuracy, consistency) = if ctx.advanced {
        (
            accuracy_bonus(combo_after_hit, difficulty),
            consistency_bonus(ctx.recent_reactions),
        )
    } else {
        (0, 0)
    };

    let scaled = (base_score as f64 * difficulty_mult * mode_mult).floor() as u64;
    let total_score = scaled + accuracy + consistency;

    log::trace!(
        "hit scored: combo={} reaction={}ms base={} total={}",
        combo_after_hit,
        reaction_time_ms,
        base_score,
        total_score
    );

    ScoringFactors {
        base_score,
        combo_multiplier: combo_mult,
        accuracy_bonus: accuracy,
        consistency_bonus: consistency,
        difficulty_multiplier: difficulty_mult,
        mode_multiplier: mode_mult,
        total_score,
    }
}

/// Flat award for a fully replayed sequence (no single reaction moment)
pub fn score_sequence(
    length: usize,
    combo_after_hit: u32,
    difficulty: DifficultyPreset,
    mode: GameMode,
) -> ScoringFactors {
    let combo_mult = combo_multiplier(combo_after_hit);
    let base_score = BASE_POINTS * length as u64 * combo_mult;
    let difficulty_mult = difficulty.score_multiplier();
    let mode_mult = mode_multiplier(mode);
    let total_score = (base_score as f64 * difficulty_mult * mode_mult).floor() as u64;

    ScoringFactors {
        base_score,
        combo_multiplier: combo_mult,
        accuracy_bonus: 0,
        consistency_bonus: 0,
        difficulty_multiplier: difficulty_mult,
        mode_multiplier: mode_mult,
        total_score,
    }
}
