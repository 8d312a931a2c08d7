//! Game configuration and preferences
//!
//! Persisted separately from progress records under its own storage key.

use serde::{Deserialize, Serialize};

use crate::audio::AudioSettings;
use crate::persistence::{PersistenceError, Storage, load_json, save_json};
use crate::sim::difficulty::{ConfigError, DifficultyParams, DifficultyPreset};
use crate::sim::scheduler::{RandomGate, SchedulerConfig};
use crate::sim::state::{DEFAULT_STARTING_LIVES, GameMode};

/// Run configuration plus player preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: DifficultyPreset,
    pub mode: GameMode,
    /// Lives for modes that don't force their own count
    pub starting_lives: u32,
    /// Used when `difficulty` is `Custom`
    pub custom_difficulty: Option<DifficultyParams>,

    // === Timing ===
    /// Gap between a resolved round and the next highlight
    pub cooldown_ms: u64,
    /// Delay before a fresh sequence after a failed replay
    pub sequence_penalty_ms: u64,
    /// Delay before the next sequence after a correct replay
    pub sequence_advance_ms: u64,

    // === Variety ===
    /// Occasional extra lit button in reflex rounds
    pub multi_hit: RandomGate,
    /// Occasional decoy track during sequence playback
    pub distractor: RandomGate,
    /// Streak and consistency bonuses on top of base points
    pub advanced_scoring: bool,

    pub audio: AudioSettings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: DifficultyPreset::Medium,
            mode: GameMode::Reflex,
            starting_lives: DEFAULT_STARTING_LIVES,
            custom_difficulty: None,

            cooldown_ms: 400,
            sequence_penalty_ms: 1500,
            sequence_advance_ms: 1000,

            multi_hit: RandomGate {
                min_score: 15,
                chance: 0.2,
            },
            distractor: RandomGate {
                min_score: 10,
                chance: 0.3,
            },
            advanced_scoring: true,

            audio: AudioSettings::default(),
        }
    }
}

impl GameConfig {
    /// LocalStorage key
    pub const STORAGE_KEY: &'static str = "reflex_grid_settings";

    /// Create a config for one preset/mode pairing
    pub fn new(difficulty: DifficultyPreset, mode: GameMode) -> Self {
        Self {
            difficulty,
            mode,
            ..Self::default()
        }
    }

    /// Preset (or custom) table, adjusted for the selected mode
    pub fn difficulty_params(&self) -> DifficultyParams {
        let base = match (self.difficulty, &self.custom_difficulty) {
            (DifficultyPreset::Custom, Some(custom)) => custom.clone(),
            (preset, _) => preset.params(),
        };
        base.for_mode(self.mode)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            mode: self.mode,
            difficulty: self.difficulty,
            params: self.difficulty_params(),
            cooldown_ms: self.cooldown_ms,
            sequence_penalty_ms: self.sequence_penalty_ms,
            sequence_advance_ms: self.sequence_advance_ms,
            multi_hit: self.multi_hit,
            distractor: self.distractor,
            advanced_scoring: self.advanced_scoring,
        }
    }

    /// Lives the selected mode starts with
    pub fn lives(&self) -> u32 {
        self.mode.starting_lives(self.starting_lives)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_lives == 0 {
            return Err(ConfigError::NoLives);
        }
        if let Some(custom) = &self.custom_difficulty {
            custom.validate()?;
        }
        self.difficulty_params().validate()
    }

    /// Load from storage, falling back to defaults on missing or bad data
    pub fn load(storage: &dyn Storage) -> Self {
        match load_json::<GameConfig>(storage, Self::STORAGE_KEY) {
            Ok(Some(config)) => match config.validate() {
                Ok(()) => {
                    log::info!("Loaded settings from storage");
                    config
                }
                Err(e) => {
                    log::warn!("Stored settings rejected ({}), using defaults", e);
                    Self::default()
                }
            },
            Ok(None) => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to read settings ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &mut dyn Storage) -> Result<(), PersistenceError> {
        save_json(storage, Self::STORAGE_KEY, self)?;
        log::info!("Settings saved");
        Ok(())
    }
}
