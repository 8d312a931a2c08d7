//! Feedback cues
//!
//! The gameplay core only knows [`FeedbackCue`] and the [`FeedbackSink`]
//! trait. On wasm, [`WebAudioFeedback`] turns cues into procedurally
//! generated tones via the Web Audio API - no external files needed.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Sound/haptic cue requested by the gameplay core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackCue {
    /// Correct press
    Hit,
    /// Wrong press or timeout
    Miss,
    /// A life was lost
    LifeLost,
    /// Lives ran out
    GameOver,
}

/// Anything that can play feedback cues
pub trait FeedbackSink {
    fn play_feedback_cue(&mut self, cue: FeedbackCue);

    /// Volume or mute changed; sinks without output ignore it
    fn apply_audio_settings(&mut self, _settings: AudioSettings) {}
}

/// Discards every cue
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn play_feedback_cue(&mut self, _cue: FeedbackCue) {}
}

/// Shared log of played cues (headless runs and tests)
#[derive(Debug, Clone, Default)]
pub struct CueRecorder {
    cues: Rc<RefCell<Vec<FeedbackCue>>>,
    settings: Rc<RefCell<Option<AudioSettings>>>,
}

impl CueRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<FeedbackCue> {
        self.cues.borrow().clone()
    }

    pub fn count(&self, cue: FeedbackCue) -> usize {
        self.cues.borrow().iter().filter(|&&c| c == cue).count()
    }

    /// Settings most recently applied to this sink
    pub fn audio_settings(&self) -> Option<AudioSettings> {
        *self.settings.borrow()
    }
}

impl FeedbackSink for CueRecorder {
    fn play_feedback_cue(&mut self, cue: FeedbackCue) {
        self.cues.borrow_mut().push(cue);
    }

    fn apply_audio_settings(&mut self, settings: AudioSettings) {
        *self.settings.borrow_mut() = Some(settings);
    }
}

/// Volume and mute preferences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

impl AudioSettings {
    /// Same settings with both volumes pulled into 0.0 - 1.0
    pub fn clamped(self) -> Self {
        Self {
            master_volume: self.master_volume.clamp(0.0, 1.0),
            sfx_volume: self.sfx_volume.clamp(0.0, 1.0),
            muted: self.muted,
        }
    }

    /// Effective gain applied to every cue
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume.clamp(0.0, 1.0) * self.sfx_volume.clamp(0.0, 1.0)
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebAudioFeedback;

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{AudioSettings, FeedbackCue, FeedbackSink};

    /// Web Audio backed cue player
    pub struct WebAudioFeedback {
        ctx: Option<AudioContext>,
        settings: AudioSettings,
    }

    impl WebAudioFeedback {
        pub fn new(settings: AudioSettings) -> Self {
            // Try to create audio context (may fail if not in secure context)
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self { ctx, settings }
        }

        /// Create an oscillator with gain envelope
        fn create_osc(
            ctx: &AudioContext,
            freq: f32,
            osc_type: OscillatorType,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;

            Some((osc, gain))
        }

        /// One enveloped tone starting `delay` seconds from now
        fn tone(ctx: &AudioContext, freq: f32, osc_type: OscillatorType, vol: f32, delay: f64, length: f64) {
            let Some((osc, gain)) = Self::create_osc(ctx, freq, osc_type) else {
                return;
            };
            let t = ctx.current_time() + delay;
            gain.gain().set_value_at_time(vol, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, t + length)
                .ok();
            osc.start_with_when(t).ok();
            osc.stop_with_when(t + length + 0.05).ok();
        }

        /// Hit - short bright ping
        fn play_hit(ctx: &AudioContext, vol: f32) {
            Self::tone(ctx, 880.0, OscillatorType::Sine, vol * 0.4, 0.0, 0.08);
        }

        /// Miss - low buzz
        fn play_miss(ctx: &AudioContext, vol: f32) {
            let Some((osc, gain)) = Self::create_osc(ctx, 180.0, OscillatorType::Sawtooth) else {
                return;
            };
            let t = ctx.current_time();
            gain.gain().set_value_at_time(vol * 0.25, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, t + 0.15)
                .ok();
            osc.frequency().set_value_at_time(180.0, t).ok();
            osc.frequency()
                .exponential_ramp_to_value_at_time(90.0, t + 0.15)
                .ok();
            osc.start().ok();
            osc.stop_with_when(t + 0.2).ok();
        }

        /// Life lost - two falling notes
        fn play_life_lost(ctx: &AudioContext, vol: f32) {
            for (i, freq) in [330.0, 220.0].iter().enumerate() {
                Self::tone(ctx, *freq, OscillatorType::Triangle, vol * 0.3, i as f64 * 0.12, 0.15);
            }
        }

        /// Game over - sad descending
        fn play_game_over(ctx: &AudioContext, vol: f32) {
            for (i, freq) in [400.0, 350.0, 300.0, 200.0].iter().enumerate() {
                Self::tone(ctx, *freq, OscillatorType::Sine, vol * 0.3, i as f64 * 0.2, 0.3);
            }
        }
    }

    impl FeedbackSink for WebAudioFeedback {
        fn play_feedback_cue(&mut self, cue: FeedbackCue) {
            let vol = self.settings.effective_volume();
            if vol <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };

            // Resume context if suspended (browsers require user gesture)
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            match cue {
                FeedbackCue::Hit => Self::play_hit(ctx, vol),
                FeedbackCue::Miss => Self::play_miss(ctx, vol),
                FeedbackCue::LifeLost => Self::play_life_lost(ctx, vol),
                FeedbackCue::GameOver => Self::play_game_over(ctx, vol),
            }
        }

        fn apply_audio_settings(&mut self, settings: AudioSettings) {
            self.settings = settings;
        }
    }
}
