//! Sequence ("Simon") generation and replay validation

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::difficulty::SequenceTiming;
use super::state::{ButtonId, GRID_SIZE};

/// `length` independent uniform draws; a button may repeat
pub fn generate_sequence<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Vec<ButtonId> {
    (0..length)
        .map(|_| ButtonId::from_index(rng.random_range(0..GRID_SIZE)))
        .collect()
}

/// True iff both sequences have the same length and elements
pub fn check_sequence(player_input: &[ButtonId], expected: &[ButtonId]) -> bool {
    player_input.len() == expected.len() && player_input.iter().zip(expected).all(|(a, b)| a == b)
}

/// Where a Sequence round currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencePhase {
    /// Playing back element `step`; `lit` is false during the gap after it
    Showing { step: usize, lit: bool },
    /// Playback done, replay in progress
    WaitingForInput,
    /// Replay failed; waiting out the penalty before a new sequence
    Penalty,
    /// Replay succeeded; short pause before the next sequence
    Advancing,
}

/// Result of one replay press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Correct so far, more presses needed
    Progress { matched: usize },
    /// Whole sequence replayed correctly
    Complete,
    /// Wrong element at `position`
    Mismatch {
        position: usize,
        expected: ButtonId,
        got: ButtonId,
    },
    /// Press arrived while not accepting input
    Ignored,
}

/// One generated sequence, its playback state and the replay buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRound {
    pub expected: Vec<ButtonId>,
    /// Visual noise played alongside `expected`; never validated
    pub distractor: Option<Vec<ButtonId>>,
    pub input: Vec<ButtonId>,
    pub phase: SequencePhase,
    pub display_ms: u64,
    pub gap_ms: u64,
    pub input_window_ms: u64,
}

impl SequenceRound {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, timing: SequenceTiming, with_distractor: bool) -> Self {
        let expected = generate_sequence(rng, timing.length);
        let distractor = with_distractor.then(|| generate_sequence(rng, timing.length));
        Self {
            expected,
            distractor,
            input: Vec::with_capacity(timing.length),
            phase: SequencePhase::Showing { step: 0, lit: true },
            display_ms: timing.display_ms,
            gap_ms: timing.gap_ms,
            input_window_ms: timing.input_window_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.expected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Button lit by playback right now (if any)
    pub fn lit_button(&self) -> Option<ButtonId> {
        match self.phase {
            SequencePhase::Showing { step, lit: true } => self.expected.get(step).copied(),
            _ => None,
        }
    }

    /// Distractor button lit alongside the current playback step
    pub fn lit_distractor(&self) -> Option<ButtonId> {
        match self.phase {
            SequencePhase::Showing { step, lit: true } => {
                self.distractor.as_ref().and_then(|d| d.get(step).copied())
            }
            _ => None,
        }
    }

    /// Advance playback by one half-step (lit → gap → next lit ...).
    /// Returns the delay until the next playback transition, or `None` once
    /// playback is over and input is expected.
    pub fn advance_playback(&mut self) -> Option<u64> {
        match self.phase {
            SequencePhase::Showing { step, lit: true } => {
                self.phase = SequencePhase::Showing { step, lit: false };
                Some(self.gap_ms)
            }
            SequencePhase::Showing { step, lit: false } if step + 1 < self.expected.len() => {
                self.phase = SequencePhase::Showing {
                    step: step + 1,
                    lit: true,
                };
                Some(self.display_ms)
            }
            SequencePhase::Showing { lit: false, .. } => {
                self.phase = SequencePhase::WaitingForInput;
                None
            }
            _ => None,
        }
    }

    /// Validate a press against the expected element at its position
    pub fn press(&mut self, button: ButtonId) -> ReplayOutcome {
        if self.phase != SequencePhase::WaitingForInput {
            return ReplayOutcome::Ignored;
        }
        let position = self.input.len();
        let Some(&expected) = self.expected.get(position) else {
            return ReplayOutcome::Ignored;
        };

        if button != expected {
            self.input.clear();
            self.phase = SequencePhase::Penalty;
            return ReplayOutcome::Mismatch {
                position,
                expected,
                got: button,
            };
        }

        self.input.push(button);
        if check_sequence(&self.input, &self.expected) {
            self.phase = SequencePhase::Advancing;
            ReplayOutcome::Complete
        } else {
            ReplayOutcome::Progress {
                matched: self.input.len(),
            }
        }
    }

    /// Replay window ran out
    pub fn expire(&mut self) -> bool {
        if self.phase != SequencePhase::WaitingForInput {
            return false;
        }
        self.input.clear();
        self.phase = SequencePhase::Penalty;
        true
    }
}
