//! Epoch-tagged timer queue
//!
//! Every timer captures the queue epoch when it is scheduled. Cancelling
//! bumps the epoch instead of hunting down entries, so a timer that was
//! already in flight still fires but is recognised as stale and dropped.

/// What a timer means to the scheduler when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Highlight countdown for the current round
    Countdown,
    /// Cooldown between rounds is over
    CooldownDone,
    /// Next half-step of sequence playback
    SequenceStep,
    /// Replay window for the current sequence closed
    SequenceInputWindow,
    /// Penalty or advance delay over; generate a new sequence
    SequenceRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub id: u64,
    pub due_ms: u64,
    pub epoch: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrozenTimer {
    remaining_ms: u64,
    kind: TimerKind,
}

#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    pending: Vec<Timer>,
    frozen: Vec<FrozenTimer>,
    epoch: u64,
    next_id: u64,
    is_frozen: bool,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Arm a timer `delay_ms` from `now_ms` under the current epoch
    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, kind: TimerKind) -> Timer {
        let timer = Timer {
            id: self.next_id,
            due_ms: now_ms.saturating_add(delay_ms),
            epoch: self.epoch,
            kind,
        };
        self.next_id += 1;
        if self.is_frozen {
            self.frozen.push(FrozenTimer {
                remaining_ms: delay_ms,
                kind,
            });
        } else {
            self.pending.push(timer);
        }
        timer
    }

    /// Invalidate every armed timer. Entries stay queued and fire as stale.
    pub fn cancel_all(&mut self) {
        self.epoch += 1;
        self.frozen.clear();
    }

    /// Drop everything, stale entries included, and unfreeze
    pub fn clear(&mut self) {
        self.cancel_all();
        self.pending.clear();
        self.is_frozen = false;
    }

    pub fn is_current(&self, timer: &Timer) -> bool {
        timer.epoch == self.epoch
    }

    /// Time left on the live timer of this kind
    pub fn remaining(&self, now_ms: u64, kind: TimerKind) -> Option<u64> {
        if self.is_frozen {
            return self
                .frozen
                .iter()
                .find(|f| f.kind == kind)
                .map(|f| f.remaining_ms);
        }
        self.pending
            .iter()
            .filter(|t| t.kind == kind && t.epoch == self.epoch)
            .map(|t| t.due_ms.saturating_sub(now_ms))
            .min()
    }

    /// Pause: live timers keep their remaining time, nothing fires
    pub fn freeze(&mut self, now_ms: u64) {
        if self.is_frozen {
            return;
        }
        let epoch = self.epoch;
        let (live, stale): (Vec<Timer>, Vec<Timer>) =
            self.pending.drain(..).partition(|t| t.epoch == epoch);
        self.pending = stale;
        self.frozen = live
            .into_iter()
            .map(|t| FrozenTimer {
                remaining_ms: t.due_ms.saturating_sub(now_ms),
                kind: t.kind,
            })
            .collect();
        self.epoch += 1;
        self.is_frozen = true;
    }

    /// Resume: re-arm frozen timers with their remaining time
    pub fn thaw(&mut self, now_ms: u64) {
        if !self.is_frozen {
            return;
        }
        self.is_frozen = false;
        for frozen in std::mem::take(&mut self.frozen) {
            self.schedule(now_ms, frozen.remaining_ms, frozen.kind);
        }
    }

    /// Earliest timer due at `now_ms`, live or stale. Nothing fires while frozen.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Timer> {
        if self.is_frozen {
            // stale entries may still drain
            let epoch = self.epoch;
            let idx = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due_ms <= now_ms && t.epoch != epoch)
                .min_by_key(|(_, t)| (t.due_ms, t.id))
                .map(|(i, _)| i)?;
            return Some(self.pending.swap_remove(idx));
        }
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.id))
            .map(|(i, _)| i)?;
        Some(self.pending.swap_remove(idx))
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.frozen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
