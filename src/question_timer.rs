use crate::breeds::{Round, RoundConfig};
use std::f64::consts::PI;
use std::time::Duration;

/// Lifecycle of a single question's image
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Visible,
    BlinkingOut,
    Expired,
    Answered,
}

/// Tracks the display window, blink-out and lock of one question.
///
/// Time is supplied by the caller as the elapsed duration since the question
/// started, so the timer itself holds no clock.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionTimer {
    display_time: Duration,
    blink_duration: Duration,
    base_speed: f64,
    phase: Phase,
    visible: bool,
}

impl QuestionTimer {
    pub fn new(display_time: Duration, blink_duration: Duration, base_speed: f64) -> Self {
        Self {
            display_time,
            blink_duration,
            base_speed,
            phase: Phase::Visible,
            visible: true,
        }
    }

    pub fn for_round(round: Round, config: &RoundConfig) -> Self {
        Self::new(
            config.display_time(),
            config.blink_duration(),
            round.blink_base_speed(),
        )
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn display_time(&self) -> Duration {
        self.display_time
    }

    /// Moment (relative to question start) at which the image is fully hidden
    pub fn expires_after(&self) -> Duration {
        self.display_time + self.blink_duration
    }

    /// Phase an unanswered question is in at `elapsed`
    pub fn phase_at(&self, elapsed: Duration) -> Phase {
        if self.phase == Phase::Answered {
            Phase::Answered
        } else if elapsed < self.display_time {
            Phase::Visible
        } else if elapsed < self.expires_after() {
            Phase::BlinkingOut
        } else {
            Phase::Expired
        }
    }

    /// Whether the image is shown at `elapsed`
    pub fn visibility_at(&self, elapsed: Duration) -> bool {
        match self.phase_at(elapsed) {
            Phase::Visible | Phase::Answered => true,
            Phase::Expired => false,
            Phase::BlinkingOut => {
                let into_blink = elapsed.saturating_sub(self.display_time);
                let progress = if self.blink_duration.is_zero() {
                    0.0
                } else {
                    into_blink.as_secs_f64() / self.blink_duration.as_secs_f64()
                };
                blink_visible(self.base_speed, progress)
            }
        }
    }

    /// Apply a sample at `elapsed`. Returns the new phase when it changed.
    /// Answered and Expired are terminal; sampling them is a no-op.
    pub fn sample(&mut self, elapsed: Duration) -> Option<Phase> {
        if matches!(self.phase, Phase::Answered | Phase::Expired) {
            return None;
        }
        let next = self.phase_at(elapsed);
        self.visible = self.visibility_at(elapsed);
        if next != self.phase {
            self.phase = next;
            Some(next)
        } else {
            None
        }
    }

    /// Lock in an answer. Only possible while the image is still on screen
    /// or blinking out; freezes the image fully visible.
    pub fn answer(&mut self) -> bool {
        match self.phase {
            Phase::Visible | Phase::BlinkingOut => {
                self.phase = Phase::Answered;
                self.visible = true;
                true
            }
            Phase::Expired | Phase::Answered => false,
        }
    }
}

/// Square-wave visibility of the blink-out. The oscillation speeds up as
/// `progress` runs from 0 towards 1.
pub fn blink_visible(base_speed: f64, progress: f64) -> bool {
    let progress = progress.clamp(0.0, 1.0 - f64::EPSILON);
    let speed = base_speed * (1.0 + progress * 3.0);
    (progress * PI * speed).sin() > 0.0
}
