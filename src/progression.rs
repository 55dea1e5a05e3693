use crate::breeds::Round;
use crate::image_pool::{PreloadPlan, PreloadSettings};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cumulative correct answers needed after each round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionThresholds {
    pub to_round2: u32,
    pub to_round3: u32,
    pub to_leaderboard: u32,
}

impl Default for ProgressionThresholds {
    fn default() -> Self {
        Self {
            to_round2: 3,
            to_round3: 9,
            to_leaderboard: 18,
        }
    }
}

impl ProgressionThresholds {
    /// Threshold checked when `completed` ends
    pub fn required_after(&self, completed: Round) -> u32 {
        match completed {
            Round::One => self.to_round2,
            Round::Two => self.to_round3,
            Round::Three => self.to_leaderboard,
        }
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.to_round2 <= self.to_round3 && self.to_round3 <= self.to_leaderboard
    }
}

/// Play-through progress carried across rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameProgress {
    pub current_round: Round,
    pub cumulative_correct: u32,
}

impl Default for GameProgress {
    fn default() -> Self {
        Self {
            current_round: Round::One,
            cumulative_correct: 0,
        }
    }
}

impl GameProgress {
    pub fn record_correct(&mut self) {
        self.cumulative_correct += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionDecision {
    /// Move on; the next round's image pool must be populated first
    Advance { next: Round, preload: PreloadSettings },
    /// Threshold missed: back to round 1 with nothing banked
    Restart,
    Leaderboard,
}

/// Decides what follows a finished round
#[derive(Debug, Clone, Default)]
pub struct ProgressionController {
    thresholds: ProgressionThresholds,
    plan: PreloadPlan,
}

impl ProgressionController {
    pub fn new(thresholds: ProgressionThresholds, plan: PreloadPlan) -> Self {
        Self { thresholds, plan }
    }

    pub fn thresholds(&self) -> &ProgressionThresholds {
        &self.thresholds
    }

    pub fn plan(&self) -> &PreloadPlan {
        &self.plan
    }

    pub fn decide(&self, completed: Round, cumulative_correct: u32) -> ProgressionDecision {
        let required = self.thresholds.required_after(completed);
        let decision = if cumulative_correct < required {
            ProgressionDecision::Restart
        } else {
            match completed.next() {
                Some(next) => ProgressionDecision::Advance {
                    next,
                    preload: self.plan.for_round(next),
                },
                None => ProgressionDecision::Leaderboard,
            }
        };
        info!(%completed, cumulative_correct, required, ?decision, "progression decided");
        decision
    }

    pub fn apply(&self, decision: ProgressionDecision, progress: &mut GameProgress) {
        match decision {
            ProgressionDecision::Advance { next, .. } => progress.current_round = next,
            ProgressionDecision::Restart => progress.reset(),
            ProgressionDecision::Leaderboard => {}
        }
    }
}
