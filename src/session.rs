use std::time::Duration;

/// Length of every round
pub const ROUND_BUDGET: Duration = Duration::from_secs(20);

/// Mutable per-round counters. Created fresh whenever a round starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub errors: u32,
    pub correct_answers: u32,
    /// Sum of response times of correct answers, in seconds
    pub cumulative_total_time: f64,
    pub time_remaining: Duration,
    pub has_answered_current_question: bool,
    pub response_times: Vec<f64>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            errors: 0,
            correct_answers: 0,
            cumulative_total_time: 0.0,
            time_remaining: ROUND_BUDGET,
            has_answered_current_question: false,
            response_times: Vec::new(),
        }
    }
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round_time_remaining(&self) -> f64 {
        self.time_remaining.as_secs_f64()
    }

    pub fn tick(&mut self, step: Duration) {
        self.time_remaining = self.time_remaining.saturating_sub(step);
    }

    pub fn is_out_of_time(&self) -> bool {
        self.time_remaining.is_zero()
    }

    pub fn record_correct(&mut self, response_secs: f64) {
        self.correct_answers += 1;
        self.cumulative_total_time += response_secs;
        self.response_times.push(response_secs);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn score(&self) -> f64 {
        round_score(self.correct_answers, self.cumulative_total_time)
    }
}

/// Correct answers per second of response time. Zero when nothing was
/// answered correctly or no time accrued.
pub fn round_score(correct_answers: u32, total_time: f64) -> f64 {
    if correct_answers > 0 && total_time > 0.0 {
        correct_answers as f64 / total_time
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state() {
        let state = RoundState::new();
        assert_eq!(state.time_remaining, ROUND_BUDGET);
        assert_eq!(state.score(), 0.0);
        assert!(!state.has_answered_current_question);
    }

    #[test]
    fn score_is_correct_per_second() {
        let mut state = RoundState::new();
        for _ in 0..5 {
            state.record_correct(2.0);
        }
        assert_eq!(state.cumulative_total_time, 10.0);
        assert_eq!(state.score(), 0.5);
    }

    #[test]
    fn score_guards_zero_cases() {
        assert_eq!(round_score(0, 4.0), 0.0);
        assert_eq!(round_score(3, 0.0), 0.0);
    }

    #[test]
    fn two_hundred_ticks_drain_the_budget() {
        let mut state = RoundState::new();
        for _ in 0..199 {
            state.tick(Duration::from_millis(100));
        }
        assert!(!state.is_out_of_time());
        assert_eq!(state.time_remaining, Duration::from_millis(100));
        state.tick(Duration::from_millis(100));
        assert!(state.is_out_of_time());
        state.tick(Duration::from_millis(100));
        assert_eq!(state.round_time_remaining(), 0.0);
    }
}
