use crate::breeds::{Round, RoundConfig};
use crate::image_pool::ImageHandle;
use crate::progression::GameProgress;
use crate::question_timer::{Phase, QuestionTimer};
use crate::scheduler::{Generation, Scheduler, TimerEvent};
use crate::session::RoundState;
use crate::util;
use crate::{BLINK_TICK_MS, ROUND_TICK_MS};
use std::time::Duration;
use tracing::{debug, info};

/// Pause after a correct answer before the next question
pub const CORRECT_SETTLE: Duration = Duration::from_millis(500);
/// Pause after a wrong answer before the next question
pub const INCORRECT_SETTLE: Duration = Duration::from_millis(800);
/// Pause between an expired question and its successor
pub const EXPIRY_PAUSE: Duration = Duration::from_millis(500);

/// An expired question is only replaced while more than this remains
const MIN_REMAINING_AFTER_EXPIRY: Duration = Duration::from_secs(1);
/// An answered question is only replaced while more than this remains
const MIN_REMAINING_AFTER_ANSWER: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    #[strum(to_string = "Time's up")]
    TimeUp,
    #[strum(to_string = "Too many mistakes")]
    ErrorLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for the first question; the round clock is not running yet
    Starting,
    InProgress,
    Ended(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Verdict {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: u64,
    pub correct_breed: String,
    pub choices: Vec<String>,
    /// `None` renders a placeholder
    pub image: Option<ImageHandle>,
    pub started_at: Duration,
    pub answered: Option<(String, Verdict)>,
}

/// Final numbers of a finished round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStats {
    pub round: Round,
    pub reason: EndReason,
    pub correct_answers: u32,
    pub errors: u32,
    pub max_errors: u32,
    pub total_time: f64,
    pub response_times: Vec<f64>,
    pub score: f64,
}

impl RoundStats {
    pub fn mean_response(&self) -> Option<f64> {
        util::mean(&self.response_times)
    }

    pub fn response_std_dev(&self) -> Option<f64> {
        util::std_dev(&self.response_times)
    }
}

/// What a processed timer asks the owner to do
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A fresh question should be sourced and presented
    QuestionNeeded,
    PhaseChanged { question: u64, phase: Phase },
    VisibilityChanged { question: u64, visible: bool },
    Ended(RoundStats),
}

/// State machine of one timed round.
///
/// The session never reads a wall clock. All delays go through the
/// [`Scheduler`] under the generation captured at start, so ending the round
/// or starting another one invalidates every timer it left behind.
#[derive(Debug)]
pub struct RoundSession {
    round: Round,
    config: RoundConfig,
    generation: Generation,
    status: SessionStatus,
    state: RoundState,
    active_pool: Vec<String>,
    question: Option<Question>,
    timer: Option<QuestionTimer>,
    awaiting_question: bool,
    next_question_id: u64,
    stats: Option<RoundStats>,
}

impl RoundSession {
    pub fn start(
        round: Round,
        config: &RoundConfig,
        active_pool: Vec<String>,
        scheduler: &mut Scheduler,
    ) -> Self {
        let generation = scheduler.bump_generation();
        info!(%round, generation, breeds = active_pool.len(), "round starting");
        Self {
            round,
            config: config.clone(),
            generation,
            status: SessionStatus::Starting,
            state: RoundState::new(),
            active_pool,
            question: None,
            timer: None,
            awaiting_question: true,
            next_question_id: 1,
            stats: None,
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn has_ended(&self) -> bool {
        matches!(self.status, SessionStatus::Ended(_))
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn active_pool(&self) -> &[String] {
        &self.active_pool
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn question_phase(&self) -> Option<Phase> {
        self.timer.as_ref().map(QuestionTimer::phase)
    }

    pub fn image_visible(&self) -> bool {
        self.timer.as_ref().is_some_and(QuestionTimer::is_visible)
    }

    pub fn awaiting_question(&self) -> bool {
        self.awaiting_question
    }

    pub fn stats(&self) -> Option<&RoundStats> {
        self.stats.as_ref()
    }

    /// Put a new question on screen. The first question of the round also
    /// starts the round clock. Ignored unless a question was asked for.
    pub fn present_question(
        &mut self,
        scheduler: &mut Scheduler,
        correct_breed: String,
        choices: Vec<String>,
        image: Option<ImageHandle>,
    ) -> Option<&Question> {
        if !self.awaiting_question || self.has_ended() || scheduler.generation() != self.generation
        {
            debug!(round = %self.round, "question not expected, ignoring");
            return None;
        }
        self.awaiting_question = false;

        if self.status == SessionStatus::Starting {
            self.status = SessionStatus::InProgress;
            scheduler.schedule_in(Duration::from_millis(ROUND_TICK_MS), TimerEvent::RoundTick);
        }

        let id = self.next_question_id;
        self.next_question_id += 1;

        let timer = QuestionTimer::for_round(self.round, &self.config);
        scheduler.schedule_in(timer.display_time(), TimerEvent::DisplayElapsed { question: id });
        self.timer = Some(timer);
        self.state.has_answered_current_question = false;

        debug!(question = id, breed = %correct_breed, choices = ?choices, "question presented");
        self.question = Some(Question {
            id,
            correct_breed,
            choices,
            image,
            started_at: scheduler.now(),
            answered: None,
        });
        self.question.as_ref()
    }

    /// Judge a selection. Returns `None` when the answer is not accepted,
    /// e.g. a repeat click or a click after the image expired.
    pub fn submit_answer(
        &mut self,
        scheduler: &mut Scheduler,
        breed: &str,
        progress: &mut GameProgress,
    ) -> Option<Verdict> {
        if self.status != SessionStatus::InProgress || self.state.has_answered_current_question {
            return None;
        }
        let question = self.question.as_mut()?;
        let timer = self.timer.as_mut()?;
        if !timer.answer() {
            debug!(question = question.id, "answer after expiry ignored");
            return None;
        }

        let id = question.id;
        self.state.has_answered_current_question = true;
        scheduler.cancel_where(|e| e.question() == Some(id));

        let verdict = if breed == question.correct_breed {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        };
        question.answered = Some((breed.to_string(), verdict));

        match verdict {
            Verdict::Correct => {
                let elapsed = scheduler.now().saturating_sub(question.started_at);
                self.state.record_correct(elapsed.as_secs_f64());
                progress.record_correct();
                scheduler.schedule_in(CORRECT_SETTLE, TimerEvent::SettleCorrect { question: id });
            }
            Verdict::Incorrect => {
                self.state.record_error();
                scheduler.schedule_in(INCORRECT_SETTLE, TimerEvent::SettleIncorrect { question: id });
            }
        }
        info!(
            question = id,
            %breed,
            %verdict,
            correct = self.state.correct_answers,
            errors = self.state.errors,
            "answer judged"
        );
        Some(verdict)
    }

    /// Process the next timer due at or before `until`. Returns `None` once
    /// nothing more is due, otherwise the (possibly empty) resulting events.
    pub fn step(&mut self, scheduler: &mut Scheduler, until: Duration) -> Option<Vec<SessionEvent>> {
        if self.has_ended() || scheduler.generation() != self.generation {
            return None;
        }
        let due = scheduler.pop_due(until)?;
        let mut events = Vec::new();
        match due.event {
            TimerEvent::RoundTick => self.on_round_tick(scheduler, &mut events),
            TimerEvent::DisplayElapsed { question } | TimerEvent::BlinkTick { question } => {
                self.on_blink_sample(question, scheduler, &mut events)
            }
            TimerEvent::NextQuestion => self.request_question(&mut events),
            TimerEvent::SettleCorrect { question } => {
                self.after_correct(question, scheduler, &mut events)
            }
            TimerEvent::SettleIncorrect { question } => {
                self.after_incorrect(question, scheduler, &mut events)
            }
        }
        Some(events)
    }

    /// Drop the round without producing stats, cancelling its timers
    pub fn abandon(mut self, scheduler: &mut Scheduler) {
        if scheduler.generation() == self.generation {
            scheduler.bump_generation();
        }
        self.awaiting_question = false;
        debug!(round = %self.round, "round abandoned");
    }

    fn errors_exceeded(&self) -> bool {
        self.config.errors_exceeded(self.state.errors)
    }

    fn on_round_tick(&mut self, scheduler: &mut Scheduler, events: &mut Vec<SessionEvent>) {
        if self.status != SessionStatus::InProgress {
            return;
        }
        self.state.tick(Duration::from_millis(ROUND_TICK_MS));
        if self.errors_exceeded() {
            self.end(EndReason::ErrorLimit, scheduler, events);
        } else if self.state.is_out_of_time() {
            self.end(EndReason::TimeUp, scheduler, events);
        } else {
            scheduler.schedule_in(Duration::from_millis(ROUND_TICK_MS), TimerEvent::RoundTick);
        }
    }

    fn on_blink_sample(&mut self, id: u64, scheduler: &mut Scheduler, events: &mut Vec<SessionEvent>) {
        let Some(question) = self.question.as_ref().filter(|q| q.id == id) else {
            return;
        };
        let Some(timer) = self.timer.as_mut() else {
            return;
        };

        let elapsed = scheduler.now().saturating_sub(question.started_at);
        let was_visible = timer.is_visible();
        let transition = timer.sample(elapsed);
        if timer.is_visible() != was_visible {
            events.push(SessionEvent::VisibilityChanged {
                question: id,
                visible: timer.is_visible(),
            });
        }
        if let Some(phase) = transition {
            events.push(SessionEvent::PhaseChanged { question: id, phase });
        }

        match timer.phase() {
            Phase::BlinkingOut => {
                scheduler.schedule_in(
                    Duration::from_millis(BLINK_TICK_MS),
                    TimerEvent::BlinkTick { question: id },
                );
            }
            Phase::Expired if transition == Some(Phase::Expired) => {
                debug!(question = id, "question expired unanswered");
                if self.state.time_remaining > MIN_REMAINING_AFTER_EXPIRY && !self.errors_exceeded() {
                    scheduler.schedule_in(EXPIRY_PAUSE, TimerEvent::NextQuestion);
                }
            }
            _ => {}
        }
    }

    fn after_correct(&mut self, id: u64, scheduler: &mut Scheduler, events: &mut Vec<SessionEvent>) {
        if !self.is_current(id) {
            return;
        }
        if self.state.time_remaining > MIN_REMAINING_AFTER_ANSWER && !self.errors_exceeded() {
            self.request_question(events);
        } else if self.errors_exceeded() {
            self.end(EndReason::ErrorLimit, scheduler, events);
        } else {
            // too little time for another question; the round clock finishes the round
            debug!(question = id, "waiting for round clock");
        }
    }

    fn after_incorrect(&mut self, id: u64, scheduler: &mut Scheduler, events: &mut Vec<SessionEvent>) {
        if !self.is_current(id) {
            return;
        }
        if self.errors_exceeded() {
            self.end(EndReason::ErrorLimit, scheduler, events);
        } else if self.state.time_remaining > MIN_REMAINING_AFTER_ANSWER {
            self.request_question(events);
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.status == SessionStatus::InProgress && self.question.as_ref().is_some_and(|q| q.id == id)
    }

    fn request_question(&mut self, events: &mut Vec<SessionEvent>) {
        if self.has_ended() || self.awaiting_question {
            return;
        }
        self.awaiting_question = true;
        events.push(SessionEvent::QuestionNeeded);
    }

    fn end(&mut self, reason: EndReason, scheduler: &mut Scheduler, events: &mut Vec<SessionEvent>) {
        self.status = SessionStatus::Ended(reason);
        self.awaiting_question = false;
        scheduler.bump_generation();

        let stats = RoundStats {
            round: self.round,
            reason,
            correct_answers: self.state.correct_answers,
            errors: self.state.errors,
            max_errors: self.config.max_errors,
            total_time: self.state.cumulative_total_time,
            response_times: self.state.response_times.clone(),
            score: self.state.score(),
        };
        info!(
            round = %self.round,
            %reason,
            correct = stats.correct_answers,
            errors = stats.errors,
            score = stats.score,
            "round ended"
        );
        self.stats = Some(stats.clone());
        events.push(SessionEvent::Ended(stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breeds::BreedCatalog;
    use assert_matches::assert_matches;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    struct Harness {
        scheduler: Scheduler,
        session: RoundSession,
        progress: GameProgress,
        events: Vec<SessionEvent>,
    }

    impl Harness {
        fn new(round: Round) -> Self {
            let catalog = BreedCatalog::default();
            let mut scheduler = Scheduler::new();
            let pool = vec!["Akita".to_string(), "Husky".to_string(), "Whippet".to_string()];
            let session = RoundSession::start(round, catalog.round_config(round), pool, &mut scheduler);
            Self {
                scheduler,
                session,
                progress: GameProgress::default(),
                events: Vec::new(),
            }
        }

        fn present(&mut self, correct: &str) {
            self.session
                .present_question(
                    &mut self.scheduler,
                    correct.to_string(),
                    vec![correct.to_string(), "Husky".to_string(), "Whippet".to_string()],
                    None,
                )
                .expect("question accepted");
        }

        /// Run every timer up to `t`; presents a question whenever one is asked for
        fn run_until(&mut self, t: Duration, auto_present: bool) {
            while let Some(events) = self.session.step(&mut self.scheduler, t) {
                let needs = events.contains(&SessionEvent::QuestionNeeded);
                self.events.extend(events);
                if needs && auto_present {
                    self.present("Akita");
                }
            }
            self.scheduler.advance_clock(t);
        }

        fn answer(&mut self, breed: &str) -> Option<Verdict> {
            self.session
                .submit_answer(&mut self.scheduler, breed, &mut self.progress)
        }

        fn ended(&self) -> Option<&RoundStats> {
            self.events.iter().find_map(|e| match e {
                SessionEvent::Ended(stats) => Some(stats),
                _ => None,
            })
        }
    }

    #[test]
    fn clock_starts_with_first_question() {
        let mut h = Harness::new(Round::One);
        assert_eq!(h.session.status(), SessionStatus::Starting);
        h.run_until(ms(5_000), false);
        assert_eq!(h.session.state().time_remaining, ms(20_000));

        h.present("Akita");
        assert_eq!(h.session.status(), SessionStatus::InProgress);
        h.run_until(ms(6_000), false);
        assert_eq!(h.session.state().time_remaining, ms(19_000));
    }

    #[test]
    fn round_lasts_exactly_two_hundred_ticks() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(19_900), true);
        assert_eq!(h.session.status(), SessionStatus::InProgress);
        assert_eq!(h.session.state().time_remaining, ms(100));

        h.run_until(ms(20_000), true);
        assert_eq!(h.session.status(), SessionStatus::Ended(EndReason::TimeUp));
        let stats = h.ended().unwrap();
        assert_eq!(stats.reason, EndReason::TimeUp);
        assert_eq!(stats.correct_answers, 0);
        assert_eq!(stats.score, 0.0);
    }

    #[test]
    fn expiry_requests_next_question_after_pause() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(5_000), false);
        assert_eq!(h.session.question_phase(), Some(Phase::BlinkingOut));
        assert!(h.events.contains(&SessionEvent::PhaseChanged {
            question: 1,
            phase: Phase::BlinkingOut
        }));

        h.run_until(ms(6_500), false);
        assert_eq!(h.session.question_phase(), Some(Phase::Expired));
        assert!(!h.session.image_visible());
        assert!(!h.events.contains(&SessionEvent::QuestionNeeded));

        h.run_until(ms(7_000), false);
        assert!(h.events.contains(&SessionEvent::QuestionNeeded));
        assert!(h.session.awaiting_question());
    }

    #[test]
    fn blink_out_emits_visibility_changes() {
        let mut h = Harness::new(Round::Two);
        h.present("Akita");
        h.run_until(ms(5_000), false);
        let flips = h
            .events
            .iter()
            .filter(|e| matches!(e, SessionEvent::VisibilityChanged { .. }))
            .count();
        assert!(flips >= 2, "expected flicker, got {flips} changes");
    }

    #[test]
    fn expired_question_rejects_answers() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(6_500), false);
        assert_eq!(h.answer("Akita"), None);
        assert_eq!(h.session.state().correct_answers, 0);
        assert_eq!(h.progress.cumulative_correct, 0);
    }

    #[test]
    fn correct_answer_scores_and_settles() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(2_000), false);

        assert_eq!(h.answer("Akita"), Some(Verdict::Correct));
        assert_eq!(h.session.state().correct_answers, 1);
        assert_eq!(h.session.state().cumulative_total_time, 2.0);
        assert_eq!(h.progress.cumulative_correct, 1);
        assert_eq!(h.session.question_phase(), Some(Phase::Answered));

        // a second click on the same question does nothing
        assert_eq!(h.answer("Husky"), None);
        assert_eq!(h.session.state().errors, 0);

        h.run_until(ms(2_499), false);
        assert!(!h.events.contains(&SessionEvent::QuestionNeeded));
        h.run_until(ms(2_500), false);
        assert!(h.events.contains(&SessionEvent::QuestionNeeded));
    }

    #[test]
    fn answering_cancels_the_blink_out() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(5_200), false);
        assert_eq!(h.answer("Akita"), Some(Verdict::Correct));
        h.events.clear();
        h.run_until(ms(5_600), false);
        assert!(h.session.image_visible());
        assert!(!h
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::VisibilityChanged { .. } | SessionEvent::PhaseChanged { .. })));
    }

    #[test]
    fn wrong_answers_end_round_only_past_budget() {
        let mut h = Harness::new(Round::One);
        let budget = h.session.config().max_errors;
        let mut t = 0;

        for n in 1..=budget + 1 {
            h.present("Akita");
            t += 100;
            h.run_until(ms(t), false);
            assert_eq!(h.answer("Husky"), Some(Verdict::Incorrect));
            t += 800;
            h.run_until(ms(t), false);

            if n <= budget {
                assert_eq!(h.session.status(), SessionStatus::InProgress, "ended after {n} errors");
                assert!(h.session.awaiting_question());
            }
        }

        assert_eq!(h.session.status(), SessionStatus::Ended(EndReason::ErrorLimit));
        let stats = h.ended().unwrap();
        assert_eq!(stats.errors, budget + 1);
        assert_eq!(stats.max_errors, budget);
    }

    #[test]
    fn score_is_correct_over_time() {
        let mut h = Harness::new(Round::One);
        let mut t = 0;
        for _ in 0..5 {
            h.present("Akita");
            t += 2_000;
            h.run_until(ms(t), false);
            assert_eq!(h.answer("Akita"), Some(Verdict::Correct));
            t += 500;
            h.run_until(ms(t), false);
        }
        h.run_until(ms(25_000), false);
        let stats = h.ended().unwrap();
        assert_eq!(stats.reason, EndReason::TimeUp);
        assert_eq!(stats.correct_answers, 5);
        assert_eq!(stats.total_time, 10.0);
        assert_eq!(stats.score, 0.5);
        assert_eq!(stats.mean_response(), Some(2.0));
    }

    #[test]
    fn late_correct_answer_waits_for_the_clock() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        // expires at 6.5s, successor requested at 7.0s
        h.run_until(ms(7_000), false);
        assert!(h.session.awaiting_question());
        h.present("Akita");
        h.run_until(ms(14_000), false);
        h.present("Akita");

        h.run_until(ms(19_100), false);
        assert_eq!(h.session.question_phase(), Some(Phase::BlinkingOut));
        assert_eq!(h.answer("Akita"), Some(Verdict::Correct));
        h.events.clear();

        // settles at 19.6s with 0.4s left: nothing new is asked for
        h.run_until(ms(19_900), false);
        assert!(!h.events.contains(&SessionEvent::QuestionNeeded));
        assert_eq!(h.session.status(), SessionStatus::InProgress);

        h.run_until(ms(20_000), false);
        assert_eq!(h.session.status(), SessionStatus::Ended(EndReason::TimeUp));
        assert_eq!(h.ended().unwrap().correct_answers, 1);
    }

    #[test]
    fn no_new_question_after_late_expiry() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(100), false);
        h.answer("Akita");
        h.run_until(ms(12_600), false);
        assert!(h.session.awaiting_question());

        h.present("Akita");
        h.events.clear();
        // expires at 19.1s with 0.9s left
        h.run_until(ms(19_100), false);
        assert_eq!(h.session.question_phase(), Some(Phase::Expired));
        h.run_until(ms(20_000), false);
        assert!(!h.events.contains(&SessionEvent::QuestionNeeded));
        assert_matches!(h.session.status(), SessionStatus::Ended(EndReason::TimeUp));
    }

    #[test]
    fn ending_the_round_cancels_every_timer() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(20_000), false);
        assert!(h.session.has_ended());
        assert_eq!(h.scheduler.pending(), 0);
        assert!(h.session.step(&mut h.scheduler, ms(60_000)).is_none());
        assert_eq!(h.answer("Akita"), None);
    }

    #[test]
    fn stale_session_is_inert_after_a_new_round_starts() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        h.run_until(ms(1_000), false);

        let catalog = BreedCatalog::default();
        let mut fresh = RoundSession::start(
            Round::Two,
            catalog.round_config(Round::Two),
            vec!["Akita".to_string()],
            &mut h.scheduler,
        );
        assert!(h.session.step(&mut h.scheduler, ms(60_000)).is_none());
        assert!(h
            .session
            .present_question(&mut h.scheduler, "Akita".into(), vec![], None)
            .is_none());
        assert_eq!(fresh.status(), SessionStatus::Starting);
        assert!(fresh.step(&mut h.scheduler, ms(60_000)).is_none());
    }

    #[test]
    fn presenting_without_request_is_ignored() {
        let mut h = Harness::new(Round::One);
        h.present("Akita");
        assert!(h
            .session
            .present_question(&mut h.scheduler, "Husky".into(), vec![], None)
            .is_none());
        assert_eq!(h.session.question().unwrap().correct_breed, "Akita");
    }
}
