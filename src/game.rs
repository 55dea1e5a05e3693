//! Orchestrates rounds, image pools and progression for one player.
//!
//! [`Game`] is driven entirely from outside: the caller feeds it the current
//! time, answers and resolved images, and drains [`GameEvent`]s describing
//! what to draw or fetch next. Nothing in here blocks or spawns.

use crate::breeds::{BreedCatalog, Round};
use crate::choices::ChoiceGenerator;
use crate::image_pool::{ImageError, ImageHandle, ImagePool, PreloadSettings};
use crate::progression::{GameProgress, ProgressionController, ProgressionDecision};
use crate::question_timer::Phase;
use crate::round_session::{Question, RoundSession, RoundStats, SessionEvent, Verdict};
use crate::scheduler::{Generation, Scheduler};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifies one on-demand image request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTicket {
    pub id: u64,
    pub generation: Generation,
    pub breed: String,
}

/// What the end-of-round card shows
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub stats: RoundStats,
    pub cumulative_correct: u32,
    pub required: u32,
    pub decision: ProgressionDecision,
}

impl RoundSummary {
    pub fn passed(&self) -> bool {
        self.decision != ProgressionDecision::Restart
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GamePhase {
    Preloading { round: Round },
    Playing,
    RoundSummary(RoundSummary),
    Leaderboard { final_score: f64, cumulative_correct: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PreloadRequested {
        round: Round,
        count: usize,
        dispatch_gap: Duration,
    },
    ImageRequested(ImageTicket),
    QuestionShown {
        question: u64,
        round: Round,
        choices: Vec<String>,
        image: Option<ImageHandle>,
    },
    VisibilityChanged {
        question: u64,
        visible: bool,
    },
    PhaseChanged {
        question: u64,
        phase: Phase,
    },
    AnswerJudged {
        question: u64,
        breed: String,
        verdict: Verdict,
    },
    RoundEnded(RoundSummary),
    LeaderboardReached {
        final_score: f64,
        cumulative_correct: u32,
    },
}

pub struct Game<R: Rng = StdRng> {
    catalog: BreedCatalog,
    controller: ProgressionController,
    progress: GameProgress,
    pools: [ImagePool; 3],
    scheduler: Scheduler,
    session: Option<RoundSession>,
    phase: GamePhase,
    rng: R,
    events: VecDeque<GameEvent>,
    pending_image: Option<ImageTicket>,
    next_ticket: u64,
}

impl<R: Rng> Game<R> {
    pub fn new(catalog: BreedCatalog, controller: ProgressionController, rng: R) -> Self {
        Self {
            catalog,
            controller,
            progress: GameProgress::default(),
            pools: Default::default(),
            scheduler: Scheduler::new(),
            session: None,
            phase: GamePhase::Preloading { round: Round::One },
            rng,
            events: VecDeque::new(),
            pending_image: None,
            next_ticket: 1,
        }
    }

    /// Ask for the round 1 pool; play begins once it is installed
    pub fn start(&mut self) {
        self.request_preload(Round::One);
    }

    pub fn phase(&self) -> &GamePhase {
        &self.phase
    }

    pub fn progress(&self) -> &GameProgress {
        &self.progress
    }

    pub fn catalog(&self) -> &BreedCatalog {
        &self.catalog
    }

    pub fn controller(&self) -> &ProgressionController {
        &self.controller
    }

    pub fn session(&self) -> Option<&RoundSession> {
        self.session.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.session.as_ref().and_then(RoundSession::question)
    }

    pub fn pool(&self, round: Round) -> &ImagePool {
        &self.pools[round.index()]
    }

    pub fn pending_image(&self) -> Option<&ImageTicket> {
        self.pending_image.as_ref()
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn time_remaining(&self) -> Duration {
        self.session
            .as_ref()
            .map(|s| s.state().time_remaining)
            .unwrap_or_default()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Hand over a populated pool. Starts the round if the game was waiting
    /// on exactly this pool.
    pub fn install_pool(&mut self, round: Round, pool: ImagePool) {
        info!(%round, images = pool.len(), "pool installed");
        self.pools[round.index()] = pool;
        if self.phase == (GamePhase::Preloading { round }) {
            self.begin_round(round);
        }
    }

    /// Run every timer due up to `now`, in order
    pub fn advance_to(&mut self, now: Duration) {
        loop {
            let Some(session) = self.session.as_mut() else {
                break;
            };
            let Some(events) = session.step(&mut self.scheduler, now) else {
                break;
            };
            for event in events {
                self.on_session_event(event);
            }
        }
        self.scheduler.advance_clock(now);
    }

    pub fn submit_answer(&mut self, breed: &str) -> Option<Verdict> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        let session = self.session.as_mut()?;
        let verdict = session.submit_answer(&mut self.scheduler, breed, &mut self.progress)?;
        let question = session.question().map(|q| q.id).unwrap_or_default();
        self.events.push_back(GameEvent::AnswerJudged {
            question,
            breed: breed.to_string(),
            verdict,
        });
        Some(verdict)
    }

    /// Answer with the choice at `index` (zero-based) of the current question
    pub fn select_choice(&mut self, index: usize) -> Option<Verdict> {
        let breed = self.current_question()?.choices.get(index)?.clone();
        self.submit_answer(&breed)
    }

    /// Deliver the result of an on-demand image request. Results for anything
    /// but the outstanding ticket are dropped; failures show a placeholder.
    pub fn image_resolved(&mut self, ticket: &ImageTicket, result: Result<ImageHandle, ImageError>) {
        if self.pending_image.as_ref() != Some(ticket) {
            debug!(ticket = ticket.id, breed = %ticket.breed, "dropping stale image");
            return;
        }
        self.pending_image = None;

        let image = match result {
            Ok(handle) if handle.is_displayable() => Some(handle),
            Ok(handle) => {
                warn!(key = %handle.key, "resolved image is empty, showing placeholder");
                None
            }
            Err(err) => {
                warn!(breed = %ticket.breed, error = %err, "image unavailable, showing placeholder");
                None
            }
        };
        self.present(ticket.breed.clone(), image);
    }

    /// Leave the summary card: advance to the next round or start over
    pub fn continue_after_summary(&mut self) {
        let GamePhase::RoundSummary(summary) = &self.phase else {
            return;
        };
        match summary.decision {
            ProgressionDecision::Advance { next, preload } => {
                self.controller.apply(summary.decision, &mut self.progress);
                self.phase = GamePhase::Preloading { round: next };
                self.emit_preload(next, preload);
            }
            ProgressionDecision::Restart => self.restart(),
            ProgressionDecision::Leaderboard => {
                let (final_score, cumulative_correct) =
                    (summary.stats.score, summary.cumulative_correct);
                self.enter_leaderboard(final_score, cumulative_correct);
            }
        }
    }

    /// Back to round 1 with nothing banked. Reuses the round 1 pool when one
    /// was already populated.
    pub fn restart(&mut self) {
        info!("restarting from round 1");
        self.controller
            .apply(ProgressionDecision::Restart, &mut self.progress);
        self.pending_image = None;
        if let Some(session) = self.session.take() {
            session.abandon(&mut self.scheduler);
        }
        if self.pools[Round::One.index()].is_empty() {
            self.request_preload(Round::One);
        } else {
            self.begin_round(Round::One);
        }
    }

    fn request_preload(&mut self, round: Round) {
        self.phase = GamePhase::Preloading { round };
        let settings = self.controller.plan().for_round(round);
        self.emit_preload(round, settings);
    }

    fn emit_preload(&mut self, round: Round, settings: PreloadSettings) {
        self.events.push_back(GameEvent::PreloadRequested {
            round,
            count: settings.count,
            dispatch_gap: settings.dispatch_gap(),
        });
    }

    fn begin_round(&mut self, round: Round) {
        let active_pool = self.catalog.draw_round_pool(round, &mut self.rng);
        self.progress.current_round = round;
        self.pending_image = None;
        self.session = Some(RoundSession::start(
            round,
            self.catalog.round_config(round),
            active_pool,
            &mut self.scheduler,
        ));
        self.phase = GamePhase::Playing;
        self.source_question();
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::QuestionNeeded => self.source_question(),
            SessionEvent::PhaseChanged { question, phase } => {
                self.events
                    .push_back(GameEvent::PhaseChanged { question, phase });
            }
            SessionEvent::VisibilityChanged { question, visible } => {
                self.events
                    .push_back(GameEvent::VisibilityChanged { question, visible });
            }
            SessionEvent::Ended(stats) => self.finish_round(stats),
        }
    }

    /// Pull the next image from the round's pool, or ask for one on demand
    fn source_question(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let round = session.round();
        let generation = session.generation();

        if let Some((handle, breed)) = self.pools[round.index()].take(session.active_pool()) {
            self.present(breed, Some(handle));
            return;
        }

        let breed = session
            .active_pool()
            .choose(&mut self.rng)
            .or_else(|| self.catalog.breeds_for_round(round).choose(&mut self.rng))
            .cloned();
        let Some(breed) = breed else {
            warn!(%round, "no breeds to ask about");
            return;
        };

        let ticket = ImageTicket {
            id: self.next_ticket,
            generation,
            breed,
        };
        self.next_ticket += 1;
        debug!(ticket = ticket.id, breed = %ticket.breed, "requesting image on demand");
        self.pending_image = Some(ticket.clone());
        self.events.push_back(GameEvent::ImageRequested(ticket));
    }

    fn present(&mut self, breed: String, image: Option<ImageHandle>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let round = session.round();
        let choices = ChoiceGenerator::new(&self.catalog).generate(
            &breed,
            round,
            session.active_pool(),
            &mut self.rng,
        );
        if let Some(question) = session.present_question(&mut self.scheduler, breed, choices, image) {
            self.events.push_back(GameEvent::QuestionShown {
                question: question.id,
                round,
                choices: question.choices.clone(),
                image: question.image.clone(),
            });
        }
    }

    fn finish_round(&mut self, stats: RoundStats) {
        self.pending_image = None;
        let cumulative_correct = self.progress.cumulative_correct;
        let required = self.controller.thresholds().required_after(stats.round);
        let decision = self.controller.decide(stats.round, cumulative_correct);
        let summary = RoundSummary {
            stats,
            cumulative_correct,
            required,
            decision,
        };
        self.events
            .push_back(GameEvent::RoundEnded(summary.clone()));

        if decision == ProgressionDecision::Leaderboard {
            self.enter_leaderboard(summary.stats.score, cumulative_correct);
        } else {
            self.phase = GamePhase::RoundSummary(summary);
        }
    }

    fn enter_leaderboard(&mut self, final_score: f64, cumulative_correct: u32) {
        info!(final_score, cumulative_correct, "leaderboard reached");
        self.phase = GamePhase::Leaderboard {
            final_score,
            cumulative_correct,
        };
        self.events.push_back(GameEvent::LeaderboardReached {
            final_score,
            cumulative_correct,
        });
    }
}
