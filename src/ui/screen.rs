use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;

use breedblink::game::GamePhase;

use crate::App;

/// A UI Screen boundary: responsible for rendering and optional key handling
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
    /// Optional per-screen key handling. Returns true if the key was handled.
    fn on_key(&mut self, _key: KeyEvent, _app: &mut App) -> bool {
        false
    }
}

/// Preload progress gauge; ignores input
pub struct LoadingScreen;

impl Screen for LoadingScreen {}

/// Picture, clock and choices; number keys answer
pub struct QuestionScreen;

impl Screen for QuestionScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        match key.code {
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                app.game.select_choice(index);
                true
            }
            _ => false,
        }
    }
}

/// End-of-round card
pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        match key.code {
            KeyCode::Char('c') | KeyCode::Enter => {
                app.game.continue_after_summary();
                true
            }
            KeyCode::Char('r') => {
                app.game.restart();
                true
            }
            _ => false,
        }
    }
}

pub struct LeaderboardScreen;

impl Screen for LeaderboardScreen {
    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        match key.code {
            KeyCode::Char('r') => {
                app.celebration.is_active = false;
                app.game.restart();
                true
            }
            _ => false,
        }
    }
}

/// Helper to construct the appropriate screen for the current phase
pub fn current_screen(phase: &GamePhase) -> Box<dyn Screen> {
    match phase {
        GamePhase::Preloading { .. } => Box::new(LoadingScreen),
        GamePhase::Playing => Box::new(QuestionScreen),
        GamePhase::RoundSummary(_) => Box::new(SummaryScreen),
        GamePhase::Leaderboard { .. } => Box::new(LeaderboardScreen),
    }
}
