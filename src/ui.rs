pub mod charting;
pub mod picture;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, Gauge, GraphType, Paragraph, Widget, Wrap},
};

use breedblink::{
    breeds::Round,
    game::{GamePhase, RoundSummary},
    progression::ProgressionDecision,
    round_session::{EndReason, Verdict},
    util::ceil_secs,
};

use unicode_width::UnicodeWidthStr;

use crate::{ui::picture::Picture, App};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const ANSWER_KEYS: [char; 4] = ['1', '2', '3', '4'];

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.game.phase() {
            GamePhase::Preloading { round } => render_loading(self, *round, area, buf),
            GamePhase::Playing => render_question(self, area, buf),
            GamePhase::RoundSummary(summary) => render_summary(self, summary, area, buf),
            GamePhase::Leaderboard {
                final_score,
                cumulative_correct,
            } => render_leaderboard(self, *final_score, *cumulative_correct, area, buf),
        }
    }
}

fn render_loading(app: &App, round: Round, area: Rect, buf: &mut Buffer) {
    let (loaded, total, ratio) = match app.loading {
        Some(progress) if progress.round == round => {
            (progress.loaded, progress.total, progress.ratio())
        }
        _ => (0, app.game.controller().plan().for_round(round).count, 0.0),
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN * 2)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("Preloading {round}: {loaded}/{total}"),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("{:.0}%", ratio * 100.0))
        .render(chunks[3], buf);
}

fn render_question(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.game.session() else {
        return;
    };
    let state = session.state();
    let max_errors = session.config().max_errors;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // round
            Constraint::Length(1), // time / errors / total
            Constraint::Min(3),    // picture
            Constraint::Length(4), // choices
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(session.round().to_string(), bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let errors_style = if max_errors as i64 - state.errors as i64 <= 1 {
        bold().fg(Color::Red)
    } else {
        bold()
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("Time: {}s", ceil_secs(state.round_time_remaining())),
            bold(),
        ),
        Span::raw("   "),
        Span::styled(format!("Errors: {}/{}", state.errors, max_errors), errors_style),
        Span::raw("   "),
        Span::styled(
            format!("Total Correct: {}", app.game.progress().cumulative_correct),
            bold(),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let Some(question) = app.game.current_question() else {
        Paragraph::new(Span::styled("fetching a dog...", dim_bold()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
        return;
    };

    if session.awaiting_question() && app.game.pending_image().is_some() {
        Paragraph::new(Span::styled("fetching a dog...", dim_bold()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    } else {
        Picture::new(
            question.image.as_ref().map(|h| h.thumbnail.as_ref()),
            session.image_visible(),
        )
        .render(chunks[2], buf);
    }

    // pad to a common display width so the choices line up as a column
    let widest = question
        .choices
        .iter()
        .map(|c| c.width())
        .max()
        .unwrap_or(0);
    let lines = question
        .choices
        .iter()
        .zip(ANSWER_KEYS)
        .map(|(choice, key)| {
            let padding = " ".repeat(widest - choice.width());
            let style = match &question.answered {
                Some(_) if *choice == question.correct_breed => bold().fg(Color::Green),
                Some((picked, Verdict::Incorrect)) if picked == choice => bold().fg(Color::Red),
                Some(_) => dim_bold(),
                None => bold(),
            };
            Line::from(vec![
                Span::styled(format!("({key}) "), dim_bold()),
                Span::styled(choice.clone(), style),
                Span::raw(padding),
            ])
        })
        .collect::<Vec<Line>>();
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled("(1-4) answer / (esc)ape", italic())).render(chunks[4], buf);
}

/// Progression line under the summary card, and whether it reads as good news
pub fn progression_message(summary: &RoundSummary) -> (String, bool) {
    let target = if summary.stats.round == Round::Three {
        "for leaderboard"
    } else {
        "to advance"
    };
    if summary.passed() {
        (
            format!(
                "✓ You need {} correct {target} · you made it!",
                summary.required
            ),
            true,
        )
    } else {
        (
            format!(
                "Need {} correct {target} · you have {}",
                summary.required, summary.cumulative_correct
            ),
            false,
        )
    }
}

fn render_summary(app: &App, summary: &RoundSummary, area: Rect, buf: &mut Buffer) {
    let stats = &summary.stats;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // headline
            Constraint::Length(1), // counts
            Constraint::Length(1), // score
            Constraint::Min(1),    // chart
            Constraint::Length(1), // progression
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let headline = match stats.reason {
        EndReason::TimeUp => format!("{} Complete", stats.round),
        EndReason::ErrorLimit => "Error limit reached".to_string(),
    };
    Paragraph::new(Span::styled(headline, bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let errors_style = if stats.errors > stats.max_errors {
        bold().fg(Color::Red)
    } else {
        bold()
    };
    Paragraph::new(Line::from(vec![
        Span::styled(format!("Correct: {}", stats.correct_answers), bold()),
        Span::raw("   "),
        Span::styled(
            format!("Errors: {} / {}", stats.errors, stats.max_errors),
            errors_style,
        ),
        Span::raw("   "),
        Span::styled(format!("Total: {}", summary.cumulative_correct), bold()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let mut score_line = format!("Round score {:.2}", stats.score);
    if let Some(mean) = stats.mean_response() {
        score_line.push_str(&format!("   avg {mean:.2}s"));
    }
    if let Some(sd) = stats.response_std_dev() {
        score_line.push_str(&format!("   {sd:.2} sd"));
    }
    if let Some(best) = app.best_score {
        score_line.push_str(&format!("   best {best:.2}"));
    }
    Paragraph::new(Span::styled(score_line, bold().fg(Color::Yellow)))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    let points = charting::response_points(&stats.response_times);
    if !points.is_empty() {
        let (answers, slowest) = charting::compute_chart_params(&points);
        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&points)];
        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("answer")
                    .bounds([1.0, answers])
                    .labels(vec![
                        Span::styled("1", bold()),
                        Span::styled(charting::format_label(answers), bold()),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("seconds")
                    .bounds([0.0, slowest])
                    .labels(vec![
                        Span::styled("0", bold()),
                        Span::styled(charting::format_label(slowest), bold()),
                    ]),
            )
            .render(chunks[3], buf);
    }

    let (message, good) = progression_message(summary);
    Paragraph::new(Span::styled(
        message,
        bold().fg(if good { Color::Green } else { Color::Red }),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[4], buf);

    let legend = match summary.decision {
        ProgressionDecision::Advance { next, .. } => {
            format!("(c)ontinue to {next} / (r)estart / (esc)ape")
        }
        _ => "(r) play again / (esc)ape".to_string(),
    };
    Paragraph::new(Span::styled(legend, italic())).render(chunks[6], buf);
}

fn render_leaderboard(
    app: &App,
    final_score: f64,
    cumulative_correct: u32,
    area: Rect,
    buf: &mut Buffer,
) {
    let trophy = bold().fg(Color::Yellow);
    let lines = vec![
        Line::from(Span::styled("🏆 LEADERBOARD 🏆", trophy)),
        Line::default(),
        Line::from(Span::styled("Congratulations!", bold())),
        Line::from(Span::styled(
            format!("You achieved {cumulative_correct} correct answers!"),
            bold().fg(Color::Green),
        )),
        Line::from(Span::styled(format!("Final Score: {final_score:.2}"), trophy)),
        Line::default(),
        Line::from(Span::styled("Top Scores:", bold())),
        Line::from(Span::styled(format!("1. You - {final_score:.2}"), trophy)),
        Line::from(Span::styled("(Leaderboard storage coming soon)", dim_bold())),
        Line::default(),
        Line::from(Span::styled("(r) play again / (esc)ape", italic())),
    ];

    let height = (lines.len() as u16).min(area.height);
    let top = area.y + area.height.saturating_sub(height) / 2;
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(Rect::new(area.x, top, area.width, height), buf);

    render_celebration_particles(&app.celebration, area, buf);
}

/// Render celebration particles on top of the leaderboard
fn render_celebration_particles(
    celebration: &breedblink::celebration::Celebration,
    area: Rect,
    buf: &mut Buffer,
) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::Red,
        Color::LightBlue,
    ];

    for particle in &celebration.particles {
        if particle.x < 0.0 || particle.y < 0.0 {
            continue;
        }
        let x = particle.x as u16;
        let y = particle.y as u16;
        if x >= area.width || y >= area.height {
            continue;
        }

        let color = colors[particle.color_index % colors.len()];
        let style = if particle.is_letter() {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if particle.age / particle.max_age < 0.6 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&particle.symbol.to_string());
            cell.set_style(style);
        }
    }
}
