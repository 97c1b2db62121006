use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use spellathon::{
    attempt::{Attempt, Feedback, RecordedAttempt},
    rewards,
    session::SessionMode,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const LOW_TIME_SECS: u32 = 10;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn mode_label(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Practice => "Practice",
        SessionMode::Test => "Test",
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1), // header
                    Constraint::Length(1), // notice
                    Constraint::Min(1),
                    Constraint::Length(1), // key hints
                ]
                .as_ref(),
            )
            .split(area);

        let header = Line::from(vec![
            Span::styled("Spellathon", bold().fg(Color::Magenta)),
            Span::raw(format!(
                "  ·  {}  ·  Grade {}  ·  ",
                self.profile.name, self.profile.grade
            )),
            Span::styled(format!("💎 {}", self.profile.gems), bold().fg(Color::Cyan)),
        ]);
        Paragraph::new(header)
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        if let Some(notice) = &self.notice {
            Paragraph::new(Span::styled(
                notice.as_str(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        }

        let (body, hints) = match (self.state, &self.attempt, &self.recorded) {
            (AppState::Session, Some(attempt), _) => (
                session_lines(attempt),
                "Enter submit · Backspace erase · Esc leave set",
            ),
            (AppState::Summary, Some(attempt), Some(recorded)) => (
                summary_lines(attempt, recorded),
                "r retry · Enter back to sets · q quit",
            ),
            _ => (menu_lines(self), "↑/↓ move · Enter choose · Esc back · q quit"),
        };

        Paragraph::new(body)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        Paragraph::new(Span::styled(hints, dim().add_modifier(Modifier::ITALIC)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

fn menu_lines(app: &App) -> Vec<Line<'static>> {
    let title = match (app.state, app.subject.as_deref()) {
        (AppState::Modes, Some(subject)) => format!("{subject}: choose a mode"),
        (AppState::Sets, Some(subject)) => {
            format!("{subject} · {}: choose a set", mode_label(app.mode))
        }
        _ => "Choose a subject".to_string(),
    };

    let mut lines = vec![Line::from(Span::styled(title, bold())), Line::default()];
    lines.extend(app.menu_items().into_iter().enumerate().map(|(idx, item)| {
        if idx == app.selected {
            Line::from(Span::styled(format!("› {item}"), bold().fg(Color::Green)))
        } else {
            Line::from(Span::styled(format!("  {item}"), dim()))
        }
    }));
    lines
}

fn session_lines(attempt: &Attempt) -> Vec<Line<'static>> {
    let session = attempt.session();
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "{} · Set {} · {}",
                attempt.subject(),
                attempt.set_id() + 1,
                mode_label(session.mode())
            ),
            dim(),
        )),
        Line::from(Span::styled(
            format!(
                "Question {}/{}",
                session.cursor() + 1,
                session.words().len()
            ),
            bold(),
        )),
    ];

    if let Some(remaining) = session.remaining_seconds() {
        let style = if remaining <= LOW_TIME_SECS {
            bold().fg(Color::Red)
        } else {
            bold().fg(Color::Yellow)
        };
        lines.push(Line::from(Span::styled(format!("⏱ {remaining}s"), style)));
    }
    lines.push(Line::default());

    let Ok(entry) = session.current() else {
        return lines;
    };

    lines.push(Line::from(Span::styled(
        entry.word.clone(),
        bold().fg(Color::Magenta),
    )));
    lines.push(Line::from(vec![
        Span::styled("Meaning: ", dim()),
        Span::raw(entry.meaning.clone()),
    ]));
    if !entry.ipa.is_empty() {
        lines.push(Line::from(Span::styled(entry.ipa.clone(), dim())));
    }
    lines.push(Line::default());

    let input = attempt.input();
    let slots = entry.word.width().max(input.width() + 1);
    lines.push(Line::from(vec![
        Span::styled(input.to_string(), bold()),
        Span::styled("_".repeat(slots - input.width()), dim()),
    ]));

    if let Some(feedback) = attempt.feedback() {
        lines.push(Line::default());
        lines.push(feedback_line(feedback));
    }
    lines
}

fn feedback_line(feedback: &Feedback) -> Line<'static> {
    let style = match feedback {
        Feedback::Correct => bold().fg(Color::Green),
        Feedback::Incorrect { .. } | Feedback::TimedOut { .. } => bold().fg(Color::Red),
    };
    Line::from(Span::styled(feedback.message(), style))
}

fn summary_lines(attempt: &Attempt, recorded: &RecordedAttempt) -> Vec<Line<'static>> {
    let summary = &recorded.summary;
    let mut lines = vec![
        Line::from(Span::styled("Session complete!", bold().fg(Color::Green))),
        Line::from(Span::styled(
            format!(
                "{} · Set {} · {}",
                attempt.subject(),
                attempt.set_id() + 1,
                mode_label(summary.mode)
            ),
            dim(),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "Correct: {}/{}",
                summary.correct_answers, summary.total_questions
            ),
            bold(),
        )),
        Line::from(Span::styled(
            format!("Gems Earned: +{}", summary.gems_earned),
            bold().fg(Color::Cyan),
        )),
        Line::from(Span::styled(
            format!("Time taken: {}s", summary.time_taken_secs),
            dim(),
        )),
    ];

    if !summary.error_details.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Words to review", bold().fg(Color::Red))));
        for err in &summary.error_details {
            lines.push(Line::from(format!(
                "Q{}: \"{}\" → You wrote: \"{}\"",
                err.question_num, err.word, err.user_answer
            )));
        }
    }

    lines.push(Line::default());
    match (recorded.balance, &recorded.persist_error) {
        (Some(balance), _) => {
            lines.push(Line::from(format!("Gem balance: {balance}")));
            if rewards::can_claim(balance) {
                lines.push(Line::from(Span::styled(
                    "🎁 You can claim a reward! Run `spellathon claim` after this session.",
                    bold().fg(Color::Yellow),
                )));
            }
        }
        (None, Some(err)) => lines.push(Line::from(Span::styled(
            format!("Could not save this attempt: {err}"),
            Style::default().fg(Color::Red),
        ))),
        (None, None) => {}
    }
    lines
}
