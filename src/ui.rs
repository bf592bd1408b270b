use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use sixseven::{
    engine::FeedbackCategory,
    progress::Achievement,
    session::combo_multiplier,
    types::{GameMode, Theme},
};

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const BAR_WIDTH: usize = 12;

// 3x5 block font, each cell drawn two columns wide
const GLYPHS: [[&str; 5]; 10] = [
    ["###", "# #", "# #", "# #", "###"],
    [" # ", "## ", " # ", " # ", "###"],
    ["###", "  #", "###", "#  ", "###"],
    ["###", "  #", "###", "  #", "###"],
    ["# #", "# #", "###", "  #", "  #"],
    ["###", "#  ", "###", "  #", "###"],
    ["###", "#  ", "###", "# #", "###"],
    ["###", "  #", "  #", "  #", "  #"],
    ["###", "# #", "###", "# #", "###"],
    ["###", "# #", "###", "  #", "###"],
];

fn glyph_lines(digit: u8) -> Vec<String> {
    GLYPHS[usize::from(digit % 10)]
        .iter()
        .map(|row| {
            row.chars()
                .map(|c| if c == '#' { "██" } else { "  " })
                .collect()
        })
        .collect()
}

fn accent(theme: Theme) -> Color {
    match theme {
        Theme::Neon => Color::Cyan,
        Theme::Sunset => Color::Rgb(255, 140, 60),
        Theme::Ocean => Color::Rgb(64, 160, 255),
        Theme::Forest => Color::Green,
        Theme::Golden => Color::Rgb(255, 200, 40),
    }
}

pub fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// One line of the achievement list, shared by the TUI and `--progress`
pub fn achievement_row(achievement: &Achievement) -> String {
    let mark = if achievement.unlocked { "✔" } else { " " };
    let count = if achievement.unlocked {
        "done".to_string()
    } else {
        format!("{}/{}", achievement.progress, achievement.max_progress)
    };
    format!(
        "{mark} {:<20} {} {count}",
        achievement.title,
        progress_bar(achievement.ratio(), BAR_WIDTH)
    )
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Playing => render_playing(self, area, buf),
            Screen::Results => render_results(self, area, buf),
            Screen::Achievements => render_achievements(self, area, buf),
        }
    }
}

fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let hud = app.engine.host();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let accent_style = bold_style.fg(accent(app.settings.theme));
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // score, clock, combo
            Constraint::Min(0),
            Constraint::Length(5), // digit
            Constraint::Length(1),
            Constraint::Length(1), // feedback
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let clock = match app.mode {
        GameMode::Timed => format!("{}s left", hud.clock),
        GameMode::Practice => format!("{}s", hud.clock),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(format!("SCORE {}", hud.score), bold_style),
        Span::raw("    "),
        Span::styled(clock, accent_style),
        Span::raw("    "),
        Span::styled(
            format!("COMBO {} (x{})", hud.combo, combo_multiplier(hud.combo)),
            bold_style,
        ),
    ]))
    .alignment(Alignment::Center);
    header.render(chunks[0], buf);

    if let Some(stimulus) = hud.stimulus {
        let digit = Paragraph::new(
            glyph_lines(stimulus.value)
                .into_iter()
                .map(|row| Line::from(Span::styled(row, accent_style)))
                .collect::<Vec<_>>(),
        )
        .alignment(Alignment::Center);
        digit.render(chunks[2], buf);
    }

    if let Some(feedback) = &hud.feedback {
        let color = match feedback.category {
            FeedbackCategory::Hit => Color::Green,
            FeedbackCategory::Miss => Color::Red,
            FeedbackCategory::Missed => Color::Yellow,
        };
        Paragraph::new(Span::styled(feedback.text.as_str(), bold_style.fg(color)))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }

    let legend = Paragraph::new(Span::styled(
        "(space) tap on 6 or 7 / (p)ause / (esc) end",
        dim_style.add_modifier(Modifier::ITALIC),
    ));
    legend.render(chunks[6], buf);

    if app.engine.is_paused() {
        render_pause_overlay(area, buf);
    }
}

fn render_pause_overlay(area: Rect, buf: &mut Buffer) {
    let width = 28.min(area.width);
    let height = 3.min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    Clear.render(popup, buf);
    Paragraph::new(Span::styled(
        "PAUSED - (p) to resume",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center)
    .render(popup, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let (Some(stats), Some(report)) = (&app.last_stats, &app.report) else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let accent_style = bold_style.fg(accent(app.settings.theme));
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let title = match stats.mode {
        GameMode::Timed => "TIME'S UP!",
        GameMode::Practice => "PRACTICE OVER",
    };
    let mut lines = vec![
        Line::from(Span::styled(title, accent_style)),
        Line::default(),
        Line::from(Span::styled(format!("{} points", stats.score), bold_style)),
    ];

    lines.push(if report.new_high_score {
        Line::from(Span::styled(
            "NEW HIGH SCORE!",
            bold_style.fg(Color::Yellow),
        ))
    } else if stats.mode == GameMode::Timed {
        Line::from(format!("best {}", report.high_score))
    } else {
        Line::from(Span::styled(
            "practice runs do not count toward the high score",
            italic_style,
        ))
    });
    lines.push(Line::default());
    lines.push(Line::from(format!(
        "{} hits   {} misses   {}% acc   {} best combo",
        stats.hits,
        stats.misses,
        stats.accuracy_percent(),
        stats.max_combo
    )));
    lines.push(Line::from(vec![
        Span::styled(
            format!("+{} coins", report.outcome.coins_earned),
            bold_style.fg(Color::Yellow),
        ),
        Span::raw(format!(
            "   balance {}   streak {} days",
            report.outcome.progress.coins, report.outcome.progress.daily_streak
        )),
    ]));

    if !report.outcome.newly_unlocked.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Unlocked", accent_style)));
        for achievement in &report.outcome.newly_unlocked {
            lines.push(Line::from(format!(
                "{} {} - {}",
                achievement.icon, achievement.title, achievement.description
            )));
        }
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        "(r)estart / (a)chievements / (esc)ape",
        italic_style,
    ))
    .render(chunks[1], buf);
}

fn render_achievements(app: &App, area: Rect, buf: &mut Buffer) {
    let progress = &app.progress;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let accent_color = accent(app.settings.theme);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!(
            "{}/{} achievements   best {}   {} coins",
            progress.unlocked_count(),
            progress.achievements.len(),
            app.high_score,
            progress.coins
        ),
        bold_style,
    ))
    .render(chunks[0], buf);

    let rows = progress
        .achievements
        .iter()
        .map(|achievement| {
            let style = if achievement.unlocked {
                Style::default().fg(accent_color)
            } else {
                Style::default().add_modifier(Modifier::DIM)
            };
            Line::from(Span::styled(achievement_row(achievement), style))
        })
        .collect::<Vec<_>>();
    Paragraph::new(rows).render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(b)ack / (r)estart / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}
