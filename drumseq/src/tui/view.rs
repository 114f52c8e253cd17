use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph};

use super::grid::draw_pattern_grid;
use super::mode::TuiState;
use crate::shared::{DisplayState, SongMode};

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, tui: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport screen
            Constraint::Length(3), // arrangement
            Constraint::Min(6),    // pattern grid
            Constraint::Length(1), // status line
        ])
        .split(area);

    draw_screen(frame, sections[0], state, tui);
    draw_arrangement(frame, sections[1], state);
    draw_pattern_grid(frame, sections[2], state);
    draw_status(frame, sections[3], state, tui);
}

fn flag(label: &str, on: bool) -> Span<'_> {
    let style = if on {
        Style::default().fg(Color::Black).bg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {label} "), style)
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState, tui: &TuiState) {
    let now = Instant::now();
    let beat = match tui.beat_lit(now) {
        Some(true) => Span::styled(" ● ", Style::default().fg(Color::LightRed)),
        Some(false) => Span::styled(" ● ", Style::default().fg(Color::Yellow)),
        None => Span::raw(" ○ "),
    };
    let transport = if state.playing {
        Span::styled(" PLAY ", Style::default().fg(Color::Black).bg(Color::Green))
    } else {
        Span::styled(" STOP ", Style::default().fg(Color::Gray))
    };
    let mode = match state.mode {
        SongMode::Pattern if state.plays_selected => "pattern",
        SongMode::Pattern => "stacked",
        SongMode::Song => "song",
    };
    let title = format!(" {}{} ", state.song_name, if state.modified { " *" } else { "" });

    let line = Line::from(vec![
        transport,
        beat,
        Span::styled(format!("{:6.1} bpm ", state.bpm), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {mode} ")),
        flag("loop", state.loop_enabled),
        flag("click", state.metronome),
        flag("rec", state.record),
        flag("quant", state.quantize),
        Span::raw(format!("  xruns {}", tui.xruns)),
    ]);
    let block = Block::bordered().title(title);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_arrangement(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut spans = Vec::with_capacity(state.arrangement.len());
    for (column, group) in state.arrangement.iter().enumerate() {
        let cells: Vec<String> = group.iter().map(|p| (p + 1).to_string()).collect();
        let text = format!(" {} ", if cells.is_empty() { String::from("-") } else { cells.join("+") });
        let style = if column == state.pattern_pos {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        spans.push(Span::styled(text, style));
    }
    let stacked: Vec<String> = state.stacked.iter().map(|p| (p + 1).to_string()).collect();
    let title = if stacked.is_empty() {
        String::from(" arrangement ")
    } else {
        format!(" arrangement  (stacked {}) ", stacked.join(","))
    };
    let block = Block::bordered().title(title);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState, tui: &TuiState) {
    if let Some(percent) = tui.export_progress {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Magenta))
            .percent(percent as u16)
            .label(format!("exporting {percent}%"));
        frame.render_widget(gauge, area);
        return;
    }
    let undo = state.undo_label.map(|l| format!("  undo: {l}")).unwrap_or_default();
    let text = if !state.status.is_empty() {
        state.status.clone()
    } else {
        tui.message.clone().unwrap_or_default()
    };
    let line = Line::from(vec![
        Span::styled(text, Style::default().fg(Color::Yellow)),
        Span::styled(undo, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
