use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::shared::{DisplayState, GridRow};

const NAME_WIDTH: usize = 12;
const STEPS_PER_BEAT_MARK: usize = 4; // a gap every four cells

// one line per instrument, one cell per grid step of the selected pattern
pub fn draw_pattern_grid(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let title = state
        .pattern_names
        .get(state.selected_pattern)
        .map(|name| format!(" {} ", name))
        .unwrap_or_default();

    let lines: Vec<Line> = if state.rows.is_empty() {
        vec![Line::from(Span::styled(
            "no instruments: put some .wav files in the project folder",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .rows
            .iter()
            .enumerate()
            .map(|(row, r)| grid_line(row, r, state))
            .collect()
    };

    let block = Block::bordered().title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn grid_line<'a>(row: usize, r: &'a GridRow, state: &DisplayState) -> Line<'a> {
    let selected = state.selected_instrument == Some(row);
    let name_style = match (selected, r.muted) {
        (true, _) => Style::default().fg(Color::Black).bg(Color::LightMagenta),
        (false, true) => Style::default().fg(Color::DarkGray),
        (false, false) => Style::default(),
    };
    let mut name: String = r.name.chars().take(NAME_WIDTH).collect();
    while name.chars().count() < NAME_WIDTH {
        name.push(' ');
    }

    let mut spans = vec![Span::styled(name, name_style), Span::raw(" ")];
    for (step, cell) in r.steps.iter().enumerate() {
        if step > 0 && step % STEPS_PER_BEAT_MARK == 0 {
            spans.push(Span::raw(" "));
        }
        let glyph = match cell {
            Some(v) if *v >= 0.66 => "█",
            Some(v) if *v >= 0.33 => "▓",
            Some(_) => "░",
            None => "·",
        };
        let mut style = if r.muted {
            Style::default().fg(Color::DarkGray)
        } else if cell.is_some() {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(Color::Gray)
        };
        if state.playhead == Some(step) {
            style = style.bg(Color::DarkGray);
        }
        if selected && state.cursor == step {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(glyph, style));
    }
    Line::from(spans)
}
