use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::shared::InputEvent;

const PAD_ROW_LOW: &str = "zsxdcvgbhnjm";
const PAD_ROW_HIGH: &str = "q2w3er5t6y7u";

// poll the terminal for one key press and turn it into input events for the
// middle; releases and repeats are ignored
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }
    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key).into_iter().collect());
    }
    Ok(vec![])
}

pub fn handle_key(key: KeyEvent) -> Option<InputEvent> {
    // ctrl combos first so ctrl-z is not a pad
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('z') => Some(InputEvent::Undo),
            KeyCode::Char('y') => Some(InputEvent::Redo),
            KeyCode::Char('s') => Some(InputEvent::Save),
            KeyCode::Char('e') => Some(InputEvent::Export),
            KeyCode::Char('n') => Some(InputEvent::NewPattern),
            KeyCode::Char('d') => Some(InputEvent::DeletePattern),
            KeyCode::Char('c') => Some(InputEvent::Quit),
            _ => None,
        };
    }

    let input = match key.code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPress,
        KeyCode::Backspace => InputEvent::Restart,
        KeyCode::F(12) => InputEvent::Panic,
        KeyCode::Char('+') | KeyCode::Char('=') => InputEvent::BpmUp,
        KeyCode::Char('-') => InputEvent::BpmDown,
        KeyCode::Char('\\') => InputEvent::TapTempo,

        KeyCode::Left => InputEvent::CursorLeft,
        KeyCode::Right => InputEvent::CursorRight,
        KeyCode::Up => InputEvent::InstrumentUp,
        KeyCode::Down => InputEvent::InstrumentDown,
        KeyCode::Enter => InputEvent::ToggleStep,
        KeyCode::Char('0') => InputEvent::ToggleMute,
        KeyCode::PageUp => InputEvent::PatternPrev,
        KeyCode::PageDown => InputEvent::PatternNext,

        KeyCode::F(4) => InputEvent::ToggleMetronome,
        KeyCode::F(5) => InputEvent::ToggleSongMode,
        KeyCode::F(6) => InputEvent::ToggleLoop,
        KeyCode::F(7) => InputEvent::TogglePlaysSelected,
        KeyCode::F(8) => InputEvent::ToggleStacked,
        KeyCode::F(9) => InputEvent::ToggleArrangement,
        KeyCode::F(10) => InputEvent::ToggleRecord,
        KeyCode::F(11) => InputEvent::ToggleQuantize,
        KeyCode::Char('[') => InputEvent::ColumnPrev,
        KeyCode::Char(']') => InputEvent::ColumnNext,

        KeyCode::Char(c) => InputEvent::Pad(char_to_pad(c)?),
        _ => return None,
    };
    Some(input)
}

// two piano-style rows, low row first
fn char_to_pad(c: char) -> Option<usize> {
    let c = c.to_ascii_lowercase();
    PAD_ROW_LOW
        .find(c)
        .or_else(|| PAD_ROW_HIGH.find(c).map(|i| i + PAD_ROW_LOW.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Option<InputEvent> {
        handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn pads_follow_the_piano_rows() {
        assert_eq!(press(KeyCode::Char('z')), Some(InputEvent::Pad(0)));
        assert_eq!(press(KeyCode::Char('m')), Some(InputEvent::Pad(11)));
        assert_eq!(press(KeyCode::Char('q')), Some(InputEvent::Pad(12)));
        assert_eq!(press(KeyCode::Char('u')), Some(InputEvent::Pad(23)));
        assert_eq!(press(KeyCode::Char('a')), None);
    }

    #[test]
    fn control_wins_over_pads() {
        let undo = KeyEvent::new(KeyCode::Char('z'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(undo), Some(InputEvent::Undo));
        let save = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(save), Some(InputEvent::Save));
    }

    #[test]
    fn transport_keys() {
        assert_eq!(press(KeyCode::Char(' ')), Some(InputEvent::PlayPress));
        assert_eq!(press(KeyCode::F(12)), Some(InputEvent::Panic));
        assert_eq!(press(KeyCode::Char('\\')), Some(InputEvent::TapTempo));
        assert_eq!(press(KeyCode::Esc), Some(InputEvent::Quit));
    }
}
