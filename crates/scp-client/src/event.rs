//! Terminal input → [`Action`] translation.
//!
//! A single-input-line model: there is no peer list or message pane to
//! route focus between, so every key maps straight onto line editing,
//! scrollback scrolling, or submission. Mouse events are outside this
//! client's command grammar and are ignored.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

use crate::app::Action;

/// Converts a crossterm `Event` into an optional `Action`.
pub fn handle_event(event: &Event) -> Option<Action> {
    match event {
        Event::Key(key_event) => handle_key_event(key_event),
        _ => None,
    }
}

fn handle_key_event(key: &KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    match key.code {
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Backspace => Some(Action::InputBackspace),
        KeyCode::Delete => Some(Action::InputDelete),
        KeyCode::Left => Some(Action::InputLeft),
        KeyCode::Right => Some(Action::InputRight),
        KeyCode::Home => Some(Action::InputHome),
        KeyCode::End => Some(Action::InputEnd),
        KeyCode::PageUp => Some(Action::ScrollUp),
        KeyCode::PageDown => Some(Action::ScrollDown),
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(c) => Some(Action::InputChar(c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn enter_submits() {
        assert!(matches!(handle_event(&key(KeyCode::Enter)), Some(Action::Submit)));
    }

    #[test]
    fn char_is_typed() {
        assert!(matches!(handle_event(&key(KeyCode::Char('x'))), Some(Action::InputChar('x'))));
    }

    #[test]
    fn ctrl_c_quits() {
        let event = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(matches!(handle_event(&event), Some(Action::Quit)));
    }

    #[test]
    fn esc_quits() {
        assert!(matches!(handle_event(&key(KeyCode::Esc)), Some(Action::Quit)));
    }

    #[test]
    fn resize_event_is_ignored() {
        assert!(handle_event(&Event::Resize(80, 24)).is_none());
        // KeyEventKind variants beyond Press still route through the same
        // match arms; this just documents that non-key events return None.
        let _ = KeyEventKind::Press;
    }
}
