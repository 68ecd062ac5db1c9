use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use secmon_core::Command;

pub const KEY_HINTS: &str = "q quit  p pause  +/- refresh  [/] bucket  c clear logs";

pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(Command::TogglePause),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::Faster),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Command::Slower),
        KeyCode::Char('[') => Some(Command::BucketDown),
        KeyCode::Char(']') => Some(Command::BucketUp),
        KeyCode::Char('c') => Some(Command::ClearLogs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_dashboard_keys() {
        assert_eq!(command_for_key(&key(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(command_for_key(&key(KeyCode::Char('p'))), Some(Command::TogglePause));
        assert_eq!(command_for_key(&key(KeyCode::Char('+'))), Some(Command::Faster));
        assert_eq!(command_for_key(&key(KeyCode::Char('-'))), Some(Command::Slower));
        assert_eq!(command_for_key(&key(KeyCode::Char('['))), Some(Command::BucketDown));
        assert_eq!(command_for_key(&key(KeyCode::Char(']'))), Some(Command::BucketUp));
        assert_eq!(command_for_key(&key(KeyCode::Char('c'))), Some(Command::ClearLogs));
        assert_eq!(command_for_key(&key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn ctrl_c_quits_instead_of_clearing() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(command_for_key(&event), Some(Command::Quit));
    }
}
