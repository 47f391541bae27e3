//! crossterm key events -> dispatcher key inputs

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use skyrchitect_editor::KeyInput;

/// Translate a terminal key event. Keys the editor has no name for map to `None`.
pub fn to_key_input(event: &KeyEvent) -> Option<KeyInput> {
    let mods = event.modifiers;
    let mut shift = mods.contains(KeyModifiers::SHIFT);

    let key = match event.code {
        KeyCode::Char(c) => {
            // For symbols the shift is already part of the character ('+' not
            // shift+'='); only letters keep it as a modifier.
            if c.is_alphabetic() {
                shift |= c.is_uppercase();
            } else {
                shift = false;
            }
            c.to_string()
        }
        KeyCode::Delete => "Delete".into(),
        KeyCode::Backspace => "Backspace".into(),
        KeyCode::Esc => "Escape".into(),
        KeyCode::Enter => "Enter".into(),
        KeyCode::Tab => "Tab".into(),
        KeyCode::BackTab => {
            shift = true;
            "Tab".into()
        }
        KeyCode::Up => "ArrowUp".into(),
        KeyCode::Down => "ArrowDown".into(),
        KeyCode::Left => "ArrowLeft".into(),
        KeyCode::Right => "ArrowRight".into(),
        KeyCode::Home => "Home".into(),
        KeyCode::End => "End".into(),
        KeyCode::F(n) => format!("F{n}"),
        _ => return None,
    };

    Some(KeyInput {
        key,
        ctrl: mods.contains(KeyModifiers::CONTROL),
        shift,
        alt: mods.contains(KeyModifiers::ALT),
        meta: mods.intersects(KeyModifiers::SUPER | KeyModifiers::META),
    })
}
