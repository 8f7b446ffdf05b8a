use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::text::Span;
use crate::app::App;
use crate::controller::Focus;
use crate::tui::AppEvent;

const PAGE: u16 = 10;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }

    // Every event doubles as a chance to pick up a finished search
    app.poll_response().await;
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Tab => {
            app.chat.cycle_focus();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(PAGE);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(PAGE);
            return;
        }
        _ => {}
    }

    match app.chat.focus() {
        Focus::Input => handle_input_key(app, key),
        Focus::Suggestions => handle_suggestions_key(app, key),
        Focus::Transcript => handle_transcript_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.chat.set_focus(Focus::Transcript);
        return;
    }

    // The input box is read-only while a search is running
    if !app.chat.input_enabled() {
        return;
    }

    let input = &mut app.chat.input;
    match key.code {
        KeyCode::Enter => {
            app.submit();
            return;
        }
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.insert(c),
        _ => return,
    }
    app.chat.on_input_changed();
}

fn handle_suggestions_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => app.chat.suggestions.prev(),
        KeyCode::Right | KeyCode::Char('l') => app.chat.suggestions.next(),
        KeyCode::Enter | KeyCode::Char(' ') => {
            let selected = app.chat.suggestions.selected;
            app.choose_suggestion(selected);
        }
        KeyCode::Esc => app.chat.focus_input(),
        _ => {}
    }
}

fn handle_transcript_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.select_next_card(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_card(),
        KeyCode::Char('o') | KeyCode::Enter => app.open_selected_link(),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_up(u16::MAX),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Esc | KeyCode::Char('i') => app.chat.focus_input(),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.chat.focus() != Focus::Input || !app.chat.input_enabled() {
        return;
    }
    // Single-line input: newlines in pasted text become spaces
    for c in text.chars() {
        app.chat.input.insert(if c == '\n' || c == '\r' { ' ' } else { c });
    }
    app.chat.on_input_changed();
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Which suggestion chip sits at column `x` of the tray.
fn chip_at(app: &App, area: Rect, x: u16) -> Option<usize> {
    let mut start = area.x + 1; // left border
    for (i, chip) in app.chat.suggestions.chips().iter().enumerate() {
        let width = Span::raw(format!(" {} ", chip.label)).width() as u16;
        if x >= start && x < start + width {
            return Some(i);
        }
        start += width + 1;
    }
    None
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_transcript = app.transcript_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_input = app.input_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let tray = app.suggestions_area.filter(|r| point_in_rect(x, y, *r));

    match mouse.kind {
        MouseEventKind::ScrollDown if in_transcript => app.scroll_down(3),
        MouseEventKind::ScrollUp if in_transcript => app.scroll_up(3),
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(area) = tray {
                if let Some(index) = chip_at(app, area, x) {
                    app.choose_suggestion(index);
                }
            } else if in_input {
                app.chat.focus_input();
            } else if in_transcript {
                app.chat.set_focus(Focus::Transcript);
            }
        }
        _ => {}
    }
}
