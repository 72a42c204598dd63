use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use lectio_core::Direction;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

const WHEEL_LINES: usize = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::SearchLoaded(request, result) => app.finish_search(request, result),
        AppEvent::PrefetchLoaded(request, verses) => app.finish_prefetch(request, verses),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Scrolling
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.content_height as usize),
        KeyCode::PageUp => app.scroll_up(app.content_height as usize),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),

        // Chapters
        KeyCode::Char('n') | KeyCode::Right => app.step_chapter(Direction::Forward),
        KeyCode::Char('p') | KeyCode::Left => app.step_chapter(Direction::Backward),

        // Tabs
        KeyCode::Char('t') => app.new_tab(),
        KeyCode::Char('w') => app.close_tab(),
        KeyCode::Tab => app.cycle_tab(1),
        KeyCode::BackTab => app.cycle_tab(-1),

        // Reference input
        KeyCode::Char('/') => {
            app.clear_input();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Enter => app.search(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            app.search();
        }
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.clear_input(),
        KeyCode::Char(c) => app.input_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Scrolling would move the position and overwrite the text being typed
    if app.input_mode == InputMode::Editing {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}
