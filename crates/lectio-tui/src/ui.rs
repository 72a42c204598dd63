use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use lectio_core::{Reference, Tab};

use crate::app::{App, InputMode};
use crate::layout::{LayoutLine, LineKind};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: tabs, reference input, reading pane, footer
    let [tabs_area, input_area, content_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_tabs(app, frame, tabs_area);
    render_input(app, frame, input_area);
    render_content(app, frame, content_area);
    render_footer(app, frame, footer_area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let active = app.reader.tabs().active_id();
    let dots = ".".repeat(app.animation_frame as usize + 1);

    let mut spans = vec![Span::styled(" Lectio ", Style::default().fg(Color::Cyan).bold())];
    for tab in app.reader.tabs().iter() {
        let label = if tab.loading {
            format!(" {}{:<3} ", tab.title, dots)
        } else {
            format!(" {} ", tab.title)
        };
        let style = if &tab.id == active {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(label, style));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input = &app.reader.active_tab().search_input;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(" Reference ");
    let paragraph = Paragraph::new(input.as_str()).block(block);
    frame.render_widget(paragraph, area);

    if editing {
        let x = area.x + 1 + input.chars().count() as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_content(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.reader.active_tab().title));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Leave a one column margin on each side of the text
    let text_area = Rect {
        x: inner.x + 1,
        width: inner.width.saturating_sub(2),
        ..inner
    };
    app.relayout(text_area.width, text_area.height);

    let tab = app.reader.active_tab();
    if tab.store.is_empty() {
        let message = match (&tab.error, tab.loading) {
            (_, true) => Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
            (Some(error), false) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
            (None, false) => Line::from(Span::styled(
                "Press / to enter a reference",
                Style::default().fg(Color::DarkGray),
            )),
        };
        frame.render_widget(Paragraph::new(message).alignment(Alignment::Center), text_area);
        return;
    }

    let lines: Vec<Line> = app
        .layout
        .lines()
        .iter()
        .skip(app.scroll)
        .take(text_area.height as usize)
        .map(|line| styled_line(line, tab))
        .collect();

    frame.render_widget(Paragraph::new(lines), text_area);
}

fn is_highlighted(highlight: Option<&Reference>, kind: &LineKind) -> bool {
    match (highlight, kind) {
        (Some(reference), LineKind::Verse { key, .. }) => {
            reference.covers(&key.book, key.chapter, key.verse)
        }
        _ => false,
    }
}

fn styled_line(line: &LayoutLine, tab: &Tab) -> Line<'static> {
    match &line.kind {
        LineKind::BookHeading => Line::from(Span::styled(
            line.text.to_uppercase(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        LineKind::ChapterHeading => Line::from(Span::styled(
            line.text.clone(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )),
        LineKind::Verse { number, .. } => {
            let text_style = if is_highlighted(tab.highlight.as_ref(), &line.kind) {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            match number {
                Some(number) => Line::from(vec![
                    Span::styled(
                        format!("{}  ", number),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(line.text.clone(), text_style),
                ]),
                None => Line::from(Span::styled(line.text.clone(), text_style)),
            }
        }
        LineKind::Blank => Line::default(),
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " READ ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style)];

    let tab = app.reader.active_tab();
    match (&tab.error, app.reader.position()) {
        // Errors over existing verses would otherwise go unseen
        (Some(error), _) if !tab.store.is_empty() => {
            spans.push(Span::styled(format!(" {} ", error), Style::default().fg(Color::Red)));
        }
        (_, Some(position)) => {
            let text = match position.verse {
                Some(verse) => format!(" {} {}:{} ", position.book, position.chapter, verse),
                None => format!(" {} {} ", position.book, position.chapter),
            };
            spans.push(Span::styled(text, Style::default().fg(Color::Cyan)));
        }
        _ => {}
    }

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Normal => &[
            ("j/k", "scroll"),
            ("n/p", "chapter"),
            ("/", "reference"),
            ("t", "new tab"),
            ("w", "close"),
            ("Tab", "switch"),
            ("q", "quit"),
        ],
        InputMode::Editing => &[("Enter", "go"), ("Esc", "cancel"), ("^U", "clear")],
    };
    for (key, label) in hints {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
