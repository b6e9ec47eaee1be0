use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use parley_core::{ChatRole, ThemeMode};
use crate::app::{App, InputMode};

/// Colors for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub user: Color,
    pub assistant: Color,
    pub border: Color,
    pub focus: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Light => Palette {
                background: Color::Reset,
                text: Color::Reset,
                muted: Color::DarkGray,
                user: Color::Blue,
                assistant: Color::Magenta,
                border: Color::Gray,
                focus: Color::Blue,
            },
            ThemeMode::Dark => Palette {
                background: Color::Rgb(15, 17, 23),
                text: Color::Rgb(234, 234, 234),
                muted: Color::Gray,
                user: Color::Cyan,
                assistant: Color::Yellow,
                border: Color::DarkGray,
                focus: Color::Yellow,
            },
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let palette = Palette::for_theme(app.theme);
    let area = frame.area();

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, palette);
    render_chat(app, frame, chat_area, palette);
    render_input(app, frame, input_area, palette);
    render_footer(app, frame, footer_area, palette);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let count = app.chat.messages().len();
    let title = Line::from(vec![
        Span::styled(" parley ", Style::default().fg(palette.user).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        ),
        Span::styled(app.responder_label.clone(), Style::default().fg(palette.muted)),
        Span::styled(
            if count > 0 { format!("  [{} messages]", count) } else { String::new() },
            Style::default().fg(palette.muted),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

pub fn chat_lines(app: &App, palette: Palette) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.chat.messages() {
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", palette.user),
            ChatRole::Assistant => ("AI:", palette.assistant),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));

        if msg.content.is_empty() {
            lines.push(Line::default());
        }
        for line in msg.content.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    if app.awaiting_first_fragment() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: Palette) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(" Chat ");
    let inner = block.inner(area);

    let text = if app.chat.messages().is_empty() && !app.chat.is_pending() {
        Text::from(Span::styled(
            "Ask anything...",
            Style::default().fg(palette.muted),
        ))
    } else {
        Text::from(chat_lines(app, palette))
    };

    // Keep indentation in replies (code blocks)
    let chat = Paragraph::new(text).wrap(Wrap { trim: false });

    // Scroll bounds come from the same wrapping the paragraph renders with
    app.chat_lines = chat.line_count(inner.width).min(u16::MAX as usize) as u16;
    app.chat_height = inner.height;
    if app.follow {
        app.scroll_to_bottom();
    }

    frame.render_widget(chat.block(block).scroll((app.chat_scroll, 0)), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { palette.focus } else { palette.border };
    let title = if app.chat.is_pending() {
        " Waiting for reply... "
    } else {
        " Message (Enter to send) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    // Dim the text while the send control is disabled
    let text_color = if app.chat.is_pending() { palette.muted } else { palette.user };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, palette: Palette) {
    let mode_span = match app.input_mode {
        InputMode::Normal => Span::styled(" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => Span::styled(" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(palette.text);

    let mut spans = vec![mode_span, Span::raw(" ")];
    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[(" Enter ", " send "), (" Esc ", " normal ")],
        InputMode::Normal => &[
            (" i ", " type "),
            (" j/k ", " scroll "),
            (" g/G ", " top/bottom "),
            (" t ", " theme "),
            (" c ", " clear input "),
            (" q ", " quit "),
        ],
    };
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
