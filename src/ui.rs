use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::api::Grant;
use crate::app::App;
use crate::controller::Focus;
use crate::markup::{self, Segment};
use crate::state::{ChatMessage, MessageFormat, Sender};

const CARD_INDENT: &str = "  ";

fn segments_to_line(segments: Vec<Segment>) -> Line<'static> {
    if segments.is_empty() {
        return Line::default();
    }
    Line::from(
        segments
            .into_iter()
            .map(|seg| {
                if seg.bold {
                    Span::styled(seg.text, Style::default().add_modifier(Modifier::BOLD))
                } else {
                    Span::raw(seg.text)
                }
            })
            .collect::<Vec<_>>(),
    )
}

/// Lines for one grant card. Missing eligibility or link drop only their own
/// line.
pub fn grant_card_lines(grant: &Grant, selected: bool) -> Vec<Line<'static>> {
    let bar_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };
    let bar = if selected { "▶ " } else { "│ " };
    let prefix = || vec![Span::raw(CARD_INDENT), Span::styled(bar, bar_style)];

    let mut lines = Vec::new();

    let mut title = prefix();
    title.push(Span::styled(
        grant.title.clone(),
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    ));
    lines.push(Line::from(title));

    let mut description = prefix();
    description.push(Span::raw(grant.description.clone()));
    lines.push(Line::from(description));

    let mut details = prefix();
    details.extend([
        Span::styled(format!("💰 {}", grant.amount), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("📅 Deadline: {}", grant.deadline), Style::default().fg(Color::Red)),
        Span::raw("  "),
        Span::styled(format!("🏷️ {}", grant.category), Style::default().fg(Color::Magenta)),
    ]);
    lines.push(Line::from(details));

    if let Some(eligibility) = &grant.eligibility {
        let mut line = prefix();
        line.push(Span::styled("Eligibility:", Style::default().add_modifier(Modifier::BOLD)));
        line.push(Span::raw(format!(" {}", eligibility)));
        lines.push(Line::from(line));
    }

    if let Some(link) = &grant.link {
        let mut line = prefix();
        line.push(Span::styled(
            "Learn More →",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ));
        line.push(Span::styled(
            format!(" {}", link),
            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        ));
        lines.push(Line::from(line));
    }

    lines
}

/// Lines for a message and its cards. `first_card` is the index of this
/// message's first grant among all cards, for highlighting the selection.
pub fn message_lines(
    msg: &ChatMessage,
    first_card: usize,
    selected_card: Option<usize>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    push_message_lines(msg, first_card, selected_card, &mut lines, &mut Vec::new());
    lines
}

/// Append a message's lines, recording each card as (first line, line count).
fn push_message_lines(
    msg: &ChatMessage,
    first_card: usize,
    selected_card: Option<usize>,
    lines: &mut Vec<Line<'static>>,
    cards: &mut Vec<(usize, usize)>,
) {
    match msg.sender {
        Sender::User => lines.push(Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))),
        Sender::Bot => lines.push(Line::from(Span::styled(
            "Bot:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))),
    }

    let text_lines = match msg.format {
        MessageFormat::Help => markup::help_lines(&msg.text),
        MessageFormat::Plain => markup::plain_lines(&msg.text),
    };
    lines.extend(text_lines.into_iter().map(segments_to_line));

    for (i, grant) in msg.grants.iter().enumerate() {
        lines.push(Line::default());
        let selected = selected_card == Some(first_card + i);
        let card = grant_card_lines(grant, selected);
        cards.push((lines.len(), card.len()));
        lines.extend(card);
    }

    lines.push(Line::default());
}

/// Flatten styled lines to text for non-interactive output.
pub fn lines_to_plain(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows a line occupies once word-wrapped to `width` columns, measured with
/// the same wrapping the transcript paragraph renders with.
fn wrapped_height(line: &Line<'_>, width: u16) -> u16 {
    let rows = Paragraph::new(line.clone())
        .wrap(Wrap { trim: false })
        .line_count(width);
    u16::try_from(rows.max(1)).unwrap_or(u16::MAX)
}

/// The slice of the input that fits in `width` columns with the cursor on
/// screen, and the cursor's column within it. Widths are display columns, so
/// wide characters take two.
fn input_viewport(text: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let columns = |c: &char| c.width().unwrap_or(0);

    // The cursor cell itself needs a free column
    let mut start = 0;
    let mut before: usize = chars[..cursor].iter().map(columns).sum();
    while before >= width && start < cursor {
        before -= columns(&chars[start]);
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = columns(c);
        if used + w > width {
            break;
        }
        used += w;
        visible.push(*c);
    }

    (visible, u16::try_from(before).unwrap_or(u16::MAX))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let tray_height = if app.chat.suggestions.visible { 3 } else { 0 };

    // Main layout: header, transcript, suggestions, input, footer
    let [header_area, transcript_area, tray_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(tray_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, transcript_area);
    if tray_height > 0 {
        render_suggestions(app, frame, tray_area);
        app.suggestions_area = Some(tray_area);
    } else {
        app.suggestions_area = None;
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Grant Finder ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.api_base_url), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);

    let focused = app.chat.focus() == Focus::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let transcript = app.chat.transcript();
    let mut cards: Vec<(usize, usize)> = Vec::new();
    let text = if transcript.is_empty() && !app.chat.is_loading() {
        Text::from(vec![
            Line::from(Span::styled(
                "Hi! I can help you find grants and funding opportunities.",
                Style::default().fg(Color::Gray),
            )),
            Line::from(Span::styled(
                "Pick a suggestion below or type what you are looking for.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
    } else {
        let mut lines: Vec<Line> = Vec::new();
        let mut first_card = 0;

        for msg in transcript.messages() {
            push_message_lines(msg, first_card, app.selected_card, &mut lines, &mut cards);
            first_card += msg.grants.len();
        }

        if app.chat.is_loading() {
            lines.push(Line::from(Span::styled(
                "Bot:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Searching{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Row offset of every line after wrapping; the last entry is the total
    let inner_width = area.width.saturating_sub(2);
    let mut row_of_line = Vec::with_capacity(text.lines.len() + 1);
    let mut rows = 0u16;
    row_of_line.push(rows);
    for line in &text.lines {
        rows = rows.saturating_add(wrapped_height(line, inner_width));
        row_of_line.push(rows);
    }
    app.set_content_height(rows, area.height.saturating_sub(2));
    app.set_card_rows(
        cards
            .iter()
            .map(|&(first, len)| {
                let top = row_of_line[first];
                (top, row_of_line[first + len] - top)
            })
            .collect(),
    );

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.chat.focus() == Focus::Suggestions;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Try ");

    let mut spans = Vec::new();
    for (i, chip) in app.chat.suggestions.chips().iter().enumerate() {
        let style = if focused && i == app.chat.suggestions.selected {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", chip.label), style));
        spans.push(Span::raw(" "));
    }

    let tray = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(tray, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    app.input_area = Some(area);

    let enabled = app.chat.input_enabled();
    let focused = app.chat.focus() == Focus::Input;
    let border_color = if !enabled {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };

    let send_style = if app.chat.send_enabled() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if enabled { " Message " } else { " Waiting for response… " })
        .title(
            Title::from(Line::from(Span::styled(" Enter ⏎ Send ", send_style)))
                .alignment(Alignment::Right),
        );

    // Horizontal scrolling keeps the cursor inside the borders
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) =
        input_viewport(app.chat.input.text(), app.chat.input.cursor(), inner_width);

    let text_style = if enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input = Paragraph::new(visible_text)
        .style(text_style)
        .block(input_block);

    frame.render_widget(input, area);

    if enabled && focused {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.chat.focus() {
        Focus::Input => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
        ],
        Focus::Suggestions => vec![
            Span::styled(" ←/→ ", key_style),
            Span::styled(" pick ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" ask ", label_style),
        ],
        Focus::Transcript => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" grant ", label_style),
            Span::styled(" o ", key_style),
            Span::styled(" open link ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };
    hints.extend([
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
        Span::styled(" Ctrl+C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    if let Some(status) = &app.status {
        hints.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Yellow)));
    }

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
