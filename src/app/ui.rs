use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{App, Focus, ThemePalette};
use crate::truncate;

const PANEL_PADDING_X: u16 = 1;
const PANEL_PADDING_Y: u16 = 0;
const PANEL_HORIZONTAL_INSET: u16 = 2 + PANEL_PADDING_X * 2;
const PANEL_VERTICAL_INSET: u16 = 2 + PANEL_PADDING_Y * 2;
const SIDEBAR_WIDTH: u16 = 32;
const MAX_INPUT_ROWS: u16 = 6;
const PROMPT_PREFIX: &str = "> ";

/// Screen regions for one frame.
struct Panes {
    sidebar: Option<Rect>,
    transcript: Rect,
    hints: Option<Rect>,
    composer: Rect,
    sub_agent: Option<Rect>,
    status: Rect,
}

fn layout(app: &App, area: Rect) -> Panes {
    let status_h = 1 + PANEL_VERTICAL_INSET;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(status_h)])
        .split(area);
    let (main, status) = (rows[0], rows[1]);

    let mut columns = Vec::new();
    if !app.sidebar_collapsed {
        columns.push(Constraint::Length(SIDEBAR_WIDTH.min(main.width / 3)));
    }
    columns.push(Constraint::Min(20));
    if app.selected_sub_agent.is_some() {
        columns.push(Constraint::Percentage(35));
    }
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(columns)
        .split(main);

    let mut idx = 0usize;
    let sidebar = if app.sidebar_collapsed {
        None
    } else {
        idx += 1;
        Some(cols[0])
    };
    let chat = cols[idx];
    let sub_agent = app.selected_sub_agent.as_ref().map(|_| cols[idx + 1]);

    let composer_width = chat.width.saturating_sub(PANEL_HORIZONTAL_INSET).max(1);
    let input_h = input_height(&app.input, composer_width)
        .min(MAX_INPUT_ROWS)
        .saturating_add(PANEL_VERTICAL_INSET);
    let hints_h = if app.slash_hints().is_empty() {
        0
    } else {
        1 + PANEL_VERTICAL_INSET
    };
    let chat_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(hints_h),
            Constraint::Length(input_h),
        ])
        .split(chat);

    Panes {
        sidebar,
        transcript: chat_rows[0],
        hints: (hints_h > 0).then_some(chat_rows[1]),
        composer: chat_rows[2],
        sub_agent,
        status,
    }
}

/// Inner size of the transcript panel for a frame of the given size.
pub(super) fn transcript_viewport(app: &App, area: Rect) -> (u16, u16) {
    let transcript = layout(app, area).transcript;
    (
        transcript.width.saturating_sub(PANEL_HORIZONTAL_INSET),
        transcript.height.saturating_sub(PANEL_VERTICAL_INSET),
    )
}

pub(super) fn draw(f: &mut Frame, app: &App) {
    let frame_area = f.area();
    let theme = app.theme_palette();

    if app.active_assistant_id().is_none() {
        draw_placeholder(f, app, theme);
        return;
    }

    let panes = layout(app, frame_area);

    if let Some(area) = panes.sidebar {
        draw_sidebar(f, app, theme, area);
    }

    let transcript = Paragraph::new(Text::from(app.cached_transcript_lines().to_vec()))
        .style(theme.panel_surface_style())
        .block(focusable_block(theme, "chat", app.focus == Focus::Transcript))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(transcript, panes.transcript);

    if let Some(area) = panes.hints {
        let hint_panel = Paragraph::new(Text::from(vec![build_hint_line(app, theme)]))
            .style(theme.panel_surface_style())
            .block(panel_block(theme, "suggestions"));
        f.render_widget(hint_panel, area);
    }

    let input = Paragraph::new(Text::from(build_input_lines(app, theme)))
        .style(theme.input_surface_style())
        .block(focusable_block(theme, "compose", app.focus == Focus::Composer))
        .wrap(Wrap { trim: false });
    f.render_widget(input, panes.composer);

    if app.focus == Focus::Composer && app.open_file.is_none() {
        let content_width = panes
            .composer
            .width
            .saturating_sub(PANEL_HORIZONTAL_INSET)
            .max(1);
        let content_height = panes
            .composer
            .height
            .saturating_sub(PANEL_VERTICAL_INSET)
            .max(1);
        let prompt_width = UnicodeWidthStr::width(PROMPT_PREFIX) as u16;
        let (cx, cy) = input_cursor_position(&app.input, app.cursor, content_width, prompt_width);
        let cursor_x =
            panes.composer.x + 1 + PANEL_PADDING_X + cx.min(content_width.saturating_sub(1));
        let cursor_y =
            panes.composer.y + 1 + PANEL_PADDING_Y + cy.min(content_height.saturating_sub(1));
        f.set_cursor_position((cursor_x, cursor_y));
    }

    if let (Some(area), Some(agent)) = (panes.sub_agent, app.selected_sub_agent.as_ref()) {
        let panel = Paragraph::new(Text::from(app.sub_agent_panel_lines(agent)))
            .style(theme.panel_surface_style())
            .block(panel_block(theme, "sub-agent"))
            .wrap(Wrap { trim: false });
        f.render_widget(panel, area);
    }

    draw_status(f, app, theme, panes.status);

    if let Some(path) = app.open_file.as_deref() {
        draw_file_dialog(f, app, theme, path);
    }
}

fn draw_placeholder(f: &mut Frame, app: &App, theme: ThemePalette) {
    let area = centered_rect(60, 30, f.area());
    let mut lines = vec![
        Line::from(Span::styled(app.deployment.name.clone(), theme.title_style())),
        Line::from(""),
    ];
    if app.session.token().is_some() {
        lines.push(Line::from(Span::styled(
            "Loading assistants...",
            theme.secondary_style(),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "No access token. Type /login <token> and press Enter.",
            theme.secondary_style(),
        )));
    }
    lines.push(Line::from(Span::styled(
        truncate(&app.last_status, 80),
        theme.muted_style(),
    )));
    lines.push(Line::from(""));
    lines.extend(build_input_lines(app, theme));

    let panel = Paragraph::new(Text::from(lines))
        .style(theme.panel_surface_style())
        .block(modal_block(theme, &app.deployment.deployment_url))
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(panel, area);
}

fn draw_sidebar(f: &mut Frame, app: &App, theme: ThemePalette, area: Rect) {
    let sub_agents = app.sub_agent_list_lines();
    let sub_agents_h = if sub_agents.is_empty() {
        0
    } else {
        (sub_agents.len() as u16).min(6) + PANEL_VERTICAL_INSET
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Min(3),
            Constraint::Length(sub_agents_h),
        ])
        .split(area);

    let tasks = Paragraph::new(Text::from(app.todo_lines()))
        .style(theme.panel_surface_style())
        .block(panel_block(theme, "tasks"))
        .wrap(Wrap { trim: false });
    f.render_widget(tasks, rows[0]);

    let files = Paragraph::new(Text::from(app.file_lines()))
        .style(theme.panel_surface_style())
        .block(focusable_block(theme, "files", app.focus == Focus::Files));
    f.render_widget(files, rows[1]);

    if sub_agents_h > 0 {
        let panel = Paragraph::new(Text::from(sub_agents))
            .style(theme.panel_surface_style())
            .block(panel_block(theme, "sub-agents"));
        f.render_widget(panel, rows[2]);
    }
}

fn draw_status(f: &mut Frame, app: &App, theme: ThemePalette, area: Rect) {
    let assistant = app.directory.selected_label().unwrap_or("none");
    let thread = app
        .active_thread_id()
        .map(|id| id.chars().take(8).collect::<String>())
        .unwrap_or_else(|| "new".to_string());
    let state = if app.is_running() {
        format!("running {}s", app.running_elapsed_secs())
    } else if app.sync.loading {
        "loading".to_string()
    } else {
        truncate(&app.last_status, 48)
    };
    let status = Paragraph::new(format!(
        "{} | {} | thread {} | {} | Tab focus | Ctrl+N new | Ctrl+B sidebar | Ctrl+C exit",
        app.deployment.name, assistant, thread, state,
    ))
    .style(theme.status_style())
    .block(panel_block(theme, "status"));
    f.render_widget(status, area);
}

fn draw_file_dialog(f: &mut Frame, app: &App, theme: ThemePalette, path: &str) {
    let area = centered_rect(80, 80, f.area());
    let mut lines = app.file_dialog_lines(path);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Esc close", theme.muted_style())));
    let panel = Paragraph::new(Text::from(lines))
        .style(theme.panel_surface_style())
        .block(modal_block(theme, path))
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(panel, area);
}

fn panel_block(theme: ThemePalette, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.panel_border_style())
        .title(Span::styled(format!(" {} ", title), theme.title_style()))
        .padding(Padding::new(
            PANEL_PADDING_X,
            PANEL_PADDING_X,
            PANEL_PADDING_Y,
            PANEL_PADDING_Y,
        ))
        .style(theme.panel_surface_style())
}

fn focusable_block(theme: ThemePalette, title: &str, focused: bool) -> Block<'static> {
    let block = panel_block(theme, title);
    if focused {
        block.border_style(theme.focused_border_style())
    } else {
        block
    }
}

fn modal_block(theme: ThemePalette, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.focused_border_style())
        .title(Span::styled(format!(" {} ", title), theme.title_style()))
        .padding(Padding::new(1, 1, 0, 0))
        .style(theme.panel_surface_style())
}

fn build_input_lines(app: &App, theme: ThemePalette) -> Vec<Line<'static>> {
    let prompt_style = theme.prompt_style();
    if app.input.is_empty() {
        let placeholder = if app.is_running() {
            "Waiting for the agent..."
        } else {
            "Type message. Enter send, Shift+Enter newline, /help"
        };
        return vec![Line::from(vec![
            Span::styled(PROMPT_PREFIX.to_string(), prompt_style),
            Span::styled(placeholder, theme.muted_style()),
        ])];
    }

    let indent = " ".repeat(PROMPT_PREFIX.chars().count());
    app.input
        .split('\n')
        .enumerate()
        .map(|(idx, part)| {
            let prefix = if idx == 0 {
                PROMPT_PREFIX.to_string()
            } else {
                indent.clone()
            };
            Line::from(vec![
                Span::styled(prefix, prompt_style),
                Span::styled(part.to_string(), Style::default().fg(theme.input_text)),
            ])
        })
        .collect()
}

fn build_hint_line(app: &App, theme: ThemePalette) -> Line<'static> {
    let hints = app.slash_hints();
    let mut spans = vec![Span::styled(" commands (Tab complete): ", theme.muted_style())];
    let selected = app.slash_hint_idx.min(hints.len().saturating_sub(1));
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let style = if i == selected {
            theme.selected_style()
        } else {
            theme.muted_style()
        };
        spans.push(Span::styled(hint.to_string(), style));
    }
    Line::from(spans)
}

fn input_height(input: &str, width: u16) -> u16 {
    let prompt_width = UnicodeWidthStr::width(PROMPT_PREFIX) as u16;
    let (_, y) = input_cursor_position(input, input.len(), width, prompt_width);
    y.saturating_add(1)
}

fn input_cursor_position(input: &str, cursor: usize, width: u16, prompt_width: u16) -> (u16, u16) {
    let width = width.max(1) as usize;
    let mut x = prompt_width as usize;
    let mut y = 0usize;
    let mut consumed = 0usize;

    for ch in input.chars() {
        let len = ch.len_utf8();
        if consumed + len > cursor {
            break;
        }
        consumed += len;
        if ch == '\n' {
            x = prompt_width as usize;
            y += 1;
            continue;
        }
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
        if x + ch_width > width {
            x = 0;
            y += 1;
        }
        x += ch_width;
        if x >= width {
            x = 0;
            y += 1;
        }
    }

    (x as u16, y as u16)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
