use super::*;
use serde_json::Value;
use unicode_width::UnicodeWidthChar;

use super::messages::{ChatMessage, ChatRole};
use super::tool_call::{DetailSection, ToolStatus};

const ASSISTANT_DIVIDER: &str = "\u{2502}";
const LABEL_MAX_WIDTH: usize = 14;
pub(super) const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn truncate_display_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > max_width {
            break;
        }
        out.push(ch);
        used += cw;
    }
    out
}

fn push_system_lines(lines: &mut Vec<Line<'static>>, text: &str, style: Style) {
    let mut parts = text.split('\n');
    let first = parts.next().unwrap_or_default();
    let first_content = if first.is_empty() { " " } else { first };
    lines.push(Line::from(vec![Span::styled(
        format!("[sys] {first_content}"),
        style,
    )]));

    for part in parts {
        let content = if part.is_empty() { " " } else { part };
        lines.push(Line::from(vec![Span::styled(
            format!("      {content}"),
            style,
        )]));
    }
}

fn push_user_lines(lines: &mut Vec<Line<'static>>, text: &str, width: u16, palette: ThemePalette) {
    let w = width as usize;
    let user_style = Style::default()
        .fg(palette.user_fg)
        .bg(palette.user_bg)
        .add_modifier(Modifier::BOLD);
    for part in text.split('\n') {
        let content = if part.is_empty() { " " } else { part };
        let mut text = format!(" {} ", content);
        let text_w = UnicodeWidthStr::width(text.as_str());
        if text_w < w {
            text.push_str(&" ".repeat(w - text_w));
        }
        lines.push(Line::from(vec![Span::styled(text, user_style)]));
    }
}

/// Fixed-width label column shared by assistant text and tool rows.
struct LabelColumn {
    first: String,
    rest: String,
    style: Style,
    width: usize,
}

impl LabelColumn {
    fn new(label: &str, style: Style) -> Self {
        let label = truncate_display_width(label, LABEL_MAX_WIDTH);
        let label_w = UnicodeWidthStr::width(label.as_str());
        Self {
            first: format!("{label} {ASSISTANT_DIVIDER}"),
            rest: format!("{}{ASSISTANT_DIVIDER}", " ".repeat(label_w + 1)),
            style,
            width: label_w + 3,
        }
    }

    fn prefix(&self, first: bool) -> Vec<Span<'static>> {
        let text = if first { &self.first } else { &self.rest };
        vec![Span::styled(text.clone(), self.style), Span::raw(" ")]
    }

    fn content_width(&self, width: u16) -> usize {
        (width as usize).saturating_sub(self.width)
    }
}

impl App {
    /// Builds every transcript line for the given viewport width.
    pub(super) fn render_transcript_lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::<Line>::new();
        let palette = self.theme_palette();

        if self.active_thread_id().is_none() && self.sync.messages.is_empty() {
            self.push_banner_lines(&mut lines);
        }

        let label = LabelColumn::new(
            self.directory.selected_label().unwrap_or("agent"),
            Style::default()
                .fg(palette.assistant_label)
                .add_modifier(Modifier::BOLD),
        );
        let selected_key = if self.focus == Focus::Transcript {
            self.selected_tool_key()
        } else {
            None
        };

        for message in &self.sync.messages {
            match message.role {
                ChatRole::User => push_user_lines(&mut lines, &message.text, width, palette),
                ChatRole::System => {
                    push_system_lines(&mut lines, &message.text, palette.secondary_style())
                }
                ChatRole::Assistant => {
                    self.push_assistant_lines(&mut lines, message, &label, width, selected_key.as_deref());
                }
            }
            lines.push(Line::from(""));
        }

        for entry in &self.notices {
            match entry.kind {
                EntryKind::User => push_user_lines(&mut lines, &entry.text, width, palette),
                EntryKind::System => {
                    push_system_lines(&mut lines, &entry.text, palette.secondary_style())
                }
                EntryKind::Error => {
                    lines.push(Line::from(vec![
                        Span::styled(
                            "[error] ",
                            palette.error_style().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(entry.text.clone(), palette.error_style()),
                    ]));
                }
            }
            lines.push(Line::from(""));
        }

        let active_run = self
            .run
            .as_ref()
            .filter(|run| self.active_assistant_id() == Some(run.assistant_id.as_str()));
        if let Some(run) = active_run {
            push_user_lines(&mut lines, &run.prompt, width, palette);
            let frame = SPINNER[self.spinner_idx % SPINNER.len()];
            let mut spans = label.prefix(true);
            spans.push(Span::styled(
                format!("{frame} working... {}s", self.running_elapsed_secs()),
                Style::default().fg(palette.in_progress),
            ));
            lines.push(Line::from(spans));
        }

        lines
    }

    fn push_banner_lines(&self, lines: &mut Vec<Line<'static>>) {
        let palette = self.theme_palette();
        let border_style = palette.panel_border_style();
        let rows = [
            (format!(" {}", self.deployment.name), palette.title_style()),
            (
                format!(
                    " assistant: {}",
                    self.directory.selected_label().unwrap_or("none")
                ),
                palette.secondary_style(),
            ),
            (
                format!(" {}", self.deployment.deployment_url),
                palette.secondary_style(),
            ),
            (
                " type a message to start a thread, /help for commands".to_string(),
                palette.muted_style(),
            ),
        ];
        let inner = rows
            .iter()
            .map(|(text, _)| UnicodeWidthStr::width(text.as_str()))
            .max()
            .unwrap_or(0)
            + 2;
        lines.push(Line::from(Span::styled(
            format!("┌{}┐", "─".repeat(inner)),
            border_style,
        )));
        for (text, style) in rows {
            let pad = inner.saturating_sub(UnicodeWidthStr::width(text.as_str()) + 1);
            lines.push(Line::from(vec![
                Span::styled("│".to_string(), border_style),
                Span::styled(format!("{text}{}", " ".repeat(pad)), style),
                Span::styled(" │".to_string(), border_style),
            ]));
        }
        lines.push(Line::from(Span::styled(
            format!("└{}┘", "─".repeat(inner)),
            border_style,
        )));
        lines.push(Line::from(""));
    }

    fn push_assistant_lines(
        &self,
        lines: &mut Vec<Line<'static>>,
        message: &ChatMessage,
        label: &LabelColumn,
        width: u16,
        selected_key: Option<&str>,
    ) {
        let palette = self.theme_palette();
        let content_width = label.content_width(width);
        let mut first = true;

        if !message.text.trim().is_empty() {
            for md_line in render_markdown(&message.text, palette.body_style(), palette) {
                for w_line in wrap_spans(md_line, content_width) {
                    let mut spans = label.prefix(first);
                    first = false;
                    spans.extend(w_line);
                    lines.push(Line::from(spans));
                }
            }
        }

        for (idx, call) in message.tool_calls.iter().enumerate() {
            let key = tool_key(&message.id, idx, call.id.as_deref());
            let Some(row) = self.tool_boxes.get(&key) else {
                continue;
            };
            let selected = selected_key == Some(key.as_str());
            for spans in tool_row_lines(row, selected, palette) {
                let mut prefixed = label.prefix(first);
                first = false;
                prefixed.extend(spans);
                lines.push(Line::from(prefixed));
            }
        }

        if first {
            lines.push(Line::from(label.prefix(true)));
        }
    }

    /// Sidebar task list with a status glyph per todo.
    pub(super) fn todo_lines(&self) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        if self.sync.todos.is_empty() {
            let text = if self.sync.loading { "loading..." } else { "no tasks" };
            return vec![Line::from(Span::styled(text, palette.muted_style()))];
        }
        self.sync
            .todos
            .iter()
            .map(|todo| {
                let (content, status) = match todo {
                    Value::Object(fields) => (
                        fields
                            .get("content")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| todo.to_string()),
                        fields.get("status").and_then(Value::as_str).unwrap_or(""),
                    ),
                    Value::String(text) => (text.clone(), ""),
                    other => (other.to_string(), ""),
                };
                let (glyph, color) = match status {
                    "completed" => ("\u{2714}", palette.success),
                    "in_progress" => ("\u{25d0}", palette.in_progress),
                    _ => ("\u{25cb}", palette.muted_text),
                };
                let text_style = if status == "completed" {
                    palette.muted_style()
                } else {
                    palette.body_style()
                };
                Line::from(vec![
                    Span::styled(format!("{glyph} "), Style::default().fg(color)),
                    Span::styled(content, text_style),
                ])
            })
            .collect()
    }

    pub(super) fn file_lines(&self) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        if self.sync.files.is_empty() {
            return vec![Line::from(Span::styled("no files", palette.muted_style()))];
        }
        let focused = self.focus == Focus::Files;
        self.sync
            .files
            .keys()
            .enumerate()
            .map(|(idx, path)| {
                let style = if focused && idx == self.file_idx {
                    palette.selected_style()
                } else {
                    palette.body_style()
                };
                Line::from(vec![
                    Span::styled("\u{25a4} ", Style::default().fg(palette.secondary)),
                    Span::styled(path.clone(), style),
                ])
            })
            .collect()
    }

    pub(super) fn sub_agent_list_lines(&self) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        messages::sub_agents(&self.sync.messages)
            .into_iter()
            .map(|agent| {
                let glyph = ToolStatus::parse(Some(agent.status.as_str())).glyph();
                Line::from(vec![
                    Span::styled(
                        format!("{} ", glyph.symbol()),
                        Style::default().fg(palette.status_color(glyph)),
                    ),
                    Span::styled(agent.name, palette.body_style()),
                ])
            })
            .collect()
    }

    pub(super) fn sub_agent_panel_lines(&self, agent: &SubAgent) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        let status = ToolStatus::parse(Some(agent.status.as_str()));
        let glyph = status.glyph();
        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("{} ", glyph.symbol()),
                    Style::default().fg(palette.status_color(glyph)),
                ),
                Span::styled(agent.name.clone(), palette.title_style()),
                Span::styled(format!("  {}", status.as_str()), palette.muted_style()),
            ]),
            Line::from(""),
        ];
        push_section_lines(
            &mut lines,
            &DetailSection {
                title: "Input",
                body: agent.input.clone(),
            },
            palette,
        );
        if !agent.output.is_empty() {
            push_section_lines(
                &mut lines,
                &DetailSection {
                    title: "Output",
                    body: agent.output.clone(),
                },
                palette,
            );
        }
        lines
    }

    pub(super) fn file_dialog_lines(&self, path: &str) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        match self.sync.files.get(path) {
            Some(content) if !content.is_empty() => content
                .split('\n')
                .map(|line| Line::from(Span::styled(line.to_string(), palette.code_style())))
                .collect(),
            Some(_) => vec![Line::from(Span::styled("(empty file)", palette.muted_style()))],
            None => vec![Line::from(Span::styled(
                "file no longer present in thread state",
                palette.error_style(),
            ))],
        }
    }
}

/// Header row plus, when expanded, the arguments and result sections.
fn tool_row_lines(row: &ToolCallBox, selected: bool, palette: ThemePalette) -> Vec<Vec<Span<'static>>> {
    let view = row.view();
    let chevron = if !view.has_content() {
        " "
    } else if row.is_expanded() {
        "\u{25be}"
    } else {
        "\u{25b8}"
    };
    let glyph = view.status.glyph();
    let name_style = if selected {
        palette.selected_style()
    } else {
        palette.body_style().add_modifier(Modifier::BOLD)
    };
    let mut header = vec![
        Span::styled(format!("{chevron} "), palette.muted_style()),
        Span::styled(
            format!("{} ", glyph.symbol()),
            Style::default().fg(palette.status_color(glyph)),
        ),
        Span::styled(
            format!("{} ", view.meta.icon.glyph()),
            Style::default().fg(palette.tool_color(view.meta.color)),
        ),
        Span::styled(view.name.clone(), name_style),
    ];
    if !view.preview.is_empty() {
        header.push(Span::styled(format!("  {}", view.preview), palette.muted_style()));
    }

    let mut out = vec![header];
    let mut detail = Vec::new();
    for section in row.visible_sections() {
        push_section_lines(&mut detail, &section, palette);
    }
    out.extend(detail.into_iter().map(|line| {
        let mut spans = vec![Span::raw("    ")];
        spans.extend(line.spans);
        spans
    }));
    out
}

fn push_section_lines(lines: &mut Vec<Line<'static>>, section: &DetailSection, palette: ThemePalette) {
    lines.push(Line::from(Span::styled(
        section.title.to_string(),
        palette.muted_style().add_modifier(Modifier::BOLD),
    )));
    for part in section.body.split('\n') {
        let content = if part.is_empty() { " " } else { part };
        lines.push(Line::from(Span::styled(
            format!(" {content}"),
            palette.code_style(),
        )));
    }
}

/// Splits styled spans into lines that each fit within `max_width` columns.
fn wrap_spans(spans: Vec<Span<'static>>, max_width: usize) -> Vec<Vec<Span<'static>>> {
    if max_width == 0 {
        return vec![spans];
    }
    let mut result: Vec<Vec<Span<'static>>> = Vec::new();
    let mut current_line: Vec<Span<'static>> = Vec::new();
    let mut current_width: usize = 0;

    for span in spans {
        let span_width = UnicodeWidthStr::width(span.content.as_ref());
        if current_width + span_width <= max_width {
            current_width += span_width;
            current_line.push(span);
            continue;
        }
        let style = span.style;
        let text = span.content.into_owned();
        let mut remaining = text.as_str();
        while !remaining.is_empty() {
            let avail = max_width.saturating_sub(current_width);
            let mut split_byte = 0;
            let mut cols = 0usize;
            for (byte_idx, ch) in remaining.char_indices() {
                let w = UnicodeWidthChar::width(ch).unwrap_or(0);
                if cols + w > avail {
                    break;
                }
                cols += w;
                split_byte = byte_idx + ch.len_utf8();
            }
            if split_byte == 0 {
                if current_line.is_empty() {
                    // Wider than a whole line; emit one char to make progress.
                    let Some(ch) = remaining.chars().next() else {
                        break;
                    };
                    split_byte = ch.len_utf8();
                    cols = UnicodeWidthChar::width(ch).unwrap_or(1);
                } else {
                    result.push(std::mem::take(&mut current_line));
                    current_width = 0;
                    continue;
                }
            }
            current_line.push(Span::styled(remaining[..split_byte].to_string(), style));
            current_width += cols;
            remaining = &remaining[split_byte..];
            if !remaining.is_empty() {
                result.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
        }
    }
    if !current_line.is_empty() {
        result.push(current_line);
    }
    if result.is_empty() {
        result.push(Vec::new());
    }
    result
}

/// Render markdown text into styled spans per line.
/// Supports headings, fenced code blocks, bullets and inline code.
fn render_markdown(text: &str, base_style: Style, palette: ThemePalette) -> Vec<Vec<Span<'static>>> {
    let mut result: Vec<Vec<Span<'static>>> = Vec::new();
    let mut in_code_block = false;
    let heading_style = palette.title_style();
    let bold_style = base_style.add_modifier(Modifier::BOLD);

    for line in text.split('\n') {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            result.push(vec![Span::styled("───".to_string(), palette.muted_style())]);
            continue;
        }

        if in_code_block {
            let content = if line.is_empty() { " " } else { line };
            result.push(vec![Span::styled(content.to_string(), palette.code_style())]);
            continue;
        }

        if trimmed.starts_with('#') {
            let heading_text = trimmed.trim_start_matches('#').trim_start();
            result.push(vec![Span::styled(heading_text.to_string(), heading_style)]);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let indent = line.len() - line.trim_start().len();
            let mut spans = Vec::new();
            if indent > 0 {
                spans.push(Span::raw(" ".repeat(indent)));
            }
            spans.push(Span::styled(
                "\u{2022} ".to_string(),
                Style::default().fg(palette.accent),
            ));
            spans.extend(render_inline_markdown(rest, base_style, bold_style, palette.code_style()));
            result.push(spans);
            continue;
        }

        let content = if line.is_empty() { " " } else { line };
        result.push(render_inline_markdown(content, base_style, bold_style, palette.code_style()));
    }

    result
}

/// Inline `code` and **bold** spans.
fn render_inline_markdown(
    text: &str,
    base_style: Style,
    bold_style: Style,
    code_style: Style,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = text;
    while !rest.is_empty() {
        let next_code = rest.find('`');
        let next_bold = rest.find("**");
        let (start, marker, style) = match (next_code, next_bold) {
            (Some(c), Some(b)) if b < c => (b, "**", bold_style),
            (Some(c), _) => (c, "`", code_style),
            (None, Some(b)) => (b, "**", bold_style),
            (None, None) => break,
        };
        let after = &rest[start + marker.len()..];
        let Some(end) = after.find(marker) else {
            // Unterminated markers stay literal.
            plain.push_str(&rest[..start + marker.len()]);
            rest = after;
            continue;
        };
        plain.push_str(&rest[..start]);
        if !plain.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut plain), base_style));
        }
        spans.push(Span::styled(after[..end].to_string(), style));
        rest = &after[end + marker.len()..];
    }
    plain.push_str(rest);
    if !plain.is_empty() {
        spans.push(Span::styled(plain, base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(" ".to_string(), base_style));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(spans: &[Span<'static>]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn wrap_spans_splits_long_text() {
        let wrapped = wrap_spans(vec![Span::raw("abcdefghij")], 4);
        let rows: Vec<String> = wrapped.iter().map(|row| flatten(row)).collect();
        assert_eq!(rows, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn inline_markdown_strips_markers() {
        let spans = render_inline_markdown(
            "run `ls` then **stop** now",
            Style::default(),
            Style::default(),
            Style::default(),
        );
        assert_eq!(flatten(&spans), "run ls then stop now");
    }

    #[test]
    fn unterminated_marker_is_kept_literally() {
        let spans = render_inline_markdown("a `b", Style::default(), Style::default(), Style::default());
        assert_eq!(flatten(&spans), "a `b");
    }

    #[test]
    fn bold_after_unterminated_code_marker_still_renders() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let spans = render_inline_markdown("a `b **c** d", Style::default(), bold, Style::default());
        assert_eq!(flatten(&spans), "a `b c d");
        let bolded: Vec<&str> = spans
            .iter()
            .filter(|s| s.style == bold)
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(bolded, vec!["c"]);
    }

    #[test]
    fn label_column_truncates_long_names() {
        let label = LabelColumn::new("an-extremely-long-assistant-name", Style::default());
        assert!(UnicodeWidthStr::width(label.first.as_str()) <= LABEL_MAX_WIDTH + 2);
        assert_eq!(
            UnicodeWidthStr::width(label.first.as_str()),
            UnicodeWidthStr::width(label.rest.as_str())
        );
    }
}
