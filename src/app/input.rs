use super::*;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl App {
    pub(super) fn handle_paste_event(&mut self, raw: &str) {
        let normalized = if raw.contains('\r') {
            raw.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            raw.to_string()
        };
        if normalized.is_empty() {
            return;
        }
        self.focus = Focus::Composer;
        self.insert_str(&normalized);
    }

    pub(super) fn clear_input_buffer(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.slash_hint_idx = 0;
    }

    pub(super) fn slash_hints(&self) -> Vec<&'static str> {
        if !self.input.starts_with('/') || self.input.contains(char::is_whitespace) {
            return Vec::new();
        }
        let query = self.input.trim();
        commands::COMMANDS
            .iter()
            .copied()
            .filter(|cmd| cmd.starts_with(query) && *cmd != query)
            .take(6)
            .collect()
    }

    pub(super) fn apply_selected_slash_hint(&mut self) -> bool {
        let hints = self.slash_hints();
        let idx = self.slash_hint_idx.min(hints.len().saturating_sub(1));
        let Some(selected) = hints.get(idx) else {
            return false;
        };
        self.input = selected.to_string();
        self.cursor = self.input.len();
        self.slash_hint_idx = 0;
        true
    }

    fn sync_slash_hint_idx(&mut self) {
        let len = self.slash_hints().len();
        if self.slash_hint_idx >= len {
            self.slash_hint_idx = len.saturating_sub(1);
        }
    }

    pub(super) fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_pos {
            None => self.history.len().saturating_sub(1),
            Some(i) => i.saturating_sub(1),
        };
        self.history_pos = Some(next);
        self.input = self.history[next].clone();
        self.cursor = self.input.len();
    }

    pub(super) fn history_next(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let Some(i) = self.history_pos else {
            return;
        };
        if i + 1 >= self.history.len() {
            self.history_pos = None;
            self.input.clear();
            self.cursor = 0;
            return;
        }
        let next = i + 1;
        self.history_pos = Some(next);
        self.input = self.history[next].clone();
        self.cursor = self.input.len();
    }

    pub(super) fn insert_char(&mut self, c: char) {
        if self.cursor >= self.input.len() {
            self.input.push(c);
        } else {
            self.input.insert(self.cursor, c);
        }
        self.cursor += c.len_utf8();
    }

    pub(super) fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert_char(c);
        }
        self.sync_slash_hint_idx();
    }

    pub(super) fn backspace(&mut self) {
        if self.cursor == 0 || self.input.is_empty() {
            return;
        }
        if let Some(prev_idx) = self.input[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
        {
            self.input.drain(prev_idx..self.cursor);
            self.cursor = prev_idx;
        }
    }

    pub(super) fn backspace_word(&mut self) {
        while self.cursor > 0 && self.input[..self.cursor].ends_with(' ') {
            self.backspace();
        }
        while self.cursor > 0 && !self.input[..self.cursor].ends_with(' ') {
            self.backspace();
        }
    }

    pub(super) fn delete(&mut self) {
        if self.cursor >= self.input.len() {
            return;
        }
        let Some(ch) = self.input[self.cursor..].chars().next() else {
            return;
        };
        let end = self.cursor + ch.len_utf8();
        self.input.drain(self.cursor..end);
    }

    pub(super) fn move_left(&mut self) {
        if let Some(prev_idx) = self.input[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
        {
            self.cursor = prev_idx;
        }
    }

    pub(super) fn move_right(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub(super) fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Composer => Focus::Transcript,
            Focus::Transcript if self.sidebar_collapsed || self.sync.files.is_empty() => {
                Focus::Composer
            }
            Focus::Transcript => Focus::Files,
            Focus::Files => Focus::Composer,
        };
        self.invalidate_render_cache();
    }

    /// Esc closes the innermost overlay first.
    fn handle_escape(&mut self) {
        if self.open_file.take().is_some() {
            return;
        }
        if self.selected_sub_agent.take().is_some() {
            return;
        }
        if self.focus != Focus::Composer {
            self.focus = Focus::Composer;
            self.invalidate_render_cache();
        }
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('l') => {
                    self.notices.clear();
                    self.invalidate_render_cache();
                    self.last_status = "cleared".to_string();
                    return;
                }
                KeyCode::Char('n') => {
                    self.new_thread();
                    return;
                }
                KeyCode::Char('b') => {
                    self.toggle_sidebar();
                    return;
                }
                KeyCode::Char('o') => {
                    self.next_assistant();
                    return;
                }
                KeyCode::Char('r') => {
                    self.refresh_thread_state();
                    self.last_status = "refreshing".to_string();
                    return;
                }
                KeyCode::Char('a') => {
                    self.cursor = 0;
                    return;
                }
                KeyCode::Char('e') => {
                    self.cursor = self.input.len();
                    return;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => {
                self.handle_escape();
                return;
            }
            KeyCode::PageUp => {
                self.scroll_up(5);
                return;
            }
            KeyCode::PageDown => {
                self.scroll_down(5);
                return;
            }
            KeyCode::Tab if self.slash_hints().is_empty() || self.focus != Focus::Composer => {
                self.cycle_focus();
                return;
            }
            _ => {}
        }

        // The file dialog is modal.
        if self.open_file.is_some() {
            return;
        }

        match self.focus {
            Focus::Transcript => self.handle_transcript_key(key),
            Focus::Files => self.handle_files_key(key),
            Focus::Composer => self.handle_composer_key(key),
        }
    }

    fn handle_transcript_key(&mut self, key: KeyEvent) {
        let count = self.tool_boxes.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected_tool > 0 {
                    self.selected_tool -= 1;
                    self.invalidate_render_cache();
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_tool + 1 < count {
                    self.selected_tool += 1;
                    self.invalidate_render_cache();
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.toggle_selected_tool();
            }
            KeyCode::Char('s') => {
                if !self.open_selected_sub_agent() {
                    self.last_status = "not a sub-agent call".to_string();
                }
            }
            _ => {}
        }
    }

    fn handle_files_key(&mut self, key: KeyEvent) {
        let count = self.sync.files.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.file_idx = self.file_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.file_idx + 1 < count {
                    self.file_idx += 1;
                }
            }
            KeyCode::Enter => {
                self.open_selected_file();
            }
            _ => {}
        }
    }

    fn handle_composer_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::ALT) && matches!(key.code, KeyCode::Backspace) {
            self.backspace_word();
            return;
        }

        match key.code {
            KeyCode::Up => {
                let hints = self.slash_hints();
                if !hints.is_empty() {
                    self.slash_hint_idx = if self.slash_hint_idx == 0 {
                        hints.len() - 1
                    } else {
                        self.slash_hint_idx - 1
                    };
                    return;
                }
                self.history_prev();
            }
            KeyCode::Down => {
                let hints = self.slash_hints();
                if !hints.is_empty() {
                    self.slash_hint_idx = (self.slash_hint_idx + 1) % hints.len();
                    return;
                }
                self.history_next();
            }
            KeyCode::Tab => {
                self.apply_selected_slash_hint();
            }
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else {
                    self.submit_current_line();
                }
            }
            KeyCode::Backspace => {
                self.backspace();
                self.sync_slash_hint_idx();
            }
            KeyCode::Delete => {
                self.delete();
                self.sync_slash_hint_idx();
            }
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.sync_slash_hint_idx();
            }
            _ => {}
        }
    }
}
