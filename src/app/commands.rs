use super::*;

pub(super) const COMMANDS: &[&str] = &[
    "/help",
    "/new",
    "/assistants",
    "/assistant",
    "/refresh",
    "/sidebar",
    "/theme",
    "/login",
    "/logout",
    "/exit",
    "/quit",
];

pub(super) fn help_text() -> String {
    [
        "commands",
        "  /help                    show this help",
        "  /new                     start a new thread for this assistant",
        "  /assistants              list assistants",
        "  /assistant <id|name>     switch assistant",
        "  /refresh                 re-fetch thread state",
        "  /sidebar                 show or hide tasks and files",
        "  /theme [fjord|graphite|ember]",
        "  /login <token>           set access token",
        "  /logout                  clear access token",
        "  /exit, /quit",
        "keys",
        "  Tab focus  Ctrl+N new thread  Ctrl+O next assistant",
        "  Ctrl+B sidebar  Ctrl+R refresh  Esc close",
    ]
    .join("\n")
}

impl App {
    pub(super) fn submit_current_line(&mut self) {
        let line = self.input.trim().to_string();
        if line.is_empty() {
            return;
        }

        // Tokens stay out of history.
        if !line.starts_with("/login") {
            self.history.push(line.clone());
        }
        self.history_pos = None;
        self.clear_input_buffer();

        if line.starts_with('/') {
            self.run_command(&line);
            return;
        }
        self.send_message(line);
    }

    pub(super) fn run_command(&mut self, line: &str) {
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        match name {
            "/exit" | "/quit" => self.should_quit = true,
            "/help" => self.push_notice(EntryKind::System, help_text()),
            "/new" => self.new_thread(),
            "/assistants" => self.list_assistants(),
            "/assistant" => self.handle_assistant_change(rest),
            "/refresh" => {
                self.refresh_thread_state();
                self.last_status = "refreshing".to_string();
            }
            "/sidebar" => self.toggle_sidebar(),
            "/theme" => self.handle_theme_change(rest),
            "/login" => {
                if rest.is_empty() {
                    self.push_notice(EntryKind::Error, "usage: /login <token>");
                    return;
                }
                self.set_session(Session::with_token(rest));
                self.push_notice(EntryKind::System, "access token set");
            }
            "/logout" => {
                self.set_session(Session::default());
                self.push_notice(EntryKind::System, "signed out");
            }
            _ => {
                self.push_notice(EntryKind::Error, format!("unknown command: {name} (try /help)"));
            }
        }
    }

    fn list_assistants(&mut self) {
        if self.directory.assistants.is_empty() {
            self.push_notice(EntryKind::System, "no assistants loaded");
            return;
        }
        let active = self.active_assistant_id().map(str::to_string);
        let lines: Vec<String> = self
            .directory
            .assistants
            .iter()
            .map(|a| {
                let marker = if active.as_deref() == Some(a.id.as_str()) { "*" } else { " " };
                format!("{marker} {}  ({})", a.name, a.id)
            })
            .collect();
        self.push_notice(
            EntryKind::System,
            format!("assistants:\n{}", lines.join("\n")),
        );
    }

    pub(super) fn handle_assistant_change(&mut self, target: &str) {
        if target.is_empty() {
            let label = self.directory.selected_label().unwrap_or("none").to_string();
            self.push_notice(EntryKind::System, format!("assistant: {label}"));
            return;
        }
        let Some(id) = assistants::find_assistant(&self.directory.assistants, target)
            .map(|a| a.id.clone())
        else {
            self.push_notice(EntryKind::Error, format!("no assistant matches {target}"));
            return;
        };
        self.select_assistant(&id);
    }

    pub(super) fn next_assistant(&mut self) {
        let Some(id) = self.directory.next_after_selected().map(|a| a.id.clone()) else {
            return;
        };
        self.select_assistant(&id);
    }

    pub(super) fn handle_theme_change(&mut self, target: &str) {
        if target.is_empty() {
            self.push_notice(
                EntryKind::System,
                format!("theme: {} | options: fjord, graphite, ember", self.theme.as_str()),
            );
            return;
        }
        let Some(theme) = ThemePreset::parse(target) else {
            self.push_notice(EntryKind::Error, "usage: /theme [fjord|graphite|ember]");
            return;
        };
        self.theme = theme;
        self.invalidate_render_cache();
        self.last_status = format!("theme {}", self.theme.as_str());
    }
}
