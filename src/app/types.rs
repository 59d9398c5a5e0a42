use ratatui::style::{Color, Modifier, Style};

use super::assistants::Assistant;
use super::thread_state::FetchTicket;
use super::tool_meta::ToolColor;
use super::tool_call::StatusGlyph;
use crate::client::ThreadState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThemePreset {
    Fjord,
    Graphite,
    Ember,
}

impl ThemePreset {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ThemePreset::Fjord => "fjord",
            ThemePreset::Graphite => "graphite",
            ThemePreset::Ember => "ember",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fjord" | "nord" | "blue" => Some(ThemePreset::Fjord),
            "graphite" | "slate" | "gray" => Some(ThemePreset::Graphite),
            "ember" | "warm" | "copper" => Some(ThemePreset::Ember),
            _ => None,
        }
    }

    pub(crate) fn palette(self) -> ThemePalette {
        match self {
            ThemePreset::Fjord => ThemePalette {
                prompt: Color::Rgb(136, 192, 208),
                input_text: Color::Rgb(216, 222, 233),
                muted_text: Color::Rgb(106, 118, 140),
                highlight_fg: Color::Rgb(236, 239, 244),
                highlight_bg: Color::Rgb(67, 76, 94),
                status_text: Color::Rgb(129, 161, 193),
                user_fg: Color::Rgb(236, 239, 244),
                user_bg: Color::Rgb(46, 52, 64),
                assistant_label: Color::Rgb(136, 192, 208),
                assistant_text: Color::Rgb(216, 222, 233),
                system_text: Color::Rgb(143, 152, 170),
                error_text: Color::Rgb(191, 97, 106),
                success: Color::Rgb(163, 190, 140),
                in_progress: Color::Rgb(235, 203, 139),
                banner_title: Color::Rgb(229, 233, 240),
                panel_bg: Color::Rgb(36, 41, 51),
                panel_fg: Color::Rgb(216, 222, 233),
                code_fg: Color::Rgb(200, 208, 220),
                code_bg: Color::Rgb(30, 34, 42),
                primary: Color::Rgb(129, 161, 193),
                secondary: Color::Rgb(143, 188, 187),
                accent: Color::Rgb(180, 142, 173),
                text_tertiary: Color::Rgb(106, 118, 140),
            },
            ThemePreset::Graphite => ThemePalette {
                prompt: Color::Rgb(100, 150, 200),
                input_text: Color::Rgb(180, 200, 220),
                muted_text: Color::Rgb(80, 100, 120),
                highlight_fg: Color::Rgb(200, 220, 240),
                highlight_bg: Color::Rgb(40, 60, 80),
                status_text: Color::Rgb(90, 110, 130),
                user_fg: Color::Rgb(200, 220, 240),
                user_bg: Color::Rgb(25, 35, 45),
                assistant_label: Color::Rgb(120, 170, 220),
                assistant_text: Color::Rgb(170, 190, 210),
                system_text: Color::Rgb(100, 120, 140),
                error_text: Color::Rgb(230, 120, 120),
                success: Color::Rgb(120, 190, 140),
                in_progress: Color::Rgb(220, 180, 100),
                banner_title: Color::Rgb(150, 170, 190),
                panel_bg: Color::Rgb(10, 20, 30),
                panel_fg: Color::Rgb(170, 190, 210),
                code_fg: Color::Rgb(180, 200, 220),
                code_bg: Color::Rgb(5, 15, 25),
                primary: Color::Rgb(90, 150, 220),
                secondary: Color::Rgb(110, 180, 170),
                accent: Color::Rgb(190, 130, 220),
                text_tertiary: Color::Rgb(80, 100, 120),
            },
            ThemePreset::Ember => ThemePalette {
                prompt: Color::Rgb(230, 150, 90),
                input_text: Color::Rgb(238, 230, 220),
                muted_text: Color::Rgb(150, 135, 120),
                highlight_fg: Color::Rgb(255, 250, 240),
                highlight_bg: Color::Rgb(90, 60, 40),
                status_text: Color::Rgb(190, 160, 130),
                user_fg: Color::Rgb(255, 250, 240),
                user_bg: Color::Rgb(40, 28, 20),
                assistant_label: Color::Rgb(240, 140, 80),
                assistant_text: Color::Rgb(225, 215, 200),
                system_text: Color::Rgb(170, 155, 140),
                error_text: Color::Rgb(235, 110, 100),
                success: Color::Rgb(160, 200, 120),
                in_progress: Color::Rgb(240, 190, 90),
                banner_title: Color::Rgb(240, 220, 200),
                panel_bg: Color::Rgb(20, 14, 10),
                panel_fg: Color::Rgb(225, 215, 200),
                code_fg: Color::Rgb(230, 220, 205),
                code_bg: Color::Rgb(14, 10, 8),
                primary: Color::Rgb(230, 150, 90),
                secondary: Color::Rgb(200, 170, 110),
                accent: Color::Rgb(210, 110, 140),
                text_tertiary: Color::Rgb(150, 135, 120),
            },
        }
    }
}

pub(crate) fn default_theme() -> ThemePreset {
    ThemePreset::Graphite
}

#[derive(Clone, Copy)]
pub(crate) struct ThemePalette {
    pub(crate) prompt: Color,
    pub(crate) input_text: Color,
    pub(crate) muted_text: Color,
    pub(crate) highlight_fg: Color,
    pub(crate) highlight_bg: Color,
    pub(crate) status_text: Color,
    pub(crate) user_fg: Color,
    pub(crate) user_bg: Color,
    pub(crate) assistant_label: Color,
    pub(crate) assistant_text: Color,
    pub(crate) system_text: Color,
    pub(crate) error_text: Color,
    pub(crate) success: Color,
    pub(crate) in_progress: Color,
    pub(crate) banner_title: Color,
    pub(crate) panel_bg: Color,
    pub(crate) panel_fg: Color,
    pub(crate) code_fg: Color,
    pub(crate) code_bg: Color,
    pub(crate) primary: Color,
    pub(crate) secondary: Color,
    pub(crate) accent: Color,
    pub(crate) text_tertiary: Color,
}

impl ThemePalette {
    pub(crate) fn prompt_style(self) -> Style {
        Style::default()
            .fg(self.prompt)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn title_style(self) -> Style {
        Style::default()
            .fg(self.banner_title)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn body_style(self) -> Style {
        Style::default().fg(self.assistant_text)
    }

    pub(crate) fn secondary_style(self) -> Style {
        Style::default().fg(self.system_text)
    }

    pub(crate) fn muted_style(self) -> Style {
        Style::default().fg(self.muted_text)
    }

    pub(crate) fn error_style(self) -> Style {
        Style::default().fg(self.error_text)
    }

    pub(crate) fn status_style(self) -> Style {
        Style::default().fg(self.status_text)
    }

    pub(crate) fn code_style(self) -> Style {
        Style::default().fg(self.code_fg).bg(self.code_bg)
    }

    pub(crate) fn panel_surface_style(self) -> Style {
        Style::default().bg(self.panel_bg).fg(self.panel_fg)
    }

    pub(crate) fn panel_border_style(self) -> Style {
        Style::default().fg(self.highlight_bg)
    }

    pub(crate) fn focused_border_style(self) -> Style {
        Style::default().fg(self.prompt)
    }

    pub(crate) fn input_surface_style(self) -> Style {
        Style::default().fg(self.input_text)
    }

    pub(crate) fn selected_style(self) -> Style {
        Style::default()
            .fg(self.highlight_fg)
            .bg(self.highlight_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn tool_color(self, color: ToolColor) -> Color {
        match color {
            ToolColor::Primary => self.primary,
            ToolColor::Secondary => self.secondary,
            ToolColor::Accent => self.accent,
            ToolColor::TextTertiary => self.text_tertiary,
        }
    }

    pub(crate) fn status_color(self, glyph: StatusGlyph) -> Color {
        match glyph {
            StatusGlyph::Success => self.success,
            StatusGlyph::Alert => self.error_text,
            StatusGlyph::InProgress => self.in_progress,
            StatusGlyph::Generic => self.text_tertiary,
        }
    }
}

/// Local transcript notices that are not part of the remote thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    User,
    System,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct LogEntry {
    pub(crate) kind: EntryKind,
    pub(crate) text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Focus {
    Composer,
    Transcript,
    Files,
}

#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Assistants {
        generation: u64,
        result: Result<Vec<Assistant>, String>,
    },
    ThreadState {
        ticket: FetchTicket,
        result: Result<ThreadState, String>,
    },
    ThreadCreated {
        assistant_id: String,
        thread_id: String,
    },
    RunFinished {
        assistant_id: String,
        thread_id: Option<String>,
        result: Result<(), String>,
    },
}
