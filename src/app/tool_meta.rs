/// Symbolic icon for a tool; rendered as a terminal glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ToolIcon {
    Search,
    File,
    Bot,
    Terminal,
}

impl ToolIcon {
    pub(crate) fn glyph(self) -> &'static str {
        match self {
            ToolIcon::Search => "\u{2315}",
            ToolIcon::File => "\u{25a4}",
            ToolIcon::Bot => "\u{25c9}",
            ToolIcon::Terminal => "\u{276f}",
        }
    }
}

/// Palette role for a tool; resolved against the active theme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ToolColor {
    Primary,
    Secondary,
    Accent,
    TextTertiary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ToolMeta {
    pub(crate) icon: ToolIcon,
    pub(crate) color: ToolColor,
}

const DEFAULT_TOOL_META: ToolMeta = ToolMeta {
    icon: ToolIcon::Terminal,
    color: ToolColor::TextTertiary,
};

const TOOL_META: &[(&str, ToolMeta)] = &[
    (
        "search",
        ToolMeta {
            icon: ToolIcon::Search,
            color: ToolColor::Primary,
        },
    ),
    (
        "file",
        ToolMeta {
            icon: ToolIcon::File,
            color: ToolColor::Secondary,
        },
    ),
    (
        "task",
        ToolMeta {
            icon: ToolIcon::Bot,
            color: ToolColor::Accent,
        },
    ),
];

pub(crate) fn resolve(tool_name: &str) -> ToolMeta {
    TOOL_META
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, meta)| *meta)
        .unwrap_or(DEFAULT_TOOL_META)
}
