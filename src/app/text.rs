/// Strips terminal escape sequences and control characters from text that
/// arrives from the server or from errors before it reaches the screen.
pub(super) fn sanitize_runtime_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_escape = false;
    let mut in_csi = false;

    for ch in text.chars() {
        if in_escape {
            if in_csi {
                // CSI sequence terminates at bytes in range 0x40..0x7E.
                if ('@'..='~').contains(&ch) {
                    in_escape = false;
                    in_csi = false;
                }
                continue;
            }
            if ch == '[' {
                in_csi = true;
                continue;
            }
            in_escape = false;
            continue;
        }

        match ch {
            '\u{1b}' => in_escape = true,
            '\r' => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(sanitize_runtime_text("\u{1b}[31merror\u{1b}[0m: boom"), "error: boom");
    }

    #[test]
    fn carriage_returns_become_single_newlines() {
        assert_eq!(sanitize_runtime_text("a\rb\r\rc"), "a\nb\nc");
    }

    #[test]
    fn drops_other_control_chars() {
        assert_eq!(sanitize_runtime_text("bell\u{7}\ttab"), "bell\ttab");
    }
}
