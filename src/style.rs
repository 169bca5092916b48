//! ANSI terminal styling for stdout output.

const CSI: &str = "\x1b[";
const RESET: &str = "\x1b[0m";

fn wrap(code: &str, s: &str) -> String {
    format!("{CSI}{code}m{s}{RESET}")
}

pub fn bold(s: &str) -> String {
    wrap("1", s)
}

pub fn red(s: &str) -> String {
    wrap("31", s)
}

pub fn green(s: &str) -> String {
    wrap("32", s)
}

pub fn magenta(s: &str) -> String {
    wrap("35", s)
}

/// Highlighted fields are bold red.
pub fn highlight(s: &str) -> String {
    bold(&red(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_nests_codes() {
        assert_eq!(highlight("x"), "\x1b[1m\x1b[31mx\x1b[0m\x1b[0m");
        assert_eq!(green("7"), "\x1b[32m7\x1b[0m");
    }
}
