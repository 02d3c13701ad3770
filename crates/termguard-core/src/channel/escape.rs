//! MarkdownV2 escaping.
//!
//! Telegram rejects MarkdownV2 messages containing unescaped reserved
//! characters, so raw command output has to pass through here before it can
//! be sent with formatting enabled. Inside a fenced code block only the
//! backtick and the backslash are reserved.

/// Characters Telegram reserves in MarkdownV2 text.
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape `text` for use in MarkdownV2 body text.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\\' || RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape `text` for use inside a fenced code block.
pub fn escape_code_block(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\\' || ch == '`' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(escape_markdown_v2("hello world"), "hello world");
    }

    #[test]
    fn test_every_reserved_char_escaped() {
        for &ch in RESERVED {
            let escaped = escape_markdown_v2(&ch.to_string());
            assert_eq!(escaped, format!("\\{ch}"), "failed for {ch:?}");
        }
    }

    #[test]
    fn test_backslash_escaped() {
        assert_eq!(escape_markdown_v2("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_shell_output_sample() {
        assert_eq!(
            escape_markdown_v2("drwxr-xr-x 2 root root 4.0K file_name.txt"),
            "drwxr\\-xr\\-x 2 root root 4\\.0K file\\_name\\.txt"
        );
    }

    #[test]
    fn test_code_block_only_backtick_and_backslash() {
        assert_eq!(escape_code_block("a.b-c_d"), "a.b-c_d");
        assert_eq!(escape_code_block("echo `id`"), "echo \\`id\\`");
        assert_eq!(escape_code_block("C:\\path"), "C:\\\\path");
    }

    #[test]
    fn test_newlines_preserved() {
        assert_eq!(escape_markdown_v2("a\nb"), "a\nb");
    }
}
