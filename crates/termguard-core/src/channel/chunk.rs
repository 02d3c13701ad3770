//! Transport-cap message chunking.
//!
//! Telegram limits a text message to 4096 characters; anything longer has to
//! be pre-split by the sender. Chunks preserve input order and concatenate
//! back to the original text, splitting at line boundaries where possible.

/// Telegram hard limit for text messages.
#[allow(dead_code)]
const TELEGRAM_MAX_LEN: usize = 4096;

/// Default split threshold (leaves headroom for code-fence markup).
pub const DEFAULT_MAX_LEN: usize = 4000;

/// Overhead of wrapping a chunk in its own ```-fence.
const FENCE_OVERHEAD: usize = 8;

/// Split `text` into ordered chunks of at most `max_len` characters.
///
/// Splits prefer the last line boundary inside the window and fall back to a
/// hard cut at a char boundary. Joining the chunks reproduces `text` exactly.
pub fn chunk_text(text: &str, max_len: Option<usize>) -> Vec<String> {
    let limit = max_len.unwrap_or(DEFAULT_MAX_LEN).max(1);

    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= limit {
            chunks.push(remaining.to_string());
            break;
        }

        let window_end = remaining
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..window_end];

        // Prefer splitting just after the last newline in the window so
        // lines stay intact; hard cut otherwise.
        let split_at = match window.rfind('\n') {
            Some(pos) if pos > 0 => pos + 1,
            _ => window_end,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}

/// Chunk raw `payload`, escape each chunk for a fenced code block, and wrap
/// it in its own fence, so each outbound message is independently
/// well-formed.
///
/// Splitting happens before escaping so an escape pair can never straddle a
/// chunk boundary; the inner limit is halved to absorb worst-case escape
/// expansion. Trailing newlines inside a chunk are dropped as fence framing,
/// so the joined inner text is not byte-identical to the input across
/// boundaries; [`chunk_text`] is the exact-reassembly primitive.
pub fn chunk_code_block(payload: &str, max_len: Option<usize>) -> Vec<String> {
    let limit = max_len.unwrap_or(DEFAULT_MAX_LEN);
    let inner = (limit.saturating_sub(FENCE_OVERHEAD) / 2).max(1);
    chunk_text(payload, Some(inner))
        .into_iter()
        .map(|chunk| {
            format!(
                "```\n{}\n```",
                super::escape::escape_code_block(chunk.trim_end_matches('\n'))
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", Some(100)).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("hello", Some(100)), vec!["hello"]);
    }

    #[test]
    fn test_exact_limit_single_chunk() {
        let text = "a".repeat(100);
        assert_eq!(chunk_text(&text, Some(100)), vec![text]);
    }

    #[test]
    fn test_chunks_never_exceed_limit() {
        let text = (0..300)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        for chunk in chunk_text(&text, Some(120)) {
            assert!(chunk.chars().count() <= 120);
        }
    }

    #[test]
    fn test_concatenation_reproduces_input_exactly_once() {
        let text = (0..600)
            .map(|i| format!("row {i}: some output text"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.len() > 9000);

        let chunks = chunk_text(&text, Some(DEFAULT_MAX_LEN));
        assert!(chunks.len() >= 3);
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn test_prefers_line_boundaries() {
        let text = format!("{}\n{}", "a".repeat(50), "b".repeat(50));
        let chunks = chunk_text(&text, Some(60));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(50)));
        assert_eq!(chunks[1], "b".repeat(50));
    }

    #[test]
    fn test_hard_cut_on_single_long_line() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, Some(100));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_multibyte_char_boundaries() {
        let text = "пример вывода команды с кириллицей\n".repeat(40);
        let chunks = chunk_text(&text, Some(100));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn test_code_block_wrapping() {
        let chunks = chunk_code_block("ls output here", None);
        assert_eq!(chunks, vec!["```\nls output here\n```"]);
    }

    #[test]
    fn test_escape_pairs_never_split_across_chunks() {
        // Backtick runs force escaping on every char; a cut between a
        // backslash and its backtick would leave a malformed chunk.
        let payload = format!("a{}", "`".repeat(3000));
        let chunks = chunk_code_block(&payload, Some(100));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            let inner = chunk
                .strip_prefix("```\n")
                .unwrap()
                .strip_suffix("\n```")
                .unwrap();
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    assert_eq!(chars.next(), Some('`'), "dangling escape in {inner:?}");
                }
            }
        }
    }

    #[test]
    fn test_code_block_chunks_fit_transport_cap() {
        let payload = "line of output\n".repeat(1000);
        let chunks = chunk_code_block(&payload, Some(DEFAULT_MAX_LEN));
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= DEFAULT_MAX_LEN);
            assert!(chunk.starts_with("```\n"));
            assert!(chunk.ends_with("\n```"));
        }
    }
}
