//! Splitting long messages into channel-sized pieces.

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Cuts at the last newline inside the window, then at the last space, and
/// only then in the middle of a word. The separator a cut happens on is dropped.
/// HTML tags and entities are never cut through.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the window.
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (cut, skip) = find_cut(&rest[..window_end]);

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut + skip..];
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Byte offset to cut `window` at, and how many separator bytes to drop.
fn find_cut(window: &str) -> (usize, usize) {
    let mut newline = None;
    let mut space = None;
    // Start and closing character of an unfinished tag or entity.
    let mut markup: Option<(usize, char)> = None;

    for (i, c) in window.char_indices() {
        match (markup, c) {
            (None, '<') => markup = Some((i, '>')),
            (None, '&') => markup = Some((i, ';')),
            (Some((_, close)), c) if c == close => markup = None,
            (None, '\n') => newline = Some(i),
            (None, ' ') => space = Some(i),
            _ => {}
        }
    }

    match newline.or(space) {
        Some(i) if i > 0 => (i, 1),
        _ => match markup {
            Some((start, _)) if start > 0 => (start, 0),
            _ => (window.len(), 0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_message_is_untouched() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("line one\nline two\nline three", 19);
        assert_eq!(chunks, vec!["line one\nline two", "line three"]);
    }

    #[test]
    fn test_split_falls_back_to_spaces() {
        let chunks = split_message("alpha beta gamma", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_hard_split() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_keeps_tags_whole() {
        assert_eq!(split_message("abc<b>def</b>", 5), vec!["abc", "<b>de", "f</b>"]);

        let link = r#"<a href="https://t.me/c/1234/1001">"#;
        let chunks = split_message(&format!("Reply:{}Invoice</a>", link), 40);
        assert_eq!(chunks[0], "Reply:");
        assert!(chunks[1].starts_with(link));

        let chunks = split_message("Total <b>+150.00 UAH</b>", 8);
        assert_eq!(chunks[0], "Total");
        assert_eq!(chunks[1], "<b>+150.");
    }

    #[test]
    fn test_split_keeps_entities_whole() {
        let chunks = split_message("abc&amp;def", 5);
        assert_eq!(chunks, vec!["abc", "&amp;", "def"]);
    }

    #[test]
    fn test_split_counts_characters() {
        let text = "ґґґґ ґґґґ";
        let chunks = split_message(text, 5);
        assert_eq!(chunks, vec!["ґґґґ", "ґґґґ"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }
}
