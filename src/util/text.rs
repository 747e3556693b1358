use std::borrow::Cow;

/// Returns `true` if `c` may appear in an XML 1.0 document.
///
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{0009}' | '\u{000A}' | '\u{000D}'
        | '\u{0020}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Removes characters that are illegal in XML 1.0 text.
///
/// Feed content copied from the wild regularly carries stray control bytes
/// (form feeds, vertical tabs, NUL). Escaping cannot represent them, so they
/// are dropped before anything is written.
///
/// Returns `Cow::Borrowed` when nothing needed stripping.
///
/// # Examples
///
/// ```
/// use rss_combiner::util::strip_invalid_xml_chars;
///
/// assert_eq!(strip_invalid_xml_chars("Hello"), "Hello");
/// assert_eq!(strip_invalid_xml_chars("Bad\u{0C}Byte"), "BadByte");
/// assert_eq!(strip_invalid_xml_chars("tab\tkept"), "tab\tkept");
/// ```
pub fn strip_invalid_xml_chars(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
}

/// Trims a cell or list entry, returning `None` when nothing is left.
pub fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_borrowed() {
        let input = "Plain text with unicode: caf\u{e9} \u{4f60}\u{597d}";
        assert!(matches!(strip_invalid_xml_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_control_chars_removed() {
        let input = "a\u{0}b\u{1}c\u{8}d\u{B}e\u{1F}f";
        assert_eq!(strip_invalid_xml_chars(input), "abcdef");
    }

    #[test]
    fn test_whitespace_controls_kept() {
        assert_eq!(strip_invalid_xml_chars("a\tb\nc\rd"), "a\tb\nc\rd");
    }

    #[test]
    fn test_noncharacters_removed() {
        assert_eq!(strip_invalid_xml_chars("x\u{FFFE}y\u{FFFF}z"), "xyz");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  https://a/feed \n"), Some("https://a/feed"));
        assert_eq!(non_blank("   "), None);
        assert_eq!(non_blank(""), None);
    }
}
