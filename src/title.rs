//! Window title resolution heuristic.
//!
//! Many applications advertise titles of the form `"Document.txt - Editor"`
//! or `"Inbox | Mail"`, with the application name as a suffix. The matcher
//! wants that suffix, not the whole title.

/// Placeholder used when a window has no readable name property.
pub const UNTITLED: &str = "(untitled)";

/// Separators that commonly precede the application-name suffix.
const SEPARATORS: [&str; 3] = [" - ", " — ", " | "];

/// Extract the application-name suffix from a resolved window title.
///
/// Searches for the last occurrence of any separator, keeping the match with
/// the largest start offset across all three. Returns the trimmed suffix, or
/// the original string when no separator matches or the suffix trims to
/// empty.
pub fn application_name(title: &str) -> &str {
    let mut best: Option<(usize, usize)> = None;
    for sep in SEPARATORS {
        if let Some(pos) = title.rfind(sep) {
            if best.is_none_or(|(p, _)| pos > p) {
                best = Some((pos, sep.len()));
            }
        }
    }

    match best {
        Some((pos, len)) => {
            let suffix = title[pos + len..].trim();
            if suffix.is_empty() { title } else { suffix }
        }
        None => title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_suffix_after_hyphen_separator() {
        assert_eq!(application_name("Document.txt - Editor"), "Editor");
    }

    #[test]
    fn extracts_suffix_after_em_dash_and_pipe() {
        assert_eq!(application_name("Mozilla Firefox — Private"), "Private");
        assert_eq!(application_name("Inbox | Thunderbird"), "Thunderbird");
    }

    #[test]
    fn keeps_title_without_separator() {
        assert_eq!(application_name("NoSeparatorHere"), "NoSeparatorHere");
    }

    #[test]
    fn falls_back_when_suffix_trims_to_empty() {
        assert_eq!(application_name("A - "), "A - ");
    }

    #[test]
    fn picks_the_last_separator_of_several() {
        // Two separators: the suffix after the later one wins.
        assert_eq!(application_name("a - b | c"), "c");
        assert_eq!(application_name("a | b - c"), "c");
    }

    #[test]
    fn plain_hyphen_is_not_a_separator() {
        assert_eq!(application_name("x-terminal"), "x-terminal");
    }
}
