//! Sentence segmentation for the speech queue

/// Split text into sentence-like fragments for synthesis
///
/// Splits on `.`, `!`, `?` and newline; punctuation delimiters stay
/// attached to their fragment. Whitespace-only fragments are dropped.
#[must_use]
pub fn split_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        match ch {
            '.' | '!' | '?' => {
                current.push(ch);
                push_fragment(&mut fragments, &mut current);
            }
            '\n' => push_fragment(&mut fragments, &mut current),
            _ => current.push(ch),
        }
    }
    push_fragment(&mut fragments, &mut current);

    fragments
}

fn push_fragment(fragments: &mut Vec<String>, current: &mut String) {
    let fragment = current.trim();
    if !fragment.is_empty() {
        fragments.push(fragment.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_punctuation() {
        assert_eq!(split_fragments("A. B! C?"), vec!["A.", "B!", "C?"]);
    }

    #[test]
    fn keeps_delimiters_attached() {
        assert_eq!(split_fragments("Hello there!"), vec!["Hello there!"]);
    }

    #[test]
    fn splits_on_newlines_without_retaining_them() {
        assert_eq!(split_fragments("one\ntwo"), vec!["one", "two"]);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(split_fragments("").is_empty());
        assert!(split_fragments("   ").is_empty());
        assert!(split_fragments("\n\n").is_empty());
    }

    #[test]
    fn text_without_delimiters_is_one_fragment() {
        assert_eq!(split_fragments("Hi"), vec!["Hi"]);
    }

    #[test]
    fn consecutive_punctuation_yields_bare_delimiters() {
        assert_eq!(split_fragments("wait... what?"), vec!["wait.", ".", ".", "what?"]);
    }

    #[test]
    fn leading_whitespace_is_trimmed_from_fragments() {
        assert_eq!(split_fragments(" there"), vec!["there"]);
    }
}
