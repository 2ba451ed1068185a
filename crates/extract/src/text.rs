/// Split text into sentences, keeping the terminator with each sentence.
/// A sentence ends at `.`, `!`, or `?` followed by whitespace or the end of
/// the text.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
                // Consume the inter-sentence whitespace.
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let sentences = split_sentences("First one. Second one! Third?");
        assert_eq!(sentences, vec!["First one.", "Second one!", "Third?"]);
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let sentences = split_sentences("SSIM reached 0.605 overall. Great.");
        assert_eq!(sentences, vec!["SSIM reached 0.605 overall.", "Great."]);
    }

    #[test]
    fn test_unterminated_tail_is_kept() {
        let sentences = split_sentences("Done. And a trailing fragment");
        assert_eq!(sentences, vec!["Done.", "And a trailing fragment"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }
}
