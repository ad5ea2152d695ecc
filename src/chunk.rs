//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into passages that respect a configurable
//! `max_chars` limit. Splitting occurs on sentence boundaries (`.`, `!`, `?`
//! followed by whitespace) so each passage stays semantically coherent.

/// Split text into sentences after `.`, `!`, or `?` followed by whitespace.
/// Sentences are trimmed; empty fragments are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_was_terminator = false;

    for (i, c) in text.char_indices() {
        if prev_was_terminator && c.is_whitespace() {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i;
        }
        prev_was_terminator = matches!(c, '.' | '!' | '?');
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Greedily pack sentences into passages of at most `max_chars` characters.
///
/// Sentences are accumulated into a buffer (joined with single spaces); when
/// the next sentence would no longer fit, the buffer is flushed and a new one
/// starts with that sentence. A single sentence longer than `max_chars` is
/// emitted verbatim as its own passage. Empty input yields no passages.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut passages = Vec::new();
    let mut buf = String::new();

    for sentence in split_sentences(text) {
        if !buf.is_empty() && buf.len() + 1 + sentence.len() >= max_chars {
            passages.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(sentence);
    }

    if !buf.is_empty() {
        passages.push(buf);
    }

    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_passages() {
        assert!(chunk_text("", 512).is_empty());
        assert!(chunk_text("   \n\t  ", 512).is_empty());
    }

    #[test]
    fn small_text_single_passage() {
        let passages = chunk_text("The policy covers surgery. It excludes cosmetics.", 512);
        assert_eq!(passages.len(), 1);
        assert_eq!(
            passages[0],
            "The policy covers surgery. It excludes cosmetics."
        );
    }

    #[test]
    fn splits_on_terminator_followed_by_whitespace() {
        let sentences = split_sentences("One. Two! Three? Four");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let sentences = split_sentences("The copay is 2.5 percent. Claims settle monthly.");
        assert_eq!(
            sentences,
            vec!["The copay is 2.5 percent.", "Claims settle monthly."]
        );
    }

    #[test]
    fn two_claims_split_at_forty_chars() {
        let passages = chunk_text("Claim X is covered. Claim Y is excluded.", 40);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0], "Claim X is covered.");
        assert_eq!(passages[1], "Claim Y is excluded.");
    }

    #[test]
    fn oversized_sentence_stands_alone() {
        let long = "This single sentence is far longer than the configured limit allows.";
        let text = format!("Short one. {} Short two.", long);
        let passages = chunk_text(&text, 30);
        assert!(passages.contains(&long.to_string()));
        for p in &passages {
            assert!(p.len() <= 30 || p == long, "unexpected oversized: {}", p);
        }
    }

    #[test]
    fn concatenation_preserves_sentence_sequence() {
        let text = "Alpha beta. Gamma delta! Epsilon? Zeta eta theta. Iota kappa.";
        let original: Vec<&str> = split_sentences(text);
        let passages = chunk_text(text, 25);
        let rejoined: Vec<String> = passages
            .iter()
            .flat_map(|p| split_sentences(p))
            .map(|s| s.to_string())
            .collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn passages_respect_limit() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} ends here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let passages = chunk_text(&text, 100);
        assert!(passages.len() > 1);
        for p in &passages {
            assert!(p.len() <= 100, "passage over limit: {} chars", p.len());
        }
    }

    #[test]
    fn deterministic() {
        let text = "One sentence here. Another follows. And a third one.";
        assert_eq!(chunk_text(text, 30), chunk_text(text, 30));
    }
}
