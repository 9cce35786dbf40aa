//! Sentence segmentation and overlap-aware packing.

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 6] = ['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];
const OPENERS: [char; 5] = ['"', '\'', '(', '[', '\u{201c}'];

/// Length in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into sentences.
///
/// A sentence ends at a word ending in `.`, `!` or `?` (optionally followed by
/// closing quotes or brackets) when the next word starts with an uppercase
/// letter. Abbreviations such as "Dr." or "e.g." never end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word);
        if let Some(next) = words.get(i + 1) {
            if ends_sentence(word) && starts_sentence(next) {
                sentences.push(current.join(" "));
                current.clear();
            }
        }
    }

    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    sentences
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(CLOSERS);
    trimmed.ends_with(TERMINATORS) && !is_abbreviation(trimmed)
}

fn starts_sentence(word: &str) -> bool {
    word.trim_start_matches(OPENERS)
        .chars()
        .next()
        .is_some_and(char::is_uppercase)
}

fn is_abbreviation(word: &str) -> bool {
    let stem = word.trim_start_matches(OPENERS);
    if !stem.ends_with('.') {
        return false;
    }

    // "Mr.", "Dr.", "St."
    let chars: Vec<char> = stem.chars().collect();
    if chars.len() == 3 && chars[0].is_uppercase() && chars[1].is_lowercase() {
        return true;
    }

    // "e.g.", "i.e.", "U.S."
    let inner = &stem[..stem.len() - 1];
    inner.contains('.')
        && inner
            .split('.')
            .all(|part| !part.is_empty() && char_len(part) <= 2 && part.chars().all(char::is_alphanumeric))
}

/// Break a sentence longer than `budget` into word-bounded pieces.
///
/// Only a single word longer than `budget` is cut inside the word.
pub fn split_long_sentence(sentence: &str, budget: usize) -> Vec<String> {
    if char_len(sentence) <= budget {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split(' ') {
        for part in hard_cut(word, budget) {
            if !current.is_empty() && char_len(&current) + 1 + char_len(&part) > budget {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&part);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn hard_cut(word: &str, budget: usize) -> Vec<String> {
    if char_len(word) <= budget {
        return vec![word.to_string()];
    }
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(budget.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Greedily pack sentences into chunks of at most `budget` characters.
///
/// Each chunk after the first starts with the trailing whole sentences of the
/// previous chunk whose combined length is at most `overlap`, as long as the
/// carried text still leaves room for the next new sentence.
pub fn pack_sentences(sentences: &[String], budget: usize, overlap: usize) -> Vec<String> {
    let sentences: Vec<String> = sentences
        .iter()
        .flat_map(|s| split_long_sentence(s, budget))
        .collect();
    let lens: Vec<usize> = sentences.iter().map(|s| char_len(s)).collect();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < sentences.len() {
        let mut size = 0;
        let mut end = start;
        while end < sentences.len() {
            let addition = lens[end] + usize::from(end > start);
            if end > start && size + addition > budget {
                break;
            }
            size += addition;
            end += 1;
        }

        chunks.push(sentences[start..end].join(" "));

        if end >= sentences.len() {
            break;
        }

        // Trailing sentences that fit in the overlap window.
        let mut carried = 0;
        let mut carried_len = 0;
        for len in lens[start..end].iter().rev() {
            let addition = len + usize::from(carried > 0);
            if carried_len + addition > overlap {
                break;
            }
            carried_len += addition;
            carried += 1;
        }

        // The next chunk must still fit its first new sentence.
        while carried > 0 && carried_len + 1 + lens[end] > budget {
            let dropped = lens[end - carried];
            carried_len -= dropped + usize::from(carried > 1);
            carried -= 1;
        }

        start = end - carried;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_respects_abbreviations() {
        let text = "Hello there. This is Dr. Smith speaking. Numbers like 3.5 stay. e.g. this stays? Yes!";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "Hello there.",
                "This is Dr. Smith speaking.",
                "Numbers like 3.5 stay. e.g. this stays?",
                "Yes!",
            ]
        );
    }

    #[test]
    fn test_split_sentences_with_closing_quotes() {
        let sentences = split_sentences("He said \"stop.\" Then he left.");
        assert_eq!(sentences, vec!["He said \"stop.\"", "Then he left."]);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\n b\t c  "), "a b c");
    }

    #[test]
    fn test_pack_single_chunk_when_short() {
        let sentences = split_sentences("One. Two. Three.");
        let chunks = pack_sentences(&sentences, 100, 10);
        assert_eq!(chunks, vec!["One. Two. Three."]);
    }

    #[test]
    fn test_pack_respects_budget_and_overlap() {
        let text = (0..30)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let sentences = split_sentences(&text);
        let chunks = pack_sentences(&sentences, 100, 30);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 100, "chunk too long: {}", chunk);
        }

        for pair in chunks.windows(2) {
            let previous = split_sentences(&pair[0]);
            let next = split_sentences(&pair[1]);
            let carried = previous.last().unwrap();
            assert_eq!(next.first().unwrap(), carried);
            assert!(char_len(carried) <= 30);
        }
    }

    #[test]
    fn test_pack_makes_progress_when_overlap_crowds_budget() {
        let sentences = vec![
            "a".repeat(20),
            "b".repeat(20),
            "c".repeat(45),
            "d".repeat(45),
        ];
        let chunks = pack_sentences(&sentences, 50, 45);
        assert!(chunks.iter().all(|c| char_len(c) <= 50));
        assert!(chunks.iter().any(|c| c.contains('c')));
        assert!(chunks.last().unwrap().contains('d'));
    }

    #[test]
    fn test_long_sentence_splits_on_words() {
        let sentence = "alpha beta gamma delta epsilon zeta eta theta";
        let pieces = split_long_sentence(sentence, 12);
        assert!(pieces.iter().all(|p| char_len(p) <= 12));
        assert_eq!(pieces.join(" "), sentence);
    }

    #[test]
    fn test_oversized_word_is_cut() {
        let pieces = split_long_sentence(&"x".repeat(25), 10);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| char_len(p) <= 10));
    }
}
