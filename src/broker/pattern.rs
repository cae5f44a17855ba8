//! Topic routing-key pattern matching.
//!
//! AMQP semantics: keys are dot-delimited words, `*` matches exactly one
//! word, `#` matches zero or more words.

/// Whether `routing_key` matches the binding `pattern`.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some(&"#") => {
            if matches_words(&pattern[1..], key) {
                return true;
            }
            !key.is_empty() && matches_words(pattern, &key[1..])
        }
        Some(&"*") => !key.is_empty() && matches_words(&pattern[1..], &key[1..]),
        Some(word) => key.first() == Some(word) && matches_words(&pattern[1..], &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(topic_matches("user_ai.embed", "user_ai.embed"));
        assert!(!topic_matches("user_ai.embed", "user_ai.delete"));
        assert!(!topic_matches("user_ai.embed", "user_ai.embed.extra"));
    }

    #[test]
    fn star_matches_exactly_one_word() {
        assert!(topic_matches("user_ai.*", "user_ai.embed"));
        assert!(topic_matches("user_ai.*", "user_ai.upsert_embeddings"));
        assert!(!topic_matches("user_ai.*", "user_ai"));
        assert!(!topic_matches("user_ai.*", "user_ai.embed.extra"));
        assert!(!topic_matches("user_ai.*", "other.embed"));
    }

    #[test]
    fn hash_matches_zero_or_more_words() {
        assert!(topic_matches("user_ai.#", "user_ai"));
        assert!(topic_matches("user_ai.#", "user_ai.embed"));
        assert!(topic_matches("user_ai.#", "user_ai.embed.v2"));
        assert!(topic_matches("#", "anything.at.all"));
        assert!(!topic_matches("user_ai.#", "other.embed"));
    }

    #[test]
    fn hash_in_the_middle_spans_words() {
        assert!(topic_matches("a.#.z", "a.z"));
        assert!(topic_matches("a.#.z", "a.b.c.z"));
        assert!(!topic_matches("a.#.z", "a.b.c"));
    }
}
