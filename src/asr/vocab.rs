//! Token vocabulary shared by both decoders.

use std::collections::HashMap;

/// Sentencepiece-style word-boundary marker.
const WORD_BOUNDARY: char = '\u{2581}';

/// Bidirectional id/token table with special-token handling. Special
/// tokens are wrapped in `<|...|>` and never appear in decoded text.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    id_to_token: Vec<String>,
    token_to_id: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let token_to_id = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self {
            id_to_token: tokens,
            token_to_id,
        }
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn is_special(&self, id: u32) -> bool {
        self.token(id)
            .map(|t| t.starts_with("<|") && t.ends_with("|>"))
            .unwrap_or(false)
    }

    /// If `id` is a language tag like `<|en|>`, returns the inner code.
    pub fn language_tag(&self, id: u32) -> Option<String> {
        let token = self.token(id)?;
        let inner = token.strip_prefix("<|")?.strip_suffix("|>")?;
        if (2..=3).contains(&inner.len()) && inner.chars().all(|c| c.is_ascii_lowercase()) {
            Some(inner.to_string())
        } else {
            None
        }
    }

    /// Joins token ids into text: specials and unknown ids are skipped,
    /// word-boundary markers become spaces.
    pub fn decode(&self, ids: &[u32]) -> String {
        let mut text = String::new();
        for &id in ids {
            if self.is_special(id) {
                continue;
            }
            if let Some(token) = self.token(id) {
                for c in token.chars() {
                    if c == WORD_BOUNDARY {
                        text.push(' ');
                    } else {
                        text.push(c);
                    }
                }
            }
        }
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(
            [
                "<blank>", "<|en|>", "<|zh|>", "<|nospeech|>", "\u{2581}hello", "\u{2581}world",
                "ly", "<|endoftext|>",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn test_round_trip_lookup() {
        let v = vocab();
        assert_eq!(v.token(4), Some("\u{2581}hello"));
        assert_eq!(v.id_of("\u{2581}hello"), Some(4));
        assert_eq!(v.token(99), None);
        assert_eq!(v.id_of("missing"), None);
    }

    #[test]
    fn test_special_detection() {
        let v = vocab();
        assert!(v.is_special(1));
        assert!(v.is_special(3));
        assert!(!v.is_special(0)); // <blank> is not <|...|> wrapped
        assert!(!v.is_special(4));
        assert!(!v.is_special(99));
    }

    #[test]
    fn test_language_tag() {
        let v = vocab();
        assert_eq!(v.language_tag(1), Some("en".to_string()));
        assert_eq!(v.language_tag(2), Some("zh".to_string()));
        // special but not a language code
        assert_eq!(v.language_tag(3), None);
        assert_eq!(v.language_tag(4), None);
    }

    #[test]
    fn test_decode_skips_specials_and_joins_words() {
        let v = vocab();
        assert_eq!(v.decode(&[1, 4, 5, 6, 7]), "hello worldly");
    }

    #[test]
    fn test_decode_empty() {
        let v = vocab();
        assert_eq!(v.decode(&[]), "");
        assert_eq!(v.decode(&[1, 3, 7]), "");
    }
}
