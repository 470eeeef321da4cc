use super::vocab::Vocab;
use super::{SpecialTokens, Tokenizer};

/// Whitespace / character tokenizer over a fixed vocabulary.
///
/// Whitespace-separated words found in the vocabulary (including the
/// bracketed special tokens) map to a single id. Any other word falls back
/// to one id per character, and characters missing from the vocabulary
/// become `[UNK]`.
pub struct VocabTokenizer {
    vocab: Vocab,
}

impl VocabTokenizer {
    pub fn new(vocab: Vocab) -> Self {
        Self { vocab }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Split `text` into ids without adding start/end markers.
    pub fn tokenize(&self, text: &str) -> Vec<u32> {
        let unk = self.vocab.special().unk;
        let mut ids = Vec::new();
        for word in text.split_whitespace() {
            if let Some(id) = self.vocab.id(word) {
                ids.push(id);
                continue;
            }
            let mut buf = [0u8; 4];
            for ch in word.chars() {
                let piece: &str = ch.encode_utf8(&mut buf);
                let id = self
                    .vocab
                    .id(piece)
                    .or_else(|| self.vocab.id(&piece.to_lowercase()))
                    .unwrap_or(unk);
                ids.push(id);
            }
        }
        ids
    }
}

impl Tokenizer for VocabTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let special = self.vocab.special();
        let mut ids = vec![special.cls];
        ids.extend(self.tokenize(text));
        ids.push(special.sep);
        ids
    }

    fn decode(&self, ids: &[u32]) -> String {
        let special = self.vocab.special();
        let mut out = String::new();
        let mut prev_cjk = true;
        for &id in ids {
            if id == special.pad || id == special.cls {
                continue;
            }
            let Some(token) = self.vocab.token(id) else {
                continue;
            };
            let cjk = is_cjk(token);
            if !out.is_empty() && !cjk && !prev_cjk {
                out.push(' ');
            }
            out.push_str(token);
            prev_cjk = cjk;
        }
        out
    }

    fn special(&self) -> SpecialTokens {
        self.vocab.special()
    }
}

/// Single CJK ideograph or full-width punctuation, written without spaces.
fn is_cjk(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => matches!(c,
            '\u{3000}'..='\u{303f}'
            | '\u{3400}'..='\u{4dbf}'
            | '\u{4e00}'..='\u{9fff}'
            | '\u{ff00}'..='\u{ffef}'),
        _ => false,
    }
}
