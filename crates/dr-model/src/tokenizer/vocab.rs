use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ModelError, Result};
use super::SpecialTokens;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Token vocabulary: one token per line, the line number is the id.
pub struct Vocab {
    tokens: Vec<String>,
    token_to_id: HashMap<String, u32>,
    special: SpecialTokens,
}

impl Vocab {
    /// Load a vocabulary file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Vocab> {
        let text = fs::read_to_string(path)?;
        let tokens = text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        Self::from_tokens(tokens)
    }

    /// Build a vocabulary from an ordered token list.
    ///
    /// `[PAD]`, `[UNK]`, `[CLS]` and `[SEP]` must all be present.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Vocab> {
        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, tok) in tokens.iter().enumerate() {
            // First occurrence wins for duplicated lines.
            token_to_id.entry(tok.clone()).or_insert(id as u32);
        }

        let lookup = |name: &str| {
            token_to_id.get(name).copied().ok_or_else(|| {
                ModelError::TokenizerError(format!("vocabulary has no {} token", name))
            })
        };
        let special = SpecialTokens {
            pad: lookup(PAD_TOKEN)?,
            unk: lookup(UNK_TOKEN)?,
            cls: lookup(CLS_TOKEN)?,
            sep: lookup(SEP_TOKEN)?,
        };

        Ok(Vocab {
            tokens,
            token_to_id,
            special,
        })
    }

    /// Id of `token`, if it is in the vocabulary.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// Token string of `id`.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn special(&self) -> SpecialTokens {
        self.special
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
