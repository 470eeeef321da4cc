use std::fmt;

/// Where a candidate response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Generative,
    Retrieval,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Generative => f.write_str("generative"),
            Source::Retrieval => f.write_str("retrieval"),
        }
    }
}

/// A response competing for selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub source: Source,
    /// Reranker score, set once the candidate has been scored.
    pub score: Option<f32>,
}

impl Candidate {
    pub fn generative(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Source::Generative,
            score: None,
        }
    }

    pub fn retrieval(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: Source::Retrieval,
            score: None,
        }
    }
}

/// The selected reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub text: String,
    pub source: Source,
    /// Position of the winner among all scored candidates.
    pub index: usize,
    pub n_candidates: usize,
}
