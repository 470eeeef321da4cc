//! Interfaces to the scoring and search services around the generator.

use crate::error::Result;
use crate::topic::Topic;

/// One hit from the retrieval backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub text: String,
    pub score: f32,
}

/// Search backend returning stored responses for a conversation context.
pub trait Retriever: Send + Sync {
    /// Up to `samples` responses for `query`, best first.
    fn search(&self, topic: Option<Topic>, query: &str, samples: usize) -> Result<Vec<Retrieved>>;
}

/// Combines whatever signals it has into one score per candidate.
pub trait Reranker: Send + Sync {
    /// `contexts` and `candidates` are parallel lists. The result must have
    /// one score per candidate, in the same order.
    fn score(
        &self,
        contexts: &[String],
        candidates: &[String],
        topic: Option<Topic>,
        history: &[String],
    ) -> Result<Vec<f32>>;
}

/// Decides whether a context is still on a given topic.
pub trait TopicScorer: Send + Sync {
    fn is_on_topic(&self, text: &str, topic: Topic) -> Result<bool>;
}
