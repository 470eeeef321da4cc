use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{AgentError, Result};

/// Conversation topics the agent can steer towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Movie,
    Food,
    Electric,
    Music,
    Sport,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Movie,
        Topic::Food,
        Topic::Electric,
        Topic::Music,
        Topic::Sport,
    ];

    /// English key, also used as the fastText label suffix.
    pub fn key(&self) -> &'static str {
        match self {
            Topic::Movie => "movie",
            Topic::Food => "food",
            Topic::Electric => "electric",
            Topic::Music => "music",
            Topic::Sport => "sport",
        }
    }

    /// Chinese label used by the dialogue corpora.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Movie => "电影",
            Topic::Food => "美食",
            Topic::Electric => "数码产品",
            Topic::Music => "音乐",
            Topic::Sport => "体育",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Topic {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.key() == s || t.label() == s)
            .ok_or_else(|| AgentError::UnknownTopic(s.to_string()))
    }
}

/// Per-topic pools of trigger utterances used to steer an off-topic
/// conversation back.
#[derive(Debug, Clone, Default)]
pub struct TriggerPool {
    utterances: HashMap<Topic, Vec<String>>,
}

impl TriggerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fastText-labelled lines such as `__label__music 我 最近 在 听 摇滚`.
    ///
    /// The label is removed and so is every whitespace character, leaving
    /// the raw utterance. Lines without a known label are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<TriggerPool> {
        let text = fs::read_to_string(path.as_ref())?;
        let pool = Self::parse(&text);
        info!(
            path = %path.as_ref().display(),
            utterances = pool.len(),
            "loaded topic trigger utterances"
        );
        Ok(pool)
    }

    pub fn parse(text: &str) -> TriggerPool {
        let mut pool = TriggerPool::new();
        for line in text.lines() {
            let Some(topic) = Topic::ALL.into_iter().find(|t| line.contains(t.key())) else {
                continue;
            };
            let stripped = line.replace(&format!("__label__{}", topic.key()), "");
            let utterance: String = stripped.split_whitespace().collect();
            pool.insert(topic, utterance);
        }
        pool
    }

    pub fn insert(&mut self, topic: Topic, utterance: impl Into<String>) {
        self.utterances.entry(topic).or_default().push(utterance.into());
    }

    pub fn utterances(&self, topic: Topic) -> &[String] {
        self.utterances.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of utterances across topics.
    pub fn len(&self) -> usize {
        self.utterances.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick one utterance for `topic` uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, topic: Topic, rng: &mut R) -> Result<&str> {
        self.utterances(topic)
            .choose(rng)
            .map(String::as_str)
            .ok_or_else(|| AgentError::Config(format!("no trigger utterances for topic {}", topic)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn test_topic_parses_label_and_key() {
        assert_eq!("电影".parse::<Topic>().unwrap(), Topic::Movie);
        assert_eq!("electric".parse::<Topic>().unwrap(), Topic::Electric);
        assert_eq!("数码产品".parse::<Topic>().unwrap().key(), "electric");
        assert!(matches!("天气".parse::<Topic>(), Err(AgentError::UnknownTopic(_))));
    }

    #[test]
    fn test_parse_strips_label_and_whitespace() {
        let pool = TriggerPool::parse(
            "__label__music 我 最近 在 听 摇滚\n__label__sport 你 喜欢 跑步 吗\nno label here\n",
        );
        assert_eq!(pool.utterances(Topic::Music), &["我最近在听摇滚".to_string()]);
        assert_eq!(pool.utterances(Topic::Sport), &["你喜欢跑步吗".to_string()]);
        assert!(pool.utterances(Topic::Food).is_empty());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "__label__food 今天 吃 火锅").unwrap();
        writeln!(file, "__label__food 喜欢 甜点 吗").unwrap();
        let pool = TriggerPool::from_file(file.path()).unwrap();
        assert_eq!(pool.utterances(Topic::Food).len(), 2);
    }

    #[test]
    fn test_choose() {
        let mut pool = TriggerPool::new();
        pool.insert(Topic::Movie, "看过星际穿越吗");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pool.choose(Topic::Movie, &mut rng).unwrap(), "看过星际穿越吗");
        assert!(matches!(pool.choose(Topic::Sport, &mut rng), Err(AgentError::Config(_))));
    }
}
