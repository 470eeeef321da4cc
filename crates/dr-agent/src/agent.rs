use dr_model::{RunMode, SequenceModel};
use tracing::info;

use crate::candidate::Source;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::orchestrator::ResponseOrchestrator;
use crate::topic::Topic;

/// How the agent turns a context into a reply, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Responder {
    Single,
    Rerank { retrieval: bool },
}

/// A conversation: one orchestrator plus the replies given so far.
pub struct Agent<M: SequenceModel> {
    orchestrator: ResponseOrchestrator<M>,
    responder: Responder,
    config: AgentConfig,
    history: Vec<String>,
}

impl<M: SequenceModel> Agent<M> {
    pub fn new(orchestrator: ResponseOrchestrator<M>, config: AgentConfig) -> Result<Self> {
        let responder = match config.run_mode {
            RunMode::Train => {
                return Err(AgentError::Config(
                    "train mode has no chat responder".to_string(),
                ))
            }
            RunMode::Test => Responder::Single,
            RunMode::Rerank => Responder::Rerank { retrieval: false },
            RunMode::RerankRetrieval => {
                if !orchestrator.has_retriever() {
                    return Err(AgentError::Config(
                        "rerank_ir mode needs a retriever".to_string(),
                    ));
                }
                Responder::Rerank { retrieval: true }
            }
        };
        let orchestrator = orchestrator.with_max_retrieval_attempts(config.max_retrieval_attempts);
        info!(mode = %config.run_mode, batch_size = config.batch_size, "agent ready");
        Ok(Self {
            orchestrator,
            responder,
            config,
            history: Vec::new(),
        })
    }

    /// Reply to `msgs`, the conversation so far joined by `[SEP]`.
    pub fn talk(&mut self, topic: Option<Topic>, msgs: &str) -> Result<String> {
        let max_len = self.config.generation.max_len;
        let (text, source) = match self.responder {
            Responder::Single => (
                self.orchestrator.reply_single(msgs, topic, max_len)?,
                Source::Generative,
            ),
            Responder::Rerank { retrieval } => {
                let reply = self.orchestrator.respond(
                    msgs,
                    topic,
                    &self.history,
                    self.config.batch_size,
                    max_len,
                    retrieval,
                )?;
                (reply.text, reply.source)
            }
        };
        info!(%source, turn = self.history.len(), "replied");
        self.history.push(text.clone());
        Ok(text)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn mode(&self) -> RunMode {
        self.config.run_mode
    }

    pub fn orchestrator(&self) -> &ResponseOrchestrator<M> {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Retrieved, Retriever};
    use crate::orchestrator::tests::{
        special, FixedTopic, LetterTokenizer, RowModel, ScriptedReranker,
    };
    use crate::topic::TriggerPool;
    use dr_model::{Decoder, GenerationConfig};
    use std::sync::{Arc, Mutex};

    struct Echo;

    impl Retriever for Echo {
        fn search(&self, _topic: Option<Topic>, query: &str, _samples: usize) -> Result<Vec<Retrieved>> {
            Ok(vec![Retrieved {
                text: format!("echo {}", query),
                score: 1.0,
            }])
        }
    }

    fn config(mode: RunMode) -> AgentConfig {
        AgentConfig {
            generation: GenerationConfig {
                top_k: 1,
                max_len: 4,
                ..GenerationConfig::default()
            },
            run_mode: mode,
            batch_size: 2,
            ..AgentConfig::default()
        }
    }

    /// Reranker that prefers the last candidate.
    fn orchestrator(mode: RunMode) -> ResponseOrchestrator<RowModel> {
        let cfg = config(mode);
        ResponseOrchestrator::new(
            RowModel::new(64),
            Arc::new(LetterTokenizer),
            Decoder::new(&cfg.generation, special()),
            Box::new(ScriptedReranker {
                scores: Box::new(|c: &[String]| (0..c.len()).map(|i| i as f32).collect()),
                calls: Arc::default(),
            }),
            Box::new(FixedTopic(true, Arc::new(Mutex::new(0)))),
            TriggerPool::new(),
            1,
        )
    }

    #[test]
    fn test_train_mode_is_rejected() {
        let result = Agent::new(orchestrator(RunMode::Train), config(RunMode::Train));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_test_mode_uses_single_decode() {
        let mut agent = Agent::new(orchestrator(RunMode::Test), config(RunMode::Test)).unwrap();
        assert_eq!(agent.talk(None, "你好").unwrap(), "eeee");
        assert_eq!(agent.history(), &["eeee".to_string()]);
    }

    #[test]
    fn test_rerank_mode_picks_from_generated() {
        let mut agent = Agent::new(orchestrator(RunMode::Rerank), config(RunMode::Rerank)).unwrap();
        assert_eq!(agent.talk(None, "你好").unwrap(), "f");
        assert_eq!(agent.talk(None, "再见").unwrap(), "f");
        assert_eq!(agent.history().len(), 2);
        agent.clear_history();
        assert!(agent.history().is_empty());
    }

    #[test]
    fn test_retrieval_mode_needs_retriever() {
        let mode = RunMode::RerankRetrieval;
        assert!(Agent::new(orchestrator(mode), config(mode)).is_err());

        let orch = orchestrator(mode).with_retriever(Box::new(Echo));
        let mut agent = Agent::new(orch, config(mode)).unwrap();
        assert_eq!(agent.talk(None, "你好").unwrap(), "echo 你好");

        // The same retrieved reply is now history and gets filtered out.
        assert_eq!(agent.talk(None, "你好").unwrap(), "f");
    }
}
