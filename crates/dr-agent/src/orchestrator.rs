//! Candidate generation, retrieval merge and reranking for one reply.
//!
//! A reply is produced in five stages:
//!
//! 1. If a topic is requested and the context has drifted off it, a trigger
//!    utterance for the topic is prepended to the context.
//! 2. `batch_size` responses are sampled from the model in one batched
//!    decode and cut at their first stop token.
//! 3. Optionally, stored responses are fetched from the retriever and
//!    appended after the generated ones. Hits already said in the
//!    conversation, links and duplicates are dropped. When nothing
//!    survives, the request is widened by one and retried, up to a fixed
//!    number of attempts, after which only generated candidates are used.
//! 4. The reranker scores every candidate.
//! 5. The highest score wins, earliest candidate first on ties.

use std::collections::HashSet;
use std::sync::Arc;

use dr_model::generate::keep_last;
use dr_model::{truncate_at_stop, Decoder, SequenceModel, Tokenizer};
use dr_tensor::argmax;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::candidate::{Candidate, Response, Source};
use crate::collab::{Reranker, Retriever, TopicScorer};
use crate::error::{AgentError, Result};
use crate::topic::{Topic, TriggerPool};

/// Marker joining utterances inside a context string.
pub const SEP_MARKER: &str = "[SEP]";

pub const DEFAULT_MAX_RETRIEVAL_ATTEMPTS: usize = 8;

pub struct ResponseOrchestrator<M: SequenceModel> {
    model: M,
    tokenizer: Arc<dyn Tokenizer>,
    decoder: Decoder,
    reranker: Box<dyn Reranker>,
    topic_scorer: Box<dyn TopicScorer>,
    retriever: Option<Box<dyn Retriever>>,
    triggers: TriggerPool,
    rng: StdRng,
    max_retrieval_attempts: usize,
}

impl<M: SequenceModel> ResponseOrchestrator<M> {
    pub fn new(
        model: M,
        tokenizer: Arc<dyn Tokenizer>,
        decoder: Decoder,
        reranker: Box<dyn Reranker>,
        topic_scorer: Box<dyn TopicScorer>,
        triggers: TriggerPool,
        seed: u64,
    ) -> Self {
        Self {
            model,
            tokenizer,
            decoder,
            reranker,
            topic_scorer,
            retriever: None,
            triggers,
            rng: StdRng::seed_from_u64(seed),
            max_retrieval_attempts: DEFAULT_MAX_RETRIEVAL_ATTEMPTS,
        }
    }

    pub fn with_retriever(mut self, retriever: Box<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Cap on retrieval queries per reply. At least one query is always made.
    pub fn with_max_retrieval_attempts(mut self, attempts: usize) -> Self {
        self.max_retrieval_attempts = attempts.max(1);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    /// Produce one reply to `context` from generated and, if
    /// `retrieval_enabled`, retrieved candidates.
    pub fn respond(
        &mut self,
        context: &str,
        topic: Option<Topic>,
        history: &[String],
        batch_size: usize,
        max_len: usize,
        retrieval_enabled: bool,
    ) -> Result<Response> {
        if batch_size == 0 {
            return Err(AgentError::Config("batch size must be positive".to_string()));
        }
        if retrieval_enabled && self.retriever.is_none() {
            return Err(AgentError::Config(
                "retrieval requested but no retriever is configured".to_string(),
            ));
        }

        let context = self.apply_trigger(context, topic)?;

        let mut candidates: Vec<Candidate> = self
            .sample_responses(&context, batch_size, max_len)?
            .into_iter()
            .map(Candidate::generative)
            .collect();
        let n_generative = candidates.len();

        if retrieval_enabled {
            let retrieved = self.retrieve(&context, topic, history, batch_size)?;
            candidates.extend(retrieved.into_iter().map(Candidate::retrieval));
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let contexts = vec![context; texts.len()];
        let scores = self.reranker.score(&contexts, &texts, topic, history)?;
        if scores.len() != candidates.len() {
            return Err(AgentError::Reranker(format!(
                "got {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }
        for (candidate, &score) in candidates.iter_mut().zip(&scores) {
            candidate.score = Some(score);
        }

        let index = argmax(&scores)
            .ok_or_else(|| AgentError::Reranker("no candidate has a valid score".to_string()))?;
        let n_candidates = candidates.len();
        let winner = candidates.swap_remove(index);
        info!(
            index,
            n_candidates,
            n_generative,
            source = %winner.source,
            "selected response"
        );
        Ok(Response {
            text: winner.text,
            source: winner.source,
            index,
            n_candidates,
        })
    }

    /// Single-sequence reply without reranking.
    pub fn reply_single(&mut self, context: &str, topic: Option<Topic>, max_len: usize) -> Result<String> {
        let context = self.apply_trigger(context, topic)?;
        let prompt = self.prompt(&context, max_len);
        let generated = self
            .decoder
            .generate(&mut self.model, &prompt, max_len, &mut self.rng)?;
        Ok(self.tokenizer.decode(&generated))
    }

    /// Prepend a trigger utterance when the context is off `topic`.
    pub fn apply_trigger(&mut self, context: &str, topic: Option<Topic>) -> Result<String> {
        let Some(topic) = topic else {
            return Ok(context.to_string());
        };
        if self.topic_scorer.is_on_topic(context, topic)? {
            return Ok(context.to_string());
        }
        let trigger = self.triggers.choose(topic, &mut self.rng)?;
        let context = format!("{} {} {}", trigger, SEP_MARKER, context);
        info!(%topic, %context, "topic trigger injected");
        Ok(context)
    }

    /// Encoded context trimmed to leave room for `max_len` new tokens.
    /// At least one token is kept, so a `max_len` that fills the whole
    /// window is rejected by the batched decoder.
    fn prompt(&self, context: &str, max_len: usize) -> Vec<u32> {
        let ids = self.tokenizer.encode(context);
        let budget = self.model.context_window().saturating_sub(max_len).max(1);
        keep_last(&ids, budget).to_vec()
    }

    fn sample_responses(&mut self, context: &str, batch_size: usize, max_len: usize) -> Result<Vec<String>> {
        let prompt = self.prompt(context, max_len);
        let prompts = vec![prompt; batch_size];
        let rows = self
            .decoder
            .generate_batch(&mut self.model, &prompts, max_len, &mut self.rng)?;
        let stop = self.decoder.stop_id();
        Ok(rows
            .iter()
            .map(|row| self.tokenizer.decode(truncate_at_stop(row, stop)))
            .collect())
    }

    /// Query the retriever, widening the request until a hit survives
    /// filtering or the attempt cap is reached.
    fn retrieve(
        &self,
        query: &str,
        topic: Option<Topic>,
        history: &[String],
        samples: usize,
    ) -> Result<Vec<String>> {
        let Some(retriever) = self.retriever.as_ref() else {
            return Ok(Vec::new());
        };
        for attempt in 0..self.max_retrieval_attempts {
            let requested = samples + attempt;
            let hits = retriever.search(topic, query, requested)?;
            let survivors = filter_retrieved(hits.into_iter().map(|h| h.text), history);
            if !survivors.is_empty() {
                debug!(attempt, requested, kept = survivors.len(), "retrieval done");
                return Ok(survivors);
            }
            debug!(attempt, requested, "no usable retrieval hits, widening");
        }
        warn!(
            attempts = self.max_retrieval_attempts,
            "retrieval produced no usable candidates, using generated responses only"
        );
        Ok(Vec::new())
    }
}

/// Drop responses already in `history`, links and repeats, keeping order.
fn filter_retrieved(texts: impl IntoIterator<Item = String>, history: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    texts
        .into_iter()
        .filter(|t| !t.contains("http"))
        .filter(|t| !history.contains(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collab::Retrieved;
    use dr_model::{GenerationConfig, ModelError, SpecialTokens};
    use dr_tensor::{Shape, Tensor};
    use std::sync::Mutex;

    const VOCAB: usize = 32;
    const SEP: u32 = 3;

    pub(crate) fn special() -> SpecialTokens {
        SpecialTokens {
            pad: 0,
            unk: 1,
            cls: 2,
            sep: SEP,
        }
    }

    /// Maps every character to token 4 and decodes token `n` to the
    /// letter `n` places after `a`.
    pub(crate) struct LetterTokenizer;

    impl Tokenizer for LetterTokenizer {
        fn encode(&self, text: &str) -> Vec<u32> {
            let mut ids = vec![2];
            ids.extend(text.chars().filter(|c| !c.is_whitespace()).map(|_| 4));
            ids.push(SEP);
            ids
        }

        fn decode(&self, ids: &[u32]) -> String {
            ids.iter()
                .filter(|&&id| id > SEP)
                .map(|&id| (b'a' + id as u8) as char)
                .collect()
        }

        fn special(&self) -> SpecialTokens {
            special()
        }
    }

    /// Row `i` answers token `4 + i` and then the stop token. Without a
    /// cache (single decode) the answer depends on the input length.
    pub(crate) struct RowModel {
        pub n_ctx: usize,
        pub prompts: Vec<Vec<u32>>,
    }

    impl RowModel {
        pub(crate) fn new(n_ctx: usize) -> Self {
            Self {
                n_ctx,
                prompts: Vec::new(),
            }
        }
    }

    impl SequenceModel for RowModel {
        type Cache = usize;

        fn forward(&mut self, tokens: &[Vec<u32>], cache: Option<usize>) -> dr_model::Result<(Tensor, usize)> {
            let step = match cache {
                Some(s) => s,
                None => {
                    self.prompts.push(tokens[0].clone());
                    0
                }
            };
            let mut data = Vec::with_capacity(tokens.len() * VOCAB);
            for i in 0..tokens.len() {
                let fav = if step == 0 { 4 + i } else { SEP as usize };
                data.extend((0..VOCAB).map(|v| if v == fav { 30.0 } else { 0.0 }));
            }
            Ok((Tensor::new(data, Shape::new(vec![tokens.len(), VOCAB])), step + 1))
        }

        fn vocab_size(&self) -> usize {
            VOCAB
        }

        fn context_window(&self) -> usize {
            self.n_ctx
        }
    }

    type Calls = Arc<Mutex<Vec<(Vec<String>, Vec<String>)>>>;

    pub(crate) struct ScriptedReranker {
        pub scores: Box<dyn Fn(&[String]) -> Vec<f32> + Send + Sync>,
        pub calls: Calls,
    }

    impl Reranker for ScriptedReranker {
        fn score(
            &self,
            contexts: &[String],
            candidates: &[String],
            _topic: Option<Topic>,
            _history: &[String],
        ) -> Result<Vec<f32>> {
            self.calls
                .lock()
                .unwrap()
                .push((contexts.to_vec(), candidates.to_vec()));
            Ok((self.scores)(candidates))
        }
    }

    pub(crate) struct FixedTopic(pub bool, pub Arc<Mutex<usize>>);

    impl TopicScorer for FixedTopic {
        fn is_on_topic(&self, _text: &str, _topic: Topic) -> Result<bool> {
            *self.1.lock().unwrap() += 1;
            Ok(self.0)
        }
    }

    /// Answers attempt `n` with `pages[n]` (or the last page).
    struct PagedRetriever {
        pages: Vec<Vec<&'static str>>,
        requests: Arc<Mutex<Vec<usize>>>,
    }

    impl Retriever for PagedRetriever {
        fn search(&self, _topic: Option<Topic>, _query: &str, samples: usize) -> Result<Vec<Retrieved>> {
            let mut requests = self.requests.lock().unwrap();
            let page = self.pages[requests.len().min(self.pages.len() - 1)].clone();
            requests.push(samples);
            Ok(page
                .into_iter()
                .map(|t| Retrieved {
                    text: t.to_string(),
                    score: 1.0,
                })
                .collect())
        }
    }

    fn decoder() -> Decoder {
        let config = GenerationConfig {
            top_k: 1,
            ..GenerationConfig::default()
        };
        Decoder::new(&config, special())
    }

    fn orchestrator(
        scores: impl Fn(&[String]) -> Vec<f32> + Send + Sync + 'static,
        on_topic: bool,
    ) -> (ResponseOrchestrator<RowModel>, Calls, Arc<Mutex<usize>>) {
        let calls: Calls = Arc::default();
        let topic_calls = Arc::new(Mutex::new(0));
        let mut triggers = TriggerPool::new();
        triggers.insert(Topic::Music, "聊聊音乐吧");
        let orch = ResponseOrchestrator::new(
            RowModel::new(64),
            Arc::new(LetterTokenizer),
            decoder(),
            Box::new(ScriptedReranker {
                scores: Box::new(scores),
                calls: calls.clone(),
            }),
            Box::new(FixedTopic(on_topic, topic_calls.clone())),
            triggers,
            7,
        );
        (orch, calls, topic_calls)
    }

    fn paged(pages: Vec<Vec<&'static str>>) -> (Box<dyn Retriever>, Arc<Mutex<Vec<usize>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(PagedRetriever {
                pages,
                requests: requests.clone(),
            }),
            requests,
        )
    }

    #[test]
    fn test_generated_candidates_are_cut_at_stop() {
        let (mut orch, calls, _) = orchestrator(|c| vec![0.0; c.len()], true);
        let reply = orch.respond("你好", None, &[], 3, 10, false).unwrap();
        assert_eq!(reply.n_candidates, 3);
        let (_, candidates) = &calls.lock().unwrap()[0];
        assert_eq!(candidates, &vec!["e".to_string(), "f".to_string(), "g".to_string()]);
    }

    #[test]
    fn test_highest_score_wins_and_ties_prefer_earliest() {
        let (mut orch, _, _) = orchestrator(|_| vec![0.1, 0.9, 0.9, 0.2], true);
        let reply = orch.respond("你好", None, &[], 4, 10, false).unwrap();
        assert_eq!(reply.index, 1);
        assert_eq!(reply.text, "f");
        assert_eq!(reply.source, Source::Generative);
    }

    #[test]
    fn test_nan_score_never_wins() {
        let (mut orch, _, _) = orchestrator(|_| vec![f32::NAN, -1.0], true);
        let reply = orch.respond("你好", None, &[], 2, 10, false).unwrap();
        assert_eq!(reply.index, 1);
    }

    #[test]
    fn test_retrieved_candidates_follow_generated_ones() {
        let (orch, calls, _) = orchestrator(|c| (0..c.len()).map(|i| i as f32).collect(), true);
        let (retriever, requests) = paged(vec![vec![
            "我也喜欢",
            "see http://x.cn",
            "说过了",
            "我也喜欢",
            "好啊",
        ]]);
        let mut orch = orch.with_retriever(retriever);
        let history = vec!["说过了".to_string()];

        let reply = orch.respond("你好", None, &history, 2, 10, true).unwrap();
        let (_, candidates) = &calls.lock().unwrap()[0];
        assert_eq!(candidates, &vec!["e", "f", "我也喜欢", "好啊"]);
        assert_eq!(reply.text, "好啊");
        assert_eq!(reply.source, Source::Retrieval);
        assert_eq!(*requests.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_retrieval_widens_until_something_survives() {
        let (orch, _, _) = orchestrator(|c| vec![0.0; c.len()], true);
        let (retriever, requests) = paged(vec![vec![], vec!["http://a"], vec!["真的吗"]]);
        let mut orch = orch.with_retriever(retriever);
        let reply = orch.respond("你好", None, &[], 2, 10, true).unwrap();
        assert_eq!(reply.n_candidates, 3);
        assert_eq!(*requests.lock().unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_retrieval_gives_up_after_cap() {
        let (orch, _, _) = orchestrator(|c| vec![0.0; c.len()], true);
        let (retriever, requests) = paged(vec![vec![]]);
        let mut orch = orch.with_retriever(retriever).with_max_retrieval_attempts(3);
        let reply = orch.respond("你好", None, &[], 2, 10, true).unwrap();
        assert_eq!(reply.n_candidates, 2);
        assert_eq!(reply.source, Source::Generative);
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_off_topic_context_gets_trigger() {
        let (mut orch, calls, topic_calls) = orchestrator(|c| vec![0.0; c.len()], false);
        orch.respond("今天好累", Some(Topic::Music), &[], 1, 10, false).unwrap();
        let (contexts, _) = &calls.lock().unwrap()[0];
        assert_eq!(contexts[0], "聊聊音乐吧 [SEP] 今天好累");
        assert_eq!(*topic_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_on_topic_or_no_topic_leaves_context() {
        let (mut orch, calls, topic_calls) = orchestrator(|c| vec![0.0; c.len()], true);
        orch.respond("听歌吗", Some(Topic::Music), &[], 1, 10, false).unwrap();
        orch.respond("听歌吗", None, &[], 1, 10, false).unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0[0], "听歌吗");
        assert_eq!(calls[1].0[0], "听歌吗");
        assert_eq!(*topic_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_missing_trigger_pool_is_config_error() {
        let (mut orch, _, _) = orchestrator(|c| vec![0.0; c.len()], false);
        let err = orch.respond("你好", Some(Topic::Sport), &[], 1, 10, false).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_prompt_leaves_room_for_response() {
        let (mut orch, _, _) = orchestrator(|c| vec![0.0; c.len()], true);
        orch.respond("一二三四五六七八九十", None, &[], 2, 60, false).unwrap();
        // 64 positions minus 60 for the response.
        assert_eq!(orch.model().prompts[0], vec![4, 4, 4, SEP]);
    }

    #[test]
    fn test_response_longer_than_context_is_rejected() {
        let (mut orch, calls, _) = orchestrator(|c| vec![0.0; c.len()], true);
        let err = orch.respond("你好", None, &[], 2, 64, false).unwrap_err();
        assert!(matches!(err, AgentError::Model(ModelError::InvalidInput(_))));
        assert!(orch.model().prompts.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reranker_length_mismatch() {
        let (mut orch, _, _) = orchestrator(|_| vec![1.0], true);
        let err = orch.respond("你好", None, &[], 3, 10, false).unwrap_err();
        assert!(matches!(err, AgentError::Reranker(_)));
    }

    #[test]
    fn test_retrieval_without_retriever_is_rejected() {
        let (mut orch, _, _) = orchestrator(|c| vec![0.0; c.len()], true);
        assert!(matches!(
            orch.respond("你好", None, &[], 2, 10, true),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_reply_single_decodes_until_stop() {
        let (mut orch, _, _) = orchestrator(|c| vec![0.0; c.len()], true);
        // Without a cache the stub always sits at step 0, so row 0 keeps
        // answering token 4 until max_len.
        let text = orch.reply_single("你好", None, 3).unwrap();
        assert_eq!(text, "eee");
    }
}
