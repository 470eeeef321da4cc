use std::collections::VecDeque;
use std::sync::Arc;

use dr_model::Tokenizer;

/// One scored (context, response) pair with its decoded text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    pub context: Vec<u32>,
    pub response: Vec<u32>,
    pub score: f32,
    pub context_text: String,
    pub response_text: String,
}

impl ReplayRecord {
    /// Context followed by the response without its leading marker.
    pub fn training_sequence(&self) -> Vec<u32> {
        let mut seq = self.context.clone();
        seq.extend(self.response.iter().skip(1));
        seq
    }
}

/// Bounded FIFO of scored exchanges that also yields padded training
/// batches.
///
/// Iterating reads each record by rotating it from the front to the back,
/// so a complete pass leaves membership and order unchanged. A pass ends
/// once as many records have been read as the buffer holds; the next call
/// to `next` after that starts a new pass.
///
/// Not safe for concurrent use. Pushing during a pass changes where the
/// pass ends.
pub struct ReplayBuffer {
    memory: VecDeque<ReplayRecord>,
    capacity: usize,
    batch_size: usize,
    read_count: usize,
    pad_id: u32,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ReplayBuffer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, capacity: usize, batch_size: usize) -> Self {
        let pad_id = tokenizer.special().pad;
        Self {
            memory: VecDeque::with_capacity(capacity),
            capacity,
            batch_size: batch_size.max(1),
            read_count: 0,
            pad_id,
            tokenizer,
        }
    }

    /// Insert a record, evicting the oldest one when full.
    pub fn push(&mut self, context: Vec<u32>, response: Vec<u32>, score: f32) {
        if self.capacity == 0 {
            return;
        }
        if self.memory.len() == self.capacity {
            self.memory.pop_front();
        }
        let context_text = self.tokenizer.decode(&context);
        let response_text = self.tokenizer.decode(&response);
        self.memory.push_back(ReplayRecord {
            context,
            response,
            score,
            context_text,
            response_text,
        });
    }

    pub fn push_many<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (Vec<u32>, Vec<u32>, f32)>,
    {
        for (context, response, score) in records {
            self.push(context, response, score);
        }
    }

    /// Rotate the front record to the back and return a copy of it.
    fn obtain(&mut self) -> Option<ReplayRecord> {
        let record = self.memory.pop_front()?;
        self.memory.push_back(record.clone());
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Records from oldest to newest.
    pub fn records(&self) -> impl Iterator<Item = &ReplayRecord> {
        self.memory.iter()
    }
}

impl Iterator for ReplayBuffer {
    type Item = Vec<Vec<u32>>;

    fn next(&mut self) -> Option<Self::Item> {
        let size = self.memory.len();
        if self.read_count >= size {
            self.read_count = 0;
            return None;
        }
        let take = self.batch_size.min(size - self.read_count);
        let mut seqs = Vec::with_capacity(take);
        for _ in 0..take {
            let record = self.obtain()?;
            seqs.push(record.training_sequence());
        }
        self.read_count += take;
        Some(pad_sequences(seqs, self.pad_id))
    }
}

/// Right-pad every sequence with `pad` to the longest length.
pub fn pad_sequences(mut seqs: Vec<Vec<u32>>, pad: u32) -> Vec<Vec<u32>> {
    let longest = seqs.iter().map(Vec::len).max().unwrap_or(0);
    for seq in &mut seqs {
        seq.resize(longest, pad);
    }
    seqs
}
