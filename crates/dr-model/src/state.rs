/// Per-sequence decode bookkeeping: the generated history and a stop flag.
///
/// The flag only ever goes from `false` to `true`. The model cache is not
/// stored here; it is batch-wide and owned by the decode call.
#[derive(Debug, Clone, Default)]
pub struct DecodeState {
    generated: Vec<u32>,
    stopped: bool,
}

impl DecodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sampled token, raising the stop flag if it is `stop_id`.
    pub fn push(&mut self, token: u32, stop_id: u32) {
        if token == stop_id {
            self.stopped = true;
        }
        self.generated.push(token);
    }

    pub fn generated(&self) -> &[u32] {
        &self.generated
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn into_generated(self) -> Vec<u32> {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_sticky() {
        let mut s = DecodeState::new();
        s.push(4, 2);
        assert!(!s.is_stopped());
        s.push(2, 2);
        assert!(s.is_stopped());
        s.push(9, 2);
        assert!(s.is_stopped());
        assert_eq!(s.generated(), &[4, 2, 9]);
    }
}
