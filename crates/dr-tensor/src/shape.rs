use std::fmt;

/// Dimension sizes of a [`Tensor`](crate::Tensor).
///
/// Dimension 0 is the batch dimension everywhere in this workspace: logits
/// for one decode step are `[batch, vocab]`, training logits are
/// `[batch, seq, vocab]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count; the empty shape counts as one scalar.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of the batch dimension. A scalar shape has one row.
    pub fn leading(&self) -> usize {
        self.dims.first().copied().unwrap_or(1)
    }

    /// Elements per batch row.
    pub fn trailing_numel(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    /// This shape with the batch dimension set to `n`.
    pub fn with_leading(&self, n: usize) -> Shape {
        let mut dims = self.dims.clone();
        match dims.first_mut() {
            Some(d) => *d = n,
            None => dims.push(n),
        }
        Shape { dims }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}
