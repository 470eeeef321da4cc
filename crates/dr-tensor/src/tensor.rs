use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// A dense tensor of f32 values in contiguous row-major order.
///
/// Most of the workspace only ever looks at a tensor one "row" at a time,
/// where a row is a slice along dimension 0 flattened to its trailing
/// elements. Logits for a decode step are `[batch, vocab]` so a row is one
/// sequence's distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    /// Wrap row-major `data` laid out as `shape`.
    ///
    /// # Panics
    /// If the element count of `shape` differs from `data.len()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "{} values cannot fill shape {}",
            data.len(),
            shape
        );
        Tensor { data, shape }
    }

    pub fn zeros(shape: Shape) -> Self {
        Tensor {
            data: vec![0.0; shape.numel()],
            shape,
        }
    }

    /// Build a `[rows, cols]` tensor from equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Tensor> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(TensorError::RaggedRows {
                    index,
                    expected: cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Tensor {
            data,
            shape: Shape::new(vec![rows.len(), cols]),
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of rows (size of dimension 0).
    pub fn n_rows(&self) -> usize {
        self.shape.leading()
    }

    /// Number of elements per row.
    pub fn row_len(&self) -> usize {
        self.shape.trailing_numel()
    }

    /// Returns row `index`.
    pub fn row(&self, index: usize) -> Result<&[f32]> {
        let rows = self.n_rows();
        if index >= rows {
            return Err(TensorError::RowOutOfRange { index, rows });
        }
        let len = self.row_len();
        Ok(&self.data[index * len..(index + 1) * len])
    }

    /// Returns row `index` mutably.
    pub fn row_mut(&mut self, index: usize) -> Result<&mut [f32]> {
        let rows = self.n_rows();
        if index >= rows {
            return Err(TensorError::RowOutOfRange { index, rows });
        }
        let len = self.row_len();
        Ok(&mut self.data[index * len..(index + 1) * len])
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.row_len().max(1))
    }

    /// Iterate over rows mutably.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let len = self.row_len().max(1);
        self.data.chunks_mut(len)
    }

    /// Copy out `len` rows starting at `start`.
    pub fn narrow(&self, start: usize, len: usize) -> Result<Tensor> {
        let rows = self.n_rows();
        if start + len > rows {
            return Err(TensorError::RowOutOfRange {
                index: start + len,
                rows,
            });
        }
        let row_len = self.row_len();
        Ok(Tensor {
            data: self.data[start * row_len..(start + len) * row_len].to_vec(),
            shape: self.shape.with_leading(len),
        })
    }

    /// Concatenate tensors along dimension 0, preserving input order.
    ///
    /// All inputs must agree on every dimension except the first.
    pub fn cat(tensors: &[Tensor]) -> Result<Tensor> {
        let first = tensors.first().ok_or(TensorError::EmptyConcat)?;
        let trailing = &first.shape.dims()[1.min(first.shape.ndim())..];

        let mut rows = 0;
        let mut data = Vec::with_capacity(tensors.iter().map(|t| t.data.len()).sum());
        for t in tensors {
            let dims = t.shape.dims();
            if dims.len() != first.shape.ndim() || &dims[1.min(dims.len())..] != trailing {
                return Err(TensorError::ShapeMismatch {
                    expected: first.shape.dims().to_vec(),
                    got: dims.to_vec(),
                });
            }
            rows += t.n_rows();
            data.extend_from_slice(&t.data);
        }

        Ok(Tensor {
            data,
            shape: first.shape.with_leading(rows),
        })
    }
}
