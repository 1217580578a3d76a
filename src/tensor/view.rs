//! Zero-copy view derivations.
//!
//! Every derivation keeps the buffer (or a sub-buffer window of it) and
//! replaces the dimensions and index system. Only [`Tensor::make_dense`]
//! copies data.

use super::Tensor;
use crate::backend::Backend;
use crate::check;
use crate::dims::Dimensions;
use crate::error::{Result, TensorError};
use crate::index::{Gather, IndexSystem};

impl<B: Backend> Tensor<B> {
    /// `(rows, columns, column_stride)` of the 2D fold of a monotonic view.
    ///
    /// Padded views take their row layout from the index system; dense views
    /// from their dimensions.
    fn layout(&self, operation: &'static str) -> Result<(usize, usize, usize)> {
        let index = self.index_system();
        if index.is_indexed() {
            return Err(TensorError::GatheredView { operation });
        }
        match (index.column_stride(), index.num_columns()) {
            (Some(stride), Some(cols)) if !index.is_dense() => {
                Ok((index.element_count() / cols, cols, stride))
            }
            _ => {
                let (rows, cols) = self.dimensions().as_2d();
                Ok((rows, cols, cols))
            }
        }
    }

    fn derive(&self, dims: Dimensions, index: IndexSystem<B>, buffer: B::Buffer) -> Self {
        Self::from_parts(self.driver().clone(), dims, index, buffer)
    }

    /// View the same memory through new dimensions with the same element count.
    pub fn reinterpret(&self, dims: Dimensions) -> Result<Self> {
        if dims.element_count() != self.index_system().element_count() {
            return Err(TensorError::Shape {
                reason: "reinterpret must keep the element count",
                shape: dims.to_shape(),
            });
        }
        Ok(self.derive(dims, self.index_system().clone(), self.buffer().clone()))
    }

    /// Dense 1D window of `len` elements starting at `offset`.
    ///
    /// `len` defaults to the rest of the view.
    pub fn sub_vector(&self, offset: usize, len: Option<usize>) -> Result<Self> {
        if self.is_indexed() {
            return Err(TensorError::GatheredView { operation: "sub_vector" });
        }
        if !self.is_dense() {
            return Err(TensorError::NotDense { operation: "sub_vector" });
        }
        let count = self.element_count();
        if offset > count {
            return Err(TensorError::OutOfRange {
                operation: "sub_vector",
                start: offset,
                end: offset,
                extent: count,
            });
        }
        let len = len.unwrap_or(count - offset);
        let end = offset.saturating_add(len);
        if end > count {
            return Err(TensorError::Capacity {
                required: end,
                available: count,
            });
        }
        let buffer = self.driver().sub_buffer(self.buffer(), offset, len)?;
        Ok(self.derive(self.dimensions().reshaped_1d(len), IndexSystem::monotonic(len), buffer))
    }

    /// Rectangular window of the 2D fold.
    ///
    /// The window keeps the parent's row pitch. It is dense when it spans
    /// whole rows or a single row, padded otherwise.
    pub fn sub_matrix(&self, row_start: usize, row_len: usize, col_start: usize, col_len: usize) -> Result<Self> {
        let (rows, cols, stride) = self.layout("sub_matrix")?;
        check_range("sub_matrix rows", row_start, row_len, rows)?;
        check_range("sub_matrix columns", col_start, col_len, cols)?;

        let count = row_len * col_len;
        let dims = self.dimensions().reshaped_2d(row_len, col_len);
        if count == 0 {
            let buffer = self.driver().sub_buffer(self.buffer(), 0, 0)?;
            return Ok(self.derive(dims, IndexSystem::monotonic(0), buffer));
        }

        let start = row_start * stride + col_start;
        let span = (row_len - 1) * stride + col_len;
        let buffer = self.driver().sub_buffer(self.buffer(), start, span)?;
        let index = if row_len <= 1 || col_len == stride {
            IndexSystem::monotonic(count)
        } else {
            IndexSystem::monotonic(count).with_stride(stride, col_len)?
        };
        Ok(self.derive(dims, index, buffer))
    }

    /// One dense 1D view per row of the 2D fold.
    pub fn rows(&self) -> Result<Vec<Self>> {
        let (rows, cols, stride) = self.layout("rows")?;
        (0..rows)
            .map(|r| {
                let buffer = self.driver().sub_buffer(self.buffer(), r * stride, cols)?;
                Ok(self.derive(self.dimensions().reshaped_1d(cols), IndexSystem::monotonic(cols), buffer))
            })
            .collect()
    }

    /// One 1D view per column of the 2D fold, stepping by the row pitch.
    pub fn columns(&self) -> Result<Vec<Self>> {
        let (rows, cols, stride) = self.layout("columns")?;
        (0..cols)
            .map(|c| {
                let dims = self.dimensions().reshaped_1d(rows);
                if rows <= 1 {
                    let buffer = self.driver().sub_buffer(self.buffer(), c, rows)?;
                    return Ok(self.derive(dims, IndexSystem::monotonic(rows), buffer));
                }
                let span = (rows - 1) * stride + 1;
                let buffer = self.driver().sub_buffer(self.buffer(), c, span)?;
                let index = IndexSystem::monotonic(rows).with_stride(stride, 1)?;
                Ok(self.derive(dims, index, buffer))
            })
            .collect()
    }

    /// Select rows of the 2D fold through `indexes`: result is `(n, cols)`.
    pub fn index_rows(&self, indexes: &Tensor<B>) -> Result<Self> {
        let (rows, cols, stride) = self.layout("index_rows")?;
        let n = self.check_gather("index_rows", indexes, rows)?;
        let index = IndexSystem::gathered(indexes, cols, stride, Gather::Rows, n * cols)?;
        Ok(self.derive(self.dimensions().reshaped_2d(n, cols), index, self.buffer().clone()))
    }

    /// Select columns of the 2D fold through `indexes`: result is `(rows, n)`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stridecast::{Context, Cpu, Dimensions};
    ///
    /// let ctx = Context::new(Cpu::new()).unwrap();
    /// let m = ctx
    ///     .from_data(&[1i32, 2, 3, 4, 5, 6], Dimensions::matrix(2, 3))
    ///     .unwrap();
    /// let picks = ctx.from_data(&[2u32, 0], Dimensions::vector(2)).unwrap();
    /// let g = m.index_columns(&picks).unwrap();
    /// assert_eq!(g.to_vec::<i32>(ctx.stream()).unwrap(), vec![3, 1, 6, 4]);
    /// ```
    pub fn index_columns(&self, indexes: &Tensor<B>) -> Result<Self> {
        let (rows, cols, stride) = self.layout("index_columns")?;
        let n = self.check_gather("index_columns", indexes, cols)?;
        let index = IndexSystem::gathered(indexes, 1, stride, Gather::Columns, rows * n)?;
        Ok(self.derive(self.dimensions().reshaped_2d(rows, n), index, self.buffer().clone()))
    }

    /// Select individual elements of a dense view through `indexes`.
    pub fn index_elements(&self, indexes: &Tensor<B>) -> Result<Self> {
        if self.is_indexed() {
            return Err(TensorError::GatheredView { operation: "index_elements" });
        }
        if !self.is_dense() {
            return Err(TensorError::NotDense { operation: "index_elements" });
        }
        let n = self.check_gather("index_elements", indexes, self.element_count())?;
        let index = IndexSystem::gathered(indexes, 1, 1, Gather::Rows, n)?;
        Ok(self.derive(self.dimensions().reshaped_1d(n), index, self.buffer().clone()))
    }

    fn check_gather(&self, operation: &'static str, indexes: &Tensor<B>, axis: usize) -> Result<usize> {
        check::same_driver(self.driver(), indexes.driver())?;
        check::same_device(self.device(), indexes.device())?;
        let n = indexes.element_count();
        if n > 0 && axis == 0 {
            return Err(TensorError::EmptyGatherAxis { operation, count: n });
        }
        Ok(n)
    }

    /// A dense view with this view's logical content.
    ///
    /// Returns a clone sharing the same buffer when already dense; otherwise
    /// allocates a fresh buffer and copies through the generic assignment.
    pub fn make_dense(&self, stream: &B::Stream) -> Result<Self> {
        if self.is_dense() {
            return Ok(self.clone());
        }
        tracing::trace!(count = self.element_count(), indexed = self.is_indexed(), "make_dense copy");
        let dense = Tensor::zeros(self.driver(), self.device(), self.datatype(), *self.dimensions())?;
        dense.assign(stream, self)?;
        Ok(dense)
    }
}

fn check_range(operation: &'static str, start: usize, len: usize, extent: usize) -> Result<()> {
    let end = start.saturating_add(len);
    if end > extent {
        return Err(TensorError::OutOfRange {
            operation,
            start,
            end,
            extent,
        });
    }
    Ok(())
}
