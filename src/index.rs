//! Addressing strategies.
//!
//! An [`IndexSystem`] maps a logical element position to a physical offset in
//! a buffer. Every view derivation (sub-matrix, row and column extraction,
//! gathers) is expressed as "keep the buffer, replace the index system".
//!
//! Two strategies exist:
//!
//! - **monotonic**: offset equals position, or, with a column stride, rows of
//!   `num_columns` valid elements placed `column_stride` apart.
//! - **indexed**: an auxiliary integer tensor selects where each run of
//!   `elements_per_index` elements starts.

use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Result, TensorError};
use crate::tensor::Tensor;

/// Which axis an index tensor selects in a gathered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gather {
    /// Index value `v` selects the run starting at `v * column_stride`.
    Rows,
    /// Index value `v` selects column `v` of every row.
    Columns,
}

/// Addressing strategy tag.
pub enum Strategy<B: Backend> {
    Monotonic,
    Indexed {
        indexes: Arc<Tensor<B>>,
        elements_per_index: usize,
        gather: Gather,
    },
}

impl<B: Backend> Clone for Strategy<B> {
    fn clone(&self) -> Self {
        match self {
            Strategy::Monotonic => Strategy::Monotonic,
            Strategy::Indexed {
                indexes,
                elements_per_index,
                gather,
            } => Strategy::Indexed {
                indexes: Arc::clone(indexes),
                elements_per_index: *elements_per_index,
                gather: *gather,
            },
        }
    }
}

/// Addressing strategy for a view of `element_count()` logical elements.
pub struct IndexSystem<B: Backend> {
    strategy: Strategy<B>,
    len: usize,
    column_stride: Option<usize>,
    num_columns: Option<usize>,
}

impl<B: Backend> Clone for IndexSystem<B> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
            len: self.len,
            column_stride: self.column_stride,
            num_columns: self.num_columns,
        }
    }
}

impl<B: Backend> IndexSystem<B> {
    /// Dense addressing over `n` elements.
    pub fn monotonic(n: usize) -> Self {
        Self {
            strategy: Strategy::Monotonic,
            len: n,
            column_stride: None,
            num_columns: None,
        }
    }

    /// Padded-row addressing: rows of `num_columns` elements, `column_stride` apart.
    pub fn with_stride(self, column_stride: usize, num_columns: usize) -> Result<Self> {
        if num_columns > column_stride {
            return Err(TensorError::ColumnStride {
                num_columns,
                column_stride,
            });
        }
        let misaligned = match num_columns {
            0 => self.len != 0,
            n => self.len % n != 0,
        };
        if misaligned {
            return Err(TensorError::Shape {
                reason: "element count is not a whole number of rows",
                shape: vec![self.len, num_columns],
            });
        }
        Ok(Self {
            column_stride: Some(column_stride),
            num_columns: Some(num_columns),
            ..self
        })
    }

    /// Gather addressing: each entry of `indexes` selects a run of
    /// `elements_per_index` contiguous elements starting at
    /// `index * elements_per_index`.
    pub fn indexed(indexes: &Tensor<B>, elements_per_index: usize) -> Result<Self> {
        Self::gathered(
            indexes,
            elements_per_index,
            elements_per_index,
            Gather::Rows,
            indexes.element_count() * elements_per_index,
        )
    }

    pub(crate) fn gathered(
        indexes: &Tensor<B>,
        elements_per_index: usize,
        column_stride: usize,
        gather: Gather,
        len: usize,
    ) -> Result<Self> {
        validate_index_tensor(indexes)?;
        let num_columns = match gather {
            Gather::Rows => elements_per_index,
            Gather::Columns => indexes.element_count(),
        };
        Ok(Self {
            strategy: Strategy::Indexed {
                indexes: Arc::new(indexes.clone()),
                elements_per_index,
                gather,
            },
            len,
            column_stride: Some(column_stride),
            num_columns: Some(num_columns),
        })
    }

    pub fn strategy(&self) -> &Strategy<B> {
        &self.strategy
    }

    /// Number of logical elements addressed.
    pub fn element_count(&self) -> usize {
        self.len
    }

    /// Monotonic with no row padding: offset equals position.
    pub fn is_dense(&self) -> bool {
        match self.strategy {
            Strategy::Monotonic => match (self.column_stride, self.num_columns) {
                (Some(stride), Some(cols)) => stride == cols || self.len <= cols,
                _ => true,
            },
            Strategy::Indexed { .. } => false,
        }
    }

    /// Strictly increasing offsets without repetition, ignoring row padding.
    pub fn is_simple_monotonic(&self) -> bool {
        matches!(self.strategy, Strategy::Monotonic)
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.strategy, Strategy::Indexed { .. })
    }

    /// Run length materialized per index entry, for gathers.
    pub fn elements_per_index(&self) -> Option<usize> {
        match &self.strategy {
            Strategy::Monotonic => None,
            Strategy::Indexed {
                elements_per_index, ..
            } => Some(*elements_per_index),
        }
    }

    /// Number of index entries, for gathers.
    pub fn index_count(&self) -> Option<usize> {
        self.index_tensor().map(Tensor::element_count)
    }

    /// The index tensor of a gather.
    pub fn index_tensor(&self) -> Option<&Tensor<B>> {
        match &self.strategy {
            Strategy::Monotonic => None,
            Strategy::Indexed { indexes, .. } => Some(indexes),
        }
    }

    pub fn gather(&self) -> Option<Gather> {
        match &self.strategy {
            Strategy::Monotonic => None,
            Strategy::Indexed { gather, .. } => Some(*gather),
        }
    }

    /// Explicit row pitch, if any.
    pub fn column_stride(&self) -> Option<usize> {
        self.column_stride
    }

    /// Explicit valid row width, if any.
    pub fn num_columns(&self) -> Option<usize> {
        self.num_columns
    }

    /// Minimum buffer length this strategy reads or writes.
    pub fn required_length(&self) -> usize {
        match &self.strategy {
            Strategy::Monotonic => match (self.column_stride, self.num_columns) {
                (Some(stride), Some(cols)) if !self.is_dense() => {
                    let rows = self.len / cols;
                    stride * (rows - 1) + cols
                }
                _ => self.len,
            },
            Strategy::Indexed {
                indexes,
                elements_per_index,
                ..
            } => indexes.element_count() * elements_per_index,
        }
    }

    /// Physical offset of logical `position`.
    ///
    /// `indexes` holds the values of the index tensor for gathers and is
    /// ignored otherwise. `position` must be below [`IndexSystem::element_count`].
    /// Returns `None` when an index value drives the offset past `usize::MAX`.
    pub fn offset(&self, position: usize, indexes: &[usize]) -> Option<usize> {
        match &self.strategy {
            Strategy::Monotonic => match (self.column_stride, self.num_columns) {
                (Some(stride), Some(cols)) if cols != 0 && stride != cols => {
                    (position / cols).checked_mul(stride)?.checked_add(position % cols)
                }
                _ => Some(position),
            },
            Strategy::Indexed {
                elements_per_index,
                gather,
                ..
            } => {
                let stride = self.column_stride.unwrap_or(*elements_per_index);
                let n = indexes.len();
                if n == 0 {
                    return None;
                }
                match gather {
                    Gather::Rows => {
                        let run = (*elements_per_index).max(1);
                        indexes[(position / run) % n]
                            .checked_mul(stride)?
                            .checked_add(position % run)
                    }
                    Gather::Columns => (position / n)
                        .checked_mul(stride)?
                        .checked_add(indexes[position % n]),
                }
            }
        }
    }
}

impl<B: Backend> fmt::Debug for IndexSystem<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("IndexSystem");
        match &self.strategy {
            Strategy::Monotonic => s.field("strategy", &"monotonic"),
            Strategy::Indexed {
                indexes,
                elements_per_index,
                gather,
            } => s
                .field("strategy", &"indexed")
                .field("gather", gather)
                .field("index_count", &indexes.element_count())
                .field("elements_per_index", elements_per_index),
        };
        s.field("len", &self.len)
            .field("column_stride", &self.column_stride)
            .field("num_columns", &self.num_columns)
            .finish()
    }
}

/// Index tensors must be integer typed, dense, and not themselves gathered.
fn validate_index_tensor<B: Backend>(indexes: &Tensor<B>) -> Result<()> {
    let datatype = indexes.datatype();
    if !datatype.is_integer() {
        return Err(TensorError::IndexNotInteger { found: datatype });
    }
    let index = indexes.index_system();
    if !index.is_simple_monotonic() {
        return Err(TensorError::IndexNotMonotonic);
    }
    if !index.is_dense() {
        return Err(TensorError::IndexNotDense);
    }
    Ok(())
}
