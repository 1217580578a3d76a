//! Fixed four-axis dimension model.
//!
//! Every tensor has exactly four logical axes (batch, channel, height, width).
//! The order in which those axes are laid out, outermost to innermost, is an
//! [`AxisOrder`] stored alongside the extents. Lower-rank shapes are
//! right-aligned into the innermost axes, the rest being 1.

use crate::error::{Result, TensorError};

/// One of the four logical axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Batch,
    Channel,
    Height,
    Width,
}

impl Axis {
    const ALL: [Axis; 4] = [Axis::Batch, Axis::Channel, Axis::Height, Axis::Width];

    fn slot(self) -> usize {
        match self {
            Axis::Batch => 0,
            Axis::Channel => 1,
            Axis::Height => 2,
            Axis::Width => 3,
        }
    }
}

/// Outermost-to-innermost permutation of the four axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisOrder([Axis; 4]);

impl AxisOrder {
    /// Batch, channel, height, width.
    pub const NCHW: AxisOrder = AxisOrder([Axis::Batch, Axis::Channel, Axis::Height, Axis::Width]);
    /// Batch, height, width, channel.
    pub const NHWC: AxisOrder = AxisOrder([Axis::Batch, Axis::Height, Axis::Width, Axis::Channel]);

    /// Build an order from an explicit permutation.
    pub fn new(axes: [Axis; 4]) -> Result<Self> {
        for axis in Axis::ALL {
            if !axes.contains(&axis) {
                return Err(TensorError::Shape {
                    reason: "axis order must be a permutation of batch, channel, height, width",
                    shape: Vec::new(),
                });
            }
        }
        Ok(Self(axes))
    }

    /// Axes from outermost to innermost.
    pub fn axes(&self) -> [Axis; 4] {
        self.0
    }

    /// Position of `axis` in this order (0 = outermost).
    pub fn position(&self, axis: Axis) -> usize {
        self.0.iter().position(|&a| a == axis).unwrap_or(0)
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        AxisOrder::NCHW
    }
}

/// Logical shape of a tensor view.
///
/// Extents are stored per axis; [`Dimensions::shape`] lays them out in the
/// configured order. Dimensions are values: every operation returns a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    extents: [usize; 4],
    order: AxisOrder,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            extents: [1; 4],
            order: AxisOrder::default(),
        }
    }
}

impl Dimensions {
    /// Construct from explicit per-axis sizes in the default order.
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            extents: [batch, channels, height, width],
            order: AxisOrder::default(),
        }
    }

    /// A one-dimensional shape of `n` elements.
    pub fn vector(n: usize) -> Self {
        Self::default().with_innermost(n)
    }

    /// A `rows x cols` shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self::from_shape_unchecked(&[rows, cols], AxisOrder::default())
    }

    pub fn with_batch(mut self, n: usize) -> Self {
        self.extents[Axis::Batch.slot()] = n;
        self
    }

    pub fn with_channels(mut self, n: usize) -> Self {
        self.extents[Axis::Channel.slot()] = n;
        self
    }

    pub fn with_height(mut self, n: usize) -> Self {
        self.extents[Axis::Height.slot()] = n;
        self
    }

    pub fn with_width(mut self, n: usize) -> Self {
        self.extents[Axis::Width.slot()] = n;
        self
    }

    /// Replace the axis order, keeping per-axis extents.
    pub fn with_order(mut self, order: AxisOrder) -> Self {
        self.order = order;
        self
    }

    fn with_innermost(mut self, n: usize) -> Self {
        let axis = self.order.axes()[3];
        self.extents[axis.slot()] = n;
        self
    }

    /// Build from a flat shape of rank 0 to 4, right-aligned into `order`.
    pub fn from_shape(shape: &[usize], order: AxisOrder) -> Result<Self> {
        if shape.len() > 4 {
            return Err(TensorError::Rank {
                operation: "from_shape",
                rank: shape.len(),
                expected: "at most 4 axes",
            });
        }
        Ok(Self::from_shape_unchecked(shape, order))
    }

    fn from_shape_unchecked(shape: &[usize], order: AxisOrder) -> Self {
        let mut extents = [1; 4];
        let skip = 4 - shape.len();
        for (pos, &extent) in shape.iter().enumerate() {
            extents[order.axes()[skip + pos].slot()] = extent;
        }
        Self { extents, order }
    }

    /// Split the outermost extent of a flat shape into `batch_size` items.
    ///
    /// `shape` has one to three axes and its first extent must be a multiple
    /// of `batch_size`: `[b * h, w]` with batch `b` becomes `(b, h, w)`. The
    /// batch lands on the outermost axis of `order`.
    pub fn from_batch(shape: &[usize], batch_size: usize, order: AxisOrder) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(TensorError::Rank {
                operation: "from_batch",
                rank: shape.len(),
                expected: "1 to 3 non-batch axes",
            });
        }
        if batch_size == 0 || shape[0] % batch_size != 0 {
            return Err(TensorError::Shape {
                reason: "outer extent is not a multiple of the batch size",
                shape: shape.to_vec(),
            });
        }
        let mut item = shape.to_vec();
        item[0] /= batch_size;
        let mut dims = Self::from_shape_unchecked(&item, order);
        dims.extents[order.axes()[0].slot()] = batch_size;
        Ok(dims)
    }

    pub fn order(&self) -> AxisOrder {
        self.order
    }

    /// Extent along `axis`.
    pub fn get(&self, axis: Axis) -> usize {
        self.extents[axis.slot()]
    }

    /// All four extents, outermost to innermost.
    pub fn shape(&self) -> [usize; 4] {
        let axes = self.order.axes();
        [
            self.get(axes[0]),
            self.get(axes[1]),
            self.get(axes[2]),
            self.get(axes[3]),
        ]
    }

    /// `(axis, extent)` pairs, outermost to innermost.
    pub fn axis_extents(&self) -> [(Axis, usize); 4] {
        let axes = self.order.axes();
        axes.map(|axis| (axis, self.get(axis)))
    }

    /// Shape with leading unit axes removed (at least one axis is kept).
    pub fn to_shape(&self) -> Vec<usize> {
        let shape = self.shape();
        let first = shape.iter().position(|&e| e != 1).unwrap_or(3);
        shape[first..].to_vec()
    }

    pub fn element_count(&self) -> usize {
        self.extents.iter().product()
    }

    /// Extent of the least rapidly changing axis of [`Dimensions::to_shape`].
    pub fn outermost(&self) -> usize {
        self.to_shape()[0]
    }

    /// Extent of the most rapidly changing axis.
    pub fn innermost(&self) -> usize {
        self.shape()[3]
    }

    /// Fold every axis but the innermost into rows: `(rows, columns)`.
    pub fn as_2d(&self) -> (usize, usize) {
        let shape = self.shape();
        (shape[0] * shape[1] * shape[2], shape[3])
    }

    /// Fold every axis but the outermost into columns: `(batch, rest)`.
    pub fn as_batch(&self) -> (usize, usize) {
        let shape = self.to_shape();
        (shape[0], shape[1..].iter().product())
    }

    /// The same layout order with a new `rows x cols` shape.
    pub(crate) fn reshaped_2d(&self, rows: usize, cols: usize) -> Self {
        Self::from_shape_unchecked(&[rows, cols], self.order)
    }

    /// The same layout order with a new one-dimensional shape.
    pub(crate) fn reshaped_1d(&self, n: usize) -> Self {
        Self::from_shape_unchecked(&[n], self.order)
    }
}
