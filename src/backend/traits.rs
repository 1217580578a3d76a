//! Backend trait definitions.
//!
//! The engine validates every request and then issues one of these calls.
//! Implementations may assume their arguments are already checked: counts
//! are commensurate, datatypes match, and no two arguments partially alias.

use std::fmt;

use crate::error::Result;
use crate::index::IndexSystem;
use crate::scalar::{DataType, Scalar};

/// Ordinal of a device owned by a backend driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device:{}", self.0)
    }
}

/// How the memory ranges of two buffers relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// No shared memory.
    Disjoint,
    /// Exactly the same range.
    Identical,
    /// Overlapping but not identical.
    Partial,
}

/// Opaque handle to backend memory.
///
/// Cloning a handle never copies memory.
pub trait Buffer: Clone + Send + Sync + fmt::Debug {
    /// Number of elements addressable through this handle.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn datatype(&self) -> DataType;

    fn device(&self) -> DeviceId;
}

/// Execution context on which backend work is issued in order.
pub trait Stream: Send + Sync + fmt::Debug {
    fn device(&self) -> DeviceId;

    /// Block until all work issued on this stream has completed.
    fn synchronize(&self) -> Result<()>;
}

/// A buffer together with the addressing used to walk it.
///
/// `count` logical elements are visited in order; position `p` maps to a
/// physical offset through [`IndexSystem::offset`].
pub struct Region<'a, B: Backend> {
    pub buffer: &'a B::Buffer,
    pub index: &'a IndexSystem<B>,
    pub count: usize,
}

impl<B: Backend> Clone for Region<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for Region<'_, B> {}

/// Source of values for an elementwise kernel.
pub enum Element<'a, B: Backend> {
    Region(Region<'a, B>),
    Constant(f64),
}

impl<B: Backend> Clone for Element<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for Element<'_, B> {}

impl<B: Backend> Element<'_, B> {
    /// Number of logical elements, `None` for constants.
    pub fn count(&self) -> Option<usize> {
        match self {
            Element::Region(region) => Some(region.count),
            Element::Constant(_) => None,
        }
    }
}

/// Binary operator applied by [`Backend::binary_op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

impl BinaryOp {
    /// Apply the operator to two values.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Max => lhs.max(rhs),
            BinaryOp::Min => lhs.min(rhs),
        }
    }
}

/// Backend driver.
///
/// A driver owns devices, allocations and streams. The engine never looks
/// inside a buffer; everything goes through these entry points.
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    type Buffer: Buffer;
    type Stream: Stream;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `other` is the same driver instance.
    fn is_same_driver(&self, other: &Self) -> bool;

    fn device_count(&self) -> usize;

    fn create_stream(&self, device: DeviceId) -> Result<Self::Stream>;

    /// Allocate `len` zero-filled elements on `device`.
    fn allocate(&self, device: DeviceId, datatype: DataType, len: usize) -> Result<Self::Buffer>;

    /// Zero-copy window of `len` elements starting at `offset`.
    fn sub_buffer(&self, buffer: &Self::Buffer, offset: usize, len: usize) -> Result<Self::Buffer>;

    /// Classify the memory relation between two buffers.
    fn overlap(&self, a: &Self::Buffer, b: &Self::Buffer) -> Overlap;

    /// Set every element of `buffer` to `value`.
    fn fill(&self, stream: &Self::Stream, buffer: &Self::Buffer, value: f64) -> Result<()>;

    /// Raw copy between two buffers of equal length and datatype.
    ///
    /// The buffers may live on different devices of this driver.
    fn copy(&self, stream: &Self::Stream, src: &Self::Buffer, dst: &Self::Buffer) -> Result<()>;

    fn copy_host_to_device<T: Scalar>(
        &self,
        stream: &Self::Stream,
        src: &[T],
        dst: &Self::Buffer,
    ) -> Result<()>;

    fn copy_device_to_host<T: Scalar>(
        &self,
        stream: &Self::Stream,
        src: &Self::Buffer,
        dst: &mut [T],
    ) -> Result<()>;

    /// Write `value` to every position of `dst`, honoring its addressing.
    fn assign_constant(&self, stream: &Self::Stream, dst: Region<'_, Self>, value: f64) -> Result<()>;

    /// Copy `src` into `dst`, replaying `src` cyclically when it is shorter.
    ///
    /// Neither region is indexed.
    fn assign_strided(&self, stream: &Self::Stream, dst: Region<'_, Self>, src: Region<'_, Self>) -> Result<()>;

    /// Same as [`Backend::assign_strided`] where either side may gather.
    ///
    /// Destinations that repeat an offset produce an unspecified result.
    fn assign_indexed(&self, stream: &Self::Stream, dst: Region<'_, Self>, src: Region<'_, Self>) -> Result<()>;

    /// `dst[p] = op(alpha * x[p % |x|], beta * y[p % |y|])` for every position
    /// `p` of the longest argument, writing `dst[p % |dst|]` in order.
    #[allow(clippy::too_many_arguments)]
    fn binary_op(
        &self,
        stream: &Self::Stream,
        op: BinaryOp,
        dst: Region<'_, Self>,
        x: Element<'_, Self>,
        alpha: f64,
        y: Element<'_, Self>,
        beta: f64,
    ) -> Result<()>;
}
