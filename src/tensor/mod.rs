//! Tensor views over backend buffers.
//!
//! A [`Tensor`] is a cheap value: a driver, logical [`Dimensions`], an
//! [`IndexSystem`] and a buffer handle. It owns no memory of its own, and
//! every derivation (see [`view`]) returns a new tensor over the same buffer.
//! Any number of tensors may alias one allocation; mutation through one is
//! visible through all of them.

mod ops;
pub mod view;

use std::fmt;

use crate::backend::{Backend, Buffer, DeviceId, Overlap, Stream};
use crate::dims::Dimensions;
use crate::error::{Result, TensorError};
use crate::index::IndexSystem;
use crate::scalar::{DataType, Scalar};

pub use ops::Operand;

/// A typed window onto a backend buffer.
///
/// # Example
///
/// ```rust
/// use stridecast::{Context, Cpu, Dimensions};
///
/// let ctx = Context::new(Cpu::new()).unwrap();
/// let m = ctx
///     .from_data(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], Dimensions::matrix(2, 3))
///     .unwrap();
/// let col = m.sub_matrix(0, 2, 1, 1).unwrap(); // zero-copy
/// assert_eq!(col.to_vec::<f64>(ctx.stream()).unwrap(), vec![2.0, 5.0]);
/// ```
pub struct Tensor<B: Backend> {
    driver: B,
    dims: Dimensions,
    index: IndexSystem<B>,
    buffer: B::Buffer,
}

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            dims: self.dims,
            index: self.index.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

impl<B: Backend> Tensor<B> {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Build a view over an existing buffer.
    ///
    /// Fails with a capacity error when the buffer is shorter than the index
    /// system requires, or when a gather's run is wider than its row pitch.
    pub fn new(driver: B, dims: Dimensions, index: IndexSystem<B>, buffer: B::Buffer) -> Result<Self> {
        if dims.element_count() != index.element_count() {
            return Err(TensorError::Shape {
                reason: "dimensions and index system address different element counts",
                shape: vec![dims.element_count(), index.element_count()],
            });
        }
        if let (Some(run), Some(stride)) = (index.elements_per_index(), index.column_stride()) {
            if run > stride {
                return Err(TensorError::ColumnStride {
                    num_columns: run,
                    column_stride: stride,
                });
            }
        }
        let required = index.required_length();
        if required > buffer.len() {
            return Err(TensorError::Capacity {
                required,
                available: buffer.len(),
            });
        }
        if let Some(indexes) = index.index_tensor() {
            if !driver.is_same_driver(indexes.driver()) {
                return Err(TensorError::DriverMismatch {
                    left: driver.name(),
                    right: indexes.driver().name(),
                });
            }
            if indexes.device() != buffer.device() {
                return Err(TensorError::DeviceMismatch {
                    left: buffer.device(),
                    right: indexes.device(),
                });
            }
        }
        Ok(Self::from_parts(driver, dims, index, buffer))
    }

    /// Assemble a view whose invariants the caller has already established.
    pub(crate) fn from_parts(driver: B, dims: Dimensions, index: IndexSystem<B>, buffer: B::Buffer) -> Self {
        Self {
            driver,
            dims,
            index,
            buffer,
        }
    }

    /// Allocate a zero-filled dense tensor.
    pub fn zeros(driver: &B, device: DeviceId, datatype: DataType, dims: Dimensions) -> Result<Self> {
        let count = dims.element_count();
        let buffer = driver.allocate(device, datatype, count)?;
        Ok(Self::from_parts(driver.clone(), dims, IndexSystem::monotonic(count), buffer))
    }

    /// Upload host data into a new dense tensor on the stream's device.
    pub fn from_data<T: Scalar>(driver: &B, stream: &B::Stream, data: &[T], dims: Dimensions) -> Result<Self> {
        if data.len() != dims.element_count() {
            return Err(TensorError::Shape {
                reason: "data length does not match dimensions",
                shape: dims.to_shape(),
            });
        }
        let tensor = Self::zeros(driver, stream.device(), T::DATATYPE, dims)?;
        driver.copy_host_to_device(stream, data, &tensor.buffer)?;
        Ok(tensor)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    #[inline]
    pub fn driver(&self) -> &B {
        &self.driver
    }

    #[inline]
    pub fn dimensions(&self) -> &Dimensions {
        &self.dims
    }

    #[inline]
    pub fn index_system(&self) -> &IndexSystem<B> {
        &self.index
    }

    #[inline]
    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn datatype(&self) -> DataType {
        self.buffer.datatype()
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.buffer.device()
    }

    /// Shape with leading unit axes removed.
    pub fn shape(&self) -> Vec<usize> {
        self.dims.to_shape()
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.dims.element_count()
    }

    pub fn is_dense(&self) -> bool {
        self.index.is_dense()
    }

    /// Dense over exactly its buffer window: raw fill and raw copy may
    /// operate on the whole buffer.
    pub fn is_simple(&self) -> bool {
        self.index.is_dense() && self.buffer.len() == self.element_count()
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_indexed()
    }

    /// Memory relation between this view's buffer and `other`'s.
    pub fn overlap(&self, other: &Self) -> Overlap {
        self.driver.overlap(&self.buffer, &other.buffer)
    }

    /// Buffer window covering exactly this view's elements, for dense views.
    fn dense_window(&self) -> Result<B::Buffer> {
        if self.is_simple() {
            Ok(self.buffer.clone())
        } else {
            self.driver.sub_buffer(&self.buffer, 0, self.element_count())
        }
    }

    // ========================================================================
    // Data Access
    // ========================================================================

    /// Read the logical elements back to the host in row-major order.
    ///
    /// Blocks on `stream` until the transfer has completed.
    pub fn to_vec<T: Scalar>(&self, stream: &B::Stream) -> Result<Vec<T>> {
        if T::DATATYPE != self.datatype() {
            return Err(TensorError::DataTypeMismatch {
                expected: self.datatype(),
                found: T::DATATYPE,
            });
        }
        let dense = self.make_dense(stream)?;
        let mut out = vec![T::default(); dense.element_count()];
        let window = dense.dense_window()?;
        self.driver.copy_device_to_host(stream, &window, &mut out)?;
        stream.synchronize()?;
        Ok(out)
    }
}

impl<B: Backend> fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.dims.shape())
            .field("datatype", &self.datatype())
            .field("device", &self.device())
            .field("index", &self.index)
            .field("buffer", &self.buffer)
            .field("backend", &self.driver.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Cpu;
    use crate::{Context, ErrorKind};

    #[test]
    fn test_tensor_creation() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let t = ctx
            .from_data(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], Dimensions::matrix(2, 3))
            .unwrap();
        assert_eq!(t.shape(), vec![2, 3]);
        assert_eq!(t.element_count(), 6);
        assert_eq!(t.datatype(), DataType::F32);
        assert!(t.is_dense());
        assert!(t.is_simple());
        assert!(!t.is_indexed());
        assert_eq!(t.to_vec::<f32>(ctx.stream()).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zeros() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let t = ctx.zeros(Dimensions::new(2, 1, 3, 4)).unwrap();
        assert_eq!(t.datatype(), DataType::F64);
        assert_eq!(t.to_vec::<f64>(ctx.stream()).unwrap(), vec![0.0; 24]);
    }

    #[test]
    fn test_from_data_length_mismatch() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let err = ctx.from_data(&[1u8, 2, 3], Dimensions::vector(4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_to_vec_checks_datatype() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let t = ctx.from_data(&[1i32, 2], Dimensions::vector(2)).unwrap();
        let err = t.to_vec::<i64>(ctx.stream()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compatibility);
    }

    #[test]
    fn test_construct_checks_capacity() {
        let cpu = Cpu::new();
        let buffer = cpu.allocate(DeviceId(0), DataType::F32, 11).unwrap();

        let padded = IndexSystem::monotonic(6).with_stride(5, 2).unwrap();
        let err = Tensor::new(cpu.clone(), Dimensions::matrix(3, 2), padded.clone(), buffer.clone())
            .unwrap_err();
        assert_eq!(err, TensorError::Capacity { required: 12, available: 11 });

        let larger = cpu.allocate(DeviceId(0), DataType::F32, 20).unwrap();
        assert!(Tensor::new(cpu.clone(), Dimensions::matrix(3, 2), padded, larger).is_ok());
        assert!(Tensor::new(cpu, Dimensions::vector(11), IndexSystem::monotonic(11), buffer).is_ok());
    }

    #[test]
    fn test_construct_checks_counts() {
        let cpu = Cpu::new();
        let buffer = cpu.allocate(DeviceId(0), DataType::F32, 8).unwrap();
        let err = Tensor::new(cpu, Dimensions::vector(4), IndexSystem::monotonic(8), buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_construct_checks_gather_capacity() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let idx = ctx.from_data(&[0u32, 1, 2, 3], Dimensions::vector(4)).unwrap();
        let index = IndexSystem::indexed(&idx, 2).unwrap();
        let small = ctx.driver().allocate(ctx.device(), DataType::F64, 6).unwrap();
        let err = Tensor::new(ctx.driver().clone(), Dimensions::matrix(4, 2), index.clone(), small)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        let enough = ctx.driver().allocate(ctx.device(), DataType::F64, 8).unwrap();
        assert!(Tensor::new(ctx.driver().clone(), Dimensions::matrix(4, 2), index, enough).is_ok());
    }

    #[test]
    fn test_construct_rejects_foreign_index_driver() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let other = Context::new(Cpu::new()).unwrap();
        let idx = other.from_data(&[0u32], Dimensions::vector(1)).unwrap();
        let index = IndexSystem::indexed(&idx, 2).unwrap();
        let buffer = ctx.driver().allocate(ctx.device(), DataType::F64, 4).unwrap();
        let err = Tensor::new(ctx.driver().clone(), Dimensions::vector(2), index, buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compatibility);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let t = ctx.zeros(Dimensions::vector(3)).unwrap();
        let u = t.clone();
        assert_eq!(t.overlap(&u), Overlap::Identical);
        u.assign(ctx.stream(), 2.0).unwrap();
        assert_eq!(t.to_vec::<f64>(ctx.stream()).unwrap(), vec![2.0; 3]);
    }

    #[test]
    fn test_dense_view_over_larger_buffer_is_not_simple() {
        let ctx = Context::new(Cpu::new()).unwrap();
        let storage = ctx.from_data(&[1.0f64, 2.0, 3.0, 4.0, 5.0], Dimensions::vector(5)).unwrap();
        let head = Tensor::new(
            ctx.driver().clone(),
            Dimensions::vector(3),
            IndexSystem::monotonic(3),
            storage.buffer().clone(),
        )
        .unwrap();
        assert!(head.is_dense());
        assert!(!head.is_simple());
        assert!(storage.is_simple());

        head.assign(ctx.stream(), 9.0).unwrap();
        assert_eq!(ctx.stream().stats().fills, 0);
        assert_eq!(ctx.stream().stats().constant_kernels, 1);
        assert_eq!(head.to_vec::<f64>(ctx.stream()).unwrap(), vec![9.0; 3]);
        assert_eq!(
            storage.to_vec::<f64>(ctx.stream()).unwrap(),
            vec![9.0, 9.0, 9.0, 4.0, 5.0]
        );
    }
}

