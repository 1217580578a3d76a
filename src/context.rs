//! Caller-owned execution configuration.

use std::fmt;

use crate::backend::{Backend, DeviceId, Stream};
use crate::dims::Dimensions;
use crate::error::Result;
use crate::scalar::{DataType, Scalar};
use crate::tensor::{Operand, Tensor};

/// Driver, stream and default datatype bundled for convenience.
///
/// Nothing in the crate reads ambient state: a `Context` is passed
/// explicitly, and every tensor operation also accepts a bare stream.
///
/// ```rust
/// use stridecast::{Context, Cpu, DataType, Dimensions};
///
/// let ctx = Context::new(Cpu::new()).unwrap().with_datatype(DataType::F32);
/// let t = ctx.zeros(Dimensions::new(2, 1, 3, 4)).unwrap();
/// assert_eq!(t.datatype(), DataType::F32);
/// ```
pub struct Context<B: Backend> {
    driver: B,
    stream: B::Stream,
    datatype: DataType,
}

impl<B: Backend> Context<B> {
    /// A context on device 0 with `F64` as the default datatype.
    pub fn new(driver: B) -> Result<Self> {
        Self::on_device(driver, DeviceId(0))
    }

    pub fn on_device(driver: B, device: DeviceId) -> Result<Self> {
        let stream = driver.create_stream(device)?;
        tracing::debug!(backend = driver.name(), %device, "context created");
        Ok(Self {
            driver,
            stream,
            datatype: DataType::F64,
        })
    }

    /// Replace the datatype used by [`Context::zeros`].
    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn driver(&self) -> &B {
        &self.driver
    }

    pub fn stream(&self) -> &B::Stream {
        &self.stream
    }

    pub fn device(&self) -> DeviceId {
        self.stream.device()
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn zeros(&self, dims: Dimensions) -> Result<Tensor<B>> {
        self.zeros_with_datatype(dims, self.datatype)
    }

    pub fn zeros_with_datatype(&self, dims: Dimensions, datatype: DataType) -> Result<Tensor<B>> {
        Tensor::zeros(&self.driver, self.device(), datatype, dims)
    }

    /// Upload `data` into a new dense tensor; the datatype follows `T`.
    pub fn from_data<T: Scalar>(&self, data: &[T], dims: Dimensions) -> Result<Tensor<B>> {
        Tensor::from_data(&self.driver, &self.stream, data, dims)
    }

    pub fn to_vec<T: Scalar>(&self, tensor: &Tensor<B>) -> Result<Vec<T>> {
        tensor.to_vec(&self.stream)
    }

    /// [`Tensor::assign`] on this context's stream.
    pub fn assign<'a>(&self, dst: &Tensor<B>, src: impl Into<Operand<'a, B>>) -> Result<()> {
        dst.assign(&self.stream, src)
    }
}

impl<B: Backend> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("driver", &self.driver)
            .field("stream", &self.stream)
            .field("datatype", &self.datatype)
            .finish()
    }
}
