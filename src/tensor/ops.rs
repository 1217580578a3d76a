//! Assignment and elementwise operations.
//!
//! Every entry point validates its arguments centrally (driver, datatype,
//! device, commensurability, aliasing) and then issues exactly one backend
//! call on the given stream.
//!
//! Element counts that differ are legal when the smaller evenly divides the
//! larger: the smaller operand is replayed cyclically. This is what lets a
//! single accumulation sum a batch of equally shaped gradients into one
//! buffer.

use super::Tensor;
use crate::backend::{Backend, BinaryOp, Element, Region, Stream};
use crate::check;
use crate::error::{Result, TensorError};

/// Right-hand side of an assignment or elementwise operation.
pub enum Operand<'a, B: Backend> {
    Tensor(&'a Tensor<B>),
    Scalar(f64),
}

impl<B: Backend> Clone for Operand<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for Operand<'_, B> {}

impl<'a, B: Backend> From<&'a Tensor<B>> for Operand<'a, B> {
    fn from(tensor: &'a Tensor<B>) -> Self {
        Operand::Tensor(tensor)
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {
        $(
            impl<B: Backend> From<$t> for Operand<'_, B> {
                fn from(value: $t) -> Self {
                    Operand::Scalar(f64::from(value))
                }
            }
        )*
    };
}

impl_scalar_operand!(f64, f32, i8, u8, i16, u16, i32, u32);

impl<'a, B: Backend> Operand<'a, B> {
    fn count(&self) -> Option<usize> {
        match self {
            Operand::Tensor(t) => Some(t.element_count()),
            Operand::Scalar(_) => None,
        }
    }

    fn element(&self) -> Element<'a, B> {
        match *self {
            Operand::Tensor(t) => Element::Region(t.region()),
            Operand::Scalar(v) => Element::Constant(v),
        }
    }
}

impl<B: Backend> Tensor<B> {
    pub(crate) fn region(&self) -> Region<'_, B> {
        Region {
            buffer: self.buffer(),
            index: self.index_system(),
            count: self.element_count(),
        }
    }

    /// Same driver, datatype and device as `self`.
    fn check_peer(&self, other: &Tensor<B>) -> Result<()> {
        check::same_driver(self.driver(), other.driver())?;
        check::same_datatype(self.datatype(), other.datatype())?;
        check::same_device(self.device(), other.device())
    }

    /// Write `src` into this view.
    ///
    /// A scalar is written to every element. A tensor source must have an
    /// element count that evenly divides this view's count; it is replayed
    /// `dst / src` times. An empty source is a no-op.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stridecast::{Context, Cpu, Dimensions};
    ///
    /// let ctx = Context::new(Cpu::new()).unwrap();
    /// let dst = ctx.zeros(Dimensions::vector(6)).unwrap();
    /// let src = ctx.from_data(&[1.0f64, 2.0], Dimensions::vector(2)).unwrap();
    /// dst.assign(ctx.stream(), &src).unwrap();
    /// assert_eq!(dst.to_vec::<f64>(ctx.stream()).unwrap(), vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    /// ```
    pub fn assign<'a>(&self, stream: &B::Stream, src: impl Into<Operand<'a, B>>) -> Result<()> {
        match src.into() {
            Operand::Scalar(value) => self.assign_scalar(stream, value),
            Operand::Tensor(src) => self.assign_tensor(stream, src),
        }
    }

    fn assign_scalar(&self, stream: &B::Stream, value: f64) -> Result<()> {
        check::stream_on_device(stream, self.device())?;
        if self.element_count() == 0 {
            return Ok(());
        }
        if self.is_simple() {
            tracing::trace!(count = self.element_count(), "assign scalar: raw fill");
            self.driver().fill(stream, self.buffer(), value)
        } else {
            tracing::trace!(count = self.element_count(), "assign scalar: constant kernel");
            self.driver().assign_constant(stream, self.region(), value)
        }
    }

    fn assign_tensor(&self, stream: &B::Stream, src: &Tensor<B>) -> Result<()> {
        check::same_driver(self.driver(), src.driver())?;
        check::same_datatype(self.datatype(), src.datatype())?;
        let (dc, sc) = (self.element_count(), src.element_count());
        check::commensurate(dc, sc)?;
        if sc == 0 {
            return Ok(());
        }
        check::tensors_no_partial_alias(self.driver(), &[self, src])?;

        if self.is_simple() && src.is_simple() && dc == sc {
            if stream.device() != self.device() && stream.device() != src.device() {
                return Err(TensorError::DeviceMismatch {
                    left: self.device(),
                    right: stream.device(),
                });
            }
            tracing::debug!(count = dc, from = %src.device(), to = %self.device(), "assign: raw copy");
            return self.driver().copy(stream, src.buffer(), self.buffer());
        }

        check::same_device(self.device(), src.device())?;
        check::stream_on_device(stream, self.device())?;
        if self.is_indexed() || src.is_indexed() {
            tracing::debug!(dst = dc, src = sc, "assign: indexed kernel");
            self.driver().assign_indexed(stream, self.region(), src.region())
        } else {
            tracing::debug!(dst = dc, src = sc, "assign: strided kernel");
            self.driver().assign_strided(stream, self.region(), src.region())
        }
    }

    /// `self = op(alpha * x, beta * y)`.
    ///
    /// `x` and `y` must be commensurate and this view must be as large as the
    /// larger of them. Scalars are broadcast; when both operands are scalars
    /// the result is a fill.
    pub fn binary_op<'a, 'b>(
        &self,
        stream: &B::Stream,
        op: BinaryOp,
        x: impl Into<Operand<'a, B>>,
        alpha: f64,
        y: impl Into<Operand<'b, B>>,
        beta: f64,
    ) -> Result<()> {
        let (x, y) = (x.into(), y.into());
        for operand in [x, y] {
            if let Operand::Tensor(t) = operand {
                self.check_peer(t)?;
            }
        }
        check::stream_on_device(stream, self.device())?;

        let larger = match (x, y) {
            (Operand::Scalar(a), Operand::Scalar(b)) => {
                return self.assign(stream, op.apply(alpha * a, beta * b));
            }
            (Operand::Tensor(a), Operand::Tensor(b)) => {
                let (xc, yc) = (a.element_count(), b.element_count());
                check::commensurate(xc.max(yc), xc.min(yc))?;
                xc.max(yc)
            }
            (Operand::Tensor(t), Operand::Scalar(_)) | (Operand::Scalar(_), Operand::Tensor(t)) => {
                t.element_count()
            }
        };
        if self.element_count() != larger {
            return Err(TensorError::Shape {
                reason: "result must match the larger operand",
                shape: vec![self.element_count(), larger],
            });
        }
        if [Some(self.element_count()), x.count(), y.count()].contains(&Some(0)) {
            return Ok(());
        }

        let mut tensors = vec![self];
        tensors.extend([x, y].into_iter().filter_map(|o| match o {
            Operand::Tensor(t) => Some(t),
            Operand::Scalar(_) => None,
        }));
        check::tensors_no_partial_alias(self.driver(), &tensors)?;

        tracing::debug!(?op, count = larger, "binary_op");
        self.driver()
            .binary_op(stream, op, self.region(), x.element(), alpha, y.element(), beta)
    }

    /// `self = op(alpha * x, beta * self)`.
    ///
    /// Either count may be the larger. When `x` is larger, positions of
    /// `self` are revisited in order, so a destination of `n` elements
    /// accumulates every `n`-element slice of `x` in one call.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stridecast::{BinaryOp, Context, Cpu, Dimensions};
    ///
    /// let ctx = Context::new(Cpu::new()).unwrap();
    /// let grads = ctx
    ///     .from_data(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], Dimensions::matrix(3, 2))
    ///     .unwrap();
    /// let sum = ctx.zeros(Dimensions::vector(2)).unwrap();
    /// sum.binary_accumulate(ctx.stream(), BinaryOp::Add, &grads, 1.0, 1.0).unwrap();
    /// assert_eq!(sum.to_vec::<f64>(ctx.stream()).unwrap(), vec![9.0, 12.0]);
    /// ```
    pub fn binary_accumulate<'a>(
        &self,
        stream: &B::Stream,
        op: BinaryOp,
        x: impl Into<Operand<'a, B>>,
        alpha: f64,
        beta: f64,
    ) -> Result<()> {
        let x = x.into();
        check::stream_on_device(stream, self.device())?;
        let yc = self.element_count();
        if let Operand::Tensor(t) = x {
            self.check_peer(t)?;
            let xc = t.element_count();
            check::commensurate(xc.max(yc), xc.min(yc))?;
            if xc == 0 {
                return Ok(());
            }
            check::tensors_no_partial_alias(self.driver(), &[self, t])?;
        }
        if yc == 0 {
            return Ok(());
        }

        tracing::debug!(?op, count = yc, source = ?x.count(), "binary_accumulate");
        let y = self.region();
        self.driver()
            .binary_op(stream, op, y, x.element(), alpha, Element::Region(y), beta)
    }
}
