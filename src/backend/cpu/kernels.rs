//! Reference kernels for the CPU backend.
//!
//! Every kernel resolves its destination offsets and captures its sources
//! before the destination allocation is locked for writing, so a kernel that
//! fails leaves the destination untouched. Only one allocation lock is held
//! at a time.
//!
//! A source that shares the destination's exact buffer and addressing is read
//! from the destination's working values in issue order; this is what makes
//! `binary_op` with `dst == y` accumulate. Any other source is snapshotted.

use num_traits::{NumCast, ToPrimitive};

use super::{Cpu, CpuBuffer};
use crate::backend::traits::{Backend, BinaryOp, Buffer, Element, Overlap, Region};
use crate::error::{Result, TensorError};
use crate::index::IndexSystem;
use crate::scalar::Scalar;
use crate::with_datatype;

fn typed<T: Scalar>(words: &[u64]) -> Result<&[T]> {
    bytemuck::try_cast_slice(words).map_err(|e| TensorError::Backend(format!("storage cast: {e}")))
}

fn typed_mut<T: Scalar>(words: &mut [u64]) -> Result<&mut [T]> {
    bytemuck::try_cast_slice_mut(words).map_err(|e| TensorError::Backend(format!("storage cast: {e}")))
}

fn convert<T: Scalar>(value: f64) -> Result<T> {
    <T as NumCast>::from(value).ok_or_else(|| {
        TensorError::Backend(format!("value {value} is not representable as {}", T::DATATYPE))
    })
}

fn widen<T: Scalar>(value: T) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| TensorError::Backend(format!("{value:?} has no f64 representation")))
}

/// Read the values of an index tensor as offsets.
fn index_values(index: &IndexSystem<Cpu>) -> Result<Vec<usize>> {
    let Some(indexes) = index.index_tensor() else {
        return Ok(Vec::new());
    };
    let buffer = indexes.buffer();
    let count = indexes.element_count();
    with_datatype!(buffer.datatype(), I => {
        let words = buffer.alloc.words.read();
        let data = &typed::<I>(&words)?[buffer.range()];
        let values: Result<Vec<usize>> = data[..count]
            .iter()
            .map(|&v| {
                v.to_usize().ok_or_else(|| TensorError::IndexValue {
                    value: v.to_i128().unwrap_or(i128::MIN),
                })
            })
            .collect();
        values
    })
}

/// Resolves logical positions of a region to allocation offsets.
struct Walker<'a> {
    index: &'a IndexSystem<Cpu>,
    indexes: Vec<usize>,
    base: usize,
    len: usize,
    count: usize,
}

impl<'a> Walker<'a> {
    fn new(region: Region<'a, Cpu>) -> Result<Self> {
        Ok(Self {
            index: region.index,
            indexes: index_values(region.index)?,
            base: region.buffer.offset,
            len: region.buffer.len,
            count: region.count,
        })
    }

    /// Allocation offset of `position`, wrapping around the region's count.
    fn offset(&self, position: usize) -> Result<usize> {
        match self.index.offset(position % self.count, &self.indexes) {
            Some(relative) if relative < self.len => Ok(self.base + relative),
            relative => Err(TensorError::IndexOutOfBounds {
                offset: relative.unwrap_or(usize::MAX),
                len: self.len,
            }),
        }
    }

    /// Allocation offsets of every position of the region, in order.
    fn offsets(&self) -> Result<Vec<usize>> {
        (0..self.count).map(|p| self.offset(p)).collect()
    }
}

fn snapshot<T: Scalar>(region: Region<'_, Cpu>) -> Result<Vec<T>> {
    let offsets = Walker::new(region)?.offsets()?;
    let words = region.buffer.alloc.words.read();
    let data = typed::<T>(&words)?;
    Ok(offsets.iter().map(|&o| data[o]).collect())
}

/// Whether two index systems visit the same offsets in the same order.
fn same_addressing(a: &IndexSystem<Cpu>, b: &IndexSystem<Cpu>) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    if a.element_count() != b.element_count() || a.is_indexed() || b.is_indexed() {
        return false;
    }
    (a.is_dense() && b.is_dense()) || (a.column_stride() == b.column_stride() && a.num_columns() == b.num_columns())
}

/// Values of a source operand.
enum Source<T> {
    /// The destination's own working values.
    Live,
    Captured(Vec<T>),
    Constant(f64),
}

impl<T: Scalar> Source<T> {
    fn of_element(cpu: &Cpu, dst: Region<'_, Cpu>, element: Element<'_, Cpu>) -> Result<Self> {
        match element {
            Element::Region(region)
                if region.count == dst.count
                    && cpu.overlap(dst.buffer, region.buffer) == Overlap::Identical
                    && same_addressing(dst.index, region.index) =>
            {
                Ok(Source::Live)
            }
            Element::Region(region) => Ok(Source::Captured(snapshot(region)?)),
            Element::Constant(value) => Ok(Source::Constant(value)),
        }
    }

    fn wide(&self, current: &[T], position: usize) -> Result<f64> {
        match self {
            Source::Live => widen(current[position % current.len()]),
            Source::Captured(values) => widen(values[position % values.len()]),
            Source::Constant(value) => Ok(*value),
        }
    }
}

pub(super) fn fill<T: Scalar>(buffer: &CpuBuffer, value: f64) -> Result<()> {
    let value = convert::<T>(value)?;
    let mut words = buffer.alloc.words.write();
    typed_mut::<T>(&mut words)?[buffer.range()].fill(value);
    Ok(())
}

pub(super) fn copy<T: Scalar>(src: &CpuBuffer, dst: &CpuBuffer) -> Result<()> {
    if std::sync::Arc::ptr_eq(&src.alloc, &dst.alloc) {
        let mut words = dst.alloc.words.write();
        typed_mut::<T>(&mut words)?.copy_within(src.range(), dst.offset);
        return Ok(());
    }
    let values: Vec<T> = {
        let words = src.alloc.words.read();
        typed::<T>(&words)?[src.range()].to_vec()
    };
    let mut words = dst.alloc.words.write();
    typed_mut::<T>(&mut words)?[dst.range()].copy_from_slice(&values);
    Ok(())
}

pub(super) fn write_host<T: Scalar>(dst: &CpuBuffer, src: &[T]) -> Result<()> {
    let mut words = dst.alloc.words.write();
    typed_mut::<T>(&mut words)?[dst.range()].copy_from_slice(src);
    Ok(())
}

pub(super) fn read_host<T: Scalar>(src: &CpuBuffer, dst: &mut [T]) -> Result<()> {
    let words = src.alloc.words.read();
    dst.copy_from_slice(&typed::<T>(&words)?[src.range()]);
    Ok(())
}

pub(super) fn assign_constant<T: Scalar>(dst: Region<'_, Cpu>, value: f64) -> Result<()> {
    if dst.count == 0 {
        return Ok(());
    }
    let value = convert::<T>(value)?;
    let offsets = Walker::new(dst)?.offsets()?;
    let mut words = dst.buffer.alloc.words.write();
    let data = typed_mut::<T>(&mut words)?;
    for o in offsets {
        data[o] = value;
    }
    Ok(())
}

/// `dst[p] = src[p % |src|]` for every position of `dst`.
pub(super) fn assign<T: Scalar>(dst: Region<'_, Cpu>, src: Region<'_, Cpu>) -> Result<()> {
    if dst.count == 0 || src.count == 0 {
        return Ok(());
    }
    let offsets = Walker::new(dst)?.offsets()?;
    let values = snapshot::<T>(src)?;
    let mut words = dst.buffer.alloc.words.write();
    let data = typed_mut::<T>(&mut words)?;
    for (p, o) in offsets.into_iter().enumerate() {
        data[o] = values[p % values.len()];
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn binary<T: Scalar>(
    cpu: &Cpu,
    op: BinaryOp,
    dst: Region<'_, Cpu>,
    x: Element<'_, Cpu>,
    alpha: f64,
    y: Element<'_, Cpu>,
    beta: f64,
) -> Result<()> {
    let total = [Some(dst.count), x.count(), y.count()]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
    if [Some(dst.count), x.count(), y.count()].contains(&Some(0)) {
        return Ok(());
    }
    let offsets = Walker::new(dst)?.offsets()?;
    let x = Source::<T>::of_element(cpu, dst, x)?;
    let y = Source::<T>::of_element(cpu, dst, y)?;

    let mut words = dst.buffer.alloc.words.write();
    let data = typed_mut::<T>(&mut words)?;
    let mut current: Vec<T> = offsets.iter().map(|&o| data[o]).collect();
    for p in 0..total {
        let lhs = alpha * x.wide(&current, p)?;
        let rhs = beta * y.wide(&current, p)?;
        let slot = p % current.len();
        current[slot] = convert(op.apply(lhs, rhs))?;
    }
    for (o, value) in offsets.into_iter().zip(current) {
        data[o] = value;
    }
    Ok(())
}
