//! Compatibility and alias checks shared by every multi-tensor operation.
//!
//! Backends receive only requests that passed these checks, so each backend
//! inherits the same edge-case behavior.

use crate::backend::{Backend, DeviceId, Overlap, Stream};
use crate::error::{Result, TensorError};
use crate::scalar::DataType;
use crate::tensor::Tensor;

/// Operations never mix driver instances.
pub fn same_driver<B: Backend>(left: &B, right: &B) -> Result<()> {
    if left.is_same_driver(right) {
        Ok(())
    } else {
        Err(TensorError::DriverMismatch {
            left: left.name(),
            right: right.name(),
        })
    }
}

/// No implicit numeric coercion.
pub fn same_datatype(expected: DataType, found: DataType) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(TensorError::DataTypeMismatch { expected, found })
    }
}

pub fn same_device(left: DeviceId, right: DeviceId) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        Err(TensorError::DeviceMismatch { left, right })
    }
}

/// Work is issued on a stream that lives on the destination's device.
pub fn stream_on_device<S: Stream>(stream: &S, device: DeviceId) -> Result<()> {
    same_device(device, stream.device())
}

/// `smaller` must evenly divide `larger`. A zero `smaller` is trivially
/// commensurate; a zero `larger` only pairs with zero.
pub fn commensurate(larger: usize, smaller: usize) -> Result<()> {
    let ok = match smaller {
        0 => true,
        s => larger >= s && larger % s == 0,
    };
    if ok {
        Ok(())
    } else {
        Err(TensorError::Commensurability { larger, smaller })
    }
}

/// Reject any pair of buffers that overlap without being identical.
///
/// The error names the positions of the offending pair in `buffers`.
pub fn no_partial_alias<B: Backend>(driver: &B, buffers: &[&B::Buffer]) -> Result<()> {
    for (i, a) in buffers.iter().enumerate() {
        for (j, b) in buffers.iter().enumerate().skip(i + 1) {
            if driver.overlap(a, b) == Overlap::Partial {
                return Err(TensorError::PartialAlias { first: i, second: j });
            }
        }
    }
    Ok(())
}

/// Buffers touched when `tensor` takes part in an operation: its own storage
/// and, for gathers, its index storage.
pub(crate) fn touched_buffers<B: Backend>(tensor: &Tensor<B>) -> Vec<&B::Buffer> {
    let mut buffers = vec![tensor.buffer()];
    if let Some(indexes) = tensor.index_system().index_tensor() {
        buffers.push(indexes.buffer());
    }
    buffers
}

/// Alias check over every buffer the given tensors touch.
pub(crate) fn tensors_no_partial_alias<B: Backend>(driver: &B, tensors: &[&Tensor<B>]) -> Result<()> {
    let buffers: Vec<&B::Buffer> = tensors.iter().flat_map(|t| touched_buffers(t)).collect();
    no_partial_alias(driver, &buffers)
}
