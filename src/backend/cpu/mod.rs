//! CPU backend implementation.
//!
//! Host memory stands in for device memory. A driver exposes one or more
//! simulated devices; allocations are reference counted and shared by every
//! buffer handle cut from them. Kernels run eagerly on the calling thread,
//! so streams only carry their device and a tally of issued work.

mod kernels;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::traits::{Backend, BinaryOp, Buffer, DeviceId, Element, Overlap, Region, Stream};
use crate::error::{Result, TensorError};
use crate::scalar::{DataType, Scalar};
use crate::with_datatype;

/// CPU backend driver.
///
/// Clones share the same driver identity. [`Cpu::new`] creates a fresh
/// identity; [`Cpu::default`] returns the process-wide shared driver.
#[derive(Clone)]
pub struct Cpu {
    inner: Arc<CpuDriver>,
}

struct CpuDriver {
    devices: usize,
    next_allocation: AtomicU64,
    allocations: AtomicUsize,
}

impl Cpu {
    /// A new driver with a single device.
    pub fn new() -> Self {
        Self::with_devices(1)
    }

    /// A new driver exposing `devices` simulated devices.
    pub fn with_devices(devices: usize) -> Self {
        Self {
            inner: Arc::new(CpuDriver {
                devices: devices.max(1),
                next_allocation: AtomicU64::new(0),
                allocations: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of allocations made through this driver so far.
    pub fn allocation_count(&self) -> usize {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    fn check_device(&self, device: DeviceId) -> Result<()> {
        if device.0 >= self.inner.devices {
            return Err(TensorError::Backend(format!(
                "{device} does not exist (driver has {} devices)",
                self.inner.devices
            )));
        }
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        static SHARED: OnceLock<Cpu> = OnceLock::new();
        SHARED.get_or_init(Cpu::new).clone()
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("devices", &self.inner.devices)
            .field("allocations", &self.allocation_count())
            .finish()
    }
}

/// One host allocation. Storage is kept in 8-byte words so that it can be
/// viewed as a slice of any supported element type.
struct Allocation {
    id: u64,
    device: DeviceId,
    datatype: DataType,
    words: RwLock<Vec<u64>>,
}

/// Handle to a window of a host allocation.
#[derive(Clone)]
pub struct CpuBuffer {
    alloc: Arc<Allocation>,
    offset: usize,
    len: usize,
}

impl CpuBuffer {
    /// Element range of this window within its allocation.
    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

impl Buffer for CpuBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn datatype(&self) -> DataType {
        self.alloc.datatype
    }

    fn device(&self) -> DeviceId {
        self.alloc.device
    }
}

impl fmt::Debug for CpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBuffer")
            .field("allocation", &self.alloc.id)
            .field("device", &self.alloc.device)
            .field("datatype", &self.alloc.datatype)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Counters of the work issued on a [`CpuStream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub fills: usize,
    pub copies: usize,
    pub host_transfers: usize,
    pub constant_kernels: usize,
    pub strided_kernels: usize,
    pub indexed_kernels: usize,
    pub binary_kernels: usize,
}

#[derive(Default)]
struct StreamCounters {
    fills: AtomicUsize,
    copies: AtomicUsize,
    host_transfers: AtomicUsize,
    constant_kernels: AtomicUsize,
    strided_kernels: AtomicUsize,
    indexed_kernels: AtomicUsize,
    binary_kernels: AtomicUsize,
}

/// Eager execution context bound to one device.
pub struct CpuStream {
    device: DeviceId,
    counters: StreamCounters,
}

impl CpuStream {
    /// Snapshot of the work issued so far.
    pub fn stats(&self) -> StreamStats {
        let c = &self.counters;
        StreamStats {
            fills: c.fills.load(Ordering::Relaxed),
            copies: c.copies.load(Ordering::Relaxed),
            host_transfers: c.host_transfers.load(Ordering::Relaxed),
            constant_kernels: c.constant_kernels.load(Ordering::Relaxed),
            strided_kernels: c.strided_kernels.load(Ordering::Relaxed),
            indexed_kernels: c.indexed_kernels.load(Ordering::Relaxed),
            binary_kernels: c.binary_kernels.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Stream for CpuStream {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn synchronize(&self) -> Result<()> {
        // Work has already completed.
        Ok(())
    }
}

impl fmt::Debug for CpuStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuStream")
            .field("device", &self.device)
            .field("stats", &self.stats())
            .finish()
    }
}

fn check_host_transfer<T: Scalar>(buffer: &CpuBuffer, host_len: usize) -> Result<()> {
    if T::DATATYPE != buffer.datatype() {
        return Err(TensorError::DataTypeMismatch {
            expected: buffer.datatype(),
            found: T::DATATYPE,
        });
    }
    if host_len != buffer.len {
        return Err(TensorError::Backend(format!(
            "host slice of {host_len} elements does not match buffer of {}",
            buffer.len
        )));
    }
    Ok(())
}

impl Backend for Cpu {
    type Buffer = CpuBuffer;
    type Stream = CpuStream;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn is_same_driver(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn device_count(&self) -> usize {
        self.inner.devices
    }

    fn create_stream(&self, device: DeviceId) -> Result<CpuStream> {
        self.check_device(device)?;
        Ok(CpuStream {
            device,
            counters: StreamCounters::default(),
        })
    }

    fn allocate(&self, device: DeviceId, datatype: DataType, len: usize) -> Result<CpuBuffer> {
        self.check_device(device)?;
        let bytes = len
            .checked_mul(datatype.size_of())
            .ok_or_else(|| TensorError::Backend(format!("allocation of {len} {datatype} overflows")))?;
        let words = vec![0u64; bytes.div_ceil(8)];
        let id = self.inner.next_allocation.fetch_add(1, Ordering::Relaxed);
        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(allocation = id, %device, %datatype, len, "allocate");
        Ok(CpuBuffer {
            alloc: Arc::new(Allocation {
                id,
                device,
                datatype,
                words: RwLock::new(words),
            }),
            offset: 0,
            len,
        })
    }

    fn sub_buffer(&self, buffer: &CpuBuffer, offset: usize, len: usize) -> Result<CpuBuffer> {
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > buffer.len {
            return Err(TensorError::Capacity {
                required: end,
                available: buffer.len,
            });
        }
        Ok(CpuBuffer {
            alloc: Arc::clone(&buffer.alloc),
            offset: buffer.offset + offset,
            len,
        })
    }

    fn overlap(&self, a: &CpuBuffer, b: &CpuBuffer) -> Overlap {
        if !Arc::ptr_eq(&a.alloc, &b.alloc) {
            return Overlap::Disjoint;
        }
        if a.offset == b.offset && a.len == b.len {
            return Overlap::Identical;
        }
        let (ra, rb) = (a.range(), b.range());
        if a.len == 0 || b.len == 0 || ra.end <= rb.start || rb.end <= ra.start {
            Overlap::Disjoint
        } else {
            Overlap::Partial
        }
    }

    fn fill(&self, stream: &CpuStream, buffer: &CpuBuffer, value: f64) -> Result<()> {
        CpuStream::bump(&stream.counters.fills);
        with_datatype!(buffer.datatype(), T => kernels::fill::<T>(buffer, value))
    }

    fn copy(&self, stream: &CpuStream, src: &CpuBuffer, dst: &CpuBuffer) -> Result<()> {
        if src.datatype() != dst.datatype() {
            return Err(TensorError::DataTypeMismatch {
                expected: dst.datatype(),
                found: src.datatype(),
            });
        }
        if src.len != dst.len {
            return Err(TensorError::Backend(format!(
                "raw copy between buffers of {} and {} elements",
                src.len, dst.len
            )));
        }
        CpuStream::bump(&stream.counters.copies);
        with_datatype!(dst.datatype(), T => kernels::copy::<T>(src, dst))
    }

    fn copy_host_to_device<T: Scalar>(&self, stream: &CpuStream, src: &[T], dst: &CpuBuffer) -> Result<()> {
        check_host_transfer::<T>(dst, src.len())?;
        CpuStream::bump(&stream.counters.host_transfers);
        kernels::write_host(dst, src)
    }

    fn copy_device_to_host<T: Scalar>(&self, stream: &CpuStream, src: &CpuBuffer, dst: &mut [T]) -> Result<()> {
        check_host_transfer::<T>(src, dst.len())?;
        CpuStream::bump(&stream.counters.host_transfers);
        kernels::read_host(src, dst)
    }

    fn assign_constant(&self, stream: &CpuStream, dst: Region<'_, Self>, value: f64) -> Result<()> {
        CpuStream::bump(&stream.counters.constant_kernels);
        with_datatype!(dst.buffer.datatype(), T => kernels::assign_constant::<T>(dst, value))
    }

    fn assign_strided(&self, stream: &CpuStream, dst: Region<'_, Self>, src: Region<'_, Self>) -> Result<()> {
        CpuStream::bump(&stream.counters.strided_kernels);
        with_datatype!(dst.buffer.datatype(), T => kernels::assign::<T>(dst, src))
    }

    fn assign_indexed(&self, stream: &CpuStream, dst: Region<'_, Self>, src: Region<'_, Self>) -> Result<()> {
        CpuStream::bump(&stream.counters.indexed_kernels);
        with_datatype!(dst.buffer.datatype(), T => kernels::assign::<T>(dst, src))
    }

    fn binary_op(
        &self,
        stream: &CpuStream,
        op: BinaryOp,
        dst: Region<'_, Self>,
        x: Element<'_, Self>,
        alpha: f64,
        y: Element<'_, Self>,
        beta: f64,
    ) -> Result<()> {
        CpuStream::bump(&stream.counters.binary_kernels);
        with_datatype!(dst.buffer.datatype(), T => kernels::binary::<T>(self, op, dst, x, alpha, y, beta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_name() {
        assert_eq!(Cpu::new().name(), "cpu");
    }

    #[test]
    fn test_driver_identity() {
        let a = Cpu::new();
        let b = a.clone();
        let c = Cpu::new();
        assert!(a.is_same_driver(&b));
        assert!(!a.is_same_driver(&c));
        assert!(Cpu::default().is_same_driver(&Cpu::default()));
    }

    #[test]
    fn test_allocate_is_zeroed() {
        let cpu = Cpu::new();
        let stream = cpu.create_stream(DeviceId(0)).unwrap();
        let buffer = cpu.allocate(DeviceId(0), DataType::F32, 5).unwrap();
        let mut host = [1.0f32; 5];
        cpu.copy_device_to_host(&stream, &buffer, &mut host).unwrap();
        assert_eq!(host, [0.0; 5]);
        assert_eq!(cpu.allocation_count(), 1);
    }

    #[test]
    fn test_allocate_rejects_unknown_device() {
        let cpu = Cpu::with_devices(2);
        assert!(cpu.allocate(DeviceId(1), DataType::U8, 3).is_ok());
        assert!(cpu.allocate(DeviceId(2), DataType::U8, 3).is_err());
        assert!(cpu.create_stream(DeviceId(2)).is_err());
    }

    #[test]
    fn test_sub_buffer_and_overlap() {
        let cpu = Cpu::new();
        let base = cpu.allocate(DeviceId(0), DataType::I32, 10).unwrap();
        let a = cpu.sub_buffer(&base, 0, 4).unwrap();
        let b = cpu.sub_buffer(&base, 2, 4).unwrap();
        let c = cpu.sub_buffer(&base, 4, 4).unwrap();
        let a2 = cpu.sub_buffer(&base, 0, 4).unwrap();
        let other = cpu.allocate(DeviceId(0), DataType::I32, 10).unwrap();

        assert_eq!(cpu.overlap(&a, &b), Overlap::Partial);
        assert_eq!(cpu.overlap(&a, &c), Overlap::Disjoint);
        assert_eq!(cpu.overlap(&a, &a2), Overlap::Identical);
        assert_eq!(cpu.overlap(&a, &other), Overlap::Disjoint);
        assert_eq!(cpu.overlap(&base, &b), Overlap::Partial);
        assert!(cpu.sub_buffer(&base, 8, 3).is_err());
    }

    #[test]
    fn test_fill_and_copy_windows() {
        let cpu = Cpu::new();
        let stream = cpu.create_stream(DeviceId(0)).unwrap();
        let base = cpu.allocate(DeviceId(0), DataType::I16, 6).unwrap();
        let head = cpu.sub_buffer(&base, 0, 3).unwrap();
        let tail = cpu.sub_buffer(&base, 3, 3).unwrap();
        cpu.fill(&stream, &head, 7.0).unwrap();
        cpu.copy(&stream, &head, &tail).unwrap();

        let mut host = [0i16; 6];
        cpu.copy_device_to_host(&stream, &base, &mut host).unwrap();
        assert_eq!(host, [7; 6]);
        assert_eq!(stream.stats().fills, 1);
        assert_eq!(stream.stats().copies, 1);
    }

    #[test]
    fn test_host_transfer_checks_datatype() {
        let cpu = Cpu::new();
        let stream = cpu.create_stream(DeviceId(0)).unwrap();
        let buffer = cpu.allocate(DeviceId(0), DataType::F64, 2).unwrap();
        let err = cpu
            .copy_host_to_device(&stream, &[1.0f32, 2.0], &buffer)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Compatibility);
        assert!(cpu.copy_host_to_device(&stream, &[1.0f64], &buffer).is_err());
    }

    #[test]
    fn test_cross_device_copy() {
        let cpu = Cpu::with_devices(2);
        let stream = cpu.create_stream(DeviceId(0)).unwrap();
        let a = cpu.allocate(DeviceId(0), DataType::U32, 3).unwrap();
        let b = cpu.allocate(DeviceId(1), DataType::U32, 3).unwrap();
        cpu.copy_host_to_device(&stream, &[1u32, 2, 3], &a).unwrap();
        cpu.copy(&stream, &a, &b).unwrap();
        let mut host = [0u32; 3];
        cpu.copy_device_to_host(&stream, &b, &mut host).unwrap();
        assert_eq!(host, [1, 2, 3]);
    }
}
