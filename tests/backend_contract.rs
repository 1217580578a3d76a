//! Tests for the Backend entry points, issued directly against the CPU driver.

use stridecast::backend::{
    Backend, BinaryOp, Buffer, Cpu, CpuBuffer, CpuStream, DeviceId, Element, Overlap, Region, Stream,
};
use stridecast::{DataType, Dimensions, ErrorKind, IndexSystem, Scalar, Tensor, TensorError};

fn upload<T: Scalar>(cpu: &Cpu, stream: &CpuStream, data: &[T]) -> CpuBuffer {
    let buffer = cpu.allocate(stream.device(), T::DATATYPE, data.len()).unwrap();
    cpu.copy_host_to_device(stream, data, &buffer).unwrap();
    buffer
}

fn download<T: Scalar>(cpu: &Cpu, stream: &CpuStream, buffer: &CpuBuffer) -> Vec<T> {
    let mut out = vec![T::default(); buffer.len()];
    cpu.copy_device_to_host(stream, buffer, &mut out).unwrap();
    stream.synchronize().unwrap();
    out
}

#[test]
fn test_cpu_allocate_reports_metadata() {
    let cpu = Cpu::with_devices(3);
    let buffer = cpu.allocate(DeviceId(2), DataType::I8, 17).unwrap();
    assert_eq!(buffer.len(), 17);
    assert!(!buffer.is_empty());
    assert_eq!(buffer.datatype(), DataType::I8);
    assert_eq!(buffer.device(), DeviceId(2));
    assert_eq!(cpu.device_count(), 3);
}

#[test]
fn test_cpu_sub_buffer_windows_share_memory() {
    let cpu = Cpu::default();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let base = upload(&cpu, &stream, &[1u64, 2, 3, 4, 5, 6]);
    let window = cpu.sub_buffer(&base, 2, 3).unwrap();
    let nested = cpu.sub_buffer(&window, 1, 1).unwrap();

    cpu.fill(&stream, &nested, 40.0).unwrap();
    assert_eq!(download::<u64>(&cpu, &stream, &window), vec![3, 40, 5]);
    assert_eq!(download::<u64>(&cpu, &stream, &base), vec![1, 2, 3, 40, 5, 6]);
    assert_eq!(cpu.overlap(&window, &nested), Overlap::Partial);
    assert_eq!(cpu.overlap(&nested, &cpu.sub_buffer(&base, 3, 1).unwrap()), Overlap::Identical);
}

#[test]
fn test_cpu_copy_rejects_length_mismatch() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let a = cpu.allocate(DeviceId(0), DataType::F32, 4).unwrap();
    let b = cpu.allocate(DeviceId(0), DataType::F32, 3).unwrap();
    assert_eq!(cpu.copy(&stream, &a, &b).unwrap_err().kind(), ErrorKind::Backend);
}

#[test]
fn test_cpu_fill_rejects_unrepresentable_value() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let bytes = cpu.allocate(DeviceId(0), DataType::U8, 4).unwrap();
    assert_eq!(cpu.fill(&stream, &bytes, -1.0).unwrap_err().kind(), ErrorKind::Backend);
    cpu.fill(&stream, &bytes, 255.0).unwrap();
    assert_eq!(download::<u8>(&cpu, &stream, &bytes), vec![255; 4]);
}

#[test]
fn test_cpu_assign_strided_padded_to_dense() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    // 2 rows of 2 valid columns, rows 3 apart.
    let src = upload(&cpu, &stream, &[1i32, 2, -1, 3, 4]);
    let dst = cpu.allocate(DeviceId(0), DataType::I32, 4).unwrap();
    let src_index = IndexSystem::<Cpu>::monotonic(4).with_stride(3, 2).unwrap();
    let dst_index = IndexSystem::<Cpu>::monotonic(4);

    cpu.assign_strided(
        &stream,
        Region { buffer: &dst, index: &dst_index, count: 4 },
        Region { buffer: &src, index: &src_index, count: 4 },
    )
    .unwrap();
    assert_eq!(download::<i32>(&cpu, &stream, &dst), vec![1, 2, 3, 4]);
}

#[test]
fn test_cpu_assign_indexed_scatter() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let idx_buffer = upload(&cpu, &stream, &[3u32, 0]);
    let indexes = Tensor::new(cpu.clone(), Dimensions::vector(2), IndexSystem::monotonic(2), idx_buffer).unwrap();

    let dst = cpu.allocate(DeviceId(0), DataType::F64, 4).unwrap();
    let src = upload(&cpu, &stream, &[7.0f64, 9.0]);
    let scatter = IndexSystem::indexed(&indexes, 1).unwrap();
    let dense = IndexSystem::<Cpu>::monotonic(2);

    cpu.assign_indexed(
        &stream,
        Region { buffer: &dst, index: &scatter, count: 2 },
        Region { buffer: &src, index: &dense, count: 2 },
    )
    .unwrap();
    assert_eq!(download::<f64>(&cpu, &stream, &dst), vec![9.0, 0.0, 0.0, 7.0]);
}

#[test]
fn test_cpu_assign_indexed_reports_out_of_bounds() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let idx_buffer = upload(&cpu, &stream, &[5i16]);
    let indexes = Tensor::new(cpu.clone(), Dimensions::vector(1), IndexSystem::monotonic(1), idx_buffer).unwrap();
    let gather = IndexSystem::indexed(&indexes, 1).unwrap();
    let dense = IndexSystem::<Cpu>::monotonic(1);
    let src = cpu.allocate(DeviceId(0), DataType::F32, 4).unwrap();
    let dst = cpu.allocate(DeviceId(0), DataType::F32, 1).unwrap();

    let err = cpu
        .assign_indexed(
            &stream,
            Region { buffer: &dst, index: &dense, count: 1 },
            Region { buffer: &src, index: &gather, count: 1 },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);

    let negative = upload(&cpu, &stream, &[-2i16]);
    let indexes = Tensor::new(cpu.clone(), Dimensions::vector(1), IndexSystem::monotonic(1), negative).unwrap();
    let gather = IndexSystem::indexed(&indexes, 1).unwrap();
    let err = cpu
        .assign_indexed(
            &stream,
            Region { buffer: &dst, index: &dense, count: 1 },
            Region { buffer: &src, index: &gather, count: 1 },
        )
        .unwrap_err();
    assert!(matches!(err, TensorError::IndexValue { value: -2 }));
}

#[test]
fn test_cpu_binary_op_with_constant() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let x = upload(&cpu, &stream, &[1.0f32, -2.0, 3.0]);
    let dst = cpu.allocate(DeviceId(0), DataType::F32, 3).unwrap();
    let index = IndexSystem::<Cpu>::monotonic(3);

    cpu.binary_op(
        &stream,
        BinaryOp::Min,
        Region { buffer: &dst, index: &index, count: 3 },
        Element::Region(Region { buffer: &x, index: &index, count: 3 }),
        1.0,
        Element::Constant(0.0),
        1.0,
    )
    .unwrap();
    assert_eq!(download::<f32>(&cpu, &stream, &dst), vec![0.0, -2.0, 0.0]);
    assert_eq!(stream.stats().binary_kernels, 1);
}

#[test]
fn test_cpu_stream_stats_track_work() {
    let cpu = Cpu::new();
    let stream = cpu.create_stream(DeviceId(0)).unwrap();
    let a = upload(&cpu, &stream, &[1u16, 2]);
    let b = cpu.allocate(DeviceId(0), DataType::U16, 2).unwrap();
    cpu.copy(&stream, &a, &b).unwrap();
    cpu.fill(&stream, &a, 0.0).unwrap();
    let _ = download::<u16>(&cpu, &stream, &b);

    let stats = stream.stats();
    assert_eq!(stats.host_transfers, 2);
    assert_eq!(stats.copies, 1);
    assert_eq!(stats.fills, 1);
    assert_eq!(stats.strided_kernels + stats.indexed_kernels + stats.constant_kernels, 0);
}
