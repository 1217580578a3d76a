//! Backend abstractions.
//!
//! This module defines the [`Backend`] trait, the boundary between the
//! engine and concrete memory, and one implementation:
//! - [`Cpu`]: reference host backend with simulated devices

mod cpu;
mod traits;

pub use cpu::{Cpu, CpuBuffer, CpuStream, StreamStats};
pub use traits::{Backend, BinaryOp, Buffer, DeviceId, Element, Overlap, Region, Stream};
