//! # stridecast
//!
//! Device-agnostic tensor addressing and assignment.
//!
//! A [`Tensor`] is a view: logical [`Dimensions`] laid over a backend buffer
//! through an [`IndexSystem`]. Views can be dense, padded (rows placed a
//! column stride apart) or gathered (positions translated through an integer
//! index tensor). Deriving a view never copies; assignment copies, replicates
//! and combines views with a single set of checks that every backend inherits.
//!
//! ## Features
//!
//! - **Zero-copy derivations**: sub-vectors, sub-matrices, rows, columns and
//!   reinterpretation share the parent's buffer
//! - **Gathers**: row, column and element selection through index tensors
//! - **Broadcast assignment**: a smaller source is replayed cyclically over a
//!   commensurate destination
//! - **Central checks**: driver, device and datatype matching, partial-alias
//!   rejection, and raw-copy fast path selection
//! - **Reference CPU backend** with multiple simulated devices
//!
//! ## Quick Start
//!
//! ```rust
//! use stridecast::{BinaryOp, Context, Cpu, Dimensions};
//!
//! let ctx = Context::new(Cpu::new()).unwrap();
//! let m = ctx
//!     .from_data(&[0.0f64, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], Dimensions::matrix(3, 3))
//!     .unwrap();
//!
//! // Padded 2x2 window, no copy.
//! let w = m.sub_matrix(1, 2, 1, 2).unwrap();
//! w.assign(ctx.stream(), 0.5).unwrap();
//!
//! // Sum the three rows of `m` into one row.
//! let total = ctx.zeros(Dimensions::vector(3)).unwrap();
//! total.binary_accumulate(ctx.stream(), BinaryOp::Add, &m, 1.0, 1.0).unwrap();
//! assert_eq!(total.to_vec::<f64>(ctx.stream()).unwrap(), vec![9.0, 2.0, 3.0]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         User API                            │
//! │   Context::{zeros, from_data}  Tensor::{assign, binary_op}  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Views and derivations                      │
//! │   Dimensions + IndexSystem (monotonic | padded | gathered)  │
//! │   sub_matrix, rows, columns, index_rows, make_dense         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Checks and path selection                     │
//! │   driver / device / datatype, commensurability, aliasing    │
//! │   raw fill / raw copy  vs  strided / indexed kernels        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Backend trait (Cpu, ...)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod check;
pub mod context;
pub mod dims;
pub mod error;
pub mod index;
pub mod scalar;
pub mod tensor;

// Re-exports
pub use backend::{Backend, BinaryOp, Buffer, Cpu, DeviceId, Overlap, Stream};
pub use context::Context;
pub use dims::{Axis, AxisOrder, Dimensions};
pub use error::{ErrorKind, Result, TensorError};
pub use index::{Gather, IndexSystem, Strategy};
pub use scalar::{DataType, Scalar};
pub use tensor::{Operand, Tensor};
