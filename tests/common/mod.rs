//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use stridecast::{Context, Cpu, Dimensions, Tensor};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh CPU driver and a context on its first device.
pub fn context() -> Context<Cpu> {
    init_tracing();
    Context::new(Cpu::new()).expect("device 0 exists")
}

/// `rows x cols` f64 matrix holding `0, 1, 2, ...` in row-major order.
pub fn iota(ctx: &Context<Cpu>, rows: usize, cols: usize) -> Tensor<Cpu> {
    let data: Vec<f64> = (0..rows * cols).map(|v| v as f64).collect();
    ctx.from_data(&data, Dimensions::matrix(rows, cols)).unwrap()
}

pub fn read(ctx: &Context<Cpu>, t: &Tensor<Cpu>) -> Vec<f64> {
    t.to_vec::<f64>(ctx.stream()).unwrap()
}
