//! Admission control for concurrent pipelines.

mod limiter;

pub use limiter::{ConcurrencyLimiter, Permit};
