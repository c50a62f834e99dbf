pub mod core;
pub mod engines;
pub mod metrics;
pub mod tasks;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
