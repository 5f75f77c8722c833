//! The buffer manager, its refill worker pool and the dynamic step policy.

#[allow(clippy::module_inception)]
mod manager;
mod pool;
mod step;
#[cfg(test)]
mod tests;

pub use manager::*;
pub use pool::*;
pub use step::*;
