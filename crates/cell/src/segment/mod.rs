//! Pre-reserved value ranges and the double buffer that serves them.

mod buffer;
#[allow(clippy::module_inception)]
mod segment;
#[cfg(test)]
mod tests;

pub use buffer::*;
pub use segment::*;
