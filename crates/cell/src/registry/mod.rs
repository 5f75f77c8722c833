//! The durable counter store behind every buffer.
//!
//! - [`RegistryRecord`] is one counter row.
//! - [`RegistryStore`] / [`RegistryTransaction`] are the seam a persistence
//!   layer implements.
//! - [`MemoryRegistryStore`] is an in-process implementation.

mod interface;
mod memory;
mod record;

pub use interface::*;
pub use memory::*;
pub use record::*;
