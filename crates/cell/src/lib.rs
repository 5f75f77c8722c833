mod config;
mod error;
mod facade;
mod manager;
mod registry;
mod segment;
mod spec;
mod time;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::facade::*;
pub use crate::manager::*;
pub use crate::registry::*;
pub use crate::segment::*;
pub use crate::spec::*;
pub use crate::time::*;
