//! Fixed-width cell encoding.
//!
//! A cell ID is the concatenation of a `yyyyMMdd` date, a three character
//! category code, a one digit data center, a two digit machine, an optional
//! time component selected by [`Pattern`], and a ten digit zero-padded
//! sequence. [`CellSpec`] validates every field before writing anything.

mod cell;
mod encoder;
mod error;
mod pattern;

pub use cell::*;
pub use encoder::*;
pub use error::*;
pub use pattern::*;
