//! Query builder: caller-supplied identifiers and conditions, values as parameters.

mod builder;
pub use builder::*;
