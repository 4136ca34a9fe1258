//! API implementation submodules.
//!
//! Each submodule contains `impl Genforge` blocks; the struct itself is
//! defined in `lib.rs`.

mod builder;
mod cache;
mod jobs;

pub use builder::GenforgeBuilder;
