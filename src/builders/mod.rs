//! Fluent builders for resilient streams.
//!
//! Builders validate their configuration up front and return
//! [`BuildError::InvalidConfig`](crate::error::BuildError::InvalidConfig)
//! before any sink is opened. `build` yields an unopened stream; `connect`
//! also performs the initial open and surfaces its failure.

pub(crate) mod builder_macros;
mod common;
pub mod file_builder;
pub mod socket_builder;

pub use common::BackoffOverrides;
pub use file_builder::{FileStream, FileStreamBuilder};
pub use socket_builder::{SocketStream, SocketStreamBuilder};
