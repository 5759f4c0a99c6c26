//! Helpers shared by unit tests, integration tests and benchmarks.
//!
//! Compiled for `cfg(test)` and behind the `test-util` feature.

mod manual_clock;
mod scripted_factory;

pub use manual_clock::ManualClock;
pub use scripted_factory::{FactoryControl, ScriptedFactory, ScriptedSink};
