//! Geolens Replay
//!
//! Native driver for `geolens-core`: loads a recorded or hand-written
//! sensor scenario and runs it through the engine, printing placements as
//! JSON lines. Useful for tuning configuration without a device.

pub mod replay;
pub mod scenario;
pub mod surface;

pub use replay::{Record, Replay};
pub use scenario::Scenario;
