//! # Formats Module
//!
//! Serialization formats owned by the core.
//!
//! Only this module interprets the byte layout of the snapshot attributes
//! attached to host nodes.

mod snapshot;

pub use snapshot::*;
