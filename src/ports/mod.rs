//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, the analytics core never reads storage
//! directly. Bars arrive through the `BarSource` port, which adapters
//! implement (in-memory tick store, or a mock in tests).

pub mod bar_source;

pub use bar_source::{BarSource, BarSourceError};
#[cfg(test)]
pub use bar_source::MockBarSource;
