//! Metric definitions for tether.
//!
//! Crates record through the `metrics` facade re-exported here; the host
//! process decides which recorder (if any) is installed.
//!
//! ```rust,ignore
//! use tether_metrics::{counter, relay};
//!
//! counter!(relay::RECONNECTS_TOTAL).increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
