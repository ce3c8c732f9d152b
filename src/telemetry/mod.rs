//! Periodic telemetry for connected dashboards.
//!
//! The pump reads a [`MetricsSource`] once per tick, renders a
//! [`TelemetrySample`] of `KEY:value` lines and broadcasts them through the
//! client registry.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pump` | Tick loop and broadcast |
//! | `sample` | Line rendering and derived metrics |
//! | `source` | Metric read trait and [`SystemMode`] |

// ============================================================================
// Submodules
// ============================================================================

/// Tick loop.
pub mod pump;

/// Line rendering and derived metrics.
pub mod sample;

/// Metric read trait.
pub mod source;

// ============================================================================
// Re-exports
// ============================================================================

pub use pump::{DEFAULT_TELEMETRY_INTERVAL, TelemetryPump};
pub use sample::{Metric, TelemetrySample};
pub use source::{MetricsSource, SystemMode};
