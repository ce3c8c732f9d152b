//! Dashboard server entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Dashboard`] | Running server handle |
//! | [`DashboardBuilder`] | Fluent configuration builder |
//! | [`ServerOptions`] | Timeouts, limits and telemetry cadence |
//!
//! # Example
//!
//! ```no_run
//! use dashwire::{Dashboard, Result};
//!
//! # async fn example() -> Result<()> {
//! let dashboard = Dashboard::builder()
//!     .port(8080)
//!     .asset_file("./dashboard.html")
//!     .start()
//!     .await?;
//!
//! tokio::signal::ctrl_c().await?;
//! dashboard.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for dashboard configuration.
pub mod builder;

/// Running server handle.
pub mod core;

/// Server tuning options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DashboardBuilder;
pub use core::Dashboard;
pub use options::ServerOptions;
