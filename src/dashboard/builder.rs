//! Builder pattern for dashboard configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dashwire::{Dashboard, DashboardAsset, SharedState};
//!
//! # async fn example() -> dashwire::Result<()> {
//! let state = Arc::new(SharedState::new());
//! let dashboard = Dashboard::builder()
//!     .port(8080)
//!     .asset(DashboardAsset::file("./dashboard.html"))
//!     .alias("/prime")
//!     .metrics_source(Arc::clone(&state))
//!     .on_command(|command: &str| -> dashwire::Result<()> {
//!         println!("command: {command}");
//!         Ok(())
//!     })
//!     .start()
//!     .await?;
//!
//! println!("open {}", dashboard.http_url());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use crate::asset::DashboardAsset;
use crate::command::{CommandSink, IgnoreCommands};
use crate::error::{Error, Result};
use crate::state::SharedState;
use crate::telemetry::MetricsSource;

use super::ServerOptions;
use super::core::Dashboard;

// ============================================================================
// DashboardBuilder
// ============================================================================

/// Builder for a running [`Dashboard`].
///
/// Use [`Dashboard::builder()`] to create one.
#[derive(Clone)]
pub struct DashboardBuilder {
    /// Address to bind.
    ip: IpAddr,
    /// Port to bind; `0` lets the OS choose.
    port: u16,
    /// Page served at `/`.
    asset: Option<DashboardAsset>,
    /// Extra path that also serves the page.
    alias: Option<String>,
    options: ServerOptions,
    sink: Option<Arc<dyn CommandSink>>,
    source: Option<Arc<dyn MetricsSource>>,
}

impl Default for DashboardBuilder {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            asset: None,
            alias: None,
            options: ServerOptions::default(),
            sink: None,
            source: None,
        }
    }
}

impl fmt::Debug for DashboardBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardBuilder")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("asset", &self.asset)
            .field("alias", &self.alias)
            .field("options", &self.options)
            .field("has_sink", &self.sink.is_some())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

// ============================================================================
// DashboardBuilder Implementation
// ============================================================================

impl DashboardBuilder {
    /// Creates a builder bound to `127.0.0.1:0` with no asset.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind.
    #[inline]
    #[must_use]
    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = ip;
        self
    }

    /// Sets the port to bind (`0` for any free port).
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets address and port together.
    #[inline]
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.ip = addr.ip();
        self.port = addr.port();
        self
    }

    /// Sets the dashboard page.
    #[inline]
    #[must_use]
    pub fn asset(mut self, asset: DashboardAsset) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Serves the page from a file, re-read on every request.
    #[inline]
    #[must_use]
    pub fn asset_file(self, path: impl Into<PathBuf>) -> Self {
        self.asset(DashboardAsset::file(path))
    }

    /// Serves the page from memory.
    #[inline]
    #[must_use]
    pub fn asset_inline(self, bytes: impl AsRef<[u8]>) -> Self {
        self.asset(DashboardAsset::inline(bytes))
    }

    /// Also serves the page at `path`, e.g. `/prime`.
    #[inline]
    #[must_use]
    pub fn alias(mut self, path: impl Into<String>) -> Self {
        self.alias = Some(path.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the handler for inbound messages.
    ///
    /// Defaults to [`IgnoreCommands`].
    #[inline]
    #[must_use]
    pub fn on_command(mut self, sink: impl CommandSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Sets a shared command handler.
    #[inline]
    #[must_use]
    pub fn command_sink(mut self, sink: Arc<dyn CommandSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets what the telemetry pump reads.
    ///
    /// Defaults to a fresh [`SharedState`].
    #[inline]
    #[must_use]
    pub fn metrics_source<S: MetricsSource>(mut self, source: Arc<S>) -> Self {
        self.source = Some(source);
        self
    }

    /// Validates the configuration, binds and starts serving.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no asset is set, a file asset is missing,
    ///   the alias does not start with `/` or a timing option is zero
    /// - [`Error::Io`] if binding fails
    pub async fn start(self) -> Result<Dashboard> {
        let asset = self.validate_asset()?;
        let alias = self.validate_alias()?;
        self.validate_options()?;
        let addr = SocketAddr::new(self.ip, self.port);

        let sink = self.sink.unwrap_or_else(|| Arc::new(IgnoreCommands));
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(SharedState::new()));

        Dashboard::launch(addr, asset, alias, sink, source, self.options).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DashboardBuilder {
    fn validate_asset(&self) -> Result<DashboardAsset> {
        let asset = self.asset.clone().ok_or_else(|| {
            Error::config(
                "Dashboard asset is required. Use .asset() to set it.\n\
                 Example: Dashboard::builder().asset_file(\"./dashboard.html\")",
            )
        })?;

        if let Some(path) = asset.path()
            && !path.is_file()
        {
            return Err(Error::config(format!(
                "Dashboard asset not found at: {}",
                path.display()
            )));
        }

        Ok(asset)
    }

    fn validate_alias(&self) -> Result<Option<String>> {
        match &self.alias {
            Some(alias) if !alias.starts_with('/') => Err(Error::config(format!(
                "Alias must start with '/': {alias}"
            ))),
            other => Ok(other.clone()),
        }
    }

    fn validate_options(&self) -> Result<()> {
        let durations = [
            ("telemetry_interval", self.options.telemetry_interval),
            ("write_timeout", self.options.write_timeout),
            ("handshake_timeout", self.options.handshake_timeout),
        ];

        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
