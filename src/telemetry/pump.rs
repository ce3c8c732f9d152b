//! Fixed-cadence telemetry broadcaster.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::transport::ClientRegistry;

use super::{MetricsSource, TelemetrySample};

// ============================================================================
// Constants
// ============================================================================

/// Default tick period.
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// TelemetryPump
// ============================================================================

/// Samples the metrics source every tick and broadcasts one line per metric.
///
/// Ticks with no registered client skip sampling entirely.
pub struct TelemetryPump {
    registry: Arc<ClientRegistry>,
    source: Arc<dyn MetricsSource>,
    period: Duration,
    running: AtomicBool,
}

impl TelemetryPump {
    /// Creates a pump; call [`run`](Self::run) on a task to start it.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        source: Arc<dyn MetricsSource>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            period,
            running: AtomicBool::new(true),
        }
    }

    /// Returns the tick period.
    #[inline]
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Returns `false` once [`stop`](Self::stop) has been called.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the loop to exit. Observed at the start of the next tick.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("Telemetry pump stop requested");
        }
    }

    /// Runs until stopped. The first tick fires immediately.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(period_ms = self.period.as_millis(), "Telemetry pump started");

        loop {
            ticker.tick().await;
            if !self.is_running() {
                break;
            }
            self.tick().await;
        }

        debug!("Telemetry pump stopped");
    }

    /// Runs one tick and returns the number of lines broadcast.
    pub async fn tick(&self) -> usize {
        if self.registry.is_empty() {
            return 0;
        }

        let sample = TelemetrySample::collect(self.source.as_ref());
        let lines = sample.len();
        for line in sample {
            self.registry.broadcast(&line).await;
        }

        trace!(lines, clients = self.registry.len(), "Telemetry tick");
        lines
    }
}

impl std::fmt::Debug for TelemetryPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPump")
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use tokio::io::{AsyncReadExt, DuplexStream};

    use crate::identifiers::ClientId;
    use crate::protocol::frame::encode_text;
    use crate::state::SharedState;
    use crate::telemetry::SystemMode;
    use crate::transport::Client;

    fn pump_with_client() -> (Arc<TelemetryPump>, Arc<SharedState>, DuplexStream) {
        let registry = Arc::new(ClientRegistry::new());
        let (near, far) = tokio::io::duplex(64 * 1024);
        let peer = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);
        registry.add(Arc::new(Client::new(ClientId::next(peer), near)));

        let state = Arc::new(SharedState::new());
        let pump = Arc::new(TelemetryPump::new(
            registry,
            Arc::clone(&state) as Arc<dyn MetricsSource>,
            DEFAULT_TELEMETRY_INTERVAL,
        ));
        (pump, state, far)
    }

    #[tokio::test]
    async fn test_tick_skips_without_clients() {
        let pump = TelemetryPump::new(
            Arc::new(ClientRegistry::new()),
            Arc::new(SharedState::new()),
            DEFAULT_TELEMETRY_INTERVAL,
        );
        assert_eq!(pump.tick().await, 0);
    }

    #[tokio::test]
    async fn test_tick_broadcasts_every_metric() {
        let (pump, state, mut far) = pump_with_client();
        state.set_mode(SystemMode::Dreaming);

        assert_eq!(pump.tick().await, 14);

        let first = encode_text("PULSE:70");
        let mut buf = vec![0u8; first.len()];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_stopped() {
        let (pump, _state, mut far) = pump_with_client();
        let task = tokio::spawn(Arc::clone(&pump).run());

        // First tick is immediate.
        let first = encode_text("PULSE:70");
        let mut buf = vec![0u8; first.len()];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, first);

        pump.stop();
        assert!(!pump.is_running());
        tokio::time::advance(Duration::from_secs(2)).await;
        task.await.unwrap();
    }
}
