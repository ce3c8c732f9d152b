//! External metric reads consumed by the telemetry pump.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Result;

// ============================================================================
// SystemMode
// ============================================================================

/// Operating mode reported on the `STATE:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SystemMode {
    /// Idle.
    #[default]
    Neutral = 0,
    /// Under load or attack; raises `STRESS`.
    Defense = 1,
    /// Background consolidation.
    Dreaming = 2,
    /// Self-improvement cycle running.
    Evolving = 3,
}

impl SystemMode {
    /// Every mode, in discriminant order.
    pub const ALL: [Self; 4] = [Self::Neutral, Self::Defense, Self::Dreaming, Self::Evolving];

    /// Wire name of the mode.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::Defense => "DEFENSE",
            Self::Dreaming => "DREAMING",
            Self::Evolving => "EVOLVING",
        }
    }

    /// Converts a discriminant back to a mode; unknown values map to `Neutral`.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Defense,
            2 => Self::Dreaming,
            3 => Self::Evolving,
            _ => Self::Neutral,
        }
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MetricsSource
// ============================================================================

/// Read access to the subsystems whose state is streamed to clients.
///
/// Each read is independent; a failing read only drops the line it feeds.
/// Implementations are called from the pump task once per tick and must not
/// block for long.
pub trait MetricsSource: Send + Sync + 'static {
    /// Physics engine speed, roughly `0.0..=1.0`.
    fn hyper_speed(&self) -> Result<f64>;

    /// Physics engine deformation, roughly `0.0..=0.5`.
    fn deformation(&self) -> Result<f64>;

    /// Accumulated data mass.
    fn data_mass(&self) -> Result<f64>;

    /// Signed accumulator value.
    fn accumulator(&self) -> Result<i64>;

    /// Evolution level of the self-improvement engine.
    fn evolution_level(&self) -> Result<u32>;

    /// Number of entities the engine has solved.
    fn entities_solved(&self) -> Result<u32>;

    /// Processes known to the kernel.
    fn process_count(&self) -> Result<u64>;

    /// Kernel tick counter.
    fn tick_count(&self) -> Result<u64>;

    /// Latest hologram summary.
    fn holo_result(&self) -> Result<String>;

    /// Current generation of the evolutionary search.
    fn generation(&self) -> Result<u64>;

    /// Best score of the current generation.
    fn best_score(&self) -> Result<f64>;

    /// Whether the network link is up.
    fn net_online(&self) -> Result<bool>;

    /// Connected peers.
    fn peer_count(&self) -> Result<u32>;

    /// Soul subsystem status text.
    fn soul_state(&self) -> Result<String>;

    /// Current operating mode.
    fn mode(&self) -> Result<SystemMode>;
}

// ============================================================================
// Tests
// ============================================================================
