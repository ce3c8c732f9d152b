//! One tick worth of telemetry lines.
//!
//! # Wire Format
//!
//! | Key | Value |
//! |-----|-------|
//! | `PULSE` | integer, `60..=130` |
//! | `STRESS` | `0.00..=1.00` |
//! | `SYNC` | `0.00..=1.00` |
//! | `DEFORM` | 4 decimals |
//! | `SPEED` | 4 decimals |
//! | `MASS` | 2 decimals |
//! | `ACC` | integer |
//! | `STATE` | `NEUTRAL`, `DEFENSE`, `DREAMING` or `EVOLVING` |
//! | `HOLO` | free text |
//! | `CHRONO` | `<generation>:<score, 2 decimals>` |
//! | `NET` | `LIVE` or `OFFLINE` |
//! | `PEERS` | integer |
//! | `SOUL` | free text |
//! | `KERNEL` | `<processes>:<ticks>` |

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;

use crate::error::Result;

use super::{MetricsSource, SystemMode};

// ============================================================================
// Policy
// ============================================================================

/// Resting pulse before activity is added.
const PULSE_BASE: f64 = 70.0;
/// Pulse gained at full speed.
const PULSE_PER_SPEED: f64 = 60.0;
const PULSE_MIN: f64 = 60.0;
const PULSE_MAX: f64 = 130.0;

const STRESS_PER_DEFORM: f64 = 2.0;
/// Added to stress while in [`SystemMode::Defense`].
const DEFENSE_STRESS_BONUS: f64 = 0.30;

const SYNC_BASE: f64 = 0.5;
const SYNC_PER_LEVEL: f64 = 0.1;
const SYNC_PER_SOLVED: f64 = 0.02;

#[inline]
fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Pulse proxy: `round(clamp(70 + speed * 60, 60, 130))`.
#[must_use]
pub fn pulse(speed: f64) -> i64 {
    // Bounded to 60..=130 before the cast.
    (PULSE_BASE + finite(speed) * PULSE_PER_SPEED)
        .clamp(PULSE_MIN, PULSE_MAX)
        .round() as i64
}

/// Stress proxy: `clamp(deformation * 2 + bonus, 0, 1)`.
#[must_use]
pub fn stress(deformation: f64, mode: SystemMode) -> f64 {
    let bonus = if mode == SystemMode::Defense {
        DEFENSE_STRESS_BONUS
    } else {
        0.0
    };
    (finite(deformation) * STRESS_PER_DEFORM + bonus).clamp(0.0, 1.0)
}

/// Synchronisation proxy from evolution progress.
#[must_use]
pub fn sync(evolution_level: u32, entities_solved: u32) -> f64 {
    (SYNC_BASE
        + f64::from(evolution_level) * SYNC_PER_LEVEL
        + f64::from(entities_solved) * SYNC_PER_SOLVED)
        .clamp(0.0, 1.0)
}

// ============================================================================
// Metric
// ============================================================================

/// A telemetry line kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Pulse,
    Stress,
    Sync,
    Deform,
    Speed,
    Mass,
    Acc,
    State,
    Holo,
    Chrono,
    Net,
    Peers,
    Soul,
    Kernel,
}

impl Metric {
    /// Every metric, in emission order.
    pub const ALL: [Self; 14] = [
        Self::Pulse,
        Self::Stress,
        Self::Sync,
        Self::Deform,
        Self::Speed,
        Self::Mass,
        Self::Acc,
        Self::State,
        Self::Holo,
        Self::Chrono,
        Self::Net,
        Self::Peers,
        Self::Soul,
        Self::Kernel,
    ];

    /// Line prefix before the colon.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Pulse => "PULSE",
            Self::Stress => "STRESS",
            Self::Sync => "SYNC",
            Self::Deform => "DEFORM",
            Self::Speed => "SPEED",
            Self::Mass => "MASS",
            Self::Acc => "ACC",
            Self::State => "STATE",
            Self::Holo => "HOLO",
            Self::Chrono => "CHRONO",
            Self::Net => "NET",
            Self::Peers => "PEERS",
            Self::Soul => "SOUL",
            Self::Kernel => "KERNEL",
        }
    }

    /// Reads what this metric needs from `source` and renders its line.
    ///
    /// # Errors
    ///
    /// Propagates the first failing read.
    pub fn render(self, source: &dyn MetricsSource) -> Result<String> {
        let value = match self {
            Self::Pulse => pulse(source.hyper_speed()?).to_string(),
            Self::Stress => format!("{:.2}", stress(source.deformation()?, source.mode()?)),
            Self::Sync => format!(
                "{:.2}",
                sync(source.evolution_level()?, source.entities_solved()?)
            ),
            Self::Deform => format!("{:.4}", finite(source.deformation()?)),
            Self::Speed => format!("{:.4}", finite(source.hyper_speed()?)),
            Self::Mass => format!("{:.2}", finite(source.data_mass()?)),
            Self::Acc => source.accumulator()?.to_string(),
            Self::State => source.mode()?.as_str().to_string(),
            Self::Holo => source.holo_result()?,
            Self::Chrono => format!(
                "{}:{:.2}",
                source.generation()?,
                finite(source.best_score()?)
            ),
            Self::Net => if source.net_online()? { "LIVE" } else { "OFFLINE" }.to_string(),
            Self::Peers => source.peer_count()?.to_string(),
            Self::Soul => source.soul_state()?,
            Self::Kernel => format!("{}:{}", source.process_count()?, source.tick_count()?),
        };
        Ok(format!("{}:{value}", self.key()))
    }
}

// ============================================================================
// TelemetrySample
// ============================================================================

/// Lines rendered for one tick; never stored beyond it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySample {
    lines: Vec<String>,
}

impl TelemetrySample {
    /// Renders every metric. A failing read is logged and its line skipped.
    #[must_use]
    pub fn collect(source: &dyn MetricsSource) -> Self {
        let mut lines = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            match metric.render(source) {
                Ok(line) => lines.push(line),
                Err(e) => warn!(metric = metric.key(), error = %e, "Metric sample failed"),
            }
        }
        Self { lines }
    }

    /// Rendered lines in emission order.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl IntoIterator for TelemetrySample {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::state::SharedState;

    /// Source whose soul subsystem is down.
    struct BrokenSoul(SharedState);

    impl MetricsSource for BrokenSoul {
        fn hyper_speed(&self) -> Result<f64> {
            self.0.hyper_speed()
        }
        fn deformation(&self) -> Result<f64> {
            self.0.deformation()
        }
        fn data_mass(&self) -> Result<f64> {
            self.0.data_mass()
        }
        fn accumulator(&self) -> Result<i64> {
            self.0.accumulator()
        }
        fn evolution_level(&self) -> Result<u32> {
            self.0.evolution_level()
        }
        fn entities_solved(&self) -> Result<u32> {
            self.0.entities_solved()
        }
        fn process_count(&self) -> Result<u64> {
            self.0.process_count()
        }
        fn tick_count(&self) -> Result<u64> {
            self.0.tick_count()
        }
        fn holo_result(&self) -> Result<String> {
            self.0.holo_result()
        }
        fn generation(&self) -> Result<u64> {
            self.0.generation()
        }
        fn best_score(&self) -> Result<f64> {
            self.0.best_score()
        }
        fn net_online(&self) -> Result<bool> {
            self.0.net_online()
        }
        fn peer_count(&self) -> Result<u32> {
            self.0.peer_count()
        }
        fn soul_state(&self) -> Result<String> {
            Err(Error::sample("soul", "subsystem offline"))
        }
        fn mode(&self) -> Result<SystemMode> {
            self.0.mode()
        }
    }

    #[test]
    fn test_pulse_bounds() {
        assert_eq!(pulse(0.0), 70);
        assert_eq!(pulse(0.5), 100);
        assert_eq!(pulse(1.0), 130);
        assert_eq!(pulse(5.0), 130);
        assert_eq!(pulse(-1.0), 60);
        assert_eq!(pulse(f64::NAN), 70);
    }

    #[test]
    fn test_stress_defense_bonus() {
        assert!((stress(0.0, SystemMode::Defense) - 0.30).abs() < 1e-9);
        assert!((stress(0.1, SystemMode::Neutral) - 0.20).abs() < 1e-9);
        assert!((stress(0.45, SystemMode::Defense) - 1.0).abs() < 1e-9);
        assert!(stress(-3.0, SystemMode::Neutral).abs() < 1e-9);
        assert!(stress(f64::INFINITY, SystemMode::Neutral).abs() < 1e-9);
    }

    #[test]
    fn test_sync_clamped() {
        assert!((sync(0, 0) - 0.5).abs() < 1e-9);
        assert!((sync(2, 5) - 0.8).abs() < 1e-9);
        assert!((sync(100, 100) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_collect_emits_every_line_in_order() {
        let state = SharedState::new();
        state.set_hyper_speed(0.25);
        state.set_deformation(0.1);
        state.set_data_mass(12.5);
        state.set_accumulator(-7);
        state.set_generation(5);
        state.set_best_score(98.4167);
        state.set_process_count(3);
        state.set_tick_count(42);
        state.set_peer_count(2);
        state.set_net_online(true);
        state.set_mode(SystemMode::Defense);
        state.set_holo_result("CUBE");
        state.set_soul_state("AWAKE");

        let sample = TelemetrySample::collect(&state);
        assert_eq!(
            sample.lines(),
            [
                "PULSE:85",
                "STRESS:0.50",
                "SYNC:0.50",
                "DEFORM:0.1000",
                "SPEED:0.2500",
                "MASS:12.50",
                "ACC:-7",
                "STATE:DEFENSE",
                "HOLO:CUBE",
                "CHRONO:5:98.42",
                "NET:LIVE",
                "PEERS:2",
                "SOUL:AWAKE",
                "KERNEL:3:42",
            ]
        );
    }

    #[test]
    fn test_failing_metric_is_skipped() {
        let sample = TelemetrySample::collect(&BrokenSoul(SharedState::new()));
        assert_eq!(sample.len(), Metric::ALL.len() - 1);
        assert!(sample.lines().iter().all(|l| !l.starts_with("SOUL:")));
        assert_eq!(sample.lines().last().map(String::as_str), Some("KERNEL:0:0"));
    }

    #[test]
    fn test_offline_network() {
        let state = SharedState::new();
        assert_eq!(Metric::Net.render(&state).unwrap(), "NET:OFFLINE");
    }
}
