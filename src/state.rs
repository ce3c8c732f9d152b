//! Shared system state read by the telemetry pump.
//!
//! [`SharedState`] is the default [`MetricsSource`]: command handlers and
//! background tasks write it, the pump reads it. Numbers live in atomics,
//! strings behind a read-write lock, so readers never block writers for
//! longer than a string copy.
//!
//! Each field is expected to have a single writer; concurrent writers to
//! the same field race and the last store wins.
//!
//! # Example
//!
//! ```
//! use dashwire::{SharedState, SystemMode};
//!
//! let state = SharedState::new();
//! state.set_mode(SystemMode::Defense);
//! state.set_hyper_speed(0.4);
//! assert_eq!(state.current_mode(), SystemMode::Defense);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;
use crate::telemetry::{MetricsSource, SystemMode};

// ============================================================================
// AtomicF64
// ============================================================================

/// `f64` stored as its bit pattern.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

// ============================================================================
// SharedState
// ============================================================================

/// Explicitly shared system state.
#[derive(Debug, Default)]
pub struct SharedState {
    hyper_speed: AtomicF64,
    deformation: AtomicF64,
    data_mass: AtomicF64,
    accumulator: AtomicI64,
    evolution_level: AtomicU32,
    entities_solved: AtomicU32,
    process_count: AtomicU64,
    tick_count: AtomicU64,
    generation: AtomicU64,
    best_score: AtomicF64,
    net_online: AtomicBool,
    peer_count: AtomicU32,
    mode: AtomicU8,
    holo_result: RwLock<String>,
    soul_state: RwLock<String>,
}

impl SharedState {
    /// Creates a zeroed state in [`SystemMode::Neutral`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current mode.
    #[must_use]
    pub fn current_mode(&self) -> SystemMode {
        SystemMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: SystemMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn set_hyper_speed(&self, value: f64) {
        self.hyper_speed.store(value);
    }

    pub fn set_deformation(&self, value: f64) {
        self.deformation.store(value);
    }

    pub fn set_data_mass(&self, value: f64) {
        self.data_mass.store(value);
    }

    pub fn set_accumulator(&self, value: i64) {
        self.accumulator.store(value, Ordering::Relaxed);
    }

    /// Adds `delta` to the accumulator, returning the new value.
    pub fn add_accumulator(&self, delta: i64) -> i64 {
        self.accumulator
            .fetch_add(delta, Ordering::Relaxed)
            .wrapping_add(delta)
    }

    pub fn set_evolution_level(&self, value: u32) {
        self.evolution_level.store(value, Ordering::Relaxed);
    }

    pub fn set_entities_solved(&self, value: u32) {
        self.entities_solved.store(value, Ordering::Relaxed);
    }

    pub fn set_process_count(&self, value: u64) {
        self.process_count.store(value, Ordering::Relaxed);
    }

    pub fn set_tick_count(&self, value: u64) {
        self.tick_count.store(value, Ordering::Relaxed);
    }

    /// Increments the kernel tick counter.
    pub fn advance_tick(&self) -> u64 {
        self.tick_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn set_generation(&self, value: u64) {
        self.generation.store(value, Ordering::Relaxed);
    }

    pub fn set_best_score(&self, value: f64) {
        self.best_score.store(value);
    }

    pub fn set_net_online(&self, online: bool) {
        self.net_online.store(online, Ordering::Relaxed);
    }

    pub fn set_peer_count(&self, value: u32) {
        self.peer_count.store(value, Ordering::Relaxed);
    }

    pub fn set_holo_result(&self, value: impl Into<String>) {
        *self.holo_result.write() = value.into();
    }

    pub fn set_soul_state(&self, value: impl Into<String>) {
        *self.soul_state.write() = value.into();
    }
}

// ============================================================================
// MetricsSource
// ============================================================================

impl MetricsSource for SharedState {
    fn hyper_speed(&self) -> Result<f64> {
        Ok(self.hyper_speed.load())
    }

    fn deformation(&self) -> Result<f64> {
        Ok(self.deformation.load())
    }

    fn data_mass(&self) -> Result<f64> {
        Ok(self.data_mass.load())
    }

    fn accumulator(&self) -> Result<i64> {
        Ok(self.accumulator.load(Ordering::Relaxed))
    }

    fn evolution_level(&self) -> Result<u32> {
        Ok(self.evolution_level.load(Ordering::Relaxed))
    }

    fn entities_solved(&self) -> Result<u32> {
        Ok(self.entities_solved.load(Ordering::Relaxed))
    }

    fn process_count(&self) -> Result<u64> {
        Ok(self.process_count.load(Ordering::Relaxed))
    }

    fn tick_count(&self) -> Result<u64> {
        Ok(self.tick_count.load(Ordering::Relaxed))
    }

    fn holo_result(&self) -> Result<String> {
        Ok(self.holo_result.read().clone())
    }

    fn generation(&self) -> Result<u64> {
        Ok(self.generation.load(Ordering::Relaxed))
    }

    fn best_score(&self) -> Result<f64> {
        Ok(self.best_score.load())
    }

    fn net_online(&self) -> Result<bool> {
        Ok(self.net_online.load(Ordering::Relaxed))
    }

    fn peer_count(&self) -> Result<u32> {
        Ok(self.peer_count.load(Ordering::Relaxed))
    }

    fn soul_state(&self) -> Result<String> {
        Ok(self.soul_state.read().clone())
    }

    fn mode(&self) -> Result<SystemMode> {
        Ok(self.current_mode())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let state = SharedState::new();
        assert_eq!(state.current_mode(), SystemMode::Neutral);
        assert_eq!(state.hyper_speed().unwrap(), 0.0);
        assert!(!state.net_online().unwrap());
        assert!(state.holo_result().unwrap().is_empty());
    }

    #[test]
    fn test_float_round_trip() {
        let state = SharedState::new();
        state.set_deformation(0.1234);
        state.set_best_score(-3.5);
        assert_eq!(state.deformation().unwrap(), 0.1234);
        assert_eq!(state.best_score().unwrap(), -3.5);
    }

    #[test]
    fn test_counters() {
        let state = SharedState::new();
        assert_eq!(state.add_accumulator(5), 5);
        assert_eq!(state.add_accumulator(-8), -3);
        assert_eq!(state.advance_tick(), 1);
        assert_eq!(state.advance_tick(), 2);
        assert_eq!(state.tick_count().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_writers_and_reader() {
        let state = Arc::new(SharedState::new());
        let writer = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    state.set_holo_result(format!("frame-{i}"));
                    state.advance_tick();
                }
            })
        };
        for _ in 0..1000 {
            let holo = state.holo_result().unwrap();
            assert!(holo.is_empty() || holo.starts_with("frame-"));
        }
        writer.join().unwrap();
        assert_eq!(state.tick_count().unwrap(), 1000);
    }
}
