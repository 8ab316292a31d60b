//! Simulated hardware bus.
//!
//! The pin-value store and sensor-value store shared between the execution
//! task (through intrinsic calls) and the host simulation (through the
//! [`crate::Interpreter`] accessors). Both stores, plus the host's queued
//! global writes, sit behind a single lock; every operation acquires it for
//! the duration of one map access only, so no caller ever holds the lock
//! across a delay or a script-side computation. The only ordering guarantee
//! is happens-before the next acquisition; a physics tick reading a
//! one-iteration-stale pin value is expected.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Motor and command pins consumed by the simulation.
pub mod pins {
    /// Left motor, forward drive (0–255).
    pub const LEFT_FORWARD: i64 = 5;
    /// Left motor, backward drive (0–255).
    pub const LEFT_BACKWARD: i64 = 6;
    /// Right motor, forward drive (0–255).
    pub const RIGHT_FORWARD: i64 = 9;
    /// Right motor, backward drive (0–255).
    pub const RIGHT_BACKWARD: i64 = 10;
    /// Snap-turn command pin; the simulation consumes and clears it each
    /// tick.
    pub const TURN_COMMAND: i64 = 100;
}

/// Ultrasonic echo channels addressed by `readUltrasonic`.
pub mod echo {
    pub const FRONT: i64 = 3;
    pub const LEFT: i64 = 7;
    pub const RIGHT: i64 = 11;
}

/// Value written to [`pins::TURN_COMMAND`] by `left()`.
pub const TURN_LEFT: i64 = 1;
/// Value written to [`pins::TURN_COMMAND`] by `right()`.
pub const TURN_RIGHT: i64 = 2;

/// Round-trip echo time in microseconds per centimeter of target distance.
///
/// `readUltrasonic` returns `distance_cm * MICROS_PER_CM`; scripts recover
/// centimeters by dividing by the same constant. Hosts inject plain
/// centimeter distances via [`HardwareBus::set_sensor`].
pub const MICROS_PER_CM: f64 = 58.0;

/// Pin pattern written by `forward()`.
pub const FORWARD_PATTERN: [(i64, i64); 4] = [
    (pins::LEFT_FORWARD, 255),
    (pins::LEFT_BACKWARD, 0),
    (pins::RIGHT_FORWARD, 255),
    (pins::RIGHT_BACKWARD, 0),
];

/// Pin pattern written by `backward()`.
pub const BACKWARD_PATTERN: [(i64, i64); 4] = [
    (pins::LEFT_FORWARD, 0),
    (pins::LEFT_BACKWARD, 255),
    (pins::RIGHT_FORWARD, 0),
    (pins::RIGHT_BACKWARD, 255),
];

/// Pin pattern written by `stop()`.
pub const STOP_PATTERN: [(i64, i64); 4] = [
    (pins::LEFT_FORWARD, 0),
    (pins::LEFT_BACKWARD, 0),
    (pins::RIGHT_FORWARD, 0),
    (pins::RIGHT_BACKWARD, 0),
];

#[derive(Debug, Default)]
struct BusState {
    pins: FxHashMap<i64, i64>,
    sensors: FxHashMap<i64, f64>,
    injected: Vec<(String, f64)>,
}

/// Lock-guarded pin and sensor stores.
#[derive(Debug, Default)]
pub struct HardwareBus {
    state: Mutex<BusState>,
}

impl HardwareBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear pins, sensors, and any pending host injections. Called when a
    /// new program is loaded.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pins.clear();
        state.sensors.clear();
        state.injected.clear();
    }

    pub fn write_pin(&self, pin: i64, value: i64) {
        self.state.lock().pins.insert(pin, value);
    }

    /// Current value of `pin`; unwritten pins read 0.
    pub fn pin(&self, pin: i64) -> i64 {
        self.state.lock().pins.get(&pin).copied().unwrap_or(0)
    }

    /// Write several pins under one lock acquisition, so the physics tick
    /// never observes a half-applied motor pattern.
    pub fn drive(&self, pattern: &[(i64, i64)]) {
        let mut state = self.state.lock();
        for &(pin, value) in pattern {
            state.pins.insert(pin, value);
        }
    }

    /// Inject a distance (centimeters) on an echo channel.
    pub fn set_sensor(&self, channel: i64, distance: f64) {
        self.state.lock().sensors.insert(channel, distance);
    }

    /// Current distance on `channel`; unwritten channels read 0.0.
    pub fn sensor(&self, channel: i64) -> f64 {
        self.state.lock().sensors.get(&channel).copied().unwrap_or(0.0)
    }

    /// Queue a host-side global write; the execution task applies it to an
    /// already-declared global at its next loop-boundary yield.
    pub fn inject_global(&self, name: &str, value: f64) {
        self.state.lock().injected.push((name.to_string(), value));
    }

    /// Take all queued global writes, oldest first.
    pub fn drain_injected(&self) -> Vec<(String, f64)> {
        std::mem::take(&mut self.state.lock().injected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_pin_reads_zero() {
        let bus = HardwareBus::new();
        assert_eq!(bus.pin(5), 0);
        assert_eq!(bus.sensor(3), 0.0);
    }

    #[test]
    fn pin_round_trip() {
        let bus = HardwareBus::new();
        bus.write_pin(5, 255);
        bus.write_pin(6, 0);
        assert_eq!(bus.pin(5), 255);
        assert_eq!(bus.pin(6), 0);
    }

    #[test]
    fn drive_applies_whole_pattern() {
        let bus = HardwareBus::new();
        bus.drive(&FORWARD_PATTERN);
        assert_eq!(bus.pin(pins::LEFT_FORWARD), 255);
        assert_eq!(bus.pin(pins::RIGHT_BACKWARD), 0);
        bus.drive(&STOP_PATTERN);
        assert_eq!(bus.pin(pins::LEFT_FORWARD), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let bus = HardwareBus::new();
        bus.write_pin(5, 1);
        bus.set_sensor(3, 40.0);
        bus.inject_global("fdist", 1.0);
        bus.reset();
        assert_eq!(bus.pin(5), 0);
        assert_eq!(bus.sensor(3), 0.0);
        assert!(bus.drain_injected().is_empty());
    }

    #[test]
    fn injections_drain_in_order() {
        let bus = HardwareBus::new();
        bus.inject_global("fdist", 10.0);
        bus.inject_global("fdist", 20.0);
        let drained = bus.drain_injected();
        assert_eq!(
            drained,
            vec![("fdist".to_string(), 10.0), ("fdist".to_string(), 20.0)]
        );
        assert!(bus.drain_injected().is_empty());
    }
}
