//! Named countdowns driving the phases of a match. The coordinator advances them with the elapsed time
//! and reacts to the ids that ran out.

use std::collections::BTreeMap;

#[derive(Default, Debug)]
pub struct Timer {
    /// Seconds left per countdown id.
    running: BTreeMap<u16, f32>,
}

impl Timer {
    pub fn new() -> Timer {
        Timer::default()
    }

    /// Starts countdown `id`, replacing a running one with the same id.
    pub fn start_timer(&mut self, id: u16, seconds: f32) {
        self.running.insert(id, seconds);
    }

    pub fn cancel_timer(&mut self, id: u16) {
        self.running.remove(&id);
    }

    pub fn cancel_all(&mut self) {
        self.running.clear();
    }

    /// Seconds left on a running countdown, never negative.
    pub fn remaining(&self, id: u16) -> Option<f32> {
        self.running.get(&id).map(|seconds| seconds.max(0.0))
    }

    /// Advances every countdown and removes the expired ones. Their ids come back in ascending order.
    pub fn advance(&mut self, delta_time: f32) -> Vec<u16> {
        for seconds in self.running.values_mut() {
            *seconds -= delta_time;
        }
        let expired: Vec<u16> = self
            .running
            .iter()
            .filter(|(_, seconds)| **seconds <= 0.0)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.running.remove(id);
        }
        expired
    }
}
