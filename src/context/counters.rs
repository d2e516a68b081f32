// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/// Per-context statistics, reset by the caller once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Draws and dispatches that reached the backend.
    pub draw_calls: u64,
    pub shader_changes: u64,
}

impl Counters {
    pub(crate) fn draw(&mut self) {
        self.draw_calls += 1;
    }

    pub(crate) fn shader_change(&mut self) {
        self.shader_changes += 1;
    }

    pub fn reset(&mut self) {
        *self = Counters::default();
    }
}
