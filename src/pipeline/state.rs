// SPDX-License-Identifier: MPL-2.0

//! Camera pipeline lifecycle states

/// `Initializing -> Running <-> Degraded -> Stopping -> Stopped`
///
/// A pipeline only ever moves forward to `Stopping`/`Stopped`; the
/// `Running <-> Degraded` edge is the only cycle, entered when capture
/// fails past threshold and exited once a capture re-open succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Running,
    Degraded,
    Stopping,
    Stopped,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Stopped)
    }
}
