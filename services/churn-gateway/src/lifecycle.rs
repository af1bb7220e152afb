//! Per-request prediction FSM.
//!
//! Phases:
//! - Received
//! - Decoded
//! - Tabularized
//! - Scored
//! - Rendered
//!
//! `Failed` is terminal and reachable from any non-terminal phase. Time spent in each phase is kept.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase { Received, Decoded, Tabularized, Scored, Rendered, Failed }

impl RequestPhase {
    pub fn is_terminal(&self) -> bool { matches!(self, RequestPhase::Rendered | RequestPhase::Failed) }
}

#[derive(Debug)]
pub struct RequestLifecycle {
    phase: RequestPhase,
    started_at: Instant,
    phase_started_at: Instant,
    phase_durations: Vec<(RequestPhase, Duration)>,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { phase: RequestPhase::Received, started_at: now, phase_started_at: now, phase_durations: Vec::new() }
    }

    pub fn phase(&self) -> RequestPhase { self.phase }

    /// Moves to the next phase on the happy path. Terminal phases stay put.
    pub fn advance(&mut self) -> RequestPhase {
        let next = match self.phase {
            RequestPhase::Received => RequestPhase::Decoded,
            RequestPhase::Decoded => RequestPhase::Tabularized,
            RequestPhase::Tabularized => RequestPhase::Scored,
            RequestPhase::Scored => RequestPhase::Rendered,
            terminal => terminal,
        };
        self.transition(next);
        next
    }

    /// Records the failure against the phase that was running.
    pub fn fail(&mut self) -> RequestPhase {
        let failed_in = self.phase;
        self.transition(RequestPhase::Failed);
        failed_in
    }

    fn transition(&mut self, next: RequestPhase) {
        if self.phase.is_terminal() { return; }
        let now = Instant::now();
        self.phase_durations.push((self.phase, now - self.phase_started_at));
        self.phase = next;
        self.phase_started_at = now;
    }

    pub fn durations(&self) -> &[(RequestPhase, Duration)] { &self.phase_durations }

    pub fn elapsed(&self) -> Duration { self.started_at.elapsed() }
}

impl Default for RequestLifecycle { fn default() -> Self { Self::new() } }
