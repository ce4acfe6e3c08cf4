//! Tab-switch proctoring
//!
//! Each time the candidate's page goes from visible to hidden counts as one
//! strike. Strike 1 is a warning, strike 2 a final warning, and reaching the
//! limit ends the session through [`SessionTerminator`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{error, info, warn};

use crate::error::InterviewError;

/// Anything that can end the session early
#[async_trait::async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self) -> Result<(), InterviewError>;
}

/// Strike thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProctoringPolicy {
    /// Strike count that terminates the session
    pub max_strikes: u32,
}

impl Default for ProctoringPolicy {
    fn default() -> Self {
        Self { max_strikes: 3 }
    }
}

/// What the candidate should be told after a visibility change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum ProctoringAlert {
    Warning { strikes: u32 },
    FinalWarning { strikes: u32 },
    Terminated { strikes: u32 },
}

/// Snapshot of the monitor's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctoringState {
    pub strikes: u32,
    pub terminated: bool,
}

pub struct ProctoringMonitor {
    policy: ProctoringPolicy,
    hidden: AtomicBool,
    strikes: AtomicU32,
    terminated: AtomicBool,
}

impl ProctoringMonitor {
    pub fn new(policy: ProctoringPolicy) -> Self {
        Self {
            policy,
            hidden: AtomicBool::new(false),
            strikes: AtomicU32::new(0),
            terminated: AtomicBool::new(false),
        }
    }

    /// Carry over counters from a session that already ended
    pub fn restore(&self, state: ProctoringState) {
        self.strikes.store(state.strikes, Ordering::SeqCst);
        self.terminated.store(state.terminated, Ordering::SeqCst);
    }

    pub fn state(&self) -> ProctoringState {
        ProctoringState {
            strikes: self.strikes.load(Ordering::SeqCst),
            terminated: self.terminated.load(Ordering::SeqCst),
        }
    }

    /// Record a visibility signal. Only a visible -> hidden edge counts.
    pub fn observe(&self, hidden: bool) -> Option<ProctoringAlert> {
        let was_hidden = self.hidden.swap(hidden, Ordering::SeqCst);
        if !hidden || was_hidden {
            return None;
        }

        let strikes = self.strikes.fetch_add(1, Ordering::SeqCst) + 1;
        let max = self.policy.max_strikes.max(1);

        if strikes >= max {
            let first = self
                .terminated
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if first {
                warn!("Strike {}: terminating session", strikes);
                return Some(ProctoringAlert::Terminated { strikes });
            }
            return None;
        }

        if strikes + 1 == max {
            warn!("Strike {}: final warning", strikes);
            Some(ProctoringAlert::FinalWarning { strikes })
        } else {
            info!("Strike {}: warning", strikes);
            Some(ProctoringAlert::Warning { strikes })
        }
    }

    /// Record a visibility signal and end the session when the limit is hit
    pub async fn report_visibility(
        &self,
        hidden: bool,
        terminator: &dyn SessionTerminator,
    ) -> Option<ProctoringAlert> {
        let alert = self.observe(hidden);
        if let Some(ProctoringAlert::Terminated { .. }) = alert {
            if let Err(e) = terminator.terminate().await {
                error!("Failed to terminate session after strike limit: {}", e);
            }
        }
        alert
    }
}

impl Default for ProctoringMonitor {
    fn default() -> Self {
        Self::new(ProctoringPolicy::default())
    }
}
