use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Coarse lifecycle state of a session.
///
/// Transitions only move forward:
/// `InProgress -> Finalizing -> Completed` or `InProgress -> Finalizing -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    InProgress,
    Finalizing,
    Completed,
    Terminated,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Terminated)
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionPhase::InProgress => 0,
            SessionPhase::Finalizing => 1,
            SessionPhase::Completed => 2,
            SessionPhase::Terminated => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionPhase::InProgress,
            1 => SessionPhase::Finalizing,
            2 => SessionPhase::Completed,
            _ => SessionPhase::Terminated,
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Finalizing => "finalizing",
            SessionPhase::Completed => "completed",
            SessionPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Atomic holder for [`SessionPhase`].
///
/// All transitions are compare-and-set, so two triggers racing to end the
/// session can never both enter `Finalizing`.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionPhase::InProgress.as_u8()))
    }

    /// A cell for a session that already ended with `outcome`
    pub fn settled(outcome: SessionPhase) -> Option<Self> {
        outcome
            .is_terminal()
            .then(|| Self(AtomicU8::new(outcome.as_u8())))
    }

    pub fn get(&self) -> SessionPhase {
        SessionPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// `InProgress -> Finalizing`. Returns `true` only for the single winning caller.
    pub fn begin_finalizing(&self) -> bool {
        self.0
            .compare_exchange(
                SessionPhase::InProgress.as_u8(),
                SessionPhase::Finalizing.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// `Finalizing -> Completed | Terminated`.
    pub fn settle(&self, outcome: SessionPhase) -> bool {
        if !outcome.is_terminal() {
            return false;
        }
        self.0
            .compare_exchange(
                SessionPhase::Finalizing.as_u8(),
                outcome.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
