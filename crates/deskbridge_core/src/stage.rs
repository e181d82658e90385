//! Record lifecycle stages.

use std::fmt;

/// A record's position in the staging lifecycle.
///
/// Each stage maps to one storage prefix. A record moves monotonically
/// `Pending -> Ready -> {Processed, Failed}`, with two-phase records making
/// a single one-way detour `TwoPhasePending -> Pending` first; nothing ever
/// moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Staged, waiting for the next dispatch sweep.
    Pending,
    /// Primary half of a two-phase record, parked until its dependents have
    /// been swept out of pending.
    TwoPhasePending,
    /// Picked up by a dispatch sweep; a destination-bound request is (or is
    /// about to be) in flight.
    Ready,
    /// Accepted by the destination.
    Processed,
    /// Rejected, either by validation or by the destination.
    Failed,
}

impl Stage {
    /// Every stage, in lifecycle order.
    pub const ALL: [Stage; 5] = [
        Stage::Pending,
        Stage::TwoPhasePending,
        Stage::Ready,
        Stage::Processed,
        Stage::Failed,
    ];

    /// The directory token this stage contributes to storage prefixes.
    #[must_use]
    pub fn dir(self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::TwoPhasePending => "two_phase_pending",
            Stage::Ready => "ready",
            Stage::Processed => "processed",
            Stage::Failed => "failed",
        }
    }

    /// True for the two terminal stages.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Processed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}
