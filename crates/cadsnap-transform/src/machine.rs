//! Modal state machine as an explicit transition table.

use std::fmt;

/// Where a modal operation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    /// Waiting for the reference point.
    PickFrom,
    /// Reference set; the cursor drives `snap_to`.
    PickTo,
    Done,
    Cancelled,
}

impl Phase {
    pub fn is_running(self) -> bool {
        matches!(self, Phase::PickFrom | Phase::PickTo)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PickFrom => "pick-from",
            Phase::PickTo => "pick-to",
            Phase::Done => "done",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Host events, reduced to what the machine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Invoke,
    Move,
    Press,
    /// Press with the early-exit modifier held.
    ShiftPress,
    /// Numeric or modifier key that changes the pending result.
    Type,
    /// Enter.
    Confirm,
    Cancel,
}

/// Whether the current action is a single primitive or a step of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Single,
    /// A sequence with steps remaining after this one.
    Sequence,
    /// The final step of a sequence.
    SequenceLast,
}

/// What the session must do for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Save snapshots and activate the action.
    Begin,
    /// Update `snap_from` from the cursor.
    Track,
    /// Fix `snap_from` and start driving `snap_to`.
    SetFrom,
    /// Recompute and show the pending delta.
    Preview,
    /// Bake the current step and advance the sequence.
    ApplyStep,
    /// Bake everything and finish.
    Apply,
    /// Restore saved snapshots.
    Restore,
    Ignore,
}

/// Result of looking up a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub command: Command,
    pub next: Phase,
}

/// Row of the transition table; `None` matches anything.
struct Row {
    phase: Option<Phase>,
    input: Input,
    flow: Option<Flow>,
    command: Command,
    /// `None` keeps the current phase.
    next: Option<Phase>,
}

const fn row(phase: Option<Phase>, input: Input, flow: Option<Flow>, command: Command, next: Option<Phase>) -> Row {
    Row {
        phase,
        input,
        flow,
        command,
        next,
    }
}

use Command as C;
use Flow as F;
use Input as I;
use Phase as P;

/// First matching row wins.
const TABLE: &[Row] = &[
    row(Some(P::Idle), I::Invoke, Some(F::Single), C::Begin, Some(P::PickFrom)),
    row(Some(P::Idle), I::Invoke, None, C::Begin, Some(P::PickTo)),
    row(Some(P::PickFrom), I::Move, None, C::Track, None),
    row(Some(P::PickFrom), I::Press, None, C::SetFrom, Some(P::PickTo)),
    row(Some(P::PickFrom), I::ShiftPress, None, C::SetFrom, Some(P::PickTo)),
    row(Some(P::PickFrom), I::Confirm, None, C::Apply, Some(P::Done)),
    row(Some(P::PickTo), I::Move, None, C::Preview, None),
    row(Some(P::PickTo), I::Press, Some(F::Sequence), C::ApplyStep, None),
    row(Some(P::PickTo), I::Press, None, C::Apply, Some(P::Done)),
    row(Some(P::PickTo), I::ShiftPress, None, C::Apply, Some(P::Done)),
    row(Some(P::PickTo), I::Confirm, None, C::Apply, Some(P::Done)),
    row(Some(P::PickFrom), I::Type, None, C::Track, None),
    row(Some(P::PickTo), I::Type, None, C::Preview, None),
    row(Some(P::PickFrom), I::Cancel, None, C::Restore, Some(P::Cancelled)),
    row(Some(P::PickTo), I::Cancel, None, C::Restore, Some(P::Cancelled)),
];

/// Look up the transition for `input` in `phase`.
///
/// Unlisted combinations, including anything after a terminal phase, are
/// ignored and keep the phase.
pub fn transition(phase: Phase, input: Input, flow: Flow) -> Transition {
    TABLE
        .iter()
        .find(|r| r.phase.map_or(true, |p| p == phase) && r.input == input && r.flow.map_or(true, |f| f == flow))
        .map(|r| Transition {
            command: r.command,
            next: r.next.unwrap_or(phase),
        })
        .unwrap_or(Transition {
            command: Command::Ignore,
            next: phase,
        })
}
