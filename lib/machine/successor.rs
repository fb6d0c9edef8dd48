use crate::explorer::{Diagnostic, Event, Fault, Limit, Terminal};
use crate::machine::{CallKey, MachineState, Operand};
use crate::memory::Store;

/// One result of stepping a state.
#[derive(Clone, Debug)]
pub enum Successor<'p> {
    /// A state to explore.
    State(MachineState<'p>),
    Fault(Fault),
    Event(Event),
    /// The entry function returned.
    Terminal(Terminal),
    Limit(Limit),
    /// A function turned out to be malformed. Its caller continues with
    /// `Top`.
    Malformed(Diagnostic),
    /// A call which is already active on the continuation. `waiter`
    /// continues with the call's summary once there is one.
    Recur {
        key: CallKey,
        waiter: MachineState<'p>,
    },
    /// A call returned `value`, leaving `store`.
    Summarize {
        key: CallKey,
        value: Operand,
        store: Store,
    },
}
