//! Exploring every reachable machine state.
//!
//! The [`Explorer`] steps states off a FIFO worklist until no new states
//! appear. States are deduplicated on their control, environment and
//! continuation. Each such point keeps the incomparable stores seen there:
//! a state whose store is covered by one of them is dropped, and stores it
//! covers are forgotten. Keeping incomparable stores apart means a block
//! freed on one path and live on another is still freed on the first.
//! Once a point holds more stores than the configured bound, they are all
//! joined into one. Joins only grow, so exploration converges.
//!
//! Recursive calls are summarized. When a call is already active on the
//! continuation with the same arguments, the caller waits until a call
//! with that key returns, and then continues with the joined return value
//! and store of every such return.

mod report;
mod sink;

pub use self::report::*;
pub use self::sink::*;

use crate::ast::{Program, SourceLocation};
use crate::config::Config;
use crate::error::*;
use crate::machine::{
    frame_depth, CallKey, Control, Environment, Kont, Machine, MachineState, Operand, Successor,
};
use crate::memory::Store;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

type StateKey<'p> = (Control<'p>, Environment, Kont<'p>);

/// The worklist fixed point over the states of one program.
pub struct Explorer<'p> {
    machine: Machine<'p>,
    seen: FxHashMap<StateKey<'p>, Vec<Store>>,
    worklist: VecDeque<MachineState<'p>>,
    summaries: FxHashMap<CallKey, (Operand, Store)>,
    waiters: FxHashMap<CallKey, Vec<MachineState<'p>>>,
    report: Report,
    steps: usize,
}

impl<'p> Explorer<'p> {
    pub fn new(program: &'p Program, config: &Config) -> Result<Explorer<'p>, Error> {
        Ok(Explorer {
            machine: Machine::new(program, config)?,
            seen: FxHashMap::default(),
            worklist: VecDeque::new(),
            summaries: FxHashMap::default(),
            waiters: FxHashMap::default(),
            report: Report::default(),
            steps: 0,
        })
    }

    pub fn machine(&self) -> &Machine<'p> {
        &self.machine
    }

    /// Explore the program, and report what was found.
    pub fn run(self) -> Report {
        let mut ignore = |_: &Event| {};
        self.run_with_sink(&mut ignore)
    }

    /// Explore the program, handing each new event to `sink` as soon as it
    /// is found.
    pub fn run_with_sink(mut self, sink: &mut dyn EventSink) -> Report {
        let entry = self.machine.program().entry();
        info!("exploring from `{}`", entry);

        if let Some(reason) = self
            .machine
            .function_info(entry)
            .and_then(|info| info.malformed())
        {
            warn!("entry function `{}` is malformed: {}", entry, reason);
            self.report.add_malformed(Diagnostic::new(entry, reason));
            return self.report;
        }

        let initial = self.machine.initial_state();
        self.enqueue(initial);

        let fuel = self.machine.config().step_fuel();
        while let Some(state) = self.worklist.pop_front() {
            if self.steps >= fuel {
                let function = self.machine.function_name(state.kont());
                warn!(
                    "step fuel of {} exhausted in `{}`, {} states left unexplored",
                    fuel,
                    function,
                    self.worklist.len() + 1
                );
                self.report
                    .add_limit(Limit::new(LimitKind::Fuel, function, location(state.control())));
                break;
            }
            self.steps += 1;
            for successor in self.machine.step(state) {
                self.handle(successor, sink);
            }
        }

        self.report.set_steps(self.steps);
        info!(
            "explored {} steps: {} faults, {} events, {} terminals",
            self.steps,
            self.report.faults().len(),
            self.report.events().len(),
            self.report.terminals().len()
        );
        self.report
    }

    fn handle(&mut self, successor: Successor<'p>, sink: &mut dyn EventSink) {
        match successor {
            Successor::State(state) => self.enqueue(state),
            Successor::Fault(fault) => {
                self.report.add_fault(fault);
            }
            Successor::Event(event) => {
                if self.report.add_event(event.clone()) {
                    sink.event(&event);
                }
            }
            Successor::Terminal(terminal) => {
                self.report.add_terminal(terminal);
            }
            Successor::Limit(limit) => {
                self.report.add_limit(limit);
            }
            Successor::Malformed(diagnostic) => {
                if self.report.add_malformed(diagnostic.clone()) {
                    warn!(
                        "`{}` is malformed: {}",
                        diagnostic.function(),
                        diagnostic.reason()
                    );
                }
            }
            Successor::Recur { key, waiter } => {
                let summary = self.summaries.get(&key).cloned();
                self.waiters
                    .entry(key)
                    .or_default()
                    .push(waiter.clone());
                if let Some((value, store)) = summary {
                    self.resume(waiter, &value, &store);
                }
            }
            Successor::Summarize { key, value, store } => self.summarize(key, value, store),
        }
    }

    /// Add a state to the worklist, unless a state seen at the same point
    /// already covers it.
    fn enqueue(&mut self, mut state: MachineState<'p>) {
        let bound = self.machine.config().max_stores_per_point().max(1);
        let key = (
            state.control().clone(),
            state.environment().clone(),
            state.kont().clone(),
        );
        let stores = self.seen.entry(key).or_default();
        if stores.iter().any(|seen| state.store().is_subset_of(seen)) {
            return;
        }
        stores.retain(|seen| !seen.is_subset_of(state.store()));
        if stores.len() >= bound {
            debug!(
                "joining {} stores at {}",
                stores.len() + 1,
                location(state.control())
            );
            let joined = stores
                .drain(..)
                .fold(state.store().clone(), |joined, seen| joined.join(&seen));
            stores.push(joined.clone());
            *state.store_mut() = joined;
        } else {
            stores.push(state.store().clone());
        }
        self.worklist.push_back(state);
    }

    /// Record a return from a call, and wake up every caller waiting on it
    /// when the summary grew.
    fn summarize(&mut self, key: CallKey, value: Operand, store: Store) {
        let (value, store) = match self.summaries.get(&key) {
            Some((old_value, old_store)) => {
                if value.value().is_subset_of(old_value.value()) && store.is_subset_of(old_store) {
                    return;
                }
                (join_operands(old_value, &value), old_store.join(&store))
            }
            None => (value, store),
        };
        debug!("summary of {:?} is {}", key, value.value());
        self.summaries
            .insert(key.clone(), (value.clone(), store.clone()));
        let waiters = self.waiters.get(&key).cloned().unwrap_or_default();
        for waiter in waiters {
            self.resume(waiter, &value, &store);
        }
    }

    /// Continue a waiting caller with a summary. Only the caller's own
    /// frames and below are taken from its store.
    fn resume(&mut self, waiter: MachineState<'p>, value: &Operand, store: &Store) {
        let depth = frame_depth(waiter.kont());
        let mut returned = store.clone();
        returned.retire_frames_from(depth + 1);
        let joined = waiter.store().join(&returned);
        let mut state = waiter.with_control(Control::Value(value.clone()));
        *state.store_mut() = joined;
        self.enqueue(state);
    }
}

fn join_operands(lhs: &Operand, rhs: &Operand) -> Operand {
    if lhs == rhs {
        return lhs.clone();
    }
    Operand::new(lhs.value().join(rhs.value()), lhs.type_().clone())
}

fn location(control: &Control) -> SourceLocation {
    match control {
        Control::Exec(statement) => statement.location(),
        Control::Eval(expression) | Control::Locate(expression) => expression.location(),
        Control::Declare(declarations) => declarations
            .first()
            .map(|declaration| declaration.location())
            .unwrap_or_default(),
        Control::Value(_) | Control::Place(_) | Control::Done => SourceLocation::default(),
    }
}

/// Analyze a program from its entry function.
pub fn analyze(program: &Program, config: &Config) -> Result<Report, Error> {
    Ok(Explorer::new(program, config)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::domain::AbstractValue;
    use test_log::test;

    fn countdown() -> Program {
        // int main() { int i = 10; while (i > 0) { i = i - 1; } return i; }
        Program::new("main").function(Function::new(
            "main",
            Type::Int,
            vec![],
            block(vec![
                declare("i", Type::Int, Some(int(10))),
                while_(
                    gt(ident("i"), int(0)),
                    block(vec![expr(assign(ident("i"), sub(ident("i"), int(1))))]),
                ),
                ret(Some(ident("i"))),
            ]),
        ))
    }

    #[test]
    fn loops_converge() {
        let report = analyze(&countdown(), &Config::default()).unwrap();
        assert!(report.faults().is_empty());
        assert!(!report.incomplete());
        assert_eq!(report.terminals().len(), 1);
        assert_eq!(report.terminals()[0].value(), &AbstractValue::Zero);
    }

    #[test]
    fn fuel() {
        let config = Config::default().with_step_fuel(5);
        let report = analyze(&countdown(), &config).unwrap();
        assert!(report.incomplete());
        assert_eq!(report.steps(), 5);
        assert!(report
            .limits()
            .iter()
            .all(|limit| limit.kind() == LimitKind::Fuel));
    }

    #[test]
    fn recursion_is_summarized() {
        // int f(int n) { if (n <= 0) return 0; return f(n - 1); }
        let program = Program::new("main")
            .function(Function::new(
                "f",
                Type::Int,
                vec![param("n", Type::Int)],
                block(vec![
                    if_(le(ident("n"), int(0)), ret(Some(int(0))), None),
                    ret(Some(call("f", vec![sub(ident("n"), int(1))]))),
                ]),
            ))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![ret(Some(call("f", vec![int(3)])))]),
            ));
        let report = analyze(&program, &Config::default()).unwrap();
        assert!(report.faults().is_empty());
        assert!(!report.incomplete());
        assert!(!report.terminals().is_empty());
        assert!(report
            .terminals()
            .iter()
            .all(|terminal| terminal.value() == &AbstractValue::Zero));
    }

    #[test]
    fn malformed_entry() {
        let program = Program::new("main").function(Function::new(
            "main",
            Type::Int,
            vec![],
            block(vec![goto("nowhere")]),
        ));
        let report = analyze(&program, &Config::default()).unwrap();
        assert_eq!(report.malformed().len(), 1);
        assert_eq!(report.steps(), 0);
    }
}
