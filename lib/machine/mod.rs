//! The abstract CESK machine.
//!
//! A [`MachineState`] is a Control, an [`Environment`], a
//! [`Store`](crate::memory::Store) and a continuation ([`Kont`]). The
//! [`Machine`] holds everything about the program which does not change
//! while it runs: type layouts, enumerator values, and the jump tables of
//! each function. [`Machine::step`] takes one state to all of its
//! successors.
//!
//! Stepping never fails. Faulting accesses become [`Successor::Fault`],
//! and problems with the program itself, such as an unknown identifier,
//! become [`Successor::Malformed`]: the function they occur in returns
//! `Top` to its caller.

mod access;
mod builtins;
mod call;
mod constants;
mod environment;
mod expression;
mod kont;
mod labels;
mod state;
mod statement;
mod successor;
mod typing;

pub use self::builtins::is_builtin;
pub use self::constants::{evaluate, truncate, Enumerators};
pub use self::environment::{Binding, Environment};
pub use self::kont::*;
pub use self::labels::{FunctionInfo, LabelTarget, PathStep, SwitchTable};
pub use self::state::{Control, MachineState, Operand, Place};
pub use self::successor::Successor;
pub use self::typing::common_type;

use crate::ast::{NodeId, Program, SourceLocation};
use crate::config::Config;
use crate::domain::AbstractValue;
use crate::error::*;
use crate::explorer::{Diagnostic, Fault};
use crate::memory::{Address, FaultKind, Layout, Store};
use crate::RC;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) type Successors<'p> = Vec<Successor<'p>>;

/// The transition relation of the abstract machine for one program.
#[derive(Clone, Debug)]
pub struct Machine<'p> {
    program: &'p Program,
    config: Config,
    layout: Layout,
    enumerators: Enumerators,
    functions: BTreeMap<&'p str, FunctionInfo<'p>>,
    privates: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl<'p> Machine<'p> {
    /// Prepare a program for analysis.
    ///
    /// Fails when the entry function does not exist, or when the program's
    /// types or enumerations are malformed. Malformed functions do not
    /// fail here, they are reported when called.
    pub fn new(program: &'p Program, config: &Config) -> Result<Machine<'p>, Error> {
        if program.function_by_name(program.entry()).is_none() {
            return Err(Error::UnknownFunction(program.entry().to_string()));
        }
        let layout = Layout::new(program, config)?;
        let enumerators = Enumerators::new(program, &layout)?;

        let mut functions = BTreeMap::new();
        let mut privates = BTreeMap::new();
        for (name, function) in program.functions() {
            let info = FunctionInfo::new(function, &enumerators, &layout);
            if let Some(reason) = info.malformed() {
                debug!("function `{}` is malformed: {}", name, reason);
            }
            privates.extend(
                info.privates()
                    .iter()
                    .map(|(construct, declarations)| (*construct, declarations.clone())),
            );
            functions.insert(name.as_str(), info);
        }

        Ok(Machine {
            program,
            config: config.clone(),
            layout,
            enumerators,
            functions,
            privates,
        })
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn enumerators(&self) -> &Enumerators {
        &self.enumerators
    }

    pub fn function_info(&self, name: &str) -> Option<&FunctionInfo<'p>> {
        self.functions.get(name)
    }

    pub(crate) fn info(&self, name: &str) -> Result<&FunctionInfo<'p>, Error> {
        self.function_info(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// The state which initializes globals and then calls the entry
    /// function.
    pub fn initial_state(&self) -> MachineState<'p> {
        let halt = RC::new(Frame::Halt);
        MachineState::new(
            Control::Declare(self.program.globals()),
            Environment::new(),
            Store::new(),
            RC::new(Frame::Start { next: halt }),
        )
    }

    /// The name of the function running on top of `kont`.
    pub(crate) fn function_name(&self, kont: &Kont<'p>) -> &'p str {
        current_function(kont).unwrap_or_else(|| self.program.entry())
    }

    /// Take one step from `state`.
    pub fn step(&self, state: MachineState<'p>) -> Vec<Successor<'p>> {
        trace!(
            "{} in `{}` at depth {}",
            state.control,
            self.function_name(&state.kont),
            frame_depth(&state.kont)
        );
        let mut successors = Vec::new();
        let fallback = state.clone();
        if let Err(error) = self.transition(state, &mut successors) {
            self.abandon(fallback, error, &mut successors);
        }
        successors
    }

    fn transition(&self, state: MachineState<'p>, out: &mut Successors<'p>) -> Result<(), Error> {
        match state.control.clone() {
            Control::Exec(statement) => self.exec(statement, state, out),
            Control::Eval(expression) => self.eval(expression, state, out),
            Control::Locate(expression) => self.locate(expression, state, out),
            Control::Declare(declarations) => self.declare(declarations, state, out),
            Control::Value(operand) => self.apply_value(operand, state, out),
            Control::Place(place) => self.apply_place(place, state, out),
            Control::Done => self.done(state, out),
        }
    }

    /// Give up on the current function after `error`: record it, and
    /// return `Top` to the caller.
    fn abandon(&self, state: MachineState<'p>, error: Error, out: &mut Successors<'p>) {
        let function = self.function_name(&state.kont);
        debug!("abandoning `{}`: {}", function, error);
        out.push(Successor::Malformed(Diagnostic::new(function, error.to_string())));

        let call = match call_frame(&state.kont) {
            Some(call) => call,
            None => return,
        };
        if let Frame::Call {
            return_type,
            environment,
            frame,
            next,
            ..
        } = call.as_ref()
        {
            if matches!(next.as_ref(), Frame::Halt) {
                return;
            }
            let mut state = state;
            state.store.retire_frames_from(*frame);
            state.environment = environment.clone();
            state.kont = next.clone();
            let value = Operand::new(AbstractValue::Top, return_type.clone());
            out.push(Successor::State(state.with_control(Control::Value(value))));
        }
    }

    pub(crate) fn proceed(
        &self,
        state: MachineState<'p>,
        control: Control<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        out.push(Successor::State(state.with_control(control)));
        Ok(())
    }

    pub(crate) fn fault(
        &self,
        kind: FaultKind,
        location: SourceLocation,
        address: Option<Address>,
        state: &MachineState<'p>,
        out: &mut Successors<'p>,
    ) {
        let function = self.function_name(&state.kont);
        match address {
            Some(address) => debug!("{} of {} in `{}` at {}", kind, address, function, location),
            None => debug!("{} in `{}` at {}", kind, function, location),
        }
        out.push(Successor::Fault(Fault::new(
            kind,
            function,
            location,
            address,
            state.store.clone(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::explorer::Terminal;

    fn program() -> Program {
        Program::new("main")
            .global(decl("g", Type::Int, Some(int(3))))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![ret(Some(ident("g")))]),
            ))
    }

    fn run(machine: &Machine, state: MachineState) -> Vec<Terminal> {
        let mut states = vec![state];
        let mut terminals = Vec::new();
        let mut steps = 0;
        while let Some(state) = states.pop() {
            steps += 1;
            assert!(steps < 1000);
            for successor in machine.step(state) {
                match successor {
                    Successor::State(state) => states.push(state),
                    Successor::Terminal(terminal) => terminals.push(terminal),
                    Successor::Summarize { .. } => {}
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
        terminals
    }

    #[test]
    fn straight_line() {
        let program = program();
        let machine = Machine::new(&program, &Config::default()).unwrap();
        let terminals = run(&machine, machine.initial_state());
        assert_eq!(terminals.len(), 1);
        assert_eq!(terminals[0].value(), &AbstractValue::Pos);
    }

    #[test]
    fn missing_entry() {
        let program = Program::new("start");
        assert!(matches!(
            Machine::new(&program, &Config::default()),
            Err(Error::UnknownFunction(_))
        ));
    }
}
