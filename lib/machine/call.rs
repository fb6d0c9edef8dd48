//! Calls and returns.

use crate::ast::{Expression, Function, SourceLocation, Type};
use crate::domain::AbstractValue;
use crate::error::*;
use crate::explorer::{Diagnostic, Limit, LimitKind};
use crate::machine::{
    call_frame, frame_depth, is_active, is_builtin, Binding, CallKey, Control, Frame, Machine,
    MachineState, Operand, Successor, Successors,
};
use crate::memory::{Base, Block, FaultKind, Slot};
use log::{debug, warn};

impl<'p> Machine<'p> {
    /// Call every function the callee may denote.
    pub(crate) fn apply_call(
        &self,
        expression: &'p Expression,
        callee: Operand,
        arguments: Vec<Operand>,
        state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        match callee.value() {
            AbstractValue::CodePointer(labels) => {
                if labels.null() {
                    self.fault(
                        FaultKind::WildPointerDeref,
                        expression.location(),
                        None,
                        &state,
                        out,
                    );
                }
                let names: Vec<&str> = labels.labels().collect();
                for name in names {
                    self.invoke(name, expression, &arguments, state.clone(), out)?;
                }
                Ok(())
            }
            AbstractValue::Bottom => Ok(()),
            _ => {
                self.fault(
                    FaultKind::WildPointerDeref,
                    expression.location(),
                    None,
                    &state,
                    out,
                );
                Ok(())
            }
        }
    }

    fn invoke(
        &self,
        name: &str,
        expression: &'p Expression,
        arguments: &[Operand],
        state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        if let Some(function) = self.program.function_by_name(name) {
            if let Some(reason) = self.info(name)?.malformed() {
                out.push(Successor::Malformed(Diagnostic::new(name, reason)));
                let value = Operand::new(AbstractValue::Top, function.return_type().clone());
                return self.proceed(state, Control::Value(value), out);
            }
            return self.enter_function(function, arguments, expression.location(), state, out);
        }
        if is_builtin(name) {
            return self.builtin(name, expression, arguments, state, out);
        }
        warn!(
            "call of unknown function `{}` at {}, assuming any result",
            name,
            expression.location()
        );
        self.proceed(
            state,
            Control::Value(Operand::new(AbstractValue::Top, Type::Int)),
            out,
        )
    }

    /// Call the entry function, once globals are initialized.
    pub(crate) fn call_entry(
        &self,
        state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let entry = self.program.entry();
        let function = self
            .program
            .function_by_name(entry)
            .ok_or_else(|| Error::UnknownFunction(entry.to_string()))?;
        if let Some(reason) = self.info(entry)?.malformed() {
            out.push(Successor::Malformed(Diagnostic::new(entry, reason)));
            return Ok(());
        }
        let arguments: Vec<Operand> = function
            .parameters()
            .iter()
            .map(|parameter| Operand::new(AbstractValue::Top, parameter.type_().decay()))
            .collect();
        self.enter_function(function, &arguments, function.location(), state, out)
    }

    /// Bind parameters in a new frame and run the body. A call which is
    /// already active is handed to the explorer to be summarized.
    fn enter_function(
        &self,
        function: &'p Function,
        arguments: &[Operand],
        location: SourceLocation,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let name = function.name();
        let depth = frame_depth(&state.kont) + 1;
        if depth > self.config.max_call_depth() {
            warn!("call of `{}` at {} exceeds the call depth", name, location);
            out.push(Successor::Limit(Limit::new(LimitKind::CallDepth, name, location)));
            let value = Operand::new(AbstractValue::Top, function.return_type().clone());
            return self.proceed(state, Control::Value(value), out);
        }
        if arguments.len() < function.parameters().len() {
            return Err(Error::MalformedInput(
                self.function_name(&state.kont).to_string(),
                format!("too few arguments to `{}` at {}", name, location),
            ));
        }

        let key = CallKey::new(
            name,
            arguments
                .iter()
                .map(|argument| argument.value().clone())
                .collect(),
        );
        if is_active(&state.kont, &key) {
            debug!("`{}` recurs at {}", name, location);
            out.push(Successor::Recur { key, waiter: state });
            return Ok(());
        }

        let caller = state.environment.clone();
        state.environment = caller.enter_function();
        for (parameter, argument) in function.parameters().iter().zip(arguments) {
            let type_ = parameter.type_().decay();
            let base = Base::stack(depth, Slot::Variable(parameter.id()));
            state.store.allocate(
                base,
                Block::new(self.layout.size_of(&type_)?, AbstractValue::Undefined),
            );
            let value = self.convert(argument.clone(), &type_);
            self.initialize(base, &type_, &value, &mut state)?;
            state
                .environment
                .bind(parameter.name(), Binding::new(base, type_));
        }

        let return_type = function.return_type().clone();
        state.push(|next| Frame::Call {
            function: name,
            key,
            return_type,
            environment: caller,
            frame: depth,
            next,
        });
        self.proceed(state, Control::Exec(function.body()), out)
    }

    /// Return from the innermost call with `value`.
    pub(crate) fn return_(
        &self,
        value: Operand,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let call = call_frame(&state.kont)
            .ok_or_else(|| Error::Analysis("return outside of a function".to_string()))?;
        let (key, return_type, environment, frame, next) = match call.as_ref() {
            Frame::Call {
                key,
                return_type,
                environment,
                frame,
                next,
                ..
            } => (key, return_type, environment, *frame, next),
            _ => return Err(Error::Analysis("call frame expected".to_string())),
        };
        let value = match return_type {
            Type::Void => Operand::void(),
            return_type => self.convert(value, return_type),
        };
        state.store.retire_frames_from(frame);
        out.push(Successor::Summarize {
            key: key.clone(),
            value: value.clone(),
            store: state.store.clone(),
        });
        state.environment = environment.clone();
        state.kont = next.clone();
        self.proceed(state, Control::Value(value), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::config::Config;

    fn successors_of<'p>(machine: &Machine<'p>, state: MachineState<'p>) -> Vec<Successor<'p>> {
        let mut states = vec![state];
        let mut results = Vec::new();
        let mut steps = 0;
        while let Some(state) = states.pop() {
            steps += 1;
            assert!(steps < 1000);
            for successor in machine.step(state) {
                match successor {
                    Successor::State(state) => states.push(state),
                    other => results.push(other),
                }
            }
        }
        results
    }

    #[test]
    fn recursion_is_handed_off() {
        // int f(int n) { return f(n); } int main() { return f(1); }
        let program = Program::new("main")
            .function(Function::new(
                "f",
                Type::Int,
                vec![param("n", Type::Int)],
                block(vec![ret(Some(call("f", vec![ident("n")])))]),
            ))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![ret(Some(call("f", vec![int(1)])))]),
            ));
        let machine = Machine::new(&program, &Config::default()).unwrap();
        let results = successors_of(&machine, machine.initial_state());
        assert!(results.iter().any(|successor| matches!(
            successor,
            Successor::Recur { key, waiter }
                if key.function() == "f" && frame_depth(waiter.kont()) == 2
        )));
        assert!(!results
            .iter()
            .any(|successor| matches!(successor, Successor::Terminal(_))));
    }

    #[test]
    fn call_depth() {
        // int f(long n) { return f(n - 1); }, the argument changes until it reaches Top.
        let program = Program::new("main")
            .function(Function::new(
                "f",
                Type::Int,
                vec![param("n", Type::Long)],
                block(vec![ret(Some(call("f", vec![sub(ident("n"), int(1))])))]),
            ))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![ret(Some(call("f", vec![int(1)])))]),
            ));
        let config = Config::default().with_max_call_depth(3);
        let machine = Machine::new(&program, &config).unwrap();
        let results = successors_of(&machine, machine.initial_state());
        assert!(results.iter().any(|successor| matches!(
            successor,
            Successor::Limit(limit) if limit.kind() == LimitKind::CallDepth
        )));
        assert!(results
            .iter()
            .any(|successor| matches!(successor, Successor::Terminal(_))));
    }

    #[test]
    fn too_few_arguments() {
        let program = Program::new("main")
            .function(Function::new(
                "f",
                Type::Int,
                vec![param("n", Type::Int)],
                block(vec![ret(Some(ident("n")))]),
            ))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![ret(Some(call("f", vec![])))]),
            ));
        let machine = Machine::new(&program, &Config::default()).unwrap();
        let results = successors_of(&machine, machine.initial_state());
        assert!(results
            .iter()
            .any(|successor| matches!(successor, Successor::Malformed(_))));
    }
}
