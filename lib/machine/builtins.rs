//! Library functions the machine models directly.

use crate::ast::{Expression, Type};
use crate::config::HeapMergePolicy;
use crate::domain::AbstractValue;
use crate::error::*;
use crate::explorer::Terminal;
use crate::machine::expression::call_arguments;
use crate::machine::{Control, Machine, MachineState, Operand, Successor, Successors};
use crate::memory::{Address, Base, Block, FaultKind, HeapInstance, Liveness, Offset};
use log::debug;

const BUILTINS: &[&str] = &[
    "malloc",
    "calloc",
    "free",
    "printf",
    "puts",
    "putchar",
    "abort",
    "exit",
    "assert",
    "rand",
    "omp_get_thread_num",
    "omp_get_num_threads",
    "omp_set_num_threads",
];

const NONDET_PREFIX: &str = "__VERIFIER_nondet";

/// Whether calls to `name` are modeled without a definition.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name) || name.starts_with(NONDET_PREFIX)
}

impl<'p> Machine<'p> {
    pub(crate) fn builtin(
        &self,
        name: &str,
        expression: &'p Expression,
        arguments: &[Operand],
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let value = match name {
            "malloc" | "calloc" => {
                let size = if name == "calloc" {
                    match (argument(arguments, 0)?.known(), argument(arguments, 1)?.known()) {
                        (Some(count), Some(size)) => count.checked_mul(size),
                        _ => None,
                    }
                } else {
                    argument(arguments, 0)?.known()
                };
                let background = if name == "calloc" {
                    AbstractValue::Zero
                } else {
                    AbstractValue::Undefined
                };
                self.allocate(expression, size, background, &mut state)
            }
            "free" => {
                if !self.free(expression, argument(arguments, 0)?, &mut state, out) {
                    return Ok(());
                }
                Operand::void()
            }
            "printf" | "puts" | "putchar" => Operand::new(AbstractValue::Top, Type::Int),
            "abort" => {
                debug!("abort at {}", expression.location());
                return Ok(());
            }
            "exit" => {
                let status = argument(arguments, 0)?.value().clone();
                out.push(Successor::Terminal(Terminal::new(status, state.store)));
                return Ok(());
            }
            "assert" => {
                let condition = call_arguments(expression).first().ok_or_else(|| {
                    Error::MalformedInput(name.to_string(), "missing argument".to_string())
                })?;
                for (outcome, store) in self.branches(condition, argument(arguments, 0)?, &state)? {
                    if outcome {
                        let mut passed = state.clone();
                        passed.store = store;
                        out.push(Successor::State(
                            passed.with_control(Control::Value(Operand::void())),
                        ));
                    } else {
                        debug!("assertion at {} may fail", expression.location());
                    }
                }
                return Ok(());
            }
            "rand" | "omp_get_thread_num" => Operand::new(AbstractValue::PosOrZero, Type::Int),
            "omp_get_num_threads" => Operand::new(AbstractValue::Pos, Type::Int),
            "omp_set_num_threads" => Operand::void(),
            _ if name.starts_with(NONDET_PREFIX) => Operand::new(AbstractValue::Top, Type::Int),
            _ => return Err(Error::UnknownFunction(name.to_string())),
        };
        self.proceed(state, Control::Value(value), out)
    }

    /// A fresh heap object for the allocation site of `expression`.
    fn allocate(
        &self,
        expression: &Expression,
        size: Option<i64>,
        background: AbstractValue,
        state: &mut MachineState<'p>,
    ) -> Operand {
        let site = match self.config.heap_merge_policy() {
            HeapMergePolicy::PerSite => expression.id(),
            HeapMergePolicy::Global => 0,
        };
        if let Some((recent, summary)) = state.store.fold_recent(site) {
            state.rename(&recent, &summary);
        }
        let base = Base::heap(site, HeapInstance::Recent);
        let size = size.and_then(|size| u64::try_from(size).ok());
        state.store.allocate(base, Block::new(size, background));
        Operand::new(
            AbstractValue::address(Address::new(base, Offset::Exact(0))),
            Type::Void.pointer_to(),
        )
    }

    /// Release the objects a pointer may point to. Returns false when the
    /// branch ends.
    fn free(
        &self,
        expression: &Expression,
        pointer: &Operand,
        state: &mut MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> bool {
        let location = expression.location();
        let set = match pointer.value() {
            AbstractValue::Zero => return true,
            AbstractValue::Bottom => return false,
            AbstractValue::Pointer(set) => set,
            _ => {
                self.fault(FaultKind::WildPointerDeref, location, None, state, out);
                return false;
            }
        };
        let targets: Vec<Address> = set.targets().collect();
        let definite = targets.len() == 1 && !set.null();
        let mut live = set.null();
        for address in targets {
            let base = address.base();
            if !base.is_heap() {
                self.fault(FaultKind::WildPointerDeref, location, Some(address), state, out);
                continue;
            }
            match state.store.block(&base).map(Block::liveness) {
                None | Some(Liveness::Freed) => {
                    self.fault(FaultKind::UseAfterFree, location, Some(address), state, out);
                    continue;
                }
                Some(_) => {}
            }
            if address.offset() != Offset::Exact(0) {
                self.fault(FaultKind::WildPointerDeref, location, Some(address), state, out);
                continue;
            }
            let liveness = if definite && base.is_singleton() {
                Liveness::Freed
            } else {
                Liveness::MaybeFreed
            };
            state.store.set_liveness(&base, liveness);
            live = true;
        }
        live
    }
}

fn argument(arguments: &[Operand], index: usize) -> Result<&Operand, Error> {
    arguments.get(index).ok_or_else(|| {
        Error::MalformedInput(
            "builtin".to_string(),
            format!("missing argument {}", index + 1),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(is_builtin("malloc"));
        assert!(is_builtin("__VERIFIER_nondet_int"));
        assert!(!is_builtin("main"));
        assert!(!is_builtin("mallocx"));
    }
}
