//! Continuation frames.
//!
//! A continuation is a persistent list of frames. Pushing a frame never
//! copies the frames below it, so sibling states share their common
//! continuation.

use crate::ast::{Declaration, Expression, Statement, Type};
use crate::domain::AbstractValue;
use crate::machine::{Environment, Operand, Place};
use crate::memory::Base;
use crate::RC;
use serde::Serialize;

pub type Kont<'p> = RC<Frame<'p>>;

/// Identifies a call by its callee and the abstract values of its arguments.
/// Calls with equal keys share a return summary.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CallKey {
    function: String,
    arguments: Vec<AbstractValue>,
}

impl CallKey {
    pub fn new<S: Into<String>>(function: S, arguments: Vec<AbstractValue>) -> CallKey {
        CallKey {
            function: function.into(),
            arguments,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn arguments(&self) -> &[AbstractValue] {
        &self.arguments
    }
}

/// One element of an initializer list, flattened to the offset and type of
/// the scalar, struct or union it initializes.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InitItem<'p> {
    pub(crate) offset: i64,
    pub(crate) type_: Type,
    pub(crate) expression: &'p Expression,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Frame<'p> {
    /// The bottom of every continuation. The entry function returns here.
    Halt,
    /// Globals are initialized, call the entry function.
    Start { next: Kont<'p> },
    /// The remaining statements of a block.
    Sequence {
        rest: &'p [Statement],
        next: Kont<'p>,
    },
    /// Leaving a scope restores `environment` and retires what was declared
    /// inside it.
    Scope {
        environment: Environment,
        next: Kont<'p>,
    },
    /// The target of `break` and `continue`. A body which completes lands
    /// here and continues with the next iteration.
    Loop {
        statement: &'p Statement,
        environment: Environment,
        next: Kont<'p>,
    },
    LoopTest {
        statement: &'p Statement,
        next: Kont<'p>,
    },
    LoopStep {
        statement: &'p Statement,
        next: Kont<'p>,
    },
    ForInit {
        statement: &'p Statement,
        next: Kont<'p>,
    },
    Branch {
        statement: &'p Statement,
        next: Kont<'p>,
    },
    SwitchSelect {
        statement: &'p Statement,
        next: Kont<'p>,
    },
    /// The target of `break` inside a switch.
    SwitchBreak {
        environment: Environment,
        next: Kont<'p>,
    },
    /// An active OpenMP construct, entered at call depth `frame`.
    Construct {
        statement: &'p Statement,
        frame: usize,
        environment: Environment,
        next: Kont<'p>,
    },
    Discard { next: Kont<'p> },
    Return { next: Kont<'p> },
    /// An active call. Returning restores the caller's environment and
    /// retires the callee's stack frame.
    Call {
        function: &'p str,
        key: CallKey,
        return_type: Type,
        environment: Environment,
        frame: usize,
        next: Kont<'p>,
    },
    Initialize {
        declaration: &'p Declaration,
        base: Base,
        type_: Type,
        rest: &'p [Declaration],
        next: Kont<'p>,
    },
    InitializeList {
        base: Base,
        items: RC<Vec<InitItem<'p>>>,
        index: usize,
        rest: &'p [Declaration],
        next: Kont<'p>,
    },
    Load {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    AddressOf {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Dereference {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    IncDec {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Unary {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    BinaryLeft {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    BinaryRight {
        expression: &'p Expression,
        lhs: Operand,
        next: Kont<'p>,
    },
    LogicalLeft {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    LogicalRight {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    AssignTarget {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    AssignValue {
        expression: &'p Expression,
        place: Place,
        next: Kont<'p>,
    },
    Conditional {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Comma {
        rest: &'p [Expression],
        next: Kont<'p>,
    },
    Callee {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Argument {
        expression: &'p Expression,
        callee: Operand,
        arguments: Vec<Operand>,
        next: Kont<'p>,
    },
    IndexBase {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    IndexOffset {
        expression: &'p Expression,
        base: Operand,
        next: Kont<'p>,
    },
    Member {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Arrow {
        expression: &'p Expression,
        next: Kont<'p>,
    },
    Cast {
        expression: &'p Expression,
        next: Kont<'p>,
    },
}

impl<'p> Frame<'p> {
    pub fn next(&self) -> Option<&Kont<'p>> {
        match self {
            Frame::Halt => None,
            Frame::Start { next }
            | Frame::Sequence { next, .. }
            | Frame::Scope { next, .. }
            | Frame::Loop { next, .. }
            | Frame::LoopTest { next, .. }
            | Frame::LoopStep { next, .. }
            | Frame::ForInit { next, .. }
            | Frame::Branch { next, .. }
            | Frame::SwitchSelect { next, .. }
            | Frame::SwitchBreak { next, .. }
            | Frame::Construct { next, .. }
            | Frame::Discard { next }
            | Frame::Return { next }
            | Frame::Call { next, .. }
            | Frame::Initialize { next, .. }
            | Frame::InitializeList { next, .. }
            | Frame::Load { next, .. }
            | Frame::AddressOf { next, .. }
            | Frame::Dereference { next, .. }
            | Frame::IncDec { next, .. }
            | Frame::Unary { next, .. }
            | Frame::BinaryLeft { next, .. }
            | Frame::BinaryRight { next, .. }
            | Frame::LogicalLeft { next, .. }
            | Frame::LogicalRight { next, .. }
            | Frame::AssignTarget { next, .. }
            | Frame::AssignValue { next, .. }
            | Frame::Conditional { next, .. }
            | Frame::Comma { next, .. }
            | Frame::Callee { next, .. }
            | Frame::Argument { next, .. }
            | Frame::IndexBase { next, .. }
            | Frame::IndexOffset { next, .. }
            | Frame::Member { next, .. }
            | Frame::Arrow { next, .. }
            | Frame::Cast { next, .. } => Some(next),
        }
    }

    fn next_mut(&mut self) -> Option<&mut Kont<'p>> {
        match self {
            Frame::Halt => None,
            Frame::Start { next }
            | Frame::Sequence { next, .. }
            | Frame::Scope { next, .. }
            | Frame::Loop { next, .. }
            | Frame::LoopTest { next, .. }
            | Frame::LoopStep { next, .. }
            | Frame::ForInit { next, .. }
            | Frame::Branch { next, .. }
            | Frame::SwitchSelect { next, .. }
            | Frame::SwitchBreak { next, .. }
            | Frame::Construct { next, .. }
            | Frame::Discard { next }
            | Frame::Return { next }
            | Frame::Call { next, .. }
            | Frame::Initialize { next, .. }
            | Frame::InitializeList { next, .. }
            | Frame::Load { next, .. }
            | Frame::AddressOf { next, .. }
            | Frame::Dereference { next, .. }
            | Frame::IncDec { next, .. }
            | Frame::Unary { next, .. }
            | Frame::BinaryLeft { next, .. }
            | Frame::BinaryRight { next, .. }
            | Frame::LogicalLeft { next, .. }
            | Frame::LogicalRight { next, .. }
            | Frame::AssignTarget { next, .. }
            | Frame::AssignValue { next, .. }
            | Frame::Conditional { next, .. }
            | Frame::Comma { next, .. }
            | Frame::Callee { next, .. }
            | Frame::Argument { next, .. }
            | Frame::IndexBase { next, .. }
            | Frame::IndexOffset { next, .. }
            | Frame::Member { next, .. }
            | Frame::Arrow { next, .. }
            | Frame::Cast { next, .. } => Some(next),
        }
    }

    fn map_operands<F>(&mut self, f: &F)
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        match self {
            Frame::BinaryRight { lhs, .. } => *lhs = lhs.map_values(f),
            Frame::AssignValue { place, .. } => *place = place.map_values(f),
            Frame::Argument {
                callee, arguments, ..
            } => {
                *callee = callee.map_values(f);
                for argument in arguments.iter_mut() {
                    *argument = argument.map_values(f);
                }
            }
            Frame::IndexOffset { base, .. } => *base = base.map_values(f),
            _ => {}
        }
    }
}

/// Every frame of a continuation, top first.
pub fn frames<'a, 'p>(kont: &'a Kont<'p>) -> impl Iterator<Item = &'a Kont<'p>> {
    std::iter::successors(Some(kont), |kont| kont.next())
}

/// The call depth of the code running on top of `kont`. Globals live in
/// frame 0, and the entry function runs in frame 1.
pub fn frame_depth(kont: &Kont) -> usize {
    frames(kont)
        .find_map(|kont| match kont.as_ref() {
            Frame::Call { frame, .. } => Some(*frame),
            _ => None,
        })
        .unwrap_or(0)
}

/// The function running on top of `kont`, if any.
pub fn current_function<'p>(kont: &Kont<'p>) -> Option<&'p str> {
    frames(kont).find_map(|kont| match kont.as_ref() {
        Frame::Call { function, .. } => Some(*function),
        _ => None,
    })
}

/// The continuation starting at the innermost call frame.
pub fn call_frame<'p>(kont: &Kont<'p>) -> Option<Kont<'p>> {
    frames(kont)
        .find(|kont| matches!(kont.as_ref(), Frame::Call { .. }))
        .cloned()
}

/// The innermost OpenMP construct active in the current function, and the
/// depth it was entered at.
pub fn construct<'p>(kont: &Kont<'p>) -> Option<(&'p Statement, usize)> {
    frames(kont).find_map(|kont| match kont.as_ref() {
        Frame::Construct {
            statement, frame, ..
        } => Some((*statement, *frame)),
        _ => None,
    })
}

/// Whether a call with this key is already active.
pub fn is_active(kont: &Kont, key: &CallKey) -> bool {
    frames(kont).any(|kont| match kont.as_ref() {
        Frame::Call { key: active, .. } => active == key,
        _ => false,
    })
}

/// Rebuild `kont` with `f` applied to every value its frames hold.
pub(crate) fn map_values<'p, F>(kont: &Kont<'p>, f: &F) -> Kont<'p>
where
    F: Fn(&AbstractValue) -> AbstractValue,
{
    let mut frame = kont.as_ref().clone();
    frame.map_operands(f);
    if let Some(next) = frame.next_mut() {
        *next = map_values(next, f);
    }
    RC::new(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_frames() {
        let halt = RC::new(Frame::Halt);
        assert_eq!(frame_depth(&halt), 0);
        assert_eq!(current_function(&halt), None);

        let key = CallKey::new("f", vec![AbstractValue::Pos]);
        let call = RC::new(Frame::Call {
            function: "f",
            key: key.clone(),
            return_type: Type::Int,
            environment: Environment::new(),
            frame: 2,
            next: halt,
        });
        let top = RC::new(Frame::Discard { next: call });
        assert_eq!(frame_depth(&top), 2);
        assert_eq!(current_function(&top), Some("f"));
        assert!(is_active(&top, &key));
        assert!(!is_active(&top, &CallKey::new("f", vec![AbstractValue::Neg])));
        assert_eq!(frames(&top).count(), 3);
    }
}
