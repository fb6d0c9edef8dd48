use crate::ast::{Declaration, Expression, Statement, Type};
use crate::domain::AbstractValue;
use crate::machine::{Environment, Frame, Kont};
use crate::memory::{Base, Fragment, Store};
use crate::RC;
use std::fmt;

/// An evaluated rvalue.
///
/// Besides its abstract value, an operand remembers the exact integer it
/// denotes while it comes straight from constants, so that `sizeof`,
/// constant offsets and literal indices stay precise. Exactness is lost
/// once the value is written to memory. Struct and union rvalues carry the
/// bytes they were copied from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Operand {
    value: AbstractValue,
    type_: Type,
    exact: Option<i64>,
    fragment: Option<RC<Fragment>>,
}

impl Operand {
    pub fn new(value: AbstractValue, type_: Type) -> Operand {
        Operand {
            value,
            type_,
            exact: None,
            fragment: None,
        }
    }

    pub fn exact(value: i64, type_: Type) -> Operand {
        Operand {
            value: AbstractValue::of(value),
            type_,
            exact: Some(value),
            fragment: None,
        }
    }

    pub fn fragment(fragment: Fragment, type_: Type) -> Operand {
        Operand {
            value: fragment.summary(),
            type_,
            exact: None,
            fragment: Some(RC::new(fragment)),
        }
    }

    /// The value of a call to a function returning `void`, or of an
    /// expression evaluated only for its effects.
    pub fn void() -> Operand {
        Operand::new(AbstractValue::Top, Type::Void)
    }

    pub fn value(&self) -> &AbstractValue {
        &self.value
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }

    /// The exact integer this operand denotes, if it is known.
    pub fn known(&self) -> Option<i64> {
        match self.exact {
            Some(exact) => Some(exact),
            None if self.value == AbstractValue::Zero => Some(0),
            None => None,
        }
    }

    pub fn bytes(&self) -> Option<&Fragment> {
        self.fragment.as_deref()
    }

    /// The same value seen as another type.
    pub fn retype(mut self, type_: Type) -> Operand {
        self.type_ = type_;
        self
    }

    pub(crate) fn map_values<F>(&self, f: &F) -> Operand
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        Operand {
            value: f(&self.value),
            type_: self.type_.clone(),
            exact: self.exact,
            fragment: self.fragment.as_ref().map(|fragment| {
                let mut fragment = fragment.as_ref().clone();
                fragment.map_values(f);
                RC::new(fragment)
            }),
        }
    }
}

/// An evaluated lvalue: the addresses it may denote, and the type of the
/// object there.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Place {
    pointer: AbstractValue,
    type_: Type,
}

impl Place {
    pub fn new(pointer: AbstractValue, type_: Type) -> Place {
        Place { pointer, type_ }
    }

    pub fn pointer(&self) -> &AbstractValue {
        &self.pointer
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }

    pub(crate) fn map_values<F>(&self, f: &F) -> Place
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        Place {
            pointer: f(&self.pointer),
            type_: self.type_.clone(),
        }
    }
}

/// What the machine does next.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Control<'p> {
    /// Execute a statement.
    Exec(&'p Statement),
    /// Evaluate an expression to an `Operand`.
    Eval(&'p Expression),
    /// Evaluate an expression to a `Place`.
    Locate(&'p Expression),
    /// Declare variables, in order.
    Declare(&'p [Declaration]),
    /// Hand a value to the top frame.
    Value(Operand),
    /// Hand a place to the top frame.
    Place(Place),
    /// The last statement completed.
    Done,
}

impl<'p> Control<'p> {
    pub(crate) fn map_values<F>(&self, f: &F) -> Control<'p>
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        match self {
            Control::Value(operand) => Control::Value(operand.map_values(f)),
            Control::Place(place) => Control::Place(place.map_values(f)),
            control => control.clone(),
        }
    }
}

impl<'p> fmt::Display for Control<'p> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Control::Exec(statement) => write!(f, "exec {}", statement.location()),
            Control::Eval(expression) => write!(f, "eval {}", expression.location()),
            Control::Locate(expression) => write!(f, "locate {}", expression.location()),
            Control::Declare(declarations) => write!(f, "declare {}", declarations.len()),
            Control::Value(operand) => write!(f, "value {}", operand.value),
            Control::Place(place) => write!(f, "place {}", place.pointer),
            Control::Done => write!(f, "done"),
        }
    }
}

/// One abstract machine state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineState<'p> {
    pub(crate) control: Control<'p>,
    pub(crate) environment: Environment,
    pub(crate) store: Store,
    pub(crate) kont: Kont<'p>,
}

impl<'p> MachineState<'p> {
    pub fn new(
        control: Control<'p>,
        environment: Environment,
        store: Store,
        kont: Kont<'p>,
    ) -> MachineState<'p> {
        MachineState {
            control,
            environment,
            store,
            kont,
        }
    }

    pub fn control(&self) -> &Control<'p> {
        &self.control
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn kont(&self) -> &Kont<'p> {
        &self.kont
    }

    /// Push a frame built on top of the current continuation.
    pub(crate) fn push<F>(&mut self, frame: F)
    where
        F: FnOnce(Kont<'p>) -> Frame<'p>,
    {
        let next = self.kont.clone();
        self.kont = RC::new(frame(next));
    }

    pub(crate) fn with_control(mut self, control: Control<'p>) -> MachineState<'p> {
        self.control = control;
        self
    }

    /// Redirect every pointer held by this state from `from` to `to`.
    pub(crate) fn rename(&mut self, from: &Base, to: &Base) {
        let rename = |value: &AbstractValue| value.rename(from, to);
        self.control = self.control.map_values(&rename);
        self.kont = crate::machine::kont::map_values(&self.kont, &rename);
    }
}
