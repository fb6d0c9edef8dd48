//! Reads and writes through places, with their faults and events.

use crate::ast::{NodeId, SourceLocation, Type};
use crate::domain::AbstractValue;
use crate::error::*;
use crate::explorer::{AccessKind, Event};
use crate::machine::{
    construct, frames, Frame, Machine, MachineState, Operand, Place, Successor, Successors,
};
use crate::memory::{Address, Base, FaultKind, Fragment, Slot};

impl<'p> Machine<'p> {
    /// The addresses a place may denote. Faults for null or non-pointer
    /// places are recorded here.
    fn targets(
        &self,
        place: &Place,
        location: SourceLocation,
        state: &MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Vec<Address> {
        match place.pointer() {
            AbstractValue::Pointer(set) => {
                if set.null() {
                    self.fault(FaultKind::WildPointerDeref, location, None, state, out);
                }
                set.targets().collect()
            }
            AbstractValue::Bottom => Vec::new(),
            _ => {
                self.fault(FaultKind::WildPointerDeref, location, None, state, out);
                Vec::new()
            }
        }
    }

    /// Read the value at a place. Returns `None` when every target faults
    /// and the branch ends.
    pub(crate) fn load(
        &self,
        place: &Place,
        location: SourceLocation,
        state: &mut MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<Option<Operand>, Error> {
        let type_ = place.type_();
        match type_ {
            Type::Array(element, _) => {
                return Ok(Some(Operand::new(
                    place.pointer().clone(),
                    element.as_ref().clone().pointer_to(),
                )))
            }
            Type::Function(_) => {
                return Ok(Some(Operand::new(
                    place.pointer().clone(),
                    type_.clone().pointer_to(),
                )))
            }
            _ => {}
        }

        let width = self.layout.width_of(type_)?;
        let mut value = AbstractValue::Bottom;
        let mut fragments = Vec::new();
        let mut live = false;
        for address in self.targets(place, location, state, out) {
            let result = if type_.is_aggregate() {
                state.store.load_fragment(&address, width).map(|fragment| {
                    let summary = fragment.summary();
                    fragments.push(fragment);
                    summary
                })
            } else {
                state.store.load(&address, width)
            };
            match result {
                Ok(loaded) => {
                    self.event(address, &loaded, AccessKind::Read, location, state, out);
                    value = value.join(&loaded);
                    live = true;
                }
                Err(kind) => {
                    self.fault(kind, location, Some(address), state, out);
                    if !kind.terminates() {
                        value = value.join(&AbstractValue::Top);
                        live = true;
                    }
                }
            }
        }
        if !live {
            return Ok(None);
        }

        if type_.is_aggregate() {
            let fragment = if fragments.len() == 1 {
                fragments.remove(0)
            } else {
                Fragment::uniform(width, value)
            };
            return Ok(Some(Operand::fragment(fragment, type_.clone())));
        }
        Ok(Some(Operand::new(value, type_.clone())))
    }

    /// Write an operand to a place. Returns false when every target faults
    /// and the branch ends.
    pub(crate) fn write(
        &self,
        place: &Place,
        operand: &Operand,
        location: SourceLocation,
        state: &mut MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<bool, Error> {
        let type_ = place.type_();
        let width = self.layout.width_of(type_)?;
        let targets = self.targets(place, location, state, out);
        let strong = match place.pointer() {
            AbstractValue::Pointer(set) => {
                targets.len() == 1
                    && !set.null()
                    && targets[0].base().is_singleton()
                    && targets[0].offset().exact().is_some()
            }
            _ => false,
        };

        let fragment = if type_.is_aggregate() {
            Some(
                operand
                    .bytes()
                    .cloned()
                    .unwrap_or_else(|| Fragment::uniform(width, operand.value().clone())),
            )
        } else {
            None
        };

        let mut live = false;
        for address in targets {
            let result = match &fragment {
                Some(fragment) => state.store.store_fragment(&address, fragment, strong),
                None => state
                    .store
                    .store(&address, width, operand.value().clone(), strong),
            };
            match result {
                Ok(()) => {
                    self.event(address, operand.value(), AccessKind::Write, location, state, out);
                    live = true;
                }
                Err(kind) => {
                    self.fault(kind, location, Some(address), state, out);
                    live |= !kind.terminates();
                }
            }
        }
        Ok(live)
    }

    /// Store an operand into a fresh block, such as a parameter.
    pub(crate) fn initialize(
        &self,
        base: Base,
        type_: &Type,
        operand: &Operand,
        state: &mut MachineState<'p>,
    ) -> Result<(), Error> {
        let address = Address::new(base, crate::memory::Offset::Exact(0));
        let result = if type_.is_aggregate() {
            let size = self.layout.width_of(type_)?;
            let fragment = operand
                .bytes()
                .cloned()
                .unwrap_or_else(|| Fragment::uniform(size, operand.value().clone()));
            state.store.store_fragment(&address, &fragment, true)
        } else {
            let width = self.layout.width_of(type_)?;
            state.store.store(&address, width, operand.value().clone(), true)
        };
        result.map_err(|kind| Error::Analysis(format!("{} initializing {}", kind, address)))
    }

    /// Record an access to shared memory made inside an OpenMP construct.
    fn event(
        &self,
        address: Address,
        value: &AbstractValue,
        access: AccessKind,
        location: SourceLocation,
        state: &MachineState<'p>,
        out: &mut Successors<'p>,
    ) {
        let (statement, frame) = match construct(&state.kont) {
            Some(construct) => construct,
            None => return,
        };
        if self.is_private(&address, frame, state) {
            return;
        }
        out.push(Successor::Event(Event::new(
            address,
            value.clone(),
            statement.id(),
            access,
            location,
        )));
    }

    /// Whether each thread of the innermost construct, entered at `frame`,
    /// has its own copy of the object at `address`.
    fn is_private(&self, address: &Address, frame: usize, state: &MachineState<'p>) -> bool {
        match address.base() {
            Base::Heap { .. } => false,
            Base::Stack { frame: owner, .. } if owner > frame => true,
            Base::Stack {
                slot: Slot::Private(_, _),
                ..
            } => true,
            Base::Stack {
                frame: owner,
                slot: Slot::Variable(declaration),
            } => owner == frame && self.declared_in_construct(declaration, frame, state),
            Base::Stack {
                slot: Slot::Literal(_),
                ..
            } => false,
        }
    }

    /// Whether a declaration belongs to the body of an active construct.
    fn declared_in_construct(&self, declaration: NodeId, frame: usize, state: &MachineState<'p>) -> bool {
        frames(&state.kont).any(|kont| match kont.as_ref() {
            Frame::Construct {
                statement,
                frame: entered,
                ..
            } if *entered == frame => self
                .privates
                .get(&statement.id())
                .map(|declarations| declarations.contains(&declaration))
                .unwrap_or(false),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::config::Config;
    use crate::machine::{Control, Environment};
    use crate::memory::{Block, Offset, Store};
    use crate::RC;

    fn program() -> Program {
        Program::new("main")
            .aggregate(structure("pair", vec![("a", Type::Int), ("b", Type::Int)]))
            .function(Function::new("main", Type::Int, vec![], block(vec![])))
    }

    fn state<'p>() -> MachineState<'p> {
        MachineState::new(
            Control::Done,
            Environment::new(),
            Store::new(),
            RC::new(Frame::Halt),
        )
    }

    fn place(base: Base, offset: i64, type_: Type) -> Place {
        Place::new(
            AbstractValue::address(Address::new(base, Offset::Exact(offset))),
            type_,
        )
    }

    #[test]
    fn scalar_access() {
        let program = program();
        let machine = Machine::new(&program, &Config::default()).unwrap();
        let mut state = state();
        let mut out = Vec::new();
        let base = Base::stack(1, Slot::Variable(1));
        state
            .store
            .allocate(base, Block::new(Some(8), AbstractValue::Undefined));

        let location = SourceLocation::default();
        let first = place(base, 0, Type::Int);
        assert_eq!(
            machine.load(&first, location, &mut state, &mut out).unwrap(),
            None
        );
        assert!(matches!(
            &out[..],
            [Successor::Fault(fault)] if fault.kind() == FaultKind::UninitializedRead
        ));

        out.clear();
        let written = machine
            .write(&first, &Operand::exact(3, Type::Int), location, &mut state, &mut out)
            .unwrap();
        assert!(written);
        assert!(out.is_empty());
        let loaded = machine
            .load(&first, location, &mut state, &mut out)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.value(), &AbstractValue::Pos);

        let beyond = place(base, 8, Type::Int);
        let loaded = machine
            .load(&beyond, location, &mut state, &mut out)
            .unwrap()
            .unwrap();
        assert!(loaded.value().is_top());
        assert!(matches!(
            &out[..],
            [Successor::Fault(fault)] if fault.kind() == FaultKind::OutOfBounds
        ));
    }

    #[test]
    fn wild_and_aggregate() {
        let program = program();
        let machine = Machine::new(&program, &Config::default()).unwrap();
        let mut state = state();
        let mut out = Vec::new();
        let location = SourceLocation::default();

        let null = Place::new(AbstractValue::Zero, Type::Int);
        assert!(!machine
            .write(&null, &Operand::exact(1, Type::Int), location, &mut state, &mut out)
            .unwrap());
        assert!(matches!(
            &out[..],
            [Successor::Fault(fault)] if fault.kind() == FaultKind::WildPointerDeref
        ));

        let pair = Type::Struct("pair".to_string());
        let base = Base::stack(1, Slot::Variable(2));
        state
            .store
            .allocate(base, Block::new(Some(8), AbstractValue::Zero));
        let loaded = machine
            .load(&place(base, 0, pair.clone()), location, &mut state, &mut out)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.bytes().map(|fragment| fragment.size()), Some(8));
        assert_eq!(loaded.value(), &AbstractValue::Zero);
    }
}
