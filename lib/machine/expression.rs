//! Expressions, evaluated either to an [`Operand`] or to a [`Place`].

use crate::ast::{
    BinaryOperator, Constant, Expression, ExpressionKind, SourceLocation, Type, UnaryOperator,
};
use crate::domain::AbstractValue;
use crate::error::*;
use crate::machine::typing::constant_type;
use crate::machine::{
    common_type, evaluate, truncate, Control, Environment, Frame, Machine, MachineState, Operand, Place,
    Successor, Successors,
};
use crate::memory::{
    offset_pointer, pointer_difference, scale, Address, Base, Block, FaultKind, Offset, Slot,
    Store,
};
use log::trace;

/// The operands of a call expression.
pub(crate) fn call_arguments(expression: &Expression) -> &[Expression] {
    match expression.kind() {
        ExpressionKind::Call(_, arguments) => arguments,
        _ => &[],
    }
}

fn negate_offset(offset: Offset) -> Offset {
    match offset {
        Offset::Exact(offset) => match offset.checked_neg() {
            Some(offset) => Offset::Exact(offset),
            None => Offset::Unknown,
        },
        Offset::Unknown => Offset::Unknown,
    }
}

/// The type of an integer operand after promotion.
fn promote(type_: &Type) -> Type {
    if type_.is_integer() {
        common_type(type_, &Type::Int)
    } else {
        type_.clone()
    }
}

/// An operand converted to `_Bool`.
fn truth_of(operand: &Operand, type_: Type) -> Operand {
    match operand.known() {
        Some(known) => Operand::exact((known != 0) as i64, type_),
        None => Operand::new(
            AbstractValue::truth(operand.value().may_be_true(), operand.value().may_be_false()),
            type_,
        ),
    }
}

impl<'p> Machine<'p> {
    pub(crate) fn eval(
        &self,
        expression: &'p Expression,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let control = match expression.kind() {
            ExpressionKind::Constant(Constant::Integer(value)) => {
                Control::Value(Operand::exact(*value, constant_type(*value)))
            }
            ExpressionKind::Constant(Constant::Float(_)) => {
                Control::Value(Operand::new(AbstractValue::Top, Type::Double))
            }
            ExpressionKind::StringLiteral(text) => {
                let place = self.literal(expression, text, &mut state);
                Control::Value(Operand::new(
                    place.pointer().clone(),
                    Type::Char.pointer_to(),
                ))
            }
            ExpressionKind::Identifier(name) => {
                if state.environment.lookup(name).is_some() {
                    state.push(|next| Frame::Load { expression, next });
                    Control::Locate(expression)
                } else if let Some(function) = self.program.function_by_name(name) {
                    Control::Value(Operand::new(
                        AbstractValue::function(name.as_str()),
                        function.type_().pointer_to(),
                    ))
                } else if let Some(value) = self.enumerators.get(name) {
                    Control::Value(Operand::exact(value, Type::Int))
                } else if crate::machine::is_builtin(name) {
                    Control::Value(self.external(name))
                } else {
                    return Err(Error::UnknownIdentifier(name.to_string()));
                }
            }
            ExpressionKind::Unary(op, operand) => match op {
                UnaryOperator::Deref => {
                    state.push(|next| Frame::Load { expression, next });
                    Control::Locate(expression)
                }
                UnaryOperator::AddressOf => {
                    state.push(|next| Frame::AddressOf { expression, next });
                    Control::Locate(operand)
                }
                UnaryOperator::PreIncrement
                | UnaryOperator::PreDecrement
                | UnaryOperator::PostIncrement
                | UnaryOperator::PostDecrement => {
                    state.push(|next| Frame::IncDec { expression, next });
                    Control::Locate(operand)
                }
                UnaryOperator::Negate
                | UnaryOperator::Plus
                | UnaryOperator::Not
                | UnaryOperator::BitNot => {
                    state.push(|next| Frame::Unary { expression, next });
                    Control::Eval(operand)
                }
            },
            ExpressionKind::Binary(op, lhs, _) => {
                if op.is_logical() {
                    state.push(|next| Frame::LogicalLeft { expression, next });
                } else {
                    state.push(|next| Frame::BinaryLeft { expression, next });
                }
                Control::Eval(lhs)
            }
            ExpressionKind::Assign(_, lhs, _) => {
                state.push(|next| Frame::AssignTarget { expression, next });
                Control::Locate(lhs)
            }
            ExpressionKind::Conditional(condition, _, _) => {
                state.push(|next| Frame::Conditional { expression, next });
                Control::Eval(condition)
            }
            ExpressionKind::Comma(expressions) => match expressions.split_first() {
                Some((first, rest)) => {
                    if !rest.is_empty() {
                        state.push(|next| Frame::Comma { rest, next });
                    }
                    Control::Eval(first)
                }
                None => Control::Value(Operand::void()),
            },
            ExpressionKind::Call(callee, _) => {
                state.push(|next| Frame::Callee { expression, next });
                match callee.identifier() {
                    Some(name)
                        if state.environment.lookup(name).is_none()
                            && self.program.function_by_name(name).is_none()
                            && self.enumerators.get(name).is_none() =>
                    {
                        Control::Value(self.external(name))
                    }
                    _ => Control::Eval(callee),
                }
            }
            ExpressionKind::Index(_, _)
            | ExpressionKind::Member(_, _)
            | ExpressionKind::Arrow(_, _) => {
                state.push(|next| Frame::Load { expression, next });
                Control::Locate(expression)
            }
            ExpressionKind::Cast(_, operand) => {
                state.push(|next| Frame::Cast { expression, next });
                Control::Eval(operand)
            }
            ExpressionKind::SizeofType(type_) => Control::Value(self.size_operand(type_)?),
            ExpressionKind::SizeofExpression(operand) => {
                let type_ = self.type_of(operand, &state.environment)?;
                Control::Value(self.size_operand(&type_)?)
            }
        };
        self.proceed(state, control, out)
    }

    pub(crate) fn locate(
        &self,
        expression: &'p Expression,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let control = match expression.kind() {
            ExpressionKind::Identifier(name) => {
                if let Some(binding) = state.environment.lookup(name) {
                    Control::Place(Place::new(
                        AbstractValue::address(Address::new(binding.base(), Offset::Exact(0))),
                        binding.type_().clone(),
                    ))
                } else if let Some(function) = self.program.function_by_name(name) {
                    Control::Place(Place::new(
                        AbstractValue::function(name.as_str()),
                        function.type_(),
                    ))
                } else {
                    return Err(Error::UnknownIdentifier(name.to_string()));
                }
            }
            ExpressionKind::Unary(UnaryOperator::Deref, operand) => {
                state.push(|next| Frame::Dereference { expression, next });
                Control::Eval(operand)
            }
            ExpressionKind::Index(base, _) => {
                state.push(|next| Frame::IndexBase { expression, next });
                Control::Eval(base)
            }
            ExpressionKind::Member(aggregate, _) => {
                state.push(|next| Frame::Member { expression, next });
                Control::Locate(aggregate)
            }
            ExpressionKind::Arrow(pointer, _) => {
                state.push(|next| Frame::Arrow { expression, next });
                Control::Eval(pointer)
            }
            ExpressionKind::StringLiteral(text) => {
                Control::Place(self.literal(expression, text, &mut state))
            }
            _ => {
                return Err(Error::MalformedInput(
                    self.function_name(&state.kont).to_string(),
                    format!("expression at {} is not an lvalue", expression.location()),
                ))
            }
        };
        self.proceed(state, control, out)
    }

    /// A function outside the program, called by name.
    fn external(&self, name: &str) -> Operand {
        Operand::new(
            AbstractValue::function(name),
            Type::Int.function_returning(Vec::new()).pointer_to(),
        )
    }

    fn size_operand(&self, type_: &Type) -> Result<Operand, Error> {
        Ok(match self.layout.size_of(type_)? {
            Some(size) => Operand::exact(size as i64, Type::Long),
            None => Operand::new(AbstractValue::Pos, Type::Long),
        })
    }

    /// The characters of a string literal. Literals live in frame 0 and are
    /// allocated the first time they are evaluated.
    fn literal(&self, expression: &Expression, text: &str, state: &mut MachineState<'p>) -> Place {
        let base = Base::stack(0, Slot::Literal(expression.id()));
        let size = text.len() as u64 + 1;
        if !state.store.contains(&base) {
            state
                .store
                .allocate(base, Block::new(Some(size), AbstractValue::Zero));
            self.write_string(base, 0, text, state);
        }
        Place::new(
            AbstractValue::address(Address::new(base, Offset::Exact(0))),
            Type::Char.array_of(Some(size)),
        )
    }

    /// Continue the top frame with a value.
    pub(crate) fn apply_value(
        &self,
        operand: Operand,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let kont = state.kont.clone();
        let control = match kont.as_ref() {
            Frame::Unary { expression, next } => {
                state.kont = next.clone();
                let op = match expression.kind() {
                    ExpressionKind::Unary(op, _) => *op,
                    _ => return Err(Error::Analysis("unary frame without an operator".to_string())),
                };
                Control::Value(self.unary(op, operand))
            }
            Frame::BinaryLeft { expression, next } => {
                state.kont = next.clone();
                let rhs = match expression.kind() {
                    ExpressionKind::Binary(_, _, rhs) => rhs,
                    _ => return Err(Error::Analysis("binary frame without operands".to_string())),
                };
                let expression: &'p Expression = expression;
                state.push(|next| Frame::BinaryRight {
                    expression,
                    lhs: operand,
                    next,
                });
                Control::Eval(rhs)
            }
            Frame::BinaryRight {
                expression,
                lhs,
                next,
            } => {
                state.kont = next.clone();
                let op = match expression.kind() {
                    ExpressionKind::Binary(op, _, _) => *op,
                    _ => return Err(Error::Analysis("binary frame without operands".to_string())),
                };
                Control::Value(self.binary(op, lhs.clone(), operand)?)
            }
            Frame::LogicalLeft { expression, next } => {
                state.kont = next.clone();
                let (op, lhs, rhs) = match expression.kind() {
                    ExpressionKind::Binary(op, lhs, rhs) => (*op, lhs, rhs),
                    _ => return Err(Error::Analysis("logical frame without operands".to_string())),
                };
                let expression: &'p Expression = expression;
                let rhs: &'p Expression = rhs;
                let short = op == BinaryOperator::LogicalOr;
                for (outcome, store) in self.branches(lhs, &operand, &state)? {
                    let mut branch = state.clone();
                    branch.store = store;
                    let control = if outcome == short {
                        Control::Value(Operand::exact(short as i64, Type::Int))
                    } else {
                        branch.push(|next| Frame::LogicalRight { expression, next });
                        Control::Eval(rhs)
                    };
                    out.push(Successor::State(branch.with_control(control)));
                }
                return Ok(());
            }
            Frame::LogicalRight { next, .. } => {
                state.kont = next.clone();
                Control::Value(truth_of(&operand, Type::Int))
            }
            Frame::Conditional { expression, next } => {
                state.kont = next.clone();
                let (condition, then, else_) = match expression.kind() {
                    ExpressionKind::Conditional(condition, then, else_) => (condition, then, else_),
                    _ => return Err(Error::Analysis("conditional frame without operands".to_string())),
                };
                for (outcome, store) in self.branches(condition, &operand, &state)? {
                    let mut branch = state.clone();
                    branch.store = store;
                    let chosen: &'p Expression = if outcome { then } else { else_ };
                    out.push(Successor::State(branch.with_control(Control::Eval(chosen))));
                }
                return Ok(());
            }
            Frame::Comma { rest, next } => {
                state.kont = next.clone();
                let rest: &'p [Expression] = rest;
                if rest.len() > 1 {
                    let tail = &rest[1..];
                    state.push(|next| Frame::Comma { rest: tail, next });
                }
                Control::Eval(&rest[0])
            }
            Frame::Callee { expression, next } => {
                state.kont = next.clone();
                let arguments = call_arguments(expression);
                match arguments.first() {
                    Some(first) => {
                        let expression: &'p Expression = expression;
                        state.push(|next| Frame::Argument {
                            expression,
                            callee: operand,
                            arguments: Vec::new(),
                            next,
                        });
                        Control::Eval(first)
                    }
                    None => return self.apply_call(expression, operand, Vec::new(), state, out),
                }
            }
            Frame::Argument {
                expression,
                callee,
                arguments,
                next,
            } => {
                state.kont = next.clone();
                let expressions = call_arguments(expression);
                let mut arguments = arguments.clone();
                arguments.push(operand);
                match expressions.get(arguments.len()) {
                    Some(argument) => {
                        let expression: &'p Expression = expression;
                        let callee = callee.clone();
                        state.push(|next| Frame::Argument {
                            expression,
                            callee,
                            arguments,
                            next,
                        });
                        Control::Eval(argument)
                    }
                    None => {
                        return self.apply_call(expression, callee.clone(), arguments, state, out)
                    }
                }
            }
            Frame::IndexBase { expression, next } => {
                state.kont = next.clone();
                let index = match expression.kind() {
                    ExpressionKind::Index(_, index) => index,
                    _ => return Err(Error::Analysis("index frame without an index".to_string())),
                };
                let expression: &'p Expression = expression;
                state.push(|next| Frame::IndexOffset {
                    expression,
                    base: operand,
                    next,
                });
                Control::Eval(index)
            }
            Frame::IndexOffset {
                expression,
                base,
                next,
            } => {
                state.kont = next.clone();
                Control::Place(self.index(base, &operand, expression, &state)?)
            }
            Frame::Dereference { expression, next } => {
                state.kont = next.clone();
                let type_ = operand.type_().decay();
                match type_.pointee() {
                    Some(pointee) => Control::Place(Place::new(operand.value().clone(), pointee.clone())),
                    None => {
                        return Err(Error::MalformedInput(
                            self.function_name(&state.kont).to_string(),
                            format!("dereference of a non-pointer at {}", expression.location()),
                        ))
                    }
                }
            }
            Frame::Arrow { expression, next } => {
                state.kont = next.clone();
                let field = match expression.kind() {
                    ExpressionKind::Arrow(_, field) => field,
                    _ => return Err(Error::Analysis("arrow frame without a field".to_string())),
                };
                let type_ = operand.type_().decay();
                let aggregate = type_.pointee().ok_or_else(|| {
                    Error::MalformedInput(
                        self.function_name(&state.kont).to_string(),
                        format!("`->` on a non-pointer at {}", expression.location()),
                    )
                })?;
                let (offset, field) = self.layout.field(aggregate, field)?;
                Control::Place(Place::new(
                    offset_pointer(operand.value(), Offset::Exact(offset as i64)),
                    field,
                ))
            }
            Frame::Cast { expression, next } => {
                state.kont = next.clone();
                let target = match expression.kind() {
                    ExpressionKind::Cast(target, _) => target,
                    _ => return Err(Error::Analysis("cast frame without a type".to_string())),
                };
                match self.cast(operand, target, expression.location(), &state, out) {
                    Some(operand) => Control::Value(operand),
                    None => return Ok(()),
                }
            }
            Frame::AssignValue {
                expression,
                place,
                next,
            } => {
                state.kont = next.clone();
                let location = expression.location();
                let value = match expression.kind() {
                    ExpressionKind::Assign(Some(op), _, _) => {
                        let current = match self.load(place, location, &mut state, out)? {
                            Some(current) => current,
                            None => return Ok(()),
                        };
                        self.binary(*op, current, operand)?
                    }
                    _ => operand,
                };
                let value = self.convert(value, place.type_());
                if !self.write(place, &value, location, &mut state, out)? {
                    return Ok(());
                }
                Control::Value(value)
            }
            _ => return self.apply_statement_value(operand, state, out),
        };
        self.proceed(state, control, out)
    }

    /// Continue the top frame with a place.
    pub(crate) fn apply_place(
        &self,
        place: Place,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let kont = state.kont.clone();
        let control = match kont.as_ref() {
            Frame::Load { expression, next } => {
                state.kont = next.clone();
                match self.load(&place, expression.location(), &mut state, out)? {
                    Some(operand) => Control::Value(operand),
                    None => return Ok(()),
                }
            }
            Frame::AddressOf { next, .. } => {
                state.kont = next.clone();
                Control::Value(Operand::new(
                    place.pointer().clone(),
                    place.type_().clone().pointer_to(),
                ))
            }
            Frame::IncDec { expression, next } => {
                state.kont = next.clone();
                let op = match expression.kind() {
                    ExpressionKind::Unary(op, _) => *op,
                    _ => return Err(Error::Analysis("increment frame without an operator".to_string())),
                };
                let location = expression.location();
                let current = match self.load(&place, location, &mut state, out)? {
                    Some(current) => current,
                    None => return Ok(()),
                };
                let increment = matches!(op, UnaryOperator::PreIncrement | UnaryOperator::PostIncrement);
                let updated = self.step_value(&current, increment)?;
                let updated = self.convert(updated, place.type_());
                if !self.write(&place, &updated, location, &mut state, out)? {
                    return Ok(());
                }
                match op {
                    UnaryOperator::PreIncrement | UnaryOperator::PreDecrement => {
                        Control::Value(updated)
                    }
                    _ => Control::Value(current),
                }
            }
            Frame::AssignTarget { expression, next } => {
                state.kont = next.clone();
                let rhs = match expression.kind() {
                    ExpressionKind::Assign(_, _, rhs) => rhs,
                    _ => return Err(Error::Analysis("assignment frame without a value".to_string())),
                };
                let expression: &'p Expression = expression;
                state.push(|next| Frame::AssignValue {
                    expression,
                    place,
                    next,
                });
                Control::Eval(rhs)
            }
            Frame::Member { expression, next } => {
                state.kont = next.clone();
                let field = match expression.kind() {
                    ExpressionKind::Member(_, field) => field,
                    _ => return Err(Error::Analysis("member frame without a field".to_string())),
                };
                let (offset, field) = self.layout.field(place.type_(), field)?;
                Control::Place(Place::new(
                    offset_pointer(place.pointer(), Offset::Exact(offset as i64)),
                    field,
                ))
            }
            _ => return Err(Error::Analysis("place handed to an unexpected frame".to_string())),
        };
        self.proceed(state, control, out)
    }

    fn unary(&self, op: UnaryOperator, operand: Operand) -> Operand {
        let type_ = promote(operand.type_());
        if type_.is_floating() && op != UnaryOperator::Not {
            return Operand::new(AbstractValue::Top, type_);
        }
        match op {
            UnaryOperator::Negate => match operand.known().and_then(i64::checked_neg) {
                Some(value) => Operand::exact(value, type_),
                None => Operand::new(operand.value().negate(), type_),
            },
            UnaryOperator::Not => match operand.known() {
                Some(value) => Operand::exact((value == 0) as i64, Type::Int),
                None => Operand::new(operand.value().logical_not(), Type::Int),
            },
            UnaryOperator::BitNot => match operand.known() {
                Some(value) => Operand::exact(!value, type_),
                None => Operand::new(operand.value().bit_not(), type_),
            },
            _ => operand.retype(type_),
        }
    }

    /// Apply a binary operator which is not `&&` or `||`.
    pub(crate) fn binary(&self, op: BinaryOperator, lhs: Operand, rhs: Operand) -> Result<Operand, Error> {
        let left = lhs.type_().decay();
        let right = rhs.type_().decay();

        if op.is_relational() {
            if let (Some(a), Some(b)) = (lhs.known(), rhs.known()) {
                if let Some(result) = evaluate(op, a, b) {
                    return Ok(Operand::exact(result, Type::Int));
                }
            }
            return Ok(Operand::new(lhs.value().compare(op, rhs.value()), Type::Int));
        }

        match (left.is_pointer(), right.is_pointer(), op) {
            (true, false, BinaryOperator::Add) | (true, false, BinaryOperator::Sub) => {
                let size = self.layout.element_size(&left)?;
                let mut delta = scale(rhs.known(), rhs.value(), size);
                if op == BinaryOperator::Sub {
                    delta = negate_offset(delta);
                }
                return Ok(Operand::new(offset_pointer(lhs.value(), delta), left));
            }
            (false, true, BinaryOperator::Add) => {
                let size = self.layout.element_size(&right)?;
                let delta = scale(lhs.known(), lhs.value(), size);
                return Ok(Operand::new(offset_pointer(rhs.value(), delta), right));
            }
            (true, true, BinaryOperator::Sub) => {
                let size = self.layout.element_size(&left)?;
                return Ok(match pointer_difference(lhs.value(), rhs.value(), size) {
                    (_, Some(difference)) => Operand::exact(difference, Type::Long),
                    (value, None) => Operand::new(value, Type::Long),
                });
            }
            (true, _, _) => return Ok(Operand::new(AbstractValue::Top, left)),
            (_, true, _) => return Ok(Operand::new(AbstractValue::Top, right)),
            _ => {}
        }

        let type_ = common_type(&left, &right);
        if type_.is_floating() {
            return Ok(Operand::new(AbstractValue::Top, type_));
        }
        if let (Some(a), Some(b)) = (lhs.known(), rhs.known()) {
            if let Some(result) = evaluate(op, a, b) {
                return Ok(Operand::exact(result, type_));
            }
        }
        let value = match (op, lhs.known(), rhs.known()) {
            (BinaryOperator::Add, _, Some(1)) => lhs.value().add_one(),
            (BinaryOperator::Add, Some(1), _) => rhs.value().add_one(),
            (BinaryOperator::Sub, _, Some(1)) => lhs.value().sub_one(),
            _ => lhs.value().arithmetic(op, rhs.value()),
        };
        Ok(Operand::new(value, type_))
    }

    /// The value after `++` or `--`.
    fn step_value(&self, current: &Operand, increment: bool) -> Result<Operand, Error> {
        let type_ = current.type_().decay();
        if type_.is_pointer() {
            let delta = match self.layout.element_size(&type_)? {
                Some(size) if increment => Offset::Exact(size as i64),
                Some(size) => Offset::Exact(-(size as i64)),
                None => Offset::Unknown,
            };
            return Ok(Operand::new(offset_pointer(current.value(), delta), type_));
        }
        let op = if increment {
            BinaryOperator::Add
        } else {
            BinaryOperator::Sub
        };
        self.binary(op, current.clone(), Operand::exact(1, Type::Int))
    }

    /// The place `base[index]`. Either operand may be the pointer.
    fn index(
        &self,
        base: &Operand,
        index: &Operand,
        expression: &Expression,
        state: &MachineState<'p>,
    ) -> Result<Place, Error> {
        let (pointer, count) = if base.type_().is_pointer() {
            (base, index)
        } else if index.type_().is_pointer() {
            (index, base)
        } else {
            return Err(Error::MalformedInput(
                self.function_name(&state.kont).to_string(),
                format!("subscript of a non-pointer at {}", expression.location()),
            ));
        };
        let type_ = pointer.type_().decay();
        let element = type_.pointee().cloned().unwrap_or(Type::Char);
        let delta = scale(count.known(), count.value(), self.layout.element_size(&type_)?);
        Ok(Place::new(offset_pointer(pointer.value(), delta), element))
    }

    /// An explicit cast. Casts between code and data, and between
    /// aggregates and scalars, fault.
    pub(crate) fn cast(
        &self,
        operand: Operand,
        target: &Type,
        location: SourceLocation,
        state: &MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Option<Operand> {
        let source = operand.type_().decay();
        let invalid = (source.is_aggregate() && !target.is_aggregate() && *target != Type::Void)
            || (!source.is_aggregate() && target.is_aggregate())
            || (target.is_function_pointer()
                && matches!(operand.value(), AbstractValue::Pointer(_)))
            || (target.is_pointer()
                && !target.is_function_pointer()
                && matches!(operand.value(), AbstractValue::CodePointer(_)));
        if invalid {
            self.fault(FaultKind::InvalidCast, location, None, state, out);
            return None;
        }
        Some(match target {
            Type::Void => Operand::void(),
            _ => self.convert(operand, target),
        })
    }

    /// The implicit conversion of assignments, arguments and returns.
    pub(crate) fn convert(&self, operand: Operand, type_: &Type) -> Operand {
        match type_ {
            Type::Bool => truth_of(&operand, Type::Bool),
            type_ if type_.is_floating() => Operand::new(AbstractValue::Top, type_.clone()),
            type_ if type_.is_integer() && operand.type_().is_floating() => {
                Operand::new(AbstractValue::Top, type_.clone())
            }
            type_ if type_.is_integer() => {
                let width = self.layout.size_of(type_).ok().flatten();
                match (operand.known(), width) {
                    (Some(known), Some(width)) if truncate(known, width) != known => {
                        Operand::exact(truncate(known, width), type_.clone())
                    }
                    _ => operand.retype(type_.clone()),
                }
            }
            type_ => operand.retype(type_.clone()),
        }
    }

    /// The feasible outcomes of a condition, each with the store refined
    /// by it.
    pub(crate) fn branches(
        &self,
        condition: &Expression,
        operand: &Operand,
        state: &MachineState<'p>,
    ) -> Result<Vec<(bool, Store)>, Error> {
        let (may_be_true, may_be_false) = match operand.known() {
            Some(known) => (known != 0, known == 0),
            None => (operand.value().may_be_true(), operand.value().may_be_false()),
        };
        let mut branches = Vec::new();
        for (outcome, feasible) in [(true, may_be_true), (false, may_be_false)] {
            if !feasible {
                continue;
            }
            let mut store = state.store.clone();
            if self.refine(condition, outcome, &state.environment, &mut store)? {
                branches.push((outcome, store));
            } else {
                trace!("condition at {} cannot be {}", condition.location(), outcome);
            }
        }
        Ok(branches)
    }

    /// Narrow the variables a condition tests, assuming it evaluated to
    /// `outcome`. Returns false when the outcome is impossible.
    fn refine(
        &self,
        condition: &Expression,
        outcome: bool,
        environment: &Environment,
        store: &mut Store,
    ) -> Result<bool, Error> {
        match condition.kind() {
            ExpressionKind::Identifier(name) => {
                self.refine_variable(name, |value| value.restrict_truth(outcome), environment, store)
            }
            ExpressionKind::Unary(UnaryOperator::Not, operand) => {
                self.refine(operand, !outcome, environment, store)
            }
            ExpressionKind::Binary(BinaryOperator::LogicalAnd, lhs, rhs) if outcome => {
                Ok(self.refine(lhs, true, environment, store)?
                    && self.refine(rhs, true, environment, store)?)
            }
            ExpressionKind::Binary(BinaryOperator::LogicalOr, lhs, rhs) if !outcome => {
                Ok(self.refine(lhs, false, environment, store)?
                    && self.refine(rhs, false, environment, store)?)
            }
            ExpressionKind::Binary(op, lhs, rhs) if op.is_relational() => {
                let (lhs, rhs): (&Expression, &Expression) = (lhs, rhs);
                let constant = |expression: &Expression| self.enumerators.fold(expression, &self.layout);
                if let (Some(name), Some(value)) = (lhs.identifier(), constant(rhs)) {
                    let op = *op;
                    self.refine_variable(
                        name,
                        |current| current.restrict(op, value, outcome),
                        environment,
                        store,
                    )
                } else if let (Some(value), Some(name)) = (constant(lhs), rhs.identifier()) {
                    let op = op.mirror();
                    self.refine_variable(
                        name,
                        |current| current.restrict(op, value, outcome),
                        environment,
                        store,
                    )
                } else {
                    Ok(true)
                }
            }
            _ => Ok(true),
        }
    }

    fn refine_variable<F>(
        &self,
        name: &str,
        restrict: F,
        environment: &Environment,
        store: &mut Store,
    ) -> Result<bool, Error>
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        let binding = match environment.lookup(name) {
            Some(binding) => binding,
            None => return Ok(true),
        };
        let type_ = binding.type_();
        let scalar = type_.is_integer() || matches!(type_, Type::Pointer(_));
        if !scalar {
            return Ok(true);
        }
        let width = self.layout.width_of(type_)?;
        let address = Address::new(binding.base(), Offset::Exact(0));
        let current = match store.load(&address, width) {
            Ok(current) => current,
            Err(_) => return Ok(true),
        };
        let refined = restrict(&current);
        if refined.is_bottom() {
            return Ok(false);
        }
        if refined != current {
            store
                .store(&address, width, refined, true)
                .map_err(|kind| Error::Analysis(kind.to_string()))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::config::Config;

    fn machine(program: &Program) -> Machine {
        Machine::new(program, &Config::default()).unwrap()
    }

    fn main_only() -> Program {
        Program::new("main").function(Function::new("main", Type::Int, vec![], block(vec![])))
    }

    #[test]
    fn arithmetic() {
        let program = main_only();
        let machine = machine(&program);
        let sum = machine
            .binary(
                BinaryOperator::Add,
                Operand::exact(2, Type::Int),
                Operand::exact(3, Type::Char),
            )
            .unwrap();
        assert_eq!(sum.known(), Some(5));
        assert_eq!(sum.type_(), &Type::Int);

        let next = machine
            .binary(
                BinaryOperator::Add,
                Operand::new(AbstractValue::PosOrZero, Type::Int),
                Operand::exact(1, Type::Int),
            )
            .unwrap();
        assert_eq!(next.value(), &AbstractValue::Pos);

        let less = machine
            .binary(
                BinaryOperator::Lt,
                Operand::new(AbstractValue::Neg, Type::Int),
                Operand::exact(0, Type::Int),
            )
            .unwrap();
        assert_eq!(less.value(), &AbstractValue::Pos);

        let float = machine
            .binary(
                BinaryOperator::Mul,
                Operand::exact(2, Type::Int),
                Operand::new(AbstractValue::Top, Type::Double),
            )
            .unwrap();
        assert_eq!(float.type_(), &Type::Double);
        assert!(float.value().is_top());
    }

    #[test]
    fn narrowing_conversions() {
        let program = main_only();
        let machine = machine(&program);
        let narrowed = machine.convert(Operand::exact(200, Type::Int), &Type::Char);
        assert_eq!(narrowed.known(), Some(-56));
        assert_eq!(narrowed.value(), &AbstractValue::Neg);

        let kept = machine.convert(Operand::exact(100, Type::Int), &Type::Char);
        assert_eq!(kept.known(), Some(100));
        assert_eq!(kept.type_(), &Type::Char);

        let low = machine.convert(Operand::exact(1 << 40, Type::Long), &Type::Int);
        assert_eq!(low.known(), Some(0));
        assert_eq!(low.value(), &AbstractValue::Zero);
    }

    #[test]
    fn pointers() {
        let program = main_only();
        let machine = machine(&program);
        let base = Base::stack(1, Slot::Variable(7));
        let at = |offset| AbstractValue::address(Address::new(base, Offset::Exact(offset)));
        let pointer = Operand::new(at(0), Type::Int.pointer_to());

        let moved = machine
            .binary(BinaryOperator::Add, pointer.clone(), Operand::exact(3, Type::Int))
            .unwrap();
        assert_eq!(moved.value(), &at(12));

        let back = machine
            .binary(BinaryOperator::Sub, moved.clone(), Operand::exact(1, Type::Int))
            .unwrap();
        assert_eq!(back.value(), &at(8));

        let difference = machine
            .binary(BinaryOperator::Sub, moved, pointer)
            .unwrap();
        assert_eq!(difference.known(), Some(3));
        assert_eq!(difference.type_(), &Type::Long);
    }

    #[test]
    fn conversions() {
        let program = main_only();
        let machine = machine(&program);
        let truth = machine.convert(Operand::new(AbstractValue::Neg, Type::Int), &Type::Bool);
        assert_eq!(truth.value(), &AbstractValue::Pos);
        let zero = machine.convert(Operand::exact(0, Type::Int), &Type::Bool);
        assert_eq!(zero.known(), Some(0));
        let double = machine.convert(Operand::exact(1, Type::Int), &Type::Double);
        assert!(double.value().is_top());
    }
}
