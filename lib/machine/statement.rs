//! Statements, declarations and jumps.

use crate::ast::{
    Declaration, Expression, ExpressionKind, Initializer, OmpClause, Statement, StatementKind, Type,
};
use crate::domain::AbstractValue;
use crate::error::*;
use crate::explorer::Terminal;
use crate::machine::{
    frame_depth, Binding, Control, Environment, Frame, InitItem, Kont, LabelTarget, Machine,
    MachineState, Operand, PathStep, Place, Successor, Successors,
};
use crate::memory::{Address, Base, Block, Offset, Slot};
use crate::RC;
use log::debug;
use std::collections::BTreeSet;

/// The condition, step and body of a loop statement.
fn loop_parts(
    statement: &Statement,
) -> Result<(Option<&Expression>, Option<&Expression>, &Statement), Error> {
    match statement.kind() {
        StatementKind::While(condition, body) => Ok((Some(condition), None, &**body)),
        StatementKind::DoWhile(body, condition) => Ok((Some(condition), None, &**body)),
        StatementKind::For(_, condition, step, body) => {
            Ok((condition.as_ref(), step.as_ref(), &**body))
        }
        _ => Err(Error::Analysis(format!(
            "statement at {} is not a loop",
            statement.location()
        ))),
    }
}

impl<'p> Machine<'p> {
    pub(crate) fn exec(
        &self,
        statement: &'p Statement,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let control = match statement.kind() {
            StatementKind::Empty => Control::Done,
            StatementKind::Expression(expression) => {
                state.push(|next| Frame::Discard { next });
                Control::Eval(expression)
            }
            StatementKind::Declaration(declarations) => Control::Declare(declarations.as_slice()),
            StatementKind::Block(statements) => {
                if statements.is_empty() {
                    Control::Done
                } else {
                    self.open_scope(&mut state);
                    self.sequence(statements, &mut state)
                }
            }
            StatementKind::If(condition, _, _) => {
                state.push(|next| Frame::Branch { statement, next });
                Control::Eval(condition)
            }
            StatementKind::While(_, _) => {
                self.enter_loop(statement, &mut state);
                self.test_loop(statement, &mut state)?
            }
            StatementKind::DoWhile(body, _) => {
                self.enter_loop(statement, &mut state);
                Control::Exec(body)
            }
            StatementKind::For(init, _, _, _) => {
                self.open_scope(&mut state);
                match init {
                    Some(init) => {
                        state.push(|next| Frame::ForInit { statement, next });
                        Control::Exec(init)
                    }
                    None => {
                        self.enter_loop(statement, &mut state);
                        self.test_loop(statement, &mut state)?
                    }
                }
            }
            StatementKind::Switch(selector, _) => {
                state.push(|next| Frame::SwitchSelect { statement, next });
                Control::Eval(selector)
            }
            StatementKind::Case(_, body)
            | StatementKind::Default(body)
            | StatementKind::Labeled(_, body) => Control::Exec(body),
            StatementKind::Goto(label) => return self.goto(label, state, out),
            StatementKind::Break => return self.break_(state, out),
            StatementKind::Continue => return self.continue_(state, out),
            StatementKind::Return(Some(value)) => {
                state.push(|next| Frame::Return { next });
                Control::Eval(value)
            }
            StatementKind::Return(None) => return self.return_(Operand::void(), state, out),
            StatementKind::Omp(_, _, body) => {
                let depth = frame_depth(&state.kont);
                let outer = state.environment.clone();
                self.open_construct(statement, depth, &outer, &mut state)?;
                debug!("entering construct {} at {}", statement.id(), statement.location());
                Control::Exec(body)
            }
        };
        self.proceed(state, control, out)
    }

    /// A statement completed, continue with the top frame.
    pub(crate) fn done(
        &self,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let kont = state.kont.clone();
        let control = match kont.as_ref() {
            Frame::Start { next } => {
                state.kont = next.clone();
                return self.call_entry(state, out);
            }
            Frame::Sequence { rest, next } => {
                state.kont = next.clone();
                self.sequence(rest, &mut state)
            }
            Frame::Scope { environment, next }
            | Frame::SwitchBreak { environment, next } => {
                self.close_scope(environment, &mut state);
                state.kont = next.clone();
                Control::Done
            }
            Frame::Construct {
                statement,
                environment,
                next,
                ..
            } => {
                debug!("leaving construct {}", statement.id());
                self.close_scope(environment, &mut state);
                state.kont = next.clone();
                Control::Done
            }
            Frame::Loop { statement, .. } => self.next_iteration(statement, &mut state)?,
            Frame::ForInit { statement, next } => {
                state.kont = next.clone();
                self.enter_loop(statement, &mut state);
                self.test_loop(statement, &mut state)?
            }
            Frame::Call {
                return_type, next, ..
            } => {
                let value = if matches!(next.as_ref(), Frame::Halt) {
                    Operand::exact(0, Type::Int)
                } else {
                    Operand::new(AbstractValue::Undefined, return_type.clone())
                };
                return self.return_(value, state, out);
            }
            _ => {
                return Err(Error::Analysis(
                    "statement completed inside an expression".to_string(),
                ))
            }
        };
        self.proceed(state, control, out)
    }

    /// Continue a statement frame with the value of its expression.
    pub(crate) fn apply_statement_value(
        &self,
        operand: Operand,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let kont = state.kont.clone();
        match kont.as_ref() {
            Frame::Halt => {
                out.push(Successor::Terminal(Terminal::new(
                    operand.value().clone(),
                    state.store,
                )));
                Ok(())
            }
            Frame::Discard { next } => {
                state.kont = next.clone();
                self.proceed(state, Control::Done, out)
            }
            Frame::Return { .. } => self.return_(operand, state, out),
            Frame::Branch { statement, next } => {
                let (condition, then, else_) = match statement.kind() {
                    StatementKind::If(condition, then, else_) => (condition, then, else_),
                    _ => return Err(Error::Analysis("branch frame without an if".to_string())),
                };
                state.kont = next.clone();
                for (outcome, store) in self.branches(condition, &operand, &state)? {
                    let mut branch = state.clone();
                    branch.store = store;
                    let control = match (outcome, else_) {
                        (true, _) => Control::Exec(then),
                        (false, Some(else_)) => Control::Exec(else_),
                        (false, None) => Control::Done,
                    };
                    out.push(Successor::State(branch.with_control(control)));
                }
                Ok(())
            }
            Frame::LoopTest { statement, next } => {
                let (condition, _, body) = loop_parts(statement)?;
                let condition = condition
                    .ok_or_else(|| Error::Analysis("loop test without a condition".to_string()))?;
                state.kont = next.clone();
                for (outcome, store) in self.branches(condition, &operand, &state)? {
                    let mut branch = state.clone();
                    branch.store = store;
                    if outcome {
                        out.push(Successor::State(branch.with_control(Control::Exec(body))));
                    } else {
                        match next.as_ref() {
                            Frame::Loop {
                                environment, next, ..
                            } => {
                                self.close_scope(environment, &mut branch);
                                branch.kont = next.clone();
                            }
                            _ => return Err(Error::Analysis("loop test outside of a loop".to_string())),
                        }
                        out.push(Successor::State(branch.with_control(Control::Done)));
                    }
                }
                Ok(())
            }
            Frame::LoopStep { statement, next } => {
                state.kont = next.clone();
                let control = self.test_loop(statement, &mut state)?;
                self.proceed(state, control, out)
            }
            Frame::SwitchSelect { statement, next } => {
                state.kont = next.clone();
                self.dispatch(statement, operand, state, out)
            }
            Frame::Initialize {
                base,
                type_,
                rest,
                declaration,
                next,
            } => {
                state.kont = next.clone();
                let place = Place::new(
                    AbstractValue::address(Address::new(*base, Offset::Exact(0))),
                    type_.clone(),
                );
                let value = self.convert(operand, type_);
                if !self.write(&place, &value, declaration.location(), &mut state, out)? {
                    return Ok(());
                }
                self.proceed(state, Control::Declare(rest), out)
            }
            Frame::InitializeList {
                base,
                items,
                index,
                rest,
                next,
            } => {
                state.kont = next.clone();
                let item = &items[*index];
                let place = Place::new(
                    AbstractValue::address(Address::new(*base, Offset::Exact(item.offset))),
                    item.type_.clone(),
                );
                let value = self.convert(operand, &item.type_);
                if !self.write(&place, &value, item.expression.location(), &mut state, out)? {
                    return Ok(());
                }
                self.initialize_list(*base, items.clone(), index + 1, rest, state, out)
            }
            _ => Err(Error::Analysis("value handed to an unexpected frame".to_string())),
        }
    }

    fn open_scope(&self, state: &mut MachineState<'p>) {
        let environment = state.environment.clone();
        state.push(|next| Frame::Scope { environment, next });
        state.environment = state.environment.push();
    }

    /// Restore `environment`, retiring every variable declared since.
    pub(crate) fn close_scope(&self, environment: &Environment, state: &mut MachineState<'p>) {
        for base in state.environment.bases_since(environment) {
            state.store.retire(&base);
        }
        state.environment = environment.clone();
    }

    fn sequence(&self, statements: &'p [Statement], state: &mut MachineState<'p>) -> Control<'p> {
        if statements.len() > 1 {
            let rest = &statements[1..];
            state.push(|next| Frame::Sequence { rest, next });
        }
        match statements.first() {
            Some(first) => Control::Exec(first),
            None => Control::Done,
        }
    }

    fn enter_loop(&self, statement: &'p Statement, state: &mut MachineState<'p>) {
        let environment = state.environment.clone();
        state.push(|next| Frame::Loop {
            statement,
            environment,
            next,
        });
    }

    /// Evaluate the loop condition, on top of the loop's frame.
    fn test_loop(
        &self,
        statement: &'p Statement,
        state: &mut MachineState<'p>,
    ) -> Result<Control<'p>, Error> {
        let (condition, _, body) = loop_parts(statement)?;
        Ok(match condition {
            Some(condition) => {
                state.push(|next| Frame::LoopTest { statement, next });
                Control::Eval(condition)
            }
            None => Control::Exec(body),
        })
    }

    /// The body completed, or continued: step, then test again.
    fn next_iteration(
        &self,
        statement: &'p Statement,
        state: &mut MachineState<'p>,
    ) -> Result<Control<'p>, Error> {
        let (_, step, _) = loop_parts(statement)?;
        match step {
            Some(step) => {
                state.push(|next| Frame::LoopStep { statement, next });
                Ok(Control::Eval(step))
            }
            None => self.test_loop(statement, state),
        }
    }

    fn break_(&self, mut state: MachineState<'p>, out: &mut Successors<'p>) -> Result<(), Error> {
        let mut kont = state.kont.clone();
        loop {
            let frame = kont.clone();
            match frame.as_ref() {
                Frame::Loop {
                    environment, next, ..
                }
                | Frame::SwitchBreak { environment, next } => {
                    self.close_scope(environment, &mut state);
                    state.kont = next.clone();
                    return self.proceed(state, Control::Done, out);
                }
                Frame::Construct { .. } | Frame::Call { .. } | Frame::Halt => {
                    return Err(Error::MalformedInput(
                        self.function_name(&state.kont).to_string(),
                        "break outside of a loop or switch".to_string(),
                    ))
                }
                frame => match frame.next() {
                    Some(next) => kont = next.clone(),
                    None => return Err(Error::Analysis("continuation ended".to_string())),
                },
            }
        }
    }

    fn continue_(&self, mut state: MachineState<'p>, out: &mut Successors<'p>) -> Result<(), Error> {
        let mut kont = state.kont.clone();
        loop {
            let frame = kont.clone();
            match frame.as_ref() {
                Frame::Loop {
                    statement,
                    environment,
                    ..
                } => {
                    self.close_scope(environment, &mut state);
                    state.kont = frame.clone();
                    let control = self.next_iteration(statement, &mut state)?;
                    return self.proceed(state, control, out);
                }
                Frame::Construct { .. } | Frame::Call { .. } | Frame::Halt => {
                    return Err(Error::MalformedInput(
                        self.function_name(&state.kont).to_string(),
                        "continue outside of a loop".to_string(),
                    ))
                }
                frame => match frame.next() {
                    Some(next) => kont = next.clone(),
                    None => return Err(Error::Analysis("continuation ended".to_string())),
                },
            }
        }
    }

    fn goto(&self, label: &str, state: MachineState<'p>, out: &mut Successors<'p>) -> Result<(), Error> {
        let function = self.function_name(&state.kont);
        let target = self
            .info(function)?
            .label(label)
            .ok_or_else(|| Error::UnresolvedLabel(label.to_string()))?;
        let base = crate::machine::call_frame(&state.kont)
            .ok_or_else(|| Error::Analysis("goto outside of a function".to_string()))?;
        let environment = state.environment.function_scope();
        self.jump(target, base, environment, state, out)
    }

    /// Continue at `target`, rebuilding the frames and scopes of its path on
    /// top of `kont` and `environment`. Variables which are visible at the
    /// target keep their storage, or get fresh uninitialized storage when
    /// the jump skipped their declaration. Variables which are no longer
    /// visible are retired.
    fn jump(
        &self,
        target: &LabelTarget<'p>,
        kont: Kont<'p>,
        environment: Environment,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        let old = state.environment.clone();
        let depth = frame_depth(&kont);
        state.kont = kont;
        state.environment = environment.clone();

        for step in target.path() {
            match step {
                PathStep::Block { statements, index } => {
                    let statements: &'p [Statement] = statements;
                    self.open_scope(&mut state);
                    for skipped in &statements[..*index] {
                        if let StatementKind::Declaration(declarations) = skipped.kind() {
                            for declaration in declarations {
                                self.rebind(declaration, depth, &old, &mut state)?;
                            }
                        }
                    }
                    if index + 1 < statements.len() {
                        let rest = &statements[index + 1..];
                        state.push(|next| Frame::Sequence { rest, next });
                    }
                }
                PathStep::Loop(statement) => {
                    let statement: &'p Statement = statement;
                    if let StatementKind::For(Some(init), ..) = statement.kind() {
                        self.open_scope(&mut state);
                        if let StatementKind::Declaration(declarations) = init.kind() {
                            for declaration in declarations {
                                self.rebind(declaration, depth, &old, &mut state)?;
                            }
                        }
                    }
                    self.enter_loop(statement, &mut state);
                }
                PathStep::Switch(_) => {
                    let environment = state.environment.clone();
                    state.push(|next| Frame::SwitchBreak { environment, next });
                }
                PathStep::Construct(statement) => {
                    self.open_construct(statement, depth, &old, &mut state)?;
                }
            }
        }

        let visible: BTreeSet<Base> = state
            .environment
            .bases_since(&environment)
            .into_iter()
            .collect();
        for base in old.bases_since(&environment) {
            if !visible.contains(&base) {
                state.store.retire(&base);
            }
        }
        self.proceed(state, Control::Exec(target.statement()), out)
    }

    /// Bind a declaration skipped by a jump, reusing its storage if it is
    /// still allocated.
    fn rebind(
        &self,
        declaration: &'p Declaration,
        depth: usize,
        old: &Environment,
        state: &mut MachineState<'p>,
    ) -> Result<(), Error> {
        let base = Base::stack(depth, Slot::Variable(declaration.id()));
        let type_ = self.declared_type(declaration);
        let reuse = old
            .lookup(declaration.name())
            .map(|binding| binding.base() == base)
            .unwrap_or(false)
            && state.store.contains(&base);
        if !reuse {
            let background = if depth == 0 {
                AbstractValue::Zero
            } else {
                AbstractValue::Undefined
            };
            state
                .store
                .allocate(base, Block::new(self.layout.size_of(&type_)?, background));
        }
        state
            .environment
            .bind(declaration.name(), Binding::new(base, type_));
        Ok(())
    }

    /// Enter an OpenMP construct: push its frame and a scope holding the
    /// private copies its clauses ask for. Copies already bound in `old` are
    /// reused.
    fn open_construct(
        &self,
        statement: &'p Statement,
        depth: usize,
        old: &Environment,
        state: &mut MachineState<'p>,
    ) -> Result<(), Error> {
        let (kind, clauses, body) = match statement.kind() {
            StatementKind::Omp(kind, clauses, body) => (kind, clauses, body),
            _ => return Err(Error::Analysis("construct frame without a construct".to_string())),
        };
        let outer = state.environment.clone();
        state.push(|next| Frame::Construct {
            statement,
            frame: depth,
            environment: outer.clone(),
            next,
        });
        state.environment = state.environment.push();

        let mut privates: Vec<(&str, bool)> = Vec::new();
        for clause in clauses {
            match clause {
                OmpClause::Private(names) => privates.extend(names.iter().map(|n| (n.as_str(), false))),
                OmpClause::FirstPrivate(names) => {
                    privates.extend(names.iter().map(|n| (n.as_str(), true)))
                }
                OmpClause::Shared(_) => {}
            }
        }
        if kind.is_loop() {
            if let Some(variable) = loop_variable(body) {
                privates.push((variable, false));
            }
        }

        for (name, copy) in privates {
            let original = outer
                .lookup(name)
                .ok_or_else(|| Error::UnknownIdentifier(name.to_string()))?
                .clone();
            let declaration = match original.base() {
                Base::Stack {
                    slot: Slot::Variable(id),
                    ..
                }
                | Base::Stack {
                    slot: Slot::Private(_, id),
                    ..
                }
                | Base::Stack {
                    slot: Slot::Literal(id),
                    ..
                } => id,
                Base::Heap { site, .. } => site,
            };
            let base = Base::stack(depth, Slot::Private(statement.id(), declaration));
            let reuse = old
                .lookup(name)
                .map(|binding| binding.base() == base)
                .unwrap_or(false)
                && state.store.contains(&base);
            if !reuse {
                let size = self.layout.size_of(original.type_())?;
                let mut block = Block::new(size, AbstractValue::Undefined);
                if copy {
                    if let (Some(size), Some(source)) = (size, state.store.block(&original.base())) {
                        block.paste(Offset::Exact(0), &source.fragment(Offset::Exact(0), size), true);
                    }
                }
                state.store.allocate(base, block);
            }
            state
                .environment
                .bind(name, Binding::new(base, original.type_().clone()));
        }
        Ok(())
    }

    /// Dispatch a switch on its selector.
    fn dispatch(
        &self,
        statement: &'p Statement,
        selector: Operand,
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        if selector.value().is_bottom() {
            return Ok(());
        }
        let function = self.function_name(&state.kont);
        let table = self.info(function)?.switch(statement.id()).ok_or_else(|| {
            Error::Analysis(format!("no case table for switch at {}", statement.location()))
        })?;
        let environment = state.environment.clone();
        let outer = environment.clone();
        state.push(|next| Frame::SwitchBreak {
            environment: outer,
            next,
        });

        let mut matched = false;
        for (value, target) in table.cases() {
            let (may, must) = match selector.known() {
                Some(known) => (known == *value, known == *value),
                None => {
                    let equal = selector
                        .value()
                        .compare(crate::ast::BinaryOperator::Eq, &AbstractValue::of(*value));
                    (equal.may_be_true(), !equal.may_be_false())
                }
            };
            matched |= must;
            if may {
                self.jump(target, state.kont.clone(), environment.clone(), state.clone(), out)?;
            }
        }
        if !matched {
            match table.default() {
                Some(target) => {
                    self.jump(target, state.kont.clone(), environment, state.clone(), out)?
                }
                None => out.push(Successor::State(state.with_control(Control::Done))),
            }
        }
        Ok(())
    }

    /// Arrays declared without a length take it from their initializer.
    fn declared_type(&self, declaration: &Declaration) -> Type {
        match (declaration.type_(), declaration.initializer()) {
            (Type::Array(element, None), Some(Initializer::List(items))) => {
                Type::Array(element.clone(), Some(items.len() as u64))
            }
            (Type::Array(element, None), Some(Initializer::Expression(expression))) => {
                match expression.kind() {
                    ExpressionKind::StringLiteral(text) => {
                        Type::Array(element.clone(), Some(text.len() as u64 + 1))
                    }
                    _ => declaration.type_().clone(),
                }
            }
            (type_, _) => type_.clone(),
        }
    }

    /// Declare each variable in turn, evaluating initializers on the way.
    pub(crate) fn declare(
        &self,
        declarations: &'p [Declaration],
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        for (index, declaration) in declarations.iter().enumerate() {
            let rest = &declarations[index + 1..];
            let depth = frame_depth(&state.kont);
            let type_ = self.declared_type(declaration);
            let base = Base::stack(depth, Slot::Variable(declaration.id()));
            let background = if depth == 0 {
                AbstractValue::Zero
            } else {
                AbstractValue::Undefined
            };
            let size = self.layout.size_of(&type_)?;
            state.store.allocate(base, Block::new(size, background));
            state
                .environment
                .bind(declaration.name(), Binding::new(base, type_.clone()));

            match declaration.initializer() {
                None => {}
                Some(Initializer::Expression(expression)) => {
                    if let (Type::Array(_, _), ExpressionKind::StringLiteral(text)) =
                        (&type_, expression.kind())
                    {
                        self.write_string(base, 0, text, &mut state);
                        continue;
                    }
                    state.push(|next| Frame::Initialize {
                        declaration,
                        base,
                        type_,
                        rest,
                        next,
                    });
                    return self.proceed(state, Control::Eval(expression), out);
                }
                Some(Initializer::List(items)) => {
                    let mut flat = Vec::new();
                    self.flatten(items, &type_, 0, &mut flat)?;
                    state.store.allocate(base, Block::new(size, AbstractValue::Zero));
                    return self.initialize_list(base, RC::new(flat), 0, rest, state, out);
                }
            }
        }
        self.proceed(state, Control::Done, out)
    }

    /// Evaluate the next item of an initializer list, or move on to the
    /// remaining declarations.
    fn initialize_list(
        &self,
        base: Base,
        items: RC<Vec<InitItem<'p>>>,
        mut index: usize,
        rest: &'p [Declaration],
        mut state: MachineState<'p>,
        out: &mut Successors<'p>,
    ) -> Result<(), Error> {
        while let Some(item) = items.get(index) {
            match (&item.type_, item.expression.kind()) {
                (Type::Array(_, _), ExpressionKind::StringLiteral(text)) => {
                    self.write_string(base, item.offset, text, &mut state);
                    index += 1;
                }
                _ => {
                    let expression = item.expression;
                    state.push(|next| Frame::InitializeList {
                        base,
                        items,
                        index,
                        rest,
                        next,
                    });
                    return self.proceed(state, Control::Eval(expression), out);
                }
            }
        }
        self.proceed(state, Control::Declare(rest), out)
    }

    fn flatten(
        &self,
        items: &'p [Initializer],
        type_: &Type,
        offset: i64,
        flat: &mut Vec<InitItem<'p>>,
    ) -> Result<(), Error> {
        match type_ {
            Type::Array(element, length) => {
                let size = self.layout.width_of(element)? as i64;
                for (index, item) in items.iter().enumerate() {
                    if length.map(|length| index as u64 >= length).unwrap_or(false) {
                        break;
                    }
                    self.flatten_item(item, element, offset + index as i64 * size, flat)?;
                }
            }
            Type::Struct(name) => {
                let fields = self.layout.aggregate(name)?.fields();
                for (item, field) in items.iter().zip(fields) {
                    self.flatten_item(item, field.type_(), offset + field.offset() as i64, flat)?;
                }
            }
            Type::Union(name) => {
                let fields = self.layout.aggregate(name)?.fields();
                if let (Some(item), Some(field)) = (items.first(), fields.first()) {
                    self.flatten_item(item, field.type_(), offset, flat)?;
                }
            }
            scalar => {
                if let Some(item) = items.first() {
                    self.flatten_item(item, scalar, offset, flat)?;
                }
            }
        }
        Ok(())
    }

    fn flatten_item(
        &self,
        item: &'p Initializer,
        type_: &Type,
        offset: i64,
        flat: &mut Vec<InitItem<'p>>,
    ) -> Result<(), Error> {
        match item {
            Initializer::Expression(expression) => {
                flat.push(InitItem {
                    offset,
                    type_: type_.clone(),
                    expression,
                });
                Ok(())
            }
            Initializer::List(items) => self.flatten(items, type_, offset, flat),
        }
    }

    /// Copy the characters of a string, and its terminator, into a block.
    pub(crate) fn write_string(&self, base: Base, offset: i64, text: &str, state: &mut MachineState<'p>) {
        let bytes = text.bytes().chain(std::iter::once(0));
        for (index, byte) in bytes.enumerate() {
            let address = Address::new(base, Offset::Exact(offset + index as i64));
            if let Err(kind) = state
                .store
                .store(&address, 1, AbstractValue::of(byte as i64), true)
            {
                debug!("string initializer does not fit {}: {}", address, kind);
                break;
            }
        }
    }
}

/// The variable assigned by the init clause of a for loop.
fn loop_variable(body: &Statement) -> Option<&str> {
    let init = match body.kind() {
        StatementKind::For(Some(init), ..) => init,
        StatementKind::Block(statements) if statements.len() == 1 => return loop_variable(&statements[0]),
        _ => return None,
    };
    match init.kind() {
        StatementKind::Expression(expression) => match expression.kind() {
            ExpressionKind::Assign(None, target, _) => target.identifier(),
            _ => None,
        },
        _ => None,
    }
}
