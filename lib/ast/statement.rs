use crate::ast::{Expression, NodeId, SourceLocation, Type};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// The initial value of a declaration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Initializer {
    Expression(Expression),
    /// A brace-enclosed list, filling fields or elements in order.
    List(Vec<Initializer>),
}

impl Initializer {
    fn number(&mut self, next: &mut NodeId) {
        match self {
            Initializer::Expression(expression) => expression.number(next),
            Initializer::List(initializers) => {
                for initializer in initializers {
                    initializer.number(next);
                }
            }
        }
    }
}

/// A variable declaration, either local, global or a function parameter.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Declaration {
    id: NodeId,
    name: String,
    type_: Type,
    initializer: Option<Initializer>,
    location: SourceLocation,
}

impl Declaration {
    pub fn new<S: Into<String>>(
        name: S,
        type_: Type,
        initializer: Option<Initializer>,
    ) -> Declaration {
        Declaration {
            id: 0,
            name: name.into(),
            type_,
            initializer,
            location: SourceLocation::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }

    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn at(mut self, line: u32, column: u32) -> Declaration {
        self.location = SourceLocation::new(line, column);
        self
    }

    pub(crate) fn number(&mut self, next: &mut NodeId) {
        *next += 1;
        self.id = *next;
        if let Some(initializer) = &mut self.initializer {
            initializer.number(next);
        }
    }
}

impl PartialEq for Declaration {
    fn eq(&self, other: &Declaration) -> bool {
        self.id == other.id
    }
}

impl Eq for Declaration {}

impl Hash for Declaration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// The OpenMP directives understood by the analysis.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OmpKind {
    Parallel,
    ParallelFor,
    For,
    Sections,
    Section,
    Single,
    Master,
    Critical,
    Atomic,
    Task,
    Barrier,
}

impl OmpKind {
    /// Work-sharing loops, whose iteration variable is private.
    pub fn is_loop(&self) -> bool {
        matches!(self, OmpKind::ParallelFor | OmpKind::For)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OmpClause {
    /// Fresh, uninitialized copies of the named variables.
    Private(Vec<String>),
    /// Copies of the named variables, initialized from the originals.
    FirstPrivate(Vec<String>),
    Shared(Vec<String>),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum StatementKind {
    Empty,
    Expression(Expression),
    Declaration(Vec<Declaration>),
    Block(Vec<Statement>),
    If(Expression, Box<Statement>, Option<Box<Statement>>),
    While(Expression, Box<Statement>),
    DoWhile(Box<Statement>, Expression),
    For(
        Option<Box<Statement>>,
        Option<Expression>,
        Option<Expression>,
        Box<Statement>,
    ),
    Switch(Expression, Box<Statement>),
    Case(Expression, Box<Statement>),
    Default(Box<Statement>),
    Labeled(String, Box<Statement>),
    Goto(String),
    Break,
    Continue,
    Return(Option<Expression>),
    Omp(OmpKind, Vec<OmpClause>, Box<Statement>),
}

/// A statement node. Like [`Expression`], statements compare by id.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Statement {
    id: NodeId,
    kind: StatementKind,
    location: SourceLocation,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Statement {
        Statement {
            id: 0,
            kind,
            location: SourceLocation::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn at(mut self, line: u32, column: u32) -> Statement {
        self.location = SourceLocation::new(line, column);
        self
    }

    pub(crate) fn number(&mut self, next: &mut NodeId) {
        *next += 1;
        self.id = *next;
        match &mut self.kind {
            StatementKind::Empty
            | StatementKind::Goto(_)
            | StatementKind::Break
            | StatementKind::Continue => {}
            StatementKind::Expression(expression) => expression.number(next),
            StatementKind::Declaration(declarations) => {
                for declaration in declarations {
                    declaration.number(next);
                }
            }
            StatementKind::Block(statements) => {
                for statement in statements {
                    statement.number(next);
                }
            }
            StatementKind::If(condition, then, else_) => {
                condition.number(next);
                then.number(next);
                if let Some(else_) = else_ {
                    else_.number(next);
                }
            }
            StatementKind::While(condition, body) => {
                condition.number(next);
                body.number(next);
            }
            StatementKind::DoWhile(body, condition) => {
                body.number(next);
                condition.number(next);
            }
            StatementKind::For(init, condition, step, body) => {
                if let Some(init) = init {
                    init.number(next);
                }
                if let Some(condition) = condition {
                    condition.number(next);
                }
                if let Some(step) = step {
                    step.number(next);
                }
                body.number(next);
            }
            StatementKind::Switch(selector, body) => {
                selector.number(next);
                body.number(next);
            }
            StatementKind::Case(value, body) => {
                value.number(next);
                body.number(next);
            }
            StatementKind::Default(body)
            | StatementKind::Labeled(_, body)
            | StatementKind::Omp(_, _, body) => body.number(next),
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    value.number(next);
                }
            }
        }
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Statement) -> bool {
        self.id == other.id
    }
}

impl Eq for Statement {}

impl Hash for Statement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
