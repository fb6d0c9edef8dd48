//! Per-function jump tables.
//!
//! Every `goto` label and every `case` or `default` of a function is
//! resolved once, before exploration, into a [`LabelTarget`]: the statement
//! to jump to and the path of enclosing blocks, loops, switches and OpenMP
//! constructs leading to it. A jump rebuilds the continuation from the path,
//! so control can enter the middle of a block or loop.

use crate::ast::{Function, NodeId, Statement, StatementKind};
use crate::error::*;
use crate::machine::Enumerators;
use crate::memory::Layout;
use std::collections::{BTreeMap, BTreeSet};

/// One statement enclosing a jump target.
#[derive(Clone, Debug)]
pub enum PathStep<'p> {
    /// The target is inside `statements[index]`.
    Block {
        statements: &'p [Statement],
        index: usize,
    },
    /// The target is inside the body of a loop.
    Loop(&'p Statement),
    /// The target is inside the body of a switch.
    Switch(&'p Statement),
    /// The target is inside an OpenMP construct.
    Construct(&'p Statement),
}

#[derive(Clone, Debug)]
pub struct LabelTarget<'p> {
    statement: &'p Statement,
    path: Vec<PathStep<'p>>,
}

impl<'p> LabelTarget<'p> {
    pub fn statement(&self) -> &'p Statement {
        self.statement
    }

    pub fn path(&self) -> &[PathStep<'p>] {
        &self.path
    }
}

/// The cases of one switch statement. Paths are relative to the switch
/// body.
#[derive(Clone, Debug, Default)]
pub struct SwitchTable<'p> {
    cases: Vec<(i64, LabelTarget<'p>)>,
    default: Option<LabelTarget<'p>>,
}

impl<'p> SwitchTable<'p> {
    pub fn cases(&self) -> &[(i64, LabelTarget<'p>)] {
        &self.cases
    }

    pub fn default(&self) -> Option<&LabelTarget<'p>> {
        self.default.as_ref()
    }
}

/// Everything resolved about a function before it runs.
#[derive(Clone, Debug)]
pub struct FunctionInfo<'p> {
    function: &'p Function,
    labels: BTreeMap<&'p str, LabelTarget<'p>>,
    switches: BTreeMap<NodeId, SwitchTable<'p>>,
    privates: BTreeMap<NodeId, BTreeSet<NodeId>>,
    malformed: Option<String>,
}

impl<'p> FunctionInfo<'p> {
    pub fn new(function: &'p Function, enumerators: &Enumerators, layout: &Layout) -> FunctionInfo<'p> {
        let mut walker = Walker {
            enumerators,
            layout,
            labels: BTreeMap::new(),
            switches: BTreeMap::new(),
            privates: BTreeMap::new(),
            gotos: Vec::new(),
            errors: Vec::new(),
            path: Vec::new(),
            switch_bodies: Vec::new(),
            targets: Vec::new(),
            constructs: Vec::new(),
        };
        walker.walk(function.body());

        for label in &walker.gotos {
            if !walker.labels.contains_key(label) {
                walker
                    .errors
                    .push(Error::UnresolvedLabel(label.to_string()).to_string());
            }
        }
        let malformed = if walker.errors.is_empty() {
            None
        } else {
            Some(walker.errors.join("; "))
        };

        FunctionInfo {
            function,
            labels: walker.labels,
            switches: walker.switches,
            privates: walker.privates,
            malformed,
        }
    }

    pub fn function(&self) -> &'p Function {
        self.function
    }

    pub fn label(&self, name: &str) -> Option<&LabelTarget<'p>> {
        self.labels.get(name)
    }

    pub fn switch(&self, statement: NodeId) -> Option<&SwitchTable<'p>> {
        self.switches.get(&statement)
    }

    /// Declarations made inside the body of each OpenMP construct.
    pub fn privates(&self) -> &BTreeMap<NodeId, BTreeSet<NodeId>> {
        &self.privates
    }

    /// Why this function cannot be analyzed, if it cannot.
    pub fn malformed(&self) -> Option<&str> {
        self.malformed.as_deref()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum JumpTarget {
    Loop,
    Switch,
    Construct,
}

struct Walker<'p, 'a> {
    enumerators: &'a Enumerators,
    layout: &'a Layout,
    labels: BTreeMap<&'p str, LabelTarget<'p>>,
    switches: BTreeMap<NodeId, SwitchTable<'p>>,
    privates: BTreeMap<NodeId, BTreeSet<NodeId>>,
    gotos: Vec<&'p str>,
    errors: Vec<String>,
    path: Vec<PathStep<'p>>,
    /// Enclosing switches, and the path length at their bodies.
    switch_bodies: Vec<(NodeId, usize)>,
    targets: Vec<JumpTarget>,
    constructs: Vec<NodeId>,
}

impl<'p, 'a> Walker<'p, 'a> {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    /// Whether `break` or `continue` has somewhere to go without leaving
    /// an OpenMP construct.
    fn can_jump(&self, to_switch: bool) -> bool {
        for target in self.targets.iter().rev() {
            match target {
                JumpTarget::Loop => return true,
                JumpTarget::Switch if to_switch => return true,
                JumpTarget::Switch => {}
                JumpTarget::Construct => return false,
            }
        }
        false
    }

    fn case_target(&mut self, statement: &'p Statement) -> Option<(NodeId, LabelTarget<'p>)> {
        let (switch, length) = match self.switch_bodies.last() {
            Some(body) => *body,
            None => {
                self.error("case label outside of a switch".to_string());
                return None;
            }
        };
        Some((
            switch,
            LabelTarget {
                statement,
                path: self.path[length..].to_vec(),
            },
        ))
    }

    fn walk(&mut self, statement: &'p Statement) {
        match statement.kind() {
            StatementKind::Block(statements) => {
                for (index, inner) in statements.iter().enumerate() {
                    self.path.push(PathStep::Block {
                        statements: statements.as_slice(),
                        index,
                    });
                    self.walk(inner);
                    self.path.pop();
                }
            }
            StatementKind::If(_, then, else_) => {
                self.walk(then);
                if let Some(else_) = else_ {
                    self.walk(else_);
                }
            }
            StatementKind::While(_, body) | StatementKind::DoWhile(body, _) => {
                self.walk_loop(statement, body)
            }
            StatementKind::For(init, _, _, body) => {
                if let Some(init) = init {
                    self.walk(init);
                }
                self.walk_loop(statement, body)
            }
            StatementKind::Switch(_, body) => {
                self.path.push(PathStep::Switch(statement));
                self.switch_bodies.push((statement.id(), self.path.len()));
                self.switches.entry(statement.id()).or_default();
                self.targets.push(JumpTarget::Switch);
                self.walk(body);
                self.targets.pop();
                self.switch_bodies.pop();
                self.path.pop();
            }
            StatementKind::Case(value, body) => {
                if let Some((switch, target)) = self.case_target(statement) {
                    match self.enumerators.fold(value, self.layout) {
                        Some(value) => {
                            let table = self.switches.entry(switch).or_default();
                            if table.cases.iter().any(|(case, _)| *case == value) {
                                self.error(format!("duplicate case value {}", value));
                            } else {
                                table.cases.push((value, target));
                            }
                        }
                        None => self.error("case label is not a constant".to_string()),
                    }
                }
                self.walk(body)
            }
            StatementKind::Default(body) => {
                if let Some((switch, target)) = self.case_target(statement) {
                    let table = self.switches.entry(switch).or_default();
                    if table.default.is_some() {
                        self.error("duplicate default label".to_string());
                    } else {
                        table.default = Some(target);
                    }
                }
                self.walk(body)
            }
            StatementKind::Labeled(label, body) => {
                if self.labels.contains_key(label.as_str()) {
                    self.error(Error::DuplicateLabel(label.to_string()).to_string());
                } else {
                    self.labels.insert(
                        label.as_str(),
                        LabelTarget {
                            statement,
                            path: self.path.clone(),
                        },
                    );
                }
                self.walk(body)
            }
            StatementKind::Goto(label) => self.gotos.push(label.as_str()),
            StatementKind::Break => {
                if !self.can_jump(true) {
                    self.error("break outside of a loop or switch".to_string());
                }
            }
            StatementKind::Continue => {
                if !self.can_jump(false) {
                    self.error("continue outside of a loop".to_string());
                }
            }
            StatementKind::Declaration(declarations) => {
                for construct in &self.constructs {
                    if let Some(privates) = self.privates.get_mut(construct) {
                        privates.extend(declarations.iter().map(|declaration| declaration.id()));
                    }
                }
            }
            StatementKind::Omp(_, _, body) => {
                self.path.push(PathStep::Construct(statement));
                self.constructs.push(statement.id());
                self.privates.entry(statement.id()).or_default();
                self.targets.push(JumpTarget::Construct);
                self.walk(body);
                self.targets.pop();
                self.constructs.pop();
                self.path.pop();
            }
            StatementKind::Empty
            | StatementKind::Expression(_)
            | StatementKind::Return(_) => {}
        }
    }

    fn walk_loop(&mut self, statement: &'p Statement, body: &'p Statement) {
        self.path.push(PathStep::Loop(statement));
        self.targets.push(JumpTarget::Loop);
        self.walk(body);
        self.targets.pop();
        self.path.pop();
    }
}
