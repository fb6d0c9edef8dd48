use crate::ast::{Declaration, Expression, NodeId, SourceLocation, Statement, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A function definition.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Function {
    name: String,
    return_type: Type,
    parameters: Vec<Declaration>,
    variadic: bool,
    body: Statement,
    location: SourceLocation,
}

impl Function {
    pub fn new<S: Into<String>>(
        name: S,
        return_type: Type,
        parameters: Vec<Declaration>,
        body: Statement,
    ) -> Function {
        Function {
            name: name.into(),
            return_type,
            parameters,
            variadic: false,
            body,
            location: SourceLocation::default(),
        }
    }

    pub fn variadic(mut self) -> Function {
        self.variadic = true;
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Function {
        self.location = SourceLocation::new(line, column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn parameters(&self) -> &[Declaration] {
        &self.parameters
    }

    pub fn body(&self) -> &Statement {
        &self.body
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// The type of this function.
    pub fn type_(&self) -> Type {
        Type::Function(Box::new(crate::ast::FunctionType::new(
            self.return_type.clone(),
            self.parameters.iter().map(|p| p.type_().clone()).collect(),
            self.variadic,
        )))
    }

    fn number(&mut self, next: &mut NodeId) {
        for parameter in &mut self.parameters {
            parameter.number(next);
        }
        self.body.number(next);
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AggregateKind {
    Struct,
    Union,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Field {
    name: String,
    type_: Type,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, type_: Type) -> Field {
        Field {
            name: name.into(),
            type_,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }
}

/// A struct or union definition.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Aggregate {
    kind: AggregateKind,
    name: String,
    fields: Vec<Field>,
}

impl Aggregate {
    pub fn new<S: Into<String>>(kind: AggregateKind, name: S, fields: Vec<Field>) -> Aggregate {
        Aggregate {
            kind,
            name: name.into(),
            fields,
        }
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// One constant of an enumeration, with its explicit value if it has one.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Enumerator {
    name: String,
    value: Option<Expression>,
}

impl Enumerator {
    pub fn new<S: Into<String>>(name: S, value: Option<Expression>) -> Enumerator {
        Enumerator {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&Expression> {
        self.value.as_ref()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Enumeration {
    name: String,
    enumerators: Vec<Enumerator>,
}

impl Enumeration {
    pub fn new<S: Into<String>>(name: S, enumerators: Vec<Enumerator>) -> Enumeration {
        Enumeration {
            name: name.into(),
            enumerators,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enumerators(&self) -> &[Enumerator] {
        &self.enumerators
    }
}

/// A whole translation unit, ready for analysis.
///
/// Every node added to a `Program` receives a unique `NodeId`. Allocation
/// sites, string literals and OpenMP constructs are identified by these ids,
/// so a `Program` should be built once and then analyzed as many times as
/// required.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Program {
    entry: String,
    functions: BTreeMap<String, Function>,
    globals: Vec<Declaration>,
    aggregates: BTreeMap<String, Aggregate>,
    enumerations: Vec<Enumeration>,
    next_id: NodeId,
}

impl Program {
    /// Create an empty program whose execution starts at `entry`.
    pub fn new<S: Into<String>>(entry: S) -> Program {
        Program {
            entry: entry.into(),
            functions: BTreeMap::new(),
            globals: Vec::new(),
            aggregates: BTreeMap::new(),
            enumerations: Vec::new(),
            next_id: 0,
        }
    }

    pub fn function(mut self, mut function: Function) -> Program {
        function.number(&mut self.next_id);
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn global(mut self, mut declaration: Declaration) -> Program {
        declaration.number(&mut self.next_id);
        self.globals.push(declaration);
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Program {
        self.aggregates.insert(aggregate.name().to_string(), aggregate);
        self
    }

    pub fn enumeration(mut self, mut enumeration: Enumeration) -> Program {
        for enumerator in &mut enumeration.enumerators {
            if let Some(value) = &mut enumerator.value {
                value.number(&mut self.next_id);
            }
        }
        self.enumerations.push(enumeration);
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn functions(&self) -> &BTreeMap<String, Function> {
        &self.functions
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn globals(&self) -> &[Declaration] {
        &self.globals
    }

    pub fn aggregates(&self) -> &BTreeMap<String, Aggregate> {
        &self.aggregates
    }

    pub fn aggregate_by_name(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates.get(name)
    }

    pub fn enumerations(&self) -> &[Enumeration] {
        &self.enumerations
    }
}
