use crate::ast::{NodeId, SourceLocation, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A literal constant.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Constant {
    Integer(i64),
    Float(f64),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    BitNot,
    Deref,
    AddressOf,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOperator {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
                | BinaryOperator::Eq
                | BinaryOperator::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr)
    }

    /// The operator with its operands swapped, `a < b` as `b > a`.
    pub fn mirror(&self) -> BinaryOperator {
        match self {
            BinaryOperator::Lt => BinaryOperator::Gt,
            BinaryOperator::Le => BinaryOperator::Ge,
            BinaryOperator::Gt => BinaryOperator::Lt,
            BinaryOperator::Ge => BinaryOperator::Le,
            op => *op,
        }
    }

    /// The relational operator which holds exactly when this one does not.
    pub fn negate(&self) -> BinaryOperator {
        match self {
            BinaryOperator::Lt => BinaryOperator::Ge,
            BinaryOperator::Le => BinaryOperator::Gt,
            BinaryOperator::Gt => BinaryOperator::Le,
            BinaryOperator::Ge => BinaryOperator::Lt,
            BinaryOperator::Eq => BinaryOperator::Ne,
            BinaryOperator::Ne => BinaryOperator::Eq,
            op => *op,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ExpressionKind {
    Constant(Constant),
    StringLiteral(String),
    Identifier(String),
    Unary(UnaryOperator, Box<Expression>),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
    /// Assignment, with the operator of a compound assignment such as `+=`.
    Assign(Option<BinaryOperator>, Box<Expression>, Box<Expression>),
    Conditional(Box<Expression>, Box<Expression>, Box<Expression>),
    Comma(Vec<Expression>),
    Call(Box<Expression>, Vec<Expression>),
    Index(Box<Expression>, Box<Expression>),
    Member(Box<Expression>, String),
    Arrow(Box<Expression>, String),
    Cast(Type, Box<Expression>),
    SizeofType(Type),
    SizeofExpression(Box<Expression>),
}

/// An expression node.
///
/// Nodes are identified by their `NodeId`, which is assigned when the
/// enclosing function is added to a [`Program`](crate::ast::Program). Two
/// nodes are equal when their ids are.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Expression {
    id: NodeId,
    kind: ExpressionKind,
    location: SourceLocation,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Expression {
        Expression {
            id: 0,
            kind,
            location: SourceLocation::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Attach a source location to this expression.
    pub fn at(mut self, line: u32, column: u32) -> Expression {
        self.location = SourceLocation::new(line, column);
        self
    }

    /// Assign ids to this expression and all of its children, in preorder.
    pub(crate) fn number(&mut self, next: &mut NodeId) {
        *next += 1;
        self.id = *next;
        match &mut self.kind {
            ExpressionKind::Constant(_)
            | ExpressionKind::StringLiteral(_)
            | ExpressionKind::Identifier(_)
            | ExpressionKind::SizeofType(_) => {}
            ExpressionKind::Unary(_, operand)
            | ExpressionKind::Member(operand, _)
            | ExpressionKind::Arrow(operand, _)
            | ExpressionKind::Cast(_, operand)
            | ExpressionKind::SizeofExpression(operand) => operand.number(next),
            ExpressionKind::Binary(_, lhs, rhs)
            | ExpressionKind::Assign(_, lhs, rhs)
            | ExpressionKind::Index(lhs, rhs) => {
                lhs.number(next);
                rhs.number(next);
            }
            ExpressionKind::Conditional(condition, then, else_) => {
                condition.number(next);
                then.number(next);
                else_.number(next);
            }
            ExpressionKind::Comma(expressions) => {
                for expression in expressions {
                    expression.number(next);
                }
            }
            ExpressionKind::Call(callee, arguments) => {
                callee.number(next);
                for argument in arguments {
                    argument.number(next);
                }
            }
        }
    }

    /// The identifier this expression names, if it is a bare identifier.
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Expression) -> bool {
        self.id == other.id
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
