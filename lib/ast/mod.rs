//! The analyzed program.
//!
//! The analysis consumes an annotated syntax tree for a C-like language with
//! OpenMP constructs. Parsing source text is left to a front end, which builds
//! these types. The convenience functions in this module build the same tree
//! by hand, which is how tests and small drivers create programs.
//!
//! ```
//! use cesk::ast::*;
//!
//! // int main() { int a[2]; a[0] = 1; return a[0]; }
//! let main = Function::new(
//!     "main",
//!     Type::Int,
//!     vec![],
//!     block(vec![
//!         declare("a", Type::Int.array_of(Some(2)), None),
//!         expr(assign(index(ident("a"), int(0)), int(1))),
//!         ret(Some(index(ident("a"), int(0)))),
//!     ]),
//! );
//! let program = Program::new("main").function(main);
//! assert!(program.function_by_name("main").is_some());
//! ```
//!
//! # Node identity
//!
//! Every `Expression`, `Statement` and `Declaration` receives a `NodeId` when
//! it is added to a `Program`. Nodes compare and hash by id. The machine uses
//! ids to name allocation sites, string literals, stack slots and OpenMP
//! constructs.

mod expression;
mod location;
mod program;
mod statement;
mod types;

pub use self::expression::*;
pub use self::location::*;
pub use self::program::*;
pub use self::statement::*;
pub use self::types::*;

/// The identity of a node in a `Program`.
pub type NodeId = usize;

/// An integer constant expression.
pub fn int(value: i64) -> Expression {
    Expression::new(ExpressionKind::Constant(Constant::Integer(value)))
}

/// A floating point constant expression.
pub fn float(value: f64) -> Expression {
    Expression::new(ExpressionKind::Constant(Constant::Float(value)))
}

pub fn string<S: Into<String>>(value: S) -> Expression {
    Expression::new(ExpressionKind::StringLiteral(value.into()))
}

pub fn ident<S: Into<String>>(name: S) -> Expression {
    Expression::new(ExpressionKind::Identifier(name.into()))
}

pub fn unary(op: UnaryOperator, operand: Expression) -> Expression {
    Expression::new(ExpressionKind::Unary(op, Box::new(operand)))
}

pub fn negate(operand: Expression) -> Expression {
    unary(UnaryOperator::Negate, operand)
}

pub fn not(operand: Expression) -> Expression {
    unary(UnaryOperator::Not, operand)
}

pub fn deref(operand: Expression) -> Expression {
    unary(UnaryOperator::Deref, operand)
}

pub fn address_of(operand: Expression) -> Expression {
    unary(UnaryOperator::AddressOf, operand)
}

pub fn pre_increment(operand: Expression) -> Expression {
    unary(UnaryOperator::PreIncrement, operand)
}

pub fn post_increment(operand: Expression) -> Expression {
    unary(UnaryOperator::PostIncrement, operand)
}

pub fn pre_decrement(operand: Expression) -> Expression {
    unary(UnaryOperator::PreDecrement, operand)
}

pub fn post_decrement(operand: Expression) -> Expression {
    unary(UnaryOperator::PostDecrement, operand)
}

pub fn binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Expression {
    Expression::new(ExpressionKind::Binary(op, Box::new(lhs), Box::new(rhs)))
}

pub fn add(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Add, lhs, rhs)
}

pub fn sub(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Sub, lhs, rhs)
}

pub fn mul(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Mul, lhs, rhs)
}

pub fn lt(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Lt, lhs, rhs)
}

pub fn le(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Le, lhs, rhs)
}

pub fn gt(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Gt, lhs, rhs)
}

pub fn ge(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Ge, lhs, rhs)
}

pub fn eq(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Eq, lhs, rhs)
}

pub fn ne(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::Ne, lhs, rhs)
}

pub fn and(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::LogicalAnd, lhs, rhs)
}

pub fn or(lhs: Expression, rhs: Expression) -> Expression {
    binary(BinaryOperator::LogicalOr, lhs, rhs)
}

pub fn assign(lhs: Expression, rhs: Expression) -> Expression {
    Expression::new(ExpressionKind::Assign(None, Box::new(lhs), Box::new(rhs)))
}

/// A compound assignment, `lhs op= rhs`.
pub fn compound(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Expression {
    Expression::new(ExpressionKind::Assign(
        Some(op),
        Box::new(lhs),
        Box::new(rhs),
    ))
}

pub fn conditional(condition: Expression, then: Expression, else_: Expression) -> Expression {
    Expression::new(ExpressionKind::Conditional(
        Box::new(condition),
        Box::new(then),
        Box::new(else_),
    ))
}

pub fn comma(expressions: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Comma(expressions))
}

/// A call to the function named `callee`.
pub fn call<S: Into<String>>(callee: S, arguments: Vec<Expression>) -> Expression {
    call_expr(ident(callee), arguments)
}

/// A call through an arbitrary callee expression, such as a function pointer.
pub fn call_expr(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Call(Box::new(callee), arguments))
}

pub fn index(array: Expression, index: Expression) -> Expression {
    Expression::new(ExpressionKind::Index(Box::new(array), Box::new(index)))
}

pub fn member<S: Into<String>>(aggregate: Expression, field: S) -> Expression {
    Expression::new(ExpressionKind::Member(Box::new(aggregate), field.into()))
}

pub fn arrow<S: Into<String>>(pointer: Expression, field: S) -> Expression {
    Expression::new(ExpressionKind::Arrow(Box::new(pointer), field.into()))
}

pub fn cast(type_: Type, operand: Expression) -> Expression {
    Expression::new(ExpressionKind::Cast(type_, Box::new(operand)))
}

pub fn sizeof_type(type_: Type) -> Expression {
    Expression::new(ExpressionKind::SizeofType(type_))
}

pub fn sizeof_expr(operand: Expression) -> Expression {
    Expression::new(ExpressionKind::SizeofExpression(Box::new(operand)))
}

/// The null pointer constant, `(void *) 0`.
pub fn null() -> Expression {
    cast(Type::Void.pointer_to(), int(0))
}

pub fn empty() -> Statement {
    Statement::new(StatementKind::Empty)
}

/// An expression statement.
pub fn expr(expression: Expression) -> Statement {
    Statement::new(StatementKind::Expression(expression))
}

/// A declaration, for use as a parameter or a global.
pub fn decl<S: Into<String>>(name: S, type_: Type, initializer: Option<Expression>) -> Declaration {
    Declaration::new(name, type_, initializer.map(Initializer::Expression))
}

/// A declaration statement of a single variable.
pub fn declare<S: Into<String>>(name: S, type_: Type, initializer: Option<Expression>) -> Statement {
    Statement::new(StatementKind::Declaration(vec![decl(name, type_, initializer)]))
}

/// A declaration statement with a brace-enclosed initializer list.
pub fn declare_list<S: Into<String>>(name: S, type_: Type, items: Vec<Initializer>) -> Statement {
    Statement::new(StatementKind::Declaration(vec![Declaration::new(
        name,
        type_,
        Some(Initializer::List(items)),
    )]))
}

pub fn param<S: Into<String>>(name: S, type_: Type) -> Declaration {
    Declaration::new(name, type_, None)
}

pub fn block(statements: Vec<Statement>) -> Statement {
    Statement::new(StatementKind::Block(statements))
}

pub fn if_(condition: Expression, then: Statement, else_: Option<Statement>) -> Statement {
    Statement::new(StatementKind::If(
        condition,
        Box::new(then),
        else_.map(Box::new),
    ))
}

pub fn while_(condition: Expression, body: Statement) -> Statement {
    Statement::new(StatementKind::While(condition, Box::new(body)))
}

pub fn do_while(body: Statement, condition: Expression) -> Statement {
    Statement::new(StatementKind::DoWhile(Box::new(body), condition))
}

pub fn for_(
    init: Option<Statement>,
    condition: Option<Expression>,
    step: Option<Expression>,
    body: Statement,
) -> Statement {
    Statement::new(StatementKind::For(
        init.map(Box::new),
        condition,
        step,
        Box::new(body),
    ))
}

pub fn switch(selector: Expression, body: Statement) -> Statement {
    Statement::new(StatementKind::Switch(selector, Box::new(body)))
}

pub fn case(value: Expression, body: Statement) -> Statement {
    Statement::new(StatementKind::Case(value, Box::new(body)))
}

pub fn default(body: Statement) -> Statement {
    Statement::new(StatementKind::Default(Box::new(body)))
}

pub fn labeled<S: Into<String>>(label: S, body: Statement) -> Statement {
    Statement::new(StatementKind::Labeled(label.into(), Box::new(body)))
}

pub fn goto<S: Into<String>>(label: S) -> Statement {
    Statement::new(StatementKind::Goto(label.into()))
}

pub fn break_() -> Statement {
    Statement::new(StatementKind::Break)
}

pub fn continue_() -> Statement {
    Statement::new(StatementKind::Continue)
}

pub fn ret(value: Option<Expression>) -> Statement {
    Statement::new(StatementKind::Return(value))
}

pub fn omp(kind: OmpKind, clauses: Vec<OmpClause>, body: Statement) -> Statement {
    Statement::new(StatementKind::Omp(kind, clauses, Box::new(body)))
}

pub fn structure<S: Into<String>>(name: S, fields: Vec<(&str, Type)>) -> Aggregate {
    Aggregate::new(
        AggregateKind::Struct,
        name,
        fields
            .into_iter()
            .map(|(name, type_)| Field::new(name, type_))
            .collect(),
    )
}

pub fn union_<S: Into<String>>(name: S, fields: Vec<(&str, Type)>) -> Aggregate {
    Aggregate::new(
        AggregateKind::Union,
        name,
        fields
            .into_iter()
            .map(|(name, type_)| Field::new(name, type_))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_numbers_nodes() {
        let program = Program::new("main")
            .global(decl("g", Type::Int, Some(int(1))))
            .function(Function::new(
                "main",
                Type::Int,
                vec![],
                block(vec![expr(assign(ident("g"), int(2))), ret(Some(int(0)))]),
            ));

        let mut ids = Vec::new();
        ids.push(program.globals()[0].id());
        let main = program.function_by_name("main").unwrap();
        ids.push(main.body().id());
        if let StatementKind::Block(statements) = main.body().kind() {
            for statement in statements {
                ids.push(statement.id());
            }
        }
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids.len(), sorted.len());
        assert!(ids.iter().all(|id| *id > 0));
    }
}
