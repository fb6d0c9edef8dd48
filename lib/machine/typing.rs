//! Static types of expressions.

use crate::ast::{BinaryOperator, Constant, Expression, ExpressionKind, Type, UnaryOperator};
use crate::error::*;
use crate::machine::{is_builtin, Environment, Machine};

/// The type two arithmetic operands are converted to.
pub fn common_type(lhs: &Type, rhs: &Type) -> Type {
    if lhs.is_floating() || rhs.is_floating() {
        if *lhs == Type::LongDouble || *rhs == Type::LongDouble {
            Type::LongDouble
        } else {
            Type::Double
        }
    } else if *lhs == Type::LongLong || *rhs == Type::LongLong {
        Type::LongLong
    } else if *lhs == Type::Long || *rhs == Type::Long {
        Type::Long
    } else {
        Type::Int
    }
}

/// The type of an integer constant.
pub(crate) fn constant_type(value: i64) -> Type {
    if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
        Type::Int
    } else {
        Type::Long
    }
}

impl<'p> Machine<'p> {
    /// The type of an expression, without evaluating it.
    pub(crate) fn type_of(
        &self,
        expression: &Expression,
        environment: &Environment,
    ) -> Result<Type, Error> {
        Ok(match expression.kind() {
            ExpressionKind::Constant(Constant::Integer(value)) => constant_type(*value),
            ExpressionKind::Constant(Constant::Float(_)) => Type::Double,
            ExpressionKind::StringLiteral(text) => Type::Char.array_of(Some(text.len() as u64 + 1)),
            ExpressionKind::Identifier(name) => {
                if let Some(binding) = environment.lookup(name) {
                    binding.type_().clone()
                } else if let Some(function) = self.program.function_by_name(name) {
                    function.type_()
                } else if self.enumerators.get(name).is_some() {
                    Type::Int
                } else {
                    return Err(Error::UnknownIdentifier(name.to_string()));
                }
            }
            ExpressionKind::Unary(op, operand) => {
                let type_ = self.type_of(operand, environment)?;
                match op {
                    UnaryOperator::Deref => self.pointee(&type_, expression)?,
                    UnaryOperator::AddressOf => type_.pointer_to(),
                    UnaryOperator::Not => Type::Int,
                    _ => type_,
                }
            }
            ExpressionKind::Binary(op, lhs, rhs) => {
                if op.is_relational() || op.is_logical() {
                    Type::Int
                } else {
                    let lhs = self.type_of(lhs, environment)?.decay();
                    let rhs = self.type_of(rhs, environment)?.decay();
                    match (lhs.is_pointer(), rhs.is_pointer()) {
                        (true, true) if *op == BinaryOperator::Sub => Type::Long,
                        (true, _) => lhs,
                        (false, true) => rhs,
                        (false, false) => common_type(&lhs, &rhs),
                    }
                }
            }
            ExpressionKind::Assign(_, lhs, _) => self.type_of(lhs, environment)?,
            ExpressionKind::Conditional(_, then, _) => self.type_of(then, environment)?.decay(),
            ExpressionKind::Comma(expressions) => match expressions.last() {
                Some(last) => self.type_of(last, environment)?,
                None => Type::Void,
            },
            ExpressionKind::Call(callee, _) => {
                let name = callee
                    .identifier()
                    .filter(|name| environment.lookup(name).is_none());
                match name {
                    Some("malloc") | Some("calloc") => Type::Void.pointer_to(),
                    Some(name) if is_builtin(name) => Type::Int,
                    _ => {
                        let type_ = self.type_of(callee, environment)?;
                        match type_.signature() {
                            Some(signature) => signature.return_type().clone(),
                            None => {
                                return Err(Error::MalformedInput(
                                    expression.location().to_string(),
                                    "call of a value which is not a function".to_string(),
                                ))
                            }
                        }
                    }
                }
            }
            ExpressionKind::Index(base, index) => {
                let base = self.type_of(base, environment)?;
                if base.is_pointer() {
                    self.pointee(&base, expression)?
                } else {
                    let index = self.type_of(index, environment)?;
                    self.pointee(&index, expression)?
                }
            }
            ExpressionKind::Member(aggregate, field) => {
                let aggregate = self.type_of(aggregate, environment)?;
                self.layout.field(&aggregate, field)?.1
            }
            ExpressionKind::Arrow(pointer, field) => {
                let pointer = self.type_of(pointer, environment)?;
                let aggregate = self.pointee(&pointer, expression)?;
                self.layout.field(&aggregate, field)?.1
            }
            ExpressionKind::Cast(type_, _) => type_.clone(),
            ExpressionKind::SizeofType(_) | ExpressionKind::SizeofExpression(_) => Type::Long,
        })
    }

    fn pointee(&self, type_: &Type, expression: &Expression) -> Result<Type, Error> {
        type_.pointee().cloned().ok_or_else(|| {
            Error::MalformedInput(
                expression.location().to_string(),
                "dereference of a value which is not a pointer".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::config::Config;
    use crate::machine::Binding;
    use crate::memory::{Base, Slot};

    #[test]
    fn conversions() {
        assert_eq!(common_type(&Type::Char, &Type::Short), Type::Int);
        assert_eq!(common_type(&Type::Int, &Type::Long), Type::Long);
        assert_eq!(common_type(&Type::LongLong, &Type::Long), Type::LongLong);
        assert_eq!(common_type(&Type::Int, &Type::Float), Type::Double);
        assert_eq!(common_type(&Type::LongDouble, &Type::Int), Type::LongDouble);
        assert_eq!(constant_type(1 << 40), Type::Long);
    }

    #[test]
    fn expressions() {
        let program = Program::new("main")
            .aggregate(structure("pair", vec![("a", Type::Int), ("b", Type::Char)]))
            .function(Function::new("main", Type::Int, vec![], block(vec![])));
        let machine = Machine::new(&program, &Config::default()).unwrap();

        let mut environment = Environment::new();
        environment.bind(
            "p",
            Binding::new(
                Base::stack(1, Slot::Variable(1)),
                Type::Struct("pair".to_string()).pointer_to(),
            ),
        );
        environment.bind(
            "a",
            Binding::new(
                Base::stack(1, Slot::Variable(2)),
                Type::Short.array_of(Some(4)),
            ),
        );

        let type_of = |expression: Expression| machine.type_of(&expression, &environment).unwrap();
        assert_eq!(type_of(arrow(ident("p"), "b")), Type::Char);
        assert_eq!(type_of(index(ident("a"), int(1))), Type::Short);
        assert_eq!(type_of(add(ident("a"), int(1))), Type::Short.pointer_to());
        assert_eq!(type_of(sub(ident("a"), ident("a"))), Type::Long);
        assert_eq!(type_of(lt(ident("a"), int(1))), Type::Int);
        assert_eq!(type_of(call("malloc", vec![int(4)])), Type::Void.pointer_to());
        assert_eq!(type_of(call("main", vec![])), Type::Int);
        assert_eq!(type_of(string("abc")), Type::Char.array_of(Some(4)));
        assert!(machine
            .type_of(&deref(int(1)), &environment)
            .is_err());
    }
}
