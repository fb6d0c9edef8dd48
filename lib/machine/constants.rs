//! Compile-time constants: enumerators, case labels and array lengths.

use crate::ast::{
    BinaryOperator, Constant, ExpressionKind, Expression, Program, Type, UnaryOperator,
};
use crate::error::*;
use crate::memory::Layout;
use std::collections::BTreeMap;

/// The values of every enumerator in a program.
#[derive(Clone, Debug, Default)]
pub struct Enumerators {
    values: BTreeMap<String, i64>,
}

impl Enumerators {
    /// Fold every enumerator. An enumerator without a value is one more
    /// than the enumerator before it, and the first defaults to zero.
    /// Explicit values may refer to earlier enumerators.
    pub fn new(program: &Program, layout: &Layout) -> Result<Enumerators, Error> {
        let mut enumerators = Enumerators::default();
        for enumeration in program.enumerations() {
            let mut next = 0;
            for enumerator in enumeration.enumerators() {
                let value = match enumerator.value() {
                    Some(expression) => enumerators.fold(expression, layout).ok_or_else(|| {
                        Error::MalformedInput(
                            enumeration.name().to_string(),
                            format!("enumerator `{}` is not a constant", enumerator.name()),
                        )
                    })?,
                    None => next,
                };
                enumerators
                    .values
                    .insert(enumerator.name().to_string(), value);
                next = value.wrapping_add(1);
            }
        }
        Ok(enumerators)
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).cloned()
    }

    /// Fold an integer constant expression.
    pub fn fold(&self, expression: &Expression, layout: &Layout) -> Option<i64> {
        match expression.kind() {
            ExpressionKind::Constant(Constant::Integer(value)) => Some(*value),
            ExpressionKind::Identifier(name) => self.get(name),
            ExpressionKind::Unary(op, operand) => {
                let operand = self.fold(operand, layout)?;
                match op {
                    UnaryOperator::Negate => operand.checked_neg(),
                    UnaryOperator::Plus => Some(operand),
                    UnaryOperator::Not => Some((operand == 0) as i64),
                    UnaryOperator::BitNot => Some(!operand),
                    _ => None,
                }
            }
            ExpressionKind::Binary(BinaryOperator::LogicalAnd, lhs, rhs) => {
                if self.fold(lhs, layout)? == 0 {
                    Some(0)
                } else {
                    Some((self.fold(rhs, layout)? != 0) as i64)
                }
            }
            ExpressionKind::Binary(BinaryOperator::LogicalOr, lhs, rhs) => {
                if self.fold(lhs, layout)? != 0 {
                    Some(1)
                } else {
                    Some((self.fold(rhs, layout)? != 0) as i64)
                }
            }
            ExpressionKind::Binary(op, lhs, rhs) => {
                evaluate(*op, self.fold(lhs, layout)?, self.fold(rhs, layout)?)
            }
            ExpressionKind::Conditional(condition, then, else_) => {
                if self.fold(condition, layout)? != 0 {
                    self.fold(then, layout)
                } else {
                    self.fold(else_, layout)
                }
            }
            ExpressionKind::Cast(Type::Bool, operand) => {
                Some((self.fold(operand, layout)? != 0) as i64)
            }
            ExpressionKind::Cast(type_, operand) if type_.is_integer() => {
                let value = self.fold(operand, layout)?;
                match layout.size_of(type_).ok().flatten() {
                    Some(width) => Some(truncate(value, width)),
                    None => Some(value),
                }
            }
            ExpressionKind::Cast(type_, operand) if type_.is_pointer() => {
                self.fold(operand, layout)
            }
            ExpressionKind::SizeofType(type_) => layout
                .size_of(type_)
                .ok()
                .flatten()
                .map(|size| size as i64),
            _ => None,
        }
    }
}

/// `value` converted to a signed integer of `width` bytes, keeping the low
/// bytes.
pub fn truncate(value: i64, width: u64) -> i64 {
    match width {
        1..=7 => {
            let shift = 64 - 8 * width as u32;
            (value << shift) >> shift
        }
        _ => value,
    }
}

/// Apply a binary operator to two exact integers. `None` when the result
/// is undefined, such as division by zero or overflow.
pub fn evaluate(op: BinaryOperator, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match op {
        BinaryOperator::Add => lhs.checked_add(rhs)?,
        BinaryOperator::Sub => lhs.checked_sub(rhs)?,
        BinaryOperator::Mul => lhs.checked_mul(rhs)?,
        BinaryOperator::Div => lhs.checked_div(rhs)?,
        BinaryOperator::Rem => lhs.checked_rem(rhs)?,
        BinaryOperator::Shl => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
        BinaryOperator::Shr => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
        BinaryOperator::BitAnd => lhs & rhs,
        BinaryOperator::BitOr => lhs | rhs,
        BinaryOperator::BitXor => lhs ^ rhs,
        BinaryOperator::Lt => (lhs < rhs) as i64,
        BinaryOperator::Le => (lhs <= rhs) as i64,
        BinaryOperator::Gt => (lhs > rhs) as i64,
        BinaryOperator::Ge => (lhs >= rhs) as i64,
        BinaryOperator::Eq => (lhs == rhs) as i64,
        BinaryOperator::Ne => (lhs != rhs) as i64,
        BinaryOperator::LogicalAnd => (lhs != 0 && rhs != 0) as i64,
        BinaryOperator::LogicalOr => (lhs != 0 || rhs != 0) as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::Config;

    #[test]
    fn enumerators() {
        let program = Program::new("main").enumeration(Enumeration::new(
            "color",
            vec![
                Enumerator::new("RED", None),
                Enumerator::new("GREEN", Some(int(5))),
                Enumerator::new("BLUE", None),
                Enumerator::new("LAST", Some(add(ident("BLUE"), int(10)))),
            ],
        ));
        let layout = Layout::new(&program, &Config::default()).unwrap();
        let enumerators = Enumerators::new(&program, &layout).unwrap();
        assert_eq!(enumerators.get("RED"), Some(0));
        assert_eq!(enumerators.get("GREEN"), Some(5));
        assert_eq!(enumerators.get("BLUE"), Some(6));
        assert_eq!(enumerators.get("LAST"), Some(16));
    }

    #[test]
    fn not_constant() {
        let program = Program::new("main").enumeration(Enumeration::new(
            "e",
            vec![Enumerator::new("A", Some(ident("x")))],
        ));
        let layout = Layout::new(&program, &Config::default()).unwrap();
        assert!(Enumerators::new(&program, &layout).is_err());
    }

    #[test]
    fn folding() {
        let layout = Layout::new(&Program::new("main"), &Config::default()).unwrap();
        let enumerators = Enumerators::default();
        assert_eq!(enumerators.fold(&negate(int(3)), &layout), Some(-3));
        assert_eq!(enumerators.fold(&sizeof_type(Type::Long), &layout), Some(8));
        assert_eq!(enumerators.fold(&null(), &layout), Some(0));
        assert_eq!(evaluate(BinaryOperator::Div, 1, 0), None);
        assert_eq!(evaluate(BinaryOperator::Shl, 1, 3), Some(8));
        assert_eq!(enumerators.fold(&cast(Type::Char, int(200)), &layout), Some(-56));
        assert_eq!(enumerators.fold(&cast(Type::Bool, int(7)), &layout), Some(1));
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate(200, 1), -56);
        assert_eq!(truncate(65_537, 2), 1);
        assert_eq!(truncate(-1, 4), -1);
        assert_eq!(truncate(1 << 31, 4), -(1 << 31));
        assert_eq!(truncate(i64::MIN, 8), i64::MIN);
    }
}
