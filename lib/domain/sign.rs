//! Sign arithmetic.
//!
//! Numeric abstract values are sets of signs. Every operation is defined on
//! single signs, and lifted to sets by taking the union over all pairs.

use crate::ast::BinaryOperator;
use bitflags::bitflags;

bitflags! {
    /// A set of signs.
    pub struct Signs: u8 {
        const NEG = 0b001;
        const ZERO = 0b010;
        const POS = 0b100;
    }
}

const SINGLES: [Signs; 3] = [Signs::NEG, Signs::ZERO, Signs::POS];

impl Signs {
    /// The sign of a concrete integer.
    pub fn of(value: i64) -> Signs {
        match value {
            v if v < 0 => Signs::NEG,
            0 => Signs::ZERO,
            _ => Signs::POS,
        }
    }

    fn singles(self) -> impl Iterator<Item = Signs> {
        SINGLES.into_iter().filter(move |sign| self.contains(*sign))
    }

    fn lift(self, other: Signs, f: fn(Signs, Signs) -> Signs) -> Signs {
        let mut result = Signs::empty();
        for lhs in self.singles() {
            for rhs in other.singles() {
                result |= f(lhs, rhs);
            }
        }
        result
    }

    fn map(self, f: fn(Signs) -> Signs) -> Signs {
        let mut result = Signs::empty();
        for sign in self.singles() {
            result |= f(sign);
        }
        result
    }

    pub fn add(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (Signs::ZERO, sign) | (sign, Signs::ZERO) => sign,
            (lhs, rhs) if lhs == rhs => lhs,
            _ => Signs::all(),
        })
    }

    pub fn sub(self, other: Signs) -> Signs {
        self.add(other.negate())
    }

    pub fn mul(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (Signs::ZERO, _) | (_, Signs::ZERO) => Signs::ZERO,
            (lhs, rhs) if lhs == rhs => Signs::POS,
            _ => Signs::NEG,
        })
    }

    /// Integer division, truncating towards zero. Division by zero is `Top`.
    pub fn div(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (_, Signs::ZERO) => Signs::all(),
            (Signs::ZERO, _) => Signs::ZERO,
            (lhs, rhs) if lhs == rhs => Signs::POS | Signs::ZERO,
            _ => Signs::NEG | Signs::ZERO,
        })
    }

    /// The remainder takes the sign of the dividend.
    pub fn rem(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (_, Signs::ZERO) => Signs::all(),
            (Signs::ZERO, _) => Signs::ZERO,
            (lhs, _) => lhs | Signs::ZERO,
        })
    }

    pub fn shl(self, other: Signs) -> Signs {
        self.lift(other, |lhs, _| match lhs {
            Signs::ZERO => Signs::ZERO,
            _ => Signs::all(),
        })
    }

    pub fn shr(self, other: Signs) -> Signs {
        self.lift(other, |lhs, _| match lhs {
            Signs::POS => Signs::POS | Signs::ZERO,
            sign => sign,
        })
    }

    pub fn bit_and(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (Signs::ZERO, _) | (_, Signs::ZERO) => Signs::ZERO,
            (Signs::NEG, Signs::NEG) => Signs::NEG,
            _ => Signs::POS | Signs::ZERO,
        })
    }

    pub fn bit_or(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (Signs::ZERO, sign) | (sign, Signs::ZERO) => sign,
            (Signs::POS, Signs::POS) => Signs::POS,
            _ => Signs::NEG,
        })
    }

    pub fn bit_xor(self, other: Signs) -> Signs {
        self.lift(other, |lhs, rhs| match (lhs, rhs) {
            (Signs::ZERO, sign) | (sign, Signs::ZERO) => sign,
            (lhs, rhs) if lhs == rhs => Signs::POS | Signs::ZERO,
            _ => Signs::NEG,
        })
    }

    pub fn negate(self) -> Signs {
        self.map(|sign| match sign {
            Signs::NEG => Signs::POS,
            Signs::POS => Signs::NEG,
            sign => sign,
        })
    }

    pub fn bit_not(self) -> Signs {
        self.map(|sign| match sign {
            Signs::NEG => Signs::POS | Signs::ZERO,
            _ => Signs::NEG,
        })
    }

    /// `x + 1`, which is more precise than adding an arbitrary positive.
    pub fn add_one(self) -> Signs {
        self.map(|sign| match sign {
            Signs::NEG => Signs::NEG | Signs::ZERO,
            _ => Signs::POS,
        })
    }

    /// `x - 1`, which is more precise than subtracting an arbitrary positive.
    pub fn sub_one(self) -> Signs {
        self.map(|sign| match sign {
            Signs::POS => Signs::POS | Signs::ZERO,
            _ => Signs::NEG,
        })
    }

    /// The outcomes `lhs op rhs` may have, as `(may be true, may be false)`.
    pub fn compare(self, op: BinaryOperator, other: Signs) -> (bool, bool) {
        let mut may_be_true = false;
        let mut may_be_false = false;
        for lhs in self.singles() {
            for rhs in other.singles() {
                for ordering in orderings(lhs, rhs) {
                    if holds(op, ordering) {
                        may_be_true = true;
                    } else {
                        may_be_false = true;
                    }
                }
            }
        }
        (may_be_true, may_be_false)
    }

    /// The members of this set for which `sign op constant` may evaluate to
    /// `outcome`.
    pub fn restrict(self, op: BinaryOperator, constant: i64, outcome: bool) -> Signs {
        let rhs = Signs::of(constant);
        let mut result = Signs::empty();
        for sign in self.singles() {
            let (may_be_true, may_be_false) = sign.compare(op, rhs);
            if (outcome && may_be_true) || (!outcome && may_be_false) {
                result |= sign;
            }
        }
        result
    }
}

/// The orderings two values with the given signs may have.
fn orderings(lhs: Signs, rhs: Signs) -> Vec<std::cmp::Ordering> {
    use std::cmp::Ordering::*;
    let rank = |sign: Signs| match sign {
        Signs::NEG => 0,
        Signs::ZERO => 1,
        _ => 2,
    };
    if lhs == rhs {
        if lhs == Signs::ZERO {
            vec![Equal]
        } else {
            vec![Less, Equal, Greater]
        }
    } else if rank(lhs) < rank(rhs) {
        vec![Less]
    } else {
        vec![Greater]
    }
}

fn holds(op: BinaryOperator, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOperator::Lt => ordering == Less,
        BinaryOperator::Le => ordering != Greater,
        BinaryOperator::Gt => ordering == Greater,
        BinaryOperator::Ge => ordering != Less,
        BinaryOperator::Eq => ordering == Equal,
        BinaryOperator::Ne => ordering != Equal,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_steps() {
        let pos_or_zero = Signs::POS | Signs::ZERO;
        let neg_or_zero = Signs::NEG | Signs::ZERO;
        assert_eq!(Signs::POS.sub_one(), pos_or_zero);
        assert_eq!(Signs::ZERO.sub_one(), Signs::NEG);
        assert_eq!(Signs::NEG.sub_one(), Signs::NEG);
        assert_eq!(neg_or_zero.sub_one(), Signs::NEG);
        assert_eq!(pos_or_zero.sub_one(), Signs::all());
        assert_eq!(Signs::ZERO.add_one(), Signs::POS);
        assert_eq!(pos_or_zero.add_one(), Signs::POS);
        assert_eq!(Signs::NEG.add_one(), neg_or_zero);
        assert_eq!(neg_or_zero.add_one(), Signs::all());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(Signs::POS.add(Signs::POS), Signs::POS);
        assert_eq!(Signs::POS.add(Signs::NEG), Signs::all());
        assert_eq!(Signs::ZERO.add(Signs::NEG), Signs::NEG);
        assert_eq!(Signs::NEG.mul(Signs::NEG), Signs::POS);
        assert_eq!(Signs::POS.div(Signs::POS), Signs::POS | Signs::ZERO);
        assert_eq!(Signs::NEG.rem(Signs::POS), Signs::NEG | Signs::ZERO);
        assert_eq!(Signs::NEG.bit_not(), Signs::POS | Signs::ZERO);
    }

    #[test]
    fn restrict() {
        let pos_or_zero = Signs::POS | Signs::ZERO;
        assert_eq!(
            pos_or_zero.restrict(BinaryOperator::Le, 1, false),
            Signs::POS
        );
        assert_eq!(pos_or_zero.restrict(BinaryOperator::Eq, 0, false), Signs::POS);
        assert_eq!(Signs::all().restrict(BinaryOperator::Lt, 0, true), Signs::NEG);
        assert_eq!(Signs::POS.restrict(BinaryOperator::Lt, 0, true), Signs::empty());
    }
}
