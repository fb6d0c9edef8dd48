use crate::ast::BinaryOperator;
use crate::domain::Signs;
use crate::memory::{serialize_pairs, Address, Base, Offset};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A set of data addresses, and whether the null pointer is a member.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AddressSet {
    #[serde(serialize_with = "serialize_pairs")]
    targets: BTreeMap<Base, Offset>,
    null: bool,
}

impl AddressSet {
    pub fn new() -> AddressSet {
        AddressSet::default()
    }

    pub fn singleton(address: Address) -> AddressSet {
        let mut targets = BTreeMap::new();
        targets.insert(address.base(), address.offset());
        AddressSet {
            targets,
            null: false,
        }
    }

    /// Add an address to this set, joining its offset with any offset
    /// already held for the same base.
    pub fn insert(&mut self, address: Address) {
        let offset = match self.targets.get(&address.base()) {
            Some(offset) => offset.join(&address.offset()),
            None => address.offset(),
        };
        self.targets.insert(address.base(), offset);
    }

    pub fn with_null(mut self, null: bool) -> AddressSet {
        self.null = null;
        self
    }

    pub fn null(&self) -> bool {
        self.null
    }

    pub fn targets(&self) -> impl Iterator<Item = Address> + '_ {
        self.targets
            .iter()
            .map(|(base, offset)| Address::new(*base, *offset))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The only address in this set, when it holds exactly one non-null
    /// address.
    pub fn single(&self) -> Option<Address> {
        if self.null || self.targets.len() != 1 {
            return None;
        }
        self.targets().next()
    }

    pub fn contains_base(&self, base: &Base) -> bool {
        self.targets.contains_key(base)
    }

    pub fn join(&self, other: &AddressSet) -> AddressSet {
        let mut result = self.clone();
        for address in other.targets() {
            result.insert(address);
        }
        result.null |= other.null;
        result
    }

    pub fn is_subset_of(&self, other: &AddressSet) -> bool {
        if self.null && !other.null {
            return false;
        }
        self.targets
            .iter()
            .all(|(base, offset)| match other.targets.get(base) {
                Some(other_offset) => offset.is_subset_of(other_offset),
                None => false,
            })
    }

    /// Apply `f` to every address, joining addresses which land on the
    /// same base.
    pub fn map<F>(&self, f: F) -> AddressSet
    where
        F: Fn(Address) -> Address,
    {
        let mut result = AddressSet::new().with_null(self.null);
        for address in self.targets() {
            result.insert(f(address));
        }
        result
    }

    fn shares_base(&self, other: &AddressSet) -> bool {
        self.targets.keys().any(|base| other.targets.contains_key(base))
    }
}

/// A set of function names, the value of a function pointer, and whether
/// the null pointer is a member.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LabelSet {
    labels: BTreeSet<String>,
    null: bool,
}

impl LabelSet {
    pub fn singleton<S: Into<String>>(label: S) -> LabelSet {
        let mut labels = BTreeSet::new();
        labels.insert(label.into());
        LabelSet {
            labels,
            null: false,
        }
    }

    pub fn with_null(mut self, null: bool) -> LabelSet {
        self.null = null;
        self
    }

    pub fn null(&self) -> bool {
        self.null
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn join(&self, other: &LabelSet) -> LabelSet {
        LabelSet {
            labels: self.labels.union(&other.labels).cloned().collect(),
            null: self.null || other.null,
        }
    }

    pub fn is_subset_of(&self, other: &LabelSet) -> bool {
        (!self.null || other.null) && self.labels.is_subset(&other.labels)
    }
}

/// An abstract value.
///
/// ```text
///                     Top
///          /        /     \          \
///   PosOrZero  NegOrZero  Pointer  CodePointer
///     /    \    /    \       |
///   Pos    Zero      Neg    ...
///      \     |      /
///         Undefined
///             |
///          Bottom
/// ```
///
/// `Zero` doubles as the null pointer, so `Zero` is below every pointer set
/// which holds null. `Undefined` is the content of memory which was never
/// written. It sits below every defined value: a location which may or may
/// not have been initialized joins to the initialized value.
///
/// The derived `Ord` is structural, and only used to store values in ordered
/// collections. The lattice order is `is_subset_of`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AbstractValue {
    Bottom,
    Undefined,
    Zero,
    Pos,
    Neg,
    PosOrZero,
    NegOrZero,
    Top,
    Pointer(AddressSet),
    CodePointer(LabelSet),
}

impl AbstractValue {
    /// The abstraction of a concrete integer.
    pub fn of(value: i64) -> AbstractValue {
        AbstractValue::from_signs(Signs::of(value))
    }

    /// Build a numeric value from a set of signs. `{Neg, Pos}` is not an
    /// element of the lattice, and widens to `Top`.
    pub fn from_signs(signs: Signs) -> AbstractValue {
        if signs == Signs::empty() {
            AbstractValue::Bottom
        } else if signs == Signs::ZERO {
            AbstractValue::Zero
        } else if signs == Signs::POS {
            AbstractValue::Pos
        } else if signs == Signs::NEG {
            AbstractValue::Neg
        } else if signs == Signs::POS | Signs::ZERO {
            AbstractValue::PosOrZero
        } else if signs == Signs::NEG | Signs::ZERO {
            AbstractValue::NegOrZero
        } else {
            AbstractValue::Top
        }
    }

    /// The signs of a numeric value. `None` for pointers and `Undefined`.
    pub fn signs(&self) -> Option<Signs> {
        Some(match self {
            AbstractValue::Bottom => Signs::empty(),
            AbstractValue::Zero => Signs::ZERO,
            AbstractValue::Pos => Signs::POS,
            AbstractValue::Neg => Signs::NEG,
            AbstractValue::PosOrZero => Signs::POS | Signs::ZERO,
            AbstractValue::NegOrZero => Signs::NEG | Signs::ZERO,
            AbstractValue::Top => Signs::all(),
            _ => return None,
        })
    }

    /// A pointer value, normalized: the empty set is `Bottom`, and a set
    /// holding only null is `Zero`.
    pub fn pointer(set: AddressSet) -> AbstractValue {
        if set.is_empty() {
            if set.null() {
                AbstractValue::Zero
            } else {
                AbstractValue::Bottom
            }
        } else {
            AbstractValue::Pointer(set)
        }
    }

    pub fn address(address: Address) -> AbstractValue {
        AbstractValue::Pointer(AddressSet::singleton(address))
    }

    pub fn function<S: Into<String>>(name: S) -> AbstractValue {
        AbstractValue::CodePointer(LabelSet::singleton(name))
    }

    /// A function pointer value, normalized the way `pointer` is.
    pub fn code_pointer(labels: LabelSet) -> AbstractValue {
        if labels.is_empty() {
            if labels.null() {
                AbstractValue::Zero
            } else {
                AbstractValue::Bottom
            }
        } else {
            AbstractValue::CodePointer(labels)
        }
    }

    pub fn is_bottom(&self) -> bool {
        *self == AbstractValue::Bottom
    }

    pub fn is_top(&self) -> bool {
        *self == AbstractValue::Top
    }

    pub fn is_undefined(&self) -> bool {
        *self == AbstractValue::Undefined
    }

    /// Replace every address into `from` with the same offset into `to`.
    pub fn rename(&self, from: &Base, to: &Base) -> AbstractValue {
        match self {
            AbstractValue::Pointer(set) if set.contains_base(from) => {
                AbstractValue::Pointer(set.map(|address| {
                    if address.base() == *from {
                        Address::new(*to, address.offset())
                    } else {
                        address
                    }
                }))
            }
            value => value.clone(),
        }
    }

    /// The data addresses this value may denote.
    pub fn addresses(&self) -> Option<&AddressSet> {
        match self {
            AbstractValue::Pointer(set) => Some(set),
            _ => None,
        }
    }

    pub fn join(&self, other: &AbstractValue) -> AbstractValue {
        use AbstractValue::*;
        match (self, other) {
            (Bottom, value) | (value, Bottom) => value.clone(),
            (Undefined, value) | (value, Undefined) => value.clone(),
            (Top, _) | (_, Top) => Top,
            (Pointer(lhs), Pointer(rhs)) => Pointer(lhs.join(rhs)),
            (Zero, Pointer(set)) | (Pointer(set), Zero) => Pointer(set.clone().with_null(true)),
            (CodePointer(lhs), CodePointer(rhs)) => CodePointer(lhs.join(rhs)),
            (Zero, CodePointer(labels)) | (CodePointer(labels), Zero) => {
                CodePointer(labels.clone().with_null(true))
            }
            (lhs, rhs) => match (lhs.signs(), rhs.signs()) {
                (Some(lhs), Some(rhs)) => AbstractValue::from_signs(lhs | rhs),
                _ => Top,
            },
        }
    }

    pub fn meet(&self, other: &AbstractValue) -> AbstractValue {
        use AbstractValue::*;
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Top, value) | (value, Top) => value.clone(),
            (Undefined, Undefined) => Undefined,
            (Undefined, _) | (_, Undefined) => Bottom,
            (Pointer(lhs), Pointer(rhs)) => {
                let mut result = AddressSet::new().with_null(lhs.null() && rhs.null());
                for address in lhs.targets() {
                    if let Some(offset) = rhs.targets.get(&address.base()) {
                        let offset = if address.offset() == *offset {
                            *offset
                        } else if *offset == Offset::Unknown {
                            address.offset()
                        } else if address.offset() == Offset::Unknown {
                            *offset
                        } else {
                            continue;
                        };
                        result.insert(Address::new(address.base(), offset));
                    }
                }
                AbstractValue::pointer(result)
            }
            (Zero, Pointer(set)) | (Pointer(set), Zero) => {
                if set.null() {
                    Zero
                } else {
                    Bottom
                }
            }
            (CodePointer(lhs), CodePointer(rhs)) => AbstractValue::code_pointer(LabelSet {
                labels: lhs.labels.intersection(&rhs.labels).cloned().collect(),
                null: lhs.null && rhs.null,
            }),
            (Zero, CodePointer(labels)) | (CodePointer(labels), Zero) => {
                if labels.null() {
                    Zero
                } else {
                    Bottom
                }
            }
            (lhs, rhs) => match (lhs.signs(), rhs.signs()) {
                (Some(lhs), Some(rhs)) => AbstractValue::from_signs(lhs & rhs),
                _ => Bottom,
            },
        }
    }

    /// The lattice order, `self ⊑ other`.
    pub fn is_subset_of(&self, other: &AbstractValue) -> bool {
        use AbstractValue::*;
        match (self, other) {
            (Bottom, _) => true,
            (_, Bottom) => false,
            (Undefined, _) => true,
            (_, Undefined) => false,
            (_, Top) => true,
            (Top, _) => false,
            (Pointer(lhs), Pointer(rhs)) => lhs.is_subset_of(rhs),
            (Zero, Pointer(set)) => set.null(),
            (CodePointer(lhs), CodePointer(rhs)) => lhs.is_subset_of(rhs),
            (Zero, CodePointer(labels)) => labels.null(),
            (lhs, rhs) => match (lhs.signs(), rhs.signs()) {
                (Some(lhs), Some(rhs)) => rhs.contains(lhs),
                _ => false,
            },
        }
    }

    /// Whether this value may be non-zero when used as a condition.
    pub fn may_be_true(&self) -> bool {
        match self {
            AbstractValue::Bottom => false,
            AbstractValue::Pointer(_) | AbstractValue::CodePointer(_) => true,
            AbstractValue::Undefined => true,
            value => value
                .signs()
                .map(|signs| signs.intersects(Signs::POS | Signs::NEG))
                .unwrap_or(true),
        }
    }

    /// Whether this value may be zero when used as a condition.
    pub fn may_be_false(&self) -> bool {
        match self {
            AbstractValue::Bottom => false,
            AbstractValue::Pointer(set) => set.null(),
            AbstractValue::CodePointer(labels) => labels.null(),
            AbstractValue::Undefined => true,
            value => value
                .signs()
                .map(|signs| signs.contains(Signs::ZERO))
                .unwrap_or(true),
        }
    }

    /// The truth value of a condition whose outcomes are given.
    pub fn truth(may_be_true: bool, may_be_false: bool) -> AbstractValue {
        match (may_be_true, may_be_false) {
            (true, false) => AbstractValue::Pos,
            (false, true) => AbstractValue::Zero,
            (true, true) => AbstractValue::PosOrZero,
            (false, false) => AbstractValue::Bottom,
        }
    }

    fn numeric(&self, other: &AbstractValue, f: fn(Signs, Signs) -> Signs) -> AbstractValue {
        if self.is_bottom() || other.is_bottom() {
            return AbstractValue::Bottom;
        }
        match (self.signs(), other.signs()) {
            (Some(lhs), Some(rhs)) => AbstractValue::from_signs(f(lhs, rhs)),
            _ => AbstractValue::Top,
        }
    }

    fn numeric_unary(&self, f: fn(Signs) -> Signs) -> AbstractValue {
        match self.signs() {
            Some(signs) => AbstractValue::from_signs(f(signs)),
            None => AbstractValue::Top,
        }
    }

    pub fn add(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::add)
    }

    pub fn sub(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::sub)
    }

    pub fn mul(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::mul)
    }

    pub fn div(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::div)
    }

    pub fn rem(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::rem)
    }

    pub fn shl(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::shl)
    }

    pub fn shr(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::shr)
    }

    pub fn bit_and(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::bit_and)
    }

    pub fn bit_or(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::bit_or)
    }

    pub fn bit_xor(&self, other: &AbstractValue) -> AbstractValue {
        self.numeric(other, Signs::bit_xor)
    }

    pub fn negate(&self) -> AbstractValue {
        self.numeric_unary(Signs::negate)
    }

    pub fn bit_not(&self) -> AbstractValue {
        self.numeric_unary(Signs::bit_not)
    }

    pub fn add_one(&self) -> AbstractValue {
        self.numeric_unary(Signs::add_one)
    }

    pub fn sub_one(&self) -> AbstractValue {
        self.numeric_unary(Signs::sub_one)
    }

    pub fn logical_not(&self) -> AbstractValue {
        AbstractValue::truth(self.may_be_false(), self.may_be_true())
    }

    /// Apply an arithmetic operator. Relational and logical operators are
    /// handled by `compare` and the evaluator.
    pub fn arithmetic(&self, op: BinaryOperator, other: &AbstractValue) -> AbstractValue {
        match op {
            BinaryOperator::Add => self.add(other),
            BinaryOperator::Sub => self.sub(other),
            BinaryOperator::Mul => self.mul(other),
            BinaryOperator::Div => self.div(other),
            BinaryOperator::Rem => self.rem(other),
            BinaryOperator::Shl => self.shl(other),
            BinaryOperator::Shr => self.shr(other),
            BinaryOperator::BitAnd => self.bit_and(other),
            BinaryOperator::BitOr => self.bit_or(other),
            BinaryOperator::BitXor => self.bit_xor(other),
            _ => self.compare(op, other),
        }
    }

    /// Evaluate a relational operator to `Pos` (definitely true), `Zero`
    /// (definitely false) or `PosOrZero`.
    pub fn compare(&self, op: BinaryOperator, other: &AbstractValue) -> AbstractValue {
        use AbstractValue::*;
        if self.is_bottom() || other.is_bottom() {
            return Bottom;
        }
        let (may_be_true, may_be_false) = match (self, other) {
            (Pointer(lhs), Pointer(rhs)) => compare_pointers(op, lhs, rhs),
            (Pointer(set), Zero) | (Zero, Pointer(set)) => match op {
                BinaryOperator::Eq => (set.null(), true),
                BinaryOperator::Ne => (true, set.null()),
                _ => (true, true),
            },
            (CodePointer(lhs), CodePointer(rhs)) => match op {
                BinaryOperator::Eq | BinaryOperator::Ne => {
                    let equal = lhs.len() == 1 && !lhs.null && lhs == rhs;
                    let disjoint =
                        lhs.labels.is_disjoint(&rhs.labels) && !(lhs.null && rhs.null);
                    let outcomes = (!disjoint, !equal);
                    if op == BinaryOperator::Eq {
                        outcomes
                    } else {
                        (outcomes.1, outcomes.0)
                    }
                }
                _ => (true, true),
            },
            (CodePointer(labels), Zero) | (Zero, CodePointer(labels)) => match op {
                BinaryOperator::Eq => (labels.null(), true),
                BinaryOperator::Ne => (true, labels.null()),
                _ => (true, true),
            },
            (lhs, rhs) => match (lhs.signs(), rhs.signs()) {
                (Some(lhs), Some(rhs)) => lhs.compare(op, rhs),
                _ => (true, true),
            },
        };
        AbstractValue::truth(may_be_true, may_be_false)
    }

    /// Narrow this value to the members for which `self op constant` may
    /// evaluate to `outcome`. `Bottom` means the outcome is impossible.
    pub fn restrict(&self, op: BinaryOperator, constant: i64, outcome: bool) -> AbstractValue {
        match self {
            AbstractValue::Pointer(set) if constant == 0 => {
                let equal = match op {
                    BinaryOperator::Eq => outcome,
                    BinaryOperator::Ne => !outcome,
                    _ => return self.clone(),
                };
                if equal {
                    if set.null() {
                        AbstractValue::Zero
                    } else {
                        AbstractValue::Bottom
                    }
                } else {
                    AbstractValue::pointer(set.clone().with_null(false))
                }
            }
            AbstractValue::CodePointer(labels) if constant == 0 => {
                let equal = match op {
                    BinaryOperator::Eq => outcome,
                    BinaryOperator::Ne => !outcome,
                    _ => return self.clone(),
                };
                if equal {
                    if labels.null() {
                        AbstractValue::Zero
                    } else {
                        AbstractValue::Bottom
                    }
                } else {
                    AbstractValue::code_pointer(labels.clone().with_null(false))
                }
            }
            value => match value.signs() {
                Some(signs) => AbstractValue::from_signs(signs.restrict(op, constant, outcome)),
                None => value.clone(),
            },
        }
    }

    /// Narrow this value to the members which are truthy, or falsy.
    pub fn restrict_truth(&self, outcome: bool) -> AbstractValue {
        self.restrict(BinaryOperator::Ne, 0, outcome)
    }
}

fn compare_pointers(op: BinaryOperator, lhs: &AddressSet, rhs: &AddressSet) -> (bool, bool) {
    if let (Some(lhs), Some(rhs)) = (lhs.single(), rhs.single()) {
        if lhs.base() == rhs.base() {
            if let (Some(lhs), Some(rhs)) = (lhs.offset().exact(), rhs.offset().exact()) {
                let result = match op {
                    BinaryOperator::Lt => lhs < rhs,
                    BinaryOperator::Le => lhs <= rhs,
                    BinaryOperator::Gt => lhs > rhs,
                    BinaryOperator::Ge => lhs >= rhs,
                    BinaryOperator::Eq => lhs == rhs,
                    BinaryOperator::Ne => lhs != rhs,
                    _ => return (true, true),
                };
                return (result, !result);
            }
        }
    }
    let may_be_equal = lhs.shares_base(rhs) || (lhs.null() && rhs.null());
    match op {
        BinaryOperator::Eq => (may_be_equal, true),
        BinaryOperator::Ne => (true, may_be_equal),
        _ => (true, true),
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbstractValue::Pointer(set) => {
                write!(f, "{{")?;
                for (i, address) in set.targets().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", address)?;
                }
                if set.null() {
                    if !set.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "null")?;
                }
                write!(f, "}}")
            }
            AbstractValue::CodePointer(labels) => {
                write!(f, "{{")?;
                for (i, label) in labels.labels().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "&{}", label)?;
                }
                if labels.null() {
                    if !labels.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "null")?;
                }
                write!(f, "}}")
            }
            value => write!(f, "{:?}", value),
        }
    }
}
