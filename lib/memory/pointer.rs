//! Pointer arithmetic.

use crate::domain::{AbstractValue, AddressSet};
use crate::memory::{Address, Offset};

/// Move a pointer by `delta` bytes.
///
/// Every target shifts by the same delta. Moving the null pointer by a
/// non-zero amount yields no valid pointer, so null is dropped unless the
/// delta is exactly zero.
pub fn offset_pointer(pointer: &AbstractValue, delta: Offset) -> AbstractValue {
    match pointer {
        AbstractValue::Pointer(set) => {
            let moved = set
                .map(|address| Address::new(address.base(), address.offset().shift(delta)))
                .with_null(set.null() && delta == Offset::Exact(0));
            if moved.is_empty() {
                AbstractValue::Top
            } else {
                AbstractValue::pointer(moved)
            }
        }
        AbstractValue::Zero if delta == Offset::Exact(0) => AbstractValue::Zero,
        AbstractValue::Bottom => AbstractValue::Bottom,
        _ => AbstractValue::Top,
    }
}

/// The byte delta for adding `count` elements of `element_size` bytes.
pub fn scale(count: Option<i64>, count_value: &AbstractValue, element_size: Option<u64>) -> Offset {
    match (count, element_size) {
        (Some(count), Some(size)) => match i64::try_from(size)
            .ok()
            .and_then(|size| count.checked_mul(size))
        {
            Some(delta) => Offset::Exact(delta),
            None => Offset::Unknown,
        },
        _ if *count_value == AbstractValue::Zero => Offset::Exact(0),
        _ => Offset::Unknown,
    }
}

/// `lhs - rhs` for two pointers, in elements of `element_size` bytes.
///
/// The difference is only meaningful when both pointers point into the same
/// object. Then it is exact when both offsets are, and `Top` otherwise.
pub fn pointer_difference(
    lhs: &AbstractValue,
    rhs: &AbstractValue,
    element_size: Option<u64>,
) -> (AbstractValue, Option<i64>) {
    let (lhs, rhs) = match (lhs.addresses(), rhs.addresses()) {
        (Some(lhs), Some(rhs)) => (lhs, rhs),
        _ => return (AbstractValue::Top, None),
    };
    match (lhs.single(), rhs.single(), element_size) {
        (Some(lhs), Some(rhs), Some(size)) if lhs.base() == rhs.base() && size > 0 => {
            match (lhs.offset().exact(), rhs.offset().exact()) {
                (Some(lhs), Some(rhs)) => match lhs.checked_sub(rhs) {
                    Some(bytes) => {
                        let difference = bytes / size as i64;
                        (AbstractValue::of(difference), Some(difference))
                    }
                    None => (AbstractValue::Top, None),
                },
                _ => (AbstractValue::Top, None),
            }
        }
        _ => (AbstractValue::Top, None),
    }
}

/// The addresses of a pointer value, ignoring null.
pub fn targets(pointer: &AbstractValue) -> Vec<Address> {
    pointer
        .addresses()
        .map(|set: &AddressSet| set.targets().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Base, Slot};

    fn at(offset: i64) -> AbstractValue {
        AbstractValue::address(Address::new(
            Base::stack(1, Slot::Variable(3)),
            Offset::Exact(offset),
        ))
    }

    #[test]
    fn arithmetic() {
        assert_eq!(offset_pointer(&at(4), Offset::Exact(8)), at(12));
        assert_eq!(
            offset_pointer(&AbstractValue::Zero, Offset::Exact(4)),
            AbstractValue::Top
        );
        assert_eq!(scale(Some(3), &AbstractValue::Pos, Some(4)), Offset::Exact(12));
        assert_eq!(scale(None, &AbstractValue::Pos, Some(4)), Offset::Unknown);
        assert_eq!(scale(None, &AbstractValue::Zero, None), Offset::Exact(0));
    }

    #[test]
    fn difference() {
        assert_eq!(
            pointer_difference(&at(12), &at(4), Some(4)),
            (AbstractValue::Pos, Some(2))
        );
        let other = AbstractValue::address(Address::new(
            Base::stack(1, Slot::Variable(4)),
            Offset::Exact(0),
        ));
        assert_eq!(
            pointer_difference(&at(12), &other, Some(4)).0,
            AbstractValue::Top
        );
    }
}
