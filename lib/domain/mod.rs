//! The abstract value lattice.
//!
//! Integers are abstracted by their sign, data pointers by sets of addresses,
//! and function pointers by sets of function names. See [`AbstractValue`].

mod sign;
mod value;

pub use self::sign::Signs;
pub use self::value::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator::*;
    use crate::memory::{Address, Base, HeapInstance, Offset, Slot};
    use proptest::prelude::*;

    fn pointer(frame: usize, offset: Offset) -> AbstractValue {
        AbstractValue::address(Address::new(
            Base::stack(frame, Slot::Variable(1)),
            offset,
        ))
    }

    fn arb_value() -> impl Strategy<Value = AbstractValue> {
        prop_oneof![
            prop::sample::select(vec![
                AbstractValue::Bottom,
                AbstractValue::Undefined,
                AbstractValue::Zero,
                AbstractValue::Pos,
                AbstractValue::Neg,
                AbstractValue::PosOrZero,
                AbstractValue::NegOrZero,
                AbstractValue::Top,
            ]),
            (0..3usize, prop_oneof![Just(Offset::Unknown), (0..3i64).prop_map(Offset::Exact)])
                .prop_map(|(frame, offset)| pointer(frame, offset)),
            (0..2usize, any::<bool>()).prop_map(|(site, null)| {
                AbstractValue::Pointer(
                    AddressSet::singleton(Address::new(
                        Base::heap(site, HeapInstance::Recent),
                        Offset::Exact(0),
                    ))
                    .with_null(null),
                )
            }),
            (prop_oneof![Just("f"), Just("g")], any::<bool>()).prop_map(|(name, null)| {
                AbstractValue::CodePointer(LabelSet::singleton(name).with_null(null))
            }),
        ]
    }

    proptest! {
        #[test]
        fn join_commutative(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.join(&b), b.join(&a));
        }

        #[test]
        fn join_associative(a in arb_value(), b in arb_value(), c in arb_value()) {
            prop_assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        }

        #[test]
        fn join_idempotent(a in arb_value()) {
            prop_assert_eq!(a.join(&a), a.clone());
        }

        #[test]
        fn join_bounds(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.join(&AbstractValue::Top), AbstractValue::Top);
            prop_assert_eq!(a.join(&AbstractValue::Bottom), a.clone());
            prop_assert!(a.is_subset_of(&a.join(&b)));
            prop_assert!(b.is_subset_of(&a.join(&b)));
        }

        #[test]
        fn meet_below(a in arb_value(), b in arb_value()) {
            let meet = a.meet(&b);
            prop_assert!(meet.is_subset_of(&a));
            prop_assert!(meet.is_subset_of(&b));
        }
    }

    fn is_true(value: AbstractValue) -> bool {
        value.may_be_true() && !value.may_be_false()
    }

    fn is_false(value: AbstractValue) -> bool {
        !value.may_be_true() && value.may_be_false()
    }

    #[test]
    fn relational() {
        let p = AbstractValue::Pos;
        let n = AbstractValue::Neg;
        let z = AbstractValue::Zero;
        let b = AbstractValue::PosOrZero;
        let nb = AbstractValue::NegOrZero;

        assert!(is_true(n.compare(Lt, &b)));
        assert!(is_true(b.compare(Gt, &n)));
        assert!(is_true(n.compare(Le, &b)));
        assert!(is_true(b.compare(Ge, &n)));
        assert!(is_true(b.compare(Ne, &n)));
        assert!(is_false(b.compare(Eq, &n)));

        assert!(is_true(p.compare(Gt, &nb)));
        assert!(is_true(nb.compare(Lt, &p)));
        assert!(is_true(nb.compare(Le, &p)));
        assert!(is_true(p.compare(Ge, &nb)));
        assert!(is_false(nb.compare(Eq, &p)));

        assert!(is_true(nb.compare(Le, &b)));
        assert!(is_true(b.compare(Ge, &nb)));

        assert!(is_false(z.clone()));
        assert!(is_true(z.logical_not()));
        assert!(is_true(z.compare(Eq, &z)));

        assert_eq!(p.compare(Lt, &p), AbstractValue::PosOrZero);
    }

    #[test]
    fn canonical_signs() {
        assert_eq!(
            AbstractValue::Pos.join(&AbstractValue::Neg),
            AbstractValue::Top
        );
        assert_eq!(
            AbstractValue::Pos.join(&AbstractValue::Zero),
            AbstractValue::PosOrZero
        );
        assert_eq!(
            AbstractValue::Undefined.join(&AbstractValue::Neg),
            AbstractValue::Neg
        );
    }

    #[test]
    fn null_pointers() {
        let p = pointer(1, Offset::Exact(0));
        let joined = p.join(&AbstractValue::Zero);
        assert!(AbstractValue::Zero.is_subset_of(&joined));
        assert!(joined.may_be_false());
        assert_eq!(
            joined.restrict(Ne, 0, true),
            p
        );
        assert_eq!(joined.restrict(Eq, 0, true), AbstractValue::Zero);
        assert_eq!(
            AbstractValue::pointer(AddressSet::new().with_null(true)),
            AbstractValue::Zero
        );
        assert_eq!(
            AbstractValue::function("f").join(&AbstractValue::Pos),
            AbstractValue::Top
        );
    }

    #[test]
    fn null_function_pointers() {
        let f = AbstractValue::function("f");
        let joined = f.join(&AbstractValue::Zero);
        assert_eq!(
            joined,
            AbstractValue::CodePointer(LabelSet::singleton("f").with_null(true))
        );
        assert!(AbstractValue::Zero.is_subset_of(&joined));
        assert!(joined.may_be_true());
        assert!(joined.may_be_false());
        assert!(!f.may_be_false());
        assert_eq!(joined.restrict(Ne, 0, true), f);
        assert_eq!(joined.restrict(Eq, 0, true), AbstractValue::Zero);
        assert_eq!(f.restrict(Eq, 0, true), AbstractValue::Bottom);
        assert_eq!(joined.compare(Eq, &AbstractValue::Zero), AbstractValue::PosOrZero);
        assert_eq!(f.compare(Eq, &AbstractValue::Zero), AbstractValue::Zero);
        assert_eq!(joined.meet(&AbstractValue::Zero), AbstractValue::Zero);
        assert_eq!(format!("{}", joined), "{&f, null}");
    }

    #[test]
    fn offsets_widen() {
        let joined = pointer(1, Offset::Exact(0)).join(&pointer(1, Offset::Exact(4)));
        assert_eq!(joined, pointer(1, Offset::Unknown));
        assert!(pointer(1, Offset::Exact(8)).is_subset_of(&joined));
    }

    #[test]
    fn pointer_comparison() {
        let a = pointer(1, Offset::Exact(0));
        let b = pointer(1, Offset::Exact(4));
        let other = pointer(2, Offset::Exact(0));
        assert_eq!(a.compare(Lt, &b), AbstractValue::Pos);
        assert_eq!(a.compare(Eq, &other), AbstractValue::Zero);
        assert_eq!(a.compare(Eq, &AbstractValue::Zero), AbstractValue::Zero);
    }
}
