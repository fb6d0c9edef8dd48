//! The abstract memory model.
//!
//! Memory is a [`Store`], a map from [`Base`] to [`Block`]. Stack variables,
//! string literals and heap allocations each get their own block. Blocks
//! track their declared size, whether they were freed, and the abstract
//! values written at exact offsets.
//!
//! Heap allocations follow the recency abstraction: the most recent
//! allocation at a site is a concrete object which can be strongly updated,
//! and every older allocation is merged into one summary object for the site.

mod address;
mod block;
mod layout;
mod pointer;
mod store;

pub use self::address::*;
pub use self::block::*;
pub use self::layout::*;
pub use self::pointer::*;
pub use self::store::*;

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The undefined behaviors the analysis reports.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum FaultKind {
    /// An access extends beyond the object it points into.
    OutOfBounds,
    /// An access to a freed heap object, or to a stack object whose scope
    /// has ended.
    UseAfterFree,
    /// A read of memory which was never written.
    UninitializedRead,
    /// A dereference of null, an integer, or an unknown value.
    WildPointerDeref,
    /// A cast between code and data, or from an aggregate to a scalar.
    InvalidCast,
}

impl FaultKind {
    /// Whether the faulting branch stops. Out of bounds accesses continue
    /// with an unknown value.
    pub fn terminates(&self) -> bool {
        *self != FaultKind::OutOfBounds
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            FaultKind::OutOfBounds => "out of bounds access",
            FaultKind::UseAfterFree => "use after free",
            FaultKind::UninitializedRead => "uninitialized read",
            FaultKind::WildPointerDeref => "wild pointer dereference",
            FaultKind::InvalidCast => "invalid cast",
        };
        write!(f, "{}", s)
    }
}

/// Serialize a map as a sequence of pairs, for maps whose keys are not
/// strings.
pub(crate) fn serialize_pairs<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    K: Serialize,
    V: Serialize,
{
    serializer.collect_seq(map.iter())
}
