use crate::ast::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a stack block holds.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Slot {
    /// A variable or parameter, named by its declaration.
    Variable(NodeId),
    /// The characters of a string literal.
    Literal(NodeId),
    /// A private copy of a variable made for an OpenMP construct, named by
    /// the construct and the original declaration.
    Private(NodeId, NodeId),
}

/// The recency abstraction of a heap allocation site.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HeapInstance {
    /// The most recent allocation, a single concrete object.
    Recent,
    /// Every older allocation from the same site.
    Summary,
}

/// The object an address points into.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Base {
    /// A stack slot. Frame `0` holds globals and string literals, the entry
    /// function runs in frame `1`, and each call adds one.
    Stack { frame: usize, slot: Slot },
    /// A heap object from the allocation site `site`.
    Heap { site: NodeId, instance: HeapInstance },
}

impl Base {
    pub fn stack(frame: usize, slot: Slot) -> Base {
        Base::Stack { frame, slot }
    }

    pub fn heap(site: NodeId, instance: HeapInstance) -> Base {
        Base::Heap { site, instance }
    }

    /// Whether this base names exactly one concrete object.
    pub fn is_singleton(&self) -> bool {
        !matches!(
            self,
            Base::Heap {
                instance: HeapInstance::Summary,
                ..
            }
        )
    }

    pub fn is_heap(&self) -> bool {
        matches!(self, Base::Heap { .. })
    }

    pub fn frame(&self) -> Option<usize> {
        match self {
            Base::Stack { frame, .. } => Some(*frame),
            Base::Heap { .. } => None,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Base::Stack {
                frame,
                slot: Slot::Variable(id),
            } => write!(f, "stack[{}].var{}", frame, id),
            Base::Stack {
                frame,
                slot: Slot::Literal(id),
            } => write!(f, "stack[{}].str{}", frame, id),
            Base::Stack {
                frame,
                slot: Slot::Private(construct, id),
            } => write!(f, "stack[{}].omp{}.var{}", frame, construct, id),
            Base::Heap {
                site,
                instance: HeapInstance::Recent,
            } => write!(f, "heap{}", site),
            Base::Heap {
                site,
                instance: HeapInstance::Summary,
            } => write!(f, "heap{}*", site),
        }
    }
}

/// A byte offset into an object.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Offset {
    Exact(i64),
    Unknown,
}

impl Offset {
    /// The least upper bound of two offsets. Different exact offsets join
    /// to `Unknown`.
    pub fn join(&self, other: &Offset) -> Offset {
        if self == other {
            *self
        } else {
            Offset::Unknown
        }
    }

    pub fn is_subset_of(&self, other: &Offset) -> bool {
        self == other || *other == Offset::Unknown
    }

    pub fn exact(&self) -> Option<i64> {
        match self {
            Offset::Exact(offset) => Some(*offset),
            Offset::Unknown => None,
        }
    }

    /// Shift this offset by `delta` bytes.
    pub fn shift(&self, delta: Offset) -> Offset {
        match (self, delta) {
            (Offset::Exact(lhs), Offset::Exact(rhs)) => match lhs.checked_add(rhs) {
                Some(offset) => Offset::Exact(offset),
                None => Offset::Unknown,
            },
            _ => Offset::Unknown,
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Offset::Exact(offset) => write!(f, "{}", offset),
            Offset::Unknown => write!(f, "?"),
        }
    }
}

/// A base and an offset within it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Address {
    base: Base,
    offset: Offset,
}

impl Address {
    pub fn new(base: Base, offset: Offset) -> Address {
        Address { base, offset }
    }

    pub fn base(&self) -> Base {
        self.base
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}+{}", self.base, self.offset)
    }
}
