use crate::ast::{NodeId, SourceLocation};
use crate::domain::AbstractValue;
use crate::error::*;
use crate::memory::{Address, FaultKind, Store};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// A memory access which may fault.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Fault {
    kind: FaultKind,
    function: String,
    location: SourceLocation,
    address: Option<Address>,
    store: Store,
}

impl Fault {
    pub fn new<S: Into<String>>(
        kind: FaultKind,
        function: S,
        location: SourceLocation,
        address: Option<Address>,
        store: Store,
    ) -> Fault {
        Fault {
            kind,
            function: function.into(),
            location,
            address,
            store,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The function the faulting access is in.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// The faulting address, when the access had one.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// The store just before the faulting access.
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn key(&self) -> FaultKey {
        (
            self.kind,
            self.function.clone(),
            self.location,
            self.address,
        )
    }
}

type FaultKey = (FaultKind, String, SourceLocation, Option<Address>);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// An access to shared memory inside an OpenMP construct.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Event {
    address: Address,
    value: AbstractValue,
    construct: NodeId,
    access: AccessKind,
    location: SourceLocation,
}

impl Event {
    pub fn new(
        address: Address,
        value: AbstractValue,
        construct: NodeId,
        access: AccessKind,
        location: SourceLocation,
    ) -> Event {
        Event {
            address,
            value,
            construct,
            access,
            location,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The value read, or written.
    pub fn value(&self) -> &AbstractValue {
        &self.value
    }

    /// The id of the innermost OpenMP construct.
    pub fn construct(&self) -> NodeId {
        self.construct
    }

    pub fn access(&self) -> AccessKind {
        self.access
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

/// A normal return from the entry function.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Terminal {
    value: AbstractValue,
    store: Store,
}

impl Terminal {
    pub fn new(value: AbstractValue, store: Store) -> Terminal {
        Terminal { value, store }
    }

    pub fn value(&self) -> &AbstractValue {
        &self.value
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn is_subset_of(&self, other: &Terminal) -> bool {
        self.value.is_subset_of(&other.value) && self.store.is_subset_of(&other.store)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum LimitKind {
    /// The step budget ran out.
    Fuel,
    /// A call was cut off at the maximum call depth, and returned `Top`.
    CallDepth,
}

/// A point where exploration gave up precision or coverage.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Limit {
    kind: LimitKind,
    function: String,
    location: SourceLocation,
}

impl Limit {
    pub fn new<S: Into<String>>(kind: LimitKind, function: S, location: SourceLocation) -> Limit {
        Limit {
            kind,
            function: function.into(),
            location,
        }
    }

    pub fn kind(&self) -> LimitKind {
        self.kind
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

/// A function which could not be analyzed.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Diagnostic {
    function: String,
    reason: String,
}

impl Diagnostic {
    pub fn new<S: Into<String>, T: Into<String>>(function: S, reason: T) -> Diagnostic {
        Diagnostic {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

fn serialize_values<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.values())
}

/// The results of an analysis.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Report {
    #[serde(serialize_with = "serialize_values")]
    faults: BTreeMap<FaultKey, Fault>,
    terminals: Vec<Terminal>,
    limits: BTreeSet<Limit>,
    malformed: BTreeSet<Diagnostic>,
    events: BTreeSet<Event>,
    steps: usize,
}

impl Report {
    /// Every distinct fault, ordered by kind, function, location and
    /// address.
    pub fn faults(&self) -> Vec<&Fault> {
        self.faults.values().collect()
    }

    pub fn faults_of(&self, kind: FaultKind) -> Vec<&Fault> {
        self.faults
            .values()
            .filter(|fault| fault.kind == kind)
            .collect()
    }

    pub fn has_fault(&self, kind: FaultKind) -> bool {
        self.faults.values().any(|fault| fault.kind == kind)
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn limits(&self) -> &BTreeSet<Limit> {
        &self.limits
    }

    /// Whether some part of the program was not fully explored.
    pub fn incomplete(&self) -> bool {
        !self.limits.is_empty()
    }

    pub fn malformed(&self) -> &BTreeSet<Diagnostic> {
        &self.malformed
    }

    pub fn events(&self) -> &BTreeSet<Event> {
        &self.events
    }

    /// The number of machine steps taken.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Record a fault. Only the first store seen for a fault is kept.
    pub(crate) fn add_fault(&mut self, fault: Fault) -> bool {
        let key = fault.key();
        if self.faults.contains_key(&key) {
            return false;
        }
        self.faults.insert(key, fault);
        true
    }

    /// Record a terminal state, unless one already recorded covers it.
    pub(crate) fn add_terminal(&mut self, terminal: Terminal) -> bool {
        if self
            .terminals
            .iter()
            .any(|existing| terminal.is_subset_of(existing))
        {
            return false;
        }
        self.terminals
            .retain(|existing| !existing.is_subset_of(&terminal));
        self.terminals.push(terminal);
        true
    }

    pub(crate) fn add_limit(&mut self, limit: Limit) -> bool {
        self.limits.insert(limit)
    }

    pub(crate) fn add_malformed(&mut self, diagnostic: Diagnostic) -> bool {
        self.malformed.insert(diagnostic)
    }

    pub(crate) fn add_event(&mut self, event: Event) -> bool {
        self.events.insert(event)
    }

    pub(crate) fn set_steps(&mut self, steps: usize) {
        self.steps = steps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Base, Block, Offset, Slot};

    #[test]
    fn faults_are_distinct() {
        let mut report = Report::default();
        let address = Address::new(Base::stack(1, Slot::Variable(2)), Offset::Exact(0));
        let fault = Fault::new(
            FaultKind::UninitializedRead,
            "main",
            SourceLocation::new(3, 4),
            Some(address),
            Store::new(),
        );
        assert!(report.add_fault(fault.clone()));
        assert!(!report.add_fault(fault));
        assert_eq!(report.faults().len(), 1);
        assert!(report.has_fault(FaultKind::UninitializedRead));
        assert!(!report.has_fault(FaultKind::OutOfBounds));
    }

    #[test]
    fn terminals_are_subsumed() {
        let mut report = Report::default();
        let mut store = Store::new();
        store.allocate(
            Base::stack(0, Slot::Variable(1)),
            Block::new(Some(4), AbstractValue::Zero),
        );
        assert!(report.add_terminal(Terminal::new(AbstractValue::Pos, store.clone())));
        assert!(!report.add_terminal(Terminal::new(AbstractValue::Pos, store.clone())));
        assert!(report.add_terminal(Terminal::new(AbstractValue::PosOrZero, store)));
        assert_eq!(report.terminals().len(), 1);
        assert_eq!(report.terminals()[0].value(), &AbstractValue::PosOrZero);
    }

    #[test]
    fn json() {
        let mut report = Report::default();
        report.add_malformed(Diagnostic::new("f", "unresolved label"));
        let json = report.to_json().unwrap();
        assert!(json.contains("unresolved label"));
    }
}
