use crate::domain::AbstractValue;
use crate::memory::{serialize_pairs, Address, Base, Block, FaultKind, Fragment, HeapInstance, Liveness};
use crate::RC;
use log::trace;
use serde::Serialize;
use std::collections::BTreeMap;

/// The abstract store, a persistent map from bases to blocks.
///
/// Blocks are shared between stores until written, so cloning a `Store` is
/// cheap and never lets one state observe another's writes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Store {
    #[serde(serialize_with = "serialize_pairs")]
    blocks: BTreeMap<Base, RC<Block>>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn block(&self, base: &Base) -> Option<&Block> {
        self.blocks.get(base).map(|block| block.as_ref())
    }

    fn block_mut(&mut self, base: &Base) -> Option<&mut Block> {
        self.blocks.get_mut(base).map(RC::make_mut)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&Base, &Block)> {
        self.blocks.iter().map(|(base, block)| (base, block.as_ref()))
    }

    pub fn contains(&self, base: &Base) -> bool {
        self.blocks.contains_key(base)
    }

    /// Create, or replace, the block at `base`.
    pub fn allocate(&mut self, base: Base, block: Block) {
        self.blocks.insert(base, RC::new(block));
    }

    /// Remove a stack block whose scope has ended.
    pub fn retire(&mut self, base: &Base) {
        self.blocks.remove(base);
    }

    /// Remove every stack block of a returning frame.
    pub fn retire_frame(&mut self, frame: usize) {
        self.blocks.retain(|base, _| base.frame() != Some(frame));
    }

    /// Remove every stack block of frame `frame` and deeper.
    pub fn retire_frames_from(&mut self, frame: usize) {
        self.blocks
            .retain(|base, _| base.frame().map(|f| f < frame).unwrap_or(true));
    }

    /// Check that `width` bytes at `address` may be accessed.
    fn check(&self, address: &Address, width: u64) -> Result<&Block, FaultKind> {
        let block = match self.block(&address.base()) {
            Some(block) => block,
            None => return Err(FaultKind::UseAfterFree),
        };
        if block.liveness() == Liveness::Freed {
            return Err(FaultKind::UseAfterFree);
        }
        if !block.in_bounds(address.offset(), width) {
            return Err(FaultKind::OutOfBounds);
        }
        Ok(block)
    }

    /// Read a scalar of `width` bytes.
    pub fn load(&self, address: &Address, width: u64) -> Result<AbstractValue, FaultKind> {
        let value = self.check(address, width)?.read(address.offset(), width);
        if value.is_undefined() {
            return Err(FaultKind::UninitializedRead);
        }
        Ok(value)
    }

    /// Read `size` bytes of an aggregate.
    pub fn load_fragment(&self, address: &Address, size: u64) -> Result<Fragment, FaultKind> {
        Ok(self.check(address, size)?.fragment(address.offset(), size))
    }

    /// Write a scalar of `width` bytes.
    pub fn store(
        &mut self,
        address: &Address,
        width: u64,
        value: AbstractValue,
        strong: bool,
    ) -> Result<(), FaultKind> {
        self.check(address, width)?;
        if let Some(block) = self.block_mut(&address.base()) {
            block.write(address.offset(), width, value, strong);
        }
        Ok(())
    }

    /// Write an aggregate.
    pub fn store_fragment(
        &mut self,
        address: &Address,
        fragment: &Fragment,
        strong: bool,
    ) -> Result<(), FaultKind> {
        self.check(address, fragment.size())?;
        if let Some(block) = self.block_mut(&address.base()) {
            block.paste(address.offset(), fragment, strong);
        }
        Ok(())
    }

    pub fn set_liveness(&mut self, base: &Base, liveness: Liveness) {
        if let Some(block) = self.block_mut(base) {
            block.set_liveness(liveness);
        }
    }

    /// Make room for a new allocation at `site`: the current recent object,
    /// if any, is merged into the site's summary, and every pointer to it is
    /// redirected to the summary. Returns the renamed base when a fold
    /// happened.
    pub fn fold_recent(&mut self, site: usize) -> Option<(Base, Base)> {
        let recent = Base::heap(site, HeapInstance::Recent);
        let summary = Base::heap(site, HeapInstance::Summary);
        let block = self.blocks.remove(&recent)?;
        let merged = match self.blocks.get(&summary) {
            Some(existing) => existing.join(&block),
            None => block.as_ref().clone(),
        };
        self.blocks.insert(summary, RC::new(merged));
        self.rename(&recent, &summary);
        trace!("folded {} into {}", recent, summary);
        Some((recent, summary))
    }

    /// Redirect every pointer into `from` to `to`.
    pub fn rename(&mut self, from: &Base, to: &Base) {
        for block in self.blocks.values_mut() {
            if block.references(from) {
                RC::make_mut(block).map_values(|value| value.rename(from, to));
            }
        }
    }

    pub fn join(&self, other: &Store) -> Store {
        let mut blocks = self.blocks.clone();
        for (base, block) in &other.blocks {
            let joined = match blocks.get(base) {
                Some(existing) if RC::ptr_eq(existing, block) => continue,
                Some(existing) => RC::new(existing.join(block)),
                None => block.clone(),
            };
            blocks.insert(*base, joined);
        }
        Store { blocks }
    }

    /// The store order. A base missing from a store is below every block.
    pub fn is_subset_of(&self, other: &Store) -> bool {
        self.blocks.iter().all(|(base, block)| match other.blocks.get(base) {
            Some(other_block) => RC::ptr_eq(block, other_block) || block.is_subset_of(other_block),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Offset, Slot};

    fn recent(site: usize) -> Base {
        Base::heap(site, HeapInstance::Recent)
    }

    #[test]
    fn accesses_check_the_block() {
        let mut store = Store::new();
        let base = Base::stack(1, Slot::Variable(1));
        store.allocate(base, Block::new(Some(4), AbstractValue::Undefined));
        let address = Address::new(base, Offset::Exact(0));

        assert_eq!(store.load(&address, 4), Err(FaultKind::UninitializedRead));
        store.store(&address, 4, AbstractValue::Pos, true).unwrap();
        assert_eq!(store.load(&address, 4), Ok(AbstractValue::Pos));
        assert_eq!(
            store.load(&Address::new(base, Offset::Exact(2)), 4),
            Err(FaultKind::OutOfBounds)
        );

        store.retire(&base);
        assert_eq!(store.load(&address, 4), Err(FaultKind::UseAfterFree));
    }

    #[test]
    fn recency() {
        let mut store = Store::new();
        let holder = Base::stack(1, Slot::Variable(1));
        store.allocate(holder, Block::new(Some(8), AbstractValue::Undefined));
        store.allocate(recent(7), Block::new(Some(4), AbstractValue::Undefined));
        let pointer = AbstractValue::address(Address::new(recent(7), Offset::Exact(0)));
        store
            .store(&Address::new(holder, Offset::Exact(0)), 8, pointer, true)
            .unwrap();

        let (from, to) = store.fold_recent(7).unwrap();
        assert_eq!(from, recent(7));
        assert!(!store.contains(&recent(7)));
        assert!(store.contains(&to));
        let held = store.load(&Address::new(holder, Offset::Exact(0)), 8).unwrap();
        assert_eq!(
            held,
            AbstractValue::address(Address::new(to, Offset::Exact(0)))
        );
        assert!(store.fold_recent(7).is_none());
    }

    #[test]
    fn join_is_an_upper_bound() {
        let base = Base::stack(1, Slot::Variable(1));
        let mut lhs = Store::new();
        lhs.allocate(base, Block::new(Some(4), AbstractValue::Undefined));
        let mut rhs = lhs.clone();
        let address = Address::new(base, Offset::Exact(0));
        lhs.store(&address, 4, AbstractValue::Pos, true).unwrap();
        rhs.store(&address, 4, AbstractValue::Neg, true).unwrap();

        let joined = lhs.join(&rhs);
        assert!(lhs.is_subset_of(&joined));
        assert!(rhs.is_subset_of(&joined));
        assert!(!joined.is_subset_of(&lhs));
        assert_eq!(joined.load(&address, 4), Ok(AbstractValue::Top));
        assert!(Store::new().is_subset_of(&lhs));
    }
}
