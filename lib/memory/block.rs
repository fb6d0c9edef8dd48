use crate::domain::AbstractValue;
use crate::memory::{Base, Offset};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// The end of `width` bytes at `offset`, or `None` when it does not fit in
/// an `i64`.
fn checked_end(offset: i64, width: u64) -> Option<i64> {
    i64::try_from(width)
        .ok()
        .and_then(|width| offset.checked_add(width))
}

/// The end of `width` bytes at `offset`, saturating.
fn end_of(offset: i64, width: u64) -> i64 {
    checked_end(offset, width).unwrap_or(i64::MAX)
}

/// Whether a block may still be accessed.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Liveness {
    Live,
    /// Freed on some paths.
    MaybeFreed,
    /// Freed on every path.
    Freed,
}

impl Liveness {
    pub fn join(&self, other: &Liveness) -> Liveness {
        if self == other {
            *self
        } else {
            Liveness::MaybeFreed
        }
    }

    pub fn is_subset_of(&self, other: &Liveness) -> bool {
        self == other || *other == Liveness::MaybeFreed
    }
}

/// A value written at an exact offset, covering `width` bytes.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Cell {
    width: u64,
    value: AbstractValue,
}

impl Cell {
    pub fn new(width: u64, value: AbstractValue) -> Cell {
        Cell { width, value }
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn value(&self) -> &AbstractValue {
        &self.value
    }
}

/// The contents of a range of a block, used to copy structs and unions.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Fragment {
    size: u64,
    cells: BTreeMap<i64, Cell>,
    background: AbstractValue,
}

impl Fragment {
    /// A fragment whose every byte holds `value`.
    pub fn uniform(size: u64, value: AbstractValue) -> Fragment {
        Fragment {
            size,
            cells: BTreeMap::new(),
            background: value,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn cells(&self) -> &BTreeMap<i64, Cell> {
        &self.cells
    }

    pub fn background(&self) -> &AbstractValue {
        &self.background
    }

    /// The join of every value in this fragment.
    pub fn summary(&self) -> AbstractValue {
        self.cells
            .values()
            .fold(self.background.clone(), |value, cell| value.join(&cell.value))
    }

    pub fn map_values<F>(&mut self, f: &F)
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        for cell in self.cells.values_mut() {
            cell.value = f(&cell.value);
        }
        self.background = f(&self.background);
    }

    /// Cells and gaps covering the whole fragment, as `(offset, width,
    /// value)`.
    fn pieces(&self) -> Vec<(i64, u64, AbstractValue)> {
        let mut pieces = Vec::new();
        let mut position = 0;
        for (offset, cell) in &self.cells {
            if *offset > position {
                pieces.push((position, (*offset - position) as u64, self.background.clone()));
            }
            pieces.push((*offset, cell.width, cell.value.clone()));
            position = end_of(*offset, cell.width);
        }
        if (position as u64) < self.size {
            pieces.push((
                position,
                self.size - position as u64,
                self.background.clone(),
            ));
        }
        pieces
    }
}

/// The abstract contents of one object.
///
/// Values written at exact offsets are kept as cells. Bytes no cell covers
/// hold the background value, which is `Undefined` for fresh stack and heap
/// objects.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Block {
    size: Option<u64>,
    liveness: Liveness,
    cells: BTreeMap<i64, Cell>,
    background: AbstractValue,
}

impl Block {
    /// A live block of `size` bytes holding `background` everywhere.
    pub fn new(size: Option<u64>, background: AbstractValue) -> Block {
        Block {
            size,
            liveness: Liveness::Live,
            cells: BTreeMap::new(),
            background,
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn set_liveness(&mut self, liveness: Liveness) {
        self.liveness = liveness;
    }

    pub fn cells(&self) -> &BTreeMap<i64, Cell> {
        &self.cells
    }

    pub fn background(&self) -> &AbstractValue {
        &self.background
    }

    /// Whether `width` bytes at `offset` fit in this block.
    pub fn in_bounds(&self, offset: Offset, width: u64) -> bool {
        match offset {
            Offset::Exact(offset) => {
                offset >= 0
                    && match self.size {
                        Some(size) => (offset as u64)
                            .checked_add(width)
                            .map(|end| end <= size)
                            .unwrap_or(false),
                        None => checked_end(offset, width).is_some(),
                    }
            }
            Offset::Unknown => true,
        }
    }

    /// Offsets of the cells overlapping `[offset, offset + width)`.
    fn overlapping(&self, offset: i64, width: u64) -> Vec<i64> {
        self.cells
            .range(..end_of(offset, width))
            .filter(|(start, cell)| end_of(**start, cell.width) > offset)
            .map(|(start, _)| *start)
            .collect()
    }

    /// The value read from `width` bytes at an exact offset.
    fn value_at(&self, offset: i64, width: u64) -> AbstractValue {
        if let Some(cell) = self.cells.get(&offset) {
            if cell.width == width {
                return cell.value.clone();
            }
        }
        if self.overlapping(offset, width).is_empty() {
            self.background.clone()
        } else {
            debug!("read of {} bytes at {} overlaps differently shaped cells", width, offset);
            AbstractValue::Top
        }
    }

    /// Whether cells cover every byte of the block, so no byte holds the
    /// background.
    fn is_covered(&self) -> bool {
        let size = match self.size {
            Some(size) if !self.cells.is_empty() => size,
            _ => return false,
        };
        let mut position = 0;
        for (offset, cell) in &self.cells {
            if *offset != position {
                return false;
            }
            position = end_of(*offset, cell.width);
        }
        position as u64 >= size
    }

    /// The join of every value in this block.
    pub fn summary(&self) -> AbstractValue {
        let background = if self.is_covered() {
            AbstractValue::Bottom
        } else {
            self.background.clone()
        };
        self.cells
            .values()
            .fold(background, |value, cell| value.join(&cell.value))
    }

    /// Read `width` bytes. Reads at an unknown offset see every value in the
    /// block.
    pub fn read(&self, offset: Offset, width: u64) -> AbstractValue {
        match offset {
            Offset::Exact(offset) => self.value_at(offset, width),
            Offset::Unknown => self.summary(),
        }
    }

    /// Replace `[offset, offset + width)` with `value`. Bytes of displaced
    /// cells outside the range become `Top`.
    fn overwrite(&mut self, offset: i64, width: u64, value: AbstractValue) {
        let end = end_of(offset, width);
        for start in self.overlapping(offset, width) {
            if let Some(cell) = self.cells.remove(&start) {
                let cell_end = end_of(start, cell.width);
                if start < offset {
                    self.cells
                        .insert(start, Cell::new((offset - start) as u64, AbstractValue::Top));
                }
                if cell_end > end {
                    self.cells
                        .insert(end, Cell::new((cell_end - end) as u64, AbstractValue::Top));
                }
            }
        }
        self.cells.insert(offset, Cell::new(width, value));
    }

    /// Write `width` bytes. A strong write replaces what was there, a weak
    /// write joins with it. Writes at an unknown offset are always weak,
    /// and may reach any byte.
    pub fn write(&mut self, offset: Offset, width: u64, value: AbstractValue, strong: bool) {
        match offset {
            Offset::Exact(offset) => {
                if strong {
                    self.overwrite(offset, width, value);
                } else {
                    let joined = self.value_at(offset, width).join(&value);
                    self.overwrite(offset, width, joined);
                }
            }
            Offset::Unknown => {
                for cell in self.cells.values_mut() {
                    cell.value = cell.value.join(&value);
                }
                self.background = self.background.join(&value);
            }
        }
    }

    /// Copy `size` bytes starting at `offset`.
    pub fn fragment(&self, offset: Offset, size: u64) -> Fragment {
        let offset = match offset {
            Offset::Exact(offset) => offset,
            Offset::Unknown => return Fragment::uniform(size, self.summary()),
        };
        let end = end_of(offset, size);
        let mut cells = BTreeMap::new();
        for start in self.overlapping(offset, size) {
            let cell = &self.cells[&start];
            let cell_end = end_of(start, cell.width);
            if start >= offset && cell_end <= end {
                cells.insert(start - offset, cell.clone());
            } else {
                let clipped_start = start.max(offset);
                let clipped_end = cell_end.min(end);
                cells.insert(
                    clipped_start - offset,
                    Cell::new((clipped_end - clipped_start) as u64, AbstractValue::Top),
                );
            }
        }
        Fragment {
            size,
            cells,
            background: self.background.clone(),
        }
    }

    /// Write a fragment at `offset`.
    pub fn paste(&mut self, offset: Offset, fragment: &Fragment, strong: bool) {
        match offset {
            Offset::Exact(offset) => {
                for (start, width, value) in fragment.pieces() {
                    self.write(Offset::Exact(offset.saturating_add(start)), width, value, strong);
                }
            }
            Offset::Unknown => self.write(Offset::Unknown, 1, fragment.summary(), false),
        }
    }

    /// Replace every value with `f(value)`.
    pub fn map_values<F>(&mut self, f: F)
    where
        F: Fn(&AbstractValue) -> AbstractValue,
    {
        for cell in self.cells.values_mut() {
            cell.value = f(&cell.value);
        }
        self.background = f(&self.background);
    }

    pub fn references(&self, base: &Base) -> bool {
        let refers = |value: &AbstractValue| {
            value
                .addresses()
                .map(|set| set.contains_base(base))
                .unwrap_or(false)
        };
        refers(&self.background) || self.cells.values().any(|cell| refers(&cell.value))
    }

    pub fn join(&self, other: &Block) -> Block {
        let size = if self.size == other.size {
            self.size
        } else {
            None
        };

        // Sweep both sets of cells in order of offset, grouping cells which
        // overlap. A group of one cell from each side with the same shape
        // joins pointwise. A lone cell joins with the other side's
        // background. Anything else becomes Top over the group's range.
        let mut pieces: Vec<(i64, u64, bool)> = self
            .cells
            .iter()
            .map(|(offset, cell)| (*offset, cell.width, true))
            .chain(
                other
                    .cells
                    .iter()
                    .map(|(offset, cell)| (*offset, cell.width, false)),
            )
            .collect();
        pieces.sort();

        let mut cells = BTreeMap::new();
        let mut i = 0;
        while i < pieces.len() {
            let start = pieces[i].0;
            let mut end = end_of(start, pieces[i].1);
            let mut j = i + 1;
            while j < pieces.len() && pieces[j].0 < end {
                end = end.max(end_of(pieces[j].0, pieces[j].1));
                j += 1;
            }
            let group = &pieces[i..j];
            let width = (end - start) as u64;
            let value = match group {
                [(offset, width, from_self)] => {
                    let cell = if *from_self {
                        &self.cells[offset]
                    } else {
                        &other.cells[offset]
                    };
                    let background = if *from_self {
                        &other.background
                    } else {
                        &self.background
                    };
                    debug_assert_eq!(cell.width, *width);
                    cell.value.join(background)
                }
                [(lhs_offset, lhs_width, true), (rhs_offset, rhs_width, false)]
                | [(rhs_offset, rhs_width, false), (lhs_offset, lhs_width, true)]
                    if lhs_offset == rhs_offset && lhs_width == rhs_width =>
                {
                    self.cells[lhs_offset]
                        .value
                        .join(&other.cells[rhs_offset].value)
                }
                _ => AbstractValue::Top,
            };
            cells.insert(start, Cell::new(width, value));
            i = j;
        }

        Block {
            size,
            liveness: self.liveness.join(&other.liveness),
            cells,
            background: self.background.join(&other.background),
        }
    }

    pub fn is_subset_of(&self, other: &Block) -> bool {
        if !self.liveness.is_subset_of(&other.liveness) {
            return false;
        }
        if self.size != other.size && other.size.is_some() {
            return false;
        }
        if !self.background.is_subset_of(&other.background) {
            return false;
        }
        self.cells
            .iter()
            .chain(other.cells.iter())
            .all(|(offset, cell)| {
                self.value_at(*offset, cell.width)
                    .is_subset_of(&other.value_at(*offset, cell.width))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_block_is_undefined() {
        let block = Block::new(Some(8), AbstractValue::Undefined);
        assert_eq!(block.read(Offset::Exact(0), 4), AbstractValue::Undefined);
        assert!(block.in_bounds(Offset::Exact(4), 4));
        assert!(!block.in_bounds(Offset::Exact(5), 4));
        assert!(!block.in_bounds(Offset::Exact(-1), 1));
    }

    #[test]
    fn strong_and_weak_writes() {
        let mut block = Block::new(Some(8), AbstractValue::Undefined);
        block.write(Offset::Exact(0), 4, AbstractValue::Pos, true);
        block.write(Offset::Exact(0), 4, AbstractValue::Zero, false);
        assert_eq!(block.read(Offset::Exact(0), 4), AbstractValue::PosOrZero);
        block.write(Offset::Exact(0), 4, AbstractValue::Neg, true);
        assert_eq!(block.read(Offset::Exact(0), 4), AbstractValue::Neg);
        assert_eq!(block.read(Offset::Exact(4), 4), AbstractValue::Undefined);
    }

    #[test]
    fn punned_read_is_top() {
        let mut block = Block::new(Some(4), AbstractValue::Undefined);
        block.write(Offset::Exact(0), 4, AbstractValue::Pos, true);
        assert_eq!(block.read(Offset::Exact(0), 1), AbstractValue::Top);
        block.write(Offset::Exact(1), 1, AbstractValue::Zero, true);
        assert_eq!(block.read(Offset::Exact(0), 1), AbstractValue::Top);
        assert_eq!(block.read(Offset::Exact(1), 1), AbstractValue::Zero);
        assert_eq!(block.read(Offset::Exact(2), 2), AbstractValue::Top);
    }

    #[test]
    fn unknown_offsets() {
        let mut block = Block::new(None, AbstractValue::Undefined);
        block.write(Offset::Unknown, 4, AbstractValue::Pos, false);
        assert_eq!(block.read(Offset::Exact(12), 4), AbstractValue::Pos);
        block.write(Offset::Exact(0), 4, AbstractValue::Neg, true);
        assert_eq!(block.read(Offset::Unknown, 4), AbstractValue::Top);
    }

    #[test]
    fn offsets_near_the_end_of_memory() {
        let block = Block::new(None, AbstractValue::Undefined);
        assert!(!block.in_bounds(Offset::Exact(i64::MAX), 1));
        assert!(block.in_bounds(Offset::Exact(i64::MAX - 1), 1));
        assert_eq!(block.read(Offset::Exact(i64::MAX), 8), AbstractValue::Undefined);

        let mut block = Block::new(Some(8), AbstractValue::Undefined);
        assert!(!block.in_bounds(Offset::Exact(4), u64::MAX));
        block.write(Offset::Exact(0), 8, AbstractValue::Pos, true);
        assert_eq!(block.read(Offset::Exact(i64::MAX - 2), 4), AbstractValue::Undefined);
    }

    #[test]
    fn covered_blocks_hide_the_background() {
        let mut block = Block::new(Some(16), AbstractValue::Zero);
        block.write(Offset::Exact(0), 8, AbstractValue::function("f"), true);
        assert!(block.read(Offset::Unknown, 8).may_be_false());
        block.write(Offset::Exact(8), 8, AbstractValue::function("g"), true);
        assert_eq!(
            block.read(Offset::Unknown, 8),
            AbstractValue::function("f").join(&AbstractValue::function("g"))
        );
        assert!(!block.read(Offset::Unknown, 8).may_be_false());

        let mut gapped = Block::new(Some(16), AbstractValue::Zero);
        gapped.write(Offset::Exact(0), 4, AbstractValue::Pos, true);
        gapped.write(Offset::Exact(8), 8, AbstractValue::Pos, true);
        assert_eq!(gapped.summary(), AbstractValue::PosOrZero);
    }

    #[test]
    fn join_and_order() {
        let mut lhs = Block::new(Some(8), AbstractValue::Undefined);
        lhs.write(Offset::Exact(0), 4, AbstractValue::Pos, true);
        let mut rhs = Block::new(Some(8), AbstractValue::Undefined);
        rhs.write(Offset::Exact(0), 4, AbstractValue::Zero, true);
        rhs.write(Offset::Exact(2), 4, AbstractValue::Zero, true);

        let joined = lhs.join(&rhs);
        assert!(lhs.is_subset_of(&joined));
        assert!(rhs.is_subset_of(&joined));
        assert!(!joined.is_subset_of(&lhs));
        assert_eq!(joined.join(&joined), joined);

        let mut freed = lhs.clone();
        freed.set_liveness(Liveness::Freed);
        assert_eq!(lhs.join(&freed).liveness(), Liveness::MaybeFreed);
    }

    #[test]
    fn fragments() {
        let mut block = Block::new(Some(12), AbstractValue::Undefined);
        block.write(Offset::Exact(0), 8, AbstractValue::Neg, true);
        block.write(Offset::Exact(8), 4, AbstractValue::Pos, true);
        let fragment = block.fragment(Offset::Exact(0), 12);

        let mut copy = Block::new(Some(12), AbstractValue::Undefined);
        copy.paste(Offset::Exact(0), &fragment, true);
        assert_eq!(copy.read(Offset::Exact(0), 8), AbstractValue::Neg);
        assert_eq!(copy.read(Offset::Exact(8), 4), AbstractValue::Pos);
    }
}
