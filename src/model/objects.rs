use std::fmt;

use serde::Serialize;

use crate::loader::ObjectHandle;

/// Pole indices below this are built-in defaults that route files may not replace.
pub const POLE_GUARD: usize = 3;

/// Why an `add` was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    NegativeIndex(i64),
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::NegativeIndex(i) => write!(f, "index {i} is negative"),
        }
    }
}

/// Result of a successful `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Stored,
    /// The slot holds a protected default and the guard kept it.
    Kept,
}

/// Index → resource table with last-writer-wins semantics.
///
/// Backed by a growable vector of optional slots plus a parallel protection
/// bitset. A slot can hold `None` when the loader could not produce the
/// resource; lookups then yield nothing and consumers omit it.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDictionary<T = ObjectHandle> {
    slots: Vec<Option<T>>,
    #[serde(skip)]
    protected: Vec<bool>,
}

impl<T> Default for ObjectDictionary<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            protected: Vec::new(),
        }
    }
}

impl<T> ObjectDictionary<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `index`.
    ///
    /// With `guard = Some(n)`, a protected slot below `n` keeps its default.
    /// Without a guard every write replaces the slot, protected or not.
    pub fn add(&mut self, index: i64, value: Option<T>, guard: Option<usize>) -> Result<AddOutcome, SlotError> {
        let slot = usize::try_from(index).map_err(|_| SlotError::NegativeIndex(index))?;
        if let Some(limit) = guard {
            if slot < limit && self.is_protected(slot) {
                return Ok(AddOutcome::Kept);
            }
        }
        self.ensure(slot);
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = value;
        }
        if let Some(flag) = self.protected.get_mut(slot) {
            *flag = false;
        }
        Ok(AddOutcome::Stored)
    }

    /// Install a built-in default and mark it protected.
    pub fn insert_default(&mut self, slot: usize, value: T) {
        self.ensure(slot);
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(value);
        }
        if let Some(flag) = self.protected.get_mut(slot) {
            *flag = true;
        }
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// True when `slot` holds a loaded value. A slot whose load failed is not
    /// declared.
    pub fn is_declared(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    pub fn is_protected(&self, slot: usize) -> bool {
        self.protected.get(slot).copied().unwrap_or(false)
    }

    /// One past the highest slot ever written.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    fn ensure(&mut self, slot: usize) {
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
            self.protected.resize(slot + 1, false);
        }
    }
}

/// Ordered list of base structure indices used round-robin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    members: Vec<usize>,
}

impl Cycle {
    /// `None` for an empty member list.
    pub fn new(members: Vec<usize>) -> Option<Self> {
        (!members.is_empty()).then_some(Self { members })
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Member for the `repeat`th placement.
    pub fn resolve(&self, repeat: usize) -> usize {
        self.members
            .get(repeat % self.members.len())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn handle(id: u32) -> ObjectHandle {
        ObjectHandle {
            id,
            path: PathBuf::from(format!("/obj/{id}.csv")),
            is_static: false,
        }
    }

    #[test]
    fn last_writer_wins() {
        let mut dict = ObjectDictionary::new();
        dict.add(4, Some(handle(1)), None).unwrap();
        dict.add(4, Some(handle(2)), None).unwrap();
        assert_eq!(dict.get(4).unwrap().id, 2);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.capacity(), 5);
    }

    #[test]
    fn failed_load_clears_slot() {
        let mut dict = ObjectDictionary::new();
        dict.add(0, Some(handle(1)), None).unwrap();
        dict.add(0, None, None).unwrap();
        assert!(dict.get(0).is_none());
        assert!(!dict.is_declared(0));
    }

    #[test]
    fn negative_index_rejected() {
        let mut dict: ObjectDictionary = ObjectDictionary::new();
        assert_eq!(
            dict.add(-1, Some(handle(1)), None),
            Err(SlotError::NegativeIndex(-1))
        );
        assert!(dict.is_empty());
    }

    #[test]
    fn guard_keeps_protected_defaults() {
        let mut dict = ObjectDictionary::new();
        for i in 0..POLE_GUARD {
            dict.insert_default(i, handle(100 + i as u32));
        }
        for i in 0..POLE_GUARD {
            let outcome = dict.add(i as i64, Some(handle(1)), Some(POLE_GUARD)).unwrap();
            assert_eq!(outcome, AddOutcome::Kept);
            assert_eq!(dict.get(i).unwrap().id, 100 + i as u32);
        }
        let outcome = dict.add(3, Some(handle(7)), Some(POLE_GUARD)).unwrap();
        assert_eq!(outcome, AddOutcome::Stored);
        assert_eq!(dict.get(3).unwrap().id, 7);
    }

    #[test]
    fn unguarded_write_replaces_defaults() {
        let mut dict = ObjectDictionary::new();
        dict.insert_default(1, handle(100));
        dict.add(1, Some(handle(5)), None).unwrap();
        assert_eq!(dict.get(1).unwrap().id, 5);
        assert!(!dict.is_protected(1));
    }

    #[test]
    fn cycle_resolves_round_robin() {
        let cycle = Cycle::new(vec![3, 5, 9]).unwrap();
        let picked: Vec<usize> = (0..7).map(|n| cycle.resolve(n)).collect();
        assert_eq!(picked, vec![3, 5, 9, 3, 5, 9, 3]);
        assert!(Cycle::new(Vec::new()).is_none());
    }
}
