use std::cell::RefCell;

/// An index into a pattern's back-reference arena, assigned at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackRefSlot(pub usize);

/// Per-call storage for named bindings, replacing the reference
/// implementation's shared mutable `BackRef` holder (which relies on a
/// language with aliasable mutable references) with an arena of slots keyed
/// by index. The matcher mutates the arena exclusively; `NodeDescriptions`
/// only ever reads from it.
pub struct BackRefArena<T> {
    slots: Vec<RefCell<Vec<T>>>,
}

impl<T: Clone + PartialEq> BackRefArena<T> {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count).map(|_| RefCell::new(Vec::new())).collect(),
        }
    }

    pub fn push(&self, slot: BackRefSlot, node: T) {
        self.slots[slot.0].borrow_mut().push(node);
    }

    pub fn get(&self, slot: BackRefSlot) -> Vec<T> {
        self.slots[slot.0].borrow().clone()
    }

    pub fn contains(&self, slot: BackRefSlot, node: &T) -> bool {
        self.slots[slot.0].borrow().iter().any(|n| n == node)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_then_get_roundtrips() {
        let arena = BackRefArena::<i32>::new(2);
        arena.push(BackRefSlot(0), 1);
        arena.push(BackRefSlot(0), 2);
        arena.push(BackRefSlot(1), 99);
        assert_eq!(arena.get(BackRefSlot(0)), vec![1, 2]);
        assert_eq!(arena.get(BackRefSlot(1)), vec![99]);
    }

    #[test]
    fn contains_checks_membership() {
        let arena = BackRefArena::<i32>::new(1);
        arena.push(BackRefSlot(0), 7);
        assert!(arena.contains(BackRefSlot(0), &7));
        assert!(!arena.contains(BackRefSlot(0), &8));
    }
}
