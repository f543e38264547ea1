//! Tuples: one slot per table alias.
//!
//! A tuple is addressed by alias ordinal. A slot is either empty (the alias
//! has not contributed yet, or an outer join found no match), a single row,
//! or the list of tuples a populating join grouped under it.

use crate::row::Row;
use crate::value::Value;
use std::rc::Rc;

/// Content of one alias slot.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Slot {
    #[default]
    Empty,
    Row(Rc<Row>),
    Populated(Rc<[Tuple]>),
}

/// One logical record flowing through an operator tree.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Tuple {
    slots: Vec<Slot>,
    group: Option<Rc<[Tuple]>>,
}

impl Tuple {
    /// Creates a tuple with `width` empty slots.
    pub fn new(width: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; width],
            group: None,
        }
    }

    /// Creates a tuple holding a single row at `ordinal`.
    pub fn single(width: usize, ordinal: usize, row: Rc<Row>) -> Self {
        let mut tuple = Self::new(width.max(ordinal + 1));
        tuple.slots[ordinal] = Slot::Row(row);
        tuple
    }

    /// Creates a grouped tuple. Its slots are those of the first member, the
    /// members stay reachable through [`Tuple::group`].
    pub fn grouped(width: usize, members: Vec<Tuple>) -> Self {
        let mut tuple = members.first().cloned().unwrap_or_else(|| Tuple::new(width));
        tuple.group = Some(members.into());
        tuple
    }

    /// Number of slots.
    #[inline]
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot at `ordinal`. Out-of-range ordinals read as empty.
    pub fn slot(&self, ordinal: usize) -> &Slot {
        const EMPTY: &Slot = &Slot::Empty;
        self.slots.get(ordinal).unwrap_or(EMPTY)
    }

    /// Replaces the slot at `ordinal`, growing the tuple if needed.
    pub fn set_slot(&mut self, ordinal: usize, slot: Slot) {
        if ordinal >= self.slots.len() {
            self.slots.resize(ordinal + 1, Slot::Empty);
        }
        self.slots[ordinal] = slot;
    }

    /// Combines two tuples: every non-empty slot of `other` wins.
    pub fn merge(&self, other: &Tuple) -> Tuple {
        let width = self.width().max(other.width());
        let mut slots = Vec::with_capacity(width);
        for i in 0..width {
            match other.slot(i) {
                Slot::Empty => slots.push(self.slot(i).clone()),
                slot => slots.push(slot.clone()),
            }
        }
        Tuple {
            slots,
            group: other.group.clone().or_else(|| self.group.clone()),
        }
    }

    /// Returns the row for `ordinal`.
    ///
    /// A populated slot yields the row of its first member. When the slot is
    /// empty the lookup descends into populated slots, so aliases nested
    /// below a populating join stay addressable.
    pub fn row(&self, ordinal: usize) -> Option<&Rc<Row>> {
        match self.slot(ordinal) {
            Slot::Row(row) => Some(row),
            Slot::Populated(members) => members.first().and_then(|t| t.row(ordinal)),
            Slot::Empty => self.slots.iter().find_map(|slot| match slot {
                Slot::Populated(members) => members.first().and_then(|t| t.row(ordinal)),
                _ => None,
            }),
        }
    }

    /// Returns the populated members for `ordinal`.
    pub fn populated(&self, ordinal: usize) -> Option<&Rc<[Tuple]>> {
        match self.slot(ordinal) {
            Slot::Populated(members) => Some(members),
            _ => None,
        }
    }

    /// Returns the group members if this tuple was produced by a group-by.
    pub fn group(&self) -> Option<&Rc<[Tuple]>> {
        self.group.as_ref()
    }

    /// Reads a column of the row at `ordinal`.
    pub fn value(&self, ordinal: usize, column: &str) -> Option<&Value> {
        self.row(ordinal).and_then(|r| r.get_by_name(column))
    }

    /// Searches every row slot for `column`, first match wins. Used for
    /// references that could not be attributed to one alias.
    pub fn find_column(&self, column: &str) -> Option<&Value> {
        (0..self.slots.len()).find_map(|i| self.value(i, column))
    }

    /// Returns true when no slot holds anything.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| matches!(s, Slot::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, v: i32) -> Rc<Row> {
        Rc::new(Row::new(Row::columns_of(&[name]), vec![Value::Int32(v)]))
    }

    #[test]
    fn test_single_and_merge() {
        let a = Tuple::single(3, 1, row("id", 1));
        let b = Tuple::single(3, 2, row("ref", 7));
        let merged = a.merge(&b);
        assert_eq!(merged.value(1, "id"), Some(&Value::Int32(1)));
        assert_eq!(merged.value(2, "REF"), Some(&Value::Int32(7)));
        assert!(merged.row(0).is_none());
    }

    #[test]
    fn test_populated_reads_first_member() {
        let members: Rc<[Tuple]> = vec![
            Tuple::single(3, 2, row("v", 10)),
            Tuple::single(3, 2, row("v", 20)),
        ]
        .into();
        let mut outer = Tuple::single(3, 1, row("id", 1));
        outer.set_slot(2, Slot::Populated(members.clone()));
        assert_eq!(outer.value(2, "v"), Some(&Value::Int32(10)));
        assert_eq!(outer.populated(2).map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_find_column() {
        let t = Tuple::single(2, 0, row("a", 1)).merge(&Tuple::single(2, 1, row("b", 2)));
        assert_eq!(t.find_column("b"), Some(&Value::Int32(2)));
        assert_eq!(t.find_column("c"), None);
    }

    #[test]
    fn test_grouped() {
        let members = vec![Tuple::single(1, 0, row("a", 1)), Tuple::single(1, 0, row("a", 2))];
        let g = Tuple::grouped(1, members);
        assert_eq!(g.value(0, "a"), Some(&Value::Int32(1)));
        assert_eq!(g.group().map(|m| m.len()), Some(2));
        assert!(Tuple::new(2).is_empty());
    }
}
