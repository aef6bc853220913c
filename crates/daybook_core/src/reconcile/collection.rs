//! Insertion-ordered id → record mapping.

use crate::model::record::{Record, RecordId};
use std::collections::HashMap;

/// Ordered collection holding at most one record per id.
///
/// Replacing a record keeps its original position; removal shifts the
/// records after it. Sized for hundreds of records, not millions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCollection {
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|position| &self.records[*position])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.iter().map(|record| &record.id)
    }

    /// Inserts or replaces by id. Returns the replaced record.
    pub fn upsert(&mut self, record: Record) -> Option<Record> {
        match self.index.get(&record.id) {
            Some(position) => Some(std::mem::replace(&mut self.records[*position], record)),
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let position = self.index.remove(id)?;
        let removed = self.records.remove(position);
        for record in &self.records[position..] {
            if let Some(slot) = self.index.get_mut(&record.id) {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Moves the record at `from` to id `to`, in place.
    ///
    /// Returns `false` when `from` is absent or `to` is already taken.
    pub fn rekey(&mut self, from: &RecordId, to: &RecordId) -> bool {
        if self.index.contains_key(to) {
            return false;
        }
        let Some(position) = self.index.remove(from) else {
            return false;
        };
        self.records[position].id = to.clone();
        self.index.insert(to.clone(), position);
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::RecordCollection;
    use crate::model::record::{Record, RecordId, RecordKind};

    fn record(id: &str) -> Record {
        Record::blank(RecordId::from(id), RecordKind::Task, "u1", 0)
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut collection = RecordCollection::new();
        collection.upsert(record("a"));
        collection.upsert(record("b"));
        let mut newer = record("a");
        newer.name = "renamed".to_string();
        assert!(collection.upsert(newer).is_some());

        let names: Vec<&str> = collection.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["renamed", "Untitled Task"]);
    }

    #[test]
    fn remove_keeps_index_consistent() {
        let mut collection = RecordCollection::new();
        for id in ["a", "b", "c"] {
            collection.upsert(record(id));
        }
        collection.remove(&RecordId::from("a")).unwrap();
        assert_eq!(collection.get(&RecordId::from("c")).unwrap().id.as_str(), "c");
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn rekey_refuses_taken_ids() {
        let mut collection = RecordCollection::new();
        collection.upsert(record("a"));
        collection.upsert(record("b"));
        assert!(!collection.rekey(&RecordId::from("a"), &RecordId::from("b")));
        assert!(collection.rekey(&RecordId::from("a"), &RecordId::from("z")));
        assert_eq!(collection.as_slice()[0].id.as_str(), "z");
        assert!(!collection.contains(&RecordId::from("a")));
    }
}
