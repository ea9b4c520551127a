//! Per-owner store of tables, indexed by name and by reference.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::WatchError;

use super::types::{Owner, Table, TableKey};

/// Shared handle to one live table. Both indices (and the scheduler)
/// point at the same allocation, so they can never disagree about table
/// state, and table-scoped locking serializes ticks with foreground
/// mutation.
pub type SharedTable = Arc<Mutex<Table>>;

#[derive(Clone)]
struct TableEntry {
    name: String,
    reference: String,
    table: SharedTable,
}

#[derive(Default)]
struct OwnerTables {
    by_name: HashMap<String, TableEntry>,
    by_reference: HashMap<String, TableEntry>,
}

/// Two-way index of every owner's tables. Not internally locked; the
/// [`Monitor`](super::Monitor) holds it behind one mutex so both indices
/// always mutate together.
#[derive(Default)]
pub struct Registry {
    owners: HashMap<Owner, OwnerTables>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Check both uniqueness invariants without inserting. Lets the
    /// caller refuse duplicates before paying for a reachability probe.
    pub fn check_available(
        &self,
        owner: &str,
        name: &str,
        reference: &str,
    ) -> Result<(), WatchError> {
        if let Some(space) = self.owners.get(owner) {
            if space.by_name.contains_key(name) {
                return Err(WatchError::DuplicateName(name.to_string()));
            }
            if space.by_reference.contains_key(reference) {
                return Err(WatchError::DuplicateReference(reference.to_string()));
            }
        }
        Ok(())
    }

    /// Admit a table, updating both indices together.
    pub fn insert_table(&mut self, owner: &str, table: Table) -> Result<SharedTable, WatchError> {
        self.check_available(owner, &table.name, &table.reference)?;

        let entry = TableEntry {
            name: table.name.clone(),
            reference: table.reference.clone(),
            table: Arc::new(Mutex::new(table)),
        };
        let space = self.owners.entry(owner.to_string()).or_default();
        space.by_name.insert(entry.name.clone(), entry.clone());
        space
            .by_reference
            .insert(entry.reference.clone(), entry.clone());
        Ok(entry.table)
    }

    /// Drop a table from both indices, returning its name and handle.
    pub fn remove_table(
        &mut self,
        owner: &str,
        key: &TableKey,
    ) -> Result<(String, SharedTable), WatchError> {
        let not_found = || WatchError::TableNotFound(key.describe().to_string());
        let space = self.owners.get_mut(owner).ok_or_else(not_found)?;
        let entry = space.lookup(key).cloned().ok_or_else(not_found)?;

        space.by_name.remove(&entry.name);
        space.by_reference.remove(&entry.reference);
        if space.by_name.is_empty() {
            self.owners.remove(owner);
        }
        Ok((entry.name, entry.table))
    }

    pub fn get(&self, owner: &str, key: &TableKey) -> Option<SharedTable> {
        self.owners
            .get(owner)
            .and_then(|space| space.lookup(key))
            .map(|entry| entry.table.clone())
    }

    /// All of one owner's tables, ordered by name for stable listings.
    pub fn tables_of(&self, owner: &str) -> Vec<SharedTable> {
        let Some(space) = self.owners.get(owner) else {
            return Vec::new();
        };
        let mut entries: Vec<&TableEntry> = space.by_name.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.iter().map(|entry| entry.table.clone()).collect()
    }
}

impl OwnerTables {
    fn lookup(&self, key: &TableKey) -> Option<&TableEntry> {
        match key {
            TableKey::Name(name) => self.by_name.get(name),
            TableKey::Reference(reference) => self.by_reference.get(reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_and_reference_are_rejected_per_owner() {
        let mut registry = Registry::new();
        registry
            .insert_table("owner-1", Table::new("a.xlsx", "budget"))
            .unwrap();

        let err = registry
            .insert_table("owner-1", Table::new("b.xlsx", "budget"))
            .unwrap_err();
        assert!(matches!(err, WatchError::DuplicateName(name) if name == "budget"));

        let err = registry
            .insert_table("owner-1", Table::new("a.xlsx", "other"))
            .unwrap_err();
        assert!(matches!(err, WatchError::DuplicateReference(r) if r == "a.xlsx"));

        // A different owner may reuse both freely.
        registry
            .insert_table("owner-2", Table::new("a.xlsx", "budget"))
            .unwrap();
    }

    #[test]
    fn both_indices_resolve_the_same_table() {
        let mut registry = Registry::new();
        let inserted = registry
            .insert_table("owner-1", Table::new("a.xlsx", "budget"))
            .unwrap();

        let by_name = registry
            .get("owner-1", &TableKey::Name("budget".to_string()))
            .unwrap();
        let by_reference = registry
            .get("owner-1", &TableKey::Reference("a.xlsx".to_string()))
            .unwrap();
        assert!(Arc::ptr_eq(&inserted, &by_name));
        assert!(Arc::ptr_eq(&inserted, &by_reference));

        assert!(registry
            .get("owner-2", &TableKey::Name("budget".to_string()))
            .is_none());
    }

    #[test]
    fn removal_by_either_key_clears_both_indices() {
        let mut registry = Registry::new();
        registry
            .insert_table("owner-1", Table::new("a.xlsx", "budget"))
            .unwrap();

        let (name, _table) = registry
            .remove_table("owner-1", &TableKey::Reference("a.xlsx".to_string()))
            .unwrap();
        assert_eq!(name, "budget");

        assert!(registry
            .get("owner-1", &TableKey::Name("budget".to_string()))
            .is_none());
        let err = registry
            .remove_table("owner-1", &TableKey::Name("budget".to_string()))
            .unwrap_err();
        assert!(matches!(err, WatchError::TableNotFound(_)));
    }

    #[test]
    fn tables_of_lists_in_name_order() {
        let mut registry = Registry::new();
        registry
            .insert_table("owner-1", Table::new("b.xlsx", "zebra"))
            .unwrap();
        registry
            .insert_table("owner-1", Table::new("a.xlsx", "alpha"))
            .unwrap();

        let names: Vec<String> = registry
            .tables_of("owner-1")
            .iter()
            .map(|table| table.try_lock().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
        assert!(registry.tables_of("owner-2").is_empty());
    }
}
