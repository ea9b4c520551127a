use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::{Database, DbError};

use super::types::{Owner, Table, Watch};

impl Database {
    /// Create the monitor tables.
    pub fn create_monitor_tables(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        // One row per registered table; the watch list is stored as a
        // JSON array whose elements carry an explicit `kind` tag.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS watch_tables (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                reference TEXT NOT NULL,
                watches TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(owner, name),
                UNIQUE(owner, reference)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_watch_tables_owner
             ON watch_tables(owner)",
            [],
        )?;

        Ok(())
    }

    /// Replace the persisted tables of one owner inside a single
    /// transaction, so the stored state never holds a half-applied
    /// mutation.
    pub fn save_owner_tables(&self, owner: &str, tables: &[Table]) -> Result<(), DbError> {
        let mut conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp_millis();

        tx.execute("DELETE FROM watch_tables WHERE owner = ?1", [owner])?;
        for table in tables {
            let watches_json = serde_json::to_string(&table.watches)?;
            tx.execute(
                "INSERT INTO watch_tables (id, owner, name, reference, watches, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    owner,
                    table.name,
                    table.reference,
                    watches_json,
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load every owner's tables, grouped by owner.
    pub fn load_registry(&self) -> Result<Vec<(Owner, Vec<Table>)>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT owner, name, reference, watches
             FROM watch_tables
             ORDER BY owner, created_at, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut owners: Vec<(Owner, Vec<Table>)> = Vec::new();
        for row in rows {
            let (owner, name, reference, watches_json) = row?;
            let watches: Vec<Watch> = serde_json::from_str(&watches_json)?;
            let table = Table {
                reference,
                name,
                watches,
            };
            match owners.last_mut() {
                Some((last_owner, tables)) if *last_owner == owner => tables.push(table),
                _ => owners.push((owner, vec![table])),
            }
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::{Region, Snapshot, WatchKey};
    use super::*;

    fn watch(reference: &str, region: Region, snapshot: Option<Snapshot>) -> Watch {
        let mut watch = Watch::new(WatchKey {
            reference: reference.to_string(),
            worksheet_index: 1,
            region,
        });
        if let Some(snapshot) = snapshot {
            watch.observe(snapshot);
        }
        watch
    }

    fn table_with_all_kinds() -> Table {
        let mut table = Table::new("book.xlsx", "budget");
        for (region, snapshot) in [
            (
                Region::Cell {
                    address: "B3".to_string(),
                },
                Some(Snapshot::Cell(Some("42".to_string()))),
            ),
            (
                Region::Row { index: 2 },
                Some(Snapshot::Row(vec!["a".to_string(), "b".to_string()])),
            ),
            (
                Region::Column { index: 3 },
                Some(Snapshot::Column(vec!["c".to_string()])),
            ),
            (
                Region::Sheet,
                Some(Snapshot::Sheet(vec![vec!["d".to_string()]])),
            ),
        ] {
            table
                .add_watch(watch("book.xlsx", region, snapshot))
                .unwrap();
        }
        table
    }

    #[test]
    fn registry_round_trips_with_every_watch_kind() {
        let db = Database::open_in_memory().unwrap();
        db.create_monitor_tables().unwrap();

        let table = table_with_all_kinds();
        db.save_owner_tables("owner-1", std::slice::from_ref(&table))
            .unwrap();

        let loaded = db.load_registry().unwrap();
        assert_eq!(loaded.len(), 1);
        let (owner, tables) = &loaded[0];
        assert_eq!(owner, "owner-1");
        assert_eq!(tables, &vec![table]);
    }

    #[test]
    fn watch_without_snapshot_survives_a_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.create_monitor_tables().unwrap();

        let mut table = Table::new("book.xlsx", "budget");
        table
            .add_watch(watch("book.xlsx", Region::Row { index: 7 }, None))
            .unwrap();
        db.save_owner_tables("owner-1", &[table]).unwrap();

        let loaded = db.load_registry().unwrap();
        let restored = &loaded[0].1[0].watches[0];
        assert!(restored.last_snapshot.is_none());
        assert_eq!(restored.key.region, Region::Row { index: 7 });
    }

    #[test]
    fn save_replaces_an_owner_without_touching_others() {
        let db = Database::open_in_memory().unwrap();
        db.create_monitor_tables().unwrap();

        db.save_owner_tables(
            "owner-1",
            &[Table::new("a.xlsx", "alpha"), Table::new("b.xlsx", "beta")],
        )
        .unwrap();
        db.save_owner_tables("owner-2", &[Table::new("a.xlsx", "alpha")])
            .unwrap();

        // owner-1 deletes one table; owner-2 must be untouched.
        db.save_owner_tables("owner-1", &[Table::new("b.xlsx", "beta")])
            .unwrap();

        let loaded = db.load_registry().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, "owner-1");
        assert_eq!(loaded[0].1.len(), 1);
        assert_eq!(loaded[0].1[0].name, "beta");
        assert_eq!(loaded[1].0, "owner-2");
        assert_eq!(loaded[1].1[0].name, "alpha");
    }

    #[test]
    fn corrupt_watch_json_surfaces_as_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_monitor_tables().unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO watch_tables (id, owner, name, reference, watches, created_at, updated_at)
                 VALUES ('x', 'owner-1', 'budget', 'a.xlsx', 'not-json', 0, 0)",
                [],
            )
            .unwrap();
        }

        assert!(matches!(db.load_registry(), Err(DbError::Corrupt(_))));
    }
}
