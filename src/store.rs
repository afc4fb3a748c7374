use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    Poisoned,
}

/// Schema history, applied in order and tracked through `PRAGMA user_version`.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE resources (
        id INTEGER PRIMARY KEY,
        owner TEXT,
        name TEXT
    );",
    "CREATE TABLE owners (
        id INTEGER PRIMARY KEY,
        client_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    );
    INSERT INTO owners (client_id, name)
        SELECT DISTINCT owner, owner FROM resources WHERE owner IS NOT NULL;
    CREATE TABLE resources_v2 (
        id INTEGER PRIMARY KEY,
        owner_id INTEGER NOT NULL REFERENCES owners(id),
        name TEXT NOT NULL
    );
    INSERT INTO resources_v2 (id, owner_id, name)
        SELECT r.id, o.id, COALESCE(r.name, '')
        FROM resources r JOIN owners o ON o.client_id = r.owner;
    DROP TABLE resources;
    ALTER TABLE resources_v2 RENAME TO resources;",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: i64,
    pub owner: String,
    pub name: String,
}

/// The party a resource belongs to, keyed by the token subject.
#[derive(Debug, Clone)]
pub struct Owner<'a> {
    pub client_id: &'a str,
    pub name: &'a str,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens the database at `path` (`:memory:` for a private in-memory one)
    /// and brings the schema up to date.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let mut conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn list(&self) -> Result<Vec<Resource>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, o.client_id, r.name
             FROM resources r JOIN owners o ON o.id = r.owner_id
             ORDER BY r.id",
        )?;
        let rows = stmt.query_map([], row_to_resource)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        let conn = self.conn()?;
        Ok(select_one(&conn, id)?)
    }

    pub fn create(&self, owner: &Owner<'_>, name: &str) -> Result<Resource, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let owner_id = upsert_owner(&tx, owner)?;
        tx.execute(
            "INSERT INTO resources (owner_id, name) VALUES (?1, ?2)",
            params![owner_id, name],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Resource {
            id,
            owner: owner.client_id.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Renames the resource and hands it to `owner`. `None` when it does not exist.
    pub fn update(
        &self,
        id: i64,
        owner: &Owner<'_>,
        name: &str,
    ) -> Result<Option<Resource>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let owner_id = upsert_owner(&tx, owner)?;
        let changed = tx.execute(
            "UPDATE resources SET owner_id = ?1, name = ?2 WHERE id = ?3",
            params![owner_id, name, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let resource = select_one(&tx, id)?;
        tx.commit()?;
        Ok(resource)
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", (i + 1) as i64)?;
        tx.commit()?;
        tracing::info!("applied schema migration {}", i + 1);
    }
    Ok(())
}

fn upsert_owner(conn: &Connection, owner: &Owner<'_>) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO owners (client_id, name) VALUES (?1, ?2)
         ON CONFLICT(client_id) DO UPDATE SET name = excluded.name
         RETURNING id",
        params![owner.client_id, owner.name],
        |row| row.get(0),
    )
}

fn select_one(conn: &Connection, id: i64) -> Result<Option<Resource>, rusqlite::Error> {
    conn.query_row(
        "SELECT r.id, o.client_id, r.name
         FROM resources r JOIN owners o ON o.id = r.owner_id
         WHERE r.id = ?1",
        params![id],
        row_to_resource,
    )
    .optional()
}

fn row_to_resource(row: &rusqlite::Row<'_>) -> Result<Resource, rusqlite::Error> {
    Ok(Resource {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
    })
}
