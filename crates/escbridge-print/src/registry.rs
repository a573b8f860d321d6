// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry: the set of known printers and which one is active.
//
// Print requests that name no printer go to the active one. At most one record
// is active at any time; activation happens in a single transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::{PrinterId, PrinterRecord};

/// Storage for [`PrinterRecord`]s.
///
/// Writers take `&mut self`; share an implementation behind a mutex.
pub trait PrinterRegistry: Send {
    /// All printers, oldest first.
    fn list(&self) -> Result<Vec<PrinterRecord>>;

    fn get(&self, id: &PrinterId) -> Result<Option<PrinterRecord>>;

    /// Insert `record`, or replace the record with the same id. Saving an
    /// active record deactivates every other one.
    fn upsert(&mut self, record: &PrinterRecord) -> Result<()>;

    /// Delete a printer. Unknown ids are [`PrintError::PrinterNotFound`].
    fn remove(&mut self, id: &PrinterId) -> Result<()>;

    /// The active printer, if one is set.
    fn get_active(&self) -> Result<Option<PrinterRecord>>;

    /// Make `id` the only active printer and return its updated record.
    fn set_active(&mut self, id: &PrinterId) -> Result<PrinterRecord>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        port INTEGER NOT NULL,
        bridge_url TEXT,
        is_active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS printers_single_active
        ON printers (is_active) WHERE is_active = 1;
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, name, ip_address, port, bridge_url, is_active, created_at FROM printers";

/// Registry persisted in a SQLite database.
///
/// `rusqlite` is synchronous; from async code call it through
/// `tokio::task::spawn_blocking` or keep the calls short under a lock.
pub struct SqlitePrinterRegistry {
    conn: Connection,
}

impl SqlitePrinterRegistry {
    /// Open (or create) the registry database at `path`, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| PrintError::Registry(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PrintError::Registry(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| PrintError::Registry(format!("create table: {e}")))?;

        info!("printer registry opened");
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PrintError::Registry(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| PrintError::Registry(format!("create table: {e}")))?;

        debug!("in-memory printer registry opened");
        Ok(Self { conn })
    }

    fn query_one(&self, filter: &str, id: Option<&PrinterId>) -> Result<Option<PrinterRecord>> {
        let sql = format!("{SELECT_COLUMNS} {filter}");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| PrintError::Registry(format!("prepare: {e}")))?;

        let row = match id {
            Some(id) => stmt.query_row(params![id.to_string()], read_row),
            None => stmt.query_row([], read_row),
        }
        .optional()
        .map_err(|e| PrintError::Registry(format!("query: {e}")))?;

        row.map(StoredPrinter::into_record).transpose()
    }
}

impl PrinterRegistry for SqlitePrinterRegistry {
    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<PrinterRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at ASC");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| PrintError::Registry(format!("prepare list: {e}")))?;

        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| PrintError::Registry(format!("query list: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PrintError::Registry(format!("collect rows: {e}")))?;

        let records = rows
            .into_iter()
            .map(StoredPrinter::into_record)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = records.len(), "listed printers");
        Ok(records)
    }

    fn get(&self, id: &PrinterId) -> Result<Option<PrinterRecord>> {
        self.query_one("WHERE id = ?1", Some(id))
    }

    #[instrument(skip(self, record), fields(printer_id = %record.id))]
    fn upsert(&mut self, record: &PrinterRecord) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PrintError::Registry(format!("begin: {e}")))?;

        if record.is_active {
            tx.execute(
                "UPDATE printers SET is_active = 0 WHERE id != ?1",
                params![record.id.to_string()],
            )
            .map_err(|e| PrintError::Registry(format!("deactivate others: {e}")))?;
        }

        tx.execute(
            "INSERT INTO printers (id, name, ip_address, port, bridge_url, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 ip_address = excluded.ip_address,
                 port = excluded.port,
                 bridge_url = excluded.bridge_url,
                 is_active = excluded.is_active",
            params![
                record.id.to_string(),
                record.name,
                record.ip_address,
                record.port,
                record.bridge_url,
                record.is_active,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| PrintError::Registry(format!("upsert: {e}")))?;

        tx.commit()
            .map_err(|e| PrintError::Registry(format!("commit: {e}")))?;

        info!(name = %record.name, addr = %record.destination(), "printer saved");
        Ok(())
    }

    #[instrument(skip(self), fields(printer_id = %id))]
    fn remove(&mut self, id: &PrinterId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM printers WHERE id = ?1", params![id.to_string()])
            .map_err(|e| PrintError::Registry(format!("delete: {e}")))?;
        if rows == 0 {
            return Err(PrintError::PrinterNotFound(id.to_string()));
        }
        info!("printer removed");
        Ok(())
    }

    fn get_active(&self) -> Result<Option<PrinterRecord>> {
        self.query_one("WHERE is_active = 1", None)
    }

    #[instrument(skip(self), fields(printer_id = %id))]
    fn set_active(&mut self, id: &PrinterId) -> Result<PrinterRecord> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PrintError::Registry(format!("begin: {e}")))?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM printers WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| PrintError::Registry(format!("lookup: {e}")))?;
        if !exists {
            return Err(PrintError::PrinterNotFound(id.to_string()));
        }

        tx.execute("UPDATE printers SET is_active = 0 WHERE is_active = 1", [])
            .map_err(|e| PrintError::Registry(format!("deactivate: {e}")))?;
        tx.execute(
            "UPDATE printers SET is_active = 1 WHERE id = ?1",
            params![id.to_string()],
        )
        .map_err(|e| PrintError::Registry(format!("activate: {e}")))?;
        tx.commit()
            .map_err(|e| PrintError::Registry(format!("commit: {e}")))?;

        info!("printer activated");
        self.get(id)?
            .ok_or_else(|| PrintError::PrinterNotFound(id.to_string()))
    }
}

/// A row as stored, before the text columns are parsed.
struct StoredPrinter {
    id: String,
    name: String,
    ip_address: String,
    port: u16,
    bridge_url: Option<String>,
    is_active: bool,
    created_at: String,
}

/// Column order must match [`SELECT_COLUMNS`].
fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredPrinter> {
    Ok(StoredPrinter {
        id: row.get(0)?,
        name: row.get(1)?,
        ip_address: row.get(2)?,
        port: row.get(3)?,
        bridge_url: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl StoredPrinter {
    fn into_record(self) -> Result<PrinterRecord> {
        let id = PrinterId::parse(&self.id)
            .map_err(|e| PrintError::Registry(format!("stored id: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| PrintError::Registry(format!("stored created_at {:?}: {e}", self.created_at)))?
            .with_timezone(&Utc);
        Ok(PrinterRecord {
            id,
            name: self.name,
            ip_address: self.ip_address,
            port: self.port,
            bridge_url: self.bridge_url,
            is_active: self.is_active,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Registry held in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryPrinterRegistry {
    printers: Vec<PrinterRecord>,
}

impl InMemoryPrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrinterRegistry for InMemoryPrinterRegistry {
    fn list(&self) -> Result<Vec<PrinterRecord>> {
        let mut printers = self.printers.clone();
        printers.sort_by_key(|p| p.created_at);
        Ok(printers)
    }

    fn get(&self, id: &PrinterId) -> Result<Option<PrinterRecord>> {
        Ok(self.printers.iter().find(|p| p.id == *id).cloned())
    }

    fn upsert(&mut self, record: &PrinterRecord) -> Result<()> {
        if record.is_active {
            for printer in &mut self.printers {
                printer.is_active = false;
            }
        }
        match self.printers.iter_mut().find(|p| p.id == record.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = record.clone();
                existing.created_at = created_at;
            }
            None => self.printers.push(record.clone()),
        }
        Ok(())
    }

    fn remove(&mut self, id: &PrinterId) -> Result<()> {
        let before = self.printers.len();
        self.printers.retain(|p| p.id != *id);
        if self.printers.len() == before {
            return Err(PrintError::PrinterNotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_active(&self) -> Result<Option<PrinterRecord>> {
        Ok(self.printers.iter().find(|p| p.is_active).cloned())
    }

    fn set_active(&mut self, id: &PrinterId) -> Result<PrinterRecord> {
        if !self.printers.iter().any(|p| p.id == *id) {
            return Err(PrintError::PrinterNotFound(id.to_string()));
        }
        let mut activated = None;
        for printer in &mut self.printers {
            printer.is_active = printer.id == *id;
            if printer.is_active {
                activated = Some(printer.clone());
            }
        }
        activated.ok_or_else(|| PrintError::PrinterNotFound(id.to_string()))
    }
}
