// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch audit trail: append-only SQLite log of every job outcome.
//
// Schema:
//   dispatch_audit(
//     id            INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp     TEXT    NOT NULL,   -- RFC 3339
//     job_id        TEXT    NOT NULL,
//     destination   TEXT    NOT NULL,
//     document_hash TEXT    NOT NULL,   -- SHA-256 hex digest
//     outcome       TEXT    NOT NULL,   -- "completed", "rejected", "timeout", ...
//     success       INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details       TEXT                -- spooler job id or failure reason
//   )
//
// Document bytes are never written here; the hash identifies them.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS dispatch_audit (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp     TEXT    NOT NULL,
    job_id        TEXT    NOT NULL,
    destination   TEXT    NOT NULL,
    document_hash TEXT    NOT NULL,
    outcome       TEXT    NOT NULL,
    success       INTEGER NOT NULL,
    details       TEXT
);
CREATE INDEX IF NOT EXISTS dispatch_audit_job ON dispatch_audit (job_id);";

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, job_id, destination, document_hash, outcome, success, details
     FROM dispatch_audit";

#[derive(Debug, Error)]
#[error("audit log error: {0}")]
pub struct AuditError(#[from] rusqlite::Error);

/// What the dispatcher hands over for one finished job.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub job_id: String,
    pub destination: String,
    pub document_hash: String,
    pub outcome: String,
    pub success: bool,
    pub details: Option<String>,
}

/// A stored audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub job_id: String,
    pub destination: String,
    pub document_hash: String,
    pub outcome: String,
    pub success: bool,
    pub details: Option<String>,
}

impl AuditEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            job_id: row.get(2)?,
            destination: row.get(3)?,
            document_hash: row.get(4)?,
            outcome: row.get(5)?,
            success: row.get::<_, i32>(6)? != 0,
            details: row.get(7)?,
        })
    }
}

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    ///
    /// WAL mode is enabled so operators can read the log while the service
    /// is writing to it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    #[instrument(skip_all, fields(job_id = %record.job_id, outcome = %record.outcome))]
    pub fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let timestamp = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO dispatch_audit
                (timestamp, job_id, destination, document_hash, outcome, success, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                timestamp,
                record.job_id,
                record.destination,
                record.document_hash,
                record.outcome,
                i32::from(record.success),
                record.details,
            ],
        )?;
        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one job, oldest first.
    pub fn entries_for_job(&self, job_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} WHERE job_id = ?1 ORDER BY id ASC"))?;
        let rows = stmt.query_map(params![job_id], AuditEntry::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit], AuditEntry::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<u64, AuditError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM dispatch_audit", [], |row| row.get(0))?)
    }
}
