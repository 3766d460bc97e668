//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Subsystems call store methods. They never execute SQL directly.
//!
//! One `CivicStore` wraps one connection. Concurrent callers open their own
//! store on the same database; read-modify-write sequences go through
//! `immediate()`, which takes SQLite's write lock up front so two
//! transitions on the same complaint cannot interleave.

mod complaint;
mod evidence;
mod history;
mod identity;
mod support;

pub use evidence::NewImageRow;

use crate::error::{CivicError, CivicResult};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::time::Duration;

pub struct CivicStore {
    conn: Connection,
    path: Option<String>, // None for a private :memory: database
    busy_timeout: Duration,
}

impl CivicStore {
    pub fn open(path: &str) -> CivicResult<Self> {
        Self::open_with_timeout(path, Duration::from_millis(5_000))
    }

    pub fn open_with_timeout(path: &str, busy_timeout: Duration) -> CivicResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(busy_timeout)?;
        // Memory databases answer "memory" instead of switching.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            busy_timeout,
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> CivicResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            busy_timeout: Duration::from_millis(5_000),
        })
    }

    /// Open a named in-memory database that every connection opened with
    /// the same name shares. It lives as long as one connection is open.
    pub fn shared_memory(name: &str, busy_timeout: Duration) -> CivicResult<Self> {
        Self::open_with_timeout(&format!("file:{name}?mode=memory&cache=shared"), busy_timeout)
    }

    /// Open another connection to the same database.
    /// A private in-memory database cannot be shared, so it yields a fresh one.
    pub fn reopen(&self) -> CivicResult<Self> {
        match &self.path {
            Some(p) => Self::open_with_timeout(p, self.busy_timeout),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Safe to run more than once.
    pub fn migrate(&self) -> CivicResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_identity.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_complaints.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_evidence.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_support.sql"))?;
        Ok(())
    }

    /// Run `f` inside an IMMEDIATE transaction. Commits if `f` returns Ok,
    /// rolls back otherwise.
    pub fn immediate<T, F>(&self, f: F) -> CivicResult<T>
    where
        F: FnOnce(&Self) -> CivicResult<T>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Raw connection access for tests that need to poke the schema.
    #[doc(hidden)]
    pub fn raw_execute(&self, sql: &str) -> CivicResult<usize> {
        self.conn.execute(sql, []).map_err(Into::into)
    }
}

/// True if `err` is a UNIQUE / PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Map a `query_row` miss to a typed not-found error.
pub(crate) fn not_found_as(
    entity: &'static str,
    id: impl ToString,
) -> impl FnOnce(rusqlite::Error) -> CivicError {
    move |err| match err {
        rusqlite::Error::QueryReturnedNoRows => CivicError::not_found(entity, id),
        other => other.into(),
    }
}

/// SQLite has no boolean type.
pub(crate) fn flag(b: bool) -> i32 {
    i32::from(b)
}
