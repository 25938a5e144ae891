//! SQLite-backed persistence for the catalog and request history.
//!
//! One [`Connection`](rusqlite::Connection) behind a [`Mutex`], opened once
//! and shared by every method. `rusqlite` calls are synchronous, so each
//! method hops onto a blocking context via [`tokio::task::block_in_place`]
//! rather than holding the async executor hostage for the duration of a
//! query.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Mutex<rusqlite::Connection>>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path.as_ref())?;
        crate::schema::init(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        crate::schema::init(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}
