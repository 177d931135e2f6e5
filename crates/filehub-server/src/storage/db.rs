//! Persistent store connector.
//!
//! The connector is created once per process and cloned into every component
//! that needs the database. Connecting never fails loudly: a failed attempt
//! leaves the connector in [`StoreState::Failed`] and every subsequent call
//! returns [`DatabaseError::Unavailable`], which callers can tell apart from
//! "no such record" or "zero records".

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use filehub_core::db::{DatabaseError, open_pool, open_pool_in_memory};

use super::queries::{Files, Users};
use super::queries_jobs::Jobs;

/// Connection lifecycle of the [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreState {
    Uninitialized = 0,
    Connecting = 1,
    Ready = 2,
    Failed = 3,
}

impl StoreState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }
}

struct StoreInner {
    state: AtomicU8,
    pool: RwLock<Option<Pool<Sqlite>>>,
}

/// Shared handle to the document store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create an unconnected store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: AtomicU8::new(StoreState::Uninitialized as u8),
                pool: RwLock::new(None),
            }),
        }
    }

    /// Open the store at `path`, migrating the schema.
    ///
    /// The returned store may be in the `Failed` state; check [`Store::is_alive`].
    pub async fn open(path: &Path) -> Self {
        let store = Self::new();
        store.connect(path).await;
        store
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> Self {
        let store = Self::new();
        store.connect_in_memory().await;
        store
    }

    /// Connect to the database file at `path`. Returns whether the store is alive.
    pub async fn connect(&self, path: &Path) -> bool {
        if !self.begin_connect() {
            return self.is_alive();
        }
        let result = match open_pool(path).await {
            Ok(pool) => migrate(pool).await,
            Err(e) => Err(e),
        };
        self.finish_connect(result)
    }

    /// Connect to a fresh in-memory database. Returns whether the store is alive.
    pub async fn connect_in_memory(&self) -> bool {
        if !self.begin_connect() {
            return self.is_alive();
        }
        let result = match open_pool_in_memory().await {
            Ok(pool) => migrate(pool).await,
            Err(e) => Err(e),
        };
        self.finish_connect(result)
    }

    /// Move to `Connecting` unless a connection is already established or in
    /// progress.
    fn begin_connect(&self) -> bool {
        let current = self.state();
        if matches!(current, StoreState::Ready | StoreState::Connecting) {
            return false;
        }
        self.inner
            .state
            .compare_exchange(
                current as u8,
                StoreState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish_connect(&self, result: Result<Pool<Sqlite>, DatabaseError>) -> bool {
        match result {
            Ok(pool) => {
                *self
                    .inner
                    .pool
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(pool);
                self.set_state(StoreState::Ready);
                info!("Store connection ready");
                true
            }
            Err(e) => {
                self.set_state(StoreState::Failed);
                warn!(error = %e, "Store connection failed");
                false
            }
        }
    }

    fn set_state(&self, state: StoreState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        StoreState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// True only when connected and the pool has not been closed.
    pub fn is_alive(&self) -> bool {
        self.state() == StoreState::Ready
            && self
                .inner
                .pool
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(|pool| !pool.is_closed())
    }

    pub(crate) fn pool(&self) -> Result<Pool<Sqlite>, DatabaseError> {
        if self.state() != StoreState::Ready {
            return Err(DatabaseError::Unavailable(format!(
                "store is {:?}",
                self.state()
            )));
        }
        self.inner
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|pool| !pool.is_closed())
            .cloned()
            .ok_or_else(|| DatabaseError::Unavailable("connection closed".into()))
    }

    /// Handle to the users collection.
    pub fn users(&self) -> Result<Users, DatabaseError> {
        self.pool().map(Users::new)
    }

    /// Handle to the files collection.
    pub fn files(&self) -> Result<Files, DatabaseError> {
        self.pool().map(Files::new)
    }

    /// Handle to the job table.
    pub fn jobs(&self) -> Result<Jobs, DatabaseError> {
        self.pool().map(Jobs::new)
    }

    /// Number of user records right now.
    pub async fn nb_users(&self) -> Result<i64, DatabaseError> {
        self.users()?.count().await
    }

    /// Number of file records right now.
    pub async fn nb_files(&self) -> Result<i64, DatabaseError> {
        self.files()?.count().await
    }

    /// Close the pool and return to `Uninitialized`.
    pub async fn close(&self) {
        let pool = self
            .inner
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.set_state(StoreState::Uninitialized);
        if let Some(pool) = pool {
            pool.close().await;
            info!("Store connection closed");
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

async fn migrate(pool: Pool<Sqlite>) -> Result<Pool<Sqlite>, DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    info!("Store migrations complete");
    Ok(pool)
}
