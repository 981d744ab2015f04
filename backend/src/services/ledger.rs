//! Session scan ledger and per-operation scan serialization
//!
//! The ledger is an ordered, per-transfer list of identifiers accepted in the
//! current scanning session. It caches what the persisted lines already say
//! and can always be rebuilt from them, so losing it (restart, idle expiry,
//! another worker) only costs a resync.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use shared::LotKey;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::ScanContext;
use crate::error::AppResult;

#[derive(Debug)]
struct LedgerSession {
    entries: Vec<LotKey>,
    last_used: Instant,
}

impl LedgerSession {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            last_used: Instant::now(),
        }
    }
}

/// Ordered accepted identifiers, one session per transfer operation
#[derive(Debug)]
pub struct ScanLedger {
    sessions: RwLock<HashMap<Uuid, LedgerSession>>,
    idle_timeout: Duration,
}

impl ScanLedger {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Start or continue the session for `operation_id`.
    ///
    /// Returns true when a new session was started, either because none
    /// existed or because the previous one sat idle past the timeout. The
    /// caller is expected to resync a new session.
    ///
    /// Sessions of other operations that went idle are dropped on the way.
    pub async fn open(&self, operation_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let had_session = sessions.contains_key(&operation_id);
        sessions.retain(|_, s| s.last_used.elapsed() <= self.idle_timeout);

        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "Dropped idle scan sessions");
        }

        match sessions.get_mut(&operation_id) {
            Some(session) => {
                session.last_used = Instant::now();
                false
            }
            None => {
                if had_session {
                    tracing::debug!(%operation_id, "Scan session expired, starting over");
                }
                sessions.insert(operation_id, LedgerSession::new());
                true
            }
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Append `key` unless already present; returns whether it was added
    pub async fn append(&self, operation_id: Uuid, key: LotKey) -> bool {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(operation_id).or_insert_with(LedgerSession::new);
        session.last_used = Instant::now();
        if session.entries.contains(&key) {
            return false;
        }
        session.entries.push(key);
        true
    }

    pub async fn contains(&self, operation_id: Uuid, key: &LotKey) -> bool {
        self.sessions
            .read()
            .await
            .get(&operation_id)
            .map_or(false, |s| s.entries.contains(key))
    }

    /// Remove `key`; returns whether it was present
    pub async fn remove(&self, operation_id: Uuid, key: &LotKey) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&operation_id) else {
            return false;
        };
        let before = session.entries.len();
        session.entries.retain(|k| k != key);
        session.entries.len() != before
    }

    /// Entries in acceptance order
    pub async fn snapshot(&self, operation_id: Uuid) -> Vec<LotKey> {
        self.sessions
            .read()
            .await
            .get(&operation_id)
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    /// Append every key not yet present, keeping existing entries where they
    /// are. Returns the keys that were added.
    pub async fn merge<I>(&self, operation_id: Uuid, keys: I) -> Vec<LotKey>
    where
        I: IntoIterator<Item = LotKey>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(operation_id).or_insert_with(LedgerSession::new);
        session.last_used = Instant::now();

        let mut added = Vec::new();
        for key in keys {
            if !session.entries.contains(&key) {
                session.entries.push(key.clone());
                added.push(key);
            }
        }
        added
    }

    /// Drop entries not in `backed`; returns the dropped keys
    pub async fn retain(&self, operation_id: Uuid, backed: &BTreeSet<LotKey>) -> Vec<LotKey> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&operation_id) else {
            return Vec::new();
        };
        let (kept, dropped): (Vec<LotKey>, Vec<LotKey>) =
            session.entries.drain(..).partition(|k| backed.contains(k));
        session.entries = kept;
        dropped
    }

    /// End the session (finalize, cancel)
    pub async fn clear(&self, operation_id: Uuid) {
        self.sessions.write().await.remove(&operation_id);
    }
}

/// One async mutex per transfer operation.
///
/// Scans and line edits for the same operation run strictly one after the
/// other; different operations never wait on each other. An entry lives only
/// while some caller holds or waits for it.
#[derive(Debug, Default)]
pub struct OperationLocks {
    locks: Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

type LockMap = HashMap<Uuid, Arc<Mutex<()>>>;

fn lock_map(locks: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    // Each critical section is a single insert, lookup or remove, so a
    // poisoned map is still consistent
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, operation_id: Uuid) -> OperationGuard {
        let lock = lock_map(&self.locks).entry(operation_id).or_default().clone();
        let guard = lock.lock_owned().await;
        OperationGuard {
            guard: Some(guard),
            operation_id,
            locks: self.locks.clone(),
        }
    }

    /// Operations with a lock currently held or awaited
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

/// Held lock on one operation; the map entry goes away with the last holder
#[derive(Debug)]
pub struct OperationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    operation_id: Uuid,
    locks: Arc<StdMutex<LockMap>>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        // Only the map still points at the mutex: nobody holds or waits for it
        if locks
            .get(&self.operation_id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.operation_id);
        }
    }
}

/// Ledger maintenance against persisted state
#[derive(Clone)]
pub struct LedgerService {
    ctx: ScanContext,
}

impl LedgerService {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Rebuild missing entries from persisted accepted lines
    pub async fn resync(&self, operation_id: Uuid) -> AppResult<Vec<LotKey>> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;
        self.ctx.ledger.open(operation_id).await;
        resync_locked(&self.ctx, operation_id).await?;
        Ok(self.ctx.ledger.snapshot(operation_id).await)
    }

    /// Remove entries no accepted persisted line backs
    pub async fn prune(&self, operation_id: Uuid) -> AppResult<Vec<LotKey>> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        self.ctx.load_open(operation_id).await?;
        prune_locked(&self.ctx, operation_id).await
    }

    /// Current ledger contents, rebuilding an expired or missing session first.
    ///
    /// A closed operation has no session and none is started for it.
    pub async fn snapshot(&self, operation_id: Uuid) -> AppResult<Vec<LotKey>> {
        let _guard = self.ctx.locks.acquire(operation_id).await;
        let operation = self.ctx.store.load_operation(operation_id).await?;
        if !operation.is_open() {
            return Ok(Vec::new());
        }
        ensure_session(&self.ctx, operation_id).await?;
        Ok(self.ctx.ledger.snapshot(operation_id).await)
    }
}

/// Open the session and resync it if it is new. Caller holds the operation lock.
pub(crate) async fn ensure_session(ctx: &ScanContext, operation_id: Uuid) -> AppResult<()> {
    if ctx.ledger.open(operation_id).await {
        resync_locked(ctx, operation_id).await?;
    }
    Ok(())
}

/// Append keys of accepted lines, in (created_at, id) order, that the ledger
/// lacks. Caller holds the operation lock.
pub(crate) async fn resync_locked(ctx: &ScanContext, operation_id: Uuid) -> AppResult<usize> {
    let accepted = ctx.store.query_accepted_lines(operation_id).await?;
    let added = ctx
        .ledger
        .merge(operation_id, accepted.iter().filter_map(|l| l.lot_key()))
        .await;

    if !added.is_empty() {
        tracing::debug!(%operation_id, added = added.len(), "Ledger resynced from persisted lines");
    }
    Ok(added.len())
}

/// Caller holds the operation lock.
pub(crate) async fn prune_locked(ctx: &ScanContext, operation_id: Uuid) -> AppResult<Vec<LotKey>> {
    let backed: BTreeSet<LotKey> = ctx
        .store
        .query_accepted_lines(operation_id)
        .await?
        .iter()
        .filter_map(|l| l.lot_key())
        .collect();
    let dropped = ctx.ledger.retain(operation_id, &backed).await;
    for key in &dropped {
        tracing::info!(%operation_id, lot = %key, "Pruned ledger entry with no accepted line");
    }
    Ok(dropped)
}

/// Roll `key` back out of the ledger once no other accepted line holds it.
///
/// Lookup failures are logged and treated as "not consumed": a missed
/// cleanup is safer than blocking a legitimate re-scan. Caller holds the
/// operation lock.
pub(crate) async fn release_key(ctx: &ScanContext, operation_id: Uuid, key: &LotKey) {
    let still_held = match ctx.store.query_accepted_lines(operation_id).await {
        Ok(lines) => lines.iter().any(|l| l.binds(key)),
        Err(err) => {
            tracing::warn!(
                %operation_id,
                lot = %key,
                error = %err,
                "Could not check remaining lines during rollback, treating lot as not consumed"
            );
            false
        }
    };

    if still_held {
        tracing::debug!(%operation_id, lot = %key, "Lot still held by another line, keeping ledger entry");
        return;
    }
    if ctx.ledger.remove(operation_id, key).await {
        tracing::info!(%operation_id, lot = %key, "Lot rolled back out of the ledger");
    }
}
