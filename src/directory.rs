//! Row allocator and user directory.
//!
//! Maps a chat id onto the block of rows it owns in the tabular store. Blocks
//! are handed out exactly once: the smallest free header row (`2, 12, 22, …`
//! with the default layout) that no stored user and no in-flight allocation
//! already claims.
//!
//! The in-memory cache is a presence cache only. Lookups that miss it fall
//! back to scanning the store, so a restarted process (empty cache) still
//! resolves every existing user.

use crate::error::{BotError, Result};
use crate::layout::ColumnLayout;
use crate::store::{TabularStore, first_cell};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Allocation attempts before a conflict is reported as a store failure.
const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// A registered user and the block it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub chat_id: String,
    pub display_name: String,
    /// Header row of the user's block.
    pub block_start: u32,
}

/// Result of [`UserDirectory::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Header row of the user's block.
    pub block_start: u32,
    /// `true` when this call allocated the block.
    pub created: bool,
}

/// Resolves chat ids to blocks and allocates new blocks.
pub struct UserDirectory {
    store: Arc<dyn TabularStore>,
    layout: ColumnLayout,
    cache: Mutex<HashMap<String, UserRecord>>,
    /// Per-chat registration locks, held across lookup, allocation and write.
    register_locks: RegisterLocks,
    /// Block starts with an allocation in flight.
    claims: Mutex<HashSet<u32>>,
}

/// Releases an allocation claim when dropped.
struct Claim<'a> {
    claims: &'a Mutex<HashSet<u32>>,
    block_start: u32,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        lock(self.claims).remove(&self.block_start);
    }
}

type RegisterLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// A chat's registration lock. The map entry goes away with the last lease.
struct RegisterLease<'a> {
    locks: &'a RegisterLocks,
    chat_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for RegisterLease<'_> {
    fn drop(&mut self) {
        let mut locks = lock(self.locks);
        // One reference in the map, one here: nobody else holds or awaits it.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.chat_id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UserDirectory {
    #[must_use]
    pub fn new(store: Arc<dyn TabularStore>, layout: ColumnLayout) -> Self {
        Self {
            store,
            layout,
            cache: Mutex::new(HashMap::new()),
            register_locks: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashSet::new()),
        }
    }

    /// The layout this directory allocates against.
    #[must_use]
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TabularStore> {
        &self.store
    }

    /// Register a chat, allocating a block on first call.
    ///
    /// Idempotent: a chat that already owns a block (cached or stored) gets its
    /// existing block back and nothing is written.
    ///
    /// # Errors
    ///
    /// [`BotError::StoreUnavailable`] when the store fails or allocation keeps
    /// conflicting.
    pub async fn register(&self, chat_id: &str, display_name: &str) -> Result<Registration> {
        let chat_id = chat_id.trim();
        let lease = self.register_lease(chat_id);
        let _guard = lease.lock.lock().await;

        if let Some(record) = self.cached(chat_id) {
            return Ok(Registration {
                block_start: record.block_start,
                created: false,
            });
        }

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            match self.try_allocate(chat_id, display_name).await {
                Ok(registration) => return Ok(registration),
                Err(BotError::AllocationConflict(reason)) => {
                    warn!(chat_id, attempt, %reason, "block allocation conflict, rescanning");
                }
                Err(e) => return Err(e),
            }
        }

        Err(BotError::StoreUnavailable(format!(
            "block allocation for chat {chat_id} conflicted {MAX_ALLOCATION_ATTEMPTS} times"
        )))
    }

    async fn try_allocate(&self, chat_id: &str, display_name: &str) -> Result<Registration> {
        let records = self.scan().await?;
        if let Some(record) = records.iter().find(|r| r.chat_id == chat_id) {
            debug!(chat_id, block_start = record.block_start, "chat already in store");
            let block_start = record.block_start;
            self.remember(record.clone());
            return Ok(Registration {
                block_start,
                created: false,
            });
        }

        let claim = self.claim_free_block(&records);
        let block_start = claim.block_start;

        // Someone may have written the header row since the scan.
        let header = self.store.read(&self.layout.id_cell(block_start)).await?;
        if !first_cell(&header).trim().is_empty() {
            return Err(BotError::AllocationConflict(format!(
                "row {block_start} was taken after the scan"
            )));
        }

        let (range, rows) = self.layout.header_write(block_start, chat_id, display_name);
        self.store
            .write(&range, rows)
            .await
            .map_err(|e| BotError::StoreUnavailable(format!("cannot write user header: {e}")))?;

        let written = self.store.read(&self.layout.id_cell(block_start)).await?;
        let owner = first_cell(&written);
        if owner.trim() != chat_id {
            return Err(BotError::AllocationConflict(format!(
                "row {block_start} holds `{owner}` after write"
            )));
        }

        self.remember(UserRecord {
            chat_id: chat_id.to_owned(),
            display_name: display_name.to_owned(),
            block_start,
        });
        drop(claim);
        info!(chat_id, block_start, "allocated user block");
        Ok(Registration {
            block_start,
            created: true,
        })
    }

    /// Reserve the smallest block start not used by a stored user, a cached
    /// user, or another in-flight allocation.
    fn claim_free_block(&self, records: &[UserRecord]) -> Claim<'_> {
        let mut occupied: HashSet<u32> = records.iter().map(|r| r.block_start).collect();
        occupied.extend(lock(&self.cache).values().map(|r| r.block_start));

        let mut claims = lock(&self.claims);
        let mut k = 0;
        let block_start = loop {
            let start = self.layout.block_start(k);
            if !occupied.contains(&start) && !claims.contains(&start) {
                break start;
            }
            k += 1;
        };
        claims.insert(block_start);
        Claim {
            claims: &self.claims,
            block_start,
        }
    }

    /// Block start of a registered chat.
    ///
    /// # Errors
    ///
    /// [`BotError::NotFound`] when the chat owns no block,
    /// [`BotError::StoreUnavailable`] when the store cannot be scanned.
    pub async fn lookup(&self, chat_id: &str) -> Result<u32> {
        self.record(chat_id).await.map(|r| r.block_start)
    }

    /// Full record of a registered chat. Same resolution as [`Self::lookup`].
    pub async fn record(&self, chat_id: &str) -> Result<UserRecord> {
        let chat_id = chat_id.trim();
        if let Some(record) = self.cached(chat_id) {
            return Ok(record);
        }
        let record = self
            .scan()
            .await?
            .into_iter()
            .find(|r| r.chat_id == chat_id)
            .ok_or_else(|| BotError::NotFound(format!("chat {chat_id} has no block")))?;
        self.remember(record.clone());
        Ok(record)
    }

    /// `true` when the chat owns a block.
    ///
    /// # Errors
    ///
    /// Only store failures; an unknown chat is `Ok(false)`.
    pub async fn is_registered(&self, chat_id: &str) -> Result<bool> {
        match self.lookup(chat_id).await {
            Ok(_) => Ok(true),
            Err(BotError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Forget every cached mapping. The store is untouched.
    pub fn clear_cache(&self) {
        let evicted = {
            let mut cache = lock(&self.cache);
            let n = cache.len();
            cache.clear();
            n
        };
        info!(evicted, "user directory cache cleared");
    }

    /// Number of cached users.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Evict cached chats whose block no longer names them in the store.
    ///
    /// Returns the evicted chat ids so callers can tear down their reminders.
    pub async fn prune_missing(&self) -> Result<Vec<String>> {
        let stored: HashMap<String, u32> = self
            .scan()
            .await?
            .into_iter()
            .map(|r| (r.chat_id, r.block_start))
            .collect();

        let mut cache = lock(&self.cache);
        let mut evicted: Vec<String> = cache
            .values()
            .filter(|r| stored.get(&r.chat_id) != Some(&r.block_start))
            .map(|r| r.chat_id.clone())
            .collect();
        evicted.sort();
        for chat_id in &evicted {
            cache.remove(chat_id);
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted users missing from store");
        }
        Ok(evicted)
    }

    /// Read every user record from the store.
    pub async fn scan(&self) -> Result<Vec<UserRecord>> {
        let rows = self.store.read(&self.layout.directory_range()).await?;
        let (id_at, name_at) = self.layout.directory_offsets();
        let first_row = self.layout.first_row();

        let records = rows
            .into_iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let row_number = first_row + i as u32;
                self.layout.block_index(row_number)?;
                let chat_id = row.get(id_at).map(|s| s.trim()).unwrap_or_default();
                if chat_id.is_empty() {
                    return None;
                }
                Some(UserRecord {
                    chat_id: chat_id.to_owned(),
                    display_name: row.get(name_at).cloned().unwrap_or_default(),
                    block_start: row_number,
                })
            })
            .collect();
        Ok(records)
    }

    fn cached(&self, chat_id: &str) -> Option<UserRecord> {
        lock(&self.cache).get(chat_id).cloned()
    }

    fn remember(&self, record: UserRecord) {
        lock(&self.cache).insert(record.chat_id.clone(), record);
    }

    fn register_lease(&self, chat_id: &str) -> RegisterLease<'_> {
        let chat_lock = Arc::clone(
            lock(&self.register_locks)
                .entry(chat_id.to_owned())
                .or_default(),
        );
        RegisterLease {
            locks: &self.register_locks,
            chat_id: chat_id.to_owned(),
            lock: chat_lock,
        }
    }
}
