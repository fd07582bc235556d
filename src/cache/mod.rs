//! Snapshot cache
//!
//! Last-observed remote state per category, keyed by entity id. The poll
//! loop diffs fresh fetches against it; the gateway keeps it in step with
//! local mutations.
//!
//! The cache does no locking of its own. The server keeps it behind a
//! `tokio::sync::Mutex`.

use mailtm_api::{Account, Domain, Message};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Fixed set of cache categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheCategory {
    /// Accounts created through the gateway plus the active account
    NewAccounts,
    /// Messages known to be deleted (tombstones)
    OldMessage,
    /// Messages currently in the inbox
    NewMessage,
    Domain,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 4] = [
        CacheCategory::NewAccounts,
        CacheCategory::OldMessage,
        CacheCategory::NewMessage,
        CacheCategory::Domain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::NewAccounts => "new_accounts",
            CacheCategory::OldMessage => "old_message",
            CacheCategory::NewMessage => "new_message",
            CacheCategory::Domain => "domain",
        }
    }

    /// Whether `entry` has the type this category stores
    pub fn accepts(&self, entry: &CacheEntry) -> bool {
        matches!(
            (self, entry),
            (CacheCategory::NewAccounts, CacheEntry::Account(_))
                | (CacheCategory::OldMessage, CacheEntry::Message(_))
                | (CacheCategory::NewMessage, CacheEntry::Message(_))
                | (CacheCategory::Domain, CacheEntry::Domain(_))
        )
    }
}

impl std::fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached entity
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Account(Account),
    Message(Message),
    Domain(Domain),
}

impl CacheEntry {
    pub fn id(&self) -> &str {
        match self {
            CacheEntry::Account(a) => &a.id,
            CacheEntry::Message(m) => &m.id,
            CacheEntry::Domain(d) => &d.id,
        }
    }
}

impl From<Account> for CacheEntry {
    fn from(account: Account) -> Self {
        CacheEntry::Account(account)
    }
}

impl From<Message> for CacheEntry {
    fn from(message: Message) -> Self {
        CacheEntry::Message(message)
    }
}

impl From<Domain> for CacheEntry {
    fn from(domain: Domain) -> Self {
        CacheEntry::Domain(domain)
    }
}

/// One category: entries by id, plus insertion order by sequence number
#[derive(Debug, Default)]
struct Bucket {
    entries: HashMap<String, (u64, CacheEntry)>,
    order: BTreeMap<u64, String>,
}

impl Bucket {
    fn oldest_seq(&self) -> Option<u64> {
        self.order.keys().next().copied()
    }

    fn remove(&mut self, id: &str) -> Option<CacheEntry> {
        let (seq, entry) = self.entries.remove(id)?;
        self.order.remove(&seq);
        Some(entry)
    }
}

/// In-memory snapshot of the remote state
#[derive(Debug)]
pub struct SnapshotCache {
    capacity: usize,
    next_seq: u64,
    buckets: HashMap<CacheCategory, Bucket>,
}

impl SnapshotCache {
    /// Empty cache that `clean()` trims back to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            buckets: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert `entry`, replacing (in place) any entry with the same id
    ///
    /// Returns false, leaving the cache untouched, when the entry's type does
    /// not belong in `category`.
    pub fn add(&mut self, category: CacheCategory, entry: impl Into<CacheEntry>) -> bool {
        let entry = entry.into();
        if !category.accepts(&entry) {
            warn!(
                category = %category,
                id = entry.id(),
                "Rejected cache entry of the wrong type"
            );
            return false;
        }

        let bucket = self.buckets.entry(category).or_default();
        let id = entry.id().to_string();
        if let Some(slot) = bucket.entries.get_mut(&id) {
            slot.1 = entry;
            return true;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        bucket.order.insert(seq, id.clone());
        bucket.entries.insert(id, (seq, entry));
        true
    }

    /// Add every item, in order
    pub fn extend<T: Into<CacheEntry>>(
        &mut self,
        category: CacheCategory,
        items: impl IntoIterator<Item = T>,
    ) {
        for item in items {
            self.add(category, item);
        }
    }

    /// Entries of a category in insertion order (owned copies)
    pub fn get(&self, category: CacheCategory) -> Vec<CacheEntry> {
        match self.buckets.get(&category) {
            Some(bucket) => bucket
                .order
                .values()
                .filter_map(|id| bucket.entries.get(id).map(|(_, e)| e.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// A single entry by id
    pub fn lookup(&self, category: CacheCategory, id: &str) -> Option<CacheEntry> {
        self.buckets
            .get(&category)
            .and_then(|b| b.entries.get(id))
            .map(|(_, e)| e.clone())
    }

    pub fn contains(&self, category: CacheCategory, id: &str) -> bool {
        self.buckets
            .get(&category)
            .map(|b| b.entries.contains_key(id))
            .unwrap_or(false)
    }

    /// Ids held in a category
    pub fn ids(&self, category: CacheCategory) -> HashSet<String> {
        self.buckets
            .get(&category)
            .map(|b| b.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, category: CacheCategory, id: &str) -> Option<CacheEntry> {
        self.buckets.get_mut(&category)?.remove(id)
    }

    /// Drop everything
    pub fn reset(&mut self) {
        self.buckets.clear();
        debug!("Snapshot cache reset");
    }

    /// Total entries across all categories
    pub fn size(&self) -> usize {
        self.buckets.values().map(|b| b.entries.len()).sum()
    }

    pub fn len(&self, category: CacheCategory) -> usize {
        self.buckets
            .get(&category)
            .map(|b| b.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Evict entries until the cache fits its capacity
    ///
    /// Tombstones go first, oldest first; live entries are only evicted once
    /// no tombstones are left, again oldest-inserted first. Returns the number
    /// of evicted entries.
    pub fn clean(&mut self) -> usize {
        let mut evicted = 0;

        while self.size() > self.capacity {
            let tombstone = self
                .buckets
                .get(&CacheCategory::OldMessage)
                .and_then(Bucket::oldest_seq)
                .map(|seq| (seq, CacheCategory::OldMessage));
            let oldest = tombstone.or_else(|| {
                self.buckets
                    .iter()
                    .filter_map(|(category, bucket)| {
                        bucket.oldest_seq().map(|seq| (seq, *category))
                    })
                    .min()
            });

            let Some((seq, category)) = oldest else {
                break;
            };
            if let Some(bucket) = self.buckets.get_mut(&category) {
                if let Some(id) = bucket.order.get(&seq).cloned() {
                    bucket.remove(&id);
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "Evicted oldest cache entries");
        }
        evicted
    }

    // --- Typed views ---

    pub fn messages(&self, category: CacheCategory) -> Vec<Message> {
        self.get(category)
            .into_iter()
            .filter_map(|e| match e {
                CacheEntry::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.get(CacheCategory::Domain)
            .into_iter()
            .filter_map(|e| match e {
                CacheEntry::Domain(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.get(CacheCategory::NewAccounts)
            .into_iter()
            .filter_map(|e| match e {
                CacheEntry::Account(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Cached inbox message by id
    pub fn message(&self, id: &str) -> Option<Message> {
        match self.lookup(CacheCategory::NewMessage, id) {
            Some(CacheEntry::Message(m)) => Some(m),
            _ => None,
        }
    }

    /// Move a message from the inbox to the tombstones
    ///
    /// Returns false when the message was no longer in the inbox, i.e.
    /// someone else already recorded its deletion.
    pub fn tombstone(&mut self, message: Message) -> bool {
        let live = self.remove(CacheCategory::NewMessage, &message.id).is_some();
        self.add(CacheCategory::OldMessage, message);
        live
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}
