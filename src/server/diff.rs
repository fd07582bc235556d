//! Snapshot diffing
//!
//! Compares a fresh fetch against the cache by entity id. Field changes on an
//! entity that is still present (seen, flagged, ...) are not changes.

use crate::cache::{CacheCategory, SnapshotCache};
use mailtm_api::{Domain, Message};
use std::collections::HashSet;

/// What changed between the cache and one fetch
#[derive(Debug, Default, Clone)]
pub struct SnapshotDiff {
    /// Domains not seen before, in fetch order
    pub new_domains: Vec<Domain>,

    /// Messages not seen before, in fetch order
    pub new_messages: Vec<Message>,

    /// Cached messages missing from the fetch, in cache order
    pub deleted_messages: Vec<Message>,
}

impl SnapshotDiff {
    pub fn has_changes(&self) -> bool {
        !self.new_domains.is_empty()
            || !self.new_messages.is_empty()
            || !self.deleted_messages.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.new_domains.len() + self.new_messages.len() + self.deleted_messages.len()
    }

    /// Fold the diff into the cache
    ///
    /// New entries are added; deleted messages move to the tombstones.
    pub fn apply(&self, cache: &mut SnapshotCache) {
        cache.extend(CacheCategory::Domain, self.new_domains.iter().cloned());
        cache.extend(CacheCategory::NewMessage, self.new_messages.iter().cloned());
        for message in &self.deleted_messages {
            cache.tombstone(message.clone());
        }
    }
}

/// Diff a fetch against the cache
///
/// Tombstoned message ids are never reported as new, and duplicate ids in the
/// fetch are reported once.
pub fn compute(cache: &SnapshotCache, domains: &[Domain], messages: &[Message]) -> SnapshotDiff {
    let known_domains = cache.ids(CacheCategory::Domain);
    let known_messages = cache.ids(CacheCategory::NewMessage);
    let tombstones = cache.ids(CacheCategory::OldMessage);

    let mut seen = HashSet::new();
    let new_domains = domains
        .iter()
        .filter(|d| !known_domains.contains(&d.id) && seen.insert(d.id.clone()))
        .cloned()
        .collect();

    let fetched: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();

    let mut seen = HashSet::new();
    let new_messages = messages
        .iter()
        .filter(|m| {
            !known_messages.contains(&m.id)
                && !tombstones.contains(&m.id)
                && seen.insert(m.id.clone())
        })
        .cloned()
        .collect();

    let deleted_messages = cache
        .messages(CacheCategory::NewMessage)
        .into_iter()
        .filter(|m| !fetched.contains(m.id.as_str()))
        .collect();

    SnapshotDiff {
        new_domains,
        new_messages,
        deleted_messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(ids: &[&str]) -> Vec<Message> {
        ids.iter().map(|id| Message::new(*id, "s")).collect()
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_empty_cache_everything_is_new() {
        let cache = SnapshotCache::new(100);
        let diff = compute(&cache, &[Domain::new("d1", "a.com")], &msgs(&["m1", "m2"]));

        assert_eq!(diff.new_domains.len(), 1);
        assert_eq!(ids(&diff.new_messages), vec!["m1", "m2"]);
        assert!(diff.deleted_messages.is_empty());
        assert_eq!(diff.change_count(), 3);
    }

    #[test]
    fn test_set_difference() {
        let mut cache = SnapshotCache::new(100);
        cache.extend(CacheCategory::NewMessage, msgs(&["m1", "m2", "m3"]));

        let diff = compute(&cache, &[], &msgs(&["m4", "m2", "m5"]));
        assert_eq!(ids(&diff.new_messages), vec!["m4", "m5"]);
        assert_eq!(ids(&diff.deleted_messages), vec!["m1", "m3"]);
    }

    #[test]
    fn test_seen_toggle_is_not_a_change() {
        let mut cache = SnapshotCache::new(100);
        cache.extend(CacheCategory::NewMessage, msgs(&["m1"]));

        let mut fetched = msgs(&["m1"]);
        fetched[0].seen = true;
        fetched[0].flagged = true;

        assert!(!compute(&cache, &[], &fetched).has_changes());
    }

    #[test]
    fn test_tombstones_never_new() {
        let mut cache = SnapshotCache::new(100);
        cache.add(CacheCategory::OldMessage, Message::new("m1", "gone"));

        let diff = compute(&cache, &[], &msgs(&["m1", "m2"]));
        assert_eq!(ids(&diff.new_messages), vec!["m2"]);
    }

    #[test]
    fn test_duplicate_ids_reported_once() {
        let cache = SnapshotCache::new(100);
        let diff = compute(
            &cache,
            &[Domain::new("d1", "a.com"), Domain::new("d1", "a.com")],
            &msgs(&["m1", "m1"]),
        );
        assert_eq!(diff.new_domains.len(), 1);
        assert_eq!(diff.new_messages.len(), 1);
    }

    #[test]
    fn test_domains_only_added() {
        let mut cache = SnapshotCache::new(100);
        cache.add(CacheCategory::Domain, Domain::new("d1", "a.com"));

        let diff = compute(
            &cache,
            &[Domain::new("d1", "a.com"), Domain::new("d2", "b.com")],
            &[],
        );
        assert_eq!(diff.new_domains.len(), 1);
        assert_eq!(diff.new_domains[0].id, "d2");

        // A domain disappearing produces nothing
        assert!(!compute(&cache, &[], &[]).has_changes());
    }

    #[test]
    fn test_apply_updates_cache() {
        let mut cache = SnapshotCache::new(100);
        cache.extend(CacheCategory::NewMessage, msgs(&["m1"]));

        let diff = compute(&cache, &[Domain::new("d1", "a.com")], &msgs(&["m2"]));
        diff.apply(&mut cache);

        assert!(cache.contains(CacheCategory::Domain, "d1"));
        assert!(cache.contains(CacheCategory::NewMessage, "m2"));
        assert!(!cache.contains(CacheCategory::NewMessage, "m1"));
        assert!(cache.contains(CacheCategory::OldMessage, "m1"));

        assert!(!compute(&cache, &[Domain::new("d1", "a.com")], &msgs(&["m2"])).has_changes());
    }
}
