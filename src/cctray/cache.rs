use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use parking_lot::{Mutex, RwLock};

use super::types::ProjectStatus;

/// Immutable view of the cache content, in feed order.
pub type Snapshot = Arc<IndexMap<String, ProjectStatus>>;

/// Process-wide CCTray status cache.
///
/// Content lives in an immutable ordered map behind a single reference.
/// Readers clone the reference and never wait on writers doing real work;
/// writers build a complete new map and swap it in. Writers are serialized
/// among themselves.
pub struct StatusCache {
    current: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexMap::new())),
            writer: Mutex::new(()),
        }
    }

    /// Returns the current content. Stays valid across later replacements.
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<ProjectStatus> {
        self.snapshot().get(name).cloned()
    }

    pub fn all_entries_in_order(&self) -> Vec<ProjectStatus> {
        self.snapshot().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Discards the current content and installs `statuses` as the complete
    /// new content, keyed by each status's name.
    pub fn replace_all_entries_in_cache_with(&self, statuses: Vec<ProjectStatus>) {
        let entries: IndexMap<String, ProjectStatus> = statuses
            .into_iter()
            .map(|status| (status.name.clone(), status))
            .collect();

        let count = entries.len();
        let _guard = self.writer.lock();
        let previous = self.swap(entries);
        debug!("Replaced {} cache entries with {count}", previous.len());
    }

    /// Inserts or overwrites a single entry, keeping its position if present.
    pub fn put(&self, status: ProjectStatus) {
        self.put_all(vec![status]);
    }

    /// Inserts or overwrites entries; other entries are left untouched.
    pub fn put_all(&self, statuses: Vec<ProjectStatus>) {
        if statuses.is_empty() {
            return;
        }

        let _guard = self.writer.lock();
        let mut entries = (*self.snapshot()).clone();
        for status in statuses {
            entries.insert(status.name.clone(), status);
        }
        self.swap(entries);
    }

    fn swap(&self, entries: IndexMap<String, ProjectStatus>) -> Snapshot {
        std::mem::replace(&mut *self.current.write(), Arc::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;

    fn create_test_status(name: &str, status: &str) -> ProjectStatus {
        ProjectStatus::new(name, "Sleeping", status, "1", Utc::now(), "url")
    }

    #[test]
    fn test_empty_cache() {
        let cache = StatusCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("p1 :: s1").is_none());
    }

    #[test]
    fn test_replace_discards_previous_content() {
        let cache = StatusCache::new();
        cache.replace_all_entries_in_cache_with(vec![
            create_test_status("p1 :: s1", "Success"),
            create_test_status("p1 :: s1 :: old-job", "Success"),
        ]);

        cache.replace_all_entries_in_cache_with(vec![
            create_test_status("p1 :: s1", "Failure"),
            create_test_status("p1 :: s1 :: new-job", "Failure"),
        ]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("p1 :: s1 :: old-job").is_none());
        assert_eq!(cache.get("p1 :: s1").unwrap().last_build_status, "Failure");
        assert!(cache.get("p1 :: s1 :: new-job").is_some());
    }

    #[test]
    fn test_entries_keep_replacement_order() {
        let cache = StatusCache::new();
        cache.replace_all_entries_in_cache_with(vec![
            create_test_status("b :: s", "Success"),
            create_test_status("a :: s", "Success"),
            create_test_status("c :: s", "Success"),
        ]);

        let names: Vec<_> = cache
            .all_entries_in_order()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["b :: s", "a :: s", "c :: s"]);
    }

    #[test]
    fn test_put_overwrites_in_place_and_appends_new() {
        let cache = StatusCache::new();
        cache.replace_all_entries_in_cache_with(vec![
            create_test_status("p1 :: s1", "Success"),
            create_test_status("p2 :: s1", "Success"),
        ]);

        cache.put(create_test_status("p1 :: s1", "Failure"));
        cache.put(create_test_status("p3 :: s1", "Success"));

        let entries = cache.all_entries_in_order();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "p1 :: s1");
        assert_eq!(entries[0].last_build_status, "Failure");
        assert_eq!(entries[2].name, "p3 :: s1");
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_replace() {
        let cache = StatusCache::new();
        cache.replace_all_entries_in_cache_with(vec![create_test_status("p1 :: s1", "Success")]);

        let before = cache.snapshot();
        cache.replace_all_entries_in_cache_with(vec![create_test_status("p2 :: s1", "Success")]);

        assert!(before.contains_key("p1 :: s1"));
        assert!(!before.contains_key("p2 :: s1"));
        assert!(cache.get("p1 :: s1").is_none());
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cache = Arc::new(StatusCache::new());
        let old: Vec<_> = (0..50)
            .map(|i| create_test_status(&format!("p :: s{i}"), "Old"))
            .collect();
        let new: Vec<_> = (0..50)
            .map(|i| create_test_status(&format!("p :: s{i}"), "New"))
            .collect();
        cache.replace_all_entries_in_cache_with(old.clone());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = cache.snapshot();
                        assert_eq!(snapshot.len(), 50);
                        let first = &snapshot[0].last_build_status;
                        assert!(snapshot.values().all(|s| &s.last_build_status == first));
                    }
                })
            })
            .collect();

        for i in 0..100 {
            let next = if i % 2 == 0 { new.clone() } else { old.clone() };
            cache.replace_all_entries_in_cache_with(next);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
