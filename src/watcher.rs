use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::StoreError;
use crate::store::{StorageArea, Store};

#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Changed keys within one storage area.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub area: StorageArea,
    pub changes: BTreeMap<String, StorageChange>,
}

impl ChangeEvent {
    pub fn touches(&self, area: StorageArea, key: &str) -> bool {
        self.area == area && self.changes.contains_key(key)
    }
}

/// Observes commits to a store file from any connection, including other
/// processes, and fans them out to subscribers as per-area change events.
pub struct ChangeWatcher {
    store: Store,
    data_version: i64,
    snapshot: BTreeMap<StorageArea, BTreeMap<String, Value>>,
    subscribers: Vec<Sender<ChangeEvent>>,
}

impl ChangeWatcher {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let store = Store::open(path)?;
        store.ensure_initialized()?;
        let data_version = store.data_version()?;
        let snapshot = read_snapshot(&store)?;
        Ok(Self {
            store,
            data_version,
            snapshot,
            subscribers: Vec::new(),
        })
    }

    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Check for commits since the last poll and publish what changed.
    /// Returns the number of events published.
    pub fn poll(&mut self) -> Result<usize, StoreError> {
        let version = self.store.data_version()?;
        if version == self.data_version {
            return Ok(0);
        }
        self.data_version = version;

        let current = read_snapshot(&self.store)?;
        let mut published = 0;
        for area in StorageArea::ALL {
            let empty = BTreeMap::new();
            let before = self.snapshot.get(&area).unwrap_or(&empty);
            let after = current.get(&area).unwrap_or(&empty);
            let changes = diff(before, after);
            if changes.is_empty() {
                continue;
            }

            tracing::debug!(area = %area, keys = ?changes.keys().collect::<Vec<_>>(), "storage changed");
            let event = ChangeEvent { area, changes };
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            published += 1;
        }
        self.snapshot = current;
        Ok(published)
    }
}

fn read_snapshot(store: &Store) -> Result<BTreeMap<StorageArea, BTreeMap<String, Value>>, StoreError> {
    StorageArea::ALL
        .into_iter()
        .map(|area| -> Result<_, StoreError> { Ok((area, store.get_area(area)?)) })
        .collect()
}

fn diff(
    before: &BTreeMap<String, Value>,
    after: &BTreeMap<String, Value>,
) -> BTreeMap<String, StorageChange> {
    let mut changes = BTreeMap::new();

    for (key, old) in before {
        match after.get(key) {
            Some(new) if new == old => {}
            new => {
                changes.insert(
                    key.clone(),
                    StorageChange {
                        old_value: Some(old.clone()),
                        new_value: new.cloned(),
                    },
                );
            }
        }
    }

    for (key, new) in after {
        if !before.contains_key(key) {
            changes.insert(
                key.clone(),
                StorageChange {
                    old_value: None,
                    new_value: Some(new.clone()),
                },
            );
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{app, temp_store};
    use crate::store::{ApplicationRepository, ApplicationStore, APPLICATIONS_KEY};
    use crate::models::Status;
    use serde_json::json;

    #[test]
    fn test_no_event_without_commit() {
        let (_dir, store) = temp_store();
        let mut watcher = ChangeWatcher::open(store.path()).unwrap();
        let rx = watcher.subscribe();
        assert_eq!(watcher.poll().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_write_from_other_connection_is_observed() {
        let (_dir, store) = temp_store();
        let mut watcher = ChangeWatcher::open(store.path()).unwrap();
        let rx = watcher.subscribe();

        ApplicationRepository::new(&store)
            .replace_all(&[app(1, "https://x.com/jobs/1", Status::Applied)])
            .unwrap();

        assert_eq!(watcher.poll().unwrap(), 1);
        let event = rx.try_recv().unwrap();
        assert!(event.touches(StorageArea::Sync, APPLICATIONS_KEY));
        assert!(!event.touches(StorageArea::Local, APPLICATIONS_KEY));
        let change = &event.changes[APPLICATIONS_KEY];
        assert_eq!(change.old_value, None);
        assert!(change.new_value.as_ref().unwrap().is_array());

        // Nothing new since.
        assert_eq!(watcher.poll().unwrap(), 0);
    }

    #[test]
    fn test_events_are_scoped_to_area() {
        let (_dir, store) = temp_store();
        let mut watcher = ChangeWatcher::open(store.path()).unwrap();
        let rx = watcher.subscribe();

        store.set(StorageArea::Local, "dashboardFilter", &json!("Offer")).unwrap();
        watcher.poll().unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.area, StorageArea::Local);
        assert!(!event.touches(StorageArea::Sync, APPLICATIONS_KEY));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rewrite_with_same_value_publishes_nothing() {
        let (_dir, store) = temp_store();
        store.set(StorageArea::Sync, "k", &json!([1, 2])).unwrap();
        let mut watcher = ChangeWatcher::open(store.path()).unwrap();
        let rx = watcher.subscribe();

        store.set(StorageArea::Sync, "k", &json!([1, 2])).unwrap();
        assert_eq!(watcher.poll().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removal_and_dropped_subscriber() {
        let (_dir, store) = temp_store();
        store.set(StorageArea::Sync, "k", &json!(1)).unwrap();
        let mut watcher = ChangeWatcher::open(store.path()).unwrap();
        let kept = watcher.subscribe();
        drop(watcher.subscribe());

        store.remove(StorageArea::Sync, "k").unwrap();
        watcher.poll().unwrap();
        assert_eq!(watcher.subscribers.len(), 1);

        let event = kept.try_recv().unwrap();
        assert_eq!(
            event.changes["k"],
            StorageChange {
                old_value: Some(json!(1)),
                new_value: None,
            }
        );
    }
}
