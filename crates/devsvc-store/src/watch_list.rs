use std::sync::Arc;

use dashmap::DashMap;
use devsvc_domain::{ProvisionWatcher, WatcherId};

/// Concurrent collection of provision-watcher rules fetched from metadata.
#[derive(Default)]
pub struct WatchList {
    by_id: DashMap<WatcherId, Arc<ProvisionWatcher>>,
    name_to_id: DashMap<String, WatcherId>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, watcher: ProvisionWatcher) -> Option<Arc<ProvisionWatcher>> {
        let id = watcher.id.clone();
        let name = watcher.name.clone();
        self.name_to_id.insert(name, id.clone());
        self.by_id.insert(id, Arc::new(watcher))
    }

    pub fn remove_by_id(&self, id: &WatcherId) -> Option<Arc<ProvisionWatcher>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if let Some(w) = &removed {
            self.name_to_id.remove(&w.name);
        }
        removed
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<ProvisionWatcher>> {
        let id = self.name_to_id.get(name)?.clone();
        self.by_id.get(&id).map(|v| v.clone())
    }

    pub fn clear(&self) {
        self.by_id.clear();
        self.name_to_id.clear();
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn populate_from_list(&self, watchers: Vec<ProvisionWatcher>) {
        self.clear();
        for w in watchers {
            self.insert(w);
        }
    }

    pub fn iterate_snapshot(&self) -> Vec<Arc<ProvisionWatcher>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devsvc_domain::NvList;

    fn watcher(name: &str) -> ProvisionWatcher {
        ProvisionWatcher {
            id: WatcherId::new(format!("id-{name}")),
            name: name.to_string(),
            profile_name: "default".to_string(),
            identifiers: NvList::new(),
            blocking: false,
        }
    }

    #[test]
    fn insert_then_find_by_name() {
        let list = WatchList::new();
        list.insert(watcher("w1"));
        assert!(list.find_by_name("w1").is_some());
    }

    #[test]
    fn populate_from_list_replaces_contents() {
        let list = WatchList::new();
        list.insert(watcher("stale"));
        list.populate_from_list(vec![watcher("a"), watcher("b")]);
        assert_eq!(list.len(), 2);
        assert!(list.find_by_name("stale").is_none());
    }
}
