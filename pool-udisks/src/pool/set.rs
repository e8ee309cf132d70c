// SPDX-License-Identifier: GPL-3.0-only

//! The presentable arena and its canonical ordering.

use std::collections::BTreeMap;

use pool_types::Presentable;

/// The complete collection of presentables as of one recomputation.
///
/// Nodes are stored by identifier; the enclosing-parent reference is an id
/// lookup into the same set, so the graph is a forest by construction and
/// no node can own (or dangle into) another generation.
///
/// Canonical order is sort-path order: each node's sort key is the
/// concatenation of its ancestor ids from the Machine root down to itself,
/// which makes a parent sort strictly before all of its descendants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentableSet {
    by_id: BTreeMap<String, Presentable>,
}

impl PresentableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a presentable. Returns `false` (and keeps the existing node)
    /// when the id is already taken.
    pub fn insert(&mut self, presentable: Presentable) -> bool {
        if self.by_id.contains_key(&presentable.id) {
            return false;
        }
        self.by_id.insert(presentable.id.clone(), presentable);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Presentable> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Presentable> {
        self.by_id.values()
    }

    /// Find the presentable backed by the given device object path.
    pub fn find_by_device_path(&self, object_path: &str) -> Option<&Presentable> {
        self.by_id
            .values()
            .find(|p| p.device_path.as_deref() == Some(object_path))
    }

    /// All presentables backed by the given device object path (a device
    /// can back both a drive and its whole-disk volume).
    pub fn all_by_device_path<'a>(
        &'a self,
        object_path: &'a str,
    ) -> impl Iterator<Item = &'a Presentable> {
        self.by_id
            .values()
            .filter(move |p| p.device_path.as_deref() == Some(object_path))
    }

    /// Direct children of the given presentable.
    pub fn enclosed(&self, id: &str) -> Vec<&Presentable> {
        self.in_canonical_order()
            .into_iter()
            .filter(|p| p.enclosed_by.as_deref() == Some(id))
            .collect()
    }

    /// The node's sort key: ancestor ids from the root down, separated so
    /// that a parent's key is a strict prefix of every descendant's key.
    /// A dangling parent reference terminates the walk (and is a bug the
    /// synthesizer warns about); the depth bound guards against cyclic
    /// daemon data.
    pub fn sort_path(&self, id: &str) -> String {
        let mut chain = vec![id];
        let mut cursor = id;
        while let Some(parent) = self
            .by_id
            .get(cursor)
            .and_then(|p| p.enclosed_by.as_deref())
        {
            if chain.len() > 100 {
                panic!("cycle in enclosing-presentable references at {id}");
            }
            chain.push(parent);
            cursor = parent;
        }
        chain.reverse();
        chain.join("/")
    }

    /// All presentables in canonical order (parents before children).
    pub fn in_canonical_order(&self) -> Vec<&Presentable> {
        let mut items: Vec<&Presentable> = self.by_id.values().collect();
        items.sort_by_cached_key(|p| self.sort_path(&p.id));
        items
    }
}

impl FromIterator<Presentable> for PresentableSet {
    fn from_iter<T: IntoIterator<Item = Presentable>>(iter: T) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_types::{HubKind, MACHINE_ID};

    fn sample_set() -> PresentableSet {
        let machine = Presentable::machine();
        let hub = Presentable::virtual_hub(HubKind::Peripheral, MACHINE_ID);
        let drive = Presentable::drive("/dev/sda", "/devices/sda", &hub.id);
        let volume = Presentable::volume("/dev/sda1", "/devices/sda1", &drive.id);
        [volume, drive, hub, machine].into_iter().collect()
    }

    #[test]
    fn canonical_order_puts_parents_first() {
        let set = sample_set();
        let order: Vec<&str> = set.in_canonical_order().iter().map(|p| p.id.as_str()).collect();

        let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
        assert_eq!(pos(MACHINE_ID), 0);
        assert!(pos("hub_peripheral_enclosed_by_machine") < pos(&format!(
            "drive_/dev/sda_enclosed_by_{}",
            "hub_peripheral_enclosed_by_machine"
        )));
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut set = PresentableSet::new();
        assert!(set.insert(Presentable::machine()));
        assert!(!set.insert(Presentable::machine()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn find_by_device_path_resolves_backing_device() {
        let set = sample_set();
        let found = set.find_by_device_path("/devices/sda1").unwrap();
        assert!(found.is_volume());
        assert!(set.find_by_device_path("/devices/missing").is_none());
    }
}
