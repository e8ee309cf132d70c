// SPDX-License-Identifier: GPL-3.0-only

//! Generation diffing between two presentable sets.
//!
//! Both generations are walked in canonical order and merge-compared, so
//! a node's additions always follow its parent's and removals are emitted
//! leaf-first. An unchanged device synthesizes the same id in both
//! generations and drops out of the diff entirely.

use std::cmp::Ordering;

use pool_types::Presentable;
use tracing::warn;

use super::set::PresentableSet;

/// The changes from one generation to the next.
///
/// `added` is in canonical order (parents before children); `removed` is
/// in reverse canonical order (children before parents). Notify in the
/// order given and no listener ever sees a child without its parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentableDiff {
    pub added: Vec<Presentable>,
    pub removed: Vec<Presentable>,
}

impl PresentableDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the diff from `old` to `new`.
pub fn diff_sets(old: &PresentableSet, new: &PresentableSet) -> PresentableDiff {
    let old_order = old.in_canonical_order();
    let new_order = new.in_canonical_order();

    let mut added = Vec::new();
    let mut removed = Vec::new();

    let mut i = 0;
    let mut j = 0;
    while i < old_order.len() && j < new_order.len() {
        let a = old_order[i];
        let b = new_order[j];
        match old.sort_path(&a.id).cmp(&new.sort_path(&b.id)) {
            Ordering::Less => {
                removed.push(a.clone());
                i += 1;
            }
            Ordering::Greater => {
                added.push(b.clone());
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    removed.extend(old_order[i..].iter().map(|p| (*p).clone()));
    added.extend(new_order[j..].iter().map(|p| (*p).clone()));

    // Children go before their parents on the way out.
    removed.reverse();

    for p in &added {
        if let Some(parent) = p.enclosed_by.as_deref() {
            if !new.contains(parent) {
                warn!(id = %p.id, parent, "added presentable has no parent in its generation");
            }
        }
    }

    PresentableDiff { added, removed }
}
