// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent node table.
//!
//! # Concurrency
//!
//! - `DashMap` shards the id -> entry map, so lookups of distinct nodes do
//!   not contend.
//! - Each entry is an `ArcSwap<Node>`: readers `load_full()` an immutable
//!   `Arc<Node>` snapshot and never observe a partially edited node.
//! - Editors clone the current node, mutate the copy and atomically store
//!   it. Superseded versions are freed when the last reader drops its
//!   `Arc`, which replaces epoch-based reclamation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use super::node::{Node, Reference};
use crate::status::StatusCode;
use crate::types::NodeId;

/// Address space storage keyed by [`NodeId`].
#[derive(Default)]
pub struct NodeStore {
    nodes: DashMap<NodeId, ArcSwap<Node>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Snapshot of a node.
    pub fn get(&self, node_id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.get(node_id).map(|entry| entry.value().load_full())
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node whose id is not yet taken.
    pub fn insert(&self, node: Node) -> Result<(), StatusCode> {
        use dashmap::mapref::entry::Entry;
        match self.nodes.entry(node.node_id.clone()) {
            Entry::Occupied(_) => Err(StatusCode::BAD_NODE_ID_EXISTS),
            Entry::Vacant(slot) => {
                slot.insert(ArcSwap::from_pointee(node));
                Ok(())
            }
        }
    }

    /// Swap in a new version of an existing node.
    pub fn replace(&self, node: Node) -> Result<(), StatusCode> {
        match self.nodes.get(&node.node_id) {
            Some(entry) => {
                entry.value().store(Arc::new(node));
                Ok(())
            }
            None => Err(StatusCode::BAD_NODE_ID_UNKNOWN),
        }
    }

    pub fn remove(&self, node_id: &NodeId) -> Option<Arc<Node>> {
        self.nodes
            .remove(node_id)
            .map(|(_, entry)| entry.into_inner())
    }

    /// Copy-on-write edit. `f` works on a private clone; the clone is only
    /// published when `f` succeeds.
    pub fn edit<R>(
        &self,
        node_id: &NodeId,
        f: impl FnOnce(&mut Node) -> Result<R, StatusCode>,
    ) -> Result<R, StatusCode> {
        let entry = self
            .nodes
            .get(node_id)
            .ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
        let mut copy = Node::clone(&entry.value().load());
        let out = f(&mut copy)?;
        entry.value().store(Arc::new(copy));
        Ok(out)
    }

    /// Add a reference on `source` unless an identical one exists.
    pub fn add_reference(&self, source: &NodeId, reference: Reference) -> Result<(), StatusCode> {
        self.edit(source, |node| {
            if node.has_reference(&reference) {
                return Err(StatusCode::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED);
            }
            node.references.push(reference);
            Ok(())
        })
    }

    /// Add `source --type--> target` and the inverse edge on `target`.
    pub fn add_bidirectional(
        &self,
        source: &NodeId,
        reference_type_id: &NodeId,
        target: &NodeId,
    ) -> Result<(), StatusCode> {
        self.add_reference(
            source,
            Reference::forward(reference_type_id.clone(), target.clone()),
        )?;
        self.add_reference(
            target,
            Reference::inverse(reference_type_id.clone(), source.clone()),
        )
    }

    /// Remove matching references from `source`; returns how many went.
    pub fn remove_references(
        &self,
        source: &NodeId,
        matches: impl Fn(&Reference) -> bool,
    ) -> Result<usize, StatusCode> {
        self.edit(source, |node| {
            let before = node.references.len();
            node.references.retain(|r| !matches(r));
            Ok(before - node.references.len())
        })
    }

    /// Ids of every node, in no particular order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodestore::ns0;
    use crate::types::{BuiltinType, Variant};

    fn counter() -> Node {
        Node::variable(
            NodeId::numeric(1, 1),
            "Counter",
            BuiltinType::Int32.data_type_id(),
            Variant::Int32(0),
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let store = NodeStore::new();
        store.insert(counter()).unwrap();
        assert_eq!(store.insert(counter()), Err(StatusCode::BAD_NODE_ID_EXISTS));
        assert!(store.get(&NodeId::numeric(1, 1)).is_some());
        assert!(store.remove(&NodeId::numeric(1, 1)).is_some());
        assert!(store.get(&NodeId::numeric(1, 1)).is_none());
    }

    #[test]
    fn test_snapshot_is_not_affected_by_edit() {
        let store = NodeStore::new();
        store.insert(counter()).unwrap();
        let before = store.get(&NodeId::numeric(1, 1)).unwrap();
        store
            .edit(&NodeId::numeric(1, 1), |node| {
                node.display_name = "Renamed".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(before.display_name.text.as_str(), Some("Counter"));
        let after = store.get(&NodeId::numeric(1, 1)).unwrap();
        assert_eq!(after.display_name.text.as_str(), Some("Renamed"));
    }

    #[test]
    fn test_failed_edit_is_not_published() {
        let store = NodeStore::new();
        store.insert(counter()).unwrap();
        let result: Result<(), _> = store.edit(&NodeId::numeric(1, 1), |node| {
            node.write_mask = 7;
            Err(StatusCode::BAD_TYPE_MISMATCH)
        });
        assert!(result.is_err());
        assert_eq!(store.get(&NodeId::numeric(1, 1)).unwrap().write_mask, 0);
    }

    #[test]
    fn test_bidirectional_reference() {
        let store = NodeStore::new();
        store.insert(Node::object(NodeId::numeric(1, 100), "Folder")).unwrap();
        store.insert(counter()).unwrap();
        store
            .add_bidirectional(
                &NodeId::numeric(1, 100),
                &ns0::id::ORGANIZES,
                &NodeId::numeric(1, 1),
            )
            .unwrap();
        let child = store.get(&NodeId::numeric(1, 1)).unwrap();
        assert_eq!(
            child.references,
            vec![Reference::inverse(ns0::id::ORGANIZES, NodeId::numeric(1, 100))]
        );
        assert_eq!(
            store.add_reference(
                &NodeId::numeric(1, 100),
                Reference::forward(ns0::id::ORGANIZES, NodeId::numeric(1, 1))
            ),
            Err(StatusCode::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED)
        );
    }

    #[test]
    fn test_concurrent_readers_during_edits() {
        let store = Arc::new(NodeStore::new());
        store.insert(counter()).unwrap();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let node = store.get(&NodeId::numeric(1, 1)).unwrap();
                        let v = node.read_attribute(crate::nodestore::attribute_id::VALUE).unwrap();
                        assert!(matches!(v, Variant::Int32(_)));
                    }
                })
            })
            .collect();
        for i in 0..500 {
            store
                .edit(&NodeId::numeric(1, 1), |node| {
                    if let Some(v) = node.as_variable_mut() {
                        v.value = crate::nodestore::VariableValue::Stored(
                            crate::types::DataValue::new(Variant::Int32(i)),
                        );
                    }
                    Ok(())
                })
                .unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
