// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use super::ids::NodeId;
use super::node::{Node, NodeKind};

/// The structural root cell of a tree document.
pub const RESERVED_ROOT_ID: &str = "0";
/// The default layer cell every real element is parented under.
pub const RESERVED_LAYER_ID: &str = "1";

/// The root/layer cells are addressable (the writer needs them) but are not
/// elements: enumeration and counts skip them.
pub fn is_reserved_id(id: &str) -> bool {
    id == RESERVED_ROOT_ID || id == RESERVED_LAYER_ID
}

/// An addressable mapping of node-id to node, plus the document order the
/// cells appeared in so re-serialization is stable.
///
/// A model is a disposable artifact of one parse: it is never mutated by two
/// owners, and a fresh parse always produces a fresh model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentModel {
    cells: BTreeMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl DocumentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A well-formed empty document: just the two reserved cells.
    pub fn with_reserved_roots() -> Self {
        let mut model = Self::new();
        if let Ok(root_id) = NodeId::new(RESERVED_ROOT_ID) {
            model.insert(Node::new(root_id, NodeKind::Unknown));
        }
        if let Ok(layer_id) = NodeId::new(RESERVED_LAYER_ID) {
            let mut layer = Node::new(layer_id, NodeKind::Unknown);
            layer.set_parent_id(NodeId::new(RESERVED_ROOT_ID).ok());
            model.insert(layer);
        }
        model
    }

    pub fn cells(&self) -> &BTreeMap<NodeId, Node> {
        &self.cells
    }

    /// Ids in document order (reserved cells included).
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Node> {
        self.cells.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.cells.get_mut(node_id)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.cells.contains_key(node_id)
    }

    /// Inserts (or replaces) a cell. A replacement keeps the original
    /// document position; a new cell is appended.
    pub fn insert(&mut self, node: Node) {
        let node_id = node.node_id().clone();
        if self.cells.insert(node_id.clone(), node).is_none() {
            self.order.push(node_id);
        }
    }

    pub fn remove(&mut self, node_id: &NodeId) -> Option<Node> {
        let removed = self.cells.remove(node_id);
        if removed.is_some() {
            self.order.retain(|id| id != node_id);
        }
        removed
    }

    /// Real elements in document order, skipping the reserved cells.
    pub fn elements(&self) -> impl Iterator<Item = &Node> {
        self.order
            .iter()
            .filter(|id| !is_reserved_id(id.as_str()))
            .filter_map(|id| self.cells.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.elements()
            .filter(|node| node.kind() == NodeKind::Vertex)
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.elements()
            .filter(|node| node.kind() == NodeKind::Edge)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.elements().next().is_none()
    }

    /// The highest numeric suffix across all ids ("node-12" -> 12), used to
    /// seed the synthetic-id counter so generated ids never go backwards.
    pub fn highest_numeric_suffix(&self) -> u64 {
        self.cells
            .keys()
            .filter_map(|id| numeric_suffix(id.as_str()))
            .max()
            .unwrap_or(0)
    }
}

fn numeric_suffix(id: &str) -> Option<u64> {
    let digits = id
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|idx| &id[idx + 1..])
        .unwrap_or(id);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
