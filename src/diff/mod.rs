// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Change tracking between a committed baseline and the editor's latest state.
//!
//! The tracker holds two parsed snapshots. `diff()` is a pure function of the
//! pair and is recomputed on every call; committing replaces the baseline
//! wholesale so future diffs only measure new human edits.

use crate::format::parse_document;
use crate::model::{is_reserved_id, DocumentModel, Geometry, Node, NodeId, NodeKind};

pub const DEFAULT_GEOMETRY_TOLERANCE: f64 = 1.0;

/// Tunables for diff computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Per-axis geometry tolerance in document length units.
    pub geometry_tolerance: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            geometry_tolerance: DEFAULT_GEOMETRY_TOLERANCE,
        }
    }
}

/// One parsed document plus the serialized form it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentSnapshot {
    model: DocumentModel,
    raw: String,
}

impl DocumentSnapshot {
    pub fn from_serialized(serialized: &str) -> Self {
        Self {
            model: parse_document(serialized),
            raw: serialized.to_owned(),
        }
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// A single field that differs between baseline and current, with both sides.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Label {
        before: Option<String>,
        after: Option<String>,
    },
    Style {
        before: Option<String>,
        after: Option<String>,
    },
    Geometry {
        before: Option<Geometry>,
        after: Option<Geometry>,
    },
    Source {
        before: Option<NodeId>,
        after: Option<NodeId>,
    },
    Target {
        before: Option<NodeId>,
        after: Option<NodeId>,
    },
}

impl FieldChange {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Label { .. } => "label",
            Self::Style { .. } => "style",
            Self::Geometry { .. } => "geometry",
            Self::Source { .. } => "source",
            Self::Target { .. } => "target",
        }
    }
}

/// All differing fields of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeChange {
    pub node_id: NodeId,
    pub fields: Vec<FieldChange>,
}

/// The derived difference between two snapshots. Never stored; always
/// recomputed from the snapshots it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff {
    pub added: Vec<Node>,
    pub modified: Vec<NodeChange>,
    pub deleted: Vec<NodeId>,
    pub summary: String,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Whether an un-synced human edit touched this id (modified or deleted).
    pub fn touches(&self, node_id: &NodeId) -> bool {
        self.modified.iter().any(|change| &change.node_id == node_id)
            || self.deleted.iter().any(|deleted| deleted == node_id)
    }
}

/// Baseline/current snapshot pair for one logical document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeTracker {
    baseline: DocumentSnapshot,
    current: DocumentSnapshot,
    options: DiffOptions,
}

impl ChangeTracker {
    pub fn new(options: DiffOptions) -> Self {
        Self {
            baseline: DocumentSnapshot::default(),
            current: DocumentSnapshot::default(),
            options,
        }
    }

    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Parse and store as baseline; current follows, so there is no pending
    /// diff immediately afterwards.
    pub fn set_baseline(&mut self, serialized: &str) {
        let snapshot = DocumentSnapshot::from_serialized(serialized);
        self.current = snapshot.clone();
        self.baseline = snapshot;
    }

    /// Parse and store as current only; called whenever the editor reports
    /// its latest state.
    pub fn update(&mut self, serialized: &str) {
        self.current = DocumentSnapshot::from_serialized(serialized);
    }

    /// Re-base: future diffs measure only edits made after this point.
    pub fn commit(&mut self) {
        self.baseline = self.current.clone();
    }

    pub fn baseline(&self) -> &DocumentSnapshot {
        &self.baseline
    }

    pub fn current(&self) -> &DocumentSnapshot {
        &self.current
    }

    pub fn has_changes(&self) -> bool {
        !self.diff().is_empty()
    }

    pub fn diff(&self) -> Diff {
        let tolerance = self.options.geometry_tolerance;
        let baseline = self.baseline.model();
        let current = self.current.model();

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for node in current.elements() {
            match baseline.get(node.node_id()) {
                None => added.push(node.clone()),
                Some(before) => {
                    let fields = compare_fields(before, node, tolerance);
                    if !fields.is_empty() {
                        modified.push(NodeChange {
                            node_id: node.node_id().clone(),
                            fields,
                        });
                    }
                }
            }
        }

        let mut deleted = Vec::new();
        for id in baseline.order() {
            if !is_reserved_id(id.as_str()) && !current.contains(id) {
                deleted.push(id.clone());
            }
        }

        let summary = build_summary(&added, &modified, &deleted);
        Diff {
            added,
            modified,
            deleted,
            summary,
        }
    }
}

fn compare_fields(before: &Node, after: &Node, tolerance: f64) -> Vec<FieldChange> {
    let mut fields = Vec::new();
    if before.label() != after.label() {
        fields.push(FieldChange::Label {
            before: before.label().map(ToOwned::to_owned),
            after: after.label().map(ToOwned::to_owned),
        });
    }
    if before.style() != after.style() {
        fields.push(FieldChange::Style {
            before: before.style().map(ToOwned::to_owned),
            after: after.style().map(ToOwned::to_owned),
        });
    }
    if !geometry_eq(before.geometry(), after.geometry(), tolerance) {
        fields.push(FieldChange::Geometry {
            before: before.geometry().copied(),
            after: after.geometry().copied(),
        });
    }
    if before.source_id() != after.source_id() {
        fields.push(FieldChange::Source {
            before: before.source_id().cloned(),
            after: after.source_id().cloned(),
        });
    }
    if before.target_id() != after.target_id() {
        fields.push(FieldChange::Target {
            before: before.target_id().cloned(),
            after: after.target_id().cloned(),
        });
    }
    fields
}

fn geometry_eq(before: Option<&Geometry>, after: Option<&Geometry>, tolerance: f64) -> bool {
    match (before, after) {
        (None, None) => true,
        (Some(a), Some(b)) => a.approx_eq(b, tolerance),
        _ => false,
    }
}

fn build_summary(added: &[Node], modified: &[NodeChange], deleted: &[NodeId]) -> String {
    if added.is_empty() && modified.is_empty() && deleted.is_empty() {
        return "no changes".to_owned();
    }

    let mut parts = Vec::new();

    let shapes = added
        .iter()
        .filter(|node| node.kind() != NodeKind::Edge)
        .collect::<Vec<_>>();
    let connectors = added.len() - shapes.len();
    if !shapes.is_empty() {
        let labels = shapes
            .iter()
            .map(|node| node.label().unwrap_or(node.node_id().as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!(
            "added {} shape{} ({labels})",
            shapes.len(),
            plural(shapes.len())
        ));
    }
    if connectors > 0 {
        parts.push(format!("added {connectors} connector{}", plural(connectors)));
    }

    let relabeled = count_changes(modified, |f| matches!(f, FieldChange::Label { .. }));
    let moved = count_changes(modified, |f| matches!(f, FieldChange::Geometry { .. }));
    let restyled = count_changes(modified, |f| matches!(f, FieldChange::Style { .. }));
    let rewired = count_changes(modified, |f| {
        matches!(f, FieldChange::Source { .. } | FieldChange::Target { .. })
    });
    if relabeled > 0 {
        parts.push(format!("relabeled {relabeled} element{}", plural(relabeled)));
    }
    if moved > 0 {
        parts.push(format!("moved {moved} element{}", plural(moved)));
    }
    if restyled > 0 {
        parts.push(format!("restyled {restyled} element{}", plural(restyled)));
    }
    if rewired > 0 {
        parts.push(format!("rewired {rewired} connector{}", plural(rewired)));
    }

    if !deleted.is_empty() {
        parts.push(format!(
            "deleted {} element{}",
            deleted.len(),
            plural(deleted.len())
        ));
    }

    parts.join("; ")
}

fn count_changes(modified: &[NodeChange], matches: impl Fn(&FieldChange) -> bool) -> usize {
    modified
        .iter()
        .filter(|change| change.fields.iter().any(&matches))
        .count()
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
