// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! ID-addressed patch operations against a serialized document.
//!
//! A batch is applied strictly in order against one working copy. Individual
//! failures (missing target, missing required field, collision with an
//! un-synced human edit) downgrade to skipped conflicts; the batch itself
//! never fails. The types here are also the wire vocabulary shared by the
//! push channel, the polling routes, and the MCP tools.

use std::collections::BTreeSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::diff::Diff;
use crate::format::{parse_document, write_document};
use crate::model::{DocumentModel, Geometry, IdError, Node, NodeId, RESERVED_LAYER_ID};

/// Shape vocabulary for `add_node`; each kind carries a default style token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
    DecisionDiamond,
    Cylinder,
    Parallelogram,
    Hexagon,
    Document,
    Cloud,
}

impl ShapeKind {
    pub fn default_style(self) -> &'static str {
        match self {
            Self::Rectangle => "rounded=1;whiteSpace=wrap;html=1;fillColor=#dae8fc;strokeColor=#6c8ebf;",
            Self::Ellipse => "ellipse;whiteSpace=wrap;html=1;fillColor=#d5e8d4;strokeColor=#82b366;",
            Self::DecisionDiamond => "rhombus;whiteSpace=wrap;html=1;fillColor=#fff2cc;strokeColor=#d6b656;",
            Self::Cylinder => "shape=cylinder3;whiteSpace=wrap;html=1;fillColor=#e1d5e7;strokeColor=#9673a6;",
            Self::Parallelogram => "shape=parallelogram;perimeter=parallelogramPerimeter;whiteSpace=wrap;html=1;fillColor=#ffe6cc;strokeColor=#d79b00;",
            Self::Hexagon => "shape=hexagon;perimeter=hexagonPerimeter2;whiteSpace=wrap;html=1;fillColor=#f8cecc;strokeColor=#b85450;",
            Self::Document => "shape=document;whiteSpace=wrap;html=1;boundedLbl=1;",
            Self::Cloud => "ellipse;shape=cloud;whiteSpace=wrap;html=1;",
        }
    }
}

pub const DEFAULT_EDGE_STYLE: &str =
    "edgeStyle=orthogonalEdgeStyle;rounded=1;orthogonalLoop=1;jettySize=auto;html=1;endArrow=classic;strokeWidth=2;";

pub const DEFAULT_NODE_WIDTH: f64 = 120.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 60.0;
const DEFAULT_NODE_X: f64 = 100.0;
const DEFAULT_NODE_Y: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Sparse patch for `modify_node`: absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

/// Sparse patch for `modify_edge`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EdgePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// One typed mutation request. A closed union: the applier dispatches on the
/// tag and the compiler checks exhaustiveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    AddNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        kind: ShapeKind,
        #[serde(default)]
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<Size>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },
    ModifyNode {
        id: String,
        changes: NodePatch,
    },
    DeleteNode {
        id: String,
    },
    AddEdge {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
    ModifyEdge {
        id: String,
        changes: EdgePatch,
    },
    DeleteEdge {
        id: String,
    },
}

impl Op {
    /// The id an operation targets, for ops that address an existing element.
    fn target_id(&self) -> Option<&str> {
        match self {
            Self::ModifyNode { id, .. }
            | Self::DeleteNode { id }
            | Self::ModifyEdge { id, .. }
            | Self::DeleteEdge { id } => Some(id),
            Self::AddNode { .. } | Self::AddEdge { .. } => None,
        }
    }
}

/// How the applier treats collisions with un-synced human edits.
///
/// Only `preserve-human-edits` has real semantics today; `agent-wins` applies
/// without consulting the tracker, and `merge` is a named extension point
/// that currently behaves like the default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    #[default]
    PreserveHumanEdits,
    AgentWins,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Skipped,
    Forced,
    Merged,
}

/// One operation that could not be applied, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConflictInfo {
    pub operation_index: usize,
    pub description: String,
    pub resolution: ConflictResolution,
}

/// Outcome of one batch. `success` means at least one operation applied; an
/// empty or fully-conflicting batch is a no-op result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApplyResult {
    pub success: bool,
    pub applied: usize,
    pub conflicts: Vec<ConflictInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_document: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum OpError {
    HumanEdit { id: String },
    NotFound { id: String },
    AlreadyExists { id: String },
    MissingField { field: &'static str },
    InvalidId { value: String, reason: IdError },
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HumanEdit { id } => {
                write!(f, "element '{id}' was edited by the user since the last sync")
            }
            Self::NotFound { id } => write!(f, "element '{id}' does not exist"),
            Self::AlreadyExists { id } => write!(f, "element '{id}' already exists"),
            Self::MissingField { field } => write!(f, "required field '{field}' is missing"),
            Self::InvalidId { value, reason } => write!(f, "invalid id '{value}': {reason}"),
        }
    }
}

/// Apply a batch against a serialized document and return the new serialized
/// form. `pending` is the tracker's diff, obtained once for the whole batch.
pub fn apply_operations(
    serialized: &str,
    operations: &[Op],
    policy: ConflictPolicy,
    pending: &Diff,
) -> ApplyResult {
    let mut model = parse_document(serialized);

    // Ids the human touched since the last commit; add_* never conflicts.
    let guarded: BTreeSet<&str> = match policy {
        ConflictPolicy::AgentWins => BTreeSet::new(),
        ConflictPolicy::PreserveHumanEdits | ConflictPolicy::Merge => pending
            .modified
            .iter()
            .map(|change| change.node_id.as_str())
            .chain(pending.deleted.iter().map(NodeId::as_str))
            .collect(),
    };

    let mut ids = IdAllocator::seeded_from(&model);
    let mut applied = 0;
    let mut conflicts = Vec::new();

    for (index, op) in operations.iter().enumerate() {
        if let Some(target) = op.target_id() {
            if guarded.contains(target) {
                conflicts.push(ConflictInfo {
                    operation_index: index,
                    description: OpError::HumanEdit {
                        id: target.to_owned(),
                    }
                    .to_string(),
                    resolution: ConflictResolution::Skipped,
                });
                continue;
            }
        }

        match apply_op(&mut model, &mut ids, op) {
            Ok(()) => applied += 1,
            Err(err) => conflicts.push(ConflictInfo {
                operation_index: index,
                description: err.to_string(),
                resolution: ConflictResolution::Skipped,
            }),
        }
    }

    let new_document = (applied > 0).then(|| write_document(&model));
    ApplyResult {
        success: applied > 0,
        applied,
        conflicts,
        new_document,
    }
}

struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    fn seeded_from(model: &DocumentModel) -> Self {
        Self {
            next: model.highest_numeric_suffix() + 1,
        }
    }

    fn allocate(&mut self, model: &DocumentModel, prefix: &str) -> NodeId {
        loop {
            let candidate = format!("{prefix}-{}", self.next);
            self.next += 1;
            if let Ok(node_id) = NodeId::new(candidate) {
                if !model.contains(&node_id) {
                    return node_id;
                }
            }
        }
    }
}

fn parse_node_id(value: &str) -> Result<NodeId, OpError> {
    NodeId::new(value).map_err(|reason| OpError::InvalidId {
        value: value.to_owned(),
        reason,
    })
}

// Extracted per-op mutation implementation.
include!("ops_impl.rs");
