// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ops::{ConflictInfo, ConflictPolicy, Op};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentDisplayParams {
    /// Serialized document to display.
    pub document: String,
    /// Target document; a new one is created when omitted.
    pub document_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentDisplayResponse {
    pub document_id: String,
    pub node_count: u64,
    pub edge_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpDocumentSummary {
    pub document_id: String,
    pub name: String,
    pub active: bool,
    pub node_count: u64,
    pub edge_count: u64,
    pub has_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<McpDocumentSummary>,
    pub active_document_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentOpenParams {
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentOpenResponse {
    pub active_document_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentCloseParams {
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentCloseResponse {
    pub closed_document_id: String,
    pub active_document_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentReadParams {
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentReadResponse {
    pub document_id: String,
    pub name: String,
    pub document: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ElementsListParams {
    pub document_id: Option<String>,
    /// "nodes" or "edges"; both when omitted.
    pub kind: Option<String>,
    /// Case-insensitive regex over element labels.
    pub label_matches: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpElement {
    pub id: String,
    pub kind: String,
    pub label: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub source: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ElementsListResponse {
    pub elements: Vec<McpElement>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChangesGetParams {
    pub document_id: Option<String>,
    /// Include per-element before/after details, not just the summary.
    pub include_details: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpAddedElement {
    pub id: String,
    pub kind: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpFieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpModifiedElement {
    pub id: String,
    pub fields: Vec<McpFieldChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChangesGetResponse {
    pub has_changes: bool,
    pub summary: String,
    pub added: Vec<McpAddedElement>,
    pub modified: Vec<McpModifiedElement>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChangesApplyParams {
    pub document_id: Option<String>,
    pub operations: Vec<Op>,
    pub policy: Option<ConflictPolicy>,
    /// Wait budget for the result; default 10000.
    pub timeout_millis: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChangesApplyResponse {
    pub request_id: String,
    /// False when the wait timed out; the result stays pollable.
    pub resolved: bool,
    pub success: bool,
    pub applied: u64,
    pub conflicts: Vec<ConflictInfo>,
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StateSyncParams {
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StateSyncResponse {
    pub document_id: String,
    pub node_count: u64,
    pub edge_count: u64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckpointSaveParams {
    pub document_id: Option<String>,
    pub description: Option<String>,
    /// Opaque rendered preview, stored verbatim.
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpCheckpoint {
    pub checkpoint_id: String,
    pub origin: String,
    pub description: Option<String>,
    pub created_at_millis: u64,
    pub parent_id: Option<String>,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointSaveResponse {
    pub checkpoint: McpCheckpoint,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckpointListParams {
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointListResponse {
    pub checkpoints: Vec<McpCheckpoint>,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckpointStepParams {
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointStepResponse {
    /// None when there is nothing to undo/redo.
    pub checkpoint: Option<McpCheckpoint>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckpointGotoParams {
    pub document_id: Option<String>,
    pub checkpoint_id: String,
}
