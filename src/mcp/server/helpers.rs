// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

fn map_sync_error(err: SyncError) -> ErrorData {
    match err {
        SyncError::UnknownDocument { .. } => ErrorData::resource_not_found(err.to_string(), None),
        SyncError::NoActiveDocument | SyncError::InvalidId { .. } => {
            ErrorData::invalid_params(err.to_string(), None)
        }
    }
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Vertex => "node",
        NodeKind::Edge => "edge",
        NodeKind::Unknown => "unknown",
    }
}

fn element_summary(node: &crate::model::Node) -> McpElement {
    McpElement {
        id: node.node_id().as_str().to_owned(),
        kind: kind_label(node.kind()).to_owned(),
        label: node.label().map(ToOwned::to_owned),
        x: node.geometry().map(|geometry| geometry.x()),
        y: node.geometry().map(|geometry| geometry.y()),
        source: node.source_id().map(|id| id.as_str().to_owned()),
        target: node.target_id().map(|id| id.as_str().to_owned()),
    }
}

fn added_summary(node: &crate::model::Node) -> McpAddedElement {
    McpAddedElement {
        id: node.node_id().as_str().to_owned(),
        kind: kind_label(node.kind()).to_owned(),
        label: node.label().map(ToOwned::to_owned),
    }
}

fn modified_summary(change: &crate::diff::NodeChange) -> McpModifiedElement {
    McpModifiedElement {
        id: change.node_id.as_str().to_owned(),
        fields: change
            .fields
            .iter()
            .map(|field| {
                let (before, after) = field_sides(field);
                McpFieldChange {
                    field: field.field_name().to_owned(),
                    before,
                    after,
                }
            })
            .collect(),
    }
}

fn field_sides(field: &crate::diff::FieldChange) -> (Option<String>, Option<String>) {
    use crate::diff::FieldChange;
    match field {
        FieldChange::Label { before, after } | FieldChange::Style { before, after } => {
            (before.clone(), after.clone())
        }
        FieldChange::Geometry { before, after } => (
            before.as_ref().map(format_geometry),
            after.as_ref().map(format_geometry),
        ),
        FieldChange::Source { before, after } | FieldChange::Target { before, after } => (
            before.as_ref().map(|id| id.as_str().to_owned()),
            after.as_ref().map(|id| id.as_str().to_owned()),
        ),
    }
}

fn format_geometry(geometry: &crate::model::Geometry) -> String {
    format!(
        "({}, {}) {}x{}",
        geometry.x(),
        geometry.y(),
        geometry.width(),
        geometry.height()
    )
}

fn origin_label(origin: CheckpointOrigin) -> &'static str {
    match origin {
        CheckpointOrigin::Human => "human",
        CheckpointOrigin::Agent => "agent",
    }
}

fn mcp_checkpoint(checkpoint: &Checkpoint, current: bool) -> McpCheckpoint {
    McpCheckpoint {
        checkpoint_id: checkpoint.checkpoint_id().as_str().to_owned(),
        origin: origin_label(checkpoint.origin()).to_owned(),
        description: checkpoint.description().map(ToOwned::to_owned),
        created_at_millis: checkpoint.created_at_millis(),
        parent_id: checkpoint
            .parent_id()
            .map(|id| id.as_str().to_owned()),
        current,
    }
}

fn apply_summary(result: &crate::ops::ApplyResult) -> String {
    let mut summary = format!(
        "applied {} operation{}",
        result.applied,
        if result.applied == 1 { "" } else { "s" }
    );
    if !result.conflicts.is_empty() {
        summary.push_str(&format!(
            ", skipped {} conflict{}",
            result.conflicts.len(),
            if result.conflicts.len() == 1 { "" } else { "s" }
        ));
    }
    summary
}
