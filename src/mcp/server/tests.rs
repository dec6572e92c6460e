// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::*;
use crate::sync::{ChangesReportPayload, SyncOptions};

const DOC: &str = r#"<mxGraphModel><root>
  <mxCell id="0"/><mxCell id="1" parent="0"/>
  <mxCell id="n1" value="Server" style="rounded=1;" vertex="1" parent="1">
    <mxGeometry x="100" y="100" width="120" height="60" as="geometry"/>
  </mxCell>
  <mxCell id="n2" value="Database" style="shape=cylinder3;" vertex="1" parent="1">
    <mxGeometry x="300" y="100" width="120" height="60" as="geometry"/>
  </mxCell>
  <mxCell id="e1" edge="1" parent="1" source="n1" target="n2">
    <mxGeometry relative="1" as="geometry"/>
  </mxCell>
</root></mxGraphModel>"#;

fn server() -> GaleneMcp {
    GaleneMcp::new(SyncHandle::new(SyncOptions::default()))
}

async fn display(server: &GaleneMcp, document_id: &str, document: &str) {
    server
        .document_display(Parameters(DocumentDisplayParams {
            document: document.to_owned(),
            document_id: Some(document_id.to_owned()),
            name: Some("Architecture".to_owned()),
        }))
        .await
        .expect("document.display");
}

fn ops(raw: &str) -> Vec<crate::ops::Op> {
    serde_json::from_str(raw).expect("parse ops")
}

#[tokio::test]
async fn display_then_list_documents() {
    let server = server();
    display(&server, "d1", DOC).await;

    let Json(list) = server.document_list().await.expect("document.list");
    assert_eq!(list.active_document_id.as_deref(), Some("d1"));
    assert_eq!(list.documents.len(), 1);
    assert_eq!(list.documents[0].name, "Architecture");
    assert_eq!(list.documents[0].node_count, 2);
    assert_eq!(list.documents[0].edge_count, 1);
    assert!(!list.documents[0].has_changes);
}

#[tokio::test]
async fn elements_list_filters_by_kind_and_label() {
    let server = server();
    display(&server, "d1", DOC).await;

    let Json(all) = server
        .elements_list(Parameters(ElementsListParams {
            document_id: None,
            kind: None,
            label_matches: None,
        }))
        .await
        .expect("elements.list");
    assert_eq!(all.elements.len(), 3);

    let Json(nodes) = server
        .elements_list(Parameters(ElementsListParams {
            document_id: None,
            kind: Some("nodes".to_owned()),
            label_matches: None,
        }))
        .await
        .expect("elements.list nodes");
    assert_eq!(nodes.elements.len(), 2);

    let Json(matched) = server
        .elements_list(Parameters(ElementsListParams {
            document_id: None,
            kind: None,
            label_matches: Some("^data".to_owned()),
        }))
        .await
        .expect("elements.list regex");
    assert_eq!(matched.elements.len(), 1);
    assert_eq!(matched.elements[0].id, "n2");

    let err = match server
        .elements_list(Parameters(ElementsListParams {
            document_id: None,
            kind: None,
            label_matches: Some("(".to_owned()),
        }))
        .await
    {
        Ok(_) => panic!("expected invalid regex error"),
        Err(err) => err,
    };
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);

    let err = match server
        .elements_list(Parameters(ElementsListParams {
            document_id: None,
            kind: Some("blobs".to_owned()),
            label_matches: None,
        }))
        .await
    {
        Ok(_) => panic!("expected invalid kind error"),
        Err(err) => err,
    };
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn changes_apply_resolves_headless() {
    let server = server();
    display(&server, "d1", DOC).await;

    let Json(response) = server
        .changes_apply(Parameters(ChangesApplyParams {
            document_id: None,
            operations: ops(
                r#"[{"op": "add_node", "kind": "cylinder", "label": "Redis Cache",
                     "position": {"x": 300, "y": 200}}]"#,
            ),
            policy: None,
            timeout_millis: None,
        }))
        .await
        .expect("changes.apply");

    assert!(response.resolved);
    assert!(response.success);
    assert_eq!(response.applied, 1);
    assert!(response.conflicts.is_empty());

    let Json(read) = server
        .document_read(Parameters(DocumentReadParams { document_id: None }))
        .await
        .expect("document.read");
    assert!(read.document.contains("Redis Cache"));
}

#[tokio::test]
async fn human_edit_conflicts_are_reported_then_cleared_by_sync() {
    let server = server();
    display(&server, "d1", DOC).await;

    // The human relabels n1 in the editor.
    server
        .handle()
        .record_changes_report(&ChangesReportPayload {
            document_id: "d1".to_owned(),
            document: Some(DOC.replace("Server", "API Gateway")),
            summary: String::new(),
            has_changes: true,
            user_save: false,
        })
        .await
        .expect("changes report");

    let Json(changes) = server
        .changes_get(Parameters(ChangesGetParams {
            document_id: None,
            include_details: Some(true),
        }))
        .await
        .expect("changes.get");
    assert!(changes.has_changes);
    assert_eq!(changes.summary, "relabeled 1 element");
    assert_eq!(changes.modified.len(), 1);
    assert_eq!(changes.modified[0].id, "n1");
    assert_eq!(changes.modified[0].fields[0].field, "label");
    assert_eq!(changes.modified[0].fields[0].after.as_deref(), Some("API Gateway"));

    // A remote modify of the same element is skipped.
    let Json(apply) = server
        .changes_apply(Parameters(ChangesApplyParams {
            document_id: None,
            operations: ops(r#"[{"op": "modify_node", "id": "n1", "changes": {"label": "Backend"}}]"#),
            policy: None,
            timeout_millis: None,
        }))
        .await
        .expect("changes.apply");
    assert!(apply.resolved);
    assert!(!apply.success);
    assert_eq!(apply.applied, 0);
    assert_eq!(apply.conflicts.len(), 1);
    assert_eq!(apply.conflicts[0].operation_index, 0);

    // state.sync commits the human edit as the new baseline.
    let Json(synced) = server
        .state_sync(Parameters(StateSyncParams { document_id: None }))
        .await
        .expect("state.sync");
    assert_eq!(synced.node_count, 2);
    assert_eq!(synced.edge_count, 1);

    let Json(after) = server
        .changes_get(Parameters(ChangesGetParams {
            document_id: None,
            include_details: None,
        }))
        .await
        .expect("changes.get after sync");
    assert!(!after.has_changes);
    assert_eq!(after.summary, "no changes");
}

#[tokio::test]
async fn checkpoint_history_supports_undo_redo_and_goto() {
    let server = server();
    display(&server, "d1", DOC).await;

    // Two agent edits on top of the display checkpoint.
    for label in ["Cache", "Queue"] {
        let Json(applied) = server
            .changes_apply(Parameters(ChangesApplyParams {
                document_id: None,
                operations: ops(&format!(
                    r#"[{{"op": "add_node", "label": "{label}", "position": {{"x": 10, "y": 10}}}}]"#
                )),
                policy: None,
                timeout_millis: None,
            }))
            .await
            .expect("changes.apply");
        assert!(applied.success);
    }

    let Json(list) = server
        .checkpoint_list(Parameters(CheckpointListParams { document_id: None }))
        .await
        .expect("checkpoint.list");
    assert_eq!(list.checkpoints.len(), 3);
    assert!(list.can_undo);
    assert!(!list.can_redo);
    assert!(list.checkpoints[2].current);
    assert_eq!(list.checkpoints[0].origin, "agent");

    let Json(undone) = server
        .checkpoint_undo(Parameters(CheckpointStepParams { document_id: None }))
        .await
        .expect("checkpoint.undo");
    let undone_doc = undone.document.expect("undo document");
    assert!(undone_doc.contains("Cache"));
    assert!(!undone_doc.contains("Queue"));

    // The session followed the rewind.
    let Json(read) = server
        .document_read(Parameters(DocumentReadParams { document_id: None }))
        .await
        .expect("document.read");
    assert!(!read.document.contains("Queue"));

    let Json(redone) = server
        .checkpoint_redo(Parameters(CheckpointStepParams { document_id: None }))
        .await
        .expect("checkpoint.redo");
    assert!(redone.document.expect("redo document").contains("Queue"));

    let first_id = {
        let Json(list) = server
            .checkpoint_list(Parameters(CheckpointListParams { document_id: None }))
            .await
            .expect("checkpoint.list");
        list.checkpoints[0].checkpoint_id.clone()
    };
    let Json(jumped) = server
        .checkpoint_goto(Parameters(CheckpointGotoParams {
            document_id: None,
            checkpoint_id: first_id,
        }))
        .await
        .expect("checkpoint.goto");
    let jumped_doc = jumped.document.expect("goto document");
    assert!(!jumped_doc.contains("Cache"));
    assert!(!jumped_doc.contains("Queue"));

    let Json(missing) = server
        .checkpoint_goto(Parameters(CheckpointGotoParams {
            document_id: None,
            checkpoint_id: "cp-404".to_owned(),
        }))
        .await
        .expect("checkpoint.goto unknown");
    assert!(missing.checkpoint.is_none());
    assert!(missing.document.is_none());
}

#[tokio::test]
async fn open_switches_and_close_drops_a_document() {
    let server = server();
    display(&server, "d1", DOC).await;
    display(&server, "d2", DOC).await;

    let Json(opened) = server
        .document_open(Parameters(DocumentOpenParams {
            document_id: "d1".to_owned(),
        }))
        .await
        .expect("document.open");
    assert_eq!(opened.active_document_id, "d1");

    let Json(closed) = server
        .document_close(Parameters(DocumentCloseParams {
            document_id: "d1".to_owned(),
        }))
        .await
        .expect("document.close");
    assert_eq!(closed.closed_document_id, "d1");
    assert_eq!(closed.active_document_id.as_deref(), Some("d2"));

    let err = match server
        .document_read(Parameters(DocumentReadParams {
            document_id: Some("d1".to_owned()),
        }))
        .await
    {
        Ok(_) => panic!("expected not found error"),
        Err(err) => err,
    };
    assert_eq!(err.code, rmcp::model::ErrorCode::RESOURCE_NOT_FOUND);
}

#[tokio::test]
async fn tools_require_a_document() {
    let server = server();
    let err = match server
        .changes_get(Parameters(ChangesGetParams {
            document_id: None,
            include_details: None,
        }))
        .await
    {
        Ok(_) => panic!("expected no-active-document error"),
        Err(err) => err,
    };
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
}
