// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Polling delivery: plain HTTP routes over the same correlation store as
//! the push channel.
//!
//! A remote actor submits a batch, gets a `request_id` back immediately, and
//! polls `/api/results/{request_id}` until the result is delivered (exactly
//! once, then evicted). The editor side polls `/api/operations/next/{id}`
//! for undelivered batches and reports back via `/api/results`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, CheckpointOrigin};
use crate::model::{CheckpointId, DocumentId, RequestId};
use crate::ops::{ApplyResult, ConflictPolicy, Op};

use super::{
    ChangesReportPayload, OperationResultPayload, PendingOperationsPayload, SyncError, SyncHandle,
};

pub fn routes() -> Router<SyncHandle> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/documents", get(list_documents).post(display_document))
        .route("/api/documents/{document_id}", get(read_document))
        .route("/api/operations", post(submit_operations))
        .route("/api/operations/next/{document_id}", get(next_operations))
        .route("/api/results", post(report_result))
        .route("/api/results/{request_id}", get(poll_result))
        .route("/api/changes", post(report_changes))
        .route("/api/changes/{document_id}", get(read_changes))
        .route(
            "/api/checkpoints/{document_id}",
            get(list_checkpoints).post(save_checkpoint),
        )
        .route("/api/checkpoints/{document_id}/undo", post(undo_checkpoint))
        .route("/api/checkpoints/{document_id}/redo", post(redo_checkpoint))
        .route("/api/checkpoints/{document_id}/goto", post(goto_checkpoint))
}

type RouteError = (StatusCode, String);

fn sync_error(err: SyncError) -> RouteError {
    let status = match err {
        SyncError::UnknownDocument { .. } => StatusCode::NOT_FOUND,
        SyncError::NoActiveDocument | SyncError::InvalidId { .. } => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub clients: usize,
    pub documents: usize,
    pub pending_requests: usize,
}

async fn status(State(handle): State<SyncHandle>) -> Json<StatusResponse> {
    let state = handle.lock().await;
    Json(StatusResponse {
        clients: state.clients().len(),
        documents: state.sessions().len(),
        pending_requests: state.correlator().pending_count(),
    })
}

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub name: String,
    pub active: bool,
    pub node_count: usize,
    pub edge_count: usize,
    pub has_changes: bool,
}

#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentSummary>,
    pub active_document_id: Option<String>,
}

async fn list_documents(State(handle): State<SyncHandle>) -> Json<ListDocumentsResponse> {
    let state = handle.lock().await;
    let active = state.active_document_id().cloned();
    let documents = state
        .sessions()
        .values()
        .map(|session| {
            let model = session.tracker().current().model();
            DocumentSummary {
                document_id: session.document_id().as_str().to_owned(),
                name: session.name().to_owned(),
                active: Some(session.document_id()) == active.as_ref(),
                node_count: model.node_count(),
                edge_count: model.edge_count(),
                has_changes: session.has_changes(),
            }
        })
        .collect();
    Json(ListDocumentsResponse {
        documents,
        active_document_id: active.map(|id| id.as_str().to_owned()),
    })
}

#[derive(Debug, Deserialize)]
pub struct DisplayDocumentRequest {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub document: String,
}

#[derive(Debug, Serialize)]
pub struct DisplayDocumentResponse {
    pub document_id: String,
}

async fn display_document(
    State(handle): State<SyncHandle>,
    Json(request): Json<DisplayDocumentRequest>,
) -> Result<Json<DisplayDocumentResponse>, RouteError> {
    let document_id = handle
        .display_document(
            request.document_id.as_deref(),
            request.name.as_deref(),
            &request.document,
            CheckpointOrigin::Agent,
        )
        .await
        .map_err(sync_error)?;
    Ok(Json(DisplayDocumentResponse {
        document_id: document_id.as_str().to_owned(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ReadDocumentResponse {
    pub document_id: String,
    pub name: String,
    pub document: String,
}

async fn read_document(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<ReadDocumentResponse>, RouteError> {
    let state = handle.lock().await;
    let document_id = state
        .resolve_document_id(Some(&document_id))
        .map_err(sync_error)?;
    let session = state.session(&document_id).ok_or_else(|| {
        sync_error(SyncError::UnknownDocument {
            document_id: document_id.as_str().to_owned(),
        })
    })?;
    Ok(Json(ReadDocumentResponse {
        document_id: document_id.as_str().to_owned(),
        name: session.name().to_owned(),
        document: session.document().to_owned(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitOperationsRequest {
    #[serde(default)]
    pub document_id: Option<String>,
    pub operations: Vec<Op>,
    #[serde(default)]
    pub policy: Option<ConflictPolicy>,
}

#[derive(Debug, Serialize)]
pub struct SubmitOperationsResponse {
    pub request_id: String,
}

async fn submit_operations(
    State(handle): State<SyncHandle>,
    Json(request): Json<SubmitOperationsRequest>,
) -> Result<Json<SubmitOperationsResponse>, RouteError> {
    let document_id = {
        let state = handle.lock().await;
        state
            .resolve_document_id(request.document_id.as_deref())
            .map_err(sync_error)?
    };
    let request_id = handle
        .submit_operations(
            &document_id,
            request.operations,
            request.policy.unwrap_or_default(),
        )
        .await;
    Ok(Json(SubmitOperationsResponse {
        request_id: request_id.as_str().to_owned(),
    }))
}

async fn next_operations(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<Option<PendingOperationsPayload>>, RouteError> {
    let mut state = handle.lock().await;
    let document_id = state
        .resolve_document_id(Some(&document_id))
        .map_err(sync_error)?;
    let next = state
        .correlator_mut()
        .next_undelivered(&document_id)
        .map(|request| PendingOperationsPayload {
            request_id: request.request_id().as_str().to_owned(),
            document_id: request.document_id().as_str().to_owned(),
            operations: request.operations().to_vec(),
            policy: request.policy(),
        });
    Ok(Json(next))
}

#[derive(Debug, Serialize)]
pub struct ReportResultResponse {
    pub resolved: bool,
}

async fn report_result(
    State(handle): State<SyncHandle>,
    Json(payload): Json<OperationResultPayload>,
) -> Json<ReportResultResponse> {
    let resolved = handle.record_client_result(payload, None).await;
    Json(ReportResultResponse { resolved })
}

#[derive(Debug, Serialize)]
pub struct PollResultResponse {
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ApplyResult>,
}

async fn poll_result(
    State(handle): State<SyncHandle>,
    Path(request_id): Path<String>,
) -> Result<Json<PollResultResponse>, RouteError> {
    let request_id = RequestId::new(request_id)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let mut state = handle.lock().await;
    if let Some(result) = state.correlator_mut().take_result(&request_id) {
        return Ok(Json(PollResultResponse {
            resolved: true,
            result: Some(result),
        }));
    }
    if state.correlator().get(&request_id).is_some() {
        return Ok(Json(PollResultResponse {
            resolved: false,
            result: None,
        }));
    }
    // Already claimed or expired: the caller should stop polling.
    Err((
        StatusCode::NOT_FOUND,
        format!("unknown request '{request_id}'"),
    ))
}

#[derive(Debug, Serialize)]
pub struct ReportChangesResponse {
    pub ok: bool,
}

async fn report_changes(
    State(handle): State<SyncHandle>,
    Json(payload): Json<ChangesReportPayload>,
) -> Result<Json<ReportChangesResponse>, RouteError> {
    handle
        .record_changes_report(&payload)
        .await
        .map_err(sync_error)?;
    Ok(Json(ReportChangesResponse { ok: true }))
}

#[derive(Debug, Serialize)]
pub struct ReadChangesResponse {
    pub document_id: String,
    pub has_changes: bool,
    pub summary: String,
}

async fn read_changes(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<ReadChangesResponse>, RouteError> {
    let state = handle.lock().await;
    let document_id = state
        .resolve_document_id(Some(&document_id))
        .map_err(sync_error)?;
    let diff = state
        .session(&document_id)
        .map(|session| session.changes())
        .unwrap_or_default();
    Ok(Json(ReadChangesResponse {
        document_id: document_id.as_str().to_owned(),
        has_changes: !diff.is_empty(),
        summary: diff.summary,
    }))
}

#[derive(Debug, Serialize)]
pub struct CheckpointInfo {
    pub checkpoint_id: String,
    pub origin: String,
    pub description: Option<String>,
    pub created_at_millis: u64,
    pub current: bool,
}

fn checkpoint_info(checkpoint: &Checkpoint, current: bool) -> CheckpointInfo {
    CheckpointInfo {
        checkpoint_id: checkpoint.checkpoint_id().as_str().to_owned(),
        origin: match checkpoint.origin() {
            CheckpointOrigin::Human => "human".to_owned(),
            CheckpointOrigin::Agent => "agent".to_owned(),
        },
        description: checkpoint.description().map(ToOwned::to_owned),
        created_at_millis: checkpoint.created_at_millis(),
        current,
    }
}

#[derive(Debug, Serialize)]
pub struct ListCheckpointsResponse {
    pub checkpoints: Vec<CheckpointInfo>,
    pub can_undo: bool,
    pub can_redo: bool,
}

async fn list_checkpoints(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<ListCheckpointsResponse>, RouteError> {
    let state = handle.lock().await;
    let document_id = state
        .resolve_document_id(Some(&document_id))
        .map_err(sync_error)?;
    let current = state
        .checkpoints()
        .get_current(&document_id)
        .map(|checkpoint| checkpoint.checkpoint_id().clone());
    let checkpoints = state
        .checkpoints()
        .list(&document_id)
        .iter()
        .map(|checkpoint| {
            checkpoint_info(
                checkpoint,
                Some(checkpoint.checkpoint_id()) == current.as_ref(),
            )
        })
        .collect();
    Ok(Json(ListCheckpointsResponse {
        checkpoints,
        can_undo: state.checkpoints().can_undo(&document_id),
        can_redo: state.checkpoints().can_redo(&document_id),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SaveCheckpointRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveCheckpointResponse {
    pub checkpoint: CheckpointInfo,
}

async fn save_checkpoint(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
    Json(request): Json<SaveCheckpointRequest>,
) -> Result<Json<SaveCheckpointResponse>, RouteError> {
    let mut state = handle.lock().await;
    let document_id = state
        .resolve_document_id(Some(&document_id))
        .map_err(sync_error)?;
    let document = state
        .session(&document_id)
        .map(|session| session.document().to_owned())
        .unwrap_or_default();
    let saved = state.checkpoints_mut().save(
        &document_id,
        document,
        request.preview,
        CheckpointOrigin::Human,
        request.description,
    );
    Ok(Json(SaveCheckpointResponse {
        checkpoint: checkpoint_info(&saved, true),
    }))
}

#[derive(Debug, Serialize)]
pub struct StepCheckpointResponse {
    pub checkpoint: Option<CheckpointInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

async fn undo_checkpoint(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<StepCheckpointResponse>, RouteError> {
    let (document_id, restored) = {
        let mut state = handle.lock().await;
        let document_id = state
            .resolve_document_id(Some(&document_id))
            .map_err(sync_error)?;
        let restored = state.checkpoints_mut().undo(&document_id);
        (document_id, restored)
    };
    restore_step(&handle, &document_id, restored).await
}

async fn redo_checkpoint(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
) -> Result<Json<StepCheckpointResponse>, RouteError> {
    let (document_id, restored) = {
        let mut state = handle.lock().await;
        let document_id = state
            .resolve_document_id(Some(&document_id))
            .map_err(sync_error)?;
        let restored = state.checkpoints_mut().redo(&document_id);
        (document_id, restored)
    };
    restore_step(&handle, &document_id, restored).await
}

#[derive(Debug, Deserialize)]
pub struct GotoCheckpointRequest {
    pub checkpoint_id: String,
}

async fn goto_checkpoint(
    State(handle): State<SyncHandle>,
    Path(document_id): Path<String>,
    Json(request): Json<GotoCheckpointRequest>,
) -> Result<Json<StepCheckpointResponse>, RouteError> {
    let checkpoint_id = CheckpointId::new(request.checkpoint_id)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let (document_id, restored) = {
        let mut state = handle.lock().await;
        let document_id = state
            .resolve_document_id(Some(&document_id))
            .map_err(sync_error)?;
        let restored = state.checkpoints_mut().go_to(&document_id, &checkpoint_id);
        (document_id, restored)
    };
    restore_step(&handle, &document_id, restored).await
}

async fn restore_step(
    handle: &SyncHandle,
    document_id: &DocumentId,
    restored: Option<Checkpoint>,
) -> Result<Json<StepCheckpointResponse>, RouteError> {
    let Some(checkpoint) = restored else {
        return Ok(Json(StepCheckpointResponse {
            checkpoint: None,
            document: None,
        }));
    };
    handle
        .restore_document(document_id, checkpoint.document())
        .await;
    Ok(Json(StepCheckpointResponse {
        document: Some(checkpoint.document().to_owned()),
        checkpoint: Some(checkpoint_info(&checkpoint, true)),
    }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::Json;

    use super::{
        list_checkpoints, next_operations, poll_result, report_result, submit_operations,
        undo_checkpoint, SubmitOperationsRequest,
    };
    use crate::sync::{OperationResultPayload, SyncHandle, SyncOptions};

    fn new_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime")
    }

    const EMPTY_DOC: &str = r#"<mxGraphModel><root>
      <mxCell id="0"/><mxCell id="1" parent="0"/>
    </root></mxGraphModel>"#;

    #[test]
    fn polling_round_trip_without_a_push_client() {
        let runtime = new_runtime();
        runtime.block_on(async {
            let handle = SyncHandle::new(SyncOptions::default());
            handle
                .display_document(Some("d1"), None, EMPTY_DOC, crate::checkpoint::CheckpointOrigin::Agent)
                .await
                .expect("display");

            let ops = serde_json::from_str(
                r#"[{"op": "add_node", "label": "Cache", "position": {"x": 10, "y": 10}}]"#,
            )
            .expect("ops");
            let submitted = submit_operations(
                State(handle.clone()),
                Json(SubmitOperationsRequest {
                    document_id: Some("d1".to_owned()),
                    operations: ops,
                    policy: None,
                }),
            )
            .await
            .expect("submit");

            // Headless: the engine applied directly, so the result is ready
            // on the first poll and evicted afterwards.
            let polled = poll_result(State(handle.clone()), Path(submitted.0.request_id.clone()))
                .await
                .expect("poll");
            assert!(polled.0.resolved);
            assert_eq!(polled.0.result.as_ref().map(|r| r.applied), Some(1));

            let again = poll_result(State(handle.clone()), Path(submitted.0.request_id.clone())).await;
            assert!(again.is_err());
        });
    }

    #[test]
    fn report_result_resolves_a_delivered_batch() {
        let runtime = new_runtime();
        runtime.block_on(async {
            let handle = SyncHandle::new(SyncOptions::default());
            handle
                .display_document(Some("d1"), None, EMPTY_DOC, crate::checkpoint::CheckpointOrigin::Agent)
                .await
                .expect("display");

            // Queue a batch, then take it the way the editor's poll loop would.
            let document_id = crate::model::DocumentId::new("d1").expect("document id");
            let request_id = {
                let mut state = handle.lock().await;
                state.correlator_mut().submit(
                    document_id.clone(),
                    Vec::new(),
                    crate::ops::ConflictPolicy::default(),
                    1_000,
                )
            };

            let next = next_operations(State(handle.clone()), Path("d1".to_owned()))
                .await
                .expect("next");
            assert_eq!(
                next.0.as_ref().map(|p| p.request_id.clone()),
                Some(request_id.as_str().to_owned())
            );

            // Second poll returns nothing: the batch is delivered exactly once.
            let drained = next_operations(State(handle.clone()), Path("d1".to_owned()))
                .await
                .expect("next again");
            assert!(drained.0.is_none());

            let reported = report_result(
                State(handle.clone()),
                Json(OperationResultPayload {
                    request_id: request_id.as_str().to_owned(),
                    success: true,
                    applied: 0,
                    conflicts: Vec::new(),
                    new_document: None,
                }),
            )
            .await;
            assert!(reported.0.resolved);

            let polled = poll_result(State(handle), Path(request_id.as_str().to_owned()))
                .await
                .expect("poll");
            assert!(polled.0.resolved);
        });
    }

    #[test]
    fn checkpoint_routes_rewind_the_document() {
        let runtime = new_runtime();
        runtime.block_on(async {
            let handle = SyncHandle::new(SyncOptions::default());
            handle
                .display_document(
                    Some("d1"),
                    None,
                    EMPTY_DOC,
                    crate::checkpoint::CheckpointOrigin::Agent,
                )
                .await
                .expect("display");

            let ops = serde_json::from_str(
                r#"[{"op": "add_node", "label": "Cache", "position": {"x": 10, "y": 10}}]"#,
            )
            .expect("ops");
            let submitted = submit_operations(
                State(handle.clone()),
                Json(SubmitOperationsRequest {
                    document_id: Some("d1".to_owned()),
                    operations: ops,
                    policy: None,
                }),
            )
            .await
            .expect("submit");
            poll_result(State(handle.clone()), Path(submitted.0.request_id))
                .await
                .expect("poll");

            let undone = undo_checkpoint(State(handle.clone()), Path("d1".to_owned()))
                .await
                .expect("undo");
            let document = undone.0.document.expect("undo document");
            assert!(!document.contains("Cache"));

            let listed = list_checkpoints(State(handle.clone()), Path("d1".to_owned()))
                .await
                .expect("list");
            assert_eq!(listed.0.checkpoints.len(), 2);
            assert!(listed.0.can_redo);
            assert!(!listed.0.can_undo);

            // The session followed the rewind.
            let state = handle.lock().await;
            let session = state
                .session(&crate::model::DocumentId::new("d1").expect("document id"))
                .expect("session");
            assert!(!session.document().contains("Cache"));
        });
    }
}
