// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};

use crate::checkpoint::{Checkpoint, CheckpointOrigin};
use crate::model::{DocumentId, NodeKind};
use crate::sync::{SyncError, SyncHandle};

use super::types::*;

const DEFAULT_APPLY_TIMEOUT_MILLIS: u64 = 10_000;

/// Agent-facing tool surface over one process's [`SyncHandle`].
#[derive(Clone)]
pub struct GaleneMcp {
    handle: SyncHandle,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GaleneMcp {
    pub fn new(handle: SyncHandle) -> Self {
        Self {
            handle,
            tool_router: Self::tool_router(),
        }
    }

    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    async fn resolve_document(&self, raw: Option<&str>) -> Result<DocumentId, ErrorData> {
        self.handle
            .lock()
            .await
            .resolve_document_id(raw)
            .map_err(map_sync_error)
    }

    /// Display a serialized document (replacing the target document's content
    /// wholesale) and make it the active document. Start here, or with
    /// `document.list` when the human already has documents open.
    #[tool(name = "document.display")]
    async fn document_display(
        &self,
        params: Parameters<DocumentDisplayParams>,
    ) -> Result<Json<DocumentDisplayResponse>, ErrorData> {
        let document_id = self
            .handle
            .display_document(
                params.0.document_id.as_deref(),
                params.0.name.as_deref(),
                &params.0.document,
                CheckpointOrigin::Agent,
            )
            .await
            .map_err(map_sync_error)?;

        let state = self.handle.lock().await;
        let (node_count, edge_count) = state
            .session(&document_id)
            .map(|session| {
                let model = session.tracker().current().model();
                (model.node_count(), model.edge_count())
            })
            .unwrap_or((0, 0));
        Ok(Json(DocumentDisplayResponse {
            document_id: document_id.as_str().to_owned(),
            node_count: node_count as u64,
            edge_count: edge_count as u64,
        }))
    }

    /// List open documents with element counts and pending human edits.
    #[tool(name = "document.list")]
    async fn document_list(&self) -> Result<Json<DocumentListResponse>, ErrorData> {
        let state = self.handle.lock().await;
        let active = state.active_document_id().cloned();
        let documents = state
            .sessions()
            .values()
            .map(|session| {
                let model = session.tracker().current().model();
                McpDocumentSummary {
                    document_id: session.document_id().as_str().to_owned(),
                    name: session.name().to_owned(),
                    active: Some(session.document_id()) == active.as_ref(),
                    node_count: model.node_count() as u64,
                    edge_count: model.edge_count() as u64,
                    has_changes: session.has_changes(),
                }
            })
            .collect();
        Ok(Json(DocumentListResponse {
            documents,
            active_document_id: active.map(|id| id.as_str().to_owned()),
        }))
    }

    /// Switch the active document; subscribed editors receive its content
    /// with cause `switch`.
    #[tool(name = "document.open")]
    async fn document_open(
        &self,
        params: Parameters<DocumentOpenParams>,
    ) -> Result<Json<DocumentOpenResponse>, ErrorData> {
        let document_id = self
            .handle
            .open_document(&params.0.document_id)
            .await
            .map_err(map_sync_error)?;
        Ok(Json(DocumentOpenResponse {
            active_document_id: document_id.as_str().to_owned(),
        }))
    }

    /// Close a document, dropping its session and checkpoint history.
    #[tool(name = "document.close")]
    async fn document_close(
        &self,
        params: Parameters<DocumentCloseParams>,
    ) -> Result<Json<DocumentCloseResponse>, ErrorData> {
        let mut state = self.handle.lock().await;
        let document_id = state
            .resolve_document_id(Some(&params.0.document_id))
            .map_err(map_sync_error)?;
        state.remove_session(&document_id);
        Ok(Json(DocumentCloseResponse {
            closed_document_id: document_id.as_str().to_owned(),
            active_document_id: state
                .active_document_id()
                .map(|id| id.as_str().to_owned()),
        }))
    }

    /// Read a document's last known serialized form.
    #[tool(name = "document.read")]
    async fn document_read(
        &self,
        params: Parameters<DocumentReadParams>,
    ) -> Result<Json<DocumentReadResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let state = self.handle.lock().await;
        let session = state
            .session(&document_id)
            .ok_or_else(|| ErrorData::resource_not_found("document not found", None))?;
        Ok(Json(DocumentReadResponse {
            document_id: document_id.as_str().to_owned(),
            name: session.name().to_owned(),
            document: session.document().to_owned(),
        }))
    }

    /// List current elements with ids, labels, positions and endpoints; use
    /// this to discover ids before targeting `changes.apply` operations.
    #[tool(name = "elements.list")]
    async fn elements_list(
        &self,
        params: Parameters<ElementsListParams>,
    ) -> Result<Json<ElementsListResponse>, ErrorData> {
        let kind_filter = match params.0.kind.as_deref() {
            None => None,
            Some("nodes") => Some(NodeKind::Vertex),
            Some("edges") => Some(NodeKind::Edge),
            Some(other) => {
                return Err(ErrorData::invalid_params(
                    format!("invalid kind '{other}' (expected 'nodes' or 'edges')"),
                    None,
                ));
            }
        };
        let label_filter = params
            .0
            .label_matches
            .as_deref()
            .map(|needle| {
                regex::RegexBuilder::new(needle)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| {
                        ErrorData::invalid_params(
                            format!("invalid label_matches regex: {err}"),
                            None,
                        )
                    })
            })
            .transpose()?;

        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let state = self.handle.lock().await;
        let session = state
            .session(&document_id)
            .ok_or_else(|| ErrorData::resource_not_found("document not found", None))?;
        let elements = session
            .tracker()
            .current()
            .model()
            .elements()
            .filter(|node| kind_filter.map(|kind| node.kind() == kind).unwrap_or(true))
            .filter(|node| {
                label_filter
                    .as_ref()
                    .map(|regex| regex.is_match(node.label().unwrap_or_default()))
                    .unwrap_or(true)
            })
            .map(element_summary)
            .collect();
        Ok(Json(ElementsListResponse { elements }))
    }

    /// What the human changed since the last sync. Call before editing so
    /// the batch does not clobber their work.
    #[tool(name = "changes.get")]
    async fn changes_get(
        &self,
        params: Parameters<ChangesGetParams>,
    ) -> Result<Json<ChangesGetResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let state = self.handle.lock().await;
        let diff = state
            .session(&document_id)
            .map(|session| session.changes())
            .unwrap_or_default();
        let include_details = params.0.include_details.unwrap_or(false);

        let (added, modified, deleted) = if include_details {
            (
                diff.added.iter().map(added_summary).collect(),
                diff.modified.iter().map(modified_summary).collect(),
                diff.deleted
                    .iter()
                    .map(|id| id.as_str().to_owned())
                    .collect(),
            )
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        Ok(Json(ChangesGetResponse {
            has_changes: !diff.is_empty(),
            summary: diff.summary,
            added,
            modified,
            deleted,
        }))
    }

    /// Apply incremental operations instead of re-sending the whole document.
    /// Conflicting operations are skipped under the default policy; the
    /// response lists each conflict so it can be explained to the human.
    #[tool(name = "changes.apply")]
    async fn changes_apply(
        &self,
        params: Parameters<ChangesApplyParams>,
    ) -> Result<Json<ChangesApplyResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let policy = params.0.policy.unwrap_or_default();
        let timeout =
            Duration::from_millis(params.0.timeout_millis.unwrap_or(DEFAULT_APPLY_TIMEOUT_MILLIS));

        let request_id = self
            .handle
            .submit_operations(&document_id, params.0.operations, policy)
            .await;

        match self.handle.wait_for_result(&request_id, timeout).await {
            Ok(result) => {
                let summary = apply_summary(&result);
                Ok(Json(ChangesApplyResponse {
                    request_id: request_id.as_str().to_owned(),
                    resolved: true,
                    success: result.success,
                    applied: result.applied as u64,
                    conflicts: result.conflicts,
                    summary,
                }))
            }
            Err(timeout) => Ok(Json(ChangesApplyResponse {
                request_id: request_id.as_str().to_owned(),
                resolved: false,
                success: false,
                applied: 0,
                conflicts: Vec::new(),
                summary: format!(
                    "{timeout}; the editor may be slow or offline, retry or poll the result"
                ),
            })),
        }
    }

    /// Commit the change baseline: future `changes.get` calls report only
    /// edits made after this point. Returns agreed element counts.
    #[tool(name = "state.sync")]
    async fn state_sync(
        &self,
        params: Parameters<StateSyncParams>,
    ) -> Result<Json<StateSyncResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let mut state = self.handle.lock().await;
        let (node_count, edge_count) = state
            .session_mut(&document_id)
            .map(|session| session.sync_state())
            .unwrap_or((0, 0));
        Ok(Json(StateSyncResponse {
            document_id: document_id.as_str().to_owned(),
            node_count: node_count as u64,
            edge_count: edge_count as u64,
        }))
    }

    /// Snapshot the current document into the checkpoint history.
    #[tool(name = "checkpoint.save")]
    async fn checkpoint_save(
        &self,
        params: Parameters<CheckpointSaveParams>,
    ) -> Result<Json<CheckpointSaveResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let mut state = self.handle.lock().await;
        let document = state
            .session(&document_id)
            .map(|session| session.document().to_owned())
            .ok_or_else(|| ErrorData::resource_not_found("document not found", None))?;
        let saved = state.checkpoints_mut().save(
            &document_id,
            document,
            params.0.preview,
            CheckpointOrigin::Agent,
            params.0.description,
        );
        let checkpoint = mcp_checkpoint(&saved, true);
        Ok(Json(CheckpointSaveResponse { checkpoint }))
    }

    /// Browse the checkpoint history for a document.
    #[tool(name = "checkpoint.list")]
    async fn checkpoint_list(
        &self,
        params: Parameters<CheckpointListParams>,
    ) -> Result<Json<CheckpointListResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let state = self.handle.lock().await;
        let current = state
            .checkpoints()
            .get_current(&document_id)
            .map(|checkpoint| checkpoint.checkpoint_id().clone());
        let checkpoints = state
            .checkpoints()
            .list(&document_id)
            .iter()
            .map(|checkpoint| {
                mcp_checkpoint(
                    checkpoint,
                    Some(checkpoint.checkpoint_id()) == current.as_ref(),
                )
            })
            .collect();
        Ok(Json(CheckpointListResponse {
            checkpoints,
            can_undo: state.checkpoints().can_undo(&document_id),
            can_redo: state.checkpoints().can_redo(&document_id),
        }))
    }

    /// Rewind one checkpoint and re-load the document everywhere.
    #[tool(name = "checkpoint.undo")]
    async fn checkpoint_undo(
        &self,
        params: Parameters<CheckpointStepParams>,
    ) -> Result<Json<CheckpointStepResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let restored = {
            let mut state = self.handle.lock().await;
            state.checkpoints_mut().undo(&document_id)
        };
        self.restore_checkpoint(&document_id, restored).await
    }

    /// Step forward one checkpoint after an undo.
    #[tool(name = "checkpoint.redo")]
    async fn checkpoint_redo(
        &self,
        params: Parameters<CheckpointStepParams>,
    ) -> Result<Json<CheckpointStepResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let restored = {
            let mut state = self.handle.lock().await;
            state.checkpoints_mut().redo(&document_id)
        };
        self.restore_checkpoint(&document_id, restored).await
    }

    /// Jump to an arbitrary checkpoint by id.
    #[tool(name = "checkpoint.goto")]
    async fn checkpoint_goto(
        &self,
        params: Parameters<CheckpointGotoParams>,
    ) -> Result<Json<CheckpointStepResponse>, ErrorData> {
        let document_id = self.resolve_document(params.0.document_id.as_deref()).await?;
        let checkpoint_id = crate::model::CheckpointId::new(params.0.checkpoint_id.clone())
            .map_err(|err| {
                ErrorData::invalid_params(
                    format!("invalid checkpoint id '{}': {err}", params.0.checkpoint_id),
                    None,
                )
            })?;
        let restored = {
            let mut state = self.handle.lock().await;
            state.checkpoints_mut().go_to(&document_id, &checkpoint_id)
        };
        self.restore_checkpoint(&document_id, restored).await
    }

    async fn restore_checkpoint(
        &self,
        document_id: &DocumentId,
        restored: Option<Checkpoint>,
    ) -> Result<Json<CheckpointStepResponse>, ErrorData> {
        let Some(checkpoint) = restored else {
            return Ok(Json(CheckpointStepResponse {
                checkpoint: None,
                document: None,
            }));
        };
        self.handle
            .restore_document(document_id, checkpoint.document())
            .await;
        Ok(Json(CheckpointStepResponse {
            document: Some(checkpoint.document().to_owned()),
            checkpoint: Some(mcp_checkpoint(&checkpoint, true)),
        }))
    }
}

#[tool_handler]
impl ServerHandler for GaleneMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Galene diagram co-editing bridge (tools: document.display, document.list, document.open, document.close, document.read, elements.list, changes.get, changes.apply, state.sync, checkpoint.save, checkpoint.list, checkpoint.undo, checkpoint.redo, checkpoint.goto). Call changes.get before changes.apply so the batch does not clobber the human's edits."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Extracted mapping helpers for MCP tool handlers.
include!("server/helpers.rs");

#[cfg(test)]
mod tests;
