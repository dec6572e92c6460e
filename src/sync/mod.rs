// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Transport between the editor process and remote actors.
//!
//! Two delivery mechanisms (WebSocket push, HTTP polling) share one message
//! vocabulary and one request/result correlation store. All mutable state
//! lives in an explicit [`SyncState`] passed by handle into every request
//! handler; there are no process-wide singletons, which keeps the engine
//! testable without a live server.

pub mod correlator;
pub mod poll;
pub mod push;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, Notify};

use crate::checkpoint::{CheckpointOrigin, CheckpointStore, DEFAULT_CHECKPOINT_CAP};
use crate::diff::DiffOptions;
use crate::model::{ClientId, DocumentId, IdError, RequestId};
use crate::ops::{ApplyResult, ConflictInfo, ConflictPolicy, Op};
use crate::session::DocumentSession;

use correlator::ResultCorrelator;
use push::ClientRegistry;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Message kinds spoken on both delivery mechanisms.
pub mod message_kind {
    // Server to client.
    pub const DOCUMENT_UPDATE: &str = "document-update";
    pub const PENDING_OPERATIONS: &str = "pending-operations";
    pub const CONNECTION_ACK: &str = "connection-ack";
    pub const HEARTBEAT_REPLY: &str = "heartbeat-reply";
    // Client to server.
    pub const CHANGES_REPORT: &str = "changes-report";
    pub const OPERATION_RESULT: &str = "operation-result";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const HEARTBEAT_PING: &str = "heartbeat-ping";
}

/// The uniform wire envelope. Unknown `type` values are logged and ignored,
/// never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: u64,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_owned(),
            timestamp: now_millis(),
            payload,
        }
    }
}

/// Builds an envelope from any serializable payload. Serialization of the
/// fixed payload types cannot fail; a hypothetical failure degrades to a
/// null payload rather than a panic.
pub fn envelope(kind: &str, payload: impl Serialize) -> Envelope {
    Envelope::new(kind, serde_json::to_value(payload).unwrap_or_default())
}

/// Why a document-update was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCause {
    Display,
    Edit,
    Switch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpdatePayload {
    pub document_id: String,
    pub document: String,
    pub cause: UpdateCause,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperationsPayload {
    pub request_id: String,
    pub document_id: String,
    pub operations: Vec<Op>,
    pub policy: ConflictPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAckPayload {
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub document_id: String,
}

/// The editor's report of its latest state. `document` lets the tracker
/// ingest the serialized form; `user_save` marks an explicit save gesture
/// and produces a human-origin checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesReportPayload {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub has_changes: bool,
    #[serde(default)]
    pub user_save: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResultPayload {
    pub request_id: String,
    pub success: bool,
    pub applied: usize,
    #[serde(default)]
    pub conflicts: Vec<ConflictInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_document: Option<String>,
}

impl OperationResultPayload {
    pub fn from_result(request_id: &RequestId, result: &ApplyResult) -> Self {
        Self {
            request_id: request_id.as_str().to_owned(),
            success: result.success,
            applied: result.applied,
            conflicts: result.conflicts.clone(),
            new_document: result.new_document.clone(),
        }
    }

    pub fn into_result(self) -> ApplyResult {
        ApplyResult {
            success: self.success,
            applied: self.applied,
            conflicts: self.conflicts,
            new_document: self.new_document,
        }
    }
}

/// Process-wide tunables, threaded in from the CLI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOptions {
    pub diff: DiffOptions,
    pub checkpoint_cap: usize,
    pub heartbeat_timeout: Duration,
    pub request_max_age: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            diff: DiffOptions::default(),
            checkpoint_cap: DEFAULT_CHECKPOINT_CAP,
            heartbeat_timeout: Duration::from_secs(30),
            request_max_age: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    UnknownDocument { document_id: String },
    NoActiveDocument,
    InvalidId { value: String, reason: IdError },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDocument { document_id } => {
                write!(f, "unknown document '{document_id}'")
            }
            Self::NoActiveDocument => f.write_str("no active document"),
            Self::InvalidId { value, reason } => write!(f, "invalid id '{value}': {reason}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// A wait on a pending request that ran past its caller-enforced timeout.
/// Recoverable: the request may still resolve and remains pollable until the
/// max-age sweep drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTimeout {
    pub request_id: RequestId,
}

impl fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timed out waiting for result of request '{}'",
            self.request_id
        )
    }
}

impl std::error::Error for WaitTimeout {}

/// All co-editing state of one process: sessions, checkpoints, the
/// correlator, and the push-client registry.
#[derive(Debug)]
pub struct SyncState {
    options: SyncOptions,
    sessions: BTreeMap<DocumentId, DocumentSession>,
    active_document_id: Option<DocumentId>,
    checkpoints: CheckpointStore,
    correlator: ResultCorrelator,
    clients: ClientRegistry,
    next_document: u64,
}

impl SyncState {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            sessions: BTreeMap::new(),
            active_document_id: None,
            checkpoints: CheckpointStore::new(options.checkpoint_cap),
            correlator: ResultCorrelator::new(),
            clients: ClientRegistry::new(),
            next_document: 1,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn sessions(&self) -> &BTreeMap<DocumentId, DocumentSession> {
        &self.sessions
    }

    pub fn session(&self, document_id: &DocumentId) -> Option<&DocumentSession> {
        self.sessions.get(document_id)
    }

    pub fn session_mut(&mut self, document_id: &DocumentId) -> Option<&mut DocumentSession> {
        self.sessions.get_mut(document_id)
    }

    /// Per-document state is created lazily on first touch. The first
    /// document also becomes the active one.
    pub fn ensure_session(
        &mut self,
        document_id: &DocumentId,
        name: Option<&str>,
    ) -> &mut DocumentSession {
        let diff_options = self.options.diff;
        if !self.sessions.contains_key(document_id) && self.active_document_id.is_none() {
            self.active_document_id = Some(document_id.clone());
        }
        let session = self.sessions.entry(document_id.clone()).or_insert_with(|| {
            let default_name = document_id.as_str().to_owned();
            DocumentSession::new(document_id.clone(), default_name, diff_options)
        });
        if let Some(name) = name {
            session.set_name(name);
        }
        session
    }

    pub fn remove_session(&mut self, document_id: &DocumentId) -> Option<DocumentSession> {
        let removed = self.sessions.remove(document_id);
        if removed.is_some() {
            self.checkpoints.clear(document_id);
            if self.active_document_id.as_ref() == Some(document_id) {
                self.active_document_id = self.sessions.keys().next().cloned();
            }
        }
        removed
    }

    pub fn active_document_id(&self) -> Option<&DocumentId> {
        self.active_document_id.as_ref()
    }

    pub fn set_active_document_id(&mut self, document_id: Option<DocumentId>) {
        self.active_document_id = document_id;
    }

    /// Resolve an optional wire id to a known document: explicit id must
    /// exist, absent id falls back to the active document.
    pub fn resolve_document_id(&self, raw: Option<&str>) -> Result<DocumentId, SyncError> {
        match raw {
            Some(value) => {
                let document_id =
                    DocumentId::new(value).map_err(|reason| SyncError::InvalidId {
                        value: value.to_owned(),
                        reason,
                    })?;
                if self.sessions.contains_key(&document_id) {
                    Ok(document_id)
                } else {
                    Err(SyncError::UnknownDocument {
                        document_id: value.to_owned(),
                    })
                }
            }
            None => self
                .active_document_id
                .clone()
                .ok_or(SyncError::NoActiveDocument),
        }
    }

    pub fn allocate_document_id(&mut self) -> DocumentId {
        loop {
            let candidate = format!("doc-{}", self.next_document);
            self.next_document += 1;
            if let Ok(document_id) = DocumentId::new(candidate) {
                if !self.sessions.contains_key(&document_id) {
                    return document_id;
                }
            }
        }
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn checkpoints_mut(&mut self) -> &mut CheckpointStore {
        &mut self.checkpoints
    }

    pub fn correlator(&self) -> &ResultCorrelator {
        &self.correlator
    }

    pub fn correlator_mut(&mut self) -> &mut ResultCorrelator {
        &mut self.correlator
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn clients_mut(&mut self) -> &mut ClientRegistry {
        &mut self.clients
    }
}

/// Cloneable handle over the process state plus the result-wakeup signal.
#[derive(Clone)]
pub struct SyncHandle {
    state: Arc<Mutex<SyncState>>,
    results: Arc<Notify>,
}

impl SyncHandle {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncState::new(options))),
            results: Arc::new(Notify::new()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().await
    }

    pub fn notify_results(&self) {
        self.results.notify_waiters();
    }

    /// Load a document (creating its session on first sight), checkpoint it,
    /// and push a document-update to subscribers.
    pub async fn display_document(
        &self,
        document_id: Option<&str>,
        name: Option<&str>,
        serialized: &str,
        origin: CheckpointOrigin,
    ) -> Result<DocumentId, SyncError> {
        let mut state = self.lock().await;
        let document_id = match document_id {
            Some(value) => DocumentId::new(value).map_err(|reason| SyncError::InvalidId {
                value: value.to_owned(),
                reason,
            })?,
            None => state.allocate_document_id(),
        };

        let session = state.ensure_session(&document_id, name);
        session.load(serialized);
        state.set_active_document_id(Some(document_id.clone()));
        state.checkpoints_mut().save(
            &document_id,
            serialized,
            None,
            origin,
            Some("document displayed".to_owned()),
        );
        broadcast_document(&state, &document_id, serialized, UpdateCause::Display, None);
        Ok(document_id)
    }

    /// Switch the active document and push its content with cause `switch`.
    pub async fn open_document(&self, document_id: &str) -> Result<DocumentId, SyncError> {
        let mut state = self.lock().await;
        let document_id = state.resolve_document_id(Some(document_id))?;
        state.set_active_document_id(Some(document_id.clone()));
        let document = state
            .session(&document_id)
            .map(|session| session.document().to_owned())
            .unwrap_or_default();
        broadcast_document(&state, &document_id, &document, UpdateCause::Switch, None);
        Ok(document_id)
    }

    /// Submit a batch for a document. With live subscribers the batch is
    /// pushed as pending-operations and resolves when a client reports back;
    /// headless, the engine applies it directly and resolves immediately.
    pub async fn submit_operations(
        &self,
        document_id: &DocumentId,
        operations: Vec<Op>,
        policy: ConflictPolicy,
    ) -> RequestId {
        let mut state = self.lock().await;
        state.ensure_session(document_id, None);
        let request_id = state.correlator_mut().submit(
            document_id.clone(),
            operations.clone(),
            policy,
            now_millis(),
        );

        let pending = envelope(
            message_kind::PENDING_OPERATIONS,
            PendingOperationsPayload {
                request_id: request_id.as_str().to_owned(),
                document_id: document_id.as_str().to_owned(),
                operations: operations.clone(),
                policy,
            },
        );
        let delivered = state
            .clients()
            .broadcast_to_document(document_id, &pending, None);

        if delivered > 0 {
            state.correlator_mut().mark_delivered(&request_id);
        } else {
            // Headless: no editor attached, apply against the last known
            // document server-side.
            let result = match state.session_mut(document_id) {
                Some(session) => session.apply(&operations, policy),
                None => ApplyResult {
                    success: false,
                    applied: 0,
                    conflicts: Vec::new(),
                    new_document: None,
                },
            };
            if let Some(new_document) = result.new_document.clone() {
                checkpoint_agent_apply(&mut state, document_id, &new_document, result.applied);
                broadcast_document(&state, document_id, &new_document, UpdateCause::Edit, None);
            }
            state.correlator_mut().mark_delivered(&request_id);
            state.correlator_mut().resolve(&request_id, result);
            self.notify_results();
        }
        request_id
    }

    /// Await a request's result with a caller-enforced timeout. Timing out is
    /// recoverable; the result stays claimable by a later poll.
    pub async fn wait_for_result(
        &self,
        request_id: &RequestId,
        timeout: Duration,
    ) -> Result<ApplyResult, WaitTimeout> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.results.notified();
            tokio::pin!(notified);
            // Register before checking so a resolve between the check and the
            // await cannot be missed.
            notified.as_mut().enable();
            if let Some(result) = self.lock().await.correlator_mut().take_result(request_id) {
                return Ok(result);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(WaitTimeout {
                    request_id: request_id.clone(),
                });
            }
        }
    }

    /// Record a result the editor client computed, re-base the session, and
    /// checkpoint the agent's change. `reporter` is excluded from the
    /// follow-up document-update push.
    pub async fn record_client_result(
        &self,
        payload: OperationResultPayload,
        reporter: Option<&ClientId>,
    ) -> bool {
        let Ok(request_id) = RequestId::new(payload.request_id.clone()) else {
            return false;
        };
        let mut state = self.lock().await;
        let document_id = match state.correlator().get(&request_id) {
            Some(request) => request.document_id().clone(),
            None => return false,
        };

        let new_document = payload.new_document.clone();
        let applied = payload.applied;
        if !state
            .correlator_mut()
            .resolve(&request_id, payload.into_result())
        {
            return false;
        }

        if let Some(new_document) = new_document {
            if let Some(session) = state.session_mut(&document_id) {
                session.accept_applied_document(&new_document);
            }
            checkpoint_agent_apply(&mut state, &document_id, &new_document, applied);
            broadcast_document(&state, &document_id, &new_document, UpdateCause::Edit, reporter);
        }
        drop(state);
        self.notify_results();
        true
    }

    /// Re-load a checkpointed document into its session and push it to
    /// subscribers (checkpoint rewind).
    pub async fn restore_document(&self, document_id: &DocumentId, serialized: &str) {
        let mut state = self.lock().await;
        let session = state.ensure_session(document_id, None);
        session.load(serialized);
        broadcast_document(&state, document_id, serialized, UpdateCause::Display, None);
    }

    /// Ingest an editor changes-report: refresh the tracker and, on an
    /// explicit user save, cut a human checkpoint.
    pub async fn record_changes_report(
        &self,
        payload: &ChangesReportPayload,
    ) -> Result<(), SyncError> {
        let document_id =
            DocumentId::new(payload.document_id.clone()).map_err(|reason| SyncError::InvalidId {
                value: payload.document_id.clone(),
                reason,
            })?;
        let mut state = self.lock().await;
        let session = state.ensure_session(&document_id, None);
        if let Some(document) = &payload.document {
            session.update_from_editor(document);
            if payload.user_save {
                let document = document.clone();
                state.checkpoints_mut().save(
                    &document_id,
                    document,
                    None,
                    CheckpointOrigin::Human,
                    Some("user save".to_owned()),
                );
            }
        }
        Ok(())
    }

    /// Drop stale push clients and expired pending requests. Timer-driven;
    /// only ever removes entries.
    pub async fn sweep(&self) {
        let mut state = self.lock().await;
        let now = now_millis();
        let heartbeat_timeout = state.options().heartbeat_timeout.as_millis() as u64;
        let request_max_age = state.options().request_max_age.as_millis() as u64;

        let dropped = state.clients_mut().sweep_stale(now, heartbeat_timeout);
        for client_id in &dropped {
            eprintln!("galene: dropped stale client '{client_id}'");
        }
        state.correlator_mut().expire(now, request_max_age);
    }
}

fn checkpoint_agent_apply(
    state: &mut SyncState,
    document_id: &DocumentId,
    new_document: &str,
    applied: usize,
) {
    let description = format!(
        "applied {applied} operation{}",
        if applied == 1 { "" } else { "s" }
    );
    state.checkpoints_mut().save(
        document_id,
        new_document,
        None,
        CheckpointOrigin::Agent,
        Some(description),
    );
}

fn broadcast_document(
    state: &SyncState,
    document_id: &DocumentId,
    document: &str,
    cause: UpdateCause,
    exclude: Option<&ClientId>,
) {
    let update = envelope(
        message_kind::DOCUMENT_UPDATE,
        DocumentUpdatePayload {
            document_id: document_id.as_str().to_owned(),
            document: document.to_owned(),
            cause,
        },
    );
    state
        .clients()
        .broadcast_to_document(document_id, &update, exclude);
}
