// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Linear undo/redo over immutable document snapshots, independent of the
//! editor's own undo stack.
//!
//! Each logical document owns an ordered checkpoint list plus a cursor.
//! Saving while the cursor is not at the end discards everything after it
//! (conventional undo-stack branch truncation). Per-document state is
//! lazily initialized: queries on an unknown document behave as empty.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{CheckpointId, DocumentId};

pub const DEFAULT_CHECKPOINT_CAP: usize = 50;

/// Who produced the document state a checkpoint captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointOrigin {
    Human,
    Agent,
}

/// An immutable snapshot of one logical document's full serialized state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    checkpoint_id: CheckpointId,
    document_id: DocumentId,
    document: String,
    preview: Option<String>,
    origin: CheckpointOrigin,
    description: Option<String>,
    created_at_millis: u64,
    parent_id: Option<CheckpointId>,
}

impl Checkpoint {
    pub fn checkpoint_id(&self) -> &CheckpointId {
        &self.checkpoint_id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// Opaque rendered preview (e.g. an image data URI); never interpreted.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn origin(&self) -> CheckpointOrigin {
        self.origin
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at_millis(&self) -> u64 {
        self.created_at_millis
    }

    pub fn parent_id(&self) -> Option<&CheckpointId> {
        self.parent_id.as_ref()
    }
}

#[derive(Debug, Clone, Default)]
struct CheckpointHistory {
    checkpoints: Vec<Checkpoint>,
    cursor: Option<usize>,
}

/// Checkpoint histories for every logical document, with a shared size cap.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    histories: BTreeMap<DocumentId, CheckpointHistory>,
    cap: usize,
    next_checkpoint: u64,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_CAP)
    }
}

impl CheckpointStore {
    pub fn new(cap: usize) -> Self {
        Self {
            histories: BTreeMap::new(),
            cap: cap.max(1),
            next_checkpoint: 1,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Truncates any redo branch, appends a checkpoint whose parent is the
    /// one under the cursor, and evicts the oldest entry beyond the cap.
    pub fn save(
        &mut self,
        document_id: &DocumentId,
        document: impl Into<String>,
        preview: Option<String>,
        origin: CheckpointOrigin,
        description: Option<String>,
    ) -> Checkpoint {
        let checkpoint_id = self.allocate_id();
        let history = self.histories.entry(document_id.clone()).or_default();

        match history.cursor {
            Some(cursor) => history.checkpoints.truncate(cursor + 1),
            None => history.checkpoints.clear(),
        }

        let parent_id = history
            .cursor
            .and_then(|cursor| history.checkpoints.get(cursor))
            .map(|checkpoint| checkpoint.checkpoint_id.clone());

        history.checkpoints.push(Checkpoint {
            checkpoint_id,
            document_id: document_id.clone(),
            document: document.into(),
            preview,
            origin,
            description,
            created_at_millis: now_millis(),
            parent_id,
        });
        history.cursor = Some(history.checkpoints.len() - 1);

        while history.checkpoints.len() > self.cap {
            history.checkpoints.remove(0);
            history.cursor = history
                .cursor
                .map(|cursor| cursor.saturating_sub(1));
        }

        history.checkpoints[history.cursor.unwrap_or(0)].clone()
    }

    /// Step the cursor back one checkpoint; `None` when already at the start.
    pub fn undo(&mut self, document_id: &DocumentId) -> Option<Checkpoint> {
        let history = self.histories.get_mut(document_id)?;
        let cursor = history.cursor?;
        if cursor == 0 {
            return None;
        }
        history.cursor = Some(cursor - 1);
        history.checkpoints.get(cursor - 1).cloned()
    }

    /// Step the cursor forward one checkpoint; `None` when already at the end.
    pub fn redo(&mut self, document_id: &DocumentId) -> Option<Checkpoint> {
        let history = self.histories.get_mut(document_id)?;
        let cursor = history.cursor?;
        if cursor + 1 >= history.checkpoints.len() {
            return None;
        }
        history.cursor = Some(cursor + 1);
        history.checkpoints.get(cursor + 1).cloned()
    }

    /// Arbitrary jump by checkpoint id; `None` if the id is unknown.
    pub fn go_to(
        &mut self,
        document_id: &DocumentId,
        checkpoint_id: &CheckpointId,
    ) -> Option<Checkpoint> {
        let history = self.histories.get_mut(document_id)?;
        let index = history
            .checkpoints
            .iter()
            .position(|checkpoint| &checkpoint.checkpoint_id == checkpoint_id)?;
        history.cursor = Some(index);
        history.checkpoints.get(index).cloned()
    }

    pub fn list(&self, document_id: &DocumentId) -> &[Checkpoint] {
        self.histories
            .get(document_id)
            .map(|history| history.checkpoints.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_current(&self, document_id: &DocumentId) -> Option<&Checkpoint> {
        let history = self.histories.get(document_id)?;
        history.checkpoints.get(history.cursor?)
    }

    pub fn can_undo(&self, document_id: &DocumentId) -> bool {
        self.histories
            .get(document_id)
            .and_then(|history| history.cursor)
            .map(|cursor| cursor > 0)
            .unwrap_or(false)
    }

    pub fn can_redo(&self, document_id: &DocumentId) -> bool {
        self.histories
            .get(document_id)
            .and_then(|history| {
                history
                    .cursor
                    .map(|cursor| cursor + 1 < history.checkpoints.len())
            })
            .unwrap_or(false)
    }

    pub fn count(&self, document_id: &DocumentId) -> usize {
        self.histories
            .get(document_id)
            .map(|history| history.checkpoints.len())
            .unwrap_or(0)
    }

    pub fn clear(&mut self, document_id: &DocumentId) {
        self.histories.remove(document_id);
    }

    pub fn clear_all(&mut self) {
        self.histories.clear();
    }

    fn allocate_id(&mut self) -> CheckpointId {
        loop {
            let candidate = format!("cp-{}", self.next_checkpoint);
            self.next_checkpoint += 1;
            if let Ok(checkpoint_id) = CheckpointId::new(candidate) {
                return checkpoint_id;
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
