// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-document co-editing state.
//!
//! A `DocumentSession` owns one logical document's change tracker and the
//! last serialized form either side produced. It is a single-writer
//! structure: the surrounding process serializes access per document id.

use crate::diff::{ChangeTracker, Diff, DiffOptions};
use crate::model::DocumentId;
use crate::ops::{apply_operations, ApplyResult, ConflictPolicy, Op};

#[derive(Debug, Clone)]
pub struct DocumentSession {
    document_id: DocumentId,
    name: String,
    tracker: ChangeTracker,
    last_document: String,
}

impl DocumentSession {
    pub fn new(document_id: DocumentId, name: impl Into<String>, options: DiffOptions) -> Self {
        Self {
            document_id,
            name: name.into(),
            tracker: ChangeTracker::new(options),
            last_document: String::new(),
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The last serialized form either side produced.
    pub fn document(&self) -> &str {
        &self.last_document
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Replace the document wholesale (display, tab switch, checkpoint
    /// rewind). The tracker re-bases, so there is no pending diff afterwards.
    pub fn load(&mut self, serialized: &str) {
        self.last_document = serialized.to_owned();
        self.tracker.set_baseline(serialized);
    }

    /// Ingest the editor's latest state without touching the baseline.
    pub fn update_from_editor(&mut self, serialized: &str) {
        self.last_document = serialized.to_owned();
        self.tracker.update(serialized);
    }

    pub fn changes(&self) -> Diff {
        self.tracker.diff()
    }

    pub fn has_changes(&self) -> bool {
        self.tracker.has_changes()
    }

    /// Apply a remote batch against the last known document. On any applied
    /// change the result is re-based into the tracker so future diffs only
    /// measure new human edits.
    pub fn apply(&mut self, operations: &[Op], policy: ConflictPolicy) -> ApplyResult {
        let pending = self.tracker.diff();
        let result = apply_operations(&self.last_document, operations, policy, &pending);
        if let Some(new_document) = &result.new_document {
            self.last_document = new_document.clone();
            self.tracker.set_baseline(new_document);
        }
        result
    }

    /// Record a result the editor process computed itself (push-channel
    /// deployments apply batches editor-side and report back).
    pub fn accept_applied_document(&mut self, new_document: &str) {
        self.last_document = new_document.to_owned();
        self.tracker.set_baseline(new_document);
    }

    /// Force a commit and report element counts from the agreed state.
    pub fn sync_state(&mut self) -> (usize, usize) {
        self.tracker.commit();
        let model = self.tracker.current().model();
        (model.node_count(), model.edge_count())
    }
}
