// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Correlation of operation submissions to their asynchronous results.
//!
//! Both delivery mechanisms (push and poll) share this store, so a caller
//! never needs to know which one eventually resolved its request. A request
//! resolves exactly once; its result is delivered exactly once and then
//! evicted. Unresolved requests are dropped after a maximum age to bound
//! memory.

use std::collections::{BTreeMap, VecDeque};

use crate::model::{DocumentId, RequestId};
use crate::ops::{ApplyResult, ConflictPolicy, Op};

/// One submitted batch awaiting (or holding) its result.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperationRequest {
    request_id: RequestId,
    document_id: DocumentId,
    operations: Vec<Op>,
    policy: ConflictPolicy,
    submitted_at_millis: u64,
    delivered: bool,
    resolved: bool,
    result: Option<ApplyResult>,
}

impl PendingOperationRequest {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn operations(&self) -> &[Op] {
        &self.operations
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn submitted_at_millis(&self) -> u64 {
        self.submitted_at_millis
    }

    pub fn delivered(&self) -> bool {
        self.delivered
    }

    pub fn resolved(&self) -> bool {
        self.resolved
    }
}

#[derive(Debug, Default)]
pub struct ResultCorrelator {
    requests: BTreeMap<RequestId, PendingOperationRequest>,
    order: VecDeque<RequestId>,
    next_request: u64,
}

impl ResultCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        document_id: DocumentId,
        operations: Vec<Op>,
        policy: ConflictPolicy,
        now_millis: u64,
    ) -> RequestId {
        let request_id = self.allocate_id();
        self.requests.insert(
            request_id.clone(),
            PendingOperationRequest {
                request_id: request_id.clone(),
                document_id,
                operations,
                policy,
                submitted_at_millis: now_millis,
                delivered: false,
                resolved: false,
                result: None,
            },
        );
        self.order.push_back(request_id.clone());
        request_id
    }

    pub fn get(&self, request_id: &RequestId) -> Option<&PendingOperationRequest> {
        self.requests.get(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// The oldest unresolved, undelivered batch for a document, marked
    /// delivered so a second poll does not hand it out again. Submission
    /// order per document is delivery order.
    pub fn next_undelivered(&mut self, document_id: &DocumentId) -> Option<PendingOperationRequest> {
        let request_id = self
            .order
            .iter()
            .find(|request_id| {
                self.requests
                    .get(*request_id)
                    .map(|request| {
                        request.document_id() == document_id
                            && !request.delivered
                            && !request.resolved
                    })
                    .unwrap_or(false)
            })?
            .clone();
        let request = self.requests.get_mut(&request_id)?;
        request.delivered = true;
        Some(request.clone())
    }

    /// Mark a batch as handed to a push subscriber so the poll route skips it.
    pub fn mark_delivered(&mut self, request_id: &RequestId) {
        if let Some(request) = self.requests.get_mut(request_id) {
            request.delivered = true;
        }
    }

    /// Attach a result. Returns false for an unknown or already-resolved
    /// request: whichever delivery path reports first wins.
    pub fn resolve(&mut self, request_id: &RequestId, result: ApplyResult) -> bool {
        match self.requests.get_mut(request_id) {
            Some(request) if !request.resolved => {
                request.resolved = true;
                request.result = Some(result);
                true
            }
            _ => false,
        }
    }

    /// Deliver a resolved result exactly once, evicting the request.
    pub fn take_result(&mut self, request_id: &RequestId) -> Option<ApplyResult> {
        if !self.requests.get(request_id)?.resolved {
            return None;
        }
        let request = self.requests.remove(request_id)?;
        self.order.retain(|id| id != request_id);
        request.result
    }

    /// Drop requests older than the maximum age. The sweep only ever removes
    /// entries; it never contends with an in-flight resolution.
    pub fn expire(&mut self, now_millis: u64, max_age_millis: u64) -> usize {
        let cutoff = now_millis.saturating_sub(max_age_millis);
        let expired = self
            .requests
            .values()
            .filter(|request| request.submitted_at_millis < cutoff)
            .map(|request| request.request_id.clone())
            .collect::<Vec<_>>();
        for request_id in &expired {
            self.requests.remove(request_id);
            self.order.retain(|id| id != request_id);
        }
        expired.len()
    }

    fn allocate_id(&mut self) -> RequestId {
        loop {
            let candidate = format!("req-{}", self.next_request);
            self.next_request += 1;
            if let Ok(request_id) = RequestId::new(candidate) {
                if !self.requests.contains_key(&request_id) {
                    return request_id;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResultCorrelator;
    use crate::model::{DocumentId, RequestId};
    use crate::ops::{ApplyResult, ConflictPolicy};

    fn did(value: &str) -> DocumentId {
        DocumentId::new(value).expect("document id")
    }

    fn ok_result(applied: usize) -> ApplyResult {
        ApplyResult {
            success: applied > 0,
            applied,
            conflicts: Vec::new(),
            new_document: None,
        }
    }

    #[test]
    fn resolves_exactly_once_and_delivers_exactly_once() {
        let mut correlator = ResultCorrelator::new();
        let request_id =
            correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 1_000);

        assert!(correlator.take_result(&request_id).is_none());
        assert!(correlator.resolve(&request_id, ok_result(2)));
        assert!(!correlator.resolve(&request_id, ok_result(9)));

        let result = correlator.take_result(&request_id).expect("result");
        assert_eq!(result.applied, 2);
        assert!(correlator.take_result(&request_id).is_none());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn batches_deliver_in_submission_order_per_document() {
        let mut correlator = ResultCorrelator::new();
        let first = correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 1);
        let _other_doc = correlator.submit(did("d2"), Vec::new(), ConflictPolicy::default(), 2);
        let second = correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 3);

        let a = correlator.next_undelivered(&did("d1")).expect("first batch");
        assert_eq!(a.request_id(), &first);
        let b = correlator.next_undelivered(&did("d1")).expect("second batch");
        assert_eq!(b.request_id(), &second);
        assert!(correlator.next_undelivered(&did("d1")).is_none());
    }

    #[test]
    fn mark_delivered_hides_a_batch_from_polling() {
        let mut correlator = ResultCorrelator::new();
        let request_id =
            correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 1);
        correlator.mark_delivered(&request_id);
        assert!(correlator.next_undelivered(&did("d1")).is_none());
    }

    #[test]
    fn unknown_request_cannot_resolve() {
        let mut correlator = ResultCorrelator::new();
        let ghost = RequestId::new("req-404").expect("request id");
        assert!(!correlator.resolve(&ghost, ok_result(1)));
    }

    #[test]
    fn expiry_drops_stale_requests() {
        let mut correlator = ResultCorrelator::new();
        let old = correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 1_000);
        let fresh = correlator.submit(did("d1"), Vec::new(), ConflictPolicy::default(), 200_000);

        assert_eq!(correlator.expire(300_000, 150_000), 1);
        assert!(correlator.get(&old).is_none());
        assert!(correlator.get(&fresh).is_some());
    }
}
