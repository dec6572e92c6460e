// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core document model.
//!
//! A document is an addressable mapping of node ids to nodes (shapes and
//! connectors), produced by parsing the editor's serialized form.

pub mod document;
pub mod ids;
pub mod node;

pub use document::{is_reserved_id, DocumentModel, RESERVED_LAYER_ID, RESERVED_ROOT_ID};
pub use ids::{CheckpointId, ClientId, DocumentId, Id, IdError, NodeId, RequestId};
pub use node::{Geometry, Node, NodeKind};
