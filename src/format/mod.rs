// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Serialized document formats.
//!
//! The only dialect today is the editor's `mxGraphModel` XML subset.

pub mod mxgraph;

pub use mxgraph::{parse_document, write_document};
