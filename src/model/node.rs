// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::ids::NodeId;

/// Whether an element is a shape, a connector, or something the parser could
/// not classify (kept addressable so re-serialization stays lossless).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Vertex,
    Edge,
    Unknown,
}

/// Position and extent of a vertex, in document length units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Per-axis equality with a tolerance, absorbing the rounding noise the
    /// host editor introduces when it round-trips coordinates.
    pub fn approx_eq(&self, other: &Geometry, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// One addressable element of the tree document.
///
/// Edges may reference ids that do not resolve while the document is in an
/// intermediate state; the model does not validate references.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    node_id: NodeId,
    kind: NodeKind,
    label: Option<String>,
    style: Option<String>,
    parent_id: Option<NodeId>,
    source_id: Option<NodeId>,
    target_id: Option<NodeId>,
    geometry: Option<Geometry>,
}

impl Node {
    pub fn new(node_id: NodeId, kind: NodeKind) -> Self {
        Self {
            node_id,
            kind,
            label: None,
            style: None,
            parent_id: None,
            source_id: None,
            target_id: None,
            geometry: None,
        }
    }

    pub fn vertex(node_id: NodeId) -> Self {
        Self::new(node_id, NodeKind::Vertex)
    }

    pub fn edge(node_id: NodeId) -> Self {
        Self::new(node_id, NodeKind::Edge)
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label<T: Into<String>>(&mut self, label: Option<T>) {
        self.label = label.map(Into::into);
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn set_style<T: Into<String>>(&mut self, style: Option<T>) {
        self.style = style.map(Into::into);
    }

    pub fn parent_id(&self) -> Option<&NodeId> {
        self.parent_id.as_ref()
    }

    pub fn set_parent_id(&mut self, parent_id: Option<NodeId>) {
        self.parent_id = parent_id;
    }

    pub fn source_id(&self) -> Option<&NodeId> {
        self.source_id.as_ref()
    }

    pub fn set_source_id(&mut self, source_id: Option<NodeId>) {
        self.source_id = source_id;
    }

    pub fn target_id(&self) -> Option<&NodeId> {
        self.target_id.as_ref()
    }

    pub fn set_target_id(&mut self, target_id: Option<NodeId>) {
        self.target_id = target_id;
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        self.geometry.as_mut()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
    }
}
